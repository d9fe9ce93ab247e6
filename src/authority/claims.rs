//! Token kinds, signed claims, and the authorization view handed to request guards.

// self
use crate::{_prelude::*, auth::SubjectId};

/// Class of principal a bearer token speaks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
	/// Back-office administrator.
	Admin,
	/// Activated account.
	Account,
	/// One-time token that lets an invited account activate itself.
	AccountActivation,
	/// Measurement device bound to an account.
	Device,
}
impl TokenKind {
	/// Returns a stable label suitable for logs and error messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenKind::Admin => "admin",
			TokenKind::Account => "account",
			TokenKind::AccountActivation => "account_activation",
			TokenKind::Device => "device",
		}
	}
}
impl Display for TokenKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Signed payload of a bearer token.
///
/// Timestamps travel as Unix seconds (`iat`, `exp`); an absent `exp` means the token never
/// expires on its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
	/// Principal class.
	pub kind: TokenKind,
	/// Principal identifier.
	#[serde(rename = "sub")]
	pub subject: SubjectId,
	/// Issuance instant.
	#[serde(rename = "iat", with = "time::serde::timestamp")]
	pub issued_at: OffsetDateTime,
	/// Optional expiry instant.
	#[serde(
		rename = "exp",
		default,
		skip_serializing_if = "Option::is_none",
		with = "time::serde::timestamp::option"
	)]
	pub expires_at: Option<OffsetDateTime>,
}
impl Claims {
	/// Returns `true` when the token carries an expiry that is not after `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expiry| expiry <= now)
	}
}

/// Verified token view consumed by authorization checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authorization {
	/// Principal class.
	pub kind: TokenKind,
	/// Principal identifier.
	pub subject: SubjectId,
	/// Full claim set the kind and subject were read from.
	pub claims: Claims,
}
impl Authorization {
	/// Wraps verified claims.
	pub fn new(claims: Claims) -> Self {
		Self { kind: claims.kind, subject: claims.subject, claims }
	}

	/// Returns `true` when the token belongs to the expected principal class.
	pub fn is_kind(&self, expected: TokenKind) -> bool {
		self.kind == expected
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn claims_use_compact_wire_names() {
		let claims = Claims {
			kind: TokenKind::AccountActivation,
			subject: SubjectId::new(12),
			issued_at: macros::datetime!(2025-01-01 00:00 UTC),
			expires_at: None,
		};
		let payload = serde_json::to_value(&claims).expect("Claims should serialize.");

		assert_eq!(
			payload,
			serde_json::json!({ "kind": "account_activation", "sub": 12, "iat": 1_735_689_600 })
		);

		let parsed: Claims = serde_json::from_value(payload).expect("Claims should deserialize.");

		assert_eq!(parsed, claims);
	}

	#[test]
	fn expiry_is_optional() {
		let now = macros::datetime!(2025-01-01 12:00 UTC);
		let mut claims = Claims {
			kind: TokenKind::Device,
			subject: SubjectId::new(1),
			issued_at: now,
			expires_at: None,
		};

		assert!(!claims.is_expired_at(now + Duration::days(3650)));

		claims.expires_at = Some(now + Duration::hours(1));

		assert!(!claims.is_expired_at(now));
		assert!(claims.is_expired_at(now + Duration::hours(1)));
	}

	#[test]
	fn authorization_exposes_kind_checks() {
		let auth = Authorization::new(Claims {
			kind: TokenKind::Admin,
			subject: SubjectId::new(3),
			issued_at: macros::datetime!(2025-01-01 00:00 UTC),
			expires_at: None,
		});

		assert!(auth.is_kind(TokenKind::Admin));
		assert!(!auth.is_kind(TokenKind::Account));
		assert_eq!(auth.subject, SubjectId::new(3));
	}
}
