//! Request-side authorization gate built on [`TokenAuthority`].
//!
//! HTTP routing lives outside this crate; handlers hand the raw `Authorization` header to a
//! [`BearerGuard`] and, for principals that can be invalidated, check the verified token
//! against the principal's [`PrincipalStanding`].

// self
use crate::{
	_prelude::*,
	authority::{Authorization, TokenAuthority, TokenKind},
	clock,
	error::TokenError,
};

const BEARER_PREFIX: &str = "Bearer ";

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
	let token = header.strip_prefix(BEARER_PREFIX)?.trim();

	(!token.is_empty()).then_some(token)
}

/// Accepts bearer tokens of a fixed set of kinds.
#[derive(Clone, Debug)]
pub struct BearerGuard {
	authority: TokenAuthority,
	accepted: Vec<TokenKind>,
}
impl BearerGuard {
	/// Gate that only admits `kind`.
	pub fn new(authority: TokenAuthority, kind: TokenKind) -> Self {
		Self { authority, accepted: vec![kind] }
	}

	/// Gate that admits any of `kinds` (e.g. a device or the account owning it).
	pub fn any_of(authority: TokenAuthority, kinds: impl IntoIterator<Item = TokenKind>) -> Self {
		Self { authority, accepted: kinds.into_iter().collect() }
	}

	/// Kinds this gate admits.
	pub fn accepted(&self) -> &[TokenKind] {
		&self.accepted
	}

	/// Verifies the header value and checks the token kind.
	pub fn authorize(&self, header: Option<&str>) -> Result<Authorization, TokenError> {
		let token = header.and_then(bearer_token).ok_or(TokenError::MissingBearer)?;
		let auth = self.authority.parse_to_authorization(token)?;

		if !self.accepted.iter().any(|kind| auth.is_kind(*kind)) {
			tracing::debug!(kind = %auth.kind, subject = %auth.subject, "Bearer token kind rejected.");

			return Err(TokenError::WrongKind { found: auth.kind });
		}

		Ok(auth)
	}
}

/// Server-side state of a principal that can outlive or outlast its tokens.
///
/// Reactivating a principal invalidates every token issued before the activation; an expiry on
/// the principal cuts short tokens that are still cryptographically valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalStanding {
	/// Instant of the latest (re)activation.
	#[serde(with = "time::serde::rfc3339")]
	pub activated_at: OffsetDateTime,
	/// Instant after which the principal is no longer allowed in.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub expiry: Option<OffsetDateTime>,
}
impl PrincipalStanding {
	/// Standing of a principal activated at `activated_at` without an expiry.
	pub fn new(activated_at: OffsetDateTime) -> Self {
		Self { activated_at, expiry: None }
	}

	/// Sets the principal expiry.
	pub fn with_expiry(mut self, expiry: OffsetDateTime) -> Self {
		self.expiry = Some(expiry);

		self
	}

	/// Moves the activation instant forward, invalidating every earlier token.
	pub fn reactivate(&mut self, now: OffsetDateTime) {
		self.activated_at = now;
	}

	/// Checks a verified token against this standing at `now`.
	pub fn check(&self, auth: &Authorization, now: OffsetDateTime) -> Result<(), TokenError> {
		// Token timestamps have second precision.
		if auth.claims.issued_at < clock::truncate_to_second(self.activated_at) {
			tracing::warn!(subject = %auth.subject, "Invalidated bearer token was used.");

			return Err(TokenError::Invalidated);
		}
		if let Some(expired_at) = self.expiry.filter(|expiry| *expiry < now) {
			tracing::warn!(subject = %auth.subject, "Bearer token for an expired principal was used.");

			return Err(TokenError::PrincipalExpired { expired_at });
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{
		auth::SubjectId,
		authority::SigningKey,
		clock::{Clock, ManualClock},
	};

	fn authority() -> (TokenAuthority, ManualClock) {
		let clock = ManualClock::new(macros::datetime!(2025-06-01 12:00:00.750 UTC));
		let authority =
			TokenAuthority::new(SigningKey::generate()).with_clock(Arc::new(clock.clone()));

		(authority, clock)
	}

	#[test]
	fn bearer_header_is_parsed() {
		assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
		assert_eq!(bearer_token("Bearer "), None);
		assert_eq!(bearer_token("Basic abc"), None);
		assert_eq!(bearer_token("abc"), None);
	}

	#[test]
	fn guard_enforces_kind() {
		let (authority, _) = authority();
		let guard = BearerGuard::new(authority.clone(), TokenKind::Admin);
		let admin = authority
			.sign(TokenKind::Admin, SubjectId::new(1), None)
			.expect("Signing should succeed.");
		let device = authority
			.sign(TokenKind::Device, SubjectId::new(1), None)
			.expect("Signing should succeed.");

		assert!(guard.authorize(Some(&format!("Bearer {admin}"))).is_ok());
		assert_eq!(
			guard.authorize(Some(&format!("Bearer {device}"))),
			Err(TokenError::WrongKind { found: TokenKind::Device })
		);
		assert_eq!(guard.authorize(None), Err(TokenError::MissingBearer));
		assert_eq!(guard.authorize(Some("Bearer ")), Err(TokenError::MissingBearer));
	}

	#[test]
	fn double_gate_accepts_either_kind() {
		let (authority, _) = authority();
		let guard =
			BearerGuard::any_of(authority.clone(), [TokenKind::Device, TokenKind::Account]);

		for kind in [TokenKind::Device, TokenKind::Account] {
			let token =
				authority.sign(kind, SubjectId::new(4), None).expect("Signing should succeed.");

			assert_eq!(
				guard.authorize(Some(&format!("Bearer {token}"))).map(|auth| auth.kind),
				Ok(kind)
			);
		}

		let activation = authority
			.sign(TokenKind::AccountActivation, SubjectId::new(4), None)
			.expect("Signing should succeed.");

		assert!(guard.authorize(Some(&format!("Bearer {activation}"))).is_err());
	}

	#[test]
	fn reactivation_invalidates_earlier_tokens() {
		let (authority, clock) = authority();
		let mut standing = PrincipalStanding::new(clock.now());
		let token = authority
			.parse_to_authorization(
				&authority
					.sign(TokenKind::Admin, SubjectId::new(2), None)
					.expect("Signing should succeed."),
			)
			.expect("Token should parse.");

		// Issued within the activation second, so it stays valid.
		assert_eq!(standing.check(&token, clock.now()), Ok(()));

		clock.advance(Duration::minutes(5));
		standing.reactivate(clock.now());

		assert_eq!(standing.check(&token, clock.now()), Err(TokenError::Invalidated));

		let fresh = authority
			.parse_to_authorization(
				&authority
					.sign(TokenKind::Admin, SubjectId::new(2), None)
					.expect("Signing should succeed."),
			)
			.expect("Token should parse.");

		assert_eq!(standing.check(&fresh, clock.now()), Ok(()));
	}

	#[test]
	fn principal_expiry_is_independent_of_token_expiry() {
		let (authority, clock) = authority();
		let expiry = clock.now() + Duration::hours(1);
		let standing = PrincipalStanding::new(clock.now()).with_expiry(expiry);
		let token = authority
			.parse_to_authorization(
				&authority
					.sign(TokenKind::Admin, SubjectId::new(8), None)
					.expect("Signing should succeed."),
			)
			.expect("Token should parse.");

		assert_eq!(standing.check(&token, clock.now()), Ok(()));
		assert_eq!(
			standing.check(&token, clock.now() + Duration::hours(2)),
			Err(TokenError::PrincipalExpired { expired_at: expiry })
		);
	}
}
