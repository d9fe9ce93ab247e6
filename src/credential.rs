//! Cloud-feed OAuth 2.0 credential records and their builder.

// crates.io
use time::PrimitiveDateTime;
// self
use crate::{
	_prelude::*,
	auth::{AccountId, FeedId, TokenSecret},
};

/// Composite key identifying the single credential an account holds for a feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CredentialKey {
	/// Account that authorized the feed.
	pub account: AccountId,
	/// Feed the credential was issued for.
	pub feed: FeedId,
}
impl CredentialKey {
	/// Builds a key for the account/feed pair.
	pub const fn new(account: AccountId, feed: FeedId) -> Self {
		Self { account, feed }
	}
}
impl Display for CredentialKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "account {} / feed {}", self.account, self.feed)
	}
}

/// Errors produced by [`CloudFeedCredentialBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CredentialBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
	/// Issued when the relative expiry lands outside the representable date range.
	#[error("Expiry {expires_in} after {issued_at} is out of range.")]
	ExpiryOutOfRange {
		/// Issued-at instant the expiry was added to.
		issued_at: OffsetDateTime,
		/// Relative expiry that overflowed.
		expires_in: Duration,
	},
}

/// OAuth 2.0 token pair held on behalf of one account for one feed.
///
/// Records are persisted by the store (secrets included) but redact every secret in [`Debug`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudFeedCredential {
	/// Account that authorized the feed.
	pub account: AccountId,
	/// Feed the tokens belong to.
	pub feed: FeedId,
	/// Current access token.
	pub access_token: TokenSecret,
	/// Current refresh token, when the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Authorization code the credential was created from; kept for audit.
	pub auth_grant_code: Option<TokenSecret>,
	/// Instant the current access token was obtained.
	#[serde(with = "time::serde::rfc3339")]
	pub issued_at: OffsetDateTime,
	/// Expiry of the current access token.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
}
impl CloudFeedCredential {
	/// Returns a builder for the account/feed pair.
	pub fn builder(account: AccountId, feed: FeedId) -> CloudFeedCredentialBuilder {
		CloudFeedCredentialBuilder::new(CredentialKey::new(account, feed))
	}

	/// Store key of this record.
	pub fn key(&self) -> CredentialKey {
		CredentialKey::new(self.account, self.feed)
	}

	/// Returns the refresh token when one is present and non-empty.
	pub fn usable_refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref().filter(|secret| !secret.is_empty())
	}

	/// Instant at which the background worker should renew this record.
	///
	/// A margin reaching past the earliest representable instant yields that instant, so the
	/// record is simply overdue.
	pub fn refresh_due_at(&self, pre_renewal: Duration) -> OffsetDateTime {
		self.expires_at
			.checked_sub(pre_renewal)
			.unwrap_or_else(|| PrimitiveDateTime::MIN.assume_utc())
	}

	/// Returns `true` if the access token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}
}
impl Debug for CloudFeedCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CloudFeedCredential")
			.field("account", &self.account)
			.field("feed", &self.feed)
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("auth_grant_code", &self.auth_grant_code.as_ref().map(|_| "<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`CloudFeedCredential`].
#[derive(Clone, Debug)]
pub struct CloudFeedCredentialBuilder {
	key: CredentialKey,
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	auth_grant_code: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl CloudFeedCredentialBuilder {
	fn new(key: CredentialKey) -> Self {
		Self {
			key,
			access_token: None,
			refresh_token: None,
			auth_grant_code: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Records the authorization code the credential originates from.
	pub fn auth_grant_code(mut self, code: impl Into<String>) -> Self {
		self.auth_grant_code = Some(TokenSecret::new(code));

		self
	}

	/// Consumes the builder and produces a [`CloudFeedCredential`].
	pub fn build(self) -> Result<CloudFeedCredential, CredentialBuilderError> {
		let access_token = self.access_token.ok_or(CredentialBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at.checked_add(delta).ok_or(
				CredentialBuilderError::ExpiryOutOfRange { issued_at, expires_in: delta },
			)?,
			(None, None) => return Err(CredentialBuilderError::MissingExpiry),
		};

		Ok(CloudFeedCredential {
			account: self.key.account,
			feed: self.key.feed,
			access_token,
			refresh_token: self.refresh_token,
			auth_grant_code: self.auth_grant_code,
			issued_at,
			expires_at,
		})
	}
}
