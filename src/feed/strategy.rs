//! Feed strategy hooks that classify token endpoint failures.
//!
//! Only a small part of the provider error vocabulary is terminal for a stored credential.
//! Implementations decide which failures mean "this refresh token can never work again" so the
//! credential service knows when to delete a record instead of retrying it.

// std
use std::collections::BTreeMap;
// self
use crate::_prelude::*;

/// Grant a token endpoint call was made for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedGrant {
	/// First-time authorization code exchange.
	AuthorizationCode,
	/// Refresh token rotation.
	RefreshToken,
}
impl FeedGrant {
	/// Returns the RFC 6749 identifier for the grant type.
	pub const fn as_str(self) -> &'static str {
		match self {
			FeedGrant::AuthorizationCode => "authorization_code",
			FeedGrant::RefreshToken => "refresh_token",
		}
	}
}
impl Display for FeedGrant {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Strategy hook that lets feeds decorate requests and classify errors.
pub trait FeedStrategy
where
	Self: Send + Sync,
{
	/// Maps a token endpoint failure into the broker taxonomy.
	fn classify_token_error(&self, ctx: &FeedErrorContext) -> FeedErrorKind;

	/// Adds provider-specific form parameters before dispatching a token request.
	fn augment_token_request(&self, _grant: FeedGrant, _form: &mut BTreeMap<String, String>) {}
}

/// Canonical feed error categories used by strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedErrorKind {
	/// The grant is permanently unusable; the stored credential should be dropped.
	InvalidGrant,
	/// Client authentication failed; the feed configuration needs attention.
	InvalidClient,
	/// Failure is temporary and should be retried.
	Transient,
}

/// Context passed to feed strategies when classifying token errors.
///
/// The struct keeps only primitive data so strategies stay decoupled from any HTTP client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedErrorContext {
	/// Grant associated with the failing request.
	pub grant: FeedGrant,
	/// HTTP status code returned by the provider, when available.
	pub http_status: Option<u16>,
	/// Provider-supplied OAuth `error` field.
	pub oauth_error: Option<String>,
	/// Provider-supplied OAuth `error_description` field.
	pub error_description: Option<String>,
}
impl FeedErrorContext {
	/// Creates a new context scoped to the provided grant.
	pub fn new(grant: FeedGrant) -> Self {
		Self { grant, http_status: None, oauth_error: None, error_description: None }
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth error code string returned by the provider.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}
}

/// Default strategy: `invalid_grant` is terminal, `invalid_client` flags configuration, and
/// everything else is retried.
///
/// Only the structured `error` code is consulted; `error_description` is free text and never
/// makes a failure terminal.
#[derive(Debug, Default)]
pub struct DefaultFeedStrategy;
impl Display for DefaultFeedStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-feed-strategy")
	}
}
impl FeedStrategy for DefaultFeedStrategy {
	fn classify_token_error(&self, ctx: &FeedErrorContext) -> FeedErrorKind {
		if let Some(kind) = ctx.oauth_error.as_deref().and_then(match_exact_value) {
			return kind;
		}

		match ctx.http_status {
			Some(401) => FeedErrorKind::InvalidClient,
			_ => FeedErrorKind::Transient,
		}
	}
}

fn match_exact_value(value: &str) -> Option<FeedErrorKind> {
	if value.eq_ignore_ascii_case("invalid_grant") {
		Some(FeedErrorKind::InvalidGrant)
	} else if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("unauthorized_client")
	{
		Some(FeedErrorKind::InvalidClient)
	} else {
		None
	}
}
