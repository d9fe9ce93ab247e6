//! Crate-level error types shared across the token authority, credential flows, and stores.

// self
use crate::{_prelude::*, auth::DataSourceTypeId, credential::CredentialKey};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retried on the next scheduling cycle.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Bearer token could not be issued or was rejected.
	#[error(transparent)]
	Token(#[from] TokenError),
	/// Signing key could not be loaded or generated.
	#[error(transparent)]
	Key(#[from] crate::authority::KeyError),

	/// Provider rejected the grant permanently (bad code or revoked refresh token).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// No credential is stored for the requested account/feed pair.
	#[error("No cloud feed credential exists for {key}.")]
	CredentialNotFound {
		/// Key that was looked up.
		key: CredentialKey,
	},
	/// A credential already exists for the account/feed pair.
	#[error("A cloud feed credential already exists for {key}.")]
	DuplicateCredential {
		/// Key that collided.
		key: CredentialKey,
	},
	/// The write would make the precedence relation cyclic; nothing was persisted.
	#[error("Circular precedence reference detected at data source type {id}; write rolled back.")]
	CircularReference {
		/// Data source type whose precedence list closed the cycle.
		id: DataSourceTypeId,
	},
}
impl Error {
	/// Returns `true` when retrying later may succeed.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Transient(_) | Self::Transport(_))
	}

	/// Upstream `Retry-After` hint carried by a transient token endpoint failure.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Transient(TransientError::TokenEndpoint { retry_after, .. }) => *retry_after,
			_ => None,
		}
	}
}

/// Bearer token failures surfaced to the authorization layer as access denial.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TokenError {
	/// Token could not be decoded into header, claims, and signature.
	#[error("Bearer token is malformed: {reason}.")]
	Malformed {
		/// What part of the token failed to decode.
		reason: String,
	},
	/// Signature does not verify against the process-wide public key.
	#[error("Bearer token signature is invalid.")]
	InvalidSignature,
	/// Token carried an expiry that has passed.
	#[error("Bearer token expired at {expired_at}.")]
	Expired {
		/// Expiry instant carried by the token.
		expired_at: OffsetDateTime,
	},
	/// Signing failed; never expected under normal operation.
	#[error("Bearer token could not be signed: {reason}.")]
	Signing {
		/// Underlying cryptographic or encoding failure.
		reason: String,
	},
	/// Request carried no `Authorization: Bearer` credential.
	#[error("Request is missing a bearer token.")]
	MissingBearer,
	/// Token kind is not accepted by the guarded operation.
	#[error("Token of kind {found} is not accepted here.")]
	WrongKind {
		/// Kind carried by the token.
		found: crate::authority::TokenKind,
	},
	/// Token was issued before the principal was last (re)activated.
	#[error("Bearer token was invalidated by a later activation.")]
	Invalidated,
	/// Principal record expired independently of the token.
	#[error("Principal expired at {expired_at}.")]
	PrincipalExpired {
		/// Expiry recorded on the principal.
		expired_at: OffsetDateTime,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Feed descriptor contains an invalid URL.
	#[error("Feed descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// No feed descriptor is registered for the identifier.
	#[error("Cloud feed {feed} is not registered.")]
	UnknownFeed {
		/// Missing feed identifier.
		feed: crate::auth::FeedId,
	},
	/// Stored record is missing a refresh secret.
	#[error("Stored credential is missing a refresh token.")]
	MissingRefreshToken,
	/// Feed scopes cannot be normalized.
	#[error("Feed scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Credential builder validation failed.
	#[error("Unable to build credential record.")]
	CredentialBuild(#[from] crate::credential::CredentialBuilderError),
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Configuration value could not be parsed.
	#[error("Configuration value `{field}` is invalid: {reason}.")]
	InvalidValue {
		/// Field or environment variable name.
		field: &'static str,
		/// Parse failure description.
		reason: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// The caller-supplied deadline elapsed before the provider answered.
	#[error("Token endpoint did not answer within {timeout}.")]
	Timeout {
		/// Deadline that elapsed.
		timeout: Duration,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
