//! Token authority: signs, parses, and validates bearer tokens for every principal kind.
//!
//! Tokens are compact JWS strings (`header.claims.signature`, base64url without padding)
//! signed with ES256 by the single process-wide [`SigningKey`]. The header carries the key's
//! `kid` fingerprint. Parsing verifies the fixed-size P-256 signature over the first two
//! segments before any claim is trusted, then applies the token's own expiry.

mod claims;
mod key;

pub use claims::*;
pub use key::*;

// std
use std::path::Path;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use p256::ecdsa::Signature;
// self
use crate::{
	_prelude::*,
	auth::SubjectId,
	clock::{self, Clock, SystemClock},
	error::TokenError,
};

const ALGORITHM: &str = "ES256";
const TOKEN_TYPE: &str = "JWT";

#[derive(Debug, Serialize, Deserialize)]
struct Header {
	alg: String,
	typ: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	kid: Option<String>,
}

/// Issues and verifies bearer tokens.
///
/// The authority is cheap to clone and safe to share across request handlers; the key is
/// read-only after construction.
#[derive(Clone)]
pub struct TokenAuthority {
	key: Arc<SigningKey>,
	clock: Arc<dyn Clock>,
}
impl TokenAuthority {
	/// Creates an authority around injected key material and the system clock.
	pub fn new(key: SigningKey) -> Self {
		Self { key: Arc::new(key), clock: Arc::new(SystemClock) }
	}

	/// Loads (or bootstraps) the key file and builds an authority around it.
	pub fn from_key_file(path: impl AsRef<Path>) -> Result<Self> {
		Ok(Self::new(SigningKey::load_or_generate(path)?))
	}

	/// Replaces the clock used for issuance and expiry checks.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Fingerprint of the signing key.
	pub fn key_id(&self) -> &str {
		self.key.key_id()
	}

	/// Signs a token for `subject` of the given kind; `expires_at = None` never expires.
	pub fn sign(
		&self,
		kind: TokenKind,
		subject: SubjectId,
		expires_at: Option<OffsetDateTime>,
	) -> Result<String, TokenError> {
		let claims = Claims {
			kind,
			subject,
			issued_at: clock::truncate_to_second(self.clock.now()),
			expires_at: expires_at.map(clock::truncate_to_second),
		};

		self.encode(&claims)
	}

	/// Re-issues a token for an existing authorization, keeping its kind, subject, and expiry.
	pub fn sign_authorization(&self, authorization: &Authorization) -> Result<String, TokenError> {
		self.sign(authorization.kind, authorization.subject, authorization.claims.expires_at)
	}

	/// Verifies `token` and returns its kind, subject, and full claim set.
	pub fn parse(&self, token: &str) -> Result<(TokenKind, SubjectId, Claims), TokenError> {
		let claims = self.decode(token)?;

		if let Some(expired_at) = claims.expires_at.filter(|_| claims.is_expired_at(self.clock.now()))
		{
			return Err(TokenError::Expired { expired_at });
		}

		Ok((claims.kind, claims.subject, claims))
	}

	/// Verifies `token` and wraps the result for downstream kind checks.
	pub fn parse_to_authorization(&self, token: &str) -> Result<Authorization, TokenError> {
		self.parse(token).map(|(_, _, claims)| Authorization::new(claims))
	}

	fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
		let header = Header {
			alg: ALGORITHM.into(),
			typ: TOKEN_TYPE.into(),
			kid: Some(self.key.key_id().to_owned()),
		};
		let header_b64 = URL_SAFE_NO_PAD.encode(to_json(&header)?);
		let claims_b64 = URL_SAFE_NO_PAD.encode(to_json(claims)?);
		let signing_input = format!("{header_b64}.{claims_b64}");
		let signature = self
			.key
			.sign(signing_input.as_bytes())
			.map_err(|e| TokenError::Signing { reason: e.to_string() })?;
		let signature_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());

		Ok(format!("{signing_input}.{signature_b64}"))
	}

	fn decode(&self, token: &str) -> Result<Claims, TokenError> {
		let mut segments = token.split('.');
		let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
			(segments.next(), segments.next(), segments.next(), segments.next())
		else {
			return Err(malformed("expected three dot-separated segments"));
		};
		let header: Header = from_segment(header_b64, "header")?;

		if header.alg != ALGORITHM {
			return Err(malformed(format!("unsupported algorithm {}", header.alg)));
		}

		let signature_bytes = URL_SAFE_NO_PAD
			.decode(signature_b64)
			.map_err(|_| malformed("signature is not base64url"))?;
		// A well-formed but out-of-range signature is still just a wrong signature.
		let signature =
			Signature::from_slice(&signature_bytes).map_err(|_| TokenError::InvalidSignature)?;
		let signing_input_len = header_b64.len() + 1 + claims_b64.len();

		if !self.key.verify(&token.as_bytes()[..signing_input_len], &signature) {
			return Err(TokenError::InvalidSignature);
		}

		from_segment(claims_b64, "claims")
	}
}
impl Debug for TokenAuthority {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenAuthority").field("key", &self.key).finish_non_exhaustive()
	}
}

fn to_json<T>(value: &T) -> Result<Vec<u8>, TokenError>
where
	T: Serialize,
{
	serde_json::to_vec(value).map_err(|e| TokenError::Signing { reason: e.to_string() })
}

fn from_segment<T>(segment: &str, label: &str) -> Result<T, TokenError>
where
	T: for<'de> Deserialize<'de>,
{
	let bytes = URL_SAFE_NO_PAD
		.decode(segment)
		.map_err(|_| malformed(format!("{label} is not base64url")))?;

	serde_json::from_slice(&bytes).map_err(|e| malformed(format!("{label} is not valid JSON: {e}")))
}

fn malformed(reason: impl Into<String>) -> TokenError {
	TokenError::Malformed { reason: reason.into() }
}
