//! OAuth 2.0 client facade over the `oauth2` crate for cloud-feed token endpoints.

pub use oauth2;

// std
use std::collections::BTreeMap;
// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, TransientError, TransportError},
	feed::{ClientAuthMethod, CloudFeed, FeedErrorContext, FeedErrorKind, FeedGrant, FeedStrategy},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a broker error.
	fn map_transport_error(
		&self,
		grant: FeedGrant,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		grant: FeedGrant,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(grant, meta, *inner),
			other => map_common_transport_error(grant, meta, other),
		}
	}
}

/// Maps the transport-independent [`HttpClientError`] variants.
///
/// Custom mappers can delegate here after handling their own transport variant.
pub fn map_common_transport_error<E>(
	grant: FeedGrant,
	meta: Option<&ResponseMetadata>,
	err: HttpClientError<E>,
) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) => TransportError::network(*inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint {
			message: format!("HTTP client failed during the {grant} request: {message}"),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
		_ => TransientError::TokenEndpoint {
			message: format!("HTTP client failed during the {grant} request"),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

/// Tokens returned by a successful grant, before they are bound to a credential record.
#[derive(Clone, Debug)]
pub(crate) struct TokenGrant {
	pub(crate) access_token: TokenSecret,
	pub(crate) refresh_token: Option<TokenSecret>,
	pub(crate) expires_in: Duration,
}

pub(crate) trait OAuth2Facade {
	fn exchange_authorization_code<'a>(
		&'a self,
		strategy: &'a dyn FeedStrategy,
		code: &'a str,
	) -> FacadeFuture<'a, TokenGrant>;

	fn refresh_token<'a>(
		&'a self,
		strategy: &'a dyn FeedStrategy,
		refresh_token: &'a str,
	) -> FacadeFuture<'a, TokenGrant>;
}

/// `oauth2`-backed facade bound to a single feed.
pub(crate) struct BasicFacade<'f, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	feed: &'f CloudFeed,
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<'f, C, M> BasicFacade<'f, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_feed(
		feed: &'f CloudFeed,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let auth_url = AuthUrl::new(feed.authorization_url.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let token_url = TokenUrl::new(feed.token_url.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let redirect_url = RedirectUrl::new(feed.redirect_url.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let mut oauth_client = BasicClient::new(ClientId::new(feed.client_id.clone()))
			.set_client_secret(ClientSecret::new(feed.client_secret.expose().to_owned()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url);

		if matches!(feed.client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { feed, oauth_client, http_client, error_mapper })
	}

	fn map_error(
		&self,
		strategy: &dyn FeedStrategy,
		grant: FeedGrant,
		meta: Option<ResponseMetadata>,
		err: BasicRequestTokenError<HttpClientError<C::TransportError>>,
	) -> Error {
		let meta = meta.as_ref();

		match err {
			RequestTokenError::ServerResponse(response) =>
				map_server_response_error(strategy, grant, response, meta),
			RequestTokenError::Request(error) =>
				self.error_mapper.map_transport_error(grant, meta, error),
			RequestTokenError::Parse(error, _body) =>
				TransientError::TokenResponseParse { source: error, status: meta_status(meta) }
					.into(),
			RequestTokenError::Other(message) => TransientError::TokenEndpoint {
				message,
				status: meta_status(meta),
				retry_after: meta_retry_after(meta),
			}
			.into(),
		}
	}
}
impl<C, M> OAuth2Facade for BasicFacade<'_, C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange_authorization_code<'a>(
		&'a self,
		strategy: &'a dyn FeedStrategy,
		code: &'a str,
	) -> FacadeFuture<'a, TokenGrant> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let mut form = BTreeMap::from([("access_type".to_owned(), "offline".to_owned())]);

			if !self.feed.scope.is_empty() {
				form.insert("scope".into(), self.feed.scope.normalized());
			}

			strategy.augment_token_request(FeedGrant::AuthorizationCode, &mut form);

			let mut request = self.oauth_client.exchange_code(AuthorizationCode::new(code.to_owned()));

			for (key, value) in form {
				request = request.add_extra_param(key, value);
			}

			let response = request.request_async(&instrumented).await.map_err(|err| {
				self.map_error(strategy, FeedGrant::AuthorizationCode, meta.take(), err)
			})?;

			map_token_response(response)
		})
	}

	fn refresh_token<'a>(
		&'a self,
		strategy: &'a dyn FeedStrategy,
		refresh_token: &'a str,
	) -> FacadeFuture<'a, TokenGrant> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.to_owned());
			let mut form = BTreeMap::new();

			strategy.augment_token_request(FeedGrant::RefreshToken, &mut form);

			let mut request = self.oauth_client.exchange_refresh_token(&refresh_secret);

			for (key, value) in form {
				request = request.add_extra_param(key, value);
			}

			let response = request.request_async(&instrumented).await.map_err(|err| {
				self.map_error(strategy, FeedGrant::RefreshToken, meta.take(), err)
			})?;

			map_token_response(response)
		})
	}
}

fn map_token_response(response: BasicTokenResponse) -> Result<TokenGrant> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	Ok(TokenGrant {
		access_token: TokenSecret::new(response.access_token().secret().to_owned()),
		refresh_token: response
			.refresh_token()
			.map(|token| TokenSecret::new(token.secret().to_owned()))
			.filter(|secret| !secret.is_empty()),
		expires_in: Duration::seconds(expires_in),
	})
}

fn map_server_response_error(
	strategy: &dyn FeedStrategy,
	grant: FeedGrant,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let mut ctx =
		FeedErrorContext::new(grant).with_oauth_error(response.error().as_ref().to_string());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}

	let message = match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_string(),
	};

	match strategy.classify_token_error(&ctx) {
		FeedErrorKind::InvalidGrant => Error::InvalidGrant { reason: message },
		FeedErrorKind::InvalidClient => Error::InvalidClient { reason: message },
		FeedErrorKind::Transient => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(grant: FeedGrant, meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: format!("The {grant} request timed out"),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::from(err).into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
