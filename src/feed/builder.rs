// self
use crate::{
	_prelude::*,
	auth::{FeedId, ScopeSet, TokenSecret},
	feed::{ClientAuthMethod, CloudFeed},
};

/// Errors raised while constructing or validating feed descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CloudFeedError {
	/// Authorization endpoint is required for the code exchange.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationUrl,
	/// Token endpoint is mandatory for exchanges and refreshes.
	#[error("Missing token endpoint.")]
	MissingTokenUrl,
	/// Redirect URI must match the one registered with the provider.
	#[error("Missing redirect URI.")]
	MissingRedirectUrl,
	/// Confidential clients need an identifier.
	#[error("Client identifier cannot be empty.")]
	MissingClientId,
	/// Endpoints must be hierarchical URLs the OAuth client can post to.
	#[error("The {endpoint} URL cannot be used as an OAuth endpoint: {url}.")]
	UnsupportedEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Builder for [`CloudFeed`] values.
#[derive(Debug)]
pub struct CloudFeedBuilder {
	id: FeedId,
	name: String,
	authorization_url: Option<Url>,
	token_url: Option<Url>,
	redirect_url: Option<Url>,
	client_id: String,
	client_secret: TokenSecret,
	scope: ScopeSet,
	client_auth_method: ClientAuthMethod,
}
impl CloudFeedBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: FeedId) -> Self {
		Self {
			id,
			name: String::new(),
			authorization_url: None,
			token_url: None,
			redirect_url: None,
			client_id: String::new(),
			client_secret: TokenSecret::new(""),
			scope: ScopeSet::default(),
			client_auth_method: ClientAuthMethod::default(),
		}
	}

	/// Sets the display name.
	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();

		self
	}

	/// Sets the authorization endpoint.
	pub fn authorization_url(mut self, url: Url) -> Self {
		self.authorization_url = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_url(mut self, url: Url) -> Self {
		self.token_url = Some(url);

		self
	}

	/// Sets the registered redirect URI.
	pub fn redirect_url(mut self, url: Url) -> Self {
		self.redirect_url = Some(url);

		self
	}

	/// Sets the client identifier and secret.
	pub fn client_credentials(
		mut self,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Self {
		self.client_id = client_id.into();
		self.client_secret = TokenSecret::new(client_secret);

		self
	}

	/// Sets the scopes requested during the code exchange.
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Overrides the client authentication method.
	pub fn client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth_method = method;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<CloudFeed, CloudFeedError> {
		let authorization_url =
			self.authorization_url.ok_or(CloudFeedError::MissingAuthorizationUrl)?;
		let token_url = self.token_url.ok_or(CloudFeedError::MissingTokenUrl)?;
		let redirect_url = self.redirect_url.ok_or(CloudFeedError::MissingRedirectUrl)?;

		if self.client_id.is_empty() {
			return Err(CloudFeedError::MissingClientId);
		}

		validate_endpoint("authorization", &authorization_url)?;
		validate_endpoint("token", &token_url)?;
		validate_endpoint("redirect", &redirect_url)?;

		Ok(CloudFeed {
			id: self.id,
			name: self.name,
			authorization_url,
			token_url,
			redirect_url,
			client_id: self.client_id,
			client_secret: self.client_secret,
			scope: self.scope,
			client_auth_method: self.client_auth_method,
		})
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), CloudFeedError> {
	if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
		Err(CloudFeedError::UnsupportedEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(raw: &str) -> Url {
		Url::parse(raw).expect("Failed to parse fixture URL.")
	}

	#[test]
	fn builder_requires_endpoints_and_client() {
		let err = CloudFeed::builder(FeedId::new(1))
			.token_url(url("https://feed.example.com/token"))
			.build()
			.expect_err("Missing authorization endpoint should fail.");

		assert_eq!(err, CloudFeedError::MissingAuthorizationUrl);

		let err = CloudFeed::builder(FeedId::new(1))
			.authorization_url(url("https://feed.example.com/authorize"))
			.token_url(url("https://feed.example.com/token"))
			.redirect_url(url("https://app.example.com/callback"))
			.build()
			.expect_err("Missing client identifier should fail.");

		assert_eq!(err, CloudFeedError::MissingClientId);
	}

	#[test]
	fn builder_rejects_opaque_endpoints() {
		let err = CloudFeed::builder(FeedId::new(1))
			.authorization_url(url("https://feed.example.com/authorize"))
			.token_url(url("mailto:tokens@example.com"))
			.redirect_url(url("https://app.example.com/callback"))
			.client_credentials("client", "secret")
			.build()
			.expect_err("Opaque token endpoint should fail.");

		assert!(matches!(err, CloudFeedError::UnsupportedEndpoint { endpoint: "token", .. }));
	}

	#[test]
	fn builder_keeps_auth_method_and_scope() {
		let feed = CloudFeed::builder(FeedId::new(9))
			.authorization_url(url("https://feed.example.com/authorize"))
			.token_url(url("http://127.0.0.1:8080/token"))
			.redirect_url(url("https://app.example.com/callback"))
			.client_credentials("client", "secret")
			.scope(ScopeSet::new(["meter.read"]).expect("Scope fixture should be valid."))
			.client_auth_method(ClientAuthMethod::ClientSecretBasic)
			.build()
			.expect("Feed descriptor should build.");

		assert_eq!(feed.client_auth_method, ClientAuthMethod::ClientSecretBasic);
		assert_eq!(feed.scope.normalized(), "meter.read");
	}
}
