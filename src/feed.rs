//! Cloud feed descriptors (data), lookup (directory), and error classification (strategy).
//!
//! A [`CloudFeed`] is a third-party OAuth 2.0 data source that accounts authorize once; the
//! broker then holds one credential per account/feed pair. [`FeedDirectory`] is the read-only
//! view of configured feeds the credential service consults, and [`FeedStrategy`] decides which
//! provider errors are terminal.

pub mod builder;
pub mod strategy;

pub use builder::*;
pub use strategy::*;

// self
use crate::{
	_prelude::*,
	auth::{FeedId, ScopeSet, TokenSecret},
};

/// How the client proves its identity at the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
}

/// Immutable descriptor of a configured cloud feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudFeed {
	/// Feed identifier.
	pub id: FeedId,
	/// Human-readable feed name used in logs.
	pub name: String,
	/// Authorization endpoint the account is redirected to.
	pub authorization_url: Url,
	/// Token endpoint used for code exchanges and refreshes.
	pub token_url: Url,
	/// Redirect URI registered with the provider.
	pub redirect_url: Url,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// OAuth 2.0 client secret.
	pub client_secret: TokenSecret,
	/// Scopes requested during the code exchange.
	#[serde(default)]
	pub scope: ScopeSet,
	/// Client authentication method for the token endpoint.
	#[serde(default)]
	pub client_auth_method: ClientAuthMethod,
}
impl CloudFeed {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: FeedId) -> CloudFeedBuilder {
		CloudFeedBuilder::new(id)
	}
}

/// Read-only lookup of configured feeds.
pub trait FeedDirectory
where
	Self: Send + Sync,
{
	/// Returns the feed registered under `id`.
	fn feed(&self, id: FeedId) -> Option<CloudFeed>;
}

/// In-memory [`FeedDirectory`] populated at startup.
#[derive(Clone, Debug, Default)]
pub struct StaticFeedDirectory(Arc<RwLock<HashMap<FeedId, CloudFeed>>>);
impl StaticFeedDirectory {
	/// Builds a directory from descriptors; later duplicates replace earlier ones.
	pub fn new(feeds: impl IntoIterator<Item = CloudFeed>) -> Self {
		let map = feeds.into_iter().map(|feed| (feed.id, feed)).collect();

		Self(Arc::new(RwLock::new(map)))
	}

	/// Registers or replaces a feed.
	pub fn insert(&self, feed: CloudFeed) {
		self.0.write().insert(feed.id, feed);
	}

	/// Removes a feed, returning its descriptor.
	pub fn remove(&self, id: FeedId) -> Option<CloudFeed> {
		self.0.write().remove(&id)
	}
}
impl FeedDirectory for StaticFeedDirectory {
	fn feed(&self, id: FeedId) -> Option<CloudFeed> {
		self.0.read().get(&id).cloned()
	}
}
