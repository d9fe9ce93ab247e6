//! Credential lifecycle service: authorization-code exchange, lookup, refresh, and removal.
//!
//! [`CredentialService`] owns the HTTP transport, the credential store, and the feed directory.
//! Every mutation pushes the shared [`RefreshSignal`] so the background worker re-evaluates the
//! earliest expiry. Refreshes take a per-key singleflight guard, so a manual refresh and the
//! worker never rotate the same refresh token twice.

mod exchange;
mod refresh;

pub use refresh::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	clock::{self, Clock, SystemClock},
	config::BrokerConfig,
	credential::{CloudFeedCredential, CredentialKey},
	error::{ConfigError, TransientError},
	feed::{CloudFeed, DefaultFeedStrategy, FeedDirectory, FeedStrategy},
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	scheduler::RefreshSignal,
	store::CredentialStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Service specialized for the crate's default reqwest transport stack.
pub type ReqwestCredentialService = CredentialService<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Creates, refreshes, and removes cloud-feed credentials.
pub struct CredentialService<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	store: Arc<dyn CredentialStore>,
	feeds: Arc<dyn FeedDirectory>,
	strategy: Arc<dyn FeedStrategy>,
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	clock: Arc<dyn Clock>,
	request_timeout: Duration,
	signal: RefreshSignal,
	refresh_metrics: Arc<RefreshMetrics>,
	flow_guards: Arc<Mutex<HashMap<CredentialKey, Arc<AsyncMutex<()>>>>>,
}
impl<C, M> CredentialService<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a service that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		store: Arc<dyn CredentialStore>,
		feeds: Arc<dyn FeedDirectory>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			store,
			feeds,
			strategy: Arc::new(DefaultFeedStrategy),
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			clock: Arc::new(SystemClock),
			request_timeout: BrokerConfig::default().request_timeout,
			signal: RefreshSignal::default(),
			refresh_metrics: Default::default(),
			flow_guards: Default::default(),
		}
	}

	/// Replaces the strategy that classifies provider errors.
	pub fn with_strategy(mut self, strategy: Arc<dyn FeedStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Replaces the clock used to stamp issued credentials.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Overrides the deadline applied to every token endpoint call.
	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Shares an existing worker signal instead of the service's own.
	pub fn with_signal(mut self, signal: RefreshSignal) -> Self {
		self.signal = signal;

		self
	}

	/// Signal pushed after every mutation; hand it to the refresh worker.
	pub fn signal(&self) -> RefreshSignal {
		self.signal.clone()
	}

	/// Refresh counters shared by manual and background refreshes.
	pub fn refresh_metrics(&self) -> Arc<RefreshMetrics> {
		self.refresh_metrics.clone()
	}

	/// Returns the credential stored for `key`.
	pub async fn find(&self, key: CredentialKey) -> Result<CloudFeedCredential> {
		self.store.fetch(&key).await?.ok_or(Error::CredentialNotFound { key })
	}

	/// Removes the credential stored for `key`.
	pub async fn delete(&self, key: CredentialKey) -> Result<()> {
		if !self.store.delete(&key).await? {
			return Err(Error::CredentialNotFound { key });
		}

		tracing::info!(%key, "Cloud feed credential deleted.");

		self.signal.notify();

		Ok(())
	}

	fn feed(&self, key: &CredentialKey) -> Result<CloudFeed> {
		self.feeds.feed(key.feed).ok_or_else(|| ConfigError::UnknownFeed { feed: key.feed }.into())
	}

	fn flow_guard(&self, key: &CredentialKey) -> Arc<AsyncMutex<()>> {
		let mut guards = self.flow_guards.lock();

		guards.entry(*key).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	/// Bounds a token endpoint call by the configured request timeout.
	async fn with_deadline<T, F>(&self, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		let timeout = self.request_timeout;

		tokio::time::timeout(clock::to_std(timeout), fut)
			.await
			.map_err(|_| Error::from(TransientError::Timeout { timeout }))?
	}
}
#[cfg(feature = "reqwest")]
impl CredentialService<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a service backed by a default reqwest transport.
	pub fn new(store: Arc<dyn CredentialStore>, feeds: Arc<dyn FeedDirectory>) -> Self {
		Self::with_http_client(
			store,
			feeds,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}

	/// Creates a service whose transport and deadlines follow `config`.
	pub fn from_config(
		config: &BrokerConfig,
		store: Arc<dyn CredentialStore>,
		feeds: Arc<dyn FeedDirectory>,
	) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(clock::to_std(config.request_timeout))?;

		Ok(Self::with_http_client(store, feeds, http_client, Arc::new(ReqwestTransportErrorMapper))
			.with_request_timeout(config.request_timeout))
	}
}
impl<C, M> Clone for CredentialService<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			store: self.store.clone(),
			feeds: self.feeds.clone(),
			strategy: self.strategy.clone(),
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			clock: self.clock.clone(),
			request_timeout: self.request_timeout,
			signal: self.signal.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			flow_guards: self.flow_guards.clone(),
		}
	}
}
impl<C, M> Debug for CredentialService<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialService")
			.field("request_timeout", &self.request_timeout)
			.field("refresh_metrics", &self.refresh_metrics)
			.finish_non_exhaustive()
	}
}
