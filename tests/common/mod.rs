//! Fixtures shared by the integration tests.

#![allow(dead_code, unused_imports)]

// std
pub use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
pub use time::{Duration, OffsetDateTime, macros::datetime};
pub use tokio::sync::mpsc;
pub use tokio_util::sync::CancellationToken;
// self
pub use feed_credential_broker::{
	auth::{AccountId, DataSourceTypeId, FeedId, SubjectId},
	clock::Clock,
	credential::{CloudFeedCredential, CredentialKey},
	error::{ConfigError, Error, TokenError, TransientError},
	feed::{CloudFeed, StaticFeedDirectory},
	scheduler::{CredentialRefresher, RefreshFuture},
	store::{CredentialStore, MemoryStore},
	url::Url,
};

/// Feed every service fixture registers.
pub const FEED: FeedId = FeedId::new(1);
pub const CLIENT_ID: &str = "client-feed";
pub const CLIENT_SECRET: &str = "secret-feed";

pub fn key(account: u64) -> CredentialKey {
	CredentialKey::new(AccountId::new(account), FEED)
}

/// Builds a feed whose endpoints live under `base` (an httpmock server URL or any stub host).
pub fn feed_at(base: &str) -> CloudFeed {
	let url = |path: &str| {
		Url::parse(&format!("{base}{path}")).expect("Failed to parse mock feed endpoint URL.")
	};

	CloudFeed::builder(FEED)
		.name("mock-feed")
		.authorization_url(url("/authorize"))
		.token_url(url("/token"))
		.redirect_url(url("/callback"))
		.client_credentials(CLIENT_ID, CLIENT_SECRET)
		.build()
		.expect("Mock feed descriptor should build.")
}

pub fn directory(feed: CloudFeed) -> Arc<StaticFeedDirectory> {
	Arc::new(StaticFeedDirectory::new([feed]))
}

pub fn credential(key: CredentialKey, refresh: &str, expires_at: OffsetDateTime) -> CloudFeedCredential {
	CloudFeedCredential::builder(key.account, key.feed)
		.access_token(format!("access-{}", key.account))
		.refresh_token(refresh)
		.auth_grant_code("original-code")
		.issued_at(expires_at - Duration::hours(1))
		.expires_at(expires_at)
		.build()
		.expect("Credential fixture should build.")
}

pub async fn seed(store: &MemoryStore, record: CloudFeedCredential) {
	store.create(record).await.expect("Failed to seed credential into the store.");
}

/// Wall clock that follows Tokio's (possibly paused) timer.
#[derive(Clone, Debug)]
pub struct TokioClock {
	base: OffsetDateTime,
	start: tokio::time::Instant,
}
impl TokioClock {
	pub fn new(base: OffsetDateTime) -> Self {
		Self { base, start: tokio::time::Instant::now() }
	}

	pub fn elapsed(&self) -> Duration {
		Duration::try_from(self.start.elapsed()).expect("Elapsed test time should fit a Duration.")
	}
}
impl Clock for TokioClock {
	fn now(&self) -> OffsetDateTime {
		self.base + self.elapsed()
	}
}

/// How [`RecordingRefresher`] answers.
#[derive(Clone, Copy, Debug)]
pub enum RefreshBehavior {
	/// Pushes the expiry far into the future.
	Extend,
	/// Fails the first `n` calls with a timeout, then extends.
	FailFirst(usize),
	/// Fails the first call with a throttling answer carrying `Retry-After`, then extends.
	ThrottleFirst(Duration),
	/// Deletes the record and reports a revoked grant.
	Revoke,
}

/// One observed refresh.
#[derive(Clone, Copy, Debug)]
pub struct RefreshCall {
	pub key: CredentialKey,
	pub elapsed: Duration,
}

/// Refresher that records each call and mimics the credential service's store effects.
pub struct RecordingRefresher {
	store: Arc<MemoryStore>,
	clock: TokioClock,
	behavior: RefreshBehavior,
	calls: AtomicUsize,
	tx: mpsc::UnboundedSender<RefreshCall>,
}
impl RecordingRefresher {
	pub fn new(
		store: Arc<MemoryStore>,
		clock: TokioClock,
		behavior: RefreshBehavior,
	) -> (Self, mpsc::UnboundedReceiver<RefreshCall>) {
		let (tx, rx) = mpsc::unbounded_channel();

		(Self { store, clock, behavior, calls: AtomicUsize::new(0), tx }, rx)
	}
}
impl CredentialRefresher for RecordingRefresher {
	fn refresh<'a>(&'a self, key: &'a CredentialKey) -> RefreshFuture<'a> {
		Box::pin(async move {
			let call = self.calls.fetch_add(1, Ordering::SeqCst);

			self.tx
				.send(RefreshCall { key: *key, elapsed: self.clock.elapsed() })
				.expect("Test receiver should outlive the worker.");

			match self.behavior {
				RefreshBehavior::Revoke => {
					self.store.delete(key).await?;

					return Err(Error::InvalidGrant { reason: "invalid_grant".into() });
				},
				RefreshBehavior::FailFirst(n) if call < n =>
					return Err(TransientError::Timeout { timeout: Duration::seconds(30) }.into()),
				RefreshBehavior::ThrottleFirst(retry_after) if call == 0 =>
					return Err(TransientError::TokenEndpoint {
						message: "slow_down".into(),
						status: Some(429),
						retry_after: Some(retry_after),
					}
					.into()),
				_ => {},
			}

			let current = self.store.fetch(key).await?.ok_or(Error::CredentialNotFound { key: *key })?;
			let expected = current.refresh_token.as_ref().map(|secret| secret.expose().to_owned());
			let rotated = CloudFeedCredential {
				expires_at: self.clock.now() + Duration::hours(100),
				..current
			};

			self.store.compare_and_swap_refresh(key, expected.as_deref(), rotated.clone()).await?;

			Ok(rotated)
		})
	}
}

/// Asserts `actual` lands within one second after `expected`.
pub fn assert_near(actual: Duration, expected: Duration) {
	assert!(
		actual >= expected && actual < expected + Duration::seconds(1),
		"Expected about {expected}, got {actual}."
	);
}
