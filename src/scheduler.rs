//! Background worker that keeps every stored cloud-feed credential fresh.
//!
//! One worker serves the whole credential population. It arms a single timer for the
//! credential with the earliest expiry (minus the pre-renewal margin), refreshes that
//! credential when the timer fires, and re-evaluates. Creating or refreshing a credential
//! pushes a coalesced [`RefreshSignal`] so a newly sooner expiry re-arms the timer. Refreshes
//! are strictly serialized, and every wait also observes the cancellation token.
//!
//! The pauses taken before an overdue refresh and after a throttled one only observe
//! cancellation. A signal arriving during such a pause stays pending and is handled once the
//! overdue credential has been refreshed.
//!
//! Failures never escape the worker: a transient failure leaves the record untouched, so the
//! next evaluation sees it overdue and retries after the guard interval, or after the feed's
//! `Retry-After` hint when that is longer. A revoked grant is deleted by the refresher and
//! drops out of the schedule.

// crates.io
use tokio::{
	sync::{Notify, watch},
	task::JoinHandle,
	time,
};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	clock::{self, Clock, SystemClock},
	config::BrokerConfig,
	credential::{CloudFeedCredential, CredentialKey},
	store::CredentialStore,
};

/// Boxed future returned by [`CredentialRefresher::refresh`].
pub type RefreshFuture<'a> =
	Pin<Box<dyn Future<Output = Result<CloudFeedCredential>> + 'a + Send>>;

/// Performs a single refresh for the background worker.
///
/// Implementations own the terminal-failure policy: a permanently rejected grant must remove
/// the credential from the store, otherwise the worker keeps retrying it.
pub trait CredentialRefresher
where
	Self: Send + Sync,
{
	/// Refreshes the credential stored under `key`.
	fn refresh<'a>(&'a self, key: &'a CredentialKey) -> RefreshFuture<'a>;
}

/// Coalesced wake-up for the worker.
///
/// Notifications sent while the worker is busy collapse into one pending wake-up.
#[derive(Clone, Debug, Default)]
pub struct RefreshSignal(Arc<Notify>);
impl RefreshSignal {
	/// Creates a signal with no pending wake-up.
	pub fn new() -> Self {
		Self::default()
	}

	/// Asks the worker to re-evaluate the earliest expiry; never blocks.
	pub fn notify(&self) {
		self.0.notify_one();
	}

	async fn notified(&self) {
		self.0.notified().await
	}
}

/// What the worker is currently doing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchedulerState {
	/// Worker has not evaluated the store yet.
	Starting,
	/// No credential is stored; waiting for a signal.
	Idle,
	/// Timer armed for the earliest-expiring credential.
	Armed {
		/// Credential the timer belongs to.
		key: CredentialKey,
		/// Instant the timer fires.
		fires_at: OffsetDateTime,
	},
	/// Refresh in flight.
	Refreshing {
		/// Credential being refreshed.
		key: CredentialKey,
	},
	/// Worker exited after cancellation.
	Stopped,
}

/// Single background refresh worker.
pub struct RefreshScheduler {
	store: Arc<dyn CredentialStore>,
	refresher: Arc<dyn CredentialRefresher>,
	signal: RefreshSignal,
	clock: Arc<dyn Clock>,
	pre_renewal: Duration,
	guard_interval: Duration,
	state: watch::Sender<SchedulerState>,
}
impl RefreshScheduler {
	/// Creates a worker with the default pre-renewal margin and guard interval.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		refresher: Arc<dyn CredentialRefresher>,
		signal: RefreshSignal,
	) -> Self {
		let defaults = BrokerConfig::default();
		let (state, _) = watch::channel(SchedulerState::Starting);

		Self {
			store,
			refresher,
			signal,
			clock: Arc::new(SystemClock),
			pre_renewal: defaults.pre_renewal,
			guard_interval: defaults.guard_interval,
			state,
		}
	}

	/// Applies the timing settings from `config`.
	pub fn with_config(self, config: &BrokerConfig) -> Self {
		self.with_pre_renewal(config.pre_renewal).with_guard_interval(config.guard_interval)
	}

	/// Overrides how long before expiry a credential is refreshed.
	pub fn with_pre_renewal(mut self, pre_renewal: Duration) -> Self {
		self.pre_renewal = pre_renewal;

		self
	}

	/// Overrides the pause taken before refreshing an overdue credential.
	pub fn with_guard_interval(mut self, guard_interval: Duration) -> Self {
		self.guard_interval = guard_interval;

		self
	}

	/// Replaces the clock used to compute timer durations.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Handle that wakes this worker.
	pub fn signal(&self) -> RefreshSignal {
		self.signal.clone()
	}

	/// Subscribes to state transitions.
	pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
		self.state.subscribe()
	}

	/// Runs the worker on the current Tokio runtime until `cancel` fires.
	pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
		tokio::spawn(self.run(cancel))
	}

	/// Runs the worker loop until `cancel` fires.
	pub async fn run(self, cancel: CancellationToken) {
		tracing::info!(
			pre_renewal = %self.pre_renewal,
			guard_interval = %self.guard_interval,
			"Credential refresh worker started."
		);

		while self.cycle(&cancel).await {}

		self.publish(SchedulerState::Stopped);

		tracing::info!("Credential refresh worker stopped.");
	}

	/// Runs one evaluation; returns `false` once cancelled.
	async fn cycle(&self, cancel: &CancellationToken) -> bool {
		if cancel.is_cancelled() {
			return false;
		}

		let next = match self.store.first_to_expire().await {
			Ok(next) => next,
			Err(e) => {
				tracing::warn!(error = %e, "Failed to look up the first expiring credential.");

				return self.pause(cancel, self.guard_interval).await;
			},
		};
		let Some(credential) = next else {
			self.publish(SchedulerState::Idle);

			tracing::info!("No cloud feed credentials stored; waiting until one is added.");

			return tokio::select! {
				biased;
				_ = cancel.cancelled() => false,
				_ = self.signal.notified() => true,
			};
		};
		let key = credential.key();
		let fires_at = credential.refresh_due_at(self.pre_renewal);
		let wait = fires_at - self.clock.now();

		if wait.is_positive() {
			self.publish(SchedulerState::Armed { key, fires_at });

			tracing::info!(%key, %wait, "Waiting to refresh the first expiring credential.");

			tokio::select! {
				biased;
				_ = cancel.cancelled() => return false,
				_ = self.signal.notified() => {
					tracing::debug!("Credential set changed; re-checking the first expiring credential.");

					return true;
				},
				_ = time::sleep(clock::to_std(wait)) => {},
			}
		} else {
			tracing::debug!(%key, overdue = %(-wait), "Credential is overdue; pausing before refresh.");

			if !self.pause(cancel, self.guard_interval).await {
				return false;
			}
		}

		self.publish(SchedulerState::Refreshing { key });

		let result = tokio::select! {
			biased;
			_ = cancel.cancelled() => return false,
			result = self.refresher.refresh(&key) => result,
		};

		match result {
			Ok(refreshed) => {
				tracing::info!(%key, expires_at = %refreshed.expires_at, "Cloud feed credential refreshed.");

				true
			},
			Err(e) => {
				tracing::warn!(%key, error = %e, "Cloud feed credential refresh failed.");

				// The next cycle pauses `guard_interval` before retrying; wait out the rest of
				// any longer upstream hint here.
				match e.retry_after().filter(|hint| *hint > self.guard_interval) {
					Some(hint) => {
						tracing::debug!(%key, retry_after = %hint, "Honoring the feed's Retry-After hint.");

						self.pause(cancel, hint - self.guard_interval).await
					},
					None => true,
				}
			},
		}
	}

	async fn pause(&self, cancel: &CancellationToken, duration: Duration) -> bool {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => false,
			_ = time::sleep(clock::to_std(duration)) => true,
		}
	}

	fn publish(&self, state: SchedulerState) {
		self.state.send_replace(state);
	}
}
impl Debug for RefreshScheduler {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshScheduler")
			.field("pre_renewal", &self.pre_renewal)
			.field("guard_interval", &self.guard_interval)
			.field("state", &*self.state.borrow())
			.finish_non_exhaustive()
	}
}
