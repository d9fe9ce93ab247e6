mod common;

// self
use common::*;
use feed_credential_broker::scheduler::{RefreshScheduler, RefreshSignal, SchedulerState};

struct Fixture {
	store: Arc<MemoryStore>,
	clock: TokioClock,
	signal: RefreshSignal,
	calls: mpsc::UnboundedReceiver<RefreshCall>,
	refresher: Option<RecordingRefresher>,
}
impl Fixture {
	fn new(behavior: RefreshBehavior) -> Self {
		let store = Arc::new(MemoryStore::default());
		let clock = TokioClock::new(datetime!(2025-03-01 08:00 UTC));
		let (refresher, calls) = RecordingRefresher::new(store.clone(), clock.clone(), behavior);

		Self { store, clock, signal: RefreshSignal::new(), calls, refresher: Some(refresher) }
	}

	async fn insert(&self, account: u64, expires_in: Duration) -> CredentialKey {
		let key = key(account);

		seed(&self.store, credential(key, &format!("refresh-{account}"), self.clock.now() + expires_in))
			.await;

		key
	}

	fn scheduler(&mut self, pre_renewal: Duration) -> RefreshScheduler {
		let refresher = self.refresher.take().expect("Fixture builds a single scheduler.");

		RefreshScheduler::new(self.store.clone(), Arc::new(refresher), self.signal.clone())
			.with_clock(Arc::new(self.clock.clone()))
			.with_pre_renewal(pre_renewal)
	}

	async fn next_call(&mut self) -> RefreshCall {
		self.calls.recv().await.expect("Worker should keep refreshing.")
	}
}

#[tokio::test(start_paused = true)]
async fn earliest_expiry_is_refreshed_first_regardless_of_insertion_order() {
	let mut fx = Fixture::new(RefreshBehavior::Extend);
	let five = fx.insert(5, Duration::hours(5)).await;
	let one = fx.insert(1, Duration::hours(1)).await;
	let three = fx.insert(3, Duration::hours(3)).await;
	let cancel = CancellationToken::new();
	let handle = fx.scheduler(Duration::minutes(30)).spawn(cancel.clone());
	let first = fx.next_call().await;

	assert_eq!(first.key, one);
	assert_near(first.elapsed, Duration::minutes(30));

	let second = fx.next_call().await;

	assert_eq!(second.key, three);
	assert_near(second.elapsed, Duration::minutes(150));

	let third = fx.next_call().await;

	assert_eq!(third.key, five);
	assert_near(third.elapsed, Duration::minutes(270));

	cancel.cancel();
	handle.await.expect("Worker task should not panic.");
}

#[tokio::test(start_paused = true)]
async fn sooner_insertion_rearms_the_timer() {
	let mut fx = Fixture::new(RefreshBehavior::Extend);
	let later = fx.insert(3, Duration::hours(3)).await;
	let scheduler = fx.scheduler(Duration::minutes(5));
	let mut state = scheduler.subscribe();
	let cancel = CancellationToken::new();
	let handle = scheduler.spawn(cancel.clone());

	state
		.wait_for(|s| matches!(s, SchedulerState::Armed { key, .. } if *key == later))
		.await
		.expect("Worker should arm a timer for the only credential.");

	let sooner = fx.insert(10, Duration::minutes(10)).await;

	fx.signal.notify();

	let first = fx.next_call().await;

	assert_eq!(first.key, sooner, "The sooner credential must be refreshed first.");
	assert_near(first.elapsed, Duration::minutes(5));

	cancel.cancel();
	handle.await.expect("Worker task should not panic.");
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_after_the_guard_interval() {
	let mut fx = Fixture::new(RefreshBehavior::FailFirst(1));
	let only = fx.insert(1, Duration::hours(1)).await;
	let cancel = CancellationToken::new();
	let handle = fx
		.scheduler(Duration::minutes(30))
		.with_guard_interval(Duration::seconds(10))
		.spawn(cancel.clone());
	let failed = fx.next_call().await;
	let retried = fx.next_call().await;

	assert_eq!(failed.key, only);
	assert_eq!(retried.key, only);
	assert_near(retried.elapsed - failed.elapsed, Duration::seconds(10));

	let stored = fx
		.store
		.fetch(&only)
		.await
		.expect("Store lookup should succeed.")
		.expect("Credential should survive transient failures.");

	assert!(stored.expires_at > fx.clock.now() + Duration::hours(99));

	cancel.cancel();
	handle.await.expect("Worker task should not panic.");
}

#[tokio::test(start_paused = true)]
async fn retry_after_hint_stretches_the_backoff() {
	let mut fx = Fixture::new(RefreshBehavior::ThrottleFirst(Duration::minutes(2)));
	let only = fx.insert(1, Duration::hours(1)).await;
	let cancel = CancellationToken::new();
	let handle = fx
		.scheduler(Duration::minutes(30))
		.with_guard_interval(Duration::seconds(10))
		.spawn(cancel.clone());
	let throttled = fx.next_call().await;
	let retried = fx.next_call().await;

	assert_eq!(throttled.key, only);
	assert_eq!(retried.key, only);
	assert_near(retried.elapsed - throttled.elapsed, Duration::minutes(2));

	cancel.cancel();
	handle.await.expect("Worker task should not panic.");
}

#[tokio::test(start_paused = true)]
async fn oversized_pre_renewal_treats_credentials_as_overdue() {
	let mut fx = Fixture::new(RefreshBehavior::Extend);
	let only = fx.insert(1, Duration::hours(1)).await;
	let cancel = CancellationToken::new();
	let handle = fx
		.scheduler(Duration::seconds(9_000_000_000_000))
		.with_guard_interval(Duration::seconds(10))
		.spawn(cancel.clone());
	let first = fx.next_call().await;
	let second = fx.next_call().await;

	assert_eq!(first.key, only);
	assert_near(first.elapsed, Duration::seconds(10));
	assert_near(second.elapsed, Duration::seconds(20));
	assert!(!handle.is_finished(), "Worker should keep running.");

	cancel.cancel();
	handle.await.expect("Worker task should not panic.");
}

#[tokio::test(start_paused = true)]
async fn revoked_credentials_are_never_retried() {
	let mut fx = Fixture::new(RefreshBehavior::Revoke);

	fx.insert(1, Duration::hours(1)).await;

	let scheduler = fx.scheduler(Duration::minutes(30));
	let mut state = scheduler.subscribe();
	let cancel = CancellationToken::new();
	let handle = scheduler.spawn(cancel.clone());

	fx.next_call().await;
	state
		.wait_for(|s| matches!(s, SchedulerState::Idle))
		.await
		.expect("Worker should go idle once the store is empty.");
	tokio::time::sleep(StdDuration::from_secs(48 * 3_600)).await;

	assert!(fx.calls.try_recv().is_err(), "A deleted credential must not be refreshed again.");
	assert!(fx.store.is_empty());

	cancel.cancel();
	handle.await.expect("Worker task should not panic.");
}

#[tokio::test(start_paused = true)]
async fn idle_worker_wakes_on_signal() {
	let mut fx = Fixture::new(RefreshBehavior::Extend);
	let scheduler = fx.scheduler(Duration::minutes(30));
	let mut state = scheduler.subscribe();
	let cancel = CancellationToken::new();
	let handle = scheduler.spawn(cancel.clone());

	state
		.wait_for(|s| matches!(s, SchedulerState::Idle))
		.await
		.expect("Empty store should leave the worker idle.");

	let added = fx.insert(2, Duration::hours(2)).await;

	fx.signal.notify();
	state
		.wait_for(|s| matches!(s, SchedulerState::Armed { key, .. } if *key == added))
		.await
		.expect("Signal should wake the idle worker.");
	cancel.cancel();
	handle.await.expect("Worker task should not panic.");

	assert_eq!(*state.borrow(), SchedulerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn signals_during_the_guard_pause_wait_for_the_overdue_refresh() {
	let mut fx = Fixture::new(RefreshBehavior::Extend);
	let overdue = fx.insert(1, Duration::hours(-1)).await;
	let cancel = CancellationToken::new();
	let handle = fx
		.scheduler(Duration::minutes(30))
		.with_guard_interval(Duration::minutes(1))
		.spawn(cancel.clone());

	for _ in 0..8 {
		tokio::task::yield_now().await;
	}

	let sooner = fx.insert(2, Duration::hours(-2)).await;

	fx.signal.notify();

	let first = fx.next_call().await;
	let second = fx.next_call().await;

	assert_eq!(first.key, overdue, "The paused refresh should not be preempted.");
	assert_near(first.elapsed, Duration::minutes(1));
	assert_eq!(second.key, sooner);
	assert_near(second.elapsed, Duration::minutes(2));

	cancel.cancel();
	handle.await.expect("Worker task should not panic.");
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_the_guard_sleep() {
	let mut fx = Fixture::new(RefreshBehavior::Extend);

	fx.insert(1, Duration::hours(-1)).await;

	let scheduler = fx.scheduler(Duration::minutes(30)).with_guard_interval(Duration::hours(1));
	let state = scheduler.subscribe();
	let cancel = CancellationToken::new();
	let handle = scheduler.spawn(cancel.clone());

	for _ in 0..8 {
		tokio::task::yield_now().await;
	}

	cancel.cancel();
	tokio::time::timeout(StdDuration::from_secs(1), handle)
		.await
		.expect("Worker should stop long before the guard interval ends.")
		.expect("Worker task should not panic.");

	assert!(fx.calls.try_recv().is_err(), "Cancelled worker must not refresh.");
	assert_eq!(*state.borrow(), SchedulerState::Stopped);
}
