//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	credential::{CloudFeedCredential, CredentialKey},
	store::{self, CompareAndSwapOutcome, CredentialStore, StoreError, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<CredentialKey, CloudFeedCredential>>>;

/// Thread-safe storage backend that keeps records in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of stored credentials.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no credential is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn create_now(map: StoreMap, record: CloudFeedCredential) -> Result<(), StoreError> {
		let key = record.key();
		let mut guard = map.write();

		if guard.contains_key(&key) {
			return Err(StoreError::Duplicate { key });
		}

		guard.insert(key, record);

		Ok(())
	}

	fn cas_now(
		map: StoreMap,
		key: CredentialKey,
		expected_refresh: Option<&str>,
		replacement: CloudFeedCredential,
	) -> CompareAndSwapOutcome {
		let mut guard = map.write();
		let outcome = match guard.get(&key) {
			Some(existing)
				if store::refresh_matches(existing.refresh_token.as_ref(), expected_refresh) =>
				CompareAndSwapOutcome::Updated,
			Some(_) => CompareAndSwapOutcome::RefreshMismatch,
			None => CompareAndSwapOutcome::Missing,
		};

		if matches!(outcome, CompareAndSwapOutcome::Updated) {
			guard.insert(key, replacement);
		}

		outcome
	}
}
impl CredentialStore for MemoryStore {
	fn create(&self, record: CloudFeedCredential) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::create_now(map, record) })
	}

	fn fetch<'a>(&'a self, key: &'a CredentialKey) -> StoreFuture<'a, Option<CloudFeedCredential>> {
		let map = self.0.clone();
		let key = *key;

		Box::pin(async move { Ok(map.read().get(&key).cloned()) })
	}

	fn first_to_expire(&self) -> StoreFuture<'_, Option<CloudFeedCredential>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(store::earliest(map.read().values())) })
	}

	fn compare_and_swap_refresh<'a>(
		&'a self,
		key: &'a CredentialKey,
		expected_refresh: Option<&'a str>,
		replacement: CloudFeedCredential,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		let map = self.0.clone();
		let key = *key;

		Box::pin(async move { Ok(Self::cas_now(map, key, expected_refresh, replacement)) })
	}

	fn delete<'a>(&'a self, key: &'a CredentialKey) -> StoreFuture<'a, bool> {
		let map = self.0.clone();
		let key = *key;

		Box::pin(async move { Ok(map.write().remove(&key).is_some()) })
	}
}
