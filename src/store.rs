//! Storage contracts and built-in store implementations for cloud-feed credentials.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	credential::{CloudFeedCredential, CredentialKey},
};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by credential stores.
///
/// Every operation touches a single record atomically; the refresh path relies on
/// [`compare_and_swap_refresh`](CredentialStore::compare_and_swap_refresh) so a manual refresh
/// and the background worker never overwrite each other's rotation.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Inserts a new record; fails with [`StoreError::Duplicate`] if the key is taken.
	fn create(&self, record: CloudFeedCredential) -> StoreFuture<'_, ()>;

	/// Fetches the record stored under `key`, if present.
	fn fetch<'a>(&'a self, key: &'a CredentialKey) -> StoreFuture<'a, Option<CloudFeedCredential>>;

	/// Returns the record with the globally earliest expiry, if any record exists.
	fn first_to_expire(&self) -> StoreFuture<'_, Option<CloudFeedCredential>>;

	/// Replaces the record if its refresh token still equals `expected_refresh`.
	fn compare_and_swap_refresh<'a>(
		&'a self,
		key: &'a CredentialKey,
		expected_refresh: Option<&'a str>,
		replacement: CloudFeedCredential,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;

	/// Removes the record stored under `key`, returning whether one existed.
	fn delete<'a>(&'a self, key: &'a CredentialKey) -> StoreFuture<'a, bool>;
}

/// Result of a refresh-token compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The refresh secret matched the expected value and the record was updated.
	Updated,
	/// The record exists but the expected refresh secret did not match.
	RefreshMismatch,
	/// No record matched the provided key.
	Missing,
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// A record already exists for the key.
	#[error("Duplicate credential for {key}.")]
	Duplicate {
		/// Key that collided.
		key: CredentialKey,
	},
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

pub(crate) fn refresh_matches(current: Option<&TokenSecret>, expected: Option<&str>) -> bool {
	match (current.map(TokenSecret::expose), expected) {
		(None, None) => true,
		(Some(cur), Some(exp)) => cur == exp,
		_ => false,
	}
}

/// Earliest expiry wins; ties go to the smaller key so the choice is stable.
pub(crate) fn earliest<'a>(
	records: impl Iterator<Item = &'a CloudFeedCredential>,
) -> Option<CloudFeedCredential> {
	records.min_by_key(|record| (record.expires_at, record.key())).cloned()
}
