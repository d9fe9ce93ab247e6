//! Simple file-backed [`CredentialStore`] for single-node deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	credential::{CloudFeedCredential, CredentialKey},
	store::{self, CompareAndSwapOutcome, CredentialStore, StoreError, StoreFuture},
};

/// Persists credentials to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<CredentialKey, CloudFeedCredential>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		tracing::debug!(path = %path.display(), records = snapshot.len(), "Credential file store opened.");

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	fn load_snapshot(path: &Path) -> Result<HashMap<CredentialKey, CloudFeedCredential>, StoreError> {
		if !path.exists() {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(HashMap::new());
		}

		let records: Vec<CloudFeedCredential> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(records.into_iter().map(|record| (record.key(), record)).collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(
		&self,
		contents: &HashMap<CredentialKey, CloudFeedCredential>,
	) -> Result<(), StoreError> {
		let mut snapshot: Vec<_> = contents.values().collect();

		snapshot.sort_by_key(|record| record.key());

		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl CredentialStore for FileStore {
	fn create(&self, record: CloudFeedCredential) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let key = record.key();
			let mut guard = self.inner.write();

			if guard.contains_key(&key) {
				return Err(StoreError::Duplicate { key });
			}

			guard.insert(key, record);

			if let Err(e) = self.persist_locked(&guard) {
				guard.remove(&key);

				return Err(e);
			}

			Ok(())
		})
	}

	fn fetch<'a>(&'a self, key: &'a CredentialKey) -> StoreFuture<'a, Option<CloudFeedCredential>> {
		Box::pin(async move { Ok(self.inner.read().get(key).cloned()) })
	}

	fn first_to_expire(&self) -> StoreFuture<'_, Option<CloudFeedCredential>> {
		Box::pin(async move { Ok(store::earliest(self.inner.read().values())) })
	}

	fn compare_and_swap_refresh<'a>(
		&'a self,
		key: &'a CredentialKey,
		expected_refresh: Option<&'a str>,
		replacement: CloudFeedCredential,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let outcome = match guard.get(key) {
				Some(existing)
					if store::refresh_matches(existing.refresh_token.as_ref(), expected_refresh) =>
					CompareAndSwapOutcome::Updated,
				Some(_) => CompareAndSwapOutcome::RefreshMismatch,
				None => CompareAndSwapOutcome::Missing,
			};

			if matches!(outcome, CompareAndSwapOutcome::Updated) {
				let previous = guard.insert(*key, replacement);

				if let Err(e) = self.persist_locked(&guard) {
					if let Some(previous) = previous {
						guard.insert(*key, previous);
					}

					return Err(e);
				}
			}

			Ok(outcome)
		})
	}

	fn delete<'a>(&'a self, key: &'a CredentialKey) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let Some(removed) = guard.remove(key) else {
				return Ok(false);
			};

			if let Err(e) = self.persist_locked(&guard) {
				guard.insert(*key, removed);

				return Err(e);
			}

			Ok(true)
		})
	}
}
