//! Refresh-token rotation with singleflight guards, CAS persistence, and revocation cleanup.
//!
//! [`CredentialService::refresh`] serves both request handlers and the background worker. Each
//! call takes the per-key guard, performs a `grant_type=refresh_token` call, and persists the
//! rotation through [`CredentialStore::compare_and_swap_refresh`](crate::store::CredentialStore).
//! An `invalid_grant` answer deletes the record: the refresh token can never work again. Every
//! other failure leaves the record untouched, so the worker sees it overdue and retries.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	credential::{CloudFeedCredential, CredentialKey},
	error::ConfigError,
	http::TokenHttpClient,
	oauth::{BasicFacade, OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	scheduler::{CredentialRefresher, RefreshFuture},
	service::CredentialService,
	store::CompareAndSwapOutcome,
};

impl<C, M> CredentialService<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Rotates the tokens stored for `key` and returns the persisted record.
	///
	/// Concurrent calls for the same key hit the feed once: a caller that waited on the guard
	/// while another rotated the refresh token returns the record that caller stored.
	pub async fn refresh(&self, key: CredentialKey) -> Result<CloudFeedCredential> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh", &key);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.refresh_metrics.record_attempt();

		let result = span
			.instrument(async move {
				let observed = self.store.fetch(&key).await?.map(|record| record.refresh_token);
				let guard = self.flow_guard(&key);
				let _singleflight = guard.lock().await;

				self.refresh_locked(key, observed).await
			})
			.await;

		match &result {
			Ok(_) => {
				self.refresh_metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			Err(_) => {
				self.refresh_metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	async fn refresh_locked(
		&self,
		key: CredentialKey,
		observed: Option<Option<TokenSecret>>,
	) -> Result<CloudFeedCredential> {
		let current = self.store.fetch(&key).await?.ok_or(Error::CredentialNotFound { key })?;

		if observed.is_some_and(|seen| seen != current.refresh_token) {
			tracing::debug!(%key, "Credential was rotated while waiting; reusing the stored record.");

			return Ok(current);
		}

		let expected_refresh = current
			.usable_refresh_token()
			.map(|secret| secret.expose().to_owned())
			.ok_or(ConfigError::MissingRefreshToken)?;
		let descriptor = self.feed(&key)?;
		let facade = <BasicFacade<C, M>>::from_feed(
			&descriptor,
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)?;
		let grant = match self
			.with_deadline(facade.refresh_token(self.strategy.as_ref(), &expected_refresh))
			.await
		{
			Ok(grant) => grant,
			Err(e @ Error::InvalidGrant { .. }) => {
				tracing::warn!(%key, error = %e, "Feed revoked the refresh token; deleting credential.");

				self.store.delete(&key).await?;
				self.refresh_metrics.record_revocation();
				self.signal.notify();

				return Err(e);
			},
			Err(e) => return Err(e),
		};
		let mut builder = CloudFeedCredential::builder(key.account, key.feed)
			.issued_at(self.clock.now())
			.expires_in(grant.expires_in)
			.access_token(grant.access_token.expose())
			.refresh_token(
				grant.refresh_token.as_ref().map_or(expected_refresh.as_str(), |s| s.expose()),
			);

		if let Some(code) = &current.auth_grant_code {
			builder = builder.auth_grant_code(code.expose());
		}

		let updated = builder.build().map_err(ConfigError::from)?;
		let outcome = self
			.store
			.compare_and_swap_refresh(&key, Some(expected_refresh.as_str()), updated.clone())
			.await?;
		let record = match outcome {
			CompareAndSwapOutcome::Updated => updated,
			CompareAndSwapOutcome::RefreshMismatch => {
				tracing::debug!(%key, "Refresh token rotated concurrently; keeping the stored record.");

				self.store.fetch(&key).await?.ok_or(Error::CredentialNotFound { key })?
			},
			CompareAndSwapOutcome::Missing => return Err(Error::CredentialNotFound { key }),
		};

		tracing::debug!(%key, expires_at = %record.expires_at, "Cloud feed credential rotated.");

		self.signal.notify();

		Ok(record)
	}
}
impl<C, M> CredentialRefresher for CredentialService<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn refresh<'a>(&'a self, key: &'a CredentialKey) -> RefreshFuture<'a> {
		Box::pin(CredentialService::refresh(self, *key))
	}
}
