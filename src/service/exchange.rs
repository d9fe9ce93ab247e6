//! First-time authorization-code exchange that creates a stored credential.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, FeedId},
	credential::{CloudFeedCredential, CredentialKey},
	error::ConfigError,
	http::TokenHttpClient,
	oauth::{BasicFacade, OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	service::CredentialService,
	store::StoreError,
};

impl<C, M> CredentialService<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Exchanges `code` at the feed's token endpoint and stores the resulting credential.
	///
	/// Provider errors follow the refresh taxonomy, but nothing is deleted because no record
	/// exists yet. A second credential for the same account/feed pair is rejected with
	/// [`Error::DuplicateCredential`].
	pub async fn create(
		&self,
		account: AccountId,
		feed: FeedId,
		code: &str,
	) -> Result<CloudFeedCredential> {
		const KIND: FlowKind = FlowKind::Exchange;

		let key = CredentialKey::new(account, feed);
		let span = FlowSpan::new(KIND, "create", &key);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let descriptor = self.feed(&key)?;
				let facade = <BasicFacade<C, M>>::from_feed(
					&descriptor,
					self.http_client.clone(),
					self.transport_mapper.clone(),
				)?;
				let grant = self
					.with_deadline(facade.exchange_authorization_code(self.strategy.as_ref(), code))
					.await?;
				let mut builder = CloudFeedCredential::builder(account, feed)
					.issued_at(self.clock.now())
					.expires_in(grant.expires_in)
					.access_token(grant.access_token.expose())
					.auth_grant_code(code);

				if let Some(refresh) = &grant.refresh_token {
					builder = builder.refresh_token(refresh.expose());
				}

				let record = builder.build().map_err(ConfigError::from)?;

				self.store.create(record.clone()).await.map_err(|e| match e {
					StoreError::Duplicate { key } => Error::DuplicateCredential { key },
					other => other.into(),
				})?;

				if record.refresh_token.is_none() {
					tracing::warn!(
						%key,
						"Feed issued no refresh token; the credential cannot be renewed."
					);
				}

				tracing::info!(%key, expires_at = %record.expires_at, "Cloud feed credential created.");

				self.signal.notify();

				Ok(record)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
