//! Exchanges an authorization code against a mock cloud feed, then lets the background worker
//! rotate the credential before it expires.

// std
use std::{env, sync::Arc};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;
// self
use feed_credential_broker::{
	auth::{AccountId, FeedId, SubjectId},
	authority::TokenKind,
	config::BrokerConfig,
	credential::CredentialKey,
	feed::CloudFeed,
	scheduler::{RefreshScheduler, SchedulerState},
	service::ReqwestCredentialService,
	store::MemoryStore,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"refresh_token\":\"demo-refresh\",\"token_type\":\"bearer\",\"expires_in\":60}",
			);
		})
		.await;
	let feed = CloudFeed::builder(FeedId::new(1))
		.name("demo-feed")
		.authorization_url(Url::parse(&server.url("/authorize"))?)
		.token_url(Url::parse(&server.url("/token"))?)
		.redirect_url(Url::parse(&server.url("/callback"))?)
		.client_credentials("demo-client", "demo-secret")
		.build()?;
	let config = BrokerConfig {
		key_path: env::temp_dir().join("feed_credential_broker_demo").join("key.pem"),
		pre_renewal: Duration::seconds(58),
		guard_interval: Duration::seconds(1),
		feeds: vec![feed],
		..Default::default()
	};

	config.validate()?;

	let authority = config.token_authority()?;
	let device_token = authority.sign(TokenKind::Device, SubjectId::new(7), None)?;

	println!("Device bearer token: {device_token}.");

	let store = Arc::new(MemoryStore::default());
	let service = ReqwestCredentialService::from_config(
		&config,
		store.clone(),
		Arc::new(config.feed_directory()),
	)?;
	let scheduler =
		RefreshScheduler::new(store, Arc::new(service.clone()), service.signal()).with_config(&config);
	let mut state = scheduler.subscribe();
	let cancel = CancellationToken::new();
	let worker = scheduler.spawn(cancel.clone());
	let created = service.create(AccountId::new(42), FeedId::new(1), "demo-code").await?;

	println!("Credential expires at {}.", created.expires_at);

	let first_fire = created.expires_at - config.pre_renewal;

	state
		.wait_for(|s| matches!(s, SchedulerState::Armed { fires_at, .. } if *fires_at > first_fire))
		.await?;

	let rotated = service.find(CredentialKey::new(AccountId::new(42), FeedId::new(1))).await?;

	println!("Worker rotated the credential; new expiry {}.", rotated.expires_at);

	println!("Background refreshes so far: {}.", service.refresh_metrics().successes());

	cancel.cancel();
	worker.await?;

	Ok(())
}
