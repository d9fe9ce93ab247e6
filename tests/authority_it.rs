mod common;

// std
use std::{env, fs, path::PathBuf, process};
// self
use common::*;
use feed_credential_broker::{
	authority::{SigningKey, TokenAuthority, TokenKind},
	clock::ManualClock,
	config::BrokerConfig,
	guard::{BearerGuard, PrincipalStanding},
};

fn temp_dir(label: &str) -> PathBuf {
	env::temp_dir().join(format!(
		"feed_credential_broker_{label}_{}_{}",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos()
	))
}

#[test]
fn bootstrapped_key_survives_restarts() {
	let dir = temp_dir("key");
	let path = dir.join("nested").join("key.pem");
	let first = TokenAuthority::from_key_file(&path).expect("Missing key should be generated.");
	let token = first
		.sign(TokenKind::Admin, SubjectId::new(1), None)
		.expect("Admin token should be signed.");
	let pem = fs::read_to_string(&path).expect("Generated key should be persisted.");

	assert!(pem.contains("EC PRIVATE KEY"), "Key should be stored as SEC1 PEM.");

	let restarted = TokenAuthority::from_key_file(&path).expect("Persisted key should load.");
	let (kind, subject, claims) =
		restarted.parse(&token).expect("Tokens should stay valid across restarts.");

	assert_eq!(restarted.key_id(), first.key_id());
	assert_eq!(kind, TokenKind::Admin);
	assert_eq!(subject, SubjectId::new(1));
	assert!(claims.expires_at.is_none());

	let other = TokenAuthority::new(SigningKey::generate());

	assert_eq!(other.parse(&token), Err(TokenError::InvalidSignature));

	fs::remove_dir_all(&dir)
		.unwrap_or_else(|e| panic!("Failed to remove temporary key dir {}: {e}", dir.display()));
}

#[test]
fn config_points_the_authority_at_its_key() {
	let dir = temp_dir("config");
	let path = dir.join("key.pem");
	let config = BrokerConfig::default()
		.apply_env(|name| (name == "BROKER_KEY_PATH").then(|| path.display().to_string()))
		.expect("Key path override should apply.");
	let authority = config.token_authority().expect("Configured key should bootstrap.");

	assert!(path.exists());
	assert!(!authority.key_id().is_empty());

	fs::remove_dir_all(&dir)
		.unwrap_or_else(|e| panic!("Failed to remove temporary key dir {}: {e}", dir.display()));
}

#[test]
fn guard_enforces_kind_expiry_and_standing() {
	let clock = ManualClock::new(datetime!(2025-06-01 12:00 UTC));
	let authority = TokenAuthority::new(SigningKey::generate()).with_clock(Arc::new(clock.clone()));
	let device_or_account =
		BearerGuard::any_of(authority.clone(), [TokenKind::Device, TokenKind::Account]);
	let device = authority
		.sign(TokenKind::Device, SubjectId::new(40), Some(clock.now() + Duration::days(1)))
		.expect("Device token should be signed.");
	let admin = authority
		.sign(TokenKind::Admin, SubjectId::new(2), None)
		.expect("Admin token should be signed.");
	let auth = device_or_account
		.authorize(Some(&format!("Bearer {device}")))
		.expect("Device tokens should pass the double gate.");

	assert!(auth.is_kind(TokenKind::Device));
	assert_eq!(auth.subject, SubjectId::new(40));
	assert_eq!(
		device_or_account.authorize(Some(&format!("Bearer {admin}"))),
		Err(TokenError::WrongKind { found: TokenKind::Admin })
	);
	assert_eq!(device_or_account.authorize(None), Err(TokenError::MissingBearer));
	assert_eq!(device_or_account.authorize(Some(&device)), Err(TokenError::MissingBearer));

	let admin_auth = authority.parse_to_authorization(&admin).expect("Admin token should parse.");
	let mut standing = PrincipalStanding::new(clock.now() - Duration::hours(1));

	assert_eq!(standing.check(&admin_auth, clock.now()), Ok(()));

	clock.advance(Duration::minutes(5));
	standing.reactivate(clock.now());

	assert_eq!(standing.check(&admin_auth, clock.now()), Err(TokenError::Invalidated));

	let reissued = authority.sign_authorization(&admin_auth).expect("Token should be re-issued.");
	let reissued = authority.parse_to_authorization(&reissued).expect("Re-issued token should parse.");

	assert_eq!(standing.check(&reissued, clock.now()), Ok(()));

	let expired_at = clock.now() - Duration::seconds(1);

	assert_eq!(
		standing.with_expiry(expired_at).check(&reissued, clock.now()),
		Err(TokenError::PrincipalExpired { expired_at })
	);

	clock.advance(Duration::days(2));

	assert!(matches!(
		device_or_account.authorize(Some(&format!("Bearer {device}"))),
		Err(TokenError::Expired { .. })
	));
}
