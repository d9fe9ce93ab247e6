//! Runtime configuration for the broker: key location, refresh timing, and registered feeds.
//!
//! [`BrokerConfig`] deserializes from JSON (durations as whole seconds) and can be overlaid
//! from `BROKER_*` environment variables so the pre-renewal margin stays tunable without a
//! rebuild.

// std
use std::path::{Path, PathBuf};
// self
use crate::{
	_prelude::*,
	authority::TokenAuthority,
	error::ConfigError,
	feed::{CloudFeed, StaticFeedDirectory},
};

/// Environment variable overriding [`BrokerConfig::key_path`].
pub const ENV_KEY_PATH: &str = "BROKER_KEY_PATH";
/// Environment variable overriding [`BrokerConfig::pre_renewal`] (seconds).
pub const ENV_PRE_RENEWAL_SECS: &str = "BROKER_PRE_RENEWAL_SECS";
/// Environment variable overriding [`BrokerConfig::guard_interval`] (seconds).
pub const ENV_GUARD_INTERVAL_SECS: &str = "BROKER_GUARD_INTERVAL_SECS";
/// Environment variable overriding [`BrokerConfig::request_timeout`] (seconds).
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "BROKER_REQUEST_TIMEOUT_SECS";

/// Largest accepted [`BrokerConfig::pre_renewal`].
pub const MAX_PRE_RENEWAL: Duration = Duration::days(365);

/// Broker settings shared by the token authority, credential service, and refresh worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
	/// PEM file holding the P-256 signing key; generated on first start.
	pub key_path: PathBuf,
	/// How long before expiry a credential is refreshed.
	#[serde(rename = "pre_renewal_secs", with = "secs")]
	pub pre_renewal: Duration,
	/// Pause before refreshing a credential that is already overdue.
	#[serde(rename = "guard_interval_secs", with = "secs")]
	pub guard_interval: Duration,
	/// Deadline for each token endpoint call.
	#[serde(rename = "request_timeout_secs", with = "secs")]
	pub request_timeout: Duration,
	/// Cloud feeds accounts can authorize.
	pub feeds: Vec<CloudFeed>,
}
impl BrokerConfig {
	/// Parses a JSON document and validates it.
	pub fn from_json(bytes: &[u8]) -> Result<Self> {
		let mut de = serde_json::Deserializer::from_slice(bytes);
		let config: Self = serde_path_to_error::deserialize(&mut de).map_err(|e| {
			ConfigError::InvalidValue { field: "config", reason: e.to_string() }
		})?;

		config.validate()?;

		Ok(config)
	}

	/// Reads and parses a JSON file.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let bytes = std::fs::read(path).map_err(|e| ConfigError::InvalidValue {
			field: "config",
			reason: format!("failed to read {}: {e}", path.display()),
		})?;

		Self::from_json(&bytes)
	}

	/// Defaults overlaid with the `BROKER_*` process environment.
	pub fn from_env() -> Result<Self> {
		Self::default().apply_env(|name| std::env::var(name).ok())
	}

	/// Overlays values returned by `lookup` for each `BROKER_*` variable, then validates.
	pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(path) = lookup(ENV_KEY_PATH).filter(|value| !value.trim().is_empty()) {
			self.key_path = PathBuf::from(path);
		}
		if let Some(value) = lookup(ENV_PRE_RENEWAL_SECS) {
			self.pre_renewal = parse_secs(ENV_PRE_RENEWAL_SECS, &value)?;
		}
		if let Some(value) = lookup(ENV_GUARD_INTERVAL_SECS) {
			self.guard_interval = parse_secs(ENV_GUARD_INTERVAL_SECS, &value)?;
		}
		if let Some(value) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
			self.request_timeout = parse_secs(ENV_REQUEST_TIMEOUT_SECS, &value)?;
		}

		self.validate()?;

		Ok(self)
	}

	/// Checks the timing invariants.
	pub fn validate(&self) -> Result<()> {
		if self.pre_renewal.is_negative() {
			return Err(invalid("pre_renewal_secs", "must not be negative"));
		}
		if self.pre_renewal > MAX_PRE_RENEWAL {
			return Err(invalid("pre_renewal_secs", "must not exceed 365 days"));
		}
		if !self.guard_interval.is_positive() {
			return Err(invalid("guard_interval_secs", "must be positive"));
		}
		if !self.request_timeout.is_positive() {
			return Err(invalid("request_timeout_secs", "must be positive"));
		}

		Ok(())
	}

	/// Loads (or generates) the signing key and builds the token authority.
	pub fn token_authority(&self) -> Result<TokenAuthority> {
		TokenAuthority::from_key_file(&self.key_path)
	}

	/// Directory of the configured feeds.
	pub fn feed_directory(&self) -> StaticFeedDirectory {
		StaticFeedDirectory::new(self.feeds.iter().cloned())
	}
}
impl Default for BrokerConfig {
	fn default() -> Self {
		Self {
			key_path: PathBuf::from("./data/key.pem"),
			pre_renewal: Duration::hours(12),
			guard_interval: Duration::seconds(10),
			request_timeout: Duration::seconds(30),
			feeds: Vec::new(),
		}
	}
}

fn parse_secs(field: &'static str, value: &str) -> Result<Duration> {
	value
		.trim()
		.parse::<i64>()
		.map(Duration::seconds)
		.map_err(|e| ConfigError::InvalidValue { field, reason: e.to_string() }.into())
}

fn invalid(field: &'static str, reason: &str) -> Error {
	ConfigError::InvalidValue { field, reason: reason.into() }.into()
}

mod secs {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub(super) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::seconds)
	}
}
