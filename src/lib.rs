//! Signed bearer credentials for admins, accounts, and devices, plus cloud-feed OAuth 2.0 tokens
//! that keep themselves fresh with a single background worker.

#![deny(clippy::all, unused_crate_dependencies)]
#![warn(missing_docs)]

pub mod auth;
pub mod authority;
pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod feed;
pub mod guard;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod precedence;
pub mod scheduler;
pub mod service;
pub mod store;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, HashSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
