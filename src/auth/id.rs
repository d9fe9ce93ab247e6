//! Strongly typed numeric identifiers enforced across the credential domain.

// std
use std::num::ParseIntError;
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(
			Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
		)]
		#[serde(transparent)]
		pub struct $name(u64);
		impl $name {
			/// Wraps a raw database identifier.
			pub const fn new(value: u64) -> Self {
				Self(value)
			}

			/// Returns the raw identifier.
			pub const fn get(self) -> u64 {
				self.0
			}
		}
		impl From<u64> for $name {
			fn from(value: u64) -> Self {
				Self(value)
			}
		}
		impl From<$name> for u64 {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				Display::fmt(&self.0, f)
			}
		}
		impl FromStr for $name {
			type Err = ParseIntError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				s.parse().map(Self)
			}
		}
	};
}

def_id! { AccountId, "Identifier of an account that authorized cloud feeds.", "Account" }
def_id! { FeedId, "Identifier of a cloud feed (third-party OAuth 2.0 data source).", "Feed" }
def_id! { SubjectId, "Identifier of the principal a bearer token speaks for.", "Subject" }
def_id! { DataSourceTypeId, "Identifier of a data source type node in the precedence graph.", "DataSourceType" }
