//! Data-source-type precedence graph and its acyclicity check.
//!
//! Each [`DataSourceType`] lists the types it precedes. Clients walk that relation to order
//! installation steps, so a cycle would trap them; [`PrecedenceStore`] validates every write
//! with [`creates_cycle`] before committing it.

mod store;

pub use store::*;

// self
use crate::{_prelude::*, auth::DataSourceTypeId};

/// Adjacency view of the "precedes" relation keyed by node id.
pub type PrecedenceGraph = HashMap<DataSourceTypeId, Vec<DataSourceTypeId>>;

/// Kind of data source a type node describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceCategory {
	/// Physical measurement device.
	DeviceType,
	/// Third-party OAuth 2.0 cloud feed.
	CloudFeedType,
	/// Questionnaire-style energy query.
	EnergyQueryType,
}

/// Node of the precedence graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceType {
	/// Node identifier.
	pub id: DataSourceTypeId,
	/// Identifier of the device, feed, or query type this node stands for.
	pub type_instance_id: u64,
	/// Category of the referenced type.
	pub category: DataSourceCategory,
	/// Types that must come after this one.
	#[serde(default)]
	pub precedes: Vec<DataSourceTypeId>,
	/// Installation manual shown to participants.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub installation_manual_url: Option<Url>,
	/// Frequently asked questions page.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub faq_url: Option<Url>,
	/// General information page.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub info_url: Option<Url>,
}
impl DataSourceType {
	/// Creates a node with no outgoing edges.
	pub fn new(id: DataSourceTypeId, category: DataSourceCategory, type_instance_id: u64) -> Self {
		Self {
			id,
			type_instance_id,
			category,
			precedes: Vec::new(),
			installation_manual_url: None,
			faq_url: None,
			info_url: None,
		}
	}

	/// Replaces the outgoing edges.
	pub fn with_precedes(mut self, precedes: impl IntoIterator<Item = DataSourceTypeId>) -> Self {
		self.precedes = precedes.into_iter().collect();

		self
	}
}

/// Returns `true` when a cycle is reachable from `node` over the "precedes" edges.
///
/// `ancestors` holds ids already on the caller's path; reaching `node` itself, any of them, or
/// any id on the current walk is a cycle. Nodes missing from `graph` are leaves. Fully explored
/// nodes are remembered, so shared successors are walked once.
pub fn creates_cycle(
	graph: &PrecedenceGraph,
	node: DataSourceTypeId,
	ancestors: &HashSet<DataSourceTypeId>,
) -> bool {
	if ancestors.contains(&node) {
		return true;
	}

	let successors = |id: DataSourceTypeId| graph.get(&id).map(Vec::as_slice).unwrap_or_default();
	let mut path = ancestors.clone();
	let mut finished = HashSet::new();
	let mut stack = vec![(node, 0_usize)];

	path.insert(node);

	while let Some(&(current, cursor)) = stack.last() {
		let Some(&next) = successors(current).get(cursor) else {
			stack.pop();
			path.remove(&current);
			finished.insert(current);

			continue;
		};
		let top = stack.len() - 1;

		stack[top].1 += 1;

		if path.contains(&next) {
			return true;
		}
		if finished.contains(&next) {
			continue;
		}

		path.insert(next);
		stack.push((next, 0));
	}

	false
}
