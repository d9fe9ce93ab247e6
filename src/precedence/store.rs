//! Transactional in-memory store for data-source-type records.

// self
use crate::{
	_prelude::*,
	auth::DataSourceTypeId,
	precedence::{self, DataSourceType, PrecedenceGraph},
};

/// Holds data-source types and rejects any write that would make "precedes" cyclic.
///
/// Writes are staged against a copy of the current records and only committed when every
/// written node is acyclic, so a rejected write leaves no partial precedence list behind.
#[derive(Clone, Debug, Default)]
pub struct PrecedenceStore(Arc<RwLock<BTreeMap<DataSourceTypeId, DataSourceType>>>);
impl PrecedenceStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts or replaces one record.
	pub fn upsert(&self, record: DataSourceType) -> Result<DataSourceType> {
		self.upsert_all([record.clone()])?;

		Ok(record)
	}

	/// Inserts or replaces several records in one transaction.
	///
	/// Fails with [`Error::CircularReference`] naming the first written node found on a cycle;
	/// none of the records are persisted in that case.
	pub fn upsert_all(&self, records: impl IntoIterator<Item = DataSourceType>) -> Result<()> {
		let mut guard = self.0.write();
		let mut staged = guard.clone();
		let mut written = Vec::new();

		for record in records {
			written.push(record.id);
			staged.insert(record.id, record);
		}

		let graph = adjacency(&staged);

		if let Some(id) = written
			.iter()
			.copied()
			.find(|id| precedence::creates_cycle(&graph, *id, &HashSet::new()))
		{
			tracing::warn!(%id, "Circular precedence reference detected; write rolled back.");

			return Err(Error::CircularReference { id });
		}

		*guard = staged;

		tracing::debug!(written = written.len(), "Data source types saved.");

		Ok(())
	}

	/// Returns the record stored under `id`.
	pub fn find(&self, id: DataSourceTypeId) -> Option<DataSourceType> {
		self.0.read().get(&id).cloned()
	}

	/// Returns every record ordered by id.
	pub fn all(&self) -> Vec<DataSourceType> {
		self.0.read().values().cloned().collect()
	}

	/// Removes a record along with every edge pointing at it.
	pub fn delete(&self, id: DataSourceTypeId) -> Option<DataSourceType> {
		let mut guard = self.0.write();
		let removed = guard.remove(&id)?;

		for record in guard.values_mut() {
			record.precedes.retain(|next| *next != id);
		}

		Some(removed)
	}

	/// Snapshot of the current "precedes" relation.
	pub fn graph(&self) -> PrecedenceGraph {
		adjacency(&self.0.read())
	}
}

fn adjacency(records: &BTreeMap<DataSourceTypeId, DataSourceType>) -> PrecedenceGraph {
	records.iter().map(|(id, record)| (*id, record.precedes.clone())).collect()
}
