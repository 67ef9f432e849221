use crate::db::NodeDb;
use crate::error::NodeError;
use ndau_core::State;
use std::sync::{Arc, PoisonError, RwLock};

/// Read handle on committed state. The block-application path swaps in a
/// new `Arc<State>` on commit; readers holding the old one keep a
/// consistent view of their height.
#[derive(Clone)]
pub struct SnapshotReader {
    current: Arc<RwLock<Arc<State>>>,
    db: Arc<NodeDb>,
}

impl SnapshotReader {
    pub fn new(state: State, db: Arc<NodeDb>) -> Self {
        SnapshotReader {
            current: Arc::new(RwLock::new(Arc::new(state))),
            db,
        }
    }

    pub fn latest(&self) -> Arc<State> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn height(&self) -> u64 {
        self.latest().height
    }

    /// State as committed at `height`, if still retained.
    pub fn at(&self, height: u64) -> Result<Option<Arc<State>>, NodeError> {
        let latest = self.latest();
        if height == latest.height {
            return Ok(Some(latest));
        }
        if height > latest.height {
            return Ok(None);
        }
        Ok(self.db.snapshot(height)?.map(Arc::new))
    }

    pub fn db(&self) -> &NodeDb {
        &self.db
    }

    pub(crate) fn publish(&self, state: State) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(state);
    }
}
