//! The ordered set of account rows.

use xharvest_api::SchedulerSnapshot;

use crate::row::{RowId, RowState};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeleteRowError {
    #[error("no such row")]
    NotFound,
    #[error("row has an active task (Queued/Running); cancel it first")]
    Locked,
}

/// Ordered collection of rows. At least one row exists at all times:
/// deleting the last one immediately creates a fresh default replacement.
pub struct RowCollection {
    rows: Vec<RowState>,
    next_id: RowId,
}

impl RowCollection {
    pub fn new() -> Self {
        let mut collection = Self {
            rows: Vec::new(),
            next_id: 1,
        };
        collection.add_row();
        collection
    }

    pub fn rows(&self) -> &[RowState] {
        &self.rows
    }

    pub fn get(&self, id: RowId) -> Option<&RowState> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: RowId) -> Option<&mut RowState> {
        self.rows.iter_mut().find(|r| r.id == id)
    }

    pub fn add_row(&mut self) -> RowId {
        let id = self.next_id;
        self.next_id += 1;
        self.rows.push(RowState::new(id));
        id
    }

    /// Delete a row. Refused while locked. Deleting the last row yields a
    /// fresh default row, whose id is returned.
    pub fn delete_row(&mut self, id: RowId) -> Result<Option<RowId>, DeleteRowError> {
        let index = self
            .rows
            .iter()
            .position(|r| r.id == id)
            .ok_or(DeleteRowError::NotFound)?;
        if self.rows[index].is_locked() {
            return Err(DeleteRowError::Locked);
        }
        self.rows.remove(index);
        if self.rows.is_empty() {
            return Ok(Some(self.add_row()));
        }
        Ok(None)
    }

    /// Route a scheduler snapshot to every row in one pass: each row whose
    /// current resolved handle matches an entry adopts that entry verbatim
    /// (the backend is authoritative). Rows with no valid handle have
    /// nothing to reconcile. Returns the ids of rows that changed.
    pub fn apply_snapshot(&mut self, snapshot: &SchedulerSnapshot) -> Vec<RowId> {
        let mut changed = Vec::new();
        for row in &mut self.rows {
            let Some(handle) = row.handle() else {
                continue;
            };
            let Some(entry) = snapshot.handles.iter().find(|h| h.handle == handle) else {
                continue;
            };
            let before = (row.status, row.queued_position, row.stats);
            row.adopt(entry);
            if before != (row.status, row.queued_position, row.stats) {
                changed.push(row.id);
            }
        }
        changed
    }
}

impl Default for RowCollection {
    fn default() -> Self {
        Self::new()
    }
}
