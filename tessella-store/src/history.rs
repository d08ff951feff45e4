//! Backing storage of the edit log.

use crate::error::StoreError;
use crate::operation::{ChangeCode, EditOperation, OpFilter};

/// Identity of one row in the backing log table.
pub type RowId = i64;

/// The table interface the edit log is stored through.
///
/// Mirrors what a SQL-backed dataset offers: row creation, an in-place field
/// update, row deletion, a filtered cursor and filtered bulk deletes.
pub trait EditLogTable: Send {
    /// Appends a row, returning its id.
    fn create(&mut self, op: EditOperation) -> Result<RowId, StoreError>;

    /// Overwrites the change code of an existing row in place.
    fn set_code(&mut self, row: RowId, code: ChangeCode) -> Result<(), StoreError>;

    /// Deletes one row.
    fn delete(&mut self, row: RowId) -> Result<(), StoreError>;

    /// Truncates the table.
    fn clear(&mut self);

    /// Deletes every row matching `filter`, returning how many went away.
    fn delete_matching(&mut self, filter: &OpFilter) -> usize;

    /// Rows matching `filter`, in insertion order.
    fn query(&self, filter: &OpFilter) -> Vec<(RowId, EditOperation)>;
}

/// In-memory log table used by datasets without a SQL backend.
#[derive(Debug, Default)]
pub struct MemoryLogTable {
    rows: Vec<(RowId, EditOperation)>,
    next_id: RowId,
}

impl EditLogTable for MemoryLogTable {
    fn create(&mut self, op: EditOperation) -> Result<RowId, StoreError> {
        let id = self.next_id;
        self.next_id += 1;
        self.rows.push((id, op));
        Ok(id)
    }

    fn set_code(&mut self, row: RowId, code: ChangeCode) -> Result<(), StoreError> {
        let entry = self
            .rows
            .iter_mut()
            .find(|(id, _)| *id == row)
            .ok_or(StoreError::NotFound)?;
        entry.1.code = code;
        Ok(())
    }

    fn delete(&mut self, row: RowId) -> Result<(), StoreError> {
        let position = self
            .rows
            .iter()
            .position(|(id, _)| *id == row)
            .ok_or(StoreError::NotFound)?;
        self.rows.remove(position);
        Ok(())
    }

    fn clear(&mut self) {
        self.rows.clear();
    }

    fn delete_matching(&mut self, filter: &OpFilter) -> usize {
        let before = self.rows.len();
        self.rows.retain(|(_, op)| !filter.matches(op));
        before - self.rows.len()
    }

    fn query(&self, filter: &OpFilter) -> Vec<(RowId, EditOperation)> {
        self.rows
            .iter()
            .filter(|(_, op)| filter.matches(op))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn create_assigns_distinct_row_ids() {
        let mut table = MemoryLogTable::default();
        let a = table
            .create(EditOperation::feature(1, ChangeCode::CreateFeature))
            .expect("create failed");
        let b = table
            .create(EditOperation::feature(2, ChangeCode::CreateFeature))
            .expect("create failed");
        assert_ne!(a, b);
    }

    #[test]
    fn set_code_updates_in_place() {
        let mut table = MemoryLogTable::default();
        let row = table
            .create(EditOperation::attachment(1, 5, ChangeCode::ChangeAttachment))
            .expect("create failed");

        table
            .set_code(row, ChangeCode::DeleteAttachment)
            .expect("update failed");

        let rows = table.query(&OpFilter::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.code, ChangeCode::DeleteAttachment);
    }

    #[test]
    fn missing_rows_are_reported() {
        let mut table = MemoryLogTable::default();
        assert_matches!(
            table.set_code(42, ChangeCode::DeleteFeature),
            Err(StoreError::NotFound)
        );
        assert_matches!(table.delete(42), Err(StoreError::NotFound));
    }

    #[test]
    fn delete_matching_respects_filter() {
        let mut table = MemoryLogTable::default();
        for fid in 0..4 {
            table
                .create(EditOperation::feature(fid, ChangeCode::ChangeFeature))
                .expect("create failed");
        }

        assert_eq!(table.delete_matching(&OpFilter::by_fid(2)), 1);
        assert_eq!(table.query(&OpFilter::default()).len(), 3);
        assert!(table.query(&OpFilter::by_fid(2)).is_empty());
    }
}
