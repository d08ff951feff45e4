//! Table handles: edit-history logging and attachment CRUD.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::warn;

use crate::attachment::AttachmentInfo;
use crate::dataset::Dataset;
use crate::history::EditLogTable;
use crate::operation::{ChangeCode, EditOperation, OpFilter, NOT_FOUND};

/// Handle to one table of a dataset.
///
/// Feature data itself lives with the dataset's storage backend; the handle
/// tracks what changed (the edit log) and manages attachment rows and their
/// files. Handles are cheap to create and several of them may refer to the
/// same table.
pub struct Table {
    dataset: Arc<Dataset>,
    name: String,
}

impl Table {
    pub(crate) fn new(dataset: Arc<Dataset>, name: &str) -> Self {
        Self {
            dataset,
            name: name.to_string(),
        }
    }

    /// The table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether edit operations are being recorded.
    pub fn edit_history_enabled(&self) -> bool {
        self.dataset.lock().table(&self.name).log_edits
    }

    /// Turns edit-history recording on or off. Turning a previously enabled
    /// log off discards the recorded history.
    pub fn set_edit_history(&self, enabled: bool) {
        let mut state = self.dataset.lock();
        let table = state.table(&self.name);
        if table.log_edits && !enabled {
            table.history.clear();
        }
        table.log_edits = enabled;
    }

    /// Records one edit event, reconciling it against the log so that only
    /// the net effect of local edits since the last sync remains.
    ///
    /// A `delete-attachment` event arriving for an attachment that already
    /// has a differently-coded entry overwrites that entry's code in place
    /// rather than appending; replaying such a log out of order is not
    /// well defined, so sync clients must replay in insertion order.
    pub fn log_edit_operation(&self, op: EditOperation) {
        let mut state = self.dataset.lock();
        let table = state.table(&self.name);
        if !table.log_edits {
            return;
        }

        reconcile(table.history.as_mut(), op);
    }

    /// The recorded operations, in insertion order.
    pub fn edit_operations(&self) -> Vec<EditOperation> {
        self.dataset
            .lock()
            .table(&self.name)
            .history
            .query(&OpFilter::default())
            .into_iter()
            .map(|(_, op)| op)
            .collect()
    }

    /// Removes the log entries for one synced operation.
    pub fn delete_edit_operation(&self, op: &EditOperation) {
        self.dataset
            .lock()
            .table(&self.name)
            .history
            .delete_matching(&OpFilter {
                fid: Some(op.fid),
                aid: Some(op.aid),
                ..OpFilter::default()
            });
    }

    /// Records that a feature was created.
    pub fn feature_created(&self, fid: i64) {
        self.log_edit_operation(EditOperation::feature(fid, ChangeCode::CreateFeature));
    }

    /// Records that a feature was changed.
    pub fn feature_changed(&self, fid: i64) {
        self.log_edit_operation(EditOperation::feature(fid, ChangeCode::ChangeFeature));
    }

    /// Records that a feature was deleted. The feature's attachments go
    /// away with it.
    pub fn feature_deleted(&self, fid: i64) {
        self.delete_attachments(fid, true);
        self.log_edit_operation(EditOperation::feature(fid, ChangeCode::DeleteFeature));
    }

    /// Records that every feature of the table was deleted.
    pub fn all_features_deleted(&self) {
        self.log_edit_operation(EditOperation::feature(
            NOT_FOUND,
            ChangeCode::DeleteAllFeatures,
        ));

        self.dataset.lock().table(&self.name).attachments.clear();
        if let Err(err) = fs::remove_dir_all(self.attachments_path()) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove attachments of {}: {err}", self.name);
            }
        }
    }

    /// Directory this table's attachment files live under.
    pub fn attachments_path(&self) -> PathBuf {
        self.dataset.attachments_dir(&self.name)
    }

    /// Stores `file_path` as an attachment of feature `fid` and returns the
    /// new attachment id, or `None` when the file cannot be placed.
    pub fn add_attachment(
        &self,
        fid: i64,
        name: &str,
        description: &str,
        file_path: &Path,
        move_file: bool,
        log_edits: bool,
    ) -> Option<i64> {
        let feature_dir = self.attachments_path().join(fid.to_string());
        if let Err(err) = fs::create_dir_all(&feature_dir) {
            warn!("failed to create attachment dir for {}: {err}", self.name);
            return None;
        }

        let aid = self
            .dataset
            .lock()
            .table(&self.name)
            .attachments
            .create(fid, name, description);

        let destination = feature_dir.join(aid.to_string());
        if file_path.exists() {
            let placed = if move_file {
                fs::rename(file_path, &destination).or_else(|_| {
                    fs::copy(file_path, &destination)
                        .and_then(|_| fs::remove_file(file_path))
                })
            } else {
                fs::copy(file_path, &destination).map(|_| ())
            };
            if let Err(err) = placed {
                warn!("failed to store attachment file {destination:?}: {err}");
            }
        }

        if log_edits {
            self.log_edit_operation(EditOperation::attachment(
                fid,
                aid,
                ChangeCode::CreateAttachment,
            ));
        }

        Some(aid)
    }

    /// Updates an attachment's name and/or description.
    pub fn update_attachment(
        &self,
        aid: i64,
        name: Option<&str>,
        description: Option<&str>,
        log_edits: bool,
    ) -> bool {
        let fid = {
            let mut state = self.dataset.lock();
            let Some(row) = state.table(&self.name).attachments.get_mut(aid) else {
                return false;
            };
            if let Some(name) = name {
                row.name = name.to_string();
            }
            if let Some(description) = description {
                row.description = description.to_string();
            }
            row.fid
        };

        if log_edits {
            self.log_edit_operation(EditOperation::attachment(
                fid,
                aid,
                ChangeCode::ChangeAttachment,
            ));
        }

        true
    }

    /// Deletes one attachment, row and file.
    pub fn delete_attachment(&self, aid: i64, log_edits: bool) -> bool {
        let Some(row) = self.dataset.lock().table(&self.name).attachments.delete(aid) else {
            return false;
        };

        let path = self
            .attachments_path()
            .join(row.fid.to_string())
            .join(aid.to_string());
        if let Err(err) = fs::remove_file(&path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to delete attachment file {path:?}: {err}");
            }
        }

        if log_edits {
            self.log_edit_operation(EditOperation::attachment(
                row.fid,
                aid,
                ChangeCode::DeleteAttachment,
            ));
        }

        true
    }

    /// Deletes every attachment of one feature.
    pub fn delete_attachments(&self, fid: i64, log_edits: bool) -> bool {
        self.dataset
            .lock()
            .table(&self.name)
            .attachments
            .delete_for_feature(fid);

        let feature_dir = self.attachments_path().join(fid.to_string());
        if let Err(err) = fs::remove_dir_all(&feature_dir) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove attachment dir {feature_dir:?}: {err}");
            }
        }

        if log_edits {
            self.log_edit_operation(EditOperation::attachment(
                fid,
                NOT_FOUND,
                ChangeCode::DeleteAllAttachments,
            ));
        }

        true
    }

    /// Attachments of one feature, with on-disk file metadata.
    pub fn attachments(&self, fid: i64) -> Vec<AttachmentInfo> {
        let rows: Vec<_> = self
            .dataset
            .lock()
            .table(&self.name)
            .attachments
            .for_feature(fid)
            .cloned()
            .collect();

        let feature_dir = self.attachments_path().join(fid.to_string());
        rows.into_iter()
            .map(|row| {
                let path = feature_dir.join(row.id.to_string());
                let size = fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
                AttachmentInfo {
                    id: row.id,
                    name: row.name,
                    description: row.description,
                    path,
                    size,
                }
            })
            .collect()
    }
}

/// Applies one event to the log under the reconciliation rules.
fn reconcile(log: &mut dyn EditLogTable, op: EditOperation) {
    use ChangeCode::*;

    match op.code {
        DeleteAllFeatures => {
            log.clear();
            insert(log, op);
            return;
        }
        DeleteAllAttachments => {
            if op.fid == NOT_FOUND {
                return;
            }
            // Feature-level rows and other table-wide markers keep their
            // place; only this feature's attachment rows collapse.
            log.delete_matching(&OpFilter {
                fid: Some(op.fid),
                attachments_only: true,
                ..OpFilter::default()
            });
            insert(log, op);
            return;
        }
        _ => {}
    }

    // A table-wide delete is trumped by any later real edit on the table.
    log.delete_matching(&OpFilter::by_code(DeleteAllFeatures));

    if matches!(op.code, CreateAttachment | ChangeAttachment) {
        if op.fid == NOT_FOUND {
            return;
        }
        log.delete_matching(&OpFilter {
            fid: Some(op.fid),
            code: Some(DeleteAllAttachments),
            ..OpFilter::default()
        });
    }

    if matches!(op.code, CreateFeature | CreateAttachment) {
        if op.fid == NOT_FOUND {
            return;
        }
        insert(log, op);
        return;
    }

    let existing = log.query(&OpFilter::by_fid(op.fid));

    match op.code {
        DeleteFeature => {
            if op.fid == NOT_FOUND {
                return;
            }
            if !existing.is_empty() {
                log.delete_matching(&OpFilter::by_fid(op.fid));
            }
            // Created locally and deleted again: nothing to sync.
            if existing.iter().any(|(_, e)| e.code == CreateFeature) {
                return;
            }
            insert(log, op);
        }
        DeleteAttachment => {
            if op.fid == NOT_FOUND || op.aid == NOT_FOUND {
                return;
            }
            if let Some((row, prior)) = existing.iter().find(|(_, e)| e.aid == op.aid) {
                if prior.code == CreateAttachment {
                    if log.delete(*row).is_err() {
                        warn!("failed to delete log item {row}");
                    }
                } else if log.set_code(*row, DeleteAttachment).is_err() {
                    warn!("failed to update log item {row}");
                }
                return;
            }
            insert(log, op);
        }
        ChangeFeature => {
            if op.fid == NOT_FOUND {
                return;
            }
            // Any present entry already implies "needs sync".
            if existing.is_empty() {
                insert(log, op);
            }
        }
        ChangeAttachment => {
            if op.aid == NOT_FOUND {
                return;
            }
            if !existing.iter().any(|(_, e)| e.aid == op.aid) {
                insert(log, op);
            }
        }
        _ => {}
    }
}

fn insert(log: &mut dyn EditLogTable, op: EditOperation) {
    if let Err(err) = log.create(op) {
        warn!("failed to log edit operation {:?}: {err}", op.code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        let dataset = Dataset::new(std::env::temp_dir().join("tessella-store-tests"));
        let table = dataset.table("roads");
        table.set_edit_history(true);
        table
    }

    #[test]
    fn create_then_delete_cancels_out() {
        let table = table();
        table.feature_created(1);
        table.feature_deleted(1);

        assert!(table
            .edit_operations()
            .iter()
            .all(|operation| operation.fid != 1));
    }

    #[test]
    fn repeated_change_keeps_one_entry() {
        let table = table();
        table.feature_changed(2);
        table.feature_changed(2);

        let ops = table.edit_operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0], EditOperation::feature(2, ChangeCode::ChangeFeature));
    }

    #[test]
    fn delete_feature_replaces_prior_entries() {
        let table = table();
        table.feature_changed(3);
        table.log_edit_operation(EditOperation::attachment(
            3,
            7,
            ChangeCode::ChangeAttachment,
        ));
        table.feature_deleted(3);

        let ops: Vec<_> = table
            .edit_operations()
            .into_iter()
            .filter(|operation| operation.fid == 3)
            .collect();
        assert_eq!(ops, vec![EditOperation::feature(3, ChangeCode::DeleteFeature)]);
    }

    #[test]
    fn attachment_create_then_delete_cancels_out() {
        let table = table();
        table.log_edit_operation(EditOperation::attachment(
            2,
            5,
            ChangeCode::CreateAttachment,
        ));
        table.log_edit_operation(EditOperation::attachment(
            2,
            5,
            ChangeCode::DeleteAttachment,
        ));

        assert!(table
            .edit_operations()
            .iter()
            .all(|operation| operation.aid != 5));
    }

    #[test]
    fn delete_attachment_overwrites_prior_entry_in_place() {
        let table = table();
        table.log_edit_operation(EditOperation::attachment(
            2,
            5,
            ChangeCode::ChangeAttachment,
        ));
        table.log_edit_operation(EditOperation::attachment(
            2,
            5,
            ChangeCode::DeleteAttachment,
        ));

        let ops = table.edit_operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(
            ops[0],
            EditOperation::attachment(2, 5, ChangeCode::DeleteAttachment)
        );
    }

    #[test]
    fn delete_all_features_truncates_the_log() {
        let table = table();
        table.feature_created(1);
        table.feature_changed(2);
        table.all_features_deleted();

        let ops = table.edit_operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].code, ChangeCode::DeleteAllFeatures);
    }

    #[test]
    fn create_after_delete_all_purges_the_marker() {
        let table = table();
        table.all_features_deleted();
        table.feature_created(3);

        let ops = table.edit_operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0], EditOperation::feature(3, ChangeCode::CreateFeature));
    }

    #[test]
    fn delete_all_attachments_keeps_feature_level_entries() {
        let table = table();
        table.feature_changed(2);
        table.log_edit_operation(EditOperation::attachment(
            2,
            5,
            ChangeCode::CreateAttachment,
        ));
        table.log_edit_operation(EditOperation::attachment(
            2,
            NOT_FOUND,
            ChangeCode::DeleteAllAttachments,
        ));

        let ops = table.edit_operations();
        assert!(ops.contains(&EditOperation::feature(2, ChangeCode::ChangeFeature)));
        assert!(ops
            .iter()
            .any(|operation| operation.code == ChangeCode::DeleteAllAttachments));
        assert!(ops.iter().all(|operation| operation.aid != 5));
    }

    #[test]
    fn create_attachment_purges_scoped_delete_all_marker() {
        let table = table();
        table.log_edit_operation(EditOperation::attachment(
            2,
            NOT_FOUND,
            ChangeCode::DeleteAllAttachments,
        ));
        table.log_edit_operation(EditOperation::attachment(
            2,
            6,
            ChangeCode::CreateAttachment,
        ));

        let ops = table.edit_operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(
            ops[0],
            EditOperation::attachment(2, 6, ChangeCode::CreateAttachment)
        );
    }

    #[test]
    fn change_attachment_with_existing_entry_is_noop() {
        let table = table();
        table.log_edit_operation(EditOperation::attachment(
            2,
            5,
            ChangeCode::CreateAttachment,
        ));
        table.log_edit_operation(EditOperation::attachment(
            2,
            5,
            ChangeCode::ChangeAttachment,
        ));

        let ops = table.edit_operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].code, ChangeCode::CreateAttachment);
    }

    #[test]
    fn missing_ids_abort_the_logging_call() {
        let table = table();
        table.log_edit_operation(EditOperation::feature(NOT_FOUND, ChangeCode::CreateFeature));
        table.log_edit_operation(EditOperation::attachment(
            NOT_FOUND,
            5,
            ChangeCode::CreateAttachment,
        ));

        assert!(table.edit_operations().is_empty());
    }

    #[test]
    fn disabled_history_records_nothing() {
        let dataset = Dataset::new(std::env::temp_dir().join("tessella-store-tests"));
        let table = dataset.table("unlogged");
        table.feature_created(1);

        assert!(table.edit_operations().is_empty());
    }

    #[test]
    fn disabling_history_clears_the_log() {
        let table = table();
        table.feature_created(1);
        table.set_edit_history(false);
        table.set_edit_history(true);

        assert!(table.edit_operations().is_empty());
    }

    #[test]
    fn synced_operations_can_be_removed() {
        let table = table();
        table.feature_created(1);
        table.feature_changed(2);

        table.delete_edit_operation(&EditOperation::feature(1, ChangeCode::CreateFeature));

        let ops = table.edit_operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].fid, 2);
    }

    #[test]
    fn handles_share_one_log() {
        let dataset = Dataset::new(std::env::temp_dir().join("tessella-store-tests"));
        let first = dataset.table("shared");
        let second = dataset.table("shared");
        first.set_edit_history(true);

        first.feature_created(1);
        second.feature_created(2);

        assert_eq!(first.edit_operations().len(), 2);
        assert_eq!(second.edit_operations().len(), 2);
    }

    fn dataset_in(dir: &std::path::Path) -> (Arc<Dataset>, Table) {
        let dataset = Dataset::new(dir);
        let table = dataset.table("points");
        table.set_edit_history(true);
        (dataset, table)
    }

    fn write_source_file(dir: &std::path::Path, contents: &[u8]) -> PathBuf {
        let path = dir.join("photo.jpg");
        fs::write(&path, contents).expect("failed to write fixture");
        path
    }

    #[test]
    fn added_attachment_is_listed_with_file_size() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let (_dataset, table) = dataset_in(dir.path());
        let source = write_source_file(dir.path(), b"12345");

        let aid = table
            .add_attachment(1, "photo.jpg", "a photo", &source, false, true)
            .expect("add_attachment failed");

        let attachments = table.attachments(1);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].id, aid);
        assert_eq!(attachments[0].name, "photo.jpg");
        assert_eq!(attachments[0].size, 5);
        assert!(attachments[0].path.exists());
        // Copying keeps the source file in place.
        assert!(source.exists());

        let ops = table.edit_operations();
        assert_eq!(
            ops,
            vec![EditOperation::attachment(
                1,
                aid,
                ChangeCode::CreateAttachment
            )]
        );
    }

    #[test]
    fn moved_attachment_removes_the_source() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let (_dataset, table) = dataset_in(dir.path());
        let source = write_source_file(dir.path(), b"abc");

        table
            .add_attachment(1, "photo.jpg", "", &source, true, false)
            .expect("add_attachment failed");

        assert!(!source.exists());
        assert_eq!(table.attachments(1)[0].size, 3);
    }

    #[test]
    fn deleted_attachment_removes_row_and_file() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let (_dataset, table) = dataset_in(dir.path());
        let source = write_source_file(dir.path(), b"abc");

        let aid = table
            .add_attachment(1, "photo.jpg", "", &source, false, true)
            .expect("add_attachment failed");
        let stored = table.attachments(1)[0].path.clone();

        assert!(table.delete_attachment(aid, true));
        assert!(!stored.exists());
        assert!(table.attachments(1).is_empty());
        // Create + delete cancel out in the log.
        assert!(table.edit_operations().is_empty());

        assert!(!table.delete_attachment(aid, true));
    }

    #[test]
    fn delete_attachments_clears_the_feature_directory() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let (_dataset, table) = dataset_in(dir.path());
        let source = write_source_file(dir.path(), b"abc");

        table
            .add_attachment(1, "a.jpg", "", &source, false, false)
            .expect("add_attachment failed");
        table
            .add_attachment(1, "b.jpg", "", &source, false, false)
            .expect("add_attachment failed");

        assert!(table.delete_attachments(1, true));
        assert!(table.attachments(1).is_empty());
        assert!(!table.attachments_path().join("1").exists());
    }

    #[test]
    fn updated_attachment_changes_metadata() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let (_dataset, table) = dataset_in(dir.path());
        let source = write_source_file(dir.path(), b"abc");

        let aid = table
            .add_attachment(1, "old.jpg", "old", &source, false, false)
            .expect("add_attachment failed");

        assert!(table.update_attachment(aid, Some("new.jpg"), None, true));
        assert!(!table.update_attachment(aid + 1, Some("x"), None, true));

        let info = &table.attachments(1)[0];
        assert_eq!(info.name, "new.jpg");
        assert_eq!(info.description, "old");

        let ops = table.edit_operations();
        assert_eq!(
            ops,
            vec![EditOperation::attachment(
                1,
                aid,
                ChangeCode::ChangeAttachment
            )]
        );
    }

    #[test]
    fn deleting_a_feature_drops_its_attachments() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let (_dataset, table) = dataset_in(dir.path());
        let source = write_source_file(dir.path(), b"abc");

        table
            .add_attachment(7, "a.jpg", "", &source, false, false)
            .expect("add_attachment failed");
        table.feature_deleted(7);

        assert!(table.attachments(7).is_empty());
        let ops = table.edit_operations();
        assert_eq!(ops, vec![EditOperation::feature(7, ChangeCode::DeleteFeature)]);
    }

    #[test]
    fn concurrent_logging_is_serialized() {
        let dataset = Dataset::new(std::env::temp_dir().join("tessella-store-tests"));
        let table = dataset.table("parallel");
        table.set_edit_history(true);

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let handle = dataset.table("parallel");
                scope.spawn(move || {
                    for i in 0..50 {
                        handle.feature_created(worker * 1000 + i);
                    }
                });
            }
        });

        assert_eq!(table.edit_operations().len(), 200);
    }
}
