//! Dataset context shared by table handles.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::HashMap;
use parking_lot::{Mutex, MutexGuard};

use crate::attachment::AttachmentTable;
use crate::history::{EditLogTable, MemoryLogTable};
use crate::table::Table;

pub(crate) struct TableState {
    pub history: Box<dyn EditLogTable>,
    pub attachments: AttachmentTable,
    pub log_edits: bool,
}

pub(crate) struct DatasetState {
    tables: HashMap<String, TableState>,
}

impl DatasetState {
    pub fn table(&mut self, name: &str) -> &mut TableState {
        self.tables.entry(name.to_string()).or_insert_with(|| TableState {
            history: Box::<MemoryLogTable>::default(),
            attachments: AttachmentTable::default(),
            log_edits: false,
        })
    }
}

/// A dataset: the explicitly constructed context every table handle of one
/// store shares.
///
/// The single state mutex is the dataset-wide execution lock. It serializes
/// all edit-log mutations and bulk deletes across table handles, which is
/// deliberately coarse: an append-only log must never interleave partial
/// reconciliations from concurrent writers.
pub struct Dataset {
    root: PathBuf,
    state: Mutex<DatasetState>,
}

impl Dataset {
    /// Creates a dataset storing attachment files under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            root: root.into(),
            state: Mutex::new(DatasetState {
                tables: HashMap::default(),
            }),
        })
    }

    /// Opens a handle to the named table.
    pub fn table(self: &Arc<Self>, name: &str) -> Table {
        Table::new(self.clone(), name)
    }

    /// Filesystem root of the dataset.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a table's attachment files live under.
    pub fn attachments_dir(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.attachments"))
    }

    /// Acquires the execution lock.
    pub(crate) fn lock(&self) -> MutexGuard<'_, DatasetState> {
        self.state.lock()
    }
}
