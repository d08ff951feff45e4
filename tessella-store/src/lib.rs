//! Edit-history and attachment subsystem of a tessella dataset.
//!
//! A [`Dataset`] is an explicitly constructed context object; [`Table`]
//! handles opened from it record feature and attachment edits into an
//! append-only change log. The log is reconciled on every event so that it
//! holds only the net effect of local edits since the last synchronization:
//! a feature created and deleted again leaves no trace, repeated changes
//! collapse into one entry, and table-wide deletes truncate everything they
//! supersede. Sync clients read the log with
//! [`Table::edit_operations`] and clear replayed entries with
//! [`Table::delete_edit_operation`].
//!
//! Attachments are stored as rows plus files under the dataset's
//! `<table>.attachments/<feature>/<attachment>` directories;
//! [`Table::attachments`] joins both sides into [`AttachmentInfo`] values.
//!
//! All log mutations across every handle of one dataset are serialized by a
//! single coarse execution lock, mirroring how a SQL-backed store guards its
//! auxiliary tables.

#![warn(clippy::unwrap_used)]
#![warn(missing_docs)]

mod attachment;
mod dataset;
pub mod error;
pub mod history;
mod operation;
mod table;

pub use attachment::AttachmentInfo;
pub use dataset::Dataset;
pub use error::StoreError;
pub use operation::{ChangeCode, EditOperation, OpFilter, NOT_FOUND};
pub use table::Table;
