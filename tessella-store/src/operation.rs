//! Edit operations recorded in a table's change log.

/// Sentinel id meaning "no such feature/attachment".
pub const NOT_FOUND: i64 = -1;

/// What kind of change an edit operation records. The set is closed: sync
/// clients replay exactly these codes against the remote store.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChangeCode {
    /// A feature was created.
    CreateFeature,
    /// A feature's fields or geometry changed.
    ChangeFeature,
    /// A feature was deleted.
    DeleteFeature,
    /// Every feature of the table was deleted.
    DeleteAllFeatures,
    /// An attachment was added to a feature.
    CreateAttachment,
    /// An attachment's metadata changed.
    ChangeAttachment,
    /// An attachment was deleted.
    DeleteAttachment,
    /// Every attachment of one feature was deleted.
    DeleteAllAttachments,
}

/// One entry of the edit log.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EditOperation {
    /// Feature the change applies to, [`NOT_FOUND`] for table-wide events.
    pub fid: i64,
    /// Attachment the change applies to, [`NOT_FOUND`] for feature-level
    /// events.
    pub aid: i64,
    /// The recorded change kind.
    pub code: ChangeCode,
}

impl EditOperation {
    /// A feature-level operation.
    pub fn feature(fid: i64, code: ChangeCode) -> Self {
        Self {
            fid,
            aid: NOT_FOUND,
            code,
        }
    }

    /// An attachment-level operation.
    pub fn attachment(fid: i64, aid: i64, code: ChangeCode) -> Self {
        Self { fid, aid, code }
    }
}

/// Row filter over the log table: the attribute-filter/bulk-delete surface
/// of the backing table.
#[derive(Debug, Default, Copy, Clone)]
pub struct OpFilter {
    /// Match rows of this feature.
    pub fid: Option<i64>,
    /// Match rows of this attachment.
    pub aid: Option<i64>,
    /// Match rows with this change code.
    pub code: Option<ChangeCode>,
    /// Match only rows that reference a real attachment id.
    pub attachments_only: bool,
}

impl OpFilter {
    /// Rows of one feature.
    pub fn by_fid(fid: i64) -> Self {
        Self {
            fid: Some(fid),
            ..Self::default()
        }
    }

    /// Rows with one change code.
    pub fn by_code(code: ChangeCode) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    /// Whether `op` satisfies the filter.
    pub fn matches(&self, op: &EditOperation) -> bool {
        self.fid.map_or(true, |fid| op.fid == fid)
            && self.aid.map_or(true, |aid| op.aid == aid)
            && self.code.map_or(true, |code| op.code == code)
            && (!self.attachments_only || op.aid != NOT_FOUND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_by_fields() {
        let op = EditOperation::attachment(2, 5, ChangeCode::CreateAttachment);

        assert!(OpFilter::by_fid(2).matches(&op));
        assert!(!OpFilter::by_fid(3).matches(&op));
        assert!(OpFilter::by_code(ChangeCode::CreateAttachment).matches(&op));
        assert!(OpFilter::default().matches(&op));
    }

    #[test]
    fn attachments_only_excludes_feature_rows() {
        let filter = OpFilter {
            fid: Some(2),
            attachments_only: true,
            ..OpFilter::default()
        };

        assert!(filter.matches(&EditOperation::attachment(2, 5, ChangeCode::CreateAttachment)));
        assert!(!filter.matches(&EditOperation::feature(2, ChangeCode::ChangeFeature)));
    }
}
