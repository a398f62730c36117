use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotTableError {
    /// A writer session is open, so the table can be neither read nor written.
    WriterActive,
    /// At least one reader session is open, so no writer can start.
    ReaderActive { readers: usize },
    /// The structural verifier found an inconsistency.
    Malformed {
        group: Option<usize>,
        reason: String,
    },
}

impl SlotTableError {
    pub(crate) fn malformed(group: Option<usize>, reason: impl Into<String>) -> Self {
        SlotTableError::Malformed {
            group,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SlotTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotTableError::WriterActive => f.write_str("a writer session is open"),
            SlotTableError::ReaderActive { readers } => {
                write!(f, "cannot start a writer while {readers} reader(s) are open")
            }
            SlotTableError::Malformed {
                group: Some(group),
                reason,
            } => write!(f, "malformed slot table at group {group}: {reason}"),
            SlotTableError::Malformed {
                group: None,
                reason,
            } => write!(f, "malformed slot table: {reason}"),
        }
    }
}

impl std::error::Error for SlotTableError {}
