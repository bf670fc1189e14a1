use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeDefect {
    DuplicateId,
    MissingParent(Uuid),
    Cycle,
}

impl std::fmt::Display for TreeDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeDefect::DuplicateId => write!(f, "duplicate subject id"),
            TreeDefect::MissingParent(parent_id) => {
                write!(f, "parent {} does not exist", parent_id)
            }
            TreeDefect::Cycle => write!(f, "parent chain loops back on itself"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid subject tree at {subject_id}: {reason}")]
    InvalidTree { subject_id: Uuid, reason: TreeDefect },

    #[error("Unknown subject: {0}")]
    UnknownSubject(Uuid),
}

pub type Result<T> = std::result::Result<T, EngineError>;
