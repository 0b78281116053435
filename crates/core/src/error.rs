use thiserror::Error;

use crate::automation::ActionType;

pub type CdpResult<T> = Result<T, CdpError>;

#[derive(Error, Debug)]
pub enum CdpError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Action {action} failed: {reason}")]
    Action { action: ActionType, reason: String },

    #[error("Queue full, dropped work item: {queue}")]
    QueueFullDrop { queue: &'static str },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CdpError {
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        CdpError::Persistence(err.to_string())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        CdpError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn action(action: ActionType, reason: impl Into<String>) -> Self {
        CdpError::Action {
            action,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CdpError::not_found("customer", "c-42");
        assert_eq!(err.to_string(), "customer not found: c-42");

        let err = CdpError::action(ActionType::AddTag, "missing tag");
        assert_eq!(err.to_string(), "Action add_tag failed: missing tag");

        let err = CdpError::QueueFullDrop { queue: "execution" };
        assert!(err.to_string().contains("execution"));
    }
}
