//! Task state machine enforcement.
//!
//! Validates transitions along the task lifecycle DAG:
//!
//! ```text
//! Pending -> Processing | Cancelled
//! Processing -> Completed | Failed | Pending (stale-lease recovery only)
//! Completed/Failed/Cancelled -> ERROR (terminal, no further transitions)
//! ```

use crate::error::QueueError;
use crate::task::TaskStatus;

/// Validate a task status transition.
///
/// Returns `Ok(())` if the transition is valid, or `Err(QueueError)` if not.
pub fn validate_transition(from: TaskStatus, to: TaskStatus) -> Result<(), QueueError> {
    match from {
        TaskStatus::Pending => match to {
            TaskStatus::Processing | TaskStatus::Cancelled => Ok(()),
            _ => Err(QueueError::InvalidTransition {
                current: from,
                requested: to,
            }),
        },
        TaskStatus::Processing => match to {
            // Processing -> Pending is the stale-recovery edge
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Pending => Ok(()),
            _ => Err(QueueError::InvalidTransition {
                current: from,
                requested: to,
            }),
        },
        TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {
            Err(QueueError::TerminalState(from))
        }
    }
}

/// Returns `true` if the status is a terminal state (no further transitions allowed).
pub fn is_terminal(status: TaskStatus) -> bool {
    matches!(
        status,
        TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_pending_transitions() {
        assert!(validate_transition(TaskStatus::Pending, TaskStatus::Processing).is_ok());
        assert!(validate_transition(TaskStatus::Pending, TaskStatus::Cancelled).is_ok());
    }

    #[test]
    fn test_invalid_pending_transitions() {
        assert!(validate_transition(TaskStatus::Pending, TaskStatus::Completed).is_err());
        assert!(validate_transition(TaskStatus::Pending, TaskStatus::Failed).is_err());
        assert!(validate_transition(TaskStatus::Pending, TaskStatus::Pending).is_err());
    }

    #[test]
    fn test_valid_processing_transitions() {
        assert!(validate_transition(TaskStatus::Processing, TaskStatus::Completed).is_ok());
        assert!(validate_transition(TaskStatus::Processing, TaskStatus::Failed).is_ok());
        // Stale-lease recovery edge
        assert!(validate_transition(TaskStatus::Processing, TaskStatus::Pending).is_ok());
    }

    #[test]
    fn test_invalid_processing_to_cancelled() {
        assert!(validate_transition(TaskStatus::Processing, TaskStatus::Cancelled).is_err());
    }

    #[test]
    fn test_terminal_states_reject_all_transitions() {
        for terminal in [
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
        ] {
            for target in TaskStatus::ALL {
                let result = validate_transition(terminal, target);
                assert!(
                    result.is_err(),
                    "Expected error for {:?} -> {:?}",
                    terminal,
                    target
                );
                match result.unwrap_err() {
                    QueueError::TerminalState(s) => assert_eq!(s, terminal),
                    other => panic!("Expected TerminalState, got: {:?}", other),
                }
            }
        }
    }

    #[test]
    fn test_is_terminal() {
        assert!(!is_terminal(TaskStatus::Pending));
        assert!(!is_terminal(TaskStatus::Processing));
        assert!(is_terminal(TaskStatus::Completed));
        assert!(is_terminal(TaskStatus::Failed));
        assert!(is_terminal(TaskStatus::Cancelled));
    }
}
