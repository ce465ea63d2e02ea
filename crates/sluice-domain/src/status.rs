//! Status module - lifecycle states for tasks

/// Status in the task lifecycle
///
/// Tasks move forward only:
/// - Pending: Waiting to be claimed
/// - Processing: Claimed by exactly one worker
/// - Completed: Committed successfully (terminal, never re-claimed)
/// - Failed: Committed as failed (terminal for workers)
///
/// The single automatic backward edge is `Processing -> Pending`, taken only by
/// the recovery sweeper. `Failed -> Pending` exists only as an explicit
/// operator requeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskStatus {
    /// Waiting to be claimed
    Pending,

    /// Claimed by a worker
    Processing,

    /// Finished successfully
    Completed,

    /// Finished with an error
    Failed,
}

impl TaskStatus {
    /// Every status, in lifecycle order
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::Processing,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    /// Get the status name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Parse a status from its stored name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(TaskStatus::Pending),
            "processing" => Some(TaskStatus::Processing),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    /// Whether the status ends a worker's involvement with the task
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether a worker may move a task from `self` to `next`
    pub fn worker_may_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }

    /// Whether any actor (worker, sweeper, or operator requeue) may move a task
    /// from `self` to `next`
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        self.worker_may_transition_to(next)
            || matches!(
                (self, next),
                (TaskStatus::Processing, TaskStatus::Pending)
                    | (TaskStatus::Failed, TaskStatus::Pending)
            )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid task status: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("PENDING"), Some(TaskStatus::Pending));
        assert!("ingested".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_worker_transitions() {
        assert!(TaskStatus::Pending.worker_may_transition_to(TaskStatus::Processing));
        assert!(TaskStatus::Processing.worker_may_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Processing.worker_may_transition_to(TaskStatus::Failed));

        // Workers never move backwards
        assert!(!TaskStatus::Processing.worker_may_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Completed.worker_may_transition_to(TaskStatus::Processing));
        assert!(!TaskStatus::Pending.worker_may_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn test_completed_is_final() {
        for next in TaskStatus::ALL {
            assert!(!TaskStatus::Completed.can_transition_to(next));
        }
    }

    #[test]
    fn test_terminal() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
    }
}
