//! Identifiers shared across the execution engine.

use uuid::Uuid;

/// Position of a step within its batch call.
///
/// Steps are numbered from zero in the order they were added to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct StepId(pub(crate) usize);

impl StepId {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "step_{}", self.0)
    }
}

/// Identifies one execution of a batch call.
///
/// Every tree gets a fresh id when it is built and keeps it through its one
/// execution, so events from concurrent executions can always be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CallId(Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form is enough to correlate log lines.
        let s = self.0.simple().to_string();
        write!(f, "call_{}", &s[..8])
    }
}

/// Progress of an execution after a step completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Progress {
    /// Steps completed so far, including the one just finished.
    pub completed: usize,
    /// Total steps in the batch call.
    pub total: usize,
}

impl Progress {
    pub(crate) fn new(completed: usize, total: usize) -> Self {
        Self { completed, total }
    }

    /// Integer percentage of completed steps.
    ///
    /// An empty call counts as fully done.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.completed.min(self.total) * 100) / self.total) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_id_display() {
        assert_eq!(StepId::new(3).to_string(), "step_3");
        assert_eq!(StepId::new(3).as_usize(), 3);
    }

    #[test]
    fn test_call_ids_are_unique() {
        let a = CallId::new();
        let b = CallId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("call_"));
        assert_eq!(a.to_string().len(), "call_".len() + 8);
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(Progress::new(1, 3).percent(), 33);
        assert_eq!(Progress::new(2, 3).percent(), 66);
        assert_eq!(Progress::new(3, 3).percent(), 100);
        assert_eq!(Progress::new(0, 0).percent(), 100);
    }

    #[test]
    fn test_ids_serialize() {
        let json = serde_json::to_string(&StepId::new(2)).unwrap();
        assert_eq!(json, "2");

        let id = CallId::new();
        let back: CallId = serde_json::from_str(&serde_json::to_string(&id).unwrap()).unwrap();
        assert_eq!(back, id);

        let progress = serde_json::to_value(Progress::new(1, 4)).unwrap();
        assert_eq!(progress, serde_json::json!({ "completed": 1, "total": 4 }));
    }
}
