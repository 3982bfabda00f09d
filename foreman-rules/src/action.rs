use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Remote workflow started when a rule fires.
///
/// Arguments are an ordered string-to-string map handed verbatim to the task
/// runner; typed deserialization is the runner's concern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleAction {
    /// Task type understood by the external task runner.
    pub task_name: String,
    /// Parameters forwarded in authoring order.
    #[serde(default)]
    pub arguments: IndexMap<String, String>,
}

impl RuleAction {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            arguments: IndexMap::new(),
        }
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }
}
