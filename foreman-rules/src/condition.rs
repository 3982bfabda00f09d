use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::RuleError;
use crate::snapshot::ClientSnapshot;

/// Regex test applied to a single attribute of a client snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegexCondition {
    /// Slash separated location inside the snapshot, e.g. `/fs/os`.
    /// An empty path reads the snapshot root.
    #[serde(default)]
    pub attribute_path: String,
    /// Attribute key read at `attribute_path`.
    pub attribute_name: String,
    /// Regular expression applied with search semantics (unanchored) to the
    /// attribute's string form.
    pub pattern: String,
}

impl RegexCondition {
    pub fn new(
        attribute_path: impl Into<String>,
        attribute_name: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            attribute_path: attribute_path.into(),
            attribute_name: attribute_name.into(),
            pattern: pattern.into(),
        }
    }

    /// Compiles the pattern, surfacing authoring-time validation errors.
    pub fn compile(&self) -> Result<Regex, RuleError> {
        Regex::new(&self.pattern).map_err(|source| RuleError::MalformedPattern {
            pattern: self.pattern.clone(),
            source,
        })
    }

    /// Whether the snapshot satisfies this condition.
    ///
    /// An absent attribute fails the condition. A pattern that no longer
    /// compiles (possible for rules loaded from disk without passing the
    /// authoring boundary) is reported and treated as non-matching.
    pub fn matches(&self, snapshot: &ClientSnapshot) -> bool {
        let regex = match self.compile() {
            Ok(regex) => regex,
            Err(err) => {
                warn!(pattern = %self.pattern, %err, "condition pattern does not compile");
                return false;
            }
        };

        match snapshot.attribute(&self.attribute_path, &self.attribute_name) {
            Some(value) => regex.is_match(&value),
            None => false,
        }
    }
}
