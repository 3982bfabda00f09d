use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::RuleAction;
use crate::condition::RegexCondition;
use crate::error::RuleError;
use crate::snapshot::ClientSnapshot;

/// Declarative rule evaluated against client attribute snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForemanRule {
    /// Stable identifier, generated at authoring time. Ordinal position in
    /// the rule set is a display concern and never identifies a rule.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Human readable description, informational only.
    #[serde(default)]
    pub description: String,
    /// Authoring timestamp. Immutable; doubles as the watermark key used to
    /// skip already evaluated rules, so editing a rule means removing it and
    /// adding a fresh one.
    pub created: DateTime<Utc>,
    /// The rule never matches once the current time reaches this instant.
    pub expires: DateTime<Utc>,
    /// All conditions must hold. An empty list matches every client.
    #[serde(default)]
    pub conditions: Vec<RegexCondition>,
    /// Tasks started when the rule fires. May be empty.
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

impl ForemanRule {
    /// Creates a rule valid from now with the default one day lifetime.
    pub fn new(description: impl Into<String>) -> Self {
        let created = Utc::now();
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            created,
            expires: created + Duration::days(1),
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_expiry(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = expires;
        self
    }

    pub fn with_condition(mut self, condition: RegexCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Authoring-boundary validation. Rejected rules are never stored.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.expires <= self.created {
            return Err(RuleError::invalid(format!(
                "expires {} must be after created {}",
                self.expires, self.created
            )));
        }

        for condition in &self.conditions {
            condition
                .compile()
                .map_err(|err| RuleError::invalid(err.to_string()))?;
        }

        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires
    }

    /// AND over all conditions; vacuously true for an empty list.
    pub fn matches(&self, snapshot: &ClientSnapshot) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.matches(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_condition_list_matches_any_snapshot() {
        let rule = ForemanRule::new("match everything");
        assert!(rule.matches(&ClientSnapshot::default()));
        assert!(rule.matches(&ClientSnapshot::from(json!({ "os": "Plan9" }))));
    }

    #[test]
    fn all_conditions_must_hold() {
        let rule = ForemanRule::new("linux on arm")
            .with_condition(RegexCondition::new("", "os", "^Linux"))
            .with_condition(RegexCondition::new("", "arch", "aarch64"));

        let both = ClientSnapshot::from(json!({ "os": "Linux", "arch": "aarch64" }));
        let one = ClientSnapshot::from(json!({ "os": "Linux", "arch": "x86_64" }));
        assert!(rule.matches(&both));
        assert!(!rule.matches(&one));
    }

    #[test]
    fn validation_rejects_inverted_lifetime() {
        let now = Utc::now();
        let rule = ForemanRule::new("already expired").with_expiry(now - Duration::hours(1));
        assert!(matches!(
            rule.validate(),
            Err(RuleError::InvalidRule { .. })
        ));
    }

    #[test]
    fn validation_rejects_malformed_patterns() {
        let rule = ForemanRule::new("bad regex")
            .with_condition(RegexCondition::new("", "os", "([unclosed"));
        assert!(matches!(
            rule.validate(),
            Err(RuleError::InvalidRule { .. })
        ));
    }

    #[test]
    fn expiry_is_inclusive() {
        let rule = ForemanRule::new("window");
        assert!(!rule.is_expired(rule.created));
        assert!(rule.is_expired(rule.expires));
        assert!(rule.is_expired(rule.expires + Duration::seconds(1)));
    }
}
