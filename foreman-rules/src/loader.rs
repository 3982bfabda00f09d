use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::RuleError;
use crate::rule::ForemanRule;

/// Loads rules from a JSON/YAML file or a directory of such files, used to
/// seed a store at startup. Every rule must pass authoring validation and
/// identifiers must be unique across the whole load.
pub fn load_rules(path: impl AsRef<Path>) -> Result<Vec<ForemanRule>, RuleError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RuleError::MissingPath(path.display().to_string()));
    }

    let mut rules = if path.is_dir() {
        load_from_directory(path)?
    } else {
        load_from_file(path)?
    };

    for rule in &rules {
        rule.validate()?;
    }

    let mut seen = HashSet::new();
    for rule in &rules {
        if !seen.insert(rule.id) {
            return Err(RuleError::DuplicateRule { id: rule.id });
        }
    }

    rules.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
    Ok(rules)
}

fn load_from_directory(path: &Path) -> Result<Vec<ForemanRule>, RuleError> {
    let mut rules = Vec::new();
    for entry in fs::read_dir(path).map_err(|err| RuleError::from_io(path, err))? {
        let entry = entry.map_err(|err| RuleError::from_io(path, err))?;
        let file_type = entry
            .file_type()
            .map_err(|err| RuleError::from_io(entry.path(), err))?;
        if file_type.is_dir() {
            continue;
        }

        if let Some(ext) = entry.path().extension().and_then(|value| value.to_str()) {
            if matches!(ext, "json" | "yaml" | "yml") {
                let mut file_rules = load_from_file(&entry.path())?;
                rules.append(&mut file_rules);
            }
        }
    }

    Ok(rules)
}

fn load_from_file(path: &Path) -> Result<Vec<ForemanRule>, RuleError> {
    let raw = fs::read_to_string(path).map_err(|err| RuleError::from_io(path, err))?;

    // YAML is a superset of JSON, so a single parser covers both syntaxes.
    if let Ok(doc) = serde_yaml::from_str::<RuleDocument>(&raw) {
        return Ok(doc.rules);
    }
    if let Ok(list) = serde_yaml::from_str::<Vec<ForemanRule>>(&raw) {
        return Ok(list);
    }
    if let Ok(rule) = serde_yaml::from_str::<ForemanRule>(&raw) {
        return Ok(vec![rule]);
    }

    Err(RuleError::parse_error(
        path.to_path_buf(),
        "expected a rules document, a rule list or a single rule",
    ))
}

#[derive(Debug, Deserialize)]
struct RuleDocument {
    rules: Vec<ForemanRule>,
}
