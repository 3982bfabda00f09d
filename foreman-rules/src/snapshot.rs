use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Read-only attribute state reported by a managed client.
///
/// The snapshot is an opaque JSON document: objects keyed by attribute name,
/// nested under slash separated paths such as `/fs/os`. The foreman only ever
/// reads it; producing the snapshot is the client's concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ClientSnapshot(Value);

impl ClientSnapshot {
    pub fn new(root: Value) -> Self {
        Self(root)
    }

    /// Looks up `name` in the object located at `path` and returns its string
    /// form. Strings are returned verbatim, numbers and booleans through
    /// their display form; structured values are not matchable.
    pub fn attribute(&self, path: &str, name: &str) -> Option<String> {
        let node = locate(&self.0, path)?;
        let value = node.as_object()?.get(name)?;
        match value {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            _ => None,
        }
    }
}

impl From<Value> for ClientSnapshot {
    fn from(value: Value) -> Self {
        ClientSnapshot::new(value)
    }
}

fn locate<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        match current {
            Value::Object(map) => match map.get(segment) {
                Some(value) => current = value,
                None => return None,
            },
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                current = items.get(index)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_paths() {
        let snapshot = ClientSnapshot::from(json!({
            "fs": {"os": {"version": "5.15", "hostname": "edge-01"}}
        }));

        assert_eq!(
            snapshot.attribute("/fs/os", "hostname").as_deref(),
            Some("edge-01")
        );
        assert_eq!(snapshot.attribute("/fs/os", "missing"), None);
        assert_eq!(snapshot.attribute("/fs/missing", "hostname"), None);
    }

    #[test]
    fn empty_path_reads_the_root_object() {
        let snapshot = ClientSnapshot::from(json!({ "os": "Linux", "cpus": 8 }));
        assert_eq!(snapshot.attribute("", "os").as_deref(), Some("Linux"));
        assert_eq!(snapshot.attribute("", "cpus").as_deref(), Some("8"));
    }

    #[test]
    fn structured_values_are_not_matchable() {
        let snapshot = ClientSnapshot::from(json!({ "mounts": ["/", "/home"] }));
        assert_eq!(snapshot.attribute("", "mounts"), None);
    }
}
