use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to a resource: `{ "rid": "...", "rtype": "light" }`.
///
/// Embedded in `owner`, `services`, `children`, `group` fields and returned
/// by every mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    pub rid: String,
    pub rtype: String,
}

impl ResourceIdentifier {
    pub fn new(rid: impl Into<String>, rtype: impl Into<String>) -> Self {
        Self {
            rid: rid.into(),
            rtype: rtype.into(),
        }
    }

    /// Read a `{rid, rtype}` object, ignoring anything malformed.
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            rid: value.get("rid")?.as_str()?.to_owned(),
            rtype: value.get("rtype")?.as_str()?.to_owned(),
        })
    }
}

/// One entry of the envelope's `errors` array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClipErrorEntry {
    #[serde(default)]
    pub description: String,
}

/// The `{ errors, data }` envelope wrapped around every response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClipEnvelope {
    #[serde(default)]
    pub errors: Vec<ClipErrorEntry>,
    #[serde(default)]
    pub data: Vec<Value>,
}
