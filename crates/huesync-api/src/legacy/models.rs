use serde::Deserialize;
use serde_json::Value;

/// One entry of a legacy response array.
///
/// Exactly one of the two fields is normally present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyEntry {
    #[serde(default)]
    pub success: Option<Value>,
    #[serde(default)]
    pub error: Option<LegacyErrorBody>,
}

/// `{"type": 7, "address": "/lights/1/state/bri", "description": "..."}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyErrorBody {
    #[serde(rename = "type", default)]
    pub kind: u16,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub description: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_mixed_entries() {
        let entries: Vec<LegacyEntry> = serde_json::from_str(
            r#"[{"success": {"/lights/1/state/on": true}},
                {"error": {"type": 7, "address": "/lights/1/state/bri", "description": "invalid value"}}]"#,
        )
        .unwrap();

        assert!(entries[0].success.is_some());
        let err = entries[1].error.as_ref().unwrap();
        assert_eq!(err.kind, 7);
        assert_eq!(err.address, "/lights/1/state/bri");
    }
}
