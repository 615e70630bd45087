// Legacy API HTTP client
//
// Resources are addressed by their `id_v1` (e.g. `/lights/3`) plus an
// optional sub-path (`state`, `config`, `action`). The application key
// lives in the path, not a header.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::legacy::models::LegacyEntry;
use crate::status;
use crate::transport::{ApiResponse, HttpTransport, Method};

/// Client for the legacy protocol.
#[derive(Clone)]
pub struct LegacyClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: Endpoint,
}

impl LegacyClient {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoint: Endpoint) -> Self {
        Self {
            transport,
            endpoint,
        }
    }

    /// GET a legacy resource or collection as raw JSON.
    pub async fn get(&self, legacy_id: &str) -> Result<Value, Error> {
        let url = self.endpoint.legacy_url(legacy_id, None)?;
        let request = self.endpoint.legacy_request(Method::Get, url);
        let response = self.transport.execute(request).await?;
        check_status(&response)?;
        Ok(response.data)
    }

    /// PUT `body` to `{legacy_id}[/{subpath}]`; returns the `success` entries.
    pub async fn put(
        &self,
        legacy_id: &str,
        subpath: Option<&str>,
        body: Value,
    ) -> Result<Vec<Value>, Error> {
        let url = self.endpoint.legacy_url(legacy_id, subpath)?;
        let request = self.endpoint.legacy_request(Method::Put, url).json(body);
        let response = self.transport.execute(request).await?;
        unwrap_entries(response)
    }

    /// POST `body` to a collection (e.g. `/groups`); returns the new id.
    pub async fn post(&self, collection: &str, body: Value) -> Result<Option<String>, Error> {
        let url = self.endpoint.legacy_url(collection, None)?;
        let request = self.endpoint.legacy_request(Method::Post, url).json(body);
        let response = self.transport.execute(request).await?;
        let successes = unwrap_entries(response)?;

        Ok(successes.iter().find_map(|s| match s.get("id") {
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }))
    }

    /// DELETE a legacy resource.
    pub async fn delete(&self, legacy_id: &str) -> Result<Vec<Value>, Error> {
        let url = self.endpoint.legacy_url(legacy_id, None)?;
        let request = self.endpoint.legacy_request(Method::Delete, url);
        let response = self.transport.execute(request).await?;
        unwrap_entries(response)
    }
}

fn check_status(response: &ApiResponse) -> Result<(), Error> {
    match status::error_reason(response.status) {
        Some(reason) => Err(Error::Protocol {
            status: response.status,
            message: reason.to_owned(),
        }),
        None => Ok(()),
    }
}

/// Scan a `[{success}|{error}]` array, raising on the first error whose
/// mapped status is in the error-code table.
pub(crate) fn unwrap_entries(response: ApiResponse) -> Result<Vec<Value>, Error> {
    check_status(&response)?;

    let entries: Vec<LegacyEntry> = match response.data {
        Value::Null => Vec::new(),
        Value::Array(_) => {
            serde_json::from_value(response.data.clone()).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: response.data.to_string(),
            })?
        }
        other => {
            return Err(Error::Deserialization {
                message: "expected a legacy result array".into(),
                body: other.to_string(),
            });
        }
    };

    let mut successes = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(err) = entry.error {
            let mapped = status::legacy_error_status(err.kind);
            if mapped.is_some_and(status::is_error_status) {
                return Err(Error::Legacy {
                    kind: err.kind,
                    address: err.address,
                    description: err.description,
                    status: mapped,
                });
            }
            warn!(
                kind = err.kind,
                address = %err.address,
                description = %err.description,
                "Unrecognised legacy error type"
            );
        }
        if let Some(success) = entry.success {
            successes.push(success);
        }
    }

    debug!(count = successes.len(), "Legacy request accepted");
    Ok(successes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn embedded_error_raises_with_mapped_status() {
        let err = unwrap_entries(ApiResponse {
            status: 200,
            data: json!([
                {"success": {"/lights/1/state/on": true}},
                {"error": {"type": 3, "address": "/lights/9", "description": "resource not available"}}
            ]),
        })
        .unwrap_err();

        assert!(err.is_not_found(), "got: {err:?}");
        assert!(matches!(err, Error::Legacy { kind: 3, .. }));
    }

    #[test]
    fn unknown_error_type_is_logged_not_raised() {
        let ok = unwrap_entries(ApiResponse {
            status: 200,
            data: json!([{"error": {"type": 42, "address": "/x", "description": "?"}}]),
        });
        assert!(ok.is_ok_and(|v| v.is_empty()));
    }

    #[test]
    fn http_status_in_table_raises() {
        let err = unwrap_entries(ApiResponse { status: 401, data: Value::Null }).unwrap_err();
        assert_eq!(err.status(), Some(401));
    }
}
