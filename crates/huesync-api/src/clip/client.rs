// Current-protocol HTTP client
//
// Builds addressed requests through the `Endpoint`, hands them to the
// shared `HttpTransport`, and unwraps the `{ errors, data }` envelope.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::clip::types::{ClipEnvelope, ResourceIdentifier};
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::status;
use crate::transport::{ApiResponse, HttpTransport, Method};

/// Client for the current protocol.
///
/// Cheap to clone; the transport is shared.
#[derive(Clone)]
pub struct ClipClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: Endpoint,
}

impl ClipClient {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoint: Endpoint) -> Self {
        Self {
            transport,
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Full snapshot: every resource the bridge knows about.
    pub async fn get_resources(&self) -> Result<Vec<Value>, Error> {
        let url = self.endpoint.resource_url(None, None)?;
        self.send(Method::Get, url, None).await
    }

    /// Every resource of one type.
    pub async fn get_resources_of(&self, rtype: &str) -> Result<Vec<Value>, Error> {
        let url = self.endpoint.resource_url(Some(rtype), None)?;
        self.send(Method::Get, url, None).await
    }

    /// A single resource. The bridge answers with a one-element array.
    pub async fn get_resource(&self, rtype: &str, id: &str) -> Result<Option<Value>, Error> {
        let url = self.endpoint.resource_url(Some(rtype), Some(id))?;
        let mut data = self.send(Method::Get, url, None).await?;
        Ok(if data.is_empty() {
            None
        } else {
            Some(data.swap_remove(0))
        })
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// POST a new resource; returns the identifiers the bridge assigned.
    pub async fn create(&self, rtype: &str, body: Value) -> Result<Vec<ResourceIdentifier>, Error> {
        let url = self.endpoint.resource_url(Some(rtype), None)?;
        let data = self.send(Method::Post, url, Some(body)).await?;
        Ok(identifiers(&data))
    }

    /// PUT a partial document onto an existing resource.
    pub async fn update(
        &self,
        rtype: &str,
        id: &str,
        body: Value,
    ) -> Result<Vec<ResourceIdentifier>, Error> {
        let url = self.endpoint.resource_url(Some(rtype), Some(id))?;
        let data = self.send(Method::Put, url, Some(body)).await?;
        Ok(identifiers(&data))
    }

    /// DELETE a resource.
    pub async fn delete(&self, rtype: &str, id: &str) -> Result<Vec<ResourceIdentifier>, Error> {
        let url = self.endpoint.resource_url(Some(rtype), Some(id))?;
        let data = self.send(Method::Delete, url, None).await?;
        Ok(identifiers(&data))
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn send(
        &self,
        method: Method,
        url: url::Url,
        body: Option<Value>,
    ) -> Result<Vec<Value>, Error> {
        let mut request = self.endpoint.clip_request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = self.transport.execute(request).await?;
        unwrap_envelope(response)
    }
}

/// Unwrap `{ errors, data }`, raising for statuses in the error-code table.
pub(crate) fn unwrap_envelope(response: ApiResponse) -> Result<Vec<Value>, Error> {
    let ApiResponse { status, data } = response;

    let envelope: ClipEnvelope = match data {
        Value::Null => ClipEnvelope::default(),
        Value::Object(_) => {
            serde_json::from_value(data.clone()).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: data.to_string(),
            })?
        }
        other => {
            if status::is_error_status(status) {
                return Err(Error::Protocol {
                    status,
                    message: other.as_str().map_or_else(|| other.to_string(), str::to_owned),
                });
            }
            return Err(Error::Deserialization {
                message: "expected an object envelope".into(),
                body: other.to_string(),
            });
        }
    };

    if let Some(reason) = status::error_reason(status) {
        let message = envelope
            .errors
            .first()
            .map(|e| e.description.clone())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| reason.to_owned());
        return Err(Error::Protocol { status, message });
    }

    for err in &envelope.errors {
        warn!(status, description = %err.description, "Bridge reported a non-fatal error");
    }
    debug!(status, items = envelope.data.len(), "Envelope unwrapped");

    Ok(envelope.data)
}

fn identifiers(data: &[Value]) -> Vec<ResourceIdentifier> {
    data.iter().filter_map(ResourceIdentifier::from_value).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn error_status_uses_first_description() {
        let err = unwrap_envelope(ApiResponse {
            status: 429,
            data: json!({"errors": [{"description": "slow down"}], "data": []}),
        })
        .unwrap_err();
        assert!(
            matches!(err, Error::Protocol { status: 429, ref message } if message == "slow down"),
            "got: {err:?}"
        );
    }

    #[test]
    fn error_status_without_body_uses_reason() {
        let err = unwrap_envelope(ApiResponse { status: 503, data: Value::Null }).unwrap_err();
        assert!(
            matches!(err, Error::Protocol { status: 503, ref message } if message == "Service Unavailable"),
            "got: {err:?}"
        );
    }

    #[test]
    fn multi_status_passes_through() {
        let data = unwrap_envelope(ApiResponse {
            status: 207,
            data: json!({"errors": [{"description": "partial"}], "data": [{"rid": "a", "rtype": "light"}]}),
        })
        .unwrap_or_default();
        assert_eq!(identifiers(&data), vec![ResourceIdentifier::new("a", "light")]);
    }

    #[test]
    fn html_error_page_is_protocol_error() {
        let err = unwrap_envelope(ApiResponse {
            status: 404,
            data: Value::String("<html>nope</html>".into()),
        })
        .unwrap_err();
        assert!(matches!(err, Error::Protocol { status: 404, .. }), "got: {err:?}");
    }
}
