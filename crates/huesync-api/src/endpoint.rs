use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::Error;
use crate::transport::{ApiRequest, Method};

const APP_KEY_HEADER: &str = "hue-application-key";

/// How the bridge is reached.
///
/// Determines path prefixes, auth headers, and certificate policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Directly on the LAN. Bridges ship self-signed certificates, so
    /// verification is relaxed unless a CA is configured.
    Local,
    /// Through the remote relay with a bearer token.
    Remote,
}

impl Access {
    /// Prefix for the current protocol and the event stream.
    pub fn route_prefix(self) -> &'static str {
        match self {
            Self::Local => "",
            Self::Remote => "/route",
        }
    }

    /// Root segment of the legacy protocol, followed by the application key.
    pub fn legacy_root(self) -> &'static str {
        match self {
            Self::Local => "/api",
            Self::Remote => "/bridge",
        }
    }
}

/// Addressing and credentials for one bridge.
///
/// Builds URLs for both protocols and the event stream, and stamps requests
/// with the right headers for the access mode.
#[derive(Debug, Clone)]
pub struct Endpoint {
    base: Url,
    app_key: SecretString,
    access: Access,
    bearer: Option<SecretString>,
    verify_local: bool,
}

impl Endpoint {
    /// A bridge reached directly at `base` (e.g. `https://192.168.1.20`).
    pub fn local(base: Url, app_key: SecretString) -> Self {
        Self {
            base,
            app_key,
            access: Access::Local,
            bearer: None,
            verify_local: false,
        }
    }

    /// A bridge reached through the relay at `relay` with a bearer token.
    pub fn remote(relay: Url, app_key: SecretString, access_token: SecretString) -> Self {
        Self {
            base: relay,
            app_key,
            access: Access::Remote,
            bearer: Some(access_token),
            verify_local: false,
        }
    }

    /// Verify certificates on local requests too (a CA was configured).
    #[must_use]
    pub fn with_local_verification(mut self, verify: bool) -> Self {
        self.verify_local = verify;
        self
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn is_remote(&self) -> bool {
        self.access == Access::Remote
    }

    fn verify_tls(&self) -> bool {
        match self.access {
            Access::Local => self.verify_local,
            Access::Remote => true,
        }
    }

    fn join(&self, path: &str) -> Result<Url, Error> {
        let base = self.base.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}{path}"))?)
    }

    // ── URLs ─────────────────────────────────────────────────────────

    /// `{base}[/route]/clip/v2/resource[/{rtype}[/{id}]]`
    pub fn resource_url(&self, rtype: Option<&str>, id: Option<&str>) -> Result<Url, Error> {
        let mut path = format!("{}/clip/v2/resource", self.access.route_prefix());
        if let Some(rtype) = rtype {
            path.push('/');
            path.push_str(rtype);
            if let Some(id) = id {
                path.push('/');
                path.push_str(id);
            }
        }
        self.join(&path)
    }

    /// `{base}[/route]/eventstream/clip/v2`
    pub fn eventstream_url(&self) -> Result<Url, Error> {
        self.join(&format!("{}/eventstream/clip/v2", self.access.route_prefix()))
    }

    /// `{base}/api/{appKey}{legacyId}[/{subpath}]`, or `/bridge/...` remotely.
    ///
    /// `legacy_id` is the resource's `id_v1` (e.g. `/lights/3`) or a bare
    /// collection (e.g. `/groups`). An empty `subpath` addresses the root.
    pub fn legacy_url(&self, legacy_id: &str, subpath: Option<&str>) -> Result<Url, Error> {
        let mut path = format!(
            "{}/{}{}",
            self.access.legacy_root(),
            self.app_key.expose_secret(),
            legacy_id
        );
        if let Some(sub) = subpath.filter(|s| !s.is_empty()) {
            path.push('/');
            path.push_str(sub.trim_start_matches('/'));
        }
        self.join(&path)
    }

    // ── Requests ─────────────────────────────────────────────────────

    fn with_bearer(&self, request: ApiRequest) -> ApiRequest {
        match self.bearer {
            Some(ref token) => {
                request.header("Authorization", format!("Bearer {}", token.expose_secret()))
            }
            None => request,
        }
    }

    /// Request against the current protocol or the event stream.
    pub fn clip_request(&self, method: Method, url: Url) -> ApiRequest {
        let request = ApiRequest::new(method, url)
            .verify_tls(self.verify_tls())
            .header(APP_KEY_HEADER, self.app_key.expose_secret());
        self.with_bearer(request)
    }

    /// Request against the legacy protocol. The key travels in the path.
    pub fn legacy_request(&self, method: Method, url: Url) -> ApiRequest {
        let request = ApiRequest::new(method, url).verify_tls(self.verify_tls());
        self.with_bearer(request)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn local() -> Endpoint {
        Endpoint::local(
            Url::parse("https://10.0.0.2/").unwrap(),
            SecretString::from("KEY"),
        )
    }

    fn remote() -> Endpoint {
        Endpoint::remote(
            Url::parse("https://api.meethue.com").unwrap(),
            SecretString::from("KEY"),
            SecretString::from("TOKEN"),
        )
    }

    #[test]
    fn local_urls() {
        let ep = local();
        insta::assert_snapshot!(
            ep.resource_url(None, None).unwrap(),
            @"https://10.0.0.2/clip/v2/resource"
        );
        insta::assert_snapshot!(
            ep.resource_url(Some("light"), Some("abc")).unwrap(),
            @"https://10.0.0.2/clip/v2/resource/light/abc"
        );
        insta::assert_snapshot!(
            ep.eventstream_url().unwrap(),
            @"https://10.0.0.2/eventstream/clip/v2"
        );
        insta::assert_snapshot!(
            ep.legacy_url("/lights/3", Some("state")).unwrap(),
            @"https://10.0.0.2/api/KEY/lights/3/state"
        );
        insta::assert_snapshot!(
            ep.legacy_url("/sensors/7", Some("")).unwrap(),
            @"https://10.0.0.2/api/KEY/sensors/7"
        );
    }

    #[test]
    fn remote_urls() {
        let ep = remote();
        insta::assert_snapshot!(
            ep.resource_url(Some("scene"), None).unwrap(),
            @"https://api.meethue.com/route/clip/v2/resource/scene"
        );
        insta::assert_snapshot!(
            ep.eventstream_url().unwrap(),
            @"https://api.meethue.com/route/eventstream/clip/v2"
        );
        insta::assert_snapshot!(
            ep.legacy_url("/groups", None).unwrap(),
            @"https://api.meethue.com/bridge/KEY/groups"
        );
    }

    #[test]
    fn local_requests_relax_tls_and_carry_key() {
        let ep = local();
        let req = ep.clip_request(Method::Get, ep.resource_url(None, None).unwrap());
        assert!(!req.verify_tls);
        assert_eq!(req.headers.get(APP_KEY_HEADER).map(String::as_str), Some("KEY"));
        assert!(!req.headers.contains_key("Authorization"));

        let verified = local().with_local_verification(true);
        let req = verified.legacy_request(Method::Put, verified.legacy_url("/lights/1", None).unwrap());
        assert!(req.verify_tls);
    }

    #[test]
    fn remote_requests_carry_bearer() {
        let ep = remote();
        let req = ep.clip_request(Method::Put, ep.resource_url(Some("light"), Some("x")).unwrap());
        assert!(req.verify_tls);
        assert_eq!(
            req.headers.get("Authorization").map(String::as_str),
            Some("Bearer TOKEN")
        );
        assert!(req.headers.contains_key(APP_KEY_HEADER));

        let legacy = ep.legacy_request(Method::Put, ep.legacy_url("/lights/1", Some("state")).unwrap());
        assert!(!legacy.headers.contains_key(APP_KEY_HEADER));
        assert!(legacy.headers.contains_key("Authorization"));
    }
}
