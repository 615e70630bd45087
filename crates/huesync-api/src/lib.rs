//! Async wire layer for Hue-style lighting bridges.
//!
//! Two incompatible HTTP surfaces live side by side:
//!
//! - **Current protocol** ([`ClipClient`]): versioned JSON resources under
//!   `/clip/v2/resource`, authenticated with the `hue-application-key` header.
//! - **Legacy protocol** ([`LegacyClient`]): path-addressed endpoints under
//!   `/api/{appKey}`, still required for a handful of settings.
//!
//! Both are built on the [`HttpTransport`] abstraction so the engine in
//! `huesync-core` can be driven by an in-memory spy in tests. The
//! server-sent event channel is consumed through [`StreamTransport`] and
//! decoded by [`eventstream`].

pub mod clip;
pub mod endpoint;
pub mod error;
pub mod eventstream;
pub mod legacy;
pub mod status;
pub mod transport;

pub use clip::{ClipClient, ResourceIdentifier};
pub use endpoint::Endpoint;
pub use error::Error;
pub use eventstream::{EventStreamClient, ReconnectConfig, StreamEvent, StreamEventKind};
pub use legacy::LegacyClient;
pub use transport::{
    ApiRequest, ApiResponse, FrameStream, HttpTransport, Method, ReqwestTransport, StreamTransport,
    TlsMode, TransportConfig,
};
