// Current-protocol client
//
// Versioned JSON resources under `/clip/v2/resource`. Every response is the
// `{ errors: [...], data: [...] }` envelope; rejections are recognised by
// status code against the shared error-code table.

pub mod client;
pub mod types;

pub use client::ClipClient;
pub use types::{ClipEnvelope, ClipErrorEntry, ResourceIdentifier};
