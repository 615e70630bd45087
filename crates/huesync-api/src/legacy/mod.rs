// Legacy-protocol client
//
// Path-addressed endpoints under `/api/{appKey}`. Responses are arrays of
// `{"success": {...}}` / `{"error": {...}}` entries rather than an envelope,
// so rejections are found by scanning the entries.

pub mod client;
pub mod models;

pub use client::LegacyClient;
pub use models::{LegacyEntry, LegacyErrorBody};
