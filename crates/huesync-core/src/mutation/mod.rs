// ── Mutation pipeline ──
//
// create / update / delete against the bridge. Each is an `impl Bridge`
// block keyed by identity; handles and drafts are thin callers.

pub(crate) mod create;
mod delete;
mod update;

pub use create::CreatedResource;
