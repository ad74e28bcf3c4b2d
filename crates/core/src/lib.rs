//! scmlink core library.
//!
//! The pieces a build server needs to interpret data coming back from an
//! external SCM engine: version-gated capability dispatch, canonicalization
//! of reported paths, a timestamp codec with tolerance-aware comparison,
//! and the change-log records built from them.

pub mod capability;
pub mod changelog;
pub mod config;
pub mod errors;
pub mod path;
pub mod session;
pub mod timestamp;

// Re-exports for convenience.
pub use capability::{CapabilityCache, CapabilityVariant, ScmAdapter, VersionSource};
pub use changelog::{ChangeLog, ChangeSetEntry, RawChange};
pub use config::LinkConfig;
pub use path::strip_revision;
pub use session::Session;
