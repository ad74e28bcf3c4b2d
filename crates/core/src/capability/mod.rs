//! Version-gated selection of the adapter used to talk to a server.

pub mod adapter;
pub mod resolver;
pub mod version;

pub use adapter::{AdapterHints, Dm14Adapter, LegacyAdapter, ScmAdapter};
pub use resolver::{CacheScope, CapabilityCache, ResolutionContext, VersionSource};
pub use version::{CapabilityVariant, ServerVersion};
