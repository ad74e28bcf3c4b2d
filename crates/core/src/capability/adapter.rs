//! Per-variant adapters that turn raw engine records into change-set entries.
//!
//! Every adapter canonicalizes paths with [`strip_revision`] and dates with
//! the timestamp codec. They differ in the zone used for zone-less dates:
//! legacy servers report wall-clock time in the server's configured zone,
//! 14.x servers report UTC.

use std::fmt;

use tracing::trace;

use super::version::CapabilityVariant;
use crate::changelog::{ChangeSetEntry, EditType, RawChange};
use crate::errors::TimestampError;
use crate::path::{revision_qualifier, strip_revision};
use crate::timestamp::CodecZone;

/// Opaque hints handed to an adapter at construction. Never interpreted
/// during resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AdapterHints {
    /// Baseline the build is pinned to, if any.
    pub baseline: Option<String>,
    /// Change request the build is working against, if any.
    pub request: Option<String>,
}

impl AdapterHints {
    pub fn new(baseline: Option<String>, request: Option<String>) -> Self {
        Self { baseline, request }
    }
}

/// Common interface of all capability adapters.
pub trait ScmAdapter: Send + Sync + fmt::Debug {
    fn variant(&self) -> CapabilityVariant;

    fn hints(&self) -> &AdapterHints;

    /// Zone used to read dates that carry no zone of their own.
    fn date_zone(&self) -> CodecZone;

    /// Decode one raw record.
    ///
    /// When the record has no explicit revision, the `;<revision>` qualifier
    /// of the raw path is used instead.
    fn decode_change(&self, raw: &RawChange) -> Result<ChangeSetEntry, TimestampError> {
        let path = strip_revision(&raw.path);
        let revision = raw.revision.clone().or_else(|| {
            revision_qualifier(&raw.path)
                .filter(|q| !q.is_empty())
                .map(str::to_string)
        });
        let date = self.date_zone().parse(&raw.date)?.instant();
        trace!(variant = %self.variant(), raw = %raw.path, %path, "decoded change");

        Ok(ChangeSetEntry {
            path,
            revision,
            date,
            author: raw.author.clone(),
            comment: raw.comment.clone(),
            edit_type: EditType::from_action(&raw.action),
            request: self.hints().request.clone(),
        })
    }
}

/// Adapter for servers before 14.x.
#[derive(Debug, Clone)]
pub struct LegacyAdapter {
    hints: AdapterHints,
    zone: CodecZone,
}

impl LegacyAdapter {
    pub fn new(hints: AdapterHints, zone: CodecZone) -> Self {
        Self { hints, zone }
    }
}

impl ScmAdapter for LegacyAdapter {
    fn variant(&self) -> CapabilityVariant {
        CapabilityVariant::Legacy
    }

    fn hints(&self) -> &AdapterHints {
        &self.hints
    }

    fn date_zone(&self) -> CodecZone {
        self.zone
    }
}

/// Adapter for 14.x and later.
#[derive(Debug, Clone)]
pub struct Dm14Adapter {
    hints: AdapterHints,
}

impl Dm14Adapter {
    pub fn new(hints: AdapterHints) -> Self {
        Self { hints }
    }
}

impl ScmAdapter for Dm14Adapter {
    fn variant(&self) -> CapabilityVariant {
        CapabilityVariant::Dm14
    }

    fn hints(&self) -> &AdapterHints {
        &self.hints
    }

    fn date_zone(&self) -> CodecZone {
        CodecZone::Utc
    }
}

impl CapabilityVariant {
    /// Build the adapter for this variant. `zone` is the configured server
    /// zone; variants that report UTC ignore it.
    pub fn adapter(self, hints: AdapterHints, zone: CodecZone) -> Box<dyn ScmAdapter> {
        match self {
            Self::Legacy => Box::new(LegacyAdapter::new(hints, zone)),
            Self::Dm14 => Box::new(Dm14Adapter::new(hints)),
        }
    }
}
