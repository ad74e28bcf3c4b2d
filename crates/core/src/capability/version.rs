//! Server version tokens and the variant thresholds they select.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Characters that may terminate the dotted-numeric prefix of a version
/// string, besides whitespace and end of input.
const PREFIX_TERMINATORS: [char; 4] = ['-', '+', '_', '('];

/// Numeric view of a server version string.
///
/// Holds the components of the leading dotted-numeric prefix: `14.3.3`
/// becomes `[14, 3, 3]`, `14.5 SP1` becomes `[14, 5]`. A string that does
/// not start with such a prefix (a release codename like `2009R`) yields
/// the empty token, see [`is_known`](Self::is_known).
///
/// Ordering is lexicographic with missing trailing components read as 0, so
/// `14` == `14.0.0` < `14.0.1`.
#[derive(Debug, Clone, Default)]
pub struct ServerVersion {
    components: Vec<u32>,
}

impl ServerVersion {
    pub fn new(components: Vec<u32>) -> Self {
        Self { components }
    }

    /// Parse the leading dotted-numeric prefix of `raw`.
    ///
    /// The major component must be all digits and end the prefix or be
    /// followed by `.`; the prefix itself ends at end of input, whitespace or
    /// one of `-+_(`. A major running into a letter (`2009R`) gives the empty
    /// token. Later components keep their leading digits and stop the prefix
    /// at the first non-digit, so `14.3a` is `[14, 3]` and `14.` is `[14]`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let end = trimmed
            .find(|c: char| c.is_whitespace() || PREFIX_TERMINATORS.contains(&c))
            .unwrap_or(trimmed.len());
        let mut parts = trimmed[..end].split('.');

        let major = match parts.next() {
            Some(part) if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) => {
                match part.parse::<u32>() {
                    Ok(n) => n,
                    Err(_) => return Self::default(),
                }
            }
            _ => return Self::default(),
        };

        let mut components = vec![major];
        for part in parts {
            let digits = part.bytes().take_while(u8::is_ascii_digit).count();
            match part[..digits].parse::<u32>() {
                Ok(n) => components.push(n),
                Err(_) => break,
            }
            if digits < part.len() {
                break;
            }
        }
        Self { components }
    }

    /// `false` for the empty token produced by unparseable input.
    pub fn is_known(&self) -> bool {
        !self.components.is_empty()
    }

    pub fn components(&self) -> &[u32] {
        &self.components
    }

    /// First component, or `None` for the empty token.
    pub fn major(&self) -> Option<u32> {
        self.components.first().copied()
    }
}

impl Ord for ServerVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| {
                let a = self.components.get(i).copied().unwrap_or(0);
                let b = other.components.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for ServerVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ServerVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ServerVersion {}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_known() {
            return write!(f, "<unknown>");
        }
        let parts: Vec<String> = self.components.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// The adapter generation used to talk to a server.
///
/// Adding support for a new server line means adding a variant here and a
/// threshold rule in [`CapabilityVariant::for_version`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityVariant {
    /// Servers before 14.x, and any server whose version can't be read.
    Legacy,
    /// 14.x and later.
    Dm14,
}

impl CapabilityVariant {
    /// Lowest version served by [`CapabilityVariant::Dm14`].
    pub const DM14_THRESHOLD: u32 = 14;

    /// Select the variant for a parsed version. The empty token selects
    /// [`Legacy`](Self::Legacy).
    pub fn for_version(version: &ServerVersion) -> Self {
        if version.is_known() && *version >= ServerVersion::new(vec![Self::DM14_THRESHOLD]) {
            Self::Dm14
        } else {
            Self::Legacy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Dm14 => "dm14",
        }
    }
}

impl fmt::Display for CapabilityVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotted_versions() {
        assert_eq!(ServerVersion::parse("14.3.3").components(), &[14, 3, 3]);
        assert_eq!(ServerVersion::parse("12.2.2.5").components(), &[12, 2, 2, 5]);
        assert_eq!(ServerVersion::parse("  10 ").components(), &[10]);
    }

    #[test]
    fn test_parse_prefix_with_suffix() {
        assert_eq!(ServerVersion::parse("14.5 SP1").components(), &[14, 5]);
        assert_eq!(ServerVersion::parse("14.1-beta").components(), &[14, 1]);
        assert_eq!(ServerVersion::parse("12.2(build 7)").components(), &[12, 2]);
    }

    #[test]
    fn test_parse_codenames_are_unknown() {
        for raw in ["2009R", "2009R2", "Dimensions CM", "", "v14", ".14", "14a.3"] {
            let token = ServerVersion::parse(raw);
            assert!(!token.is_known(), "{:?} should be unknown", raw);
            assert_eq!(token.major(), None);
        }
    }

    #[test]
    fn test_parse_minor_stops_at_first_non_digit() {
        assert_eq!(ServerVersion::parse("14.3a").components(), &[14, 3]);
        assert_eq!(ServerVersion::parse("14.3.3b2").components(), &[14, 3, 3]);
        assert_eq!(ServerVersion::parse("14.").components(), &[14]);
        assert_eq!(ServerVersion::parse("14.x").components(), &[14]);
        assert_eq!(ServerVersion::parse("14..3").components(), &[14]);
        assert_eq!(ServerVersion::parse("12.2b").components(), &[12, 2]);
    }

    #[test]
    fn test_parse_overflow_is_unknown() {
        assert!(!ServerVersion::parse("99999999999.1").is_known());
        assert_eq!(ServerVersion::parse("14.99999999999").components(), &[14]);
    }

    #[test]
    fn test_ordering_pads_with_zero() {
        assert_eq!(ServerVersion::parse("14"), ServerVersion::parse("14.0.0"));
        assert!(ServerVersion::parse("14.0.1") > ServerVersion::parse("14"));
        assert!(ServerVersion::parse("12.2.2.5") < ServerVersion::parse("14"));
        assert!(ServerVersion::parse("9.9") < ServerVersion::parse("10.0"));
    }

    #[test]
    fn test_variant_thresholds() {
        assert_eq!(
            CapabilityVariant::for_version(&ServerVersion::parse("14.3.3")),
            CapabilityVariant::Dm14
        );
        assert_eq!(
            CapabilityVariant::for_version(&ServerVersion::parse("14")),
            CapabilityVariant::Dm14
        );
        assert_eq!(
            CapabilityVariant::for_version(&ServerVersion::parse("21.1")),
            CapabilityVariant::Dm14
        );
        assert_eq!(
            CapabilityVariant::for_version(&ServerVersion::parse("12.2.2.5")),
            CapabilityVariant::Legacy
        );
        assert_eq!(
            CapabilityVariant::for_version(&ServerVersion::parse("13.9.9")),
            CapabilityVariant::Legacy
        );
        assert_eq!(
            CapabilityVariant::for_version(&ServerVersion::parse("2009R")),
            CapabilityVariant::Legacy
        );
        for raw in ["14.3a", "14.3.3b2", "14.", "14.x"] {
            assert_eq!(
                CapabilityVariant::for_version(&ServerVersion::parse(raw)),
                CapabilityVariant::Dm14,
                "{:?} has major 14",
                raw
            );
        }
        assert_eq!(
            CapabilityVariant::for_version(&ServerVersion::parse("13.9z")),
            CapabilityVariant::Legacy
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ServerVersion::parse("14.3.3").to_string(), "14.3.3");
        assert_eq!(ServerVersion::parse("2009R").to_string(), "<unknown>");
        assert_eq!(CapabilityVariant::Dm14.to_string(), "dm14");
    }
}
