//! Timestamp codec for dates reported by the SCM engine.
//!
//! The engine emits three textual shapes. Parsing accepts any of them,
//! formatting always emits the date-time shape:
//!
//! | priority | pattern | chrono format |
//! |----------|---------|---------------|
//! | 1 | `dd-MMM-yyyy HH:mm:ss` | `%d-%b-%Y %H:%M:%S` |
//! | 2 | `dd-MMM-yyyy` | `%d-%b-%Y` |
//! | 3 | `yyyy-MM-dd'T'HH:mm:ss'Z'` | `%Y-%m-%dT%H:%M:%SZ` |
//!
//! The date-time pattern is tried before the date-only one, otherwise the
//! looser pattern would match the date prefix and drop the time of day.
//!
//! Every operation takes an explicit time zone. The zone-less patterns are
//! read as wall-clock time in that zone; the RFC pattern carries a literal
//! `Z` and is always UTC. [`parse_local`] and [`format_local`] use the
//! process's local zone.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Utc,
};
use tracing::{debug, trace};

use crate::errors::TimestampError;

/// chrono format of the canonical date-time pattern.
pub const DATE_TIME_FORMAT: &str = "%d-%b-%Y %H:%M:%S";
/// chrono format of the date-only pattern.
pub const DATE_FORMAT: &str = "%d-%b-%Y";
/// chrono format of the RFC-style UTC pattern.
pub const RFC_UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

/// One of the textual shapes the engine uses for timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampPattern {
    /// `dd-MMM-yyyy HH:mm:ss`, wall-clock time in the caller's zone.
    DateTime,
    /// `dd-MMM-yyyy`, midnight in the caller's zone.
    Date,
    /// `yyyy-MM-dd'T'HH:mm:ss'Z'`, always UTC.
    RfcUtc,
}

impl TimestampPattern {
    /// All patterns in parse priority order.
    pub const PRIORITY: [TimestampPattern; 3] = [Self::DateTime, Self::Date, Self::RfcUtc];

    /// Position in [`PRIORITY`](Self::PRIORITY).
    pub fn index(self) -> usize {
        match self {
            Self::DateTime => 0,
            Self::Date => 1,
            Self::RfcUtc => 2,
        }
    }

    /// The chrono format string for this pattern.
    pub fn chrono_format(self) -> &'static str {
        match self {
            Self::DateTime => DATE_TIME_FORMAT,
            Self::Date => DATE_FORMAT,
            Self::RfcUtc => RFC_UTC_FORMAT,
        }
    }

    /// The pattern as the engine documents it.
    pub fn notation(self) -> &'static str {
        match self {
            Self::DateTime => "dd-MMM-yyyy HH:mm:ss",
            Self::Date => "dd-MMM-yyyy",
            Self::RfcUtc => "yyyy-MM-dd'T'HH:mm:ss'Z'",
        }
    }

    /// Parse the leading part of `text` as this pattern, ignoring whatever
    /// follows a complete match.
    fn parse_naive(self, text: &str) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime | Self::RfcUtc => {
                NaiveDateTime::parse_and_remainder(text, self.chrono_format())
                    .ok()
                    .map(|(dt, _)| dt)
            }
            Self::Date => NaiveDate::parse_and_remainder(text, DATE_FORMAT)
                .ok()
                .and_then(|(d, _)| d.and_hms_opt(0, 0, 0)),
        }
    }
}

impl fmt::Display for TimestampPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.notation())
    }
}

/// Try each pattern in priority order and return the first match.
fn parse_any(text: &str) -> Option<(TimestampPattern, NaiveDateTime)> {
    TimestampPattern::PRIORITY.iter().find_map(|pattern| {
        let naive = pattern.parse_naive(text)?;
        trace!(%pattern, "timestamp pattern matched");
        Some((*pattern, naive))
    })
}

// ---------------------------------------------------------------------------
// Parsed value
// ---------------------------------------------------------------------------

/// A point in time together with the pattern that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTimestamp {
    instant: DateTime<Utc>,
    pattern: TimestampPattern,
}

impl ParsedTimestamp {
    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    pub fn pattern(&self) -> TimestampPattern {
        self.pattern
    }

    /// Canonical rendering in `tz`, regardless of the parsing pattern.
    pub fn format_in<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: fmt::Display,
    {
        format(&self.instant, tz)
    }
}

// ---------------------------------------------------------------------------
// Codec operations
// ---------------------------------------------------------------------------

/// Parse `text` using the first pattern that matches.
///
/// Zone-less patterns are interpreted as wall-clock time in `tz`. A wall
/// clock reading that is ambiguous in `tz` resolves to the earlier instant;
/// one that falls into a gap is rejected.
pub fn parse<Tz: TimeZone>(text: &str, tz: &Tz) -> Result<ParsedTimestamp, TimestampError> {
    let (pattern, naive) =
        parse_any(text).ok_or_else(|| TimestampError::Unparseable(text.to_string()))?;

    let instant = match pattern {
        TimestampPattern::RfcUtc => Utc.from_utc_datetime(&naive),
        TimestampPattern::DateTime | TimestampPattern::Date => tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| TimestampError::NonexistentLocalTime(text.to_string()))?,
    };

    debug!(text, %pattern, %instant, "parsed timestamp");
    Ok(ParsedTimestamp { instant, pattern })
}

/// Render `instant` in `tz` using the canonical date-time pattern.
pub fn format<Tz: TimeZone>(instant: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    instant.with_timezone(tz).format(DATE_TIME_FORMAT).to_string()
}

/// [`parse`] in the process's local time zone.
pub fn parse_local(text: &str) -> Result<ParsedTimestamp, TimestampError> {
    parse(text, &Local)
}

/// [`format`] in the process's local time zone.
pub fn format_local(instant: &DateTime<Utc>) -> String {
    format(instant, &Local)
}

/// Strict check: `text` parses, and formatting the parsed value with the
/// same pattern gives back `text` (ignoring ASCII case).
///
/// Rejects inputs that only match as a prefix, such as `01-Jan-2020 extra`,
/// and non-canonical spellings such as `1-Jan-2020`.
pub fn validate(text: &str) -> bool {
    match parse_any(text) {
        Some((pattern, naive)) => naive
            .format(pattern.chrono_format())
            .to_string()
            .eq_ignore_ascii_case(text),
        None => false,
    }
}

/// Compare two instants, treating them as equal when they are at most
/// `tolerance_ms` milliseconds apart. The sign of the tolerance is ignored.
pub fn compare_with_tolerance(
    t1: &DateTime<Utc>,
    t2: &DateTime<Utc>,
    tolerance_ms: i64,
) -> Ordering {
    let tolerance = Duration::milliseconds(tolerance_ms.saturating_abs());
    let delta = t1.signed_duration_since(*t2);
    if delta <= tolerance && delta >= -tolerance {
        Ordering::Equal
    } else if delta < Duration::zero() {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

// ---------------------------------------------------------------------------
// Configured zone
// ---------------------------------------------------------------------------

/// A time zone as named in configuration: `local`, `utc`, or a fixed
/// offset such as `+05:30`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CodecZone {
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl CodecZone {
    /// [`parse`] in this zone.
    pub fn parse(&self, text: &str) -> Result<ParsedTimestamp, TimestampError> {
        match self {
            Self::Local => parse(text, &Local),
            Self::Utc => parse(text, &Utc),
            Self::Fixed(offset) => parse(text, offset),
        }
    }

    /// [`format`] in this zone.
    pub fn format(&self, instant: &DateTime<Utc>) -> String {
        match self {
            Self::Local => format(instant, &Local),
            Self::Utc => format(instant, &Utc),
            Self::Fixed(offset) => format(instant, offset),
        }
    }
}

impl fmt::Display for CodecZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Utc => write!(f, "utc"),
            Self::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

impl FromStr for CodecZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        if s.eq_ignore_ascii_case("utc") || s == "Z" {
            return Ok(Self::Utc);
        }

        let (sign, rest) = match s.chars().next() {
            Some('+') => (1, &s[1..]),
            Some('-') => (-1, &s[1..]),
            _ => return Err(format!("expected 'local', 'utc' or +HH:MM, got '{}'", s)),
        };
        let (hours, minutes) = rest
            .split_once(':')
            .ok_or_else(|| format!("offset '{}' must be in +HH:MM form", s))?;
        let hours: i32 = hours
            .parse()
            .map_err(|_| format!("invalid hours in offset '{}'", s))?;
        let minutes: i32 = minutes
            .parse()
            .map_err(|_| format!("invalid minutes in offset '{}'", s))?;
        if !(0..60).contains(&minutes) {
            return Err(format!("invalid minutes in offset '{}'", s));
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Self::Fixed)
            .ok_or_else(|| format!("offset '{}' is out of range", s))
    }
}
