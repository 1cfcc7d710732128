//! Trailing time windows
//!
//! Analytics requests select data with a relative duration anchored to the
//! time of the query, e.g. `-24h` for "the last 24 hours". The grammar is the
//! fixed-length subset of Flux duration literals: an optional leading `-`
//! followed by one or more `<integer><unit>` terms (`1h30m`, `-7d`).
//! Calendar units (`mo`, `y`) are not accepted.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::errors::WindowError;

/// Window used when a request does not name one.
pub const DEFAULT_WINDOW: &str = "-24h";

static RE_WINDOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?(?:[0-9]+(?:ns|us|µs|ms|s|m|h|d|w))+$").expect("window grammar")
});
static RE_TERM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)(ns|us|µs|ms|s|m|h|d|w)").expect("window term"));

/// A trailing window: "the `length` before now".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativeWindow {
    literal: String,
    nanos: i64,
}

impl RelativeWindow {
    /// Parse a duration literal such as `-24h` or `90m`.
    ///
    /// The sign is optional; the window always extends into the past.
    /// A window of zero total length is rejected.
    pub fn parse(literal: &str) -> Result<Self, WindowError> {
        if !RE_WINDOW.is_match(literal) {
            return Err(WindowError::Malformed(literal.to_string()));
        }

        let mut nanos: i64 = 0;
        for caps in RE_TERM.captures_iter(literal) {
            let overflow = || WindowError::Overflow(literal.to_string());
            let amount: i64 = caps[1].parse().map_err(|_| overflow())?;
            let term = amount
                .checked_mul(unit_nanos(&caps[2]))
                .ok_or_else(overflow)?;
            nanos = nanos.checked_add(term).ok_or_else(overflow)?;
        }
        if nanos == 0 {
            return Err(WindowError::Malformed(literal.to_string()));
        }

        Ok(Self {
            literal: literal.to_string(),
            nanos,
        })
    }

    /// The literal as supplied by the client.
    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// Window length as an unsigned Flux-style literal (`24h`).
    pub fn magnitude(&self) -> &str {
        self.literal.trim_start_matches('-')
    }

    /// Window length.
    pub fn length(&self) -> Duration {
        Duration::nanoseconds(self.nanos)
    }

    /// Earliest instant covered by the window when evaluated at `now`.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.length())
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Whether `time` lies within the window evaluated at `now` (both ends inclusive).
    pub fn contains(&self, now: DateTime<Utc>, time: DateTime<Utc>) -> bool {
        time >= self.start(now) && time <= now
    }
}

impl Default for RelativeWindow {
    fn default() -> Self {
        Self {
            literal: DEFAULT_WINDOW.to_string(),
            nanos: 24 * unit_nanos("h"),
        }
    }
}

fn unit_nanos(unit: &str) -> i64 {
    match unit {
        "ns" => 1,
        "us" | "µs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        "h" => 3600 * 1_000_000_000,
        "d" => 86400 * 1_000_000_000,
        "w" => 7 * 86400 * 1_000_000_000,
        _ => unreachable!("unit filtered by window grammar"),
    }
}

impl fmt::Display for RelativeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal)
    }
}

impl FromStr for RelativeWindow {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RelativeWindow {
    type Error = WindowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RelativeWindow> for String {
    fn from(window: RelativeWindow) -> Self {
        window.literal
    }
}
