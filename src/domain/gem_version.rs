//! RubyGems-compatible version numbers
//!
//! Versions are split into segments on `.` and on every digit/letter
//! boundary, so `1.5.0.beta2` becomes `[1, 5, 0, "beta", 2]`. A version
//! with any letter in it is a prerelease. Text segments sort below numeric
//! ones and missing trailing segments compare as zero.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([0-9]+(?:\.[0-9a-zA-Z]+)*(?:-[0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*)?)?\s*$")
        .unwrap()
});

static SEGMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+|[a-zA-Z]+").unwrap());

/// A single version segment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Number(u64),
    Text(String),
}

impl Segment {
    pub fn is_zero(&self) -> bool {
        matches!(self, Segment::Number(0))
    }

    pub fn as_number(&self) -> Option<u64> {
        match self {
            Segment::Number(n) => Some(*n),
            Segment::Text(_) => None,
        }
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Number(a), Segment::Number(b)) => a.cmp(b),
            (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
            (Segment::Text(_), Segment::Number(_)) => Ordering::Less,
            (Segment::Number(_), Segment::Text(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Number(n) => write!(f, "{}", n),
            Segment::Text(s) => f.write_str(s),
        }
    }
}

/// Error returned when a string is not a valid gem version
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed version number string {0}")]
pub struct MalformedVersion(pub String);

/// A RubyGems version
#[derive(Debug, Clone)]
pub struct GemVersion {
    original: String,
    segments: Vec<Segment>,
}

impl GemVersion {
    /// Parse a version string, rejecting anything RubyGems would reject
    pub fn parse(input: &str) -> Result<Self, MalformedVersion> {
        if !VERSION_RE.is_match(input) {
            return Err(MalformedVersion(input.to_string()));
        }

        let trimmed = input.trim();
        let original = if trimmed.is_empty() { "0" } else { trimmed };
        let normalized = original.replace('-', ".pre.");

        let mut segments = Vec::new();
        for m in SEGMENT_RE.find_iter(&normalized) {
            let text = m.as_str();
            let segment = if text.as_bytes()[0].is_ascii_digit() {
                let n = text
                    .parse::<u64>()
                    .map_err(|_| MalformedVersion(input.to_string()))?;
                Segment::Number(n)
            } else {
                Segment::Text(text.to_string())
            };
            segments.push(segment);
        }

        Ok(Self {
            original: original.to_string(),
            segments,
        })
    }

    /// Returns true if the string would parse as a version
    pub fn is_correct(input: &str) -> bool {
        Self::parse(input).is_ok()
    }

    /// Build a release version from numeric segments
    pub fn from_numbers(numbers: &[u64]) -> Self {
        let original = numbers
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(".");
        Self {
            original,
            segments: numbers.iter().copied().map(Segment::Number).collect(),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn is_prerelease(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Text(_)))
    }

    /// Numeric segments that precede the first text segment
    pub fn release_numbers(&self) -> Vec<u64> {
        self.segments
            .iter()
            .map_while(Segment::as_number)
            .collect()
    }

    /// The release part of a prerelease (`1.5.0.beta2` -> `1.5.0`)
    pub fn release(&self) -> GemVersion {
        if self.is_prerelease() {
            Self::from_numbers(&self.release_numbers())
        } else {
            self.clone()
        }
    }

    /// The exclusive ceiling used by `~>`: drops prerelease segments and the
    /// last remaining one, then increments what is left (`1.4.2` -> `1.5`)
    pub fn bump(&self) -> GemVersion {
        let mut numbers = self.release_numbers();
        if numbers.len() > 1 {
            numbers.pop();
        }
        match numbers.last_mut() {
            Some(last) => *last += 1,
            None => numbers.push(1),
        }
        Self::from_numbers(&numbers)
    }

    fn canonical_segments(&self) -> &[Segment] {
        let mut end = self.segments.len();
        while end > 1 && self.segments[end - 1].is_zero() {
            end -= 1;
        }
        &self.segments[..end]
    }
}

impl FromStr for GemVersion {
    type Err = MalformedVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Ord for GemVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let zero = Segment::Number(0);
        let limit = self.segments.len().max(other.segments.len());
        for i in 0..limit {
            let lhs = self.segments.get(i).unwrap_or(&zero);
            let rhs = other.segments.get(i).unwrap_or(&zero);
            match lhs.cmp(rhs) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for GemVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GemVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GemVersion {}

impl Hash for GemVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_segments().hash(state);
    }
}

impl fmt::Display for GemVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Serialize for GemVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.original)
    }
}

impl<'de> Deserialize<'de> for GemVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        GemVersion::parse(&raw).map_err(serde::de::Error::custom)
    }
}
