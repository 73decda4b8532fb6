//! Maven-style artifact versions.
//!
//! A version string is split into numeric and qualifier segments on `.`,
//! `-`, `_`, `+` and on every digit/letter transition, so `1.2.0-beta3`
//! becomes `[1, 2, "beta", 3]` after normalization. Parsing never fails:
//! a string with no digits is simply all qualifier.
//!
//! Ordering, position by position:
//! - numbers compare numerically (any length);
//! - a number is greater than a qualifier;
//! - a missing segment is less than a number but greater than a qualifier,
//!   so `1.0 < 1.0.1` while `1.0-rc1 < 1.0`;
//! - qualifiers rank `alpha < beta < milestone < rc < snapshot < other`,
//!   with other qualifiers compared lexicographically.
//!
//! Normalization drops zero numbers that precede a qualifier or the end
//! (`1.0.0 == 1`) and the release aliases `ga`, `final` and `release`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single normalized segment of a version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    /// Decimal digits without leading zeros (`"0"` for zero).
    Number(String),
    /// Lowercased qualifier with aliases applied.
    Qualifier(String),
}

impl Segment {
    fn is_zero(&self) -> bool {
        matches!(self, Self::Number(digits) if digits == "0")
    }

    /// Ordering of this segment against a position the other version lacks.
    fn cmp_missing(&self) -> Ordering {
        match self {
            Self::Number(_) => Ordering::Greater,
            Self::Qualifier(_) => Ordering::Less,
        }
    }
}

fn qualifier_rank(qualifier: &str) -> u8 {
    match qualifier {
        "alpha" => 0,
        "beta" => 1,
        "milestone" => 2,
        "rc" => 3,
        "snapshot" => 4,
        _ => 5,
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Self::Number(_), Self::Qualifier(_)) => Ordering::Greater,
            (Self::Qualifier(_), Self::Number(_)) => Ordering::Less,
            (Self::Qualifier(a), Self::Qualifier(b)) => qualifier_rank(a)
                .cmp(&qualifier_rank(b))
                .then_with(|| a.cmp(b)),
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, '.' | '-' | '_' | '+')
}

fn trim_zeros(segments: &mut Vec<Segment>) {
    while segments.last().is_some_and(Segment::is_zero) {
        segments.pop();
    }
}

fn push_qualifier(segments: &mut Vec<Segment>, word: &str, followed_by_digit: bool) {
    let word = match (word, followed_by_digit) {
        ("a", true) => "alpha",
        ("b", true) => "beta",
        ("m", true) => "milestone",
        ("cr", _) => "rc",
        (other, _) => other,
    };
    trim_zeros(segments);
    if matches!(word, "ga" | "final" | "release") {
        return;
    }
    segments.push(Segment::Qualifier(word.to_string()));
}

fn tokenize(literal: &str) -> Vec<Segment> {
    let chars: Vec<char> = literal.to_lowercase().chars().collect();
    let mut segments = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if is_separator(chars[i]) {
            i += 1;
            continue;
        }

        let start = i;
        if chars[i].is_ascii_digit() {
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let digits: String = chars[start..i].iter().collect();
            let trimmed = digits.trim_start_matches('0');
            let digits = if trimmed.is_empty() { "0" } else { trimmed };
            segments.push(Segment::Number(digits.to_string()));
        } else {
            while i < chars.len() && !chars[i].is_ascii_digit() && !is_separator(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let followed_by_digit = chars.get(i).is_some_and(char::is_ascii_digit);
            push_qualifier(&mut segments, &word, followed_by_digit);
        }
    }

    trim_zeros(&mut segments);
    segments
}

/// An ordered artifact version that remembers its original literal.
#[derive(Debug, Clone)]
pub struct ArtifactVersion {
    literal: String,
    segments: Vec<Segment>,
}

impl ArtifactVersion {
    /// Parse a version string. Never fails.
    pub fn new(literal: impl Into<String>) -> Self {
        let literal = literal.into();
        let segments = tokenize(&literal);
        Self { literal, segments }
    }

    /// The version exactly as it was written.
    pub fn as_str(&self) -> &str {
        &self.literal
    }

    /// True if the literal can be written inside a version range and read
    /// back unchanged: non-empty, no surrounding whitespace, and none of the
    /// range delimiters `[ ] ( ) ,`.
    pub fn is_well_formed(&self) -> bool {
        let literal = self.literal.as_str();
        !literal.is_empty()
            && literal.trim() == literal
            && !literal.contains(['[', ']', '(', ')', ','])
    }
}

impl Ord for ArtifactVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut left = self.segments.iter();
        let mut right = other.segments.iter();
        loop {
            let ordering = match (left.next(), right.next()) {
                (None, None) => return Ordering::Equal,
                (Some(a), Some(b)) => a.cmp(b),
                (Some(a), None) => a.cmp_missing(),
                (None, Some(b)) => b.cmp_missing().reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
    }
}

impl PartialOrd for ArtifactVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ArtifactVersion {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for ArtifactVersion {}

impl Hash for ArtifactVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl fmt::Display for ArtifactVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal)
    }
}

impl AsRef<str> for ArtifactVersion {
    fn as_ref(&self) -> &str {
        &self.literal
    }
}

impl From<&str> for ArtifactVersion {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ArtifactVersion {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl Serialize for ArtifactVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.literal)
    }
}

impl<'de> Deserialize<'de> for ArtifactVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}
