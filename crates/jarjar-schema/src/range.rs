//! Version ranges in Maven bracket notation.
//!
//! ```text
//! [1.0]          exactly 1.0
//! [1.0,2.0)      1.0 <= v < 2.0
//! [3.9.11,)      at least 3.9.11
//! (,1.0],[1.2,)  anything except (1.0, 1.2)
//! 1.0            recommended 1.0, anything permitted
//! ```
//!
//! A [`VersionRange`] always holds at least one interval, sorted ascending,
//! with no two intervals overlapping or touching. Emptiness is expressed as
//! `None` from [`VersionRange::intersect`], never as a value.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::version::ArtifactVersion;

/// Errors produced while parsing a version range.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    /// The specification was empty or only whitespace.
    #[error("Empty version range")]
    Empty,

    /// The specification is not valid bracket notation.
    #[error("Malformed version range '{spec}': {reason}")]
    Malformed {
        /// The offending specification as written.
        spec: String,
        /// What was wrong with it.
        reason: &'static str,
    },
}

fn malformed(spec: &str, reason: &'static str) -> RangeError {
    RangeError::Malformed {
        spec: spec.to_string(),
        reason,
    }
}

/// One end of an interval.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bound {
    /// Version at the boundary.
    pub version: ArtifactVersion,
    /// Whether the boundary version itself is part of the interval.
    pub inclusive: bool,
}

impl Bound {
    /// An inclusive bound at `version`.
    pub fn inclusive(version: ArtifactVersion) -> Self {
        Self {
            version,
            inclusive: true,
        }
    }

    /// An exclusive bound at `version`.
    pub fn exclusive(version: ArtifactVersion) -> Self {
        Self {
            version,
            inclusive: false,
        }
    }
}

/// Orders lower bounds: unbounded first, then by version, inclusive before exclusive.
fn cmp_lower(a: Option<&Bound>, b: Option<&Bound>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a
            .version
            .cmp(&b.version)
            .then_with(|| b.inclusive.cmp(&a.inclusive)),
    }
}

/// Orders upper bounds: by version, exclusive before inclusive, unbounded last.
fn cmp_upper(a: Option<&Bound>, b: Option<&Bound>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a
            .version
            .cmp(&b.version)
            .then_with(|| a.inclusive.cmp(&b.inclusive)),
    }
}

/// A single contiguous interval of versions; either end may be unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interval {
    lower: Option<Bound>,
    upper: Option<Bound>,
}

impl Interval {
    /// Build an interval, returning `None` if it contains no version.
    pub fn new(lower: Option<Bound>, upper: Option<Bound>) -> Option<Self> {
        if let (Some(lo), Some(hi)) = (&lower, &upper) {
            match lo.version.cmp(&hi.version) {
                Ordering::Greater => return None,
                Ordering::Equal if !(lo.inclusive && hi.inclusive) => return None,
                _ => {}
            }
        }
        Some(Self { lower, upper })
    }

    /// The interval `(,)` containing every version.
    pub fn unbounded() -> Self {
        Self {
            lower: None,
            upper: None,
        }
    }

    /// The interval `[v]`.
    pub fn exact(version: ArtifactVersion) -> Self {
        Self {
            lower: Some(Bound::inclusive(version.clone())),
            upper: Some(Bound::inclusive(version)),
        }
    }

    /// Lower bound, `None` if unbounded below.
    pub fn lower(&self) -> Option<&Bound> {
        self.lower.as_ref()
    }

    /// Upper bound, `None` if unbounded above.
    pub fn upper(&self) -> Option<&Bound> {
        self.upper.as_ref()
    }

    fn is_unbounded(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    fn is_exact(&self) -> bool {
        matches!((&self.lower, &self.upper), (Some(lo), Some(hi))
            if lo.inclusive && hi.inclusive && lo.version == hi.version)
    }

    /// True if `version` lies within this interval.
    pub fn contains(&self, version: &ArtifactVersion) -> bool {
        let above_lower = self.lower.as_ref().is_none_or(|lo| match version.cmp(&lo.version) {
            Ordering::Greater => true,
            Ordering::Equal => lo.inclusive,
            Ordering::Less => false,
        });
        let below_upper = self.upper.as_ref().is_none_or(|hi| match version.cmp(&hi.version) {
            Ordering::Less => true,
            Ordering::Equal => hi.inclusive,
            Ordering::Greater => false,
        });
        above_lower && below_upper
    }

    /// The overlap of two intervals, `None` if they are disjoint.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let lower = match cmp_lower(self.lower(), other.lower()) {
            Ordering::Less => other.lower.clone(),
            _ => self.lower.clone(),
        };
        let upper = match cmp_upper(self.upper(), other.upper()) {
            Ordering::Greater => other.upper.clone(),
            _ => self.upper.clone(),
        };
        Self::new(lower, upper)
    }

    /// True if `next` starts at or before the point where `self` ends, sharing
    /// at least one version.
    fn overlaps_next(&self, next: &Self) -> bool {
        match (&self.upper, &next.lower) {
            (None, _) | (_, None) => true,
            (Some(hi), Some(lo)) => match hi.version.cmp(&lo.version) {
                Ordering::Greater => true,
                Ordering::Equal => hi.inclusive && lo.inclusive,
                Ordering::Less => false,
            },
        }
    }

    /// True if `next` begins exactly where `self` ends with no gap.
    fn touches_next(&self, next: &Self) -> bool {
        match (&self.upper, &next.lower) {
            (Some(hi), Some(lo)) => hi.version == lo.version && (hi.inclusive || lo.inclusive),
            _ => false,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_exact() {
            if let Some(lo) = &self.lower {
                return write!(f, "[{}]", lo.version);
            }
        }
        match &self.lower {
            Some(lo) if lo.inclusive => write!(f, "[{}", lo.version)?,
            Some(lo) => write!(f, "({}", lo.version)?,
            None => f.write_str("(")?,
        }
        f.write_str(",")?;
        match &self.upper {
            Some(hi) if hi.inclusive => write!(f, "{}]", hi.version),
            Some(hi) => write!(f, "{})", hi.version),
            None => f.write_str(")"),
        }
    }
}

/// Sort intervals and fuse every pair that overlaps or touches.
fn merge(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.sort_by(|a, b| cmp_lower(a.lower(), b.lower()));

    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for next in intervals {
        if let Some(current) = merged.last_mut() {
            if current.overlaps_next(&next) || current.touches_next(&next) {
                if cmp_upper(next.upper(), current.upper()) == Ordering::Greater {
                    current.upper = next.upper;
                }
                continue;
            }
        }
        merged.push(next);
    }
    merged
}

/// A non-empty set of version intervals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    intervals: Vec<Interval>,
    recommended: Option<ArtifactVersion>,
}

impl VersionRange {
    /// Parse a range from bracket notation, or a bare recommended version.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError`] if the specification is empty, has unbalanced or
    /// misplaced brackets, describes an empty or inverted interval, or lists
    /// intervals that overlap or are out of order.
    pub fn parse(spec: &str) -> Result<Self, RangeError> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(RangeError::Empty);
        }

        if !trimmed.starts_with(['[', '(']) {
            if trimmed.contains(['[', ']', '(', ')', ',']) {
                return Err(malformed(spec, "brackets required around a range"));
            }
            return Ok(Self::with_recommended(ArtifactVersion::new(trimmed)));
        }

        let mut intervals: Vec<Interval> = Vec::new();
        let mut rest = trimmed;
        loop {
            let close = rest
                .find([']', ')'])
                .ok_or_else(|| malformed(spec, "unterminated interval"))?;
            let interval = parse_interval(spec, &rest[..=close])?;

            if let Some(previous) = intervals.last() {
                if previous.overlaps_next(&interval) {
                    return Err(malformed(spec, "intervals overlap or are out of order"));
                }
            }
            intervals.push(interval);

            rest = rest[close + 1..].trim_start();
            if rest.is_empty() {
                break;
            }
            rest = rest
                .strip_prefix(',')
                .map(str::trim_start)
                .ok_or_else(|| malformed(spec, "expected ',' between intervals"))?;
            if !rest.starts_with(['[', '(']) {
                return Err(malformed(spec, "expected an interval after ','"));
            }
        }

        Ok(Self {
            intervals: merge(intervals),
            recommended: None,
        })
    }

    /// `(,)`: every version.
    pub fn unbounded() -> Self {
        Self {
            intervals: vec![Interval::unbounded()],
            recommended: None,
        }
    }

    /// `[v]`: exactly one version.
    pub fn exact(version: ArtifactVersion) -> Self {
        Self {
            intervals: vec![Interval::exact(version)],
            recommended: None,
        }
    }

    /// `[v,)`: `version` or anything newer.
    pub fn at_least(version: ArtifactVersion) -> Self {
        Self {
            intervals: vec![Interval {
                lower: Some(Bound::inclusive(version)),
                upper: None,
            }],
            recommended: None,
        }
    }

    /// A bare version: anything permitted, `version` kept as a hint.
    pub fn with_recommended(version: ArtifactVersion) -> Self {
        Self {
            intervals: vec![Interval::unbounded()],
            recommended: Some(version),
        }
    }

    /// Build a range from arbitrary intervals, sorting and merging them.
    /// Returns `None` when `intervals` is empty.
    pub fn from_intervals(intervals: Vec<Interval>) -> Option<Self> {
        if intervals.is_empty() {
            return None;
        }
        Some(Self {
            intervals: merge(intervals),
            recommended: None,
        })
    }

    /// The sorted, disjoint intervals making up this range.
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// The recommended version of a bare-version range.
    pub fn recommended_version(&self) -> Option<&ArtifactVersion> {
        self.recommended.as_ref()
    }

    /// Every version written in the range: interval bounds, then the hint.
    pub fn versions(&self) -> impl Iterator<Item = &ArtifactVersion> {
        self.intervals
            .iter()
            .flat_map(|i| [i.lower(), i.upper()])
            .flatten()
            .map(|b| &b.version)
            .chain(self.recommended.as_ref())
    }

    /// True when the range places no restriction on versions.
    pub fn is_unrestricted(&self) -> bool {
        matches!(self.intervals.as_slice(), [only] if only.is_unbounded())
    }

    /// True if `version` falls within any interval.
    pub fn contains(&self, version: &ArtifactVersion) -> bool {
        self.intervals.iter().any(|i| i.contains(version))
    }

    /// Versions accepted by both ranges, or `None` if no version is.
    ///
    /// A recommended version survives only when neither range restricts
    /// anything; if both carry one, the greater is kept. Equal hints keep
    /// the lexicographically smaller literal so the result does not depend on
    /// operand order.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let pieces: Vec<Interval> = self
            .intervals
            .iter()
            .flat_map(|a| other.intervals.iter().filter_map(|b| a.intersect(b)))
            .collect();
        if pieces.is_empty() {
            return None;
        }

        let recommended = if self.is_unrestricted() && other.is_unrestricted() {
            match (&self.recommended, &other.recommended) {
                (Some(a), Some(b)) => Some(match b.cmp(a) {
                    Ordering::Greater => b.clone(),
                    Ordering::Equal if b.as_str() < a.as_str() => b.clone(),
                    _ => a.clone(),
                }),
                (a, b) => a.clone().or_else(|| b.clone()),
            }
        } else {
            None
        };

        Some(Self {
            intervals: merge(pieces),
            recommended,
        })
    }
}

fn parse_interval(spec: &str, text: &str) -> Result<Interval, RangeError> {
    let lower_inclusive = text.starts_with('[');
    let upper_inclusive = text.ends_with(']');
    let inner = &text[1..text.len() - 1];

    if inner.contains(['[', '(']) {
        return Err(malformed(spec, "nested brackets"));
    }

    let Some((lower, upper)) = inner.split_once(',') else {
        let version = inner.trim();
        if version.is_empty() {
            return Err(malformed(spec, "empty interval"));
        }
        if !(lower_inclusive && upper_inclusive) {
            return Err(malformed(spec, "a single version must be written [v]"));
        }
        return Ok(Interval::exact(ArtifactVersion::new(version)));
    };

    if upper.contains(',') {
        return Err(malformed(spec, "an interval has at most two bounds"));
    }

    let bound = |text: &str, inclusive: bool| {
        let text = text.trim();
        (!text.is_empty()).then(|| Bound {
            version: ArtifactVersion::new(text),
            inclusive,
        })
    };
    let lower = bound(lower, lower_inclusive);
    let upper = bound(upper, upper_inclusive);

    if let (Some(lo), Some(hi)) = (&lower, &upper) {
        if lo.version > hi.version {
            return Err(malformed(spec, "lower bound is greater than upper bound"));
        }
    }
    Interval::new(lower, upper).ok_or_else(|| malformed(spec, "interval contains no version"))
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(recommended) = &self.recommended {
            return write!(f, "{recommended}");
        }
        for (i, interval) in self.intervals.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{interval}")?;
        }
        Ok(())
    }
}

impl FromStr for VersionRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let spec = String::deserialize(deserializer)?;
        Self::parse(&spec).map_err(serde::de::Error::custom)
    }
}
