//! Property-based tests for the version range algebra.
//!
//! Ranges are generated over a small pool of boundary versions so that
//! intersections, gaps and shared endpoints come up often.

use proptest::prelude::*;

use jarjar_schema::{ArtifactVersion, Bound, Interval, VersionRange};

const POOL: [&str; 6] = ["1.0", "1.5", "2.0", "2.5", "3.0", "4.0"];

/// Probe versions: every pool member plus points between and beyond them.
const PROBES: [&str; 14] = [
    "0.1", "1.0-rc1", "1.0", "1.2", "1.5", "1.7", "2.0", "2.2", "2.5", "2.7", "3.0", "3.5", "4.0",
    "5.0",
];

fn bound() -> impl Strategy<Value = Option<Bound>> {
    prop_oneof![
        1 => Just(None::<Bound>),
        4 => (prop::sample::select(POOL.to_vec()), any::<bool>()).prop_map(|(version, inclusive)| {
            Some(Bound {
                version: ArtifactVersion::new(version),
                inclusive,
            })
        }),
    ]
}

fn interval() -> impl Strategy<Value = Interval> {
    (bound(), bound()).prop_filter_map("interval must be non-empty", |(lower, upper)| {
        Interval::new(lower, upper)
    })
}

fn range() -> impl Strategy<Value = VersionRange> {
    prop::collection::vec(interval(), 1..4)
        .prop_filter_map("range must be non-empty", VersionRange::from_intervals)
}

fn probes() -> Vec<ArtifactVersion> {
    PROBES.iter().copied().map(ArtifactVersion::new).collect()
}

proptest! {
    /// Printing a range and parsing it back yields the same range and text.
    #[test]
    fn print_parse_inverse(r in range()) {
        let printed = r.to_string();
        let parsed = VersionRange::parse(&printed).unwrap();
        prop_assert_eq!(&parsed, &r);
        prop_assert_eq!(parsed.to_string(), printed);
    }

    /// Intersection does not depend on operand order.
    #[test]
    fn intersect_is_symmetric(a in range(), b in range()) {
        prop_assert_eq!(a.intersect(&b), b.intersect(&a));
    }

    /// Grouping of a three-way intersection does not matter.
    #[test]
    fn intersect_is_associative(a in range(), b in range(), c in range()) {
        let left = a.intersect(&b).and_then(|ab| ab.intersect(&c));
        let right = b.intersect(&c).and_then(|bc| a.intersect(&bc));
        prop_assert_eq!(left, right);
    }

    /// A version is in the intersection exactly when it is in both operands.
    #[test]
    fn intersect_agrees_with_containment(a in range(), b in range()) {
        let both = a.intersect(&b);
        for probe in probes() {
            let expected = a.contains(&probe) && b.contains(&probe);
            let actual = both.as_ref().is_some_and(|r| r.contains(&probe));
            prop_assert_eq!(actual, expected, "probe {}", probe);
        }
    }

    /// Intervals stay sorted and never overlap or touch.
    #[test]
    fn intervals_are_disjoint_and_sorted(a in range(), b in range()) {
        if let Some(both) = a.intersect(&b) {
            for pair in both.intervals().windows(2) {
                let hi = pair[0].upper().unwrap();
                let lo = pair[1].lower().unwrap();
                prop_assert!(
                    hi.version < lo.version
                        || (hi.version == lo.version && !hi.inclusive && !lo.inclusive)
                );
            }
        }
    }

    /// Intersecting with yourself changes nothing.
    #[test]
    fn intersect_is_idempotent(a in range()) {
        prop_assert_eq!(a.intersect(&a), Some(a.clone()));
    }
}
