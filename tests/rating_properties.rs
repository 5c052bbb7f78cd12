/// Property tests for table lookups, set resolution and loading.
///
/// Run with: cargo test --test rating_properties

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rating_engine::{
    AxisMethods, LoadStrategy, PointGroup, Rating, RatingError, RatingHeader, RatingMethod,
    RatingPoint, RatingSet, RatingTable, RatingsDocument, TableRating,
};

const SPEC_ID: &str = "PROP.Stage;Flow.Linear.Test";
const NESTED_SPEC_ID: &str = "PROP.Stage,Opening;Flow.Gates.Test";

// -- Strategy helpers --

/// Strictly ascending values built from positive integer steps.
fn arb_ascending(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<f64>> {
    (-1000i32..1000, prop::collection::vec(1u32..200, len)).prop_map(|(start, steps)| {
        let mut x = start as f64 / 10.0;
        steps
            .into_iter()
            .map(|s| {
                x += s as f64 / 10.0;
                x
            })
            .collect()
    })
}

fn arb_method() -> impl Strategy<Value = RatingMethod> {
    prop::sample::select(RatingMethod::ALL.to_vec())
}

fn arb_methods() -> impl Strategy<Value = AxisMethods> {
    (arb_method(), arb_method(), arb_method())
        .prop_map(|(in_range, low, high)| AxisMethods::new(in_range, low, high))
}

/// Pairs with strictly increasing dependent values.
fn arb_increasing_pairs() -> impl Strategy<Value = Vec<(f64, f64)>> {
    (2usize..12).prop_flat_map(|n| {
        (arb_ascending(n..n + 1), arb_ascending(n..n + 1))
            .prop_map(|(xs, ys)| xs.into_iter().zip(ys).collect())
    })
}

/// Strictly ascending integers. Tables divide them by ten once, so every
/// value is written and read back as the same `f64`.
fn arb_ascending_ints(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<i32>> {
    (-1000i32..1000, prop::collection::vec(1i32..200, len)).prop_map(|(start, steps)| {
        let mut n = start;
        steps
            .into_iter()
            .map(|s| {
                n += s;
                n
            })
            .collect()
    })
}

fn tenths(n: i32) -> f64 {
    n as f64 / 10.0
}

/// Single-parameter table with optional notes and one extension row on
/// each side of its range.
fn arb_extended_table() -> impl Strategy<Value = RatingTable> {
    (2usize..10)
        .prop_flat_map(|n| {
            (
                arb_ascending_ints(n + 2..n + 3),
                prop::collection::vec(-100_000i32..100_000, n + 2),
                prop::collection::vec(prop::option::of("[a-z]{1,8}"), n),
                arb_methods(),
            )
        })
        .prop_map(|(inds, deps, notes, methods)| {
            let mut points: Vec<RatingPoint> = inds
                .iter()
                .zip(&deps)
                .map(|(i, d)| RatingPoint::new(tenths(*i), tenths(*d)))
                .collect();
            let above = points.pop().unwrap();
            let below = points.remove(0);
            for (point, note) in points.iter_mut().zip(notes) {
                point.note = note;
            }
            RatingTable::from_points(&points, methods)
                .unwrap()
                .with_extension(&[below, above])
                .unwrap()
        })
}

/// Two-parameter table: one inner table per outer value.
fn arb_nested_table() -> impl Strategy<Value = RatingTable> {
    (2usize..5, 2usize..7)
        .prop_flat_map(|(outer, inner)| {
            let row = (
                arb_ascending_ints(inner..inner + 1),
                prop::collection::vec(-100_000i32..100_000, inner),
            );
            (
                arb_ascending_ints(outer..outer + 1),
                prop::collection::vec(row, outer),
                arb_methods(),
                arb_methods(),
            )
        })
        .prop_map(|(outer_inds, rows, outer_methods, inner_methods)| {
            let groups: Vec<PointGroup> = outer_inds
                .iter()
                .zip(rows)
                .map(|(o, (inds, deps))| PointGroup {
                    other_ind: vec![tenths(*o)],
                    points: inds
                        .iter()
                        .zip(&deps)
                        .map(|(i, d)| RatingPoint::new(tenths(*i), tenths(*d)))
                        .collect(),
                })
                .collect();
            RatingTable::from_point_groups(&groups, &[outer_methods, inner_methods]).unwrap()
        })
}

/// Spec id, units and one table per version.
fn arb_table_versions() -> impl Strategy<Value = (&'static str, Vec<&'static str>, Vec<RatingTable>)> {
    prop_oneof![
        prop::collection::vec(arb_extended_table(), 1..4)
            .prop_map(|tables| (SPEC_ID, vec!["ft", "cfs"], tables)),
        prop::collection::vec(arb_nested_table(), 1..4)
            .prop_map(|tables| (NESTED_SPEC_ID, vec!["ft", "ft", "cfs"], tables)),
    ]
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
}

fn linear() -> AxisMethods {
    AxisMethods::new(RatingMethod::Linear, RatingMethod::Linear, RatingMethod::Linear)
}

/// One rating per effective-date offset (days after 2000-01-01); rating `i`
/// multiplies its input by `i + 1`.
fn versioned_set(day_offsets: &[i64]) -> RatingSet {
    let ratings: Vec<Rating> = day_offsets
        .iter()
        .enumerate()
        .map(|(i, days)| {
            let header = RatingHeader::new("SWT", SPEC_ID, &["ft", "cfs"], epoch() + Duration::days(*days));
            let slope = (i + 1) as f64;
            let table = RatingTable::from_pairs(&[(0.0, 0.0), (100.0, 100.0 * slope)], linear()).unwrap();
            TableRating::new(header, table).unwrap().into()
        })
        .collect();
    RatingSet::new(Some("SWT"), SPEC_ID, ratings).unwrap()
}

fn single_table_set(pairs: &[(f64, f64)], methods: AxisMethods) -> RatingSet {
    let header = RatingHeader::new("SWT", SPEC_ID, &["ft", "cfs"], epoch());
    let table = RatingTable::from_pairs(pairs, methods).unwrap();
    RatingSet::new(Some("SWT"), SPEC_ID, vec![TableRating::new(header, table).unwrap().into()]).unwrap()
}

proptest! {
    /// A repeated or descending independent value is always rejected.
    #[test]
    fn non_ascending_tables_rejected(
        xs in arb_ascending(2..20),
        at in any::<prop::sample::Index>(),
        backwards in any::<bool>(),
    ) {
        let i = at.index(xs.len() - 1) + 1;
        let mut broken = xs.clone();
        broken[i] = if backwards { xs[i - 1] - 0.5 } else { xs[i - 1] };
        let pairs: Vec<(f64, f64)> = broken.iter().map(|x| (*x, 1.0)).collect();
        let result = RatingTable::from_pairs(&pairs, linear());
        prop_assert!(
            matches!(result, Err(RatingError::Construction(_))),
            "non-ascending table accepted: {:?}", broken
        );
    }

    /// Rating exactly at a row returns that row's dependent value, whatever
    /// the methods.
    #[test]
    fn exact_rows_returned_verbatim(
        xs in arb_ascending(1..15),
        seed in prop::collection::vec(-1.0e6f64..1.0e6, 15),
        methods in arb_methods(),
    ) {
        let pairs: Vec<(f64, f64)> = xs.iter().zip(&seed).map(|(x, y)| (*x, *y)).collect();
        let table = RatingTable::from_pairs(&pairs, methods).unwrap();
        for (x, y) in &pairs {
            prop_assert_eq!(table.rate(&[*x]).unwrap(), Some(*y));
        }
    }

    /// Forward then reverse recovers the input for monotonic linear tables.
    #[test]
    fn linear_round_trip(pairs in arb_increasing_pairs(), fraction in 0.0f64..=1.0) {
        let table = RatingTable::from_pairs(&pairs, linear()).unwrap();
        let lo = pairs[0].0;
        let hi = pairs[pairs.len() - 1].0;
        let x = lo + (hi - lo) * fraction;
        let y = table.rate(&[x]).unwrap().unwrap();
        let back = table.reverse_rate(y).unwrap().unwrap();
        let tolerance = 1e-9 * (1.0 + hi.abs().max(lo.abs()));
        prop_assert!((back - x).abs() <= tolerance, "x = {}, y = {}, back = {}", x, y, back);
    }

    /// A set's cached resolution never changes its answers: every query
    /// agrees with a fresh clone, whose cache starts empty.
    #[test]
    fn cache_is_transparent(
        steps in prop::collection::vec(1i64..2000, 1..6),
        queries in prop::collection::vec((-500i64..12000, 0.0f64..100.0), 1..30),
    ) {
        let mut day = 0;
        let offsets: Vec<i64> = steps.iter().map(|s| { day += s; day }).collect();
        let set = versioned_set(&offsets);
        for (days, v) in queries {
            let t = epoch() + Duration::days(days);
            let cached = set.rate(t, &[v]);
            let fresh = set.clone().rate(t, &[v]);
            prop_assert_eq!(cached, fresh);
        }
    }

    /// A lazily loaded set rates exactly like the eager set it was written
    /// from.
    #[test]
    fn lazy_matches_eager(
        pairs in arb_increasing_pairs(),
        methods in arb_methods(),
        queries in prop::collection::vec(-150.0f64..150.0, 1..20),
    ) {
        let eager = single_table_set(&pairs, methods);
        let doc = eager.to_document().unwrap();
        let lazy = doc.rating_set_with(SPEC_ID, LoadStrategy::Lazy).unwrap();
        lazy.materialize().unwrap();
        let t = epoch() + Duration::days(1);
        for v in queries {
            prop_assert_eq!(lazy.rate(t, &[v]), eager.rate(t, &[v]));
        }
    }

    /// Writing a set to JSON and reading it back rebuilds an equal set,
    /// extension rows and notes included.
    #[test]
    fn json_round_trip_rebuilds_set((spec_id, units, tables) in arb_table_versions()) {
        let ratings: Vec<Rating> = tables
            .into_iter()
            .enumerate()
            .map(|(i, table)| {
                let effective = epoch() + Duration::days(365 * i as i64);
                let header = RatingHeader::new("SWT", spec_id, &units, effective);
                TableRating::new(header, table).unwrap().into()
            })
            .collect();
        let set = RatingSet::new(Some("SWT"), spec_id, ratings).unwrap();

        let text = set.to_document().unwrap().to_json_pretty().unwrap();
        let rebuilt = RatingsDocument::from_json(&text).unwrap().rating_set(spec_id).unwrap();
        prop_assert_eq!(rebuilt, set, "document was:\n{}", text);
    }
}
