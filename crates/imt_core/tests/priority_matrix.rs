use pretty_assertions::assert_eq;
use proptest::prelude::*;

use imt_core::domain::{DraftField, Priority, PriorityOverride};
use imt_core::priority::{calculate, lookup, ImpactBucket, PriorityError, Urgency};

#[test]
fn matrix_spot_checks() {
    let cases = [
        (1, 5, Priority::P2),
        (1, 11, Priority::P1),
        (2, 50, Priority::P2),
        (2, 51, Priority::P1),
        (3, 25, Priority::P3),
        (3, 100, Priority::P2),
        (3, 501, Priority::P1),
        (4, 0, Priority::P4),
        (4, 300, Priority::P2),
        (5, 10, Priority::P4),
        (5, 10_000, Priority::P2),
    ];
    for (urgency, users, expected) in cases {
        let result = calculate(urgency, users, None).expect("in-range input");
        assert_eq!(
            result.final_priority, expected,
            "urgency={urgency} users={users}"
        );
        assert_eq!(result.computed, expected);
        assert!(!result.is_overridden());
    }
}

#[test]
fn result_records_its_inputs() {
    let result = calculate(3, 25, None).unwrap();
    assert_eq!(result.urgency.value(), 3);
    assert_eq!(result.impact_bucket, ImpactBucket::Minor);
    assert_eq!(result.override_priority, None);
    assert_eq!(result.justification, None);
}

#[test]
fn override_supersedes_but_keeps_computed_tier() {
    let o = PriorityOverride::new(Priority::P1, "CEO cannot send mail");
    let result = calculate(3, 25, Some(&o)).unwrap();
    assert_eq!(result.final_priority, Priority::P1);
    assert_eq!(result.computed, Priority::P3);
    assert_eq!(result.override_priority, Some(Priority::P1));
    assert_eq!(result.justification.as_deref(), Some("CEO cannot send mail"));
    assert!(result.is_overridden());
}

#[test]
fn out_of_range_urgency_is_invalid_input() {
    for urgency in [0, 6, -1, 99] {
        let err = calculate(urgency, 10, None).unwrap_err();
        let PriorityError::InvalidInput { field, .. } = err;
        assert_eq!(field, DraftField::Urgency);
    }
}

#[test]
fn negative_user_count_is_invalid_input() {
    let err = calculate(3, -1, None).unwrap_err();
    let PriorityError::InvalidInput { field, .. } = err;
    assert_eq!(field, DraftField::ImpactedUsers);
}

#[test]
fn urgency_labels_map_onto_scale() {
    assert_eq!(Urgency::from_label("High").unwrap().value(), 1);
    assert_eq!(Urgency::from_label(" medium ").unwrap().value(), 3);
    assert_eq!(Urgency::from_label("LOW").unwrap().value(), 5);
    assert!(Urgency::from_label("urgent").is_err());

    let high = Urgency::from_label("High").unwrap();
    assert_eq!(lookup(high, ImpactBucket::Extensive), Priority::P1);
}

proptest! {
    #[test]
    fn calculate_is_deterministic(urgency in 1i64..=5, users in 0i64..100_000) {
        let a = calculate(urgency, users, None).unwrap();
        let b = calculate(urgency, users, None).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn override_always_wins(
        urgency in 1i64..=5,
        users in 0i64..100_000,
        tier in prop_oneof![
            Just(Priority::P1),
            Just(Priority::P2),
            Just(Priority::P3),
            Just(Priority::P4),
        ],
    ) {
        let o = PriorityOverride::new(tier, "manual");
        let with = calculate(urgency, users, Some(&o)).unwrap();
        let without = calculate(urgency, users, None).unwrap();
        prop_assert_eq!(with.final_priority, tier);
        prop_assert_eq!(with.computed, without.computed);
    }

    #[test]
    fn more_users_never_lowers_severity(urgency in 1i64..=5, a in 0i64..5_000, b in 0i64..5_000) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let p_lo = calculate(urgency, lo, None).unwrap().computed;
        let p_hi = calculate(urgency, hi, None).unwrap().computed;
        prop_assert!(p_hi <= p_lo);
    }
}
