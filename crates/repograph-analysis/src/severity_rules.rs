use repograph_core::Severity;

/// Complexity ladder for dead and unused code: under 11 no issue, 11-20
/// LOW, 21-30 MEDIUM, 31 and up HIGH.
pub fn complexity_to_severity(complexity: u32) -> Option<Severity> {
    match complexity {
        0..=10 => None,
        11..=20 => Some(Severity::Low),
        21..=30 => Some(Severity::Medium),
        _ => Some(Severity::High),
    }
}

/// Method-count ladder for god classes: under 15 no issue, 15-19 MEDIUM,
/// 20-29 HIGH, 30 and up CRITICAL.
pub fn method_count_severity(method_count: u32) -> Option<Severity> {
    match method_count {
        0..=14 => None,
        15..=19 => Some(Severity::Medium),
        20..=29 => Some(Severity::High),
        _ => Some(Severity::Critical),
    }
}

/// Cycle-length calibration for circular dependencies.
pub fn cycle_length_severity(cycle_length: usize) -> Severity {
    match cycle_length {
        0..=2 => Severity::Low,
        3..=4 => Severity::Medium,
        5..=9 => Severity::High,
        _ => Severity::Critical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn complexity_ladder_boundaries() {
        assert_eq!(complexity_to_severity(10), None);
        assert_eq!(complexity_to_severity(11), Some(Severity::Low));
        assert_eq!(complexity_to_severity(20), Some(Severity::Low));
        assert_eq!(complexity_to_severity(21), Some(Severity::Medium));
        assert_eq!(complexity_to_severity(30), Some(Severity::Medium));
        assert_eq!(complexity_to_severity(31), Some(Severity::High));
    }

    #[test]
    fn method_count_ladder_boundaries() {
        assert_eq!(method_count_severity(14), None);
        assert_eq!(method_count_severity(15), Some(Severity::Medium));
        assert_eq!(method_count_severity(19), Some(Severity::Medium));
        assert_eq!(method_count_severity(20), Some(Severity::High));
        assert_eq!(method_count_severity(29), Some(Severity::High));
        assert_eq!(method_count_severity(30), Some(Severity::Critical));
    }

    #[test]
    fn cycle_severity_calibration() {
        assert_eq!(cycle_length_severity(2), Severity::Low);
        assert_eq!(cycle_length_severity(3), Severity::Medium);
        assert_eq!(cycle_length_severity(4), Severity::Medium);
        assert_eq!(cycle_length_severity(5), Severity::High);
        assert_eq!(cycle_length_severity(9), Severity::High);
        assert_eq!(cycle_length_severity(10), Severity::Critical);
    }

    proptest! {
        #[test]
        fn complexity_severity_is_monotonic(c1 in 0u32..200, c2 in 0u32..200) {
            let (lo, hi) = if c1 <= c2 { (c1, c2) } else { (c2, c1) };
            let rank = |s: Option<Severity>| s.map(|s| s.rank() as i32).unwrap_or(-1);
            prop_assert!(rank(complexity_to_severity(lo)) <= rank(complexity_to_severity(hi)));
        }

        #[test]
        fn method_count_severity_is_monotonic(c1 in 0u32..60, c2 in 0u32..60) {
            let (lo, hi) = if c1 <= c2 { (c1, c2) } else { (c2, c1) };
            let rank = |s: Option<Severity>| s.map(|s| s.rank() as i32).unwrap_or(-1);
            prop_assert!(rank(method_count_severity(lo)) <= rank(method_count_severity(hi)));
        }
    }
}
