//! Simulated-time constants and tolerant comparisons.
//!
//! Simulated time is measured in iterations (`f64`). Periodic events
//! accumulate their time by repeated addition, so two events meant for
//! the same instant may differ in the last bits; every ordering decision
//! compares times with [`EPS`] tolerance.

/// Tolerance for comparing simulated times.
pub const EPS: f64 = 1e-12;

/// Relative tolerance used by geometric predicates.
pub const EPS_C: f64 = 1e-12;

/// `a < b` with tolerance.
pub fn cmp_lt(a: f64, b: f64) -> bool {
    a < b - EPS
}

/// `a <= b` with tolerance.
pub fn cmp_le(a: f64, b: f64) -> bool {
    a <= b + EPS
}

/// `a == b` with tolerance.
pub fn cmp_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPS
}

/// Start of the whole iteration after the one containing `time`.
pub fn next_iteration_start(time: f64) -> f64 {
    (time + EPS).floor() + 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulated_sum_compares_equal() {
        let mut t = 0.0;
        for _ in 0..10 {
            t += 0.1;
        }
        assert!(cmp_eq(t, 1.0));
        assert!(!cmp_lt(t, 1.0));
        assert!(cmp_le(t, 1.0));
    }

    #[test]
    fn next_iteration_from_whole_and_fractional_times() {
        assert_eq!(next_iteration_start(3.0), 4.0);
        assert_eq!(next_iteration_start(3.5), 4.0);
        assert_eq!(next_iteration_start(0.0), 1.0);
    }
}
