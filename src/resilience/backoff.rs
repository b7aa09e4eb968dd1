//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Calculate exponential backoff delay with jitter.
///
/// Attempt 0 never waits. Attempt `n` waits `base * 2^(n-1)`, capped at
/// `max`, plus up to 10% jitter.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u32.saturating_pow(attempt - 1);
    let capped_delay = base.saturating_mul(exponential_base).min(max);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay.as_nanos() / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    capped_delay + Duration::from_nanos(u64::try_from(jitter).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let base = Duration::from_micros(50);
        let max = Duration::from_millis(2);

        assert_eq!(calculate_backoff(0, base, max), Duration::ZERO);

        let b1 = calculate_backoff(1, base, max);
        assert!(b1 >= base && b1 < base + base / 10 + Duration::from_nanos(1));

        let b2 = calculate_backoff(2, base, max);
        assert!(b2 >= base * 2);

        let capped = calculate_backoff(30, base, max);
        assert!(capped >= max);
        assert!(capped <= max + max / 10);
    }
}
