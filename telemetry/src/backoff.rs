use rand::Rng;
use std::time::Duration;

/// `min(base * 2^attempt, cap)`, saturating instead of overflowing
pub fn backoff_delay(base: Duration, attempt: u32, cap: Duration) -> Duration {
    let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(Duration::MAX).min(cap)
}

/// Adds a uniform jitter in `[0, max_jitter)` to `delay`
pub fn with_jitter(delay: Duration, max_jitter: Duration) -> Duration {
    let max_ms = max_jitter.as_millis() as u64;
    if max_ms == 0 {
        return delay;
    }
    let jitter_ms = rand::thread_rng().gen_range(0..max_ms);
    delay.saturating_add(Duration::from_millis(jitter_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(5000);
    const CAP: Duration = Duration::from_millis(30000);

    #[test]
    fn test_exponential_growth() {
        assert_eq!(backoff_delay(BASE, 0, CAP), Duration::from_millis(5000));
        assert_eq!(backoff_delay(BASE, 1, CAP), Duration::from_millis(10000));
        assert_eq!(backoff_delay(BASE, 2, CAP), Duration::from_millis(20000));
    }

    #[test]
    fn test_capped() {
        assert_eq!(backoff_delay(BASE, 3, CAP), CAP);
        assert_eq!(backoff_delay(BASE, 9, CAP), CAP);
        assert_eq!(backoff_delay(BASE, 64, CAP), CAP);
    }

    #[test]
    fn test_minimal_policy_base() {
        let base = Duration::from_millis(1000);
        assert_eq!(backoff_delay(base, 4, CAP), Duration::from_millis(16000));
        assert_eq!(backoff_delay(base, 5, CAP), CAP);
    }

    #[test]
    fn test_jitter_bounds() {
        let delay = Duration::from_millis(2000);
        for _ in 0..200 {
            let jittered = with_jitter(delay, Duration::from_millis(1000));
            assert!(jittered >= delay);
            assert!(jittered < delay + Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_zero_jitter() {
        let delay = Duration::from_millis(2000);
        assert_eq!(with_jitter(delay, Duration::ZERO), delay);
    }
}
