use std::time::Duration;

/// Bounded exponential backoff for item fetches.
///
/// Attempt `n` (1-based) that fails waits `base * 2^(n-1)`, capped at `max`,
/// before attempt `n + 1`. After `max_attempts` failures the error escalates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_ms: u64, max_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base: Duration::from_millis(base_ms),
            max: Duration::from_millis(max_ms.max(base_ms)),
        }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        // cap the exponent so the shift cannot overflow
        let exp = attempt.saturating_sub(1).min(30);
        let ms = (self.base.as_millis() as u64).saturating_mul(1u64 << exp);
        Duration::from_millis(ms).min(self.max)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, 500, 30_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_then_caps() {
        let p = RetryPolicy::new(10, 500, 3_000);
        assert_eq!(p.delay_after(1), Duration::from_millis(500));
        assert_eq!(p.delay_after(2), Duration::from_millis(1_000));
        assert_eq!(p.delay_after(3), Duration::from_millis(2_000));
        assert_eq!(p.delay_after(4), Duration::from_millis(3_000));
        assert_eq!(p.delay_after(40), Duration::from_millis(3_000));
    }

    #[test]
    fn at_least_one_attempt() {
        let p = RetryPolicy::new(0, 10, 10);
        assert_eq!(p.max_attempts, 1);
        assert!(!p.should_retry(1));
    }
}
