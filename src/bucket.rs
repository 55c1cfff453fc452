use std::time::Instant;

/// Token bucket deciding whether a single client may make one more request.
///
/// The bucket starts full and refills continuously at a fixed rate, up to its
/// burst capacity. Token arithmetic is fractional: a consultation half a
/// second after the last one accrues half a second's worth of tokens, and two
/// consultations in the same instant accrue (correctly) almost nothing.
#[derive(Debug)]
pub struct TokenBucket {
    tokens: f64,
    burst: f64,
    rate_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket holding up to `burst` tokens and refilling at
    /// `rate_per_sec` tokens per second.
    pub fn new(burst: u32, rate_per_sec: f64) -> Self {
        Self {
            tokens: burst as f64,
            burst: burst as f64,
            rate_per_sec,
            last_refill: Instant::now(),
        }
    }

    /// Decide whether one more request may proceed right now.
    ///
    /// Consumes one token and returns `true` if a whole token is available;
    /// otherwise returns `false` and leaves the balance unchanged. The refill
    /// clock advances either way.
    pub fn allow(&mut self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Clock-explicit form of [`allow`](Self::allow); `now` must come from a
    /// monotonic reading.
    pub fn allow_at(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.burst);
        self.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn drained(now: Instant) -> TokenBucket {
        let mut bucket = TokenBucket::new(4, 2.0);
        for _ in 0..4 {
            assert!(bucket.allow_at(now));
        }
        bucket
    }

    #[test]
    fn admits_exactly_the_burst_with_no_elapsed_time() {
        let mut bucket = TokenBucket::new(4, 2.0);
        let now = Instant::now();

        for _ in 0..4 {
            assert!(bucket.allow_at(now));
        }
        assert!(!bucket.allow_at(now));
        assert!(!bucket.allow_at(now));
    }

    #[test]
    fn refills_two_tokens_per_second() {
        let now = Instant::now();
        let mut bucket = drained(now);

        let later = now + Duration::from_secs(1);
        assert!(bucket.allow_at(later));
        assert!(bucket.allow_at(later));
        assert!(!bucket.allow_at(later));
    }

    #[test]
    fn fractional_balance_survives_a_denial() {
        let now = Instant::now();
        let mut bucket = drained(now);

        // 750ms accrues 1.5 tokens: one grant, 0.5 left over
        let t1 = now + Duration::from_millis(750);
        assert!(bucket.allow_at(t1));
        assert!(!bucket.allow_at(t1));
        assert_eq!(bucket.last_refill, t1);

        // the denied call moved the clock, so only 250ms worth (0.5 tokens)
        // accrues on top of the leftover half
        let t2 = now + Duration::from_millis(1000);
        assert!(bucket.allow_at(t2));
        assert!(!bucket.allow_at(t2));
    }

    #[test]
    fn refill_is_capped_at_the_burst() {
        let now = Instant::now();
        let mut bucket = drained(now);

        let much_later = now + Duration::from_secs(3600);
        for _ in 0..4 {
            assert!(bucket.allow_at(much_later));
        }
        assert!(!bucket.allow_at(much_later));
    }

    #[test]
    fn idle_bucket_stays_full() {
        let mut bucket = TokenBucket::new(4, 2.0);

        let later = Instant::now() + Duration::from_secs(300);
        for _ in 0..4 {
            assert!(bucket.allow_at(later));
        }
        assert!(!bucket.allow_at(later));
    }
}
