use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::time::Duration;

/// Minimum interval between accepted submissions from one client address.
pub struct SubmissionGate {
    /// `None` when the interval is zero, which disables the gate.
    limiter: Option<DefaultKeyedRateLimiter<IpAddr>>,
}

impl SubmissionGate {
    pub fn new(interval: Duration) -> Self {
        let limiter = Quota::with_period(interval)
            .map(|quota| RateLimiter::keyed(quota.allow_burst(NonZeroU32::MIN)));
        Self { limiter }
    }

    /// Records the attempt and returns whether it is allowed.
    pub fn check(&self, client: IpAddr) -> bool {
        let Some(limiter) = &self.limiter else {
            return true;
        };
        let allowed = limiter.check_key(&client).is_ok();
        // Keys whose cell has fully replenished can no longer reject anything.
        limiter.retain_recent();
        allowed
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.limiter.as_ref().map_or(0, |limiter| limiter.len())
    }
}
