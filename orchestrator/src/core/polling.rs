//! Readiness polling shared by every role

use tokio::time::{sleep, Instant};

use crate::config::PollPolicy;
use crate::traits::HealthProbe;

/// Probe `url` every `policy.interval` until it answers 200 or
/// `policy.timeout` has elapsed. Failed probes are expected while a service
/// boots and only drive the next attempt.
pub async fn wait_for_service<H>(probe: &H, url: &str, policy: &PollPolicy) -> bool
where
    H: HealthProbe + ?Sized,
{
    let deadline = Instant::now() + policy.timeout;
    while Instant::now() < deadline {
        if probe.check(url, policy.request_timeout).await {
            return true;
        }
        sleep(policy.interval).await;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockHealthProbe;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_third_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let mut probe = MockHealthProbe::new();
        probe
            .expect_check()
            .returning(move |_, _| counter.fetch_add(1, Ordering::SeqCst) >= 2);

        let started = Instant::now();
        let ready = wait_for_service(&probe, "http://localhost:21001/list_models", &PollPolicy::default()).await;

        assert!(ready);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_timeout() {
        let mut probe = MockHealthProbe::new();
        probe.expect_check().times(30).returning(|_, _| false);

        let started = Instant::now();
        let ready = wait_for_service(&probe, "http://localhost:8000/v1/models", &PollPolicy::default()).await;

        assert!(!ready);
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_uses_request_timeout_per_probe() {
        let mut probe = MockHealthProbe::new();
        probe
            .expect_check()
            .withf(|url, timeout| url.ends_with("/v1/models") && *timeout == Duration::from_millis(750))
            .times(1)
            .returning(|_, _| true);

        let policy = PollPolicy {
            interval: Duration::from_millis(100),
            timeout: Duration::from_secs(1),
            request_timeout: Duration::from_millis(750),
        };
        assert!(wait_for_service(&probe, "http://localhost:8000/v1/models", &policy).await);
    }
}
