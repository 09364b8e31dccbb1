use std::{
    collections::VecDeque,
    sync::Mutex,
    time::{Duration, Instant},
};

use tokio::time::sleep;
use tracing::debug;

const WINDOW: Duration = Duration::from_secs(60);

struct Window {
    /// (timestamp, amount) pairs within the trailing 60s; a reservation is
    /// pushed at `acquire` time and adjusted in place by `record_usage`.
    entries: VecDeque<(Instant, u32)>,
    limit: u32,
}

impl Window {
    fn new(limit: u32) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&(ts, _)) = self.entries.front() {
            if now.duration_since(ts) > WINDOW {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    fn used(&self) -> u32 {
        self.entries.iter().map(|(_, amount)| amount).sum()
    }

    /// How long the caller must wait before `amount` more units fit under
    /// `limit` within the trailing window, given the current occupancy.
    fn wait_for(&mut self, amount: u32, now: Instant) -> Duration {
        self.prune(now);
        if self.used().saturating_add(amount) <= self.limit {
            return Duration::ZERO;
        }
        // Wait until the oldest entry ages out of the window.
        match self.entries.front() {
            Some(&(ts, _)) => WINDOW.saturating_sub(now.duration_since(ts)),
            None => Duration::ZERO,
        }
    }
}

/// Token-bucket limiter enforcing requests-per-minute and tokens-per-minute
/// using two sliding 60-second windows (spec.md §4.10).
pub struct RateLimiter {
    requests: Mutex<Window>,
    tokens: Mutex<Window>,
    safety_margin: f64,
}

/// A reservation handle returned by `acquire`, used to adjust token usage
/// once the real cost of a call is known.
pub struct Reservation {
    index: usize,
}

impl RateLimiter {
    #[must_use]
    pub fn new(requests_per_minute: u32, tokens_per_minute: u32, safety_margin: f64) -> Self {
        let margin = safety_margin.clamp(0.0, 1.0);
        let scaled_rpm = Self::scale(requests_per_minute, margin);
        let scaled_tpm = Self::scale(tokens_per_minute, margin);
        Self {
            requests: Mutex::new(Window::new(scaled_rpm)),
            tokens: Mutex::new(Window::new(scaled_tpm)),
            safety_margin: margin,
        }
    }

    fn scale(limit: u32, margin: f64) -> u32 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            ((f64::from(limit)) * margin).floor() as u32
        }
    }

    #[must_use]
    pub fn safety_margin(&self) -> f64 {
        self.safety_margin
    }

    /// Waits for the larger of the requests-window wait and the
    /// tokens-window wait, then records a reservation of `estimated_tokens`.
    pub async fn acquire(&self, estimated_tokens: u32) -> Reservation {
        loop {
            let now = Instant::now();
            let request_wait = {
                let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
                requests.wait_for(1, now)
            };
            let token_wait = {
                let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
                tokens.wait_for(estimated_tokens, now)
            };
            let wait = request_wait.max(token_wait);
            if wait.is_zero() {
                break;
            }
            debug!(wait_ms = wait.as_millis(), "rate limiter waiting");
            sleep(wait).await;
        }

        let now = Instant::now();
        let index = {
            let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
            requests.prune(now);
            requests.entries.push_back((now, 1));
            requests.entries.len() - 1
        };
        {
            let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
            tokens.prune(now);
            tokens.entries.push_back((now, estimated_tokens));
        }
        Reservation { index }
    }

    /// Adjusts the tokens-window reservation made by `acquire` to the actual
    /// token cost once it is known, so later callers see the true occupancy.
    pub fn record_usage(&self, reservation: &Reservation, actual_tokens: u32) {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = tokens.entries.get_mut(reservation.index) {
            entry.1 = actual_tokens;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_does_not_block_under_the_limit() {
        let limiter = RateLimiter::new(60, 60_000, 1.0);
        let started = Instant::now();
        let _reservation = limiter.acquire(100).await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn safety_margin_scales_limits_down() {
        let limiter = RateLimiter::new(100, 100, 0.9);
        assert_eq!(limiter.requests.lock().unwrap().limit, 90);
    }

    #[tokio::test]
    async fn record_usage_updates_the_reservation() {
        let limiter = RateLimiter::new(60, 1_000, 1.0);
        let reservation = limiter.acquire(500).await;
        limiter.record_usage(&reservation, 10);
        let tokens = limiter.tokens.lock().unwrap();
        assert_eq!(tokens.entries[reservation.index].1, 10);
    }
}
