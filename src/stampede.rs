//! Stampede Controller: decides whether a non-expired read should be
//! treated as a forced miss. Pure functions over timestamps so they are
//! trivially unit-testable without a running cache.

use crate::entry::{EntryPolicy, StampedeMode};
use std::time::{Duration, Instant};

/// Evaluates the entry's stampede mode against the current instant.
/// `DistributedLock` and `None` never force a refresh on read;
/// locking happens only on an actual miss, in the slow-path coordinator.
pub fn should_force_refresh(policy: &EntryPolicy, created_at: Instant, absolute_expiration: Option<Instant>, now: Instant) -> bool {
    match policy.stampede {
        StampedeMode::None | StampedeMode::DistributedLock => false,
        StampedeMode::RefreshAhead(window) => match absolute_expiration {
            Some(exp) => match exp.checked_sub(window) {
                Some(threshold) => now >= threshold,
                None => true,
            },
            None => false,
        },
        StampedeMode::Probabilistic(beta) => {
            let beta = if beta <= 0.0 { 1.0 } else { beta };
            let duration = match policy.duration {
                Some(d) if !d.is_zero() => d,
                _ => return false,
            };
            let age = now.saturating_duration_since(created_at);
            let ratio = (age.as_secs_f64() / duration.as_secs_f64()).min(1.0);
            let p = (-beta * ratio).exp();
            fastrand::f64() > p
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryPolicy;

    #[test]
    fn none_mode_never_forces_refresh() {
        let policy = EntryPolicy::empty();
        let now = Instant::now();
        assert!(!should_force_refresh(&policy, now, Some(now + Duration::from_secs(10)), now));
    }

    #[test]
    fn refresh_ahead_forces_within_window() {
        let policy = EntryPolicy {
            stampede: StampedeMode::RefreshAhead(Duration::from_secs(5)),
            ..EntryPolicy::empty()
        };
        let now = Instant::now();
        let exp = now + Duration::from_secs(3);
        assert!(should_force_refresh(&policy, now, Some(exp), now));
    }

    #[test]
    fn refresh_ahead_does_not_force_outside_window() {
        let policy = EntryPolicy {
            stampede: StampedeMode::RefreshAhead(Duration::from_secs(5)),
            ..EntryPolicy::empty()
        };
        let now = Instant::now();
        let exp = now + Duration::from_secs(30);
        assert!(!should_force_refresh(&policy, now, Some(exp), now));
    }

    #[test]
    fn probabilistic_near_expiration_is_near_certain() {
        let policy = EntryPolicy {
            duration: Some(Duration::from_secs(100)),
            stampede: StampedeMode::Probabilistic(1.0),
            ..EntryPolicy::empty()
        };
        let created = Instant::now() - Duration::from_secs(99);
        let now = Instant::now();
        let forced = (0..200)
            .filter(|_| should_force_refresh(&policy, created, None, now))
            .count();
        // age/duration ratio ~0.99, p = exp(-0.99) ~ 0.37, so a strong majority
        // of draws should force refresh; allow generous statistical slack.
        assert!(forced > 100, "expected most draws to force refresh near expiration, got {forced}/200");
    }

    #[test]
    fn probabilistic_rarity_bound_matches_spec_tolerance() {
        // With beta=1, P(force refresh | age < 0.5*duration) <= 1 - exp(-0.5) ~= 0.393
        let policy = EntryPolicy {
            duration: Some(Duration::from_secs(100)),
            stampede: StampedeMode::Probabilistic(1.0),
            ..EntryPolicy::empty()
        };
        let created = Instant::now() - Duration::from_secs(40);
        let now = Instant::now();
        let trials = 5_000;
        let forced = (0..trials)
            .filter(|_| should_force_refresh(&policy, created, None, now))
            .count();
        let fraction = forced as f64 / trials as f64;
        assert!(fraction < 0.45, "forced fraction {fraction} exceeded generous tolerance above the 0.393 bound");
    }
}
