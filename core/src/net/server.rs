//! Server-side authority over replicated player state (§4.5 Server-side
//! authority). These are the pure decision functions the dedicated
//! server's dispatch loop calls per incoming packet and per sync tick;
//! they take `&mut Player`/`&PrimitiveStore` rather than a whole `Game` so
//! they can be exercised directly in tests.

use std::time::Duration;

use crate::entities::{InputState, Player};
use crate::geometry::Vec2;
use crate::primitive::PrimitiveStore;

/// How far the server slides a player's local position toward a
/// client-reported one per correction, rather than snapping outright.
pub const DEFAULT_SMOOTHING_FACTOR: f32 = 0.25;

/// Cadence of the server's broadcast physic-sync.
pub const SYNC_BROADCAST_INTERVAL: Duration = Duration::from_millis(60);

/// Outcome of validating an inbound input delta's event counter against
/// the player's last-known one.
#[derive(Debug, PartialEq, Eq)]
pub enum EventCounterOutcome {
    Accepted,
    Stale,
}

/// Monotonic event-counter check (§4.5: "drops stale"). Accepts strictly
/// increasing counters; anything else — including a replay of the same
/// counter — is stale.
pub fn validate_event_counter(current: u64, incoming: u64) -> EventCounterOutcome {
    if incoming > current {
        EventCounterOutcome::Accepted
    } else {
        EventCounterOutcome::Stale
    }
}

/// Applies an accepted client input to the authoritative player state,
/// updating its event counter.
pub fn apply_client_input(player: &mut Player, store: &mut PrimitiveStore, input: InputState, evt_counter: u64) {
    player.set_evt_counter(evt_counter);
    player.apply_input(input, store);
}

/// Reconciles a client-reported position/velocity against the server's
/// own simulation of the same player. `y_locked_transitioned_on` signals
/// the input's `y_locked` bit flipped from off to on this tick, which
/// forces an exact snap (feet must land exactly on the platform) instead
/// of the usual smoothing.
pub fn reconcile_position(
    server_position: Vec2,
    server_velocity: Vec2,
    reported_position: Vec2,
    reported_velocity: Vec2,
    y_locked_transitioned_on: bool,
    smoothing_factor: f32,
) -> (Vec2, Vec2) {
    if y_locked_transitioned_on {
        return (reported_position, reported_velocity);
    }
    let position = server_position + (reported_position - server_position) * smoothing_factor;
    let velocity = server_velocity + (reported_velocity - server_velocity) * smoothing_factor;
    (position, velocity)
}

/// Fixed-window moving average of round-trip-time samples, used to
/// derive the half-rtt lag-compensation offset from periodic pings.
pub struct RttTracker {
    samples: Vec<Duration>,
    window: usize,
}

impl RttTracker {
    pub fn new(window: usize) -> Self {
        Self { samples: Vec::with_capacity(window), window }
    }

    pub fn record(&mut self, rtt: Duration) {
        if self.samples.len() == self.window {
            self.samples.remove(0);
        }
        self.samples.push(rtt);
    }

    pub fn average_rtt(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        Some(total / self.samples.len() as u32)
    }

    /// Half the moving-average RTT, used to offset lag-compensated
    /// queries against a remote player's position trace.
    pub fn half_rtt(&self) -> Option<Duration> {
        self.average_rtt().map(|rtt| rtt / 2)
    }
}

impl Default for RttTracker {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strictly_increasing_counter_is_accepted() {
        assert_eq!(validate_event_counter(5, 6), EventCounterOutcome::Accepted);
    }

    #[test]
    fn replayed_or_regressed_counter_is_stale() {
        assert_eq!(validate_event_counter(5, 5), EventCounterOutcome::Stale);
        assert_eq!(validate_event_counter(5, 4), EventCounterOutcome::Stale);
    }

    #[test]
    fn reconciliation_smooths_toward_reported_position_by_the_factor() {
        let (position, _velocity) = reconcile_position(Vec2::new(0.0, 0.0), Vec2::ZERO, Vec2::new(100.0, 0.0), Vec2::ZERO, false, 0.25);
        assert_eq!(position, Vec2::new(25.0, 0.0));
    }

    #[test]
    fn y_locked_transition_snaps_instead_of_smoothing() {
        let (position, velocity) = reconcile_position(Vec2::new(0.0, 0.0), Vec2::new(0.0, 10.0), Vec2::new(100.0, 500.0), Vec2::ZERO, true, 0.25);
        assert_eq!(position, Vec2::new(100.0, 500.0));
        assert_eq!(velocity, Vec2::ZERO);
    }

    #[test]
    fn rtt_tracker_reports_none_with_no_samples() {
        let tracker = RttTracker::default();
        assert!(tracker.average_rtt().is_none());
    }

    #[test]
    fn rtt_tracker_averages_over_a_five_sample_window() {
        let mut tracker = RttTracker::default();
        for ms in [100, 100, 100, 100, 100, 200] {
            tracker.record(Duration::from_millis(ms));
        }
        // The first 100ms sample should have rolled off the window.
        assert_eq!(tracker.average_rtt().unwrap(), Duration::from_millis(120));
        assert_eq!(tracker.half_rtt().unwrap(), Duration::from_millis(60));
    }
}
