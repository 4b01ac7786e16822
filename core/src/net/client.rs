//! Client-side prediction and reconciliation (§4.5 Client-side prediction
//! and reconciliation). The client applies its own input immediately;
//! these functions decide what to do with a server sync afterwards,
//! local player and remote players following different rules.

use crate::geometry::Vec2;

/// What the client should do with a server physic-sync addressed to its
/// own, locally-predicted player.
pub enum LocalReconciliation {
    /// The server's counter is behind what we've already applied locally
    /// (our own prediction is ahead); keep our position/velocity, but the
    /// weapon/ammo fields are still server-authoritative.
    KeepPrediction,
    /// Smooth our position/velocity toward the server's reported values.
    SmoothToward { position: Vec2, velocity: Vec2 },
}

/// Decides how to reconcile a physic-sync for the locally-controlled
/// player, per §4.5: "If the server's counter is behind the client's, it
/// ignores position/velocity but still reconciles weapon/ammo."
pub fn reconcile_local_player(local_evt_counter: u64, server_evt_counter: u64, server_position: Vec2, server_velocity: Vec2) -> LocalReconciliation {
    if server_evt_counter < local_evt_counter {
        LocalReconciliation::KeepPrediction
    } else {
        LocalReconciliation::SmoothToward { position: server_position, velocity: server_velocity }
    }
}

/// Remote players carry no local prediction to protect, so every sync
/// smooths their displayed state toward the server's values by a fixed
/// factor (mirrors [`super::server::reconcile_position`]'s smoothing, but
/// a remote player never gets the y-locked snap exception since the
/// client has no independent claim about its own feet placement).
pub fn smooth_remote_player(current_position: Vec2, current_velocity: Vec2, server_position: Vec2, server_velocity: Vec2, smoothing_factor: f32) -> (Vec2, Vec2) {
    let position = current_position + (server_position - current_position) * smoothing_factor;
    let velocity = current_velocity + (server_velocity - current_velocity) * smoothing_factor;
    (position, velocity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_server_counter_keeps_local_prediction() {
        let outcome = reconcile_local_player(10, 8, Vec2::new(999.0, 999.0), Vec2::ZERO);
        assert!(matches!(outcome, LocalReconciliation::KeepPrediction));
    }

    #[test]
    fn caught_up_server_counter_smooths_toward_server_values() {
        let outcome = reconcile_local_player(10, 10, Vec2::new(5.0, 5.0), Vec2::new(1.0, 1.0));
        match outcome {
            LocalReconciliation::SmoothToward { position, velocity } => {
                assert_eq!(position, Vec2::new(5.0, 5.0));
                assert_eq!(velocity, Vec2::new(1.0, 1.0));
            }
            _ => panic!("expected SmoothToward"),
        }
    }

    #[test]
    fn remote_players_smooth_by_the_given_factor() {
        let (position, _velocity) = smooth_remote_player(Vec2::ZERO, Vec2::ZERO, Vec2::new(100.0, 0.0), Vec2::ZERO, 0.5);
        assert_eq!(position, Vec2::new(50.0, 0.0));
    }
}
