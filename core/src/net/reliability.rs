//! Reliable delivery on top of the unreliable datagram transport (§4.5).
//! Grounded directly in `net_transcontrol.hpp`'s `transcontrol_sender` and
//! `transcontrol_receiver`: an outstanding-send table keyed by
//! `(peer, packet_id, payload_hash)` with a fixed resend interval and
//! retry budget, and a received-id cache that re-acks duplicates instead
//! of re-dispatching them.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Default resend interval for an unacknowledged reliable packet.
pub const DEFAULT_RESEND_INTERVAL: Duration = Duration::from_millis(200);

/// Default number of resends attempted before a reliable packet is given
/// up on.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// How long a received packet id is remembered so a duplicate resend can
/// be re-acked without being re-applied to simulation state.
pub const DEDUP_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OutstandingKey {
    peer: SocketAddr,
    packet_id: u64,
    payload_hash: u64,
}

struct OutstandingEntry {
    payload: Vec<u8>,
    action_kind: u32,
    retries_left: u32,
    send_at: Instant,
}

/// Tracks packets sent reliably until they are acknowledged, resending
/// them on a fixed cadence and dropping them after the retry budget is
/// spent.
pub struct ReliableSender {
    resend_interval: Duration,
    max_retries: u32,
    outstanding: HashMap<OutstandingKey, OutstandingEntry>,
}

/// A reliable packet ready to be sent on this tick, either because it is
/// new or because its resend interval elapsed.
pub struct DueSend {
    pub peer: SocketAddr,
    pub action_kind: u32,
    pub payload: Vec<u8>,
}

impl ReliableSender {
    pub fn new() -> Self {
        Self { resend_interval: DEFAULT_RESEND_INTERVAL, max_retries: DEFAULT_MAX_RETRIES, outstanding: HashMap::new() }
    }

    pub fn with_params(resend_interval: Duration, max_retries: u32) -> Self {
        Self { resend_interval, max_retries, outstanding: HashMap::new() }
    }

    /// Registers a packet that was just sent reliably, so it is tracked
    /// for acknowledgement and possible resend.
    pub fn on_initial_send(&mut self, peer: SocketAddr, packet_id: u64, action_kind: u32, payload_hash: u64, payload: Vec<u8>, now: Instant) {
        let key = OutstandingKey { peer, packet_id, payload_hash };
        self.outstanding.insert(key, OutstandingEntry { payload, action_kind, retries_left: self.max_retries, send_at: now });
    }

    /// Clears the outstanding entry once its target acknowledges receipt.
    pub fn on_ack_ok(&mut self, peer: SocketAddr, packet_id: u64, payload_hash: u64) {
        let key = OutstandingKey { peer, packet_id, payload_hash };
        self.outstanding.remove(&key);
    }

    /// A corrupted-hash ack resets the retry budget to the maximum and
    /// pushes the next send one interval forward rather than resending
    /// immediately, matching the original's fast-next-tick handling.
    pub fn on_ack_corrupted(&mut self, peer: SocketAddr, packet_id: u64, payload_hash: u64, now: Instant) {
        let key = OutstandingKey { peer, packet_id, payload_hash };
        if let Some(entry) = self.outstanding.get_mut(&key) {
            entry.retries_left = self.max_retries;
            entry.send_at = now + self.resend_interval;
        }
    }

    /// Returns packets whose resend interval has elapsed, decrementing
    /// their retry budget and dropping those that have exhausted it.
    pub fn poll_due(&mut self, now: Instant) -> Vec<DueSend> {
        let mut due = Vec::new();
        self.outstanding.retain(|key, entry| {
            if now < entry.send_at {
                return true;
            }
            if entry.retries_left == 0 {
                return false;
            }
            entry.retries_left -= 1;
            entry.send_at = now + self.resend_interval;
            due.push(DueSend { peer: key.peer, action_kind: entry.action_kind, payload: entry.payload.clone() });
            true
        });
        due
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }
}

impl Default for ReliableSender {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ReceivedKey {
    peer: SocketAddr,
    packet_id: u64,
    payload_hash: u64,
}

/// Tracks recently received reliable packet ids so duplicate deliveries
/// (the sender resending before our ack arrived) are re-acked without
/// being re-applied.
pub struct ReliableReceiver {
    ttl: Duration,
    seen: HashMap<ReceivedKey, Instant>,
}

pub enum ReceiveOutcome {
    /// First time seeing this packet; the caller should apply it.
    New,
    /// Already applied; the caller should just re-send the ack.
    Duplicate,
}

impl ReliableReceiver {
    pub fn new() -> Self {
        Self { ttl: DEDUP_TTL, seen: HashMap::new() }
    }

    pub fn observe(&mut self, peer: SocketAddr, packet_id: u64, payload_hash: u64, now: Instant) -> ReceiveOutcome {
        let key = ReceivedKey { peer, packet_id, payload_hash };
        if let Some(seen_at) = self.seen.get(&key) {
            if now.duration_since(*seen_at) < self.ttl {
                return ReceiveOutcome::Duplicate;
            }
        }
        self.seen.insert(key, now);
        ReceiveOutcome::New
    }

    /// Evicts entries older than the dedup TTL; call periodically rather
    /// than on every receive to keep the cache bounded.
    pub fn cleanup(&mut self, now: Instant) {
        self.seen.retain(|_, seen_at| now.duration_since(*seen_at) < self.ttl);
    }
}

impl Default for ReliableReceiver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[test]
    fn newly_sent_packet_is_not_due_before_its_interval() {
        let mut sender = ReliableSender::with_params(Duration::from_millis(200), 10);
        let now = Instant::now();
        sender.on_initial_send(peer(), 1, 5, 0xabc, vec![1, 2, 3], now);
        assert!(sender.poll_due(now + Duration::from_millis(50)).is_empty());
    }

    #[test]
    fn unacked_packet_resends_after_interval_elapses() {
        let mut sender = ReliableSender::with_params(Duration::from_millis(200), 10);
        let now = Instant::now();
        sender.on_initial_send(peer(), 1, 5, 0xabc, vec![1, 2, 3], now);
        let due = sender.poll_due(now + Duration::from_millis(250));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].action_kind, 5);
    }

    #[test]
    fn ack_ok_clears_the_outstanding_entry() {
        let mut sender = ReliableSender::new();
        let now = Instant::now();
        sender.on_initial_send(peer(), 1, 5, 0xabc, vec![1], now);
        sender.on_ack_ok(peer(), 1, 0xabc);
        assert_eq!(sender.outstanding_count(), 0);
    }

    #[test]
    fn exhausting_retries_drops_the_packet() {
        let mut sender = ReliableSender::with_params(Duration::from_millis(10), 2);
        let mut now = Instant::now();
        sender.on_initial_send(peer(), 1, 5, 0xabc, vec![1], now);
        for _ in 0..2 {
            now += Duration::from_millis(20);
            assert_eq!(sender.poll_due(now).len(), 1);
        }
        now += Duration::from_millis(20);
        assert!(sender.poll_due(now).is_empty());
        assert_eq!(sender.outstanding_count(), 0);
    }

    #[test]
    fn corrupted_ack_resets_retries_and_delays_next_send() {
        let mut sender = ReliableSender::with_params(Duration::from_millis(200), 1);
        let now = Instant::now();
        sender.on_initial_send(peer(), 1, 5, 0xabc, vec![1], now);
        sender.poll_due(now + Duration::from_millis(250));
        sender.on_ack_corrupted(peer(), 1, 0xabc, now + Duration::from_millis(250));
        assert!(sender.poll_due(now + Duration::from_millis(300)).is_empty());
        let due = sender.poll_due(now + Duration::from_millis(460));
        assert_eq!(due.len(), 1);
    }

    #[test]
    fn duplicate_within_ttl_is_reported_as_duplicate() {
        let mut receiver = ReliableReceiver::new();
        let now = Instant::now();
        assert!(matches!(receiver.observe(peer(), 1, 0xabc, now), ReceiveOutcome::New));
        assert!(matches!(receiver.observe(peer(), 1, 0xabc, now + Duration::from_secs(1)), ReceiveOutcome::Duplicate));
    }

    #[test]
    fn cleanup_evicts_entries_past_ttl() {
        let mut receiver = ReliableReceiver::new();
        let now = Instant::now();
        receiver.observe(peer(), 1, 0xabc, now);
        receiver.cleanup(now + Duration::from_secs(6));
        assert!(matches!(receiver.observe(peer(), 1, 0xabc, now + Duration::from_secs(6)), ReceiveOutcome::New));
    }
}
