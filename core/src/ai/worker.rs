//! Dedicated AI worker thread (§4.4 AI Worker / lifecycle & failure
//! isolation). Grounded in `ai_mgr_singleton::worker()`'s poll loop and
//! `ai_operator`'s steal-and-safe-queue `set_difficulty` pattern, adapted
//! to Rust's ownership model: operators live in a map shared with the
//! worker thread under one mutex, and finished actions are handed back
//! through bounded `crossbeam-channel` queues instead of an in-place
//! `std::queue` per operator.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::error;

use super::operator::{AiAction, AiOperator, SAFE_ACTION_STREAM};
use super::snapshot::WorldSnapshot;

/// Identifies an operator by the player name it drives.
pub type OperatorId = String;

const ACTION_QUEUE_DEPTH: usize = 64;
const POLL_INTERVAL: Duration = Duration::from_millis(1);

struct OperatorSlot {
    operator: Box<dyn AiOperator>,
    sender: Sender<AiAction>,
}

type OperatorMap = Arc<Mutex<HashMap<OperatorId, OperatorSlot>>>;

/// Handle retained by the main thread: publishes snapshots, registers
/// operators, and drains their action queues. Stopping the worker happens
/// on `Drop` or via the explicit [`AiWorkerHandle::shutdown`].
pub struct AiWorkerHandle {
    snapshot: Arc<Mutex<WorldSnapshot>>,
    stop: Arc<AtomicBool>,
    rps: Arc<Mutex<u32>>,
    operators: OperatorMap,
    receivers: HashMap<OperatorId, Receiver<AiAction>>,
    join: Option<JoinHandle<()>>,
}

/// Spawns the worker thread; `initial_rps` matches the simulator's step
/// rate and may be updated later through the returned handle.
pub fn spawn(initial_snapshot: WorldSnapshot, initial_rps: u32) -> AiWorkerHandle {
    let snapshot = Arc::new(Mutex::new(initial_snapshot));
    let stop = Arc::new(AtomicBool::new(false));
    let rps = Arc::new(Mutex::new(initial_rps.max(1)));
    let operators: OperatorMap = Arc::new(Mutex::new(HashMap::new()));

    let worker_snapshot = snapshot.clone();
    let worker_stop = stop.clone();
    let worker_rps = rps.clone();
    let worker_operators = operators.clone();

    let join = std::thread::Builder::new()
        .name("ai-worker".to_string())
        .spawn(move || run(worker_snapshot, worker_stop, worker_rps, worker_operators))
        .expect("failed to spawn ai-worker thread");

    AiWorkerHandle { snapshot, stop, rps, operators, receivers: HashMap::new(), join: Some(join) }
}

fn run(snapshot: Arc<Mutex<WorldSnapshot>>, stop: Arc<AtomicBool>, rps: Arc<Mutex<u32>>, operators: OperatorMap) {
    let mut last_tick = Instant::now();
    let mut failed = HashSet::new();
    while !stop.load(Ordering::Relaxed) {
        let step = 1.0 / *rps.lock().unwrap() as f32;
        if last_tick.elapsed().as_secs_f32() > step {
            last_tick = Instant::now();
            tick(&snapshot, &operators, &mut failed);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn tick(snapshot: &Arc<Mutex<WorldSnapshot>>, operators: &OperatorMap, failed: &mut HashSet<OperatorId>) {
    let snapshot = snapshot.lock().unwrap().clone();
    let mut operators = operators.lock().unwrap();
    for (id, slot) in operators.iter_mut() {
        if failed.contains(id) {
            continue;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| slot.operator.update(&snapshot)));
        let actions = match outcome {
            Ok(Ok(actions)) => actions,
            Ok(Err(err)) => {
                error!(operator = %id, error = %err, "ai operator returned an error, forcing safe action stream");
                failed.insert(id.clone());
                SAFE_ACTION_STREAM.to_vec()
            }
            Err(_) => {
                error!(operator = %id, "ai operator panicked, forcing safe action stream");
                failed.insert(id.clone());
                SAFE_ACTION_STREAM.to_vec()
            }
        };
        for action in actions {
            // A full queue means the main thread has fallen behind; drop
            // the action rather than block the worker.
            let _ = slot.sender.try_send(action);
        }
    }
}

impl AiWorkerHandle {
    /// Publishes a fresh snapshot; called by the main thread once per step.
    pub fn publish(&self, snapshot: WorldSnapshot) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    pub fn set_rps(&self, rps: u32) {
        *self.rps.lock().unwrap() = rps.max(1);
    }

    /// Registers an operator, replacing any existing one for the same
    /// player and stealing its pending actions into the new queue (mirrors
    /// `ai_operator::set_difficulty`'s steal-then-swap behaviour; unlike a
    /// failure handover this does not force the safe action stream, since
    /// a difficulty change is not a fault).
    pub fn register(&mut self, operator: Box<dyn AiOperator>) {
        let id = operator.player_name().to_string();
        let (sender, receiver) = bounded(ACTION_QUEUE_DEPTH);
        if let Some(old_receiver) = self.receivers.get(&id) {
            while let Ok(action) = old_receiver.try_recv() {
                let _ = sender.try_send(action);
            }
        }
        self.receivers.insert(id.clone(), receiver);
        self.operators.lock().unwrap().insert(id, OperatorSlot { operator, sender });
    }

    pub fn remove(&mut self, id: &str) {
        self.receivers.remove(id);
        self.operators.lock().unwrap().remove(id);
    }

    /// Drains every action an operator has produced since the last call.
    pub fn drain(&self, id: &str) -> Vec<AiAction> {
        match self.receivers.get(id) {
            Some(rx) => rx.try_iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn operator_ids(&self) -> impl Iterator<Item = &str> {
        self.receivers.keys().map(String::as_str)
    }

    /// Signals the worker thread to stop and joins it.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for AiWorkerHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::operator::{Difficulty, NativeOperator};
    use std::time::Duration;

    #[test]
    fn worker_spawns_and_shuts_down_cleanly() {
        let handle = spawn(WorldSnapshot::default(), 60);
        std::thread::sleep(Duration::from_millis(5));
        handle.shutdown();
    }

    #[test]
    fn set_rps_updates_shared_cadence() {
        let handle = spawn(WorldSnapshot::default(), 60);
        handle.set_rps(120);
        assert_eq!(*handle.rps.lock().unwrap(), 120);
        handle.shutdown();
    }

    #[test]
    fn registering_an_operator_makes_it_drainable() {
        let mut handle = spawn(WorldSnapshot::default(), 1000);
        handle.register(Box::new(NativeOperator::new("bot", Difficulty::Easy)));
        std::thread::sleep(Duration::from_millis(20));
        // No players in the snapshot, so the operator should produce a
        // `Relax` action from the no-target branch and nothing else.
        let actions = handle.drain("bot");
        assert!(actions.iter().all(|a| matches!(a, AiAction::Relax)));
        handle.shutdown();
    }
}
