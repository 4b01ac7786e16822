//! Headless dedicated server binary (§2 System Overview, §4.5 Replication
//! Layer). Binds the UDP transport, owns the single `Game` simulation
//! thread, and drives the per-tick control flow: poll inbound datagrams,
//! apply accepted input to the corresponding player, step the
//! simulation, then broadcast a physic-sync to every connected peer.

use std::collections::HashMap;
use std::io::BufRead;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{info, warn};

use hollowpoint_core::ai::Difficulty;
use hollowpoint_core::commands::CommandRegistry;
use hollowpoint_core::config::{ConfigStore, NetConfig, SimConfig};
use hollowpoint_core::entities::{InputState, PlayerKinematics};
use hollowpoint_core::error::CommandError;
use hollowpoint_core::geometry::Vec2;
use hollowpoint_core::net::actions::MoveStates;
use hollowpoint_core::net::server::{apply_client_input, validate_event_counter, EventCounterOutcome, RttTracker, SYNC_BROADCAST_INTERVAL};
use hollowpoint_core::net::{Action, ActionKind, PacketHeader, RecvOutcome, Socket};
use hollowpoint_core::platform::Platform;
use hollowpoint_core::world::Game;

const DEFAULT_CONFIG_PATH: &str = "hollowpoint.cfg";

/// Cadence of the server-originated ping sweep, matching the teacher's
/// `ping_sender` period. One ping is kept in flight per peer at a time.
const PING_INTERVAL: Duration = Duration::from_millis(100);

struct Peer {
    name: String,
    last_evt_counter: u64,
    rtt: RttTracker,
    next_ping_id: u64,
    pending_ping: Option<(u64, Instant)>,
    last_ping_sent: Instant,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let store = match ConfigStore::parse_file(&config_path) {
        Ok(store) => store,
        Err(err) => {
            warn!(%err, path = %config_path, "could not load config file, running with defaults");
            ConfigStore::default()
        }
    };
    let sim_config = SimConfig::load(&store).context("loading [physics] section")?;
    let net_config = NetConfig::load(&store).context("loading [net] section")?;

    let mut game = Game::new(sim_config.gravity, sim_config.rps);
    game.add_platform(Platform::new(Vec2::new(-2000.0, 600.0), 4000.0));
    game.spawn_player("training_dummy_bot", Vec2::new(40.0, 80.0), Vec2::new(200.0, 0.0), PlayerKinematics::default());
    game.attach_ai("training_dummy_bot", Difficulty::Easy);

    let game = Arc::new(Mutex::new(game));
    spawn_console_thread(game.clone());

    let bind_addr: SocketAddr = format!("0.0.0.0:{}", net_config.listen_port).parse()?;
    let socket = Socket::bind(bind_addr).context("binding UDP listen socket")?;
    info!(addr = %bind_addr, rps = sim_config.rps, "hollowpoint_server listening");

    let mut peers: HashMap<SocketAddr, Peer> = HashMap::new();
    let mut packet_id_counter: u64 = 0;

    let dt = 1.0 / sim_config.rps as f32;
    let step_interval = Duration::from_secs_f32(dt);
    let mut last_step = Instant::now();
    let mut last_broadcast = Instant::now();

    loop {
        {
            let mut game = game.lock().unwrap();
            drain_inbound(&socket, &mut game, &mut peers);

            let now = Instant::now();
            if now.duration_since(last_step) >= step_interval {
                last_step = now;
                game.step(dt, now);
            }

            if now.duration_since(last_broadcast) >= SYNC_BROADCAST_INTERVAL {
                last_broadcast = now;
                broadcast_sync(&socket, &game, &peers, &mut packet_id_counter);
            }

            send_pings(&socket, &mut peers, &mut packet_id_counter, now);
        }

        std::thread::sleep(Duration::from_millis(1));
    }
}

/// Registers the headless console command set §6 names
/// (`set_gravity`, `spawn_platform`, `kick_player`, `list_players`) and
/// reads dispatch lines from stdin on a background thread, so the
/// server can be driven without any GUI.
fn spawn_console_thread(game: Arc<Mutex<Game>>) {
    let mut commands = CommandRegistry::new();

    let g = game.clone();
    commands.register(
        "set_gravity",
        Box::new(move |args| {
            let [x, y] = args else {
                return Err(CommandError::ArityMismatch { command: "set_gravity".into(), expected: 2, actual: args.len() });
            };
            let parse = |s: &str| s.parse::<f32>().map_err(|e| CommandError::InvalidArgument { command: "set_gravity".into(), message: e.to_string() });
            let gravity = Vec2::new(parse(x)?, parse(y)?);
            g.lock().unwrap().set_gravity(gravity);
            Ok(format!("gravity set to ({}, {})", gravity.x, gravity.y))
        }),
    );

    let g = game.clone();
    commands.register(
        "spawn_platform",
        Box::new(move |args| {
            let [x, y, length] = args else {
                return Err(CommandError::ArityMismatch { command: "spawn_platform".into(), expected: 3, actual: args.len() });
            };
            let parse = |s: &str| s.parse::<f32>().map_err(|e| CommandError::InvalidArgument { command: "spawn_platform".into(), message: e.to_string() });
            let platform = Platform::new(Vec2::new(parse(x)?, parse(y)?), parse(length)?);
            g.lock().unwrap().add_platform(platform);
            Ok("platform spawned".to_string())
        }),
    );

    let g = game.clone();
    commands.register(
        "kick_player",
        Box::new(move |args| {
            let [name] = args else {
                return Err(CommandError::ArityMismatch { command: "kick_player".into(), expected: 1, actual: args.len() });
            };
            g.lock().unwrap().remove_player(name);
            Ok(format!("kicked {name}"))
        }),
    );

    let g = game.clone();
    commands.register(
        "list_players",
        Box::new(move |_args| Ok(g.lock().unwrap().player_names().collect::<Vec<_>>().join(", "))),
    );

    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match commands.dispatch(&line) {
                Ok(out) => info!(%out, "console command ok"),
                Err(err) => warn!(%err, "console command failed"),
            }
        }
    });
}

fn drain_inbound(socket: &Socket, game: &mut Game, peers: &mut HashMap<SocketAddr, Peer>) {
    loop {
        match socket.recv() {
            RecvOutcome::WouldBlock => break,
            RecvOutcome::TooBig { from, len } => warn!(%from, len, "dropping oversized datagram"),
            RecvOutcome::InvalidHash { from } => warn!(%from, "dropping datagram with bad hash"),
            RecvOutcome::System(err) => warn!(%err, "socket error while receiving"),
            RecvOutcome::Ok(received) => {
                let Ok(kind) = ActionKind::from_u32(received.header.action_kind) else {
                    warn!(action_kind = received.header.action_kind, "unknown action kind");
                    continue;
                };
                let Ok(action) = Action::decode(kind, &received.payload) else {
                    warn!(from = %received.from, "malformed action payload");
                    continue;
                };
                handle_action(game, peers, received.from, action);
            }
        }
    }
}

fn handle_action(game: &mut Game, peers: &mut HashMap<SocketAddr, Peer>, from: SocketAddr, action: Action) {
    match action {
        Action::ClientHello { .. } => {
            let name = format!("player_{}", peers.len() + 1);
            game.spawn_player(&name, Vec2::new(40.0, 80.0), Vec2::ZERO, PlayerKinematics::default());
            let now = Instant::now();
            peers.insert(
                from,
                Peer {
                    name,
                    last_evt_counter: 0,
                    rtt: RttTracker::default(),
                    next_ping_id: 0,
                    pending_ping: None,
                    last_ping_sent: now,
                },
            );
        }
        Action::CliPlayerSync { states, evt_counter, .. } => {
            let evt_counter = evt_counter as u64;
            let Some(peer) = peers.get_mut(&from) else { return };
            if validate_event_counter(peer.last_evt_counter, evt_counter) == EventCounterOutcome::Stale {
                return;
            }
            peer.last_evt_counter = evt_counter;
            let Some((player, store)) = game.player_and_store_mut(&peer.name) else { return };
            let input = input_from_move_states(states);
            apply_client_input(player, store, input, evt_counter);
        }
        Action::Ping { ping_id, .. } => {
            // The peer echoes back the ping we sent it; a reply to anything
            // other than the one currently in flight is stale and dropped.
            let Some(peer) = peers.get_mut(&from) else { return };
            let Some((expected_id, sent_at)) = peer.pending_ping else { return };
            if expected_id != ping_id {
                return;
            }
            peer.pending_ping = None;
            peer.rtt.record(Instant::now().duration_since(sent_at));
            if let Some(half_rtt) = peer.rtt.half_rtt() {
                if let Some(player) = game.player_mut(&peer.name) {
                    player.set_latency(half_rtt);
                }
            }
        }
        _ => {}
    }
}

/// Sweeps every peer and, for those with no ping currently in flight and
/// whose last one was sent at least [`PING_INTERVAL`] ago, sends a fresh
/// `Action::Ping` carrying the last known RTT (§4.5 Clock sync / ping).
fn send_pings(socket: &Socket, peers: &mut HashMap<SocketAddr, Peer>, packet_id_counter: &mut u64, now: Instant) {
    for (addr, peer) in peers.iter_mut() {
        if peer.pending_ping.is_some() || now.duration_since(peer.last_ping_sent) < PING_INTERVAL {
            continue;
        }
        let ping_id = peer.next_ping_id;
        peer.next_ping_id += 1;
        peer.last_ping_sent = now;
        peer.pending_ping = Some((ping_id, now));

        let known_ms = peer.rtt.average_rtt().map(|d| d.as_millis() as u32).unwrap_or(0);
        let action = Action::Ping { ping_id, ping_ms: known_ms };
        let payload = action.encode();
        *packet_id_counter += 1;
        let Ok(framed) = PacketHeader::frame(action.kind() as u32, false, *packet_id_counter, &payload) else { continue };
        if let Err(err) = socket.send_to(*addr, &framed) {
            warn!(%err, %addr, "failed to send ping");
        }
    }
}

fn input_from_move_states(states: MoveStates) -> InputState {
    InputState {
        move_left: states.mov_left,
        move_right: states.mov_right,
        fire: states.on_shot,
        jump: states.jump,
        jump_down: states.jump_down,
        y_locked: states.lock_y,
    }
}

fn broadcast_sync(socket: &Socket, game: &Game, peers: &HashMap<SocketAddr, Peer>, packet_id_counter: &mut u64) {
    for (addr, peer) in peers {
        let Some(player) = game.player(&peer.name) else { continue };
        let store = game.store();
        let action = Action::SrvPlayerSync {
            states: MoveStates { mov_left: false, mov_right: false, on_shot: false, jump: false, jump_down: false, lock_y: player.is_y_locked(store) },
            evt_counter: player.evt_counter() as u32,
            position: player.position(store),
            velocity: player.velocity(store),
            name: peer.name.clone(),
        };
        let payload = action.encode();
        *packet_id_counter += 1;
        let Ok(framed) = PacketHeader::frame(action.kind() as u32, false, *packet_id_counter, &payload) else { continue };
        if let Err(err) = socket.send_to(*addr, &framed) {
            warn!(%err, %addr, "failed to send sync");
        }
    }
}
