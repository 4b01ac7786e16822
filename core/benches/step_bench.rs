//! Benchmarks the fixed-step simulation loop under a moderate player and
//! bullet count, mirroring the teacher's own per-system profiling bench
//! harness (`criterion`, one `criterion_group`/`criterion_main` pair).

use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use hollowpoint_core::entities::PlayerKinematics;
use hollowpoint_core::geometry::Vec2;
use hollowpoint_core::platform::Platform;
use hollowpoint_core::world::Game;

fn build_game(player_count: usize) -> Game {
    let mut game = Game::new(Vec2::new(0.0, 980.0), 60);
    game.add_platform(Platform::new(Vec2::new(-2000.0, 600.0), 4000.0));
    for i in 0..player_count {
        let name = format!("p{i}");
        game.spawn_player(&name, Vec2::new(40.0, 80.0), Vec2::new(i as f32 * 50.0, 0.0), PlayerKinematics::default());
    }
    game
}

fn step_bench(c: &mut Criterion) {
    let dt = 1.0 / 60.0;

    c.bench_function("step_8_players", |b| {
        let mut game = build_game(8);
        b.iter(|| {
            game.step(black_box(dt), Instant::now());
        });
    });

    c.bench_function("step_32_players", |b| {
        let mut game = build_game(32);
        b.iter(|| {
            game.step(black_box(dt), Instant::now());
        });
    });
}

criterion_group!(benches, step_bench);
criterion_main!(benches);
