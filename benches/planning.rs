//! Benchmark search passes and the engine round trip on the default field.

use std::time::Duration;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use marga::planning::{AdStarPlanner, PathSmoother};
use marga::{
    GridCoord, GridGeometry, MargaConfig, NavGrid, ObstacleMap, PathfindingEngine, WorldPoint,
};

/// Default field with a few wall segments, each with a gap.
fn field_obstacles(geometry: GridGeometry) -> ObstacleMap {
    let height = geometry.height() as i32;
    let mut blocked = Vec::new();
    for (column, gap) in [(20, 8), (41, 30), (62, 15)] {
        for y in 0..height {
            if (y - gap).abs() > 2 {
                blocked.push(GridCoord::new(column, y));
            }
        }
    }
    ObstacleMap::new(geometry, blocked)
}

fn bench_first_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("first_pass");
    let geometry = NavGrid::default().geometry();
    let start = GridCoord::new(2, 2);

    for (name, map) in [
        ("open", ObstacleMap::empty(geometry)),
        ("walls", field_obstacles(geometry)),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &map, |b, map| {
            let mut planner = AdStarPlanner::with_defaults(geometry);
            b.iter(|| {
                planner.reset(start, GridCoord::new(80, 38)).unwrap();
                let pass = planner.improve(start, black_box(map)).unwrap();
                black_box(pass)
            })
        });
    }

    group.finish();
}

fn bench_full_convergence(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_convergence");
    let geometry = NavGrid::default().geometry();
    let map = field_obstacles(geometry);
    let start = GridCoord::new(2, 2);

    for goal in [GridCoord::new(30, 20), GridCoord::new(80, 38)] {
        group.bench_with_input(BenchmarkId::from_parameter(goal), &goal, |b, goal| {
            let mut planner = AdStarPlanner::with_defaults(geometry);
            b.iter(|| {
                planner.reset(start, *goal).unwrap();
                planner.improve(start, &map).unwrap();
                while planner.refine(start, &map).unwrap().is_some() {}
                black_box(planner.solution_cost())
            })
        });
    }

    group.finish();
}

fn bench_smoothing(c: &mut Criterion) {
    let geometry = NavGrid::default().geometry();
    let map = field_obstacles(geometry);
    let start = GridCoord::new(2, 2);
    let goal = GridCoord::new(80, 38);

    let mut planner = AdStarPlanner::with_defaults(geometry);
    planner.reset(start, goal).unwrap();
    planner.improve(start, &map).unwrap();
    while planner.refine(start, &map).unwrap().is_some() {}

    let smoother = PathSmoother::with_defaults();
    c.bench_function("extract_and_smooth", |b| {
        b.iter(|| {
            let smoothed = smoother.smooth(
                black_box(&planner),
                &map,
                geometry.cell_center(start),
                geometry.cell_center(goal),
            );
            black_box(smoothed)
        })
    });
}

fn bench_engine_round_trip(c: &mut Criterion) {
    let engine = PathfindingEngine::new(&MargaConfig::default(), NavGrid::default());
    engine.set_start_position(WorldPoint::new(0.5, 0.5));
    let goals = [WorldPoint::new(15.0, 7.0), WorldPoint::new(12.0, 2.0)];
    let mut toggle = 0;

    c.bench_function("engine_goal_change", |b| {
        b.iter(|| {
            toggle ^= 1;
            engine.set_goal_position(goals[toggle]);
            black_box(engine.wait_until_idle(Duration::from_secs(5)))
        })
    });
}

criterion_group!(
    benches,
    bench_first_pass,
    bench_full_convergence,
    bench_smoothing,
    bench_engine_round_trip
);
criterion_main!(benches);
