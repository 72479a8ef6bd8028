//! Marga demo CLI
//!
//! Loads a configuration and field map, plans one path with the background
//! engine, waits for the anytime search to converge, and prints the result.
//!
//! # Usage
//!
//! ```bash
//! marga --navgrid configs/navgrid.json --start 1.5,1.5 --goal 14.0,6.5 \
//!       --obstacle 7.0,3.0,8.0,5.0 --json
//! ```

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use marga::{
    GoalEndState, GridCoord, MargaConfig, MargaError, NavGrid, ObstacleBox, PathConstraints,
    PathfindingEngine, PlannerPath, PlannerStatus, Result, WorldPoint,
};

#[derive(Parser, Debug)]
#[command(name = "marga")]
#[command(about = "Plan a smoothed path across the field")]
struct Args {
    /// Configuration file (defaults to ./marga.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Field map, overrides grid.navgrid_path from the configuration
    #[arg(short, long)]
    navgrid: Option<PathBuf>,

    /// Start position in meters as X,Y
    #[arg(long, value_parser = parse_point, default_value = "1.0,1.0")]
    start: WorldPoint,

    /// Goal position in meters as X,Y
    #[arg(long, value_parser = parse_point)]
    goal: WorldPoint,

    /// Obstacle box as X1,Y1,X2,Y2 (repeatable)
    #[arg(long = "obstacle", value_parser = parse_box)]
    obstacles: Vec<ObstacleBox>,

    /// How long to wait for convergence
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    converged: bool,
    solve_time_ms: f64,
    solution_cost: f64,
    epsilon: f64,
    status: PlannerStatus,
    raw: &'a [GridCoord],
    control_points: &'a [WorldPoint],
    path: Option<&'a PlannerPath>,
}

fn parse_numbers(value: &str, count: usize) -> std::result::Result<Vec<f64>, String> {
    let numbers = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid number in '{}': {}", value, e))?;
    if numbers.len() != count {
        return Err(format!("expected {} comma-separated values, got '{}'", count, value));
    }
    Ok(numbers)
}

fn parse_point(value: &str) -> std::result::Result<WorldPoint, String> {
    let n = parse_numbers(value, 2)?;
    Ok(WorldPoint::new(n[0], n[1]))
}

fn parse_box(value: &str) -> std::result::Result<ObstacleBox, String> {
    let n = parse_numbers(value, 4)?;
    Ok(ObstacleBox::new(
        WorldPoint::new(n[0], n[1]),
        WorldPoint::new(n[2], n[3]),
    ))
}

/// Explicit path, then `./marga.toml`, then defaults. A file that cannot be
/// loaded is reported and replaced by the defaults.
fn load_config(path: Option<&Path>) -> MargaConfig {
    let path = match path {
        Some(path) => path,
        None if Path::new("marga.toml").exists() => Path::new("marga.toml"),
        None => {
            info!("Using default configuration");
            return MargaConfig::default();
        }
    };

    info!("Loading configuration from {:?}", path);
    match MargaConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            warn!("{}; using default configuration", e);
            MargaConfig::default()
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("marga=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let config = load_config(args.config.as_deref());
    let navgrid_path = args.navgrid.clone().or_else(|| config.grid.navgrid_path.clone());
    let navgrid = NavGrid::load_or_default(navgrid_path.as_deref());

    let engine = PathfindingEngine::new(&config, navgrid);
    let started = Instant::now();

    engine.set_start_position(args.start);
    if !args.obstacles.is_empty() {
        engine.set_dynamic_obstacles(&args.obstacles, args.start);
    }
    engine.set_goal_position(args.goal);

    let converged = engine.wait_until_idle(Duration::from_millis(args.timeout_ms));
    let solve_time = started.elapsed();
    if !converged {
        warn!(
            "Search still running after {} ms, reporting the latest path",
            args.timeout_ms
        );
    }

    let published = engine.published_path();
    let path = engine.current_path(PathConstraints::default(), GoalEndState::default());
    let status = engine.status();

    if args.json {
        let report = Report {
            converged,
            solve_time_ms: solve_time.as_secs_f64() * 1000.0,
            solution_cost: published.solution_cost,
            epsilon: published.epsilon,
            status,
            raw: &published.raw,
            control_points: &published.control_points,
            path: path.as_ref(),
        };
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| MargaError::Search(format!("Failed to encode report: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }

    let Some(path) = path else {
        println!("No path available (start and goal may share a cell)");
        return Ok(());
    };

    println!(
        "Path: {} points, {:.2} m, {} raw cells, {} control points",
        path.len(),
        path.length(),
        published.raw.len(),
        published.control_points.len()
    );
    println!(
        "Search: eps {:.2}, cost {:.3} cells, {} expansions, {:.1} ms{}",
        published.epsilon,
        published.solution_cost,
        status.expansions,
        solve_time.as_secs_f64() * 1000.0,
        if converged { "" } else { " (not converged)" }
    );
    for point in path.points() {
        println!(
            "{:8.3} {:8.3}  s={:.3}",
            point.position.x, point.position.y, point.distance_along_path
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_invalid_config_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[planner]\nepsilon_step = 0.0").unwrap();

        let config = load_config(Some(file.path()));
        assert_eq!(config.planner.epsilon_step, MargaConfig::default().planner.epsilon_step);
    }

    #[test]
    fn test_missing_config_file_falls_back_to_defaults() {
        let config = load_config(Some(Path::new("/nonexistent/marga.toml")));
        assert!(config.validate().is_ok());
    }
}
