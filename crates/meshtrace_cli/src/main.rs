//! Meshtrace CLI
//!
//! Indexes grid-simulation trace logs, inspects single cycles, and drives a
//! replay session from a periodic tick loop.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand};
use color_eyre::Result;
use meshtrace_core::Cycle;
use meshtrace_index::{FileSource, TraceIndex, build_index, load_cycle_range};
use meshtrace_replay::{Phase, ReplayConfig, ReplayEvent, ReplaySession, TokioSpawner};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshtrace")]
#[command(about = "Trace indexing and replay for simulated processing-unit grids", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a trace and print a summary
    Index {
        /// Path to the trace log
        #[arg(short, long)]
        file: PathBuf,
        /// Emit the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the events of one cycle
    Inspect {
        /// Path to the trace log
        #[arg(short, long)]
        file: PathBuf,
        /// Cycle to load
        #[arg(short, long)]
        cycle: u32,
    },
    /// Replay a trace, printing events as they apply
    Replay {
        /// Path to the trace log
        #[arg(short, long)]
        file: PathBuf,
        /// Playback speed in cycles per second
        #[arg(short, long, default_value_t = 10.0)]
        speed: f64,
        /// Tick period in milliseconds
        #[arg(long, default_value_t = 33)]
        tick_ms: u64,
        /// Seek here before playing
        #[arg(long)]
        from: Option<i64>,
    },
}

#[derive(Serialize)]
struct IndexSummary {
    dim_x: u16,
    dim_y: u16,
    indexed_cycles: usize,
    min_cycle: Option<u32>,
    max_cycle: Option<u32>,
    total_landings: u64,
    unit_transitions: usize,
}

impl IndexSummary {
    fn of(index: &TraceIndex) -> Self {
        Self {
            dim_x: index.dim_x(),
            dim_y: index.dim_y(),
            indexed_cycles: index.cycle_index().len(),
            min_cycle: index.min_cycle().map(|c| c.as_u32()),
            max_cycle: index.max_cycle().map(|c| c.as_u32()),
            total_landings: index.total_landings(),
            unit_transitions: index.unit_state_log().transition_count(),
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Index { file, json } => cmd_index(&file, json),
        Commands::Inspect { file, cycle } => cmd_inspect(&file, cycle),
        Commands::Replay {
            file,
            speed,
            tick_ms,
            from,
        } => cmd_replay(&file, speed, tick_ms, from),
    }
}

fn open_index(file: &PathBuf) -> Result<TraceIndex> {
    let source = Arc::new(FileSource::open(file)?);
    Ok(build_index(source)?)
}

fn cmd_index(file: &PathBuf, json: bool) -> Result<()> {
    let index = open_index(file)?;
    let summary = IndexSummary::of(&index);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("grid: {}x{}", summary.dim_x, summary.dim_y);
        println!("indexed cycles: {}", summary.indexed_cycles);
        match (summary.min_cycle, summary.max_cycle) {
            (Some(min), Some(max)) => println!("cycle bounds: @{min}..@{max}"),
            _ => println!("cycle bounds: none (no qualifying events)"),
        }
        println!("landings: {}", summary.total_landings);
        println!("unit transitions: {}", summary.unit_transitions);
    }
    Ok(())
}

fn cmd_inspect(file: &PathBuf, cycle: u32) -> Result<()> {
    let index = open_index(file)?;
    let Some(pos) = index.cycle_index().find(Cycle::from_raw(cycle)) else {
        println!("@{cycle}: no events");
        return Ok(());
    };
    let events = load_cycle_range(&index, pos, pos)?;
    for (_, cycle_events) in events {
        for landing in &cycle_events.landings {
            let grid = landing.unit.to_grid(index.dim_y());
            match landing.source_coords() {
                Some((sx, sy)) => println!(
                    "{} {} (row {}, col {}) landing C{} via {} from ({sx},{sy})",
                    landing.cycle, landing.unit, grid.row, grid.col, landing.color, landing.link
                ),
                None => println!(
                    "{} {} (row {}, col {}) landing C{} locally originated",
                    landing.cycle, landing.unit, grid.row, grid.col, landing.color
                ),
            }
        }
        for change in &cycle_events.exec_changes {
            println!(
                "{} {} busy={} opcode={}",
                change.cycle,
                change.unit,
                change.busy,
                change.opcode.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}

fn cmd_replay(file: &PathBuf, speed: f64, tick_ms: u64, from: Option<i64>) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let config = ReplayConfig::default().with_initial_speed(speed);
        let mut session = ReplaySession::new(config, Arc::new(TokioSpawner));

        let source = Arc::new(FileSource::open(file)?);
        session.load(source)?;
        if let Some(target) = from {
            let snapshot = session.seek(target);
            let active = snapshot.values().filter(|s| s.is_active()).count();
            tracing::info!(target, active_units = active, "seeked before playback");
        }
        session.play(Instant::now());

        let mut ticker = tokio::time::interval(Duration::from_millis(tick_ms.max(1)));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    session.tick(Instant::now(), &mut print_event);
                    if session.phase() == Phase::Done {
                        println!("done at {:?}", session.cursor());
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    session.cancel();
                    break;
                }
            }
        }
        Ok(())
    })
}

fn print_event(event: ReplayEvent) {
    match event {
        ReplayEvent::Landing(landing) => {
            println!(
                "{} {} landing C{} via {}",
                landing.cycle, landing.unit, landing.color, landing.link
            );
        }
        ReplayEvent::UnitState(change) => {
            println!(
                "{} {} busy={} opcode={}",
                change.cycle,
                change.unit,
                change.busy,
                change.opcode.as_deref().unwrap_or("-")
            );
        }
    }
}
