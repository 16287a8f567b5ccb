//! `heightscan-cli` – Heightscan Command Line Interface
//!
//! This binary runs a live depth-to-heightmap scan. It:
//!
//! 1. Loads `~/.heightscan/config.toml`, writing a default one on first run.
//! 2. Starts the processing loop against the simulated depth source.
//! 3. Prints every N-th heightmap (summary or JSON lines).
//! 4. Drops the user into a control console (`/range`, `/nudge`, `/filter`,
//!    `/status`, `/help`, `/quit`).
//! 5. Intercepts **Ctrl-C** to stop the scan and exit cleanly.

mod config;
mod output;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{error, warn};

use heightscan_hal::SimDepthSource;
use heightscan_middleware::HeightmapBus;
use heightscan_perception::chain::FilterChain;
use heightscan_perception::range::RangeParameters;
use heightscan_runtime::{ControlPlane, LoopExit, LoopState, ProcessingLoop};

/// How often the main thread checks for a stop request.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    let _telemetry = heightscan_runtime::init_tracing("heightscan");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping scan …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; use /quit to exit");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = load_or_create_config();

    // ── Pipeline ──────────────────────────────────────────────────────────
    let chain = FilterChain::new(&cfg.filter_settings());
    let control = Arc::new(ControlPlane::new(
        RangeParameters::new(cfg.min_distance, cfg.max_distance),
        chain.toggles(),
    ));
    for stage in &cfg.disabled_filters {
        if let Err(e) = control.set_stage_enabled(stage, false) {
            warn!(stage = %stage, error = %e, "ignoring disabled_filters entry");
        }
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            println!("{}: {}", "Failed to start async runtime".red(), e);
            return;
        }
    };

    let bus = HeightmapBus::new(cfg.channel_capacity);
    let source = SimDepthSource::new("sim_depth");
    let mut handle = match ProcessingLoop::spawn(
        Box::new(source),
        chain,
        Arc::clone(&control),
        bus,
        cfg.loop_config(),
    ) {
        Ok(handle) => handle,
        Err(e) => {
            println!("{}: {}", "Failed to start scan".red(), e);
            return;
        }
    };

    if let Some(progress) = handle.take_progress() {
        runtime.spawn(output::print_samples(
            progress,
            cfg.print_every,
            cfg.emit_json,
        ));
    }

    println!(
        "  Scanning {}x{} @ {} fps, range {:.1}–{:.1} m. Type {} for commands.\n",
        cfg.stream_width,
        cfg.stream_height,
        cfg.fps,
        control.get_min_distance(),
        control.get_max_distance(),
        "/help".bold().cyan()
    );

    // ── Control console ───────────────────────────────────────────────────
    {
        let control = Arc::clone(&control);
        let shutdown = shutdown.clone();
        thread::spawn(move || repl::run(control, shutdown));
    }

    while !shutdown.load(Ordering::SeqCst) && control.state() != LoopState::Stopped {
        thread::sleep(SHUTDOWN_POLL_INTERVAL);
    }

    handle.stop();
    match handle.join() {
        Ok(LoopExit::Cancelled) => println!("{}", "  ✓ Scan stopped.".green()),
        Err(e) => {
            error!(error = %e, "scan ended with an error");
            println!("{}: {}", "Scan failed".red().bold(), e);
        }
    }
    runtime.shutdown_timeout(Duration::from_millis(200));
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

fn load_or_create_config() -> config::Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            with_env_overrides(cfg)
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            with_env_overrides(config::Config::default())
        }
    }
}

fn with_env_overrides(mut cfg: config::Config) -> config::Config {
    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __         _      __   __                      "#.bold().cyan());
    println!("{}", r#"  / /  ___   (_)__ _/ /  / /____ ____ ___ ____    "#.bold().cyan());
    println!("{}", r#" / _ \/ -_) / / _ `/ _ \/ __(_-</ __/ _ `/ _ \   "#.bold().cyan());
    println!("{}", r#"/_//_/\__/ /_/\_, /_//_/\__/___/\__/\_,_/_//_/   "#.bold().cyan());
    println!("{}", r#"             /___/                                "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Heightscan".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Depth-to-heightmap scanner");
    println!();
}
