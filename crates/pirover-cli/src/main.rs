//! `pirover` – PiRover operator console
//!
//! This binary drives one rover control session from a terminal.  It:
//!
//! 1. Checks for `~/.pirover/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 2. Initialises tracing and the process-wide media runtime.
//! 3. Starts the UDP control link and a session against the simulated
//!    pipeline, whose motor/light registers the link streams to the rover.
//! 4. Drops the operator into an **interactive console** (`help` for the
//!    command list).
//! 5. Ends the session on `quit` or **Ctrl-C**: the pipeline is finalized
//!    (motors stopped), the wake lock released, and a final stop packet sent.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, warn};

use pirover_hal::{ControlLink, ControlState, LayoutSink, SimPipeline, SimWakeLock};
use pirover_kernel::{ProcessRuntime, init_process};
use pirover_runtime::{SessionController, init_tracing};
use pirover_types::RoverError;

/// Native size reported by the simulated stream.
const SIM_MEDIA_SIZE: (u32, u32) = (1280, 720);

fn main() {
    // Hold the guard for the whole process; dropping it flushes spans.
    let _tracing = init_tracing("pirover");

    print_banner();

    // ── First-Run Wizard ──────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    if let Err(e) = init_process(ProcessRuntime::new("sim")) {
        println!("{}: {}", "Media runtime unavailable".red(), e);
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            println!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(run_session(cfg));
    // The console thread may still be parked on stdin after Ctrl-C.
    runtime.shutdown_timeout(Duration::from_millis(200));

    if let Err(e) = result {
        error!(error = %e, "session failed");
        println!("{}: {}", "Session failed".red(), e);
        std::process::exit(1);
    }
}

async fn run_session(cfg: config::Config) -> Result<(), RoverError> {
    let remote = cfg.control_socket_addr().map_err(RoverError::Config)?;
    let control = Arc::new(ControlState::new());
    let link = ControlLink::spawn(remote, control.clone(), cfg.control_period()).await?;

    let pipeline = SimPipeline::threaded(SIM_MEDIA_SIZE.0, SIM_MEDIA_SIZE.1).with_control(control);
    let (session, layout) = SessionController::new(
        cfg.stream_uri.clone(),
        Box::new(pipeline),
        Box::new(SimWakeLock::new()),
    );
    let session = Arc::new(session);
    let layout_task = tokio::spawn(layout.run(ConsoleLayout));

    if let Err(e) = session.start() {
        layout_task.abort();
        link.stop().await;
        return Err(e);
    }

    println!(
        "  Streaming {} · control → {}",
        cfg.stream_uri.bold(),
        link.remote().to_string().bold()
    );
    println!("  Type {} for a list of commands.\n", "help".bold().cyan());

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let (interrupt_tx, mut interrupt_rx) = mpsc::unbounded_channel::<()>();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(());
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; use `quit` to end the session");
    }

    // ── Interactive console ───────────────────────────────────────────────
    let console_session = session.clone();
    let console = tokio::task::spawn_blocking(move || repl::run(&console_session));

    tokio::select! {
        _ = console => {}
        _ = interrupt_rx.recv() => {
            println!();
            println!("{}", "⚠  Ctrl-C received – ending session …".yellow().bold());
        }
    }

    session.end();
    println!("{}", "  ✓ Pipeline finalized, motors stopped.".green());
    link.stop().await;
    println!("{}", "  ✓ Final control packet sent.".green());
    layout_task.abort();
    Ok(())
}

/// Prints media size changes; stands in for a video view's relayout.
struct ConsoleLayout;

impl LayoutSink for ConsoleLayout {
    fn relayout(&mut self, width: u32, height: u32) {
        println!("\n  {} {}x{}", "video size".dimmed(), width, height);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║       PiRover First-Run Wizard       ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's point the console at your rover.\n");

    let mut cfg = config::Config::default();

    cfg.stream_uri = prompt_line(
        &format!("  Video stream URI [{}]: ", cfg.stream_uri),
        &cfg.stream_uri,
    );

    let addr = prompt_line(
        &format!("  Control address (host:port) [{}]: ", cfg.control_addr),
        &cfg.control_addr,
    );
    if addr.parse::<std::net::SocketAddr>().is_ok() {
        cfg.control_addr = addr;
    } else {
        println!(
            "  {} '{}' is not a valid address, keeping {}",
            "Warning:".yellow(),
            addr,
            cfg.control_addr
        );
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ____  _ ____                       "#.bold().cyan());
    println!("{}", r#"   / __ \(_) __ \____ _   _____  _____"#.bold().cyan());
    println!("{}", r#"  / /_/ / / /_/ / __ \ | / / _ \/ ___/"#.bold().cyan());
    println!("{}", r#" / ____/ / _, _/ /_/ / |/ /  __/ /    "#.bold().cyan());
    println!("{}", r#"/_/   /_/_/ |_|\____/|___/\___/_/     "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "PiRover".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Teleoperated rover control console");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() {
                default.to_string()
            } else {
                t
            }
        }
        Err(_) => default.to_string(),
    }
}
