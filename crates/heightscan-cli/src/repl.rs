//! REPL – control console for a running scan.
//!
//! Supported slash-commands:
//!   /range MIN MAX         – set the distance window (metres)
//!   /nudge DMIN DMAX       – shift the distance window
//!   /filter NAME on|off    – toggle a filter stage
//!   /status                – show loop state, window and stages
//!   /help                  – show this list
//!   /quit | /exit          – stop the scan and exit

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use heightscan_runtime::ControlPlane;

/// A parsed console command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Range { min: f32, max: f32 },
    Nudge { delta_min: f32, delta_max: f32 },
    Filter { stage: String, enabled: bool },
    Status,
    Help,
    Quit,
}

/// Parse one input line. Errors are user-facing messages.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = words.collect();

    match (head, args.as_slice()) {
        ("/range", [min, max]) => Ok(Command::Range {
            min: parse_metres(min)?,
            max: parse_metres(max)?,
        }),
        ("/nudge", [dmin, dmax]) => Ok(Command::Nudge {
            delta_min: parse_metres(dmin)?,
            delta_max: parse_metres(dmax)?,
        }),
        ("/filter", [stage, state]) => {
            let enabled = match state.to_ascii_lowercase().as_str() {
                "on" | "enable" | "true" => true,
                "off" | "disable" | "false" => false,
                other => return Err(format!("expected on|off, got '{other}'")),
            };
            Ok(Command::Filter {
                stage: stage.to_string(),
                enabled,
            })
        }
        ("/status", []) => Ok(Command::Status),
        ("/help", []) => Ok(Command::Help),
        ("/quit" | "/exit", []) => Ok(Command::Quit),
        ("/range", _) => Err("usage: /range MIN MAX".to_string()),
        ("/nudge", _) => Err("usage: /nudge DMIN DMAX".to_string()),
        ("/filter", _) => Err("usage: /filter NAME on|off".to_string()),
        (other, _) => Err(format!("unknown command '{other}'")),
    }
}

fn parse_metres(raw: &str) -> Result<f32, String> {
    raw.parse::<f32>()
        .map_err(|_| format!("'{raw}' is not a number"))
}

/// Apply `command` to `control`. Returns `false` when the console should
/// exit.
pub fn execute(command: &Command, control: &ControlPlane) -> bool {
    match command {
        Command::Range { min, max } => {
            control.set_distance_range(*min, *max);
            print_range(control);
        }
        Command::Nudge {
            delta_min,
            delta_max,
        } => {
            control.update_distance_range(*delta_min, *delta_max);
            print_range(control);
        }
        Command::Filter { stage, enabled } => match control.set_stage_enabled(stage, *enabled) {
            Ok(()) => println!(
                "  {} {} {}",
                "✓".green(),
                stage.bold(),
                if *enabled { "enabled".green() } else { "disabled".yellow() }
            ),
            Err(e) => println!(
                "  {} {} (stages: {})",
                "Error:".red(),
                e,
                control.stage_names().join(", ")
            ),
        },
        Command::Status => cmd_status(control),
        Command::Help => cmd_help(),
        Command::Quit => {
            println!("{}", "Stopping scan.".green());
            return false;
        }
    }
    true
}

/// Entry point for the interactive console.
///
/// `shutdown` is polled each iteration and set when the user quits.
pub fn run(control: Arc<ControlPlane>, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "heightscan>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_command(line) {
            Ok(command) => {
                if !execute(&command, &control) {
                    break;
                }
            }
            Err(msg) => println!(
                "{} {}. Type {} for available commands.",
                "Error:".red(),
                msg,
                "/help".bold()
            ),
        }
    }
    shutdown.store(true, Ordering::SeqCst);
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Heightscan Commands".bold().underline());
    println!("  {}     – set the distance window (m)", "/range MIN MAX".bold().cyan());
    println!("  {}   – shift the distance window (m)", "/nudge DMIN DMAX".bold().cyan());
    println!("  {} – toggle a filter stage", "/filter NAME on|off".bold().cyan());
    println!("  {}            – loop state, window and stages", "/status".bold().cyan());
    println!("  {}      – stop the scan and exit", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_status(control: &ControlPlane) {
    println!("{}", "Scan Status".bold().underline());
    println!("  State  : {}", control.state().to_string().yellow());
    print_range(control);
    println!("  Stages :");
    for name in control.stage_names() {
        let marker = match control.stage_enabled(&name) {
            Some(true) => "on ".green(),
            _ => "off".dimmed(),
        };
        println!("    [{}] {}", marker, name.bold());
    }
}

fn print_range(control: &ControlPlane) {
    println!(
        "  Range  : {:.1} m – {:.1} m",
        control.get_min_distance(),
        control.get_max_distance()
    );
}
