//! REPL – the operator console for a rover session.
//!
//! Supported commands:
//!   left <tilt> | right <tilt>        – move a joystick (tilt -100..=100)
//!   release <side> | center <side>    – let a joystick go / recentre it
//!   light <head|tail|hazard> <on|off> – switch an accessory
//!   surface create                    – create a new display surface
//!   surface change <W> <H>            – size (attach) the current surface
//!   surface destroy                   – destroy the current surface
//!   play | pause                      – control playback
//!   status [json]                     – show the session state
//!   help                              – show this list
//!   quit | exit                       – end the session

use colored::Colorize;
use std::io::{self, BufRead, Write};

use pirover_runtime::{CommandOutcome, SessionController};
use pirover_types::{Accessory, Side, SurfaceHandle};

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Move { side: Side, tilt: i32 },
    Release(Side),
    Center(Side),
    Light { accessory: Accessory, on: bool },
    SurfaceCreate,
    SurfaceChange { width: u32, height: u32 },
    SurfaceDestroy,
    Play,
    Pause,
    Status { json: bool },
    Help,
    Quit,
}

pub fn parse(line: &str) -> Result<Command, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["left", tilt] => Ok(Command::Move {
            side: Side::Left,
            tilt: parse_num(tilt)?,
        }),
        ["right", tilt] => Ok(Command::Move {
            side: Side::Right,
            tilt: parse_num(tilt)?,
        }),
        ["release", side] => Ok(Command::Release(parse_side(side)?)),
        ["center" | "centre", side] => Ok(Command::Center(parse_side(side)?)),
        ["light", which, state] => Ok(Command::Light {
            accessory: parse_accessory(which)?,
            on: parse_switch(state)?,
        }),
        ["surface", "create"] => Ok(Command::SurfaceCreate),
        ["surface", "change", w, h] => Ok(Command::SurfaceChange {
            width: parse_num(w)?,
            height: parse_num(h)?,
        }),
        ["surface", "destroy"] => Ok(Command::SurfaceDestroy),
        ["play"] => Ok(Command::Play),
        ["pause"] => Ok(Command::Pause),
        ["status"] => Ok(Command::Status { json: false }),
        ["status", "json"] => Ok(Command::Status { json: true }),
        ["help"] => Ok(Command::Help),
        ["quit" | "exit"] => Ok(Command::Quit),
        _ => Err(format!("Unknown command: '{}'", line.trim())),
    }
}

fn parse_num<T: std::str::FromStr>(raw: &str) -> Result<T, String> {
    raw.parse().map_err(|_| format!("'{raw}' is not a valid number"))
}

fn parse_side(raw: &str) -> Result<Side, String> {
    match raw {
        "left" | "l" => Ok(Side::Left),
        "right" | "r" => Ok(Side::Right),
        _ => Err(format!("'{raw}' is not a side (left/right)")),
    }
}

fn parse_accessory(raw: &str) -> Result<Accessory, String> {
    match raw {
        "head" | "headlights" => Ok(Accessory::Headlights),
        "tail" | "taillights" => Ok(Accessory::Taillights),
        "hazard" | "hazards" => Ok(Accessory::Hazards),
        _ => Err(format!("'{raw}' is not a light (head/tail/hazard)")),
    }
}

fn parse_switch(raw: &str) -> Result<bool, String> {
    match raw {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(format!("'{raw}' must be on or off")),
    }
}

/// Console state that outlives a single command: the host-side surface
/// handles the operator is simulating.
#[derive(Debug, Default)]
pub struct Console {
    current: Option<SurfaceHandle>,
    next_handle: u64,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `cmd` against `session`.  Returns `false` when the console should
    /// stop.
    pub fn execute(&mut self, session: &SessionController, cmd: Command) -> bool {
        match cmd {
            Command::Move { side, tilt } => report_motor(session.joystick_moved(side, 0, tilt)),
            Command::Release(side) => report_motor(session.joystick_released(side)),
            Command::Center(side) => report_motor(session.joystick_centered(side)),
            Command::Light { accessory, on } => {
                report(session.set_accessory(accessory, on), &format!("{accessory} {}", if on { "on" } else { "off" }))
            }
            Command::SurfaceCreate => {
                self.next_handle += 1;
                let handle = SurfaceHandle(self.next_handle);
                session.surface_created(handle);
                self.current = Some(handle);
                println!("  {} {}", "✓ created".green(), handle.to_string().bold());
            }
            Command::SurfaceChange { width, height } => match self.current {
                Some(handle) => report(
                    session.surface_changed(handle, width, height),
                    &format!("{handle} attached at {width}x{height}"),
                ),
                None => println!("  {}", "No surface; run `surface create` first.".yellow()),
            },
            Command::SurfaceDestroy => {
                report(session.surface_destroyed(), "surface destroyed");
                self.current = None;
            }
            Command::Play => report(session.play(), "playing"),
            Command::Pause => report(session.pause(), "paused"),
            Command::Status { json } => print_status(session, json),
            Command::Help => print_help(),
            Command::Quit => return false,
        }
        true
    }
}

/// Read commands from stdin until `quit` or EOF.
pub fn run(session: &SessionController) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut console = Console::new();

    loop {
        print!("{} ", "pirover>".bold().cyan());
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

        if line.trim().is_empty() {
            continue;
        }

        match parse(&line) {
            Ok(cmd) => {
                if !console.execute(session, cmd) {
                    break;
                }
            }
            Err(e) => println!(
                "{} Type {} for available commands.",
                e.red(),
                "help".bold()
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn report_motor(outcome: CommandOutcome) {
    match outcome {
        CommandOutcome::Forwarded(cmd) => {
            println!("  {} {} {}", "✓".green(), cmd.side, cmd.speed.to_string().bold())
        }
        CommandOutcome::Dropped { command, reason } => println!(
            "  {} {} {} ({})",
            "dropped".yellow(),
            command.side,
            command.speed,
            reason.to_string().dimmed()
        ),
    }
}

fn report(result: Result<(), pirover_types::RoverError>, done: &str) {
    match result {
        Ok(()) => println!("  {} {}", "✓".green(), done),
        Err(e) => println!("  {} {}", "✗".red(), e),
    }
}

fn print_status(session: &SessionController, json: bool) {
    let status = session.status();
    if json {
        match serde_json::to_string_pretty(&status) {
            Ok(s) => println!("{s}"),
            Err(e) => println!("{}: {}", "Serialization error".red(), e),
        }
        return;
    }
    println!("{}", "Session".bold().underline());
    println!("  id        : {}", status.info.id.to_string().dimmed());
    println!("  stream    : {}", status.info.stream_uri);
    println!("  state     : {}", status.state.to_string().yellow());
    match status.render_target {
        Some(t) => println!("  surface   : {} {}x{}", t.handle, t.width, t.height),
        None => println!("  surface   : {}", "none".dimmed()),
    }
    println!(
        "  motors    : left {} right {} (pending {} / {})",
        status.last_command.left,
        status.last_command.right,
        status.pending.left,
        status.pending.right
    );
    for (accessory, on) in &status.accessories {
        let flag = if *on { "on".green() } else { "off".dimmed() };
        println!("  {:<10}: {}", accessory.to_string(), flag);
    }
    println!(
        "  keep-awake: {}",
        if status.keep_awake { "held".green() } else { "released".dimmed() }
    );
}

fn print_help() {
    println!();
    println!("{}", "Rover Commands".bold().underline());
    println!("  {}        – drive one side", "left|right <tilt>".bold().cyan());
    println!("  {}  – stop one side", "release|center <side>".bold().cyan());
    println!("  {} – switch a light", "light <head|tail|hazard> <on|off>".bold().cyan());
    println!("  {} – simulate host surface events", "surface create|change W H|destroy".bold().cyan());
    println!("  {}               – playback", "play|pause".bold().cyan());
    println!("  {}            – session state", "status [json]".bold().cyan());
    println!("  {}               – end the session", "quit|exit".bold().cyan());
    println!();
}
