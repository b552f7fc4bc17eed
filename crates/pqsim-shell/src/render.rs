//! Rendering of step results for the operator.
//!
//! The core hands back data only (`Outcome`, `Event`, `SchedulerError`);
//! all wording lives here. Two formats: human-readable text and one JSON
//! object per command line.

use std::io::{self, Write};

use pqsim_core::{
    BlockReason, Event, Location, Message, Outcome, ProcessInfo, SchedulerError, StepResult,
    SystemSnapshot,
};
use serde::Serialize;

use crate::command::{Command, ParseError};

/// How results are written
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable report
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// One line of `--json` output
#[derive(Serialize)]
struct Record<'a> {
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'a Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    events: &'a [Event],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    help: Vec<&'static str>,
}

impl<'a> Record<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            outcome: None,
            error: None,
            events: &[],
            help: Vec::new(),
        }
    }
}

/// Writes results in the configured format
#[derive(Clone, Copy, Debug, Default)]
pub struct Renderer {
    format: OutputFormat,
}

impl Renderer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Report the result of one scheduler operation
    pub fn step<W: Write>(&self, out: &mut W, input: &str, result: &StepResult) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                let mut record = Record::new(input);
                record.events = &result.events;
                match &result.result {
                    Ok(outcome) => record.outcome = Some(outcome),
                    Err(e) => record.error = Some(e.to_string()),
                }
                write_json(out, &record)
            }
            OutputFormat::Text => {
                match &result.result {
                    Ok(outcome) => write_outcome(out, outcome)?,
                    Err(e) => write_error(out, e)?,
                }
                for event in &result.events {
                    if let Some(line) = describe_event(event) {
                        writeln!(out, "  - {line}")?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Report a command line that failed validation
    pub fn parse_error<W: Write>(&self, out: &mut W, input: &str, error: &ParseError) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                let mut record = Record::new(input);
                record.error = Some(error.to_string());
                write_json(out, &record)
            }
            OutputFormat::Text => {
                writeln!(out, "Error: {error}")?;
                writeln!(out, "Type 'H' for available commands.")
            }
        }
    }

    /// Report an unrecognized command
    pub fn unknown<W: Write>(&self, out: &mut W, input: &str, cmd: &str) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                let mut record = Record::new(input);
                record.error = Some(format!("unknown command: {cmd}"));
                write_json(out, &record)
            }
            OutputFormat::Text => {
                writeln!(out, "Unknown command: {cmd}")?;
                writeln!(out, "Type 'H' for available commands.")
            }
        }
    }

    /// List every command
    pub fn help<W: Write>(&self, out: &mut W, input: &str) -> io::Result<()> {
        let lines: Vec<&'static str> = Command::all().iter().map(Command::usage).collect();
        match self.format {
            OutputFormat::Json => {
                let mut record = Record::new(input);
                record.help = lines;
                write_json(out, &record)
            }
            OutputFormat::Text => {
                writeln!(out, "=== pqsim commands ===")?;
                for line in lines {
                    writeln!(out, "  {line}")?;
                }
                writeln!(out, "Letters are case-insensitive; messages are 1-40 characters.")
            }
        }
    }
}

fn write_json<W: Write>(out: &mut W, record: &Record<'_>) -> io::Result<()> {
    serde_json::to_writer(&mut *out, record)?;
    writeln!(out)
}

fn write_error<W: Write>(out: &mut W, error: &SchedulerError) -> io::Result<()> {
    writeln!(out, "Error: {error}")
}

// ============================================================================
// Text rendering
// ============================================================================

fn write_outcome<W: Write>(out: &mut W, outcome: &Outcome) -> io::Result<()> {
    match outcome {
        Outcome::Created { pid } => writeln!(out, "Created process {pid}."),
        Outcome::Forked { parent, pid } => {
            writeln!(out, "Forked process {parent} into process {pid}.")
        }
        Outcome::Killed { process, halted } => {
            if *halted {
                writeln!(out, "Killed the idle process.")
            } else {
                writeln!(
                    out,
                    "Killed process {} ({}).",
                    process.pid,
                    describe_location(process.location)
                )
            }
        }
        Outcome::QuantumExpired { pid, priority } => {
            writeln!(out, "Quantum expired for process {pid}, now at priority {priority}.")
        }
        Outcome::Sent { target, .. } => writeln!(out, "Sent message to process {target}."),
        Outcome::Received { message, blocked } => match (message, blocked) {
            (Some(m), _) => writeln!(out, "Received {}.", describe_message(m)),
            (None, true) => writeln!(out, "No message waiting; receiver blocked."),
            (None, false) => writeln!(out, "No message waiting."),
        },
        Outcome::Replied { target, .. } => writeln!(out, "Replied to process {target}."),
        Outcome::SemaphoreInitialized { id, value } => {
            writeln!(out, "Semaphore {id} initialized to {value}.")
        }
        Outcome::SemaphoreWaited { id, value, .. } => {
            writeln!(out, "P on semaphore {id}: value is now {value}.")
        }
        Outcome::SemaphoreSignaled { id, value, readied } => match readied {
            Some(pid) => writeln!(
                out,
                "V on semaphore {id}: value is now {value}, process {pid} readied."
            ),
            None => writeln!(out, "V on semaphore {id}: value is now {value}."),
        },
        Outcome::ProcessInfo(info) => {
            write_header(out)?;
            write_row(out, info)
        }
        Outcome::Snapshot(snapshot) => write_snapshot(out, snapshot),
    }
}

fn write_header<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "PID    STATE    PRI  WHERE                   MAILBOX")?;
    writeln!(out, "---    -----    ---  -----                   -------")
}

fn write_row<W: Write>(out: &mut W, info: &ProcessInfo) -> io::Result<()> {
    let pid = if info.is_idle {
        format!("{}*", info.pid)
    } else {
        info.pid.to_string()
    };
    let mailbox = info
        .mailbox
        .as_ref()
        .map(describe_message)
        .unwrap_or_else(|| "(empty)".to_string());
    writeln!(
        out,
        "{:<6} {:<8} {:<4} {:<23} {}",
        pid,
        info.state,
        info.priority,
        describe_location(info.location),
        mailbox
    )
}

fn write_section<W: Write>(out: &mut W, title: &str, procs: &[ProcessInfo]) -> io::Result<()> {
    writeln!(out, "{title}:")?;
    if procs.is_empty() {
        return writeln!(out, "  (empty)");
    }
    for info in procs {
        write!(out, "  ")?;
        write_row(out, info)?;
    }
    Ok(())
}

fn write_snapshot<W: Write>(out: &mut W, snapshot: &SystemSnapshot) -> io::Result<()> {
    write_header(out)?;
    write_section(out, "Running", std::slice::from_ref(&snapshot.running))?;
    for (level, procs) in snapshot.ready.iter().enumerate() {
        write_section(out, &format!("Priority level {level}"), procs)?;
    }
    if snapshot.semaphores.is_empty() {
        writeln!(out, "Semaphores: none initialized")?;
    }
    for sem in &snapshot.semaphores {
        write_section(
            out,
            &format!("Semaphore {} (value {})", sem.id, sem.value),
            &sem.waiters,
        )?;
    }
    write_section(out, "Waiting for reply", &snapshot.reply_wait)?;
    write_section(out, "Waiting to receive", &snapshot.receive_wait)
}

fn describe_message(message: &Message) -> String {
    format!("\"{}\" from process {}", message.text, message.sender)
}

fn describe_location(location: Location) -> String {
    match location {
        Location::Running => "running".to_string(),
        Location::Idle => "idle, not running".to_string(),
        Location::Ready(p) => format!("priority level {p}"),
        Location::Semaphore(id) => format!("semaphore {id}"),
        Location::ReplyWait => "waiting for reply".to_string(),
        Location::ReceiveWait => "waiting to receive".to_string(),
    }
}

/// One line per scheduling decision; `None` for events the outcome line
/// already covers
fn describe_event(event: &Event) -> Option<String> {
    let line = match event {
        Event::Created { pid, priority } => {
            format!("process {pid} admitted at priority {priority}")
        }
        Event::PriorityReassigned { pid, from, to } => {
            format!("priority level {from} full: process {pid} reassigned to priority {to}")
        }
        Event::Demoted { pid, from, to } => {
            format!("process {pid} moved from priority {from} to {to}")
        }
        Event::Blocked { pid, reason } => {
            let why = match reason {
                BlockReason::Semaphore(id) => format!("on semaphore {id}"),
                BlockReason::Reply => "awaiting a reply".to_string(),
                BlockReason::Receive => "awaiting a message".to_string(),
            };
            format!("process {pid} blocked {why}")
        }
        Event::Unblocked { pid } => format!("process {pid} is ready again"),
        Event::Dispatched { idle: true, .. } => "idle process is now running".to_string(),
        Event::Dispatched { pid, priority, .. } => {
            format!("process {pid} is now running at priority {priority}")
        }
        Event::MessageDelivered { pid, message } => {
            format!("process {pid} received {}", describe_message(message))
        }
        Event::Killed { .. } => return None,
        Event::Halted => "no processes left: simulation over".to_string(),
    };
    Some(line)
}
