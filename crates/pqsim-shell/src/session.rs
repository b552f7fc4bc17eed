//! Read-eval-print session over a scheduler.
//!
//! A `Session` owns the scheduler state and an output sink. Each input line
//! is parsed, validated, stepped and rendered; the session ends on `X`, end
//! of input, or when the idle process is killed.

use std::io::{self, BufRead, Write};

use pqsim_core::{step, SchedulerConfig, SchedulerState};
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::render::{OutputFormat, Renderer};

/// What the session does after a line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlFlow {
    /// Read the next line
    Continue,
    /// Stop reading
    Exit,
}

/// Operator session
pub struct Session<W: Write> {
    state: SchedulerState,
    renderer: Renderer,
    out: W,
    prompt: bool,
}

impl<W: Write> Session<W> {
    const PROMPT: &'static str = "pqsim> ";

    pub fn new(config: SchedulerConfig, format: OutputFormat, out: W) -> Self {
        Self {
            state: SchedulerState::new(config),
            renderer: Renderer::new(format),
            out,
            prompt: false,
        }
    }

    /// Print a prompt before each line (interactive text sessions)
    pub fn with_prompt(mut self, prompt: bool) -> Self {
        self.prompt = prompt && self.renderer.format() == OutputFormat::Text;
        self
    }

    /// Scheduler state, for inspection
    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Output sink
    pub fn writer(&self) -> &W {
        &self.out
    }

    /// Give back the output sink
    pub fn into_writer(self) -> W {
        self.out
    }

    /// Handle one input line
    pub fn execute(&mut self, line: &str) -> io::Result<ControlFlow> {
        let line = line.trim();

        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                debug!(input = line, error = %e, "rejected command");
                self.renderer.parse_error(&mut self.out, line, &e)?;
                return Ok(ControlFlow::Continue);
            }
        };

        match command {
            Command::Unknown { cmd } if cmd.is_empty() => Ok(ControlFlow::Continue),
            Command::Unknown { cmd } => {
                self.renderer.unknown(&mut self.out, line, &cmd)?;
                Ok(ControlFlow::Continue)
            }
            Command::Help => {
                self.renderer.help(&mut self.out, line)?;
                Ok(ControlFlow::Continue)
            }
            Command::Quit => {
                info!("session ended by operator");
                Ok(ControlFlow::Exit)
            }
            command => {
                let Some(operation) = command.operation() else {
                    return Ok(ControlFlow::Continue);
                };
                debug!(?operation, "executing");
                let result = step(&mut self.state, operation);
                self.renderer.step(&mut self.out, line, &result)?;

                if result.halted() {
                    info!("idle process killed, session over");
                    return Ok(ControlFlow::Exit);
                }
                Ok(ControlFlow::Continue)
            }
        }
    }

    /// Run lines from `input` until the session ends
    pub fn run<R: BufRead>(&mut self, input: R) -> io::Result<()> {
        let mut lines = input.lines();
        loop {
            if self.prompt {
                write!(self.out, "{}", Self::PROMPT)?;
                self.out.flush()?;
            }

            let Some(line) = lines.next() else {
                debug!("end of input");
                break;
            };
            let line = match line {
                Ok(line) => line,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    warn!(error = %e, "skipping unreadable line");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let flow = self.execute(&line)?;
            self.out.flush()?;
            if flow == ControlFlow::Exit {
                break;
            }
        }
        Ok(())
    }
}
