//! Command Parsing
//!
//! Type-safe command representation for operator input. Malformed arguments
//! are rejected here and never reach the scheduler.

use pqsim_core::{Operation, ProcessId, SemaphoreId, MAX_MESSAGE_LEN};
use thiserror::Error;

/// Parsed operator command.
///
/// One variant per command letter. Letters are case-insensitive and any
/// extra tokens after the expected arguments are ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `C` - create a process
    Create,

    /// `F` - fork the running process
    Fork,

    /// `K pid` - kill a process
    Kill { pid: ProcessId },

    /// `E` - kill the running process
    Exit,

    /// `Q` - expire the running process's quantum
    Quantum,

    /// `S pid text` - send and wait for a reply
    Send { pid: ProcessId, text: String },

    /// `R` - receive
    Receive,

    /// `Y pid text` - reply
    Reply { pid: ProcessId, text: String },

    /// `N sem value` - initialize a semaphore
    NewSemaphore { id: SemaphoreId, value: i32 },

    /// `P sem`
    SemaphoreP { id: SemaphoreId },

    /// `V sem`
    SemaphoreV { id: SemaphoreId },

    /// `I pid` - process info
    ProcInfo { pid: ProcessId },

    /// `T` - total info
    TotalInfo,

    /// `H` or `?` - list commands
    Help,

    /// `X` - end the session
    Quit,

    /// Unrecognized command
    Unknown { cmd: String },
}

/// Error returned when parsing a command fails.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Command requires an argument that was not provided
    #[error("{command} requires {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    /// Argument could not be parsed as expected type
    #[error("{argument} {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: &'static str,
    },
}

/// Split off the first whitespace-delimited word; the remainder is trimmed.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (s, ""),
    }
}

fn parse_pid(command: &'static str, arg: &str) -> Result<ProcessId, ParseError> {
    if arg.is_empty() {
        return Err(ParseError::MissingArgument {
            command,
            argument: "pid",
        });
    }
    arg.parse::<u16>()
        .map(ProcessId)
        .map_err(|_| ParseError::InvalidArgument {
            argument: "pid",
            reason: "must be a number from 0 to 65535",
        })
}

fn parse_semaphore(command: &'static str, arg: &str) -> Result<SemaphoreId, ParseError> {
    if arg.is_empty() {
        return Err(ParseError::MissingArgument {
            command,
            argument: "semaphore id",
        });
    }
    arg.parse::<u8>()
        .ok()
        .and_then(|id| SemaphoreId::try_from(id).ok())
        .ok_or(ParseError::InvalidArgument {
            argument: "semaphore id",
            reason: "must be a number from 0 to 4",
        })
}

fn parse_text(command: &'static str, text: &str) -> Result<String, ParseError> {
    if text.is_empty() {
        return Err(ParseError::MissingArgument {
            command,
            argument: "message",
        });
    }
    if text.chars().count() > MAX_MESSAGE_LEN {
        return Err(ParseError::InvalidArgument {
            argument: "message",
            reason: "must be at most 40 characters",
        });
    }
    Ok(text.to_string())
}

impl Command {
    /// Parse a command line into a Command.
    ///
    /// # Examples
    ///
    /// ```
    /// use pqsim_core::ProcessId;
    /// use pqsim_shell::Command;
    ///
    /// assert_eq!(Command::parse("c"), Ok(Command::Create));
    /// assert_eq!(
    ///     Command::parse("S 3 hello there"),
    ///     Ok(Command::Send { pid: ProcessId(3), text: "hello there".to_string() })
    /// );
    /// ```
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let (cmd, rest) = split_word(line);
        if cmd.is_empty() {
            return Ok(Command::Unknown { cmd: String::new() });
        }

        let mut letters = cmd.chars();
        let letter = match (letters.next(), letters.next()) {
            (Some(c), None) => c.to_ascii_uppercase(),
            _ => {
                return Ok(Command::Unknown {
                    cmd: cmd.to_string(),
                })
            }
        };

        let (arg, tail) = split_word(rest);

        match letter {
            'C' => Ok(Command::Create),
            'F' => Ok(Command::Fork),
            'K' => Ok(Command::Kill {
                pid: parse_pid("K", arg)?,
            }),
            'E' => Ok(Command::Exit),
            'Q' => Ok(Command::Quantum),
            'S' => {
                let pid = parse_pid("S", arg)?;
                let text = parse_text("S", tail)?;
                Ok(Command::Send { pid, text })
            }
            'R' => Ok(Command::Receive),
            'Y' => {
                let pid = parse_pid("Y", arg)?;
                let text = parse_text("Y", tail)?;
                Ok(Command::Reply { pid, text })
            }
            'N' => {
                let id = parse_semaphore("N", arg)?;
                let (value, _) = split_word(tail);
                if value.is_empty() {
                    return Err(ParseError::MissingArgument {
                        command: "N",
                        argument: "initial value",
                    });
                }
                let value = value
                    .parse::<i32>()
                    .map_err(|_| ParseError::InvalidArgument {
                        argument: "initial value",
                        reason: "must be an integer",
                    })?;
                Ok(Command::NewSemaphore { id, value })
            }
            'P' => Ok(Command::SemaphoreP {
                id: parse_semaphore("P", arg)?,
            }),
            'V' => Ok(Command::SemaphoreV {
                id: parse_semaphore("V", arg)?,
            }),
            'I' => Ok(Command::ProcInfo {
                pid: parse_pid("I", arg)?,
            }),
            'T' => Ok(Command::TotalInfo),
            'H' | '?' => Ok(Command::Help),
            'X' => Ok(Command::Quit),
            _ => Ok(Command::Unknown {
                cmd: cmd.to_string(),
            }),
        }
    }

    /// The scheduler operation this command issues, if any
    pub fn operation(&self) -> Option<Operation> {
        let op = match self {
            Command::Create => Operation::Create,
            Command::Fork => Operation::Fork,
            Command::Kill { pid } => Operation::Kill { pid: *pid },
            Command::Exit => Operation::Exit,
            Command::Quantum => Operation::QuantumExpire,
            Command::Send { pid, text } => Operation::Send {
                target: *pid,
                text: text.clone(),
            },
            Command::Receive => Operation::Receive,
            Command::Reply { pid, text } => Operation::Reply {
                target: *pid,
                text: text.clone(),
            },
            Command::NewSemaphore { id, value } => Operation::SemaphoreInit {
                id: *id,
                value: *value,
            },
            Command::SemaphoreP { id } => Operation::SemaphoreP { id: *id },
            Command::SemaphoreV { id } => Operation::SemaphoreV { id: *id },
            Command::ProcInfo { pid } => Operation::ProcessInfo { pid: *pid },
            Command::TotalInfo => Operation::DumpState,
            Command::Help | Command::Quit | Command::Unknown { .. } => return None,
        };
        Some(op)
    }

    /// Get a user-friendly usage message for this command.
    pub fn usage(&self) -> &'static str {
        match self {
            Command::Create => "C - Create a process at priority 0",
            Command::Fork => "F - Fork the running process",
            Command::Kill { .. } => "K <pid> - Kill a process",
            Command::Exit => "E - Kill the running process",
            Command::Quantum => "Q - Expire the running process's quantum",
            Command::Send { .. } => "S <pid> <text> - Send a message and wait for a reply",
            Command::Receive => "R - Receive a message, blocking if none is waiting",
            Command::Reply { .. } => "Y <pid> <text> - Reply to a waiting sender",
            Command::NewSemaphore { .. } => "N <sem> <value> - Initialize semaphore 0-4",
            Command::SemaphoreP { .. } => "P <sem> - Semaphore P",
            Command::SemaphoreV { .. } => "V <sem> - Semaphore V",
            Command::ProcInfo { .. } => "I <pid> - Show one process",
            Command::TotalInfo => "T - Show every queue and semaphore",
            Command::Help => "H - Display available commands",
            Command::Quit => "X - End the session",
            Command::Unknown { .. } => "Unknown command",
        }
    }

    /// One instance of every real command, in help order
    pub fn all() -> Vec<Command> {
        let pid = ProcessId(0);
        let mut all = vec![
            Command::Create,
            Command::Fork,
            Command::Kill { pid },
            Command::Exit,
            Command::Quantum,
            Command::Send {
                pid,
                text: String::new(),
            },
            Command::Receive,
            Command::Reply {
                pid,
                text: String::new(),
            },
        ];
        all.extend(SemaphoreId::all().take(1).flat_map(|id| {
            [
                Command::NewSemaphore { id, value: 0 },
                Command::SemaphoreP { id },
                Command::SemaphoreV { id },
            ]
        }));
        all.extend([
            Command::ProcInfo { pid },
            Command::TotalInfo,
            Command::Help,
            Command::Quit,
        ]);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sem(id: u8) -> SemaphoreId {
        SemaphoreId::new(id).unwrap()
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse("C"), Ok(Command::Create));
        assert_eq!(Command::parse("f"), Ok(Command::Fork));
        assert_eq!(Command::parse("E"), Ok(Command::Exit));
        assert_eq!(Command::parse("q"), Ok(Command::Quantum));
        assert_eq!(Command::parse("R"), Ok(Command::Receive));
        assert_eq!(Command::parse("t"), Ok(Command::TotalInfo));
        assert_eq!(Command::parse("H"), Ok(Command::Help));
        assert_eq!(Command::parse("?"), Ok(Command::Help));
        assert_eq!(Command::parse("x"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_ignores_trailing_tokens() {
        assert_eq!(Command::parse("C now please"), Ok(Command::Create));
        assert_eq!(
            Command::parse("K 4 extra"),
            Ok(Command::Kill { pid: ProcessId(4) })
        );
    }

    #[test]
    fn test_parse_kill() {
        assert_eq!(
            Command::parse("k 42"),
            Ok(Command::Kill { pid: ProcessId(42) })
        );

        assert_eq!(
            Command::parse("K"),
            Err(ParseError::MissingArgument {
                command: "K",
                argument: "pid"
            })
        );

        assert_eq!(
            Command::parse("K abc"),
            Err(ParseError::InvalidArgument {
                argument: "pid",
                reason: "must be a number from 0 to 65535"
            })
        );
        assert!(Command::parse("K -1").is_err());
        assert!(Command::parse("K 65536").is_err());
    }

    #[test]
    fn test_parse_send_keeps_rest_of_line() {
        assert_eq!(
            Command::parse("S 2   hello   there  "),
            Ok(Command::Send {
                pid: ProcessId(2),
                text: "hello   there".to_string()
            })
        );
        assert_eq!(
            Command::parse("y 0 done"),
            Ok(Command::Reply {
                pid: ProcessId(0),
                text: "done".to_string()
            })
        );
    }

    #[test]
    fn test_parse_send_message_bounds() {
        assert_eq!(
            Command::parse("S 2"),
            Err(ParseError::MissingArgument {
                command: "S",
                argument: "message"
            })
        );

        let exact = format!("S 2 {}", "m".repeat(40));
        assert!(Command::parse(&exact).is_ok());

        let long = format!("Y 2 {}", "m".repeat(41));
        assert_eq!(
            Command::parse(&long),
            Err(ParseError::InvalidArgument {
                argument: "message",
                reason: "must be at most 40 characters"
            })
        );
    }

    #[test]
    fn test_parse_semaphore_commands() {
        assert_eq!(
            Command::parse("N 0 1"),
            Ok(Command::NewSemaphore {
                id: sem(0),
                value: 1
            })
        );
        assert_eq!(
            Command::parse("n 4 -3"),
            Ok(Command::NewSemaphore {
                id: sem(4),
                value: -3
            })
        );
        assert_eq!(Command::parse("P 3"), Ok(Command::SemaphoreP { id: sem(3) }));
        assert_eq!(Command::parse("v 1"), Ok(Command::SemaphoreV { id: sem(1) }));
    }

    #[test]
    fn test_parse_semaphore_errors() {
        assert_eq!(
            Command::parse("P 5"),
            Err(ParseError::InvalidArgument {
                argument: "semaphore id",
                reason: "must be a number from 0 to 4"
            })
        );
        assert_eq!(
            Command::parse("N 1"),
            Err(ParseError::MissingArgument {
                command: "N",
                argument: "initial value"
            })
        );
        assert_eq!(
            Command::parse("N 1 lots"),
            Err(ParseError::InvalidArgument {
                argument: "initial value",
                reason: "must be an integer"
            })
        );
        assert_eq!(
            Command::parse("V"),
            Err(ParseError::MissingArgument {
                command: "V",
                argument: "semaphore id"
            })
        );
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            Command::parse("create"),
            Ok(Command::Unknown {
                cmd: "create".to_string()
            })
        );
        assert_eq!(
            Command::parse("Z"),
            Ok(Command::Unknown {
                cmd: "Z".to_string()
            })
        );
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(
            Command::parse(""),
            Ok(Command::Unknown { cmd: String::new() })
        );
        assert_eq!(
            Command::parse("   "),
            Ok(Command::Unknown { cmd: String::new() })
        );
    }

    #[test]
    fn test_operation_mapping() {
        assert_eq!(Command::Quantum.operation(), Some(Operation::QuantumExpire));
        assert_eq!(Command::TotalInfo.operation(), Some(Operation::DumpState));
        assert_eq!(
            Command::parse("S 1 hi").unwrap().operation(),
            Some(Operation::Send {
                target: ProcessId(1),
                text: "hi".to_string()
            })
        );
        assert_eq!(Command::Help.operation(), None);
        assert_eq!(Command::Quit.operation(), None);
    }

    #[test]
    fn test_all_commands_have_usage() {
        let all = Command::all();
        assert_eq!(all.len(), 15);
        for cmd in all {
            assert_ne!(cmd.usage(), "Unknown command");
        }
    }
}
