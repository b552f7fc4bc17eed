//! pqsim Shell - Command Driver
//!
//! The operator-facing side of the simulator:
//!
//! - **command**: single-letter command parsing and validation
//! - **render**: text and JSON-lines reports built from core results
//! - **session**: the read-eval-print loop owning a `SchedulerState`
//! - **config**: TOML config loading and command-line overrides
//!
//! # Example
//!
//! ```
//! use pqsim_core::SchedulerConfig;
//! use pqsim_shell::{OutputFormat, Session};
//!
//! let mut session = Session::new(SchedulerConfig::default(), OutputFormat::Text, Vec::new());
//! session.run("C\nQ\nT\n".as_bytes()).unwrap();
//! let report = String::from_utf8(session.into_writer()).unwrap();
//! assert!(report.contains("Created process 1."));
//! ```

pub mod command;
pub mod config;
pub mod render;
pub mod session;

pub use command::{Command, ParseError};
pub use config::{ConfigError, Overrides};
pub use render::{OutputFormat, Renderer};
pub use session::{ControlFlow, Session};
