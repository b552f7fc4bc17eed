//! Scripted session tests
//!
//! Whole command scripts run through `Session` against an in-memory writer.

use pqsim_core::{Location, Priority, ProcessId, SchedulerConfig};
use pqsim_shell::{OutputFormat, Session};
use pretty_assertions::assert_eq;

fn run(format: OutputFormat, script: &str) -> Session<Vec<u8>> {
    let mut session = Session::new(SchedulerConfig::default(), format, Vec::new());
    session.run(script.as_bytes()).unwrap();
    session
}

fn output(session: &Session<Vec<u8>>) -> String {
    String::from_utf8(session.writer().clone()).unwrap()
}

fn json_lines(session: &Session<Vec<u8>>) -> Vec<serde_json::Value> {
    output(session)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

// ============================================================================
// Text sessions
// ============================================================================

#[test]
fn test_send_receive_reply_script() {
    let session = run(
        OutputFormat::Text,
        "C\nC\nQ\nS 2 are you there\nR\nY 1 yes\nQ\n",
    );
    let out = output(&session);

    assert!(out.contains("Sent message to process 2."));
    assert!(out.contains("process 1 blocked awaiting a reply"));
    assert!(out.contains("Received \"are you there\" from process 1."));
    assert!(out.contains("Replied to process 1."));
    assert!(out.contains("process 1 received \"yes\" from process 2"));
    assert_eq!(session.state().running_pid(), Some(ProcessId(1)));
}

#[test]
fn test_semaphore_script() {
    let session = run(OutputFormat::Text, "N 0 1\nC\nC\nQ\nP 0\nP 0\nV 0\n");
    let out = output(&session);

    assert!(out.contains("Semaphore 0 initialized to 1."));
    assert!(out.contains("P on semaphore 0: value is now 0."));
    assert!(out.contains("P on semaphore 0: value is now -1."));
    assert!(out.contains("process 1 blocked on semaphore 0"));
    assert!(out.contains("V on semaphore 0: value is now 0, process 1 readied."));

    let p1 = session.state().process_info(ProcessId(1)).unwrap();
    assert_eq!(p1.location, Location::Ready(Priority::High));
}

#[test]
fn test_invalid_lines_are_reported_and_skipped() {
    let session = run(OutputFormat::Text, "K\nP 7\ncreate\nS 1\nC\n");
    let out = output(&session);

    assert!(out.contains("Error: K requires pid"));
    assert!(out.contains("Error: semaphore id must be a number from 0 to 4"));
    assert!(out.contains("Unknown command: create"));
    assert!(out.contains("Error: S requires message"));
    // Only the final C reached the scheduler
    assert_eq!(session.state().processes.len(), 2);
}

#[test]
fn test_scheduler_errors_are_reported() {
    let session = run(OutputFormat::Text, "F\nP 0\nI 5\n");
    let out = output(&session);

    assert!(out.contains("Error: cannot fork the idle process"));
    assert!(out.contains("Error: semaphore 0 is not initialized"));
    assert!(out.contains("Error: process 5 not found"));
}

#[test]
fn test_total_info_dump() {
    let session = run(OutputFormat::Text, "N 3 0\nC\nC\nQ\nP 3\nT\n");
    let out = output(&session);

    assert!(out.contains("Running:\n  2 "));
    assert!(out.contains("Semaphore 3 (value -1):\n  1 "));
    assert!(out.contains("Waiting for reply:\n  (empty)"));
}

#[test]
fn test_killing_idle_ends_session() {
    let session = run(OutputFormat::Text, "C\nK 0\nK 1\nK 0\nC\n");
    let out = output(&session);

    assert!(out.contains("Error: cannot kill the idle process"));
    assert!(out.contains("Killed the idle process."));
    assert!(out.contains("no processes left: simulation over"));
    // The trailing C was never read
    assert!(session.state().halted);
    assert_eq!(out.matches("Created process").count(), 1);
}

#[test]
fn test_quit_stops_reading() {
    let session = run(OutputFormat::Text, "C\nX\nC\nC\n");
    assert_eq!(session.state().processes.len(), 2);
}

// ============================================================================
// JSON sessions
// ============================================================================

#[test]
fn test_json_one_line_per_command() {
    let session = run(OutputFormat::Json, "C\nQ\nK 9\nH\n\n");
    let lines = json_lines(&session);

    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["outcome"]["kind"], "created");
    assert_eq!(lines[1]["outcome"]["kind"], "quantum_expired");
    assert_eq!(lines[1]["events"][0]["event"], "dispatched");
    assert_eq!(lines[2]["error"], "process 9 not found");
    assert!(lines[3]["help"].as_array().is_some_and(|h| h.len() == 15));
}

#[test]
fn test_json_snapshot() {
    let session = run(OutputFormat::Json, "C\nC\nT\n");
    let lines = json_lines(&session);

    let snapshot = &lines[2]["outcome"];
    assert_eq!(snapshot["kind"], "snapshot");
    assert_eq!(snapshot["running"]["pid"], 0);
    assert_eq!(snapshot["ready"][0][0]["pid"], 1);
    assert_eq!(snapshot["ready"][0][1]["pid"], 2);
}
