//! Scheduler scenario tests
//!
//! End-to-end command sequences run through `step`, checking the scheduling
//! decisions an operator would see.

use pqsim_core::{
    assert_invariants, step, BlockReason, Event, Location, Message, Operation, Outcome, Priority,
    ProcessId, ProcessState, SchedulerConfig, SchedulerError, SchedulerState, SemaphoreId,
    IDLE_PID,
};
use pretty_assertions::assert_eq;

// ============================================================================
// Helpers
// ============================================================================

fn run(state: &mut SchedulerState, op: Operation) -> (Outcome, Vec<Event>) {
    let r = step(state, op);
    assert_invariants(state);
    match r.result {
        Ok(outcome) => (outcome, r.events),
        Err(e) => panic!("Expected Ok, got {e}"),
    }
}

fn sem(id: u8) -> SemaphoreId {
    SemaphoreId::new(id).unwrap()
}

fn send(target: u16, text: &str) -> Operation {
    Operation::Send {
        target: ProcessId(target),
        text: text.into(),
    }
}

fn location(state: &SchedulerState, pid: u16) -> Location {
    state.process_info(ProcessId(pid)).unwrap().location
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_create_then_quantum_selects_new_process() {
    let mut state = SchedulerState::default();

    run(&mut state, Operation::Create);
    let p1 = state.process_info(ProcessId(1)).unwrap();
    assert_eq!(p1.priority, Priority::High);
    assert_eq!(p1.state, ProcessState::Ready);
    assert_eq!(state.running_pid(), Some(IDLE_PID));

    let (_, events) = run(&mut state, Operation::QuantumExpire);
    assert_eq!(
        events,
        vec![Event::Dispatched {
            pid: ProcessId(1),
            priority: Priority::High,
            idle: false
        }]
    );
    assert_eq!(location(&state, 1), Location::Running);
    assert_eq!(location(&state, 0), Location::Idle);
}

#[test]
fn test_send_to_missing_process_changes_nothing() {
    let mut state = SchedulerState::default();
    run(&mut state, Operation::Create);
    run(&mut state, Operation::QuantumExpire);
    let before = state.snapshot();

    let r = step(&mut state, send(2, "anyone?"));

    assert_eq!(r.result, Err(SchedulerError::NotFound(ProcessId(2))));
    assert!(r.events.is_empty());
    assert_eq!(state.snapshot(), before);
    assert_eq!(state.running_pid(), Some(ProcessId(1)));
}

#[test]
fn test_receive_blocks_until_send_arrives() {
    let mut state = SchedulerState::default();
    run(&mut state, Operation::Create);
    run(&mut state, Operation::QuantumExpire);

    // P1 finds an empty mailbox and blocks; idle takes over
    let (outcome, events) = run(&mut state, Operation::Receive);
    assert_eq!(
        outcome,
        Outcome::Received {
            message: None,
            blocked: true
        }
    );
    assert_eq!(
        events[0],
        Event::Blocked {
            pid: ProcessId(1),
            reason: BlockReason::Receive
        }
    );
    assert_eq!(location(&state, 1), Location::ReceiveWait);
    assert!(state.idle_is_running());

    // Idle sends: P1 is unblocked at priority 0
    let (outcome, _) = run(&mut state, send(1, "wake up"));
    assert_eq!(
        outcome,
        Outcome::Sent {
            target: ProcessId(1),
            sender_blocked: false,
            receiver_unblocked: true
        }
    );
    assert_eq!(location(&state, 1), Location::Ready(Priority::High));

    // Next dispatch of P1 surfaces the text and sender
    let (_, events) = run(&mut state, Operation::QuantumExpire);
    assert!(events.contains(&Event::MessageDelivered {
        pid: ProcessId(1),
        message: Message {
            sender: IDLE_PID,
            text: "wake up".into()
        }
    }));
    assert!(state.process_info(ProcessId(1)).unwrap().mailbox.is_none());
}

#[test]
fn test_semaphore_blocks_on_second_p_and_v_readies() {
    let mut state = SchedulerState::default();
    run(&mut state, Operation::SemaphoreInit { id: sem(0), value: 1 });
    run(&mut state, Operation::Create);
    run(&mut state, Operation::Create);
    run(&mut state, Operation::QuantumExpire);
    assert_eq!(state.running_pid(), Some(ProcessId(1)));

    let (outcome, _) = run(&mut state, Operation::SemaphoreP { id: sem(0) });
    assert_eq!(
        outcome,
        Outcome::SemaphoreWaited {
            id: sem(0),
            value: 0,
            blocked: false
        }
    );
    assert_eq!(state.running_pid(), Some(ProcessId(1)));

    let (outcome, _) = run(&mut state, Operation::SemaphoreP { id: sem(0) });
    assert_eq!(
        outcome,
        Outcome::SemaphoreWaited {
            id: sem(0),
            value: -1,
            blocked: true
        }
    );
    assert_eq!(location(&state, 1), Location::Semaphore(sem(0)));
    assert_eq!(state.running_pid(), Some(ProcessId(2)));

    // P2 signals
    let (outcome, _) = run(&mut state, Operation::SemaphoreV { id: sem(0) });
    assert_eq!(
        outcome,
        Outcome::SemaphoreSignaled {
            id: sem(0),
            value: 0,
            readied: Some(ProcessId(1))
        }
    );
    let p1 = state.process_info(ProcessId(1)).unwrap();
    assert_eq!(p1.state, ProcessState::Ready);
    assert_eq!(p1.location, Location::Ready(Priority::High));
    // V never preempts
    assert_eq!(state.running_pid(), Some(ProcessId(2)));
}

#[test]
fn test_quantum_on_low_priority_is_clamped() {
    let mut state = SchedulerState::default();
    run(&mut state, Operation::Create);
    run(&mut state, Operation::QuantumExpire);
    run(&mut state, Operation::QuantumExpire);
    run(&mut state, Operation::QuantumExpire);
    assert_eq!(
        state.process_info(ProcessId(1)).unwrap().priority,
        Priority::Low
    );

    let (_, events) = run(&mut state, Operation::QuantumExpire);

    assert!(events.contains(&Event::Demoted {
        pid: ProcessId(1),
        from: Priority::Low,
        to: Priority::Low
    }));
    assert_eq!(
        state.process_info(ProcessId(1)).unwrap().priority,
        Priority::Low
    );
}

#[test]
fn test_mailbox_overwrite_keeps_last_message() {
    let mut state = SchedulerState::default();
    run(&mut state, Operation::Create);
    run(&mut state, Operation::QuantumExpire);
    run(&mut state, Operation::Receive);

    run(&mut state, send(1, "first"));
    run(&mut state, send(1, "second"));

    let (_, events) = run(&mut state, Operation::QuantumExpire);
    let delivered: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::MessageDelivered { message, .. } => Some(message.text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(delivered, vec!["second"]);
}

#[test]
fn test_blocked_process_keeps_priority() {
    let mut state = SchedulerState::default();
    run(&mut state, Operation::SemaphoreInit { id: sem(2), value: 0 });
    run(&mut state, Operation::Create);
    run(&mut state, Operation::QuantumExpire);
    run(&mut state, Operation::QuantumExpire);
    assert_eq!(
        state.process_info(ProcessId(1)).unwrap().priority,
        Priority::Medium
    );

    run(&mut state, Operation::SemaphoreP { id: sem(2) });
    // Time passes while blocked: other work expires quanta
    run(&mut state, Operation::Create);
    run(&mut state, Operation::QuantumExpire);
    run(&mut state, Operation::QuantumExpire);
    run(&mut state, Operation::SemaphoreV { id: sem(2) });

    let p1 = state.process_info(ProcessId(1)).unwrap();
    assert_eq!(p1.priority, Priority::Medium);
    assert_eq!(p1.location, Location::Ready(Priority::Medium));
}

#[test]
fn test_send_reply_round_trip() {
    let mut state = SchedulerState::default();
    run(&mut state, Operation::Create);
    run(&mut state, Operation::Create);
    run(&mut state, Operation::QuantumExpire);

    // P1 asks P2 and waits
    run(&mut state, send(2, "what time is it"));
    assert_eq!(location(&state, 1), Location::ReplyWait);
    assert_eq!(state.running_pid(), Some(ProcessId(2)));

    // P2 reads the question
    let (outcome, _) = run(&mut state, Operation::Receive);
    assert_eq!(
        outcome,
        Outcome::Received {
            message: Some(Message {
                sender: ProcessId(1),
                text: "what time is it".into()
            }),
            blocked: false
        }
    );

    // P2 answers and keeps running
    run(
        &mut state,
        Operation::Reply {
            target: ProcessId(1),
            text: "noon".into(),
        },
    );
    assert_eq!(state.running_pid(), Some(ProcessId(2)));

    // P2 expires; P1 (still at level 0) runs and gets the reply
    let (_, events) = run(&mut state, Operation::QuantumExpire);
    assert!(events.contains(&Event::MessageDelivered {
        pid: ProcessId(1),
        message: Message {
            sender: ProcessId(2),
            text: "noon".into()
        }
    }));
}

#[test]
fn test_kill_reaches_every_structure() {
    let mut state = SchedulerState::default();
    run(&mut state, Operation::SemaphoreInit { id: sem(4), value: 0 });
    for _ in 0..4 {
        run(&mut state, Operation::Create);
    }

    run(&mut state, Operation::QuantumExpire); // P1 runs
    run(&mut state, Operation::SemaphoreP { id: sem(4) }); // P1 on sem 4, P2 runs
    run(&mut state, send(4, "hold")); // P2 awaits reply, P3 runs
    run(&mut state, Operation::Receive); // P3 awaits mail, P4 runs

    assert_eq!(location(&state, 1), Location::Semaphore(sem(4)));
    assert_eq!(location(&state, 2), Location::ReplyWait);
    assert_eq!(location(&state, 3), Location::ReceiveWait);
    assert_eq!(location(&state, 4), Location::Running);

    for pid in [1, 2, 3, 4] {
        let (outcome, _) = run(&mut state, Operation::Kill { pid: ProcessId(pid) });
        assert!(matches!(outcome, Outcome::Killed { halted: false, .. }));
    }

    assert!(!state.has_user_processes());
    assert!(state.idle_is_running());

    let r = step(&mut state, Operation::Kill { pid: IDLE_PID });
    assert!(r.halted());
}

#[test]
fn test_admission_spillover_reports_reassignment() {
    let mut state = SchedulerState::new(SchedulerConfig {
        level_capacity: Some(1),
        ..Default::default()
    });

    run(&mut state, Operation::Create);
    let (_, events) = run(&mut state, Operation::Create);
    assert!(events.contains(&Event::PriorityReassigned {
        pid: ProcessId(2),
        from: Priority::High,
        to: Priority::Medium
    }));
    run(&mut state, Operation::Create);

    let r = step(&mut state, Operation::Create);
    assert_eq!(r.result, Err(SchedulerError::AdmissionExhausted(ProcessId(4))));

    // The failed id is handed out again once there is room
    run(&mut state, Operation::Kill { pid: ProcessId(3) });
    let (outcome, _) = run(&mut state, Operation::Create);
    assert_eq!(outcome, Outcome::Created { pid: ProcessId(4) });
}

#[test]
fn test_dump_lists_in_dispatch_order() {
    let mut state = SchedulerState::default();
    for _ in 0..3 {
        run(&mut state, Operation::Create);
    }

    let (outcome, _) = run(&mut state, Operation::DumpState);
    let Outcome::Snapshot(snapshot) = outcome else {
        panic!("Expected Snapshot");
    };

    let order: Vec<_> = snapshot.ready[0].iter().map(|p| p.pid.0).collect();
    assert_eq!(order, vec![1, 2, 3]);
    assert!(snapshot.ready[1].is_empty());
    assert!(snapshot.semaphores.is_empty());
    assert_eq!(snapshot.running.pid, IDLE_PID);
}
