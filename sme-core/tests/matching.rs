//! Response-matcher scenarios: head validation, mismatch draining, and the
//! bridge cancel/release/timeout events.

use std::cell::RefCell;
use std::rc::Rc;

use sme_core::command::{
    AntennaModeRequest, CommandKind, CommandPayload, SessionId,
};
use sme_core::dispatch::NoopSink;
use sme_core::engine::{Engine, EngineError};
use sme_core::fault::{FaultPolicy, NoopFaultHandler};
use sme_core::response::{
    AntennaModeResponse, CompletionOutcome, FwStatus, HwModeTransition, NssUpdateResponse,
    ResponseMessage,
};
use sme_core::serializer::{
    Admission, CallbackReason, CancelRequest, SerializedRequest, Serializer,
};
use sme_core::telemetry::{EngineEventKind, EventDetail};

type MockInstant = u64;
type Completion = Box<dyn FnOnce(CompletionOutcome)>;
type TestEngine = Engine<Completion, MockInstant, 4>;

struct Scripted {
    admissions: std::collections::VecDeque<Admission>,
}

impl Scripted {
    fn new(script: &[Admission]) -> Self {
        Self {
            admissions: script.iter().copied().collect(),
        }
    }
}

impl Serializer for Scripted {
    type Error = ();

    fn request(&mut self, _request: SerializedRequest) -> Result<Admission, Self::Error> {
        self.admissions.pop_front().ok_or(())
    }

    fn cancel(&mut self, _request: CancelRequest) -> Result<(), Self::Error> {
        Ok(())
    }
}

fn capture() -> (Completion, Rc<RefCell<Option<CompletionOutcome>>>) {
    let seen = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&seen);
    let completion: Completion = Box::new(move |outcome| {
        *sink.borrow_mut() = Some(outcome);
    });
    (completion, seen)
}

fn activate_antenna(engine: &mut TestEngine) -> Rc<RefCell<Option<CompletionOutcome>>> {
    let mut serializer = Scripted::new(&[Admission::Active]);
    let mut faults = NoopFaultHandler;
    let (completion, seen) = capture();

    let handle = engine.acquire_command_buffer(&mut faults, 0).unwrap();
    {
        let slot = engine.command_mut(handle).unwrap();
        slot.set_session(SessionId::new(0));
        slot.set_payload(CommandPayload::SetAntennaMode(AntennaModeRequest {
            tx_chains: 2,
            rx_chains: 2,
        }));
        slot.set_completion(completion);
    }
    engine
        .submit(handle, &mut serializer, &mut NoopSink, false, 1)
        .unwrap();
    seen
}

#[test]
fn mismatched_response_drains_without_firing_completion() {
    let mut engine = TestEngine::new(FaultPolicy::default());
    let seen = activate_antenna(&mut engine);

    let message = ResponseMessage::NssUpdate(NssUpdateResponse {
        status: FwStatus::Ok,
        session: SessionId::new(0),
    });
    let result = engine.handle_response(&message, 2);
    assert_eq!(
        result,
        Err(EngineError::KindMismatch {
            expected: CommandKind::NssUpdate,
            found: CommandKind::SetAntennaMode,
        })
    );

    // The completion never fired, but the slot is back on Free so the
    // serialized pipeline cannot wedge.
    assert!(seen.borrow().is_none());
    assert_eq!(engine.census().free, engine.capacity());
    assert_eq!(engine.active_head(), None);

    let mismatch = engine
        .events()
        .oldest_first()
        .find(|event| event.kind == EngineEventKind::KindMismatch)
        .expect("mismatch event recorded");
    assert_eq!(
        mismatch.detail,
        EventDetail::Mismatch {
            expected: CommandKind::NssUpdate,
            found: CommandKind::SetAntennaMode,
        }
    );
}

#[test]
fn matched_response_fires_completion_once() {
    let mut engine = TestEngine::new(FaultPolicy::default());
    let seen = activate_antenna(&mut engine);

    let message = ResponseMessage::AntennaMode(AntennaModeResponse {
        status: FwStatus::CoexDenied,
    });
    engine.handle_response(&message, 2).unwrap();

    match seen.borrow_mut().take() {
        Some(CompletionOutcome::AntennaMode(outcome)) => {
            assert_eq!(outcome.status, FwStatus::CoexDenied);
            assert_eq!(outcome.tx_chains, 2);
            assert_eq!(outcome.rx_chains, 2);
        }
        other => panic!("unexpected completion {other:?}"),
    }

    // A duplicate response finds an empty Active list and is dropped.
    assert_eq!(
        engine.handle_response(&message, 3),
        Err(EngineError::ResponseWithoutCommand)
    );
    assert!(seen.borrow().is_none());
}

#[test]
fn response_without_active_command_is_logged_and_dropped() {
    let mut engine = TestEngine::new(FaultPolicy::default());
    let message = ResponseMessage::HwModeTransition(HwModeTransition {
        old_hw_mode_index: 0,
        new_hw_mode_index: 1,
        vdev_mac_map: heapless::Vec::new(),
    });

    assert_eq!(
        engine.handle_response(&message, 1),
        Err(EngineError::ResponseWithoutCommand)
    );
    assert_eq!(
        engine.events().latest().map(|event| event.kind),
        Some(EngineEventKind::ResponseDropped)
    );
    assert_eq!(engine.census().free, engine.capacity());
}

#[test]
fn cancelled_pending_command_is_reclaimed_by_release_memory() {
    let mut engine = TestEngine::new(FaultPolicy::default());
    let mut serializer = Scripted::new(&[Admission::Pending]);
    let mut faults = NoopFaultHandler;
    let (completion, seen) = capture();

    let handle = engine.acquire_command_buffer(&mut faults, 0).unwrap();
    {
        let slot = engine.command_mut(handle).unwrap();
        slot.set_session(SessionId::new(0));
        slot.set_payload(CommandPayload::SetAntennaMode(AntennaModeRequest {
            tx_chains: 1,
            rx_chains: 1,
        }));
        slot.set_completion(completion);
    }
    engine
        .submit(handle, &mut serializer, &mut NoopSink, false, 1)
        .unwrap();

    // Caller withdraws; the scheduler answers with cancel + release-memory.
    engine.release_command(handle, &mut serializer, 2).unwrap();
    engine
        .serializer_event(handle, CallbackReason::Cancel, &mut NoopSink, 3)
        .unwrap();
    assert_eq!(engine.census().pending, 1);

    engine
        .serializer_event(handle, CallbackReason::ReleaseMemory, &mut NoopSink, 4)
        .unwrap();
    assert_eq!(engine.census().free, engine.capacity());

    // The withdrawn command never completed.
    assert!(seen.borrow().is_none());
}

#[test]
fn active_timeout_is_recorded_and_the_slot_stays_put() {
    let mut engine = TestEngine::new(FaultPolicy::default());
    let _seen = activate_antenna(&mut engine);
    let handle = engine.active_head().unwrap();

    engine
        .serializer_event(handle, CallbackReason::ActiveTimeout, &mut NoopSink, 40)
        .unwrap();
    assert_eq!(engine.active_head(), Some(handle));
    assert_eq!(engine.census().active, 1);

    // The scheduler eventually reclaims it.
    engine
        .serializer_event(handle, CallbackReason::ReleaseMemory, &mut NoopSink, 41)
        .unwrap();
    assert_eq!(engine.census().free, engine.capacity());
}

#[test]
fn double_release_memory_is_rejected() {
    let mut engine = TestEngine::new(FaultPolicy::default());
    let _seen = activate_antenna(&mut engine);
    let handle = engine.active_head().unwrap();

    engine
        .serializer_event(handle, CallbackReason::ReleaseMemory, &mut NoopSink, 2)
        .unwrap();
    let result = engine.serializer_event(handle, CallbackReason::ReleaseMemory, &mut NoopSink, 3);
    assert!(result.is_err());
    assert_eq!(engine.census().free, engine.capacity());
}
