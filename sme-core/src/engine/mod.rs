//! Command engine: admission, serialization-bridge events, and response
//! matching over the fixed pool.
//!
//! The engine is a plain data structure. Hosts that share it across threads
//! wrap it in their platform mutex; `&mut Engine` is the proof of exclusive
//! access everywhere. Collaborators (the serializer, the command sink, the
//! fault handler) are passed in per call and never receive the engine back,
//! so a callback cannot re-enter it — the borrow checker enforces what used
//! to be a locking convention.

use core::fmt;

use crate::command::{Command, CommandKind, CommandPayload, SessionId, Stage};
use crate::dispatch::{self, CommandSink, DispatchError};
use crate::fault::{CommandDiagnostic, FaultHandler, FaultPolicy, RecoveryReason};
use crate::pool::{CommandHandle, CommandPool, ListCensus, PoolError};
use crate::response::{
    AntennaModeOutcome, CompletionOutcome, DualMacConfigOutcome, HwModeOutcome,
    HwModeTransitionOutcome, NssUpdateOutcome, ResponseMessage,
};
use crate::serializer::{
    Admission, CallbackReason, CancelRequest, QueueKind, SerializedClass, SerializedRequest,
    Serializer,
};
use crate::telemetry::{CommandTrace, EngineEventKind, EventDetail, EventLog};

/// Low bits of the rolling command-id counter kept per command.
const COMMAND_ID_MASK: u32 = 0x00FF_FFFF;

/// High-byte prefix marking ids issued by this engine.
const COMMAND_ID_PREFIX: u32 = 0x0D00_0000;

/// Engine-level failures.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EngineError {
    /// The handle does not name a live command.
    InvalidHandle,
    /// The command is not in a submittable state (empty payload).
    InvalidArgument,
    /// Every pool slot is in flight.
    PoolExhausted,
    /// A response arrived while the Active list was empty.
    ResponseWithoutCommand,
    /// An activated slot carried no routable payload.
    UnknownCommand,
    /// The Active head's kind does not match the response.
    KindMismatch {
        expected: CommandKind,
        found: CommandKind,
    },
    /// List bookkeeping rejected a transition; a caller bug or corruption.
    Consistency(PoolError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidHandle => f.write_str("handle does not name a live command"),
            EngineError::InvalidArgument => f.write_str("command is not submittable"),
            EngineError::PoolExhausted => f.write_str("command pool exhausted"),
            EngineError::ResponseWithoutCommand => {
                f.write_str("response arrived with no active command")
            }
            EngineError::UnknownCommand => f.write_str("activated slot has no routable payload"),
            EngineError::KindMismatch { expected, found } => {
                write!(f, "response expects {expected}, active head is {found}")
            }
            EngineError::Consistency(err) => write!(f, "list bookkeeping: {err}"),
        }
    }
}

impl From<PoolError> for EngineError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::InvalidHandle { .. } => EngineError::InvalidHandle,
            other => EngineError::Consistency(other),
        }
    }
}

/// Failure surface of [`Engine::submit`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SubmitError<SE, KE> {
    Engine(EngineError),
    Serializer(SE),
    Dispatch(KE),
}

impl<SE, KE> From<EngineError> for SubmitError<SE, KE> {
    fn from(err: EngineError) -> Self {
        SubmitError::Engine(err)
    }
}

impl<SE, KE> From<PoolError> for SubmitError<SE, KE> {
    fn from(err: PoolError) -> Self {
        SubmitError::Engine(EngineError::Consistency(err))
    }
}

/// Failure surface of [`Engine::serializer_event`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BridgeError<KE> {
    Engine(EngineError),
    Dispatch(KE),
}

impl<KE> From<EngineError> for BridgeError<KE> {
    fn from(err: EngineError) -> Self {
        BridgeError::Engine(err)
    }
}

impl<KE> From<PoolError> for BridgeError<KE> {
    fn from(err: PoolError) -> Self {
        BridgeError::Engine(EngineError::Consistency(err))
    }
}

/// Failure surface of [`Engine::release_command`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WithdrawError<SE> {
    Engine(EngineError),
    Serializer(SE),
}

impl<SE> From<EngineError> for WithdrawError<SE> {
    fn from(err: EngineError) -> Self {
        WithdrawError::Engine(err)
    }
}

impl<SE> From<PoolError> for WithdrawError<SE> {
    fn from(err: PoolError) -> Self {
        WithdrawError::Engine(EngineError::Consistency(err))
    }
}

/// Command engine over a pool of `N` slots.
pub struct Engine<C, TInstant, const N: usize>
where
    TInstant: Copy,
{
    pool: CommandPool<C, N>,
    policy: FaultPolicy,
    events: EventLog<TInstant>,
    id_counter: u32,
}

impl<C, TInstant, const N: usize> Engine<C, TInstant, N>
where
    TInstant: Copy,
{
    /// Creates an engine with every slot free.
    #[must_use]
    pub fn new(policy: FaultPolicy) -> Self {
        Self {
            pool: CommandPool::new(),
            policy,
            events: EventLog::new(),
            id_counter: 0,
        }
    }

    /// Total number of pool slots.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Per-stage slot counts.
    #[must_use]
    pub fn census(&self) -> ListCensus {
        self.pool.census()
    }

    /// The diagnostics ring; hosts drain it to their log transport.
    #[must_use]
    pub fn events(&self) -> &EventLog<TInstant> {
        &self.events
    }

    /// Shared access to a pooled command.
    pub fn command(&self, handle: CommandHandle) -> Result<&Command<C>, EngineError> {
        Ok(self.pool.get(handle)?)
    }

    /// Exclusive access to a pooled command. Callers fill session, payload,
    /// and completion here between acquisition and submission.
    pub fn command_mut(&mut self, handle: CommandHandle) -> Result<&mut Command<C>, EngineError> {
        Ok(self.pool.get_mut(handle)?)
    }

    /// Handle of the command currently at the Active head.
    #[must_use]
    pub fn active_head(&self) -> Option<CommandHandle> {
        self.pool.peek_active_head()
    }

    /// Pending handles in queue order; schedulers walk this to pick the next
    /// command to activate.
    pub fn pending_handles(&self) -> impl Iterator<Item = CommandHandle> + '_ {
        self.pool.pending_iter()
    }

    /// Pops a free command slot, or runs the exhaustion diagnostics and
    /// fails. Never blocks and never retries internally; the caller decides
    /// whether the originating request can be refused upward.
    pub fn acquire_command_buffer<F: FaultHandler>(
        &mut self,
        faults: &mut F,
        now: TInstant,
    ) -> Result<CommandHandle, EngineError> {
        if let Some(handle) = self.pool.acquire() {
            self.events
                .record(EngineEventKind::Acquired, EventDetail::None, now);
            return Ok(handle);
        }
        self.report_exhaustion(faults, now);
        Err(EngineError::PoolExhausted)
    }

    /// Submits a filled command to the serialization scheduler.
    ///
    /// Assigns the prefixed monotonic command id, derives the admission class
    /// and its execution deadline, and moves the slot to Pending. An
    /// `Active` admission runs the activation path synchronously, including
    /// dispatch through `sink`. A rejected request hands the buffer straight
    /// back to the Free list.
    pub fn submit<S: Serializer, K: CommandSink>(
        &mut self,
        handle: CommandHandle,
        serializer: &mut S,
        sink: &mut K,
        high_priority: bool,
        now: TInstant,
    ) -> Result<Admission, SubmitError<S::Error, K::Error>> {
        let slot = self.pool.get(handle)?;
        let kind = slot.kind();
        let session = slot.session();
        let Some(class) = SerializedClass::classify(slot.payload()) else {
            return Err(EngineError::InvalidArgument.into());
        };

        let cmd_id = self.next_command_id();
        self.pool.get_mut(handle)?.set_cmd_id(cmd_id);
        self.pool.move_to_pending(handle)?;
        self.events.record(
            EngineEventKind::Queued(kind),
            EventDetail::Command(CommandTrace { cmd_id, session }),
            now,
        );

        let request = SerializedRequest {
            cmd_id,
            class,
            session,
            deadline: class.execution_deadline(),
            high_priority,
            is_blocking: kind.is_blocking(),
        };
        match serializer.request(request) {
            Ok(Admission::Pending) => Ok(Admission::Pending),
            Ok(Admission::Active) => {
                self.activate(handle, sink, now).map_err(|err| match err {
                    BridgeError::Engine(err) => SubmitError::Engine(err),
                    BridgeError::Dispatch(err) => SubmitError::Dispatch(err),
                })?;
                Ok(Admission::Active)
            }
            Err(err) => {
                self.events.record(
                    EngineEventKind::SerializerRejected,
                    EventDetail::Command(CommandTrace { cmd_id, session }),
                    now,
                );
                self.pool.remove(handle)?;
                self.pool.release(handle)?;
                Err(SubmitError::Serializer(err))
            }
        }
    }

    /// Applies one serialization-bridge lifecycle event to a command.
    ///
    /// `Cancel` only records the withdrawal; the slot is reclaimed solely
    /// through `ReleaseMemory`, which drains it from whichever list holds it
    /// and returns it to Free. `ActiveTimeout` is recorded and the slot is
    /// left on the Active list: deadline recovery stays with the scheduler,
    /// which follows up with `ReleaseMemory` once it has torn the command
    /// down.
    ///
    /// Collaborators cannot re-enter the engine from their callbacks; holding
    /// `&mut self` here makes a second borrow a compile error:
    ///
    /// ```compile_fail
    /// use sme_core::dispatch::NoopSink;
    /// use sme_core::engine::Engine;
    /// use sme_core::fault::{FaultPolicy, NoopFaultHandler};
    /// use sme_core::response::CompletionOutcome;
    /// use sme_core::serializer::CallbackReason;
    ///
    /// struct Reentrant<'a> {
    ///     engine: &'a mut Engine<fn(CompletionOutcome), u64, 4>,
    /// }
    ///
    /// let mut engine: Engine<fn(CompletionOutcome), u64, 4> =
    ///     Engine::new(FaultPolicy::default());
    /// let mut faults = NoopFaultHandler;
    /// let handle = engine.acquire_command_buffer(&mut faults, 0).unwrap();
    /// let reentrant = Reentrant { engine: &mut engine };
    /// let _ = engine.serializer_event(handle, CallbackReason::Activate, &mut NoopSink, 0);
    /// drop(reentrant);
    /// ```
    pub fn serializer_event<K: CommandSink>(
        &mut self,
        handle: CommandHandle,
        reason: CallbackReason,
        sink: &mut K,
        now: TInstant,
    ) -> Result<(), BridgeError<K::Error>> {
        match reason {
            CallbackReason::Activate => self.activate(handle, sink, now),
            CallbackReason::Cancel => {
                let slot = self.pool.get(handle)?;
                let found = slot.stage();
                if found != Stage::Pending {
                    return Err(PoolError::ListMismatch {
                        handle,
                        expected: Stage::Pending,
                        found,
                    }
                    .into());
                }
                let kind = slot.kind();
                let trace = CommandTrace {
                    cmd_id: slot.cmd_id(),
                    session: slot.session(),
                };
                self.events.record(
                    EngineEventKind::Cancelled(kind),
                    EventDetail::Command(trace),
                    now,
                );
                Ok(())
            }
            CallbackReason::ReleaseMemory => {
                let slot = self.pool.get(handle)?;
                let kind = slot.kind();
                match slot.stage() {
                    Stage::Pending | Stage::Active => self.pool.remove(handle)?,
                    Stage::Owned => {}
                    Stage::Free => {
                        return Err(PoolError::DoubleRelease { handle }.into());
                    }
                }
                self.pool.release(handle)?;
                self.events.record(
                    EngineEventKind::Released(kind),
                    EventDetail::None,
                    now,
                );
                Ok(())
            }
            CallbackReason::ActiveTimeout => {
                let slot = self.pool.get(handle)?;
                let found = slot.stage();
                if found != Stage::Active {
                    return Err(PoolError::ListMismatch {
                        handle,
                        expected: Stage::Active,
                        found,
                    }
                    .into());
                }
                let kind = slot.kind();
                let trace = CommandTrace {
                    cmd_id: slot.cmd_id(),
                    session: slot.session(),
                };
                self.events.record(
                    EngineEventKind::ActiveTimeout(kind),
                    EventDetail::Command(trace),
                    now,
                );
                Ok(())
            }
        }
    }

    /// Caller-side withdrawal of a command it no longer wants.
    ///
    /// A still-Owned slot goes straight back to Free. A Pending or Active
    /// slot is withdrawn through the scheduler; the memory returns later via
    /// the `ReleaseMemory` event.
    pub fn release_command<S: Serializer>(
        &mut self,
        handle: CommandHandle,
        serializer: &mut S,
        now: TInstant,
    ) -> Result<(), WithdrawError<S::Error>> {
        let slot = self.pool.get(handle)?;
        let kind = slot.kind();
        match slot.stage() {
            Stage::Owned => {
                self.pool.release(handle)?;
                self.events.record(
                    EngineEventKind::Released(kind),
                    EventDetail::None,
                    now,
                );
                Ok(())
            }
            stage @ (Stage::Pending | Stage::Active) => {
                let Some(class) = SerializedClass::classify(slot.payload()) else {
                    return Err(EngineError::InvalidArgument.into());
                };
                let request = CancelRequest {
                    cmd_id: slot.cmd_id(),
                    class,
                    session: slot.session(),
                    queue: match stage {
                        Stage::Active => QueueKind::Active,
                        _ => QueueKind::Pending,
                    },
                };
                serializer
                    .cancel(request)
                    .map_err(WithdrawError::Serializer)
            }
            Stage::Free => Err(PoolError::DoubleRelease { handle }.into()),
        }
    }

    /// Matches one firmware/scheduler response against the Active head.
    ///
    /// An empty Active list drops the message. A kind mismatch never fires
    /// the stored completion, but still drains the head to Free so the
    /// serialized slot cannot wedge behind a command that will never be
    /// answered. On a match the completion fires exactly once with the saved
    /// request context joined to the firmware result.
    pub fn handle_response(
        &mut self,
        message: &ResponseMessage,
        now: TInstant,
    ) -> Result<(), EngineError>
    where
        C: crate::command::CompletionHandler,
    {
        let Some(handle) = self.pool.peek_active_head() else {
            self.events
                .record(EngineEventKind::ResponseDropped, EventDetail::None, now);
            return Err(EngineError::ResponseWithoutCommand);
        };

        let slot = self.pool.get(handle)?;
        let expected = message.expected_kind();
        let found = slot.kind();
        let session = slot.session();
        let payload = *slot.payload();
        let trace = CommandTrace {
            cmd_id: slot.cmd_id(),
            session,
        };

        let outcome = if found == expected {
            build_outcome(session, &payload, message)
        } else {
            None
        };
        let Some(outcome) = outcome else {
            self.events.record(
                EngineEventKind::KindMismatch,
                EventDetail::Mismatch { expected, found },
                now,
            );
            self.pool.remove_from_active(handle)?;
            self.pool.release(handle)?;
            self.events
                .record(EngineEventKind::Released(found), EventDetail::None, now);
            return Err(EngineError::KindMismatch { expected, found });
        };

        let completion = self.pool.get_mut(handle)?.take_completion();
        self.pool.remove_from_active(handle)?;
        self.pool.release(handle)?;
        self.events.record(
            EngineEventKind::Completed(found),
            EventDetail::Command(trace),
            now,
        );
        if let Some(completion) = completion {
            completion.complete(outcome);
        }
        Ok(())
    }

    fn activate<K: CommandSink>(
        &mut self,
        handle: CommandHandle,
        sink: &mut K,
        now: TInstant,
    ) -> Result<(), BridgeError<K::Error>> {
        self.pool.move_to_active(handle)?;
        let slot = self.pool.get(handle)?;
        let kind = slot.kind();
        let session = slot.session();
        let payload = *slot.payload();
        let trace = CommandTrace {
            cmd_id: slot.cmd_id(),
            session,
        };
        self.events.record(
            EngineEventKind::Activated(kind),
            EventDetail::Command(trace),
            now,
        );
        match dispatch::route(sink, session, &payload) {
            Ok(()) => Ok(()),
            Err(DispatchError::EmptySlot) => Err(EngineError::UnknownCommand.into()),
            Err(DispatchError::Sink(err)) => {
                // The slot stays Active; the scheduler tears the command
                // down and reclaims it through ReleaseMemory.
                self.events.record(
                    EngineEventKind::DispatchFailed(kind),
                    EventDetail::Command(trace),
                    now,
                );
                Err(BridgeError::Dispatch(err))
            }
        }
    }

    /// Dumps what the lists look like when the pool runs dry, then either
    /// flushes logs or escalates to forced recovery, per policy.
    fn report_exhaustion<F: FaultHandler>(&mut self, faults: &mut F, now: TInstant) {
        let census = self.pool.census();
        self.events.record(
            EngineEventKind::PoolExhausted,
            EventDetail::Census(census),
            now,
        );

        if let Some(head) = self.pool.peek_active_head()
            && let Ok(slot) = self.pool.get(head)
        {
            let kind = slot.kind();
            let diagnostic = CommandDiagnostic {
                handle: head,
                kind,
                session: slot.session(),
                cmd_id: slot.cmd_id(),
                queue: QueueKind::Active,
            };
            self.events.record(
                EngineEventKind::ActiveHeadStuck(kind),
                EventDetail::Command(CommandTrace {
                    cmd_id: diagnostic.cmd_id,
                    session: diagnostic.session,
                }),
                now,
            );
            if kind.is_blocking() {
                faults.dump_command(&diagnostic);
            }
        }

        let mut backlog: heapless::Vec<CommandHandle, { crate::fault::PENDING_DUMP_LIMIT }> =
            heapless::Vec::new();
        for handle in self
            .pool
            .pending_iter()
            .take(crate::fault::PENDING_DUMP_LIMIT)
        {
            let _ = backlog.push(handle);
        }
        for handle in backlog {
            let Ok(slot) = self.pool.get(handle) else {
                continue;
            };
            let kind = slot.kind();
            let diagnostic = CommandDiagnostic {
                handle,
                kind,
                session: slot.session(),
                cmd_id: slot.cmd_id(),
                queue: QueueKind::Pending,
            };
            self.events.record(
                EngineEventKind::PendingBacklog(kind),
                EventDetail::Command(CommandTrace {
                    cmd_id: diagnostic.cmd_id,
                    session: diagnostic.session,
                }),
                now,
            );
            if kind.is_blocking() {
                faults.dump_command(&diagnostic);
            }
        }

        if self.policy.proactive_log_dump {
            faults.flush_logs(RecoveryReason::PoolExhausted);
        } else {
            self.events.record(
                EngineEventKind::RecoveryRequested,
                EventDetail::Recovery(RecoveryReason::PoolExhausted),
                now,
            );
            faults.trigger_recovery(RecoveryReason::PoolExhausted);
        }
    }

    fn next_command_id(&mut self) -> u32 {
        self.id_counter = self.id_counter.wrapping_add(1);
        (self.id_counter & COMMAND_ID_MASK) | COMMAND_ID_PREFIX
    }
}

/// Joins the saved request context with the firmware result. `None` when the
/// payload and message variants disagree, which the kind check upstream
/// already rules out for well-formed traffic.
fn build_outcome(
    session: SessionId,
    payload: &CommandPayload,
    message: &ResponseMessage,
) -> Option<CompletionOutcome> {
    match (payload, message) {
        (CommandPayload::SetHwMode(request), ResponseMessage::HwMode(response)) => {
            Some(CompletionOutcome::HwMode(HwModeOutcome {
                status: response.status,
                cfgd_hw_mode_index: response.cfgd_hw_mode_index,
                vdev_mac_map: response.vdev_mac_map.clone(),
                reason: request.reason,
                next_action: request.next_action,
                session,
            }))
        }
        (CommandPayload::SetHwMode(_), ResponseMessage::HwModeTransition(transition)) => {
            Some(CompletionOutcome::HwModeTransition(HwModeTransitionOutcome {
                old_hw_mode_index: transition.old_hw_mode_index,
                new_hw_mode_index: transition.new_hw_mode_index,
                vdev_mac_map: transition.vdev_mac_map.clone(),
                session,
            }))
        }
        (CommandPayload::SetDualMacConfig(request), ResponseMessage::DualMacConfig(response)) => {
            Some(CompletionOutcome::DualMacConfig(DualMacConfigOutcome {
                status: response.status,
                scan_config: request.scan_config,
                fw_mode_config: request.fw_mode_config,
            }))
        }
        (CommandPayload::SetAntennaMode(request), ResponseMessage::AntennaMode(response)) => {
            Some(CompletionOutcome::AntennaMode(AntennaModeOutcome {
                status: response.status,
                tx_chains: request.tx_chains,
                rx_chains: request.rx_chains,
            }))
        }
        (CommandPayload::NssUpdate(request), ResponseMessage::NssUpdate(response)) => {
            Some(CompletionOutcome::NssUpdate(NssUpdateOutcome {
                status: response.status,
                session: response.session,
                nss: request.nss,
                next_action: request.next_action,
            }))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{
        DualMacConfigRequest, HwModeRequest, PolicyChangeReason, PolicyNextAction, RoamReason,
        RoamRequest,
    };
    use crate::dispatch::NoopSink;
    use crate::fault::NoopFaultHandler;
    use crate::response::{DualMacConfigResponse, FwStatus, NssUpdateResponse};

    type MockInstant = u64;
    type TestEngine = Engine<fn(CompletionOutcome), MockInstant, 4>;

    /// Serializer answering from a fixed script of admissions.
    struct ScriptedSerializer {
        admissions: heapless::Deque<Admission, 8>,
        requests: usize,
        cancels: usize,
        reject: bool,
    }

    impl ScriptedSerializer {
        fn new(script: &[Admission]) -> Self {
            let mut admissions = heapless::Deque::new();
            for admission in script {
                admissions.push_back(*admission).unwrap();
            }
            Self {
                admissions,
                requests: 0,
                cancels: 0,
                reject: false,
            }
        }

        fn rejecting() -> Self {
            let mut serializer = Self::new(&[]);
            serializer.reject = true;
            serializer
        }
    }

    impl Serializer for ScriptedSerializer {
        type Error = ();

        fn request(&mut self, _request: SerializedRequest) -> Result<Admission, Self::Error> {
            self.requests += 1;
            if self.reject {
                return Err(());
            }
            self.admissions.pop_front().ok_or(())
        }

        fn cancel(&mut self, _request: CancelRequest) -> Result<(), Self::Error> {
            self.cancels += 1;
            Ok(())
        }
    }

    fn filled_handle(engine: &mut TestEngine, payload: CommandPayload) -> CommandHandle {
        let mut faults = NoopFaultHandler;
        let handle = engine.acquire_command_buffer(&mut faults, 0).unwrap();
        let slot = engine.command_mut(handle).unwrap();
        slot.set_session(SessionId::new(0));
        slot.set_payload(payload);
        handle
    }

    fn dual_mac_payload() -> CommandPayload {
        CommandPayload::SetDualMacConfig(DualMacConfigRequest {
            scan_config: 3,
            fw_mode_config: 5,
        })
    }

    #[test]
    fn submit_rejects_empty_payload() {
        let mut engine = TestEngine::new(FaultPolicy::default());
        let mut faults = NoopFaultHandler;
        let handle = engine.acquire_command_buffer(&mut faults, 0).unwrap();
        let mut serializer = ScriptedSerializer::new(&[Admission::Pending]);

        let result = engine.submit(handle, &mut serializer, &mut NoopSink, false, 1);
        assert_eq!(
            result,
            Err(SubmitError::Engine(EngineError::InvalidArgument))
        );
        assert_eq!(serializer.requests, 0);
    }

    #[test]
    fn command_ids_carry_the_prefix() {
        let mut engine = TestEngine::new(FaultPolicy::default());
        let mut serializer = ScriptedSerializer::new(&[Admission::Pending, Admission::Pending]);

        let first = filled_handle(&mut engine, dual_mac_payload());
        engine
            .submit(first, &mut serializer, &mut NoopSink, false, 1)
            .unwrap();
        let second = filled_handle(&mut engine, dual_mac_payload());
        engine
            .submit(second, &mut serializer, &mut NoopSink, false, 2)
            .unwrap();

        let id1 = engine.command(first).unwrap().cmd_id();
        let id2 = engine.command(second).unwrap().cmd_id();
        assert_eq!(id1 & 0xFF00_0000, COMMAND_ID_PREFIX);
        assert_eq!(id2, id1 + 1);
    }

    #[test]
    fn rejected_submission_returns_the_buffer() {
        let mut engine = TestEngine::new(FaultPolicy::default());
        let mut serializer = ScriptedSerializer::rejecting();
        let handle = filled_handle(&mut engine, dual_mac_payload());

        let result = engine.submit(handle, &mut serializer, &mut NoopSink, false, 1);
        assert_eq!(result, Err(SubmitError::Serializer(())));
        assert_eq!(engine.census().free, engine.capacity());
    }

    #[test]
    fn active_admission_dispatches_synchronously() {
        let mut engine = TestEngine::new(FaultPolicy::default());
        let mut serializer = ScriptedSerializer::new(&[Admission::Active]);
        let handle = filled_handle(&mut engine, dual_mac_payload());

        let admission = engine
            .submit(handle, &mut serializer, &mut NoopSink, false, 1)
            .unwrap();
        assert_eq!(admission, Admission::Active);
        assert_eq!(engine.active_head(), Some(handle));
    }

    #[test]
    fn cancel_records_but_does_not_free() {
        let mut engine = TestEngine::new(FaultPolicy::default());
        let mut serializer = ScriptedSerializer::new(&[Admission::Pending]);
        let handle = filled_handle(&mut engine, dual_mac_payload());
        engine
            .submit(handle, &mut serializer, &mut NoopSink, false, 1)
            .unwrap();

        engine
            .serializer_event(handle, CallbackReason::Cancel, &mut NoopSink, 2)
            .unwrap();
        assert_eq!(engine.census().pending, 1);

        engine
            .serializer_event(handle, CallbackReason::ReleaseMemory, &mut NoopSink, 3)
            .unwrap();
        assert_eq!(engine.census().free, engine.capacity());
    }

    #[test]
    fn active_timeout_leaves_the_slot_active() {
        let mut engine = TestEngine::new(FaultPolicy::default());
        let mut serializer = ScriptedSerializer::new(&[Admission::Active]);
        let handle = filled_handle(&mut engine, dual_mac_payload());
        engine
            .submit(handle, &mut serializer, &mut NoopSink, false, 1)
            .unwrap();

        engine
            .serializer_event(handle, CallbackReason::ActiveTimeout, &mut NoopSink, 40)
            .unwrap();
        assert_eq!(engine.active_head(), Some(handle));
        assert_eq!(
            engine.events().latest().map(|event| event.kind),
            Some(EngineEventKind::ActiveTimeout(
                CommandKind::SetDualMacConfig
            ))
        );
    }

    #[test]
    fn release_of_an_owned_slot_is_direct() {
        let mut engine = TestEngine::new(FaultPolicy::default());
        let mut serializer = ScriptedSerializer::new(&[]);
        let handle = filled_handle(&mut engine, dual_mac_payload());

        engine.release_command(handle, &mut serializer, 1).unwrap();
        assert_eq!(engine.census().free, engine.capacity());
        assert_eq!(serializer.cancels, 0);
    }

    #[test]
    fn release_of_a_pending_slot_goes_through_the_scheduler() {
        let mut engine = TestEngine::new(FaultPolicy::default());
        let mut serializer = ScriptedSerializer::new(&[Admission::Pending]);
        let handle = filled_handle(&mut engine, dual_mac_payload());
        engine
            .submit(handle, &mut serializer, &mut NoopSink, false, 1)
            .unwrap();

        engine.release_command(handle, &mut serializer, 2).unwrap();
        assert_eq!(serializer.cancels, 1);
        // Memory comes back only with the release event.
        assert_eq!(engine.census().pending, 1);
    }

    #[test]
    fn response_with_empty_active_list_is_dropped() {
        let mut engine = TestEngine::new(FaultPolicy::default());
        let message = ResponseMessage::NssUpdate(NssUpdateResponse {
            status: FwStatus::Ok,
            session: SessionId::new(0),
        });
        assert_eq!(
            engine.handle_response(&message, 1),
            Err(EngineError::ResponseWithoutCommand)
        );
        assert_eq!(
            engine.events().latest().map(|event| event.kind),
            Some(EngineEventKind::ResponseDropped)
        );
    }

    #[test]
    fn mismatched_response_drains_without_completing() {
        let mut engine = TestEngine::new(FaultPolicy::default());
        let mut serializer = ScriptedSerializer::new(&[Admission::Active]);
        let handle = filled_handle(&mut engine, dual_mac_payload());
        engine
            .submit(handle, &mut serializer, &mut NoopSink, false, 1)
            .unwrap();

        let message = ResponseMessage::NssUpdate(NssUpdateResponse {
            status: FwStatus::Ok,
            session: SessionId::new(0),
        });
        let result = engine.handle_response(&message, 2);
        assert_eq!(
            result,
            Err(EngineError::KindMismatch {
                expected: CommandKind::NssUpdate,
                found: CommandKind::SetDualMacConfig,
            })
        );
        assert_eq!(engine.census().free, engine.capacity());
    }

    #[test]
    fn matched_response_frees_the_slot() {
        let mut engine = TestEngine::new(FaultPolicy::default());
        let mut serializer = ScriptedSerializer::new(&[Admission::Active]);
        let handle = filled_handle(&mut engine, dual_mac_payload());
        engine
            .submit(handle, &mut serializer, &mut NoopSink, false, 1)
            .unwrap();

        let message = ResponseMessage::DualMacConfig(DualMacConfigResponse {
            status: FwStatus::Ok,
        });
        engine.handle_response(&message, 2).unwrap();
        assert_eq!(engine.census().free, engine.capacity());
        assert_eq!(engine.active_head(), None);
    }

    #[test]
    fn hw_mode_request_builds_roam_classes() {
        let mut engine = TestEngine::new(FaultPolicy::default());
        let mut serializer = ScriptedSerializer::new(&[Admission::Pending]);
        let handle = filled_handle(
            &mut engine,
            CommandPayload::Roam(RoamRequest {
                reason: RoamReason::ForceDeauthSta,
            }),
        );
        engine
            .submit(handle, &mut serializer, &mut NoopSink, true, 1)
            .unwrap();
        assert_eq!(serializer.requests, 1);
    }

    #[test]
    fn outcome_joins_request_context() {
        let payload = CommandPayload::SetHwMode(HwModeRequest {
            hw_mode_index: 2,
            reason: PolicyChangeReason::Connect,
            next_action: PolicyNextAction::EnableDbs,
        });
        let message = ResponseMessage::HwMode(crate::response::HwModeResponse {
            status: FwStatus::Ok,
            cfgd_hw_mode_index: 2,
            vdev_mac_map: heapless::Vec::new(),
        });
        let outcome = build_outcome(SessionId::new(1), &payload, &message).unwrap();
        match outcome {
            CompletionOutcome::HwMode(outcome) => {
                assert_eq!(outcome.reason, PolicyChangeReason::Connect);
                assert_eq!(outcome.next_action, PolicyNextAction::EnableDbs);
                assert_eq!(outcome.cfgd_hw_mode_index, 2);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
