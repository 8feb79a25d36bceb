//! Turns parsed shell lines into engine calls.
//!
//! Stays `no_std` friendly so host targets share the same dispatch path; the
//! caller supplies the engine, its collaborators, and the completion handler
//! to attach to queued commands.

use core::fmt;

use crate::command::{
    AntennaModeRequest, CommandKind, CommandPayload, DualMacConfigRequest, HwModeRequest,
    NssUpdateRequest, PolicyChangeReason, PolicyNextAction, SessionId,
};
use crate::dispatch::CommandSink;
use crate::engine::{Engine, EngineError, SubmitError};
use crate::fault::FaultHandler;
use crate::pool::ListCensus;
use crate::serializer::{Admission, Serializer};

use super::grammar::{self, ShellCommand, ShellParseError};

/// Session shell-issued global commands run under.
const SHELL_SESSION: SessionId = SessionId::new(0);

const HELP_GENERAL: &str = "commands: hwmode <dbs|smm|sbs>, dualmac <scan> <fw>, \
     antenna <tx> <rx>, nss <1|2> <vdev>, status, help [topic]";
const HELP_HWMODE: &str = "hwmode <dbs|smm|sbs>: request a hardware-mode change";
const HELP_DUALMAC: &str = "dualmac <scan> <fw>: push scan and firmware dual-MAC configs";
const HELP_ANTENNA: &str = "antenna <tx> <rx>: set the antenna chain masks";
const HELP_NSS: &str = "nss <1|2> <vdev>: update spatial streams on a vdev";
const HELP_STATUS: &str = "status: pool census and the active command";

/// Shell execution successes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ShellOutcome {
    Queued(QueuedAck),
    Status(StatusReport),
    Help(&'static str),
}

/// Summary returned after queueing a command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct QueuedAck {
    pub kind: CommandKind,
    pub cmd_id: u32,
    pub admission: Admission,
}

/// Snapshot answered to `status`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusReport {
    pub census: ListCensus,
    pub active_head: Option<CommandKind>,
    pub capacity: usize,
}

/// Errors surfaced while executing a shell line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShellError<SE, KE> {
    Parse(ShellParseError),
    Engine(EngineError),
    Submit(SubmitError<SE, KE>),
}

impl<SE, KE> From<ShellParseError> for ShellError<SE, KE> {
    fn from(err: ShellParseError) -> Self {
        ShellError::Parse(err)
    }
}

impl<SE, KE> From<EngineError> for ShellError<SE, KE> {
    fn from(err: EngineError) -> Self {
        ShellError::Engine(err)
    }
}

impl<SE: fmt::Display, KE: fmt::Display> fmt::Display for ShellError<SE, KE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellError::Parse(err) => err.fmt(f),
            ShellError::Engine(err) => err.fmt(f),
            ShellError::Submit(SubmitError::Engine(err)) => err.fmt(f),
            ShellError::Submit(SubmitError::Serializer(err)) => {
                write!(f, "serializer refused command: {err}")
            }
            ShellError::Submit(SubmitError::Dispatch(err)) => {
                write!(f, "dispatch failed: {err}")
            }
        }
    }
}

/// Parses and executes one shell line against the engine.
///
/// `completion` is attached to the queued command and fires when the matching
/// response arrives; `status` and `help` drop it unused.
pub fn execute<C, TInstant, const N: usize, S, K, F>(
    line: &str,
    engine: &mut Engine<C, TInstant, N>,
    serializer: &mut S,
    sink: &mut K,
    faults: &mut F,
    completion: C,
    now: TInstant,
) -> Result<ShellOutcome, ShellError<S::Error, K::Error>>
where
    TInstant: Copy,
    S: Serializer,
    K: CommandSink,
    F: FaultHandler,
{
    let command = grammar::parse(line)?;
    match command {
        ShellCommand::HwMode(pattern) => queue(
            engine,
            serializer,
            sink,
            faults,
            SHELL_SESSION,
            CommandPayload::SetHwMode(HwModeRequest {
                hw_mode_index: pattern.hw_mode_index(),
                reason: PolicyChangeReason::Forced,
                next_action: PolicyNextAction::None,
            }),
            completion,
            now,
        ),
        ShellCommand::DualMac {
            scan_config,
            fw_mode_config,
        } => queue(
            engine,
            serializer,
            sink,
            faults,
            SHELL_SESSION,
            CommandPayload::SetDualMacConfig(DualMacConfigRequest {
                scan_config,
                fw_mode_config,
            }),
            completion,
            now,
        ),
        ShellCommand::Antenna {
            tx_chains,
            rx_chains,
        } => queue(
            engine,
            serializer,
            sink,
            faults,
            SHELL_SESSION,
            CommandPayload::SetAntennaMode(AntennaModeRequest {
                tx_chains,
                rx_chains,
            }),
            completion,
            now,
        ),
        ShellCommand::Nss { nss, session } => queue(
            engine,
            serializer,
            sink,
            faults,
            SessionId::new(session),
            CommandPayload::NssUpdate(NssUpdateRequest {
                nss,
                next_action: PolicyNextAction::None,
            }),
            completion,
            now,
        ),
        ShellCommand::Status => {
            let active_head = engine
                .active_head()
                .and_then(|handle| engine.command(handle).ok())
                .map(crate::command::Command::kind);
            Ok(ShellOutcome::Status(StatusReport {
                census: engine.census(),
                active_head,
                capacity: engine.capacity(),
            }))
        }
        ShellCommand::Help { topic } => Ok(ShellOutcome::Help(help_text(topic))),
    }
}

#[allow(clippy::too_many_arguments)]
fn queue<C, TInstant, const N: usize, S, K, F>(
    engine: &mut Engine<C, TInstant, N>,
    serializer: &mut S,
    sink: &mut K,
    faults: &mut F,
    session: SessionId,
    payload: CommandPayload,
    completion: C,
    now: TInstant,
) -> Result<ShellOutcome, ShellError<S::Error, K::Error>>
where
    TInstant: Copy,
    S: Serializer,
    K: CommandSink,
    F: FaultHandler,
{
    let kind = payload.kind();
    let handle = engine.acquire_command_buffer(faults, now)?;
    let slot = engine.command_mut(handle)?;
    slot.set_session(session);
    slot.set_payload(payload);
    slot.set_completion(completion);

    let admission = engine
        .submit(handle, serializer, sink, false, now)
        .map_err(ShellError::Submit)?;
    let cmd_id = engine.command(handle)?.cmd_id();
    Ok(ShellOutcome::Queued(QueuedAck {
        kind,
        cmd_id,
        admission,
    }))
}

fn help_text(topic: Option<&str>) -> &'static str {
    match topic {
        Some(topic) if topic.eq_ignore_ascii_case("hwmode") => HELP_HWMODE,
        Some(topic) if topic.eq_ignore_ascii_case("dualmac") => HELP_DUALMAC,
        Some(topic) if topic.eq_ignore_ascii_case("antenna") => HELP_ANTENNA,
        Some(topic) if topic.eq_ignore_ascii_case("nss") => HELP_NSS,
        Some(topic) if topic.eq_ignore_ascii_case("status") => HELP_STATUS,
        _ => HELP_GENERAL,
    }
}
