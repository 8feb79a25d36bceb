//! Contract between the engine and the external serialization scheduler.
//!
//! The scheduler owns the single execution slot: the engine hands it a
//! [`SerializedRequest`] at submission, the scheduler answers with an
//! [`Admission`], and every later lifecycle step arrives back as a
//! [`CallbackReason`] event. The engine never decides activation order on its
//! own.

use core::fmt;
use core::time::Duration;

use crate::command::{CommandPayload, RoamReason, SessionId};

/// Default budget for a command occupying the execution slot.
pub const ACTIVE_CMD_TIMEOUT: Duration = Duration::from_secs(30);

/// Policy-manager reconfigurations get slightly more than the default so the
/// scheduler-level timer fires first.
pub const POLICY_MGR_CMD_TIMEOUT: Duration = Duration::from_secs(31);

/// Peer disconnect paths (deauth, disassoc, session teardown).
pub const PEER_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(12);

/// Traffic-stream add/delete exchanges.
pub const ADD_DEL_TS_TIMEOUT: Duration = Duration::from_secs(1);

/// BSS start on a vdev.
pub const VDEV_START_BSS_TIMEOUT: Duration = Duration::from_secs(20);

/// BSS stop on a vdev.
pub const VDEV_STOP_BSS_TIMEOUT: Duration = Duration::from_secs(10);

/// Scheduler's answer to a serialization request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Admission {
    /// Queued behind other work; an `Activate` callback follows later.
    Pending,
    /// The execution slot was idle; the command is active right now.
    Active,
}

/// Which scheduler queue an operation refers to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum QueueKind {
    Pending,
    Active,
}

/// Lifecycle event delivered by the scheduler for a serialized command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CallbackReason {
    /// The command reached the head of the line; dispatch it.
    Activate,
    /// The command was withdrawn before activation; do not dispatch.
    Cancel,
    /// The scheduler is done with the command; reclaim the buffer.
    ReleaseMemory,
    /// The command overstayed its execution deadline.
    ActiveTimeout,
}

impl CallbackReason {
    const ACTIVATE_CODE: u8 = 0x01;
    const CANCEL_CODE: u8 = 0x02;
    const RELEASE_MEMORY_CODE: u8 = 0x03;
    const ACTIVE_TIMEOUT_CODE: u8 = 0x04;

    /// Encodes the reason into its transport discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            CallbackReason::Activate => Self::ACTIVATE_CODE,
            CallbackReason::Cancel => Self::CANCEL_CODE,
            CallbackReason::ReleaseMemory => Self::RELEASE_MEMORY_CODE,
            CallbackReason::ActiveTimeout => Self::ACTIVE_TIMEOUT_CODE,
        }
    }

    /// Decodes a raw discriminant produced by [`to_raw`](Self::to_raw).
    #[must_use]
    pub const fn from_raw(code: u8) -> Option<Self> {
        match code {
            Self::ACTIVATE_CODE => Some(CallbackReason::Activate),
            Self::CANCEL_CODE => Some(CallbackReason::Cancel),
            Self::RELEASE_MEMORY_CODE => Some(CallbackReason::ReleaseMemory),
            Self::ACTIVE_TIMEOUT_CODE => Some(CallbackReason::ActiveTimeout),
            _ => None,
        }
    }
}

impl fmt::Display for CallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallbackReason::Activate => "activate",
            CallbackReason::Cancel => "cancel",
            CallbackReason::ReleaseMemory => "release-memory",
            CallbackReason::ActiveTimeout => "active-timeout",
        };
        f.write_str(name)
    }
}

/// Admission class the scheduler serializes on. Roam commands subdivide by
/// their sub-operation; everything else maps one-to-one from the kind.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SerializedClass {
    SetHwMode,
    NssUpdate,
    SetDualMacConfig,
    SetAntennaMode,
    VdevStartBss,
    VdevStopBss,
    ForceDisassocSta,
    ForceDeauthSta,
    WmStatusChange,
    DelStaSession,
    AddTs,
    DelTs,
}

impl SerializedClass {
    /// Derives the admission class from a filled payload. `None` for the
    /// empty payload, which must never reach the scheduler.
    #[must_use]
    pub const fn classify(payload: &CommandPayload) -> Option<Self> {
        match payload {
            CommandPayload::Empty => None,
            CommandPayload::SetHwMode(_) => Some(SerializedClass::SetHwMode),
            CommandPayload::NssUpdate(_) => Some(SerializedClass::NssUpdate),
            CommandPayload::SetDualMacConfig(_) => Some(SerializedClass::SetDualMacConfig),
            CommandPayload::SetAntennaMode(_) => Some(SerializedClass::SetAntennaMode),
            CommandPayload::Roam(request) => Some(match request.reason {
                RoamReason::StartBss => SerializedClass::VdevStartBss,
                RoamReason::StopBss => SerializedClass::VdevStopBss,
                RoamReason::ForceDisassocSta => SerializedClass::ForceDisassocSta,
                RoamReason::ForceDeauthSta => SerializedClass::ForceDeauthSta,
            }),
            CommandPayload::WmStatusChange(_) => Some(SerializedClass::WmStatusChange),
            CommandPayload::DeleteStaSession(_) => Some(SerializedClass::DelStaSession),
            CommandPayload::AddTs(_) => Some(SerializedClass::AddTs),
            CommandPayload::DelTs(_) => Some(SerializedClass::DelTs),
        }
    }

    /// Budget for this class occupying the execution slot.
    #[must_use]
    pub const fn execution_deadline(self) -> Duration {
        match self {
            SerializedClass::SetHwMode
            | SerializedClass::NssUpdate
            | SerializedClass::SetDualMacConfig
            | SerializedClass::SetAntennaMode => POLICY_MGR_CMD_TIMEOUT,
            SerializedClass::VdevStartBss => VDEV_START_BSS_TIMEOUT,
            SerializedClass::VdevStopBss => VDEV_STOP_BSS_TIMEOUT,
            SerializedClass::ForceDisassocSta
            | SerializedClass::ForceDeauthSta
            | SerializedClass::WmStatusChange
            | SerializedClass::DelStaSession => PEER_DISCONNECT_TIMEOUT,
            SerializedClass::AddTs | SerializedClass::DelTs => ADD_DEL_TS_TIMEOUT,
        }
    }
}

impl fmt::Display for SerializedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SerializedClass::SetHwMode => "set-hw-mode",
            SerializedClass::NssUpdate => "nss-update",
            SerializedClass::SetDualMacConfig => "set-dual-mac-config",
            SerializedClass::SetAntennaMode => "set-antenna-mode",
            SerializedClass::VdevStartBss => "vdev-start-bss",
            SerializedClass::VdevStopBss => "vdev-stop-bss",
            SerializedClass::ForceDisassocSta => "force-disassoc-sta",
            SerializedClass::ForceDeauthSta => "force-deauth-sta",
            SerializedClass::WmStatusChange => "wm-status-change",
            SerializedClass::DelStaSession => "del-sta-session",
            SerializedClass::AddTs => "add-ts",
            SerializedClass::DelTs => "del-ts",
        };
        f.write_str(name)
    }
}

/// Everything the scheduler needs to admit one command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SerializedRequest {
    pub cmd_id: u32,
    pub class: SerializedClass,
    pub session: SessionId,
    pub deadline: Duration,
    pub high_priority: bool,
    pub is_blocking: bool,
}

/// Withdrawal of a previously admitted command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CancelRequest {
    pub cmd_id: u32,
    pub class: SerializedClass,
    pub session: SessionId,
    pub queue: QueueKind,
}

/// External serialization scheduler.
///
/// Implementations must not call back into the engine from these methods;
/// lifecycle progress is reported later through
/// [`Engine::serializer_event`](crate::engine::Engine::serializer_event).
pub trait Serializer {
    type Error;

    /// Admits a command, answering whether it went Pending or straight
    /// Active.
    fn request(&mut self, request: SerializedRequest) -> Result<Admission, Self::Error>;

    /// Withdraws a command from the named queue.
    fn cancel(&mut self, request: CancelRequest) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{RoamRequest, TrafficStreamRequest, TsDirection};

    #[test]
    fn callback_reasons_round_trip() {
        for reason in [
            CallbackReason::Activate,
            CallbackReason::Cancel,
            CallbackReason::ReleaseMemory,
            CallbackReason::ActiveTimeout,
        ] {
            assert_eq!(CallbackReason::from_raw(reason.to_raw()), Some(reason));
        }
        assert_eq!(CallbackReason::from_raw(0), None);
    }

    #[test]
    fn roam_payloads_classify_by_sub_operation() {
        let start = CommandPayload::Roam(RoamRequest {
            reason: RoamReason::StartBss,
        });
        let deauth = CommandPayload::Roam(RoamRequest {
            reason: RoamReason::ForceDeauthSta,
        });
        assert_eq!(
            SerializedClass::classify(&start),
            Some(SerializedClass::VdevStartBss)
        );
        assert_eq!(
            SerializedClass::classify(&deauth),
            Some(SerializedClass::ForceDeauthSta)
        );
        assert_eq!(SerializedClass::classify(&CommandPayload::Empty), None);
    }

    #[test]
    fn deadlines_follow_class() {
        assert_eq!(
            SerializedClass::SetHwMode.execution_deadline(),
            POLICY_MGR_CMD_TIMEOUT
        );
        assert_eq!(
            SerializedClass::DelStaSession.execution_deadline(),
            PEER_DISCONNECT_TIMEOUT
        );
        let add_ts = CommandPayload::AddTs(TrafficStreamRequest {
            tspec_id: 4,
            direction: TsDirection::Uplink,
        });
        let class = SerializedClass::classify(&add_ts).unwrap();
        assert_eq!(class.execution_deadline(), ADD_DEL_TS_TIMEOUT);
        assert!(POLICY_MGR_CMD_TIMEOUT > ACTIVE_CMD_TIMEOUT);
    }
}
