//! Command data model shared by every engine entry point.
//!
//! A command is the unit of work the station-management layer hands to the
//! serialized execution slot: a kind tag, the session (vdev) it applies to, a
//! per-kind request payload, and the completion handler fired when firmware
//! answers. Commands live in the fixed pool for the whole process lifetime and
//! are recycled through [`reset`](Command::reset); nothing here allocates.

use core::fmt;

use crate::response::CompletionOutcome;

/// Logical station/vdev identifier a command applies to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SessionId(u8);

impl SessionId {
    /// Sentinel for commands that target no particular session.
    pub const INVALID: SessionId = SessionId(0xFF);

    /// Wraps a raw vdev identifier.
    #[must_use]
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Returns the raw vdev identifier.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Returns `true` unless this is the [`INVALID`](Self::INVALID) sentinel.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "vdev{}", self.0)
        } else {
            f.write_str("vdev-none")
        }
    }
}

/// Tag identifying the operation a pooled command carries.
///
/// `Empty` marks a free slot; a command on the Pending or Active list never
/// reports it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandKind {
    Empty,
    SetHwMode,
    NssUpdate,
    SetDualMacConfig,
    SetAntennaMode,
    Roam,
    WmStatusChange,
    DeleteStaSession,
    AddTs,
    DelTs,
}

impl CommandKind {
    const EMPTY_CODE: u8 = 0x00;
    const SET_HW_MODE_CODE: u8 = 0x01;
    const NSS_UPDATE_CODE: u8 = 0x02;
    const SET_DUAL_MAC_CONFIG_CODE: u8 = 0x03;
    const SET_ANTENNA_MODE_CODE: u8 = 0x04;
    const ROAM_CODE: u8 = 0x05;
    const WM_STATUS_CHANGE_CODE: u8 = 0x06;
    const DELETE_STA_SESSION_CODE: u8 = 0x07;
    const ADD_TS_CODE: u8 = 0x08;
    const DEL_TS_CODE: u8 = 0x09;

    /// Encodes the kind into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            CommandKind::Empty => Self::EMPTY_CODE,
            CommandKind::SetHwMode => Self::SET_HW_MODE_CODE,
            CommandKind::NssUpdate => Self::NSS_UPDATE_CODE,
            CommandKind::SetDualMacConfig => Self::SET_DUAL_MAC_CONFIG_CODE,
            CommandKind::SetAntennaMode => Self::SET_ANTENNA_MODE_CODE,
            CommandKind::Roam => Self::ROAM_CODE,
            CommandKind::WmStatusChange => Self::WM_STATUS_CHANGE_CODE,
            CommandKind::DeleteStaSession => Self::DELETE_STA_SESSION_CODE,
            CommandKind::AddTs => Self::ADD_TS_CODE,
            CommandKind::DelTs => Self::DEL_TS_CODE,
        }
    }

    /// Decodes a raw discriminant produced by [`to_raw`](Self::to_raw).
    #[must_use]
    pub const fn from_raw(code: u8) -> Option<Self> {
        match code {
            Self::EMPTY_CODE => Some(CommandKind::Empty),
            Self::SET_HW_MODE_CODE => Some(CommandKind::SetHwMode),
            Self::NSS_UPDATE_CODE => Some(CommandKind::NssUpdate),
            Self::SET_DUAL_MAC_CONFIG_CODE => Some(CommandKind::SetDualMacConfig),
            Self::SET_ANTENNA_MODE_CODE => Some(CommandKind::SetAntennaMode),
            Self::ROAM_CODE => Some(CommandKind::Roam),
            Self::WM_STATUS_CHANGE_CODE => Some(CommandKind::WmStatusChange),
            Self::DELETE_STA_SESSION_CODE => Some(CommandKind::DeleteStaSession),
            Self::ADD_TS_CODE => Some(CommandKind::AddTs),
            Self::DEL_TS_CODE => Some(CommandKind::DelTs),
            _ => None,
        }
    }

    /// Returns `true` for kinds that serialize against per-peer state and are
    /// the usual suspects when the execution slot wedges; the exhaustion
    /// diagnostics dump these in full.
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(
            self,
            CommandKind::Roam
                | CommandKind::WmStatusChange
                | CommandKind::DeleteStaSession
                | CommandKind::AddTs
                | CommandKind::DelTs
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Empty => "empty",
            CommandKind::SetHwMode => "set-hw-mode",
            CommandKind::NssUpdate => "nss-update",
            CommandKind::SetDualMacConfig => "set-dual-mac-config",
            CommandKind::SetAntennaMode => "set-antenna-mode",
            CommandKind::Roam => "roam",
            CommandKind::WmStatusChange => "wm-status-change",
            CommandKind::DeleteStaSession => "delete-sta-session",
            CommandKind::AddTs => "add-ts",
            CommandKind::DelTs => "del-ts",
        };
        f.write_str(name)
    }
}

/// Lifecycle stage a pooled command currently occupies.
///
/// `Owned` covers the caller-borrow window between acquisition and
/// submission: the slot is on no list and only its borrower may touch it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Stage {
    Free,
    Owned,
    Pending,
    Active,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Free => "free",
            Stage::Owned => "owned",
            Stage::Pending => "pending",
            Stage::Active => "active",
        };
        f.write_str(name)
    }
}

/// Why a policy-manager hardware reconfiguration was requested.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PolicyChangeReason {
    Connect,
    Disconnect,
    StartAp,
    ChannelSwitch,
    NssUpdate,
    Forced,
}

/// Follow-up the policy manager schedules once a reconfiguration completes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PolicyNextAction {
    None,
    EnableDbs,
    DisableDbs,
}

/// Parameters for a hardware-mode change request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HwModeRequest {
    pub hw_mode_index: u32,
    pub reason: PolicyChangeReason,
    pub next_action: PolicyNextAction,
}

/// Parameters for a spatial-stream count update on one vdev.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NssUpdateRequest {
    pub nss: u8,
    pub next_action: PolicyNextAction,
}

/// Parameters for a dual-MAC scan/firmware-mode configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DualMacConfigRequest {
    pub scan_config: u32,
    pub fw_mode_config: u32,
}

/// Parameters for an antenna chain-mask change.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AntennaModeRequest {
    pub tx_chains: u32,
    pub rx_chains: u32,
}

/// Sub-operation carried by a roam command; selects the serialization class.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RoamReason {
    StartBss,
    StopBss,
    ForceDisassocSta,
    ForceDeauthSta,
}

/// Parameters for a roam-state command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RoamRequest {
    pub reason: RoamReason,
}

/// 802.11 MAC address.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const ZERO: MacAddr = MacAddr([0; 6]);
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Link-state change reported by the peer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WmStatusChange {
    DeauthReceived,
    DisassocReceived,
}

/// Parameters for a peer link-status change command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WmStatusChangeRequest {
    pub change: WmStatusChange,
    pub peer: MacAddr,
}

/// Parameters for tearing down a station session.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DeleteStaSessionRequest {
    pub peer: MacAddr,
}

/// Direction of a traffic-stream specification.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TsDirection {
    Uplink,
    Downlink,
    Bidirectional,
}

/// Parameters shared by add/delete traffic-stream commands.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TrafficStreamRequest {
    pub tspec_id: u8,
    pub direction: TsDirection,
}

/// Per-kind request payload stored inside a pooled command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandPayload {
    Empty,
    SetHwMode(HwModeRequest),
    NssUpdate(NssUpdateRequest),
    SetDualMacConfig(DualMacConfigRequest),
    SetAntennaMode(AntennaModeRequest),
    Roam(RoamRequest),
    WmStatusChange(WmStatusChangeRequest),
    DeleteStaSession(DeleteStaSessionRequest),
    AddTs(TrafficStreamRequest),
    DelTs(TrafficStreamRequest),
}

impl CommandPayload {
    /// Returns the kind tag this payload corresponds to.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            CommandPayload::Empty => CommandKind::Empty,
            CommandPayload::SetHwMode(_) => CommandKind::SetHwMode,
            CommandPayload::NssUpdate(_) => CommandKind::NssUpdate,
            CommandPayload::SetDualMacConfig(_) => CommandKind::SetDualMacConfig,
            CommandPayload::SetAntennaMode(_) => CommandKind::SetAntennaMode,
            CommandPayload::Roam(_) => CommandKind::Roam,
            CommandPayload::WmStatusChange(_) => CommandKind::WmStatusChange,
            CommandPayload::DeleteStaSession(_) => CommandKind::DeleteStaSession,
            CommandPayload::AddTs(_) => CommandKind::AddTs,
            CommandPayload::DelTs(_) => CommandKind::DelTs,
        }
    }
}

/// Completion callback attached to a command before submission.
///
/// The handler is consumed on invocation, so "fires at most once" is a
/// property of the type rather than a convention. Any `FnOnce` over
/// [`CompletionOutcome`] qualifies.
pub trait CompletionHandler {
    /// Delivers the firmware-supplied outcome to the original caller.
    fn complete(self, outcome: CompletionOutcome);
}

impl<F> CompletionHandler for F
where
    F: FnOnce(CompletionOutcome),
{
    fn complete(self, outcome: CompletionOutcome) {
        self(outcome);
    }
}

/// A pooled command record.
///
/// Field access goes through methods so the lifecycle stage and the list
/// bookkeeping stay in the pool's hands; callers fill session, payload, and
/// completion between acquisition and submission.
#[derive(Debug)]
pub struct Command<C> {
    session: SessionId,
    payload: CommandPayload,
    completion: Option<C>,
    stage: Stage,
    cmd_id: u32,
}

impl<C> Command<C> {
    /// Creates a vacant slot for the pool arena.
    pub(crate) const fn vacant() -> Self {
        Self {
            session: SessionId::INVALID,
            payload: CommandPayload::Empty,
            completion: None,
            stage: Stage::Free,
            cmd_id: 0,
        }
    }

    /// Returns the kind tag of the stored payload.
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        self.payload.kind()
    }

    /// Returns the session this command targets.
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Sets the target session.
    pub fn set_session(&mut self, session: SessionId) {
        self.session = session;
    }

    /// Returns the stored request payload.
    #[must_use]
    pub fn payload(&self) -> &CommandPayload {
        &self.payload
    }

    /// Replaces the request payload.
    pub fn set_payload(&mut self, payload: CommandPayload) {
        self.payload = payload;
    }

    /// Attaches the completion handler fired by the response matcher.
    pub fn set_completion(&mut self, completion: C) {
        self.completion = Some(completion);
    }

    /// Takes the completion handler, leaving the slot without one.
    pub(crate) fn take_completion(&mut self) -> Option<C> {
        self.completion.take()
    }

    /// Returns `true` when a completion handler is attached.
    #[must_use]
    pub fn has_completion(&self) -> bool {
        self.completion.is_some()
    }

    /// Returns the serialization command id assigned at submission.
    #[must_use]
    pub fn cmd_id(&self) -> u32 {
        self.cmd_id
    }

    pub(crate) fn set_cmd_id(&mut self, cmd_id: u32) {
        self.cmd_id = cmd_id;
    }

    /// Returns the lifecycle stage the pool currently tracks for this slot.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    /// Clears every caller-visible field; no stale data survives a recycle.
    pub(crate) fn reset(&mut self) {
        self.session = SessionId::INVALID;
        self.payload = CommandPayload::Empty;
        self.completion = None;
        self.cmd_id = 0;
        self.stage = Stage::Free;
    }
}
