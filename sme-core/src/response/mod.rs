//! Firmware and scheduler response messages plus the per-kind completion
//! outcomes handed to stored callbacks.

use core::fmt;

use heapless::Vec;

use crate::command::{CommandKind, PolicyChangeReason, PolicyNextAction, SessionId};

/// Upper bound on vdev-to-MAC mapping entries a response can carry.
pub const MAX_VDEV_MAC_ENTRIES: usize = 4;

/// Result code reported by firmware.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FwStatus {
    Ok,
    InvalidArgument,
    Cancelled,
    NotSupported,
    HardwareFailure,
    Pending,
    CoexDenied,
}

impl FwStatus {
    const OK_CODE: u8 = 0x00;
    const INVALID_ARGUMENT_CODE: u8 = 0x01;
    const CANCELLED_CODE: u8 = 0x02;
    const NOT_SUPPORTED_CODE: u8 = 0x03;
    const HARDWARE_FAILURE_CODE: u8 = 0x04;
    const PENDING_CODE: u8 = 0x05;
    const COEX_DENIED_CODE: u8 = 0x06;

    /// Encodes the status into its transport discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            FwStatus::Ok => Self::OK_CODE,
            FwStatus::InvalidArgument => Self::INVALID_ARGUMENT_CODE,
            FwStatus::Cancelled => Self::CANCELLED_CODE,
            FwStatus::NotSupported => Self::NOT_SUPPORTED_CODE,
            FwStatus::HardwareFailure => Self::HARDWARE_FAILURE_CODE,
            FwStatus::Pending => Self::PENDING_CODE,
            FwStatus::CoexDenied => Self::COEX_DENIED_CODE,
        }
    }

    /// Decodes a raw discriminant produced by [`to_raw`](Self::to_raw).
    #[must_use]
    pub const fn from_raw(code: u8) -> Option<Self> {
        match code {
            Self::OK_CODE => Some(FwStatus::Ok),
            Self::INVALID_ARGUMENT_CODE => Some(FwStatus::InvalidArgument),
            Self::CANCELLED_CODE => Some(FwStatus::Cancelled),
            Self::NOT_SUPPORTED_CODE => Some(FwStatus::NotSupported),
            Self::HARDWARE_FAILURE_CODE => Some(FwStatus::HardwareFailure),
            Self::PENDING_CODE => Some(FwStatus::Pending),
            Self::COEX_DENIED_CODE => Some(FwStatus::CoexDenied),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, FwStatus::Ok)
    }
}

impl fmt::Display for FwStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FwStatus::Ok => "ok",
            FwStatus::InvalidArgument => "invalid-argument",
            FwStatus::Cancelled => "cancelled",
            FwStatus::NotSupported => "not-supported",
            FwStatus::HardwareFailure => "hardware-failure",
            FwStatus::Pending => "pending",
            FwStatus::CoexDenied => "coex-denied",
        };
        f.write_str(name)
    }
}

/// One vdev-to-MAC assignment reported after a hardware-mode change.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VdevMacMap {
    pub session: SessionId,
    pub mac_id: u8,
}

/// Firmware answer to a hardware-mode change request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HwModeResponse {
    pub status: FwStatus,
    pub cfgd_hw_mode_index: u32,
    pub vdev_mac_map: Vec<VdevMacMap, MAX_VDEV_MAC_ENTRIES>,
}

/// Unsolicited notification that firmware switched hardware modes itself.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HwModeTransition {
    pub old_hw_mode_index: u32,
    pub new_hw_mode_index: u32,
    pub vdev_mac_map: Vec<VdevMacMap, MAX_VDEV_MAC_ENTRIES>,
}

/// Firmware answer to a dual-MAC configuration request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DualMacConfigResponse {
    pub status: FwStatus,
}

/// Firmware answer to an antenna-mode change request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AntennaModeResponse {
    pub status: FwStatus,
}

/// Firmware answer to a spatial-stream update request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NssUpdateResponse {
    pub status: FwStatus,
    pub session: SessionId,
}

/// Message arriving from firmware or the scheduler for the Active head.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResponseMessage {
    HwMode(HwModeResponse),
    HwModeTransition(HwModeTransition),
    DualMacConfig(DualMacConfigResponse),
    AntennaMode(AntennaModeResponse),
    NssUpdate(NssUpdateResponse),
}

impl ResponseMessage {
    /// Command kind the Active head must carry for this message to match.
    #[must_use]
    pub const fn expected_kind(&self) -> CommandKind {
        match self {
            ResponseMessage::HwMode(_) | ResponseMessage::HwModeTransition(_) => {
                CommandKind::SetHwMode
            }
            ResponseMessage::DualMacConfig(_) => CommandKind::SetDualMacConfig,
            ResponseMessage::AntennaMode(_) => CommandKind::SetAntennaMode,
            ResponseMessage::NssUpdate(_) => CommandKind::NssUpdate,
        }
    }
}

/// Outcome of a hardware-mode change: firmware result joined with the
/// request context saved at submission.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HwModeOutcome {
    pub status: FwStatus,
    pub cfgd_hw_mode_index: u32,
    pub vdev_mac_map: Vec<VdevMacMap, MAX_VDEV_MAC_ENTRIES>,
    pub reason: PolicyChangeReason,
    pub next_action: PolicyNextAction,
    pub session: SessionId,
}

/// Outcome of a firmware-initiated hardware-mode transition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HwModeTransitionOutcome {
    pub old_hw_mode_index: u32,
    pub new_hw_mode_index: u32,
    pub vdev_mac_map: Vec<VdevMacMap, MAX_VDEV_MAC_ENTRIES>,
    pub session: SessionId,
}

/// Outcome of a dual-MAC configuration request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DualMacConfigOutcome {
    pub status: FwStatus,
    pub scan_config: u32,
    pub fw_mode_config: u32,
}

/// Outcome of an antenna-mode change request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AntennaModeOutcome {
    pub status: FwStatus,
    pub tx_chains: u32,
    pub rx_chains: u32,
}

/// Outcome of a spatial-stream update request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NssUpdateOutcome {
    pub status: FwStatus,
    pub session: SessionId,
    pub nss: u8,
    pub next_action: PolicyNextAction,
}

/// Value handed to a stored completion handler, exactly once.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CompletionOutcome {
    HwMode(HwModeOutcome),
    HwModeTransition(HwModeTransitionOutcome),
    DualMacConfig(DualMacConfigOutcome),
    AntennaMode(AntennaModeOutcome),
    NssUpdate(NssUpdateOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for status in [
            FwStatus::Ok,
            FwStatus::InvalidArgument,
            FwStatus::Cancelled,
            FwStatus::NotSupported,
            FwStatus::HardwareFailure,
            FwStatus::Pending,
            FwStatus::CoexDenied,
        ] {
            assert_eq!(FwStatus::from_raw(status.to_raw()), Some(status));
        }
        assert_eq!(FwStatus::from_raw(0xEE), None);
        assert!(FwStatus::Ok.is_ok());
        assert!(!FwStatus::CoexDenied.is_ok());
    }

    #[test]
    fn messages_name_their_expected_kind() {
        let msg = ResponseMessage::NssUpdate(NssUpdateResponse {
            status: FwStatus::Ok,
            session: SessionId::new(1),
        });
        assert_eq!(msg.expected_kind(), CommandKind::NssUpdate);

        let transition = ResponseMessage::HwModeTransition(HwModeTransition {
            old_hw_mode_index: 0,
            new_hw_mode_index: 1,
            vdev_mac_map: Vec::new(),
        });
        assert_eq!(transition.expected_kind(), CommandKind::SetHwMode);
    }
}
