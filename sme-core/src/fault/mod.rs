//! Pool-exhaustion diagnostics and the recovery escalation hook.

use core::fmt;

use crate::command::{CommandKind, SessionId};
use crate::pool::CommandHandle;
use crate::serializer::QueueKind;

/// How many Pending commands the exhaustion walk dumps before stopping.
pub const PENDING_DUMP_LIMIT: usize = 5;

/// What the engine does after dumping exhaustion diagnostics.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct FaultPolicy {
    /// `true` asks the host to flush its log transport and keep running;
    /// `false` escalates to forced recovery.
    pub proactive_log_dump: bool,
}

/// Why recovery (or a log flush) was requested.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RecoveryReason {
    PoolExhausted,
    ActiveListTimeout,
    Custom(u8),
}

impl RecoveryReason {
    const POOL_EXHAUSTED_CODE: u8 = 0x01;
    const ACTIVE_LIST_TIMEOUT_CODE: u8 = 0x02;

    /// Encodes the reason into its transport discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            RecoveryReason::PoolExhausted => Self::POOL_EXHAUSTED_CODE,
            RecoveryReason::ActiveListTimeout => Self::ACTIVE_LIST_TIMEOUT_CODE,
            RecoveryReason::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant; unknown codes come back as `Custom`.
    #[must_use]
    pub const fn from_raw(code: u8) -> Self {
        match code {
            Self::POOL_EXHAUSTED_CODE => RecoveryReason::PoolExhausted,
            Self::ACTIVE_LIST_TIMEOUT_CODE => RecoveryReason::ActiveListTimeout,
            other => RecoveryReason::Custom(other),
        }
    }

    #[must_use]
    pub const fn is_custom(self) -> bool {
        matches!(self, RecoveryReason::Custom(_))
    }
}

impl fmt::Display for RecoveryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryReason::PoolExhausted => f.write_str("pool-exhausted"),
            RecoveryReason::ActiveListTimeout => f.write_str("active-list-timeout"),
            RecoveryReason::Custom(code) => write!(f, "custom({code:#04x})"),
        }
    }
}

/// Snapshot of one in-flight command, handed to the dump hook.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CommandDiagnostic {
    pub handle: CommandHandle,
    pub kind: CommandKind,
    pub session: SessionId,
    pub cmd_id: u32,
    pub queue: QueueKind,
}

impl fmt::Display for CommandDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = match self.queue {
            QueueKind::Pending => "pending",
            QueueKind::Active => "active",
        };
        write!(
            f,
            "{} {} on {} (cmd_id={:#010x}, {})",
            self.handle, self.kind, self.session, self.cmd_id, queue
        )
    }
}

/// Host hook the exhaustion walk reports through.
pub trait FaultHandler {
    /// Called once per blocking-class command found on the lists.
    fn dump_command(&mut self, diagnostic: &CommandDiagnostic);

    /// Flush buffered logs to the host transport; the engine keeps running.
    fn flush_logs(&mut self, reason: RecoveryReason);

    /// Escalate to forced subsystem recovery.
    fn trigger_recovery(&mut self, reason: RecoveryReason);
}

/// Handler that swallows every report.
#[derive(Debug, Default)]
pub struct NoopFaultHandler;

impl FaultHandler for NoopFaultHandler {
    fn dump_command(&mut self, _diagnostic: &CommandDiagnostic) {}

    fn flush_logs(&mut self, _reason: RecoveryReason) {}

    fn trigger_recovery(&mut self, _reason: RecoveryReason) {}
}
