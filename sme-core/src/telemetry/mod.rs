//! Engine event catalog and the in-memory diagnostics ring.
//!
//! Every lifecycle step the engine takes is recorded as a strongly typed
//! event with a compact numeric code for transport over diagnostics
//! channels. Hosts drain the ring to their own logging transport; the
//! engine itself never performs IO.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::command::{CommandKind, SessionId};
use crate::fault::RecoveryReason;
use crate::pool::ListCensus;

/// Total number of event records retained in memory.
pub const EVENT_LOG_CAPACITY: usize = 64;

/// Monotonic identifier assigned to each recorded event.
pub type EventId = u32;

/// Discriminated engine lifecycle events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EngineEventKind {
    Acquired,
    Queued(CommandKind),
    Activated(CommandKind),
    Completed(CommandKind),
    Cancelled(CommandKind),
    Released(CommandKind),
    ActiveTimeout(CommandKind),
    PoolExhausted,
    ActiveHeadStuck(CommandKind),
    PendingBacklog(CommandKind),
    KindMismatch,
    ResponseDropped,
    RecoveryRequested,
    SerializerRejected,
    DispatchFailed(CommandKind),
    Custom(u16),
}

impl EngineEventKind {
    const ACQUIRED_CODE: u16 = 0x0000;
    const QUEUED_BASE: u16 = 0x0010;
    const ACTIVATED_BASE: u16 = 0x0020;
    const COMPLETED_BASE: u16 = 0x0030;
    const CANCELLED_BASE: u16 = 0x0040;
    const RELEASED_BASE: u16 = 0x0050;
    const ACTIVE_TIMEOUT_BASE: u16 = 0x0060;
    const POOL_EXHAUSTED_CODE: u16 = 0x0070;
    const ACTIVE_HEAD_STUCK_BASE: u16 = 0x0080;
    const PENDING_BACKLOG_BASE: u16 = 0x0090;
    const KIND_MISMATCH_CODE: u16 = 0x00A0;
    const RESPONSE_DROPPED_CODE: u16 = 0x00A1;
    const RECOVERY_REQUESTED_CODE: u16 = 0x00A2;
    const SERIALIZER_REJECTED_CODE: u16 = 0x00A3;
    const DISPATCH_FAILED_BASE: u16 = 0x00B0;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            EngineEventKind::Acquired => Self::ACQUIRED_CODE,
            EngineEventKind::Queued(kind) => Self::QUEUED_BASE + kind_index(kind),
            EngineEventKind::Activated(kind) => Self::ACTIVATED_BASE + kind_index(kind),
            EngineEventKind::Completed(kind) => Self::COMPLETED_BASE + kind_index(kind),
            EngineEventKind::Cancelled(kind) => Self::CANCELLED_BASE + kind_index(kind),
            EngineEventKind::Released(kind) => Self::RELEASED_BASE + kind_index(kind),
            EngineEventKind::ActiveTimeout(kind) => Self::ACTIVE_TIMEOUT_BASE + kind_index(kind),
            EngineEventKind::PoolExhausted => Self::POOL_EXHAUSTED_CODE,
            EngineEventKind::ActiveHeadStuck(kind) => {
                Self::ACTIVE_HEAD_STUCK_BASE + kind_index(kind)
            }
            EngineEventKind::PendingBacklog(kind) => Self::PENDING_BACKLOG_BASE + kind_index(kind),
            EngineEventKind::KindMismatch => Self::KIND_MISMATCH_CODE,
            EngineEventKind::ResponseDropped => Self::RESPONSE_DROPPED_CODE,
            EngineEventKind::RecoveryRequested => Self::RECOVERY_REQUESTED_CODE,
            EngineEventKind::SerializerRejected => Self::SERIALIZER_REJECTED_CODE,
            EngineEventKind::DispatchFailed(kind) => Self::DISPATCH_FAILED_BASE + kind_index(kind),
            EngineEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`Custom`](Self::Custom).
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::ACQUIRED_CODE => EngineEventKind::Acquired,
            Self::POOL_EXHAUSTED_CODE => EngineEventKind::PoolExhausted,
            Self::KIND_MISMATCH_CODE => EngineEventKind::KindMismatch,
            Self::RESPONSE_DROPPED_CODE => EngineEventKind::ResponseDropped,
            Self::RECOVERY_REQUESTED_CODE => EngineEventKind::RecoveryRequested,
            Self::SERIALIZER_REJECTED_CODE => EngineEventKind::SerializerRejected,
            value if (Self::QUEUED_BASE..Self::ACTIVATED_BASE).contains(&value) => {
                kinded(value - Self::QUEUED_BASE, value, EngineEventKind::Queued)
            }
            value if (Self::ACTIVATED_BASE..Self::COMPLETED_BASE).contains(&value) => {
                kinded(value - Self::ACTIVATED_BASE, value, EngineEventKind::Activated)
            }
            value if (Self::COMPLETED_BASE..Self::CANCELLED_BASE).contains(&value) => {
                kinded(value - Self::COMPLETED_BASE, value, EngineEventKind::Completed)
            }
            value if (Self::CANCELLED_BASE..Self::RELEASED_BASE).contains(&value) => {
                kinded(value - Self::CANCELLED_BASE, value, EngineEventKind::Cancelled)
            }
            value if (Self::RELEASED_BASE..Self::ACTIVE_TIMEOUT_BASE).contains(&value) => {
                kinded(value - Self::RELEASED_BASE, value, EngineEventKind::Released)
            }
            value if (Self::ACTIVE_TIMEOUT_BASE..Self::POOL_EXHAUSTED_CODE).contains(&value) => {
                kinded(
                    value - Self::ACTIVE_TIMEOUT_BASE,
                    value,
                    EngineEventKind::ActiveTimeout,
                )
            }
            value if (Self::ACTIVE_HEAD_STUCK_BASE..Self::PENDING_BACKLOG_BASE).contains(&value) => {
                kinded(
                    value - Self::ACTIVE_HEAD_STUCK_BASE,
                    value,
                    EngineEventKind::ActiveHeadStuck,
                )
            }
            value if (Self::PENDING_BACKLOG_BASE..Self::KIND_MISMATCH_CODE).contains(&value) => {
                kinded(
                    value - Self::PENDING_BACKLOG_BASE,
                    value,
                    EngineEventKind::PendingBacklog,
                )
            }
            value
                if (Self::DISPATCH_FAILED_BASE..Self::DISPATCH_FAILED_BASE + 0x10)
                    .contains(&value) =>
            {
                kinded(
                    value - Self::DISPATCH_FAILED_BASE,
                    value,
                    EngineEventKind::DispatchFailed,
                )
            }
            other => EngineEventKind::Custom(other),
        }
    }
}

const fn kind_index(kind: CommandKind) -> u16 {
    kind.to_raw() as u16
}

fn kinded(
    offset: u16,
    raw: u16,
    wrap: impl FnOnce(CommandKind) -> EngineEventKind,
) -> EngineEventKind {
    match u8::try_from(offset).ok().and_then(CommandKind::from_raw) {
        Some(kind) => wrap(kind),
        None => EngineEventKind::Custom(raw),
    }
}

impl fmt::Display for EngineEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEventKind::Acquired => f.write_str("acquired"),
            EngineEventKind::Queued(kind) => write!(f, "queued {kind}"),
            EngineEventKind::Activated(kind) => write!(f, "activated {kind}"),
            EngineEventKind::Completed(kind) => write!(f, "completed {kind}"),
            EngineEventKind::Cancelled(kind) => write!(f, "cancelled {kind}"),
            EngineEventKind::Released(kind) => write!(f, "released {kind}"),
            EngineEventKind::ActiveTimeout(kind) => write!(f, "active-timeout {kind}"),
            EngineEventKind::PoolExhausted => f.write_str("pool-exhausted"),
            EngineEventKind::ActiveHeadStuck(kind) => write!(f, "active-head-stuck {kind}"),
            EngineEventKind::PendingBacklog(kind) => write!(f, "pending-backlog {kind}"),
            EngineEventKind::KindMismatch => f.write_str("kind-mismatch"),
            EngineEventKind::ResponseDropped => f.write_str("response-dropped"),
            EngineEventKind::RecoveryRequested => f.write_str("recovery-requested"),
            EngineEventKind::SerializerRejected => f.write_str("serializer-rejected"),
            EngineEventKind::DispatchFailed(kind) => write!(f, "dispatch-failed {kind}"),
            EngineEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

/// Per-command metadata attached to lifecycle events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CommandTrace {
    pub cmd_id: u32,
    pub session: SessionId,
}

/// Payloads carried alongside engine events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EventDetail {
    /// No additional metadata accompanies the event.
    None,
    /// Per-stage slot counts at the moment of the event.
    Census(ListCensus),
    /// Expected versus found stage or kind context for defects.
    Mismatch {
        expected: CommandKind,
        found: CommandKind,
    },
    /// Recovery escalation context.
    Recovery(RecoveryReason),
    /// Identity of the command the event refers to.
    Command(CommandTrace),
}

/// Engine event stored in the diagnostics ring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EngineEvent<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub kind: EngineEventKind,
    pub detail: EventDetail,
}

/// Records engine events into a fixed-size ring buffer.
pub struct EventLog<TInstant, const CAPACITY: usize = EVENT_LOG_CAPACITY>
where
    TInstant: Copy,
{
    ring: HistoryBuf<EngineEvent<TInstant>, CAPACITY>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> EventLog<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    /// Creates a new event log with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Records one event, returning the identifier assigned to it.
    pub fn record(
        &mut self,
        kind: EngineEventKind,
        detail: EventDetail,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(EngineEvent {
            id,
            timestamp,
            kind,
            detail,
        });

        id
    }

    /// Returns the most recent event, if any.
    pub fn latest(&self) -> Option<&EngineEvent<TInstant>> {
        self.ring.recent()
    }

    /// Returns an iterator over the retained events in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, EngineEvent<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the number of events currently retained.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no events are retained.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl<TInstant, const CAPACITY: usize> Default for EventLog<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    struct MockInstant(u64);

    #[test]
    fn event_codes_round_trip() {
        let fixtures = [
            EngineEventKind::Acquired,
            EngineEventKind::Queued(CommandKind::SetHwMode),
            EngineEventKind::Activated(CommandKind::Roam),
            EngineEventKind::Completed(CommandKind::NssUpdate),
            EngineEventKind::Cancelled(CommandKind::AddTs),
            EngineEventKind::Released(CommandKind::DelTs),
            EngineEventKind::ActiveTimeout(CommandKind::DeleteStaSession),
            EngineEventKind::PoolExhausted,
            EngineEventKind::ActiveHeadStuck(CommandKind::WmStatusChange),
            EngineEventKind::PendingBacklog(CommandKind::SetAntennaMode),
            EngineEventKind::KindMismatch,
            EngineEventKind::ResponseDropped,
            EngineEventKind::RecoveryRequested,
            EngineEventKind::SerializerRejected,
            EngineEventKind::DispatchFailed(CommandKind::SetDualMacConfig),
        ];

        for kind in fixtures {
            assert_eq!(EngineEventKind::from_raw(kind.to_raw()), kind);
        }

        // A kinded code with an offset past the kind table decodes as custom.
        assert_eq!(
            EngineEventKind::from_raw(0x001F),
            EngineEventKind::Custom(0x001F)
        );
    }

    #[test]
    fn log_assigns_monotonic_ids() {
        let mut log = EventLog::<MockInstant, 4>::new();
        assert!(log.is_empty());

        let first = log.record(
            EngineEventKind::Acquired,
            EventDetail::None,
            MockInstant(10),
        );
        let second = log.record(
            EngineEventKind::PoolExhausted,
            EventDetail::Census(ListCensus {
                free: 0,
                owned: 0,
                pending: 1,
                active: 3,
            }),
            MockInstant(20),
        );
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(log.len(), 2);
        assert_eq!(
            log.latest().map(|event| event.kind),
            Some(EngineEventKind::PoolExhausted)
        );
    }

    #[test]
    fn ring_overwrites_oldest_but_keeps_ids() {
        let mut log = EventLog::<MockInstant, 2>::new();
        for step in 0..3_u64 {
            log.record(
                EngineEventKind::Acquired,
                EventDetail::None,
                MockInstant(step),
            );
        }
        assert_eq!(log.len(), 2);

        let ids: heapless::Vec<EventId, 2> = log.oldest_first().map(|event| event.id).collect();
        assert_eq!(ids.as_slice(), [1, 2]);
    }
}
