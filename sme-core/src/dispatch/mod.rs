//! Dispatch table from activated commands to the processing layer.
//!
//! One trait method per command kind keeps the mapping exhaustive at the type
//! level; adding a kind without a handler fails to compile.

use core::convert::Infallible;
use core::fmt;

use crate::command::{
    AntennaModeRequest, CommandPayload, DeleteStaSessionRequest, DualMacConfigRequest,
    HwModeRequest, NssUpdateRequest, RoamRequest, SessionId, TrafficStreamRequest,
    WmStatusChangeRequest,
};

/// Whether a traffic-stream operation establishes or tears down the stream.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TrafficStreamOp {
    Add,
    Delete,
}

/// Processing layer an activated command is routed to.
///
/// Implementations must not call back into the engine; the execution slot is
/// released later through the scheduler's release-memory event.
pub trait CommandSink {
    type Error;

    fn process_set_hw_mode(
        &mut self,
        session: SessionId,
        request: &HwModeRequest,
    ) -> Result<(), Self::Error>;

    fn process_nss_update(
        &mut self,
        session: SessionId,
        request: &NssUpdateRequest,
    ) -> Result<(), Self::Error>;

    fn process_dual_mac_config(
        &mut self,
        session: SessionId,
        request: &DualMacConfigRequest,
    ) -> Result<(), Self::Error>;

    fn process_antenna_mode(
        &mut self,
        session: SessionId,
        request: &AntennaModeRequest,
    ) -> Result<(), Self::Error>;

    fn process_roam(&mut self, session: SessionId, request: &RoamRequest)
    -> Result<(), Self::Error>;

    fn process_wm_status_change(
        &mut self,
        session: SessionId,
        request: &WmStatusChangeRequest,
    ) -> Result<(), Self::Error>;

    fn process_delete_sta_session(
        &mut self,
        session: SessionId,
        request: &DeleteStaSessionRequest,
    ) -> Result<(), Self::Error>;

    fn process_traffic_stream(
        &mut self,
        session: SessionId,
        op: TrafficStreamOp,
        request: &TrafficStreamRequest,
    ) -> Result<(), Self::Error>;
}

/// Routing failure for an activated command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DispatchError<E> {
    /// An empty payload reached activation; the pool bookkeeping is corrupt.
    EmptySlot,
    /// The processing layer refused the command.
    Sink(E),
}

impl<E: fmt::Display> fmt::Display for DispatchError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::EmptySlot => f.write_str("empty payload reached dispatch"),
            DispatchError::Sink(err) => write!(f, "sink rejected command: {err}"),
        }
    }
}

/// Routes an activated payload to the matching sink entry point.
pub fn route<K: CommandSink>(
    sink: &mut K,
    session: SessionId,
    payload: &CommandPayload,
) -> Result<(), DispatchError<K::Error>> {
    match payload {
        CommandPayload::Empty => Err(DispatchError::EmptySlot),
        CommandPayload::SetHwMode(request) => sink
            .process_set_hw_mode(session, request)
            .map_err(DispatchError::Sink),
        CommandPayload::NssUpdate(request) => sink
            .process_nss_update(session, request)
            .map_err(DispatchError::Sink),
        CommandPayload::SetDualMacConfig(request) => sink
            .process_dual_mac_config(session, request)
            .map_err(DispatchError::Sink),
        CommandPayload::SetAntennaMode(request) => sink
            .process_antenna_mode(session, request)
            .map_err(DispatchError::Sink),
        CommandPayload::Roam(request) => sink
            .process_roam(session, request)
            .map_err(DispatchError::Sink),
        CommandPayload::WmStatusChange(request) => sink
            .process_wm_status_change(session, request)
            .map_err(DispatchError::Sink),
        CommandPayload::DeleteStaSession(request) => sink
            .process_delete_sta_session(session, request)
            .map_err(DispatchError::Sink),
        CommandPayload::AddTs(request) => sink
            .process_traffic_stream(session, TrafficStreamOp::Add, request)
            .map_err(DispatchError::Sink),
        CommandPayload::DelTs(request) => sink
            .process_traffic_stream(session, TrafficStreamOp::Delete, request)
            .map_err(DispatchError::Sink),
    }
}

/// Sink that accepts and discards every command.
#[derive(Debug, Default)]
pub struct NoopSink;

impl CommandSink for NoopSink {
    type Error = Infallible;

    fn process_set_hw_mode(
        &mut self,
        _session: SessionId,
        _request: &HwModeRequest,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    fn process_nss_update(
        &mut self,
        _session: SessionId,
        _request: &NssUpdateRequest,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    fn process_dual_mac_config(
        &mut self,
        _session: SessionId,
        _request: &DualMacConfigRequest,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    fn process_antenna_mode(
        &mut self,
        _session: SessionId,
        _request: &AntennaModeRequest,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    fn process_roam(
        &mut self,
        _session: SessionId,
        _request: &RoamRequest,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    fn process_wm_status_change(
        &mut self,
        _session: SessionId,
        _request: &WmStatusChangeRequest,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    fn process_delete_sta_session(
        &mut self,
        _session: SessionId,
        _request: &DeleteStaSessionRequest,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    fn process_traffic_stream(
        &mut self,
        _session: SessionId,
        _op: TrafficStreamOp,
        _request: &TrafficStreamRequest,
    ) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{RoamReason, TsDirection};

    #[derive(Default)]
    struct Recording {
        last: Option<(&'static str, u8)>,
    }

    impl CommandSink for Recording {
        type Error = ();

        fn process_set_hw_mode(
            &mut self,
            session: SessionId,
            _request: &HwModeRequest,
        ) -> Result<(), Self::Error> {
            self.last = Some(("hwmode", session.raw()));
            Ok(())
        }

        fn process_nss_update(
            &mut self,
            session: SessionId,
            _request: &NssUpdateRequest,
        ) -> Result<(), Self::Error> {
            self.last = Some(("nss", session.raw()));
            Ok(())
        }

        fn process_dual_mac_config(
            &mut self,
            session: SessionId,
            _request: &DualMacConfigRequest,
        ) -> Result<(), Self::Error> {
            self.last = Some(("dualmac", session.raw()));
            Ok(())
        }

        fn process_antenna_mode(
            &mut self,
            session: SessionId,
            _request: &AntennaModeRequest,
        ) -> Result<(), Self::Error> {
            self.last = Some(("antenna", session.raw()));
            Ok(())
        }

        fn process_roam(
            &mut self,
            session: SessionId,
            _request: &RoamRequest,
        ) -> Result<(), Self::Error> {
            self.last = Some(("roam", session.raw()));
            Err(())
        }

        fn process_wm_status_change(
            &mut self,
            session: SessionId,
            _request: &WmStatusChangeRequest,
        ) -> Result<(), Self::Error> {
            self.last = Some(("wmstatus", session.raw()));
            Ok(())
        }

        fn process_delete_sta_session(
            &mut self,
            session: SessionId,
            _request: &DeleteStaSessionRequest,
        ) -> Result<(), Self::Error> {
            self.last = Some(("delsta", session.raw()));
            Ok(())
        }

        fn process_traffic_stream(
            &mut self,
            session: SessionId,
            op: TrafficStreamOp,
            _request: &TrafficStreamRequest,
        ) -> Result<(), Self::Error> {
            let name = match op {
                TrafficStreamOp::Add => "addts",
                TrafficStreamOp::Delete => "delts",
            };
            self.last = Some((name, session.raw()));
            Ok(())
        }
    }

    #[test]
    fn payloads_reach_their_entry_point() {
        let mut sink = Recording::default();
        let session = SessionId::new(2);

        route(
            &mut sink,
            session,
            &CommandPayload::AddTs(TrafficStreamRequest {
                tspec_id: 1,
                direction: TsDirection::Downlink,
            }),
        )
        .unwrap();
        assert_eq!(sink.last, Some(("addts", 2)));

        route(
            &mut sink,
            session,
            &CommandPayload::NssUpdate(NssUpdateRequest {
                nss: 2,
                next_action: crate::command::PolicyNextAction::None,
            }),
        )
        .unwrap();
        assert_eq!(sink.last, Some(("nss", 2)));
    }

    #[test]
    fn empty_payload_is_a_hard_failure() {
        let mut sink = NoopSink;
        let result = route(&mut sink, SessionId::new(0), &CommandPayload::Empty);
        assert!(matches!(result, Err(DispatchError::EmptySlot)));
    }

    #[test]
    fn sink_errors_are_wrapped() {
        let mut sink = Recording::default();
        let result = route(
            &mut sink,
            SessionId::new(5),
            &CommandPayload::Roam(RoamRequest {
                reason: RoamReason::StopBss,
            }),
        );
        assert_eq!(result, Err(DispatchError::Sink(())));
        assert_eq!(sink.last, Some(("roam", 5)));
    }
}
