use std::cell::RefCell;
use std::convert::Infallible;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant as HostInstant};

use sme_core::command::{
    AntennaModeRequest, CommandPayload, DeleteStaSessionRequest, DualMacConfigRequest,
    HwModeRequest, NssUpdateRequest, RoamRequest, SessionId, TrafficStreamRequest,
    WmStatusChangeRequest,
};
use sme_core::dispatch::{CommandSink, TrafficStreamOp};
use sme_core::engine::{BridgeError, Engine};
use sme_core::fault::{CommandDiagnostic, FaultHandler, FaultPolicy, RecoveryReason};
use sme_core::response::{
    AntennaModeResponse, CompletionOutcome, DualMacConfigResponse, FwStatus, HwModeResponse,
    NssUpdateResponse, ResponseMessage,
};
use sme_core::serializer::{
    Admission, CallbackReason, CancelRequest, SerializedRequest, Serializer,
};
use sme_core::shell::{self, ShellOutcome};

const POOL_DEPTH: usize = 8;
const STATUS_EVENT_WINDOW: usize = 8;

type Completion = Box<dyn FnOnce(CompletionOutcome)>;
type HostEngine = Engine<Completion, HostInstant, POOL_DEPTH>;
type Outbox = Rc<RefCell<Vec<String>>>;

pub const HELP_BANNER: &str =
    "Shell lines queue commands through the pool; the built-in firmware model \
     answers every dispatched command immediately.";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    HwMode,
    DualMac,
    Nss,
}

impl TranscriptProfile {
    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::HwMode => "transcripts/emulator-hwmode.log",
            TranscriptProfile::DualMac => "transcripts/emulator-dualmac.log",
            TranscriptProfile::Nss => "transcripts/emulator-nss.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::HwMode => "SME host emulator hw-mode transcript",
            TranscriptProfile::DualMac => "SME host emulator dual-mac transcript",
            TranscriptProfile::Nss => "SME host emulator nss transcript",
        }
    }

    /// Picks the profile from the command line. Accepts a bare tag,
    /// `--profile <tag>`, or `--profile=<tag>`; no arguments selects the
    /// hw-mode profile.
    pub fn from_args<I>(mut args: I) -> Result<Self, String>
    where
        I: Iterator<Item = String>,
    {
        let Some(first) = args.next() else {
            return Ok(Self::HwMode);
        };
        if let Some(value) = first.strip_prefix("--profile=") {
            Self::from_tag(value)
        } else if first == "--profile" {
            match args.next() {
                Some(value) => Self::from_tag(&value),
                None => Err("Expected value after --profile".to_string()),
            }
        } else {
            Self::from_tag(&first)
        }
    }

    fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("hwmode") {
            Ok(Self::HwMode)
        } else if tag.eq_ignore_ascii_case("dualmac") {
            Ok(Self::DualMac)
        } else if tag.eq_ignore_ascii_case("nss") {
            Ok(Self::Nss)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }
}

pub struct Session {
    engine: HostEngine,
    serializer: HostSerializer,
    sink: HostSink,
    faults: HostFaults,
    outbox: Outbox,
    transcript: TranscriptLogger,
    started_at: HostInstant,
}

impl Session {
    pub fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(profile)?;
        let outbox: Outbox = Rc::new(RefCell::new(Vec::new()));

        Ok(Self {
            engine: HostEngine::new(FaultPolicy::default()),
            serializer: HostSerializer::default(),
            sink: HostSink {
                outbox: Rc::clone(&outbox),
            },
            faults: HostFaults {
                outbox: Rc::clone(&outbox),
            },
            outbox,
            transcript,
            started_at: HostInstant::now(),
        })
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let now = HostInstant::now();
        let completion = self.completion();
        match shell::execute(
            trimmed,
            &mut self.engine,
            &mut self.serializer,
            &mut self.sink,
            &mut self.faults,
            completion,
            now,
        ) {
            Ok(ShellOutcome::Queued(ack)) => {
                self.push(format!(
                    "OK {kind} queued cmd-id={id:#010x} admission={admission}",
                    kind = ack.kind,
                    id = ack.cmd_id,
                    admission = admission_label(ack.admission),
                ));
                self.pump();
            }
            Ok(ShellOutcome::Status(report)) => {
                self.push(format!("pool: {}", report.census));
                match report.active_head {
                    Some(kind) => self.push(format!("active head: {kind}")),
                    None => self.push("active head: none".to_string()),
                }
                self.push(format!("capacity: {}", report.capacity));
                self.push_event_trail();
            }
            Ok(ShellOutcome::Help(text)) => {
                self.push(HELP_BANNER.to_string());
                self.push(text.to_string());
            }
            Err(err) => self.push(format!("ERR {err}")),
        }

        let lines: Vec<String> = self.outbox.borrow_mut().drain(..).collect();
        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    /// Answers the Active head with a canned firmware reply and promotes the
    /// next Pending command, until both lists drain.
    fn pump(&mut self) {
        while let Some(handle) = self.engine.active_head() {
            let Ok(slot) = self.engine.command(handle) else {
                break;
            };
            let kind = slot.kind();
            let session = slot.session();
            let payload = *slot.payload();

            let Some(message) = canned_response(session, &payload) else {
                self.push(format!("firmware: no reply modeled for {kind}"));
                break;
            };
            self.push(format!("FW  < {kind} reply status={}", FwStatus::Ok));

            let now = HostInstant::now();
            if let Err(err) = self.engine.handle_response(&message, now) {
                self.push(format!("ERR {err}"));
                break;
            }
            self.serializer.busy = false;

            let next = self.engine.pending_handles().next();
            let Some(next) = next else {
                break;
            };
            self.serializer.busy = true;
            if let Err(BridgeError::Engine(err)) = self.engine.serializer_event(
                next,
                CallbackReason::Activate,
                &mut self.sink,
                HostInstant::now(),
            ) {
                self.push(format!("ERR {err}"));
                break;
            }
        }
    }

    fn completion(&self) -> Completion {
        let outbox = Rc::clone(&self.outbox);
        Box::new(move |outcome| outbox.borrow_mut().push(describe_outcome(&outcome)))
    }

    fn push(&self, line: String) {
        self.outbox.borrow_mut().push(line);
    }

    fn push_event_trail(&self) {
        let events: Vec<String> = self
            .engine
            .events()
            .oldest_first()
            .map(|event| {
                let offset = event.timestamp.duration_since(self.started_at);
                format!("  [+{:>6} ms] #{} {}", offset.as_millis(), event.id, event.kind)
            })
            .collect();
        let skip = events.len().saturating_sub(STATUS_EVENT_WINDOW);
        self.push(format!("recent events ({}):", events.len() - skip));
        for line in events.into_iter().skip(skip) {
            self.push(line);
        }
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

/// One-deep serialization scheduler: the first request is admitted Active and
/// later requests queue until the session promotes them.
#[derive(Default)]
struct HostSerializer {
    busy: bool,
}

impl Serializer for HostSerializer {
    type Error = Infallible;

    fn request(&mut self, _request: SerializedRequest) -> Result<Admission, Self::Error> {
        if self.busy {
            Ok(Admission::Pending)
        } else {
            self.busy = true;
            Ok(Admission::Active)
        }
    }

    fn cancel(&mut self, _request: CancelRequest) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Dispatch target that narrates each firmware-bound command.
struct HostSink {
    outbox: Outbox,
}

impl HostSink {
    fn narrate(&self, line: String) {
        self.outbox.borrow_mut().push(line);
    }
}

impl CommandSink for HostSink {
    type Error = Infallible;

    fn process_set_hw_mode(
        &mut self,
        session: SessionId,
        request: &HwModeRequest,
    ) -> Result<(), Self::Error> {
        self.narrate(format!(
            "FW  > set-hw-mode session={session} index={}",
            request.hw_mode_index
        ));
        Ok(())
    }

    fn process_nss_update(
        &mut self,
        session: SessionId,
        request: &NssUpdateRequest,
    ) -> Result<(), Self::Error> {
        self.narrate(format!(
            "FW  > nss-update session={session} nss={}",
            request.nss
        ));
        Ok(())
    }

    fn process_dual_mac_config(
        &mut self,
        session: SessionId,
        request: &DualMacConfigRequest,
    ) -> Result<(), Self::Error> {
        self.narrate(format!(
            "FW  > dual-mac-config session={session} scan={} fw={}",
            request.scan_config, request.fw_mode_config
        ));
        Ok(())
    }

    fn process_antenna_mode(
        &mut self,
        session: SessionId,
        request: &AntennaModeRequest,
    ) -> Result<(), Self::Error> {
        self.narrate(format!(
            "FW  > antenna-mode session={session} tx={} rx={}",
            request.tx_chains, request.rx_chains
        ));
        Ok(())
    }

    fn process_roam(
        &mut self,
        session: SessionId,
        request: &RoamRequest,
    ) -> Result<(), Self::Error> {
        self.narrate(format!(
            "FW  > roam session={session} reason={:?}",
            request.reason
        ));
        Ok(())
    }

    fn process_wm_status_change(
        &mut self,
        session: SessionId,
        request: &WmStatusChangeRequest,
    ) -> Result<(), Self::Error> {
        self.narrate(format!(
            "FW  > wm-status-change session={session} change={:?} peer={}",
            request.change, request.peer
        ));
        Ok(())
    }

    fn process_delete_sta_session(
        &mut self,
        session: SessionId,
        request: &DeleteStaSessionRequest,
    ) -> Result<(), Self::Error> {
        self.narrate(format!(
            "FW  > delete-sta-session session={session} peer={}",
            request.peer
        ));
        Ok(())
    }

    fn process_traffic_stream(
        &mut self,
        session: SessionId,
        op: TrafficStreamOp,
        request: &TrafficStreamRequest,
    ) -> Result<(), Self::Error> {
        let label = match op {
            TrafficStreamOp::Add => "add-ts",
            TrafficStreamOp::Delete => "del-ts",
        };
        self.narrate(format!(
            "FW  > {label} session={session} tspec={} direction={:?}",
            request.tspec_id, request.direction
        ));
        Ok(())
    }
}

/// Fault handler that narrates dumps and escalations instead of resetting
/// anything.
struct HostFaults {
    outbox: Outbox,
}

impl FaultHandler for HostFaults {
    fn dump_command(&mut self, diagnostic: &CommandDiagnostic) {
        self.outbox
            .borrow_mut()
            .push(format!("FAULT dump {diagnostic}"));
    }

    fn flush_logs(&mut self, reason: RecoveryReason) {
        self.outbox
            .borrow_mut()
            .push(format!("FAULT flush-logs reason={reason}"));
    }

    fn trigger_recovery(&mut self, reason: RecoveryReason) {
        self.outbox
            .borrow_mut()
            .push(format!("FAULT recovery reason={reason}"));
    }
}

fn admission_label(admission: Admission) -> &'static str {
    match admission {
        Admission::Active => "active",
        Admission::Pending => "pending",
    }
}

fn describe_outcome(outcome: &CompletionOutcome) -> String {
    match outcome {
        CompletionOutcome::HwMode(outcome) => format!(
            "DONE hwmode status={} index={} session={}",
            outcome.status, outcome.cfgd_hw_mode_index, outcome.session
        ),
        CompletionOutcome::HwModeTransition(outcome) => format!(
            "DONE hwmode-transition {} -> {} session={}",
            outcome.old_hw_mode_index, outcome.new_hw_mode_index, outcome.session
        ),
        CompletionOutcome::DualMacConfig(outcome) => format!(
            "DONE dualmac status={} scan={} fw={}",
            outcome.status, outcome.scan_config, outcome.fw_mode_config
        ),
        CompletionOutcome::AntennaMode(outcome) => format!(
            "DONE antenna status={} tx={} rx={}",
            outcome.status, outcome.tx_chains, outcome.rx_chains
        ),
        CompletionOutcome::NssUpdate(outcome) => format!(
            "DONE nss status={} session={} nss={}",
            outcome.status, outcome.session, outcome.nss
        ),
    }
}

/// Builds the firmware reply the emulated target answers a dispatched command
/// with. Commands whose real responses arrive on other paths get no model.
fn canned_response(session: SessionId, payload: &CommandPayload) -> Option<ResponseMessage> {
    match payload {
        CommandPayload::SetHwMode(request) => Some(ResponseMessage::HwMode(HwModeResponse {
            status: FwStatus::Ok,
            cfgd_hw_mode_index: request.hw_mode_index,
            vdev_mac_map: heapless::Vec::new(),
        })),
        CommandPayload::SetDualMacConfig(_) => Some(ResponseMessage::DualMacConfig(
            DualMacConfigResponse {
                status: FwStatus::Ok,
            },
        )),
        CommandPayload::SetAntennaMode(_) => {
            Some(ResponseMessage::AntennaMode(AntennaModeResponse {
                status: FwStatus::Ok,
            }))
        }
        CommandPayload::NssUpdate(_) => Some(ResponseMessage::NssUpdate(NssUpdateResponse {
            status: FwStatus::Ok,
            session,
        })),
        _ => None,
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
