//! Session state machine.
//!
//! Replies depend only on the command code, the configuration and the
//! simulated time. The phase is tracked so tests and logs can follow the
//! session, but it never gates a reply: the emulated device answers
//! out-of-order commands, including the `0xBB` bypass.

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};
use wateremu_protocol::{
    cost, epilogue_started_replies, key_auth_reply, prologue_ended_reply,
    prologue_started_reply, Cost, FirmwareVariant, Frame, FrameCodec, Reply, Tariff,
    TimestampEncoder, Volume, CMD_END_EPILOGUE, CMD_END_PROLOGUE, CMD_KEY_AUTH, CMD_OFFLINEBOMB,
    CMD_START_EPILOGUE, CMD_START_PROLOGUE, REPLY_PAYLOAD_LEN,
};

use crate::config::MeterConfig;
use crate::error::ConfigError;

// ============================================================================
// Session Phase
// ============================================================================

/// Phase of the metered usage session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// No command seen since the link came up.
    #[default]
    Idle,
    /// Key authentication answered.
    Authenticating,
    /// Usage started.
    PrologueStarted,
    /// Usage stop requested.
    EpilogueStarted,
    /// Billing field sent.
    PrologueEnded,
    /// The app expects the link to drop.
    Disconnecting,
}

// ============================================================================
// Dispatch Table
// ============================================================================

type Handler = fn(&mut Session) -> Vec<Frame>;

/// One entry of the dispatch table.
struct Route {
    code: u8,
    name: &'static str,
    handler: Handler,
    /// Phases the genuine firmware accepts this command in.
    expected_from: &'static [SessionPhase],
    next: SessionPhase,
}

const ANY_PHASE: &[SessionPhase] = &[
    SessionPhase::Idle,
    SessionPhase::Authenticating,
    SessionPhase::PrologueStarted,
    SessionPhase::EpilogueStarted,
    SessionPhase::PrologueEnded,
    SessionPhase::Disconnecting,
];

const ROUTES: &[Route] = &[
    Route {
        code: CMD_KEY_AUTH,
        name: "key authentication",
        handler: Session::on_key_auth,
        expected_from: &[SessionPhase::Idle],
        next: SessionPhase::Authenticating,
    },
    Route {
        code: CMD_START_PROLOGUE,
        name: "start prologue",
        handler: Session::on_start_prologue,
        expected_from: &[SessionPhase::Idle, SessionPhase::Authenticating],
        next: SessionPhase::PrologueStarted,
    },
    Route {
        code: CMD_START_EPILOGUE,
        name: "start epilogue",
        handler: Session::on_start_epilogue,
        expected_from: &[SessionPhase::PrologueStarted],
        next: SessionPhase::EpilogueStarted,
    },
    Route {
        code: CMD_OFFLINEBOMB,
        name: "start epilogue (Offlinebomb)",
        handler: Session::on_start_epilogue,
        expected_from: ANY_PHASE,
        next: SessionPhase::EpilogueStarted,
    },
    Route {
        code: CMD_END_PROLOGUE,
        name: "end prologue",
        handler: Session::on_end_prologue,
        expected_from: &[SessionPhase::EpilogueStarted],
        next: SessionPhase::PrologueEnded,
    },
    Route {
        code: CMD_END_EPILOGUE,
        name: "end epilogue",
        handler: Session::on_end_epilogue,
        expected_from: &[SessionPhase::PrologueEnded],
        next: SessionPhase::Disconnecting,
    },
];

fn route(code: u8) -> Option<&'static Route> {
    ROUTES.iter().find(|route| route.code == code)
}

// ============================================================================
// Session
// ============================================================================

/// Counters kept for the lifetime of a session object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames dispatched to a handler.
    pub frames_handled: u32,
    /// Frames dropped before dispatch (decode errors, unknown commands).
    pub frames_dropped: u32,
    /// Commands that arrived in a phase the genuine firmware rejects.
    pub out_of_order: u32,
    /// Reply frames produced.
    pub replies_sent: u32,
}

/// The single emulated metering session.
#[derive(Debug, Clone)]
pub struct Session {
    codec: FrameCodec,
    tariff: Tariff,
    firmware: FirmwareVariant,
    timestamp: TimestampEncoder,
    simulated_time: NaiveDateTime,
    meter_tally: Volume,
    session_volume: Volume,
    auth_reply: Option<[u8; REPLY_PAYLOAD_LEN]>,
    disconnect_on_end: bool,

    phase: SessionPhase,
    disconnect_requested: bool,
    last_cost: Option<Cost>,
    stats: SessionStats,
}

impl Session {
    /// Create a session in [`SessionPhase::Idle`].
    pub fn new(config: &MeterConfig) -> Result<Self, ConfigError> {
        Ok(Session {
            codec: FrameCodec::new(config.length_field),
            tariff: config.tariff,
            firmware: config.firmware,
            timestamp: config.timestamp,
            simulated_time: config.simulated_time,
            meter_tally: config.meter_tally_volume()?,
            session_volume: config.session_volume()?,
            auth_reply: config.auth_reply_bytes()?,
            disconnect_on_end: config.disconnect_on_end,
            phase: SessionPhase::Idle,
            disconnect_requested: false,
            last_cost: None,
            stats: SessionStats::default(),
        })
    }

    /// The codec matching this session's length policy.
    pub fn codec(&self) -> FrameCodec {
        self.codec
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Cost computed by the last end of prologue, if any.
    pub fn last_cost(&self) -> Option<Cost> {
        self.last_cost
    }

    /// Session counters.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Return to [`SessionPhase::Idle`], as on link loss.
    pub fn reset(&mut self) {
        if self.phase != SessionPhase::Idle {
            debug!("Session: reset from {:?}", self.phase);
        }
        self.phase = SessionPhase::Idle;
        self.disconnect_requested = false;
        self.last_cost = None;
    }

    /// Whether the session wants the link closed. Clears the request.
    pub fn take_disconnect_request(&mut self) -> bool {
        std::mem::take(&mut self.disconnect_requested)
    }

    /// Answer a decoded command frame and advance the phase.
    ///
    /// Returns zero, one or two reply frames in send order. Unknown commands
    /// are dropped without a reply.
    pub fn handle(&mut self, frame: &Frame) -> Vec<Frame> {
        let Some(route) = route(frame.code) else {
            debug!("Session: ignoring unknown command 0x{:02X}", frame.code);
            self.stats.frames_dropped += 1;
            return Vec::new();
        };

        if !route.expected_from.contains(&self.phase) {
            self.stats.out_of_order += 1;
            debug!(
                "Session: {} (0x{:02X}) out of order in {:?}, answering anyway",
                route.name, route.code, self.phase
            );
        }

        let replies = (route.handler)(self);
        debug!(
            "Session: {} (0x{:02X}) {:?} -> {:?}, {} reply frame(s)",
            route.name,
            route.code,
            self.phase,
            route.next,
            replies.len()
        );

        self.phase = route.next;
        self.stats.frames_handled += 1;
        self.stats.replies_sent += replies.len() as u32;
        replies
    }

    /// Decode a raw write, answer it, and encode the replies.
    ///
    /// Decode errors drop the write: no reply, phase unchanged.
    pub fn on_write(&mut self, raw: &[u8]) -> Vec<Vec<u8>> {
        match self.codec.decode(raw) {
            Ok(frame) => {
                let codec = self.codec;
                self.handle(&frame)
                    .iter()
                    .map(|reply| codec.encode_frame(reply))
                    .collect()
            }
            Err(e) => {
                warn!("Session: dropping frame {}: {}", hex::encode_upper(raw), e);
                self.stats.frames_dropped += 1;
                Vec::new()
            }
        }
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    fn encoded_time(&self) -> [u8; 6] {
        self.timestamp.encode(&self.simulated_time)
    }

    fn on_key_auth(&mut self) -> Vec<Frame> {
        let reply = key_auth_reply(self.auth_reply.as_ref());
        vec![unverified_warning(reply)]
    }

    fn on_start_prologue(&mut self) -> Vec<Frame> {
        let reply = prologue_started_reply(self.firmware, self.encoded_time());
        vec![unverified_warning(reply)]
    }

    fn on_start_epilogue(&mut self) -> Vec<Frame> {
        epilogue_started_replies(self.meter_tally).to_vec()
    }

    fn on_end_prologue(&mut self) -> Vec<Frame> {
        let billed = cost(self.session_volume, self.tariff);
        info!(
            "Session: billing {} volume units at tariff {} = {}",
            self.session_volume.raw(),
            self.tariff,
            billed
        );
        self.last_cost = Some(billed);
        vec![prologue_ended_reply(self.encoded_time(), self.session_volume)]
    }

    fn on_end_epilogue(&mut self) -> Vec<Frame> {
        if self.disconnect_on_end {
            self.disconnect_requested = true;
        } else {
            debug!("Session: end of epilogue, leaving the disconnect to the app");
        }
        Vec::new()
    }
}

fn unverified_warning(reply: Reply) -> Frame {
    if !reply.verified {
        warn!(
            "Session: reply 0x{:02X} uses a captured payload known to be malformed",
            reply.frame.code
        );
    }
    reply.frame
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wateremu_protocol::{
        KEY_AUTH_PAYLOAD, RESP_EPILOGUE_STARTED, RESP_EPILOGUE_STATUS, RESP_KEY_AUTH,
        RESP_PROLOGUE_ENDED, RESP_PROLOGUE_STARTED, RESP_PROLOGUE_STARTED_NEW,
    };

    fn session() -> Session {
        Session::new(&MeterConfig::default()).expect("default config is valid")
    }

    fn command(code: u8) -> Frame {
        Frame::new(code, vec![0x00, 0x00])
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = session();
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.stats(), SessionStats::default());
        assert!(session.last_cost().is_none());
    }

    #[test]
    fn test_legitimate_sequence() {
        let mut session = session();
        let steps = [
            (CMD_KEY_AUTH, vec![RESP_KEY_AUTH], SessionPhase::Authenticating),
            (CMD_START_PROLOGUE, vec![RESP_PROLOGUE_STARTED], SessionPhase::PrologueStarted),
            (
                CMD_START_EPILOGUE,
                vec![RESP_EPILOGUE_STARTED, RESP_EPILOGUE_STATUS],
                SessionPhase::EpilogueStarted,
            ),
            (CMD_END_PROLOGUE, vec![RESP_PROLOGUE_ENDED], SessionPhase::PrologueEnded),
            (CMD_END_EPILOGUE, vec![], SessionPhase::Disconnecting),
        ];

        for (code, reply_codes, phase) in steps {
            let replies = session.handle(&command(code));
            let codes: Vec<u8> = replies.iter().map(|f| f.code).collect();
            assert_eq!(codes, reply_codes, "replies to 0x{:02X}", code);
            assert_eq!(session.phase(), phase);
        }

        let stats = session.stats();
        assert_eq!(stats.frames_handled, 5);
        assert_eq!(stats.out_of_order, 0);
        assert_eq!(stats.replies_sent, 5);
    }

    #[test]
    fn test_key_auth_uses_configured_reply() {
        let config = MeterConfig {
            auth_reply: Some("00112233445566778899AABBCCDDEEFF".to_string()),
            ..MeterConfig::default()
        };
        let mut session = Session::new(&config).expect("valid config");

        let replies = session.on_write(&[0xFE, 0xFE, 0x09, CMD_KEY_AUTH]);
        assert_eq!(replies.len(), 1);
        assert_eq!(
            replies[0],
            vec![
                0xFD, 0xFD, 0x09, RESP_KEY_AUTH, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77,
                0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF,
            ]
        );
        assert_eq!(session.phase(), SessionPhase::Authenticating);

        // Without an override the captured payload goes out.
        let captured = self::session().handle(&command(CMD_KEY_AUTH));
        assert_eq!(captured[0].payload, KEY_AUTH_PAYLOAD.to_vec());
    }

    #[test]
    fn test_prologue_reply_is_deterministic() {
        let mut first = session();
        let mut second = session();
        let a = first.handle(&command(CMD_START_PROLOGUE));
        let b = second.handle(&command(CMD_START_PROLOGUE));
        assert_eq!(a, b);
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].code, RESP_PROLOGUE_STARTED);
        assert_eq!(a[0].payload.len(), 16);
    }

    #[test]
    fn test_new_firmware_prologue() {
        let config = MeterConfig {
            firmware: FirmwareVariant::New,
            ..MeterConfig::default()
        };
        let mut session = Session::new(&config).expect("valid config");
        let replies = session.handle(&command(CMD_START_PROLOGUE));
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].code, RESP_PROLOGUE_STARTED_NEW);
        assert_eq!(session.phase(), SessionPhase::PrologueStarted);
    }

    #[test]
    fn test_offlinebomb_matches_epilogue() {
        let mut normal = session();
        normal.handle(&command(CMD_START_PROLOGUE));
        let expected = normal.handle(&command(CMD_START_EPILOGUE));

        // Straight from Idle, skipping the prologue.
        let mut bypass = session();
        let replies = bypass.handle(&command(CMD_OFFLINEBOMB));
        assert_eq!(replies, expected);
        assert_eq!(bypass.phase(), SessionPhase::EpilogueStarted);
        assert_eq!(bypass.stats().out_of_order, 0);
    }

    #[test]
    fn test_out_of_order_is_answered() {
        let mut session = session();
        let replies = session.handle(&command(CMD_END_PROLOGUE));
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].code, RESP_PROLOGUE_ENDED);
        assert_eq!(session.phase(), SessionPhase::PrologueEnded);
        assert_eq!(session.stats().out_of_order, 1);

        let replies = session.handle(&command(CMD_START_EPILOGUE));
        assert_eq!(replies.len(), 2);
        assert_eq!(session.stats().out_of_order, 2);
    }

    #[test]
    fn test_end_prologue_bills_session_volume() {
        let config = MeterConfig {
            session_volume: 0xB2,
            ..MeterConfig::default()
        };
        let mut session = Session::new(&config).expect("valid config");
        let replies = session.handle(&command(CMD_END_PROLOGUE));
        assert_eq!(&replies[0].payload[13..], &[0xB2, 0x00, 0x00]);
        assert_eq!(session.last_cost().map(|c| c.to_string()), Some("0.45".to_string()));
    }

    #[test]
    fn test_end_epilogue_without_disconnect() {
        let mut session = session();
        assert!(session.handle(&command(CMD_END_EPILOGUE)).is_empty());
        assert_eq!(session.phase(), SessionPhase::Disconnecting);
        assert!(!session.take_disconnect_request());
    }

    #[test]
    fn test_end_epilogue_requests_disconnect() {
        let config = MeterConfig {
            disconnect_on_end: true,
            ..MeterConfig::default()
        };
        let mut session = Session::new(&config).expect("valid config");
        assert!(session.handle(&command(CMD_END_EPILOGUE)).is_empty());
        assert!(session.take_disconnect_request());
        // The request is consumed.
        assert!(!session.take_disconnect_request());
    }

    #[test]
    fn test_unknown_command_dropped() {
        let mut session = session();
        session.handle(&command(CMD_START_PROLOGUE));
        assert!(session.handle(&command(0x42)).is_empty());
        assert_eq!(session.phase(), SessionPhase::PrologueStarted);
        assert_eq!(session.stats().frames_dropped, 1);
    }

    #[test]
    fn test_on_write_decode_errors_keep_phase() {
        let mut session = session();
        session.handle(&command(CMD_START_PROLOGUE));

        assert!(session.on_write(&[0xFE, 0xFE, 0x09]).is_empty());
        assert!(session.on_write(&[0xAA, 0xBB, 0x09, 0xB2]).is_empty());
        assert!(session.on_write(&[0xFE, 0xFE, 0x01, 0xB2]).is_empty());

        assert_eq!(session.phase(), SessionPhase::PrologueStarted);
        assert_eq!(session.stats().frames_dropped, 3);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut session = session();
        session.handle(&command(CMD_OFFLINEBOMB));
        session.handle(&command(CMD_END_PROLOGUE));
        assert!(session.last_cost().is_some());

        session.reset();
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.last_cost().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MeterConfig {
            session_volume: u32::MAX,
            ..MeterConfig::default()
        };
        assert!(matches!(
            Session::new(&config),
            Err(ConfigError::VolumeOutOfRange { field: "session_volume", .. })
        ));
    }
}
