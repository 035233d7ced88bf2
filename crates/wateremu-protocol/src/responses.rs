//! Reply payloads the meter sends.
//!
//! The layouts were reverse-engineered from device traffic. Apart from the
//! timestamp, the volume tally and the billing field, every byte is an
//! opaque captured constant and is passed through unchanged.

use serde::{Deserialize, Serialize};

use crate::billing::Volume;
use crate::constants::*;
use crate::frame::Frame;

/// Size of every 16-byte reply payload.
pub const REPLY_PAYLOAD_LEN: usize = 16;

/// Captured key authentication reply. Known to be malformed.
pub const KEY_AUTH_PAYLOAD: [u8; REPLY_PAYLOAD_LEN] = [
    0x00, 0x00, 0x01, 0x02, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x10, 0x11,
    0x12,
];

/// Identifier block opening the old-firmware prologue reply.
pub const PROLOGUE_ID_BLOCK: [u8; 7] = [0x01, 0x42, 0x02, 0x00, 0x07, 0xE2, 0xEB];
/// Bytes following the timestamp in the old-firmware prologue reply.
pub const PROLOGUE_TRAILER: [u8; 3] = [0x00, 0x00, 0x00];

/// Captured new-firmware prologue reply. Known to be malformed.
pub const PROLOGUE_NEW_FIRMWARE_PAYLOAD: [u8; REPLY_PAYLOAD_LEN] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x10, 0x11,
    0x12,
];

/// Status bytes before the tally in the epilogue reply.
pub const EPILOGUE_HEAD: [u8; 6] = [0x01, 0x42, 0x09, 0x01, 0x00, 0x00];
/// Status bytes after the tally in the epilogue reply.
pub const EPILOGUE_TAIL: [u8; 3] = [0x02, 0x79, 0x32];

/// Status bytes before the tally in the epilogue status block.
pub const EPILOGUE_STATUS_HEAD: [u8; 3] = [0x07, 0x42, 0x0D];
/// Status and limit fields after the tally in the epilogue status block.
pub const EPILOGUE_STATUS_TAIL: [u8; 10] =
    [0x02, 0x79, 0x32, 0x00, 0x14, 0xB8, 0x10, 0x00, 0x00, 0x00];

/// Volume tally seen in captured epilogue replies.
pub const CAPTURED_TALLY: Volume = Volume::from_le_bytes([0x6D, 0x6C, 0x00]);

/// Status block opening the prologue-ended reply.
pub const PROLOGUE_ENDED_HEAD: [u8; 7] = [0x38, 0xBB, 0x02, 0x00, 0x70, 0xE2, 0xEB];

/// Which firmware generation to answer the prologue as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirmwareVariant {
    /// Fixed `0xB0` reply carrying the timestamp.
    #[default]
    Old,
    /// `0xAE` reply introduced by newer firmware.
    New,
}

/// A reply frame plus whether its payload is believed to be correct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The frame to notify.
    pub frame: Frame,
    /// `false` for captured payloads known not to satisfy the app.
    pub verified: bool,
}

/// Reply to [`CMD_KEY_AUTH`].
///
/// Without an override the captured payload is used and flagged unverified.
pub fn key_auth_reply(payload: Option<&[u8; REPLY_PAYLOAD_LEN]>) -> Reply {
    match payload {
        Some(payload) => Reply {
            frame: Frame::new(RESP_KEY_AUTH, payload.to_vec()),
            verified: true,
        },
        None => Reply {
            frame: Frame::new(RESP_KEY_AUTH, KEY_AUTH_PAYLOAD.to_vec()),
            verified: false,
        },
    }
}

/// Reply to [`CMD_START_PROLOGUE`].
pub fn prologue_started_reply(variant: FirmwareVariant, timestamp: [u8; 6]) -> Reply {
    match variant {
        FirmwareVariant::Old => {
            let mut payload = Vec::with_capacity(REPLY_PAYLOAD_LEN);
            payload.extend_from_slice(&PROLOGUE_ID_BLOCK);
            payload.extend_from_slice(&timestamp);
            payload.extend_from_slice(&PROLOGUE_TRAILER);
            Reply {
                frame: Frame::new(RESP_PROLOGUE_STARTED, payload),
                verified: true,
            }
        }
        FirmwareVariant::New => Reply {
            frame: Frame::new(
                RESP_PROLOGUE_STARTED_NEW,
                PROLOGUE_NEW_FIRMWARE_PAYLOAD.to_vec(),
            ),
            verified: false,
        },
    }
}

/// Replies to [`CMD_START_EPILOGUE`] and [`CMD_OFFLINEBOMB`], in send order.
pub fn epilogue_started_replies(tally: Volume) -> [Frame; 2] {
    let tally = tally.to_le_bytes();

    let mut started = Vec::with_capacity(EPILOGUE_HEAD.len() + 3 + EPILOGUE_TAIL.len());
    started.extend_from_slice(&EPILOGUE_HEAD);
    started.extend_from_slice(&tally);
    started.extend_from_slice(&EPILOGUE_TAIL);

    let mut status = Vec::with_capacity(REPLY_PAYLOAD_LEN);
    status.extend_from_slice(&EPILOGUE_STATUS_HEAD);
    status.extend_from_slice(&tally);
    status.extend_from_slice(&EPILOGUE_STATUS_TAIL);

    [
        Frame::new(RESP_EPILOGUE_STARTED, started),
        Frame::new(RESP_EPILOGUE_STATUS, status),
    ]
}

/// Reply to [`CMD_END_PROLOGUE`], carrying the volume to bill.
pub fn prologue_ended_reply(timestamp: [u8; 6], billed: Volume) -> Frame {
    let mut payload = Vec::with_capacity(REPLY_PAYLOAD_LEN);
    payload.extend_from_slice(&PROLOGUE_ENDED_HEAD);
    payload.extend_from_slice(&timestamp);
    payload.extend_from_slice(&billed.to_le_bytes());
    Frame::new(RESP_PROLOGUE_ENDED, payload)
}
