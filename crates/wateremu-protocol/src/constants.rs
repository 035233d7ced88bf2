//! Protocol constants
//!
//! These constants define the frame magic, command codes, reply codes and the
//! service layout the meter exposes to the companion app.

// ============================================================================
// Frame Layout
// ============================================================================

/// Magic prefix of frames written by the app.
pub const INBOUND_MAGIC: [u8; 2] = [0xFE, 0xFE];
/// Magic prefix of frames notified by the meter.
pub const OUTBOUND_MAGIC: [u8; 2] = [0xFD, 0xFD];
/// Magic, length and command byte.
pub const HEADER_LEN: usize = 4;
/// Byte found in the length position of every captured frame.
pub const DEFAULT_LENGTH_MARKER: u8 = 0x09;
/// Largest payload whose strict length still fits in one byte.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize - 1;

// ============================================================================
// Command Codes (app → meter)
// ============================================================================

/// Key authentication.
pub const CMD_KEY_AUTH: u8 = 0xAF;
/// Start prologue (usage start).
pub const CMD_START_PROLOGUE: u8 = 0xB0;
/// Start epilogue, legacy path.
pub const CMD_START_EPILOGUE: u8 = 0xB2;
/// Start epilogue without a completed prologue ("Offlinebomb").
pub const CMD_OFFLINEBOMB: u8 = 0xBB;
/// End prologue; the meter answers with the billing field.
pub const CMD_END_PROLOGUE: u8 = 0xB3;
/// End epilogue; the app expects the meter to drop the link.
pub const CMD_END_EPILOGUE: u8 = 0xB4;

// ============================================================================
// Reply Codes (meter → app)
// ============================================================================

/// Key authentication reply.
pub const RESP_KEY_AUTH: u8 = 0xAF;
/// Prologue started, old firmware.
pub const RESP_PROLOGUE_STARTED: u8 = 0xB0;
/// Prologue started, new firmware.
pub const RESP_PROLOGUE_STARTED_NEW: u8 = 0xAE;
/// Epilogue started, carries the volume tally.
pub const RESP_EPILOGUE_STARTED: u8 = 0xB2;
/// Epilogue status block following [`RESP_EPILOGUE_STARTED`].
pub const RESP_EPILOGUE_STATUS: u8 = 0xBA;
/// Prologue ended, carries the billing field.
pub const RESP_PROLOGUE_ENDED: u8 = 0xB3;

// ============================================================================
// Advertising and Services
// ============================================================================

/// Name the meter advertises under.
pub const DEVICE_NAME: &str = "Water12345";
/// Manufacturer specific advertising data ("MT").
pub const MANUFACTURER_DATA: [u8; 2] = [0x4D, 0x54];

/// Main service carrying the binary protocol.
pub const SERVICE_MAIN_UUID: u16 = 0xF1F0;
/// App → meter command channel.
pub const CHARACTERISTIC_TXD_UUID: u16 = 0xF1F1;
/// Meter → app notify channel.
pub const CHARACTERISTIC_RXD_UUID: u16 = 0xF1F2;

/// Plain-text diagnostic service.
pub const SERVICE_AT_UUID: u16 = 0xF2F0;
/// App → meter diagnostic text.
pub const CHARACTERISTIC_ATSEND_UUID: u16 = 0xF2F1;
/// Meter → app diagnostic text.
pub const CHARACTERISTIC_ATRESP_UUID: u16 = 0xF2F2;

/// Characteristic user description descriptor.
pub const DESCRIPTOR_USER_DESCRIPTION_UUID: u16 = 0x2901;

/// How the remote party may use a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacteristicAccess {
    /// Write and write-without-response.
    Write,
    /// Notify only.
    Notify,
}

/// One characteristic of the advertised service layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicInfo {
    /// Owning service.
    pub service: u16,
    /// Characteristic UUID.
    pub uuid: u16,
    /// Value of the user description descriptor.
    pub description: &'static str,
    /// Access mode.
    pub access: CharacteristicAccess,
}

/// The characteristics registered by the meter, in registration order.
pub const SERVICE_LAYOUT: [CharacteristicInfo; 4] = [
    CharacteristicInfo {
        service: SERVICE_MAIN_UUID,
        uuid: CHARACTERISTIC_TXD_UUID,
        description: "TXD",
        access: CharacteristicAccess::Write,
    },
    CharacteristicInfo {
        service: SERVICE_MAIN_UUID,
        uuid: CHARACTERISTIC_RXD_UUID,
        description: "RXD",
        access: CharacteristicAccess::Notify,
    },
    CharacteristicInfo {
        service: SERVICE_AT_UUID,
        uuid: CHARACTERISTIC_ATSEND_UUID,
        description: "ATSend",
        access: CharacteristicAccess::Write,
    },
    CharacteristicInfo {
        service: SERVICE_AT_UUID,
        uuid: CHARACTERISTIC_ATRESP_UUID,
        description: "ATResp",
        access: CharacteristicAccess::Notify,
    },
];
