//! Meter configuration.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use wateremu_protocol::{
    default_simulated_time, FirmwareVariant, LengthField, Tariff, TimestampEncoder, Volume,
    CAPTURED_TALLY, REPLY_PAYLOAD_LEN,
};

use crate::error::ConfigError;

// ============================================================================
// Configuration Types
// ============================================================================

/// Everything that shapes the meter's replies.
///
/// Fixed for the lifetime of a [`crate::Session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterConfig {
    /// Price per unit volume.
    pub tariff: Tariff,
    /// Firmware generation answered on prologue start.
    pub firmware: FirmwareVariant,
    /// Length byte policy for both directions.
    pub length_field: LengthField,
    /// Date/time field encoding.
    pub timestamp: TimestampEncoder,
    /// Time written into every date/time field.
    pub simulated_time: NaiveDateTime,
    /// Running volume tally reported when the epilogue starts.
    pub meter_tally: u32,
    /// Volume billed when the prologue ends.
    pub session_volume: u32,
    /// Hex replacement for the captured key authentication payload.
    pub auth_reply: Option<String>,
    /// Ask the transport to drop the link on end of epilogue.
    pub disconnect_on_end: bool,
}

impl Default for MeterConfig {
    fn default() -> Self {
        MeterConfig {
            tariff: Tariff::default(),
            firmware: FirmwareVariant::default(),
            length_field: LengthField::default(),
            timestamp: TimestampEncoder::default(),
            simulated_time: default_simulated_time(),
            meter_tally: CAPTURED_TALLY.raw(),
            session_volume: 0,
            auth_reply: None,
            disconnect_on_end: false,
        }
    }
}

impl MeterConfig {
    /// Parse `auth_reply`, if configured.
    pub fn auth_reply_bytes(&self) -> Result<Option<[u8; REPLY_PAYLOAD_LEN]>, ConfigError> {
        let Some(ref text) = self.auth_reply else {
            return Ok(None);
        };

        let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = hex::decode(&cleaned).map_err(|e| ConfigError::AuthReplyHex(e.to_string()))?;
        let actual = bytes.len();
        let payload = <[u8; REPLY_PAYLOAD_LEN]>::try_from(bytes).map_err(|_| {
            ConfigError::AuthReplyLength {
                expected: REPLY_PAYLOAD_LEN,
                actual,
            }
        })?;
        Ok(Some(payload))
    }

    /// The configured tally as a 24-bit volume.
    pub fn meter_tally_volume(&self) -> Result<Volume, ConfigError> {
        Volume::new(self.meter_tally).ok_or(ConfigError::VolumeOutOfRange {
            field: "meter_tally",
            value: self.meter_tally,
        })
    }

    /// The configured session volume as a 24-bit volume.
    pub fn session_volume(&self) -> Result<Volume, ConfigError> {
        Volume::new(self.session_volume).ok_or(ConfigError::VolumeOutOfRange {
            field: "session_volume",
            value: self.session_volume,
        })
    }

    /// Check every derived value without building a session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auth_reply_bytes()?;
        self.meter_tally_volume()?;
        self.session_volume()?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wateremu_protocol::DigitEncoding;

    #[test]
    fn test_meter_config_default() {
        let config = MeterConfig::default();
        assert_eq!(config.tariff, Tariff::from_units(25));
        assert_eq!(config.firmware, FirmwareVariant::Old);
        assert_eq!(config.meter_tally, 0x006C6D);
        assert_eq!(config.session_volume, 0);
        assert!(!config.disconnect_on_end);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_meter_config_from_yaml() {
        let yaml = r#"
tariff: 25.5
firmware: new
length_field: strict
timestamp:
  base_year: 1988
  digits: bcd
simulated_time: "2024-03-05T06:07:08"
session_volume: 178
disconnect_on_end: true
"#;
        let config: MeterConfig = serde_yaml::from_str(yaml).expect("should parse");
        assert_eq!(config.tariff.milli(), 25_500);
        assert_eq!(config.firmware, FirmwareVariant::New);
        assert_eq!(config.length_field, LengthField::Strict);
        assert_eq!(config.timestamp.base_year, 1988);
        assert_eq!(config.timestamp.digits, DigitEncoding::Bcd);
        assert_eq!(config.simulated_time.to_string(), "2024-03-05 06:07:08");
        assert_eq!(config.session_volume, 178);
        // Unset keys keep their defaults.
        assert_eq!(config.meter_tally, 0x006C6D);
        assert!(config.disconnect_on_end);
    }

    #[test]
    fn test_negative_tariff_rejected() {
        let result: Result<MeterConfig, _> = serde_yaml::from_str("tariff: -3");
        assert!(result.is_err());
    }

    #[test]
    fn test_auth_reply_parsing() {
        let config = MeterConfig {
            auth_reply: Some("00 11 22 33 44 55 66 77 88 99 AA BB CC DD EE FF".to_string()),
            ..MeterConfig::default()
        };
        let bytes = config.auth_reply_bytes().expect("valid").expect("configured");
        assert_eq!(bytes[0], 0x00);
        assert_eq!(bytes[15], 0xFF);
    }

    #[test]
    fn test_auth_reply_errors() {
        let short = MeterConfig {
            auth_reply: Some("0011".to_string()),
            ..MeterConfig::default()
        };
        assert_eq!(
            short.validate(),
            Err(ConfigError::AuthReplyLength {
                expected: 16,
                actual: 2,
            })
        );

        let garbage = MeterConfig {
            auth_reply: Some("zz".to_string()),
            ..MeterConfig::default()
        };
        assert!(matches!(garbage.validate(), Err(ConfigError::AuthReplyHex(_))));
    }

    #[test]
    fn test_volume_out_of_range() {
        let config = MeterConfig {
            meter_tally: 0x0100_0000,
            ..MeterConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::VolumeOutOfRange {
                field: "meter_tally",
                value: 0x0100_0000,
            })
        );
    }
}
