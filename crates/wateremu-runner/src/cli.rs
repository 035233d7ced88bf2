//! Command line interface.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use wateremu_protocol::{FirmwareVariant, Tariff};

use crate::config::{load_config, RunnerConfig};
use crate::error::RunnerError;

/// Firmware generation selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FirmwareArg {
    /// `0xB0` prologue reply.
    Old,
    /// `0xAE` prologue reply.
    New,
}

impl From<FirmwareArg> for FirmwareVariant {
    fn from(arg: FirmwareArg) -> Self {
        match arg {
            FirmwareArg::Old => FirmwareVariant::Old,
            FirmwareArg::New => FirmwareVariant::New,
        }
    }
}

/// Emulate the water meter side of the companion app protocol.
#[derive(Debug, Parser)]
#[command(name = "wateremu", version, about)]
pub struct Cli {
    /// YAML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind the listeners to.
    #[arg(long)]
    pub bind: Option<String>,

    /// Port of the command/notify channel.
    #[arg(long)]
    pub port: Option<u16>,

    /// Port of the AT text channel.
    #[arg(long, conflicts_with = "no_at")]
    pub at_port: Option<u16>,

    /// Disable the AT text channel.
    #[arg(long)]
    pub no_at: bool,

    /// Firmware generation to emulate.
    #[arg(long, value_enum)]
    pub firmware: Option<FirmwareArg>,

    /// Price per unit volume.
    #[arg(long)]
    pub tariff: Option<f64>,

    /// Volume billed at the end of the prologue.
    #[arg(long)]
    pub session_volume: Option<u32>,

    /// Close the link when the app ends the epilogue.
    #[arg(long)]
    pub disconnect_on_end: bool,

    /// Log at debug level.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Load the configuration file (if any) and apply command line overrides.
    pub fn resolve_config(&self) -> Result<RunnerConfig, RunnerError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => RunnerConfig::default(),
        };
        self.apply_overrides(&mut config)?;
        config.meter.validate()?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut RunnerConfig) -> Result<(), RunnerError> {
        if let Some(ref bind) = self.bind {
            config.link.bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.link.data_port = port;
        }
        if let Some(port) = self.at_port {
            config.link.at_port = Some(port);
        }
        if self.no_at {
            config.link.at_port = None;
        }
        if let Some(firmware) = self.firmware {
            config.meter.firmware = firmware.into();
        }
        if let Some(tariff) = self.tariff {
            config.meter.tariff = Tariff::try_from(tariff)?;
        }
        if let Some(volume) = self.session_volume {
            config.meter.session_volume = volume;
        }
        if self.disconnect_on_end {
            config.meter.disconnect_on_end = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_flags() {
        let cli = Cli::parse_from(["wateremu"]);
        let config = cli.resolve_config().expect("should resolve");
        assert_eq!(config, RunnerConfig::default());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "wateremu",
            "--port",
            "9000",
            "--no-at",
            "--firmware",
            "new",
            "--tariff",
            "30.5",
            "--session-volume",
            "178",
            "--disconnect-on-end",
        ]);
        let config = cli.resolve_config().expect("should resolve");
        assert_eq!(config.link.data_port, 9000);
        assert!(config.link.at_port.is_none());
        assert_eq!(config.meter.firmware, FirmwareVariant::New);
        assert_eq!(config.meter.tariff.milli(), 30_500);
        assert_eq!(config.meter.session_volume, 178);
        assert!(config.meter.disconnect_on_end);
    }

    #[test]
    fn test_invalid_overrides() {
        let cli = Cli::parse_from(["wateremu", "--tariff=-1"]);
        assert!(matches!(cli.resolve_config(), Err(RunnerError::Tariff(_))));

        let cli = Cli::parse_from(["wateremu", "--session-volume", "16777216"]);
        assert!(matches!(cli.resolve_config(), Err(RunnerError::Config(_))));
    }

    #[test]
    fn test_at_port_conflicts_with_no_at() {
        assert!(Cli::try_parse_from(["wateremu", "--at-port", "1", "--no-at"]).is_err());
    }
}
