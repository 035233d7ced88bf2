//! Runner for the water meter emulator.
//!
//! Wires a [`wateremu_meter::Session`] to TCP listeners standing in for the
//! wireless link, loads configuration, and sets up logging.

pub mod at_channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod link;
pub mod logging;

use tokio::net::TcpListener;
use tracing::{error, info};
use wateremu_meter::Session;
use wateremu_protocol::{CharacteristicAccess, MANUFACTURER_DATA, SERVICE_LAYOUT, SERVICE_MAIN_UUID};

pub use config::{load_config, load_config_from_str, RunnerConfig};
pub use error::RunnerError;
pub use link::{ChannelTransport, LinkEvent, LinkServer};

/// Print the advertised service layout and listener ports to stderr.
pub fn print_service_table(config: &RunnerConfig) {
    eprintln!();
    eprintln!(
        "Device {} (manufacturer data {})",
        config.link.device_name,
        hex::encode_upper(MANUFACTURER_DATA)
    );
    eprintln!("┌{}┬{}┬{}┬{}┬{}┐",
        "─".repeat(10),
        "─".repeat(8),
        "─".repeat(10),
        "─".repeat(8),
        "─".repeat(24));
    eprintln!("│ {:^8} │ {:^6} │ {:^8} │ {:^6} │ {:^22} │", "Service", "Char", "Name", "Access", "TCP");
    eprintln!("├{}┼{}┼{}┼{}┼{}┤",
        "─".repeat(10),
        "─".repeat(8),
        "─".repeat(10),
        "─".repeat(8),
        "─".repeat(24));

    for info in SERVICE_LAYOUT {
        let endpoint = if info.service == SERVICE_MAIN_UUID {
            config.link.data_addr()
        } else {
            config.link.at_addr().unwrap_or_else(|| "disabled".to_string())
        };
        let access = match info.access {
            CharacteristicAccess::Write => "write",
            CharacteristicAccess::Notify => "notify",
        };
        eprintln!("│ {:8} │ {:6} │ {:8} │ {:6} │ {:22} │",
            format!("{:04X}", info.service),
            format!("{:04X}", info.uuid),
            info.description,
            access,
            endpoint);
    }

    eprintln!("└{}┴{}┴{}┴{}┴{}┘",
        "─".repeat(10),
        "─".repeat(8),
        "─".repeat(10),
        "─".repeat(8),
        "─".repeat(24));
    eprintln!();
}

/// Bind the listeners and serve until the process is interrupted.
pub async fn run(config: RunnerConfig) -> Result<(), RunnerError> {
    let session = Session::new(&config.meter)?;
    let server = LinkServer::bind(&config.link.data_addr(), session, &config.link.device_name)
        .await?
        .with_write_gap(config.link.write_gap());
    info!("wateremu listening on {}", server.local_addr()?);

    if let Some(addr) = config.link.at_addr() {
        let listener = TcpListener::bind(&addr).await?;
        info!("AT channel listening on {}", listener.local_addr()?);
        tokio::spawn(async move {
            if let Err(e) = at_channel::run_at_listener(listener).await {
                error!("AT listener error: {}", e);
            }
        });
    }

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }
    Ok(())
}
