//! TCP Link Module
//!
//! This module stands in for the wireless link. The data port plays the
//! main service: commands from the client are written to the TXD
//! characteristic, and every notification on RXD is written back in order.
//! TCP does not keep write boundaries, so the byte stream is cut into
//! commands by a [`FrameSplitter`]; a command whose end cannot be seen is
//! completed once the client has been quiet for the configured write gap.
//! Only one client is served at a time; the next one is accepted once the
//! current one goes away, just as the meter resumes advertising.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use wateremu_meter::{Meter, Session, Transport};
use wateremu_protocol::FrameSplitter;

use crate::config::DEFAULT_WRITE_GAP_MS;

/// Largest single write accepted from the client.
const READ_BUF_SIZE: usize = 512;

// ============================================================================
// Types
// ============================================================================

/// Requests the meter makes of the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Write a reply frame to the client.
    Notify(Vec<u8>),
    /// Close the client connection.
    Disconnect,
    /// Accept the next client.
    ResumeAdvertising,
}

/// [`Transport`] that queues link events for the connection task.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<LinkEvent>,
}

impl ChannelTransport {
    /// Create a transport and the receiver the link drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelTransport { tx }, rx)
    }

    fn send(&self, event: LinkEvent) {
        if self.tx.send(event).is_err() {
            warn!("[LINK] Event dropped, link task has gone away");
        }
    }
}

impl Transport for ChannelTransport {
    fn notify(&mut self, frame: &[u8]) {
        self.send(LinkEvent::Notify(frame.to_vec()));
    }

    fn disconnect(&mut self) {
        self.send(LinkEvent::Disconnect);
    }

    fn resume_advertising(&mut self) {
        self.send(LinkEvent::ResumeAdvertising);
    }
}

// ============================================================================
// Link Server
// ============================================================================

/// Serves the emulated meter to one TCP client at a time.
pub struct LinkServer {
    listener: TcpListener,
    meter: Meter<ChannelTransport>,
    events: mpsc::UnboundedReceiver<LinkEvent>,
    device_name: String,
    write_gap: Duration,
}

impl LinkServer {
    /// Bind the data port.
    pub async fn bind(addr: &str, session: Session, device_name: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let (transport, events) = ChannelTransport::new();
        Ok(LinkServer {
            listener,
            meter: Meter::new(session, transport),
            events,
            device_name: device_name.to_string(),
            write_gap: Duration::from_millis(DEFAULT_WRITE_GAP_MS),
        })
    }

    /// Set how long the client must be quiet before a buffered command is
    /// delivered.
    pub fn with_write_gap(mut self, write_gap: Duration) -> Self {
        self.write_gap = write_gap;
        self
    }

    /// Address actually bound (useful with port `0`).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The meter being served.
    pub fn meter(&self) -> &Meter<ChannelTransport> {
        &self.meter
    }

    /// Accept clients forever.
    pub async fn run(mut self) -> io::Result<()> {
        info!("[LINK] Advertising as {}", self.device_name);
        loop {
            self.serve_next().await?;
        }
    }

    /// Accept one client and serve it until it goes away.
    pub async fn serve_next(&mut self) -> io::Result<()> {
        let (stream, peer) = self.listener.accept().await?;
        info!("[LINK] Client connected from {}", peer);
        self.meter.on_connect();

        if let Err(e) = self.handle_connection(stream).await {
            warn!("[LINK] Connection error with {}: {}", peer, e);
        }

        self.meter.on_disconnect();
        self.drain_idle_events();
        Ok(())
    }

    async fn handle_connection(&mut self, mut stream: TcpStream) -> io::Result<()> {
        let (mut reader, mut writer) = stream.split();
        let mut splitter = FrameSplitter::new(self.meter.session().codec().length_field());
        let mut read_buf = [0u8; READ_BUF_SIZE];

        loop {
            let n = if splitter.buffered_len() > 0 {
                match timeout(self.write_gap, reader.read(&mut read_buf)).await {
                    Ok(result) => result?,
                    Err(_) => {
                        if let Some(command) = splitter.flush() {
                            if !self.deliver(&command, &mut writer).await? {
                                return Ok(());
                            }
                        }
                        continue;
                    }
                }
            } else {
                reader.read(&mut read_buf).await?
            };

            if n == 0 {
                // Connection closed
                if let Some(command) = splitter.flush() {
                    self.deliver(&command, &mut writer).await?;
                }
                return Ok(());
            }

            splitter.push(&read_buf[..n]);
            while let Some(command) = splitter.next_frame() {
                if !self.deliver(&command, &mut writer).await? {
                    return Ok(());
                }
            }
        }
    }

    /// Hand one command to the meter and write out what it asks for.
    ///
    /// Returns `false` once the connection has been closed on request.
    async fn deliver<W>(&mut self, command: &[u8], writer: &mut W) -> io::Result<bool>
    where
        W: AsyncWrite + Unpin,
    {
        self.meter.on_write(command);

        while let Ok(event) = self.events.try_recv() {
            match event {
                LinkEvent::Notify(frame) => {
                    writer.write_all(&frame).await?;
                    // Flush to ensure data is sent immediately
                    writer.flush().await?;
                }
                LinkEvent::Disconnect => {
                    debug!("[LINK] Closing connection on request");
                    writer.shutdown().await?;
                    return Ok(false);
                }
                LinkEvent::ResumeAdvertising => {}
            }
        }
        Ok(true)
    }

    /// Handle events raised while no client is connected.
    fn drain_idle_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                LinkEvent::ResumeAdvertising => {
                    info!("[LINK] Advertising as {}", self.device_name);
                }
                LinkEvent::Notify(frame) => {
                    debug!("[LINK] Dropping notify with no client: {}", hex::encode_upper(&frame));
                }
                LinkEvent::Disconnect => {}
            }
        }
    }
}
