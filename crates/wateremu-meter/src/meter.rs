//! Coupling between a [`Session`] and the link that carries it.

use tracing::{debug, info};

use crate::session::Session;

/// The link carrying the session, as seen from the meter.
///
/// Implementations must deliver notifications in call order. A dropped
/// notification is not retried.
pub trait Transport {
    /// Push one encoded reply frame to the connected app.
    fn notify(&mut self, frame: &[u8]);

    /// Drop the connection to the app.
    fn disconnect(&mut self);

    /// Become discoverable again after the app went away.
    fn resume_advertising(&mut self);
}

/// A session driven by transport events.
#[derive(Debug)]
pub struct Meter<T: Transport> {
    session: Session,
    transport: T,
}

impl<T: Transport> Meter<T> {
    /// Attach a session to a transport.
    pub fn new(session: Session, transport: T) -> Self {
        Meter { session, transport }
    }

    /// The session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Split into session and transport.
    pub fn into_parts(self) -> (Session, T) {
        (self.session, self.transport)
    }

    /// The app connected.
    pub fn on_connect(&mut self) {
        info!("Meter: connected to client");
        self.session.reset();
    }

    /// The app disconnected or the link was lost.
    pub fn on_disconnect(&mut self) {
        info!("Meter: disconnected from client");
        self.session.reset();
        self.transport.resume_advertising();
    }

    /// The app wrote to the command channel.
    pub fn on_write(&mut self, raw: &[u8]) {
        if raw.is_empty() {
            return;
        }
        debug!("Meter: received on TXD: {}", hex::encode_upper(raw));

        for reply in self.session.on_write(raw) {
            debug!("Meter: notify on RXD: {}", hex::encode_upper(&reply));
            self.transport.notify(&reply);
        }

        if self.session.take_disconnect_request() {
            info!("Meter: end of epilogue, closing the link");
            self.transport.disconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MeterConfig;
    use crate::session::SessionPhase;

    #[derive(Debug, Default)]
    struct RecordingTransport {
        notified: Vec<Vec<u8>>,
        disconnects: u32,
        advertising: u32,
    }

    impl Transport for RecordingTransport {
        fn notify(&mut self, frame: &[u8]) {
            self.notified.push(frame.to_vec());
        }

        fn disconnect(&mut self) {
            self.disconnects += 1;
        }

        fn resume_advertising(&mut self) {
            self.advertising += 1;
        }
    }

    fn meter(config: MeterConfig) -> Meter<RecordingTransport> {
        let session = Session::new(&config).expect("valid config");
        Meter::new(session, RecordingTransport::default())
    }

    #[test]
    fn test_write_notifies_in_order() {
        let mut meter = meter(MeterConfig::default());
        meter.on_connect();
        meter.on_write(&[0xFE, 0xFE, 0x09, 0xB2, 0x00, 0x00]);

        let notified = &meter.transport().notified;
        assert_eq!(notified.len(), 2);
        assert_eq!(notified[0][3], 0xB2);
        assert_eq!(notified[1][3], 0xBA);
    }

    #[test]
    fn test_empty_write_ignored() {
        let mut meter = meter(MeterConfig::default());
        meter.on_write(&[]);
        assert!(meter.transport().notified.is_empty());
        assert_eq!(meter.session().stats().frames_dropped, 0);
    }

    #[test]
    fn test_disconnect_resets_and_advertises() {
        let mut meter = meter(MeterConfig::default());
        meter.on_connect();
        meter.on_write(&[0xFE, 0xFE, 0x09, 0xB0, 0x01, 0x01, 0x00, 0x00]);
        assert_eq!(meter.session().phase(), SessionPhase::PrologueStarted);

        meter.on_disconnect();
        assert_eq!(meter.session().phase(), SessionPhase::Idle);
        assert_eq!(meter.transport().advertising, 1);
    }

    #[test]
    fn test_connect_resets() {
        let mut meter = meter(MeterConfig::default());
        meter.on_write(&[0xFE, 0xFE, 0x09, 0xBB]);
        assert_eq!(meter.session().phase(), SessionPhase::EpilogueStarted);
        meter.on_connect();
        assert_eq!(meter.session().phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_end_epilogue_disconnect_policy() {
        let mut passive = meter(MeterConfig::default());
        passive.on_write(&[0xFE, 0xFE, 0x09, 0xB4, 0x00, 0x00]);
        assert!(passive.transport().notified.is_empty());
        assert_eq!(passive.transport().disconnects, 0);

        let mut active = meter(MeterConfig {
            disconnect_on_end: true,
            ..MeterConfig::default()
        });
        active.on_write(&[0xFE, 0xFE, 0x09, 0xB4, 0x00, 0x00]);
        assert!(active.transport().notified.is_empty());
        assert_eq!(active.transport().disconnects, 1);
    }
}
