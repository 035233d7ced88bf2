//! AT text channel.
//!
//! Stand-in for the `F2F0` diagnostic service. Text written by the client is
//! logged and nothing else; it never reaches the session.

use std::io;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

/// Accept AT clients forever, one at a time.
pub async fn run_at_listener(listener: TcpListener) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        info!("[AT] Client connected from {}", peer);
        if let Err(e) = log_at_lines(stream).await {
            warn!("[AT] Connection error with {}: {}", peer, e);
        }
        info!("[AT] Client {} disconnected", peer);
    }
}

/// Log every non-empty line received on `stream` until it closes.
///
/// Bytes that are not valid UTF-8 are logged lossily. Returns the number of
/// lines logged.
pub async fn log_at_lines(stream: TcpStream) -> io::Result<usize> {
    let mut reader = BufReader::new(stream);
    let mut raw = Vec::new();
    let mut count = 0;
    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw).await? == 0 {
            return Ok(count);
        }
        let text = String::from_utf8_lossy(&raw);
        let line = text.trim_end_matches(&['\r', '\n'][..]);
        if line.is_empty() {
            continue;
        }
        info!("[AT] Received data on ATSend: {}", line);
        count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_log_at_lines_counts_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.expect("connect");
            stream.write_all(b"AT+VER\r\n\r\nAT+NAME?\n").await.expect("write");
        });

        let (stream, _) = listener.accept().await.expect("accept");
        client.await.expect("client task");
        let count = log_at_lines(stream).await.expect("read lines");
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_log_at_lines_survives_binary_input() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.expect("connect");
            stream
                .write_all(b"AT+\xFF\xFE\r\nAT+VER\r\n\xC3")
                .await
                .expect("write");
        });

        let (stream, _) = listener.accept().await.expect("accept");
        client.await.expect("client task");
        let count = log_at_lines(stream).await.expect("read lines");
        assert_eq!(count, 3);
    }
}
