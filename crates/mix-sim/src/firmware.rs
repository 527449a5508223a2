//! Virtual controller firmware
//!
//! A pure async task that plays the control surface on one end of a stream.
//! It writes an optional greeting, forwards whatever lines a test asks it to
//! send, and reports every line the host writes back.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mix_protocol::LineCodec;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Commands that can be sent to a virtual firmware task
#[derive(Debug, Clone)]
pub enum FirmwareCommand {
    /// Write one line (terminator added)
    SendLine(String),
    /// Close the stream, as if the cable was pulled
    Shutdown,
}

/// Run the virtual firmware task until the host disconnects or it is shut down
pub async fn run_virtual_firmware<S>(
    mut stream: S,
    greeting: Vec<String>,
    mut cmd_rx: mpsc::Receiver<FirmwareCommand>,
    response_tx: mpsc::UnboundedSender<String>,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut codec = LineCodec::new();
    let mut buf = [0u8; 512];

    for line in &greeting {
        write_line(&mut stream, line).await?;
    }

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Virtual firmware stream closed by host");
                        break;
                    }
                    Ok(n) => {
                        codec.push_bytes(&buf[..n]);
                        while let Some(line) = codec.next_line() {
                            debug!("Virtual firmware received {:?}", line);
                            // Nobody listening is fine
                            let _ = response_tx.send(line);
                        }
                    }
                    Err(e) => {
                        warn!("Virtual firmware stream error: {}", e);
                        return Err(e);
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(FirmwareCommand::SendLine(line)) => write_line(&mut stream, &line).await?,
                    Some(FirmwareCommand::Shutdown) => {
                        info!("Virtual firmware shutting down");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    Ok(())
}

async fn write_line<S>(stream: &mut S, line: &str) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(line.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.flush().await
}

/// Test-side handle to one virtual firmware connection
#[derive(Debug)]
pub struct VirtualController {
    port: String,
    cmd_tx: mpsc::Sender<FirmwareCommand>,
    responses: Mutex<mpsc::UnboundedReceiver<String>>,
    live: Arc<AtomicBool>,
}

impl VirtualController {
    /// Spawn firmware on `stream` and return its handle
    pub fn spawn<S>(port: &str, stream: S, greeting: Vec<String>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let live = Arc::new(AtomicBool::new(true));

        let task_live = Arc::clone(&live);
        let task_port = port.to_string();
        tokio::spawn(async move {
            if let Err(e) = run_virtual_firmware(stream, greeting, cmd_rx, response_tx).await {
                debug!("Virtual firmware on {} ended: {}", task_port, e);
            }
            task_live.store(false, Ordering::SeqCst);
        });

        Self {
            port: port.to_string(),
            cmd_tx,
            responses: Mutex::new(response_rx),
            live,
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// Whether the firmware task is still running
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Send a raw line to the host
    pub async fn send_line(&self, line: &str) -> bool {
        self.cmd_tx
            .send(FirmwareCommand::SendLine(line.to_string()))
            .await
            .is_ok()
    }

    /// Send a `Sliders` line with these raw readings
    pub async fn send_sliders(&self, readings: &[i64]) -> bool {
        let mut line = String::from("Sliders");
        for reading in readings {
            line.push('|');
            line.push_str(&reading.to_string());
        }
        self.send_line(&line).await
    }

    /// Next line the host wrote, if one arrives in time
    pub async fn next_response(&self, wait: Duration) -> Option<String> {
        let mut responses = self.responses.lock().await;
        timeout(wait, responses.recv()).await.ok().flatten()
    }

    /// Send a line and wait for the host's reply
    pub async fn request(&self, line: &str, wait: Duration) -> Option<String> {
        if !self.send_line(line).await {
            return None;
        }
        self.next_response(wait).await
    }

    /// Drop the connection from the controller side
    pub async fn disconnect(&self) {
        let _ = self.cmd_tx.send(FirmwareCommand::Shutdown).await;
    }
}
