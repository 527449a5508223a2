//! Controller probing
//!
//! A controller streams `Sliders|...` lines on its own, so recognizing one is
//! passive: open the port, let it settle, throw away the first (likely
//! partial) line and check that the next one matches the wire grammar.

use std::io;
use std::time::Duration;

use mix_protocol::{is_valid_line, LineCodec};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use tracing::{debug, info, trace};

use crate::error::DetectError;
use crate::transport::Transport;

/// A port that answered like a controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedPort {
    /// Port name
    pub port: String,
    /// The line that identified it
    pub sample: String,
}

/// Configuration for probing
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Wait after opening before reading anything
    pub settle_delay: Duration,
    /// Timeout for each line read
    pub line_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            line_timeout: Duration::from_secs(2),
        }
    }
}

/// Controller prober
#[derive(Debug, Clone, Default)]
pub struct ControllerProber {
    config: ProbeConfig,
}

impl ControllerProber {
    /// Create a new prober with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a prober with custom configuration
    pub fn with_config(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Probe an open stream, returning the validated line if it looks like a controller
    pub async fn probe<S>(&self, stream: &mut S) -> Option<String>
    where
        S: AsyncRead + Unpin,
    {
        tokio::time::sleep(self.config.settle_delay).await;

        let mut codec = LineCodec::new();

        // Whatever happens here, the real check is the next line
        let discarded = self.read_line(stream, &mut codec).await;
        trace!("Discarded first line: {:?}", discarded);

        match self.read_line(stream, &mut codec).await {
            Some(line) if is_valid_line(&line) => Some(line),
            Some(line) => {
                trace!("Rejected line {:?}", line);
                None
            }
            None => None,
        }
    }

    /// Probe each candidate port in order; the first controller found wins
    pub async fn detect(
        &self,
        transport: &dyn Transport,
        baud_rate: u32,
    ) -> Result<DetectedPort, DetectError> {
        let candidates = transport.candidate_ports()?;
        debug!("Scanning {} candidate port(s)", candidates.len());

        for port in &candidates {
            debug!("Trying port {}", port);

            let mut stream = match transport.open(port, baud_rate) {
                Ok(s) => s,
                Err(e) => {
                    // Port doesn't exist or is in use
                    trace!("Cannot open {}: {}", port, e);
                    continue;
                }
            };

            if let Some(sample) = self.probe(&mut stream).await {
                info!("Found controller on {}", port);
                return Ok(DetectedPort {
                    port: port.clone(),
                    sample,
                });
            }
        }

        Err(DetectError::NoControllerFound {
            tried: candidates.len(),
        })
    }

    async fn read_line<S>(&self, stream: &mut S, codec: &mut LineCodec) -> Option<String>
    where
        S: AsyncRead + Unpin,
    {
        let read = async {
            let mut buf = [0u8; 256];
            loop {
                if let Some(line) = codec.next_line() {
                    return Ok::<_, io::Error>(Some(line));
                }
                let n = stream.read(&mut buf).await?;
                if n == 0 {
                    return Ok(None);
                }
                codec.push_bytes(&buf[..n]);
            }
        };

        match timeout(self.config.line_timeout, read).await {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => {
                trace!("Probe read error: {}", e);
                None
            }
            Err(_) => {
                trace!("Probe line timeout");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn fast_prober() -> ControllerProber {
        ControllerProber::with_config(ProbeConfig {
            settle_delay: Duration::from_millis(1),
            line_timeout: Duration::from_millis(200),
        })
    }

    #[test]
    fn test_probe_config_default() {
        let config = ProbeConfig::default();
        assert_eq!(config.settle_delay, Duration::from_millis(500));
        assert_eq!(config.line_timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_probe_accepts_second_line() {
        let (mut device, mut host) = tokio::io::duplex(256);
        device
            .write_all(b"ers|12|4095\nSliders|0|2048\n")
            .await
            .unwrap();

        let line = fast_prober().probe(&mut host).await;
        assert_eq!(line.as_deref(), Some("Sliders|0|2048"));
    }

    #[tokio::test]
    async fn test_probe_rejects_garbage() {
        let (mut device, mut host) = tokio::io::duplex(256);
        device
            .write_all(b"AT+GMR\r\nOK: ready, v1.2\r\n")
            .await
            .unwrap();

        assert_eq!(fast_prober().probe(&mut host).await, None);
    }

    #[tokio::test]
    async fn test_probe_silent_port_times_out() {
        let (_device, mut host) = tokio::io::duplex(256);
        assert_eq!(fast_prober().probe(&mut host).await, None);
    }

    #[tokio::test]
    async fn test_probe_closed_port() {
        let (device, mut host) = tokio::io::duplex(256);
        drop(device);
        assert_eq!(fast_prober().probe(&mut host).await, None);
    }

    /// Ports backed by canned byte scripts; `None` fails to open
    struct ScriptedTransport {
        ports: Vec<(&'static str, Option<&'static [u8]>)>,
    }

    impl Transport for ScriptedTransport {
        fn candidate_ports(&self) -> Result<Vec<String>, DetectError> {
            Ok(self.ports.iter().map(|(p, _)| p.to_string()).collect())
        }

        fn open(&self, port: &str, _baud_rate: u32) -> io::Result<crate::BoxedStream> {
            let script = self
                .ports
                .iter()
                .find(|(p, _)| *p == port)
                .and_then(|(_, s)| *s)
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such port"))?;
            Ok(Box::new(std::io::Cursor::new(script.to_vec())))
        }
    }

    #[tokio::test]
    async fn test_detect_first_match_wins() {
        let transport = ScriptedTransport {
            ports: vec![
                ("COM3", None),
                ("COM4", Some(&b"hello\nworld, not a controller\n"[..])),
                ("COM5", Some(&b"|0\nSliders|1|2\n"[..])),
                ("COM6", Some(&b"x\nSliders|3|4\n"[..])),
            ],
        };

        let found = fast_prober().detect(&transport, 115200).await.unwrap();
        assert_eq!(found.port, "COM5");
        assert_eq!(found.sample, "Sliders|1|2");
    }

    #[tokio::test]
    async fn test_detect_nothing_found() {
        let transport = ScriptedTransport {
            ports: vec![("COM3", None), ("COM4", Some(&b"junk\n"[..]))],
        };

        let err = fast_prober().detect(&transport, 9600).await.unwrap_err();
        assert!(matches!(err, DetectError::NoControllerFound { tried: 2 }));
    }
}
