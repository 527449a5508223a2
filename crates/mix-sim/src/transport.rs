//! Virtual port transport

use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mix_detect::{BoxedStream, DetectError, Transport};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;

use crate::firmware::VirtualController;

const DUPLEX_BUFFER: usize = 4096;

/// What sits behind a virtual port
#[derive(Debug, Clone)]
pub enum VirtualPort {
    /// A control surface that writes `greeting` on every connect
    Controller { greeting: Vec<String> },
    /// Opens fine, never says anything
    Silent,
    /// Some other device writing these lines
    Foreign(Vec<String>),
}

impl VirtualPort {
    /// A controller that stays quiet until told to send something
    pub fn controller() -> Self {
        Self::Controller {
            greeting: Vec::new(),
        }
    }

    /// A controller that streams two slider lines on connect, enough to be detected
    pub fn detectable_controller(num_sliders: usize) -> Self {
        let line = format!("Sliders{}", "|0".repeat(num_sliders));
        Self::Controller {
            greeting: vec![line.clone(), line],
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A [`Transport`] over in-memory ports
#[derive(Debug)]
pub struct VirtualControllerTransport {
    ports: Mutex<Vec<(String, VirtualPort)>>,
    refuse_opens: AtomicBool,
    opens: AtomicUsize,
    connections: Mutex<Vec<Arc<VirtualController>>>,
    connection_count: watch::Sender<usize>,
    idle: Mutex<Vec<DuplexStream>>,
}

impl VirtualControllerTransport {
    pub fn new() -> Self {
        Self {
            ports: Mutex::new(Vec::new()),
            refuse_opens: AtomicBool::new(false),
            opens: AtomicUsize::new(0),
            connections: Mutex::new(Vec::new()),
            connection_count: watch::Sender::new(0),
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Builder: add a port
    pub fn with_port(self, name: &str, port: VirtualPort) -> Self {
        self.add_port(name, port);
        self
    }

    /// Add a port; candidates are probed in insertion order
    pub fn add_port(&self, name: &str, port: VirtualPort) {
        lock(&self.ports).push((name.to_string(), port));
    }

    /// Unplug a port so opening it fails
    pub fn remove_port(&self, name: &str) {
        lock(&self.ports).retain(|(n, _)| n != name);
    }

    /// Make every open fail until cleared
    pub fn set_refuse_opens(&self, refuse: bool) {
        self.refuse_opens.store(refuse, Ordering::SeqCst);
    }

    /// Open attempts so far, failed ones included
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Controller connections made so far, oldest first
    pub fn connections(&self) -> Vec<Arc<VirtualController>> {
        lock(&self.connections).clone()
    }

    /// Wait until at least `n` controller connections were made and return the n-th
    pub async fn wait_for_connection(
        &self,
        n: usize,
        wait: Duration,
    ) -> Option<Arc<VirtualController>> {
        let mut count = self.connection_count.subscribe();
        tokio::time::timeout(wait, count.wait_for(|c| *c >= n))
            .await
            .ok()?
            .ok()?;
        n.checked_sub(1)
            .and_then(|i| lock(&self.connections).get(i).cloned())
    }

    fn open_port(&self, name: &str, port: VirtualPort) -> io::Result<BoxedStream> {
        let runtime = Handle::try_current().map_err(io::Error::other)?;
        let (host, device) = tokio::io::duplex(DUPLEX_BUFFER);

        match port {
            VirtualPort::Controller { greeting } => {
                let _guard = runtime.enter();
                let controller = Arc::new(VirtualController::spawn(name, device, greeting));
                let count = {
                    let mut connections = lock(&self.connections);
                    connections.push(controller);
                    connections.len()
                };
                self.connection_count.send_replace(count);
            }
            VirtualPort::Silent => lock(&self.idle).push(device),
            VirtualPort::Foreign(lines) => {
                let mut device = device;
                runtime.spawn(async move {
                    for line in lines {
                        if device.write_all(format!("{}\r\n", line).as_bytes()).await.is_err() {
                            break;
                        }
                    }
                    // Keep the line open like a real device would
                    std::future::pending::<()>().await
                });
            }
        }

        Ok(Box::new(host))
    }
}

impl Default for VirtualControllerTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for VirtualControllerTransport {
    fn candidate_ports(&self) -> Result<Vec<String>, DetectError> {
        Ok(lock(&self.ports).iter().map(|(n, _)| n.clone()).collect())
    }

    fn open(&self, port: &str, baud_rate: u32) -> io::Result<BoxedStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        debug!("Opening virtual port {} at {} baud", port, baud_rate);

        if self.refuse_opens.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is busy", port),
            ));
        }

        let kind = lock(&self.ports)
            .iter()
            .find(|(n, _)| n == port)
            .map(|(_, p)| p.clone())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no port {}", port)))?;

        self.open_port(port, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mix_detect::{ControllerProber, ProbeConfig};

    fn fast_prober() -> ControllerProber {
        ControllerProber::with_config(ProbeConfig {
            settle_delay: Duration::from_millis(1),
            line_timeout: Duration::from_millis(200),
        })
    }

    #[tokio::test]
    async fn test_detects_only_the_controller() {
        let transport = VirtualControllerTransport::new()
            .with_port("ttyS0", VirtualPort::Silent)
            .with_port("ttyUSB0", VirtualPort::Foreign(vec!["AT".into(), "+CME ERROR: 10".into()]))
            .with_port("ttyACM0", VirtualPort::detectable_controller(3));

        let found = fast_prober().detect(&transport, 115200).await.unwrap();
        assert_eq!(found.port, "ttyACM0");
        assert_eq!(found.sample, "Sliders|0|0|0");
        assert_eq!(transport.open_count(), 3);
    }

    #[tokio::test]
    async fn test_refused_and_missing_ports() {
        let transport = VirtualControllerTransport::new().with_port("sim0", VirtualPort::controller());
        assert!(transport.open("nope", 9600).is_err());

        transport.set_refuse_opens(true);
        assert!(transport.open("sim0", 9600).is_err());

        transport.set_refuse_opens(false);
        assert!(transport.open("sim0", 9600).is_ok());
        assert!(transport
            .wait_for_connection(1, Duration::from_secs(1))
            .await
            .is_some());
    }
}
