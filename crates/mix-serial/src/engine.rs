//! Serial engine lifecycle
//!
//! [`SerialIo`] owns the controller connection. `start` finds and opens the
//! port, then two tasks run until `stop`: the read loop, which frames lines,
//! dispatches them and reconnects after a lost connection, and a config
//! watcher, which resets slider baselines and moves the connection when the
//! port settings change.

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use mix_config::{ConfigChanged, ConfigHandle, SerialConnectionInfo};
use mix_detect::{BoxedStream, ControllerProber, DetectError, ProbeConfig, Transport};
use mix_protocol::{
    ButtonsController, ControllerResponse, LineCodec, MuteButtonConsumer, OutputDeviceConsumer,
    SliderBaselines, SliderMoveEvent, SlidersController,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{broadcast, mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SerialError;
use crate::notifier::Notifier;
use crate::state::ConnectionState;

/// Room per slider subscriber; a full channel stalls the read loop
const SUBSCRIBER_CAPACITY: usize = 1;

/// Timing knobs for the engine
#[derive(Debug, Clone)]
pub struct SerialIoConfig {
    /// Wait between losing the port and the next connection attempt
    pub reconnect_delay: Duration,
    /// Wait after a config change before slider baselines are reset
    pub baseline_settle_delay: Duration,
    /// Detection timing used when the port is `"auto"`
    pub probe: ProbeConfig,
    /// Bytes read per call
    pub read_buffer_size: usize,
}

impl Default for SerialIoConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(500),
            baseline_settle_delay: Duration::from_millis(50),
            probe: ProbeConfig::default(),
            read_buffer_size: 1024,
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Why a connected read session ended
enum ReadOutcome {
    Stopped,
    Lost,
    SettingsChanged,
}

pub(crate) struct Inner {
    pub(crate) config: ConfigHandle,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    prober: ControllerProber,
    timing: SerialIoConfig,
    /// Port settings the current connection was made with
    settings: Mutex<SerialConnectionInfo>,
    active_port: Mutex<Option<String>>,
    state: watch::Sender<ConnectionState>,
    pub(crate) writer: tokio::sync::Mutex<Option<WriteHalf<BoxedStream>>>,
    pub(crate) subscribers: Mutex<Vec<mpsc::Sender<SliderMoveEvent>>>,
    pub(crate) mute_consumer: RwLock<Option<Arc<dyn MuteButtonConsumer>>>,
    pub(crate) device_consumer: RwLock<Option<Arc<dyn OutputDeviceConsumer>>>,
    pub(crate) baselines: Mutex<SliderBaselines>,
    reconnect: Notify,
    stop: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Serial protocol engine
///
/// Cheap to clone; clones share one connection. Implements both
/// [`SlidersController`] and [`ButtonsController`].
#[derive(Clone)]
pub struct SerialIo {
    inner: Arc<Inner>,
}

impl SerialIo {
    /// Create an engine with default timing
    pub fn new(
        config: ConfigHandle,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::with_config(config, transport, notifier, SerialIoConfig::default())
    }

    /// Create an engine with custom timing
    pub fn with_config(
        config: ConfigHandle,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
        timing: SerialIoConfig,
    ) -> Self {
        let snapshot = config.snapshot();
        let inner = Inner {
            settings: Mutex::new(snapshot.serial_connection_info.clone()),
            baselines: Mutex::new(SliderBaselines::new(snapshot.num_sliders())),
            config,
            transport,
            notifier,
            prober: ControllerProber::with_config(timing.probe.clone()),
            timing,
            active_port: Mutex::new(None),
            state: watch::Sender::new(ConnectionState::Unconfigured),
            writer: tokio::sync::Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            mute_consumer: RwLock::new(None),
            device_consumer: RwLock::new(None),
            reconnect: Notify::new(),
            stop: watch::Sender::new(false),
            tasks: Mutex::new(Vec::new()),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Watch connection state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Port of the live connection, if any
    pub fn active_port(&self) -> Option<String> {
        lock(&self.inner.active_port).clone()
    }

    /// Number of live slider subscribers
    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).len()
    }

    /// Connect to the controller and start reading
    ///
    /// With port `"auto"` the candidates are probed first. Failing to find a
    /// controller or to open the port notifies the user and returns an error;
    /// the first connection is never retried. Once running, lost connections
    /// are retried until [`SerialIo::stop`].
    pub async fn start(&self) -> Result<(), SerialError> {
        let inner = &self.inner;
        if !lock(&inner.tasks).is_empty() {
            return Err(SerialError::AlreadyStarted);
        }

        let config = inner.config.snapshot();
        let info = config.serial_connection_info.clone();
        *lock(&inner.settings) = info.clone();
        lock(&inner.baselines).reset(config.num_sliders());
        inner.stop.send_replace(false);

        let port = if info.is_auto() {
            info!("Auto-detecting controller port");
            match inner.detect(info.baud_rate).await {
                Ok(port) => port,
                Err(e) => {
                    warn!("Auto-detect failed: {}", e);
                    inner.notifier.notify(
                        "Serial auto-detect failed",
                        "Could not find the controller on any serial port. Set com_port in the config.",
                    );
                    inner.set_state(ConnectionState::Stopped);
                    return Err(SerialError::AutoDetectFailed(e));
                }
            }
        } else {
            info.com_port.clone()
        };

        let reader = match inner.connect(&port, info.baud_rate).await {
            Ok(reader) => reader,
            Err(source) => {
                warn!("Failed to open {}: {}", port, source);
                inner.notifier.notify(
                    "Serial connection failed",
                    &format!(
                        "Could not connect to {}. Check the cable and the com_port setting.",
                        port
                    ),
                );
                inner.set_state(ConnectionState::Stopped);
                return Err(SerialError::InitialConnectFailed { port, source });
            }
        };

        // Subscribe before spawning so nothing sent in between is missed
        let changes = inner.config.subscribe_to_changes();
        if inner.config.snapshot().serial_connection_info != info {
            inner.on_config_changed();
        }
        let read_stop = inner.stop.subscribe();
        let watch_stop = inner.stop.subscribe();

        let mut tasks = lock(&inner.tasks);
        tasks.push(tokio::spawn(
            Arc::clone(inner).run_read_loop(reader, read_stop),
        ));
        tasks.push(tokio::spawn(
            Arc::clone(inner).watch_config(changes, watch_stop),
        ));
        Ok(())
    }

    /// Stop reading and close the port
    pub async fn stop(&self) {
        let inner = &self.inner;
        inner.stop.send_replace(true);

        let tasks = std::mem::take(&mut *lock(&inner.tasks));
        for task in tasks {
            // The read loop may be parked on a full subscriber channel
            task.abort();
            let _ = task.await;
        }

        if let Some(mut writer) = inner.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        *lock(&inner.active_port) = None;
        inner.set_state(ConnectionState::Stopped);
        info!("Serial engine stopped");
    }

    /// Dispatch one line and return the reply, without writing it
    pub async fn handle_line(&self, line: &str) -> Option<ControllerResponse> {
        self.inner.handle_line(line).await
    }

    /// Write a reply to the controller; dropped with a warning when disconnected
    pub async fn send_response(&self, response: &ControllerResponse) {
        self.inner.send_response(response).await
    }
}

impl fmt::Debug for SerialIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialIo")
            .field("state", &self.state())
            .field("active_port", &self.active_port())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl SlidersController for SerialIo {
    fn subscribe_to_slider_move_events(&self) -> mpsc::Receiver<SliderMoveEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        lock(&self.inner.subscribers).push(tx);
        rx
    }
}

impl ButtonsController for SerialIo {
    fn set_mute_button_consumer(&self, consumer: Arc<dyn MuteButtonConsumer>) {
        *self
            .inner
            .mute_consumer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(consumer);
    }

    fn set_output_device_consumer(&self, consumer: Arc<dyn OutputDeviceConsumer>) {
        *self
            .inner
            .device_consumer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(consumer);
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Connection state {} -> {}", previous, state);
        }
    }

    async fn detect(&self, baud_rate: u32) -> Result<String, DetectError> {
        self.set_state(ConnectionState::Detecting);
        let found = self.prober.detect(self.transport.as_ref(), baud_rate).await?;
        info!("Detected controller on {}", found.port);
        Ok(found.port)
    }

    async fn connect(&self, port: &str, baud_rate: u32) -> io::Result<ReadHalf<BoxedStream>> {
        self.set_state(ConnectionState::Connecting);
        let stream = self.transport.open(port, baud_rate)?;
        let (reader, writer) = tokio::io::split(stream);

        *self.writer.lock().await = Some(writer);
        *lock(&self.active_port) = Some(port.to_string());
        self.set_state(ConnectionState::Connected);
        info!("Connected to {} at {} baud", port, baud_rate);
        Ok(reader)
    }

    async fn disconnect(&self) {
        *self.writer.lock().await = None;
        *lock(&self.active_port) = None;
        self.set_state(ConnectionState::Disconnected);
    }

    /// One connection attempt with the current settings
    async fn reconnect_once(&self) -> Result<ReadHalf<BoxedStream>, SerialError> {
        let result = self.try_reconnect().await;
        if result.is_err() {
            self.set_state(ConnectionState::Disconnected);
        }
        result
    }

    async fn try_reconnect(&self) -> Result<ReadHalf<BoxedStream>, SerialError> {
        let info = lock(&self.settings).clone();
        let port = if info.is_auto() {
            self.detect(info.baud_rate).await?
        } else {
            info.com_port.clone()
        };

        let reader = self
            .connect(&port, info.baud_rate)
            .await
            .map_err(|source| SerialError::Open { port, source })?;

        // A change that landed while detecting or connecting was not signalled
        if *lock(&self.settings) != info {
            debug!("Serial settings changed while connecting");
            self.reconnect.notify_one();
        }
        Ok(reader)
    }

    async fn run_read_loop(
        self: Arc<Self>,
        reader: ReadHalf<BoxedStream>,
        mut stop: watch::Receiver<bool>,
    ) {
        info!("Starting read loop");
        let mut reader = Some(reader);

        loop {
            if *stop.borrow_and_update() {
                break;
            }

            let Some(current) = reader.take() else {
                tokio::select! {
                    _ = stop.changed() => break,
                    _ = tokio::time::sleep(self.timing.reconnect_delay) => {}
                }
                match self.reconnect_once().await {
                    Ok(fresh) => reader = Some(fresh),
                    Err(e) => warn!("Reconnect failed: {}", e),
                }
                continue;
            };

            match self.read_until_disconnect(current, &mut stop).await {
                ReadOutcome::Stopped => break,
                ReadOutcome::Lost => self.disconnect().await,
                ReadOutcome::SettingsChanged => {
                    info!("Serial settings changed, reconnecting");
                    self.disconnect().await;
                }
            }
        }

        info!("Read loop ended");
    }

    async fn read_until_disconnect(
        &self,
        mut reader: ReadHalf<BoxedStream>,
        stop: &mut watch::Receiver<bool>,
    ) -> ReadOutcome {
        let mut codec = LineCodec::new();
        let mut buf = vec![0u8; self.timing.read_buffer_size];

        loop {
            tokio::select! {
                _ = stop.changed() => return ReadOutcome::Stopped,
                _ = self.reconnect.notified() => return ReadOutcome::SettingsChanged,
                result = reader.read(&mut buf) => match result {
                    Ok(0) => {
                        warn!("Serial connection closed");
                        return ReadOutcome::Lost;
                    }
                    Ok(n) => {
                        codec.push_bytes(&buf[..n]);
                        while let Some(line) = codec.next_line() {
                            self.process_line(&line).await;
                        }
                    }
                    Err(e) => {
                        warn!("Error reading from serial port: {}", e);
                        return ReadOutcome::Lost;
                    }
                },
            }
        }
    }

    async fn watch_config(
        self: Arc<Self>,
        mut changes: broadcast::Receiver<ConfigChanged>,
        mut stop: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = stop.changed() => break,
                change = changes.recv() => match change {
                    Ok(ConfigChanged) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        self.on_config_changed();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }

    fn on_config_changed(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(inner.timing.baseline_settle_delay).await;
            let count = inner.config.snapshot().num_sliders();
            lock(&inner.baselines).reset(count);
            debug!(count, "Slider baselines reset");
        });

        let fresh = self.config.snapshot().serial_connection_info.clone();
        let mut settings = lock(&self.settings);
        if *settings == fresh {
            return;
        }

        info!(
            old_port = %settings.com_port,
            new_port = %fresh.com_port,
            old_baud = settings.baud_rate,
            new_baud = fresh.baud_rate,
            "Serial settings updated"
        );
        *settings = fresh;
        drop(settings);

        if self.state.borrow().is_connected() {
            self.reconnect.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mix_config::Config;
    use tokio::io::{duplex, AsyncBufReadExt, BufReader, DuplexStream};

    /// Hands out one pre-made stream, then refuses
    struct OneShotTransport {
        stream: Mutex<Option<DuplexStream>>,
    }

    impl Transport for OneShotTransport {
        fn candidate_ports(&self) -> Result<Vec<String>, DetectError> {
            Ok(vec!["ttyTEST".to_string()])
        }

        fn open(&self, port: &str, _baud_rate: u32) -> io::Result<BoxedStream> {
            lock(&self.stream)
                .take()
                .map(|s| Box::new(s) as BoxedStream)
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, port.to_string()))
        }
    }

    fn engine_with_stream() -> (SerialIo, DuplexStream) {
        let (host, device) = duplex(1024);
        let config = Config::from_json(
            r#"{ "slider_mapping": { "0": "master" }, "serial_connection_info": { "com_port": "ttyTEST" } }"#,
        )
        .unwrap();
        let transport = Arc::new(OneShotTransport {
            stream: Mutex::new(Some(host)),
        });
        let engine = SerialIo::new(ConfigHandle::new(config), transport, Arc::new(|_: &str, _: &str| {}));
        (engine, device)
    }

    #[tokio::test]
    async fn test_start_connects_and_replies() {
        let (engine, device) = engine_with_stream();
        assert_eq!(engine.state(), ConnectionState::Unconfigured);

        engine.start().await.unwrap();
        assert_eq!(engine.state(), ConnectionState::Connected);
        assert_eq!(engine.active_port().as_deref(), Some("ttyTEST"));

        let (rd, mut wr) = tokio::io::split(device);
        wr.write_all(b"Sliders|4095\r\n").await.unwrap();

        let mut lines = BufReader::new(rd).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("OK"));

        engine.stop().await;
        assert_eq!(engine.state(), ConnectionState::Stopped);
        assert_eq!(engine.active_port(), None);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let (engine, _device) = engine_with_stream();
        engine.start().await.unwrap();
        assert!(matches!(engine.start().await, Err(SerialError::AlreadyStarted)));
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_subscribers_are_counted() {
        let (engine, _device) = engine_with_stream();
        let _a = engine.subscribe_to_slider_move_events();
        let _b = engine.subscribe_to_slider_move_events();
        assert_eq!(engine.subscriber_count(), 2);
    }

    #[test]
    fn test_default_timing() {
        let timing = SerialIoConfig::default();
        assert_eq!(timing.reconnect_delay, Duration::from_millis(500));
        assert_eq!(timing.baseline_settle_delay, Duration::from_millis(50));
    }
}
