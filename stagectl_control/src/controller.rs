//! Axis controller.
//!
//! # Locking
//!
//! Four locks live in `Shared`. When more than one is needed they are
//! taken in this order: `session` → `cancel` → `axis` → `tracker`. Events are published
//! while `tracker` is held, and a polled readout is ingested before `session`
//! is released, so subscribers see readouts in the order they were read.
//!
//! The owner thread never waits on `session` while an index search runs:
//! `searching` is only set by the owner, and commands check it before
//! touching the session.

use crate::error::ControllerError;
use crate::limits::{Limits, round_position};
use crate::state::{Axis, AxisSnapshot, AxisState};
use crate::status::{AxisEvent, EventKind, Severity, StatusBus, StatusChannel, StatusUpdate};
use crate::tracker::{ReadoutContext, StatusTracker};
use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use parking_lot::Mutex;
use stagectl_common::hal::config::{AxisConfig, AxisKind, Units};
use stagectl_common::hal::driver::{CancelToken, DriverError, IndexSearch, StageDriver};
use stagectl_common::hal::types::{AxisReadout, StageInfo};
use stagectl_common::prelude::DEFAULT_POLL_INTERVAL;
use stagectl_hal::discovery::{PortResolver, SerialPortResolver};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Construction options shared by every axis of a station.
#[derive(Clone)]
pub struct ControllerOptions {
    /// Status poll interval.
    pub poll_interval: Duration,
    /// Serial number → port lookup.
    pub resolver: Arc<dyn PortResolver>,
    /// Where events go. Share one bus to merge several axes.
    pub bus: StatusBus,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            resolver: Arc::new(SerialPortResolver),
            bus: StatusBus::new(),
        }
    }
}

/// What a poll tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollOutcome {
    Polled,
    /// Session held elsewhere (index search), tick dropped.
    Skipped,
    /// Axis disconnected, the worker should exit.
    Stopped,
}

/// State shared between the owner and the workers.
struct Shared {
    name: String,
    session: Mutex<Box<dyn StageDriver>>,
    axis: Mutex<Axis>,
    tracker: Mutex<StatusTracker>,
    bus: StatusBus,
    searching: AtomicBool,
    cancel: Mutex<CancelToken>,
}

impl Shared {
    fn publish(&self, kind: EventKind) {
        self.bus.publish(AxisEvent {
            axis: self.name.clone(),
            kind,
        });
    }

    /// Publish a status if it differs from the last one on its channel.
    fn emit_status(&self, update: StatusUpdate) {
        let mut tracker = self.tracker.lock();
        if let Some(update) = tracker.record(update) {
            self.publish(EventKind::Status(update));
        }
    }

    /// Publish unconditionally and remember it.
    fn force_status(&self, update: StatusUpdate) {
        let mut tracker = self.tracker.lock();
        tracker.record(update.clone());
        self.publish(EventKind::Status(update));
    }

    /// "Disconnected" on every channel.
    fn disconnected_burst(&self) {
        let mut tracker = self.tracker.lock();
        tracker.reset();
        for channel in StatusChannel::ALL {
            self.publish(EventKind::Status(StatusUpdate::disconnected(channel)));
        }
    }

    fn is_searching(&self) -> bool {
        self.searching.load(Ordering::SeqCst)
    }

    /// Run one session operation from the owner thread.
    ///
    /// Skipped while disconnected or searching. A lost session is torn down.
    fn with_session<T>(
        &self,
        what: &str,
        op: impl FnOnce(&mut dyn StageDriver) -> Result<T, DriverError>,
    ) -> Option<T> {
        if self.is_searching() {
            debug!("Axis {}: {} not forwarded during index search", self.name, what);
            return None;
        }
        let mut session = self.session.lock();
        if !self.axis.lock().connected {
            return None;
        }
        match op(&mut **session) {
            Ok(value) => Some(value),
            Err(e) if e.is_session_lost() => {
                self.fail_session(&mut **session, &e);
                None
            }
            Err(e) => {
                warn!("Axis {}: {} failed: {}", self.name, what, e);
                None
            }
        }
    }

    /// Tear down a session that stopped answering. Caller holds `session`.
    fn fail_session(&self, session: &mut dyn StageDriver, cause: &DriverError) {
        error!("Axis {}: communication lost: {}", self.name, cause);
        self.cancel.lock().cancel();

        match session.close() {
            Ok(()) | Err(DriverError::NotOpen) => {}
            Err(e) => warn!("Axis {}: close after failure: {}", self.name, e),
        }

        {
            let mut axis = self.axis.lock();
            axis.connected = false;
            axis.index_found = false;
            axis.last_readout = None;
        }

        self.force_status(StatusUpdate::new(
            StatusChannel::Connection,
            false,
            Severity::Alert,
            "Communication lost",
        ));
        self.disconnected_burst();
    }

    /// One poll tick. Never blocks on the session.
    ///
    /// The session stays locked until the readout is ingested, so two
    /// pollers cannot publish their readouts out of order.
    fn poll_once(&self) -> PollOutcome {
        if !self.axis.lock().connected {
            return PollOutcome::Stopped;
        }
        let Some(mut session) = self.session.try_lock() else {
            trace!("Axis {}: session busy, poll skipped", self.name);
            return PollOutcome::Skipped;
        };
        if !self.axis.lock().connected {
            return PollOutcome::Stopped;
        }

        match session.read_status() {
            Ok(readout) => {
                self.ingest(readout);
                drop(session);
                PollOutcome::Polled
            }
            Err(e) => {
                self.fail_session(&mut **session, &e);
                PollOutcome::Stopped
            }
        }
    }

    /// Feed one readout through change detection.
    fn ingest(&self, readout: AxisReadout) {
        let ctx = {
            let mut axis = self.axis.lock();
            if !axis.connected {
                return;
            }
            axis.estimated_position = round_position(readout.position);
            axis.last_readout = Some(readout);
            ReadoutContext {
                kind: axis.kind,
                desired_position: axis.desired_position,
                limits: axis.limits,
            }
        };

        let mut tracker = self.tracker.lock();
        for kind in tracker.observe(&ctx, &readout) {
            self.publish(kind);
        }
    }

    /// Body of the index-search worker.
    fn run_index_search(&self, search: IndexSearch) {
        let outcome = {
            let mut session = self.session.lock();
            if search.cancel.is_cancelled() || !self.axis.lock().connected {
                debug!("Axis {}: index search dropped before start", self.name);
                None
            } else {
                let result = self.index_sequence(&mut **session, &search);
                if let Err(e) = &result {
                    if e.is_session_lost() {
                        self.fail_session(&mut **session, e);
                    } else if *e != DriverError::Cancelled {
                        if let Err(restore) = self.restore_motion(&mut **session) {
                            warn!("Axis {}: restore after search failed: {}", self.name, restore);
                        }
                    }
                }
                Some(result)
            }
        };

        match outcome {
            None => {}
            Some(Ok(home)) => {
                self.axis.lock().index_found = true;
                info!("Axis {}: index found, desired position {}", self.name, home);
                self.publish(EventKind::DesiredPosition(home));
                self.tracker.lock().forget(StatusChannel::Index);
            }
            Some(Err(DriverError::Cancelled)) => {
                debug!("Axis {}: index search cancelled", self.name);
            }
            Some(Err(e)) if e.is_session_lost() => {}
            Some(Err(e)) => {
                error!("Axis {}: index search failed: {}", self.name, e);
                self.force_status(StatusUpdate::new(
                    StatusChannel::Index,
                    false,
                    Severity::Alert,
                    "Index not found",
                ));
            }
        }

        self.searching.store(false, Ordering::SeqCst);
    }

    /// Raise speed, approach, search, return to 0, restore speed and step size.
    fn index_sequence(
        &self,
        session: &mut dyn StageDriver,
        search: &IndexSearch,
    ) -> Result<f64, DriverError> {
        session.set_speed(search.speed)?;
        session.move_to(search.approach_position)?;
        session.find_index(search)?;

        let home = {
            let mut axis = self.axis.lock();
            axis.desired_position = axis.limits.clamp(0.0);
            axis.desired_position
        };
        session.move_to(home)?;
        self.restore_motion(session)?;
        Ok(home)
    }

    /// Send the stored speed and step size, which may have changed while
    /// the search held the session.
    fn restore_motion(&self, session: &mut dyn StageDriver) -> Result<(), DriverError> {
        let (speed, step_size) = {
            let axis = self.axis.lock();
            (axis.speed, axis.step_size)
        };
        session.set_speed(speed)?;
        session.set_step_size(step_size)
    }
}

/// Periodic poll thread.
struct PollWorker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl PollWorker {
    fn spawn(shared: Arc<Shared>, interval: Duration) -> std::io::Result<Self> {
        let (stop, stop_rx): (Sender<()>, Receiver<()>) = bounded(1);
        let handle = thread::Builder::new()
            .name(format!("poll-{}", shared.name))
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            if shared.poll_once() == PollOutcome::Stopped {
                                break;
                            }
                        }
                    }
                }
                debug!("Axis {}: poll worker exiting", shared.name);
            })?;
        Ok(Self { stop, handle })
    }

    fn stop(self) {
        // Fails only when the worker already exited.
        let _ = self.stop.try_send(());
        if self.handle.join().is_err() {
            error!("Poll worker panicked");
        }
    }
}

/// Controller for one motorized axis.
///
/// Commands take `&mut self` and run on the owner thread. Status arrives on
/// [`subscribe`](Self::subscribe) receivers.
pub struct AxisController {
    config: AxisConfig,
    poll_interval: Duration,
    resolver: Arc<dyn PortResolver>,
    shared: Arc<Shared>,
    poll_worker: Option<PollWorker>,
    search_worker: Option<JoinHandle<()>>,
}

impl AxisController {
    /// Create an unconnected controller.
    ///
    /// Initial limits come from the configuration, or the kind's defaults.
    ///
    /// # Errors
    /// `ControllerError::Configuration` for invalid configured limits or
    /// non-positive speed or step size.
    pub fn new(
        config: AxisConfig,
        driver: Box<dyn StageDriver>,
        options: ControllerOptions,
    ) -> Result<Self, ControllerError> {
        if !(config.speed > 0.0) || !(config.step_size > 0.0) {
            return Err(ControllerError::Configuration(format!(
                "axis {}: speed and step size must be positive",
                config.name
            )));
        }

        let limits = match (config.configured_limits(), config.kind) {
            (Some(pair), _) => Limits::from_pair(pair)?,
            (None, AxisKind::Linear) => Limits::DEFAULT_LINEAR,
            (None, AxisKind::Rotary) => Limits::ROTARY,
        };

        let axis = Axis {
            kind: config.kind,
            units: config.units,
            limits,
            desired_position: limits.clamp(0.0),
            estimated_position: 0.0,
            speed: config.speed,
            step_size: config.step_size,
            connected: false,
            index_found: false,
            has_index: config.index.enabled,
            last_readout: None,
        };

        debug!(
            "Axis {} created ({:?}, {} driver)",
            config.name,
            config.kind,
            driver.name()
        );

        let shared = Arc::new(Shared {
            name: config.name.clone(),
            session: Mutex::new(driver),
            axis: Mutex::new(axis),
            tracker: Mutex::new(StatusTracker::new()),
            bus: options.bus,
            searching: AtomicBool::new(false),
            cancel: Mutex::new(CancelToken::new()),
        });

        Ok(Self {
            config,
            poll_interval: options.poll_interval,
            resolver: options.resolver,
            shared,
            poll_worker: None,
            search_worker: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &AxisConfig {
        &self.config
    }

    /// Receiver for every event published from now on.
    pub fn subscribe(&self) -> Receiver<AxisEvent> {
        self.shared.bus.subscribe()
    }

    // ─── Commands ───────────────────────────────────────────────────

    /// Normalize, store and (when connected) transmit a new target.
    ///
    /// Returns the stored value. A communication failure while transmitting
    /// disconnects the axis but is not an error here.
    ///
    /// # Errors
    /// - `IndexSearchInProgress` while an index search runs
    /// - `OutOfRange` for a rotary target more than one turn out, or NaN
    pub fn set_desired_position(&mut self, value: f64) -> Result<f64, ControllerError> {
        if self.shared.is_searching() {
            warn!(
                "Axis {}: position {} refused during index search",
                self.name(),
                value
            );
            return Err(ControllerError::IndexSearchInProgress(self.name().to_string()));
        }

        let normalized = {
            let mut axis = self.shared.axis.lock();
            let normalized = axis.limits.normalize(axis.kind, value)?;
            axis.desired_position = normalized;
            normalized
        };
        if normalized != value {
            debug!("Axis {}: {} corrected to {}", self.name(), value, normalized);
        }

        self.shared
            .with_session("move", |session| session.move_to(normalized));
        self.shared.publish(EventKind::DesiredPosition(normalized));
        Ok(normalized)
    }

    /// Move by `delta`, or by the step size when None.
    pub fn step(&mut self, delta: Option<f64>) -> Result<f64, ControllerError> {
        let target = {
            let axis = self.shared.axis.lock();
            axis.desired_position + delta.unwrap_or(axis.step_size)
        };
        self.set_desired_position(target)
    }

    /// Store and forward a speed.
    pub fn set_speed(&mut self, speed: f64) {
        self.shared.axis.lock().speed = speed;
        self.shared
            .with_session("speed", |session| session.set_speed(speed));
        self.shared.publish(EventKind::Speed(speed));
    }

    /// Store and forward a step size.
    pub fn set_step_size(&mut self, step_size: f64) {
        self.shared.axis.lock().step_size = step_size;
        self.shared
            .with_session("step size", |session| session.set_step_size(step_size));
        self.shared.publish(EventKind::StepSize(step_size));
    }

    /// Open the hardware session and start polling.
    ///
    /// Connecting an already connected axis does nothing. Failures are
    /// published on the connection channel and returned; there is no retry.
    ///
    /// # Errors
    /// - `DeviceNotFound` when no port is configured or discovered
    /// - `ConnectionFailed` when the session does not open
    /// - `CommunicationLost` when the stage stops answering during setup
    pub fn connect(&mut self) -> Result<(), ControllerError> {
        if self.is_connected() {
            debug!("Axis {} already connected", self.name());
            return Ok(());
        }
        self.join_workers();

        let Some(port) = self.resolve_port() else {
            let err = ControllerError::DeviceNotFound {
                axis: self.name().to_string(),
                serial: self.config.serial_number.clone(),
            };
            error!("{}", err);
            self.shared.force_status(StatusUpdate::new(
                StatusChannel::Connection,
                false,
                Severity::Alert,
                "Device not found",
            ));
            return Err(err);
        };

        let (speed, step_size) = {
            let axis = self.shared.axis.lock();
            (axis.speed, axis.step_size)
        };

        let mut session = self.shared.session.lock();
        let info = match session.open(&port) {
            Ok(info) => info,
            Err(source) => {
                drop(session);
                return Err(self.connection_failed(source));
            }
        };

        let (limits, units) = self.resolve_stage(&info);
        if let Err(source) = configure_session(&mut **session, units, speed, step_size) {
            if let Err(e) = session.close() {
                debug!("Axis {}: close after failed setup: {}", self.name(), e);
            }
            drop(session);
            if !source.is_session_lost() {
                return Err(self.connection_failed(source));
            }
            error!("Axis {}: communication lost during setup: {}", self.name(), source);
            self.shared.force_status(StatusUpdate::new(
                StatusChannel::Connection,
                false,
                Severity::Alert,
                "Communication lost",
            ));
            return Err(ControllerError::CommunicationLost {
                axis: self.name().to_string(),
                source,
            });
        }

        let (desired, clamped) = {
            let mut axis = self.shared.axis.lock();
            axis.kind = info.kind;
            axis.units = units;
            axis.limits = limits;
            axis.has_index = info.has_index;
            axis.index_found = !info.has_index;
            axis.connected = true;
            axis.last_readout = None;
            let clamped = limits.clamp(axis.desired_position);
            let changed = clamped != axis.desired_position;
            axis.desired_position = clamped;
            (clamped, changed)
        };
        drop(session);

        self.shared.tracker.lock().reset();
        if !info.kind.is_linear() {
            self.shared
                .force_status(StatusUpdate::unlimited_rotation(StatusChannel::LowLimit));
            self.shared
                .force_status(StatusUpdate::unlimited_rotation(StatusChannel::HighLimit));
        }
        if clamped {
            self.shared.publish(EventKind::DesiredPosition(desired));
        }

        match PollWorker::spawn(Arc::clone(&self.shared), self.poll_interval) {
            Ok(worker) => self.poll_worker = Some(worker),
            Err(e) => {
                self.disconnect();
                return Err(ControllerError::WorkerSpawn {
                    axis: self.name().to_string(),
                    reason: e.to_string(),
                });
            }
        }

        self.shared.force_status(StatusUpdate::new(
            StatusChannel::Connection,
            true,
            Severity::Ok,
            "Connected",
        ));
        self.shared.publish(EventKind::StepSize(step_size));

        info!(
            "Axis {} connected on {} ({:?}, [{}, {}] {})",
            self.name(),
            port,
            info.kind,
            limits.low(),
            limits.high(),
            units.symbol()
        );
        Ok(())
    }

    /// Stop the workers, close the session, publish "Disconnected" everywhere.
    ///
    /// Safe to call at any time, including during an index search: the
    /// search is cancelled and joined before the session is closed.
    pub fn disconnect(&mut self) {
        self.shared.cancel.lock().cancel();
        self.join_workers();

        {
            let mut session = self.shared.session.lock();
            match session.close() {
                Ok(()) | Err(DriverError::NotOpen) => {}
                Err(e) => warn!("Axis {}: close failed: {}", self.name(), e),
            }
            let mut axis = self.shared.axis.lock();
            if axis.connected {
                info!("Axis {} disconnected", self.shared.name);
            }
            axis.connected = false;
            axis.index_found = false;
            axis.last_readout = None;
        }

        self.shared.disconnected_burst();
    }

    /// Start an index search on a worker thread.
    ///
    /// Does nothing while disconnected or on stages without an index.
    ///
    /// # Errors
    /// `IndexSearchInProgress` if a search is already running.
    pub fn find_index(&mut self) -> Result<(), ControllerError> {
        {
            let axis = self.shared.axis.lock();
            if !axis.connected {
                debug!("Axis {}: find index ignored, not connected", self.name());
                return Ok(());
            }
            if !axis.has_index {
                debug!("Axis {}: stage has no index", self.name());
                return Ok(());
            }
        }

        if self
            .shared
            .searching
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Axis {}: index search already running", self.name());
            return Err(ControllerError::IndexSearchInProgress(self.name().to_string()));
        }
        if let Some(previous) = self.search_worker.take() {
            if previous.join().is_err() {
                error!("Axis {}: previous index worker panicked", self.name());
            }
        }

        let token = CancelToken::new();
        *self.shared.cancel.lock() = token.clone();
        self.shared.axis.lock().index_found = false;

        let search = IndexSearch::blocking(self.config.index.speed, self.config.index.approach_position)
            .with_timeout(self.config.index.timeout())
            .with_cancel(token);

        self.shared.emit_status(StatusUpdate::new(
            StatusChannel::Index,
            true,
            Severity::Busy,
            "Searching index",
        ));
        info!("Axis {}: searching index", self.name());

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("index-{}", self.name()))
            .spawn(move || shared.run_index_search(search));

        match spawned {
            Ok(handle) => {
                self.search_worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.searching.store(false, Ordering::SeqCst);
                Err(ControllerError::WorkerSpawn {
                    axis: self.name().to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Read the hardware once, outside the poll schedule.
    ///
    /// Does nothing while disconnected or while the session is busy.
    pub fn poll_status(&self) {
        self.shared.poll_once();
    }

    /// Feed a readout from an event-driven source through change detection.
    pub fn ingest_readout(&self, readout: AxisReadout) {
        self.shared.ingest(readout);
    }

    // ─── Accessors ──────────────────────────────────────────────────

    pub fn desired_position(&self) -> f64 {
        self.shared.axis.lock().desired_position
    }

    /// Last rounded readout. Stale when disconnected.
    pub fn estimated_position(&self) -> f64 {
        self.shared.axis.lock().estimated_position
    }

    pub fn speed(&self) -> f64 {
        self.shared.axis.lock().speed
    }

    pub fn step_size(&self) -> f64 {
        self.shared.axis.lock().step_size
    }

    pub fn limits(&self) -> Limits {
        self.shared.axis.lock().limits
    }

    pub fn kind(&self) -> AxisKind {
        self.shared.axis.lock().kind
    }

    pub fn units(&self) -> Units {
        self.shared.axis.lock().units
    }

    pub fn is_connected(&self) -> bool {
        self.shared.axis.lock().connected
    }

    pub fn is_index_found(&self) -> bool {
        self.shared.axis.lock().index_found
    }

    pub fn is_searching(&self) -> bool {
        self.shared.is_searching()
    }

    pub fn state(&self) -> AxisState {
        let searching = self.shared.is_searching();
        self.shared.axis.lock().state(searching)
    }

    pub fn snapshot(&self) -> AxisSnapshot {
        let searching = self.shared.is_searching();
        let axis = self.shared.axis.lock();
        AxisSnapshot {
            name: self.shared.name.clone(),
            kind: axis.kind,
            units: axis.units,
            state: axis.state(searching),
            connected: axis.connected,
            index_found: axis.index_found,
            desired_position: axis.desired_position,
            estimated_position: axis
                .last_readout
                .filter(|_| axis.connected)
                .map(|_| axis.estimated_position),
            speed: axis.speed,
            step_size: axis.step_size,
            low_limit: axis.limits.low(),
            high_limit: axis.limits.high(),
        }
    }

    // ─── Internals ──────────────────────────────────────────────────

    fn resolve_port(&self) -> Option<String> {
        if let Some(port) = &self.config.port {
            return Some(port.clone());
        }
        let serial = self.config.serial_number.as_deref()?;
        let port = self.resolver.resolve(serial);
        match &port {
            Some(port) => debug!("Axis {}: serial {} on {}", self.name(), serial, port),
            None => debug!("Axis {}: serial {} not attached", self.name(), serial),
        }
        port
    }

    /// Limits and units for the stage reported on open.
    fn resolve_stage(&self, info: &StageInfo) -> (Limits, Units) {
        if !info.kind.is_linear() {
            if self.config.units != Units::Deg {
                warn!(
                    "Axis {}: units of a rotary stage must be degrees, {} replaced",
                    self.name(),
                    self.config.units.symbol()
                );
            }
            return (Limits::ROTARY, Units::Deg);
        }

        let units = self.config.units;
        let to_axis_units = |v: f64| units.from_base(info.units.to_base(v));
        let configured = self.config.configured_limits();
        let low = info
            .low_limit
            .map(to_axis_units)
            .or(configured.map(|(low, _)| low))
            .unwrap_or(Limits::DEFAULT_LINEAR.low());
        let high = info
            .high_limit
            .map(to_axis_units)
            .or(configured.map(|(_, high)| high))
            .unwrap_or(Limits::DEFAULT_LINEAR.high());

        let limits = Limits::new(low, high).unwrap_or_else(|e| {
            error!(
                "Axis {}: {}; falling back to [{}, {}]",
                self.name(),
                e,
                Limits::FALLBACK.low(),
                Limits::FALLBACK.high()
            );
            Limits::FALLBACK
        });
        (limits, units)
    }

    fn connection_failed(&self, source: DriverError) -> ControllerError {
        error!("Axis {}: connection failed: {}", self.name(), source);
        self.shared.force_status(StatusUpdate::new(
            StatusChannel::Connection,
            false,
            Severity::Alert,
            "Connection failed",
        ));
        ControllerError::ConnectionFailed {
            axis: self.name().to_string(),
            source,
        }
    }

    fn join_workers(&mut self) {
        if let Some(handle) = self.search_worker.take() {
            if handle.join().is_err() {
                error!("Axis {}: index worker panicked", self.name());
            }
            self.shared.searching.store(false, Ordering::SeqCst);
        }
        if let Some(worker) = self.poll_worker.take() {
            worker.stop();
        }
    }
}

impl Drop for AxisController {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Apply units and motion parameters to a freshly opened session.
fn configure_session(
    session: &mut dyn StageDriver,
    units: Units,
    speed: f64,
    step_size: f64,
) -> Result<(), DriverError> {
    session.set_units(units)?;
    session.set_speed(speed)?;
    session.set_step_size(step_size)
}
