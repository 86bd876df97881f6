//! Controller behaviour against a scripted driver.
//!
//! The poll interval is set far out so every readout in these tests comes
//! from an explicit `poll_status()` call, except in the poll worker tests.

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use stagectl_common::hal::config::{AxisConfig, Units};
use stagectl_common::hal::driver::{DriverError, IndexSearch, StageDriver};
use stagectl_common::hal::types::{AxisReadout, StageInfo, StatusFlags};
use stagectl_control::{
    AxisController, AxisEvent, AxisState, ControllerError, ControllerOptions, EventKind, Severity,
    StatusBus, StatusChannel, StatusUpdate,
};
use stagectl_hal::discovery::FixedPortResolver;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const SERIAL: &str = "7583835373835180D020";
const PORT: &str = "/dev/ttyACM0";

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Open(String),
    Close,
    Units(Units),
    Speed(f64),
    StepSize(f64),
    MoveTo(f64),
    Read,
    FindIndex,
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<Call>,
    info: Option<StageInfo>,
    open_error: Option<DriverError>,
    readout: AxisReadout,
    fail_reads: bool,
    fail_moves: bool,
    fail_setup: bool,
    /// find_index waits until this is cleared or the search is cancelled.
    block_search: bool,
    search_error: Option<DriverError>,
    /// Added to the readout position after every read.
    ramp: f64,
    open: bool,
}

struct MockDriver {
    script: Arc<Mutex<Script>>,
}

impl MockDriver {
    fn record(&self, call: Call) {
        self.script.lock().calls.push(call);
    }
}

impl StageDriver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn open(&mut self, port: &str) -> Result<StageInfo, DriverError> {
        let mut script = self.script.lock();
        script.calls.push(Call::Open(port.to_string()));
        if let Some(e) = script.open_error.clone() {
            return Err(e);
        }
        script.open = true;
        Ok(script.info.unwrap_or(StageInfo::linear(Units::Mm)))
    }

    fn close(&mut self) -> Result<(), DriverError> {
        let mut script = self.script.lock();
        if !script.open {
            return Err(DriverError::NotOpen);
        }
        script.open = false;
        script.calls.push(Call::Close);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.script.lock().open
    }

    fn set_units(&mut self, units: Units) -> Result<(), DriverError> {
        let mut script = self.script.lock();
        script.calls.push(Call::Units(units));
        if script.fail_setup {
            return Err(DriverError::Communication("no answer".to_string()));
        }
        Ok(())
    }

    fn set_speed(&mut self, speed: f64) -> Result<(), DriverError> {
        self.record(Call::Speed(speed));
        Ok(())
    }

    fn set_step_size(&mut self, step: f64) -> Result<(), DriverError> {
        self.record(Call::StepSize(step));
        Ok(())
    }

    fn move_to(&mut self, position: f64) -> Result<(), DriverError> {
        let mut script = self.script.lock();
        script.calls.push(Call::MoveTo(position));
        if script.fail_moves {
            return Err(DriverError::Communication("write failed".to_string()));
        }
        Ok(())
    }

    fn read_status(&mut self) -> Result<AxisReadout, DriverError> {
        let mut script = self.script.lock();
        if script.fail_reads {
            return Err(DriverError::Communication("no answer".to_string()));
        }
        script.calls.push(Call::Read);
        let readout = script.readout;
        script.readout.position += script.ramp;
        Ok(readout)
    }

    fn find_index(&mut self, search: &IndexSearch) -> Result<(), DriverError> {
        self.record(Call::FindIndex);
        loop {
            if search.cancel.is_cancelled() {
                return Err(DriverError::Cancelled);
            }
            {
                let script = self.script.lock();
                if !script.block_search {
                    return match &script.search_error {
                        Some(e) => Err(e.clone()),
                        None => Ok(()),
                    };
                }
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

struct Rig {
    controller: AxisController,
    script: Arc<Mutex<Script>>,
    events: Receiver<AxisEvent>,
}

impl Rig {
    fn new(config: AxisConfig) -> Self {
        Self::with_poll_interval(config, Duration::from_secs(3600))
    }

    fn with_poll_interval(config: AxisConfig, poll_interval: Duration) -> Self {
        let script = Arc::new(Mutex::new(Script::default()));
        let bus = StatusBus::new();
        let events = bus.subscribe();
        let options = ControllerOptions {
            poll_interval,
            resolver: Arc::new(FixedPortResolver::new().with(SERIAL, PORT)),
            bus,
        };
        let driver = Box::new(MockDriver {
            script: Arc::clone(&script),
        });
        let controller = AxisController::new(config, driver, options).unwrap();
        Self {
            controller,
            script,
            events,
        }
    }

    fn linear() -> Self {
        Self::new(linear_config())
    }

    fn rotary() -> Self {
        let rig = Self::new(rotary_config());
        rig.script.lock().info = Some(StageInfo::rotary());
        rig
    }

    fn connected(mut self) -> Self {
        self.controller.connect().unwrap();
        self.drain();
        self.script.lock().calls.clear();
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.script.lock().calls.clone()
    }

    fn drain(&self) -> Vec<EventKind> {
        self.events.try_iter().map(|e| e.kind).collect()
    }

    fn set_readout(&self, position: f64, flags: StatusFlags) {
        self.script.lock().readout = AxisReadout::new(position, flags);
    }

    fn wait_for_call(&self, call: Call) {
        let script = Arc::clone(&self.script);
        wait_for(&format!("{call:?}"), move || script.lock().calls.contains(&call));
    }
}

fn linear_config() -> AxisConfig {
    let mut config = AxisConfig::new("X");
    config.serial_number = Some(SERIAL.to_string());
    config
}

fn rotary_config() -> AxisConfig {
    let mut config = AxisConfig::rotary("R");
    config.serial_number = Some(SERIAL.to_string());
    config
}

fn wait_for(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

fn statuses(events: &[EventKind]) -> Vec<StatusUpdate> {
    events
        .iter()
        .filter_map(|e| match e {
            EventKind::Status(update) => Some(update.clone()),
            _ => None,
        })
        .collect()
}

fn disconnected_burst() -> Vec<EventKind> {
    StatusChannel::ALL
        .into_iter()
        .map(|c| EventKind::Status(StatusUpdate::disconnected(c)))
        .collect()
}

// ─── Connection ─────────────────────────────────────────────────────

#[test]
fn connect_configures_session_and_announces() {
    let mut rig = Rig::linear();
    rig.controller.connect().unwrap();

    assert_eq!(
        rig.calls(),
        vec![
            Call::Open(PORT.to_string()),
            Call::Units(Units::Mm),
            Call::Speed(10.0),
            Call::StepSize(1.0),
        ]
    );
    assert_eq!(
        rig.drain(),
        vec![
            EventKind::Status(StatusUpdate::new(
                StatusChannel::Connection,
                true,
                Severity::Ok,
                "Connected"
            )),
            EventKind::StepSize(1.0),
        ]
    );
    assert!(rig.controller.is_connected());
    assert!(!rig.controller.is_index_found());
    assert_eq!(rig.controller.state(), AxisState::Idle);
    assert_eq!(rig.controller.limits().low(), -5.0);
    assert_eq!(rig.controller.limits().high(), 5.0);

    // Already connected: nothing happens.
    rig.controller.connect().unwrap();
    assert_eq!(rig.calls().len(), 4);
}

#[test]
fn rotary_connect_disables_limit_channels() {
    let mut rig = Rig::rotary();
    rig.controller.connect().unwrap();

    let events = rig.drain();
    assert_eq!(
        events,
        vec![
            EventKind::Status(StatusUpdate::unlimited_rotation(StatusChannel::LowLimit)),
            EventKind::Status(StatusUpdate::unlimited_rotation(StatusChannel::HighLimit)),
            EventKind::Status(StatusUpdate::new(
                StatusChannel::Connection,
                true,
                Severity::Ok,
                "Connected"
            )),
            EventKind::StepSize(1.0),
        ]
    );
    assert_eq!(rig.controller.limits().low(), 0.0);
    assert_eq!(rig.controller.limits().high(), 360.0);
    assert_eq!(rig.controller.units(), Units::Deg);
}

#[test]
fn unknown_serial_is_device_not_found() {
    let mut config = linear_config();
    config.serial_number = Some("0000".to_string());
    let mut rig = Rig::new(config);

    let err = rig.controller.connect().unwrap_err();
    assert_eq!(
        err,
        ControllerError::DeviceNotFound {
            axis: "X".to_string(),
            serial: Some("0000".to_string()),
        }
    );
    assert!(rig.calls().is_empty());

    let update = &statuses(&rig.drain())[0];
    assert_eq!(update.channel, StatusChannel::Connection);
    assert!(!update.active);
    assert_eq!(update.severity, Severity::Alert);
    assert_eq!(update.message, "Device not found");
    assert_eq!(rig.controller.state(), AxisState::Disconnected);
}

#[test]
fn axis_without_serial_or_port_is_not_found() {
    let mut rig = Rig::new(AxisConfig::new("Y"));
    assert!(matches!(
        rig.controller.connect(),
        Err(ControllerError::DeviceNotFound { serial: None, .. })
    ));
}

#[test]
fn explicit_port_skips_discovery() {
    let mut config = AxisConfig::new("Y");
    config.port = Some("/dev/ttyUSB3".to_string());
    let mut rig = Rig::new(config);
    rig.controller.connect().unwrap();
    assert_eq!(rig.calls()[0], Call::Open("/dev/ttyUSB3".to_string()));
}

#[test]
fn open_failure_is_connection_failed() {
    let mut rig = Rig::linear();
    let failure = DriverError::OpenFailed {
        port: PORT.to_string(),
        reason: "busy".to_string(),
    };
    rig.script.lock().open_error = Some(failure.clone());

    let err = rig.controller.connect().unwrap_err();
    assert_eq!(
        err,
        ControllerError::ConnectionFailed {
            axis: "X".to_string(),
            source: failure,
        }
    );
    assert_eq!(rig.calls(), vec![Call::Open(PORT.to_string())]);
    assert_eq!(statuses(&rig.drain())[0].message, "Connection failed");
    assert!(!rig.controller.is_connected());
}

#[test]
fn silent_stage_after_open_is_communication_lost() {
    let mut rig = Rig::linear();
    rig.script.lock().fail_setup = true;

    let err = rig.controller.connect().unwrap_err();
    assert!(matches!(err, ControllerError::CommunicationLost { .. }));
    assert_eq!(
        rig.calls(),
        vec![
            Call::Open(PORT.to_string()),
            Call::Units(Units::Mm),
            Call::Close
        ]
    );
    assert_eq!(statuses(&rig.drain())[0].message, "Communication lost");
    assert!(!rig.controller.is_connected());
}

// ─── Limits on connect ──────────────────────────────────────────────

#[test]
fn reported_limits_are_converted_to_axis_units() {
    let mut config = linear_config();
    config.units = Units::Um;
    let rig = Rig::new(config);
    rig.script.lock().info = Some(StageInfo::linear(Units::Mm).with_limits(-10.0, 10.0));

    let rig = rig.connected();
    assert_eq!(rig.controller.limits().low(), -10_000.0);
    assert_eq!(rig.controller.limits().high(), 10_000.0);
}

#[test]
fn inverted_reported_limits_fall_back() {
    let rig = Rig::linear();
    rig.script.lock().info = Some(StageInfo::linear(Units::Mm).with_limits(3.0, 3.0));

    let rig = rig.connected();
    assert_eq!(rig.controller.limits().low(), -1.0);
    assert_eq!(rig.controller.limits().high(), 1.0);
}

#[test]
fn configured_limits_apply_without_report() {
    let mut config = linear_config();
    config.low_limit = Some(-2.0);
    config.high_limit = Some(2.0);
    let rig = Rig::new(config).connected();
    assert_eq!(rig.controller.limits().low(), -2.0);
    assert_eq!(rig.controller.limits().high(), 2.0);
}

#[test]
fn stored_target_is_clamped_to_reported_limits() {
    let mut rig = Rig::linear();
    rig.script.lock().info = Some(StageInfo::linear(Units::Mm).with_limits(-1.0, 1.0));

    assert_eq!(rig.controller.set_desired_position(4.0).unwrap(), 4.0);
    assert!(rig.calls().is_empty());
    rig.drain();

    rig.controller.connect().unwrap();
    assert_eq!(rig.controller.desired_position(), 1.0);
    assert!(rig.drain().contains(&EventKind::DesiredPosition(1.0)));
}

// ─── Targets ────────────────────────────────────────────────────────

#[test]
fn linear_targets_are_clamped() {
    let mut rig = Rig::linear().connected();

    assert_eq!(rig.controller.set_desired_position(7.0).unwrap(), 5.0);
    assert_eq!(rig.controller.set_desired_position(-10.0).unwrap(), -5.0);
    assert_eq!(rig.calls(), vec![Call::MoveTo(5.0), Call::MoveTo(-5.0)]);
    assert_eq!(
        rig.drain(),
        vec![
            EventKind::DesiredPosition(5.0),
            EventKind::DesiredPosition(-5.0)
        ]
    );
    assert_eq!(rig.controller.desired_position(), -5.0);
}

#[test]
fn rotary_targets_wrap_once() {
    let mut rig = Rig::rotary().connected();

    assert_eq!(rig.controller.set_desired_position(370.0).unwrap(), 10.0);
    assert_eq!(rig.controller.set_desired_position(-5.0).unwrap(), 355.0);

    let err = rig.controller.set_desired_position(730.0).unwrap_err();
    assert!(matches!(err, ControllerError::OutOfRange { value, .. } if value == 730.0));
    assert_eq!(rig.controller.desired_position(), 355.0);
    assert_eq!(rig.calls(), vec![Call::MoveTo(10.0), Call::MoveTo(355.0)]);
}

#[test]
fn normalizing_a_stored_target_changes_nothing() {
    let mut rig = Rig::linear().connected();
    let first = rig.controller.set_desired_position(12.5).unwrap();
    let second = rig.controller.set_desired_position(first).unwrap();
    assert_eq!(first, second);

    let mut rig = Rig::rotary().connected();
    let first = rig.controller.set_desired_position(-90.0).unwrap();
    assert_eq!(rig.controller.set_desired_position(first).unwrap(), first);
}

#[test]
fn step_moves_from_the_stored_target() {
    let mut rig = Rig::linear().connected();
    rig.controller.set_desired_position(4.0).unwrap();

    assert_eq!(rig.controller.step(Some(1.5)).unwrap(), 5.0);
    assert_eq!(rig.controller.step(Some(-2.0)).unwrap(), 3.0);
    assert_eq!(rig.controller.step(None).unwrap(), 4.0);
    assert_eq!(rig.calls().last(), Some(&Call::MoveTo(4.0)));
}

#[test]
fn speed_and_step_size_are_forwarded_and_published() {
    let mut rig = Rig::linear().connected();
    rig.controller.set_speed(25.0);
    rig.controller.set_step_size(0.1);

    assert_eq!(rig.calls(), vec![Call::Speed(25.0), Call::StepSize(0.1)]);
    assert_eq!(
        rig.drain(),
        vec![EventKind::Speed(25.0), EventKind::StepSize(0.1)]
    );
    assert_eq!(rig.controller.speed(), 25.0);
    assert_eq!(rig.controller.step_size(), 0.1);
}

// ─── Status publication ─────────────────────────────────────────────

#[test]
fn unchanged_readouts_publish_nothing() {
    let rig = Rig::linear().connected();
    rig.set_readout(
        0.0001,
        StatusFlags::ENCODER_VALID | StatusFlags::POSITION_REACHED,
    );

    rig.controller.poll_status();
    let events = rig.drain();
    assert_eq!(events[0], EventKind::EstimatedPosition(0.0));
    let messages: Vec<_> = statuses(&events).into_iter().map(|u| u.message).collect();
    assert_eq!(
        messages,
        ["Encoder valid", "Ready", "Low limit OK", "High limit OK"]
    );

    rig.controller.poll_status();
    rig.controller.poll_status();
    assert!(rig.drain().is_empty());
    assert_eq!(rig.controller.estimated_position(), 0.0);

    rig.set_readout(0.25, StatusFlags::ENCODER_VALID);
    rig.controller.poll_status();
    let events = rig.drain();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], EventKind::EstimatedPosition(0.25));
    assert_eq!(rig.controller.state(), AxisState::Moving);
}

#[test]
fn limit_channels_follow_readout_and_target() {
    let mut rig = Rig::linear().connected();
    rig.controller.set_desired_position(9.0).unwrap();
    rig.set_readout(4.0, StatusFlags::ENCODER_VALID);
    rig.controller.poll_status();

    let high = statuses(&rig.drain())
        .into_iter()
        .find(|u| u.channel == StatusChannel::HighLimit)
        .unwrap();
    assert!(high.active);
    assert_eq!(high.severity, Severity::Busy);
    assert_eq!(high.message, "Trying to set higher limit!");

    rig.set_readout(5.0, StatusFlags::ENCODER_VALID | StatusFlags::AT_HIGH_END);
    rig.controller.poll_status();
    let high = statuses(&rig.drain())
        .into_iter()
        .find(|u| u.channel == StatusChannel::HighLimit)
        .unwrap();
    assert_eq!(high.severity, Severity::Alert);
    assert_eq!(high.message, "High limit reached!");
}

#[test]
fn encoder_error_is_shown_on_connection_channel() {
    let rig = Rig::linear().connected();
    rig.set_readout(0.0, StatusFlags::ENCODER_ERROR | StatusFlags::POSITION_REACHED);
    rig.controller.poll_status();

    let connection = statuses(&rig.drain())
        .into_iter()
        .find(|u| u.channel == StatusChannel::Connection)
        .unwrap();
    assert_eq!(connection.severity, Severity::Alert);
    assert_eq!(connection.message, "Encoder error");
}

#[test]
fn injected_readouts_share_change_detection() {
    let rig = Rig::linear().connected();
    let readout = AxisReadout::new(1.0, StatusFlags::POSITION_REACHED);

    rig.controller.ingest_readout(readout);
    assert!(!rig.drain().is_empty());
    rig.controller.ingest_readout(readout);
    assert!(rig.drain().is_empty());
    assert_eq!(rig.controller.snapshot().estimated_position, Some(1.0));
}

#[test]
fn poll_worker_reads_periodically() {
    let rig = Rig::with_poll_interval(linear_config(), Duration::from_millis(5)).connected();
    rig.set_readout(2.5, StatusFlags::ENCODER_VALID | StatusFlags::POSITION_REACHED);

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = rig.events.recv_timeout(remaining).expect("position event");
        if event.kind == EventKind::EstimatedPosition(2.5) {
            break;
        }
    }
    assert!(rig.calls().contains(&Call::Read));
}

#[test]
fn worker_and_manual_polls_publish_in_read_order() {
    let mut rig = Rig::with_poll_interval(linear_config(), Duration::from_micros(50)).connected();
    rig.script.lock().ramp = 1.0;

    let deadline = Instant::now() + Duration::from_millis(200);
    while Instant::now() < deadline {
        rig.controller.poll_status();
    }
    rig.controller.disconnect();

    let positions: Vec<f64> = rig
        .drain()
        .into_iter()
        .filter_map(|kind| match kind {
            EventKind::EstimatedPosition(p) => Some(p),
            _ => None,
        })
        .collect();
    assert!(positions.len() > 1);
    assert!(
        positions.windows(2).all(|w| w[0] < w[1]),
        "estimated positions published out of read order"
    );
}

// ─── Communication loss ─────────────────────────────────────────────

#[test]
fn failed_read_disconnects_the_axis() {
    let mut rig = Rig::linear().connected();
    rig.script.lock().fail_reads = true;

    rig.controller.poll_status();

    assert!(!rig.controller.is_connected());
    assert_eq!(rig.controller.state(), AxisState::Disconnected);
    assert_eq!(rig.calls(), vec![Call::Close]);

    let mut expected = vec![EventKind::Status(StatusUpdate::new(
        StatusChannel::Connection,
        false,
        Severity::Alert,
        "Communication lost",
    ))];
    expected.extend(disconnected_burst());
    assert_eq!(rig.drain(), expected);

    // Commands keep working on the stored state.
    assert_eq!(rig.controller.set_desired_position(2.0).unwrap(), 2.0);
    assert_eq!(rig.calls(), vec![Call::Close]);

    rig.script.lock().fail_reads = false;
    rig.controller.connect().unwrap();
    assert!(rig.controller.is_connected());
}

#[test]
fn failed_move_disconnects_but_keeps_target() {
    let mut rig = Rig::linear().connected();
    rig.script.lock().fail_moves = true;

    assert_eq!(rig.controller.set_desired_position(3.0).unwrap(), 3.0);
    assert!(!rig.controller.is_connected());
    assert_eq!(rig.controller.desired_position(), 3.0);
    assert_eq!(rig.calls(), vec![Call::MoveTo(3.0), Call::Close]);
    assert_eq!(rig.drain().last(), Some(&EventKind::DesiredPosition(3.0)));
}

// ─── Disconnect ─────────────────────────────────────────────────────

#[test]
fn disconnect_publishes_burst() {
    let mut rig = Rig::linear().connected();
    rig.controller.disconnect();

    assert_eq!(rig.drain(), disconnected_burst());
    assert_eq!(rig.calls(), vec![Call::Close]);
    assert_eq!(rig.controller.snapshot().estimated_position, None);
}

#[test]
fn reconnect_starts_idle_without_index() {
    let mut rig = Rig::linear().connected();
    rig.controller.find_index().unwrap();
    wait_for("index search", || !rig.controller.is_searching());
    assert!(rig.controller.is_index_found());

    rig.controller.disconnect();
    rig.controller.connect().unwrap();

    assert_eq!(rig.controller.state(), AxisState::Idle);
    assert!(!rig.controller.is_index_found());
}

#[test]
fn dropping_the_controller_closes_the_session() {
    let rig = Rig::linear().connected();
    let script = Arc::clone(&rig.script);
    drop(rig);

    let script = script.lock();
    assert_eq!(script.calls, vec![Call::Close]);
    assert!(!script.open);
}

// ─── Index search ───────────────────────────────────────────────────

#[test]
fn find_index_while_disconnected_does_nothing() {
    let mut rig = Rig::linear();
    rig.controller.find_index().unwrap();
    assert!(!rig.controller.is_searching());
    assert!(rig.calls().is_empty());
    assert!(rig.drain().is_empty());
}

#[test]
fn index_search_sequence() {
    let mut rig = Rig::linear().connected();
    rig.controller.set_desired_position(3.0).unwrap();
    rig.script.lock().calls.clear();
    rig.drain();

    rig.controller.find_index().unwrap();
    wait_for("index search", || !rig.controller.is_searching());

    assert_eq!(
        rig.calls(),
        vec![
            Call::Speed(500.0),
            Call::MoveTo(-300.0),
            Call::FindIndex,
            Call::MoveTo(0.0),
            Call::Speed(10.0),
            Call::StepSize(1.0),
        ]
    );
    assert!(rig.controller.is_index_found());
    assert_eq!(rig.controller.desired_position(), 0.0);

    let events = rig.drain();
    assert_eq!(
        events[0],
        EventKind::Status(StatusUpdate::new(
            StatusChannel::Index,
            true,
            Severity::Busy,
            "Searching index"
        ))
    );
    assert!(events.contains(&EventKind::DesiredPosition(0.0)));
}

#[test]
fn failed_index_search_restores_motion_settings() {
    let mut rig = Rig::linear().connected();
    rig.script.lock().search_error = Some(DriverError::IndexNotFound("no mark".to_string()));

    rig.controller.find_index().unwrap();
    wait_for("index search", || !rig.controller.is_searching());

    assert_eq!(
        rig.calls(),
        vec![
            Call::Speed(500.0),
            Call::MoveTo(-300.0),
            Call::FindIndex,
            Call::Speed(10.0),
            Call::StepSize(1.0),
        ]
    );
    assert!(!rig.controller.is_index_found());
    assert!(rig.controller.is_connected());

    let index = statuses(&rig.drain()).pop().unwrap();
    assert_eq!(index.channel, StatusChannel::Index);
    assert!(!index.active);
    assert_eq!(index.severity, Severity::Alert);
    assert_eq!(index.message, "Index not found");

    // The next poll reports the same unreferenced stage: nothing changes.
    rig.set_readout(0.0, StatusFlags::POSITION_REACHED);
    rig.controller.poll_status();
    assert!(
        !statuses(&rig.drain())
            .iter()
            .any(|u| u.channel == StatusChannel::Index)
    );
}

#[test]
fn second_search_and_moves_are_refused_while_searching() {
    let mut rig = Rig::linear().connected();
    rig.script.lock().block_search = true;

    rig.controller.find_index().unwrap();
    rig.wait_for_call(Call::FindIndex);
    assert_eq!(rig.controller.state(), AxisState::SearchingIndex);

    assert!(matches!(
        rig.controller.find_index(),
        Err(ControllerError::IndexSearchInProgress(_))
    ));
    assert!(matches!(
        rig.controller.set_desired_position(1.0),
        Err(ControllerError::IndexSearchInProgress(_))
    ));

    // Stored now, applied when the search hands the session back.
    rig.controller.set_speed(20.0);
    rig.controller.set_step_size(0.25);
    assert!(!rig.calls().contains(&Call::Speed(20.0)));
    assert!(!rig.calls().contains(&Call::StepSize(0.25)));

    // The session is busy: polls are skipped.
    rig.controller.poll_status();
    assert!(!rig.calls().contains(&Call::Read));

    rig.script.lock().block_search = false;
    wait_for("index search", || !rig.controller.is_searching());
    assert!(rig.calls().ends_with(&[Call::Speed(20.0), Call::StepSize(0.25)]));
    assert_eq!(rig.controller.state(), AxisState::Idle);
}

#[test]
fn step_size_set_during_failed_search_reaches_the_stage() {
    let mut rig = Rig::linear().connected();
    {
        let mut script = rig.script.lock();
        script.block_search = true;
        script.search_error = Some(DriverError::IndexNotFound("no mark".to_string()));
    }

    rig.controller.find_index().unwrap();
    rig.wait_for_call(Call::FindIndex);
    rig.controller.set_step_size(0.05);

    rig.script.lock().block_search = false;
    wait_for("index search", || !rig.controller.is_searching());
    assert!(rig.calls().ends_with(&[Call::Speed(10.0), Call::StepSize(0.05)]));
}

#[test]
fn disconnect_during_search_cancels_and_joins() {
    let mut rig = Rig::linear().connected();
    rig.script.lock().block_search = true;

    rig.controller.find_index().unwrap();
    rig.wait_for_call(Call::FindIndex);

    rig.controller.disconnect();

    assert!(!rig.controller.is_searching());
    assert_eq!(rig.controller.state(), AxisState::Disconnected);
    assert!(!rig.controller.is_index_found());

    let calls = rig.calls();
    let search = calls.iter().position(|c| *c == Call::FindIndex).unwrap();
    let close = calls.iter().position(|c| *c == Call::Close).unwrap();
    assert!(search < close);
    assert_eq!(close, calls.len() - 1);

    let events = rig.drain();
    assert!(
        !statuses(&events)
            .iter()
            .any(|u| u.message == "Index not found")
    );
    assert!(events.ends_with(&disconnected_burst()));
}

#[test]
fn stage_without_index_counts_as_homed() {
    let rig = Rig::linear();
    rig.script.lock().info = Some(StageInfo::linear(Units::Mm).without_index());
    let mut rig = rig.connected();

    assert!(rig.controller.is_index_found());
    rig.controller.find_index().unwrap();
    assert!(!rig.controller.is_searching());
    assert!(rig.calls().is_empty());
}
