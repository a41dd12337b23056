//! HalCore against the simulation backend.

use shiftio_common::hal::config::HalConfig;
use shiftio_common::hal::driver::HalError;
use shiftio_hal::core::HalCore;
use shiftio_hal::drivers::simulation::{SimWorld, SimulationBackend};
use shiftio_hal::drivers::spidev::SpidevBackend;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEV: &str = "/dev/spidev1.0";

const PANEL: &str = r#"
[shared]
service_name = "control-panel"

[[buses]]
name = "spi1"
device = "/dev/spidev1.0"

[[expanders]]
name = "outputs"
bus = "spi1"
latch_gpio = 4
output_bytes = 3
initial_output = [0xDB, 0x76, 0xB6]
period_ms = 10

[[expanders]]
name = "inputs"
bus = "spi1"
latch_gpio = 15
input_bytes = 1
period_ms = 10

[[lines]]
name = "portd_line1"
expander = "outputs"
direction = "output"
bit = 7
inverted = true

[[lines]]
name = "portb_line1"
expander = "inputs"
direction = "input"
bit = 0
"#;

fn panel_config() -> HalConfig {
    toml::from_str(PANEL).unwrap()
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

fn started_core(world: &SimWorld) -> HalCore {
    let mut core = HalCore::new(panel_config()).unwrap();
    core.init(Box::new(SimulationBackend::with_world(world.clone())))
        .unwrap();
    core.start().unwrap();
    core
}

#[test]
fn load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(PANEL.as_bytes()).unwrap();

    let config = HalCore::load_config(file.path()).unwrap();
    assert_eq!(config.expanders.len(), 2);
    assert_eq!(config.lines.len(), 2);
}

#[test]
fn load_config_missing_file() {
    let err = HalCore::load_config(std::path::Path::new("/nonexistent/io.toml")).unwrap_err();
    assert!(matches!(err, HalError::ConfigError(_)));
}

#[test]
fn initial_output_is_presented() {
    let world = SimWorld::new();
    let mut core = started_core(&world);

    assert!(wait_for(|| world.outputs(DEV, 4) == Some(vec![0xDB, 0x76, 0xB6])));
    assert_eq!(core.lines().read("portd_line1"), Some(false));
    core.shutdown().unwrap();
}

#[test]
fn line_write_reaches_pins() {
    let world = SimWorld::new();
    let mut core = started_core(&world);

    assert!(core.lines().write("portd_line1", true));
    assert!(core.trigger("outputs"));
    assert!(wait_for(|| world.outputs(DEV, 4) == Some(vec![0x5B, 0x76, 0xB6])));
    core.shutdown().unwrap();
}

#[test]
fn input_pins_reach_lines() {
    let world = SimWorld::new();
    let mut core = started_core(&world);

    world.set_inputs(DEV, 15, &[0x01]);
    assert!(wait_for(|| core.lines().read("portb_line1") == Some(true)));
    assert_eq!(
        core.buffers("inputs").and_then(|b| b.input.as_ref()).map(|b| b.to_bytes()),
        Some(vec![0x01])
    );

    world.set_inputs(DEV, 15, &[0x00]);
    assert!(wait_for(|| core.lines().read("portb_line1") == Some(false)));
    core.shutdown().unwrap();
}

#[test]
fn halted_flow_is_reported() {
    let world = SimWorld::new();
    let mut core = started_core(&world);

    world.inject_short_write(DEV, true);
    let err = core
        .run_until(async { tokio::time::sleep(Duration::from_secs(2)).await })
        .unwrap_err();
    match err {
        HalError::FlowHalted { flow, reason } => {
            assert_eq!(flow, "outputs");
            assert!(reason.contains("short write"));
        }
        other => panic!("unexpected error: {other}"),
    }
    core.shutdown().unwrap();
}

#[test]
fn stop_future_ends_supervision() {
    let world = SimWorld::new();
    let mut core = started_core(&world);

    core.run_until(async { tokio::time::sleep(Duration::from_millis(50)).await })
        .unwrap();
    assert_eq!(core.flow_names(), vec!["outputs", "inputs"]);
    core.shutdown().unwrap();
}

#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn config_summary_logged_by_core() {
    let capture = LogCapture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let core = tracing::subscriber::with_default(subscriber, || HalCore::new(panel_config()));
    assert!(core.is_ok());

    let logs = String::from_utf8(capture.0.lock().clone()).unwrap();
    assert!(logs.contains("1 buses, 2 expanders"), "logs: {logs}");
}

#[test]
fn open_failure_is_fatal() {
    let world = SimWorld::new();
    world.fail_open(DEV);

    let mut core = HalCore::new(panel_config()).unwrap();
    let err = core
        .init(Box::new(SimulationBackend::with_world(world)))
        .unwrap_err();
    assert!(matches!(err, HalError::InitFailed(_)));
    assert!(core.start().is_err());
}

#[test]
fn spidev_missing_device_is_fatal() {
    let sysfs = tempfile::tempdir().unwrap();
    for gpio in [4, 15] {
        let dir = sysfs.path().join(format!("gpio{gpio}"));
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("value"), "0").unwrap();
    }

    let mut config = panel_config();
    config.buses[0].device = "/nonexistent/spidev9.9".into();
    let mut core = HalCore::new(config).unwrap();
    let err = core
        .init(Box::new(SpidevBackend::with_gpio_root(sysfs.path())))
        .unwrap_err();
    assert!(matches!(err, HalError::InitFailed(_)));
    assert!(err.to_string().contains("spidev9.9"));
}

#[test]
fn invalid_wiring_is_rejected() {
    let mut config = panel_config();
    config.lines[1].bit = 8;
    let err = HalCore::new(config).err().unwrap();
    assert!(matches!(err, HalError::ConfigError(_)));
    assert!(err.to_string().contains("out of range"));
}

#[test]
fn run_before_start_fails() {
    let mut core = HalCore::new(panel_config()).unwrap();
    assert!(matches!(core.run(), Err(HalError::InitFailed(_))));
    assert!(!core.trigger("outputs"));
    assert!(core.flow_names().is_empty());
}
