//! sysfs GPIO latch line.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use shiftio_common::hal::line::LatchLine;
use tracing::debug;

/// Default sysfs GPIO class directory.
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Output GPIO driven through `<root>/gpioN/value`.
#[derive(Debug)]
pub struct SysfsGpio {
    gpio: u32,
    value: File,
}

impl SysfsGpio {
    /// Export `gpio` under `root` if needed and configure it as output-low.
    pub fn output_low(root: &Path, gpio: u32) -> io::Result<Self> {
        let dir = root.join(format!("gpio{gpio}"));
        if !dir.exists() {
            std::fs::write(root.join("export"), gpio.to_string())?;
            debug!("Exported GPIO {}", gpio);
        }

        // "low" sets the direction and the initial level in one step.
        std::fs::write(dir.join("direction"), "low")?;
        let value = OpenOptions::new().write(true).open(dir.join("value"))?;
        Ok(Self { gpio, value })
    }

    fn write_level(&self, level: &[u8]) -> io::Result<()> {
        self.value
            .write_all_at(level, 0)
            .map_err(|e| io::Error::new(e.kind(), format!("GPIO {}: {e}", self.gpio)))
    }
}

impl LatchLine for SysfsGpio {
    fn set(&mut self) -> io::Result<()> {
        self.write_level(b"1")
    }

    fn clear(&mut self) -> io::Result<()> {
        self.write_level(b"0")
    }
}

/// Default root as a path.
pub(crate) fn default_root() -> PathBuf {
    PathBuf::from(SYSFS_GPIO_ROOT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_sysfs(gpio: u32, exported: bool) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("export"), "").unwrap();
        if exported {
            let dir = root.path().join(format!("gpio{gpio}"));
            std::fs::create_dir(&dir).unwrap();
            std::fs::write(dir.join("direction"), "in").unwrap();
            std::fs::write(dir.join("value"), "1").unwrap();
        }
        root
    }

    fn read(root: &Path, gpio: u32, file: &str) -> String {
        std::fs::read_to_string(root.join(format!("gpio{gpio}")).join(file)).unwrap()
    }

    #[test]
    fn configures_output_low_and_toggles() {
        let root = fake_sysfs(4, true);
        let mut latch = SysfsGpio::output_low(root.path(), 4).unwrap();
        assert_eq!(latch.gpio, 4);
        assert_eq!(read(root.path(), 4, "direction"), "low");

        latch.set().unwrap();
        assert_eq!(read(root.path(), 4, "value"), "1");
        latch.clear().unwrap();
        assert_eq!(read(root.path(), 4, "value"), "0");
    }

    #[test]
    fn exports_missing_gpio() {
        let root = fake_sysfs(15, false);
        // The fake export file does not create gpio15/, so opening fails
        // after the export request was written.
        assert!(SysfsGpio::output_low(root.path(), 15).is_err());
        assert_eq!(std::fs::read_to_string(root.path().join("export")).unwrap(), "15");
    }
}
