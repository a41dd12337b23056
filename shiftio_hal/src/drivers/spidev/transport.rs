//! spidev character device transport.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;

use shiftio_common::hal::config::BusConfig;
use tracing::debug;

mod ioctl {
    const SPI_IOC_MAGIC: u8 = b'k';
    const SPI_IOC_NR_MODE: u8 = 1;
    const SPI_IOC_NR_MAX_SPEED_HZ: u8 = 4;

    nix::ioctl_write_ptr!(spi_write_mode, SPI_IOC_MAGIC, SPI_IOC_NR_MODE, u8);
    nix::ioctl_write_ptr!(
        spi_write_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_NR_MAX_SPEED_HZ,
        u32
    );
}

/// Open the spidev device of `bus` read/write and apply its optional mode and
/// clock settings.
///
/// Plain `read`/`write` on the returned file are half-duplex transfers of the
/// requested length.
pub fn open_spidev(bus: &BusConfig) -> io::Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&bus.device)?;
    let fd = file.as_raw_fd();

    if let Some(mode) = bus.mode {
        if mode > 3 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("SPI mode {mode} out of range 0..=3"),
            ));
        }
        // SAFETY: fd is an open spidev descriptor and `mode` outlives the call.
        unsafe { ioctl::spi_write_mode(fd, &mode) }.map_err(io::Error::from)?;
    }

    if let Some(speed) = bus.max_speed_hz {
        // SAFETY: fd is an open spidev descriptor and `speed` outlives the call.
        unsafe { ioctl::spi_write_max_speed_hz(fd, &speed) }.map_err(io::Error::from)?;
    }

    debug!(
        bus = %bus.name,
        mode = ?bus.mode,
        max_speed_hz = ?bus.max_speed_hz,
        "Opened {}",
        bus.device.display()
    );
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn bus(device: PathBuf) -> BusConfig {
        BusConfig {
            name: "spi1".to_string(),
            device,
            mode: None,
            max_speed_hz: None,
        }
    }

    #[test]
    fn missing_device_is_not_found() {
        let err = open_spidev(&bus(PathBuf::from("/nonexistent/spidev9.9"))).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn plain_file_without_settings_opens() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(open_spidev(&bus(file.path().to_path_buf())).is_ok());
    }

    #[test]
    fn invalid_mode_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut cfg = bus(file.path().to_path_buf());
        cfg.mode = Some(7);
        let err = open_spidev(&cfg).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
