//! Sensor access.
//!
//! [`SampleSource`] abstracts the temperature/pressure/humidity sensor so the
//! scheduler can run against real hardware or a [`MockSensor`](crate::MockSensor).
//!
//! [`IioSensor`] reads a BME280 through the Linux Industrial I/O subsystem.
//! With the kernel driver bound (e.g. `dtoverlay=i2c-sensor,bme280` on a
//! Raspberry Pi) each channel is a sysfs file:
//!
//! | File | Unit |
//! |------|------|
//! | `in_temp_input` | milli-degrees Celsius |
//! | `in_pressure_input` | kPa |
//! | `in_humidityrelative_input` | milli-percent |

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use weather_types::{ParseError, SensorSample};

/// Root of the IIO device tree.
pub const IIO_DEVICES_DIR: &str = "/sys/bus/iio/devices";

const TEMP_CHANNEL: &str = "in_temp_input";
const PRESSURE_CHANNEL: &str = "in_pressure_input";
const HUMIDITY_CHANNEL: &str = "in_humidityrelative_input";

/// Driver names accepted during discovery.
const SUPPORTED_DRIVERS: &[&str] = &["bme280"];

/// Errors raised by a sample source.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// No supported sensor was found.
    #[error("No BME280 found under {0}")]
    NotFound(PathBuf),

    /// A channel file is missing from the device directory.
    #[error("Sensor channel {0} is missing")]
    MissingChannel(PathBuf),

    /// Reading a channel failed.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A channel held something other than a finite number.
    #[error("Invalid sensor data: {0}")]
    InvalidData(#[from] ParseError),

    /// Fault reported by a non-hardware source.
    #[error("Sensor unavailable: {0}")]
    Unavailable(String),
}

/// Something that can produce one sensor sample on demand.
///
/// Reads are synchronous: the scheduler blocks on them for their duration.
pub trait SampleSource {
    /// Take one measurement.
    fn read_sample(&mut self) -> Result<SensorSample, SensorError>;
}

impl<T: SampleSource + ?Sized> SampleSource for Box<T> {
    fn read_sample(&mut self) -> Result<SensorSample, SensorError> {
        (**self).read_sample()
    }
}

/// BME280 exposed through the Linux IIO sysfs interface.
#[derive(Debug, Clone)]
pub struct IioSensor {
    device_dir: PathBuf,
}

impl IioSensor {
    /// Use the IIO device at `device_dir`, checking that every channel exists.
    pub fn open<P: Into<PathBuf>>(device_dir: P) -> Result<Self, SensorError> {
        let device_dir = device_dir.into();
        for channel in [TEMP_CHANNEL, PRESSURE_CHANNEL, HUMIDITY_CHANNEL] {
            let path = device_dir.join(channel);
            if !path.is_file() {
                return Err(SensorError::MissingChannel(path));
            }
        }

        info!("Using IIO sensor at {}", device_dir.display());
        Ok(Self { device_dir })
    }

    /// Find the first supported device under `root` (normally
    /// [`IIO_DEVICES_DIR`]) by its driver `name` file.
    pub fn discover<P: AsRef<Path>>(root: P) -> Result<Self, SensorError> {
        let root = root.as_ref();
        let entries = fs::read_dir(root).map_err(|source| SensorError::Read {
            path: root.to_path_buf(),
            source,
        })?;

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|dir| {
                fs::read_to_string(dir.join("name"))
                    .map(|name| SUPPORTED_DRIVERS.contains(&name.trim()))
                    .unwrap_or(false)
            })
            .collect();
        candidates.sort();

        match candidates.into_iter().next() {
            Some(dir) => Self::open(dir),
            None => Err(SensorError::NotFound(root.to_path_buf())),
        }
    }

    /// The device directory in use.
    pub fn device_dir(&self) -> &Path {
        &self.device_dir
    }

    fn read_channel(&self, channel: &'static str) -> Result<f64, SensorError> {
        let path = self.device_dir.join(channel);
        let raw = fs::read_to_string(&path).map_err(|source| SensorError::Read {
            path: path.clone(),
            source,
        })?;
        parse_channel(channel, &raw)
    }
}

impl SampleSource for IioSensor {
    fn read_sample(&mut self) -> Result<SensorSample, SensorError> {
        let temperature_c = self.read_channel(TEMP_CHANNEL)? / 1000.0;
        let pressure_hpa = self.read_channel(PRESSURE_CHANNEL)? * 10.0;
        let humidity_pct = self.read_channel(HUMIDITY_CHANNEL)? / 1000.0;

        let sample = SensorSample::new(temperature_c, pressure_hpa, humidity_pct);
        sample.validate()?;
        debug!("Sampled {:?}", sample);
        Ok(sample)
    }
}

fn parse_channel(channel: &'static str, raw: &str) -> Result<f64, SensorError> {
    let trimmed = raw.trim();
    trimmed.parse::<f64>().map_err(|_| {
        SensorError::InvalidData(ParseError::InvalidValue {
            field: channel,
            value: trimmed.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_device(root: &Path, name: &str, driver: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("name"), format!("{driver}\n")).unwrap();
        fs::write(dir.join(TEMP_CHANNEL), "21456\n").unwrap();
        fs::write(dir.join(PRESSURE_CHANNEL), "101.325781250\n").unwrap();
        fs::write(dir.join(HUMIDITY_CHANNEL), "45123\n").unwrap();
        dir
    }

    #[test]
    fn test_read_sample_scales_channels() {
        let root = tempfile::tempdir().unwrap();
        let dir = fake_device(root.path(), "iio:device0", "bme280");

        let mut sensor = IioSensor::open(&dir).unwrap();
        let sample = sensor.read_sample().unwrap();

        assert!((sample.temperature_c - 21.456).abs() < 1e-9);
        assert!((sample.pressure_hpa - 1013.2578125).abs() < 1e-9);
        assert!((sample.humidity_pct - 45.123).abs() < 1e-9);
    }

    #[test]
    fn test_open_requires_all_channels() {
        let root = tempfile::tempdir().unwrap();
        let dir = fake_device(root.path(), "iio:device0", "bme280");
        fs::remove_file(dir.join(HUMIDITY_CHANNEL)).unwrap();

        let err = IioSensor::open(&dir).unwrap_err();
        assert!(matches!(err, SensorError::MissingChannel(p) if p.ends_with(HUMIDITY_CHANNEL)));
    }

    #[test]
    fn test_discover_picks_bme280() {
        let root = tempfile::tempdir().unwrap();
        fake_device(root.path(), "iio:device0", "ads1015");
        let expected = fake_device(root.path(), "iio:device1", "bme280");

        let sensor = IioSensor::discover(root.path()).unwrap();
        assert_eq!(sensor.device_dir(), expected);
    }

    #[test]
    fn test_discover_without_sensor() {
        let root = tempfile::tempdir().unwrap();
        fake_device(root.path(), "iio:device0", "ads1015");

        assert!(matches!(
            IioSensor::discover(root.path()),
            Err(SensorError::NotFound(_))
        ));
    }

    #[test]
    fn test_garbage_channel_is_a_read_fault() {
        let root = tempfile::tempdir().unwrap();
        let dir = fake_device(root.path(), "iio:device0", "bme280");
        let mut sensor = IioSensor::open(&dir).unwrap();

        fs::write(dir.join(PRESSURE_CHANNEL), "EIO\n").unwrap();
        assert!(matches!(
            sensor.read_sample(),
            Err(SensorError::InvalidData(ParseError::InvalidValue { field: PRESSURE_CHANNEL, .. }))
        ));
    }

    #[test]
    fn test_non_finite_channel_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let dir = fake_device(root.path(), "iio:device0", "bme280");
        fs::write(dir.join(TEMP_CHANNEL), "inf\n").unwrap();

        let mut sensor = IioSensor::open(&dir).unwrap();
        assert!(matches!(
            sensor.read_sample(),
            Err(SensorError::InvalidData(ParseError::NonFinite { .. }))
        ));
    }
}
