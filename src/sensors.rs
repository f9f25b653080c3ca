//! AHT20 temperature / humidity sensor over I2C.

use crate::config::AHT20_ADDRESS;
use crate::models::Measurement;
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use thiserror::Error;

const CMD_SOFT_RESET: [u8; 1] = [0xBA];
const CMD_INITIALIZE: [u8; 3] = [0xBE, 0x08, 0x00];
const CMD_TRIGGER: [u8; 3] = [0xAC, 0x33, 0x00];

const STATUS_BUSY: u8 = 1 << 7;
const STATUS_CALIBRATED: u8 = 1 << 3;

const RESET_DELAY_MS: u32 = 40;
const INITIALIZE_DELAY_MS: u32 = 40;
const MEASUREMENT_DELAY_MS: u32 = 80;
const BUSY_POLL_DELAY_MS: u32 = 10;
const BUSY_POLL_ATTEMPTS: u8 = 5;

/// Full scale of the 20-bit raw values.
const RAW_SCALE: f32 = 1_048_576.0;

pub const FRAME_LEN: usize = 6;

#[derive(Error, Debug, PartialEq)]
pub enum SensorError<E: Debug> {
    #[error("i2c transfer failed: {0:?}")]
    Bus(E),
    #[error("measurement still running after {0} status polls")]
    Busy(u8),
    #[error("sensor reports no calibration (status {0:#04x})")]
    Uncalibrated(u8),
}

pub struct Aht20<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C, D> Aht20<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self {
            i2c,
            delay,
            address: AHT20_ADDRESS,
        }
    }

    pub fn reset(&mut self) -> Result<(), SensorError<I2C::Error>> {
        self.write(&CMD_SOFT_RESET)?;
        self.delay.delay_ms(RESET_DELAY_MS);
        Ok(())
    }

    /// Loads the calibration coefficients and checks the sensor took them.
    pub fn initialize(&mut self) -> Result<(), SensorError<I2C::Error>> {
        self.write(&CMD_INITIALIZE)?;
        self.delay.delay_ms(INITIALIZE_DELAY_MS);

        let status = self.status()?;
        if status & STATUS_CALIBRATED == 0 {
            return Err(SensorError::Uncalibrated(status));
        }
        Ok(())
    }

    pub fn trigger_measurement(&mut self) -> Result<(), SensorError<I2C::Error>> {
        self.write(&CMD_TRIGGER)
    }

    pub fn read_raw(&mut self, buffer: &mut [u8]) -> Result<(), SensorError<I2C::Error>> {
        self.i2c
            .read(self.address, buffer)
            .map_err(SensorError::Bus)
    }

    pub fn status(&mut self) -> Result<u8, SensorError<I2C::Error>> {
        let mut status = [0u8; 1];
        self.read_raw(&mut status)?;
        Ok(status[0])
    }

    /// Triggers a conversion, waits for it and decodes the result.
    pub fn measure(&mut self) -> Result<Measurement, SensorError<I2C::Error>> {
        self.trigger_measurement()?;
        self.delay.delay_ms(MEASUREMENT_DELAY_MS);

        let mut frame = [0u8; FRAME_LEN];
        for _ in 0..BUSY_POLL_ATTEMPTS {
            self.read_raw(&mut frame)?;
            if frame[0] & STATUS_BUSY == 0 {
                return Ok(decode(&frame));
            }
            self.delay.delay_ms(BUSY_POLL_DELAY_MS);
        }
        Err(SensorError::Busy(BUSY_POLL_ATTEMPTS))
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn write(&mut self, command: &[u8]) -> Result<(), SensorError<I2C::Error>> {
        self.i2c
            .write(self.address, command)
            .map_err(SensorError::Bus)
    }
}

/// Decodes a status byte plus five data bytes: 20 bits of humidity followed
/// by 20 bits of temperature.
pub fn decode(frame: &[u8; FRAME_LEN]) -> Measurement {
    let raw_humidity =
        (u32::from(frame[1]) << 12) | (u32::from(frame[2]) << 4) | (u32::from(frame[3]) >> 4);
    let raw_temperature =
        (u32::from(frame[3] & 0x0F) << 16) | (u32::from(frame[4]) << 8) | u32::from(frame[5]);

    let humidity = raw_humidity as f32 / RAW_SCALE * 100.0;
    let celsius = raw_temperature as f32 / RAW_SCALE * 200.0 - 50.0;
    Measurement::from_celsius(celsius, humidity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};
    use std::collections::VecDeque;

    /// 50 % RH, 25 °C, calibrated and idle.
    const FRAME: [u8; FRAME_LEN] = [0x1C, 0x80, 0x00, 0x06, 0x00, 0x00];

    #[derive(Default)]
    struct FakeBus {
        writes: Vec<(u8, Vec<u8>)>,
        reads: VecDeque<Vec<u8>>,
        fail: bool,
    }

    impl ErrorType for FakeBus {
        type Error = ErrorKind;
    }

    impl I2c for FakeBus {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.fail {
                return Err(ErrorKind::Bus);
            }
            for op in operations {
                match op {
                    Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
                    Operation::Read(buffer) => {
                        let data = self.reads.pop_front().unwrap_or_default();
                        let len = buffer.len().min(data.len());
                        buffer[..len].copy_from_slice(&data[..len]);
                    }
                }
            }
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn sensor(reads: &[&[u8]]) -> Aht20<FakeBus, NoDelay> {
        let bus = FakeBus {
            reads: reads.iter().map(|r| r.to_vec()).collect(),
            ..FakeBus::default()
        };
        Aht20::new(bus, NoDelay)
    }

    #[test]
    fn decodes_datasheet_layout() {
        let m = decode(&FRAME);
        assert!((m.humidity_percentage - 50.0).abs() < 1e-3);
        assert!((m.temp_celsius() - 25.0).abs() < 1e-3);
        assert!((m.temp_fahrenheit - 77.0).abs() < 1e-3);
    }

    #[test]
    fn decodes_extremes() {
        let low = decode(&[0x1C, 0, 0, 0, 0, 0]);
        assert!((low.humidity_percentage - 0.0).abs() < 1e-3);
        assert!((low.temp_celsius() + 50.0).abs() < 1e-3);

        let high = decode(&[0x1C, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(high.humidity_percentage < 100.0 && high.humidity_percentage > 99.99);
        assert!(high.temp_celsius() < 150.0 && high.temp_celsius() > 149.99);
    }

    #[test]
    fn measure_triggers_then_reads_frame() {
        let mut aht = sensor(&[&FRAME]);
        let m = aht.measure().unwrap();
        assert!((m.humidity_percentage - 50.0).abs() < 1e-3);

        let bus = aht.release();
        assert_eq!(bus.writes, vec![(AHT20_ADDRESS, CMD_TRIGGER.to_vec())]);
    }

    #[test]
    fn measure_polls_while_busy() {
        let busy = [0x9C, 0, 0, 0, 0, 0];
        let mut aht = sensor(&[&busy, &busy, &FRAME]);
        assert!(aht.measure().is_ok());
    }

    #[test]
    fn measure_gives_up_when_always_busy() {
        let busy: &[u8] = &[0x9C, 0, 0, 0, 0, 0];
        let mut aht = sensor(&[busy; BUSY_POLL_ATTEMPTS as usize]);
        assert_eq!(aht.measure(), Err(SensorError::Busy(BUSY_POLL_ATTEMPTS)));
    }

    #[test]
    fn bus_errors_are_propagated() {
        let mut aht = Aht20::new(
            FakeBus {
                fail: true,
                ..FakeBus::default()
            },
            NoDelay,
        );
        assert_eq!(aht.measure(), Err(SensorError::Bus(ErrorKind::Bus)));
    }

    #[test]
    fn initialize_rejects_uncalibrated_sensor() {
        let mut aht = sensor(&[&[0x10]]);
        assert_eq!(aht.initialize(), Err(SensorError::Uncalibrated(0x10)));
    }

    #[test]
    fn reset_then_initialize_sends_both_commands() {
        let mut aht = sensor(&[&[0x18]]);
        aht.reset().unwrap();
        aht.initialize().unwrap();

        let bus = aht.release();
        assert_eq!(
            bus.writes,
            vec![
                (AHT20_ADDRESS, CMD_SOFT_RESET.to_vec()),
                (AHT20_ADDRESS, CMD_INITIALIZE.to_vec()),
            ]
        );
    }
}
