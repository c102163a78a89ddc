//! MPL3115A2 Pressure / Altitude / Temperature Sensor Driver (SW03 board)
//!
//! Register-level driver for the NXP MPL3115A2 as fitted on the XinaBox SW03.
//! Returns raw 20-bit pressure/altitude and 12-bit temperature samples, plus
//! the fixed-point conversions into engineering units.
//!
//! Notes (datasheet summary):
//! - I2C address: 0x60 (fixed).
//! - WHO_AM_I (0x0C) reads 0xC4.
//! - CTRL_REG1 (0x26): bit7 ALT (1 = altimeter), bits5..3 OS, bit1 OST, bit0 SBYB.
//! - OUT_P (0x01..0x03): pressure Q18.2 unsigned, or altitude Q16.4 signed, left aligned.
//! - OUT_T (0x04..0x05): temperature Q8.4 signed, left aligned.
//! - DR_STATUS (0x00): bit2 PDR, bit1 TDR.
//! - Temperature is converted in both barometer and altimeter mode.
//!
//! Conversion time depends on the oversample ratio, from 6 ms (OSR 0) up to
//! 512 ms (OSR 7). When no fresh sample is flagged, or the ALT mode was just
//! changed, a one-shot conversion is triggered and the status register is polled.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::drivers::sensor_trait::SensorDriver;

pub const MPL3115A2_ADDR: u8 = 0x60;
pub const DEFAULT_CLOCK_HZ: u32 = 100_000;
pub const WHO_AM_I_VALUE: u8 = 0xC4;

/// MPL3115A2 register addresses used here
pub mod reg {
    pub const DR_STATUS: u8 = 0x00;
    pub const OUT_P_MSB: u8 = 0x01; // 3-byte burst: MSB, CSB, LSB
    pub const OUT_T_MSB: u8 = 0x04; // 2-byte burst: MSB, LSB
    pub const WHO_AM_I: u8 = 0x0C;
    pub const PT_DATA_CFG: u8 = 0x13;
    pub const CTRL_REG1: u8 = 0x26;
}

/// CTRL_REG1 bits
mod ctrl1 {
    pub const SBYB: u8 = 1 << 0;
    pub const OST: u8 = 1 << 1;
    pub const OS_SHIFT: u8 = 3;
    pub const OS_MASK: u8 = 0x7 << OS_SHIFT;
    pub const ALT: u8 = 1 << 7;
}

/// DR_STATUS bits
mod status {
    pub const TDR: u8 = 1 << 1;
    pub const PDR: u8 = 1 << 2;
}

/// DREM | PDEFE | TDEFE
const PT_DATA_CFG_EVENTS: u8 = 0x07;

const POLL_INTERVAL_MS: u32 = 10;
const MAX_POLLS: u32 = 100;

/// Oversample ratio (CTRL_REG1 OS bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Oversample {
    #[default]
    X1 = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
    X16 = 4,
    X32 = 5,
    X64 = 6,
    X128 = 7,
}

impl Oversample {
    /// Number of internal samples averaged per conversion.
    pub const fn ratio(self) -> u8 {
        1 << (self as u8)
    }

    /// Time in milliseconds before a conversion at this ratio is valid.
    pub const fn data_ready_ms(self) -> u32 {
        match self {
            Oversample::X1 => 6,
            Oversample::X2 => 10,
            Oversample::X4 => 18,
            Oversample::X8 => 34,
            Oversample::X16 => 66,
            Oversample::X32 => 130,
            Oversample::X64 => 258,
            Oversample::X128 => 512,
        }
    }

    pub const fn bits(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Oversample {
    type Error = u8;

    fn try_from(osr: u8) -> Result<Self, Self::Error> {
        Ok(match osr {
            0 => Oversample::X1,
            1 => Oversample::X2,
            2 => Oversample::X4,
            3 => Oversample::X8,
            4 => Oversample::X16,
            5 => Oversample::X32,
            6 => Oversample::X64,
            7 => Oversample::X128,
            other => return Err(other),
        })
    }
}

/// Acquisition mode selected by CTRL_REG1 ALT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Barometer,
    Altimeter,
}

impl Mode {
    fn name(self) -> &'static str {
        match self {
            Mode::Barometer => "barometer",
            Mode::Altimeter => "altimeter",
        }
    }
}

/// Driver errors, generic over the bus error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// Oversample ratio outside 0..=7
    InvalidParameter(u8),
    /// I2C transfer failed
    Bus(E),
    /// Data-ready flag never set within the poll budget
    DataNotReady,
    InvalidChipId(u8),
}

// Bus error is not required to be defmt::Format
#[cfg(feature = "defmt")]
impl<E> defmt::Format for Error<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::InvalidParameter(osr) => defmt::write!(f, "InvalidParameter({})", osr),
            Error::Bus(_) => defmt::write!(f, "Bus"),
            Error::DataNotReady => defmt::write!(f, "DataNotReady"),
            Error::InvalidChipId(id) => defmt::write!(f, "InvalidChipId(0x{:02X})", id),
        }
    }
}

/// One raw sample of every channel
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RawSample {
    pub temperature: u16,
    pub altitude: u32,
    pub pressure: u32,
}

/// Converted sample
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Measurement {
    pub temperature_c: f32,
    pub altitude_m: f32,
    pub pressure_pa: f32,
}

/// Signed Q16.4 altitude, 20-bit pattern, to meters.
pub fn altitude_from_raw(raw: u32) -> f32 {
    let signed = (((raw & 0xF_FFFF) << 12) as i32) >> 12;
    signed as f32 / 16.0
}

/// Unsigned Q18.2 pressure, 20-bit pattern, to Pascals.
pub fn pressure_from_raw(raw: u32) -> f32 {
    (raw & 0xF_FFFF) as f32 / 4.0
}

/// Signed Q8.4 temperature, 12-bit pattern, to degrees Celsius.
pub fn temperature_from_raw(raw: u16) -> f32 {
    let signed = (((raw & 0x0FFF) << 4) as i16) >> 4;
    signed as f32 / 16.0
}

/// MPL3115A2 driver (bus and delay borrowed per call)
#[derive(Debug)]
pub struct Mpl3115a2 {
    address: u8,
    clock_speed: u32,
    oversample: Oversample,
    mode: Option<Mode>,
}

impl Default for Mpl3115a2 {
    fn default() -> Self {
        Self::new(MPL3115A2_ADDR, DEFAULT_CLOCK_HZ)
    }
}

impl Mpl3115a2 {
    /// No bus traffic; `clock_speed` is what the bus owner configured.
    pub fn new(address: u8, clock_speed: u32) -> Self {
        Self { address, clock_speed, oversample: Oversample::X1, mode: None }
    }

    pub fn address(&self) -> u8 { self.address }

    pub fn clock_speed(&self) -> u32 { self.clock_speed }

    pub fn oversample(&self) -> Oversample { self.oversample }

    /// Last mode written to the device, `None` before `init`.
    pub fn mode(&self) -> Option<Mode> { self.mode }

    /// Conversion latency at the configured oversample ratio.
    pub fn data_ready_ms(&self) -> u32 { self.oversample.data_ready_ms() }

    /// Configure barometer mode, oversample ratio and event flags, then go active.
    ///
    /// `osr` outside 0..=7 is rejected before touching the bus.
    pub fn init<I2C, E>(&mut self, i2c: &mut I2C, osr: u8) -> Result<(), Error<E>>
    where
        I2C: I2c<Error = E>,
    {
        let oversample = Oversample::try_from(osr).map_err(Error::InvalidParameter)?;

        self.mode = None;
        self.standby(i2c)?;
        self.set_mode(i2c, Mode::Barometer)?;
        self.update_ctrl1(i2c, |c| (c & !ctrl1::OS_MASK) | (oversample.bits() << ctrl1::OS_SHIFT))?;
        // OS bits are on the device from here on
        self.oversample = oversample;
        self.write_reg(i2c, reg::PT_DATA_CFG, PT_DATA_CFG_EVENTS)?;
        self.active(i2c)?;
        self.mode = Some(Mode::Barometer);

        debug!(
            "MPL3115A2: init osr={} ratio={} data_ready={}ms",
            oversample.bits(),
            oversample.ratio(),
            oversample.data_ready_ms()
        );
        Ok(())
    }

    pub fn who_am_i<I2C, E>(&self, i2c: &mut I2C) -> Result<u8, Error<E>>
    where
        I2C: I2c<Error = E>,
    {
        self.read_reg(i2c, reg::WHO_AM_I)
    }

    /// Fails with `InvalidChipId` unless WHO_AM_I reads 0xC4.
    pub fn verify_chip<I2C, E>(&self, i2c: &mut I2C) -> Result<(), Error<E>>
    where
        I2C: I2c<Error = E>,
    {
        let id = self.who_am_i(i2c)?;
        if id != WHO_AM_I_VALUE {
            warn!("MPL3115A2: unexpected WHO_AM_I {:#x}", id);
            return Err(Error::InvalidChipId(id));
        }
        Ok(())
    }

    /// Raw 20-bit altitude pattern (switches to altimeter mode if needed).
    pub fn get_raw_altitude<I2C, D, E>(&mut self, i2c: &mut I2C, delay: &mut D) -> Result<u32, Error<E>>
    where
        I2C: I2c<Error = E>,
        D: DelayNs,
    {
        let switched = self.ensure_mode(i2c, Mode::Altimeter)?;
        self.wait_for_data(i2c, delay, status::PDR, switched)?;
        self.read_out_p(i2c)
    }

    /// Raw 20-bit pressure pattern (switches to barometer mode if needed).
    pub fn get_raw_pressure<I2C, D, E>(&mut self, i2c: &mut I2C, delay: &mut D) -> Result<u32, Error<E>>
    where
        I2C: I2c<Error = E>,
        D: DelayNs,
    {
        let switched = self.ensure_mode(i2c, Mode::Barometer)?;
        self.wait_for_data(i2c, delay, status::PDR, switched)?;
        self.read_out_p(i2c)
    }

    /// Raw 12-bit temperature pattern; valid in either mode.
    pub fn get_raw_temperature<I2C, D, E>(&mut self, i2c: &mut I2C, delay: &mut D) -> Result<u16, Error<E>>
    where
        I2C: I2c<Error = E>,
        D: DelayNs,
    {
        self.wait_for_data(i2c, delay, status::TDR, false)?;
        let mut buf = [0u8; 2];
        i2c.write_read(self.address, &[reg::OUT_T_MSB], &mut buf).map_err(Error::Bus)?;
        let raw = ((buf[0] as u16) << 4) | ((buf[1] as u16) >> 4);
        trace!("MPL3115A2: raw temperature {:#x}", raw);
        Ok(raw)
    }

    /// Altitude in meters.
    pub fn get_altitude<I2C, D, E>(&mut self, i2c: &mut I2C, delay: &mut D) -> Result<f32, Error<E>>
    where
        I2C: I2c<Error = E>,
        D: DelayNs,
    {
        self.get_raw_altitude(i2c, delay).map(altitude_from_raw)
    }

    /// Pressure in Pascals.
    pub fn get_pressure<I2C, D, E>(&mut self, i2c: &mut I2C, delay: &mut D) -> Result<f32, Error<E>>
    where
        I2C: I2c<Error = E>,
        D: DelayNs,
    {
        self.get_raw_pressure(i2c, delay).map(pressure_from_raw)
    }

    /// Temperature in degrees Celsius.
    pub fn get_temp_c<I2C, D, E>(&mut self, i2c: &mut I2C, delay: &mut D) -> Result<f32, Error<E>>
    where
        I2C: I2c<Error = E>,
        D: DelayNs,
    {
        self.get_raw_temperature(i2c, delay).map(temperature_from_raw)
    }

    fn read_out_p<I2C, E>(&self, i2c: &mut I2C) -> Result<u32, Error<E>>
    where
        I2C: I2c<Error = E>,
    {
        let mut buf = [0u8; 3];
        i2c.write_read(self.address, &[reg::OUT_P_MSB], &mut buf).map_err(Error::Bus)?;
        let raw = u32::from_be_bytes([0, buf[0], buf[1], buf[2]]) >> 4;
        trace!("MPL3115A2: raw OUT_P {:#x}", raw);
        Ok(raw)
    }

    /// Block until `flag` is set in DR_STATUS, triggering a one-shot if no sample is pending.
    ///
    /// With `force_conversion` a flag already set is ignored: it was latched
    /// by a conversion in the previous mode.
    fn wait_for_data<I2C, D, E>(
        &self,
        i2c: &mut I2C,
        delay: &mut D,
        flag: u8,
        force_conversion: bool,
    ) -> Result<(), Error<E>>
    where
        I2C: I2c<Error = E>,
        D: DelayNs,
    {
        if !force_conversion && self.read_reg(i2c, reg::DR_STATUS)? & flag != 0 {
            return Ok(());
        }

        self.toggle_one_shot(i2c)?;
        delay.delay_ms(self.oversample.data_ready_ms());

        for _ in 0..MAX_POLLS {
            if self.read_reg(i2c, reg::DR_STATUS)? & flag != 0 {
                return Ok(());
            }
            delay.delay_ms(POLL_INTERVAL_MS);
        }

        warn!("MPL3115A2: data not ready after {} polls (flag {:#x})", MAX_POLLS, flag);
        Err(Error::DataNotReady)
    }

    fn toggle_one_shot<I2C, E>(&self, i2c: &mut I2C) -> Result<(), Error<E>>
    where
        I2C: I2c<Error = E>,
    {
        self.update_ctrl1(i2c, |c| c & !ctrl1::OST)?;
        self.update_ctrl1(i2c, |c| c | ctrl1::OST)
    }

    /// Returns `true` when CTRL_REG1 had to be rewritten.
    fn ensure_mode<I2C, E>(&mut self, i2c: &mut I2C, mode: Mode) -> Result<bool, Error<E>>
    where
        I2C: I2c<Error = E>,
    {
        if self.mode == Some(mode) {
            return Ok(false);
        }
        debug!("MPL3115A2: switching to {} mode", mode.name());
        // Unknown until the switch completes, so a failed switch is redone next call
        self.mode = None;
        self.standby(i2c)?;
        self.set_mode(i2c, mode)?;
        self.active(i2c)?;
        self.mode = Some(mode);
        Ok(true)
    }

    fn set_mode<I2C, E>(&self, i2c: &mut I2C, mode: Mode) -> Result<(), Error<E>>
    where
        I2C: I2c<Error = E>,
    {
        self.update_ctrl1(i2c, |c| match mode {
            Mode::Altimeter => c | ctrl1::ALT,
            Mode::Barometer => c & !ctrl1::ALT,
        })
    }

    fn standby<I2C, E>(&self, i2c: &mut I2C) -> Result<(), Error<E>>
    where
        I2C: I2c<Error = E>,
    {
        self.update_ctrl1(i2c, |c| c & !ctrl1::SBYB)
    }

    fn active<I2C, E>(&self, i2c: &mut I2C) -> Result<(), Error<E>>
    where
        I2C: I2c<Error = E>,
    {
        self.update_ctrl1(i2c, |c| c | ctrl1::SBYB)
    }

    /// Read-modify-write of CTRL_REG1
    fn update_ctrl1<I2C, E, F>(&self, i2c: &mut I2C, f: F) -> Result<(), Error<E>>
    where
        I2C: I2c<Error = E>,
        F: FnOnce(u8) -> u8,
    {
        let current = self.read_reg(i2c, reg::CTRL_REG1)?;
        let next = f(current);
        trace!("MPL3115A2: CTRL_REG1 {:#x} -> {:#x}", current, next);
        self.write_reg(i2c, reg::CTRL_REG1, next)
    }

    fn read_reg<I2C, E>(&self, i2c: &mut I2C, register: u8) -> Result<u8, Error<E>>
    where
        I2C: I2c<Error = E>,
    {
        let mut b = [0u8; 1];
        i2c.write_read(self.address, &[register], &mut b).map_err(Error::Bus)?;
        Ok(b[0])
    }

    fn write_reg<I2C, E>(&self, i2c: &mut I2C, register: u8, value: u8) -> Result<(), Error<E>>
    where
        I2C: I2c<Error = E>,
    {
        i2c.write(self.address, &[register, value]).map_err(Error::Bus)
    }
}

impl<I2C, D> SensorDriver<I2C, D> for Mpl3115a2
where
    I2C: I2c,
    D: DelayNs,
{
    type RawData = RawSample;
    type ParsedData = Measurement;
    type Error = Error<I2C::Error>;

    /// Temperature, altitude, then pressure; leaves the device in barometer mode.
    fn read_raw(&mut self, bus: &mut I2C, delay: &mut D) -> Result<RawSample, Self::Error> {
        let temperature = self.get_raw_temperature(bus, delay)?;
        let altitude = self.get_raw_altitude(bus, delay)?;
        let pressure = self.get_raw_pressure(bus, delay)?;
        Ok(RawSample { temperature, altitude, pressure })
    }

    fn parse(&self, raw: RawSample) -> Result<Measurement, Self::Error> {
        Ok(Measurement {
            temperature_c: temperature_from_raw(raw.temperature),
            altitude_m: altitude_from_raw(raw.altitude),
            pressure_pa: pressure_from_raw(raw.pressure),
        })
    }
}
