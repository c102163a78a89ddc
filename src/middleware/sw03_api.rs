//! Middleware for the SW03 weather board (MPL3115A2)
//! Tracks whether the sensor came up and returns temperature, altitude and
//! pressure in one call.

use crate::drivers::mpl3115a2::{Error as MplError, Measurement, Mpl3115a2};
use crate::drivers::sensor_trait::SensorDriver;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

pub struct Sw03Middleware<'d> {
    driver: &'d mut Mpl3115a2,
    pub present: bool,
}

impl<'d> Sw03Middleware<'d> {
    pub fn new(driver: &'d mut Mpl3115a2) -> Self { Self { driver, present: false } }

    pub fn init<I2C, E>(&mut self, i2c: &mut I2C, osr: u8) -> Result<(), MplError<E>>
    where I2C: I2c<Error = E> {
        match self.driver.init(i2c, osr) {
            Ok(()) => { self.present = true; Ok(()) },
            Err(e) => { self.present = false; Err(e) }
        }
    }

    pub fn read<I2C, D, E>(&mut self, i2c: &mut I2C, delay: &mut D) -> Result<Measurement, MplError<E>>
    where I2C: I2c<Error = E>, D: DelayNs {
        let raw = self.driver.read_raw(i2c, delay)?;
        let m = <Mpl3115a2 as SensorDriver<I2C, D>>::parse(&*self.driver, raw)?;
        trace!(
            "SW03: Temp[{}] Alt[{}] Press[{}]",
            m.temperature_c,
            m.altitude_m,
            m.pressure_pa
        );
        Ok(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::mpl3115a2::{reg, MPL3115A2_ADDR};
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    const ADDR: u8 = MPL3115A2_ADDR;

    fn rmw(before: u8, after: u8) -> [I2cTransaction; 2] {
        [
            I2cTransaction::write_read(ADDR, vec![reg::CTRL_REG1], vec![before]),
            I2cTransaction::write(ADDR, vec![reg::CTRL_REG1, after]),
        ]
    }

    #[test]
    fn test_init_and_read_all() {
        let mut t = Vec::new();
        // init(0)
        t.extend(rmw(0x00, 0x00));
        t.extend(rmw(0x00, 0x00));
        t.extend(rmw(0x00, 0x00));
        t.push(I2cTransaction::write(ADDR, vec![reg::PT_DATA_CFG, 0x07]));
        t.extend(rmw(0x00, 0x01));
        // temperature
        t.push(I2cTransaction::write_read(ADDR, vec![reg::DR_STATUS], vec![0x02]));
        t.push(I2cTransaction::write_read(ADDR, vec![reg::OUT_T_MSB], vec![0x17, 0x80]));
        // altitude
        t.extend(rmw(0x01, 0x00));
        t.extend(rmw(0x00, 0x80));
        t.extend(rmw(0x80, 0x81));
        t.extend(rmw(0x81, 0x81));
        t.extend(rmw(0x81, 0x83));
        t.push(I2cTransaction::write_read(ADDR, vec![reg::DR_STATUS], vec![0x04]));
        t.push(I2cTransaction::write_read(ADDR, vec![reg::OUT_P_MSB], vec![0x00, 0x64, 0x10]));
        // pressure
        t.extend(rmw(0x81, 0x80));
        t.extend(rmw(0x80, 0x00));
        t.extend(rmw(0x00, 0x01));
        t.extend(rmw(0x01, 0x01));
        t.extend(rmw(0x01, 0x03));
        t.push(I2cTransaction::write_read(ADDR, vec![reg::DR_STATUS], vec![0x04]));
        t.push(I2cTransaction::write_read(ADDR, vec![reg::OUT_P_MSB], vec![0x62, 0xF3, 0x40]));

        let mut i2c = I2cMock::new(&t);
        let mut driver = Mpl3115a2::default();
        let mut sw03 = Sw03Middleware::new(&mut driver);

        sw03.init(&mut i2c, 0).unwrap();
        assert!(sw03.present);

        let m = sw03.read(&mut i2c, &mut NoopDelay::new()).unwrap();
        assert_eq!(m.temperature_c, 23.5);
        assert_eq!(m.altitude_m, 100.0625);
        assert_eq!(m.pressure_pa, 101325.0);
        i2c.done();
    }

    #[test]
    fn test_init_failure_clears_present() {
        let t = [I2cTransaction::write_read(ADDR, vec![reg::CTRL_REG1], vec![0x00]).with_error(ErrorKind::Other)];
        let mut i2c = I2cMock::new(&t);
        let mut driver = Mpl3115a2::default();
        let mut sw03 = Sw03Middleware::new(&mut driver);

        assert_eq!(sw03.init(&mut i2c, 0), Err(MplError::Bus(ErrorKind::Other)));
        assert!(!sw03.present);
        assert_eq!(sw03.init(&mut i2c, 9), Err(MplError::InvalidParameter(9)));
        assert!(!sw03.present);
        i2c.done();
    }
}
