//! Generic sensor driver trait abstraction
//! Keeps a consistent interface for drivers that provide raw + parsed data.
//! Bus and delay are borrowed per call; drivers never own them.

pub trait SensorDriver<Bus, Delay> {
    type RawData;
    type ParsedData;
    type Error;

    fn read_raw(&mut self, bus: &mut Bus, delay: &mut Delay) -> Result<Self::RawData, Self::Error>;
    fn parse(&self, raw: Self::RawData) -> Result<Self::ParsedData, Self::Error>;
}
