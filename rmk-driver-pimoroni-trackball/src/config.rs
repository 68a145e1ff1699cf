//! Trackball configuration.

use embassy_time::Duration;

/// Default 7-bit bus address of the PIM447.
pub const DEFAULT_ADDRESS: u8 = 0x0a;

/// Alternate address selected by bridging the breakout's address jumper.
pub const ALTERNATE_ADDRESS: u8 = 0x0b;

const DEFAULT_TIMEOUT_MS: u64 = 35;

/// RGBW colour of the LED under the ball.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rgbw {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub white: u8,
}

impl Rgbw {
    pub const OFF: Self = Self::new(0, 0, 0, 0);

    pub const fn new(red: u8, green: u8, blue: u8, white: u8) -> Self {
        Self { red, green, blue, white }
    }
}

/// PIM447 configuration
#[derive(Clone)]
pub struct TrackballConfig {
    /// 7-bit I2C address of the breakout
    pub address: u8,
    /// Upper bound for a single bus transfer
    pub timeout: Duration,
    /// LED colour applied during initialization
    pub led: Rgbw,
}

impl Default for TrackballConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            led: Rgbw::OFF,
        }
    }
}
