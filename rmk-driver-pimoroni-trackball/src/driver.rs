//! Register-level driver for the PIM447 breakout.

use embassy_time::with_timeout;
use embedded_hal::digital::InputPin;
use embedded_hal_async::digital::Wait;
use embedded_hal_async::i2c::I2c;

use crate::config::{Rgbw, TrackballConfig};
use crate::device::{TrackballData, TrackballDriver, TrackballError};

// ============================================================================
// Registers
// ============================================================================
const REG_LED_RED: u8 = 0x00;
const REG_LEFT: u8 = 0x04;
const REG_INT: u8 = 0xf9;
const REG_CHIP_ID_L: u8 = 0xfa;

// ============================================================================
// Constants
// ============================================================================
const CHIP_ID: u16 = 0xba11;
const MSK_SWITCH_STATE: u8 = 1 << 7;
const MSK_INT_OUT_EN: u8 = 0b0000_0010;

const FRAME_LEN: usize = 5;

/// PIM447 driver using the embedded-hal async I2C trait.
///
/// The interrupt pin is optional; when wired it lets the poll loop wake as
/// soon as the sensor has data instead of waiting out the poll interval.
pub struct Pim447<I2C: I2c, INT: InputPin + Wait> {
    i2c: I2C,
    int_pin: Option<INT>,
    config: TrackballConfig,
}

impl<I2C: I2c, INT: InputPin + Wait> Pim447<I2C, INT> {
    /// Create a new PIM447 driver instance
    pub fn new(i2c: I2C, int_pin: Option<INT>, config: TrackballConfig) -> Self {
        Self { i2c, int_pin, config }
    }

    /// Set the colour of the LED under the ball
    pub async fn set_rgbw(&mut self, led: Rgbw) -> Result<(), TrackballError> {
        self.write(&[REG_LED_RED, led.red, led.green, led.blue, led.white]).await
    }

    async fn probe(&mut self) -> Result<(), TrackballError> {
        let mut id = [0u8; 2];
        self.read_register(REG_CHIP_ID_L, &mut id).await?;
        let chip_id = u16::from_le_bytes(id);
        if chip_id != CHIP_ID {
            error!("trackball: unexpected chip id {:#x}", chip_id);
            return Err(TrackballError::InvalidChipId(chip_id));
        }
        info!("trackball: PIM447 detected, chip id {:#x}", chip_id);
        Ok(())
    }

    async fn enable_interrupt(&mut self) -> Result<(), TrackballError> {
        let mut value = [0u8; 1];
        self.read_register(REG_INT, &mut value).await?;
        self.write(&[REG_INT, value[0] | MSK_INT_OUT_EN]).await
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), TrackballError> {
        let address = self.config.address;
        match with_timeout(self.config.timeout, self.i2c.write(address, bytes)).await {
            Ok(res) => res.map_err(|_| TrackballError::I2c),
            Err(_) => Err(TrackballError::Timeout),
        }
    }

    async fn read_register(&mut self, register: u8, buf: &mut [u8]) -> Result<(), TrackballError> {
        let address = self.config.address;
        match with_timeout(self.config.timeout, self.i2c.write_read(address, &[register], buf)).await {
            Ok(res) => res.map_err(|_| TrackballError::I2c),
            Err(_) => Err(TrackballError::Timeout),
        }
    }
}

impl<I2C: I2c, INT: InputPin + Wait> TrackballDriver for Pim447<I2C, INT> {
    type INT = INT;

    async fn init(&mut self) -> Result<(), TrackballError> {
        self.probe().await?;
        if self.int_pin.is_some() {
            self.enable_interrupt().await?;
        }
        let led = self.config.led;
        self.set_rgbw(led).await
    }

    /// Read one motion/switch frame. The direction registers are laid out
    /// consecutively, so the whole frame comes back in a single transfer.
    async fn read_data(&mut self) -> Result<TrackballData, TrackballError> {
        let mut frame = [0u8; FRAME_LEN];
        self.read_register(REG_LEFT, &mut frame).await?;
        Ok(TrackballData {
            left: frame[0],
            right: frame[1],
            up: frame[2],
            down: frame[3],
            switch_pressed: frame[4] & MSK_SWITCH_STATE != 0,
        })
    }

    fn interrupt_pin(&mut self) -> Option<&mut INT> {
        self.int_pin.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::digital::Mock as PinMock;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    use super::*;
    use crate::config::DEFAULT_ADDRESS;

    // Init logger for tests
    #[ctor::ctor]
    fn init_log() {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    }

    fn driver(transactions: &[I2cTransaction]) -> (Pim447<I2cMock, PinMock>, I2cMock) {
        let i2c = I2cMock::new(transactions);
        let handle = i2c.clone();
        (Pim447::new(i2c, None, TrackballConfig::default()), handle)
    }

    #[test]
    fn init_probes_chip_id_and_clears_led() {
        let (mut driver, mut i2c) = driver(&[
            I2cTransaction::write_read(DEFAULT_ADDRESS, vec![REG_CHIP_ID_L], vec![0x11, 0xba]),
            I2cTransaction::write(DEFAULT_ADDRESS, vec![REG_LED_RED, 0, 0, 0, 0]),
        ]);

        block_on(driver.init()).unwrap();
        i2c.done();
    }

    #[test]
    fn init_rejects_unknown_chip() {
        let (mut driver, mut i2c) = driver(&[I2cTransaction::write_read(
            DEFAULT_ADDRESS,
            vec![REG_CHIP_ID_L],
            vec![0xcd, 0xab],
        )]);

        assert_eq!(block_on(driver.init()), Err(TrackballError::InvalidChipId(0xabcd)));
        i2c.done();
    }

    #[test]
    fn init_enables_interrupt_output_when_pin_is_wired() {
        let transactions = [
            I2cTransaction::write_read(DEFAULT_ADDRESS, vec![REG_CHIP_ID_L], vec![0x11, 0xba]),
            I2cTransaction::write_read(DEFAULT_ADDRESS, vec![REG_INT], vec![0x00]),
            I2cTransaction::write(DEFAULT_ADDRESS, vec![REG_INT, MSK_INT_OUT_EN]),
            I2cTransaction::write(DEFAULT_ADDRESS, vec![REG_LED_RED, 0, 0, 0, 0]),
        ];
        let i2c = I2cMock::new(&transactions);
        let mut handle = i2c.clone();
        let pin = PinMock::new(&[]);
        let mut driver = Pim447::new(i2c, Some(pin), TrackballConfig::default());

        block_on(driver.init()).unwrap();
        assert!(driver.interrupt_pin().is_some());

        handle.done();
        driver.int_pin.take().unwrap().done();
    }

    #[test]
    fn frame_read_maps_directions_and_switch() {
        let (mut driver, mut i2c) = driver(&[I2cTransaction::write_read(
            DEFAULT_ADDRESS,
            vec![REG_LEFT],
            vec![1, 4, 2, 9, 0x80],
        )]);

        let data = block_on(driver.read_data()).unwrap();
        assert_eq!(data.left, 1);
        assert_eq!(data.right, 4);
        assert_eq!(data.up, 2);
        assert_eq!(data.down, 9);
        assert!(data.switch_pressed);
        i2c.done();
    }

    #[test]
    fn switch_bit_ignores_low_bits() {
        let (mut driver, mut i2c) = driver(&[I2cTransaction::write_read(
            DEFAULT_ADDRESS,
            vec![REG_LEFT],
            vec![0, 0, 0, 0, 0x7f],
        )]);

        let data = block_on(driver.read_data()).unwrap();
        assert!(!data.switch_pressed);
        i2c.done();
    }

    #[test]
    fn set_rgbw_writes_all_four_channels() {
        let (mut driver, mut i2c) = driver(&[I2cTransaction::write(
            DEFAULT_ADDRESS,
            vec![REG_LED_RED, 10, 20, 30, 40],
        )]);

        block_on(driver.set_rgbw(Rgbw::new(10, 20, 30, 40))).unwrap();
        i2c.done();
    }

    #[test]
    fn bus_errors_map_to_driver_errors() {
        let (mut driver, mut i2c) = driver(&[I2cTransaction::write_read(
            DEFAULT_ADDRESS,
            vec![REG_LEFT],
            vec![0, 0, 0, 0, 0],
        )
        .with_error(ErrorKind::Other)]);

        assert_eq!(block_on(driver.read_data()).unwrap_err(), TrackballError::I2c);
        i2c.done();
    }
}
