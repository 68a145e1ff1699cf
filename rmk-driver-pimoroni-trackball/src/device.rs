//! Trackball device: polls the sensor and shapes mouse reports.

use embassy_futures::select::select;
use embassy_time::{Duration, Instant, Timer};
use embedded_hal::digital::InputPin;
use embedded_hal_async::digital::Wait;

use crate::hid::{MouseReportHost, MOUSE_BTN1, MOUSE_BTN2, MOUSE_BTN3};

/// One raw state frame from the sensor: per-direction movement counts since
/// the previous read, plus the state of the switch under the ball.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackballData {
    pub left: u8,
    pub right: u8,
    pub up: u8,
    pub down: u8,
    pub switch_pressed: bool,
}

/// Errors of the trackball driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrackballError {
    /// I2C communication error
    I2c,
    /// Bus transfer exceeded the configured timeout
    Timeout,
    /// Unexpected chip id read from the device
    InvalidChipId(u16),
    /// Initialization failed
    InitFailed,
}

/// Register-level access to the trackball, decoupled from the sampling
/// logic so the device can run against test doubles.
pub trait TrackballDriver {
    type INT: InputPin + Wait;

    async fn init(&mut self) -> Result<(), TrackballError>;
    async fn read_data(&mut self) -> Result<TrackballData, TrackballError>;
    fn interrupt_pin(&mut self) -> Option<&mut Self::INT>;
}

/// Initialization state for the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Pending,
    Initializing(u8),
    Ready,
    Failed,
}

/// Trackball poll loop and report builder.
///
/// Raw per-direction counts are folded through a quadratic acceleration
/// curve into four pending offsets (pointer x/y, scroll h/v). Each time any
/// input changed, the pending offsets are drained into the next mouse
/// report, at most ±127 per axis per report; whatever does not fit is
/// carried and flushed with the next changed poll. Polls where nothing
/// changed cost one bus read and produce no report at all.
pub struct TrackballDevice<S: TrackballDriver, H: MouseReportHost> {
    sensor: S,
    host: H,
    init_state: InitState,
    poll_interval: Duration,

    precision: i16,
    scrolling: bool,
    pointer_x: i16,
    pointer_y: i16,
    scroll_h: i16,
    scroll_v: i16,

    dirty: bool,
    left_down: bool,
    right_down: bool,
    middle_down: bool,
    ball_pressed: bool,

    poll_count: u32,
    poll_window: Instant,
}

impl<S, H> TrackballDevice<S, H>
where
    S: TrackballDriver,
    H: MouseReportHost,
{
    const MAX_INIT_RETRIES: u8 = 3;
    const DEFAULT_POLL_INTERVAL_US: u64 = 1000;

    /// Create a new trackball device polling at the default interval
    pub fn new(sensor: S, host: H) -> Self {
        Self::with_poll_interval(sensor, host, Self::DEFAULT_POLL_INTERVAL_US)
    }

    /// Create a new trackball device with a custom poll interval
    pub fn with_poll_interval(sensor: S, host: H, poll_interval_us: u64) -> Self {
        Self {
            sensor,
            host,
            init_state: InitState::Pending,
            poll_interval: Duration::from_micros(poll_interval_us),
            precision: 0,
            scrolling: false,
            pointer_x: 0,
            pointer_y: 0,
            scroll_h: 0,
            scroll_v: 0,
            dirty: false,
            left_down: false,
            right_down: false,
            middle_down: false,
            ball_pressed: false,
            poll_count: 0,
            poll_window: Instant::MIN,
        }
    }

    /// Current speed multiplier
    pub fn precision(&self) -> i16 {
        self.precision
    }

    /// Set the speed multiplier; takes effect from the next poll
    pub fn set_precision(&mut self, precision: i16) {
        self.precision = precision;
    }

    /// Whether the ball currently scrolls instead of moving the pointer
    pub fn is_scrolling(&self) -> bool {
        self.scrolling
    }

    /// Switch between pointer and scroll mode. Motion already pending for
    /// either mode is kept and flushes as usual.
    pub fn set_scrolling(&mut self, scrolling: bool) {
        self.scrolling = scrolling;
    }

    /// Latch the primary button state, e.g. from a key handler
    pub fn set_left(&mut self, pressed: bool) {
        self.dirty |= pressed != self.left_down;
        self.left_down = pressed;
    }

    /// Latch the secondary button state
    pub fn set_right(&mut self, pressed: bool) {
        self.dirty |= pressed != self.right_down;
        self.right_down = pressed;
    }

    /// Latch the middle button state
    pub fn set_middle(&mut self, pressed: bool) {
        self.dirty |= pressed != self.middle_down;
        self.middle_down = pressed;
    }

    /// Access the underlying sensor driver, e.g. to change the LED colour
    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Run the poll loop forever.
    pub async fn run(&mut self) -> ! {
        loop {
            let poll_interval = self.poll_interval;
            if let Some(pin) = self.sensor.interrupt_pin() {
                // Wake early when the sensor pulls INT low, but keep the
                // timer armed so latched button edges still flush on time.
                let _ = select(Timer::after(poll_interval), pin.wait_for_low()).await;
            } else {
                Timer::after(poll_interval).await;
            }
            self.poll_once().await;
        }
    }

    /// One poll: read the sensor, accumulate motion, and send a report if
    /// anything changed since the last one.
    pub async fn poll_once(&mut self) {
        if self.init_state != InitState::Ready && !self.try_init().await {
            return;
        }
        self.note_poll();

        let mut data = TrackballData::default();
        match self.sensor.read_data().await {
            Ok(d) => {
                data = d;
                self.accumulate(&data);
            }
            Err(_e) => {
                // The sample is lost; pending offsets keep whatever motion
                // is still waiting to be reported.
                warn!("trackball: read failed, skipping motion this poll");
            }
        }

        let pressed = data.switch_pressed;
        self.dirty |= pressed != self.ball_pressed;
        self.ball_pressed = pressed;

        if !self.dirty {
            return;
        }
        self.dirty = false;
        self.flush().await;
    }

    async fn try_init(&mut self) -> bool {
        match self.init_state {
            InitState::Ready => return true,
            InitState::Failed => return false,
            InitState::Pending => {
                self.init_state = InitState::Initializing(0);
            }
            InitState::Initializing(_) => {}
        }

        if let InitState::Initializing(retry) = self.init_state {
            info!("trackball: initializing sensor (attempt {})", retry + 1);
            match self.sensor.init().await {
                Ok(()) => {
                    info!("trackball: sensor ready");
                    self.init_state = InitState::Ready;
                    return true;
                }
                Err(e) => {
                    error!("trackball: init failed: {:?}", e);
                    if retry + 1 >= Self::MAX_INIT_RETRIES {
                        error!("trackball: giving up after {} attempts", Self::MAX_INIT_RETRIES);
                        self.init_state = InitState::Failed;
                        return false;
                    }
                    self.init_state = InitState::Initializing(retry + 1);
                    Timer::after(Duration::from_millis(100)).await;
                }
            }
        }

        false
    }

    fn accumulate(&mut self, data: &TrackballData) {
        let x = data.right as i16 - data.left as i16;
        let y = data.up as i16 - data.down as i16;
        if x != 0 || y != 0 {
            self.dirty = true;
        }

        // Sign of zero is +1; the magnitude is squared before the sign is
        // applied, so a zero delta still contributes nothing.
        let sx: i32 = if x < 0 { -1 } else { 1 };
        let sy: i32 = if y < 0 { -1 } else { 1 };
        let gain = 1 + self.precision as i32;
        let (x, y) = (x as i32, y as i32);

        if self.scrolling {
            let h = x * x / 2 * gain * sx;
            let v = y * y / 2 * gain * sy;
            // Horizontal scroll runs opposite the ball; vertical matches.
            self.scroll_h = add_clamped(self.scroll_h, -h);
            self.scroll_v = add_clamped(self.scroll_v, v);
        } else {
            // Quadratic curve. Tracks well with the host's own pointer
            // acceleration enabled; a 2^x curve was tried and felt worse.
            let dx = x * x * gain * sx;
            let dy = y * y * gain * sy;
            // The ball is mounted rotated, so both axes flip.
            self.pointer_x = add_clamped(self.pointer_x, -dx);
            self.pointer_y = add_clamped(self.pointer_y, -dy);
        }
    }

    async fn flush(&mut self) {
        let mut report = self.host.current();

        set_button(&mut report.buttons, MOUSE_BTN1, self.ball_pressed || self.left_down);
        set_button(&mut report.buttons, MOUSE_BTN2, self.right_down);
        set_button(&mut report.buttons, MOUSE_BTN3, self.middle_down);

        report.x = drain_offset(&mut self.pointer_x);
        report.y = drain_offset(&mut self.pointer_y);
        report.pan = drain_offset(&mut self.scroll_h);
        report.wheel = drain_offset(&mut self.scroll_v);

        self.host.set_current(report);
        self.host.send().await;
    }

    fn note_poll(&mut self) {
        if self.poll_window == Instant::MIN {
            self.poll_window = Instant::now();
        }
        self.poll_count += 1;
        if self.poll_window.elapsed() >= Duration::from_secs(1) {
            debug!("trackball: {} polls/s", self.poll_count);
            self.poll_count = 0;
            self.poll_window = Instant::now();
        }
    }
}

/// Move as much pending motion as fits into one 8-bit report field,
/// carrying the remainder forward to the next report.
fn drain_offset(offset: &mut i16) -> i8 {
    const LIMIT: i16 = i8::MAX as i16;
    if *offset > LIMIT {
        *offset -= LIMIT;
        i8::MAX
    } else if *offset < -LIMIT {
        *offset += LIMIT;
        -i8::MAX
    } else {
        let field = *offset as i8;
        *offset = 0;
        field
    }
}

fn add_clamped(offset: i16, delta: i32) -> i16 {
    (offset as i32 + delta).clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn set_button(buttons: &mut u8, mask: u8, pressed: bool) {
    if pressed {
        *buttons |= mask;
    } else {
        *buttons &= !mask;
    }
}
