//! Report plumbing between the trackball device and the host transport.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use usbd_hid::descriptor::MouseReport;

pub const MOUSE_BTN1: u8 = 1 << 0;
pub const MOUSE_BTN2: u8 = 1 << 1;
pub const MOUSE_BTN3: u8 = 1 << 2;

/// The mouse report slot shared with the host transport.
///
/// The device fetches the report as last submitted, rewrites the fields it
/// owns, puts it back and asks for it to be sent. Firmwares that track the
/// outgoing report elsewhere (USB wrapper, BLE profile, a test double)
/// implement this to splice the trackball into their report path.
pub trait MouseReportHost {
    /// The report as last handed over with [`set_current`](Self::set_current).
    fn current(&self) -> MouseReport;

    /// Replace the pending report.
    fn set_current(&mut self, report: MouseReport);

    /// Push the pending report out to the host.
    async fn send(&mut self);
}

/// [`MouseReportHost`] backed by an embassy channel, for firmwares where a
/// dedicated HID writer task drains reports from a channel.
pub struct ChannelReportHost<'a, M: RawMutex, const N: usize> {
    channel: &'a Channel<M, MouseReport, N>,
    current: MouseReport,
}

impl<'a, M: RawMutex, const N: usize> ChannelReportHost<'a, M, N> {
    pub fn new(channel: &'a Channel<M, MouseReport, N>) -> Self {
        Self {
            channel,
            current: MouseReport {
                buttons: 0,
                x: 0,
                y: 0,
                wheel: 0,
                pan: 0,
            },
        }
    }
}

impl<'a, M: RawMutex, const N: usize> MouseReportHost for ChannelReportHost<'a, M, N> {
    fn current(&self) -> MouseReport {
        MouseReport {
            buttons: self.current.buttons,
            x: self.current.x,
            y: self.current.y,
            wheel: self.current.wheel,
            pan: self.current.pan,
        }
    }

    fn set_current(&mut self, report: MouseReport) {
        self.current = report;
    }

    async fn send(&mut self) {
        self.channel.send(self.current()).await;
    }
}
