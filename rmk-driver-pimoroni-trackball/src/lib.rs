#![cfg_attr(not(test), no_std)]
#![allow(async_fn_in_trait)]
//! Pimoroni PIM447 trackball driver for RMK.
//!
//! The PIM447 is an I2C trackball breakout with an RGBW LED under the ball
//! and a push switch on the ball itself. This crate polls the sensor,
//! shapes the raw per-direction counts into mouse reports (with a quadratic
//! acceleration curve and a pointer/scroll mode switch), and hands the
//! reports to the firmware through the [`hid::MouseReportHost`] trait.
//!
//! # Example
//!
//! ```rust
//! use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
//! use embassy_sync::channel::Channel;
//! use rmk_driver_pimoroni_trackball::{
//!     ChannelReportHost, Pim447, TrackballConfig, TrackballDevice,
//! };
//! use usbd_hid::descriptor::MouseReport;
//!
//! static MOUSE_REPORT_CHANNEL: Channel<CriticalSectionRawMutex, MouseReport, 8> = Channel::new();
//!
//! // `i2c` is any embedded-hal-async I2C bus, `int_pin` an optional
//! // input pin wired to the breakout's INT pad.
//! let sensor = Pim447::new(i2c, Some(int_pin), TrackballConfig::default());
//! let host = ChannelReportHost::new(&MOUSE_REPORT_CHANNEL);
//! let mut trackball = TrackballDevice::new(sensor, host);
//!
//! // Run the poll loop alongside the rest of the firmware. Key handlers
//! // can drive `trackball.set_left(..)`, `set_scrolling(..)` etc. to map
//! // keyboard events onto the pointer.
//! trackball.run().await;
//! ```
//!
//! ## Feature flags
#![doc = document_features::document_features!()]

#[macro_use]
mod fmt;

pub mod config;
pub mod device;
pub mod driver;
pub mod hid;

pub use config::{Rgbw, TrackballConfig};
pub use device::{InitState, TrackballData, TrackballDevice, TrackballDriver, TrackballError};
pub use driver::Pim447;
pub use hid::{ChannelReportHost, MouseReportHost, MOUSE_BTN1, MOUSE_BTN2, MOUSE_BTN3};
