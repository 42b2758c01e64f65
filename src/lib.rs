//! A driver for Pervasive Displays COG-gen-2 electrophoretic (e-paper) panels.
//!
//! This crate drives the panel's Chip-On-Glass (COG) controller over a
//! half-duplex command/data SPI link together with five discrete digital
//! control lines, turning a caller-supplied bitmap into the precisely timed,
//! pixel-interleaved sequence of frame writes that physically changes the
//! display.
//!
//! Three coupled subsystems make up the driver:
//!
//! - the power-up/power-down protocol ([`power`]) that brings the COG into a
//!   state where pixels can be driven, detects hardware faults and safely
//!   discharges the panel on exit;
//! - the three-stage erase-and-write update algorithm ([`stage`]) whose
//!   repetition, line-stepping pattern and timing depend on panel size and
//!   ambient temperature;
//! - the per-line SPI frame encoder ([`line`]) that packs odd pixels, a
//!   scan-row selector, even pixels and a border byte into one transfer.
//!
//! [`panel::Panel`] ties these together behind the eight operations this
//! crate exposes: `create`, `destroy`, `set_temperature`, `begin`, `clear`,
//! `image`, `end` and `status`.
//!
//! # Requirements
//!
//! - SPI: half-duplex, MSB first. MISO is only read during the explicit
//!   `read` calls this crate issues for COG ID, breakage and DC probes — it
//!   is otherwise ignored.
//! - Five GPIO lines, each a distinct [`embedded_hal::digital::OutputPin`]
//!   (panel-on, border, discharge, reset) or
//!   [`embedded_hal::digital::InputPin`] (busy).
//! - A [`timer::DeadlineTimer`] implementation for the stage-2 wall-clock
//!   fill, backed by a kernel interval timer or a monotonic clock read
//!   against a stored deadline.
//!
//! # Example
//!
//! ```ignore
//! use epd_pdi_cog2::{geometry::PanelSize, panel::Panel};
//!
//! let mut panel = Panel::create(PanelSize::Inch2_0, panel_on, border, discharge, reset, busy, timer);
//! panel.set_temperature(22);
//! panel.begin(&mut spi, &mut delay)?;
//! panel.image(&mut spi, &mut delay, &bitmap)?;
//! panel.end(&mut spi, &mut delay)?;
//! assert_eq!(panel.status(), epd_pdi_cog2::error::Status::Ok);
//! ```
//!
//! Graphics rendering, font handling, networking, persistence, multi-client
//! concurrency and hot-plug panel detection are out of scope for this crate;
//! see `DESIGN.md` for the full list of non-goals and how open questions in
//! the reference behaviour were resolved.
#![no_std]

pub mod compensation;
pub mod error;
pub mod geometry;
pub(crate) mod interface;
pub(crate) mod line;
pub mod panel;
pub(crate) mod power;
pub(crate) mod stage;
#[cfg(test)]
pub(crate) mod test_support;
pub mod timer;

pub use error::{Error, Status};
pub use geometry::PanelSize;
pub use interface::{PinError, SpiPort};
pub use panel::Panel;
