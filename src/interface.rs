//! The half-duplex SPI transport contract and the control-pin wiring shared
//! by the power sequencer, the stage driver and the line encoder.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::Error;

/// The COG command protocol's bus-level contract (§6).
///
/// This is deliberately not `embedded_hal::spi::SpiDevice`: that trait
/// acquires and releases chip-select once per `transaction`/`transfer`
/// call, but this protocol's bus lifetime spans a whole register round
/// trip or a whole line write, explicitly bracketed by the core itself with
/// `on`/`off`. A caller's `SpiPort` impl is free to wrap a `SpiDevice` (or a
/// raw `SpiBus` plus a manually toggled CS pin) however its platform likes;
/// this crate only ever calls these four operations.
pub trait SpiPort {
    /// Error type for all four operations.
    type Error: core::fmt::Debug;

    /// Acquires the bus (asserts chip-select / powers the controller on).
    fn on(&mut self) -> Result<(), Self::Error>;

    /// Releases the bus.
    fn off(&mut self) -> Result<(), Self::Error>;

    /// Writes `data` out, ignoring any data shifted in.
    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Full-duplex: writes `prefix` out while simultaneously capturing the
    /// bytes shifted in, one per prefix byte, into `out` (`out.len()` must
    /// equal `prefix.len()`). Per §6, the COG only drives a meaningful reply
    /// byte onto the line once its address byte has been clocked out, so
    /// `out[0]` is typically garbage and `out[1]` carries the payload.
    fn read(&mut self, prefix: &[u8], out: &mut [u8]) -> Result<(), Self::Error>;
}

/// Command-frame byte preceding a register address (§6).
const COMMAND_PREFIX: u8 = 0x70;
/// Data-frame byte preceding a register's value bytes.
const DATA_PREFIX: u8 = 0x72;
/// Read-frame byte preceding a shifted-in response.
const READ_PREFIX: u8 = 0x73;

/// COG register addresses used by this core (§6).
#[derive(Debug, Clone, Copy)]
pub(crate) enum Register {
    ChannelSelect = 0x01,
    OutputEnable = 0x02,
    DriverLatch = 0x03,
    PowerAndDischarge = 0x04,
    ChargePump = 0x05,
    Oscillator = 0x07,
    PowerSetting = 0x08,
    VcomLevel = 0x09,
    DataPrepare = 0x0a,
    PowerSaving = 0x0b,
    DcOrBreakage = 0x0f,
    CogId = 0x71,
}

/// The five discrete control lines wired to the COG, owned by [`crate::panel::Panel`].
pub(crate) struct ControlPins<PANELON, BORDER, DISCHARGE, RESET, BUSY> {
    pub panel_on: PANELON,
    pub border: BORDER,
    pub discharge: DISCHARGE,
    pub reset: RESET,
    pub busy: BUSY,
}

/// Shorthand for the [`Error`] type returned by [`crate::panel::Panel`]'s
/// methods, parameterized over the collaborator types in scope at the call
/// site. Public because it appears in the return type of `Panel`'s public
/// methods (`begin`, `end`, `image`, `clear`).
pub type PinError<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER> = Error<
    <SPI as SpiPort>::Error,
    <PANELON as OutputPin>::Error,
    <BORDER as OutputPin>::Error,
    <DISCHARGE as OutputPin>::Error,
    <RESET as OutputPin>::Error,
    <BUSY as InputPin>::Error,
    TIMER,
>;

impl<PANELON, BORDER, DISCHARGE, RESET, BUSY> ControlPins<PANELON, BORDER, DISCHARGE, RESET, BUSY>
where
    PANELON: OutputPin,
    BORDER: OutputPin,
    DISCHARGE: OutputPin,
    RESET: OutputPin,
    BUSY: InputPin,
{
    /// Sends a command frame `[0x70, reg]`.
    pub(crate) fn cmd<SPI: SpiPort, TIMER>(
        &mut self,
        spi: &mut SPI,
        reg: Register,
    ) -> Result<(), PinError<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER>> {
        spi.send(&[COMMAND_PREFIX, reg as u8]).map_err(Error::Spi)
    }

    /// Sends a command frame followed by a data frame `[0x72, value...]`.
    pub(crate) fn cmd_data<SPI: SpiPort, TIMER>(
        &mut self,
        spi: &mut SPI,
        reg: Register,
        value: &[u8],
    ) -> Result<(), PinError<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER>> {
        self.cmd(spi, reg)?;
        let mut prefixed = [0u8; 10];
        prefixed[0] = DATA_PREFIX;
        prefixed[1..1 + value.len()].copy_from_slice(value);
        spi.send(&prefixed[..1 + value.len()]).map_err(Error::Spi)
    }

    /// Issues `[0x70, reg]` then reads `out.len()` bytes shifted in after a
    /// `[0x73, 0x00]` prefix. `out[1]` is the payload byte per §6.
    pub(crate) fn read_reg<SPI: SpiPort, TIMER>(
        &mut self,
        spi: &mut SPI,
        reg: Register,
        out: &mut [u8],
    ) -> Result<(), PinError<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER>> {
        self.cmd(spi, reg)?;
        spi.read(&[READ_PREFIX, 0x00], out).map_err(Error::Spi)
    }

    /// Polls the busy pin at 10 µs intervals until it reads low (§4.1 step 4).
    pub(crate) fn wait_until_idle<DELAY: DelayNs>(
        &mut self,
        delay: &mut DELAY,
    ) -> Result<(), BUSY::Error> {
        while self.busy.is_high()? {
            delay.delay_us(10);
        }
        Ok(())
    }
}
