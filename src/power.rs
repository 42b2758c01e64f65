//! The power-up / power-down protocol (§4.1): brings the COG controller
//! into a driveable state, probes for hardware faults, and safely
//! discharges the panel on exit.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::{Error, Status};
use crate::geometry::{Geometry, PanelSize};
use crate::interface::{ControlPins, PinError, Register, SpiPort};
use crate::line::{one_line, PixelSource, Stage};

/// Number of DC/DC charge-pump bring-up attempts before latching `DcFailed` (§4.1 step 10).
const DC_BRINGUP_ATTEMPTS: u8 = 4;

#[allow(clippy::too_many_arguments)]
pub(crate) fn begin<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, DELAY, TIMER>(
    pins: &mut ControlPins<PANELON, BORDER, DISCHARGE, RESET, BUSY>,
    spi: &mut SPI,
    delay: &mut DELAY,
    geometry: &Geometry,
) -> Result<Status, PinError<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER>>
where
    SPI: SpiPort,
    PANELON: OutputPin,
    BORDER: OutputPin,
    DISCHARGE: OutputPin,
    RESET: OutputPin,
    BUSY: InputPin,
    DELAY: DelayNs,
{
    // Step 1: everything low, SPI open, settle.
    pins.reset.set_low().map_err(Error::Reset)?;
    pins.panel_on.set_low().map_err(Error::PanelOn)?;
    pins.discharge.set_low().map_err(Error::Discharge)?;
    pins.border.set_low().map_err(Error::Border)?;
    spi.on().map_err(Error::Spi)?;
    delay.delay_ms(5);

    // Step 2: panel rail up.
    pins.panel_on.set_high().map_err(Error::PanelOn)?;
    delay.delay_ms(10);

    // Step 3: reset pulse, border high during the first high phase.
    pins.reset.set_high().map_err(Error::Reset)?;
    pins.border.set_high().map_err(Error::Border)?;
    delay.delay_ms(5);
    pins.reset.set_low().map_err(Error::Reset)?;
    delay.delay_ms(5);
    pins.reset.set_high().map_err(Error::Reset)?;
    pins.border.set_low().map_err(Error::Border)?;
    delay.delay_ms(5);

    // Step 4: wait for the controller to come out of busy.
    pins.wait_until_idle(delay).map_err(Error::Busy)?;

    // Step 5: COG ID probe, two back-to-back reads, low nibble must be 0x02.
    let mut first = [0u8; 2];
    let mut second = [0u8; 2];
    pins.read_reg(spi, Register::CogId, &mut first)?;
    pins.read_reg(spi, Register::CogId, &mut second)?;
    if second[1] & 0x0f != 0x02 {
        power_off(pins, spi, delay)?;
        return Ok(Status::UnsupportedCog);
    }

    // Step 6: disable output enable before the breakage probe.
    pins.cmd_data(spi, Register::OutputEnable, &[0x40])?;

    // Step 7: breakage check; bit 7 clear means the panel is cracked.
    let mut breakage = [0u8; 2];
    pins.read_reg(spi, Register::DcOrBreakage, &mut breakage)?;
    if breakage[1] & 0x80 == 0 {
        power_off(pins, spi, delay)?;
        return Ok(Status::PanelBroken);
    }

    // Step 8: fixed register programming sequence.
    pins.cmd_data(spi, Register::PowerSaving, &[0x02])?;
    pins.cmd_data(spi, Register::ChannelSelect, geometry.channel_select)?;
    pins.cmd_data(spi, Register::Oscillator, &[0xd1])?;
    pins.cmd_data(spi, Register::PowerAndDischarge, &[0x03])?;
    pins.cmd_data(spi, Register::PowerSetting, &[0x02])?;
    pins.cmd_data(spi, Register::VcomLevel, &[0xc2])?;
    pins.cmd_data(spi, Register::DriverLatch, &[0x01])?;
    pins.cmd_data(spi, Register::DriverLatch, &[0x00])?;

    // Step 9
    delay.delay_ms(5);

    // Step 10: DC/DC bring-up, up to four attempts.
    let mut dc_ok = false;
    for _ in 0..DC_BRINGUP_ATTEMPTS {
        pins.cmd_data(spi, Register::ChargePump, &[0x01])?;
        delay.delay_ms(240);
        pins.cmd_data(spi, Register::ChargePump, &[0x03])?;
        delay.delay_ms(40);
        pins.cmd_data(spi, Register::ChargePump, &[0x0f])?;
        delay.delay_ms(40);

        let mut dc_state = [0u8; 2];
        pins.read_reg(spi, Register::DcOrBreakage, &mut dc_state)?;
        if dc_state[1] & 0x40 != 0 {
            dc_ok = true;
            break;
        }
    }
    if !dc_ok {
        power_off(pins, spi, delay)?;
        return Ok(Status::DcFailed);
    }

    // Step 11
    pins.cmd_data(spi, Register::OutputEnable, &[0x40])?;
    spi.off().map_err(Error::Spi)?;

    Ok(Status::Ok)
}

/// Border-pulse-only shutdown used for the 2.7" panel (§4.1, `end`).
fn end_border_pulse<BORDER, DELAY>(
    border: &mut BORDER,
    delay: &mut DELAY,
) -> Result<(), BORDER::Error>
where
    BORDER: OutputPin,
    DELAY: DelayNs,
{
    delay.delay_ms(25);
    border.set_low()?;
    delay.delay_ms(250);
    border.set_high()?;
    Ok(())
}

/// Three sentinel dummy lines with the `0xff, 0xaa, 0x00` border sequence,
/// used to end an update on 1.44"/2.0" panels (§4.1, §4.4).
#[allow(clippy::too_many_arguments)]
fn end_dummy_lines<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, DELAY, TIMER>(
    pins: &mut ControlPins<PANELON, BORDER, DISCHARGE, RESET, BUSY>,
    spi: &mut SPI,
    delay: &mut DELAY,
    buf: &mut [u8],
    geometry: &Geometry,
) -> Result<(), PinError<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER>>
where
    SPI: SpiPort,
    PANELON: OutputPin,
    BORDER: OutputPin,
    DISCHARGE: OutputPin,
    RESET: OutputPin,
    BUSY: InputPin,
    DELAY: DelayNs,
{
    use crate::geometry::DUMMY_LINE;

    for (border_byte, sleep_ms) in [(0xffu8, 40u32), (0xaa, 200), (0x00, 25)] {
        one_line(pins, spi, delay, buf, geometry, DUMMY_LINE, border_byte, PixelSource::Fixed(0x00), Stage::Normal)?;
        delay.delay_ms(sleep_ms);
    }
    Ok(())
}

/// Runs the full `end` shutdown sequence (§4.1) and returns the resulting
/// status (`DcFailed` if the post-update DC probe reports loss, otherwise
/// whatever was latched before `end` was called is left untouched by this
/// function — the caller decides whether to overwrite it).
#[allow(clippy::too_many_arguments)]
pub(crate) fn end<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, DELAY, TIMER>(
    pins: &mut ControlPins<PANELON, BORDER, DISCHARGE, RESET, BUSY>,
    spi: &mut SPI,
    delay: &mut DELAY,
    buf: &mut [u8],
    size: PanelSize,
    geometry: &Geometry,
) -> Result<Option<Status>, PinError<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER>>
where
    SPI: SpiPort,
    PANELON: OutputPin,
    BORDER: OutputPin,
    DISCHARGE: OutputPin,
    RESET: OutputPin,
    BUSY: InputPin,
    DELAY: DelayNs,
{
    if size == PanelSize::Inch2_7 {
        end_border_pulse(&mut pins.border, delay).map_err(Error::Border)?;
    } else {
        end_dummy_lines(pins, spi, delay, buf, geometry)?;
    }

    spi.on().map_err(Error::Spi)?;

    let mut dc_state = [0u8; 2];
    pins.read_reg(spi, Register::DcOrBreakage, &mut dc_state)?;
    let fault = if dc_state[1] & 0x40 == 0 { Some(Status::DcFailed) } else { None };

    pins.cmd_data(spi, Register::DriverLatch, &[0x01])?;
    pins.cmd_data(spi, Register::OutputEnable, &[0x05])?;
    pins.cmd_data(spi, Register::ChargePump, &[0x0e])?;
    pins.cmd_data(spi, Register::ChargePump, &[0x02])?;
    pins.cmd_data(spi, Register::ChargePump, &[0x00])?;
    pins.cmd_data(spi, Register::Oscillator, &[0x0d])?;
    pins.cmd_data(spi, Register::PowerAndDischarge, &[0x83])?;
    delay.delay_ms(120);
    pins.cmd_data(spi, Register::PowerAndDischarge, &[0x00])?;

    power_off(pins, spi, delay)?;

    Ok(fault)
}

/// Drives reset/panel-on/border low, closes SPI, then bleeds residual
/// charge with ten discharge pulses 10 ms apart (§4.1, §8 property 9).
pub(crate) fn power_off<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, DELAY, TIMER>(
    pins: &mut ControlPins<PANELON, BORDER, DISCHARGE, RESET, BUSY>,
    spi: &mut SPI,
    delay: &mut DELAY,
) -> Result<(), PinError<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER>>
where
    SPI: SpiPort,
    PANELON: OutputPin,
    BORDER: OutputPin,
    DISCHARGE: OutputPin,
    RESET: OutputPin,
    BUSY: InputPin,
    DELAY: DelayNs,
{
    pins.reset.set_low().map_err(Error::Reset)?;
    pins.panel_on.set_low().map_err(Error::PanelOn)?;
    pins.border.set_low().map_err(Error::Border)?;
    spi.off().map_err(Error::Spi)?;

    for _ in 0..10 {
        pins.discharge.set_high().map_err(Error::Discharge)?;
        delay.delay_ms(10);
        pins.discharge.set_low().map_err(Error::Discharge)?;
        delay.delay_ms(10);
    }
    Ok(())
}
