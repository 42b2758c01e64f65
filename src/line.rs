//! Per-line SPI frame construction: the odd/even pixel split, the scan-row
//! selector, and the stage-specific pixel recoding (§4.3).

use bit_field::BitField;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::error::Error;
use crate::geometry::{Geometry, DUMMY_LINE};
use crate::interface::{ControlPins, PinError, Register, SpiPort};

/// Which optical pass a line write belongs to; selects the pixel recoding
/// applied to source bytes (§4.3 steps 3 and 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Stage 1: drive the inverse of the target image.
    Inverse,
    /// Stage 3 (and the scan-selector-only dummy/blanking lines): drive the
    /// image normally.
    Normal,
}

/// What to drive for one line's pixel content.
#[derive(Debug, Clone, Copy)]
pub enum PixelSource<'a> {
    /// One row of the caller's bitmap, `bytes_per_line` bytes.
    Data(&'a [u8]),
    /// The same byte repeated for every pixel (used by stage 2's flicker
    /// fills and by `clear`'s constant stage-1/stage-3 passes).
    Fixed(u8),
}

/// Recodes one source byte's odd (low-nibble-mask) pixels for the given stage.
///
/// `EPD_normal`: `0xaa | (b & 0x55)`. `EPD_inverse`: `0xaa | ((b & 0x55) ^ 0x55)`.
pub(crate) fn odd_byte(b: u8, stage: Stage) -> u8 {
    let masked = b & 0x55;
    match stage {
        Stage::Normal => 0xaa | masked,
        Stage::Inverse => 0xaa | (masked ^ 0x55),
    }
}

/// Recodes one source byte's even (high-nibble-mask) pixels for the given
/// stage, then reverses the four 2-bit pixel pairs within the byte to match
/// the panel's physical even-pixel scan direction.
///
/// `EPD_normal`: bit-pair-reverse of `0xaa | (b >> 1)`. `EPD_inverse`:
/// bit-pair-reverse of `0xaa | ((b ^ 0xaa) >> 1)`.
pub(crate) fn even_byte(b: u8, stage: Stage) -> u8 {
    let masked = b & 0xaa;
    let recoded = match stage {
        Stage::Normal => 0xaa | (masked >> 1),
        Stage::Inverse => 0xaa | ((masked ^ 0xaa) >> 1),
    };
    reverse_pixel_pairs(recoded)
}

/// Extracts the four 2-bit pixel pairs from `b` (bits 7..6, 5..4, 3..2, 1..0)
/// and reassembles them in reverse order.
fn reverse_pixel_pairs(b: u8) -> u8 {
    let p1 = (b >> 6) & 0b11;
    let p2 = (b >> 4) & 0b11;
    let p3 = (b >> 2) & 0b11;
    let p4 = b & 0b11;
    p1 | (p2 << 2) | (p3 << 4) | (p4 << 6)
}

/// Computes the scan-selector byte index and value for `line`, or `None`
/// when `line` is the dummy sentinel (no byte is driven).
///
/// Index `(L - line - 1) / 4`, value `0b11 << (2 * (line % 4))`. The stepped
/// scheduler's `pos > L` (not `>=`) boundary (§9, preserved verbatim in
/// `stage::run_stepped_stage`) forwards `line == lines_per_display` as a real
/// line, at which point `L - line - 1` is negative; computed in signed
/// arithmetic with Rust's truncating-toward-zero `/` (matching the reference
/// implementation's C truncation), `-1 / 4` lands on index 0 rather than
/// underflowing.
pub(crate) fn scan_selector(line: u16, lines_per_display: u16) -> Option<(usize, u8)> {
    if line == DUMMY_LINE {
        return None;
    }
    let raw_index = (lines_per_display as i32 - line as i32 - 1) / 4;
    let index = raw_index.max(0) as usize;
    let mut value = 0u8;
    let shift = 2 * (line % 4);
    value.set_bits(shift..shift + 2, 0b11);
    Some((index, value))
}

/// Builds one line frame's data payload (border, odd pixels, scan selector,
/// even pixels — §4.3 steps 2-5) into `buf`.
///
/// `buf` must be at least `geometry.line_frame_len()` bytes; only that many
/// bytes are written. Returns the number of bytes written.
pub(crate) fn encode_line(
    buf: &mut [u8],
    geometry: &Geometry,
    line: u16,
    border: u8,
    source: PixelSource<'_>,
    stage: Stage,
) -> usize {
    let bpl = geometry.bytes_per_line as usize;
    let bps = geometry.bytes_per_scan as usize;
    debug_assert!(buf.len() >= geometry.line_frame_len());

    buf[0] = border;

    let odd = &mut buf[1..1 + bpl];
    match source {
        PixelSource::Data(row) => {
            debug_assert_eq!(row.len(), bpl);
            for (i, dst) in odd.iter_mut().enumerate() {
                *dst = odd_byte(row[bpl - 1 - i], stage);
            }
        }
        PixelSource::Fixed(value) => odd.fill(value),
    }

    let scan = &mut buf[1 + bpl..1 + bpl + bps];
    scan.fill(0);
    if let Some((index, value)) = scan_selector(line, geometry.lines_per_display) {
        if index < bps {
            scan[index] = value;
        }
    }

    let even = &mut buf[1 + bpl + bps..1 + 2 * bpl + bps];
    match source {
        PixelSource::Data(row) => {
            for (i, dst) in even.iter_mut().enumerate() {
                *dst = even_byte(row[i], stage);
            }
        }
        PixelSource::Fixed(value) => even.fill(value),
    }

    geometry.line_frame_len()
}

/// Builds and ships one complete line SPI session (§4.3, "After building"):
/// open SPI, send the data-prepare command, wait 10 µs, send the packed
/// buffer (`0x72` prefix + encoded frame), send the output-enable command,
/// close SPI.
///
/// `buf` must be at least `1 + geometry.line_frame_len()` bytes; only that
/// many are used regardless of the buffer's total capacity.
#[allow(clippy::too_many_arguments)]
pub(crate) fn one_line<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER, DELAY>(
    pins: &mut ControlPins<PANELON, BORDER, DISCHARGE, RESET, BUSY>,
    spi: &mut SPI,
    delay: &mut DELAY,
    buf: &mut [u8],
    geometry: &Geometry,
    line: u16,
    border: u8,
    source: PixelSource<'_>,
    stage: Stage,
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
    const DATA_PREFIX: u8 = 0x72;

    spi.on().map_err(Error::Spi)?;
    pins.cmd(spi, Register::DataPrepare)?;
    delay.delay_us(10);

    buf[0] = DATA_PREFIX;
    let frame_len = encode_line(&mut buf[1..], geometry, line, border, source, stage);
    spi.send(&buf[..1 + frame_len]).map_err(Error::Spi)?;

    pins.cmd_data(spi, Register::OutputEnable, &[0x2f])?;
    spi.off().map_err(Error::Spi)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{geometry, PanelSize};

    #[test]
    fn odd_even_encoding_matches_spec_property_2() {
        let b = 0b1011_0110u8;
        assert_eq!(odd_byte(b, Stage::Normal), 0xaa | (b & 0x55));
        assert_eq!(odd_byte(b, Stage::Inverse), 0xaa | ((b & 0x55) ^ 0x55));

        let normal_pre_reverse = 0xaa | ((b & 0xaa) >> 1);
        assert_eq!(even_byte(b, Stage::Normal), reverse_pixel_pairs(normal_pre_reverse));

        let inverse_pre_reverse = 0xaa | (((b & 0xaa) ^ 0xaa) >> 1);
        assert_eq!(even_byte(b, Stage::Inverse), reverse_pixel_pairs(inverse_pre_reverse));
    }

    #[test]
    fn scan_selector_is_unique_and_positioned() {
        let l = 96u16;
        for line in 0..l {
            let (index, value) = scan_selector(line, l).unwrap();
            assert_eq!(index, ((l - line - 1) / 4) as usize);
            assert_eq!(value, 0b11 << (2 * (line % 4)));
        }
    }

    #[test]
    fn scan_selector_at_line_equal_to_lines_per_display_does_not_underflow() {
        // The stepped scheduler's `pos > L` (not `>=`) boundary forwards
        // `line == lines_per_display` as a real line (§9 open question).
        let l = 96u16;
        let (index, value) = scan_selector(l, l).unwrap();
        assert_eq!(index, 0);
        assert_eq!(value, 0b11 << (2 * (l % 4)));
    }

    #[test]
    fn dummy_line_has_no_scan_selector() {
        assert_eq!(scan_selector(DUMMY_LINE, 96), None);
    }

    #[test]
    fn encode_line_odd_byte_ordering_matches_spec_property_4() {
        let g = geometry(PanelSize::Inch1_44);
        let mut row = [0u8; 16];
        for (i, b) in row.iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut buf = [0u8; 64];
        encode_line(&mut buf, g, 0, 0x00, PixelSource::Data(&row), Stage::Normal);

        let bpl = g.bytes_per_line as usize;
        let odd = &buf[1..1 + bpl];
        for i in 0..bpl {
            assert_eq!(odd[i], odd_byte(row[bpl - 1 - i], Stage::Normal));
        }
        let bps = g.bytes_per_scan as usize;
        let even = &buf[1 + bpl + bps..1 + 2 * bpl + bps];
        for i in 0..bpl {
            assert_eq!(even[i], even_byte(row[i], Stage::Normal));
        }
    }

    #[test]
    fn encode_line_dummy_selector_all_zero() {
        let g = geometry(PanelSize::Inch2_0);
        let mut buf = [0u8; 64];
        encode_line(&mut buf, g, DUMMY_LINE, 0xff, PixelSource::Fixed(0x00), Stage::Normal);
        let bpl = g.bytes_per_line as usize;
        let bps = g.bytes_per_scan as usize;
        assert!(buf[1 + bpl..1 + bpl + bps].iter().all(|&b| b == 0));
        assert_eq!(buf[0], 0xff);
    }

    #[test]
    fn frame_len_excludes_prefix_and_filler() {
        let g = geometry(PanelSize::Inch2_7);
        let mut buf = [0u8; crate::geometry::MAX_LINE_BUFFER];
        let written = encode_line(&mut buf, g, 0, 0x00, PixelSource::Fixed(0xff), Stage::Normal);
        assert_eq!(written, g.line_frame_len());
    }
}
