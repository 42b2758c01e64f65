//! Panel geometry table and channel-select constants.

/// Supported Pervasive Displays COG-gen-2 panel sizes.
///
/// Only these three geometries are known to this core; the daemon-level
/// registry above it carries more size tags (including 1.9" and 2.6") but
/// they have no entry here and fall back to [`PanelSize::Inch1_44`], matching
/// the reference implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelSize {
    /// 1.44" panel: 96 lines, 128 dots per line.
    Inch1_44,
    /// 2.0" panel: 96 lines, 200 dots per line.
    Inch2_0,
    /// 2.7" panel: 176 lines, 264 dots per line.
    Inch2_7,
}

impl PanelSize {
    /// Maps an unrecognised daemon-level size tag to the default geometry.
    ///
    /// There is no public enum variant for unknown sizes: callers that need
    /// this fallback construct `PanelSize` themselves (e.g. from a registry
    /// lookup) and fall through to `Inch1_44` the same way `create` does.
    pub fn or_default(size: Option<PanelSize>) -> PanelSize {
        size.unwrap_or(PanelSize::Inch1_44)
    }
}

/// Static geometry for one panel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Number of scan lines on the panel.
    pub lines_per_display: u16,
    /// Number of dots (pixels) per line.
    pub dots_per_line: u16,
    /// `dots_per_line / 8`.
    pub bytes_per_line: u16,
    /// `lines_per_display / 4`.
    pub bytes_per_scan: u16,
    /// 9-byte channel-select register payload for `COMMAND_CHANNEL_SELECT` (`0x01`).
    pub channel_select: &'static [u8; 9],
}

impl Geometry {
    /// Length, in bytes, of one encoded line frame's data payload
    /// (border + odd pixels + scan selector + even pixels).
    pub const fn line_frame_len(&self) -> usize {
        1 + 2 * self.bytes_per_line as usize + self.bytes_per_scan as usize
    }

    /// Size of the handle's owned line buffer: `2*bytes_per_line + bytes_per_scan + 3`.
    pub const fn line_buffer_len(&self) -> usize {
        2 * self.bytes_per_line as usize + self.bytes_per_scan as usize + 3
    }

    /// Total bytes in one full-frame image buffer.
    pub const fn image_len(&self) -> usize {
        self.lines_per_display as usize * self.bytes_per_line as usize
    }
}

/// Sentinel line number addressed to no real scan row; used for dummy lines
/// and the end-of-frame border pulses.
pub const DUMMY_LINE: u16 = 0x7fff;

/// Largest `line_buffer_len()` across all supported sizes (2.7"), used to
/// size the fixed-capacity line buffer stored in [`crate::panel::Panel`].
pub const MAX_LINE_BUFFER: usize = 2 * 33 + 44 + 3;

const CHANNEL_SELECT_1_44: [u8; 9] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x0f, 0xff, 0x00, 0x00];
const CHANNEL_SELECT_2_0: [u8; 9] = [0x00, 0x00, 0x00, 0x00, 0x01, 0xff, 0xe0, 0x00, 0x00];
const CHANNEL_SELECT_2_7: [u8; 9] = [0xff, 0xff, 0xff, 0xff, 0x01, 0xff, 0xff, 0xff, 0xff];

const GEOMETRY_1_44: Geometry = Geometry {
    lines_per_display: 96,
    dots_per_line: 128,
    bytes_per_line: 16,
    bytes_per_scan: 24,
    channel_select: &CHANNEL_SELECT_1_44,
};

const GEOMETRY_2_0: Geometry = Geometry {
    lines_per_display: 96,
    dots_per_line: 200,
    bytes_per_line: 25,
    bytes_per_scan: 24,
    channel_select: &CHANNEL_SELECT_2_0,
};

const GEOMETRY_2_7: Geometry = Geometry {
    lines_per_display: 176,
    dots_per_line: 264,
    bytes_per_line: 33,
    bytes_per_scan: 44,
    channel_select: &CHANNEL_SELECT_2_7,
};

/// Looks up the static geometry table entry for a panel size.
pub const fn geometry(size: PanelSize) -> &'static Geometry {
    match size {
        PanelSize::Inch1_44 => &GEOMETRY_1_44,
        PanelSize::Inch2_0 => &GEOMETRY_2_0,
        PanelSize::Inch2_7 => &GEOMETRY_2_7,
    }
}
