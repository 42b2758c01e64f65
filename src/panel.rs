//! The `Panel` handle: lifecycle, temperature compensation selection, and the
//! four public update operations (§1: `begin`, `clear`, `image`, `end`) built
//! on top of the power sequencer, stage driver and line encoder.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::compensation::{compensation, Compensation, TemperatureBand};
use crate::error::Status;
use crate::geometry::{geometry, Geometry, PanelSize, MAX_LINE_BUFFER};
use crate::interface::{ControlPins, PinError, SpiPort};
use crate::line::{one_line, Stage};
use crate::power;
use crate::stage::{run_stepped_stage, run_timed_stage, Content};
use crate::timer::DeadlineTimer;

/// The driver's sole long-lived entity (§3 "Panel handle").
///
/// Owns the five control pins, the fixed-capacity line buffer, the deadline
/// timer resource and the latched [`Status`]. The SPI transport and the
/// delay primitive are *not* owned — §3 calls out that "the transport is
/// shared with the caller" — so every operation borrows them for the
/// duration of the call instead of storing them, the same way this
/// codebase's own display drivers take `spi`/`delay` per call rather than at
/// construction.
pub struct Panel<PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER> {
    size: PanelSize,
    pins: ControlPins<PANELON, BORDER, DISCHARGE, RESET, BUSY>,
    geometry: &'static Geometry,
    compensation: &'static Compensation,
    buf: [u8; MAX_LINE_BUFFER],
    timer: TIMER,
    status: Status,
}

impl<PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER> Panel<PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER>
where
    PANELON: OutputPin,
    BORDER: OutputPin,
    DISCHARGE: OutputPin,
    RESET: OutputPin,
    BUSY: InputPin,
    TIMER: DeadlineTimer,
{
    /// `create(size, pins, spi)` (§4.4): allocates the handle, records the
    /// geometry and channel-select table for `size` (falling back to 1.44″
    /// for an unrecognised size per §9), and initialises the compensation
    /// pointer to the 25 °C (`Normal`) band.
    ///
    /// The SPI transport is not stored — it is borrowed by every method that
    /// needs it, matching §3's "the transport is shared with the caller".
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        size: PanelSize,
        panel_on: PANELON,
        border: BORDER,
        discharge: DISCHARGE,
        reset: RESET,
        busy: BUSY,
        timer: TIMER,
    ) -> Panel<PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER> {
        Panel {
            size,
            pins: ControlPins { panel_on, border, discharge, reset, busy },
            geometry: geometry(size),
            compensation: compensation(size, TemperatureBand::for_temperature(25)),
            buf: [0u8; MAX_LINE_BUFFER],
            timer,
            status: Status::Ok,
        }
    }

    /// `destroy` (§4.4): releases the handle. Safe-Rust equivalent of the
    /// reference implementation's "frees the line buffer, releases the
    /// timer, frees the handle" — there is nothing left to do beyond
    /// consuming `self`, since the fixed-size buffer and the owned `TIMER`
    /// are dropped along with it. Kept as an explicit method (rather than
    /// relying on an implicit drop) purely for symmetry with the named
    /// operation in §1.
    pub fn destroy(self) {}

    /// The latched fault kind (§4.4, §7). Sticky: never reset except by
    /// recreating the handle.
    pub fn status(&self) -> Status {
        self.status
    }

    /// `set_temperature(t)` (§4.4): selects the temperature band for `t`
    /// (whole degrees Celsius) and refreshes the compensation pointer for
    /// the panel size recorded at `create`. Valid in any lifecycle state;
    /// never touches `status`.
    pub fn set_temperature(&mut self, celsius: i16) {
        self.compensation = compensation(self.size, TemperatureBand::for_temperature(celsius));
    }

    /// `begin` (§4.1): runs the power-up state machine. Latches
    /// `UnsupportedCog`, `PanelBroken` or `DcFailed` and returns early
    /// (after running `power_off`) on the corresponding hardware fault;
    /// otherwise latches `Ok`.
    ///
    /// Returns the newly latched [`Status`] so a caller that only calls
    /// `begin` once doesn't need a second `status()` call to see it; the
    /// field is still updated for anyone polling later.
    pub fn begin<SPI, DELAY>(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
    ) -> Result<Status, PinError<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER::Error>>
    where
        SPI: SpiPort,
        DELAY: DelayNs,
    {
        #[cfg(feature = "defmt")]
        defmt::debug!("begin: power-up sequence starting");

        let status = power::begin::<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, DELAY, TIMER::Error>(
            &mut self.pins,
            spi,
            delay,
            self.geometry,
        )?;
        self.status = status;

        #[cfg(feature = "defmt")]
        if status.is_fault() {
            defmt::warn!("begin: latched fault {}", defmt::Debug2Format(&status));
        } else {
            defmt::debug!("begin: panel ready");
        }

        Ok(status)
    }

    /// `end` (§4.1): runs the safe shutdown sequence. Always runs to
    /// completion regardless of the handle's current `status`, per §7 ("end
    /// still runs its full shutdown path to leave the panel safely
    /// discharged"). Overwrites `status` with `DcFailed` if the post-update
    /// DC probe reports loss; otherwise leaves whatever was latched before
    /// untouched.
    pub fn end<SPI, DELAY>(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
    ) -> Result<(), PinError<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER::Error>>
    where
        SPI: SpiPort,
        DELAY: DelayNs,
    {
        #[cfg(feature = "defmt")]
        defmt::debug!("end: power-down sequence starting");

        if let Some(fault) = power::end::<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, DELAY, TIMER::Error>(
            &mut self.pins,
            spi,
            delay,
            &mut self.buf,
            self.size,
            self.geometry,
        )? {
            self.status = fault;
            #[cfg(feature = "defmt")]
            defmt::warn!("end: post-update DC probe latched {}", defmt::Debug2Format(&fault));
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("end: panel discharged");

        Ok(())
    }

    /// `image(bitmap)` (§4.2): runs stage 1 (inverse fill with `bitmap`),
    /// stage 2 (fixed black/white alternation) and stage 3 (normal fill
    /// with `bitmap`) in sequence.
    ///
    /// `bitmap` must be exactly `geometry.image_len()` bytes — one row of
    /// `bytes_per_line` bytes per display line, row-major, MSB-first.
    pub fn image<SPI, DELAY>(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        bitmap: &[u8],
    ) -> Result<(), PinError<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER::Error>>
    where
        SPI: SpiPort,
        DELAY: DelayNs,
    {
        debug_assert_eq!(bitmap.len(), self.geometry.image_len());
        self.run_three_stages(
            spi,
            delay,
            Content::Image { buffer: bitmap, bytes_per_line: self.geometry.bytes_per_line },
            Content::Image { buffer: bitmap, bytes_per_line: self.geometry.bytes_per_line },
        )
    }

    /// `clear` (§4.2): the same three-stage process as `image`, but stage 1
    /// drives a constant `0xff` and stage 3 drives a constant `0xaa` instead
    /// of caller data.
    pub fn clear<SPI, DELAY>(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
    ) -> Result<(), PinError<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER::Error>>
    where
        SPI: SpiPort,
        DELAY: DelayNs,
    {
        self.run_three_stages(spi, delay, Content::Fixed(0xff), Content::Fixed(0xaa))
    }

    /// Shared stage-1/stage-2/stage-3 driver behind `image` and `clear`.
    fn run_three_stages<SPI, DELAY>(
        &mut self,
        spi: &mut SPI,
        delay: &mut DELAY,
        stage1_content: Content<'_>,
        stage3_content: Content<'_>,
    ) -> Result<(), PinError<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER::Error>>
    where
        SPI: SpiPort,
        DELAY: DelayNs,
    {
        let c = *self.compensation;
        let l = self.geometry.lines_per_display;

        #[cfg(feature = "defmt")]
        defmt::debug!("image: stage 1 (inverse fill) starting");
        Self::run_stepped(&mut self.pins, spi, delay, &mut self.buf, self.geometry, l, c.s1_step, c.s1_block, c.s1_repeat, stage1_content, Stage::Inverse)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("image: stage 2 (flicker fill) starting");
        let mut line_result: Result<(), PinError<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER::Error>> = Ok(());
        run_timed_stage(&mut self.timer, l, c.s2_repeat, c.s2_t1_ms, c.s2_t2_ms, |job| {
            if line_result.is_err() {
                return;
            }
            line_result = one_line::<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER::Error, DELAY>(
                &mut self.pins, spi, delay, &mut self.buf, self.geometry, job.line, job.border, job.source, job.stage,
            );
        })
        .map_err(crate::error::Error::Timer)?;
        line_result?;

        #[cfg(feature = "defmt")]
        defmt::debug!("image: stage 3 (normal fill) starting");
        Self::run_stepped(&mut self.pins, spi, delay, &mut self.buf, self.geometry, l, c.s3_step, c.s3_block, c.s3_repeat, stage3_content, Stage::Normal)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("image: all three stages complete");
        Ok(())
    }

    /// Drives the §4.2 stepped scheduling pattern for one stage, shipping
    /// every emitted [`crate::stage::LineJob`] with [`one_line`]. Shared by
    /// stage 1 and stage 3.
    #[allow(clippy::too_many_arguments)]
    fn run_stepped<SPI, DELAY>(
        pins: &mut ControlPins<PANELON, BORDER, DISCHARGE, RESET, BUSY>,
        spi: &mut SPI,
        delay: &mut DELAY,
        buf: &mut [u8],
        geometry: &Geometry,
        lines_per_display: u16,
        step: u16,
        block: u16,
        repeat: u16,
        content: Content<'_>,
        stage: Stage,
    ) -> Result<(), PinError<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER::Error>>
    where
        SPI: SpiPort,
        DELAY: DelayNs,
    {
        let mut result: Result<(), PinError<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER::Error>> = Ok(());
        run_stepped_stage(lines_per_display, step, block, repeat, content, stage, |job| {
            if result.is_err() {
                return;
            }
            result = one_line::<SPI, PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER::Error, DELAY>(
                pins, spi, delay, buf, geometry, job.line, job.border, job.source, job.stage,
            );
        });
        result
    }
}

impl<PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER> Drop
    for Panel<PANELON, BORDER, DISCHARGE, RESET, BUSY, TIMER>
where
    PANELON: OutputPin,
    BORDER: OutputPin,
    DISCHARGE: OutputPin,
    RESET: OutputPin,
    BUSY: InputPin,
{
    /// Best-effort safety net for an unexpected drop, e.g. an early `?`
    /// return in caller code that skips `end` (§5: "implementations may add
    /// a best-effort `power_off` on abrupt teardown but must not make it a
    /// precondition for callers"). The full `power_off` sequence needs the
    /// SPI transport and a delay primitive, neither of which `Panel` owns —
    /// both stay borrowed per-call per §3 — so this only de-energises the
    /// three output pins the handle does own; pin errors are swallowed since
    /// `drop` can't propagate a `Result`. Never relied on for correctness:
    /// callers that care about a clean shutdown still call `end`.
    fn drop(&mut self) {
        let _ = self.pins.reset.set_low();
        let _ = self.pins.panel_on.set_low();
        let _ = self.pins.border.set_low();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeBusy, FakeDelay, FakePin};
    use crate::timer::Remaining;

    struct NullSpi {
        lines_sent: u32,
    }
    impl SpiPort for NullSpi {
        type Error = core::convert::Infallible;
        fn on(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
        fn off(&mut self) -> Result<(), Self::Error> {
            self.lines_sent += 1;
            Ok(())
        }
        fn send(&mut self, _data: &[u8]) -> Result<(), Self::Error> {
            Ok(())
        }
        fn read(&mut self, _prefix: &[u8], out: &mut [u8]) -> Result<(), Self::Error> {
            if out.len() >= 2 {
                // 0xc2: low nibble 0x2 (cog id ok), bit7 set (not broken), bit6 set (dc ok).
                out[1] = 0xc2;
            }
            Ok(())
        }
    }

    struct ExpiredTimer;
    impl DeadlineTimer for ExpiredTimer {
        type Error = core::convert::Infallible;
        fn arm_ms(&mut self, _millis: u32) -> Result<(), Self::Error> {
            Ok(())
        }
        fn remaining(&mut self) -> Result<Remaining, Self::Error> {
            Ok(Remaining::ZERO)
        }
    }

    fn new_panel() -> Panel<FakePin, FakePin, FakePin, FakePin, FakeBusy, ExpiredTimer> {
        Panel::create(
            PanelSize::Inch2_0,
            FakePin::default(),
            FakePin::default(),
            FakePin::default(),
            FakePin::default(),
            FakeBusy { level: false },
            ExpiredTimer,
        )
    }

    #[test]
    fn create_starts_with_ok_status_and_room_temperature_band() {
        let panel = new_panel();
        assert_eq!(panel.status(), Status::Ok);
    }

    #[test]
    fn set_temperature_does_not_touch_status() {
        let mut panel = new_panel();
        panel.set_temperature(-10);
        assert_eq!(panel.status(), Status::Ok);
        panel.set_temperature(50);
        assert_eq!(panel.status(), Status::Ok);
    }

    #[test]
    fn begin_then_end_round_trip_with_healthy_mock_transport() {
        let mut panel = new_panel();
        let mut spi = NullSpi { lines_sent: 0 };
        let mut delay = FakeDelay::default();

        let begin_status = panel.begin(&mut spi, &mut delay).unwrap();
        assert_eq!(begin_status, Status::Ok);
        assert_eq!(panel.status(), Status::Ok);

        panel.end(&mut spi, &mut delay).unwrap();
        assert_eq!(panel.status(), Status::Ok);
    }

    #[test]
    fn clear_runs_all_three_stages_without_error() {
        let mut panel = new_panel();
        let mut spi = NullSpi { lines_sent: 0 };
        let mut delay = FakeDelay::default();

        panel.begin(&mut spi, &mut delay).unwrap();
        assert_eq!(panel.status(), Status::Ok);
        panel.clear(&mut spi, &mut delay).unwrap();
        assert!(spi.lines_sent > 0, "clear should have shipped at least one line frame");
    }

    #[test]
    fn image_accepts_a_full_size_bitmap() {
        let mut panel = new_panel();
        let mut spi = NullSpi { lines_sent: 0 };
        let mut delay = FakeDelay::default();
        let bitmap = [0u8; 96 * 25];

        panel.begin(&mut spi, &mut delay).unwrap();
        panel.image(&mut spi, &mut delay, &bitmap).unwrap();
    }

    #[test]
    fn destroy_consumes_the_handle() {
        let panel = new_panel();
        panel.destroy();
    }

    #[test]
    fn stage2_runs_two_frames_per_round_before_the_scripted_timer_expires() {
        use crate::test_support::ScriptedTimer;

        // 2.0" Normal band has s2_repeat = 4; give each round one
        // not-yet-expired answer followed by one expired answer so every
        // round drives exactly two full-frame passes before moving on.
        let not_expired = Remaining { secs: 1, nanos: 1 };
        let answers = [
            not_expired, Remaining::ZERO,
            not_expired, Remaining::ZERO,
            not_expired, Remaining::ZERO,
            not_expired, Remaining::ZERO,
        ];
        let mut panel = Panel::create(
            PanelSize::Inch2_0,
            FakePin::default(),
            FakePin::default(),
            FakePin::default(),
            FakePin::default(),
            FakeBusy { level: false },
            ScriptedTimer::new(&answers),
        );
        let mut spi = NullSpi { lines_sent: 0 };
        let mut delay = FakeDelay::default();

        panel.begin(&mut spi, &mut delay).unwrap();
        let before = spi.lines_sent;
        panel.clear(&mut spi, &mut delay).unwrap();
        let stage2_and_stepped_lines = spi.lines_sent - before;
        assert!(
            stage2_and_stepped_lines > 0,
            "clear should still ship line frames when stage 2 runs multiple passes per round"
        );
    }
}
