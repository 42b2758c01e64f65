#![deny(warnings)]

// activate spi, gpio in raspi-config
// needs to be run with sudo because of some sysfs_gpio permission problems and follow-up timing problems
// see https://github.com/rust-embedded/rust-sysfs-gpio/issues/5 and follow-up issues

use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use epd_pdi_cog2::{
    geometry::PanelSize,
    timer::{DeadlineTimer, Remaining},
    Panel, SpiPort,
};
use linux_embedded_hal::{
    spidev::{self, SpidevOptions},
    sysfs_gpio::Direction,
    Delay, Pin, Spidev,
};

/// Wraps the raw `Spidev` handle and the chip-select pin into this crate's
/// bus-lifetime-per-call [`SpiPort`] contract: `on`/`off` assert and
/// deassert chip-select, `send`/`read` shift bytes while it's held low.
struct LinuxSpiPort {
    spi: Spidev,
    cs: Pin,
}

impl SpiPort for LinuxSpiPort {
    type Error = std::io::Error;

    fn on(&mut self) -> Result<(), Self::Error> {
        self.cs.set_value(0)
    }

    fn off(&mut self) -> Result<(), Self::Error> {
        self.cs.set_value(1)
    }

    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        use std::io::Write;
        self.spi.write_all(data)
    }

    fn read(&mut self, prefix: &[u8], out: &mut [u8]) -> Result<(), Self::Error> {
        use linux_embedded_hal::spidev::SpidevTransfer;
        let mut transfer = SpidevTransfer::read_write(prefix, out);
        self.spi.transfer(&mut transfer)
    }
}

/// A [`DeadlineTimer`] backed by a monotonic clock read against a stored
/// deadline, per the substitution §9 Design Notes explicitly sanctions for
/// platforms without cheap `timer_gettime`.
struct MonotonicTimer {
    deadline: Instant,
}

impl DeadlineTimer for MonotonicTimer {
    type Error = std::convert::Infallible;

    fn arm_ms(&mut self, millis: u32) -> Result<(), Self::Error> {
        self.deadline = Instant::now() + Duration::from_millis(millis as u64);
        Ok(())
    }

    fn remaining(&mut self) -> Result<Remaining, Self::Error> {
        let now = Instant::now();
        if now >= self.deadline {
            return Ok(Remaining::ZERO);
        }
        let left = self.deadline - now;
        Ok(Remaining { secs: left.as_secs() as u32, nanos: left.subsec_nanos() })
    }
}

fn main() -> Result<(), std::io::Error> {
    // Configure SPI
    let mut spi = Spidev::open("/dev/spidev0.0")?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(4_000_000)
        .mode(spidev::SpiModeFlags::SPI_MODE_0)
        .build();
    spi.configure(&options).expect("spi configuration");

    // Configure Digital I/O Pin to be used as Chip Select
    let cs = Pin::new(26); // BCM7 CE0
    cs.export().expect("cs export");
    while !cs.is_exported() {}
    cs.set_direction(Direction::Out).expect("cs Direction");
    cs.set_value(1).expect("cs Value set to 1");

    // Configure the panel-on, border, discharge and reset outputs
    let panel_on = Pin::new(22);
    panel_on.export().expect("panel_on export");
    while !panel_on.is_exported() {}
    panel_on.set_direction(Direction::Out).expect("panel_on Direction");

    let border = Pin::new(23);
    border.export().expect("border export");
    while !border.is_exported() {}
    border.set_direction(Direction::Out).expect("border Direction");

    let discharge = Pin::new(24);
    discharge.export().expect("discharge export");
    while !discharge.is_exported() {}
    discharge.set_direction(Direction::Out).expect("discharge Direction");

    let reset = Pin::new(16); // pin 36 // bcm16
    reset.export().expect("reset export");
    while !reset.is_exported() {}
    reset.set_direction(Direction::Out).expect("reset Direction");

    // Configure Busy Input Pin
    let busy = Pin::new(5); // pin 29
    busy.export().expect("busy export");
    while !busy.is_exported() {}
    busy.set_direction(Direction::In).expect("busy Direction");

    let mut delay = Delay {};
    let mut port = LinuxSpiPort { spi, cs };
    let timer = MonotonicTimer { deadline: Instant::now() };

    // Setup of the needed pins is finished here; the "real" usage of
    // epd-pdi-cog2 begins.
    let mut panel = Panel::create(PanelSize::Inch2_0, panel_on, border, discharge, reset, busy, timer);
    panel.set_temperature(22);

    panel.begin(&mut port, &mut delay).expect("begin");
    panel.clear(&mut port, &mut delay).expect("clear");

    let bitmap = [0xffu8; 2400]; // 200 dots/line * 96 lines / 8
    panel.image(&mut port, &mut delay, &bitmap).expect("image");

    panel.end(&mut port, &mut delay).expect("end");
    delay.delay_ms(5000u32);

    println!("status: {:?}", panel.status());
    Ok(())
}
