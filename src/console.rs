//! Console output and the `log` integration (ambient stack). A single
//! byte-at-a-time writer over the serial/video port the firmware wires
//! up, plus a `log::Log` implementation so the rest of the kernel can
//! use `log::info!`/`log::warn!`/`log::error!` instead of bespoke
//! `kprintf` call sites, the way the teacher's own `Cargo.toml` already
//! pulled in `log` for.

use core::fmt::{self, Write};

use crate::arch;

/// I/O port the firmware exposes for single-byte console output.
const CONSOLE_PORT: u32 = 0x3F8;

pub struct Console;

impl Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &b in s.as_bytes() {
            arch::outb(CONSOLE_PORT, b);
        }
        Ok(())
    }
}

/// Write formatted output straight to the console, bypassing the `log`
/// level machinery — used for the handful of places (panic handler,
/// very early boot) that must not depend on the logger being installed.
pub fn kprintf(args: fmt::Arguments) {
    let _ = Console.write_fmt(args);
}

#[macro_export]
macro_rules! kprintf {
    ($($arg:tt)*) => {
        $crate::console::kprintf(core::format_args!($($arg)*))
    };
}

pub struct KernelLogger;

pub static LOGGER: KernelLogger = KernelLogger;

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        kprintf(format_args!(
            "[{:<5} {}] {}\n",
            record.level(),
            record.target(),
            record.args()
        ));
    }

    fn flush(&self) {}
}

/// Install the kernel logger as the `log` crate's global logger. Must be
/// called once, early in boot, before any `log::info!` et al. fire.
pub fn init(level: log::LevelFilter) {
    log::set_max_level(level);
    // `set_logger` only fails if a logger was already installed; boot
    // calls this exactly once, so the only sane response is to ignore
    // a "already set" error rather than panic the kernel over logging.
    let _ = log::set_logger(&LOGGER);
}
