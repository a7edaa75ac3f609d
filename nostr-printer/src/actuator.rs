//! Receipt printer and indicator light.

use crate::payment::Receipt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lines fed after each receipt so it can be torn off.
pub const RECEIPT_FEED: u8 = 2;
pub const DEFAULT_BLINK: Duration = Duration::from_millis(250);

pub trait Printer {
    fn wake(&mut self) -> io::Result<()>;
    fn println(&mut self, line: &str) -> io::Result<()>;
    fn feed(&mut self, lines: u8) -> io::Result<()>;
    fn sleep(&mut self) -> io::Result<()>;
}

pub trait Indicator {
    fn set(&mut self, on: bool) -> io::Result<()>;
}

impl<T: Printer + ?Sized> Printer for Box<T> {
    fn wake(&mut self) -> io::Result<()> {
        (**self).wake()
    }

    fn println(&mut self, line: &str) -> io::Result<()> {
        (**self).println(line)
    }

    fn feed(&mut self, lines: u8) -> io::Result<()> {
        (**self).feed(lines)
    }

    fn sleep(&mut self) -> io::Result<()> {
        (**self).sleep()
    }
}

impl<T: Indicator + ?Sized> Indicator for Box<T> {
    fn set(&mut self, on: bool) -> io::Result<()> {
        (**self).set(on)
    }
}

/// Printer writing plain text lines to any writer (a device node, a file, stdout).
pub struct LinePrinter<W: Write> {
    out: W,
}

impl<W: Write> LinePrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl LinePrinter<std::fs::File> {
    pub fn open<P: AsRef<Path>>(device: P) -> io::Result<Self> {
        let file = OpenOptions::new().append(true).open(device)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> Printer for LinePrinter<W> {
    fn wake(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn println(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{line}")
    }

    fn feed(&mut self, lines: u8) -> io::Result<()> {
        for _ in 0..lines {
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn sleep(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// LED exposed through a sysfs `brightness` file.
pub struct SysfsLed {
    path: PathBuf,
}

impl SysfsLed {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Indicator for SysfsLed {
    fn set(&mut self, on: bool) -> io::Result<()> {
        std::fs::write(&self.path, if on { "1" } else { "0" })
    }
}

/// Indicator that only shows up in the logs.
#[derive(Debug, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn set(&mut self, on: bool) -> io::Result<()> {
        tracing::trace!(on, "indicator");
        Ok(())
    }
}

/// Printer keeping everything it was asked to do.
#[derive(Debug, Default)]
pub struct MemoryPrinter {
    pub ops: Vec<String>,
}

impl MemoryPrinter {
    pub fn lines(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| op.strip_prefix("println:"))
            .collect()
    }
}

impl Printer for MemoryPrinter {
    fn wake(&mut self) -> io::Result<()> {
        self.ops.push("wake".to_string());
        Ok(())
    }

    fn println(&mut self, line: &str) -> io::Result<()> {
        self.ops.push(format!("println:{line}"));
        Ok(())
    }

    fn feed(&mut self, lines: u8) -> io::Result<()> {
        self.ops.push(format!("feed:{lines}"));
        Ok(())
    }

    fn sleep(&mut self) -> io::Result<()> {
        self.ops.push("sleep".to_string());
        Ok(())
    }
}

/// Indicator counting how often it was switched on.
#[derive(Debug, Default)]
pub struct MemoryIndicator {
    pub on: bool,
    pub blinks: u32,
}

impl Indicator for MemoryIndicator {
    fn set(&mut self, on: bool) -> io::Result<()> {
        if on && !self.on {
            self.blinks += 1;
        }
        self.on = on;
        Ok(())
    }
}

pub struct Actuator<P, I> {
    printer: P,
    indicator: I,
    pause: Duration,
}

impl<P: Printer, I: Indicator> Actuator<P, I> {
    pub fn new(printer: P, indicator: I) -> Self {
        Self {
            printer,
            indicator,
            pause: DEFAULT_BLINK,
        }
    }

    /// Time the indicator stays on, and then off, per blink.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn printer(&self) -> &P {
        &self.printer
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    pub fn print_receipt(&mut self, receipt: &Receipt) -> io::Result<()> {
        self.printer.wake()?;
        self.printer.println(&receipt.line())?;
        self.printer.feed(RECEIPT_FEED)?;
        self.printer.sleep()
    }

    pub async fn blink(&mut self, times: u32) -> io::Result<()> {
        for _ in 0..times {
            self.indicator.set(true)?;
            tokio::time::sleep(self.pause).await;
            self.indicator.set(false)?;
            tokio::time::sleep(self.pause).await;
        }
        Ok(())
    }

    /// Prints the receipt, then blinks once per order of magnitude of the amount.
    pub async fn actuate(&mut self, receipt: &Receipt) -> io::Result<()> {
        self.print_receipt(receipt)?;
        self.blink(receipt.blinks()).await
    }
}
