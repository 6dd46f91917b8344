//! COM1 serial console used for kernel logging and keyboard echo.

use spin::Mutex;
use uart_16550::SerialPort;

use crate::{drivers::CharSink, interrupts::cpu};

pub static SERIAL: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(0x3F8) });

#[cfg(not(test))]
#[macro_export]
macro_rules! println {
    ($($arg:tt)*) => {{
        $crate::serial::with_serial(|serial| {
            use core::fmt::Write;
            let _ = writeln!(serial, $($arg)*);
        });
    }};
}

#[cfg(test)]
#[macro_export]
macro_rules! println {
    ($($arg:tt)*) => {{
        std::println!($($arg)*);
    }};
}

/// Configure the UART. Must run before the first `println!`.
pub fn init() {
    SERIAL.lock().init();
}

/// Run `f` on the locked port with interrupts masked, so a handler that
/// logs cannot spin on a lock held by the code it interrupted.
pub fn with_serial<F: FnOnce(&mut SerialPort)>(f: F) {
    cpu::without_interrupts(|| f(&mut SERIAL.lock()));
}

/// Terminal output for the keyboard handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialSink;

impl CharSink for SerialSink {
    fn put_char(&self, c: u8) {
        with_serial(|serial| serial.send(c));
    }
}
