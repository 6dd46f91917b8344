//! Processor primitives: byte-wide port I/O and the interrupt flag.
//!
//! x86_64 builds go through the `x86_64` crate; 32-bit protected-mode
//! builds issue the same instructions with inline assembly.

#[cfg(target_arch = "x86")]
use core::arch::asm;

#[cfg(target_arch = "x86_64")]
use x86_64::instructions::port::Port;

/// Single-byte port access. Writes and reads are assumed infallible.
///
/// Methods take `&self`: an `in`/`out` is one instruction, so a handler
/// interrupted mid-call by a re-trigger of its own line observes no torn
/// state.
pub trait PortIo {
    fn write_u8(&self, port: u16, value: u8);
    fn read_u8(&self, port: u16) -> u8;
}

/// The processor's real I/O address space.
#[derive(Debug)]
pub struct HardwarePorts {
    _private: (),
}

impl HardwarePorts {
    /// # Safety
    ///
    /// Writing arbitrary ports can reprogram any device on the bus. The
    /// caller must own the ports it touches through this value.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(target_arch = "x86_64")]
impl PortIo for HardwarePorts {
    fn write_u8(&self, port: u16, value: u8) {
        let mut port = Port::<u8>::new(port);
        unsafe { port.write(value) }
    }

    fn read_u8(&self, port: u16) -> u8 {
        let mut port = Port::<u8>::new(port);
        unsafe { port.read() }
    }
}

#[cfg(target_arch = "x86")]
impl PortIo for HardwarePorts {
    fn write_u8(&self, port: u16, value: u8) {
        unsafe {
            asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
        }
    }

    fn read_u8(&self, port: u16) -> u8 {
        let value: u8;
        unsafe {
            asm!("in al, dx", out("al") value, in("dx") port, options(nomem, nostack, preserves_flags));
        }
        value
    }
}

/// Set IF. The last step of boot, after the table is loaded.
#[cfg(all(target_arch = "x86_64", not(test)))]
pub fn enable_interrupts() {
    x86_64::instructions::interrupts::enable();
}

#[cfg(all(target_arch = "x86", not(test)))]
pub fn enable_interrupts() {
    unsafe { asm!("sti", options(nomem, nostack)) }
}

/// Run `f` with IF cleared, restoring the previous state afterwards.
#[cfg(all(target_arch = "x86_64", not(test)))]
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    x86_64::instructions::interrupts::without_interrupts(f)
}

#[cfg(all(target_arch = "x86", not(test)))]
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    const IF: u32 = 1 << 9;

    let eflags: u32;
    unsafe { asm!("pushfd", "pop {}", "cli", out(reg) eflags, options(nomem)) }

    let ret = f();

    if eflags & IF != 0 {
        enable_interrupts();
    }
    ret
}

// User-mode test processes cannot touch IF.
#[cfg(test)]
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    f()
}
