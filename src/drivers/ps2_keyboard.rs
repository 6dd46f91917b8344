//! IRQ1 demo driver: one scancode in, at most one character out.
//!
//! Only make codes of scancode set 1 that fall inside [`KEY_MAP`] produce
//! output. Break codes (bit 7 set), `0xE0` prefixes and modifiers are not
//! tracked.

use crate::{
    drivers::CharSink,
    interrupts::{cpu::PortIo, registry::Context, Registers},
};

pub const KEYBOARD_DATA_PORT: u16 = 0x60;

/// US layout, scancode set 1, indexed by make code. Keys without a
/// printable character map to 0.
pub const KEY_MAP: [u8; 0x3A] = [
    0, 0x1B, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 0x08, b'\t', // 0x00
    b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', b'\n', 0, b'a', b's', // 0x10
    b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`', 0, b'\\', b'z', b'x', b'c', b'v', // 0x20
    b'b', b'n', b'm', b',', b'.', b'/', 0, b'*', 0, b' ', // 0x30
];

pub fn translate(scancode: u8) -> Option<u8> {
    KEY_MAP.get(usize::from(scancode)).copied()
}

/// The keyboard's collaborators, reached through the handler context.
#[derive(Debug)]
pub struct Ps2Keyboard<P, S> {
    ports: P,
    sink: S,
}

impl<P: PortIo, S: CharSink> Ps2Keyboard<P, S> {
    pub const fn new(ports: P, sink: S) -> Self {
        Self { ports, sink }
    }

    /// Read the pending scancode and echo its character.
    pub fn handle_interrupt(&self) {
        let scancode = self.ports.read_u8(KEYBOARD_DATA_PORT);

        if let Some(c) = translate(scancode) {
            self.sink.put_char(c);
        }
    }
}

/// [`Handler`](crate::interrupts::registry::Handler) for IRQ1. `context`
/// must point at a `Ps2Keyboard<P, S>`.
pub fn keyboard_handler<P: PortIo, S: CharSink>(_regs: &Registers, context: Context) {
    // SAFETY: `binding` and every other registration pair this handler
    // with a context built from a `Ps2Keyboard<P, S>` of the same types.
    if let Some(keyboard) = unsafe { context.as_ref::<Ps2Keyboard<P, S>>() } {
        keyboard.handle_interrupt();
    }
}

#[cfg(all(target_arch = "x86", not(test)))]
mod hardware {
    use super::*;
    use crate::{
        interrupts::{
            cpu::HardwarePorts,
            registry::{HandlerEntry, IrqBinding},
            InterruptIndex,
        },
        serial::SerialSink,
    };

    static KEYBOARD: Ps2Keyboard<HardwarePorts, SerialSink> =
        Ps2Keyboard::new(unsafe { HardwarePorts::new() }, SerialSink);

    /// The boot registration for IRQ1.
    pub fn binding() -> IrqBinding {
        IrqBinding {
            line: InterruptIndex::Keyboard.line(),
            entry: HandlerEntry::new(
                keyboard_handler::<HardwarePorts, SerialSink>,
                Context::from_static(&KEYBOARD),
            ),
        }
    }
}

#[cfg(all(target_arch = "x86", not(test)))]
pub use hardware::binding;
