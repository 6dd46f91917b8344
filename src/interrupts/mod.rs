//! # Interrupt Handling Module
//!
//! Provides the interrupt infrastructure for the kernel:
//!
//! - **IDT**: 32-bit gate encoding and the 256-entry vector table
//! - **PIC**: 8259 remapping and EOI
//! - **Registry**: handler tables for exceptions and IRQ lines
//! - **Dispatch**: the path from the entry stubs to registered handlers
//!
//! ## Interrupt Vector Layout
//!
//! | Vector | Type                   | Handler                     |
//! |--------|------------------------|-----------------------------|
//! | 0-31   | CPU Exceptions         | registered, else fatal      |
//! | 32     | Timer (IRQ0)           | registered, else ignored    |
//! | 33     | Keyboard (IRQ1)        | `ps2_keyboard` at boot      |
//! | 34-47  | IRQ2-IRQ15             | registered, else ignored    |
//! | 48-255 | Software               | not present in the IDT      |
//!
//! ## Usage
//!
//! ```ignore
//! use protirq::interrupts;
//! interrupts::init()?; // IDT, PIC, keyboard, then sti
//! interrupts::register_irq_handler(0, tick, Context::NONE)?;
//! ```
//!
//! Register handlers after `init`: `init` starts from an empty registry and
//! discards anything registered before it. Registration runs with interrupts
//! masked so the dispatcher never observes a half-written slot.
//!
//! The bare-metal half (`init`, the entry points called by the assembly
//! stubs) is built for 32-bit x86 only.

use spin::RwLock;

use crate::interrupts::registry::{Context, Handler, HandlerRegistry};

pub mod config;
pub mod cpu;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod idt;
pub mod pic;
pub mod registry;
#[cfg(all(target_arch = "x86", not(test)))]
mod stubs;
#[cfg(test)]
pub(crate) mod testing;

pub use config::InterruptConfig;
pub use dispatch::{Dispatch, Registers};
pub use error::InterruptError;
pub use pic::InterruptIndex;

#[cfg(all(target_arch = "x86", not(test)))]
pub use stubs::init;

static HANDLERS: RwLock<HandlerRegistry> = RwLock::new(HandlerRegistry::new());

/// Route `vector` to `handler`, replacing any earlier registration.
///
/// Takes effect only when called after `init`, which clears the registry.
///
/// Must not be called from inside a handler: dispatch holds the registry's
/// read lock while the handler runs.
pub fn register_interrupt_handler(vector: u8, handler: Handler, context: Context) {
    cpu::without_interrupts(|| {
        HANDLERS.write().register_interrupt_handler(vector, handler, context);
    });
}

/// Route controller line `line` (0-15) to `handler`. Like
/// [`register_interrupt_handler`], only registrations made after `init` survive.
pub fn register_irq_handler(line: u8, handler: Handler, context: Context) -> Result<(), InterruptError> {
    cpu::without_interrupts(|| HANDLERS.write().register_irq_handler(line, handler, context))
}
