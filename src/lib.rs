//! # protirq
//!
//! Interrupt-handling core for a 32-bit protected-mode kernel.
//!
//! - **IDT**: 256 packed 8-byte gates, loaded through the `idt_flush` stub
//! - **PIC**: chained 8259 controllers remapped to vectors 32-47
//! - **Registry**: `{handler, context}` slots for exceptions and IRQ lines
//! - **Dispatch**: EOI, lookup and invoke, called from the entry stubs
//! - **Keyboard**: IRQ1 scancode to character demo handler
//!
//! ## Usage
//!
//! ```ignore
//! protirq::kernel::init_kernel()?; // serial, IDT, PIC, handlers, sti
//! protirq::interrupts::register_interrupt_handler(0x80, syscall, Context::NONE);
//! ```

#![cfg_attr(not(test), no_std)]

pub mod drivers;
pub mod interrupts;
#[cfg(all(target_arch = "x86", not(test)))]
pub mod kernel;
pub mod serial;
