//! Glue between the assembly entry stubs and the dispatcher.
//!
//! The stubs (`isr0`..`isr31`, `irq0`..`irq15`) push the vector, a dummy
//! error code where the CPU pushes none, `pusha` and `ds`, then call
//! [`isr_handler`] or [`irq_handler`] with the frame as a by-value
//! [`Registers`]. `idt_flush` executes `lidt` on the descriptor address.
//!
//! Built for 32-bit x86 only: gates and IDTR hold 32-bit linear addresses.

use crate::{
    drivers::ps2_keyboard,
    interrupts::{
        config::InterruptConfig,
        cpu::{self, HardwarePorts, PortIo},
        dispatch::{dispatch_shared, exception_name, Dispatch, Registers},
        error::InterruptError,
        idt::{BootTable, Platform, TableDescriptor, INSTALLED_VECTORS},
        HANDLERS,
    },
    println,
};

macro_rules! entry_stubs {
    ($($stub:ident),* $(,)?) => {
        extern "C" {
            $(fn $stub();)*
        }

        static ENTRY_STUBS: [unsafe extern "C" fn(); INSTALLED_VECTORS as usize] = [$($stub),*];
    };
}

entry_stubs!(
    isr0, isr1, isr2, isr3, isr4, isr5, isr6, isr7, isr8, isr9, isr10, isr11, isr12, isr13, isr14,
    isr15, isr16, isr17, isr18, isr19, isr20, isr21, isr22, isr23, isr24, isr25, isr26, isr27,
    isr28, isr29, isr30, isr31, irq0, irq1, irq2, irq3, irq4, irq5, irq6, irq7, irq8, irq9, irq10,
    irq11, irq12, irq13, irq14, irq15,
);

extern "C" {
    fn idt_flush(descriptor: *const TableDescriptor);
}

/// The live IDT. IDTR points at it after `init`.
static IDT: BootTable = BootTable::new();

struct BareMetal {
    ports: HardwarePorts,
}

impl PortIo for BareMetal {
    fn write_u8(&self, port: u16, value: u8) {
        self.ports.write_u8(port, value);
    }

    fn read_u8(&self, port: u16) -> u8 {
        self.ports.read_u8(port)
    }
}

impl Platform for BareMetal {
    fn entry_stub(&self, vector: u8) -> Option<usize> {
        ENTRY_STUBS.get(usize::from(vector)).map(|&stub| stub as usize)
    }

    fn load_table(&self, descriptor: &TableDescriptor) {
        unsafe { idt_flush(descriptor) }
    }

    fn enable_interrupts(&self) {
        cpu::enable_interrupts();
    }
}

/// Build the IDT, program the PICs, attach the keyboard to IRQ1 and enable
/// interrupts.
///
/// Handlers registered before this call are discarded. After a successful
/// call every further one fails with `AlreadyInitialized`; a failed call
/// leaves the hardware untouched and may be retried.
pub fn init() -> Result<(), InterruptError> {
    let platform = BareMetal {
        ports: unsafe { HardwarePorts::new() },
    };
    let boot_handlers = [ps2_keyboard::binding()];

    IDT.initialize(&HANDLERS, &platform, &InterruptConfig::DEFAULT, &boot_handlers)?;
    Ok(())
}

#[no_mangle]
pub extern "C" fn isr_handler(regs: Registers) {
    handle(&regs);
}

#[no_mangle]
pub extern "C" fn irq_handler(regs: Registers) {
    handle(&regs);
}

fn handle(regs: &Registers) {
    let ports = unsafe { HardwarePorts::new() };

    match dispatch_shared(&HANDLERS, &ports, regs) {
        Dispatch::Handled | Dispatch::Absorbed => {}
        Dispatch::Unhandled { vector } => panic!(
            "EXCEPTION: {} (vector {}, error code: {:?})\n{:#x?}",
            exception_name(vector).unwrap_or("UNKNOWN"),
            vector,
            regs.error_code(),
            regs
        ),
        Dispatch::Spurious => println!("[irq] spurious interrupt number {:#x}", regs.int_no),
    }
}
