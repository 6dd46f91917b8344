//! # Interrupt Dispatch
//!
//! Every entry stub lands here with the snapshot it pushed.
//!
//! | Vector | Source            | Steps                                  |
//! |--------|-------------------|----------------------------------------|
//! | 0-31   | CPU exception     | lookup by vector, unhandled is fatal   |
//! | 32-39  | PIC 1 (IRQ 0-7)   | EOI master, lookup by line             |
//! | 40-47  | PIC 2 (IRQ 8-15)  | EOI slave + master, lookup by line     |
//! | 48-255 | software `int n`  | lookup by vector, unhandled is ignored |
//!
//! EOI goes out before the handler runs, so a handler can be re-entered by
//! its own line and must not assume exclusive access to shared state.

use core::mem::size_of;

use spin::RwLock;

use crate::interrupts::{cpu::PortIo, pic::PICS, registry::HandlerRegistry};

/// Processor state captured by the entry stub, in push order reversed.
///
/// The field order is shared with the stubs and must change on both sides
/// together.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    /// `esp` as saved by `pusha`, before the stub pushed anything else.
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub int_no: u32,
    pub err_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    /// Valid only when the interrupt crossed privilege levels.
    pub useresp: u32,
    pub ss: u32,
}

const _: () = assert!(size_of::<Registers>() == 16 * 4);

impl Registers {
    /// The vector the stub pushed, `None` if it does not fit a vector.
    pub fn vector(&self) -> Option<u8> {
        u8::try_from(self.int_no).ok()
    }

    /// The hardware error code, for the exceptions that push one.
    pub fn error_code(&self) -> Option<u32> {
        self.vector()
            .filter(|&v| pushes_error_code(v))
            .map(|_| self.err_code)
    }
}

/// Exceptions for which the processor pushes an error code.
pub const fn pushes_error_code(vector: u8) -> bool {
    matches!(vector, 8 | 10..=14 | 17 | 21 | 29 | 30)
}

const EXCEPTION_NAMES: [&str; 32] = [
    "DIVIDE ERROR",
    "DEBUG",
    "NON-MASKABLE INTERRUPT",
    "BREAKPOINT",
    "OVERFLOW",
    "BOUND RANGE EXCEEDED",
    "INVALID OPCODE",
    "DEVICE NOT AVAILABLE",
    "DOUBLE FAULT",
    "COPROCESSOR SEGMENT OVERRUN",
    "INVALID TSS",
    "SEGMENT NOT PRESENT",
    "STACK-SEGMENT FAULT",
    "GENERAL PROTECTION FAULT",
    "PAGE FAULT",
    "RESERVED",
    "X87 FLOATING-POINT",
    "ALIGNMENT CHECK",
    "MACHINE CHECK",
    "SIMD FLOATING-POINT",
    "VIRTUALIZATION",
    "CONTROL PROTECTION",
    "RESERVED",
    "RESERVED",
    "RESERVED",
    "RESERVED",
    "RESERVED",
    "RESERVED",
    "HYPERVISOR INJECTION",
    "VMM COMMUNICATION",
    "SECURITY",
    "RESERVED",
];

pub const EXCEPTION_COUNT: u8 = 32;

pub fn exception_name(vector: u8) -> Option<&'static str> {
    EXCEPTION_NAMES.get(usize::from(vector)).copied()
}

/// What happened to one interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A registered handler ran.
    Handled,
    /// Nobody is registered and that is acceptable for this vector.
    Absorbed,
    /// A CPU exception with no handler. The caller must not resume.
    Unhandled { vector: u8 },
    /// `int_no` was not a vector at all.
    Spurious,
}

/// Acknowledge, look up and run the handler for `regs.int_no`.
pub fn dispatch<P: PortIo>(registry: &HandlerRegistry, ports: &P, regs: &Registers) -> Dispatch {
    let Some(vector) = regs.vector() else {
        return Dispatch::Spurious;
    };

    let entry = match PICS.line_for(vector) {
        Some(line) => {
            PICS.notify_end_of_interrupt(ports, vector);
            registry.irq_handler(line)
        }
        None => registry.exception_handler(vector),
    };

    match entry {
        Some(entry) => {
            entry.invoke(regs);
            Dispatch::Handled
        }
        None if vector < EXCEPTION_COUNT => Dispatch::Unhandled { vector },
        None => Dispatch::Absorbed,
    }
}

/// [`dispatch`] without waiting on the registry lock.
///
/// A writer can be preempted by an NMI or a fault raised while it holds the
/// lock. The interrupt is then dispatched as if nothing were registered:
/// exceptions stay fatal and IRQs are still acknowledged.
pub fn dispatch_shared<P: PortIo>(
    registry: &RwLock<HandlerRegistry>,
    ports: &P,
    regs: &Registers,
) -> Dispatch {
    static NOTHING_REGISTERED: HandlerRegistry = HandlerRegistry::new();

    match registry.try_read() {
        Some(handlers) => dispatch(&handlers, ports, regs),
        None => dispatch(&NOTHING_REGISTERED, ports, regs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupts::{
        registry::Context,
        testing::{counting_handler, registers_for, CallLog, RecordingPorts},
    };

    #[test]
    fn empty_registry_invokes_nothing() {
        let registry = HandlerRegistry::new();
        let ports = RecordingPorts::new();

        for vector in 0..=255u8 {
            let outcome = dispatch(&registry, &ports, &registers_for(vector));
            let expected = if vector < 32 {
                Dispatch::Unhandled { vector }
            } else {
                Dispatch::Absorbed
            };
            assert_eq!(outcome, expected, "vector {}", vector);
        }

        assert!(registry.is_empty());
    }

    #[test]
    fn exception_handler_runs_once_for_its_vector() {
        let log = CallLog::leak();
        let mut registry = HandlerRegistry::new();
        registry.register_interrupt_handler(14, counting_handler, log.context());
        let ports = RecordingPorts::new();

        let regs = Registers {
            err_code: 0b110,
            ..registers_for(14)
        };
        assert_eq!(dispatch(&registry, &ports, &regs), Dispatch::Handled);
        assert_eq!(log.calls(), [regs]);

        for vector in (0..=255u8).filter(|&v| v != 14) {
            dispatch(&registry, &ports, &registers_for(vector));
        }
        assert_eq!(log.calls().len(), 1);
        assert!(ports.writes().iter().all(|&(port, _)| port == 0x20 || port == 0xA0));
    }

    #[test]
    fn software_vector_dispatches_without_eoi() {
        let log = CallLog::leak();
        let mut registry = HandlerRegistry::new();
        registry.register_interrupt_handler(0x80, counting_handler, log.context());
        let ports = RecordingPorts::new();

        assert_eq!(dispatch(&registry, &ports, &registers_for(0x80)), Dispatch::Handled);
        assert_eq!(log.calls().len(), 1);
        assert!(ports.writes().is_empty());
    }

    #[test]
    fn irq_dispatch_indexes_by_line_and_sends_eoi() {
        for line in 0..16u8 {
            let log = CallLog::leak();
            let mut registry = HandlerRegistry::new();
            registry.register_irq_handler(line, counting_handler, log.context()).unwrap();
            let ports = RecordingPorts::new();
            let vector = 32 + line;

            assert_eq!(dispatch(&registry, &ports, &registers_for(vector)), Dispatch::Handled);
            assert_eq!(log.calls(), [registers_for(vector)]);

            let expected: &[(u16, u8)] = if line >= 8 {
                &[(0xA0, 0x20), (0x20, 0x20)]
            } else {
                &[(0x20, 0x20)]
            };
            assert_eq!(ports.writes(), expected, "line {}", line);
        }
    }

    #[test]
    fn irq_handler_is_not_reached_through_its_line_number_as_vector() {
        let log = CallLog::leak();
        let mut registry = HandlerRegistry::new();
        registry.register_irq_handler(1, counting_handler, log.context()).unwrap();
        let ports = RecordingPorts::new();

        assert_eq!(
            dispatch(&registry, &ports, &registers_for(1)),
            Dispatch::Unhandled { vector: 1 }
        );
        assert!(log.calls().is_empty());
    }

    #[test]
    fn unregistered_keyboard_line_still_acknowledged() {
        let registry = HandlerRegistry::new();
        let ports = RecordingPorts::new();

        assert_eq!(dispatch(&registry, &ports, &registers_for(33)), Dispatch::Absorbed);
        assert_eq!(ports.writes(), [(0x20, 0x20)]);
    }

    #[test]
    fn eoi_precedes_handler() {
        fn checks_eoi(_: &Registers, context: Context) {
            let ports = unsafe { context.as_ref::<RecordingPorts>() }.unwrap();
            assert_eq!(ports.writes(), [(0xA0, 0x20), (0x20, 0x20)]);
            ports.write_u8(0xFF, 0xFF);
        }

        let ports: &'static RecordingPorts = Box::leak(Box::default());
        let mut registry = HandlerRegistry::new();
        registry.register_irq_handler(14, checks_eoi, Context::from_static(ports)).unwrap();

        assert_eq!(dispatch(&registry, ports, &registers_for(46)), Dispatch::Handled);
        assert_eq!(ports.writes().last(), Some(&(0xFF, 0xFF)));
    }

    #[test]
    fn out_of_range_int_no_is_spurious() {
        let registry = HandlerRegistry::new();
        let ports = RecordingPorts::new();
        let regs = Registers {
            int_no: 0x1_00,
            ..Registers::default()
        };

        assert_eq!(dispatch(&registry, &ports, &regs), Dispatch::Spurious);
        assert!(ports.writes().is_empty());
    }

    #[test]
    fn error_code_only_for_faults_that_push_one() {
        let fault = Registers {
            err_code: 0x18,
            ..registers_for(13)
        };
        let breakpoint = Registers {
            err_code: 0x18,
            ..registers_for(3)
        };

        assert_eq!(fault.error_code(), Some(0x18));
        assert_eq!(breakpoint.error_code(), None);
        assert_eq!(exception_name(13), Some("GENERAL PROTECTION FAULT"));
        assert_eq!(exception_name(32), None);
    }

    #[test]
    fn busy_registry_does_not_block_dispatch() {
        let log = CallLog::leak();
        let registry = RwLock::new(HandlerRegistry::new());
        registry.write().register_interrupt_handler(14, counting_handler, log.context());
        registry.write().register_irq_handler(1, counting_handler, log.context()).unwrap();
        let ports = RecordingPorts::new();

        let writer = registry.write();
        assert_eq!(
            dispatch_shared(&registry, &ports, &registers_for(14)),
            Dispatch::Unhandled { vector: 14 }
        );
        assert_eq!(dispatch_shared(&registry, &ports, &registers_for(33)), Dispatch::Absorbed);
        assert_eq!(dispatch_shared(&registry, &ports, &registers_for(0x80)), Dispatch::Absorbed);
        assert_eq!(ports.writes(), [(0x20, 0x20)]);
        assert!(log.calls().is_empty());
        drop(writer);

        assert_eq!(dispatch_shared(&registry, &ports, &registers_for(14)), Dispatch::Handled);
        assert_eq!(dispatch_shared(&registry, &ports, &registers_for(33)), Dispatch::Handled);
        assert_eq!(log.calls().len(), 2);
    }
}
