use core::fmt;

use crate::interrupts::pic::IRQ_COUNT;

/// Configuration mistakes caught while the interrupt system is being set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptError {
    /// A hardware line outside `0..16`.
    InvalidIrqLine(u8),
    /// The platform has no entry stub for a vector that must be installed.
    MissingEntryStub(u8),
    /// A table or stub address that a 32-bit gate or IDTR cannot hold.
    AddressOutOfRange(usize),
    /// `init` ran a second time.
    AlreadyInitialized,
}

impl fmt::Display for InterruptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterruptError::InvalidIrqLine(line) => {
                write!(f, "IRQ line {} out of range (0-{})", line, IRQ_COUNT - 1)
            }
            InterruptError::MissingEntryStub(vector) => {
                write!(f, "no entry stub for vector {}", vector)
            }
            InterruptError::AddressOutOfRange(address) => {
                write!(f, "address {:#x} does not fit in 32 bits", address)
            }
            InterruptError::AlreadyInitialized => write!(f, "interrupt system already initialized"),
        }
    }
}
