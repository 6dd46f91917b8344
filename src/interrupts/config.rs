use x86_64::{structures::gdt::SegmentSelector, PrivilegeLevel};

use crate::interrupts::gate::{GateFlags, PrivilegePolicy};

/// Boot-time settings for the vector table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptConfig {
    /// Code segment every gate jumps through. The boot GDT puts the flat
    /// kernel code segment at index 1.
    pub code_selector: SegmentSelector,
    /// Attributes requested for the installed gates 0-47.
    pub gate_flags: GateFlags,
    /// Applied to `gate_flags` before they are stored.
    pub privilege: PrivilegePolicy,
}

impl InterruptConfig {
    pub const DEFAULT: Self = Self {
        code_selector: SegmentSelector::new(1, PrivilegeLevel::Ring0),
        gate_flags: GateFlags::KERNEL_INTERRUPT,
        privilege: PrivilegePolicy::ForceUser,
    };
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
