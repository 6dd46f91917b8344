//! # Handler Registry
//!
//! Two fixed tables of `{handler, context}` pairs:
//!
//! | Table      | Slots | Index                      |
//! |------------|-------|----------------------------|
//! | exceptions | 256   | raw vector (0-31, 48-255)  |
//! | irqs       | 16    | controller line (0-15)     |
//!
//! Entries are never removed. The registry borrows nothing: a [`Context`]
//! is an untyped pointer whose target the registering code keeps alive.

use core::{fmt, ptr};

use crate::interrupts::{dispatch::Registers, error::InterruptError, pic::IRQ_COUNT};

pub const IDT_ENTRIES: usize = 256;

/// A kernel interrupt handler. Runs after EOI, so it may be re-entered by
/// its own line.
pub type Handler = fn(&Registers, Context);

/// Opaque, non-owning pointer handed back to a handler on every call.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Context(*const ());

// SAFETY: `Context` never dereferences itself. `from_static` only accepts
// `Sync` targets, and `from_ptr` moves that obligation to its caller.
unsafe impl Send for Context {}
unsafe impl Sync for Context {}

impl Context {
    pub const NONE: Self = Self(ptr::null());

    pub fn from_static<T: Sync>(value: &'static T) -> Self {
        Self(value as *const T as *const ())
    }

    /// # Safety
    ///
    /// `value` must stay valid, and safe to share with interrupt context,
    /// for as long as the registration that carries it is live.
    pub const unsafe fn from_ptr<T>(value: *const T) -> Self {
        Self(value as *const ())
    }

    pub fn is_none(self) -> bool {
        self.0.is_null()
    }

    pub fn as_ptr(self) -> *const () {
        self.0
    }

    /// # Safety
    ///
    /// The context must have been created from a `T`.
    pub unsafe fn as_ref<'a, T>(self) -> Option<&'a T> {
        (self.0 as *const T).as_ref()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({:p})", self.0)
    }
}

#[derive(Clone, Copy)]
pub struct HandlerEntry {
    pub handler: Handler,
    pub context: Context,
}

impl HandlerEntry {
    pub const fn new(handler: Handler, context: Context) -> Self {
        Self { handler, context }
    }

    #[inline]
    pub fn invoke(&self, regs: &Registers) {
        (self.handler)(regs, self.context)
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("handler", &(self.handler as *const ()))
            .field("context", &self.context)
            .finish()
    }
}

/// A hardware-line handler installed at boot.
#[derive(Debug, Clone, Copy)]
pub struct IrqBinding {
    pub line: u8,
    pub entry: HandlerEntry,
}

pub struct HandlerRegistry {
    exceptions: [Option<HandlerEntry>; IDT_ENTRIES],
    irqs: [Option<HandlerEntry>; IRQ_COUNT],
}

impl HandlerRegistry {
    pub const fn new() -> Self {
        Self {
            exceptions: [None; IDT_ENTRIES],
            irqs: [None; IRQ_COUNT],
        }
    }

    /// Empty both tables. Boot only.
    pub fn clear(&mut self) {
        self.exceptions = [None; IDT_ENTRIES];
        self.irqs = [None; IRQ_COUNT];
    }

    /// Install `handler` for `vector`, replacing any earlier one.
    pub fn register_interrupt_handler(&mut self, vector: u8, handler: Handler, context: Context) {
        self.exceptions[usize::from(vector)] = Some(HandlerEntry::new(handler, context));
    }

    /// Install `handler` for controller line `line`, replacing any earlier one.
    pub fn register_irq_handler(
        &mut self,
        line: u8,
        handler: Handler,
        context: Context,
    ) -> Result<(), InterruptError> {
        let slot = self
            .irqs
            .get_mut(usize::from(line))
            .ok_or(InterruptError::InvalidIrqLine(line))?;
        *slot = Some(HandlerEntry::new(handler, context));
        Ok(())
    }

    pub fn bind(&mut self, binding: &IrqBinding) -> Result<(), InterruptError> {
        self.register_irq_handler(binding.line, binding.entry.handler, binding.entry.context)
    }

    pub fn exception_handler(&self, vector: u8) -> Option<HandlerEntry> {
        self.exceptions[usize::from(vector)]
    }

    pub fn irq_handler(&self, line: u8) -> Option<HandlerEntry> {
        self.irqs.get(usize::from(line)).copied().flatten()
    }

    /// Number of occupied slots across both tables.
    pub fn len(&self) -> usize {
        let exceptions = self.exceptions.iter().filter(|e| e.is_some()).count();
        let irqs = self.irqs.iter().filter(|e| e.is_some()).count();
        exceptions + irqs
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exceptions = self.exceptions.iter().enumerate().filter_map(|(v, e)| e.map(|e| (v, e)));
        let irqs = self.irqs.iter().enumerate().filter_map(|(l, e)| e.map(|e| (l, e)));

        f.debug_struct("HandlerRegistry")
            .field("exceptions", &DebugMap(exceptions))
            .field("irqs", &DebugMap(irqs))
            .finish()
    }
}

struct DebugMap<I>(I);

impl<I> fmt::Debug for DebugMap<I>
where
    I: Iterator<Item = (usize, HandlerEntry)> + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.clone()).finish()
    }
}
