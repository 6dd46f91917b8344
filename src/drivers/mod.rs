pub mod ps2_keyboard;

/// Destination for characters produced in interrupt context.
pub trait CharSink {
    fn put_char(&self, c: u8);
}
