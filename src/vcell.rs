//! Volatile cell that conforms to the RAL's register API
//!
//! Every byte that the serial interface engine (SIE) can observe lives in a
//! `VCell`: the SIE registers, the buffer descriptors, and the endpoint
//! memory pool. Loads and stores are never elided or merged, so the order
//! of writes in the source is the order the hardware sees.

use core::cell::UnsafeCell;

#[repr(transparent)]
pub struct VCell<T>(UnsafeCell<T>);

impl<T> VCell<T> {
    pub const fn new(val: T) -> Self {
        VCell(UnsafeCell::new(val))
    }
}

impl<T: Copy> VCell<T> {
    pub fn read(&self) -> T {
        unsafe { self.0.get().read_volatile() }
    }
    pub fn write(&self, val: T) {
        unsafe { self.0.get().write_volatile(val) }
    }
}

#[cfg(test)]
mod test {
    use super::VCell;

    #[test]
    fn read_write() {
        let cell = VCell::new(0u8);
        assert_eq!(cell.read(), 0);
        cell.write(0xA5);
        assert_eq!(cell.read(), 0xA5);
    }
}
