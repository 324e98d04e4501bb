#![allow(clippy::declare_interior_mutable_const)] // Usage is legit in this module.

//! Static memory that's shared with the SIE

use core::sync::atomic::{AtomicBool, Ordering};

use crate::{
    bd::{Bd, BdPair},
    endpoint::{EndpointConfig, Endpoints},
    vcell::VCell,
};

/// USB RAM: the buffer descriptor table, and the endpoint memory pool
///
/// Each USB driver needs a `UsbRam`. Allocate a `static` object and supply
/// it to your driver constructor. Make sure that the RAM is not shared
/// across drivers; otherwise, the driver constructor panics.
///
/// `COUNT` is the number of endpoints, and `SIZE` is the size of the
/// endpoint memory pool in bytes. The constructor checks that the
/// endpoints fit in the pool. Since a `static` is initialized at compile
/// time, an overcommitted pool is a build error:
///
/// ```compile_fail
/// use bdt_usbd::{Endpoints, UsbRam};
///
/// // 2 * 8 + 32 + 32 > 64
/// static USB_RAM: UsbRam<2, 64> = UsbRam::new(Endpoints::new(8).bidirectional(1, 32, 32));
/// ```
///
/// ```
/// use bdt_usbd::{Endpoints, UsbRam};
///
/// static USB_RAM: UsbRam<3, 40> = UsbRam::new(
///     Endpoints::new(8).bidirectional(1, 8, 8).out_only(2, 8)
/// );
/// ```
///
/// If your hardware has a fixed location for the descriptor table, place
/// the `static` there with your linker script.
#[repr(C)]
pub struct UsbRam<const COUNT: usize, const SIZE: usize> {
    bdt: [BdPair; COUNT],
    memory: [VCell<u8>; SIZE],
    endpoints: Endpoints<COUNT>,
    taken: AtomicBool,
}

// Safety: the descriptor table and pool are only shared with the hardware,
// and the `taken` flag guarantees a single driver.
unsafe impl<const COUNT: usize, const SIZE: usize> Sync for UsbRam<COUNT, SIZE> {}

impl<const COUNT: usize, const SIZE: usize> UsbRam<COUNT, SIZE> {
    /// Allocate USB RAM for `endpoints`
    ///
    /// # Panics
    ///
    /// Panics if the endpoints need more than `SIZE` bytes of memory. In a
    /// `const` context, this is a build error.
    pub const fn new(endpoints: Endpoints<COUNT>) -> Self {
        assert!(
            endpoints.required_memory() <= SIZE,
            "Endpoints need more memory than the USB RAM provides"
        );
        const BD: BdPair = BdPair::new();
        const BYTE: VCell<u8> = VCell::new(0);
        UsbRam {
            bdt: [BD; COUNT],
            memory: [BYTE; SIZE],
            endpoints,
            taken: AtomicBool::new(false),
        }
    }

    /// Acquire the RAM for a driver.
    ///
    /// Returns `None` if the RAM was already taken.
    pub(crate) fn take(&self) -> Option<Resources<'_>> {
        (!self.taken.swap(true, Ordering::SeqCst)).then(|| self.resources())
    }

    /// Access the RAM without taking it
    ///
    /// Used by the hardware model in tests.
    pub(crate) fn resources(&self) -> Resources<'_> {
        Resources {
            bdt: Bdt { pairs: &self.bdt },
            memory: &self.memory,
            endpoints: self.endpoints.as_slice(),
        }
    }
}

/// Borrowed views of the USB RAM
pub(crate) struct Resources<'a> {
    pub bdt: Bdt<'a>,
    pub memory: &'a [VCell<u8>],
    pub endpoints: &'a [EndpointConfig],
}

// Safety: the views come from a `UsbRam` that was taken once. Only the
// owner of the resources (and the SIE) touches that memory.
unsafe impl Send for Resources<'_> {}

/// The buffer descriptor table
#[derive(Clone, Copy)]
pub(crate) struct Bdt<'a> {
    pairs: &'a [BdPair],
}

impl<'a> Bdt<'a> {
    /// Returns the number of endpoints described by the table
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// The OUT (and SETUP) descriptor of `endpoint`
    ///
    /// # Panics
    ///
    /// Panics if the endpoint is out of range.
    pub fn out(&self, endpoint: usize) -> &'a Bd {
        &self.pairs[endpoint].out
    }

    /// The IN descriptor of `endpoint`
    ///
    /// # Panics
    ///
    /// Panics if the endpoint is out of range.
    pub fn r#in(&self, endpoint: usize) -> &'a Bd {
        &self.pairs[endpoint].r#in
    }
}
