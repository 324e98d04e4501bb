//! Interrupt-safe driver sharing

use crate::{driver::TogglePolicy, handler::TokenHandler, DeviceState, Driver};
use core::cell::RefCell;
use cortex_m::interrupt::{self, Mutex};
use usb_device::{endpoint::EndpointAddress, UsbError};

/// A driver that's shared between your interrupt handler and your application
///
/// Every call runs in a critical section, so the interrupt handler never
/// observes the driver in the middle of an application call.
///
/// # Example
///
/// ```no_run
/// use bdt_usbd::{BusAdapter, Config, Driver, Endpoints, Ep0Response, TokenHandler, UsbRam};
/// # struct Sie; unsafe impl bdt_usbd::Peripherals for Sie { fn sie(&self) -> *const () { 0x4000_0000 as _ } }
/// # struct Chapter9; impl TokenHandler for Chapter9 { fn setup(&mut self, _: &mut Driver) -> Ep0Response { Ep0Response::Stall } }
///
/// static USB_RAM: UsbRam<2, 80> = UsbRam::new(Endpoints::new(8).bidirectional(1, 32, 32));
///
/// let mut driver = Driver::new(Sie, &USB_RAM, Config::new());
/// driver.init();
/// let bus = BusAdapter::new(driver);
///
/// // In your USB interrupt handler:
/// bus.isr(&mut Chapter9);
///
/// // In your main loop:
/// bus.task();
/// let mut buffer = [0; 32];
/// if let Ok(len) = bus.get_packet(1, &mut buffer) {
///     // Echo the data back to the host...
/// #   let _ = len;
/// }
/// ```
pub struct BusAdapter {
    usb: Mutex<RefCell<Driver>>,
}

impl BusAdapter {
    /// Share an initialized driver
    pub const fn new(driver: Driver) -> Self {
        BusAdapter {
            usb: Mutex::new(RefCell::new(driver)),
        }
    }

    /// Interrupt-safe, immutable access to the USB driver
    fn with_usb<R>(&self, func: impl FnOnce(&Driver) -> R) -> R {
        interrupt::free(|cs| {
            let usb = self.usb.borrow(cs);
            let usb = usb.borrow();
            func(&usb)
        })
    }

    /// Interrupt-safe, mutable access to the USB driver
    pub fn with_driver<R>(&self, func: impl FnOnce(&mut Driver) -> R) -> R {
        interrupt::free(|cs| {
            let usb = self.usb.borrow(cs);
            let mut usb = usb.borrow_mut();
            func(&mut usb)
        })
    }

    /// See [`Driver::isr`]
    pub fn isr<H: TokenHandler>(&self, handler: &mut H) {
        self.with_driver(|usb| usb.isr(handler));
    }

    /// See [`Driver::poll_tokens`]
    pub fn poll_tokens<H: TokenHandler>(&self, handler: &mut H) -> bool {
        self.with_driver(|usb| usb.poll_tokens(handler))
    }

    /// See [`Driver::task`]
    pub fn task(&self) {
        self.with_driver(|usb| usb.task());
    }

    pub fn put_packet(
        &self,
        endpoint: usize,
        data: &[u8],
        policy: TogglePolicy,
    ) -> Result<usize, UsbError> {
        self.with_driver(|usb| usb.put_packet(endpoint, data, policy))
    }

    pub fn get_packet(&self, endpoint: usize, buffer: &mut [u8]) -> Result<usize, UsbError> {
        self.with_driver(|usb| usb.get_packet(endpoint, buffer))
    }

    pub fn tx_ready(&self, endpoint: usize) -> bool {
        self.with_usb(|usb| usb.tx_ready(endpoint))
    }

    pub fn data_available(&self, endpoint: usize) -> bool {
        self.with_usb(|usb| usb.data_available(endpoint))
    }

    pub fn stall(&self, address: EndpointAddress) -> Result<(), UsbError> {
        self.with_driver(|usb| usb.stall(address))
    }

    pub fn unstall(&self, address: EndpointAddress) -> Result<(), UsbError> {
        self.with_driver(|usb| usb.unstall(address))
    }

    pub fn is_stalled(&self, address: EndpointAddress) -> bool {
        self.with_usb(|usb| usb.is_stalled(address))
    }

    pub fn state(&self) -> DeviceState {
        self.with_usb(|usb| usb.state())
    }
}
