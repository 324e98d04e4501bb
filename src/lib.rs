//! A USB driver for buffer descriptor table (BDT) controllers
//!
//! `bdt-usbd` drives a full-speed serial interface engine (SIE) that moves
//! packets through a table of buffer descriptors. The driver tracks the
//! device state, services the USB interrupt, and hands completed tokens to
//! your [`TokenHandler`]. Non-control endpoints are served with
//! [`Driver::put_packet`] and [`Driver::get_packet`]. Errors are reported
//! with [`usb-device`]'s `UsbError`.
//!
//! To interface the library, you must define a safe implementation of
//! [`Peripherals`], and allocate a static [`UsbRam`] for your endpoints.
//! See the documentation of each for more information.
//!
//! [`usb-device`]: https://crates.io/crates/usb-device

#![no_std]

#[cfg(test)]
extern crate std;

// defmt's macros name their crate `defmt`.
#[cfg(feature = "defmt-03")]
extern crate defmt_03 as defmt;

#[macro_use]
mod log;

mod bd;
mod buffer;
mod bus;
mod config;
mod device;
mod driver;
mod endpoint;
mod errors;
mod handler;
mod ral;
mod sie;
mod state;
mod vcell;

#[cfg(test)]
mod sim;

pub use bd::Toggle;
pub use bus::BusAdapter;
pub use config::{Config, TokenServicing};
pub use device::{DeviceState, Interrupts};
pub use driver::{Driver, TogglePolicy};
pub use endpoint::{EndpointConfig, EndpointMode, Endpoints, MAX_PACKET_SIZE};
pub use errors::{ErrorCounters, ErrorFlags};
pub use handler::{Ep0Response, InResponse, TokenHandler};
pub use state::UsbRam;

/// A type that owns the SIE register block
///
/// The SIE registers are the interrupt, control, address, and endpoint
/// control registers of a single USB peripheral.
///
/// # Safety
///
/// `Peripherals` should only be implemented on a type that
/// owns the SIE register block. The pointer returned by
/// `sie` is assumed to be valid, and will be cast to a
/// register definition.
///
/// # Example
///
/// A safe implementation of `Peripherals` for a chip support
/// crate that hands out its USB instance once.
///
/// ```
/// # mod pac {
/// #   pub struct Usb; impl Usb { pub fn ptr() -> *const u8 { 0x4000_0400 as _ } }
/// #   pub fn take() -> Option<Usb> { Some(Usb) }
/// # }
/// use bdt_usbd::Peripherals;
///
/// struct Sie {
///     _usb: pac::Usb,
/// }
///
/// impl Sie {
///     /// Panics if the instance is already taken
///     pub fn take() -> Sie {
///         Sie {
///             _usb: pac::take().unwrap(),
///         }
///     }
/// }
///
/// unsafe impl Peripherals for Sie {
///     fn sie(&self) -> *const () {
///         pac::Usb::ptr() as _
///     }
/// }
///
/// let sie = Sie::take();
/// assert_eq!(sie.sie(), 0x4000_0400 as *const ());
/// ```
pub unsafe trait Peripherals {
    /// Returns the address of the SIE registers
    /// for this peripheral instance
    fn sie(&self) -> *const ();
}
