//! The seam between the driver and a chapter 9 request handler
//!
//! The driver terminates tokens. It doesn't know what a GET_DESCRIPTOR
//! request is. Whenever a token completes, the interrupt handler calls into
//! your [`TokenHandler`], and then moves the endpoint 0 descriptors
//! according to your answer.

use crate::Driver;

/// What to do after a control token on endpoint 0
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Ep0Response {
    /// Send this many bytes from the endpoint 0 IN buffer
    ///
    /// Fill the buffer with [`Driver::write_ep0`] before answering.
    /// `Respond(0)` sends a zero-length status packet.
    Respond(usize),
    /// The host sends more data; don't queue an IN packet
    ExpectData,
    /// Reject the request with a STALL handshake
    Stall,
}

/// What to do after the host acknowledged an endpoint 0 IN packet
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InResponse {
    /// Send another packet of this many bytes
    Respond(usize),
    /// The data stage is over; wait for the next SETUP
    Done,
}

/// Chapter 9 callbacks, invoked from the interrupt handler
///
/// Every callback receives the driver, so that it can read the SETUP
/// packet, stage response data, or change the address and configuration.
///
/// ```
/// use bdt_usbd::{Driver, Ep0Response, TokenHandler};
///
/// struct Chapter9;
///
/// impl TokenHandler for Chapter9 {
///     fn setup(&mut self, usb: &mut Driver) -> Ep0Response {
///         let setup = usb.setup_packet();
///         match (setup[0], setup[1]) {
///             // SET_ADDRESS: answer with a zero-length status packet.
///             // Apply the address once the status packet completes.
///             (0x00, 0x05) => Ep0Response::Respond(0),
///             _ => Ep0Response::Stall,
///         }
///     }
/// }
/// ```
pub trait TokenHandler {
    /// The bus reset; forget any request in progress
    fn reset(&mut self, usb: &mut Driver) {
        let _ = usb;
    }

    /// A SETUP packet arrived on endpoint 0
    fn setup(&mut self, usb: &mut Driver) -> Ep0Response;

    /// Data arrived on endpoint 0 OUT
    ///
    /// By default, acknowledge the data with a zero-length packet.
    fn ep0_out(&mut self, usb: &mut Driver) -> Ep0Response {
        let _ = usb;
        Ep0Response::Respond(0)
    }

    /// The host acknowledged the last endpoint 0 IN packet
    fn ep0_in(&mut self, usb: &mut Driver) -> InResponse {
        let _ = usb;
        InResponse::Done
    }

    /// Data arrived on a non-control endpoint
    ///
    /// The data stays in the endpoint until you call
    /// [`get_packet()`](Driver::get_packet).
    fn out(&mut self, usb: &mut Driver, endpoint: usize) {
        let _ = (usb, endpoint);
    }

    /// The host acknowledged an IN packet on a non-control endpoint
    fn in_complete(&mut self, usb: &mut Driver, endpoint: usize) {
        let _ = (usb, endpoint);
    }
}
