//! Interrupt servicing
//!
//! Each pass services the pending causes in a fixed order: reset, error,
//! activity, idle, token, stall. A service routine only clears its own
//! cause.

use super::{Driver, TogglePolicy};
use crate::{
    bd::Pid,
    config::TokenServicing,
    device::{DeviceState, Interrupts},
    endpoint::EndpointMode,
    errors::ErrorFlags,
    handler::{Ep0Response, InResponse, TokenHandler},
    ral,
    sie::endpoint_control,
};

impl Driver {
    /// Service the USB interrupt
    ///
    /// Call this from your USB interrupt handler. Token completions are
    /// forwarded to `handler`.
    pub fn isr<H: TokenHandler>(&mut self, handler: &mut H) {
        let services: [(Interrupts, fn(&mut Self, &mut H)); 6] = [
            (Interrupts::RESET, Self::service_reset),
            (Interrupts::ERROR, Self::service_error),
            (Interrupts::ACTIVITY, Self::service_activity),
            (Interrupts::IDLE, Self::service_idle),
            (Interrupts::TOKEN, Self::service_token),
            (Interrupts::STALL, Self::service_stall),
        ];
        for (cause, service) in services {
            // A service may change the enabled sources.
            if self.pending_interrupts().contains(cause) {
                service(self, handler);
            }
        }
    }

    /// Service one completed token, if there is one
    ///
    /// Returns `true` if a token was serviced. Use this when the driver is
    /// configured for [polled](TokenServicing::Polled) token servicing.
    pub fn poll_tokens<H: TokenHandler>(&mut self, handler: &mut H) -> bool {
        let complete = ral::read_reg!(crate::sie, self.sie, UIR, TOKDNE == 1);
        if complete {
            self.service_token(handler);
        }
        complete
    }

    /// Enabled causes, plus any transfer error
    ///
    /// Errors are cleared on every pass, even when they don't raise the
    /// interrupt.
    fn pending_interrupts(&self) -> Interrupts {
        let uir = ral::read_reg!(crate::sie, self.sie, UIR);
        let uie = ral::read_reg!(crate::sie, self.sie, UIE) | Interrupts::ERROR.bits();
        Interrupts::from_bits_truncate(uir & uie)
    }

    /// The sources enabled after every bus reset
    fn standard_interrupts(&self) -> Interrupts {
        let mut interrupts = Interrupts::RESET | Interrupts::IDLE | Interrupts::STALL;
        if self.config.token_servicing == TokenServicing::Interrupt {
            interrupts |= Interrupts::TOKEN;
        }
        if self.config.error_counters {
            interrupts |= Interrupts::ERROR;
        }
        interrupts
    }

    fn service_reset<H: TokenHandler>(&mut self, handler: &mut H) {
        debug!("RESET");
        handler.reset(self);
        // A SETUP that completed before the reset is dropped, along with
        // the packet lock it set.
        ral::modify_reg!(crate::sie, self.sie, UIR, TOKDNE: 0);
        ral::modify_reg!(crate::sie, self.sie, UCTRL, PKTDIS: 0);

        self.release_endpoints();
        self.configuration = 0;
        self.init_ep0_setup();
        ral::write_reg!(crate::sie, self.sie, UADDR, 0);
        self.set_mode(0, EndpointMode::Control);

        ral::write_reg!(crate::sie, self.sie, UIE, self.standard_interrupts().bits());
        if self.config.error_counters {
            ral::write_reg!(crate::sie, self.sie, UEIE, ErrorFlags::all().bits());
        }

        self.set_state(DeviceState::Default);
        ral::modify_reg!(crate::sie, self.sie, UIR, URST: 0);
    }

    fn service_error<H: TokenHandler>(&mut self, _: &mut H) {
        let flags = ErrorFlags::from_bits_truncate(ral::read_reg!(crate::sie, self.sie, UEIR));
        warn!("ERROR {=u8:#X}", flags.bits());
        if self.config.error_counters {
            self.errors.record(flags);
        }
        ral::modify_reg!(crate::sie, self.sie, UEIR, |ueir| ueir & !flags.bits());
        ral::modify_reg!(crate::sie, self.sie, UIR, UERR: 0);
    }

    fn service_activity<H: TokenHandler>(&mut self, _: &mut H) {
        ral::modify_reg!(crate::sie, self.sie, UCTRL, SUSPND: 0);
        ral::modify_reg!(crate::sie, self.sie, UIE, ACTIVITY: 0, UIDLE: 1);
        ral::modify_reg!(crate::sie, self.sie, UIR, ACTIVITY: 0);
        debug!("RESUME");
    }

    fn service_idle<H: TokenHandler>(&mut self, _: &mut H) {
        ral::modify_reg!(crate::sie, self.sie, UIR, UIDLE: 0, ACTIVITY: 0);
        ral::modify_reg!(crate::sie, self.sie, UCTRL, SUSPND: 1);
        ral::modify_reg!(crate::sie, self.sie, UIE, ACTIVITY: 1, UIDLE: 0);
        debug!("SUSPEND");
    }

    fn service_stall<H: TokenHandler>(&mut self, _: &mut H) {
        let stalled = {
            let uep0 = endpoint_control::register(&self.sie, 0);
            ral::read_reg!(crate::sie::endpoint_control, &uep0, UEP, EPSTALL == 1)
        };
        if stalled {
            self.init_ep0_setup();
            let uep0 = endpoint_control::register(&self.sie, 0);
            ral::modify_reg!(crate::sie::endpoint_control, &uep0, UEP, EPSTALL: 0);
        }
        ral::modify_reg!(crate::sie, self.sie, UIR, STALL: 0);
    }

    fn service_token<H: TokenHandler>(&mut self, handler: &mut H) {
        let endpoint = ral::read_reg!(crate::sie, self.sie, USTAT, ENDP) as usize;
        let is_in = ral::read_reg!(crate::sie, self.sie, USTAT, DIR == IN);
        trace!("TOKEN EP{=usize} IN={=bool}", endpoint, is_in);

        match (endpoint, is_in) {
            (0, false) if self.ram.bdt.out(0).pid() == Some(Pid::Setup) => {
                self.ep0_setup(handler)
            }
            (0, false) => self.ep0_out(handler),
            (0, true) => self.ep0_in(handler),
            (endpoint, false) if endpoint < self.endpoint_count() => {
                self.pending |= 1 << endpoint;
                handler.out(self, endpoint);
            }
            (endpoint, true) if endpoint < self.endpoint_count() => {
                handler.in_complete(self, endpoint);
            }
            _ => {
                warn!("TOKEN on unknown EP{=usize}", endpoint);
            }
        }

        ral::modify_reg!(crate::sie, self.sie, UIR, TOKDNE: 0);
    }

    fn ep0_setup<H: TokenHandler>(&mut self, handler: &mut H) {
        self.ep0_response = Ep0Response::Stall;
        // Revoke any response that the host hasn't taken.
        self.ram.bdt.r#in(0).clear();

        let response = handler.setup(self);
        self.respond_ep0(response);
        ral::modify_reg!(crate::sie, self.sie, UCTRL, PKTDIS: 0);
    }

    fn ep0_out<H: TokenHandler>(&mut self, handler: &mut H) {
        let response = handler.ep0_out(self);
        self.respond_ep0(response);
    }

    fn ep0_in<H: TokenHandler>(&mut self, handler: &mut H) {
        match handler.ep0_in(self) {
            InResponse::Respond(len) => {
                if self.flush_in(0, len, TogglePolicy::Alternate).is_err() {
                    warn!("EP0 IN flush failed");
                }
            }
            InResponse::Done => self.init_ep0_setup(),
        }
    }

    /// Prepare endpoint 0 for the next phase of the control transfer
    ///
    /// The IN toggle follows the OUT toggle, so that responses stay in sync
    /// with the host's requests.
    fn respond_ep0(&mut self, response: Ep0Response) {
        self.ep0_response = response;
        if response == Ep0Response::Stall {
            self.stall_ep0();
            return;
        }

        if self.flush_out(0, TogglePolicy::Alternate).is_err() {
            warn!("EP0 OUT flush failed");
        }
        if let Ep0Response::Respond(len) = response {
            trace!("EP0 RESPOND {=usize}", len);
            if self.flush_in(0, len, TogglePolicy::MirrorOut).is_err() {
                warn!("EP0 IN flush failed");
            }
        }
    }
}
