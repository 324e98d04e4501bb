//! Driver configuration

/// How the driver learns about completed tokens
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TokenServicing {
    /// The interrupt handler services completed tokens.
    #[default]
    Interrupt,
    /// The application polls for completed tokens with
    /// [`poll_tokens()`](crate::Driver::poll_tokens).
    ///
    /// You must poll at least every 10ms. Otherwise, the host may decide
    /// that the device stopped responding.
    Polled,
}

/// Driver configuration
///
/// The default configuration services tokens in the interrupt handler,
/// keeps data toggle synchronization, doesn't count transfer errors, and
/// assumes that the device is always attached to the bus.
///
/// ```
/// use bdt_usbd::{Config, TokenServicing};
///
/// fn vbus_present() -> bool {
///     // Read your VBUS sense pin...
/// #   true
/// }
///
/// const CONFIG: Config = Config::new()
///     .error_counters(true)
///     .token_servicing(TokenServicing::Polled)
///     .bus_sense(vbus_present);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub(crate) error_counters: bool,
    pub(crate) token_servicing: TokenServicing,
    pub(crate) ignore_rx_toggle: bool,
    pub(crate) bus_sense: Option<fn() -> bool>,
    pub(crate) interrupt_line: Option<fn(bool)>,
}

impl Config {
    pub const fn new() -> Self {
        Config {
            error_counters: false,
            token_servicing: TokenServicing::Interrupt,
            ignore_rx_toggle: false,
            bus_sense: None,
            interrupt_line: None,
        }
    }

    /// Count transfer errors by cause
    ///
    /// See [`ErrorCounters`](crate::ErrorCounters).
    pub const fn error_counters(mut self, enable: bool) -> Self {
        self.error_counters = enable;
        self
    }

    pub const fn token_servicing(mut self, servicing: TokenServicing) -> Self {
        self.token_servicing = servicing;
        self
    }

    /// Accept received packets regardless of their data toggle
    ///
    /// Only use this if you suspect that the host and device lose toggle
    /// synchronization. Duplicated packets will no longer be filtered.
    pub const fn ignore_rx_toggle(mut self, ignore: bool) -> Self {
        self.ignore_rx_toggle = ignore;
        self
    }

    /// Sense the physical bus connection, usually a VBUS pin
    ///
    /// [`task()`](crate::Driver::task) attaches or detaches the device to
    /// follow this signal.
    pub const fn bus_sense(mut self, sense: fn() -> bool) -> Self {
        self.bus_sense = Some(sense);
        self
    }

    /// Enable (`true`) or disable (`false`) the controller's interrupt line
    ///
    /// The driver calls this once the device is powered, and when it
    /// detaches. Use it to unmask or mask the USB interrupt in your
    /// interrupt controller.
    pub const fn interrupt_line(mut self, line: fn(bool)) -> Self {
        self.interrupt_line = Some(line);
        self
    }

    /// Indicates if the physical bus is attached
    pub(crate) fn is_bus_attached(&self) -> bool {
        self.bus_sense.map(|sense| sense()).unwrap_or(true)
    }

    pub(crate) fn set_interrupt_line(&self, enable: bool) {
        if let Some(line) = self.interrupt_line {
            line(enable);
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
