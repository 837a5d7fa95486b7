use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wsmux_frame::registers_early;

/// Default time a subscription waits for its confirmation.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Multiplexer behaviour shared by every call on a handle.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Fixed bound on the subscription confirmation round trip. Applies even
    /// when the caller supplies no deadline.
    pub confirmation_timeout: Duration,
    /// Deadline for calls that do not set [`CallOptions::timeout`].
    /// `None` waits until a response, cancellation, or termination.
    pub call_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            call_timeout: None,
        }
    }
}

/// Per-call deadline and cancellation.
///
/// Either one only releases this caller's wait; the request already written
/// to the peer is not retracted.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancel: None,
        }
    }

    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            timeout: None,
            cancel: Some(cancel),
        }
    }
}

/// When a subscription's callback enters the subscription table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOrder {
    /// Register before the request frame is written. Events that race ahead
    /// of the confirmation are still delivered.
    BeforeSend,
    /// Register once the confirmation has been observed.
    AfterConfirmation,
}

impl RegistrationOrder {
    /// The order a request kind needs by default.
    pub fn for_kind(kind: &str) -> Self {
        if registers_early(kind) {
            Self::BeforeSend
        } else {
            Self::AfterConfirmation
        }
    }
}

/// Automatic teardown triggers for a subscription.
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Remove the subscription after this long. Zero means no expiry.
    pub expiry: Option<Duration>,
    /// Remove the subscription when this token fires.
    pub cancel: Option<CancellationToken>,
    /// Overrides the per-kind registration order.
    pub registration: Option<RegistrationOrder>,
}

impl SubscribeOptions {
    pub fn with_expiry(expiry: Duration) -> Self {
        Self {
            expiry: Some(expiry),
            ..Self::default()
        }
    }

    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            cancel: Some(cancel),
            ..Self::default()
        }
    }

    /// Force a registration order regardless of the request kind.
    pub fn with_registration(mut self, order: RegistrationOrder) -> Self {
        self.registration = Some(order);
        self
    }

    /// The expiry, if one greater than zero was supplied.
    pub(crate) fn effective_expiry(&self) -> Option<Duration> {
        self.expiry.filter(|expiry| !expiry.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_expiry_means_none() {
        assert_eq!(
            SubscribeOptions::with_expiry(Duration::ZERO).effective_expiry(),
            None
        );
        assert_eq!(
            SubscribeOptions::with_expiry(Duration::from_millis(50)).effective_expiry(),
            Some(Duration::from_millis(50))
        );
        assert_eq!(SubscribeOptions::default().effective_expiry(), None);
    }

    #[test]
    fn registration_order_follows_kind() {
        assert_eq!(
            RegistrationOrder::for_kind("render_template"),
            RegistrationOrder::BeforeSend
        );
        assert_eq!(
            RegistrationOrder::for_kind("subscribe_events"),
            RegistrationOrder::AfterConfirmation
        );
    }

    #[test]
    fn default_config_bounds_confirmation_only() {
        let config = ClientConfig::default();
        assert_eq!(config.confirmation_timeout, Duration::from_secs(5));
        assert!(config.call_timeout.is_none());
    }
}
