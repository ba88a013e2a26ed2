//! Typing indicator signal
//!
//! Two roles share one timeout but own separate single-shot timers:
//! - outbound: restarted on every local keystroke; on expiry clears the indicator
//! - inbound: restarted on every remote `typing` event; on expiry clears the indicator
//!
//! Every keystroke still goes out on the wire. Only the display is debounced.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Default quiet period before the indicator clears
pub const DEFAULT_TYPING_TIMEOUT: Duration = Duration::from_secs(3);

/// Single-shot, cancel-and-replace expiry timer
///
/// Holds at most one pending deadline. Starting it again replaces the old one.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpiryTimer {
    deadline: Option<Instant>,
}

impl ExpiryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)start the timer, replacing any pending deadline
    pub fn restart(&mut self, now: Instant, timeout: Duration) {
        self.deadline = Some(now + timeout);
    }

    /// Drop the pending deadline, if any
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fire the timer if its deadline has passed
    ///
    /// Returns true exactly once per armed deadline.
    pub fn poll_expired(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Typing state for one session
#[derive(Debug)]
pub struct TypingSignal {
    timeout: Duration,
    outbound: ExpiryTimer,
    inbound: ExpiryTimer,
    /// Username currently shown as typing
    indicator: Option<String>,
}

impl TypingSignal {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            outbound: ExpiryTimer::new(),
            inbound: ExpiryTimer::new(),
            indicator: None,
        }
    }

    /// Local keystroke: restart the outbound timer
    ///
    /// The caller is responsible for putting the `typing` frame on the wire.
    pub fn on_local_keystroke(&mut self, now: Instant) {
        self.outbound.cancel();
        self.outbound.restart(now, self.timeout);
    }

    /// Local message sent: typing has stopped
    ///
    /// Cancels the outbound timer and clears the indicator. Returns true if
    /// the indicator was showing.
    pub fn on_local_send(&mut self) -> bool {
        self.outbound.cancel();
        self.indicator.take().is_some()
    }

    /// Remote `typing` event: show the user and restart the inbound timer
    ///
    /// Returns true if the displayed name changed.
    pub fn on_remote_typing(&mut self, username: &str, now: Instant) -> bool {
        self.inbound.restart(now, self.timeout);
        if self.indicator.as_deref() == Some(username) {
            return false;
        }
        self.indicator = Some(username.to_string());
        true
    }

    /// Fire any expired timers
    ///
    /// Each expiry clears the indicator. Returns true if the indicator changed.
    pub fn poll_expired(&mut self, now: Instant) -> bool {
        let mut changed = false;
        if self.outbound.poll_expired(now) {
            debug!("Outbound typing timer expired");
            changed |= self.indicator.take().is_some();
        }
        if self.inbound.poll_expired(now) {
            debug!("Inbound typing timer expired");
            changed |= self.indicator.take().is_some();
        }
        changed
    }

    /// Earliest pending deadline across both roles
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.outbound.deadline(), self.inbound.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Cancel both timers and clear the indicator
    pub fn reset(&mut self) {
        self.outbound.cancel();
        self.inbound.cancel();
        self.indicator = None;
    }

    pub fn indicator(&self) -> Option<&str> {
        self.indicator.as_deref()
    }

    pub fn outbound_pending(&self) -> bool {
        self.outbound.is_pending()
    }

    pub fn inbound_pending(&self) -> bool {
        self.inbound.is_pending()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for TypingSignal {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_timer_fires_once() {
        let start = Instant::now();
        let mut timer = ExpiryTimer::new();
        timer.restart(start, ms(3000));

        assert!(!timer.poll_expired(start + ms(2999)));
        assert!(timer.poll_expired(start + ms(3000)));
        assert!(!timer.poll_expired(start + ms(5000)));
        assert!(!timer.is_pending());
    }

    #[test]
    fn test_remote_typing_clears_after_timeout() {
        let start = Instant::now();
        let mut typing = TypingSignal::default();

        assert!(typing.on_remote_typing("bob", start));
        assert_eq!(typing.indicator(), Some("bob"));

        assert!(!typing.poll_expired(start + ms(2999)));
        assert_eq!(typing.indicator(), Some("bob"));

        assert!(typing.poll_expired(start + ms(3000)));
        assert_eq!(typing.indicator(), None);
    }

    #[test]
    fn test_second_remote_typing_resets_expiry() {
        let start = Instant::now();
        let mut typing = TypingSignal::default();
        typing.on_remote_typing("bob", start);

        let second = start + ms(2900);
        assert!(!typing.on_remote_typing("bob", second));

        // Original deadline passes without clearing
        assert!(!typing.poll_expired(start + ms(3100)));
        assert_eq!(typing.indicator(), Some("bob"));

        assert!(typing.poll_expired(second + ms(3000)));
        assert_eq!(typing.indicator(), None);
    }

    #[test]
    fn test_roles_do_not_cancel_each_other() {
        let start = Instant::now();
        let mut typing = TypingSignal::default();
        typing.on_remote_typing("bob", start);

        // A later local keystroke must not postpone the remote countdown
        typing.on_local_keystroke(start + ms(2000));
        assert!(typing.inbound_pending());
        assert_eq!(typing.next_deadline(), Some(start + ms(3000)));

        assert!(typing.poll_expired(start + ms(3000)));
        assert_eq!(typing.indicator(), None);
        assert!(typing.outbound_pending());
        assert!(!typing.inbound_pending());
    }

    #[test]
    fn test_local_send_cancels_outbound() {
        let start = Instant::now();
        let mut typing = TypingSignal::default();
        typing.on_remote_typing("bob", start);
        typing.on_local_keystroke(start);

        assert!(typing.on_local_send());
        assert!(!typing.outbound_pending());
        assert!(typing.inbound_pending());
        assert_eq!(typing.indicator(), None);
    }

    #[test]
    fn test_next_deadline_is_earliest() {
        let start = Instant::now();
        let mut typing = TypingSignal::new(ms(1000));
        assert!(typing.next_deadline().is_none());

        typing.on_local_keystroke(start + ms(500));
        typing.on_remote_typing("bob", start);
        assert_eq!(typing.next_deadline(), Some(start + ms(1000)));

        typing.reset();
        assert!(typing.next_deadline().is_none());
    }
}
