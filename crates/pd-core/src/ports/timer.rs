use std::time::Duration;

use crate::events::TimerToken;

/// One-shot timers delivered back as `InboundEvent::TimerFired`.
pub trait TimerPort: Send + Sync {
    /// Arm `token` to fire after `after`. Re-arming replaces the pending timer.
    fn schedule(&self, token: TimerToken, after: Duration);

    fn cancel(&self, token: TimerToken);
}
