use std::time::Duration;
use tokio::time::Instant;

/// Whether a computation runs on behalf of a waiting caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A caller is waiting for the value (cache miss).
    Attached,
    /// A background refresh; nobody waits and the caller may be long gone.
    Detached,
}

/// Execution window handed to every computation.
///
/// A detached context is not tied to the original caller's lifetime but still
/// owns its own deadline.
#[derive(Debug, Clone, Copy)]
pub struct RefreshContext {
    mode: Mode,
    deadline: Instant,
}

impl RefreshContext {
    pub fn new(mode: Mode, wait_for: Duration) -> Self {
        RefreshContext {
            mode,
            deadline: Instant::now() + wait_for,
        }
    }

    pub fn attached(wait_for: Duration) -> Self {
        Self::new(Mode::Attached, wait_for)
    }

    pub fn detached(wait_for: Duration) -> Self {
        Self::new(Mode::Detached, wait_for)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_detached(&self) -> bool {
        self.mode == Mode::Detached
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_detached_context_keeps_its_own_deadline() {
        let ctx = RefreshContext::detached(Duration::from_millis(20));
        assert!(ctx.is_detached());
        assert!(!ctx.is_expired());
        assert!(ctx.remaining() <= Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_attached_context() {
        let ctx = RefreshContext::attached(Duration::from_secs(1));
        assert_eq!(ctx.mode(), Mode::Attached);
        assert!(!ctx.is_detached());
    }
}
