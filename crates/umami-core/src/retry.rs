//! Bounded retry rules for the Umami API.
//!
//! Two failures are recoverable, each at most once per call: an expired
//! self-hosted token (HTTP 401) and the `url`/`path` metric dimension rename
//! between Umami versions (HTTP 400).

use crate::error::UmamiError;

/// Why a failed call may be issued again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryTrigger {
    /// 401 in self-hosted mode: drop the cached token, log in, resend.
    AuthExpired,
    /// 400 on a metrics query for `url` or `path`: resend with the other name.
    DimensionAlias,
}

impl RetryTrigger {
    /// Whether `err` is the failure this trigger recovers from.
    pub fn matches(self, err: &UmamiError) -> bool {
        match self {
            RetryTrigger::AuthExpired => err.status() == Some(401),
            RetryTrigger::DimensionAlias => err.status() == Some(400),
        }
    }
}

/// Allows a single retry for one trigger.
#[derive(Debug)]
pub struct RetryPolicy {
    trigger: RetryTrigger,
    used: bool,
}

impl RetryPolicy {
    pub fn once(trigger: RetryTrigger) -> Self {
        Self {
            trigger,
            used: false,
        }
    }

    /// Consume the retry if `err` matches and it has not been used yet.
    pub fn should_retry(&mut self, err: &UmamiError) -> bool {
        if self.used || !self.trigger.matches(err) {
            return false;
        }
        self.used = true;
        true
    }

    #[cfg(test)]
    fn is_spent(&self) -> bool {
        self.used
    }
}
