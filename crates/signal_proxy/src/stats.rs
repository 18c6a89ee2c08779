/// Statistics tracking for a signal proxy
use serde::{Deserialize, Serialize};

/// Counters of one proxy's subscription traffic.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyStats {
    /// Native connections made (0 -> 1 transitions)
    pub native_registrations: u64,
    /// Native connections released (1 -> 0 transitions and teardown)
    pub native_unregistrations: u64,
    /// Subscriptions ever added
    pub subscriptions_added: u64,
    /// Subscriptions removed explicitly, by one-shot expiry or by release
    pub subscriptions_removed: u64,
    /// Dispatches that reached a non-empty list
    pub dispatches: u64,
    /// Synchronous callback invocations
    pub invocations: u64,
    /// Callbacks routed to the frame scheduler
    pub deferred_scheduled: u64,
    /// One-shot subscriptions consumed
    pub one_shots_expired: u64,
    /// Dispatches rejected because arguments did not fit the payload
    pub dispatch_failures: u64,
}

impl ProxyStats {
    /// Subscriptions currently alive according to the counters.
    pub fn active_subscriptions(&self) -> u64 {
        self.subscriptions_added.saturating_sub(self.subscriptions_removed)
    }

    /// Folds another proxy's counters into this one.
    pub fn merge(&mut self, other: &ProxyStats) {
        self.native_registrations += other.native_registrations;
        self.native_unregistrations += other.native_unregistrations;
        self.subscriptions_added += other.subscriptions_added;
        self.subscriptions_removed += other.subscriptions_removed;
        self.dispatches += other.dispatches;
        self.invocations += other.invocations;
        self.deferred_scheduled += other.deferred_scheduled;
        self.one_shots_expired += other.one_shots_expired;
        self.dispatch_failures += other.dispatch_failures;
    }
}
