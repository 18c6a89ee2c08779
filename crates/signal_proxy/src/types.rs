/// Identifier and option types shared across the proxy.
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;

thread_local! {
    static NEXT_PROXY_ID: Cell<u64> = const { Cell::new(1) };
}

/// Identity of one proxy (one owning object).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProxyId(pub u64);

impl ProxyId {
    /// Allocates a fresh id, unique on the current thread.
    pub fn next() -> Self {
        NEXT_PROXY_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            ProxyId(id)
        })
    }
}

impl fmt::Display for ProxyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proxy#{}", self.0)
    }
}

/// Listener identity returned by subscribe and accepted by unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Delivery options for one subscription.
///
/// ```rust
/// use signal_proxy::SubscribeOptions;
///
/// let options = SubscribeOptions::new().one_shot().deferred();
/// assert!(options.one_shot && options.deferred);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeOptions {
    /// Remove the subscription before its first invocation
    #[serde(default)]
    pub one_shot: bool,
    /// Run the callback on the next frame instead of inside dispatch
    #[serde(default)]
    pub deferred: bool,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn one_shot(mut self) -> Self {
        self.one_shot = true;
        self
    }

    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }
}
