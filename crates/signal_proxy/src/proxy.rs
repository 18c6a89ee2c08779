//! # Signal Subscription Proxy
//!
//! [`SignalProxy`] is owned by one engine object and keeps one
//! [`SubscriptionList`](crate::SubscriptionList) per signal name. The native
//! source only sees a connection while a list exists:
//!
//! - the first subscribe on a name connects the proxy's [`DispatchEntry`],
//! - the unsubscribe (or one-shot expiry) that empties a list disconnects it,
//! - dropping the proxy or calling [`SignalProxy::release_all`] disconnects
//!   everything.
//!
//! Dispatch runs over a snapshot taken before any callback executes, so
//! callbacks may subscribe, unsubscribe or re-emit freely.

use crate::error::SignalError;
use crate::native::{DispatchEntry, DispatchTarget, NativeSource, Registration};
use crate::payload::{Callback, Payload};
use crate::scheduler::FrameScheduler;
use crate::stats::ProxyStats;
use crate::subscription::{DispatchPlan, ErasedList, Subscription, SubscriptionList};
use crate::types::{ProxyId, SubscribeOptions, SubscriptionId};
use compact_str::CompactString;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, error, trace};

struct ProxyInner {
    id: ProxyId,
    source: Rc<dyn NativeSource>,
    scheduler: FrameScheduler,
    lists: RefCell<HashMap<CompactString, Box<dyn ErasedList>>>,
    next_subscription: Cell<u64>,
    stats: RefCell<ProxyStats>,
    /// One-shots already off their list whose invocation has not run yet.
    pending_one_shots: RefCell<Vec<PendingOneShot>>,
    weak_self: Weak<ProxyInner>,
}

struct PendingOneShot {
    event: CompactString,
    id: SubscriptionId,
    active: Weak<Cell<bool>>,
}

impl PendingOneShot {
    /// Clears the flag if the invocation is still waiting; false once it ran.
    fn cancel(&self) -> bool {
        match self.active.upgrade() {
            Some(active) if active.get() => {
                active.set(false);
                true
            }
            _ => false,
        }
    }
}

/// Per-object signal subscription table.
///
/// Cloning yields another handle to the same table, which is how callbacks
/// reach the proxy that invoked them.
#[derive(Clone)]
pub struct SignalProxy {
    inner: Rc<ProxyInner>,
}

impl fmt::Debug for SignalProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalProxy")
            .field("id", &self.inner.id)
            .field("object", &self.inner.source.object_name())
            .field("registered", &self.registered_events())
            .finish()
    }
}

impl SignalProxy {
    /// Creates a proxy over `source`, deferring onto `scheduler`.
    pub fn new(source: Rc<dyn NativeSource>, scheduler: FrameScheduler) -> Self {
        let inner = Rc::new_cyclic(|weak_self| ProxyInner {
            id: ProxyId::next(),
            source,
            scheduler,
            lists: RefCell::new(HashMap::new()),
            next_subscription: Cell::new(1),
            stats: RefCell::new(ProxyStats::default()),
            pending_one_shots: RefCell::new(Vec::new()),
            weak_self: weak_self.clone(),
        });
        Self { inner }
    }

    pub fn id(&self) -> ProxyId {
        self.inner.id
    }

    pub fn object_name(&self) -> &str {
        self.inner.source.object_name()
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.inner.scheduler
    }

    /// Subscribes a synchronous, persistent listener.
    pub fn subscribe<P, F>(&self, event: &str, callback: F) -> Result<SubscriptionId, SignalError>
    where
        P: Payload,
        F: Callback<P>,
    {
        self.subscribe_with(event, SubscribeOptions::default(), callback)
    }

    /// Subscribes a listener with explicit one-shot / deferred options.
    ///
    /// The first subscription on `event` connects the proxy to the native
    /// signal before the subscription is stored; a rejected connection
    /// (unknown signal) leaves no trace.
    pub fn subscribe_with<P, F>(
        &self,
        event: &str,
        options: SubscribeOptions,
        callback: F,
    ) -> Result<SubscriptionId, SignalError>
    where
        P: Payload,
        F: Callback<P>,
    {
        if event.is_empty() {
            return Err(SignalError::InvalidEventName);
        }

        let id = self.next_subscription_id();
        let subscription = Subscription::new(id, options, callback);

        // Existing list: append, no native traffic.
        {
            let mut lists = self.inner.lists.borrow_mut();
            if let Some(list) = lists.get_mut(event) {
                let existing = list.signature();
                let typed = list
                    .as_any_mut()
                    .downcast_mut::<SubscriptionList<P>>()
                    .ok_or_else(|| SignalError::PayloadMismatch {
                        event: CompactString::new(event),
                        existing,
                        requested: P::signature(),
                    })?;
                typed.push(subscription);
                self.inner.stats.borrow_mut().subscriptions_added += 1;
                trace!("➕ {} subscribed {} to {}", self.inner.id, id, event);
                return Ok(id);
            }
        }

        // 0 -> 1: connect without holding the table borrow, the source may emit re-entrantly.
        let registration =
            Registration::connect(self.inner.source.clone(), self.dispatch_entry(event))?;
        let mut list = SubscriptionList::<P>::new(registration);
        list.push(subscription);
        self.inner
            .lists
            .borrow_mut()
            .insert(CompactString::new(event), Box::new(list));

        {
            let mut stats = self.inner.stats.borrow_mut();
            stats.native_registrations += 1;
            stats.subscriptions_added += 1;
        }
        debug!(
            "📝 {} registered '{}' on {} ({})",
            self.inner.id,
            event,
            self.object_name(),
            P::signature()
        );
        Ok(id)
    }

    /// Removes the listener `id` from `event`.
    ///
    /// Unknown events and unknown ids are ignored; returns whether anything
    /// was removed. Removing the last listener disconnects the native signal.
    /// A one-shot already consumed by a dispatch but not yet run is cancelled
    /// instead.
    pub fn unsubscribe(&self, event: &str, id: SubscriptionId) -> bool {
        let (removed, emptied) = {
            let mut lists = self.inner.lists.borrow_mut();
            let removed = lists.get_mut(event).is_some_and(|list| list.remove(id));
            let drained = removed && lists.get(event).is_some_and(|list| list.len() == 0);
            (removed, if drained { lists.remove(event) } else { None })
        };

        if !removed {
            return self.cancel_pending_one_shot(event, id);
        }

        self.inner.stats.borrow_mut().subscriptions_removed += 1;
        trace!("➖ {} unsubscribed {} from {}", self.inner.id, id, event);

        if let Some(list) = emptied {
            self.retire(event, list);
        }
        true
    }

    /// Delivers native arguments to the listeners of `event`.
    ///
    /// Returns the number of listeners invoked synchronously or scheduled;
    /// listeners cancelled by an earlier callback of the same dispatch are
    /// not counted. An absent or empty list is a no-op returning 0.
    pub fn dispatch(&self, event: &str, args: &[Value]) -> Result<usize, SignalError> {
        let plan = {
            let mut lists = self.inner.lists.borrow_mut();
            let Some(list) = lists.get_mut(event) else {
                trace!("🕳️ {} dispatch on '{}' with no listeners", self.inner.id, event);
                return Ok(0);
            };
            match list.plan_native(event, args) {
                Ok(plan) => plan,
                Err(e) => {
                    self.inner.stats.borrow_mut().dispatch_failures += 1;
                    return Err(e);
                }
            }
        };
        Ok(self.execute(event, plan))
    }

    /// Delivers an already-typed payload to the listeners of `event`.
    pub fn dispatch_payload<P: Payload>(
        &self,
        event: &str,
        payload: P,
    ) -> Result<usize, SignalError> {
        let plan = {
            let mut lists = self.inner.lists.borrow_mut();
            let Some(list) = lists.get_mut(event) else {
                return Ok(0);
            };
            let existing = list.signature();
            match list.as_any_mut().downcast_mut::<SubscriptionList<P>>() {
                Some(typed) => typed.plan(payload),
                None => {
                    self.inner.stats.borrow_mut().dispatch_failures += 1;
                    return Err(SignalError::PayloadMismatch {
                        event: CompactString::new(event),
                        existing,
                        requested: P::signature(),
                    });
                }
            }
        };
        Ok(self.execute(event, plan))
    }

    /// Drops every subscription list, disconnecting all native signals and
    /// cancelling pending deferred invocations. Returns the number of
    /// signals released.
    pub fn release_all(&self) -> usize {
        let lists: Vec<(CompactString, Box<dyn ErasedList>)> =
            self.inner.lists.borrow_mut().drain().collect();
        let released = lists.len();

        for (event, mut list) in lists {
            let removed = list.len() as u64;
            list.cancel_all();
            self.inner.stats.borrow_mut().subscriptions_removed += removed;
            self.retire(&event, list);
        }

        let cancelled = self
            .inner
            .pending_one_shots
            .borrow_mut()
            .drain(..)
            .filter(|pending| pending.cancel())
            .count();

        if released > 0 || cancelled > 0 {
            debug!(
                "🧹 {} released {} signal(s) and {} pending one-shot(s) on {}",
                self.inner.id,
                released,
                cancelled,
                self.object_name()
            );
        }
        released
    }

    /// True while `event` holds a native connection.
    pub fn is_registered(&self, event: &str) -> bool {
        self.inner.lists.borrow().contains_key(event)
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.inner.lists.borrow().get(event).map_or(0, |list| list.len())
    }

    /// Subscription ids of `event` in invocation order.
    pub fn subscriptions(&self, event: &str) -> Vec<SubscriptionId> {
        self.inner
            .lists
            .borrow()
            .get(event)
            .map(|list| list.ids())
            .unwrap_or_default()
    }

    /// Names of the signals currently connected, sorted.
    pub fn registered_events(&self) -> Vec<String> {
        let mut events: Vec<String> = self
            .inner
            .lists
            .borrow()
            .keys()
            .map(|event| event.to_string())
            .collect();
        events.sort_unstable();
        events
    }

    pub fn stats(&self) -> ProxyStats {
        self.inner.stats.borrow().clone()
    }

    fn next_subscription_id(&self) -> SubscriptionId {
        let id = self.inner.next_subscription.get();
        self.inner.next_subscription.set(id + 1);
        SubscriptionId(id)
    }

    fn dispatch_entry(&self, event: &str) -> DispatchEntry {
        let target: Weak<dyn DispatchTarget> = self.inner.weak_self.clone();
        DispatchEntry::new(self.inner.id, event, target)
    }

    fn cancel_pending_one_shot(&self, event: &str, id: SubscriptionId) -> bool {
        let cancelled = {
            let mut pending = self.inner.pending_one_shots.borrow_mut();
            pending
                .iter()
                .position(|entry| entry.id == id && entry.event.as_str() == event)
                .map(|index| pending.swap_remove(index))
                .is_some_and(|entry| entry.cancel())
        };
        if cancelled {
            trace!("➖ {} cancelled pending one-shot {} on {}", self.inner.id, id, event);
        }
        cancelled
    }

    /// Drops a list outside the table borrow, which disconnects its signal.
    fn retire(&self, event: &str, list: Box<dyn ErasedList>) {
        drop(list);
        self.inner.stats.borrow_mut().native_unregistrations += 1;
        debug!("🔌 {} unregistered '{}' on {}", self.inner.id, event, self.object_name());
    }

    fn execute(&self, event: &str, plan: DispatchPlan) -> usize {
        let DispatchPlan { invocations, expired } = plan;
        let expired_count = expired.len() as u64;

        // One-shots are already out of the list; an emptied list goes now.
        if !expired.is_empty() {
            {
                let mut pending = self.inner.pending_one_shots.borrow_mut();
                pending.retain(|entry| entry.active.strong_count() > 0);
                pending.extend(expired.into_iter().map(|(id, active)| PendingOneShot {
                    event: CompactString::new(event),
                    id,
                    active,
                }));
            }

            let emptied = {
                let mut lists = self.inner.lists.borrow_mut();
                let drained = lists.get(event).is_some_and(|list| list.len() == 0);
                if drained {
                    lists.remove(event)
                } else {
                    None
                }
            };
            if let Some(list) = emptied {
                self.retire(event, list);
            }
        }

        let mut deferred = 0u64;
        let mut invoked = 0u64;
        for invocation in invocations {
            if invocation.deferred {
                deferred += 1;
                self.inner.scheduler.defer(move || {
                    (invocation.run)();
                });
            } else if (invocation.run)() {
                invoked += 1;
            } else {
                trace!(
                    "⏭️ {} skipped cancelled {} on '{}'",
                    self.inner.id,
                    invocation.id,
                    event
                );
            }
        }

        {
            let mut stats = self.inner.stats.borrow_mut();
            stats.dispatches += 1;
            stats.invocations += invoked;
            stats.deferred_scheduled += deferred;
            stats.one_shots_expired += expired_count;
            stats.subscriptions_removed += expired_count;
        }
        let delivered = (invoked + deferred) as usize;
        trace!(
            "📤 {} dispatched '{}' to {} listener(s) ({} deferred)",
            self.inner.id,
            event,
            delivered,
            deferred
        );
        delivered
    }
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        // Pending deferred calls must not outlive the owner; registrations drop with the table.
        for list in self.lists.get_mut().values_mut() {
            list.cancel_all();
        }
        for pending in self.pending_one_shots.get_mut().drain(..) {
            pending.cancel();
        }
    }
}

impl DispatchTarget for ProxyInner {
    fn dispatch_native(&self, event: &str, args: &[Value]) {
        let Some(inner) = self.weak_self.upgrade() else {
            return;
        };
        let proxy = SignalProxy { inner };
        if let Err(e) = proxy.dispatch(event, args) {
            error!("❌ {} failed to dispatch '{}': {}", proxy.inner.id, event, e);
        }
    }
}
