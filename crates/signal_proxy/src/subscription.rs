/// Subscriptions and per-signal subscription lists
use crate::error::SignalError;
use crate::native::Registration;
use crate::payload::{Callback, Payload};
use crate::types::{SubscribeOptions, SubscriptionId};
use serde_json::Value;
use smallvec::SmallVec;
use std::any::Any;
use std::cell::Cell;
use std::rc::{Rc, Weak};

/// One registered listener.
pub struct Subscription<P: Payload> {
    id: SubscriptionId,
    options: SubscribeOptions,
    callback: Rc<dyn Fn(P)>,
    /// Cleared on unsubscribe or release; every pending invocation checks it.
    active: Rc<Cell<bool>>,
}

impl<P: Payload> Subscription<P> {
    pub(crate) fn new<F: Callback<P>>(
        id: SubscriptionId,
        options: SubscribeOptions,
        callback: F,
    ) -> Self {
        Self {
            id,
            options,
            callback: Rc::new(move |payload: P| callback.invoke(payload)),
            active: Rc::new(Cell::new(true)),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn options(&self) -> SubscribeOptions {
        self.options
    }

    fn invocation(&self, payload: P) -> Invocation {
        let callback = self.callback.clone();
        let active = self.active.clone();
        Invocation {
            id: self.id,
            deferred: self.options.deferred,
            run: Box::new(move || {
                if active.get() {
                    callback(payload);
                    true
                } else {
                    false
                }
            }),
        }
    }
}

/// A prepared call of one subscription, detached from the list.
pub(crate) struct Invocation {
    pub(crate) id: SubscriptionId,
    pub(crate) deferred: bool,
    /// Returns false when the subscription was cancelled before it ran
    pub(crate) run: Box<dyn FnOnce() -> bool>,
}

/// Result of planning one dispatch.
pub(crate) struct DispatchPlan {
    pub(crate) invocations: SmallVec<[Invocation; 4]>,
    /// One-shots taken off the list; the handle dies once their invocation ran.
    pub(crate) expired: SmallVec<[(SubscriptionId, Weak<Cell<bool>>); 2]>,
}

/// Ordered subscriptions for one signal, holding its native registration.
///
/// The list only exists while it is non-empty; the proxy drops it the moment
/// the last subscription leaves, which drops the registration and detaches
/// the native connection.
pub struct SubscriptionList<P: Payload> {
    entries: SmallVec<[Subscription<P>; 4]>,
    _registration: Registration,
}

impl<P: Payload> SubscriptionList<P> {
    pub(crate) fn new(registration: Registration) -> Self {
        Self {
            entries: SmallVec::new(),
            _registration: registration,
        }
    }

    pub(crate) fn push(&mut self, subscription: Subscription<P>) {
        self.entries.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription<P>> {
        self.entries.iter()
    }

    /// Snapshots invocations for `payload` in list order and removes one-shot
    /// subscriptions before any of them runs.
    pub(crate) fn plan(&mut self, payload: P) -> DispatchPlan {
        let invocations = self
            .entries
            .iter()
            .map(|subscription| subscription.invocation(payload.clone()))
            .collect();

        let expired = self
            .entries
            .iter()
            .filter(|subscription| subscription.options.one_shot)
            .map(|subscription| (subscription.id, Rc::downgrade(&subscription.active)))
            .collect();
        self.entries.retain(|subscription| !subscription.options.one_shot);

        DispatchPlan { invocations, expired }
    }
}

/// Payload-erased view of a subscription list, stored in the proxy table.
pub(crate) trait ErasedList {
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn signature(&self) -> &'static str;
    fn len(&self) -> usize;
    fn ids(&self) -> Vec<SubscriptionId>;
    /// Removes a subscription and cancels its pending deferred calls.
    fn remove(&mut self, id: SubscriptionId) -> bool;
    /// Cancels every subscription (owner teardown).
    fn cancel_all(&mut self);
    fn plan_native(&mut self, event: &str, args: &[Value]) -> Result<DispatchPlan, SignalError>;
}

impl<P: Payload> ErasedList for SubscriptionList<P> {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn signature(&self) -> &'static str {
        P::signature()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn ids(&self) -> Vec<SubscriptionId> {
        self.entries.iter().map(|subscription| subscription.id).collect()
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        match self.entries.iter().position(|subscription| subscription.id == id) {
            Some(index) => {
                let removed = self.entries.remove(index);
                removed.active.set(false);
                true
            }
            None => false,
        }
    }

    fn cancel_all(&mut self) {
        for subscription in self.entries.drain(..) {
            subscription.active.set(false);
        }
    }

    fn plan_native(&mut self, event: &str, args: &[Value]) -> Result<DispatchPlan, SignalError> {
        let payload = P::decode(event, args)?;
        Ok(self.plan(payload))
    }
}
