//! # Native Signal Sources
//!
//! The proxy never talks to an engine directly. It receives a capability,
//! a [`NativeSource`], that can attach and detach a [`DispatchEntry`] to a
//! named signal. [`LocalSignals`] is the in-process implementation used by
//! objects that live inside the host (and by tests).
//!
//! A [`Registration`] ties one native connection to the lifetime of a
//! subscription list: building it connects, dropping it disconnects.

use crate::error::SignalError;
use crate::payload::Payload;
use crate::types::ProxyId;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

/// Receiver side of a native connection.
pub trait DispatchTarget {
    /// Delivers one native emission.
    fn dispatch_native(&self, event: &str, args: &[Value]);
}

/// The entry point a proxy attaches to a native signal.
///
/// Holds only a weak reference to its proxy, so a connection that outlives
/// the proxy is inert rather than dangling.
#[derive(Clone)]
pub struct DispatchEntry {
    owner: ProxyId,
    event: CompactString,
    target: Weak<dyn DispatchTarget>,
}

impl DispatchEntry {
    pub fn new(
        owner: ProxyId,
        event: impl Into<CompactString>,
        target: Weak<dyn DispatchTarget>,
    ) -> Self {
        Self {
            owner,
            event: event.into(),
            target,
        }
    }

    pub fn owner(&self) -> ProxyId {
        self.owner
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// True once the owning proxy is gone.
    pub fn is_stale(&self) -> bool {
        self.target.strong_count() == 0
    }

    /// Forwards native arguments to the proxy. Returns false for a stale entry.
    pub fn invoke(&self, args: &[Value]) -> bool {
        match self.target.upgrade() {
            Some(target) => {
                target.dispatch_native(&self.event, args);
                true
            }
            None => {
                trace!("🕳️ Stale dispatch entry {}:{} ignored", self.owner, self.event);
                false
            }
        }
    }
}

impl PartialEq for DispatchEntry {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.event == other.event
    }
}

impl Eq for DispatchEntry {}

impl fmt::Debug for DispatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchEntry")
            .field("owner", &self.owner)
            .field("event", &self.event)
            .field("stale", &self.is_stale())
            .finish()
    }
}

/// Registry of named native signals on one engine object.
pub trait NativeSource {
    /// Name of the owning object, for diagnostics.
    fn object_name(&self) -> &str;

    /// Attaches `entry` to the signal `event`.
    ///
    /// Must reject names the object does not declare with
    /// [`SignalError::UnknownEvent`].
    fn connect(&self, event: &str, entry: DispatchEntry) -> Result<(), SignalError>;

    /// Detaches `entry`. Returns false if it was not connected.
    fn disconnect(&self, event: &str, entry: &DispatchEntry) -> bool;
}

/// One live native connection, released on drop.
pub(crate) struct Registration {
    source: Rc<dyn NativeSource>,
    entry: DispatchEntry,
}

impl Registration {
    pub(crate) fn connect(
        source: Rc<dyn NativeSource>,
        entry: DispatchEntry,
    ) -> Result<Self, SignalError> {
        source.connect(entry.event(), entry.clone())?;
        debug!(
            "🔗 {} connected to native signal {}:{}",
            entry.owner(),
            source.object_name(),
            entry.event()
        );
        Ok(Self { source, entry })
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.source.disconnect(self.entry.event(), &self.entry) {
            debug!(
                "✂️ {} disconnected from native signal {}:{}",
                self.entry.owner(),
                self.source.object_name(),
                self.entry.event()
            );
        } else {
            warn!(
                "⚠️ Native signal {}:{} had no connection for {}",
                self.source.object_name(),
                self.entry.event(),
                self.entry.owner()
            );
        }
    }
}

/// Per-signal counters kept by [`LocalSignals`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalCounters {
    pub connects: u64,
    pub disconnects: u64,
    pub emitted: u64,
}

#[derive(Default)]
struct SignalSlot {
    connections: SmallVec<[DispatchEntry; 2]>,
    counters: SignalCounters,
}

/// In-process native source with a fixed set of declared signals.
pub struct LocalSignals {
    name: CompactString,
    slots: RefCell<HashMap<CompactString, SignalSlot>>,
}

impl fmt::Debug for LocalSignals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.borrow();
        let mut signals: Vec<&str> = slots.keys().map(|k| k.as_str()).collect();
        signals.sort_unstable();
        f.debug_struct("LocalSignals")
            .field("name", &self.name)
            .field("signals", &signals)
            .finish()
    }
}

impl LocalSignals {
    pub fn new<'a>(name: &str, signals: impl IntoIterator<Item = &'a str>) -> Self {
        let slots = signals
            .into_iter()
            .map(|signal| (CompactString::new(signal), SignalSlot::default()))
            .collect();
        Self {
            name: CompactString::new(name),
            slots: RefCell::new(slots),
        }
    }

    /// Declares an additional signal (user-defined signals on a scripted object).
    pub fn declare(&self, signal: &str) {
        self.slots
            .borrow_mut()
            .entry(CompactString::new(signal))
            .or_default();
    }

    pub fn has_signal(&self, signal: &str) -> bool {
        self.slots.borrow().contains_key(signal)
    }

    /// Number of entries currently attached to `signal`.
    pub fn connection_count(&self, signal: &str) -> usize {
        self.slots
            .borrow()
            .get(signal)
            .map_or(0, |slot| slot.connections.len())
    }

    pub fn counters(&self, signal: &str) -> Option<SignalCounters> {
        self.slots.borrow().get(signal).map(|slot| slot.counters.clone())
    }

    /// Emits `signal` to every attached entry in connection order.
    ///
    /// Returns the number of live entries reached.
    pub fn emit(&self, signal: &str, args: &[Value]) -> Result<usize, SignalError> {
        let snapshot = {
            let mut slots = self.slots.borrow_mut();
            let slot = slots.get_mut(signal).ok_or_else(|| self.unknown(signal))?;
            slot.counters.emitted += 1;
            slot.connections.clone()
        };

        trace!(
            "📣 {}:{} emitted to {} connection(s)",
            self.name,
            signal,
            snapshot.len()
        );

        Ok(snapshot.iter().filter(|entry| entry.invoke(args)).count())
    }

    /// Encodes a typed payload and emits it.
    pub fn emit_payload<P: Payload>(
        &self,
        signal: &str,
        payload: &P,
    ) -> Result<usize, SignalError> {
        let args = payload.encode()?;
        self.emit(signal, &args)
    }

    fn unknown(&self, signal: &str) -> SignalError {
        SignalError::UnknownEvent {
            object: self.name.clone(),
            event: CompactString::new(signal),
        }
    }
}

impl NativeSource for LocalSignals {
    fn object_name(&self) -> &str {
        &self.name
    }

    fn connect(&self, event: &str, entry: DispatchEntry) -> Result<(), SignalError> {
        let mut slots = self.slots.borrow_mut();
        let slot = slots.get_mut(event).ok_or_else(|| self.unknown(event))?;
        if slot.connections.contains(&entry) {
            return Err(SignalError::RegistrationFailed {
                event: CompactString::new(event),
                reason: format!("{} is already connected", entry.owner()),
            });
        }
        slot.connections.push(entry);
        slot.counters.connects += 1;
        Ok(())
    }

    fn disconnect(&self, event: &str, entry: &DispatchEntry) -> bool {
        let mut slots = self.slots.borrow_mut();
        let Some(slot) = slots.get_mut(event) else {
            return false;
        };
        match slot.connections.iter().position(|existing| existing == entry) {
            Some(index) => {
                slot.connections.remove(index);
                slot.counters.disconnects += 1;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<(String, Vec<Value>)>>,
    }

    impl DispatchTarget for Recorder {
        fn dispatch_native(&self, event: &str, args: &[Value]) {
            self.calls.borrow_mut().push((event.to_string(), args.to_vec()));
        }
    }

    fn entry_for(recorder: &Rc<Recorder>, owner: u64, event: &str) -> DispatchEntry {
        let target: Rc<dyn DispatchTarget> = recorder.clone();
        DispatchEntry::new(ProxyId(owner), event, Rc::downgrade(&target))
    }

    #[test]
    fn test_connect_rejects_undeclared_signal() {
        let source = LocalSignals::new("Button", ["pressed"]);
        let recorder = Rc::new(Recorder::default());

        let err = source
            .connect("hovered", entry_for(&recorder, 1, "hovered"))
            .unwrap_err();
        assert!(matches!(err, SignalError::UnknownEvent { .. }));
        assert!(err.is_registration_error());
    }

    #[test]
    fn test_duplicate_connection_is_rejected() {
        let source = LocalSignals::new("Button", ["pressed"]);
        let recorder = Rc::new(Recorder::default());

        source.connect("pressed", entry_for(&recorder, 1, "pressed")).unwrap();
        let err = source
            .connect("pressed", entry_for(&recorder, 1, "pressed"))
            .unwrap_err();
        assert!(matches!(err, SignalError::RegistrationFailed { .. }));
        assert_eq!(source.connection_count("pressed"), 1);
    }

    #[test]
    fn test_emit_reaches_connected_entries() {
        let source = LocalSignals::new("Slider", ["value_changed"]);
        let recorder = Rc::new(Recorder::default());
        source
            .connect("value_changed", entry_for(&recorder, 1, "value_changed"))
            .unwrap();

        let reached = source.emit("value_changed", &[json!(0.5)]).unwrap();
        assert_eq!(reached, 1);

        let calls = recorder.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "value_changed");
        assert_eq!(calls[0].1, vec![json!(0.5)]);
    }

    #[test]
    fn test_emit_unknown_signal_errors() {
        let source = LocalSignals::new("Slider", ["value_changed"]);
        assert!(source.emit("drag_started", &[]).is_err());
    }

    #[test]
    fn test_stale_entry_is_inert() {
        let source = LocalSignals::new("Timer", ["timeout"]);
        let recorder = Rc::new(Recorder::default());
        let entry = entry_for(&recorder, 9, "timeout");
        source.connect("timeout", entry.clone()).unwrap();

        drop(recorder);
        assert!(entry.is_stale());
        assert_eq!(source.emit("timeout", &[]).unwrap(), 0);
    }

    #[test]
    fn test_counters_track_connection_lifecycle() {
        let source = LocalSignals::new("Timer", ["timeout"]);
        let recorder = Rc::new(Recorder::default());
        let entry = entry_for(&recorder, 3, "timeout");

        source.connect("timeout", entry.clone()).unwrap();
        source.emit("timeout", &[]).unwrap();
        assert!(source.disconnect("timeout", &entry));
        assert!(!source.disconnect("timeout", &entry));

        let counters = source.counters("timeout").unwrap();
        assert_eq!(counters.connects, 1);
        assert_eq!(counters.disconnects, 1);
        assert_eq!(counters.emitted, 1);
    }

    #[test]
    fn test_declare_adds_signal() {
        let source = LocalSignals::new("Script", std::iter::empty());
        assert!(!source.has_signal("custom"));
        source.declare("custom");
        assert!(source.has_signal("custom"));
    }
}
