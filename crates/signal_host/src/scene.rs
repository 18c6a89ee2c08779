//! Demo scene: a few engine-style nodes wired together through their signals.
//!
//! Every node owns a [`LocalSignals`] native source and a [`SignalProxy`]; the
//! typed `on_*` / `remove_on_*` accessors come from `signal_accessors!`.
//!
//! Wiring:
//! - `Timer::timeout` damages the `Health` node
//! - `Health::changed` is reported on the next frame (deferred)
//! - `Health::depleted` logs the first knockout (one-shot) and respawns the
//!   node on the next frame (deferred)
//! - `Button::toggled` pauses and resumes the timer

use crate::config::SceneSettings;
use serde::{Deserialize, Serialize};
use signal_proxy::{
    signal_accessors, FrameScheduler, LocalSignals, ProxyStats, SignalError, SignalOwner,
    SignalProxy, SubscribeOptions,
};
use std::cell::Cell;
use std::rc::{Rc, Weak};
use tracing::{debug, info, warn};

struct NodeCore {
    signals: Rc<LocalSignals>,
    proxy: SignalProxy,
}

impl NodeCore {
    fn new(name: &str, declared: &[&str], scheduler: &FrameScheduler) -> Self {
        let signals = Rc::new(LocalSignals::new(name, declared.iter().copied()));
        let proxy = SignalProxy::new(signals.clone(), scheduler.clone());
        Self { signals, proxy }
    }
}

/// Counts down frames and fires `timeout` every `period` frames.
pub struct Timer {
    core: NodeCore,
    period: u64,
    elapsed: Cell<u64>,
    paused: Cell<bool>,
}

impl SignalOwner for Timer {
    fn signal_proxy(&self) -> &SignalProxy {
        &self.core.proxy
    }
}

signal_accessors! {
    Timer {
        "timeout" => on_timeout, remove_on_timeout();
    }
}

impl Timer {
    pub fn new(name: &str, period: u64, scheduler: &FrameScheduler) -> Self {
        Self {
            core: NodeCore::new(name, Self::SIGNAL_NAMES, scheduler),
            period: period.max(1),
            elapsed: Cell::new(0),
            paused: Cell::new(false),
        }
    }

    pub fn signals(&self) -> &LocalSignals {
        &self.core.signals
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.set(paused);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.get()
    }

    /// Advances one frame. Returns true when `timeout` fired.
    pub fn tick(&self) -> Result<bool, SignalError> {
        if self.paused.get() {
            return Ok(false);
        }
        let elapsed = self.elapsed.get() + 1;
        if elapsed < self.period {
            self.elapsed.set(elapsed);
            return Ok(false);
        }
        self.elapsed.set(0);
        self.core.signals.emit("timeout", &[])?;
        Ok(true)
    }
}

/// Toggle button driven by simulated input.
pub struct Button {
    core: NodeCore,
    toggled: Cell<bool>,
}

impl SignalOwner for Button {
    fn signal_proxy(&self) -> &SignalProxy {
        &self.core.proxy
    }
}

signal_accessors! {
    Button {
        "pressed" => on_pressed, remove_on_pressed();
        /// Carries the new toggle state
        "toggled" => on_toggled, remove_on_toggled(bool);
    }
}

impl Button {
    pub fn new(name: &str, scheduler: &FrameScheduler) -> Self {
        Self {
            core: NodeCore::new(name, Self::SIGNAL_NAMES, scheduler),
            toggled: Cell::new(false),
        }
    }

    pub fn signals(&self) -> &LocalSignals {
        &self.core.signals
    }

    pub fn is_toggled(&self) -> bool {
        self.toggled.get()
    }

    pub fn press(&self) -> Result<(), SignalError> {
        self.core.signals.emit("pressed", &[])?;
        let state = !self.toggled.get();
        self.toggled.set(state);
        self.core.signals.emit_payload("toggled", &(state,))?;
        Ok(())
    }
}

/// Hit points with change and depletion signals.
pub struct Health {
    core: NodeCore,
    max: i64,
    current: Cell<i64>,
}

impl SignalOwner for Health {
    fn signal_proxy(&self) -> &SignalProxy {
        &self.core.proxy
    }
}

signal_accessors! {
    Health {
        /// Carries (old, new)
        "changed" => on_changed, remove_on_changed(i64, i64);
        "depleted" => on_depleted, remove_on_depleted();
    }
}

impl Health {
    pub fn new(name: &str, max: i64, scheduler: &FrameScheduler) -> Self {
        Self {
            core: NodeCore::new(name, Self::SIGNAL_NAMES, scheduler),
            max,
            current: Cell::new(max),
        }
    }

    pub fn signals(&self) -> &LocalSignals {
        &self.core.signals
    }

    pub fn current(&self) -> i64 {
        self.current.get()
    }

    /// Removes `amount` hit points; already-depleted nodes ignore damage.
    pub fn damage(&self, amount: i64) -> Result<(), SignalError> {
        let old = self.current.get();
        if old <= 0 {
            return Ok(());
        }
        let new = (old - amount).max(0);
        self.current.set(new);
        self.core.signals.emit_payload("changed", &(old, new))?;
        if new == 0 {
            self.core.signals.emit("depleted", &[])?;
        }
        Ok(())
    }

    pub fn restore(&self) -> Result<(), SignalError> {
        let old = self.current.get();
        self.current.set(self.max);
        self.core.signals.emit_payload("changed", &(old, self.max))?;
        Ok(())
    }
}

/// Scene activity observed through the listeners.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneReport {
    pub frames: u64,
    pub timeouts: u64,
    pub presses: u64,
    pub toggles: u64,
    pub health_updates: u64,
    pub knockouts: u64,
    pub respawns: u64,
    /// Counters of all node proxies combined
    pub proxies: ProxyStats,
}

#[derive(Default)]
struct SceneCounters {
    timeouts: Cell<u64>,
    presses: Cell<u64>,
    toggles: Cell<u64>,
    health_updates: Cell<u64>,
    knockouts: Cell<u64>,
    respawns: Cell<u64>,
}

fn bump(counter: &Cell<u64>) {
    counter.set(counter.get() + 1);
}

/// The nodes, their wiring and the frame counter.
pub struct Scene {
    timer: Rc<Timer>,
    button: Rc<Button>,
    health: Rc<Health>,
    counters: Rc<SceneCounters>,
    button_period: u64,
    frame: u64,
}

impl Scene {
    /// Builds the nodes and subscribes the scene's listeners.
    pub fn new(settings: &SceneSettings, scheduler: FrameScheduler) -> Result<Self, SignalError> {
        let scene = Self {
            timer: Rc::new(Timer::new("Timer", settings.timer_period_frames, &scheduler)),
            button: Rc::new(Button::new("PauseButton", &scheduler)),
            health: Rc::new(Health::new("PlayerHealth", settings.max_health, &scheduler)),
            counters: Rc::new(SceneCounters::default()),
            button_period: settings.button_period_frames.max(1),
            frame: 0,
        };
        scene.wire(settings.damage_per_hit)?;
        Ok(scene)
    }

    fn wire(&self, damage_per_hit: i64) -> Result<(), SignalError> {
        let counters = self.counters.clone();
        let health = Rc::downgrade(&self.health);
        self.timer.on_timeout(
            move || {
                bump(&counters.timeouts);
                if let Some(health) = health.upgrade() {
                    if let Err(e) = health.damage(damage_per_hit) {
                        warn!("⚠️ Damage failed: {}", e);
                    }
                }
            },
            SubscribeOptions::new(),
        )?;

        let counters = self.counters.clone();
        self.health.on_changed(
            move |old: i64, new: i64| {
                bump(&counters.health_updates);
                info!("❤️ Health {} -> {}", old, new);
            },
            SubscribeOptions::new().deferred(),
        )?;

        self.health.on_depleted(
            || info!("💀 First knockout"),
            SubscribeOptions::new().one_shot(),
        )?;

        let counters = self.counters.clone();
        let health: Weak<Health> = Rc::downgrade(&self.health);
        self.health.on_depleted(
            move || {
                bump(&counters.knockouts);
                let Some(health) = health.upgrade() else {
                    return;
                };
                match health.restore() {
                    Ok(()) => {
                        bump(&counters.respawns);
                        info!("🔁 Respawned with {} health", health.current());
                    }
                    Err(e) => warn!("⚠️ Respawn failed: {}", e),
                }
            },
            SubscribeOptions::new().deferred(),
        )?;

        let counters = self.counters.clone();
        self.button
            .on_pressed(move || bump(&counters.presses), SubscribeOptions::new())?;

        let counters = self.counters.clone();
        let timer = Rc::downgrade(&self.timer);
        self.button.on_toggled(
            move |paused: bool| {
                bump(&counters.toggles);
                if let Some(timer) = timer.upgrade() {
                    timer.set_paused(paused);
                    info!("⏯️ Timer {}", if paused { "paused" } else { "resumed" });
                }
            },
            SubscribeOptions::new(),
        )?;

        debug!("🧩 Scene wired");
        Ok(())
    }

    /// Advances the scene by one frame; nodes emit their native signals.
    pub fn update(&mut self) -> Result<(), SignalError> {
        self.frame += 1;
        self.timer.tick()?;
        if self.frame % self.button_period == 0 {
            self.button.press()?;
        }
        Ok(())
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn button(&self) -> &Button {
        &self.button
    }

    pub fn health(&self) -> &Health {
        &self.health
    }

    pub fn report(&self) -> SceneReport {
        let mut proxies = ProxyStats::default();
        for proxy in self.proxies() {
            proxies.merge(&proxy.stats());
        }
        SceneReport {
            frames: self.frame,
            timeouts: self.counters.timeouts.get(),
            presses: self.counters.presses.get(),
            toggles: self.counters.toggles.get(),
            health_updates: self.counters.health_updates.get(),
            knockouts: self.counters.knockouts.get(),
            respawns: self.counters.respawns.get(),
            proxies,
        }
    }

    /// Releases every node's subscriptions. Returns the signals released.
    pub fn shutdown(&self) -> usize {
        self.proxies().iter().map(|proxy| proxy.release_all()).sum()
    }

    fn proxies(&self) -> [&SignalProxy; 3] {
        [
            self.timer.signal_proxy(),
            self.button.signal_proxy(),
            self.health.signal_proxy(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SceneSettings {
        SceneSettings {
            timer_period_frames: 2,
            button_period_frames: 5,
            damage_per_hit: 50,
            max_health: 100,
        }
    }

    fn run(scene: &mut Scene, scheduler: &FrameScheduler, frames: u64) {
        for _ in 0..frames {
            scene.update().unwrap();
            scheduler.run_frame();
        }
    }

    #[test]
    fn test_all_signals_registered_after_wiring() {
        let scheduler = FrameScheduler::new();
        let scene = Scene::new(&settings(), scheduler).unwrap();

        assert_eq!(scene.timer().signals().connection_count("timeout"), 1);
        assert_eq!(scene.button().signals().connection_count("pressed"), 1);
        assert_eq!(scene.button().signals().connection_count("toggled"), 1);
        assert_eq!(scene.health().signals().connection_count("changed"), 1);
        assert_eq!(scene.health().signals().connection_count("depleted"), 1);
        assert_eq!(scene.health().signal_proxy().subscriber_count("depleted"), 2);
    }

    #[test]
    fn test_knockout_respawns_on_next_frame() {
        let scheduler = FrameScheduler::new();
        let mut scene = Scene::new(&settings(), scheduler.clone()).unwrap();

        run(&mut scene, &scheduler, 4);

        let report = scene.report();
        assert_eq!(report.timeouts, 2);
        assert_eq!(report.knockouts, 1);
        assert_eq!(report.respawns, 1);
        assert_eq!(scene.health().current(), 100);

        // The one-shot knockout listener is gone, the respawn listener stays.
        assert_eq!(scene.health().signal_proxy().subscriber_count("depleted"), 1);
        assert_eq!(report.proxies.one_shots_expired, 1);
    }

    #[test]
    fn test_button_toggle_pauses_timer() {
        let scheduler = FrameScheduler::new();
        let mut scene = Scene::new(&settings(), scheduler.clone()).unwrap();

        run(&mut scene, &scheduler, 5);
        assert!(scene.button().is_toggled());
        assert!(scene.timer().is_paused());

        run(&mut scene, &scheduler, 5);
        let report = scene.report();
        assert_eq!(report.frames, 10);
        assert_eq!(report.presses, 2);
        assert_eq!(report.toggles, 2);
        assert_eq!(report.timeouts, 2);
        assert_eq!(report.health_updates, 3);
        assert!(!scene.timer().is_paused());
    }

    #[test]
    fn test_shutdown_releases_native_connections() {
        let scheduler = FrameScheduler::new();
        let mut scene = Scene::new(&settings(), scheduler.clone()).unwrap();
        run(&mut scene, &scheduler, 3);

        assert_eq!(scene.shutdown(), 5);
        assert_eq!(scene.timer().signals().connection_count("timeout"), 0);
        assert_eq!(scene.health().signals().connection_count("depleted"), 0);

        // Nodes keep emitting natively, nothing listens anymore.
        run(&mut scene, &scheduler, 3);
        assert_eq!(scene.report().timeouts, 1);
    }
}
