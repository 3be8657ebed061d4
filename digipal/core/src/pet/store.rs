//! Stat Store
//!
//! Owns the canonical [`PetState`]. Every mutation (decay tick, chat-driven
//! interaction, cosmetic customization) is a single read-modify-write inside
//! one lock acquisition, and the lock is never held across an `.await`, so a
//! decay tick can never observe a half-applied interaction.
//!
//! Stat snapshots are published on a `watch` channel for surfaces that draw
//! gauges.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::clock::Clock;
use super::decay::{decay, DecayRates};
use super::{blend_health, PetState, PetStats, PetType, StatKind};

/// How often the decay ticker runs by default
pub const DEFAULT_DECAY_TICK: Duration = Duration::from_secs(60);

/// Cosmetic changes to the pet
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PetCustomization {
    /// New display name
    pub name: Option<String>,
    /// New archetype (color is kept unless also given)
    pub pet_type: Option<PetType>,
    /// New body color
    pub color: Option<String>,
    /// New hat; `Some(None)` removes the hat
    pub hat: Option<Option<String>>,
}

struct StoreInner {
    pet: PetState,
    /// When decay was last applied; decay is charged from the later of this
    /// and the last interaction
    last_decay_at: Option<DateTime<Utc>>,
}

impl StoreInner {
    fn decay_anchor(&self) -> DateTime<Utc> {
        match self.last_decay_at {
            Some(at) if at > self.pet.last_interaction_at => at,
            _ => self.pet.last_interaction_at,
        }
    }
}

/// Owner of the pet state
pub struct StatStore {
    inner: Mutex<StoreInner>,
    clock: Arc<dyn Clock>,
    rates: DecayRates,
    stats_tx: watch::Sender<PetStats>,
}

impl StatStore {
    /// Create a store around an existing pet
    pub fn new(pet: PetState, clock: Arc<dyn Clock>) -> Self {
        let pet = PetState {
            stats: pet.stats.clamped(),
            ..pet
        };
        let (stats_tx, _) = watch::channel(pet.stats);
        Self {
            inner: Mutex::new(StoreInner {
                pet,
                last_decay_at: None,
            }),
            clock,
            rates: DecayRates::default(),
            stats_tx,
        }
    }

    /// Create a store holding the session-start pet
    pub fn starter(clock: Arc<dyn Clock>) -> Self {
        let pet = PetState::starter(clock.now());
        Self::new(pet, clock)
    }

    /// Override the decay rates
    #[must_use]
    pub fn with_rates(mut self, rates: DecayRates) -> Self {
        self.rates = rates;
        self
    }

    /// Snapshot of the full pet state
    pub fn state(&self) -> PetState {
        self.inner.lock().pet.clone()
    }

    /// Snapshot of the stats
    pub fn stats(&self) -> PetStats {
        self.inner.lock().pet.stats
    }

    /// When the user last interacted with the pet
    pub fn last_interaction_at(&self) -> DateTime<Utc> {
        self.inner.lock().pet.last_interaction_at
    }

    /// Subscribe to stat changes
    pub fn subscribe(&self) -> watch::Receiver<PetStats> {
        self.stats_tx.subscribe()
    }

    /// Apply decay for the time elapsed since the decay anchor
    ///
    /// Returns the new stats if decay was applied, `None` if the elapsed time
    /// was negligible.
    pub fn tick(&self) -> Option<PetStats> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let decayed = decay(&inner.pet.stats, inner.decay_anchor(), now, &self.rates)?;
        inner.pet.stats = decayed;
        inner.last_decay_at = Some(now);
        self.stats_tx.send_replace(decayed);

        tracing::trace!(
            hunger = decayed.hunger,
            hydration = decayed.hydration,
            activity = decayed.activity,
            mood = decayed.mood,
            health = decayed.health,
            "Applied stat decay"
        );
        Some(decayed)
    }

    /// Add `delta` to a primary stat, clamp, re-blend health, and mark the
    /// interaction time
    pub fn apply_interaction(&self, stat: StatKind, delta: f64) -> PetStats {
        if !delta.is_finite() {
            tracing::warn!(stat = %stat, delta, "Ignoring non-finite stat delta");
            return self.stats();
        }

        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let previous_health = inner.pet.stats.health;
        let mut stats = inner.pet.stats;
        stats.set(stat, stats.get(stat) + delta);
        stats.health = blend_health(&stats, previous_health);

        inner.pet.stats = stats;
        inner.pet.last_interaction_at = now;
        self.stats_tx.send_replace(stats);

        tracing::debug!(stat = %stat, delta, value = stats.get(stat), health = stats.health, "Applied interaction");
        stats
    }

    /// Apply cosmetic changes to the pet
    pub fn customize(&self, changes: PetCustomization) -> PetState {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let pet = &mut inner.pet;

        if let Some(name) = changes.name {
            pet.name = name;
        }
        if let Some(pet_type) = changes.pet_type {
            pet.pet_type = pet_type;
        }
        if let Some(color) = changes.color {
            pet.color = color;
        }
        if let Some(hat) = changes.hat {
            pet.hat = hat;
        }
        pet.last_interaction_at = now;

        pet.clone()
    }

    /// Run [`tick`](Self::tick) every `period` until the store is dropped
    pub fn spawn_decay_ticker(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    tracing::debug!("Stat store dropped, stopping decay ticker");
                    break;
                };
                store.tick();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pet::clock::ManualClock;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn store_with_clock() -> (Arc<StatStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(StatStore::starter(clock.clone()));
        (store, clock)
    }

    #[test]
    fn test_interaction_clamps_and_blends_health() {
        let (store, _clock) = store_with_clock();

        let stats = store.apply_interaction(StatKind::Hunger, -50.0);
        assert!(approx(stats.hunger, 50.0));
        // 0.8 * avg(50, 100, 100, 100) + 0.2 * 100
        assert!(approx(stats.health, 90.0));

        let stats = store.apply_interaction(StatKind::Hunger, 500.0);
        assert_eq!(stats.hunger, 100.0);
        // 0.8 * 100 + 0.2 * 90
        assert!(approx(stats.health, 98.0));
    }

    #[test]
    fn test_interaction_moves_last_interaction() {
        let (store, clock) = store_with_clock();
        clock.advance_hours(3.0);
        store.apply_interaction(StatKind::Mood, 1.0);
        assert_eq!(store.state().last_interaction_at, clock.now());
    }

    #[test]
    fn test_non_finite_delta_is_ignored() {
        let (store, _clock) = store_with_clock();
        let before = store.stats();
        store.apply_interaction(StatKind::Mood, f64::NAN);
        store.apply_interaction(StatKind::Mood, f64::INFINITY);
        assert_eq!(store.stats(), before);
    }

    #[test]
    fn test_tick_skips_negligible_elapsed() {
        let (store, clock) = store_with_clock();
        clock.advance(chrono::Duration::seconds(20));
        assert!(store.tick().is_none());
        assert_eq!(store.stats(), PetStats::full());
    }

    #[test]
    fn test_tick_does_not_touch_last_interaction() {
        let (store, clock) = store_with_clock();
        let created = store.state().last_interaction_at;
        clock.advance_hours(2.0);
        let stats = store.tick().unwrap();
        assert!(approx(stats.hunger, 90.0));
        assert_eq!(store.state().last_interaction_at, created);
    }

    #[test]
    fn test_consecutive_ticks_do_not_double_charge() {
        let (store, clock) = store_with_clock();
        clock.advance_hours(1.0);
        store.tick().unwrap();
        clock.advance_hours(1.0);
        let stats = store.tick().unwrap();
        assert!(approx(stats.hunger, 90.0));
        assert!(approx(stats.hydration, 84.0));
    }

    #[test]
    fn test_customize() {
        let (store, _clock) = store_with_clock();
        let pet = store.customize(PetCustomization {
            name: Some("Pico".to_string()),
            pet_type: Some(PetType::Frog),
            hat: Some(Some("#FF0000".to_string())),
            ..Default::default()
        });
        assert_eq!(pet.name, "Pico");
        assert_eq!(pet.pet_type, PetType::Frog);
        assert_eq!(pet.color, "#5DAE60");
        assert_eq!(pet.hat.as_deref(), Some("#FF0000"));

        let pet = store.customize(PetCustomization {
            hat: Some(None),
            ..Default::default()
        });
        assert!(pet.hat.is_none());
    }

    #[test]
    fn test_stats_always_in_range() {
        let (store, clock) = store_with_clock();
        let deltas = [-300.0, 45.0, 12.5, -7.0, 999.0, -0.5];
        for (i, delta) in deltas.iter().cycle().take(60).enumerate() {
            let stat = StatKind::ALL[i % 4];
            assert!(store.apply_interaction(stat, *delta).in_range());
            clock.advance_hours(0.7);
            if let Some(stats) = store.tick() {
                assert!(stats.in_range());
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_decay_ticker_publishes_stats() {
        let (store, clock) = store_with_clock();
        let mut rx = store.subscribe();
        let handle = store.spawn_decay_ticker(DEFAULT_DECAY_TICK);

        clock.advance_hours(1.0);
        tokio::time::timeout(Duration::from_secs(120), rx.changed())
            .await
            .expect("ticker should fire within two periods")
            .unwrap();

        let stats = *rx.borrow();
        assert!(approx(stats.hunger, 95.0));
        handle.abort();
    }
}
