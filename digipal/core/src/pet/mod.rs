//! Pet State, Stats, and Archetypes
//!
//! This module contains:
//! - The pet's well-being stats and the invariants they hold
//! - The closed set of pet archetypes and their default profiles
//! - Decay over time ([`decay`]), the owning store ([`store`]), and the
//!   mapping of backend stat deltas onto the store ([`changes`])
//!
//! RENDERING is handled by the UI surface. The core only owns the numbers and
//! the identity the surface draws from.
//!
//! # Stats
//!
//! Every stat lives in the closed range `[0, 100]`. `hunger`, `hydration`,
//! `activity` and `mood` are the primary stats; `health` is derived from them
//! with inertia (see [`blend_health`]) and is never targeted directly.

pub mod changes;
pub mod clock;
pub mod decay;
pub mod store;

pub use changes::{normalize_attribute, ChangeApplier, LogCategory, StatChange, StatsLogEntry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use decay::{decay, DecayRates, MIN_DECAY_HOURS};
pub use store::{PetCustomization, StatStore, DEFAULT_DECAY_TICK};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowest value any stat can take
pub const STAT_MIN: f64 = 0.0;

/// Highest value any stat can take
pub const STAT_MAX: f64 = 100.0;

/// Weight of the primary-stat average in the health blend
pub const HEALTH_AVERAGE_WEIGHT: f64 = 0.8;

/// Weight of the previous health value in the health blend
pub const HEALTH_INERTIA_WEIGHT: f64 = 0.2;

/// Name given to the pet at session start
pub const DEFAULT_PET_NAME: &str = "DigiPal";

/// Colors offered when the user asks for a new look
pub const COLOR_PALETTE: [&str; 5] = ["#E1EEBC", "#FFC0CB", "#ADD8E6", "#FFD700", "#98FB98"];

/// Clamp a stat value into `[0, 100]`. NaN collapses to 0.
#[must_use]
pub fn clamp_stat(value: f64) -> f64 {
    if value.is_nan() {
        STAT_MIN
    } else {
        value.clamp(STAT_MIN, STAT_MAX)
    }
}

/// Health trends toward the mean of the primary stats, keeping 20% of its
/// previous value.
///
/// `previous_health` is the health value before the update being applied.
#[must_use]
pub fn blend_health(stats: &PetStats, previous_health: f64) -> f64 {
    clamp_stat(
        HEALTH_AVERAGE_WEIGHT * stats.primary_average()
            + HEALTH_INERTIA_WEIGHT * clamp_stat(previous_health),
    )
}

/// The four primary stats that decay and that chat changes can target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    /// Fullness; restored by food
    Hunger,
    /// Restored by water
    Hydration,
    /// Energy and exercise
    Activity,
    /// Happiness
    Mood,
}

impl StatKind {
    /// All primary stats, in gauge order
    pub const ALL: [StatKind; 4] = [
        StatKind::Hunger,
        StatKind::Hydration,
        StatKind::Activity,
        StatKind::Mood,
    ];

    /// Lowercase stat name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hunger => "hunger",
            Self::Hydration => "hydration",
            Self::Activity => "activity",
            Self::Mood => "mood",
        }
    }

    /// Category bucket used by the stats log
    #[must_use]
    pub fn category(&self) -> LogCategory {
        match self {
            Self::Hunger => LogCategory::Food,
            Self::Hydration => LogCategory::Water,
            Self::Activity => LogCategory::Activity,
            Self::Mood => LogCategory::Mood,
        }
    }
}

impl std::fmt::Display for StatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The pet's well-being numbers
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PetStats {
    /// Fullness (0-100)
    pub hunger: f64,
    /// Hydration (0-100)
    pub hydration: f64,
    /// Activity / energy (0-100)
    pub activity: f64,
    /// Happiness (0-100)
    pub mood: f64,
    /// Derived overall health (0-100)
    pub health: f64,
}

impl Default for PetStats {
    fn default() -> Self {
        Self::full()
    }
}

impl PetStats {
    /// Every stat at its maximum
    #[must_use]
    pub fn full() -> Self {
        Self {
            hunger: STAT_MAX,
            hydration: STAT_MAX,
            activity: STAT_MAX,
            mood: STAT_MAX,
            health: STAT_MAX,
        }
    }

    /// Read a primary stat
    #[must_use]
    pub fn get(&self, stat: StatKind) -> f64 {
        match stat {
            StatKind::Hunger => self.hunger,
            StatKind::Hydration => self.hydration,
            StatKind::Activity => self.activity,
            StatKind::Mood => self.mood,
        }
    }

    /// Write a primary stat, clamped into range
    pub fn set(&mut self, stat: StatKind, value: f64) {
        let value = clamp_stat(value);
        match stat {
            StatKind::Hunger => self.hunger = value,
            StatKind::Hydration => self.hydration = value,
            StatKind::Activity => self.activity = value,
            StatKind::Mood => self.mood = value,
        }
    }

    /// Mean of the four primary stats
    #[must_use]
    pub fn primary_average(&self) -> f64 {
        (self.hunger + self.hydration + self.activity + self.mood) / 4.0
    }

    /// Copy with every field clamped into `[0, 100]`
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            hunger: clamp_stat(self.hunger),
            hydration: clamp_stat(self.hydration),
            activity: clamp_stat(self.activity),
            mood: clamp_stat(self.mood),
            health: clamp_stat(self.health),
        }
    }

    /// Whether every field is within `[0, 100]`
    #[must_use]
    pub fn in_range(&self) -> bool {
        [
            self.hunger,
            self.hydration,
            self.activity,
            self.mood,
            self.health,
        ]
        .iter()
        .all(|v| (STAT_MIN..=STAT_MAX).contains(v))
    }

    /// Mood bucket for the avatar expression
    #[must_use]
    pub fn mood_bucket(&self) -> PetMood {
        PetMood::from_average(self.primary_average())
    }
}

/// Expression the avatar shows, derived from the primary stats
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PetMood {
    /// Average of primary stats at 70 or above
    #[default]
    Happy,
    /// Average between 40 and 70
    Neutral,
    /// Average below 40
    Sad,
}

impl PetMood {
    /// Bucket an average stat value
    #[must_use]
    pub fn from_average(average: f64) -> Self {
        if average >= 70.0 {
            Self::Happy
        } else if average >= 40.0 {
            Self::Neutral
        } else {
            Self::Sad
        }
    }

    /// Lowercase mood name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Neutral => "okay",
            Self::Sad => "sad",
        }
    }
}

impl std::fmt::Display for PetMood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Pet archetypes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PetType {
    /// Cat
    Cat,
    /// Dog
    Dog,
    /// Bunny
    Bunny,
    /// Frog
    Frog,
    /// Potted cactus (the starting pet)
    #[default]
    Cactus,
}

impl PetType {
    /// All archetypes
    pub const ALL: [PetType; 5] = [
        PetType::Cat,
        PetType::Dog,
        PetType::Bunny,
        PetType::Frog,
        PetType::Cactus,
    ];

    /// Lowercase archetype name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cat => "cat",
            Self::Dog => "dog",
            Self::Bunny => "bunny",
            Self::Frog => "frog",
            Self::Cactus => "cactus",
        }
    }

    /// Body color a freshly created pet of this type gets
    #[must_use]
    pub fn default_color(&self) -> &'static str {
        match self {
            Self::Cat => "#E1EEBC",
            Self::Dog => "#FFD700",
            Self::Bunny => "#FFC0CB",
            Self::Frog => "#98FB98",
            Self::Cactus => "#5DAE60",
        }
    }

    /// Stats a freshly created pet of this type starts with
    #[must_use]
    pub fn default_stats(&self) -> PetStats {
        PetStats::full()
    }
}

impl std::fmt::Display for PetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for PetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cat" => Ok(Self::Cat),
            "dog" => Ok(Self::Dog),
            "bunny" | "rabbit" => Ok(Self::Bunny),
            "frog" => Ok(Self::Frog),
            "cactus" => Ok(Self::Cactus),
            other => Err(format!("unknown pet type: {other}")),
        }
    }
}

/// The pet itself
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PetState {
    /// Unique pet ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Archetype
    pub pet_type: PetType,
    /// Body color (`#RRGGBB`)
    pub color: String,
    /// Optional hat accessory color/name
    pub hat: Option<String>,
    /// Current stats
    pub stats: PetStats,
    /// When the user last interacted with the pet
    pub last_interaction_at: DateTime<Utc>,
}

impl PetState {
    /// Create a pet with the default profile of its archetype
    #[must_use]
    pub fn new(name: impl Into<String>, pet_type: PetType, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            pet_type,
            color: pet_type.default_color().to_string(),
            hat: None,
            stats: pet_type.default_stats(),
            last_interaction_at: now,
        }
    }

    /// The session-start pet: a cactus named DigiPal with full stats
    #[must_use]
    pub fn starter(now: DateTime<Utc>) -> Self {
        Self::new(DEFAULT_PET_NAME, PetType::Cactus, now)
    }

    /// Mood derived from current stats
    #[must_use]
    pub fn mood(&self) -> PetMood {
        self.stats.mood_bucket()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_stat() {
        assert_eq!(clamp_stat(-5.0), 0.0);
        assert_eq!(clamp_stat(150.0), 100.0);
        assert_eq!(clamp_stat(42.5), 42.5);
        assert_eq!(clamp_stat(f64::NAN), 0.0);
        assert_eq!(clamp_stat(f64::INFINITY), 100.0);
    }

    #[test]
    fn test_blend_health() {
        let stats = PetStats {
            hunger: 50.0,
            hydration: 50.0,
            activity: 50.0,
            mood: 50.0,
            health: 100.0,
        };
        // 0.8 * 50 + 0.2 * 100
        assert!((blend_health(&stats, 100.0) - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_set_clamps() {
        let mut stats = PetStats::full();
        stats.set(StatKind::Hunger, 130.0);
        stats.set(StatKind::Mood, -3.0);
        assert_eq!(stats.hunger, 100.0);
        assert_eq!(stats.mood, 0.0);
        assert!(stats.in_range());
    }

    #[test]
    fn test_mood_buckets() {
        assert_eq!(PetMood::from_average(70.0), PetMood::Happy);
        assert_eq!(PetMood::from_average(69.9), PetMood::Neutral);
        assert_eq!(PetMood::from_average(40.0), PetMood::Neutral);
        assert_eq!(PetMood::from_average(39.9), PetMood::Sad);
    }

    #[test]
    fn test_starter_pet() {
        let pet = PetState::starter(Utc::now());
        assert_eq!(pet.name, "DigiPal");
        assert_eq!(pet.pet_type, PetType::Cactus);
        assert_eq!(pet.color, "#5DAE60");
        assert_eq!(pet.stats, PetStats::full());
        assert_eq!(pet.mood(), PetMood::Happy);
    }

    #[test]
    fn test_pet_type_from_str() {
        assert_eq!("Cat".parse::<PetType>(), Ok(PetType::Cat));
        assert_eq!(" rabbit ".parse::<PetType>(), Ok(PetType::Bunny));
        assert!("dragon".parse::<PetType>().is_err());
    }
}
