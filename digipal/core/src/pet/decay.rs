//! Stat decay over elapsed wall-clock time
//!
//! Pure functions only. Each primary stat loses a fixed number of points per
//! hour, floored at zero, and health is re-blended from the result. Calls
//! covering less than [`MIN_DECAY_HOURS`] are no-ops so rapid successive
//! ticks don't churn the stats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{blend_health, PetStats, StatKind};

/// Elapsed time below which decay is skipped (about 36 seconds)
pub const MIN_DECAY_HOURS: f64 = 0.01;

/// Points lost per hour for each primary stat
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecayRates {
    /// Hunger points per hour
    pub hunger: f64,
    /// Hydration points per hour
    pub hydration: f64,
    /// Activity points per hour
    pub activity: f64,
    /// Mood points per hour
    pub mood: f64,
}

impl Default for DecayRates {
    fn default() -> Self {
        Self {
            hunger: 5.0,
            hydration: 8.0,
            activity: 3.0,
            mood: 4.0,
        }
    }
}

impl DecayRates {
    /// Rate for a single stat
    #[must_use]
    pub fn rate(&self, stat: StatKind) -> f64 {
        match stat {
            StatKind::Hunger => self.hunger,
            StatKind::Hydration => self.hydration,
            StatKind::Activity => self.activity,
            StatKind::Mood => self.mood,
        }
    }
}

/// Fractional hours from `since` to `now` (negative if the clock went back)
#[must_use]
pub fn hours_between(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let millis = (now - since).num_milliseconds() as f64;
    millis / 3_600_000.0
}

/// Decay `stats` by `hours` of elapsed time
///
/// Returns `None` when `hours` is below [`MIN_DECAY_HOURS`] (including
/// negative or NaN elapsed time).
#[must_use]
pub fn decay_by_hours(stats: &PetStats, hours: f64, rates: &DecayRates) -> Option<PetStats> {
    if hours.is_nan() || hours < MIN_DECAY_HOURS {
        return None;
    }

    let previous = stats.clamped();
    let mut decayed = previous;
    for stat in StatKind::ALL {
        let amount = rates.rate(stat).max(0.0) * hours;
        decayed.set(stat, (previous.get(stat) - amount).max(0.0));
    }
    decayed.health = blend_health(&decayed, previous.health);

    Some(decayed)
}

/// Decay `stats` for the time between `since` and `now`
///
/// The caller chooses the anchor; this function never touches timestamps.
#[must_use]
pub fn decay(
    stats: &PetStats,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
    rates: &DecayRates,
) -> Option<PetStats> {
    decay_by_hours(stats, hours_between(since, now), rates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_two_hours_subtracts_twice_the_rate() {
        let rates = DecayRates::default();
        let stats = PetStats::full();
        let decayed = decay_by_hours(&stats, 2.0, &rates).unwrap();

        assert!(approx(decayed.hunger, 90.0));
        assert!(approx(decayed.hydration, 84.0));
        assert!(approx(decayed.activity, 94.0));
        assert!(approx(decayed.mood, 92.0));
        // 0.8 * avg(90, 84, 94, 92) + 0.2 * 100
        assert!(approx(decayed.health, 92.0));
    }

    #[test]
    fn test_negligible_elapsed_is_noop() {
        let rates = DecayRates::default();
        let stats = PetStats::full();
        assert!(decay_by_hours(&stats, 0.0099, &rates).is_none());
        assert!(decay_by_hours(&stats, 0.0, &rates).is_none());
        assert!(decay_by_hours(&stats, -1.0, &rates).is_none());
        assert!(decay_by_hours(&stats, f64::NAN, &rates).is_none());
    }

    #[test]
    fn test_decay_floors_at_zero() {
        let rates = DecayRates::default();
        let stats = PetStats {
            hunger: 3.0,
            hydration: 1.0,
            activity: 0.0,
            mood: 10.0,
            health: 20.0,
        };
        let decayed = decay_by_hours(&stats, 10.0, &rates).unwrap();
        assert_eq!(decayed.hunger, 0.0);
        assert_eq!(decayed.hydration, 0.0);
        assert_eq!(decayed.activity, 0.0);
        assert_eq!(decayed.mood, 0.0);
        assert!(approx(decayed.health, 4.0));
        assert!(decayed.in_range());
    }

    #[test]
    fn test_out_of_range_input_is_clamped() {
        let rates = DecayRates::default();
        let stats = PetStats {
            hunger: 250.0,
            hydration: -40.0,
            activity: 50.0,
            mood: 50.0,
            health: 300.0,
        };
        let decayed = decay_by_hours(&stats, 1.0, &rates).unwrap();
        assert!(decayed.in_range());
        assert!(approx(decayed.hunger, 95.0));
        assert_eq!(decayed.hydration, 0.0);
    }

    #[test]
    fn test_decay_is_monotonic() {
        let rates = DecayRates::default();
        let mut stats = PetStats::full();
        for _ in 0..50 {
            let next = decay_by_hours(&stats, 0.5, &rates).unwrap();
            for stat in StatKind::ALL {
                assert!(next.get(stat) <= stats.get(stat));
            }
            stats = next;
        }
        assert_eq!(stats.hydration, 0.0);
    }

    #[test]
    fn test_decay_between_timestamps() {
        let rates = DecayRates::default();
        let since = Utc::now();
        let now = since + Duration::hours(2);
        let decayed = decay(&PetStats::full(), since, now, &rates).unwrap();
        assert!(approx(decayed.hunger, 90.0));

        assert!(decay(&PetStats::full(), since, since + Duration::seconds(30), &rates).is_none());
    }
}
