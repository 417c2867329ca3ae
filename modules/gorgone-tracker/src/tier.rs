use chrono::{DateTime, Duration, Utc};

use gorgone_common::types::{Tier, TierThresholds};

/// Refresh period for a tier. Cold items are never refreshed.
pub fn refresh_period(tier: Tier) -> Option<Duration> {
    match tier {
        Tier::UltraHot => Some(Duration::minutes(10)),
        Tier::Hot => Some(Duration::minutes(30)),
        Tier::Warm => Some(Duration::minutes(60)),
        Tier::Cold => None,
    }
}

/// Maximum item age for a tier. Cold is terminal and unbounded.
pub fn age_limit(tier: Tier) -> Option<Duration> {
    match tier {
        Tier::UltraHot => Some(Duration::hours(1)),
        Tier::Hot => Some(Duration::hours(24)),
        Tier::Warm => Some(Duration::days(7)),
        Tier::Cold => None,
    }
}

/// The highest tier an item of this age may hold. Age is measured from the
/// item's source creation time, never from ingest time.
fn tier_cap_for_age(age: Duration) -> Tier {
    if age < Duration::hours(1) {
        Tier::UltraHot
    } else if age < Duration::hours(24) {
        Tier::Hot
    } else if age < Duration::days(7) {
        Tier::Warm
    } else {
        Tier::Cold
    }
}

/// Tier assigned at ingest, from item age alone.
pub fn initial_tier(created_at_source: DateTime<Utc>, now: DateTime<Utc>) -> Tier {
    tier_cap_for_age(now - created_at_source)
}

/// Recompute the tier after a snapshot.
///
/// Demotions: the tier never exceeds the age cap, and an ultra_hot item
/// whose last two snapshots both had zero total delta drops straight to
/// warm. Promotion happens only when the snapshot velocity clears the
/// next-higher tier's threshold and the item is still young enough for
/// that tier.
pub fn next_tier(
    current: Tier,
    age: Duration,
    velocity: f64,
    consecutive_zero_deltas: i32,
    thresholds: &TierThresholds,
) -> Tier {
    let cap = tier_cap_for_age(age);
    let mut tier = current.min(cap);

    if current == Tier::UltraHot && consecutive_zero_deltas >= 2 {
        tier = tier.min(Tier::Warm);
    }

    let promoted = match tier {
        Tier::Warm | Tier::Cold => {
            if velocity >= thresholds.hot_per_hour {
                Tier::Hot
            } else {
                tier
            }
        }
        Tier::Hot => {
            if velocity >= thresholds.ultra_hot_per_hour {
                Tier::UltraHot
            } else {
                tier
            }
        }
        Tier::UltraHot => tier,
    };

    if promoted > tier {
        // A promotion only sticks while the item is younger than the
        // target tier's age limit.
        let allowed = age_limit(promoted).is_none_or(|limit| age < limit);
        if allowed {
            return promoted;
        }
    }
    tier
}

/// When the next refresh is due, or `None` for cold items.
pub fn schedule_next_update(tier: Tier, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    refresh_period(tier).map(|period| now + period)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> TierThresholds {
        TierThresholds::default()
    }

    #[test]
    fn initial_tier_follows_age_brackets() {
        let now = Utc::now();
        assert_eq!(initial_tier(now - Duration::minutes(30), now), Tier::UltraHot);
        assert_eq!(initial_tier(now - Duration::hours(5), now), Tier::Hot);
        assert_eq!(initial_tier(now - Duration::days(3), now), Tier::Warm);
        assert_eq!(initial_tier(now - Duration::days(10), now), Tier::Cold);
    }

    #[test]
    fn refresh_periods_match_tier_table() {
        assert_eq!(refresh_period(Tier::UltraHot), Some(Duration::minutes(10)));
        assert_eq!(refresh_period(Tier::Hot), Some(Duration::minutes(30)));
        assert_eq!(refresh_period(Tier::Warm), Some(Duration::minutes(60)));
        assert_eq!(refresh_period(Tier::Cold), None);
    }

    #[test]
    fn age_demotes_ultra_hot_to_hot_after_one_hour() {
        let tier = next_tier(Tier::UltraHot, Duration::minutes(90), 0.0, 0, &thresholds());
        assert_eq!(tier, Tier::Hot);
    }

    #[test]
    fn age_demotes_hot_to_warm_after_one_day() {
        let tier = next_tier(Tier::Hot, Duration::hours(30), 0.0, 0, &thresholds());
        assert_eq!(tier, Tier::Warm);
    }

    #[test]
    fn age_demotes_warm_to_cold_after_seven_days() {
        let tier = next_tier(Tier::Warm, Duration::days(8), 0.0, 0, &thresholds());
        assert_eq!(tier, Tier::Cold);
    }

    #[test]
    fn two_zero_delta_snapshots_demote_ultra_hot_to_warm() {
        // Item is 30 minutes old, so the age cap alone would keep it
        // ultra_hot; the dead-engagement rule skips it past hot.
        let tier = next_tier(Tier::UltraHot, Duration::minutes(30), 0.0, 2, &thresholds());
        assert_eq!(tier, Tier::Warm);
    }

    #[test]
    fn one_zero_delta_snapshot_is_not_enough_to_demote() {
        let tier = next_tier(Tier::UltraHot, Duration::minutes(30), 5.0, 1, &thresholds());
        assert_eq!(tier, Tier::UltraHot);
    }

    #[test]
    fn warm_promotes_to_hot_on_velocity_within_age_limit() {
        let tier = next_tier(Tier::Warm, Duration::hours(5), 50.0, 0, &thresholds());
        assert_eq!(tier, Tier::Hot);
    }

    #[test]
    fn promotion_is_blocked_past_the_target_age_limit() {
        // Velocity clears the hot threshold but the item is 2 days old,
        // older than hot's 24h limit.
        let tier = next_tier(Tier::Warm, Duration::days(2), 50.0, 0, &thresholds());
        assert_eq!(tier, Tier::Warm);
    }

    #[test]
    fn hot_promotes_to_ultra_hot_only_under_one_hour() {
        let tier = next_tier(Tier::Hot, Duration::minutes(40), 200.0, 0, &thresholds());
        assert_eq!(tier, Tier::UltraHot);

        let tier = next_tier(Tier::Hot, Duration::hours(3), 200.0, 0, &thresholds());
        assert_eq!(tier, Tier::Hot);
    }

    #[test]
    fn cold_never_gets_a_schedule() {
        let now = Utc::now();
        assert_eq!(schedule_next_update(Tier::Cold, now), None);
        assert_eq!(
            schedule_next_update(Tier::Warm, now),
            Some(now + Duration::minutes(60))
        );
    }

    #[test]
    fn custom_thresholds_gate_promotion() {
        let custom = TierThresholds {
            ultra_hot_per_hour: 1000.0,
            hot_per_hour: 10.0,
        };
        let tier = next_tier(Tier::Warm, Duration::hours(2), 15.0, 0, &custom);
        assert_eq!(tier, Tier::Hot);

        let tier = next_tier(Tier::Hot, Duration::minutes(10), 500.0, 0, &custom);
        assert_eq!(tier, Tier::Hot, "below the raised ultra_hot threshold");
    }
}
