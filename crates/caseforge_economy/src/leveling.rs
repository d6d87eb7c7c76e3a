//! # Leveling
//!
//! XP is earned per whole unit of currency spent. Levels follow a triangular
//! curve: going from level `L` to `L + 1` costs `base_level_xp * L` xp, so
//! the cumulative xp to reach level `L` is `base_level_xp * L * (L - 1) / 2`.
//!
//! Levels never go down.

use serde::{Deserialize, Serialize};

use crate::account::User;
use crate::fixed_point::FixedPoint;

/// Level every user starts at.
pub const FIRST_LEVEL: u32 = 1;

/// Hard ceiling on levels.
pub const MAX_LEVEL: u32 = 10_000;

/// XP/level progression parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelCurve {
    /// XP granted per whole currency unit spent.
    pub xp_per_coin: u64,
    /// XP needed to leave level 1; each later level costs this times the level.
    pub base_level_xp: u64,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self {
            xp_per_coin: 1,
            base_level_xp: 100,
        }
    }
}

impl LevelCurve {
    /// XP earned for spending `spent`. Fractions of a coin earn nothing.
    #[must_use]
    pub const fn xp_for_spend(&self, spent: FixedPoint) -> u64 {
        spent.whole().saturating_mul(self.xp_per_coin)
    }

    /// Cumulative xp needed to reach `level`.
    #[must_use]
    pub const fn xp_to_reach(&self, level: u32) -> u64 {
        if level <= FIRST_LEVEL {
            return 0;
        }
        let l = level as u64;
        self.base_level_xp.saturating_mul(l.saturating_mul(l - 1) / 2)
    }

    /// Highest level whose threshold `xp` meets.
    #[must_use]
    pub fn level_for_xp(&self, xp: u64) -> u32 {
        if self.base_level_xp == 0 {
            return FIRST_LEVEL;
        }
        // Thresholds only grow with level: binary search for the last one met.
        let (mut low, mut high) = (FIRST_LEVEL, MAX_LEVEL);
        while low < high {
            let mid = low + (high - low).div_ceil(2);
            if xp >= self.xp_to_reach(mid) {
                low = mid;
            } else {
                high = mid - 1;
            }
        }
        low
    }

    /// Credits xp for a purchase and recomputes the level in place.
    pub fn update_level(&self, user: &mut User, spent: FixedPoint) {
        user.xp = user.xp.saturating_add(self.xp_for_spend(spent));
        user.level = user.level.max(self.level_for_xp(user.xp));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        let curve = LevelCurve::default();
        assert_eq!(curve.xp_to_reach(1), 0);
        assert_eq!(curve.xp_to_reach(2), 100);
        assert_eq!(curve.xp_to_reach(3), 300);
        assert_eq!(curve.xp_to_reach(4), 600);
    }

    #[test]
    fn test_level_for_xp() {
        let curve = LevelCurve::default();
        assert_eq!(curve.level_for_xp(0), 1);
        assert_eq!(curve.level_for_xp(99), 1);
        assert_eq!(curve.level_for_xp(100), 2);
        assert_eq!(curve.level_for_xp(599), 3);
        assert_eq!(curve.level_for_xp(600), 4);
    }

    #[test]
    fn test_level_for_xp_lands_on_every_boundary() {
        let curve = LevelCurve {
            xp_per_coin: 1,
            base_level_xp: 7,
        };
        for level in [2, 3, 17, 999, 5_000, MAX_LEVEL - 1, MAX_LEVEL] {
            let threshold = curve.xp_to_reach(level);
            assert_eq!(curve.level_for_xp(threshold), level);
            assert_eq!(curve.level_for_xp(threshold - 1), level - 1);
        }
        assert_eq!(curve.level_for_xp(curve.xp_to_reach(MAX_LEVEL) * 2), MAX_LEVEL);
    }

    #[test]
    fn test_update_level_from_spend() {
        let curve = LevelCurve::default();
        let mut user = User::new("u1", "ana", FixedPoint::ZERO);

        curve.update_level(&mut user, FixedPoint::from_parts(150, 999_999));
        assert_eq!(user.xp, 150);
        assert_eq!(user.level, 2);

        curve.update_level(&mut user, FixedPoint::from_whole(150));
        assert_eq!(user.xp, 300);
        assert_eq!(user.level, 3);
    }

    #[test]
    fn test_level_never_drops() {
        let curve = LevelCurve::default();
        let mut user = User::new("u1", "ana", FixedPoint::ZERO);
        user.level = 9;
        curve.update_level(&mut user, FixedPoint::from_whole(1));
        assert_eq!(user.level, 9);
    }

    #[test]
    fn test_flat_curve_disables_leveling() {
        let curve = LevelCurve {
            xp_per_coin: 1,
            base_level_xp: 0,
        };
        assert_eq!(curve.level_for_xp(u64::MAX), FIRST_LEVEL);
    }

    #[test]
    fn test_huge_xp_stops_at_ceiling() {
        let curve = LevelCurve {
            xp_per_coin: 1,
            base_level_xp: 1,
        };
        assert_eq!(curve.level_for_xp(u64::MAX), MAX_LEVEL);
    }
}
