//! Environment module
//!
//! Time of day and day counter, advanced once per tick from the measured
//! delta independently of any entity.

use serde::Serialize;

/// Length of one in-game day
pub const DAY_LENGTH: f64 = 24_000.0;

/// Time of day when the world starts
pub const START_TIME: f64 = 6_000.0;

/// Time-of-day units per real second
pub const TIME_SCALE: f64 = 200.0;

const NIGHT_BRIGHTNESS: f64 = 0.3;

/// Day/night clock
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    time: f64,
    day: u32,
}

/// Environment snapshot for clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentState {
    pub time: f64,
    pub day: u32,
    pub brightness: f64,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            time: START_TIME,
            day: 1,
        }
    }
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    /// Advance by `delta_ms`; returns whether a new day began
    pub fn advance(&mut self, delta_ms: f64) -> bool {
        self.time += delta_ms * TIME_SCALE / 1000.0;
        let mut rolled = false;
        while self.time >= DAY_LENGTH {
            self.time -= DAY_LENGTH;
            self.day += 1;
            rolled = true;
        }
        rolled
    }

    /// Light level in [0.3, 1.0]
    pub fn brightness(&self) -> f64 {
        let t = self.time;
        let ramp = 1.0 - NIGHT_BRIGHTNESS;
        if t < 6_000.0 {
            NIGHT_BRIGHTNESS + t / 6_000.0 * ramp
        } else if t < 12_000.0 {
            1.0
        } else if t < 18_000.0 {
            1.0 - (t - 12_000.0) / 6_000.0 * ramp
        } else {
            NIGHT_BRIGHTNESS
        }
    }

    pub fn state(&self) -> EnvironmentState {
        EnvironmentState {
            time: self.time,
            day: self.day,
            brightness: self.brightness(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(time: f64) -> Environment {
        Environment { time, day: 1 }
    }

    #[test]
    fn test_starts_at_morning() {
        let env = Environment::new();
        assert_eq!(env.time(), 6_000.0);
        assert_eq!(env.day(), 1);
        assert_eq!(env.brightness(), 1.0);
    }

    #[test]
    fn test_advance_scales_with_delta() {
        let mut env = Environment::new();
        assert!(!env.advance(50.0));
        assert_eq!(env.time(), 6_010.0);
        env.advance(1_000.0);
        assert_eq!(env.time(), 6_210.0);
    }

    #[test]
    fn test_day_rollover() {
        let mut env = at(23_990.0);
        assert!(env.advance(100.0));
        assert_eq!(env.day(), 2);
        assert!((env.time() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_brightness_curve() {
        assert!((at(0.0).brightness() - 0.3).abs() < 1e-9);
        assert!((at(3_000.0).brightness() - 0.65).abs() < 1e-9);
        assert_eq!(at(9_000.0).brightness(), 1.0);
        assert!((at(15_000.0).brightness() - 0.65).abs() < 1e-9);
        assert!((at(18_000.0).brightness() - 0.3).abs() < 1e-9);
        assert!((at(23_000.0).brightness() - 0.3).abs() < 1e-9);
    }
}
