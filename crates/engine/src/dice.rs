use std::fmt;
use std::str::FromStr;

use rand_chacha::ChaCha8Rng;
use rand_chacha::rand_core::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiceParseError {
    #[error("invalid dice notation: {0:?}")]
    InvalidNotation(String),
    #[error("die size must be positive: {0:?}")]
    ZeroSided(String),
}

/// `count` dice of `sides` faces, plus a flat `bonus`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dice {
    pub count: u32,
    pub sides: u32,
    pub bonus: i32,
}

impl Dice {
    pub const fn new(count: u32, sides: u32, bonus: i32) -> Self {
        Self { count, sides, bonus }
    }

    /// Total is clamped at zero so a large negative bonus never heals.
    pub fn roll(&self, rng: &mut ChaCha8Rng) -> i32 {
        let mut total = i64::from(self.bonus);
        for _ in 0..self.count {
            total += i64::from(roll_die(rng, self.sides));
        }
        total.max(0) as i32
    }

    pub fn expected(&self) -> f64 {
        f64::from(self.count) * (f64::from(self.sides) + 1.0) / 2.0 + f64::from(self.bonus)
    }

    pub fn max_roll(&self) -> i32 {
        (self.count * self.sides) as i32 + self.bonus
    }
}

impl fmt::Display for Dice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.bonus {
            0 => Ok(()),
            b if b > 0 => write!(f, "+{b}"),
            b => write!(f, "{b}"),
        }
    }
}

impl FromStr for Dice {
    type Err = DiceParseError;

    /// Accepts `"2d6+3"`, `"1d8-1"`, `"3d10"`, or a bare count like `"2"`
    /// which reads as that many d6.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some((count_part, rest)) = s.split_once(['d', 'D']) else {
            let count = s
                .parse::<u32>()
                .map_err(|_| DiceParseError::InvalidNotation(s.to_owned()))?;
            return Ok(Self::new(count, 6, 0));
        };
        let count = if count_part.is_empty() {
            1
        } else {
            count_part
                .parse::<u32>()
                .map_err(|_| DiceParseError::InvalidNotation(s.to_owned()))?
        };
        let (sides_part, bonus) = if let Some((sides, bonus)) = rest.split_once('+') {
            let bonus = bonus
                .parse::<i32>()
                .map_err(|_| DiceParseError::InvalidNotation(s.to_owned()))?;
            (sides, bonus)
        } else if let Some((sides, bonus)) = rest.split_once('-') {
            let bonus = bonus
                .parse::<i32>()
                .map_err(|_| DiceParseError::InvalidNotation(s.to_owned()))?;
            (sides, -bonus)
        } else {
            (rest, 0)
        };
        let sides = sides_part
            .parse::<u32>()
            .map_err(|_| DiceParseError::InvalidNotation(s.to_owned()))?;
        if sides == 0 {
            return Err(DiceParseError::ZeroSided(s.to_owned()));
        }
        Ok(Self::new(count, sides, bonus))
    }
}

/// Uniform in `1..=sides`. `sides == 0` rolls 1 rather than dividing by zero.
pub fn roll_die(rng: &mut ChaCha8Rng, sides: u32) -> i32 {
    if sides == 0 {
        return 1;
    }
    (rng.next_u32() % sides + 1) as i32
}

pub fn d20(rng: &mut ChaCha8Rng) -> i32 {
    roll_die(rng, 20)
}

/// An ability recharges on a d6 result of `threshold` or higher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RechargeRule {
    pub threshold: u32,
}

impl RechargeRule {
    pub fn roll(&self, rng: &mut ChaCha8Rng) -> bool {
        roll_die(rng, 6) as u32 >= self.threshold
    }
}
