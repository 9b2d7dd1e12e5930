//! D&D dice rolling system.
//!
//! Supports standard dice notation (`XdY+Z`), several dice terms in one
//! expression, keep highest/lowest, and advantage/disadvantage on d20s.
//!
//! Notation frequently arrives from narrator text, so [`roll_dice`] never
//! fails: anything that does not parse rolls as a single `1`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Most dice a single expression may roll.
pub const MAX_DICE: u32 = 100;

/// Largest die accepted.
pub const MAX_SIDES: u32 = 1000;

/// Largest flat modifier accepted, in either direction.
pub const MAX_MODIFIER: i32 = 10_000;

/// Error type for dice parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("Too many dice: {0} (max {MAX_DICE})")]
    TooManyDice(u32),
    #[error("No dice specified")]
    NoDice,
    #[error("Cannot keep {keep} dice when only rolling {count} (in {notation})")]
    InvalidKeepCount {
        keep: u32,
        count: u32,
        notation: String,
    },
}

/// Advantage state for d20 rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl Advantage {
    /// Combine two advantage states (advantage + disadvantage = normal).
    pub fn combine(self, other: Advantage) -> Advantage {
        match (self, other) {
            (Advantage::Normal, x) | (x, Advantage::Normal) => x,
            (Advantage::Advantage, Advantage::Disadvantage) => Advantage::Normal,
            (Advantage::Disadvantage, Advantage::Advantage) => Advantage::Normal,
            (Advantage::Advantage, Advantage::Advantage) => Advantage::Advantage,
            (Advantage::Disadvantage, Advantage::Disadvantage) => Advantage::Disadvantage,
        }
    }

    /// Resolve from whether any source grants advantage and whether any
    /// source imposes disadvantage. Both at once cancel to a normal roll
    /// no matter how many sources of each apply.
    pub fn from_sources(advantage: bool, disadvantage: bool) -> Advantage {
        match (advantage, disadvantage) {
            (true, false) => Advantage::Advantage,
            (false, true) => Advantage::Disadvantage,
            _ => Advantage::Normal,
        }
    }
}

/// A single dice term of an expression, e.g. the `4d6kh3` in `4d6kh3+2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceComponent {
    pub count: u32,
    pub sides: u32,
    pub keep_highest: Option<u32>,
    pub keep_lowest: Option<u32>,
}

impl DiceComponent {
    fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<u32> {
        let mut rolls: Vec<u32> = (0..self.count)
            .map(|_| rng.gen_range(1..=self.sides))
            .collect();

        if let Some(keep) = self.keep_highest {
            rolls.sort_by(|a, b| b.cmp(a));
            rolls.truncate(keep as usize);
        } else if let Some(keep) = self.keep_lowest {
            rolls.sort();
            rolls.truncate(keep as usize);
        }
        rolls
    }
}

/// A complete dice expression (e.g., 2d6+3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub components: Vec<DiceComponent>,
    pub modifier: i32,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation = notation.trim().to_lowercase();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut components = Vec::new();
        let mut modifier: i32 = 0;
        let mut current = String::new();
        let mut sign: i32 = 1;
        let mut seen_term = false;

        for ch in notation.chars() {
            match ch {
                '+' | '-' => {
                    if current.is_empty() {
                        // A sign may only lead the expression, never follow another sign.
                        if seen_term {
                            return Err(DiceError::InvalidNotation(notation.clone()));
                        }
                    } else {
                        Self::parse_component(&current, sign, &mut components, &mut modifier)?;
                        current.clear();
                    }
                    seen_term = true;
                    sign = if ch == '+' { 1 } else { -1 };
                }
                ' ' => continue,
                _ => current.push(ch),
            }
        }

        if current.is_empty() {
            // Trailing sign, e.g. "1d20+"
            return Err(DiceError::InvalidNotation(notation));
        }
        Self::parse_component(&current, sign, &mut components, &mut modifier)?;

        if components.is_empty() {
            return Err(DiceError::NoDice);
        }

        let total_dice: u32 = components.iter().map(|c| c.count).sum();
        if total_dice > MAX_DICE {
            return Err(DiceError::TooManyDice(total_dice));
        }

        Ok(DiceExpression {
            components,
            modifier,
            original: notation,
        })
    }

    fn parse_component(
        s: &str,
        sign: i32,
        components: &mut Vec<DiceComponent>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        let invalid = || DiceError::InvalidNotation(s.to_string());

        if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }

        if let Some(d_pos) = s.find('d') {
            // Dice are never subtracted.
            if sign < 0 {
                return Err(invalid());
            }

            let count_str = &s[..d_pos];
            let rest = &s[d_pos + 1..];

            let count: u32 = if count_str.is_empty() {
                1
            } else {
                count_str.parse().map_err(|_| invalid())?
            };
            if count == 0 {
                return Err(invalid());
            }
            if count > MAX_DICE {
                return Err(DiceError::TooManyDice(count));
            }

            let (sides_str, keep_highest, keep_lowest) = if let Some(kh_pos) = rest.find("kh") {
                let keep: u32 = rest[kh_pos + 2..].parse().map_err(|_| invalid())?;
                (&rest[..kh_pos], Some(keep), None)
            } else if let Some(kl_pos) = rest.find("kl") {
                let keep: u32 = rest[kl_pos + 2..].parse().map_err(|_| invalid())?;
                (&rest[..kl_pos], None, Some(keep))
            } else {
                (rest, None, None)
            };

            let sides: u32 = sides_str.parse().map_err(|_| invalid())?;
            if sides == 0 || sides > MAX_SIDES {
                return Err(DiceError::InvalidDieSize(sides));
            }

            if let Some(keep) = keep_highest.or(keep_lowest) {
                if keep == 0 || keep > count {
                    return Err(DiceError::InvalidKeepCount {
                        keep,
                        count,
                        notation: s.to_string(),
                    });
                }
            }

            components.push(DiceComponent {
                count,
                sides,
                keep_highest,
                keep_lowest,
            });
        } else {
            let value: i32 = s.parse().map_err(|_| invalid())?;
            let updated = modifier
                .checked_add(sign * value)
                .filter(|m| m.abs() <= MAX_MODIFIER)
                .ok_or_else(invalid)?;
            *modifier = updated;
        }

        Ok(())
    }

    /// Roll every dice term, returning the kept dice in term order.
    /// The flat modifier is not included.
    pub fn roll_terms<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<u32> {
        self.components.iter().flat_map(|c| c.roll(rng)).collect()
    }

    /// Roll the dice expression and return the result.
    pub fn roll(&self) -> DiceRoll {
        self.roll_with_rng(&mut rand::thread_rng())
    }

    /// Roll with a specific RNG (useful for testing).
    pub fn roll_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> DiceRoll {
        DiceRoll::new(self.roll_terms(rng), self.modifier)
    }

    /// Largest value the dice terms can produce, modifier excluded.
    pub fn max_dice_total(&self) -> u32 {
        self.components
            .iter()
            .map(|c| {
                let kept = c.keep_highest.or(c.keep_lowest).unwrap_or(c.count);
                kept * c.sides
            })
            .sum()
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Outcome of rolling a dice expression.
///
/// `rolls` holds the dice that count towards the total, so
/// `total == rolls.sum() + modifier` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    pub total: i32,
    pub rolls: Vec<u32>,
    pub modifier: i32,
}

impl DiceRoll {
    fn new(rolls: Vec<u32>, modifier: i32) -> Self {
        let dice_total: i32 = rolls.iter().map(|&r| r as i32).sum();
        Self {
            total: dice_total + modifier,
            rolls,
            modifier,
        }
    }

    /// The result used when notation cannot be parsed.
    pub fn fallback() -> Self {
        Self {
            total: 1,
            rolls: vec![1],
            modifier: 0,
        }
    }

    /// Sum of the dice, modifier excluded.
    pub fn dice_total(&self) -> i32 {
        self.total - self.modifier
    }

    /// Check if the roll meets or exceeds a DC.
    pub fn meets_dc(&self, dc: i32) -> bool {
        self.total >= dc
    }
}

impl fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dice = self
            .rolls
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        match self.modifier {
            0 => write!(f, "[{}] = {}", dice, self.total),
            m if m > 0 => write!(f, "[{}] + {} = {}", dice, m, self.total),
            m => write!(f, "[{}] - {} = {}", dice, m.abs(), self.total),
        }
    }
}

/// A d20 roll, possibly made with advantage or disadvantage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct D20Roll {
    /// Every d20 thrown (two under advantage/disadvantage).
    pub rolls: Vec<u32>,
    /// The die that counts.
    pub kept: u32,
    pub advantage: Advantage,
}

impl D20Roll {
    /// Build a roll from dice that were already thrown.
    pub fn from_rolls(rolls: Vec<u32>, advantage: Advantage) -> Self {
        let kept = match advantage {
            Advantage::Advantage => rolls.iter().copied().max(),
            Advantage::Disadvantage => rolls.iter().copied().min(),
            Advantage::Normal => rolls.first().copied(),
        }
        .unwrap_or(1);
        Self {
            rolls,
            kept,
            advantage,
        }
    }

    pub fn is_natural_20(&self) -> bool {
        self.kept == 20
    }

    pub fn is_natural_1(&self) -> bool {
        self.kept == 1
    }
}

/// Roll a d20, rolling twice under advantage or disadvantage.
pub fn roll_d20<R: Rng + ?Sized>(rng: &mut R, advantage: Advantage) -> D20Roll {
    let rolls = match advantage {
        Advantage::Normal => vec![rng.gen_range(1..=20u32)],
        Advantage::Advantage | Advantage::Disadvantage => {
            vec![rng.gen_range(1..=20u32), rng.gen_range(1..=20u32)]
        }
    };
    D20Roll::from_rolls(rolls, advantage)
}

/// Roll dice from a notation string. Malformed notation rolls a single 1.
pub fn roll_dice(notation: &str) -> DiceRoll {
    roll_dice_with(&mut rand::thread_rng(), notation)
}

/// Roll dice from a notation string with a specific RNG.
pub fn roll_dice_with<R: Rng + ?Sized>(rng: &mut R, notation: &str) -> DiceRoll {
    match DiceExpression::parse(notation) {
        Ok(expr) => expr.roll_with_rng(rng),
        Err(e) => {
            tracing::warn!(notation, error = %e, "Falling back on malformed dice notation");
            DiceRoll::fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_parse_simple() {
        let expr = DiceExpression::parse("1d20").unwrap();
        assert_eq!(expr.components.len(), 1);
        assert_eq!(expr.components[0].count, 1);
        assert_eq!(expr.components[0].sides, 20);
        assert_eq!(expr.modifier, 0);
    }

    #[test]
    fn test_parse_count_defaults_to_one() {
        let expr = DiceExpression::parse("d8").unwrap();
        assert_eq!(expr.components[0].count, 1);
        assert_eq!(expr.components[0].sides, 8);
    }

    #[test]
    fn test_parse_with_modifier() {
        let expr = DiceExpression::parse("1d20+5").unwrap();
        assert_eq!(expr.modifier, 5);

        let expr = DiceExpression::parse("2d6-2").unwrap();
        assert_eq!(expr.modifier, -2);

        let expr = DiceExpression::parse(" 2D6 + 3 ").unwrap();
        assert_eq!(expr.modifier, 3);
    }

    #[test]
    fn test_parse_multiple_dice() {
        let expr = DiceExpression::parse("2d6+1d4+3").unwrap();
        assert_eq!(expr.components.len(), 2);
        assert_eq!(expr.modifier, 3);
    }

    #[test]
    fn test_parse_keep_highest() {
        let expr = DiceExpression::parse("4d6kh3").unwrap();
        assert_eq!(expr.components[0].count, 4);
        assert_eq!(expr.components[0].keep_highest, Some(3));
    }

    #[test]
    fn test_invalid_keep_count() {
        let result = DiceExpression::parse("4d6kh5");
        assert!(matches!(
            result.unwrap_err(),
            DiceError::InvalidKeepCount {
                keep: 5,
                count: 4,
                ..
            }
        ));

        assert!(DiceExpression::parse("2d20kl3").is_err());
        assert!(DiceExpression::parse("4d6kh4").is_ok());
    }

    #[test]
    fn test_rejects_malformed_notation() {
        for bad in [
            "", "banana", "d", "1d", "0d6", "2d0", "1d20+", "1d20++3", "-1d4", "1d6*2",
            "1d6; rm -rf /", "5", "101d6", "1d1001", "1d6+99999999999",
        ] {
            assert!(DiceExpression::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_banana_falls_back() {
        let roll = roll_dice("banana");
        assert_eq!(
            roll,
            DiceRoll {
                total: 1,
                rolls: vec![1],
                modifier: 0
            }
        );
    }

    #[test]
    fn test_roll_range() {
        for _ in 0..1000 {
            let result = roll_dice("1d20");
            assert!(result.total >= 1 && result.total <= 20);
        }
    }

    #[test]
    fn test_roll_with_modifier() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let result = roll_dice_with(&mut rng, "3d6-2");
            assert_eq!(result.rolls.len(), 3);
            assert_eq!(result.modifier, -2);
            let sum: u32 = result.rolls.iter().sum();
            assert!((3..=18).contains(&sum));
            assert_eq!(result.total, sum as i32 - 2);
        }
    }

    #[test]
    fn test_keep_highest_reports_kept_dice() {
        let mut rng = StdRng::seed_from_u64(11);
        let roll = roll_dice_with(&mut rng, "4d6kh3");
        assert_eq!(roll.rolls.len(), 3);
        assert_eq!(roll.total, roll.rolls.iter().sum::<u32>() as i32);
    }

    #[test]
    fn test_d20_advantage_keeps_higher() {
        let roll = D20Roll::from_rolls(vec![4, 17], Advantage::Advantage);
        assert_eq!(roll.kept, 17);
        let roll = D20Roll::from_rolls(vec![4, 17], Advantage::Disadvantage);
        assert_eq!(roll.kept, 4);
        let roll = D20Roll::from_rolls(vec![20, 1], Advantage::Disadvantage);
        assert!(roll.is_natural_1());
        assert!(!roll.is_natural_20());
    }

    #[test]
    fn test_roll_d20_dice_count() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(roll_d20(&mut rng, Advantage::Normal).rolls.len(), 1);
        assert_eq!(roll_d20(&mut rng, Advantage::Advantage).rolls.len(), 2);
        assert_eq!(roll_d20(&mut rng, Advantage::Disadvantage).rolls.len(), 2);
    }

    #[test]
    fn test_advantage_combine() {
        assert_eq!(
            Advantage::Normal.combine(Advantage::Advantage),
            Advantage::Advantage
        );
        assert_eq!(
            Advantage::Advantage.combine(Advantage::Disadvantage),
            Advantage::Normal
        );
        assert_eq!(
            Advantage::Advantage.combine(Advantage::Advantage),
            Advantage::Advantage
        );
    }

    #[test]
    fn test_advantage_from_sources_cancels() {
        assert_eq!(Advantage::from_sources(true, true), Advantage::Normal);
        assert_eq!(Advantage::from_sources(true, false), Advantage::Advantage);
        assert_eq!(Advantage::from_sources(false, true), Advantage::Disadvantage);
        assert_eq!(Advantage::from_sources(false, false), Advantage::Normal);
    }

    #[test]
    fn test_roll_display() {
        let roll = DiceRoll {
            total: 9,
            rolls: vec![3, 4],
            modifier: 2,
        };
        assert_eq!(roll.to_string(), "[3, 4] + 2 = 9");
    }
}
