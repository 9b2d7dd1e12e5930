//! Damage rolls and hit point bookkeeping.

use crate::dice::DiceExpression;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rolled damage before it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRoll {
    pub rolls: Vec<u32>,
    pub modifier: i32,
    /// Never negative.
    pub total: i32,
    pub critical: bool,
}

impl fmt::Display for DamageRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:+} = {}", self.rolls, self.modifier, self.total)?;
        if self.critical {
            write!(f, " (critical)")?;
        }
        Ok(())
    }
}

/// Damage after it landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageResult {
    pub roll: DamageRoll,
    pub hp_before: i32,
    pub hp_after: i32,
    pub max_hp: i32,
    /// The hit took the target from above 0 to 0.
    pub defeated: bool,
}

/// Roll weapon damage.
///
/// A critical hit rolls the dice twice; the ability modifier and any flat
/// modifier written in the notation are added once. Unparseable notation
/// counts as a single 1.
pub fn roll_damage<R: Rng + ?Sized>(
    rng: &mut R,
    damage_dice: &str,
    ability_modifier: i32,
    is_crit: bool,
) -> DamageRoll {
    let (mut rolls, notation_modifier) = match DiceExpression::parse(damage_dice) {
        Ok(expr) => {
            let mut rolls = expr.roll_terms(rng);
            if is_crit {
                rolls.extend(expr.roll_terms(rng));
            }
            (rolls, expr.modifier)
        }
        Err(e) => {
            tracing::warn!(damage_dice, error = %e, "Malformed damage dice");
            (vec![1], 0)
        }
    };
    if rolls.is_empty() {
        rolls.push(1);
    }

    let modifier = notation_modifier + ability_modifier;
    let dice_sum: i32 = rolls.iter().map(|&r| r as i32).sum();
    DamageRoll {
        total: (dice_sum + modifier).max(0),
        rolls,
        modifier,
        critical: is_crit,
    }
}

/// Apply rolled damage to a hit point pool, clamping to `[0, max_hp]`.
pub fn apply_damage(current_hp: &mut i32, max_hp: i32, roll: DamageRoll) -> DamageResult {
    let hp_before = *current_hp;
    *current_hp = (hp_before - roll.total).clamp(0, max_hp);
    DamageResult {
        hp_before,
        hp_after: *current_hp,
        max_hp,
        defeated: hp_before > 0 && *current_hp == 0,
        roll,
    }
}

/// Restore hit points to a living combatant. Returns the amount healed.
pub fn apply_healing(current_hp: &mut i32, max_hp: i32, amount: i32) -> i32 {
    if *current_hp <= 0 || amount <= 0 {
        return 0;
    }
    let before = *current_hp;
    *current_hp = (before + amount).min(max_hp);
    *current_hp - before
}
