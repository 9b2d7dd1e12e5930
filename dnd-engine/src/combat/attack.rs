//! Attack rolls.

use crate::character::{Ability, Character};
use crate::dice::{roll_d20, Advantage, D20Roll};
use crate::items::ItemDef;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The outcome of one attack roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackResult {
    /// The d20 that counted.
    pub d20_roll: u32,
    /// Every d20 thrown.
    pub rolls: Vec<u32>,
    pub attack_bonus: i32,
    pub total: i32,
    pub target_ac: i32,
    pub hit: bool,
    /// Natural 20: always hits, damage dice are doubled.
    pub is_crit: bool,
    /// Natural 1: always misses.
    pub is_fumble: bool,
    pub advantage: Advantage,
}

impl AttackResult {
    /// Judge a d20 that has already been rolled.
    pub fn resolve(d20: D20Roll, attack_bonus: i32, target_ac: i32) -> Self {
        let is_crit = d20.is_natural_20();
        let is_fumble = d20.is_natural_1();
        let total = d20.kept as i32 + attack_bonus;
        let hit = if is_crit {
            true
        } else if is_fumble {
            false
        } else {
            total >= target_ac
        };

        Self {
            d20_roll: d20.kept,
            rolls: d20.rolls,
            attack_bonus,
            total,
            target_ac,
            hit,
            is_crit,
            is_fumble,
            advantage: d20.advantage,
        }
    }
}

impl fmt::Display for AttackResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = if self.is_crit {
            "CRITICAL HIT"
        } else if self.is_fumble {
            "natural 1, miss"
        } else if self.hit {
            "hit"
        } else {
            "miss"
        };
        let dice = match self.advantage {
            Advantage::Normal => format!("{}", self.d20_roll),
            Advantage::Advantage => format!("{} (advantage {:?})", self.d20_roll, self.rolls),
            Advantage::Disadvantage => {
                format!("{} (disadvantage {:?})", self.d20_roll, self.rolls)
            }
        };
        write!(
            f,
            "{} {:+} = {} vs AC {}: {}",
            dice, self.attack_bonus, self.total, self.target_ac, outcome
        )
    }
}

/// Circumstances that grant advantage or impose disadvantage on an attack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttackConditions {
    /// Fighting in darkness without a torch or lantern.
    pub unlit_darkness: bool,
    /// The attacker's side won surprise and this is the first round.
    pub surprise: bool,
    /// At least two party members are on the target.
    pub flanking: bool,
    /// The target took the defend action.
    pub target_defending: bool,
    /// The target is behind a companion's shield wall.
    pub target_protected: bool,
}

impl AttackConditions {
    /// Any advantage and any disadvantage cancel out.
    pub fn advantage(&self) -> Advantage {
        let advantage = self.surprise || self.flanking;
        let disadvantage = self.unlit_darkness || self.target_defending || self.target_protected;
        Advantage::from_sources(advantage, disadvantage)
    }
}

/// Modifier a character adds to attack and damage with this weapon:
/// DEX for finesse or ranged weapons, STR otherwise.
pub fn attack_ability_modifier(attacker: &Character, weapon: &ItemDef) -> i32 {
    let uses_dex = weapon.weapon.map(|w| w.uses_dexterity()).unwrap_or(false);
    if uses_dex {
        attacker.modifier(Ability::Dexterity)
    } else {
        attacker.modifier(Ability::Strength)
    }
}

/// Proficiency bonus plus the weapon's ability modifier.
pub fn attack_bonus(attacker: &Character, weapon: &ItemDef) -> i32 {
    attacker.proficiency_bonus() + attack_ability_modifier(attacker, weapon)
}

/// Roll a character's attack with a weapon against an armor class.
pub fn roll_attack<R: Rng + ?Sized>(
    rng: &mut R,
    attacker: &Character,
    target_ac: i32,
    weapon: &ItemDef,
    advantage: Advantage,
) -> AttackResult {
    roll_attack_with_bonus(rng, attack_bonus(attacker, weapon), target_ac, advantage)
}

/// Roll an attack with a known bonus (companions and monsters).
pub fn roll_attack_with_bonus<R: Rng + ?Sized>(
    rng: &mut R,
    attack_bonus: i32,
    target_ac: i32,
    advantage: Advantage,
) -> AttackResult {
    AttackResult::resolve(roll_d20(rng, advantage), attack_bonus, target_ac)
}
