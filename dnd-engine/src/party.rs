//! Recruitable companions and the adventuring party.
//!
//! Companions come from a fixed roster; the narrator can only recruit an
//! id that exists here. Each class may carry one support ability that the
//! companion uses in combat when someone is badly hurt.

use crate::character::HitPoints;
use crate::items::normalize_id;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Errors from party management.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PartyError {
    #[error("Unknown companion: {0}")]
    UnknownCompanion(String),

    #[error("{0} is already in the party")]
    AlreadyRecruited(String),

    #[error("Party is full ({0} companions)")]
    PartyFull(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompanionClass {
    Fighter,
    Cleric,
    Paladin,
    Rogue,
    Ranger,
}

impl CompanionClass {
    /// The class support ability, if any.
    pub fn support_ability(&self) -> Option<SupportAbility> {
        match self {
            CompanionClass::Fighter => Some(SupportAbility::ShieldWall),
            CompanionClass::Cleric => Some(SupportAbility::HealingWord),
            CompanionClass::Paladin => Some(SupportAbility::LayOnHands),
            CompanionClass::Rogue | CompanionClass::Ranger => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompanionClass::Fighter => "Fighter",
            CompanionClass::Cleric => "Cleric",
            CompanionClass::Paladin => "Paladin",
            CompanionClass::Rogue => "Rogue",
            CompanionClass::Ranger => "Ranger",
        }
    }
}

/// A once-per-encounter ability used to protect or heal a wounded ally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SupportAbility {
    /// Attacks against the protected member roll with disadvantage until
    /// the user's next turn.
    ShieldWall,
    /// Heals `1d4+3`.
    HealingWord,
    /// Heals a flat 10.
    LayOnHands,
}

impl SupportAbility {
    pub fn name(&self) -> &'static str {
        match self {
            SupportAbility::ShieldWall => "Shield Wall",
            SupportAbility::HealingWord => "Healing Word",
            SupportAbility::LayOnHands => "Lay on Hands",
        }
    }

    pub const HEALING_WORD_DICE: &'static str = "1d4+3";
    pub const LAY_ON_HANDS_AMOUNT: i32 = 10;
}

impl fmt::Display for SupportAbility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A recruitable companion's stat block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompanionDef {
    pub id: &'static str,
    pub name: &'static str,
    pub class: CompanionClass,
    pub max_hp: i32,
    pub armor_class: i32,
    pub dex_modifier: i32,
    pub attack_bonus: i32,
    pub damage_dice: &'static str,
}

const COMPANIONS: &[CompanionDef] = &[
    CompanionDef {
        id: "brom",
        name: "Brom Ironshield",
        class: CompanionClass::Fighter,
        max_hp: 24,
        armor_class: 17,
        dex_modifier: 0,
        attack_bonus: 5,
        damage_dice: "1d8+3",
    },
    CompanionDef {
        id: "sister_mira",
        name: "Sister Mira",
        class: CompanionClass::Cleric,
        max_hp: 18,
        armor_class: 16,
        dex_modifier: 0,
        attack_bonus: 4,
        damage_dice: "1d6+2",
    },
    CompanionDef {
        id: "sir_aldric",
        name: "Sir Aldric",
        class: CompanionClass::Paladin,
        max_hp: 22,
        armor_class: 18,
        dex_modifier: -1,
        attack_bonus: 5,
        damage_dice: "1d8+3",
    },
    CompanionDef {
        id: "vex",
        name: "Vex",
        class: CompanionClass::Rogue,
        max_hp: 16,
        armor_class: 14,
        dex_modifier: 3,
        attack_bonus: 5,
        damage_dice: "1d6+3",
    },
    CompanionDef {
        id: "lyra",
        name: "Lyra Swiftarrow",
        class: CompanionClass::Ranger,
        max_hp: 19,
        armor_class: 15,
        dex_modifier: 3,
        attack_bonus: 5,
        damage_dice: "1d8+3",
    },
];

lazy_static! {
    static ref COMPANION_REGISTRY: HashMap<&'static str, &'static CompanionDef> =
        COMPANIONS.iter().map(|c| (c.id, c)).collect();
}

/// Look up a recruitable companion by id or display name.
pub fn get_companion(name: &str) -> Option<&'static CompanionDef> {
    let key = normalize_id(name);
    COMPANION_REGISTRY
        .get(key.as_str())
        .copied()
        .or_else(|| COMPANIONS.iter().find(|c| normalize_id(c.name) == key))
}

pub fn all_companions() -> &'static [CompanionDef] {
    COMPANIONS
}

/// A companion travelling with the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyMember {
    pub id: String,
    pub name: String,
    pub class: CompanionClass,
    pub hit_points: HitPoints,
    pub armor_class: i32,
    pub dex_modifier: i32,
    pub attack_bonus: i32,
    pub damage_dice: String,
}

impl PartyMember {
    fn from_def(def: &CompanionDef) -> Self {
        Self {
            id: def.id.to_string(),
            name: def.name.to_string(),
            class: def.class,
            hit_points: HitPoints::new(def.max_hp),
            armor_class: def.armor_class,
            dex_modifier: def.dex_modifier,
            attack_bonus: def.attack_bonus,
            damage_dice: def.damage_dice.to_string(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hit_points.current > 0
    }
}

/// Recruited companions, in recruitment order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub members: Vec<PartyMember>,
}

impl Party {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recruit a companion from the roster.
    pub fn recruit(&mut self, id: &str, max_size: usize) -> Result<&PartyMember, PartyError> {
        let def = get_companion(id).ok_or_else(|| PartyError::UnknownCompanion(id.to_string()))?;
        if self.members.iter().any(|m| m.id == def.id) {
            return Err(PartyError::AlreadyRecruited(def.name.to_string()));
        }
        if self.members.len() >= max_size {
            return Err(PartyError::PartyFull(max_size));
        }

        self.members.push(PartyMember::from_def(def));
        tracing::info!(companion = def.id, class = def.class.name(), "Companion recruited");
        let idx = self.members.len() - 1;
        Ok(&self.members[idx])
    }

    pub fn get(&self, id: &str) -> Option<&PartyMember> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut PartyMember> {
        self.members.iter_mut().find(|m| m.id == id)
    }

    /// Members that can still fight.
    pub fn living_members(&self) -> impl Iterator<Item = &PartyMember> {
        self.members.iter().filter(|m| m.is_alive())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Write a member's HP back after combat.
    pub fn set_hp(&mut self, id: &str, hp: i32) {
        if let Some(member) = self.get_mut(id) {
            member.hit_points.set_current(hp);
        }
    }
}
