//! Player character record.
//!
//! Holds the character-sheet fields combat reads and writes: hit points,
//! armor class, ability scores, proficiency, equipped weapon, experience,
//! and the inventory with its gold ledger. Combat changes HP only through
//! [`Character::take_damage`] / [`Character::heal`] or by writing back an
//! encounter's final HP; it never touches abilities or equipment.

use crate::items::{self, normalize_id, ItemDef, ItemType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// XP needed to reach each level, 1 through 20.
const XP_THRESHOLDS: [u32; 20] = [
    0, 300, 900, 2700, 6500, 14000, 23000, 34000, 48000, 64000, 85000, 100000, 120000, 140000,
    165000, 195000, 225000, 265000, 305000, 355000,
];

/// Errors from inventory and gold operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("Insufficient gold: need {needed} gp, have {available} gp")]
    InsufficientGold { needed: u32, available: u32 },

    #[error("Item not found: {0}")]
    ItemNotFound(String),
}

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

impl AbilityScores {
    pub fn new(str: u8, dex: u8, con: u8, int: u8, wis: u8, cha: u8) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn get(&self, ability: Ability) -> u8 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    /// Standard 5e modifier, rounding down for odd scores below 10.
    pub fn modifier(&self, ability: Ability) -> i32 {
        (self.get(ability) as i32 - 10).div_euclid(2)
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Skills
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Skill {
    Athletics,
    Acrobatics,
    SleightOfHand,
    Stealth,
    Arcana,
    History,
    Investigation,
    Nature,
    Religion,
    AnimalHandling,
    Insight,
    Medicine,
    Perception,
    Survival,
    Deception,
    Intimidation,
    Performance,
    Persuasion,
}

impl Skill {
    pub fn ability(&self) -> Ability {
        match self {
            Skill::Athletics => Ability::Strength,
            Skill::Acrobatics | Skill::SleightOfHand | Skill::Stealth => Ability::Dexterity,
            Skill::Arcana
            | Skill::History
            | Skill::Investigation
            | Skill::Nature
            | Skill::Religion => Ability::Intelligence,
            Skill::AnimalHandling
            | Skill::Insight
            | Skill::Medicine
            | Skill::Perception
            | Skill::Survival => Ability::Wisdom,
            Skill::Deception | Skill::Intimidation | Skill::Performance | Skill::Persuasion => {
                Ability::Charisma
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Skill::Athletics => "Athletics",
            Skill::Acrobatics => "Acrobatics",
            Skill::SleightOfHand => "Sleight of Hand",
            Skill::Stealth => "Stealth",
            Skill::Arcana => "Arcana",
            Skill::History => "History",
            Skill::Investigation => "Investigation",
            Skill::Nature => "Nature",
            Skill::Religion => "Religion",
            Skill::AnimalHandling => "Animal Handling",
            Skill::Insight => "Insight",
            Skill::Medicine => "Medicine",
            Skill::Perception => "Perception",
            Skill::Survival => "Survival",
            Skill::Deception => "Deception",
            Skill::Intimidation => "Intimidation",
            Skill::Performance => "Performance",
            Skill::Persuasion => "Persuasion",
        }
    }

    /// Parse a skill from free text ("sleight of hand", "Sleight_Of_Hand").
    pub fn parse(s: &str) -> Option<Skill> {
        match normalize_id(s).replace('_', "").as_str() {
            "athletics" => Some(Skill::Athletics),
            "acrobatics" => Some(Skill::Acrobatics),
            "sleightofhand" => Some(Skill::SleightOfHand),
            "stealth" => Some(Skill::Stealth),
            "arcana" => Some(Skill::Arcana),
            "history" => Some(Skill::History),
            "investigation" => Some(Skill::Investigation),
            "nature" => Some(Skill::Nature),
            "religion" => Some(Skill::Religion),
            "animalhandling" => Some(Skill::AnimalHandling),
            "insight" => Some(Skill::Insight),
            "medicine" => Some(Skill::Medicine),
            "perception" => Some(Skill::Perception),
            "survival" => Some(Skill::Survival),
            "deception" => Some(Skill::Deception),
            "intimidation" => Some(Skill::Intimidation),
            "performance" => Some(Skill::Performance),
            "persuasion" => Some(Skill::Persuasion),
            _ => None,
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Hit Points
// ============================================================================

/// Hit points, always within `[0, maximum]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub maximum: i32,
}

/// What a call to [`HitPoints::take_damage`] actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpChange {
    pub applied: i32,
    pub dropped_to_zero: bool,
}

impl HitPoints {
    pub fn new(maximum: i32) -> Self {
        let maximum = maximum.max(1);
        Self {
            current: maximum,
            maximum,
        }
    }

    /// Subtract damage, stopping at 0. Non-positive amounts change nothing.
    pub fn take_damage(&mut self, amount: i32) -> HpChange {
        if amount <= 0 {
            return HpChange {
                applied: 0,
                dropped_to_zero: false,
            };
        }
        let before = self.current;
        self.current = (self.current - amount).clamp(0, self.maximum);
        HpChange {
            applied: before - self.current,
            dropped_to_zero: before > 0 && self.current == 0,
        }
    }

    /// Restore hit points up to the maximum. Returns the amount healed.
    pub fn heal(&mut self, amount: i32) -> i32 {
        if amount <= 0 {
            return 0;
        }
        let before = self.current;
        self.current = (self.current.saturating_add(amount)).min(self.maximum);
        self.current - before
    }

    /// Overwrite the current value, clamped into range.
    pub fn set_current(&mut self, hp: i32) {
        self.current = hp.clamp(0, self.maximum);
    }

    pub fn is_unconscious(&self) -> bool {
        self.current <= 0
    }

    pub fn ratio(&self) -> f32 {
        (self.current as f32 / self.maximum as f32).max(0.0)
    }
}

// ============================================================================
// Inventory
// ============================================================================

/// An item held in an inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    pub item_type: ItemType,
}

/// Character inventory and gold ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub items: Vec<Item>,
    pub gold: u32,
}

impl Inventory {
    /// Add catalogue items. Stackable types merge with an existing entry;
    /// weapons and armor are added as separate entries.
    pub fn add_item(&mut self, def: &ItemDef, quantity: u32) {
        if quantity == 0 {
            return;
        }
        if def.item_type.is_stackable() {
            if let Some(existing) = self.items.iter_mut().find(|i| i.id == def.id) {
                existing.quantity = existing.quantity.saturating_add(quantity);
                return;
            }
            self.items.push(Item {
                id: def.id.to_string(),
                name: def.name.to_string(),
                quantity,
                item_type: def.item_type,
            });
        } else {
            for _ in 0..quantity {
                self.items.push(Item {
                    id: def.id.to_string(),
                    name: def.name.to_string(),
                    quantity: 1,
                    item_type: def.item_type,
                });
            }
        }
    }

    /// Remove items by id or name. Returns true if successful.
    pub fn remove_item(&mut self, name: &str, quantity: u32) -> bool {
        let key = normalize_id(name);
        let Some(idx) = self
            .items
            .iter()
            .position(|i| i.id == key || normalize_id(&i.name) == key)
        else {
            return false;
        };
        if self.items[idx].quantity < quantity {
            return false;
        }
        self.items[idx].quantity -= quantity;
        if self.items[idx].quantity == 0 {
            self.items.remove(idx);
        }
        true
    }

    /// Find an item by id or name.
    pub fn find_item(&self, name: &str) -> Option<&Item> {
        let key = normalize_id(name);
        self.items
            .iter()
            .find(|i| i.id == key || normalize_id(&i.name) == key)
    }

    pub fn has_item(&self, name: &str) -> bool {
        self.find_item(name).is_some()
    }

    /// Total count of an item across stacks and separate entries.
    pub fn count(&self, id: &str) -> u32 {
        let key = normalize_id(id);
        self.items
            .iter()
            .filter(|i| i.id == key)
            .map(|i| i.quantity)
            .sum()
    }

    /// Carrying a torch or lantern.
    pub fn has_light_source(&self) -> bool {
        self.items
            .iter()
            .any(|i| i.item_type == ItemType::LightSource)
    }

    /// Add gold. Returns the new total.
    pub fn add_gold(&mut self, amount: u32) -> u32 {
        self.gold = self.gold.saturating_add(amount);
        self.gold
    }

    /// Spend gold. Returns the new total, or an error without spending
    /// anything if funds are insufficient.
    pub fn spend_gold(&mut self, amount: u32) -> Result<u32, InventoryError> {
        if amount > self.gold {
            return Err(InventoryError::InsufficientGold {
                needed: amount,
                available: self.gold,
            });
        }
        self.gold -= amount;
        Ok(self.gold)
    }
}

// ============================================================================
// Character
// ============================================================================

/// Result of [`Character::gain_xp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpGain {
    pub amount: u32,
    pub new_total: u32,
    pub leveled_up: bool,
    pub new_level: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub level: u8,
    pub experience: u32,
    pub ability_scores: AbilityScores,
    pub hit_points: HitPoints,
    pub armor_class: i32,
    /// Catalogue id of the wielded weapon; unknown ids fight unarmed.
    pub equipped_weapon: String,
    pub skill_proficiencies: HashSet<Skill>,
    pub inventory: Inventory,
}

impl Character {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: 1,
            experience: 0,
            ability_scores: AbilityScores::default(),
            hit_points: HitPoints::new(10),
            armor_class: 10,
            equipped_weapon: UNARMED_ID.to_string(),
            skill_proficiencies: HashSet::new(),
            inventory: Inventory {
                items: Vec::new(),
                gold: 15,
            },
        }
    }

    pub fn proficiency_bonus(&self) -> i32 {
        match self.level {
            0..=4 => 2,
            5..=8 => 3,
            9..=12 => 4,
            13..=16 => 5,
            _ => 6,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        self.ability_scores.modifier(ability)
    }

    pub fn initiative_modifier(&self) -> i32 {
        self.modifier(Ability::Dexterity)
    }

    pub fn skill_modifier(&self, skill: Skill) -> i32 {
        let proficiency = if self.skill_proficiencies.contains(&skill) {
            self.proficiency_bonus()
        } else {
            0
        };
        self.modifier(skill.ability()) + proficiency
    }

    /// The equipped weapon's catalogue entry, or an unarmed strike.
    pub fn weapon(&self) -> &'static ItemDef {
        items::get_weapon(&self.equipped_weapon).unwrap_or(&items::UNARMED_STRIKE)
    }

    pub fn is_conscious(&self) -> bool {
        self.hit_points.current > 0
    }

    /// Apply damage and describe the result. Non-positive amounts are ignored.
    pub fn take_damage(&mut self, amount: i32) -> String {
        if amount <= 0 {
            return format!("{} takes no damage", self.name);
        }
        let change = self.hit_points.take_damage(amount);
        let hp = &self.hit_points;
        let status = if change.dropped_to_zero || hp.current == 0 {
            format!("HP: 0/{} - UNCONSCIOUS", hp.maximum)
        } else if hp.current <= hp.maximum / 4 {
            format!("HP: {}/{} - critically wounded", hp.current, hp.maximum)
        } else if hp.current <= hp.maximum / 2 {
            format!("HP: {}/{} - bloodied", hp.current, hp.maximum)
        } else {
            format!("HP: {}/{}", hp.current, hp.maximum)
        };
        format!("{} takes {} damage ({})", self.name, change.applied, status)
    }

    /// Heal and describe the result. Non-positive amounts are ignored.
    pub fn heal(&mut self, amount: i32) -> String {
        if amount <= 0 {
            return format!("{} heals nothing", self.name);
        }
        let healed = self.hit_points.heal(amount);
        let hp = &self.hit_points;
        if hp.current == hp.maximum {
            format!(
                "{} heals {} hit points (HP: {}/{} - fully healed)",
                self.name, healed, hp.current, hp.maximum
            )
        } else {
            format!(
                "{} heals {} hit points (HP: {}/{})",
                self.name, healed, hp.current, hp.maximum
            )
        }
    }

    /// Add experience and level up when a threshold is crossed.
    /// Non-positive amounts are ignored and never reduce experience.
    pub fn gain_xp(&mut self, amount: i32, source: &str) -> XpGain {
        if amount <= 0 {
            return XpGain {
                amount: 0,
                new_total: self.experience,
                leveled_up: false,
                new_level: self.level,
            };
        }

        let amount = amount as u32;
        self.experience = self.experience.saturating_add(amount);

        let new_level = XP_THRESHOLDS
            .iter()
            .rposition(|&threshold| self.experience >= threshold)
            .map(|idx| (idx + 1) as u8)
            .unwrap_or(1);
        let leveled_up = new_level > self.level;
        if leveled_up {
            self.level = new_level;
            tracing::info!(
                character = %self.name,
                level = new_level,
                source,
                "Character leveled up"
            );
        }

        XpGain {
            amount,
            new_total: self.experience,
            leveled_up,
            new_level: self.level,
        }
    }
}

const UNARMED_ID: &str = "unarmed";

/// Create a sample fighter character for testing.
pub fn create_sample_fighter(name: &str) -> Character {
    let mut character = Character::new(name);

    character.ability_scores = AbilityScores::new(16, 14, 14, 10, 12, 8);
    character.level = 3;
    character.experience = 900;
    character.hit_points = HitPoints::new(28);
    character.armor_class = 18;
    character.equipped_weapon = "longsword".to_string();

    character.skill_proficiencies.insert(Skill::Athletics);
    character.skill_proficiencies.insert(Skill::Perception);
    character.skill_proficiencies.insert(Skill::Intimidation);

    if let Some(sword) = items::get_item("longsword") {
        character.inventory.add_item(sword, 1);
    }
    if let Some(potion) = items::get_item("healing_potion") {
        character.inventory.add_item(potion, 2);
    }

    character
}
