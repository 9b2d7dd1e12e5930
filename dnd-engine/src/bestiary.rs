//! Enemy stat blocks.
//!
//! Combat can only be started against creatures listed here. Stats follow
//! the 5e SRD, simplified to a single attack per creature.

use crate::items::normalize_id;
use lazy_static::lazy_static;
use std::collections::HashMap;

/// A creature's combat profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnemyDef {
    pub id: &'static str,
    pub name: &'static str,
    pub max_hp: i32,
    pub armor_class: i32,
    pub dex_modifier: i32,
    pub attack_bonus: i32,
    /// Damage notation including the creature's own damage modifier.
    pub damage_dice: &'static str,
    pub xp: u32,
    /// Gold found on the body.
    pub loot_gold: u32,
}

#[allow(clippy::too_many_arguments)]
const fn enemy(
    id: &'static str,
    name: &'static str,
    max_hp: i32,
    armor_class: i32,
    dex_modifier: i32,
    attack_bonus: i32,
    damage_dice: &'static str,
    xp: u32,
    loot_gold: u32,
) -> EnemyDef {
    EnemyDef {
        id,
        name,
        max_hp,
        armor_class,
        dex_modifier,
        attack_bonus,
        damage_dice,
        xp,
        loot_gold,
    }
}

const BESTIARY: &[EnemyDef] = &[
    enemy("giant_rat", "Giant Rat", 7, 12, 2, 4, "1d4+2", 25, 0),
    enemy("kobold", "Kobold", 5, 12, 2, 4, "1d4+2", 25, 1),
    enemy("goblin", "Goblin", 7, 15, 2, 4, "1d6+2", 50, 2),
    enemy("goblin_boss", "Goblin Boss", 21, 17, 2, 4, "1d6+2", 200, 15),
    enemy("wolf", "Wolf", 11, 13, 2, 4, "2d4+2", 50, 0),
    enemy("skeleton", "Skeleton", 13, 13, 2, 4, "1d6+2", 50, 1),
    enemy("zombie", "Zombie", 22, 8, -2, 3, "1d6+1", 50, 0),
    enemy("bandit", "Bandit", 11, 12, 1, 3, "1d6+1", 25, 5),
    enemy("bandit_captain", "Bandit Captain", 65, 15, 3, 5, "1d6+3", 450, 40),
    enemy("cultist", "Cultist", 9, 12, 1, 3, "1d6+1", 25, 3),
    enemy("orc", "Orc", 15, 13, 1, 5, "1d12+3", 100, 6),
    enemy("hobgoblin", "Hobgoblin", 11, 18, 1, 3, "1d8+1", 100, 8),
    enemy("bugbear", "Bugbear", 27, 16, 2, 4, "2d8+2", 200, 10),
    enemy("ogre", "Ogre", 59, 11, -1, 6, "2d8+4", 450, 25),
];

lazy_static! {
    static ref ENEMIES: HashMap<&'static str, &'static EnemyDef> =
        BESTIARY.iter().map(|e| (e.id, e)).collect();
}

/// Look up an enemy by type identifier (or display name).
pub fn get_enemy(name: &str) -> Option<&'static EnemyDef> {
    ENEMIES.get(normalize_id(name).as_str()).copied()
}

/// All known enemy types.
pub fn all_enemies() -> &'static [EnemyDef] {
    BESTIARY
}
