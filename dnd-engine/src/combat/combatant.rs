//! Combat participants.

use crate::bestiary::EnemyDef;
use crate::character::Character;
use crate::party::{PartyMember, SupportAbility};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a combatant within one encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CombatantId(pub u32);

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which side a combatant fights on, with the data only that side needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatantRole {
    Player,
    Ally {
        companion_id: String,
        support: Option<SupportAbility>,
    },
    Enemy {
        type_id: String,
    },
}

/// A participant in an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub role: CombatantRole,
    pub initiative: i32,
    pub current_hp: i32,
    pub max_hp: i32,
    pub armor_class: i32,
    pub attack_bonus: i32,
    pub damage_dice: String,
    /// Added once to every damage roll, on top of any modifier in the dice.
    pub damage_modifier: i32,
    pub dex_modifier: i32,
}

impl Combatant {
    /// The player, attacking with their equipped weapon.
    pub fn player(id: CombatantId, character: &Character) -> Self {
        let weapon = character.weapon();
        let damage_dice = weapon.weapon.map(|w| w.damage_dice).unwrap_or("1d1");
        Self {
            id,
            name: character.name.clone(),
            role: CombatantRole::Player,
            initiative: 0,
            current_hp: character.hit_points.current,
            max_hp: character.hit_points.maximum,
            armor_class: character.armor_class,
            attack_bonus: super::attack::attack_bonus(character, weapon),
            damage_dice: damage_dice.to_string(),
            damage_modifier: super::attack::attack_ability_modifier(character, weapon),
            dex_modifier: character.initiative_modifier(),
        }
    }

    pub fn ally(id: CombatantId, member: &PartyMember) -> Self {
        Self {
            id,
            name: member.name.clone(),
            role: CombatantRole::Ally {
                companion_id: member.id.clone(),
                support: member.class.support_ability(),
            },
            initiative: 0,
            current_hp: member.hit_points.current,
            max_hp: member.hit_points.maximum,
            armor_class: member.armor_class,
            attack_bonus: member.attack_bonus,
            damage_dice: member.damage_dice.clone(),
            damage_modifier: 0,
            dex_modifier: member.dex_modifier,
        }
    }

    pub fn enemy(id: CombatantId, def: &EnemyDef, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role: CombatantRole::Enemy {
                type_id: def.id.to_string(),
            },
            initiative: 0,
            current_hp: def.max_hp,
            max_hp: def.max_hp,
            armor_class: def.armor_class,
            attack_bonus: def.attack_bonus,
            damage_dice: def.damage_dice.to_string(),
            damage_modifier: 0,
            dex_modifier: def.dex_modifier,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.current_hp <= 0
    }

    pub fn is_player(&self) -> bool {
        matches!(self.role, CombatantRole::Player)
    }

    pub fn is_ally(&self) -> bool {
        matches!(self.role, CombatantRole::Ally { .. })
    }

    pub fn is_enemy(&self) -> bool {
        matches!(self.role, CombatantRole::Enemy { .. })
    }

    /// Player or ally.
    pub fn is_party(&self) -> bool {
        !self.is_enemy()
    }

    pub fn enemy_type(&self) -> Option<&str> {
        match &self.role {
            CombatantRole::Enemy { type_id } => Some(type_id),
            _ => None,
        }
    }

    /// Position in the tie-break order: player, then allies, then enemies.
    pub(crate) fn side_rank(&self) -> u8 {
        match self.role {
            CombatantRole::Player => 0,
            CombatantRole::Ally { .. } => 1,
            CombatantRole::Enemy { .. } => 2,
        }
    }

    pub(crate) fn below_ratio(&self, ratio: f32) -> bool {
        !self.is_dead() && (self.current_hp as f32) < self.max_hp as f32 * ratio
    }
}
