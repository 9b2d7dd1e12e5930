//! Turn-based combat.
//!
//! The pieces build on each other:
//! - [`attack`] rolls to hit against armor class.
//! - [`damage`] rolls weapon damage and clamps hit points.
//! - [`initiative`] orders combatants.
//! - [`policy`] decides what companions and enemies do on their turns.
//! - [`encounter`] is the state machine that ties them together.

pub mod attack;
pub mod combatant;
pub mod damage;
pub mod encounter;
pub mod initiative;
pub mod policy;

pub use attack::{roll_attack, roll_attack_with_bonus, AttackConditions, AttackResult};
pub use combatant::{Combatant, CombatantId, CombatantRole};
pub use damage::{apply_damage, roll_damage, DamageResult, DamageRoll};
pub use encounter::{CombatEvent, Encounter, EncounterSetup, Surprise, TurnReport};
pub use initiative::determine_turn_order;
pub use policy::{check_flanking, enemy_target, party_member_action, PartyAction};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle of a session's combat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatStatus {
    Idle,
    Active,
    Victory,
    Defeat,
    Fled,
}

impl CombatStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CombatStatus::Victory | CombatStatus::Defeat | CombatStatus::Fled
        )
    }
}

impl fmt::Display for CombatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CombatStatus::Idle => "idle",
            CombatStatus::Active => "active",
            CombatStatus::Victory => "victory",
            CombatStatus::Defeat => "defeat",
            CombatStatus::Fled => "fled",
        };
        write!(f, "{s}")
    }
}

/// Errors from combat operations. None of them change hit points.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CombatError {
    #[error("Not in combat")]
    NotInCombat,

    #[error("Combat is already underway")]
    AlreadyInCombat,

    #[error("The encounter is over ({0})")]
    EncounterOver(CombatStatus),

    #[error("It is not the player's turn")]
    NotPlayerTurn,

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("No enemies declared")]
    EmptyRoster,

    #[error("Unknown enemy type: {0}")]
    UnknownEnemy(String),

    #[error("Too many enemies: {count} (max {max})")]
    TooManyEnemies { count: usize, max: usize },

    #[error("The player cannot fight at 0 HP")]
    PlayerIncapacitated,
}
