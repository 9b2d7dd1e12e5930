//! What companions and monsters do on their turns.
//!
//! These functions only decide; the encounter carries the decision out.

use super::combatant::{Combatant, CombatantId, CombatantRole};
use crate::party::SupportAbility;

/// A companion's choice for its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyAction {
    Attack {
        target: CombatantId,
    },
    Support {
        ability: SupportAbility,
        target: CombatantId,
    },
    /// Nothing to attack and no one to help.
    Hold,
}

/// Decide a companion's action.
///
/// If anyone in `party` (player included) is alive and below
/// `critical_ratio` of their max HP, and the companion has a support
/// ability with `uses_left`, it helps the most wounded of them. Otherwise
/// it attacks the living enemy with the lowest HP, ties going to the one
/// listed first in `enemies`.
pub fn party_member_action(
    ally: &Combatant,
    enemies: &[&Combatant],
    party: &[&Combatant],
    uses_left: u32,
    critical_ratio: f32,
) -> PartyAction {
    if let CombatantRole::Ally {
        support: Some(ability),
        ..
    } = ally.role
    {
        if uses_left > 0 {
            if let Some(target) = most_wounded(party, critical_ratio) {
                return PartyAction::Support {
                    ability,
                    target: target.id,
                };
            }
        }
    }

    match lowest_hp(enemies) {
        Some(target) => PartyAction::Attack { target: target.id },
        None => PartyAction::Hold,
    }
}

/// Pick an enemy's target: the living party member with the lowest HP,
/// ties going to the one listed first (turn order).
pub fn enemy_target(party: &[&Combatant]) -> Option<CombatantId> {
    lowest_hp(party).map(|c| c.id)
}

/// Two or more party members on the same enemy flank it.
pub fn check_flanking(attacker_count: usize) -> bool {
    attacker_count >= 2
}

fn lowest_hp<'a>(candidates: &[&'a Combatant]) -> Option<&'a Combatant> {
    candidates
        .iter()
        .copied()
        .filter(|c| !c.is_dead())
        .fold(None, |best: Option<&Combatant>, c| match best {
            Some(b) if b.current_hp <= c.current_hp => Some(b),
            _ => Some(c),
        })
}

fn most_wounded<'a>(party: &[&'a Combatant], ratio: f32) -> Option<&'a Combatant> {
    party
        .iter()
        .copied()
        .filter(|c| c.below_ratio(ratio))
        .fold(None, |best: Option<&Combatant>, c| match best {
            Some(b) if hp_fraction(b) <= hp_fraction(c) => Some(b),
            _ => Some(c),
        })
}

fn hp_fraction(c: &Combatant) -> f32 {
    c.current_hp as f32 / c.max_hp.max(1) as f32
}
