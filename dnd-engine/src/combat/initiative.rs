//! Initiative and turn order.

use super::combatant::Combatant;
use crate::dice::roll_dice_with;
use rand::Rng;

/// Roll initiative (1d20 + DEX) for every living combatant and sort them
/// into turn order, highest first.
///
/// The sort is stable: ties keep input order, which is the player, then
/// allies in party order, then enemies in declared order. Dead combatants
/// never get a turn and are dropped before rolling.
pub fn determine_turn_order<R: Rng + ?Sized>(
    rng: &mut R,
    player: Option<Combatant>,
    enemies: Vec<Combatant>,
    allies: Vec<Combatant>,
) -> Vec<Combatant> {
    let mut order: Vec<Combatant> = player
        .into_iter()
        .chain(allies)
        .chain(enemies)
        .filter(|c| !c.is_dead())
        .collect();

    for combatant in &mut order {
        let roll = roll_dice_with(rng, "1d20");
        combatant.initiative = roll.total + combatant.dex_modifier;
        tracing::debug!(
            combatant = %combatant.name,
            d20 = roll.total,
            initiative = combatant.initiative,
            "Rolled initiative"
        );
    }

    order.sort_by(|a, b| b.initiative.cmp(&a.initiative));
    order
}

/// Reroll everyone still standing, e.g. when reinforcements arrive.
/// Combatants are regrouped by side (in id order within a side) before
/// rolling so ties break the same way as at the start of combat.
pub fn reroll_turn_order<R: Rng + ?Sized>(rng: &mut R, combatants: Vec<Combatant>) -> Vec<Combatant> {
    let mut combatants = combatants;
    combatants.sort_by_key(|c| (c.side_rank(), c.id));

    let mut player = None;
    let mut allies = Vec::new();
    let mut enemies = Vec::new();
    for combatant in combatants {
        if combatant.is_player() {
            player = Some(combatant);
        } else if combatant.is_ally() {
            allies.push(combatant);
        } else {
            enemies.push(combatant);
        }
    }
    determine_turn_order(rng, player, enemies, allies)
}
