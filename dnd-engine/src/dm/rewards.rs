//! Applying narrator rewards to the character sheet.
//!
//! `apply_rewards` has no memory between calls: each call applies exactly
//! the directives it is given, once. Combat and skill-check directives are
//! left to the session.

use super::tags::Directive;
use crate::character::{Character, InventoryError, XpGain};
use crate::items::{get_item, gold_pouch_value};
use crate::party::{Party, PartyError};
use thiserror::Error;

/// Why a directive could not be applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RewardError {
    #[error("Not allowed during combat")]
    InCombat,

    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Party(#[from] PartyError),
}

/// Circumstances the applicator needs to know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardContext {
    /// Shopping and recruiting are refused mid-fight.
    pub in_combat: bool,
    pub max_party_size: usize,
}

impl Default for RewardContext {
    fn default() -> Self {
        Self {
            in_combat: false,
            max_party_size: 3,
        }
    }
}

/// What a call to [`apply_rewards`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedRewards {
    pub gold_gained: u32,
    pub gold_spent: u32,
    pub xp_gained: u32,
    /// Set if the character leveled up.
    pub new_level: Option<u8>,
    /// Item ids and quantities added, purchases included.
    pub items_added: Vec<(String, u32)>,
    pub purchased: Vec<String>,
    pub recruited: Vec<String>,
    pub rejected: Vec<(Directive, RewardError)>,
}

impl AppliedRewards {
    pub fn is_empty(&self) -> bool {
        self.gold_gained == 0
            && self.gold_spent == 0
            && self.xp_gained == 0
            && self.items_added.is_empty()
            && self.recruited.is_empty()
            && self.rejected.is_empty()
    }

    /// Human-readable summary, one line per change.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        if self.gold_gained > 0 {
            lines.push(format!("+{} gold", self.gold_gained));
        }
        if self.gold_spent > 0 {
            lines.push(format!("-{} gold", self.gold_spent));
        }
        if self.xp_gained > 0 {
            lines.push(format!("+{} XP", self.xp_gained));
        }
        if let Some(level) = self.new_level {
            lines.push(format!("Reached level {level}!"));
        }
        for (id, qty) in &self.items_added {
            let name = get_item(id).map(|i| i.name).unwrap_or(id.as_str());
            if *qty == 1 {
                lines.push(format!("Received {name}"));
            } else {
                lines.push(format!("Received {name} x{qty}"));
            }
        }
        for companion in &self.recruited {
            lines.push(format!("{companion} joined the party"));
        }
        for (directive, error) in &self.rejected {
            lines.push(format!("Could not apply {directive}: {error}"));
        }
        lines.join("\n")
    }

    /// Fold a later batch of results into this one.
    pub fn merge(&mut self, other: AppliedRewards) {
        self.gold_gained = self.gold_gained.saturating_add(other.gold_gained);
        self.gold_spent = self.gold_spent.saturating_add(other.gold_spent);
        self.xp_gained = self.xp_gained.saturating_add(other.xp_gained);
        if other.new_level.is_some() {
            self.new_level = other.new_level;
        }
        self.items_added.extend(other.items_added);
        self.purchased.extend(other.purchased);
        self.recruited.extend(other.recruited);
        self.rejected.extend(other.rejected);
    }

    fn record_xp(&mut self, gain: XpGain) {
        self.xp_gained = self.xp_gained.saturating_add(gain.amount);
        if gain.leveled_up {
            self.new_level = Some(gain.new_level);
        }
    }
}

/// Apply reward, shop and recruitment directives in order.
pub fn apply_rewards(
    directives: &[Directive],
    character: &mut Character,
    party: &mut Party,
    context: &RewardContext,
) -> AppliedRewards {
    let mut applied = AppliedRewards::default();

    for directive in directives {
        if let Err(error) = apply_one(directive, character, party, context, &mut applied) {
            tracing::warn!(directive = %directive, error = %error, "Directive rejected");
            applied.rejected.push((directive.clone(), error));
        }
    }

    if !applied.is_empty() {
        tracing::info!(
            gold_gained = applied.gold_gained,
            gold_spent = applied.gold_spent,
            xp = applied.xp_gained,
            items = applied.items_added.len(),
            rejected = applied.rejected.len(),
            "Applied rewards"
        );
    }
    applied
}

fn apply_one(
    directive: &Directive,
    character: &mut Character,
    party: &mut Party,
    context: &RewardContext,
    applied: &mut AppliedRewards,
) -> Result<(), RewardError> {
    match directive {
        Directive::Gold(amount) => {
            if *amount > 0 {
                character.inventory.add_gold(*amount);
                applied.gold_gained = applied.gold_gained.saturating_add(*amount);
            }
        }
        Directive::Xp(amount) => {
            let amount = i32::try_from(*amount).unwrap_or(i32::MAX);
            let gain = character.gain_xp(amount, "narrator reward");
            applied.record_xp(gain);
        }
        Directive::Item { item_id, quantity } => {
            if *quantity == 0 {
                return Ok(());
            }
            if let Some(value) = gold_pouch_value(item_id) {
                let gold = value.saturating_mul(*quantity);
                character.inventory.add_gold(gold);
                applied.gold_gained = applied.gold_gained.saturating_add(gold);
            } else {
                let item = get_item(item_id).ok_or_else(|| RewardError::UnknownItem(item_id.clone()))?;
                character.inventory.add_item(item, *quantity);
                applied.items_added.push((item.id.to_string(), *quantity));
            }
        }
        Directive::Buy { item_id } => {
            if context.in_combat {
                return Err(RewardError::InCombat);
            }
            let item = get_item(item_id).ok_or_else(|| RewardError::UnknownItem(item_id.clone()))?;
            character.inventory.spend_gold(item.value_gp)?;
            character.inventory.add_item(item, 1);
            applied.gold_spent = applied.gold_spent.saturating_add(item.value_gp);
            applied.items_added.push((item.id.to_string(), 1));
            applied.purchased.push(item.id.to_string());
        }
        Directive::GoldCost(amount) => {
            if context.in_combat {
                return Err(RewardError::InCombat);
            }
            if *amount > 0 {
                character.inventory.spend_gold(*amount)?;
                applied.gold_spent = applied.gold_spent.saturating_add(*amount);
            }
        }
        Directive::Recruit { companion_id } => {
            if context.in_combat {
                return Err(RewardError::InCombat);
            }
            let member = party.recruit(companion_id, context.max_party_size)?;
            applied.recruited.push(member.name.clone());
        }
        Directive::CombatStart { .. } | Directive::RollRequest { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::create_sample_fighter;
    use crate::dm::tags::parse_directives;

    fn setup() -> (Character, Party) {
        let mut hero = create_sample_fighter("Roland");
        hero.inventory.gold = 100;
        (hero, Party::new())
    }

    #[test]
    fn test_gold_and_xp() {
        let (mut hero, mut party) = setup();
        let applied = apply_rewards(
            &[Directive::Gold(25), Directive::Xp(50)],
            &mut hero,
            &mut party,
            &RewardContext::default(),
        );
        assert_eq!(hero.inventory.gold, 125);
        assert_eq!(hero.experience, 950);
        assert_eq!(applied.gold_gained, 25);
        assert_eq!(applied.xp_gained, 50);
        assert!(applied.rejected.is_empty());
    }

    #[test]
    fn test_gold_pouch_becomes_gold() {
        let (mut hero, mut party) = setup();
        let directives = parse_directives("[ITEM: gold_pouch] [ITEM: coin_purse x2]");
        let applied = apply_rewards(&directives, &mut hero, &mut party, &RewardContext::default());

        assert_eq!(hero.inventory.gold, 100 + 25 + 10);
        assert_eq!(applied.gold_gained, 35);
        assert!(applied.items_added.is_empty());
        assert!(hero.inventory.find_item("gold_pouch").is_none());
        assert!(hero.inventory.find_item("coin_purse").is_none());
    }

    #[test]
    fn test_every_pouch_value() {
        for (pouch, value) in crate::items::GOLD_POUCHES {
            let (mut hero, mut party) = setup();
            apply_rewards(
                &[Directive::Item {
                    item_id: pouch.to_string(),
                    quantity: 1,
                }],
                &mut hero,
                &mut party,
                &RewardContext::default(),
            );
            assert_eq!(hero.inventory.gold, 100 + value, "{pouch}");
        }
    }

    #[test]
    fn test_items_stack() {
        let (mut hero, mut party) = setup();
        let directives = parse_directives("[ITEM: healing_potion x2]");
        apply_rewards(&directives, &mut hero, &mut party, &RewardContext::default());
        // The sample fighter starts with two
        assert_eq!(hero.inventory.find_item("healing_potion").unwrap().quantity, 4);
    }

    #[test]
    fn test_buy_spends_catalogue_price() {
        let (mut hero, mut party) = setup();
        let applied = apply_rewards(
            &parse_directives("[BUY: healing_potion]"),
            &mut hero,
            &mut party,
            &RewardContext::default(),
        );
        assert_eq!(hero.inventory.gold, 50);
        assert_eq!(applied.purchased, vec!["healing_potion"]);
        assert_eq!(hero.inventory.count("healing_potion"), 3);
    }

    #[test]
    fn test_buy_without_funds_changes_nothing() {
        let (mut hero, mut party) = setup();
        hero.inventory.gold = 10;
        let before = hero.inventory.clone();
        let applied = apply_rewards(
            &parse_directives("[BUY: greatsword]"),
            &mut hero,
            &mut party,
            &RewardContext::default(),
        );
        assert_eq!(hero.inventory, before);
        assert_eq!(
            applied.rejected[0].1,
            RewardError::Inventory(InventoryError::InsufficientGold {
                needed: 50,
                available: 10
            })
        );
    }

    #[test]
    fn test_cost() {
        let (mut hero, mut party) = setup();
        apply_rewards(
            &[Directive::GoldCost(30)],
            &mut hero,
            &mut party,
            &RewardContext::default(),
        );
        assert_eq!(hero.inventory.gold, 70);

        let applied = apply_rewards(
            &[Directive::GoldCost(500)],
            &mut hero,
            &mut party,
            &RewardContext::default(),
        );
        assert_eq!(hero.inventory.gold, 70);
        assert_eq!(applied.rejected.len(), 1);
    }

    #[test]
    fn test_shop_and_recruit_refused_in_combat() {
        let (mut hero, mut party) = setup();
        let context = RewardContext {
            in_combat: true,
            ..Default::default()
        };
        let directives = parse_directives("[BUY: torch] [COST: 5] [RECRUIT: brom] [GOLD: 5]");
        let applied = apply_rewards(&directives, &mut hero, &mut party, &context);

        assert_eq!(applied.rejected.len(), 3);
        assert!(applied.rejected.iter().all(|(_, e)| *e == RewardError::InCombat));
        assert!(party.is_empty());
        // Loot still applies
        assert_eq!(hero.inventory.gold, 105);
    }

    #[test]
    fn test_recruit() {
        let (mut hero, mut party) = setup();
        let context = RewardContext {
            in_combat: false,
            max_party_size: 1,
        };
        let applied = apply_rewards(
            &parse_directives("[RECRUIT: brom] [RECRUIT: vex]"),
            &mut hero,
            &mut party,
            &context,
        );
        assert_eq!(applied.recruited, vec!["Brom Ironshield"]);
        assert_eq!(
            applied.rejected[0].1,
            RewardError::Party(PartyError::PartyFull(1))
        );
    }

    #[test]
    fn test_applying_twice_applies_twice() {
        let (mut hero, mut party) = setup();
        let directives = [Directive::Gold(10)];
        apply_rewards(&directives, &mut hero, &mut party, &RewardContext::default());
        apply_rewards(&directives, &mut hero, &mut party, &RewardContext::default());
        assert_eq!(hero.inventory.gold, 120);
    }

    #[test]
    fn test_zero_amounts_are_noops() {
        let (mut hero, mut party) = setup();
        let before = hero.clone();
        let applied = apply_rewards(
            &[
                Directive::Gold(0),
                Directive::Xp(0),
                Directive::GoldCost(0),
                Directive::Item {
                    item_id: "torch".to_string(),
                    quantity: 0,
                },
            ],
            &mut hero,
            &mut party,
            &RewardContext::default(),
        );
        assert_eq!(hero, before);
        assert!(applied.is_empty());
    }

    #[test]
    fn test_summary() {
        let (mut hero, mut party) = setup();
        let applied = apply_rewards(
            &parse_directives("[GOLD: 5] [ITEM: torch x2] [XP: 10]"),
            &mut hero,
            &mut party,
            &RewardContext::default(),
        );
        let summary = applied.summary();
        assert!(summary.contains("+5 gold"));
        assert!(summary.contains("Received Torch x2"));
        assert!(summary.contains("+10 XP"));
    }

    #[test]
    fn test_merge_accumulates() {
        let (mut hero, mut party) = setup();
        let mut total = apply_rewards(
            &parse_directives("[GOLD: 5]"),
            &mut hero,
            &mut party,
            &RewardContext::default(),
        );
        total.merge(apply_rewards(
            &parse_directives("[GOLD: 7] [BUY: greater_healing_potion]"),
            &mut hero,
            &mut party,
            &RewardContext::default(),
        ));
        assert_eq!(total.gold_gained, 12);
        assert_eq!(total.rejected.len(), 1);
    }

    #[test]
    fn test_huge_reply_saturates_totals() {
        let (mut hero, mut party) = setup();
        let directives = parse_directives(&"[GOLD: 1000000] ".repeat(4_300));
        assert_eq!(directives.len(), 4_300);

        let mut total = apply_rewards(&directives, &mut hero, &mut party, &RewardContext::default());
        assert_eq!(total.gold_gained, u32::MAX);
        assert_eq!(hero.inventory.gold, u32::MAX);

        total.merge(apply_rewards(&directives, &mut hero, &mut party, &RewardContext::default()));
        assert_eq!(total.gold_gained, u32::MAX);
        assert_eq!(hero.inventory.gold, u32::MAX);
    }
}
