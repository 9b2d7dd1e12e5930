//! Standard item catalogue.
//!
//! Every item the narrator can grant or sell must exist here; tag payloads
//! are matched against these identifiers and nothing else. The registry is
//! built once and never mutated.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Normalize a free-form identifier or display name to registry form:
/// trimmed, lowercase, with runs of spaces or hyphens collapsed to `_`.
///
/// `"Healing Potion"`, `" healing-potion "` and `"HEALING_POTION"` all
/// become `"healing_potion"`.
pub fn normalize_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if ch == ' ' || ch == '-' || ch == '_' || ch == '\t' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.extend(ch.to_lowercase());
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemType {
    Weapon,
    Armor,
    Shield,
    Potion,
    Adventuring,
    LightSource,
    Treasure,
}

impl ItemType {
    /// Weapons, armor and shields are distinct items; everything else stacks.
    pub fn is_stackable(&self) -> bool {
        !matches!(self, ItemType::Weapon | ItemType::Armor | ItemType::Shield)
    }
}

/// Attack profile of a weapon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeaponStats {
    pub damage_dice: &'static str,
    pub finesse: bool,
    pub ranged: bool,
}

impl WeaponStats {
    /// Finesse and ranged weapons attack with Dexterity.
    pub fn uses_dexterity(&self) -> bool {
        self.finesse || self.ranged
    }
}

/// A catalogue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemDef {
    pub id: &'static str,
    pub name: &'static str,
    pub item_type: ItemType,
    /// Shop price in whole gold pieces.
    pub value_gp: u32,
    pub weapon: Option<WeaponStats>,
}

impl ItemDef {
    const fn gear(id: &'static str, name: &'static str, item_type: ItemType, value_gp: u32) -> Self {
        Self {
            id,
            name,
            item_type,
            value_gp,
            weapon: None,
        }
    }

    const fn weapon(
        id: &'static str,
        name: &'static str,
        value_gp: u32,
        damage_dice: &'static str,
        finesse: bool,
        ranged: bool,
    ) -> Self {
        Self {
            id,
            name,
            item_type: ItemType::Weapon,
            value_gp,
            weapon: Some(WeaponStats {
                damage_dice,
                finesse,
                ranged,
            }),
        }
    }
}

/// Fighting without a weapon: one point of bludgeoning damage plus STR.
pub const UNARMED_STRIKE: ItemDef = ItemDef::weapon("unarmed", "Unarmed Strike", 0, "1d1", false, false);

/// Currency items and the gold they convert to. These never enter an
/// inventory; granting one adds its value to the gold ledger instead.
pub const GOLD_POUCHES: &[(&str, u32)] = &[
    ("coin_purse", 5),
    ("small_gold_pouch", 10),
    ("gold_pouch", 25),
    ("large_gold_pouch", 50),
    ("treasure_chest", 100),
];

const CATALOGUE: &[ItemDef] = &[
    // Simple melee
    ItemDef::weapon("club", "Club", 1, "1d4", false, false),
    ItemDef::weapon("dagger", "Dagger", 2, "1d4", true, false),
    ItemDef::weapon("handaxe", "Handaxe", 5, "1d6", false, false),
    ItemDef::weapon("mace", "Mace", 5, "1d6", false, false),
    ItemDef::weapon("quarterstaff", "Quarterstaff", 1, "1d6", false, false),
    ItemDef::weapon("spear", "Spear", 1, "1d6", false, false),
    // Martial melee
    ItemDef::weapon("battleaxe", "Battleaxe", 10, "1d8", false, false),
    ItemDef::weapon("greataxe", "Greataxe", 30, "1d12", false, false),
    ItemDef::weapon("greatsword", "Greatsword", 50, "2d6", false, false),
    ItemDef::weapon("longsword", "Longsword", 15, "1d8", false, false),
    ItemDef::weapon("rapier", "Rapier", 25, "1d8", true, false),
    ItemDef::weapon("scimitar", "Scimitar", 25, "1d6", true, false),
    ItemDef::weapon("shortsword", "Shortsword", 10, "1d6", true, false),
    ItemDef::weapon("warhammer", "Warhammer", 15, "1d8", false, false),
    // Ranged
    ItemDef::weapon("light_crossbow", "Light Crossbow", 25, "1d8", false, true),
    ItemDef::weapon("shortbow", "Shortbow", 25, "1d6", false, true),
    ItemDef::weapon("longbow", "Longbow", 50, "1d8", false, true),
    // Armor
    ItemDef::gear("leather_armor", "Leather Armor", ItemType::Armor, 10),
    ItemDef::gear("chain_shirt", "Chain Shirt", ItemType::Armor, 50),
    ItemDef::gear("chain_mail", "Chain Mail", ItemType::Armor, 75),
    ItemDef::gear("shield", "Shield", ItemType::Shield, 10),
    // Consumables
    ItemDef::gear("healing_potion", "Healing Potion", ItemType::Potion, 50),
    ItemDef::gear("greater_healing_potion", "Greater Healing Potion", ItemType::Potion, 150),
    ItemDef::gear("antitoxin", "Antitoxin", ItemType::Potion, 50),
    // Gear
    ItemDef::gear("torch", "Torch", ItemType::LightSource, 1),
    ItemDef::gear("lantern", "Hooded Lantern", ItemType::LightSource, 5),
    ItemDef::gear("rope", "Hempen Rope (50 ft)", ItemType::Adventuring, 1),
    ItemDef::gear("rations", "Rations (1 day)", ItemType::Adventuring, 1),
    ItemDef::gear("bedroll", "Bedroll", ItemType::Adventuring, 1),
    ItemDef::gear("arrows", "Arrows (20)", ItemType::Adventuring, 1),
    ItemDef::gear("thieves_tools", "Thieves' Tools", ItemType::Adventuring, 25),
    // Valuables
    ItemDef::gear("silver_ring", "Silver Ring", ItemType::Treasure, 25),
    ItemDef::gear("gemstone", "Gemstone", ItemType::Treasure, 50),
];

lazy_static! {
    static ref ITEMS: HashMap<&'static str, &'static ItemDef> =
        CATALOGUE.iter().map(|item| (item.id, item)).collect();
}

/// Look up a catalogue item by identifier or display name.
pub fn get_item(name: &str) -> Option<&'static ItemDef> {
    ITEMS.get(normalize_id(name).as_str()).copied()
}

/// Look up a weapon by identifier or display name.
pub fn get_weapon(name: &str) -> Option<&'static ItemDef> {
    get_item(name).filter(|item| item.weapon.is_some())
}

/// Gold value of a currency item, if `name` is one.
pub fn gold_pouch_value(name: &str) -> Option<u32> {
    let id = normalize_id(name);
    GOLD_POUCHES
        .iter()
        .find(|(pouch, _)| *pouch == id)
        .map(|(_, value)| *value)
}

/// All catalogue entries, in catalogue order.
pub fn catalogue() -> &'static [ItemDef] {
    CATALOGUE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("Healing Potion"), "healing_potion");
        assert_eq!(normalize_id("  healing-potion "), "healing_potion");
        assert_eq!(normalize_id("HEALING__POTION"), "healing_potion");
        assert_eq!(normalize_id("goblin_boss"), "goblin_boss");
    }

    #[test]
    fn test_lookup_by_name_and_id() {
        assert_eq!(get_item("Longsword").map(|i| i.id), Some("longsword"));
        assert_eq!(get_item("light crossbow").map(|i| i.id), Some("light_crossbow"));
        assert!(get_item("vorpal_sword").is_none());
    }

    #[test]
    fn test_weapon_properties() {
        let rapier = get_weapon("rapier").unwrap().weapon.unwrap();
        assert!(rapier.finesse);
        assert!(rapier.uses_dexterity());

        let longbow = get_weapon("longbow").unwrap().weapon.unwrap();
        assert!(longbow.ranged);

        let greatsword = get_weapon("greatsword").unwrap().weapon.unwrap();
        assert_eq!(greatsword.damage_dice, "2d6");
        assert!(!greatsword.uses_dexterity());

        // Not a weapon
        assert!(get_weapon("torch").is_none());
    }

    #[test]
    fn test_gold_pouch_table() {
        assert_eq!(gold_pouch_value("gold_pouch"), Some(25));
        assert_eq!(gold_pouch_value("Large Gold Pouch"), Some(50));
        assert_eq!(gold_pouch_value("healing_potion"), None);
        // Pouches are not catalogue items
        assert!(get_item("gold_pouch").is_none());
    }

    #[test]
    fn test_injection_strings_never_match() {
        for hostile in [
            "'; DROP TABLE items; --",
            "../../etc/passwd",
            "$(rm -rf /)",
            "<script>alert(1)</script>",
            "healing_potion; gold_pouch",
        ] {
            assert!(get_item(hostile).is_none(), "{hostile} matched");
            assert!(gold_pouch_value(hostile).is_none(), "{hostile} matched");
        }
    }

    #[test]
    fn test_stackability() {
        assert!(!ItemType::Weapon.is_stackable());
        assert!(!ItemType::Armor.is_stackable());
        assert!(ItemType::Potion.is_stackable());
        assert!(ItemType::Adventuring.is_stackable());
    }
}
