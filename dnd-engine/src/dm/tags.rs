//! Narrator control tags.
//!
//! The narrator's reply is prose with bracketed tags mixed in:
//!
//! ```text
//! The goblins burst from the brush! [COMBAT: 2 goblin, goblin_boss; ambushed]
//! You pocket the coins. [GOLD: 25] [ITEM: healing_potion x2]
//! ```
//!
//! Tags are `[KEYWORD: payload]` on one line. Keywords are
//! case-insensitive. Payloads are treated as opaque text: they are
//! normalized and looked up in the item, enemy, companion and skill
//! registries, and anything that does not match is rejected. A bad tag
//! never stops the rest of the reply from applying.

use crate::bestiary::get_enemy;
use crate::character::Skill;
use crate::combat::Surprise;
use crate::items::{get_item, gold_pouch_value, normalize_id};
use crate::party::get_companion;
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

/// Longest payload accepted, in characters.
pub const MAX_PAYLOAD_LEN: usize = 200;

/// Largest GOLD, XP or COST amount accepted.
pub const MAX_AMOUNT: u32 = 1_000_000;

/// Largest stack a single ITEM tag may grant.
pub const MAX_ITEM_QUANTITY: u32 = 99;

/// Most creatures a single COMBAT tag may declare. The encounter applies
/// its own, usually smaller, limit on top.
pub const MAX_TAG_ENEMIES: usize = 20;

pub const MIN_DC: i32 = 1;
pub const MAX_DC: i32 = 30;

lazy_static! {
    static ref TAG_RE: Regex =
        Regex::new(r"\[[ \t]*([A-Za-z_]+)[ \t]*:[ \t]*([^\]\r\n]*)\]").expect("valid regex");
    static ref COUNTED_RE: Regex =
        Regex::new(r"^(\d+)_?(?:x_?)?([a-z][a-z_]*)$").expect("valid regex");
    static ref SUFFIX_QTY_RE: Regex =
        Regex::new(r"^([a-z][a-z_]*?)_?x_?(\d+)$").expect("valid regex");
    static ref ROLL_RE: Regex =
        Regex::new(r"(?i)^(.+?)\s+(?:dc\s*)?(-?\d+)$").expect("valid regex");
    static ref SPACES_RE: Regex = Regex::new(r"[ \t]{2,}").expect("valid regex");
}

/// A typed instruction from the narrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Gold(u32),
    Item { item_id: String, quantity: u32 },
    Xp(u32),
    Buy { item_id: String },
    GoldCost(u32),
    Recruit { companion_id: String },
    CombatStart { enemies: Vec<String>, surprise: Surprise },
    RollRequest { skill: Skill, dc: i32 },
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Gold(n) => write!(f, "GOLD {n}"),
            Directive::Item { item_id, quantity } => write!(f, "ITEM {item_id} x{quantity}"),
            Directive::Xp(n) => write!(f, "XP {n}"),
            Directive::Buy { item_id } => write!(f, "BUY {item_id}"),
            Directive::GoldCost(n) => write!(f, "COST {n}"),
            Directive::Recruit { companion_id } => write!(f, "RECRUIT {companion_id}"),
            Directive::CombatStart { enemies, surprise } => {
                write!(f, "COMBAT {}", enemies.join(", "))?;
                match surprise {
                    Surprise::None => Ok(()),
                    Surprise::PartyAmbush => write!(f, " (surprise)"),
                    Surprise::EnemyAmbush => write!(f, " (ambushed)"),
                }
            }
            Directive::RollRequest { skill, dc } => write!(f, "ROLL {skill} DC {dc}"),
        }
    }
}

/// A tag with a known keyword whose payload did not validate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedTag {
    /// The tag as it appeared in the reply.
    pub raw: String,
    pub keyword: String,
    pub reason: String,
}

/// Everything extracted from one narrator reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedNarration {
    pub directives: Vec<Directive>,
    pub rejected: Vec<RejectedTag>,
    /// The reply with every recognized tag removed, for display.
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Combat,
    Roll,
    Gold,
    Item,
    Xp,
    Buy,
    Cost,
    Recruit,
}

impl Keyword {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "COMBAT" => Some(Keyword::Combat),
            "ROLL" => Some(Keyword::Roll),
            "GOLD" => Some(Keyword::Gold),
            "ITEM" => Some(Keyword::Item),
            "XP" => Some(Keyword::Xp),
            "BUY" => Some(Keyword::Buy),
            "COST" => Some(Keyword::Cost),
            "RECRUIT" => Some(Keyword::Recruit),
            _ => None,
        }
    }
}

/// Extract the valid directives from a reply, in order of appearance.
pub fn parse_directives(text: &str) -> Vec<Directive> {
    parse_narration(text).directives
}

/// Extract directives, rejected tags and display text from a reply.
pub fn parse_narration(text: &str) -> ParsedNarration {
    let mut parsed = ParsedNarration::default();
    let mut stripped = String::with_capacity(text.len());
    let mut last = 0;

    for caps in TAG_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let raw_keyword = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let payload = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

        let Some(keyword) = Keyword::parse(raw_keyword) else {
            tracing::debug!(keyword = raw_keyword, "Ignoring unknown tag");
            continue;
        };

        stripped.push_str(&text[last..whole.start()]);
        last = whole.end();

        match parse_payload(keyword, payload) {
            Ok(directive) => {
                tracing::debug!(directive = %directive, "Parsed directive");
                parsed.directives.push(directive);
            }
            Err(reason) => {
                tracing::warn!(
                    keyword = raw_keyword,
                    payload_len = payload.len(),
                    reason = %reason,
                    "Rejected narrator tag"
                );
                parsed.rejected.push(RejectedTag {
                    raw: truncate(whole.as_str(), MAX_PAYLOAD_LEN + 16),
                    keyword: raw_keyword.to_ascii_uppercase(),
                    reason,
                });
            }
        }
    }
    stripped.push_str(&text[last..]);
    parsed.text = tidy(&stripped);
    parsed
}

fn parse_payload(keyword: Keyword, payload: &str) -> Result<Directive, String> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err("empty payload".to_string());
    }
    if payload.chars().count() > MAX_PAYLOAD_LEN {
        return Err(format!("payload longer than {MAX_PAYLOAD_LEN} characters"));
    }

    match keyword {
        Keyword::Gold => parse_amount(payload).map(Directive::Gold),
        Keyword::Xp => parse_amount(payload).map(Directive::Xp),
        Keyword::Cost => parse_amount(payload).map(Directive::GoldCost),
        Keyword::Item => parse_item(payload),
        Keyword::Buy => {
            let id = normalize_id(payload);
            match get_item(&id) {
                Some(item) => Ok(Directive::Buy {
                    item_id: item.id.to_string(),
                }),
                None => Err(format!("unknown item '{id}'")),
            }
        }
        Keyword::Recruit => {
            let id = normalize_id(payload);
            match get_companion(&id) {
                Some(companion) => Ok(Directive::Recruit {
                    companion_id: companion.id.to_string(),
                }),
                None => Err(format!("unknown companion '{id}'")),
            }
        }
        Keyword::Combat => parse_combat(payload),
        Keyword::Roll => parse_roll(payload),
    }
}

/// A positive whole number no larger than [`MAX_AMOUNT`].
fn parse_amount(payload: &str) -> Result<u32, String> {
    let digits = payload.strip_prefix('+').unwrap_or(payload);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("'{payload}' is not a positive whole number"));
    }
    match digits.parse::<u32>() {
        Ok(0) => Err("amount must be positive".to_string()),
        Ok(n) if n <= MAX_AMOUNT => Ok(n),
        _ => Err(format!("amount exceeds {MAX_AMOUNT}")),
    }
}

/// `healing_potion`, `healing_potion x2`, `healing_potion x 2`,
/// `2 healing_potion` or `2x healing_potion`.
fn parse_item(payload: &str) -> Result<Directive, String> {
    let normalized = normalize_id(payload);
    let (id, quantity) = if let Some(caps) = COUNTED_RE.captures(&normalized) {
        (caps[2].to_string(), parse_quantity(&caps[1])?)
    } else if let Some(caps) = SUFFIX_QTY_RE.captures(&normalized) {
        (caps[1].to_string(), parse_quantity(&caps[2])?)
    } else {
        (normalized, 1)
    };

    if get_item(&id).is_none() && gold_pouch_value(&id).is_none() {
        return Err(format!("unknown item '{id}'"));
    }
    Ok(Directive::Item {
        item_id: id,
        quantity,
    })
}

fn parse_quantity(raw: &str) -> Result<u32, String> {
    match raw.parse::<u32>() {
        Ok(0) => Err("quantity must be positive".to_string()),
        Ok(n) if n <= MAX_ITEM_QUANTITY => Ok(n),
        _ => Err(format!("quantity exceeds {MAX_ITEM_QUANTITY}")),
    }
}

/// `2 goblin, goblin_boss`, `3xgoblin`, optionally followed by
/// `; surprise` or `; ambushed`.
fn parse_combat(payload: &str) -> Result<Directive, String> {
    let mut parts = payload.splitn(2, ';');
    let roster = parts.next().unwrap_or_default();
    let surprise = match parts.next().map(normalize_id).as_deref() {
        None | Some("") => Surprise::None,
        Some("surprise") | Some("surprised") => Surprise::PartyAmbush,
        Some("ambush") | Some("ambushed") => Surprise::EnemyAmbush,
        Some(other) => return Err(format!("unknown combat modifier '{other}'")),
    };

    let mut enemies = Vec::new();
    for entry in roster.split(',') {
        let entry = normalize_id(entry);
        if entry.is_empty() {
            continue;
        }
        let (count, id) = match COUNTED_RE.captures(&entry) {
            Some(caps) => {
                let count = caps[1]
                    .parse::<usize>()
                    .map_err(|_| format!("bad enemy count in '{entry}'"))?;
                (count, caps[2].to_string())
            }
            None => (1, entry.clone()),
        };
        if count == 0 {
            return Err(format!("enemy count must be positive in '{entry}'"));
        }
        let def = get_enemy(&id).ok_or_else(|| format!("unknown enemy '{id}'"))?;
        if enemies.len() + count > MAX_TAG_ENEMIES {
            return Err(format!("more than {MAX_TAG_ENEMIES} enemies"));
        }
        enemies.extend(std::iter::repeat(def.id.to_string()).take(count));
    }

    if enemies.is_empty() {
        return Err("no enemies listed".to_string());
    }
    Ok(Directive::CombatStart { enemies, surprise })
}

/// `perception DC 15` or `perception 15`.
fn parse_roll(payload: &str) -> Result<Directive, String> {
    let caps = ROLL_RE
        .captures(payload)
        .ok_or_else(|| format!("expected '<skill> DC <n>', got '{payload}'"))?;
    let skill = Skill::parse(&caps[1]).ok_or_else(|| format!("unknown skill '{}'", &caps[1]))?;
    let dc = caps[2]
        .parse::<i32>()
        .map_err(|_| format!("bad DC '{}'", &caps[2]))?;
    if !(MIN_DC..=MAX_DC).contains(&dc) {
        return Err(format!("DC {dc} outside {MIN_DC}..={MAX_DC}"));
    }
    Ok(Directive::RollRequest { skill, dc })
}

/// Collapse the gaps left behind by removed tags.
fn tidy(text: &str) -> String {
    text.lines()
        .map(|line| SPACES_RE.replace_all(line, " ").trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_goblins() {
        let directives = parse_directives("Ambush! [COMBAT: goblin, goblin, goblin]");
        assert_eq!(
            directives,
            vec![Directive::CombatStart {
                enemies: vec!["goblin".to_string(); 3],
                surprise: Surprise::None,
            }]
        );
    }

    #[test]
    fn test_counted_roster_and_surprise() {
        let directives = parse_directives("[COMBAT: 2 goblin, goblin_boss; ambushed]");
        assert_eq!(
            directives,
            vec![Directive::CombatStart {
                enemies: vec![
                    "goblin".to_string(),
                    "goblin".to_string(),
                    "goblin_boss".to_string()
                ],
                surprise: Surprise::EnemyAmbush,
            }]
        );

        let directives = parse_directives("[combat: 3xWolf; surprise]");
        assert_eq!(
            directives,
            vec![Directive::CombatStart {
                enemies: vec!["wolf".to_string(); 3],
                surprise: Surprise::PartyAmbush,
            }]
        );

        let directives = parse_directives("[COMBAT: Goblin Boss]");
        assert_eq!(
            directives,
            vec![Directive::CombatStart {
                enemies: vec!["goblin_boss".to_string()],
                surprise: Surprise::None,
            }]
        );
    }

    #[test]
    fn test_unbounded_or_unknown_rosters_rejected() {
        for bad in [
            "[COMBAT: many goblins]",
            "[COMBAT: goblins]",
            "[COMBAT: dragon]",
            "[COMBAT: 0 goblin]",
            "[COMBAT: 999999999999 goblin]",
            "[COMBAT: 21 goblin]",
            "[COMBAT: ]",
            "[COMBAT: goblin; at dawn]",
        ] {
            let parsed = parse_narration(bad);
            assert!(parsed.directives.is_empty(), "{bad} was accepted");
            assert_eq!(parsed.rejected.len(), 1, "{bad} not reported");
        }
    }

    #[test]
    fn test_amounts() {
        assert_eq!(parse_directives("[GOLD: 25]"), vec![Directive::Gold(25)]);
        assert_eq!(parse_directives("[XP: +50]"), vec![Directive::Xp(50)]);
        assert_eq!(parse_directives("[COST: 10]"), vec![Directive::GoldCost(10)]);

        for bad in [
            "[GOLD: 0]",
            "[GOLD: -5]",
            "[XP: -100]",
            "[GOLD: lots]",
            "[GOLD: 2.5]",
            "[GOLD: 99999999999]",
            "[COST: 5000000]",
        ] {
            assert!(parse_directives(bad).is_empty(), "{bad} was accepted");
        }
    }

    #[test]
    fn test_item_quantities() {
        let item = |id: &str, quantity| Directive::Item {
            item_id: id.to_string(),
            quantity,
        };
        assert_eq!(parse_directives("[ITEM: healing_potion]"), vec![item("healing_potion", 1)]);
        assert_eq!(parse_directives("[ITEM: healing_potion x2]"), vec![item("healing_potion", 2)]);
        assert_eq!(parse_directives("[ITEM: healing_potion x 3]"), vec![item("healing_potion", 3)]);
        assert_eq!(parse_directives("[ITEM: 4 torch]"), vec![item("torch", 4)]);
        assert_eq!(parse_directives("[ITEM: 2x Torch]"), vec![item("torch", 2)]);
        assert_eq!(parse_directives("[ITEM: Healing Potion]"), vec![item("healing_potion", 1)]);
        assert_eq!(parse_directives("[ITEM: gold_pouch]"), vec![item("gold_pouch", 1)]);

        assert!(parse_directives("[ITEM: vorpal_sword]").is_empty());
        assert!(parse_directives("[ITEM: healing_potion x0]").is_empty());
        assert!(parse_directives("[ITEM: healing_potion x500]").is_empty());
    }

    #[test]
    fn test_roll_requests() {
        assert_eq!(
            parse_directives("[ROLL: perception DC 15]"),
            vec![Directive::RollRequest {
                skill: Skill::Perception,
                dc: 15
            }]
        );
        assert_eq!(
            parse_directives("[roll: Sleight of Hand 12]"),
            vec![Directive::RollRequest {
                skill: Skill::SleightOfHand,
                dc: 12
            }]
        );
        assert!(parse_directives("[ROLL: perception DC 31]").is_empty());
        assert!(parse_directives("[ROLL: perception DC 0]").is_empty());
        assert!(parse_directives("[ROLL: hacking DC 10]").is_empty());
        assert!(parse_directives("[ROLL: perception]").is_empty());
    }

    #[test]
    fn test_buy_and_recruit() {
        assert_eq!(
            parse_directives("[BUY: Longsword] [RECRUIT: Sister Mira]"),
            vec![
                Directive::Buy {
                    item_id: "longsword".to_string()
                },
                Directive::Recruit {
                    companion_id: "sister_mira".to_string()
                },
            ]
        );
        assert!(parse_directives("[BUY: castle]").is_empty());
        assert!(parse_directives("[RECRUIT: the king]").is_empty());
    }

    #[test]
    fn test_order_preserved_and_bad_tags_skipped() {
        let parsed = parse_narration(
            "You win! [GOLD: 10] [ITEM: unobtainium] [XP: 50] [DANCE: now] [ITEM: torch]",
        );
        assert_eq!(
            parsed.directives,
            vec![
                Directive::Gold(10),
                Directive::Xp(50),
                Directive::Item {
                    item_id: "torch".to_string(),
                    quantity: 1
                },
            ]
        );
        assert_eq!(parsed.rejected.len(), 1);
        assert_eq!(parsed.rejected[0].keyword, "ITEM");
        // Unknown keywords are left in the prose
        assert_eq!(parsed.text, "You win! [DANCE: now]");
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(parse_directives("[gold: 5]"), vec![Directive::Gold(5)]);
        assert_eq!(parse_directives("[ Gold : 5 ]"), vec![Directive::Gold(5)]);
    }

    #[test]
    fn test_tags_do_not_span_lines() {
        assert!(parse_directives("[GOLD: 5\n]").is_empty());
        assert!(parse_directives("[GOLD\n: 5]").is_empty());
    }

    #[test]
    fn test_stripped_text() {
        let parsed = parse_narration(
            "The chest creaks open. [GOLD: 25]  Inside, a potion. [ITEM: healing_potion]\nOnward!",
        );
        assert_eq!(parsed.text, "The chest creaks open. Inside, a potion.\nOnward!");
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let long = format!("[ITEM: {}]", "a".repeat(MAX_PAYLOAD_LEN + 1));
        let parsed = parse_narration(&long);
        assert!(parsed.directives.is_empty());
        assert_eq!(parsed.rejected.len(), 1);
        assert!(parsed.rejected[0].reason.contains("longer"));
    }

    #[test]
    fn test_hostile_payloads_never_match() {
        for hostile in [
            "[ITEM: ../../etc/passwd]",
            "[ITEM: '; DROP TABLE inventory; --]",
            "[RECRUIT: $(rm -rf /)]",
            "[BUY: {{7*7}}]",
            "[COMBAT: goblin; rm -rf /]",
            "[ROLL: `id` DC 10]",
            "[GOLD: 1e9]",
            "[GOLD: 0x10]",
        ] {
            let parsed = parse_narration(hostile);
            assert!(parsed.directives.is_empty(), "{hostile} was accepted");
        }
    }

    #[test]
    fn test_empty_and_tagless_text() {
        assert_eq!(parse_narration(""), ParsedNarration::default());
        let parsed = parse_narration("Just a quiet evening at the inn.");
        assert!(parsed.directives.is_empty());
        assert_eq!(parsed.text, "Just a quiet evening at the inn.");
    }
}
