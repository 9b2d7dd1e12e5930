//! The combat state machine.
//!
//! An [`Encounter`] is created `Active` and ends in exactly one of
//! `Victory`, `Defeat` or `Fled`. The player acts through
//! [`Encounter::player_attack`], [`Encounter::player_defend`] and
//! [`Encounter::player_flee`]; after each of those the encounter plays
//! every companion and enemy turn up to the player's next turn, so callers
//! only ever see the encounter waiting on the player or finished.

use super::attack::{roll_attack_with_bonus, AttackConditions, AttackResult};
use super::combatant::{Combatant, CombatantId, CombatantRole};
use super::damage::{apply_damage, apply_healing, roll_damage, DamageResult};
use super::initiative::{determine_turn_order, reroll_turn_order};
use super::policy::{check_flanking, enemy_target, party_member_action, PartyAction};
use super::{CombatError, CombatStatus};
use crate::bestiary::{get_enemy, EnemyDef};
use crate::character::Character;
use crate::config::EngineConfig;
use crate::dice::{roll_dice_with, DiceRoll};
use crate::items::normalize_id;
use crate::party::{Party, SupportAbility};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Who, if anyone, was caught off guard. Only affects round 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Surprise {
    #[default]
    None,
    /// The party struck first: its attacks have advantage.
    PartyAmbush,
    /// The party walked into an ambush: enemy attacks have advantage.
    EnemyAmbush,
}

/// Everything needed to start an encounter.
#[derive(Debug, Clone)]
pub struct EncounterSetup<'a> {
    pub player: &'a Character,
    pub party: &'a Party,
    /// Enemy type ids, one entry per creature.
    pub enemies: &'a [String],
    pub surprise: Surprise,
    /// The fight takes place somewhere dark.
    pub darkness: bool,
    pub config: &'a EngineConfig,
}

/// Something that happened during a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum CombatEvent {
    RoundStarted(u32),
    Attack {
        attacker: String,
        target: String,
        result: AttackResult,
        damage: Option<DamageResult>,
    },
    Defeated {
        name: String,
        /// Enemy type id, for enemies.
        enemy_type: Option<String>,
    },
    Defend {
        name: String,
    },
    Support {
        user: String,
        ability: SupportAbility,
        target: String,
        healed: i32,
    },
    FleeAttempt {
        roll: DiceRoll,
        dc: i32,
        success: bool,
    },
    Reinforcements {
        names: Vec<String>,
    },
    Ended(CombatStatus),
}

impl fmt::Display for CombatEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombatEvent::RoundStarted(round) => write!(f, "-- Round {round} --"),
            CombatEvent::Attack {
                attacker,
                target,
                result,
                damage,
            } => {
                write!(f, "{attacker} attacks {target}: {result}")?;
                if let Some(d) = damage {
                    write!(
                        f,
                        " for {} damage ({}/{} HP)",
                        d.roll.total, d.hp_after, d.max_hp
                    )?;
                }
                Ok(())
            }
            CombatEvent::Defeated { name, .. } => write!(f, "{name} falls!"),
            CombatEvent::Defend { name } => write!(f, "{name} takes a defensive stance"),
            CombatEvent::Support {
                user,
                ability,
                target,
                healed,
            } => match ability {
                SupportAbility::ShieldWall => {
                    write!(f, "{user} uses {ability} to protect {target}")
                }
                _ => write!(f, "{user} uses {ability} on {target}, healing {healed} HP"),
            },
            CombatEvent::FleeAttempt { roll, dc, success } => {
                let outcome = if *success { "escape!" } else { "can't get away" };
                write!(f, "Flee attempt: {roll} vs DC {dc}, {outcome}")
            }
            CombatEvent::Reinforcements { names } => {
                write!(f, "Reinforcements arrive: {}", names.join(", "))
            }
            CombatEvent::Ended(status) => match status {
                CombatStatus::Victory => write!(f, "Victory!"),
                CombatStatus::Defeat => write!(f, "You have been defeated."),
                CombatStatus::Fled => write!(f, "You escaped the fight."),
                other => write!(f, "Combat {other}"),
            },
        }
    }
}

/// What happened between the player's turns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnReport {
    pub events: Vec<CombatEvent>,
}

impl TurnReport {
    fn push(&mut self, event: CombatEvent) {
        tracing::debug!(event = %event, "Combat event");
        self.events.push(event);
    }

    /// Enemy type ids killed during this report, in order.
    pub fn defeated_enemies(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                CombatEvent::Defeated {
                    enemy_type: Some(t),
                    ..
                } => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    /// How the encounter ended, if it ended during this report.
    pub fn ended(&self) -> Option<CombatStatus> {
        self.events.iter().find_map(|e| match e {
            CombatEvent::Ended(status) => Some(*status),
            _ => None,
        })
    }

    /// One line per event.
    pub fn narrative(&self) -> String {
        self.events
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A single fight.
#[derive(Debug, Clone)]
pub struct Encounter {
    /// Turn order, highest initiative first.
    combatants: Vec<Combatant>,
    current_turn: usize,
    round: u32,
    status: CombatStatus,
    surprise: Surprise,
    unlit_darkness: bool,
    /// Declared enemy type ids, reinforcements included.
    enemy_roster: Vec<String>,
    /// Enemy type ids in the order they died.
    defeated_enemies: Vec<String>,
    /// Which enemy each party member is going after this round.
    declared_targets: HashMap<CombatantId, CombatantId>,
    support_uses: HashMap<CombatantId, u32>,
    /// Protected combatant -> protector. Lasts until the protector's next turn.
    protected: HashMap<CombatantId, CombatantId>,
    /// Defending until their own next turn.
    defending: HashSet<CombatantId>,
    flee_dc: i32,
    critical_hp_ratio: f32,
    max_enemies: usize,
    next_id: u32,
}

impl Encounter {
    /// Validate the roster, roll initiative and play out any turns that
    /// come before the player's first.
    pub fn start<R: Rng + ?Sized>(
        rng: &mut R,
        setup: EncounterSetup<'_>,
    ) -> Result<(Self, TurnReport), CombatError> {
        let defs = validate_roster(setup.enemies, setup.config.max_enemies, 0)?;
        if setup.player.hit_points.current <= 0 {
            return Err(CombatError::PlayerIncapacitated);
        }

        let mut next_id = 0;
        let mut issue = || {
            let id = CombatantId(next_id);
            next_id += 1;
            id
        };

        let player = Combatant::player(issue(), setup.player);
        let allies: Vec<Combatant> = setup
            .party
            .living_members()
            .map(|m| Combatant::ally(issue(), m))
            .collect();
        let names = enemy_names(&defs, &[]);
        let enemies: Vec<Combatant> = defs
            .iter()
            .zip(names)
            .map(|(def, name)| Combatant::enemy(issue(), def, name))
            .collect();

        let support_uses = allies
            .iter()
            .filter(|a| matches!(a.role, CombatantRole::Ally { support: Some(_), .. }))
            .map(|a| (a.id, 1))
            .collect();

        let combatants = determine_turn_order(rng, Some(player), enemies, allies);

        let mut encounter = Self {
            combatants,
            current_turn: 0,
            round: 1,
            status: CombatStatus::Active,
            surprise: setup.surprise,
            unlit_darkness: setup.darkness && !setup.player.inventory.has_light_source(),
            enemy_roster: defs.iter().map(|d| d.id.to_string()).collect(),
            defeated_enemies: Vec::new(),
            declared_targets: HashMap::new(),
            support_uses,
            protected: HashMap::new(),
            defending: HashSet::new(),
            flee_dc: setup.config.flee_dc,
            critical_hp_ratio: setup.config.critical_hp_ratio,
            max_enemies: setup.config.max_enemies,
            next_id,
        };

        tracing::info!(
            enemies = ?encounter.enemy_roster,
            surprise = ?encounter.surprise,
            darkness = encounter.unlit_darkness,
            "Combat started"
        );

        let mut report = TurnReport::default();
        report.push(CombatEvent::RoundStarted(1));
        encounter.declare_ally_targets();
        let first = encounter.combatants[0].id;
        encounter.begin_turn(first);
        encounter.run_npc_turns(rng, &mut report);
        Ok((encounter, report))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn status(&self) -> CombatStatus {
        self.status
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn current_turn(&self) -> usize {
        self.current_turn
    }

    pub fn surprise(&self) -> Surprise {
        self.surprise
    }

    /// Combatants in turn order, the fallen included.
    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    pub fn current_combatant(&self) -> Option<&Combatant> {
        self.combatants.get(self.current_turn)
    }

    pub fn is_player_turn(&self) -> bool {
        self.status == CombatStatus::Active
            && self.current_combatant().map(|c| c.is_player()).unwrap_or(false)
    }

    pub fn get(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    pub fn player(&self) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.is_player())
    }

    pub fn allies(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.iter().filter(|c| c.is_ally())
    }

    /// Living enemies, in the order they were declared.
    pub fn living_enemies(&self) -> Vec<&Combatant> {
        let mut enemies: Vec<&Combatant> = self
            .combatants
            .iter()
            .filter(|c| c.is_enemy() && !c.is_dead())
            .collect();
        enemies.sort_by_key(|c| c.id);
        enemies
    }

    pub fn enemy_roster(&self) -> &[String] {
        &self.enemy_roster
    }

    pub fn defeated_enemies(&self) -> &[String] {
        &self.defeated_enemies
    }

    /// Who the given party member is going after.
    pub fn declared_target(&self, id: CombatantId) -> Option<CombatantId> {
        self.declared_targets.get(&id).copied()
    }

    pub fn support_uses_left(&self, id: CombatantId) -> u32 {
        self.support_uses.get(&id).copied().unwrap_or(0)
    }

    pub fn is_defending(&self, id: CombatantId) -> bool {
        self.defending.contains(&id)
    }

    pub fn is_protected(&self, id: CombatantId) -> bool {
        self.protected.contains_key(&id)
    }

    /// Resolve a living enemy from a name, type id or `#id` the player typed.
    /// A bare type id picks the first living creature of that type.
    pub fn find_enemy(&self, name: &str) -> Option<CombatantId> {
        let trimmed = name.trim();
        if let Some(id) = trimmed
            .strip_prefix('#')
            .and_then(|n| n.parse::<u32>().ok())
        {
            return self
                .living_enemies()
                .into_iter()
                .find(|c| c.id.0 == id)
                .map(|c| c.id);
        }

        let key = normalize_id(trimmed);
        let living = self.living_enemies();
        living
            .iter()
            .find(|c| normalize_id(&c.name) == key)
            .or_else(|| living.iter().find(|c| c.enemy_type() == Some(key.as_str())))
            .map(|c| c.id)
    }

    /// Experience for every enemy killed so far.
    pub fn xp_reward(&self) -> u32 {
        self.defeated_enemies
            .iter()
            .filter_map(|id| get_enemy(id))
            .map(|def| def.xp)
            .sum()
    }

    /// Gold carried by every enemy killed so far.
    pub fn loot_gold(&self) -> u32 {
        self.defeated_enemies
            .iter()
            .filter_map(|id| get_enemy(id))
            .map(|def| def.loot_gold)
            .sum()
    }

    /// Final HP of the player.
    pub fn player_hp(&self) -> Option<i32> {
        self.player().map(|p| p.current_hp)
    }

    /// Final HP of each companion, by companion id.
    pub fn ally_hp(&self) -> Vec<(String, i32)> {
        self.allies()
            .filter_map(|c| match &c.role {
                CombatantRole::Ally { companion_id, .. } => {
                    Some((companion_id.clone(), c.current_hp))
                }
                _ => None,
            })
            .collect()
    }

    // ========================================================================
    // Player actions
    // ========================================================================

    /// The player attacks an enemy.
    pub fn player_attack<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        target: CombatantId,
    ) -> Result<TurnReport, CombatError> {
        let player_id = self.ensure_player_turn()?;
        let valid = self
            .get(target)
            .map(|t| t.is_enemy() && !t.is_dead())
            .unwrap_or(false);
        if !valid {
            return Err(CombatError::InvalidTarget(target.to_string()));
        }

        let mut report = TurnReport::default();
        self.declared_targets.insert(player_id, target);
        self.resolve_attack(rng, player_id, target, &mut report);
        self.finish_turn(rng, &mut report);
        Ok(report)
    }

    /// The player braces: attacks against them roll with disadvantage until
    /// their next turn.
    pub fn player_defend<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<TurnReport, CombatError> {
        let player_id = self.ensure_player_turn()?;
        let mut report = TurnReport::default();
        self.defending.insert(player_id);
        let name = self.name_of(player_id);
        report.push(CombatEvent::Defend { name });
        self.finish_turn(rng, &mut report);
        Ok(report)
    }

    /// The player tries to escape with a Dexterity check against the flee
    /// DC. Failing costs the turn.
    pub fn player_flee<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<TurnReport, CombatError> {
        let player_id = self.ensure_player_turn()?;
        let dex = self.get(player_id).map(|p| p.dex_modifier).unwrap_or(0);

        let d20 = roll_dice_with(rng, "1d20");
        let roll = DiceRoll {
            total: d20.total + dex,
            rolls: d20.rolls,
            modifier: dex,
        };
        let success = roll.meets_dc(self.flee_dc);

        let mut report = TurnReport::default();
        report.push(CombatEvent::FleeAttempt {
            roll,
            dc: self.flee_dc,
            success,
        });

        if success {
            self.end(CombatStatus::Fled, &mut report);
        } else {
            self.finish_turn(rng, &mut report);
        }
        Ok(report)
    }

    /// Bring more enemies into an active fight. Everyone still standing
    /// rerolls initiative; the round count carries on.
    pub fn add_wave<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        enemies: &[String],
    ) -> Result<TurnReport, CombatError> {
        if self.status != CombatStatus::Active {
            return Err(CombatError::EncounterOver(self.status));
        }
        let living = self.living_enemies().len();
        let defs = validate_roster(enemies, self.max_enemies, living)?;

        let existing: Vec<String> = self.combatants.iter().map(|c| c.name.clone()).collect();
        let names = enemy_names(&defs, &existing);
        let mut newcomers = Vec::with_capacity(defs.len());
        for (def, name) in defs.iter().zip(names) {
            let id = CombatantId(self.next_id);
            self.next_id += 1;
            newcomers.push(Combatant::enemy(id, def, name));
        }
        self.enemy_roster.extend(defs.iter().map(|d| d.id.to_string()));

        let mut report = TurnReport::default();
        report.push(CombatEvent::Reinforcements {
            names: newcomers.iter().map(|c| c.name.clone()).collect(),
        });

        // The fallen stay listed (at the back) for HP write-back.
        let (fallen, standing): (Vec<Combatant>, Vec<Combatant>) = self
            .combatants
            .drain(..)
            .chain(newcomers)
            .partition(|c| c.is_dead());
        self.combatants = reroll_turn_order(rng, standing);
        self.combatants.extend(fallen);
        self.current_turn = 0;

        tracing::info!(round = self.round, enemies = enemies.len(), "Reinforcements joined combat");

        let first = self.combatants[0].id;
        self.begin_turn(first);
        self.run_npc_turns(rng, &mut report);
        Ok(report)
    }

    // ========================================================================
    // Turn flow
    // ========================================================================

    fn ensure_player_turn(&self) -> Result<CombatantId, CombatError> {
        if self.status != CombatStatus::Active {
            return Err(CombatError::EncounterOver(self.status));
        }
        match self.current_combatant() {
            Some(c) if c.is_player() => Ok(c.id),
            _ => Err(CombatError::NotPlayerTurn),
        }
    }

    fn finish_turn<R: Rng + ?Sized>(&mut self, rng: &mut R, report: &mut TurnReport) {
        if self.check_outcome(report) {
            return;
        }
        self.advance(report);
        self.run_npc_turns(rng, report);
    }

    /// Play companion and enemy turns until the player is up or the fight
    /// is over.
    fn run_npc_turns<R: Rng + ?Sized>(&mut self, rng: &mut R, report: &mut TurnReport) {
        while self.status == CombatStatus::Active {
            let Some(current) = self.current_combatant() else {
                break;
            };
            if current.is_player() {
                break;
            }
            let (id, is_ally) = (current.id, current.is_ally());
            if is_ally {
                self.ally_turn(rng, id, report);
            } else {
                self.enemy_turn(rng, id, report);
            }
            if self.check_outcome(report) {
                break;
            }
            self.advance(report);
        }
    }

    /// Move to the next living combatant, starting a new round on wrap.
    fn advance(&mut self, report: &mut TurnReport) {
        let len = self.combatants.len();
        for _ in 0..len {
            self.current_turn += 1;
            if self.current_turn >= len {
                self.current_turn = 0;
                self.round += 1;
                report.push(CombatEvent::RoundStarted(self.round));
                self.declare_ally_targets();
            }
            if !self.combatants[self.current_turn].is_dead() {
                break;
            }
        }
        let id = self.combatants[self.current_turn].id;
        self.begin_turn(id);
    }

    /// Effects that last "until your next turn" end here.
    fn begin_turn(&mut self, id: CombatantId) {
        self.defending.remove(&id);
        self.protected.retain(|_, protector| *protector != id);
    }

    fn ally_turn<R: Rng + ?Sized>(&mut self, rng: &mut R, id: CombatantId, report: &mut TurnReport) {
        let Some(ally) = self.get(id) else {
            return;
        };
        let enemies = self.living_enemies();
        let party: Vec<&Combatant> = self.combatants.iter().filter(|c| c.is_party()).collect();
        let action = party_member_action(
            ally,
            &enemies,
            &party,
            self.support_uses_left(id),
            self.critical_hp_ratio,
        );

        match action {
            PartyAction::Attack { target } => {
                self.declared_targets.insert(id, target);
                self.resolve_attack(rng, id, target, report);
            }
            PartyAction::Support { ability, target } => {
                if let Some(uses) = self.support_uses.get_mut(&id) {
                    *uses = uses.saturating_sub(1);
                }
                self.use_support(rng, id, ability, target, report);
            }
            PartyAction::Hold => {}
        }
    }

    fn enemy_turn<R: Rng + ?Sized>(&mut self, rng: &mut R, id: CombatantId, report: &mut TurnReport) {
        let party: Vec<&Combatant> = self.combatants.iter().filter(|c| c.is_party()).collect();
        if let Some(target) = enemy_target(&party) {
            self.resolve_attack(rng, id, target, report);
        }
    }

    fn use_support<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        user: CombatantId,
        ability: SupportAbility,
        target: CombatantId,
        report: &mut TurnReport,
    ) {
        let healed = match ability {
            SupportAbility::ShieldWall => {
                self.protected.insert(target, user);
                0
            }
            SupportAbility::HealingWord => {
                let amount = roll_dice_with(rng, SupportAbility::HEALING_WORD_DICE).total;
                self.heal(target, amount)
            }
            SupportAbility::LayOnHands => self.heal(target, SupportAbility::LAY_ON_HANDS_AMOUNT),
        };
        let event = CombatEvent::Support {
            user: self.name_of(user),
            ability,
            target: self.name_of(target),
            healed,
        };
        tracing::info!(event = %event, "Support ability used");
        report.push(event);
    }

    fn heal(&mut self, target: CombatantId, amount: i32) -> i32 {
        match self.combatants.iter_mut().find(|c| c.id == target) {
            Some(c) => apply_healing(&mut c.current_hp, c.max_hp, amount),
            None => 0,
        }
    }

    fn attack_conditions(&self, attacker: &Combatant, target: &Combatant) -> AttackConditions {
        let first_round = self.round == 1;
        if attacker.is_party() {
            let on_target = self
                .combatants
                .iter()
                .filter(|c| c.is_party() && !c.is_dead())
                .filter(|c| self.declared_targets.get(&c.id) == Some(&target.id))
                .count();
            AttackConditions {
                unlit_darkness: self.unlit_darkness,
                surprise: first_round && self.surprise == Surprise::PartyAmbush,
                flanking: check_flanking(on_target),
                target_defending: self.defending.contains(&target.id),
                target_protected: self.protected.contains_key(&target.id),
            }
        } else {
            AttackConditions {
                unlit_darkness: false,
                surprise: first_round && self.surprise == Surprise::EnemyAmbush,
                flanking: false,
                target_defending: self.defending.contains(&target.id),
                target_protected: self.protected.contains_key(&target.id),
            }
        }
    }

    fn resolve_attack<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        attacker_id: CombatantId,
        target_id: CombatantId,
        report: &mut TurnReport,
    ) {
        let (Some(attacker), Some(target)) = (self.get(attacker_id), self.get(target_id)) else {
            return;
        };
        let advantage = self.attack_conditions(attacker, target).advantage();
        let result = roll_attack_with_bonus(rng, attacker.attack_bonus, target.armor_class, advantage);
        let attacker_name = attacker.name.clone();
        let damage_dice = attacker.damage_dice.clone();
        let damage_modifier = attacker.damage_modifier;

        let damage = if result.hit {
            let roll = roll_damage(rng, &damage_dice, damage_modifier, result.is_crit);
            self.combatants
                .iter_mut()
                .find(|c| c.id == target_id)
                .map(|t| apply_damage(&mut t.current_hp, t.max_hp, roll))
        } else {
            None
        };
        let defeated = damage.as_ref().map(|d| d.defeated).unwrap_or(false);

        report.push(CombatEvent::Attack {
            attacker: attacker_name,
            target: self.name_of(target_id),
            result,
            damage,
        });

        if defeated {
            self.on_defeated(target_id, report);
        }
    }

    fn on_defeated(&mut self, id: CombatantId, report: &mut TurnReport) {
        let Some(fallen) = self.get(id) else {
            return;
        };
        let enemy_type = fallen.enemy_type().map(str::to_string);
        let name = fallen.name.clone();

        if let Some(t) = &enemy_type {
            self.defeated_enemies.push(t.clone());
        }
        self.declared_targets.retain(|_, target| *target != id);
        self.declared_targets.remove(&id);
        self.protected.remove(&id);
        self.protected.retain(|_, protector| *protector != id);
        self.defending.remove(&id);

        report.push(CombatEvent::Defeated { name, enemy_type });
    }

    /// End the encounter if a side is out. Returns true if it ended.
    fn check_outcome(&mut self, report: &mut TurnReport) -> bool {
        if self.status != CombatStatus::Active {
            return true;
        }
        let player_down = self.player().map(|p| p.is_dead()).unwrap_or(true);
        let enemies_down = self
            .combatants
            .iter()
            .filter(|c| c.is_enemy())
            .all(|c| c.is_dead());

        if player_down {
            self.end(CombatStatus::Defeat, report);
            true
        } else if enemies_down {
            self.end(CombatStatus::Victory, report);
            true
        } else {
            false
        }
    }

    fn end(&mut self, status: CombatStatus, report: &mut TurnReport) {
        self.status = status;
        self.defending.clear();
        self.protected.clear();
        report.push(CombatEvent::Ended(status));
        tracing::info!(
            status = %status,
            round = self.round,
            defeated = self.defeated_enemies.len(),
            "Combat ended"
        );
    }

    /// Allies pick this round's target, which is what flanking counts.
    fn declare_ally_targets(&mut self) {
        let enemies = self.living_enemies();
        let Some(target) = enemies
            .iter()
            .copied()
            .fold(None, |best: Option<&Combatant>, c| match best {
                Some(b) if b.current_hp <= c.current_hp => Some(b),
                _ => Some(c),
            })
            .map(|c| c.id)
        else {
            return;
        };
        let allies: Vec<CombatantId> = self
            .combatants
            .iter()
            .filter(|c| c.is_ally() && !c.is_dead())
            .map(|c| c.id)
            .collect();
        for ally in allies {
            self.declared_targets.insert(ally, target);
        }
    }

    fn name_of(&self, id: CombatantId) -> String {
        self.get(id).map(|c| c.name.clone()).unwrap_or_default()
    }
}

/// Check a roster against the bestiary and the enemy cap.
fn validate_roster(
    enemies: &[String],
    max: usize,
    already_fighting: usize,
) -> Result<Vec<&'static EnemyDef>, CombatError> {
    if enemies.is_empty() {
        return Err(CombatError::EmptyRoster);
    }
    let count = enemies.len() + already_fighting;
    if count > max {
        return Err(CombatError::TooManyEnemies { count, max });
    }
    enemies
        .iter()
        .map(|id| get_enemy(id).ok_or_else(|| CombatError::UnknownEnemy(id.clone())))
        .collect()
}

/// Display names: "Goblin" for a lone creature, "Goblin 1", "Goblin 2"...
/// when several share a type. Numbering skips names already in `taken`.
fn enemy_names(defs: &[&EnemyDef], taken: &[String]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for def in defs {
        *counts.entry(def.id).or_default() += 1;
    }

    let mut next: HashMap<&str, usize> = HashMap::new();
    defs.iter()
        .map(|def| {
            let bare_taken = taken.iter().any(|t| t == def.name);
            if counts.get(def.id).copied().unwrap_or(0) == 1
                && !bare_taken
                && !taken.iter().any(|t| is_numbered(t, def.name))
            {
                return def.name.to_string();
            }
            let n = next
                .entry(def.id)
                .or_insert(if bare_taken { 2 } else { 1 });
            loop {
                let candidate = format!("{} {}", def.name, n);
                *n += 1;
                if !taken.contains(&candidate) {
                    return candidate;
                }
            }
        })
        .collect()
}

/// `"Goblin 3"` is a numbered `"Goblin"`; `"Goblin Boss"` is not.
fn is_numbered(name: &str, base: &str) -> bool {
    name.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix(' '))
        .map(|n| n.parse::<u32>().is_ok())
        .unwrap_or(false)
}
