//! GameSession - one player's game.
//!
//! A session owns the character, the recruited party, where they are, the
//! current encounter and the RNG that drives every roll. Narrator replies
//! come in through [`GameSession::process_narration`] (or
//! [`GameSession::take_turn`], which asks the narrator first); combat
//! actions go through [`GameSession::attack`], [`GameSession::defend`] and
//! [`GameSession::flee`].
//!
//! Hit points move between the character sheet and the encounter only at
//! the edges of a fight: copied in when it starts, written back when it
//! ends.

use crate::character::{Character, Skill};
use crate::combat::{CombatError, CombatStatus, Encounter, EncounterSetup, Surprise, TurnReport};
use crate::config::EngineConfig;
use crate::dice::{roll_dice_with, DiceRoll};
use crate::dm::narrator::{narrate_with_retry, NarrationRequest, Narrator, NarratorError};
use crate::dm::rewards::{apply_rewards, AppliedRewards, RewardContext};
use crate::dm::tags::{parse_narration, Directive, RejectedTag};
use crate::events::{GameEvents, NoEvents};
use crate::party::Party;
use crate::persist::{PersistError, SavedGame};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors from GameSession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Combat(#[from] CombatError),

    #[error(transparent)]
    Narrator(#[from] NarratorError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Cannot {0} during combat")]
    InCombat(&'static str),
}

/// Where the party currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    /// No natural light. Attacks from the party suffer without a torch.
    #[serde(default)]
    pub dark: bool,
}

impl Location {
    pub fn new(name: impl Into<String>, dark: bool) -> Self {
        Self {
            name: name.into(),
            dark,
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::new("The Rusty Dragon Inn", false)
    }
}

/// Result of a narrator-requested ability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillCheck {
    pub skill: Skill,
    pub dc: i32,
    pub roll: DiceRoll,
    pub success: bool,
}

impl fmt::Display for SkillCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} check: {} vs DC {} - {}",
            self.skill,
            self.roll,
            self.dc,
            if self.success { "success" } else { "failure" }
        )
    }
}

/// Experience and gold granted when an encounter is won.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VictorySpoils {
    pub xp: u32,
    pub gold: u32,
    /// Set if the character leveled up.
    pub new_level: Option<u8>,
}

/// The outcome of one combat step.
#[derive(Debug, Clone, PartialEq)]
pub struct CombatTurn {
    pub report: TurnReport,
    /// Present when this step ended the encounter.
    pub ended: Option<CombatStatus>,
    pub spoils: Option<VictorySpoils>,
}

/// Everything a narrator reply did to the game.
#[derive(Debug, Clone, Default)]
pub struct TurnOutcome {
    /// The reply with recognized tags removed.
    pub narration: String,
    pub rewards: AppliedRewards,
    pub checks: Vec<SkillCheck>,
    /// Encounters started or reinforced, in tag order.
    pub combat: Vec<CombatTurn>,
    /// Tags whose payload was invalid.
    pub rejected_tags: Vec<RejectedTag>,
    /// Combat tags that could not be carried out.
    pub combat_errors: Vec<(Directive, CombatError)>,
}

/// A single player's game.
pub struct GameSession {
    config: EngineConfig,
    rng: StdRng,
    character: Character,
    party: Party,
    location: Location,
    encounter: Option<Encounter>,
    events: Arc<dyn GameEvents>,
}

impl fmt::Debug for GameSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameSession")
            .field("character", &self.character.name)
            .field("party", &self.party.len())
            .field("location", &self.location)
            .field("combat", &self.combat_status())
            .finish()
    }
}

impl GameSession {
    /// Start a session for `character`. The RNG is seeded from the config
    /// when it carries a seed.
    pub fn new(character: Character, config: EngineConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng,
            character,
            party: Party::new(),
            location: Location::default(),
            encounter: None,
            events: Arc::new(NoEvents),
        }
    }

    /// Route quest and location notifications to `events`.
    pub fn with_events(mut self, events: Arc<dyn GameEvents>) -> Self {
        self.events = events;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn with_party(mut self, party: Party) -> Self {
        self.party = party;
        self
    }

    // ========================================================================
    // State Access
    // ========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    /// Direct access to the character sheet.
    pub fn character_mut(&mut self) -> &mut Character {
        &mut self.character
    }

    pub fn party(&self) -> &Party {
        &self.party
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// The current or most recent encounter.
    pub fn encounter(&self) -> Option<&Encounter> {
        self.encounter.as_ref()
    }

    /// `Idle` when no encounter has been started.
    pub fn combat_status(&self) -> CombatStatus {
        self.encounter
            .as_ref()
            .map(|e| e.status())
            .unwrap_or(CombatStatus::Idle)
    }

    pub fn in_combat(&self) -> bool {
        self.combat_status() == CombatStatus::Active
    }

    /// One-line summary handed to the narrator each turn.
    pub fn status_line(&self) -> String {
        let c = &self.character;
        let mut line = format!(
            "{} | Level {} | HP {}/{} | {} gp | {}",
            c.name,
            c.level,
            c.hit_points.current,
            c.hit_points.maximum,
            c.inventory.gold,
            self.location.name
        );
        if self.location.dark {
            line.push_str(if c.inventory.has_light_source() {
                " (dark, torch lit)"
            } else {
                " (dark)"
            });
        }
        if !self.party.is_empty() {
            let names: Vec<String> = self
                .party
                .members
                .iter()
                .map(|m| format!("{} {}/{}", m.name, m.hit_points.current, m.hit_points.maximum))
                .collect();
            line.push_str(&format!(" | Party: {}", names.join(", ")));
        }
        if let Some(encounter) = self.encounter.as_ref().filter(|e| e.status() == CombatStatus::Active) {
            let enemies: Vec<String> = encounter
                .living_enemies()
                .iter()
                .map(|e| format!("{} {}/{}", e.name, e.current_hp, e.max_hp))
                .collect();
            line.push_str(&format!(
                " | COMBAT round {}: HP {}, enemies {}",
                encounter.round(),
                encounter.player_hp().unwrap_or(0),
                enemies.join(", ")
            ));
        }
        line
    }

    // ========================================================================
    // Narration
    // ========================================================================

    /// Ask the narrator to continue the story, then apply its reply.
    ///
    /// A failed or empty reply, after retries, changes nothing.
    pub async fn take_turn(
        &mut self,
        narrator: &dyn Narrator,
        player_input: &str,
    ) -> Result<TurnOutcome, SessionError> {
        let request = NarrationRequest::new(player_input, self.status_line());
        let reply = narrate_with_retry(narrator, &request, &self.config.retry).await?;
        Ok(self.process_narration(&reply))
    }

    /// Parse a narrator reply and apply its tags in order.
    ///
    /// Each tag stands alone: a rejected reward or a combat tag that cannot
    /// start does not stop the tags after it.
    pub fn process_narration(&mut self, reply: &str) -> TurnOutcome {
        let parsed = parse_narration(reply);
        let mut outcome = TurnOutcome {
            narration: parsed.text,
            rejected_tags: parsed.rejected,
            ..TurnOutcome::default()
        };

        for directive in parsed.directives {
            match &directive {
                Directive::CombatStart { enemies, surprise } => {
                    let result = if self.in_combat() {
                        self.reinforce(enemies)
                    } else {
                        self.start_combat(enemies, *surprise)
                    };
                    match result {
                        Ok(turn) => outcome.combat.push(turn),
                        Err(SessionError::Combat(error)) => {
                            tracing::warn!(directive = %directive, error = %error, "Combat tag rejected");
                            outcome.combat_errors.push((directive.clone(), error));
                        }
                        Err(error) => {
                            tracing::warn!(directive = %directive, error = %error, "Combat tag failed");
                        }
                    }
                }
                Directive::RollRequest { skill, dc } => {
                    outcome.checks.push(self.skill_check(*skill, *dc));
                }
                _ => {
                    let context = RewardContext {
                        in_combat: self.in_combat(),
                        max_party_size: self.config.max_party_size,
                    };
                    let applied = apply_rewards(
                        std::slice::from_ref(&directive),
                        &mut self.character,
                        &mut self.party,
                        &context,
                    );
                    outcome.rewards.merge(applied);
                }
            }
        }

        outcome
    }

    /// Roll `1d20 + skill modifier` against a DC.
    pub fn skill_check(&mut self, skill: Skill, dc: i32) -> SkillCheck {
        let modifier = self.character.skill_modifier(skill);
        let d20 = roll_dice_with(&mut self.rng, "1d20");
        let roll = DiceRoll {
            total: d20.total + modifier,
            rolls: d20.rolls,
            modifier,
        };
        let success = roll.meets_dc(dc);
        tracing::debug!(skill = %skill, dc, total = roll.total, success, "Skill check");
        SkillCheck {
            skill,
            dc,
            roll,
            success,
        }
    }

    // ========================================================================
    // Combat
    // ========================================================================

    /// Start a fight against the given enemy type ids.
    pub fn start_combat(
        &mut self,
        enemies: &[String],
        surprise: Surprise,
    ) -> Result<CombatTurn, SessionError> {
        if self.in_combat() {
            return Err(CombatError::AlreadyInCombat.into());
        }
        let setup = EncounterSetup {
            player: &self.character,
            party: &self.party,
            enemies,
            surprise,
            darkness: self.location.dark,
            config: &self.config,
        };
        let (encounter, report) = Encounter::start(&mut self.rng, setup)?;
        self.encounter = Some(encounter);
        Ok(self.settle(report))
    }

    /// Bring more enemies into the current fight.
    pub fn reinforce(&mut self, enemies: &[String]) -> Result<CombatTurn, SessionError> {
        let encounter = self.encounter.as_mut().ok_or(CombatError::NotInCombat)?;
        let report = encounter.add_wave(&mut self.rng, enemies)?;
        Ok(self.settle(report))
    }

    /// Attack an enemy by name (`Goblin 2`), type id (`goblin`) or `#id`.
    pub fn attack(&mut self, target: &str) -> Result<CombatTurn, SessionError> {
        let encounter = active(&mut self.encounter)?;
        let id = encounter
            .find_enemy(target)
            .ok_or_else(|| CombatError::InvalidTarget(target.to_string()))?;
        let report = encounter.player_attack(&mut self.rng, id)?;
        Ok(self.settle(report))
    }

    pub fn defend(&mut self) -> Result<CombatTurn, SessionError> {
        let report = active(&mut self.encounter)?.player_defend(&mut self.rng)?;
        Ok(self.settle(report))
    }

    pub fn flee(&mut self) -> Result<CombatTurn, SessionError> {
        let report = active(&mut self.encounter)?.player_flee(&mut self.rng)?;
        Ok(self.settle(report))
    }

    /// Fire kill notifications and, if the fight just ended, write hit
    /// points back and hand out the spoils.
    fn settle(&mut self, report: TurnReport) -> CombatTurn {
        for enemy_type in report.defeated_enemies() {
            self.events.on_enemy_killed(&enemy_type);
        }

        let ended = report.ended();
        let spoils = match ended {
            Some(status) => self.conclude(status),
            None => None,
        };
        CombatTurn {
            report,
            ended,
            spoils,
        }
    }

    fn conclude(&mut self, status: CombatStatus) -> Option<VictorySpoils> {
        let encounter = self.encounter.as_ref()?;

        if let Some(hp) = encounter.player_hp() {
            self.character.hit_points.set_current(hp);
        }
        for (companion_id, hp) in encounter.ally_hp() {
            self.party.set_hp(&companion_id, hp);
        }

        tracing::info!(
            status = %status,
            rounds = encounter.round(),
            defeated = encounter.defeated_enemies().len(),
            hp = self.character.hit_points.current,
            "Combat ended"
        );

        if status != CombatStatus::Victory {
            return None;
        }

        let xp = encounter.xp_reward();
        let gold = encounter.loot_gold();
        let gain = self
            .character
            .gain_xp(i32::try_from(xp).unwrap_or(i32::MAX), "combat victory");
        self.character.inventory.add_gold(gold);

        Some(VictorySpoils {
            xp: gain.amount,
            gold,
            new_level: gain.leveled_up.then_some(gain.new_level),
        })
    }

    // ========================================================================
    // Exploration
    // ========================================================================

    /// Move to a new location.
    pub fn travel(&mut self, destination: impl Into<String>, dark: bool) -> Result<&Location, SessionError> {
        if self.in_combat() {
            return Err(SessionError::InCombat("travel"));
        }
        self.location = Location::new(destination, dark);
        tracing::info!(location = %self.location.name, dark, "Entered location");
        self.events.on_location_entered(&self.location.name);
        Ok(&self.location)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Write the character, party and location to a JSON save.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        if self.in_combat() {
            return Err(SessionError::InCombat("save"));
        }
        let saved = SavedGame::new(
            self.character.clone(),
            self.party.clone(),
            self.location.clone(),
        );
        saved.save_json(path).await?;
        Ok(())
    }

    /// Resume a saved game.
    pub async fn load(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self, SessionError> {
        let saved = SavedGame::load_json(path).await?;
        Ok(Self::new(saved.character, config)
            .with_party(saved.party)
            .with_location(saved.location))
    }
}

/// The running encounter. Borrows only the field, leaving the RNG free.
fn active(encounter: &mut Option<Encounter>) -> Result<&mut Encounter, CombatError> {
    let encounter = encounter.as_mut().ok_or(CombatError::NotInCombat)?;
    if encounter.status().is_terminal() {
        return Err(CombatError::EncounterOver(encounter.status()));
    }
    Ok(encounter)
}
