//! Testing utilities for deterministic game scenarios.
//!
//! Provides a scripted narrator and a harness that drives a seeded
//! [`GameSession`], so tests can play out turns without any external
//! storyteller.
//!
//! # Example
//!
//! ```ignore
//! use dnd_engine::testing::{assert_gold, TestHarness};
//!
//! let mut harness = TestHarness::new();
//! harness.expect_reply("You find a purse. [GOLD: 10]");
//! harness.input("search the body").await?;
//! assert_gold(&harness, 25);
//! ```

use crate::character::{create_sample_fighter, Character};
use crate::combat::CombatStatus;
use crate::config::{EngineConfig, RetryPolicy};
use crate::dm::narrator::{NarrationRequest, Narrator, NarratorError};
use crate::session::{GameSession, SessionError, TurnOutcome};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A narrator that plays back queued replies in order.
///
/// Once the script runs out every call fails with
/// [`NarratorError::Unavailable`].
#[derive(Debug, Default)]
pub struct ScriptedNarrator {
    replies: Mutex<VecDeque<Result<String, NarratorError>>>,
    requests: Mutex<Vec<NarrationRequest>>,
    calls: AtomicUsize,
}

impl ScriptedNarrator {
    pub fn new(replies: Vec<Result<String, NarratorError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Append a successful reply.
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.push(Ok(reply.into()));
    }

    /// Append a failure.
    pub fn push_error(&self, error: NarratorError) {
        self.push(Err(error));
    }

    fn push(&self, reply: Result<String, NarratorError>) {
        match self.replies.lock() {
            Ok(mut replies) => replies.push_back(reply),
            Err(poisoned) => poisoned.into_inner().push_back(reply),
        }
    }

    /// How many times `narrate` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, oldest first.
    pub fn requests(&self) -> Vec<NarrationRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Narrator for ScriptedNarrator {
    async fn narrate(&self, request: &NarrationRequest) -> Result<String, NarratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.requests.lock() {
            Ok(mut requests) => requests.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }
        let next = match self.replies.lock() {
            Ok(mut replies) => replies.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        next.unwrap_or_else(|| Err(NarratorError::Unavailable("script exhausted".to_string())))
    }
}

/// Test harness for running game scenarios.
pub struct TestHarness {
    /// The scripted narrator.
    pub narrator: ScriptedNarrator,
    /// The session under test.
    pub session: GameSession,
}

impl TestHarness {
    /// A seeded session with a sample fighter. Narrator retries do not
    /// sleep.
    pub fn new() -> Self {
        Self::with_character(create_sample_fighter("Test Hero"))
    }

    /// A harness with a custom character.
    pub fn with_character(character: Character) -> Self {
        let config = EngineConfig::default()
            .with_seed(42)
            .with_retry_policy(RetryPolicy::immediate(3));
        Self::with_config(character, config)
    }

    pub fn with_config(character: Character, config: EngineConfig) -> Self {
        Self {
            narrator: ScriptedNarrator::default(),
            session: GameSession::new(character, config),
        }
    }

    /// Queue a narrator reply.
    pub fn expect_reply(&mut self, reply: impl Into<String>) -> &mut Self {
        self.narrator.push_reply(reply);
        self
    }

    /// Queue a narrator failure.
    pub fn expect_failure(&mut self, error: NarratorError) -> &mut Self {
        self.narrator.push_error(error);
        self
    }

    /// Send player input through the scripted narrator.
    pub async fn input(&mut self, text: &str) -> Result<TurnOutcome, SessionError> {
        self.session.take_turn(&self.narrator, text).await
    }

    /// Current player HP as (current, max). Reads the encounter while a
    /// fight is running.
    pub fn player_hp(&self) -> (i32, i32) {
        let hp = &self.session.character().hit_points;
        let current = self
            .session
            .encounter()
            .filter(|e| e.status() == CombatStatus::Active)
            .and_then(|e| e.player_hp())
            .unwrap_or(hp.current);
        (current, hp.maximum)
    }

    pub fn gold(&self) -> u32 {
        self.session.character().inventory.gold
    }

    pub fn in_combat(&self) -> bool {
        self.session.in_combat()
    }

    /// Attack the first living enemy until the encounter ends or `max_turns`
    /// attacks have been made. Returns the final status.
    pub fn fight(&mut self, max_turns: usize) -> Result<CombatStatus, SessionError> {
        for _ in 0..max_turns {
            let Some(target) = self
                .session
                .encounter()
                .filter(|e| e.status() == CombatStatus::Active)
                .and_then(|e| e.living_enemies().first().map(|c| format!("#{}", c.id.0)))
            else {
                break;
            };
            self.session.attack(&target)?;
        }
        Ok(self.session.combat_status())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert player HP is at expected values.
#[track_caller]
pub fn assert_hp(harness: &TestHarness, current: i32, max: i32) {
    let (actual_current, actual_max) = harness.player_hp();
    assert_eq!(
        (actual_current, actual_max),
        (current, max),
        "Expected HP {current}/{max}, got {actual_current}/{actual_max}"
    );
}

/// Assert the player carries exactly this much gold.
#[track_caller]
pub fn assert_gold(harness: &TestHarness, expected: u32) {
    let actual = harness.gold();
    assert_eq!(actual, expected, "Expected {expected} gold, got {actual}");
}

/// Assert the player carries at least one of an item.
#[track_caller]
pub fn assert_has_item(harness: &TestHarness, item_id: &str) {
    assert!(
        harness.session.character().inventory.count(item_id) > 0,
        "Expected inventory to contain '{item_id}'"
    );
}

/// Assert the session's combat status.
#[track_caller]
pub fn assert_combat_status(harness: &TestHarness, expected: CombatStatus) {
    let actual = harness.session.combat_status();
    assert_eq!(actual, expected, "Expected combat status {expected}, got {actual}");
}

/// Assert player is in combat.
#[track_caller]
pub fn assert_in_combat(harness: &TestHarness) {
    assert!(harness.in_combat(), "Expected to be in combat");
}

/// Assert player is NOT in combat.
#[track_caller]
pub fn assert_not_in_combat(harness: &TestHarness) {
    assert!(!harness.in_combat(), "Expected to NOT be in combat");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::HitPoints;

    #[tokio::test]
    async fn test_scripted_reply_applies() {
        let mut harness = TestHarness::new();
        harness.expect_reply("You stand in a dusty tavern. [GOLD: 10]");

        let outcome = harness.input("I look around").await.unwrap();
        assert_eq!(outcome.narration, "You stand in a dusty tavern.");
        assert_gold(&harness, 25);
        assert_not_in_combat(&harness);
    }

    #[tokio::test]
    async fn test_request_carries_status_line() {
        let mut harness = TestHarness::new();
        harness.expect_reply("Nothing happens.");
        harness.input("wait").await.unwrap();

        let requests = harness.narrator.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].player_input, "wait");
        assert!(requests[0].status.contains("Test Hero"));
    }

    #[tokio::test]
    async fn test_exhausted_script_fails() {
        let mut harness = TestHarness::new();
        assert!(harness.input("hello?").await.is_err());
        assert_eq!(harness.narrator.calls(), 3);
    }

    #[tokio::test]
    async fn test_harness_combat_flow() {
        let mut character = create_sample_fighter("Test Hero");
        character.hit_points = HitPoints::new(500);
        let mut harness = TestHarness::with_character(character);
        harness.expect_reply("A goblin leaps from the shadows! [COMBAT: goblin]");

        harness.input("I open the door").await.unwrap();
        assert_in_combat(&harness);

        let status = harness.fight(100).unwrap();
        assert_eq!(status, CombatStatus::Victory);
        assert_combat_status(&harness, CombatStatus::Victory);
        assert_gold(&harness, 17);
    }

    #[tokio::test]
    async fn test_item_reward() {
        let mut harness = TestHarness::new();
        harness.expect_reply("The shopkeeper hands you a torch. [ITEM: torch]");
        harness.input("ask for light").await.unwrap();
        assert_has_item(&harness, "torch");
    }

    #[test]
    fn test_full_hp_at_start() {
        let harness = TestHarness::new();
        assert_hp(&harness, 28, 28);
    }
}
