//! Hooks for quest, NPC and location tracking.
//!
//! The engine reports what happened; whatever listens decides what it
//! means. Calls are fire-and-forget and cannot fail the action that
//! triggered them.

use std::sync::{Arc, Mutex};

/// Receives notifications about world events.
pub trait GameEvents: Send + Sync {
    /// An enemy died in combat.
    fn on_enemy_killed(&self, _enemy_type_id: &str) {}

    /// The player arrived somewhere.
    fn on_location_entered(&self, _location: &str) {}
}

/// Listener that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl GameEvents for NoEvents {}

/// A recorded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    EnemyKilled(String),
    LocationEntered(String),
}

/// Listener that keeps every notification, for tests and quest logs.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Arc<Mutex<Vec<GameEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<GameEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn enemies_killed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                GameEvent::EnemyKilled(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: GameEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

impl GameEvents for EventLog {
    fn on_enemy_killed(&self, enemy_type_id: &str) {
        self.push(GameEvent::EnemyKilled(enemy_type_id.to_string()));
    }

    fn on_location_entered(&self, location: &str) {
        self.push(GameEvent::LocationEntered(location.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_log_records_in_order() {
        let log = EventLog::new();
        let shared = log.clone();

        shared.on_location_entered("Goblin Cave");
        shared.on_enemy_killed("goblin");
        shared.on_enemy_killed("goblin_boss");

        assert_eq!(
            log.events(),
            vec![
                GameEvent::LocationEntered("Goblin Cave".to_string()),
                GameEvent::EnemyKilled("goblin".to_string()),
                GameEvent::EnemyKilled("goblin_boss".to_string()),
            ]
        );
        assert_eq!(log.enemies_killed(), vec!["goblin", "goblin_boss"]);
    }

    #[test]
    fn test_no_events_is_silent() {
        NoEvents.on_enemy_killed("goblin");
        NoEvents.on_location_entered("Town");
    }
}
