//! D&D 5e combat and narrator-tag engine.
//!
//! This crate provides:
//! - Dice notation parsing and rolling with advantage/disadvantage
//! - Turn-based combat with companions, enemy waves and fleeing
//! - A parser for the bracketed tags a narrator embeds in its prose, and
//!   an applicator that turns them into gold, items, XP and recruits
//! - Sessions, a session store and JSON save files
//!
//! The narrator itself lives outside the crate behind the
//! [`Narrator`](dm::Narrator) trait.
//!
//! # Quick Start
//!
//! ```ignore
//! use dnd_engine::{create_sample_fighter, EngineConfig, GameSession};
//!
//! let mut session = GameSession::new(create_sample_fighter("Thorin"), EngineConfig::default());
//!
//! let outcome = session.process_narration("Goblins! [COMBAT: 2 goblin; ambushed]");
//! println!("{}", outcome.narration);
//!
//! let turn = session.attack("Goblin 1")?;
//! println!("{}", turn.report.narrative());
//! ```

pub mod bestiary;
pub mod character;
pub mod combat;
pub mod config;
pub mod dice;
pub mod dm;
pub mod events;
pub mod items;
pub mod party;
pub mod persist;
pub mod session;
pub mod store;
pub mod testing;

// Primary public API
pub use character::{create_sample_fighter, Character};
pub use combat::{CombatError, CombatStatus, Encounter, Surprise};
pub use config::{ConfigError, EngineConfig, RetryPolicy};
pub use dm::{parse_narration, Directive, Narrator};
pub use events::{GameEvents, NoEvents};
pub use session::{CombatTurn, GameSession, Location, SessionError, TurnOutcome};
pub use store::{SessionHandle, SessionId, SessionStore};
pub use testing::{ScriptedNarrator, TestHarness};
