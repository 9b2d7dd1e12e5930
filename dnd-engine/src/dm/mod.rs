//! Dungeon Master protocol.
//!
//! The narrator is an external storyteller; this module is everything the
//! engine does with what it says: calling it with retries, parsing its
//! control tags, and applying the rewards those tags grant.

pub mod narrator;
pub mod rewards;
pub mod tags;

pub use narrator::{narrate_with_retry, NarrationRequest, Narrator, NarratorError};
pub use rewards::{apply_rewards, AppliedRewards, RewardContext, RewardError};
pub use tags::{parse_directives, parse_narration, Directive, ParsedNarration, RejectedTag};
