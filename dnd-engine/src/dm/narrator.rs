//! The boundary to the external storyteller.
//!
//! A [`Narrator`] turns the player's words plus a status summary into one
//! reply string. Calls can fail or come back empty, so they go through
//! [`narrate_with_retry`], which backs off exponentially and gives up after
//! the configured number of attempts. Only a complete reply is ever handed
//! to the tag parser.

use crate::config::RetryPolicy;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from narrator calls.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NarratorError {
    #[error("Narrator unavailable: {0}")]
    Unavailable(String),

    #[error("Narrator returned an empty reply")]
    EmptyReply,

    #[error("Narrator failed after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<NarratorError>,
    },
}

/// What the narrator is asked to continue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NarrationRequest {
    pub player_input: String,
    /// Current HP, location, combat state and so on.
    pub status: String,
}

impl NarrationRequest {
    pub fn new(player_input: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            player_input: player_input.into(),
            status: status.into(),
        }
    }
}

/// Produces narration for a turn.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(&self, request: &NarrationRequest) -> Result<String, NarratorError>;
}

/// Call the narrator, retrying failures and empty replies with
/// exponential backoff.
pub async fn narrate_with_retry(
    narrator: &dyn Narrator,
    request: &NarrationRequest,
    policy: &RetryPolicy,
) -> Result<String, NarratorError> {
    let attempts = policy.max_attempts.max(1);
    let mut last = NarratorError::EmptyReply;

    for attempt in 1..=attempts {
        match narrator.narrate(request).await {
            Ok(reply) if !reply.trim().is_empty() => return Ok(reply),
            Ok(_) => last = NarratorError::EmptyReply,
            Err(e) => last = e,
        }

        if attempt < attempts {
            let delay = policy.delay_for(attempt);
            tracing::warn!(
                attempt,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %last,
                "Narrator call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    tracing::warn!(attempts, error = %last, "Narrator retries exhausted");
    Err(NarratorError::Exhausted {
        attempts,
        last: Box::new(last),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedNarrator;

    #[tokio::test]
    async fn test_first_reply_wins() {
        let narrator = ScriptedNarrator::new(vec![Ok("The door opens.".to_string())]);
        let reply = narrate_with_retry(
            &narrator,
            &NarrationRequest::new("open door", ""),
            &RetryPolicy::immediate(3),
        )
        .await
        .unwrap();
        assert_eq!(reply, "The door opens.");
        assert_eq!(narrator.calls(), 1);
    }

    #[tokio::test]
    async fn test_retries_failures_and_empty_replies() {
        let narrator = ScriptedNarrator::new(vec![
            Err(NarratorError::Unavailable("timeout".to_string())),
            Ok("   ".to_string()),
            Ok("At last, the goblin speaks.".to_string()),
        ]);
        let reply = narrate_with_retry(
            &narrator,
            &NarrationRequest::new("talk", ""),
            &RetryPolicy::immediate(3),
        )
        .await
        .unwrap();
        assert_eq!(reply, "At last, the goblin speaks.");
        assert_eq!(narrator.calls(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let narrator = ScriptedNarrator::new(vec![
            Err(NarratorError::Unavailable("down".to_string())),
            Err(NarratorError::Unavailable("still down".to_string())),
            Ok("too late".to_string()),
        ]);
        let err = narrate_with_retry(
            &narrator,
            &NarrationRequest::new("hello", ""),
            &RetryPolicy::immediate(2),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            NarratorError::Exhausted {
                attempts: 2,
                last: Box::new(NarratorError::Unavailable("still down".to_string())),
            }
        );
        assert_eq!(narrator.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_between_attempts() {
        let narrator = ScriptedNarrator::new(vec![
            Err(NarratorError::Unavailable("busy".to_string())),
            Err(NarratorError::Unavailable("busy".to_string())),
            Ok("ok".to_string()),
        ]);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
        };
        let started = tokio::time::Instant::now();
        narrate_with_retry(&narrator, &NarrationRequest::default(), &policy)
            .await
            .unwrap();
        // 100ms after the first failure, 200ms after the second
        assert!(started.elapsed() >= std::time::Duration::from_millis(300));
    }
}
