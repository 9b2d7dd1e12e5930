//! Save and load of the persistent part of a game.
//!
//! A save holds the character, the party and where they stand. Encounters
//! are never written: a session refuses to save while combat is running.
//! Files are pretty-printed JSON carrying a format version.

use crate::character::{Character, HitPoints};
use crate::party::Party;
use crate::session::Location;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Corrupted save: {0}")]
    Corrupted(String),
}

impl PersistError {
    /// True when the save file does not exist.
    pub fn is_missing(&self) -> bool {
        matches!(self, PersistError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Current save file version.
pub const SAVE_VERSION: u32 = 1;

/// A saved game with everything needed to resume outside combat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedGame {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// Seconds since the Unix epoch.
    pub saved_at: String,

    pub character: Character,

    #[serde(default)]
    pub party: Party,

    pub location: Location,

    pub metadata: SaveMetadata,
}

/// Summary readable without loading the full save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveMetadata {
    pub character_name: String,
    pub level: u8,
    pub location: String,
    pub party_size: usize,
}

impl SavedGame {
    pub fn new(character: Character, party: Party, location: Location) -> Self {
        let metadata = SaveMetadata {
            character_name: character.name.clone(),
            level: character.level,
            location: location.name.clone(),
            party_size: party.len(),
        };

        Self {
            version: SAVE_VERSION,
            saved_at: timestamp_now(),
            character,
            party,
            location,
            metadata,
        }
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content).await?;
        tracing::info!(
            path = %path.as_ref().display(),
            character = %self.character.name,
            "Game saved"
        );
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path.as_ref()).await?;
        let saved: Self = serde_json::from_str(&content)?;

        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }
        saved.validate()?;

        Ok(saved)
    }

    /// Reject values no running game could have produced.
    fn validate(&self) -> Result<(), PersistError> {
        check_hit_points(&self.character.name, &self.character.hit_points)?;
        for member in &self.party.members {
            check_hit_points(&member.name, &member.hit_points)?;
        }
        Ok(())
    }

    /// Read only the metadata of a save.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<SaveMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: SaveMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;

        if partial.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: partial.version,
            });
        }

        Ok(partial.metadata)
    }
}

/// A save file found on disk.
#[derive(Debug, Clone)]
pub struct SaveInfo {
    pub path: PathBuf,
    pub metadata: SaveMetadata,
}

/// List readable saves in a directory, sorted by path.
///
/// Files that fail to parse are skipped.
pub async fn list_saves(dir: impl AsRef<Path>) -> Result<Vec<SaveInfo>, PersistError> {
    let mut saves = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            match SavedGame::peek_metadata(&path).await {
                Ok(metadata) => saves.push(SaveInfo { path, metadata }),
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "Skipping save"),
            }
        }
    }

    saves.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(saves)
}

/// File name for a character's save slot.
pub fn save_path(base_dir: impl AsRef<Path>, character_name: &str) -> PathBuf {
    let sanitized = character_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>();
    base_dir.as_ref().join(format!("{sanitized}.json"))
}

fn check_hit_points(owner: &str, hp: &HitPoints) -> Result<(), PersistError> {
    if hp.maximum < 1 || hp.current < 0 || hp.current > hp.maximum {
        return Err(PersistError::Corrupted(format!(
            "{owner} has hit points {}/{}",
            hp.current, hp.maximum
        )));
    }
    Ok(())
}

fn timestamp_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::create_sample_fighter;
    use tempfile::tempdir;

    fn sample_game() -> SavedGame {
        let mut character = create_sample_fighter("Roland");
        character.hit_points.set_current(11);
        let mut party = Party::new();
        party.recruit("brom", 3).unwrap();
        SavedGame::new(character, party, Location::new("Phandalin", false))
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roland.json");
        let game = sample_game();

        game.save_json(&path).await.unwrap();
        let loaded = SavedGame::load_json(&path).await.unwrap();

        assert_eq!(loaded, game);
        assert_eq!(loaded.character.hit_points.current, 11);
        assert_eq!(loaded.party.len(), 1);
    }

    #[tokio::test]
    async fn test_peek_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roland.json");
        sample_game().save_json(&path).await.unwrap();

        let metadata = SavedGame::peek_metadata(&path).await.unwrap();
        assert_eq!(metadata.character_name, "Roland");
        assert_eq!(metadata.location, "Phandalin");
        assert_eq!(metadata.party_size, 1);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = SavedGame::load_json(dir.path().join("nope.json"))
            .await
            .unwrap_err();
        assert!(err.is_missing());
    }

    #[tokio::test]
    async fn test_corrupted_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let err = SavedGame::load_json(&path).await.unwrap_err();
        assert!(matches!(err, PersistError::Json(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_hit_points() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tampered.json");

        let mut game = sample_game();
        game.character.hit_points = HitPoints {
            current: 28,
            maximum: -5,
        };
        game.save_json(&path).await.unwrap();
        let err = SavedGame::load_json(&path).await.unwrap_err();
        assert!(matches!(err, PersistError::Corrupted(ref msg) if msg.contains("Roland")));

        let mut game = sample_game();
        game.party.members[0].hit_points.current = 999;
        game.save_json(&path).await.unwrap();
        assert!(matches!(
            SavedGame::load_json(&path).await,
            Err(PersistError::Corrupted(_))
        ));

        let mut game = sample_game();
        game.character.hit_points.current = -1;
        game.save_json(&path).await.unwrap();
        assert!(matches!(
            SavedGame::load_json(&path).await,
            Err(PersistError::Corrupted(_))
        ));
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.json");
        let mut game = sample_game();
        game.version = 99;
        game.save_json(&path).await.unwrap();

        let err = SavedGame::load_json(&path).await.unwrap_err();
        assert!(matches!(
            err,
            PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: 99
            }
        ));
    }

    #[tokio::test]
    async fn test_list_saves_skips_garbage() {
        let dir = tempdir().unwrap();
        sample_game()
            .save_json(save_path(dir.path(), "Roland"))
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("junk.json"), "[]")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), "hi")
            .await
            .unwrap();

        let saves = list_saves(dir.path()).await.unwrap();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].metadata.character_name, "Roland");
    }

    #[test]
    fn test_save_path_sanitizes() {
        let path = save_path("/saves", "Sir Roland/../x");
        assert_eq!(path, PathBuf::from("/saves/Sir_Roland____x.json"));
    }
}
