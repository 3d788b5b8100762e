//! World snapshotting: periodic crash-safe saves and startup restore
//!
//! The snapshot is a binary file: a 4-byte magic, a little-endian format
//! version, then the bincode-encoded state of every session and player.
//! Writes go to a temp file that is renamed over the target, so a crash
//! mid-write can never destroy the previous good snapshot.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{error, info};
use serde::{Deserialize, Serialize};
use shared::{Dog, GameSession, LostObject, MapId};
use thiserror::Error;

use crate::app::Application;

const STATE_MAGIC: [u8; 4] = *b"LHS1";
const STATE_VERSION: u16 = 1;
const HEADER_LEN: usize = STATE_MAGIC.len() + 2;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("state file has no valid header")]
    BadHeader,
    #[error("unsupported state file version {0}")]
    UnsupportedVersion(u16),
    #[error("state refers to unknown map {0}")]
    UnknownMap(MapId),
    #[error("state player {token} refers to unknown dog {dog_id}")]
    UnknownDog { token: String, dog_id: u64 },
    #[error("state contains duplicate token {0}")]
    DuplicateToken(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SessionState {
    map_id: MapId,
    next_loot_id: u64,
    loots: Vec<LostObject>,
    dogs: Vec<Dog>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PlayerState {
    token: String,
    map_id: MapId,
    dog_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AppState {
    sessions: Vec<SessionState>,
    players: Vec<PlayerState>,
}

fn capture_state(app: &Application) -> AppState {
    let sessions = app
        .game()
        .sessions()
        .map(|(map_id, session)| SessionState {
            map_id: map_id.clone(),
            next_loot_id: session.next_loot_id(),
            loots: session.loots().cloned().collect(),
            dogs: session.dogs().cloned().collect(),
        })
        .collect();

    let mut players: Vec<PlayerState> = app
        .players()
        .players()
        .map(|player| PlayerState {
            token: player.token.clone(),
            map_id: player.map_id.clone(),
            dog_id: player.dog_id,
        })
        .collect();
    players.sort_by(|a, b| a.token.cmp(&b.token));

    AppState { sessions, players }
}

fn apply_state(app: &mut Application, state: AppState) -> Result<(), StateError> {
    for session_state in state.sessions {
        let map = app
            .game()
            .find_map(&session_state.map_id)
            .cloned()
            .ok_or_else(|| StateError::UnknownMap(session_state.map_id.clone()))?;

        let mut session = GameSession::new(map);
        session.restore_loot(session_state.loots, session_state.next_loot_id);
        for dog in session_state.dogs {
            session.restore_dog(dog);
        }
        app.game_mut().install_session(session_state.map_id, session);
    }

    for player in state.players {
        let dog_exists = app
            .game()
            .session(&player.map_id)
            .and_then(|session| session.dog(player.dog_id))
            .is_some();
        if !dog_exists {
            return Err(StateError::UnknownDog { token: player.token, dog_id: player.dog_id });
        }
        app.players_mut()
            .add_with_token(player.token.clone(), player.map_id, player.dog_id)
            .map_err(|_| StateError::DuplicateToken(player.token))?;
    }

    Ok(())
}

/// Writes a snapshot of the whole world to `path`, atomically
pub fn save_state(app: &Application, path: &Path) -> Result<(), StateError> {
    let mut bytes = Vec::with_capacity(HEADER_LEN);
    bytes.extend_from_slice(&STATE_MAGIC);
    bytes.extend_from_slice(&STATE_VERSION.to_le_bytes());
    bincode::serialize_into(&mut bytes, &capture_state(app))?;

    let tmp_path = tmp_path_for(path);
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.flush()?;
        file.sync_all()?;
    }

    if fs::rename(&tmp_path, path).is_err() {
        // A stale destination can block the rename on some filesystems;
        // clear it and try once more.
        let _ = fs::remove_file(path);
        fs::rename(&tmp_path, path)?;
    }
    Ok(())
}

/// Restores the world from a snapshot written by [`save_state`]
///
/// The application must hold the same map set the snapshot was taken with;
/// unknown map ids or dog ids are errors, and startup treats them as fatal.
pub fn load_state(app: &mut Application, path: &Path) -> Result<(), StateError> {
    let bytes = fs::read(path)?;
    if bytes.len() < HEADER_LEN || bytes[..STATE_MAGIC.len()] != STATE_MAGIC {
        return Err(StateError::BadHeader);
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != STATE_VERSION {
        return Err(StateError::UnsupportedVersion(version));
    }

    let state: AppState = bincode::deserialize(&bytes[HEADER_LEN..])?;
    apply_state(app, state)?;
    info!("restored world state from {}", path.display());
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Accumulates game time and saves a snapshot every `save_period`
///
/// Installed as the application's tick observer. Save failures are logged
/// and retried on a later tick; they never abort the process.
pub struct StateManager {
    path: PathBuf,
    save_period: Option<Duration>,
    accumulated: Duration,
}

impl StateManager {
    pub fn new(path: PathBuf, save_period: Option<Duration>) -> Self {
        Self { path, save_period, accumulated: Duration::ZERO }
    }

    pub fn on_tick(&mut self, app: &Application, delta: Duration) {
        let Some(period) = self.save_period else {
            return;
        };
        self.accumulated += delta;
        if self.accumulated < period {
            return;
        }
        match save_state(app, &self.path) {
            Ok(()) => self.accumulated = Duration::ZERO,
            Err(err) => error!("periodic state save failed: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, GameConfig};
    use shared::Direction;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn town_config() -> GameConfig {
        parse_config(
            r#"{
                "defaultDogSpeed": 1.0,
                "dogRetirementTime": 3600.0,
                "maps": [
                    {
                        "id": "town",
                        "name": "Town",
                        "roads": [ { "x0": 0, "y0": 0, "x1": 10 } ],
                        "lootTypes": [ { "name": "key", "value": 5 } ]
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    fn populated_app() -> Application {
        let mut app = Application::new(town_config(), false, true);
        let a = app.join_game("A", "town").unwrap();
        app.join_game("B", "town").unwrap();
        app.action(&a.auth_token, Some(Direction::East)).unwrap();
        app.tick(Duration::from_millis(700));
        app
    }

    fn temp_state_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("state-{tag}-{}-{nanos}.bin", std::process::id()))
    }

    #[test]
    fn test_snapshot_round_trip() {
        let app = populated_app();
        let path = temp_state_path("roundtrip");

        save_state(&app, &path).unwrap();

        let mut restored = Application::new(town_config(), false, true);
        load_state(&mut restored, &path).unwrap();

        assert_eq!(capture_state(&app), capture_state(&restored));
        assert_eq!(restored.players().len(), 2);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_restored_tokens_still_authenticate() {
        let mut app = Application::new(town_config(), false, true);
        let info = app.join_game("A", "town").unwrap();
        let path = temp_state_path("auth");
        save_state(&app, &path).unwrap();

        let mut restored = Application::new(town_config(), false, true);
        load_state(&mut restored, &path).unwrap();
        assert!(restored.get_game_state(&info.auth_token).is_ok());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_save_replaces_existing_snapshot() {
        let app = populated_app();
        let path = temp_state_path("replace");

        save_state(&app, &path).unwrap();
        let first = fs::read(&path).unwrap();
        save_state(&app, &path).unwrap();
        let second = fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert!(!tmp_path_for(&path).exists());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_rejects_bad_magic() {
        let path = temp_state_path("magic");
        fs::write(&path, b"definitely not a snapshot").unwrap();

        let mut app = Application::new(town_config(), false, true);
        assert!(matches!(load_state(&mut app, &path), Err(StateError::BadHeader)));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_rejects_unknown_version() {
        let path = temp_state_path("version");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&STATE_MAGIC);
        bytes.extend_from_slice(&99u16.to_le_bytes());
        fs::write(&path, &bytes).unwrap();

        let mut app = Application::new(town_config(), false, true);
        assert!(matches!(
            load_state(&mut app, &path),
            Err(StateError::UnsupportedVersion(99))
        ));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_rejects_unknown_map() {
        let app = populated_app();
        let path = temp_state_path("unknown-map");
        save_state(&app, &path).unwrap();

        // A config without the snapshot's map cannot host its sessions.
        let other_config = parse_config(
            r#"{
                "defaultDogSpeed": 1.0,
                "maps": [ { "id": "city", "name": "City", "roads": [ { "x0": 0, "y0": 0, "x1": 5 } ] } ]
            }"#,
        )
        .unwrap();
        let mut restored = Application::new(other_config, false, true);
        assert!(matches!(load_state(&mut restored, &path), Err(StateError::UnknownMap(_))));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_state_manager_saves_on_period() {
        let app = populated_app();
        let path = temp_state_path("manager");
        let mut manager = StateManager::new(path.clone(), Some(Duration::from_millis(1000)));

        manager.on_tick(&app, Duration::from_millis(600));
        assert!(!path.exists());
        manager.on_tick(&app, Duration::from_millis(600));
        assert!(path.exists());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_state_manager_without_period_never_saves() {
        let app = populated_app();
        let path = temp_state_path("no-period");
        let mut manager = StateManager::new(path.clone(), None);

        manager.on_tick(&app, Duration::from_secs(3600));
        assert!(!path.exists());
    }
}
