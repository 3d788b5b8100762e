//! Application façade: the sole mutation entry point of the world
//!
//! Every operation the HTTP surface exposes goes through [`Application`],
//! and every call into it happens on the API strand. Methods fail with the
//! typed [`AppError`] taxonomy that the dispatcher maps onto HTTP statuses.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use serde::Serialize;
use serde_json::Value;
use shared::{Direction, Game, MapId};
use thiserror::Error;

use crate::config::GameConfig;
use crate::players::Players;
use crate::records::{PlayerRecord, RecordsRepository};

/// Application-level error taxonomy
///
/// The variant decides the HTTP status and the `code` field of the error
/// body; the message is the human-readable half.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    InvalidToken(String),
    #[error("{0}")]
    UnknownToken(String),
    #[error("{0}")]
    MapNotFound(String),
    #[error("{0}")]
    NotFound(String),
    #[error("invalid method")]
    InvalidMethod { allow: &'static str },
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Wire-level error code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidArgument(_) => "invalidArgument",
            AppError::InvalidToken(_) => "invalidToken",
            AppError::UnknownToken(_) => "unknownToken",
            AppError::MapNotFound(_) => "mapNotFound",
            AppError::NotFound(_) => "notFound",
            AppError::InvalidMethod { .. } => "invalidMethod",
            AppError::Internal(_) => "internalError",
        }
    }
}

/// Reply to a successful join
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinInfo {
    pub auth_token: String,
    pub player_id: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerName {
    pub name: String,
}

/// Dog-id keyed name listing for the player's session
pub type PlayersView = BTreeMap<String, PlayerName>;

#[derive(Debug, Clone, Serialize)]
pub struct BagItemView {
    pub id: u64,
    #[serde(rename = "type")]
    pub type_idx: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DogStateView {
    pub pos: [f64; 2],
    pub speed: [f64; 2],
    pub dir: &'static str,
    pub bag: Vec<BagItemView>,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LostObjectView {
    pub id: u64,
    #[serde(rename = "type")]
    pub type_idx: usize,
    pub pos: [f64; 2],
}

/// Dynamic state of the player's session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    pub players: BTreeMap<String, DogStateView>,
    pub lost_objects: Vec<LostObjectView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapShortView {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoadView {
    pub x0: i64,
    pub y0: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x1: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y1: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildingView {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficeView {
    pub id: String,
    pub x: i64,
    pub y: i64,
    pub offset_x: i64,
    pub offset_y: i64,
}

/// Full static view of one map
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub id: String,
    pub name: String,
    pub roads: Vec<RoadView>,
    pub buildings: Vec<BuildingView>,
    pub offices: Vec<OfficeView>,
    pub loot_types: Value,
}

/// Callback fired after every tick; the state serializer hangs off this
pub type TickObserver = Box<dyn FnMut(&Application, Duration) + Send>;

/// The game server's transactional API surface
///
/// Owns the world ([`Game`]) and the player registry; optionally holds the
/// leaderboard repository and a tick observer. Not internally synchronized:
/// the strand it runs on is the lock.
pub struct Application {
    game: Game,
    players: Players,
    records: Option<Arc<dyn RecordsRepository>>,
    tick_observer: Option<TickObserver>,
    raw_loot_types: HashMap<MapId, Value>,
    retirement_time: Duration,
    spawn_randomized: bool,
    auto_tick_enabled: bool,
}

impl Application {
    pub fn new(config: GameConfig, spawn_randomized: bool, auto_tick_enabled: bool) -> Self {
        Self {
            game: config.game,
            players: Players::new(),
            records: None,
            tick_observer: None,
            raw_loot_types: config.raw_loot_types,
            retirement_time: config.retirement_time,
            spawn_randomized,
            auto_tick_enabled,
        }
    }

    pub fn auto_tick_enabled(&self) -> bool {
        self.auto_tick_enabled
    }

    pub fn set_records_repository(&mut self, records: Arc<dyn RecordsRepository>) {
        self.records = Some(records);
    }

    pub fn records_repository(&self) -> Option<Arc<dyn RecordsRepository>> {
        self.records.clone()
    }

    /// Installs the single post-tick callback, replacing any previous one
    pub fn set_tick_observer(&mut self, observer: TickObserver) {
        self.tick_observer = Some(observer);
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub(crate) fn game_mut(&mut self) -> &mut Game {
        &mut self.game
    }

    pub fn players(&self) -> &Players {
        &self.players
    }

    pub(crate) fn players_mut(&mut self) -> &mut Players {
        &mut self.players
    }

    /// Joins a player onto a map, creating its session on first use
    pub fn join_game(&mut self, user_name: &str, map_id: &str) -> Result<JoinInfo, AppError> {
        if user_name.is_empty() {
            return Err(AppError::InvalidArgument("Invalid name".to_string()));
        }
        let map_id = MapId::new(map_id);
        let session = self
            .game
            .session_for_map(&map_id)
            .ok_or_else(|| AppError::MapNotFound("Map not found".to_string()))?;
        let dog_id = session.create_dog(user_name, self.spawn_randomized);
        let token = self.players.add(map_id.clone(), dog_id);

        info!("player {user_name} joined map {map_id} as dog {dog_id}");
        Ok(JoinInfo { auth_token: token, player_id: dog_id })
    }

    pub fn get_maps_short_info(&self) -> Vec<MapShortView> {
        self.game
            .maps()
            .iter()
            .map(|map| MapShortView { id: map.id().to_string(), name: map.name().to_string() })
            .collect()
    }

    pub fn get_map_info(&self, map_id: &str) -> Result<MapView, AppError> {
        let map_id = MapId::new(map_id);
        let map = self
            .game
            .find_map(&map_id)
            .ok_or_else(|| AppError::MapNotFound("Map not found".to_string()))?;

        let roads = map
            .roads()
            .iter()
            .map(|road| RoadView {
                x0: road.start().x,
                y0: road.start().y,
                x1: road.is_horizontal().then(|| road.end().x),
                y1: (!road.is_horizontal()).then(|| road.end().y),
            })
            .collect();
        let buildings = map
            .buildings()
            .iter()
            .map(|b| BuildingView { x: b.position.x, y: b.position.y, w: b.width, h: b.height })
            .collect();
        let offices = map
            .offices()
            .iter()
            .map(|o| OfficeView {
                id: o.id.clone(),
                x: o.position.x,
                y: o.position.y,
                offset_x: o.offset_x,
                offset_y: o.offset_y,
            })
            .collect();
        let loot_types = self
            .raw_loot_types
            .get(&map_id)
            .cloned()
            .unwrap_or(Value::Array(Vec::new()));

        Ok(MapView {
            id: map.id().to_string(),
            name: map.name().to_string(),
            roads,
            buildings,
            offices,
            loot_types,
        })
    }

    /// Names of every dog in the authenticated player's session
    pub fn get_players(&self, token: &str) -> Result<PlayersView, AppError> {
        let player = self.find_player(token)?;
        let session = self
            .game
            .session(&player.map_id)
            .ok_or_else(|| AppError::Internal("player session missing".to_string()))?;

        Ok(session
            .dogs()
            .map(|dog| (dog.id.to_string(), PlayerName { name: dog.name.clone() }))
            .collect())
    }

    /// Positions, bags and scores of the player's session, plus live loot
    pub fn get_game_state(&self, token: &str) -> Result<GameStateView, AppError> {
        let player = self.find_player(token)?;
        let session = self
            .game
            .session(&player.map_id)
            .ok_or_else(|| AppError::Internal("player session missing".to_string()))?;

        let players = session
            .dogs()
            .map(|dog| {
                let bag = dog
                    .bag
                    .iter()
                    .map(|item| BagItemView { id: item.id, type_idx: item.type_idx })
                    .collect();
                let view = DogStateView {
                    pos: [dog.position.x, dog.position.y],
                    speed: [dog.velocity.x, dog.velocity.y],
                    dir: dog.direction.as_letter(),
                    bag,
                    score: dog.score,
                };
                (dog.id.to_string(), view)
            })
            .collect();

        let lost_objects = session
            .loots()
            .map(|loot| LostObjectView {
                id: loot.id,
                type_idx: loot.type_idx,
                pos: [loot.position.x, loot.position.y],
            })
            .collect();

        Ok(GameStateView { players, lost_objects })
    }

    /// Steers the player's dog; `None` stops it
    pub fn action(&mut self, token: &str, direction: Option<Direction>) -> Result<(), AppError> {
        let player = self.find_player(token)?.clone();
        let session = self
            .game
            .session_mut(&player.map_id)
            .ok_or_else(|| AppError::Internal("player session missing".to_string()))?;
        if !session.steer(player.dog_id, direction) {
            return Err(AppError::Internal("player dog missing".to_string()));
        }
        Ok(())
    }

    /// Advances the world, retires idle players and notifies the observer
    pub fn tick(&mut self, delta: Duration) {
        self.players.move_players(&mut self.game, delta);

        let retired = self.players.retire_idle(&mut self.game, self.retirement_time);
        if let Some(records) = &self.records {
            for player in retired {
                let records = Arc::clone(records);
                // Off the strand: a slow pool must never stall the tick path.
                tokio::spawn(async move {
                    let record = PlayerRecord {
                        name: player.name.clone(),
                        score: player.score,
                        play_time: player.play_time,
                    };
                    if let Err(err) = records.add_record(record).await {
                        error!("failed to persist retired player {}: {err}", player.name);
                    }
                });
            }
        }

        if let Some(mut observer) = self.tick_observer.take() {
            observer(self, delta);
            self.tick_observer = Some(observer);
        }
    }

    fn find_player(&self, token: &str) -> Result<&crate::players::Player, AppError> {
        self.players
            .find_by_token(token)
            .ok_or_else(|| AppError::UnknownToken("No player with such token".to_string()))
    }
}
