//! Game config loading: JSON document in, world model out
//!
//! Conversion is pure and total: every validation problem is reported as a
//! [`ConfigError`] and aborts startup. The raw `lootTypes` arrays are kept
//! verbatim per map because clients receive them untouched (they carry
//! renderer-only fields the model does not care about).

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use shared::{Building, Game, LootGenerator, LootType, Map, MapId, Office, Point, Road};
use thiserror::Error;

/// Bag capacity used when neither the map nor the root sets one
const DEFAULT_BAG_CAPACITY: usize = 3;
/// Idle time after which a player retires, unless configured
const DEFAULT_RETIREMENT_TIME: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything the server learns from the config document
pub struct GameConfig {
    pub game: Game,
    pub retirement_time: Duration,
    /// Verbatim `lootTypes` JSON per map, served by the map-info endpoint
    pub raw_loot_types: HashMap<MapId, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    default_dog_speed: f64,
    default_bag_capacity: Option<usize>,
    /// Seconds of idleness before retirement
    dog_retirement_time: Option<f64>,
    loot_generator_config: Option<RawLootGeneratorConfig>,
    maps: Vec<RawMap>,
}

#[derive(Deserialize)]
struct RawLootGeneratorConfig {
    /// Seconds
    period: f64,
    probability: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMap {
    id: String,
    name: String,
    dog_speed: Option<f64>,
    bag_capacity: Option<usize>,
    roads: Vec<RawRoad>,
    #[serde(default)]
    buildings: Vec<RawBuilding>,
    #[serde(default)]
    offices: Vec<RawOffice>,
    #[serde(default)]
    loot_types: Vec<Value>,
}

#[derive(Deserialize)]
struct RawRoad {
    x0: i64,
    y0: i64,
    x1: Option<i64>,
    y1: Option<i64>,
}

#[derive(Deserialize)]
struct RawBuilding {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOffice {
    id: String,
    x: i64,
    y: i64,
    offset_x: i64,
    offset_y: i64,
}

/// Reads and parses the config file
pub fn load_config(path: &Path) -> Result<GameConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}

/// Parses a config document into the world model
pub fn parse_config(text: &str) -> Result<GameConfig, ConfigError> {
    let raw: RawConfig = serde_json::from_str(text)?;

    let generator = raw.loot_generator_config.as_ref().map(|cfg| {
        LootGenerator::new(Duration::from_secs_f64(cfg.period), cfg.probability)
    });

    let mut game = Game::new();
    let mut raw_loot_types = HashMap::new();

    for raw_map in &raw.maps {
        let map_id = MapId::new(raw_map.id.clone());
        let speed = raw_map.dog_speed.unwrap_or(raw.default_dog_speed);
        let bag_capacity = raw_map
            .bag_capacity
            .or(raw.default_bag_capacity)
            .unwrap_or(DEFAULT_BAG_CAPACITY);

        let mut map = Map::new(map_id.clone(), raw_map.name.clone(), speed, bag_capacity);

        if raw_map.roads.is_empty() {
            return Err(ConfigError::Invalid(format!("map {map_id} has no roads")));
        }
        for road in &raw_map.roads {
            map.add_road(convert_road(&map_id, road)?);
        }

        for building in &raw_map.buildings {
            map.add_building(Building {
                position: Point::new(building.x, building.y),
                width: building.w,
                height: building.h,
            });
        }

        for office in &raw_map.offices {
            map.add_office(Office {
                id: office.id.clone(),
                position: Point::new(office.x, office.y),
                offset_x: office.offset_x,
                offset_y: office.offset_y,
            });
        }

        for loot_type in &raw_map.loot_types {
            map.add_loot_type(convert_loot_type(&map_id, loot_type)?);
        }

        if let Some(generator) = generator {
            map.set_loot_generator(generator);
        }

        raw_loot_types.insert(map_id.clone(), Value::Array(raw_map.loot_types.clone()));
        game.add_map(map);
    }

    let retirement_time = raw
        .dog_retirement_time
        .map(Duration::from_secs_f64)
        .unwrap_or(DEFAULT_RETIREMENT_TIME);

    Ok(GameConfig { game, retirement_time, raw_loot_types })
}

fn convert_road(map_id: &MapId, road: &RawRoad) -> Result<Road, ConfigError> {
    let start = Point::new(road.x0, road.y0);
    let converted = match (road.x1, road.y1) {
        (Some(x1), None) => Road::horizontal(start, x1),
        (None, Some(y1)) => Road::vertical(start, y1),
        _ => {
            return Err(ConfigError::Invalid(format!(
                "map {map_id}: road must set exactly one of x1 or y1"
            )))
        }
    };
    if converted.is_zero_length() {
        return Err(ConfigError::Invalid(format!("map {map_id}: road has zero length")));
    }
    Ok(converted)
}

fn convert_loot_type(map_id: &MapId, loot_type: &Value) -> Result<LootType, ConfigError> {
    let obj = loot_type
        .as_object()
        .ok_or_else(|| ConfigError::Invalid(format!("map {map_id}: lootTypes entry is not an object")))?;
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ConfigError::Invalid(format!("map {map_id}: lootTypes entry has no name")))?;
    let value = obj.get("value").and_then(Value::as_u64).unwrap_or(0);
    Ok(LootType { name: name.to_string(), value: value as u32 })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "defaultDogSpeed": 3.0,
        "dogRetirementTime": 15.0,
        "lootGeneratorConfig": { "period": 5.0, "probability": 0.5 },
        "maps": [
            {
                "id": "map1",
                "name": "Map 1",
                "dogSpeed": 4.0,
                "bagCapacity": 5,
                "roads": [
                    { "x0": 0, "y0": 0, "x1": 40 },
                    { "x0": 40, "y0": 0, "y1": 30 }
                ],
                "buildings": [ { "x": 5, "y": 5, "w": 4, "h": 3 } ],
                "offices": [ { "id": "o0", "x": 40, "y": 30, "offsetX": 5, "offsetY": 0 } ],
                "lootTypes": [
                    { "name": "key", "file": "assets/key.obj", "type": "obj", "rotation": 90, "value": 10 },
                    { "name": "wallet", "file": "assets/wallet.obj", "type": "obj", "value": 30 }
                ]
            },
            {
                "id": "map2",
                "name": "Map 2",
                "roads": [ { "x0": 0, "y0": 0, "y1": 20 } ]
            }
        ]
    }"#;

    #[test]
    fn test_full_config_parses() {
        let config = parse_config(CONFIG).unwrap();
        assert_eq!(config.game.maps().len(), 2);
        assert_eq!(config.retirement_time, Duration::from_secs(15));

        let map = config.game.find_map(&MapId::new("map1")).unwrap();
        assert_eq!(map.name(), "Map 1");
        assert_eq!(map.dog_speed(), 4.0);
        assert_eq!(map.bag_capacity(), 5);
        assert_eq!(map.roads().len(), 2);
        assert_eq!(map.buildings().len(), 1);
        assert_eq!(map.offices().len(), 1);
        assert_eq!(map.loot_types().len(), 2);
        assert_eq!(map.loot_value(0), 10);
        assert_eq!(map.loot_value(1), 30);
    }

    #[test]
    fn test_defaults_apply() {
        let config = parse_config(CONFIG).unwrap();
        let map = config.game.find_map(&MapId::new("map2")).unwrap();
        assert_eq!(map.dog_speed(), 3.0);
        assert_eq!(map.bag_capacity(), 3);
        assert!(map.loot_types().is_empty());
    }

    #[test]
    fn test_raw_loot_types_preserved_verbatim() {
        let config = parse_config(CONFIG).unwrap();
        let raw = &config.raw_loot_types[&MapId::new("map1")];
        assert_eq!(raw[0]["file"], "assets/key.obj");
        assert_eq!(raw[0]["rotation"], 90);
        assert_eq!(config.raw_loot_types[&MapId::new("map2")], Value::Array(vec![]));
    }

    #[test]
    fn test_map_without_roads_is_rejected() {
        let text = r#"{
            "defaultDogSpeed": 1.0,
            "maps": [ { "id": "m", "name": "M", "roads": [] } ]
        }"#;
        assert!(matches!(parse_config(text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_length_road_is_rejected() {
        let text = r#"{
            "defaultDogSpeed": 1.0,
            "maps": [ { "id": "m", "name": "M", "roads": [ { "x0": 3, "y0": 0, "x1": 3 } ] } ]
        }"#;
        assert!(matches!(parse_config(text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_diagonal_road_is_rejected() {
        let text = r#"{
            "defaultDogSpeed": 1.0,
            "maps": [ { "id": "m", "name": "M", "roads": [ { "x0": 0, "y0": 0, "x1": 5, "y1": 5 } ] } ]
        }"#;
        assert!(matches!(parse_config(text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let text = r#"{ "maps": [] }"#;
        assert!(matches!(parse_config(text), Err(ConfigError::Json(_))));
    }
}
