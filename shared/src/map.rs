//! Static map topology: roads, buildings, offices and loot types
//!
//! Maps are built once at config-load time and never mutated afterwards; the
//! live world (dogs, loot) lives in [`crate::session`] and only borrows the
//! topology.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geom::{Vec2, ROAD_HALF_WIDTH};
use crate::loot::LootGenerator;

/// Identifier of a map, unique across the loaded config
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(pub String);

impl MapId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MapId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Integer grid point used by the static topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x as f64, self.y as f64)
    }
}

/// An axis-aligned road segment
///
/// A position counts as on the road when it is within [`ROAD_HALF_WIDTH`] of
/// the segment's bounding box on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Road {
    start: Point,
    end: Point,
}

impl Road {
    pub fn horizontal(start: Point, end_x: i64) -> Self {
        Self { start, end: Point::new(end_x, start.y) }
    }

    pub fn vertical(start: Point, end_y: i64) -> Self {
        Self { start, end: Point::new(start.x, end_y) }
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn end(&self) -> Point {
        self.end
    }

    pub fn is_horizontal(&self) -> bool {
        self.start.y == self.end.y
    }

    pub fn is_zero_length(&self) -> bool {
        self.start == self.end
    }

    /// Lower-left corner of the road's walkable area, margin included
    pub fn min_corner(&self) -> Vec2 {
        Vec2::new(
            self.start.x.min(self.end.x) as f64 - ROAD_HALF_WIDTH,
            self.start.y.min(self.end.y) as f64 - ROAD_HALF_WIDTH,
        )
    }

    /// Upper-right corner of the road's walkable area, margin included
    pub fn max_corner(&self) -> Vec2 {
        Vec2::new(
            self.start.x.max(self.end.x) as f64 + ROAD_HALF_WIDTH,
            self.start.y.max(self.end.y) as f64 + ROAD_HALF_WIDTH,
        )
    }

    /// Whether `pos` lies on this road, half-width margin included
    pub fn contains(&self, pos: Vec2) -> bool {
        let min = self.min_corner();
        let max = self.max_corner();
        pos.x >= min.x && pos.x <= max.x && pos.y >= min.y && pos.y <= max.y
    }

    /// A uniformly random point on the road's center line
    pub fn random_point<R: Rng>(&self, rng: &mut R) -> Vec2 {
        if self.is_horizontal() {
            let lo = self.start.x.min(self.end.x) as f64;
            let hi = self.start.x.max(self.end.x) as f64;
            Vec2::new(rng.gen_range(lo..=hi), self.start.y as f64)
        } else {
            let lo = self.start.y.min(self.end.y) as f64;
            let hi = self.start.y.max(self.end.y) as f64;
            Vec2::new(self.start.x as f64, rng.gen_range(lo..=hi))
        }
    }
}

/// Purely cosmetic rectangle rendered by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub position: Point,
    pub width: i64,
    pub height: i64,
}

/// A depot where dogs bank the contents of their bag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Office {
    pub id: String,
    pub position: Point,
    pub offset_x: i64,
    pub offset_y: i64,
}

/// A kind of collectible loot and the points it is worth
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootType {
    pub name: String,
    pub value: u32,
}

/// Immutable per-map world configuration
#[derive(Debug, Clone)]
pub struct Map {
    id: MapId,
    name: String,
    dog_speed: f64,
    bag_capacity: usize,
    roads: Vec<Road>,
    buildings: Vec<Building>,
    offices: Vec<Office>,
    loot_types: Vec<LootType>,
    loot_generator: LootGenerator,
}

impl Map {
    pub fn new(id: MapId, name: impl Into<String>, dog_speed: f64, bag_capacity: usize) -> Self {
        Self {
            id,
            name: name.into(),
            dog_speed,
            bag_capacity,
            roads: Vec::new(),
            buildings: Vec::new(),
            offices: Vec::new(),
            loot_types: Vec::new(),
            // Spawns nothing until the config installs a real schedule.
            loot_generator: LootGenerator::new(Duration::from_secs(5), 0.0),
        }
    }

    pub fn id(&self) -> &MapId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dog_speed(&self) -> f64 {
        self.dog_speed
    }

    pub fn bag_capacity(&self) -> usize {
        self.bag_capacity
    }

    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn offices(&self) -> &[Office] {
        &self.offices
    }

    pub fn loot_types(&self) -> &[LootType] {
        &self.loot_types
    }

    /// Point value of the given loot type; unknown indices are worth nothing
    pub fn loot_value(&self, type_idx: usize) -> u32 {
        self.loot_types.get(type_idx).map_or(0, |t| t.value)
    }

    pub fn add_road(&mut self, road: Road) {
        self.roads.push(road);
    }

    pub fn add_building(&mut self, building: Building) {
        self.buildings.push(building);
    }

    pub fn add_office(&mut self, office: Office) {
        self.offices.push(office);
    }

    pub fn add_loot_type(&mut self, loot_type: LootType) {
        self.loot_types.push(loot_type);
    }

    pub fn set_loot_generator(&mut self, generator: LootGenerator) {
        self.loot_generator = generator;
    }

    pub fn loot_generator(&self) -> LootGenerator {
        self.loot_generator
    }

    /// Whether `pos` lies on at least one road of this map
    pub fn is_on_roads(&self, pos: Vec2) -> bool {
        self.roads.iter().any(|road| road.contains(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn horizontal_road() -> Road {
        Road::horizontal(Point::new(0, 0), 10)
    }

    #[test]
    fn test_road_orientation() {
        assert!(horizontal_road().is_horizontal());
        assert!(!Road::vertical(Point::new(3, 1), 5).is_horizontal());
    }

    #[test]
    fn test_road_contains_with_margin() {
        let road = horizontal_road();
        assert!(road.contains(Vec2::new(5.0, 0.0)));
        assert!(road.contains(Vec2::new(5.0, 0.4)));
        assert!(road.contains(Vec2::new(-0.4, 0.0)));
        assert!(road.contains(Vec2::new(10.4, -0.4)));
        assert!(!road.contains(Vec2::new(5.0, 0.41)));
        assert!(!road.contains(Vec2::new(10.5, 0.0)));
    }

    #[test]
    fn test_road_contains_reversed_endpoints() {
        // Roads may be declared end-before-start; containment must not care.
        let road = Road::horizontal(Point::new(10, 0), 0);
        assert!(road.contains(Vec2::new(5.0, 0.0)));
        assert!(road.contains(Vec2::new(-0.4, 0.0)));
    }

    #[test]
    fn test_random_point_stays_on_road() {
        let mut rng = SmallRng::seed_from_u64(7);
        let road = Road::vertical(Point::new(2, -3), 4);
        for _ in 0..100 {
            let p = road.random_point(&mut rng);
            assert_eq!(p.x, 2.0);
            assert!((-3.0..=4.0).contains(&p.y));
        }
    }

    #[test]
    fn test_map_loot_value_lookup() {
        let mut map = Map::new(MapId::new("town"), "Town", 4.0, 3);
        map.add_loot_type(LootType { name: "key".to_string(), value: 10 });
        map.add_loot_type(LootType { name: "wallet".to_string(), value: 30 });

        assert_eq!(map.loot_value(0), 10);
        assert_eq!(map.loot_value(1), 30);
        assert_eq!(map.loot_value(99), 0);
    }

    #[test]
    fn test_map_is_on_roads() {
        let mut map = Map::new(MapId::new("town"), "Town", 4.0, 3);
        map.add_road(horizontal_road());
        map.add_road(Road::vertical(Point::new(10, 0), 8));

        assert!(map.is_on_roads(Vec2::new(3.0, 0.2)));
        assert!(map.is_on_roads(Vec2::new(10.3, 5.0)));
        assert!(!map.is_on_roads(Vec2::new(5.0, 5.0)));
    }
}
