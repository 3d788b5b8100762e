//! The live world of one map: dogs, loot, and the tick step
//!
//! A [`GameSession`] owns every mutable thing that happens on a map. The
//! simulation advances in discrete ticks; within a tick the order of
//! operations is fixed:
//!
//! 1. integrate dog positions and confine them to the road network
//! 2. spawn new loot
//! 3. resolve pickups and deposits in trajectory order
//! 4. account play and idle time
//!
//! Dogs and loot are kept in `BTreeMap`s so that the index-based collision
//! sweep sees them in a deterministic order.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::geom::{
    find_gather_events, Gatherer, Item, ItemGathererProvider, Vec2, DOG_WIDTH, LOOT_WIDTH,
    OFFICE_WIDTH, ROAD_HALF_WIDTH,
};
use crate::map::Map;

/// Compass direction a dog is facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    North,
    South,
    West,
    East,
}

impl Direction {
    /// The single-letter form used on the wire ("U", "D", "L", "R")
    pub fn as_letter(&self) -> &'static str {
        match self {
            Direction::North => "U",
            Direction::South => "D",
            Direction::West => "L",
            Direction::East => "R",
        }
    }

    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "U" => Some(Direction::North),
            "D" => Some(Direction::South),
            "L" => Some(Direction::West),
            "R" => Some(Direction::East),
            _ => None,
        }
    }

    /// Velocity vector for moving in this direction at the given speed
    ///
    /// North is negative y, matching the screen-style coordinate system.
    pub fn velocity(&self, speed: f64) -> Vec2 {
        match self {
            Direction::North => Vec2::new(0.0, -speed),
            Direction::South => Vec2::new(0.0, speed),
            Direction::West => Vec2::new(-speed, 0.0),
            Direction::East => Vec2::new(speed, 0.0),
        }
    }
}

/// A collectible lying on a road, waiting to be picked up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LostObject {
    pub id: u64,
    pub type_idx: usize,
    pub position: Vec2,
    /// Point value, copied from the map's loot-type table at spawn time
    pub value: u32,
}

/// One player's avatar in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dog {
    pub id: u64,
    pub name: String,
    pub position: Vec2,
    /// Position at the start of the current tick
    pub prev_position: Vec2,
    pub direction: Direction,
    pub velocity: Vec2,
    pub bag: Vec<LostObject>,
    pub bag_capacity: usize,
    pub score: u32,
    pub play_time: Duration,
    /// Time since the dog last had a non-zero velocity
    pub idle_time: Duration,
}

impl Dog {
    pub fn new(id: u64, name: impl Into<String>, position: Vec2, bag_capacity: usize) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            prev_position: position,
            direction: Direction::North,
            velocity: Vec2::ZERO,
            bag: Vec::new(),
            bag_capacity,
            score: 0,
            play_time: Duration::ZERO,
            idle_time: Duration::ZERO,
        }
    }

    pub fn bag_has_room(&self) -> bool {
        self.bag.len() < self.bag_capacity
    }
}

/// Items for the collision sweep: loot first, then office deposit points
struct CombinedProvider {
    items: Vec<Item>,
    gatherers: Vec<Gatherer>,
}

impl ItemGathererProvider for CombinedProvider {
    fn items_count(&self) -> usize {
        self.items.len()
    }
    fn item(&self, idx: usize) -> Item {
        self.items[idx]
    }
    fn gatherers_count(&self) -> usize {
        self.gatherers.len()
    }
    fn gatherer(&self, idx: usize) -> Gatherer {
        self.gatherers[idx]
    }
}

/// The single live instance of a map's world
pub struct GameSession {
    map: Arc<Map>,
    dogs: BTreeMap<u64, Dog>,
    loots: BTreeMap<u64, LostObject>,
    next_dog_id: u64,
    next_loot_id: u64,
    rng: SmallRng,
}

impl GameSession {
    pub fn new(map: Arc<Map>) -> Self {
        Self::with_rng(map, SmallRng::from_entropy())
    }

    /// A session with a fixed RNG seed, for deterministic simulation
    pub fn with_seed(map: Arc<Map>, seed: u64) -> Self {
        Self::with_rng(map, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(map: Arc<Map>, rng: SmallRng) -> Self {
        Self {
            map,
            dogs: BTreeMap::new(),
            loots: BTreeMap::new(),
            next_dog_id: 0,
            next_loot_id: 0,
            rng,
        }
    }

    pub fn map(&self) -> &Arc<Map> {
        &self.map
    }

    /// Creates a dog and returns its session-unique id
    ///
    /// With `randomize` the spawn point is sampled uniformly along a
    /// uniformly chosen road; otherwise it is the start of the first road.
    pub fn create_dog(&mut self, name: &str, randomize: bool) -> u64 {
        let position = if randomize {
            let road_idx = self.rng.gen_range(0..self.map.roads().len());
            let road = self.map.roads()[road_idx];
            road.random_point(&mut self.rng)
        } else {
            self.map.roads()[0].start().to_vec2()
        };

        let id = self.next_dog_id;
        self.next_dog_id += 1;
        let dog = Dog::new(id, name, position, self.map.bag_capacity());
        self.dogs.insert(id, dog);
        id
    }

    /// Reinserts a dog with its full saved state; snapshot restore only
    pub fn restore_dog(&mut self, dog: Dog) {
        self.next_dog_id = self.next_dog_id.max(dog.id + 1);
        self.dogs.insert(dog.id, dog);
    }

    /// Replaces the live loot set; snapshot restore only
    pub fn restore_loot(&mut self, loots: Vec<LostObject>, next_loot_id: u64) {
        self.loots = loots.into_iter().map(|l| (l.id, l)).collect();
        self.next_loot_id = next_loot_id;
    }

    pub fn dog(&self, id: u64) -> Option<&Dog> {
        self.dogs.get(&id)
    }

    pub fn dog_mut(&mut self, id: u64) -> Option<&mut Dog> {
        self.dogs.get_mut(&id)
    }

    pub fn remove_dog(&mut self, id: u64) -> Option<Dog> {
        self.dogs.remove(&id)
    }

    pub fn dogs(&self) -> impl Iterator<Item = &Dog> {
        self.dogs.values()
    }

    pub fn dog_count(&self) -> usize {
        self.dogs.len()
    }

    pub fn loots(&self) -> impl Iterator<Item = &LostObject> {
        self.loots.values()
    }

    pub fn loot_count(&self) -> usize {
        self.loots.len()
    }

    pub fn next_loot_id(&self) -> u64 {
        self.next_loot_id
    }

    /// Points a dog in a direction at the map's speed, or stops it
    ///
    /// Returns false if the dog does not exist. An empty direction zeroes the
    /// velocity and leaves the facing unchanged.
    pub fn steer(&mut self, dog_id: u64, direction: Option<Direction>) -> bool {
        let speed = self.map.dog_speed();
        match self.dogs.get_mut(&dog_id) {
            Some(dog) => {
                match direction {
                    Some(dir) => {
                        dog.direction = dir;
                        dog.velocity = dir.velocity(speed);
                    }
                    None => dog.velocity = Vec2::ZERO,
                }
                true
            }
            None => false,
        }
    }

    /// Advances the world by `delta`
    pub fn tick(&mut self, delta: Duration) {
        self.move_dogs(delta);
        self.spawn_loot(delta);
        self.resolve_collisions();
        self.account_time(delta);
    }

    fn move_dogs(&mut self, delta: Duration) {
        let delta_s = delta.as_secs_f64();
        let map = Arc::clone(&self.map);

        for dog in self.dogs.values_mut() {
            dog.prev_position = dog.position;
            if dog.velocity.is_zero() || delta_s == 0.0 {
                continue;
            }

            let next = Vec2::new(
                dog.position.x + dog.velocity.x * delta_s,
                dog.position.y + dog.velocity.y * delta_s,
            );
            if map.is_on_roads(next) {
                dog.position = next;
                continue;
            }

            // The target left the network: walk roads in the direction of
            // motion, clamping to each traversed road's far edge, until no
            // unvisited road contains the point. Then the dog stops.
            let mut clamped = dog.position;
            let mut visited: HashSet<usize> = HashSet::new();
            while let Some(idx) = map
                .roads()
                .iter()
                .enumerate()
                .find(|(i, road)| !visited.contains(i) && road.contains(clamped))
                .map(|(i, _)| i)
            {
                visited.insert(idx);
                let road = map.roads()[idx];
                let (start, end) = (road.start(), road.end());
                match dog.direction {
                    Direction::North => {
                        clamped.y = start.y.min(end.y) as f64 - ROAD_HALF_WIDTH;
                    }
                    Direction::South => {
                        clamped.y = start.y.max(end.y) as f64 + ROAD_HALF_WIDTH;
                    }
                    Direction::West => {
                        clamped.x = start.x.min(end.x) as f64 - ROAD_HALF_WIDTH;
                    }
                    Direction::East => {
                        clamped.x = start.x.max(end.x) as f64 + ROAD_HALF_WIDTH;
                    }
                }
            }
            dog.velocity = Vec2::ZERO;
            dog.position = clamped;
        }
    }

    fn spawn_loot(&mut self, delta: Duration) {
        if self.map.loot_types().is_empty() {
            return;
        }
        let count = self.map.loot_generator().generate(
            &mut self.rng,
            delta,
            self.loots.len(),
            self.dogs.len(),
        );
        for _ in 0..count {
            self.spawn_one_loot();
        }
    }

    fn spawn_one_loot(&mut self) {
        let road_idx = self.rng.gen_range(0..self.map.roads().len());
        let position = self.map.roads()[road_idx].random_point(&mut self.rng);
        let type_idx = self.rng.gen_range(0..self.map.loot_types().len());

        let id = self.next_loot_id;
        self.next_loot_id += 1;
        self.loots.insert(
            id,
            LostObject { id, type_idx, position, value: self.map.loot_value(type_idx) },
        );
    }

    fn resolve_collisions(&mut self) {
        let dog_ids: Vec<u64> = self.dogs.keys().copied().collect();
        let loot_ids: Vec<u64> = self.loots.keys().copied().collect();

        let mut items: Vec<Item> = loot_ids
            .iter()
            .map(|id| Item { position: self.loots[id].position, width: LOOT_WIDTH })
            .collect();
        items.extend(self.map.offices().iter().map(|office| Item {
            position: office.position.to_vec2(),
            width: OFFICE_WIDTH,
        }));

        let gatherers: Vec<Gatherer> = dog_ids
            .iter()
            .map(|id| {
                let dog = &self.dogs[id];
                Gatherer {
                    start_pos: dog.prev_position,
                    end_pos: dog.position,
                    width: DOG_WIDTH,
                }
            })
            .collect();

        let provider = CombinedProvider { items, gatherers };
        for event in find_gather_events(&provider) {
            let dog_id = dog_ids[event.gatherer_idx];
            let Some(dog) = self.dogs.get_mut(&dog_id) else {
                continue;
            };
            if event.item_idx < loot_ids.len() {
                if !dog.bag_has_room() {
                    continue;
                }
                // An earlier event may have claimed this item already.
                if let Some(loot) = self.loots.remove(&loot_ids[event.item_idx]) {
                    dog.bag.push(loot);
                }
            } else {
                let banked: u32 = dog.bag.iter().map(|item| item.value).sum();
                dog.score += banked;
                dog.bag.clear();
            }
        }
    }

    fn account_time(&mut self, delta: Duration) {
        for dog in self.dogs.values_mut() {
            dog.play_time += delta;
            if dog.velocity.is_zero() {
                dog.idle_time += delta;
            } else {
                dog.idle_time = Duration::ZERO;
            }
        }
    }
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("map", &self.map.id())
            .field("dogs", &self.dogs.len())
            .field("loots", &self.loots.len())
            .finish()
    }
}
