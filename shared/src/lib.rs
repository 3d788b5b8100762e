//! # Game World Library
//!
//! This crate contains the complete world model and simulation kernel for the
//! lost-and-hound game server: map topology, the geometry used for collision
//! sweeps, loot generation, and the per-map session that advances dogs
//! through discrete ticks.
//!
//! ## Core Components
//!
//! ### Geometry (`geom`)
//! Segment/point projection math and the gather-event sweep. Given the dogs'
//! per-tick trajectories and the stationary loot and office deposit points,
//! it produces the time-ordered list of overlap events within the tick.
//!
//! ### Map Topology (`map`)
//! Immutable per-map configuration: axis-aligned roads with a fixed walkable
//! half-width, cosmetic buildings, office depots, and the loot-type value
//! table. Built once at startup and shared behind `Arc`.
//!
//! ### Loot Generation (`loot`)
//! The probabilistic spawn schedule. The target density is one live item per
//! dog; each vacancy fills independently with a probability derived from the
//! configured base probability and the elapsed tick time.
//!
//! ### Sessions (`session`)
//! The mutable world of one map: dogs, live loot, and the tick step that
//! integrates movement, confines dogs to roads, spawns loot, resolves
//! pickups and deposits in trajectory order, and accounts play/idle time.
//!
//! ### Game Registry (`game`)
//! The loaded maps and the lazily created, at-most-one session per map.
//!
//! ## Design Philosophy
//!
//! ### Deterministic Simulation
//! All randomness flows through a per-session RNG that tests can seed, and
//! dogs/loot are stored in ordered maps so the collision sweep indexes them
//! deterministically. A tick with a zero time delta leaves the world
//! bit-identical.
//!
//! ### No I/O
//! This crate knows nothing about HTTP, JSON documents, files or databases.
//! The server crate converts at those boundaries; the model stays pure.

pub mod game;
pub mod geom;
pub mod loot;
pub mod map;
pub mod session;

pub use game::Game;
pub use geom::{Vec2, DOG_WIDTH, LOOT_WIDTH, OFFICE_WIDTH, ROAD_HALF_WIDTH};
pub use loot::LootGenerator;
pub use map::{Building, LootType, Map, MapId, Office, Point, Road};
pub use session::{Direction, Dog, GameSession, LostObject};
