//! # Game Server Library
//!
//! This crate is the runtime around the world model: it turns HTTP requests
//! into strictly ordered operations on the live game, keeps the world
//! advancing on a tick timer, snapshots it to disk, and persists retired
//! players to a durable leaderboard.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server owns the only copy of the world. Clients observe it through
//! the state endpoints and influence it exclusively through join/action
//! requests; every rule decision happens here.
//!
//! ### Single-Strand Mutation
//! The process runs a multi-threaded runtime, but all world mutation is
//! funneled through one mpsc-fed task (the API strand). HTTP I/O, static
//! file serving and database access stay concurrent; the model itself never
//! needs a lock. See `strand`.
//!
//! ### Durability
//! Two independent persistence paths: periodic crash-safe snapshots of the
//! complete world (`state`), and the append-only leaderboard of retired
//! players in Postgres (`records`).
//!
//! ## Module Organization
//!
//! - `app`: the application façade and error taxonomy; the only API the
//!   rest of the process uses to touch the world
//! - `players`: token minting, player lookup, idle retirement
//! - `strand`: the command channel and the task that owns the `Application`
//! - `network`: the axum router: routing, auth, validation, error mapping
//! - `config`: JSON config loading and validation
//! - `state`: snapshot save/restore and the periodic save manager
//! - `records`: the leaderboard repository over a Postgres pool

pub mod app;
pub mod config;
pub mod network;
pub mod players;
pub mod records;
pub mod state;
pub mod strand;
