//! Player registry: token minting, lookup, idle retirement
//!
//! A player is the link between an auth token and one dog in one session.
//! The registry owns that mapping for the whole process and is the only
//! place tokens are ever created. Everything here runs on the API strand.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Game, MapId};

/// A joined player: an auth token bound to one dog in one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub token: String,
    pub map_id: MapId,
    pub dog_id: u64,
}

/// Final stats of a player removed for idleness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetiredPlayer {
    pub name: String,
    pub score: u32,
    pub play_time: Duration,
}

/// All live players, indexed by token
///
/// Tokens are 32 lowercase hex characters built from two independently
/// seeded 64-bit generators. Minting redraws on the (astronomically rare)
/// collision with a live token, so a token appears at most once in the
/// registry.
pub struct Players {
    by_token: HashMap<String, Player>,
    token_rng_hi: StdRng,
    token_rng_lo: StdRng,
}

impl Players {
    pub fn new() -> Self {
        Self {
            by_token: HashMap::new(),
            token_rng_hi: StdRng::from_entropy(),
            token_rng_lo: StdRng::from_entropy(),
        }
    }

    /// Registers a player for a freshly created dog and returns their token
    pub fn add(&mut self, map_id: MapId, dog_id: u64) -> String {
        let token = loop {
            let candidate = self.mint_token();
            if !self.by_token.contains_key(&candidate) {
                break candidate;
            }
        };
        self.by_token.insert(
            token.clone(),
            Player { token: token.clone(), map_id, dog_id },
        );
        token
    }

    /// Registers a player under a known token; snapshot restore only
    ///
    /// Fails when the token is already registered.
    pub fn add_with_token(&mut self, token: String, map_id: MapId, dog_id: u64) -> Result<(), String> {
        if self.by_token.contains_key(&token) {
            return Err(format!("duplicate player token {token}"));
        }
        self.by_token.insert(
            token.clone(),
            Player { token, map_id, dog_id },
        );
        Ok(())
    }

    pub fn find_by_token(&self, token: &str) -> Option<&Player> {
        self.by_token.get(token)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.by_token.values()
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }

    /// Advances every session that has at least one player, exactly once
    pub fn move_players(&self, game: &mut Game, delta: Duration) {
        let map_ids: BTreeSet<&MapId> = self.by_token.values().map(|p| &p.map_id).collect();
        for map_id in map_ids {
            if let Some(session) = game.session_mut(map_id) {
                session.tick(delta);
            }
        }
    }

    /// Removes every player whose dog has been idle for `threshold` or longer
    ///
    /// The dog is removed from its session and the player from the registry;
    /// the returned stats are what the leaderboard receives.
    pub fn retire_idle(&mut self, game: &mut Game, threshold: Duration) -> Vec<RetiredPlayer> {
        let mut retired_tokens = Vec::new();
        for player in self.by_token.values() {
            let idle = game
                .session(&player.map_id)
                .and_then(|session| session.dog(player.dog_id))
                .map(|dog| dog.idle_time);
            if matches!(idle, Some(idle) if idle >= threshold) {
                retired_tokens.push(player.token.clone());
            }
        }

        let mut retired = Vec::new();
        for token in retired_tokens {
            let Some(player) = self.by_token.remove(&token) else {
                continue;
            };
            if let Some(session) = game.session_mut(&player.map_id) {
                if let Some(dog) = session.remove_dog(player.dog_id) {
                    info!("retiring idle player {} with score {}", dog.name, dog.score);
                    retired.push(RetiredPlayer {
                        name: dog.name,
                        score: dog.score,
                        play_time: dog.play_time,
                    });
                }
            }
        }
        retired
    }

    fn mint_token(&mut self) -> String {
        format!(
            "{:016x}{:016x}",
            self.token_rng_hi.gen::<u64>(),
            self.token_rng_lo.gen::<u64>()
        )
    }
}

impl Default for Players {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Direction, Map, Point, Road};

    fn town_game() -> Game {
        let mut map = Map::new(MapId::new("town"), "Town", 1.0, 3);
        map.add_road(Road::horizontal(Point::new(0, 0), 10));
        let mut game = Game::new();
        game.add_map(map);
        game
    }

    fn join(game: &mut Game, players: &mut Players, name: &str) -> String {
        let map_id = MapId::new("town");
        let dog_id = game.session_for_map(&map_id).unwrap().create_dog(name, false);
        players.add(map_id, dog_id)
    }

    #[test]
    fn test_token_is_32_hex_chars() {
        let mut game = town_game();
        let mut players = Players::new();
        let token = join(&mut game, &mut players, "A");

        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tokens_are_unique() {
        let mut game = town_game();
        let mut players = Players::new();
        let mut seen = std::collections::HashSet::new();
        for i in 0..100 {
            let token = join(&mut game, &mut players, &format!("p{i}"));
            assert!(seen.insert(token));
        }
    }

    #[test]
    fn test_find_by_token() {
        let mut game = town_game();
        let mut players = Players::new();
        let token = join(&mut game, &mut players, "A");

        let player = players.find_by_token(&token).unwrap();
        assert_eq!(player.dog_id, 0);
        assert_eq!(player.map_id, MapId::new("town"));
        assert!(players.find_by_token("ffffffffffffffffffffffffffffffff").is_none());
    }

    #[test]
    fn test_add_with_token_rejects_duplicates() {
        let mut players = Players::new();
        let token = "0123456789abcdef0123456789abcdef".to_string();
        assert!(players.add_with_token(token.clone(), MapId::new("town"), 0).is_ok());
        assert!(players.add_with_token(token, MapId::new("town"), 1).is_err());
    }

    #[test]
    fn test_retire_idle_removes_player_and_dog() {
        let mut game = town_game();
        let mut players = Players::new();
        let token = join(&mut game, &mut players, "Sleepy");

        players.move_players(&mut game, Duration::from_millis(1500));
        let retired = players.retire_idle(&mut game, Duration::from_millis(1000));

        assert_eq!(retired.len(), 1);
        assert_eq!(retired[0].name, "Sleepy");
        assert_eq!(retired[0].score, 0);
        assert_eq!(retired[0].play_time, Duration::from_millis(1500));
        assert!(players.find_by_token(&token).is_none());
        assert_eq!(game.session(&MapId::new("town")).unwrap().dog_count(), 0);
    }

    #[test]
    fn test_moving_player_is_not_retired() {
        let mut game = town_game();
        let mut players = Players::new();
        let token = join(&mut game, &mut players, "Busy");
        let player = players.find_by_token(&token).unwrap().clone();
        game.session_mut(&player.map_id)
            .unwrap()
            .steer(player.dog_id, Some(Direction::East));

        players.move_players(&mut game, Duration::from_millis(1500));
        let retired = players.retire_idle(&mut game, Duration::from_millis(1000));

        assert!(retired.is_empty());
        assert!(players.find_by_token(&token).is_some());
    }

    #[test]
    fn test_move_players_ticks_each_session_once() {
        let mut game = town_game();
        let mut players = Players::new();
        join(&mut game, &mut players, "A");
        join(&mut game, &mut players, "B");

        players.move_players(&mut game, Duration::from_millis(500));

        let session = game.session(&MapId::new("town")).unwrap();
        for dog in session.dogs() {
            assert_eq!(dog.play_time, Duration::from_millis(500));
        }
    }
}
