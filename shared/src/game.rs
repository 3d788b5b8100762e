//! The collection of loaded maps and their live sessions

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::map::{Map, MapId};
use crate::session::GameSession;

/// All maps known to the server and the single session each may have
///
/// Sessions are created lazily on the first join for a map and live for the
/// rest of the process. Iteration order over sessions follows map id, but
/// callers must not rely on any particular cross-session order.
#[derive(Debug, Default)]
pub struct Game {
    maps: Vec<Arc<Map>>,
    map_index: HashMap<MapId, usize>,
    sessions: BTreeMap<MapId, GameSession>,
}

impl Game {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_map(&mut self, map: Map) {
        self.map_index.insert(map.id().clone(), self.maps.len());
        self.maps.push(Arc::new(map));
    }

    pub fn maps(&self) -> &[Arc<Map>] {
        &self.maps
    }

    pub fn find_map(&self, id: &MapId) -> Option<&Arc<Map>> {
        self.map_index.get(id).map(|idx| &self.maps[*idx])
    }

    /// The live session for a map, creating it on first use
    ///
    /// Returns None when the map id is unknown.
    pub fn session_for_map(&mut self, id: &MapId) -> Option<&mut GameSession> {
        if !self.sessions.contains_key(id) {
            let map = Arc::clone(self.find_map(id)?);
            self.sessions.insert(id.clone(), GameSession::new(map));
        }
        self.sessions.get_mut(id)
    }

    pub fn session(&self, id: &MapId) -> Option<&GameSession> {
        self.sessions.get(id)
    }

    pub fn session_mut(&mut self, id: &MapId) -> Option<&mut GameSession> {
        self.sessions.get_mut(id)
    }

    pub fn sessions(&self) -> impl Iterator<Item = (&MapId, &GameSession)> {
        self.sessions.iter()
    }

    pub fn sessions_mut(&mut self) -> impl Iterator<Item = (&MapId, &mut GameSession)> {
        self.sessions.iter_mut()
    }

    /// Installs a session restored from a snapshot, replacing any live one
    pub fn install_session(&mut self, id: MapId, session: GameSession) {
        self.sessions.insert(id, session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{Point, Road};

    fn game_with_map(id: &str) -> Game {
        let mut map = Map::new(MapId::new(id), "Test", 1.0, 3);
        map.add_road(Road::horizontal(Point::new(0, 0), 10));
        let mut game = Game::new();
        game.add_map(map);
        game
    }

    #[test]
    fn test_find_map() {
        let game = game_with_map("town");
        assert!(game.find_map(&MapId::new("town")).is_some());
        assert!(game.find_map(&MapId::new("city")).is_none());
    }

    #[test]
    fn test_session_created_lazily_and_reused() {
        let mut game = game_with_map("town");
        let id = MapId::new("town");
        assert!(game.session(&id).is_none());

        let dog_id = game.session_for_map(&id).unwrap().create_dog("A", false);
        assert_eq!(dog_id, 0);

        // The same session comes back; the dog is still there.
        let session = game.session_for_map(&id).unwrap();
        assert_eq!(session.dog_count(), 1);
    }

    #[test]
    fn test_session_for_unknown_map() {
        let mut game = game_with_map("town");
        assert!(game.session_for_map(&MapId::new("nowhere")).is_none());
    }
}
