//! Geometry primitives and the gather-event sweep
//!
//! Dogs move along straight segments during a tick; loot and office deposit
//! points are stationary. This module answers the single question the
//! simulation needs: at which fraction of its segment does a moving gatherer
//! pass close enough to an item to interact with it.

use serde::{Deserialize, Serialize};

/// A 2D point or vector with `f64` components
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// Collision radius of a moving dog
pub const DOG_WIDTH: f64 = 0.3;
/// Collision radius of an office deposit point
pub const OFFICE_WIDTH: f64 = 0.25;
/// Collision radius of a loot item (treated as a point)
pub const LOOT_WIDTH: f64 = 0.0;
/// Half-width of a road; positions within this margin count as on the road
pub const ROAD_HALF_WIDTH: f64 = 0.4;

/// Result of projecting a stationary point onto a gatherer's segment
///
/// `proj_ratio` is the fraction of the segment at which the perpendicular
/// from the point meets it; it doubles as the time-within-tick of the
/// potential collection.
#[derive(Debug, Clone, Copy)]
pub struct CollectionResult {
    /// Squared perpendicular distance from the point to the segment's line
    pub sq_distance: f64,
    /// Fractional projection of the point onto the segment
    pub proj_ratio: f64,
}

impl CollectionResult {
    /// Whether the point is actually collected for the given combined radius
    pub fn is_collected(&self, collect_radius: f64) -> bool {
        self.proj_ratio >= 0.0
            && self.proj_ratio <= 1.0
            && self.sq_distance <= collect_radius * collect_radius
    }
}

/// Projects point `c` onto the segment from `a` to `b`
///
/// The caller must guarantee `a != b`; a zero-length segment has no defined
/// projection and would divide by zero.
pub fn try_collect_point(a: Vec2, b: Vec2, c: Vec2) -> CollectionResult {
    debug_assert!(a.x != b.x || a.y != b.y);
    let u_x = c.x - a.x;
    let u_y = c.y - a.y;
    let v_x = b.x - a.x;
    let v_y = b.y - a.y;
    let u_dot_v = u_x * v_x + u_y * v_y;
    let u_len2 = u_x * u_x + u_y * u_y;
    let v_len2 = v_x * v_x + v_y * v_y;

    CollectionResult {
        sq_distance: u_len2 - (u_dot_v * u_dot_v) / v_len2,
        proj_ratio: u_dot_v / v_len2,
    }
}

/// A stationary collectible with a collision radius
#[derive(Debug, Clone, Copy)]
pub struct Item {
    pub position: Vec2,
    pub width: f64,
}

/// A gatherer's motion over one tick, with its collision radius
#[derive(Debug, Clone, Copy)]
pub struct Gatherer {
    pub start_pos: Vec2,
    pub end_pos: Vec2,
    pub width: f64,
}

/// Supplies the items and gatherers for one collision sweep
pub trait ItemGathererProvider {
    fn items_count(&self) -> usize;
    fn item(&self, idx: usize) -> Item;
    fn gatherers_count(&self) -> usize;
    fn gatherer(&self, idx: usize) -> Gatherer;
}

/// One gatherer/item overlap within a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatherEvent {
    pub item_idx: usize,
    pub gatherer_idx: usize,
    pub sq_distance: f64,
    /// Fractional time within the tick at which the overlap occurs
    pub time: f64,
}

/// Finds all gatherer/item overlaps, ordered by time within the tick
///
/// Gatherers that did not move are skipped entirely. The sort is stable, so
/// events sharing the same time keep their insertion order: for a given
/// gatherer, lower item indices win ties.
pub fn find_gather_events(provider: &dyn ItemGathererProvider) -> Vec<GatherEvent> {
    let mut events = Vec::new();

    for g_idx in 0..provider.gatherers_count() {
        let gatherer = provider.gatherer(g_idx);
        if gatherer.start_pos == gatherer.end_pos {
            continue;
        }
        for i_idx in 0..provider.items_count() {
            let item = provider.item(i_idx);
            let collect = try_collect_point(gatherer.start_pos, gatherer.end_pos, item.position);
            if collect.is_collected(item.width + gatherer.width) {
                events.push(GatherEvent {
                    item_idx: i_idx,
                    gatherer_idx: g_idx,
                    sq_distance: collect.sq_distance,
                    time: collect.proj_ratio,
                });
            }
        }
    }

    events.sort_by(|lhs, rhs| lhs.time.total_cmp(&rhs.time));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    struct VecProvider {
        items: Vec<Item>,
        gatherers: Vec<Gatherer>,
    }

    impl ItemGathererProvider for VecProvider {
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

    #[test]
    fn test_projection_on_segment() {
        let result = try_collect_point(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(5.0, 0.2));
        assert_approx_eq!(result.proj_ratio, 0.5);
        assert_approx_eq!(result.sq_distance, 0.04);
        assert!(result.is_collected(DOG_WIDTH));
    }

    #[test]
    fn test_projection_before_segment_start() {
        let result =
            try_collect_point(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(-1.0, 0.0));
        assert!(result.proj_ratio < 0.0);
        assert!(!result.is_collected(DOG_WIDTH));
    }

    #[test]
    fn test_projection_past_segment_end() {
        let result =
            try_collect_point(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(11.0, 0.0));
        assert!(result.proj_ratio > 1.0);
        assert!(!result.is_collected(DOG_WIDTH));
    }

    #[test]
    fn test_too_far_from_line() {
        let result = try_collect_point(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0), Vec2::new(5.0, 1.0));
        assert_approx_eq!(result.proj_ratio, 0.5);
        assert!(!result.is_collected(DOG_WIDTH));
    }

    #[test]
    fn test_events_sorted_by_time() {
        let provider = VecProvider {
            items: vec![
                Item { position: Vec2::new(8.0, 0.0), width: 0.0 },
                Item { position: Vec2::new(2.0, 0.0), width: 0.0 },
                Item { position: Vec2::new(5.0, 0.0), width: 0.0 },
            ],
            gatherers: vec![Gatherer {
                start_pos: Vec2::new(0.0, 0.0),
                end_pos: Vec2::new(10.0, 0.0),
                width: DOG_WIDTH,
            }],
        };

        let events = find_gather_events(&provider);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].item_idx, 1);
        assert_eq!(events[1].item_idx, 2);
        assert_eq!(events[2].item_idx, 0);
        assert!(events[0].time < events[1].time && events[1].time < events[2].time);
    }

    #[test]
    fn test_tie_break_keeps_insertion_order() {
        // Two items at the same spot: the lower index must come first.
        let provider = VecProvider {
            items: vec![
                Item { position: Vec2::new(5.0, 0.1), width: 0.0 },
                Item { position: Vec2::new(5.0, -0.1), width: 0.0 },
            ],
            gatherers: vec![Gatherer {
                start_pos: Vec2::new(0.0, 0.0),
                end_pos: Vec2::new(10.0, 0.0),
                width: DOG_WIDTH,
            }],
        };

        let events = find_gather_events(&provider);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].item_idx, 0);
        assert_eq!(events[1].item_idx, 1);
    }

    #[test]
    fn test_stationary_gatherer_produces_no_events() {
        let provider = VecProvider {
            items: vec![Item { position: Vec2::new(0.0, 0.0), width: 0.5 }],
            gatherers: vec![Gatherer {
                start_pos: Vec2::new(0.0, 0.0),
                end_pos: Vec2::new(0.0, 0.0),
                width: DOG_WIDTH,
            }],
        };

        assert!(find_gather_events(&provider).is_empty());
    }

    #[test]
    fn test_combined_radius() {
        // Item at distance 0.5: outside a 0.3 gatherer alone, inside 0.3 + 0.25.
        let gatherer = Gatherer {
            start_pos: Vec2::new(0.0, 0.0),
            end_pos: Vec2::new(10.0, 0.0),
            width: DOG_WIDTH,
        };
        let result = try_collect_point(gatherer.start_pos, gatherer.end_pos, Vec2::new(5.0, 0.5));
        assert!(!result.is_collected(DOG_WIDTH + LOOT_WIDTH));
        assert!(result.is_collected(DOG_WIDTH + OFFICE_WIDTH));
    }
}
