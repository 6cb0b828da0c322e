//! Grid, hazard sources and occupancy.

use std::collections::HashSet;

use crate::log::Location;
use crate::sim::rng::Rng;

/// Chebyshev distance.
pub(crate) fn chebyshev(a: Location, b: Location) -> i32 {
    (a.x - b.x).abs().max((a.y - b.y).abs())
}

/// The host-side world the agents sense and act in.
#[derive(Debug, Clone)]
pub(crate) struct World {
    pub(crate) width: i32,
    pub(crate) height: i32,
    /// Wandering hazard sources, in spawn order.
    pub(crate) sources: Vec<Location>,
    occupied: HashSet<Location>,
    pub(crate) rng: Rng,
}

impl World {
    pub(crate) fn new(width: i32, height: i32, seed: u64) -> Self {
        Self {
            width,
            height,
            sources: Vec::new(),
            occupied: HashSet::new(),
            rng: Rng::new(seed),
        }
    }

    pub(crate) fn center(&self) -> Location {
        Location::new(self.width / 2, self.height / 2)
    }

    pub(crate) fn in_bounds(&self, at: Location) -> bool {
        (0..self.width).contains(&at.x) && (0..self.height).contains(&at.y)
    }

    pub(crate) fn is_occupied(&self, at: Location) -> bool {
        self.occupied.contains(&at)
    }

    pub(crate) fn occupy(&mut self, at: Location) {
        self.occupied.insert(at);
    }

    pub(crate) fn vacate(&mut self, at: Location) {
        self.occupied.remove(&at);
    }

    /// In-bounds, unoccupied neighbours of `at`, in a fixed order.
    pub(crate) fn free_neighbours(&self, at: Location) -> Vec<Location> {
        at.neighbours()
            .filter(|&n| self.in_bounds(n) && !self.is_occupied(n))
            .collect()
    }

    pub(crate) fn has_source(&self, at: Location) -> bool {
        self.sources.contains(&at)
    }

    /// Whether any source lies within `radius` (Chebyshev) of `at`.
    pub(crate) fn source_within(&self, at: Location, radius: i32) -> bool {
        self.sources.iter().any(|&s| chebyshev(s, at) <= radius)
    }

    /// Sources within `radius` (euclidean) of `at`.
    pub(crate) fn visible_sources(&self, at: Location, radius: i32) -> Vec<Location> {
        let r2 = i64::from(radius) * i64::from(radius);
        self.sources
            .iter()
            .copied()
            .filter(|&s| s.distance_squared(at) <= r2)
            .collect()
    }

    /// Remove every source within one cell of `at`; returns what was cleaned.
    pub(crate) fn clean_around(&mut self, at: Location) -> Vec<Location> {
        let (cleaned, kept): (Vec<Location>, Vec<Location>) =
            self.sources.iter().partition(|&&s| chebyshev(s, at) <= 1);
        self.sources = kept;
        cleaned
    }

    fn clamp(&self, at: Location) -> Location {
        Location::new(
            at.x.clamp(0, self.width - 1),
            at.y.clamp(0, self.height - 1),
        )
    }

    /// Move every source one random step, then maybe spawn a new one away
    /// from `keep_clear`.
    pub(crate) fn evolve_sources(
        &mut self,
        spawn_chance: f64,
        max_sources: usize,
        keep_clear: Location,
    ) {
        for i in 0..self.sources.len() {
            let (dx, dy) = (self.rng.step(), self.rng.step());
            let moved = self.clamp(Location::new(self.sources[i].x + dx, self.sources[i].y + dy));
            if chebyshev(moved, keep_clear) > 1 {
                self.sources[i] = moved;
            }
        }
        if self.sources.len() < max_sources && self.rng.chance(spawn_chance) {
            let at = Location::new(self.rng.coord(self.width), self.rng.coord(self.height));
            if chebyshev(at, keep_clear) > 2 && !self.has_source(at) {
                self.sources.push(at);
            }
        }
    }
}
