//! Quad-tree spatial index (§4.1). Rebuilt from scratch every tick; never
//! read concurrently with mutation, so no internal synchronization.

use protocol::Vector2D;

/// Opaque entity reference stored as a quad-tree payload. Only collision
/// resolution downcasts this back to a concrete entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Ship(u64),
    Projectile(u64),
    Planet(u64),
}

/// An axis-aligned rectangle, `min` inclusive and `max` exclusive on no
/// particular side in practice (comparisons below use `<=`/`>=`, which
/// admits the false positives the spec explicitly allows).
#[derive(Debug, Clone, Copy)]
pub struct Rect {
    pub min: Vector2D,
    pub max: Vector2D,
}

impl Rect {
    pub fn new(min: Vector2D, max: Vector2D) -> Self {
        Rect { min, max }
    }

    pub fn centered(center: Vector2D, half_extent: f64) -> Self {
        Rect {
            min: Vector2D::new(center.x - half_extent, center.y - half_extent),
            max: Vector2D::new(center.x + half_extent, center.y + half_extent),
        }
    }

    pub fn contains(&self, point: Vector2D) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    fn quadrants(&self) -> [Rect; 4] {
        let mid = Vector2D::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        );
        [
            Rect::new(self.min, mid),
            Rect::new(Vector2D::new(mid.x, self.min.y), Vector2D::new(self.max.x, mid.y)),
            Rect::new(Vector2D::new(self.min.x, mid.y), Vector2D::new(mid.x, self.max.y)),
            Rect::new(mid, self.max),
        ]
    }
}

/// A 2D quad-tree over axis-aligned rectangles, subdividing once a node
/// holds more than `capacity` points.
pub struct QuadTree {
    bounds: Rect,
    capacity: usize,
    points: Vec<(Vector2D, EntityRef)>,
    children: Option<Box<[QuadTree; 4]>>,
}

impl QuadTree {
    pub fn new(bounds: Rect, capacity: usize) -> Self {
        QuadTree {
            bounds,
            capacity,
            points: Vec::new(),
            children: None,
        }
    }

    /// Removes all points but keeps bounds and capacity.
    pub fn clear(&mut self) {
        self.points.clear();
        self.children = None;
    }

    pub fn insert(&mut self, point: Vector2D, payload: EntityRef) {
        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                if child.bounds.contains(point) {
                    child.insert(point, payload);
                    return;
                }
            }
            // Point falls on a boundary shared by no single quadrant's strict
            // containment (floating-point edge); fall back to the first
            // quadrant whose bounds are closest, which is always the first
            // overlapping one since quadrants tile the full bounds.
            children[0].insert(point, payload);
            return;
        }

        self.points.push((point, payload));
        if self.points.len() > self.capacity {
            self.subdivide();
        }
    }

    fn subdivide(&mut self) {
        let quadrants = self.bounds.quadrants();
        let mut children: [QuadTree; 4] = quadrants.map(|r| QuadTree::new(r, self.capacity));
        for (point, payload) in self.points.drain(..) {
            let mut placed = false;
            for child in children.iter_mut() {
                if child.bounds.contains(point) {
                    child.insert(point, payload);
                    placed = true;
                    break;
                }
            }
            if !placed {
                children[0].insert(point, payload);
            }
        }
        self.children = Some(Box::new(children));
    }

    /// Every payload whose point lies within `rect`. False positives (points
    /// just outside `rect`) are permitted; false negatives are not.
    pub fn query(&self, rect: &Rect) -> Vec<EntityRef> {
        let mut out = Vec::new();
        self.query_into(rect, &mut out);
        out
    }

    fn query_into(&self, rect: &Rect, out: &mut Vec<EntityRef>) {
        if !self.bounds.intersects(rect) {
            return;
        }
        for (point, payload) in &self.points {
            if rect.contains(*point) {
                out.push(*payload);
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query_into(rect, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world(half: f64) -> Rect {
        Rect::centered(Vector2D::ZERO, half)
    }

    #[test]
    fn query_finds_points_inside_rect() {
        let mut tree = QuadTree::new(world(1000.0), 4);
        tree.insert(Vector2D::new(10.0, 10.0), EntityRef::Ship(1));
        tree.insert(Vector2D::new(-500.0, 200.0), EntityRef::Ship(2));
        let hits = tree.query(&Rect::centered(Vector2D::new(10.0, 10.0), 50.0));
        assert_eq!(hits, vec![EntityRef::Ship(1)]);
    }

    #[test]
    fn subdivides_past_capacity_and_still_finds_all_matches() {
        let mut tree = QuadTree::new(world(1000.0), 2);
        for i in 0..50u64 {
            let x = (i as f64 * 7.0) - 175.0;
            tree.insert(Vector2D::new(x, x), EntityRef::Ship(i));
        }
        let hits = tree.query(&world(1000.0));
        assert_eq!(hits.len(), 50);
    }

    #[test]
    fn clear_removes_points_and_children() {
        let mut tree = QuadTree::new(world(1000.0), 2);
        for i in 0..10u64 {
            tree.insert(Vector2D::new(i as f64, 0.0), EntityRef::Ship(i));
        }
        tree.clear();
        assert!(tree.query(&world(1000.0)).is_empty());
    }
}
