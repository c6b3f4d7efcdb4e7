use crate::vec2::Vec2;

// The thin rigid-shape contract the fluid collides against: static
// segments (walls) and circles (obstacles), plus the mouse-drag
// constraint. The owner retargets the drag anchor every frame and clears
// it on release; nothing here holds callbacks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Shape {
    Segment { a: Vec2, b: Vec2 },
    Circle { center: Vec2, radius: f32 },
}

impl Shape {
    // Push-out vector for a point body of radius `margin`, if penetrating.
    pub(crate) fn resolve(&self, p: Vec2, margin: f32) -> Option<Vec2> {
        match *self {
            Shape::Circle { center, radius } => {
                let d = p.sub(center);
                let dist = d.len();
                let min = radius + margin;
                if dist >= min {
                    return None;
                }
                let n = if dist <= 1e-6 {
                    Vec2::new(0.0, -1.0)
                } else {
                    d.mul(1.0 / dist)
                };
                Some(n.mul(min - dist))
            }
            Shape::Segment { a, b } => {
                let ab = b.sub(a);
                let t = (p.sub(a).dot(ab) / ab.len2().max(1e-6)).clamp(0.0, 1.0);
                let closest = a.add(ab.mul(t));
                let d = p.sub(closest);
                let dist = d.len();
                if dist >= margin {
                    return None;
                }
                let n = if dist <= 1e-6 {
                    // point exactly on the segment: push along its normal
                    Vec2::new(-ab.y, ab.x).norm()
                } else {
                    d.mul(1.0 / dist)
                };
                Some(n.mul(margin - dist))
            }
        }
    }

    pub(crate) fn contains(&self, p: Vec2) -> bool {
        match *self {
            Shape::Circle { center, radius } => p.dist(center) <= radius,
            Shape::Segment { a, b } => {
                let ab = b.sub(a);
                let t = (p.sub(a).dot(ab) / ab.len2().max(1e-6)).clamp(0.0, 1.0);
                p.dist(a.add(ab.mul(t))) <= 4.0
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Drag {
    pub(crate) particle: usize,
    pub(crate) anchor: Vec2,
    pub(crate) strength: f32,
}

pub(crate) struct World {
    pub(crate) gravity: Vec2,
    pub(crate) shapes: Vec<Shape>,
    pub(crate) drag: Option<Drag>,
}

impl World {
    pub(crate) fn new(gravity: Vec2) -> Self {
        Self {
            gravity,
            shapes: Vec::new(),
            drag: None,
        }
    }

    pub(crate) fn shape_at(&self, p: Vec2) -> Option<usize> {
        self.shapes.iter().position(|s| s.contains(p))
    }
}
