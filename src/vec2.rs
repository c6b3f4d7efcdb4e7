#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Vec2 {
    pub(crate) x: f32,
    pub(crate) y: f32,
}

impl Vec2 {
    pub(crate) const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub(crate) fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
    pub(crate) fn add(self, o: Vec2) -> Self {
        Self::new(self.x + o.x, self.y + o.y)
    }
    pub(crate) fn sub(self, o: Vec2) -> Self {
        Self::new(self.x - o.x, self.y - o.y)
    }
    pub(crate) fn mul(self, k: f32) -> Self {
        Self::new(self.x * k, self.y * k)
    }
    pub(crate) fn dot(self, o: Vec2) -> f32 {
        self.x * o.x + self.y * o.y
    }
    pub(crate) fn len2(self) -> f32 {
        self.x * self.x + self.y * self.y
    }
    pub(crate) fn len(self) -> f32 {
        self.len2().sqrt()
    }
    pub(crate) fn dist(self, o: Vec2) -> f32 {
        self.sub(o).len()
    }
    pub(crate) fn norm(self) -> Self {
        let l = self.len();
        if l <= 1e-6 {
            Self::ZERO
        } else {
            self.mul(1.0 / l)
        }
    }
    pub(crate) fn limit(self, max: f32) -> Self {
        let l2 = self.len2();
        if l2 > max * max {
            self.mul(max / l2.sqrt())
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_of_tiny_vector_is_zero() {
        assert_eq!(Vec2::new(1e-9, 0.0).norm(), Vec2::ZERO);
    }

    #[test]
    fn limit_caps_magnitude() {
        let v = Vec2::new(30.0, 40.0).limit(5.0);
        assert!((v.len() - 5.0).abs() < 1e-4);
        let w = Vec2::new(3.0, 4.0).limit(10.0);
        assert_eq!(w, Vec2::new(3.0, 4.0));
    }
}
