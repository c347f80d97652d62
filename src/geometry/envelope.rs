/// Axis-aligned bounding rectangle in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    #[must_use]
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Smallest envelope containing every point. An empty slice yields an
    /// inverted envelope that any union replaces.
    #[must_use]
    pub fn from_points(points: &[(f64, f64)]) -> Self {
        points.iter().fold(
            Self::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |env, &(x, y)| Self {
                min_x: env.min_x.min(x),
                min_y: env.min_y.min(y),
                max_x: env.max_x.max(x),
                max_y: env.max_y.max(y),
            },
        )
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Grow this envelope so it also covers `other`.
    pub fn expand_to_include(&mut self, other: &Self) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    #[must_use]
    pub fn union(mut self, other: Self) -> Self {
        self.expand_to_include(&other);
        self
    }

    /// Whether `other` lies entirely inside this envelope (edges inclusive).
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }

    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        !(self.max_x < other.min_x
            || self.min_x > other.max_x
            || self.max_y < other.min_y
            || self.min_y > other.max_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_is_commutative() {
        let a = Envelope::new(0.0, 0.0, 1.0, 1.0);
        let b = Envelope::new(1.0, -1.0, 3.0, 0.5);
        assert_eq!(a.union(b), b.union(a));
        assert_eq!(a.union(b), Envelope::new(0.0, -1.0, 3.0, 1.0));
    }

    #[test]
    fn test_contains_and_intersects() {
        let outer = Envelope::new(0.0, 0.0, 10.0, 10.0);
        let inner = Envelope::new(2.0, 2.0, 5.0, 10.0);
        let outside = Envelope::new(20.0, 20.0, 30.0, 30.0);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.intersects(&inner));
        assert!(!outer.intersects(&outside));
    }

    #[test]
    fn test_from_points() {
        let env = Envelope::from_points(&[(3.0, -1.0), (-2.0, 4.0), (0.0, 0.0)]);
        assert_eq!(env, Envelope::new(-2.0, -1.0, 3.0, 4.0));
        assert!((env.width() - 5.0).abs() < f64::EPSILON);
        assert!((env.height() - 5.0).abs() < f64::EPSILON);
    }
}
