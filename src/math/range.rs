/// Closed range of floats, used for view-space depth ranges.
/// A range with `min > max` is invalid and acts as an identity for `merge`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloatRange {
    pub min: f32,
    pub max: f32,
}

impl Default for FloatRange {
    fn default() -> Self {
        Self::INVALID
    }
}

impl FloatRange {
    pub const INVALID: Self = Self {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };

    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    pub fn merge(&mut self, other: FloatRange) {
        if other.is_valid() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    pub fn intersection(&self, other: FloatRange) -> FloatRange {
        FloatRange {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }

    pub fn intersects(&self, other: FloatRange) -> bool {
        self.is_valid() && other.is_valid() && self.min <= other.max && other.min <= self.max
    }

    pub fn contains_range(&self, other: FloatRange) -> bool {
        other.min >= self.min && other.max <= self.max
    }

    pub fn length(&self) -> f32 {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_ignores_invalid_ranges() {
        let mut range = FloatRange::INVALID;
        range.merge(FloatRange::new(2.0, 3.0));
        range.merge(FloatRange::INVALID);
        range.merge(FloatRange::new(-1.0, 0.0));
        assert_eq!(range, FloatRange::new(-1.0, 3.0));
    }

    #[test]
    fn intersection_of_disjoint_ranges_is_invalid() {
        let a = FloatRange::new(0.0, 1.0);
        let b = FloatRange::new(2.0, 3.0);
        assert!(!a.intersects(b));
        assert!(!a.intersection(b).is_valid());
    }
}
