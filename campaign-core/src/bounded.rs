use serde::{Deserialize, Serialize};

/// A value clamped to an integer range (for discrete values).
/// Used for: city morale (0 to 100), diplomacy values (0 to 100), etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundedInt {
    value: i32,
    min: i32,
    max: i32,
}

impl BoundedInt {
    pub const fn new(value: i32, min: i32, max: i32) -> Self {
        let value = if value < min {
            min
        } else if value > max {
            max
        } else {
            value
        };
        Self { value, min, max }
    }

    pub fn get(&self) -> i32 {
        self.value
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn add(&mut self, delta: i32) {
        self.value = (self.value + delta).clamp(self.min, self.max);
    }

    pub fn set(&mut self, value: i32) {
        self.value = value.clamp(self.min, self.max);
    }

    /// Ratio of the current value within its range, in percent (0..=100).
    /// Returns 0 if max == min.
    pub fn ratio_pct(&self) -> i32 {
        let range = self.max - self.min;
        if range == 0 {
            return 0;
        }
        (self.value - self.min) * 100 / range
    }
}

pub type Morale = BoundedInt;
pub type RelationValue = BoundedInt;

// Factory functions
pub const fn new_morale(value: i32) -> BoundedInt {
    BoundedInt::new(value, 0, 100)
}

pub const fn new_relation_value(value: i32) -> BoundedInt {
    BoundedInt::new(value, 0, 100)
}
