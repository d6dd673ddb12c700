use serde::{Deserialize, Serialize};

/// Ordered ability/development rating, worst to best.
///
/// Used for general abilities and city development tracks. Stepping
/// saturates at both ends: an S cannot be raised, a D cannot be lowered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Grade {
    #[default]
    D,
    C,
    B,
    A,
    S,
}

impl Grade {
    /// Step up one grade, saturating at S.
    pub fn up(self) -> Self {
        match self {
            Grade::D => Grade::C,
            Grade::C => Grade::B,
            Grade::B => Grade::A,
            Grade::A | Grade::S => Grade::S,
        }
    }

    /// Step down one grade, saturating at D.
    pub fn down(self) -> Self {
        match self {
            Grade::S => Grade::A,
            Grade::A => Grade::B,
            Grade::B => Grade::C,
            Grade::C | Grade::D => Grade::D,
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Grade::D => "D",
            Grade::C => "C",
            Grade::B => "B",
            Grade::A => "A",
            Grade::S => "S",
        };
        write!(f, "{s}")
    }
}

/// Final campaign result grade, worst to best.
///
/// Distinct from [`Grade`]: this is the outcome of the victory judge's
/// cascade, not an ability rating, and it includes a failure grade F.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OutcomeGrade {
    F,
    D,
    C,
    B,
    A,
    S,
}

impl std::fmt::Display for OutcomeGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OutcomeGrade::F => "F",
            OutcomeGrade::D => "D",
            OutcomeGrade::C => "C",
            OutcomeGrade::B => "B",
            OutcomeGrade::A => "A",
            OutcomeGrade::S => "S",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_stepping_saturates() {
        assert_eq!(Grade::D.up(), Grade::C);
        assert_eq!(Grade::A.up(), Grade::S);
        assert_eq!(Grade::S.up(), Grade::S);

        assert_eq!(Grade::S.down(), Grade::A);
        assert_eq!(Grade::C.down(), Grade::D);
        assert_eq!(Grade::D.down(), Grade::D);
    }

    #[test]
    fn test_grade_ordering() {
        assert!(Grade::D < Grade::C);
        assert!(Grade::A < Grade::S);
        assert!(OutcomeGrade::F < OutcomeGrade::D);
        assert!(OutcomeGrade::A < OutcomeGrade::S);
    }
}
