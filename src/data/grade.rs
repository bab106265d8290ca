use std::{fmt, str::FromStr};

/// Numeric value for anything that is not a recognised letter grade.
pub const UNGRADED: i32 = -1;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Grade {
    A,
    AMinus,
    BPlus,
    B,
    BMinus,
    CPlus,
    C,
    CMinus,
    D,
    F,
}

impl Grade {
    pub const ALL: [Self; 10] = [
        Self::A,
        Self::AMinus,
        Self::BPlus,
        Self::B,
        Self::BMinus,
        Self::CPlus,
        Self::C,
        Self::CMinus,
        Self::D,
        Self::F,
    ];

    pub const fn numeric(self) -> i32 {
        match self {
            Self::A => 18,
            Self::AMinus => 16,
            Self::BPlus => 14,
            Self::B => 12,
            Self::BMinus => 10,
            Self::CPlus => 8,
            Self::C => 6,
            Self::CMinus => 4,
            Self::D => 2,
            Self::F => 0,
        }
    }

    pub const fn letter(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::AMinus => "A-",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::BMinus => "B-",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::CMinus => "C-",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

impl FromStr for Grade {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::ALL
            .into_iter()
            .find(|grade| grade.letter() == upper)
            .ok_or(())
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

/// Maps a stored grade to its numeric value, [`UNGRADED`] for blank or unknown letters.
pub fn numeric_grade(grade: Option<&str>) -> i32 {
    grade
        .and_then(|g| g.parse::<Grade>().ok())
        .map_or(UNGRADED, Grade::numeric)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mention {
    NotGraded,
    VeryGood,
    Good,
    FairlyGood,
    Pass,
    Insufficient,
}

impl Mention {
    pub const fn from_numeric(numeric: i32) -> Self {
        match numeric {
            n if n < 0 => Self::NotGraded,
            16.. => Self::VeryGood,
            14.. => Self::Good,
            12.. => Self::FairlyGood,
            10.. => Self::Pass,
            _ => Self::Insufficient,
        }
    }
}

impl fmt::Display for Mention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotGraded => "Not graded",
            Self::VeryGood => "Very good",
            Self::Good => "Good",
            Self::FairlyGood => "Fairly good",
            Self::Pass => "Pass",
            Self::Insufficient => "Insufficient",
        })
    }
}
