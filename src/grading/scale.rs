use serde::{Deserialize, Serialize};
use std::fmt;

/// Letter grades on the UCE A-E scale, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GradeLetter {
    A,
    B,
    C,
    D,
    E,
}

impl GradeLetter {
    pub const ALL: [GradeLetter; 5] = [
        GradeLetter::A,
        GradeLetter::B,
        GradeLetter::C,
        GradeLetter::D,
        GradeLetter::E,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GradeLetter::A => "A",
            GradeLetter::B => "B",
            GradeLetter::C => "C",
            GradeLetter::D => "D",
            GradeLetter::E => "E",
        }
    }
}

impl fmt::Display for GradeLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contiguous, inclusive score range mapped to one letter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GradeBand {
    pub letter: GradeLetter,
    pub min_score: u8,
    pub max_score: u8,
    pub label: &'static str,
    pub description: &'static str,
    pub color_tag: &'static str,
}

impl GradeBand {
    pub fn contains(&self, score: f64) -> bool {
        score >= f64::from(self.min_score) && score <= f64::from(self.max_score)
    }
}

/// Fixed grading scale. Ordered by `min_score` descending; E doubles as the fallback band.
pub static GRADE_SCALE: [GradeBand; 5] = [
    GradeBand {
        letter: GradeLetter::A,
        min_score: 80,
        max_score: 100,
        label: "Excellent",
        description: "Excellent: Demonstrates exceptional mastery of subject competencies, with strong application of knowledge and skills.",
        color_tag: "success",
    },
    GradeBand {
        letter: GradeLetter::B,
        min_score: 65,
        max_score: 79,
        label: "Very Good",
        description: "Very Good: Shows solid understanding and effective application of most competencies.",
        color_tag: "primary",
    },
    GradeBand {
        letter: GradeLetter::C,
        min_score: 50,
        max_score: 64,
        label: "Good",
        description: "Good: Achieves basic competencies but with some gaps in application or understanding.",
        color_tag: "info",
    },
    GradeBand {
        letter: GradeLetter::D,
        min_score: 40,
        max_score: 49,
        label: "Fair",
        description: "Fair: Meets minimum requirements with significant limitations; barely qualifies for a pass.",
        color_tag: "warning",
    },
    GradeBand {
        letter: GradeLetter::E,
        min_score: 0,
        max_score: 39,
        label: "Poor",
        description: "Poor: Fails to demonstrate adequate competencies; does not qualify for UCE certificate in that subject.",
        color_tag: "danger",
    },
];

pub fn band_for(letter: GradeLetter) -> &'static GradeBand {
    match letter {
        GradeLetter::A => &GRADE_SCALE[0],
        GradeLetter::B => &GRADE_SCALE[1],
        GradeLetter::C => &GRADE_SCALE[2],
        GradeLetter::D => &GRADE_SCALE[3],
        GradeLetter::E => &GRADE_SCALE[4],
    }
}
