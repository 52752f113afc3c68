//! Solver identity.
//!
//! A solver is addressed by `(year, day, part)`. The key doubles as the
//! module cache identity and, through [`SolverKey::artifact_name`], as the
//! name of the artifact that implements it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which half of a day's puzzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Part {
    One,
    Two,
}

impl Part {
    /// Both parts in pipeline order.
    pub const ALL: [Part; 2] = [Part::One, Part::Two];

    /// Zero-based slot index.
    pub fn index(self) -> usize {
        match self {
            Part::One => 0,
            Part::Two => 1,
        }
    }

    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }
}

impl TryFrom<u8> for Part {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Part::One),
            2 => Ok(Part::Two),
            other => Err(format!("part must be 1 or 2, got {}", other)),
        }
    }
}

impl From<Part> for u8 {
    fn from(part: Part) -> Self {
        part.number()
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Unique identity of one solver module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SolverKey {
    pub year: u16,
    pub day: u8,
    pub part: Part,
}

impl SolverKey {
    /// Create a key, rejecting days outside `1..=31`.
    pub fn new(year: u16, day: u8, part: Part) -> Result<Self> {
        if !(1..=31).contains(&day) {
            return Err(Error::InvalidKey(format!(
                "day must be in 1..=31, got {}",
                day
            )));
        }
        Ok(Self { year, day, part })
    }

    /// Canonical artifact stem: `solution_<year>_<day:02>_<part>`.
    pub fn artifact_name(&self) -> String {
        format!("solution_{}_{:02}_{}", self.year, self.day, self.part)
    }

    /// The other part of the same day.
    pub fn with_part(self, part: Part) -> Self {
        Self { part, ..self }
    }
}

impl fmt::Display for SolverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} day {} part {}", self.year, self.day, self.part)
    }
}

/// The (year, day) the surface currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub year: u16,
    pub day: u8,
}

impl Selection {
    pub fn new(year: u16, day: u8) -> Self {
        Self { year, day }
    }

    /// Key for one part of this selection.
    pub fn key(&self, part: Part) -> Result<SolverKey> {
        SolverKey::new(self.year, self.day, part)
    }
}
