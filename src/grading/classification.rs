//! Degree classification bands

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discrete banding of a rounded average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DegreeClass {
    #[serde(rename = "First")]
    First,
    #[serde(rename = "2:1")]
    UpperSecond,
    #[serde(rename = "2:2")]
    LowerSecond,
    #[serde(rename = "Pass")]
    Pass,
    #[serde(rename = "Fail")]
    Fail,
}

/// Lower bounds, highest band first. Bounds are inclusive.
const BANDS: [(i64, DegreeClass); 4] = [
    (70, DegreeClass::First),
    (60, DegreeClass::UpperSecond),
    (50, DegreeClass::LowerSecond),
    (40, DegreeClass::Pass),
];

impl DegreeClass {
    /// Classify a rounded grade; first matching band wins
    pub fn from_grade(grade: i64) -> Self {
        BANDS
            .iter()
            .find(|(floor, _)| grade >= *floor)
            .map(|(_, class)| *class)
            .unwrap_or(DegreeClass::Fail)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DegreeClass::First => "First",
            DegreeClass::UpperSecond => "2:1",
            DegreeClass::LowerSecond => "2:2",
            DegreeClass::Pass => "Pass",
            DegreeClass::Fail => "Fail",
        }
    }
}

impl fmt::Display for DegreeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DegreeClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "First" => Ok(DegreeClass::First),
            "2:1" => Ok(DegreeClass::UpperSecond),
            "2:2" => Ok(DegreeClass::LowerSecond),
            "Pass" => Ok(DegreeClass::Pass),
            "Fail" => Ok(DegreeClass::Fail),
            other => Err(format!("unknown degree class '{other}'")),
        }
    }
}
