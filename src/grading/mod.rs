//! Grading rule evaluation
//!
//! Turns one student's result rows into a rounded, credit-weighted grade and
//! a degree classification.

pub mod classification;
pub mod evaluator;
pub mod record;

pub use classification::DegreeClass;
pub use evaluator::{evaluate, grade_serialized, round_grade, GradeResult};
pub use record::{peek_student_id, MalformedRecord, ResultRow, StudentRecord, REQUIRED_COLUMNS};
