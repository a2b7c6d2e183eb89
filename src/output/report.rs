//! Report rendering
//!
//! The report is a tab-separated document with one row per graded student,
//! sorted by student id.

use super::OutputError;
use crate::grading::{DegreeClass, GradeResult};
use std::cmp::Ordering;

/// Header row of every report
pub const REPORT_HEADER: [&str; 3] = ["StudentID", "Average", "Degree Class"];

/// Graded students in report order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    rows: Vec<GradeResult>,
}

impl Report {
    /// Build a report, putting rows in student id order
    pub fn new(mut rows: Vec<GradeResult>) -> Self {
        rows.sort_by(|a, b| compare_student_ids(&a.student_id, &b.student_id));
        Self { rows }
    }

    pub fn rows(&self) -> &[GradeResult] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Serialize as TSV with a header row
    pub fn render(&self) -> Result<String, OutputError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());

        writer.write_record(REPORT_HEADER)?;
        for row in &self.rows {
            let average = row
                .average_grade
                .map(|grade| grade.to_string())
                .unwrap_or_default();
            writer.write_record([row.student_id.as_str(), average.as_str(), row.degree_class.as_str()])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| OutputError::Render(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| OutputError::Render(e.to_string()))
    }

    /// Read a rendered report back
    pub fn parse(content: &str) -> Result<Self, OutputError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_reader(content.as_bytes());

        let headers = reader.headers()?.clone();
        if headers.iter().ne(REPORT_HEADER) {
            return Err(OutputError::Render(format!(
                "unexpected report header: {}",
                headers.iter().collect::<Vec<_>>().join(", ")
            )));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let field = |idx: usize| record.get(idx).unwrap_or_default().trim();

            let average_grade = match field(1) {
                "" => None,
                raw => Some(raw.parse::<i64>().map_err(|e| {
                    OutputError::Render(format!("bad average '{raw}': {e}"))
                })?),
            };
            let degree_class = field(2)
                .parse::<DegreeClass>()
                .map_err(OutputError::Render)?;

            rows.push(GradeResult {
                student_id: field(0).to_string(),
                average_grade,
                degree_class,
            });
        }

        Ok(Self { rows })
    }
}

/// Order student ids numerically when both are integers, otherwise as text
pub fn compare_student_ids(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grade(id: &str, average: i64) -> GradeResult {
        GradeResult {
            student_id: id.to_string(),
            average_grade: Some(average),
            degree_class: DegreeClass::from_grade(average),
        }
    }

    #[test]
    fn test_single_row_report() {
        let report = Report::new(vec![grade("1", 73)]);
        assert_eq!(
            report.render().unwrap(),
            "StudentID\tAverage\tDegree Class\n1\t73\tFirst\n"
        );
    }

    #[test]
    fn test_rows_sorted_numerically() {
        let report = Report::new(vec![grade("10", 50), grade("9", 61), grade("100", 39)]);
        let ids: Vec<_> = report.rows().iter().map(|r| r.student_id.as_str()).collect();
        assert_eq!(ids, vec!["9", "10", "100"]);
    }

    #[test]
    fn test_mixed_ids_sort_as_text() {
        assert_eq!(compare_student_ids("A10", "A9"), Ordering::Less);
        assert_eq!(compare_student_ids("2", "10"), Ordering::Less);
        assert_eq!(compare_student_ids("10", "B"), Ordering::Less);
    }

    #[test]
    fn test_empty_report_has_header_only() {
        let report = Report::new(Vec::new());
        assert!(report.is_empty());
        assert_eq!(report.render().unwrap(), "StudentID\tAverage\tDegree Class\n");
    }

    #[test]
    fn test_parse_rendered_report() {
        let report = Report::new(vec![grade("2", 65), grade("1", 0)]);
        let parsed = Report::parse(&report.render().unwrap()).unwrap();
        assert_eq!(parsed, report);
        assert_eq!(parsed.rows()[0].degree_class, DegreeClass::Fail);
        assert_eq!(parsed.rows()[1].degree_class, DegreeClass::UpperSecond);
    }

    #[test]
    fn test_parse_rejects_foreign_header() {
        assert!(Report::parse("Name\tScore\nx\t1\n").is_err());
    }
}
