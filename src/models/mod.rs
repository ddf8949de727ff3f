use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use std::fmt;

use crate::timefmt;

// ============================================================================
// Moodle Web Service Models
// ============================================================================

/// Response of `mod_assign_get_assignments`.
#[derive(Debug, Clone, Deserialize)]
pub struct CoursesResponse {
    #[serde(default)]
    pub courses: Vec<CourseAssignments>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CourseAssignments {
    pub id: u64,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub assignments: Vec<AssignmentRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentRecord {
    pub id: u64,
    #[serde(default)]
    pub cmid: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub duedate: Option<i64>,
    #[serde(default)]
    pub allowsubmissionsfromdate: Option<i64>,
    #[serde(default)]
    pub gradingduedate: Option<i64>,
    #[serde(default)]
    pub cutoffdate: Option<i64>,
}

/// One entry of `mod_assign_list_participants`.
#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantRecord {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub fullname: Option<String>,
}

/// Response of `mod_assign_get_submissions`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionsResponse {
    #[serde(default)]
    pub assignments: Vec<AssignmentSubmissions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentSubmissions {
    #[serde(default)]
    pub assignmentid: Option<u64>,
    #[serde(default)]
    pub submissions: Vec<Submission>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub userid: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub timemodified: Option<i64>,
}

impl Submission {
    /// Only `submitted` and `graded` count as handed in; drafts and `new` do not.
    pub fn is_submitted(&self) -> bool {
        matches!(self.status.as_deref(), Some("submitted") | Some("graded"))
    }
}

/// Response of `mod_assign_get_grades`.
#[derive(Debug, Clone, Deserialize)]
pub struct GradesResponse {
    #[serde(default)]
    pub assignments: Vec<AssignmentGrades>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentGrades {
    #[serde(default)]
    pub assignmentid: Option<u64>,
    #[serde(default)]
    pub grades: Vec<Grade>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Grade {
    #[serde(default)]
    pub userid: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_grade")]
    pub grade: Option<f64>,
    #[serde(default)]
    pub timemodified: Option<i64>,
}

/// Moodle sends grades as decimal strings ("85.00000") and uses `-1` for
/// "no grade". Both a missing value and the sentinel become `None`.
fn deserialize_grade<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let grade = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(grade.filter(|g| g.is_finite() && *g >= 0.0))
}

/// Error payload Moodle returns with HTTP 200 when a web service call fails.
#[derive(Debug, Clone, Deserialize)]
pub struct MoodleException {
    pub exception: String,
    #[serde(default)]
    pub errorcode: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub debuginfo: Option<String>,
}

// ============================================================================
// Internal Models for Processing
// ============================================================================

/// Student id to display name, in roster order.
pub type Roster = IndexMap<u64, String>;

#[derive(Debug, Clone)]
pub struct Assignment {
    pub id: u64,
    pub course_id: u64,
    pub course_name: Option<String>,
    pub name: String,
    pub cmid: Option<u64>,
    pub submissions_open: Option<i64>,
    pub due: Option<i64>,
    pub cutoff: Option<i64>,
    pub grading_due: Option<i64>,
}

impl Assignment {
    pub fn from_record(course_id: u64, course_name: Option<String>, record: AssignmentRecord) -> Self {
        let name = record
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Untitled assignment {}", record.id));

        Self {
            id: record.id,
            course_id,
            course_name,
            name,
            cmid: record.cmid,
            submissions_open: record.allowsubmissionsfromdate,
            due: record.duedate,
            cutoff: record.cutoffdate,
            grading_due: record.gradingduedate,
        }
    }

    pub fn display_name(&self) -> String {
        format!(
            "{} (Course ID: {}, Assignment ID: {})",
            self.name, self.course_id, self.id
        )
    }
}

/// How long grading took for one student, or why it cannot be measured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Latency {
    Measured { seconds: i64, description: String },
    PendingGrading,
    GradedWithoutSubmission,
    NotSubmitted,
}

impl Latency {
    pub fn label(&self) -> &str {
        match self {
            Latency::Measured { description, .. } => description,
            Latency::PendingGrading => "Pending grading",
            Latency::GradedWithoutSubmission => "Graded without submission",
            Latency::NotSubmitted => "Not submitted",
        }
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisRecord {
    pub assignment_id: u64,
    pub student_id: u64,
    pub student_name: String,
    pub submission_status: Option<String>,
    pub submitted_at: Option<i64>,
    pub graded_at: Option<i64>,
    pub grade: Option<f64>,
    pub latency: Latency,
}

impl AnalysisRecord {
    pub fn status_label(&self) -> &str {
        self.submission_status
            .as_deref()
            .unwrap_or("No submission info")
    }

    pub fn grade_label(&self) -> String {
        self.grade
            .map(|g| format!("{:.2}", g))
            .unwrap_or_else(|| "Ungraded".to_string())
    }

    pub fn submitted_label(&self) -> String {
        timefmt::format_timestamp(self.submitted_at)
    }

    pub fn graded_label(&self) -> String {
        timefmt::format_timestamp(self.graded_at)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DelayEntry {
    pub assignment_name: String,
    pub student_name: String,
    pub submitted_on: String,
    pub graded_on: String,
    pub delay_days: String,
}

/// Outcome of scanning the stored analyses for late grading.
#[derive(Debug, Clone, PartialEq)]
pub enum DelayReport {
    /// No assignment has been analyzed yet.
    NothingAnalyzed,
    /// Analyses exist but nobody was graded past the threshold.
    NoDelays { assignments_checked: usize },
    Delays {
        summary: IndexMap<String, usize>,
        detail: Vec<DelayEntry>,
    },
}

impl DelayReport {
    pub fn delayed_students(&self) -> usize {
        match self {
            DelayReport::Delays { detail, .. } => detail.len(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisStats {
    pub total_students: usize,
    pub measured: usize,
    pub pending: usize,
    pub graded_without_submission: usize,
    pub not_submitted: usize,
    pub graded_before_submission: usize,
    pub average_hours: f64,
    pub median_hours: f64,
}

impl AnalysisStats {
    pub fn calculate(records: &[AnalysisRecord]) -> Self {
        let mut stats = Self {
            total_students: records.len(),
            ..Self::default()
        };

        let mut hours: Vec<f64> = Vec::new();
        for record in records {
            match &record.latency {
                Latency::Measured { seconds, .. } => {
                    stats.measured += 1;
                    if *seconds < 0 {
                        stats.graded_before_submission += 1;
                    } else {
                        hours.push(*seconds as f64 / timefmt::SECONDS_PER_HOUR as f64);
                    }
                }
                Latency::PendingGrading => stats.pending += 1,
                Latency::GradedWithoutSubmission => stats.graded_without_submission += 1,
                Latency::NotSubmitted => stats.not_submitted += 1,
            }
        }

        if !hours.is_empty() {
            stats.average_hours = hours.iter().sum::<f64>() / hours.len() as f64;

            hours.sort_by(|a, b| a.total_cmp(b));
            let mid = hours.len() / 2;
            stats.median_hours = if hours.len() % 2 == 0 {
                (hours[mid - 1] + hours[mid]) / 2.0
            } else {
                hours[mid]
            };
        }

        stats
    }
}
