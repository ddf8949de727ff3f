use crate::api::GradingSource;
use crate::models::{AnalysisRecord, Grade, Latency, Submission};
use crate::timefmt;
use std::collections::HashMap;
use tracing::{info, warn};

/// Index records by student id. Later records replace earlier ones, and
/// records without a usable user id are dropped.
fn index_by_user<'a, T>(
    records: &'a [T],
    user_id: impl Fn(&T) -> Option<u64>,
) -> HashMap<u64, &'a T> {
    records
        .iter()
        .filter_map(|record| match user_id(record) {
            Some(id) if id > 0 => Some((id, record)),
            _ => None,
        })
        .collect()
}

fn positive(ts: Option<i64>) -> Option<i64> {
    ts.filter(|t| *t > 0)
}

/// Submission time, but only for work that was actually handed in.
pub fn submitted_at(submission: Option<&Submission>) -> Option<i64> {
    submission
        .filter(|s| s.is_submitted())
        .and_then(|s| positive(s.timemodified))
}

pub fn graded_at(grade: Option<&Grade>) -> Option<i64> {
    grade.and_then(|g| positive(g.timemodified))
}

/// Classify one student's submission-to-grading relationship.
///
/// Without a submission time the grade value alone decides: a grade means the
/// student was graded without submitting, no grade means nothing was handed in.
pub fn classify(submission: Option<&Submission>, grade: Option<&Grade>) -> Latency {
    let submitted_ts = submitted_at(submission);
    let graded_ts = graded_at(grade);
    let has_grade_value = grade.and_then(|g| g.grade).is_some();

    match (submitted_ts, graded_ts) {
        (Some(submitted), Some(graded)) => Latency::Measured {
            seconds: graded - submitted,
            description: timefmt::elapsed_description(Some(submitted), Some(graded)),
        },
        (Some(_), None) => Latency::PendingGrading,
        (None, _) if has_grade_value => Latency::GradedWithoutSubmission,
        (None, _) => Latency::NotSubmitted,
    }
}

/// Join roster, submissions and grades for one assignment.
///
/// Never fails: without a roster nothing can be attributed and the result is
/// empty, while missing submissions or grades only reduce what can be said
/// about each student.
pub async fn analyze<S: GradingSource>(source: &S, assignment_id: u64) -> Vec<AnalysisRecord> {
    let (participants, submissions, grades) = tokio::join!(
        source.fetch_participants(assignment_id),
        source.fetch_submissions(assignment_id),
        source.fetch_grades(assignment_id),
    );

    let participants = match participants {
        Ok(participants) => participants,
        Err(e) => {
            warn!(assignment_id, error = %e, "could not fetch participants, skipping analysis");
            return Vec::new();
        }
    };

    if participants.is_empty() {
        info!(assignment_id, "assignment has no participants");
        return Vec::new();
    }

    let submissions = submissions.unwrap_or_else(|e| {
        warn!(assignment_id, error = %e, "could not fetch submissions, continuing without them");
        Vec::new()
    });

    let grades = grades.unwrap_or_else(|e| {
        warn!(assignment_id, error = %e, "could not fetch grades, continuing without them");
        Vec::new()
    });

    let submissions_by_user = index_by_user(&submissions, |s| s.userid);
    let grades_by_user = index_by_user(&grades, |g| g.userid);

    let records: Vec<AnalysisRecord> = participants
        .iter()
        .map(|(student_id, student_name)| {
            let submission = submissions_by_user.get(student_id).copied();
            let grade = grades_by_user.get(student_id).copied();

            AnalysisRecord {
                assignment_id,
                student_id: *student_id,
                student_name: student_name.clone(),
                submission_status: submission.and_then(|s| s.status.clone()),
                submitted_at: submitted_at(submission),
                graded_at: graded_at(grade),
                grade: grade.and_then(|g| g.grade),
                latency: classify(submission, grade),
            }
        })
        .collect();

    info!(
        assignment_id,
        participants = participants.len(),
        submissions = submissions.len(),
        grades = grades.len(),
        records = records.len(),
        "assignment analyzed"
    );

    records
}
