use crate::analyzer;
use crate::api::{FetchError, GradingSource};
use crate::models::{AnalysisRecord, Assignment, DelayReport};
use crate::report;
use indexmap::IndexMap;
use tracing::warn;

/// Everything the user has fetched and analyzed so far.
#[derive(Debug, Clone, Default)]
pub struct AuditSession {
    assignments: Vec<Assignment>,
    display_names: IndexMap<u64, String>,
    analyses: IndexMap<u64, Vec<AnalysisRecord>>,
    threshold_days: u32,
}

/// Assignments gathered from several courses plus the courses that failed.
#[derive(Debug, Default)]
pub struct CourseFetch {
    pub assignments: Vec<Assignment>,
    pub failures: Vec<(u64, FetchError)>,
}

impl AuditSession {
    pub fn new(threshold_days: u32) -> Self {
        Self {
            threshold_days,
            ..Self::default()
        }
    }

    pub fn threshold_days(&self) -> u32 {
        self.threshold_days
    }

    /// Start over with a new set of assignments. Earlier analyses refer to
    /// the old set and are dropped.
    pub fn replace_assignments(&mut self, assignments: Vec<Assignment>) {
        self.display_names = assignments
            .iter()
            .map(|a| (a.id, a.display_name()))
            .collect();
        self.assignments = assignments;
        self.analyses.clear();
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn assignment(&self, assignment_id: u64) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.id == assignment_id)
    }

    pub fn display_name(&self, assignment_id: u64) -> String {
        self.display_names
            .get(&assignment_id)
            .cloned()
            .unwrap_or_else(|| format!("Assignment {}", assignment_id))
    }

    pub fn clear_analyses(&mut self) {
        self.analyses.clear();
    }

    pub fn record_analysis(&mut self, assignment_id: u64, records: Vec<AnalysisRecord>) {
        self.analyses.insert(assignment_id, records);
    }

    pub fn analyses(&self) -> &IndexMap<u64, Vec<AnalysisRecord>> {
        &self.analyses
    }

    pub fn analysis(&self, assignment_id: u64) -> Option<&[AnalysisRecord]> {
        self.analyses.get(&assignment_id).map(Vec::as_slice)
    }

    pub fn analyzed_ids(&self) -> Vec<u64> {
        self.analyses.keys().copied().collect()
    }

    pub fn report(&self) -> DelayReport {
        report::build_report(
            &self.analyses,
            &self.display_names,
            report::threshold_seconds(self.threshold_days),
        )
    }
}

/// Fetch assignments course by course. A failing course does not stop the
/// others; it is returned so the caller can tell the user.
pub async fn collect_assignments<S: GradingSource>(source: &S, course_ids: &[u64]) -> CourseFetch {
    let mut fetch = CourseFetch::default();

    for course_id in course_ids {
        match source.fetch_assignments(*course_id).await {
            Ok(assignments) => fetch.assignments.extend(assignments),
            Err(e) => {
                warn!(course_id, error = %e, "could not fetch assignments for course");
                fetch.failures.push((*course_id, e));
            }
        }
    }

    fetch
}

/// Progress reported by [`analyze_all`] around each assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStep<'a> {
    Started {
        index: usize,
        total: usize,
        name: &'a str,
    },
    Finished {
        name: &'a str,
        participants: usize,
    },
}

/// Analyze each assignment in order and store the results in the session.
/// Previously stored analyses are discarded first.
pub async fn analyze_all<S, F>(
    source: &S,
    session: &mut AuditSession,
    assignment_ids: &[u64],
    mut on_step: F,
) where
    S: GradingSource,
    F: FnMut(AnalysisStep<'_>),
{
    session.clear_analyses();
    let total = assignment_ids.len();

    for (index, assignment_id) in assignment_ids.iter().enumerate() {
        let name = session.display_name(*assignment_id);
        on_step(AnalysisStep::Started {
            index,
            total,
            name: &name,
        });

        let records = analyzer::analyze(source, *assignment_id).await;
        on_step(AnalysisStep::Finished {
            name: &name,
            participants: records.len(),
        });
        session.record_analysis(*assignment_id, records);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::tests::{grade, roster, submission, StubSource};
    use crate::timefmt::SECONDS_PER_DAY;
    use std::collections::HashMap;

    fn assignment(id: u64, course_id: u64, name: &str) -> Assignment {
        Assignment {
            id,
            course_id,
            course_name: None,
            name: name.to_string(),
            cmid: None,
            submissions_open: None,
            due: None,
            cutoff: None,
            grading_due: None,
        }
    }

    #[tokio::test]
    async fn test_collect_assignments_reports_failed_courses() {
        let mut assignments = HashMap::new();
        assignments.insert(1, vec![assignment(10, 1, "A"), assignment(11, 1, "B")]);
        assignments.insert(3, Vec::new());
        let source = StubSource {
            assignments,
            ..Default::default()
        };

        let fetch = collect_assignments(&source, &[1, 2, 3]).await;
        let ids: Vec<u64> = fetch.assignments.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![10, 11]);
        assert_eq!(fetch.failures.len(), 1);
        assert_eq!(fetch.failures[0].0, 2);
    }

    #[test]
    fn test_replace_assignments_resets_analyses() {
        let mut session = AuditSession::new(7);
        session.replace_assignments(vec![assignment(10, 1, "Essay")]);
        session.record_analysis(10, Vec::new());
        assert_eq!(session.analyzed_ids(), vec![10]);
        assert_eq!(session.display_name(10), "Essay (Course ID: 1, Assignment ID: 10)");
        assert_eq!(session.display_name(99), "Assignment 99");

        session.replace_assignments(vec![assignment(20, 2, "Quiz")]);
        assert!(session.analyses().is_empty());
        assert_eq!(session.report(), DelayReport::NothingAnalyzed);
    }

    #[tokio::test]
    async fn test_analyze_all_feeds_report() {
        let t1 = 1_700_000_000;
        let source = StubSource {
            participants: Some(roster(&[(1, "Late"), (2, "Prompt")])),
            submissions: Some(vec![
                submission(1, "submitted", t1),
                submission(2, "submitted", t1),
            ]),
            grades: Some(vec![
                grade(1, Some(60.0), t1 + 8 * SECONDS_PER_DAY),
                grade(2, Some(90.0), t1 + SECONDS_PER_DAY),
            ]),
            ..Default::default()
        };

        let mut session = AuditSession::new(7);
        session.replace_assignments(vec![assignment(10, 1, "Essay")]);
        session.record_analysis(99, Vec::new());

        let mut steps = Vec::new();
        analyze_all(&source, &mut session, &[10], |step| {
            steps.push(match step {
                AnalysisStep::Started { index, total, name } => {
                    format!("start {}/{} {}", index + 1, total, name)
                }
                AnalysisStep::Finished { name, participants } => {
                    format!("done {} {}", name, participants)
                }
            })
        })
        .await;

        assert_eq!(
            steps,
            vec![
                "start 1/1 Essay (Course ID: 1, Assignment ID: 10)",
                "done Essay (Course ID: 1, Assignment ID: 10) 2",
            ]
        );
        assert_eq!(session.analyzed_ids(), vec![10]);
        assert_eq!(session.analysis(10).map(|r| r.len()), Some(2));
        match session.report() {
            DelayReport::Delays { summary, detail } => {
                assert_eq!(summary.get("Essay (Course ID: 1, Assignment ID: 10)"), Some(&1));
                assert_eq!(detail[0].student_name, "Late");
                assert_eq!(detail[0].delay_days, "8.0");
            }
            other => panic!("expected delays, got {:?}", other),
        }

        // Grading after exactly one day is still on time.
        let mut strict = session.clone();
        strict.threshold_days = 1;
        assert_eq!(strict.report().delayed_students(), 1);
    }
}
