use super::{FetchError, GradingSource};
use crate::config::Config;
use crate::models::{
    Assignment, CoursesResponse, Grade, GradesResponse, MoodleException, ParticipantRecord, Roster,
    Submission, SubmissionsResponse,
};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

const MAX_ATTEMPTS: u32 = 3;
const UNKNOWN_NAME: &str = "Unknown name";

#[derive(Clone)]
pub struct MoodleClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl MoodleClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("moodle-grading-auditor"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(120)) // 2 minute timeout
            .connect_timeout(std::time::Duration::from_secs(30))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .context("Failed to build HTTP client")?;

        if config.accept_invalid_certs {
            warn!("TLS certificate verification is disabled for the Moodle endpoint");
        }

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
        })
    }

    async fn post_once(&self, function: &str, form: &[(&str, String)]) -> Result<Value, FetchError> {
        let response = self
            .client
            .post(&self.base_url)
            .form(form)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                function: function.to_string(),
                source,
            })?;

        let status = response.status();
        let response_text = response.text().await.map_err(|source| FetchError::Transport {
            function: function.to_string(),
            source,
        })?;

        if !status.is_success() {
            return Err(FetchError::Status {
                function: function.to_string(),
                status: status.as_u16(),
                body: truncate(&response_text),
            });
        }

        serde_json::from_str(&response_text).map_err(|e| FetchError::Decode {
            function: function.to_string(),
            detail: format!("{} (body: {})", e, truncate(&response_text)),
        })
    }

    /// Call a web service function and decode its JSON answer.
    async fn call<T: DeserializeOwned>(
        &self,
        function: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let mut form: Vec<(&str, String)> = vec![
            ("wstoken", self.token.clone()),
            ("wsfunction", function.to_string()),
            ("moodlewsrestformat", "json".to_string()),
        ];
        form.extend(params.iter().cloned());

        let mut attempt = 1;
        let value = loop {
            debug!(function, attempt, "calling Moodle web service");
            match self.post_once(function, &form).await {
                Ok(value) => break value,
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    warn!(function, attempt, error = %e, "web service call failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                }
                Err(e) => return Err(e),
            }
        };

        check_exception(function, &value)?;

        serde_json::from_value(value).map_err(|e| FetchError::Decode {
            function: function.to_string(),
            detail: e.to_string(),
        })
    }
}

impl GradingSource for MoodleClient {
    async fn fetch_assignments(&self, course_id: u64) -> Result<Vec<Assignment>, FetchError> {
        let params = [
            ("courseids[0]", course_id.to_string()),
            ("includenotenrolledcourses", "1".to_string()),
        ];
        let response: CoursesResponse = self.call("mod_assign_get_assignments", &params).await?;
        let assignments = assignments_for_course(response, course_id);
        debug!(course_id, count = assignments.len(), "assignments fetched");
        Ok(assignments)
    }

    async fn fetch_participants(&self, assignment_id: u64) -> Result<Roster, FetchError> {
        let params = [
            ("assignid", assignment_id.to_string()),
            ("groupid", "0".to_string()),
            ("filter", String::new()),
            ("skip", "0".to_string()),
            ("limit", "0".to_string()),
            ("onlyids", "0".to_string()),
            ("includeenrolments", "1".to_string()),
        ];
        let records: Vec<ParticipantRecord> =
            self.call("mod_assign_list_participants", &params).await?;
        let roster = roster_from_records(records);
        debug!(assignment_id, count = roster.len(), "participants fetched");
        Ok(roster)
    }

    async fn fetch_submissions(&self, assignment_id: u64) -> Result<Vec<Submission>, FetchError> {
        let params = [
            ("assignmentids[0]", assignment_id.to_string()),
            ("status", String::new()),
        ];
        let response: SubmissionsResponse =
            self.call("mod_assign_get_submissions", &params).await?;
        let submissions = pick_assignment(response.assignments, assignment_id, |a| a.assignmentid)
            .map(|a| a.submissions)
            .unwrap_or_default();
        debug!(assignment_id, count = submissions.len(), "submissions fetched");
        Ok(submissions)
    }

    async fn fetch_grades(&self, assignment_id: u64) -> Result<Vec<Grade>, FetchError> {
        let params = [
            ("assignmentids[0]", assignment_id.to_string()),
            ("since", "0".to_string()),
        ];
        let response: GradesResponse = self.call("mod_assign_get_grades", &params).await?;
        let grades = pick_assignment(response.assignments, assignment_id, |a| a.assignmentid)
            .map(|a| a.grades)
            .unwrap_or_default();
        debug!(assignment_id, count = grades.len(), "grades fetched");
        Ok(grades)
    }
}

/// Moodle reports web service failures as a 200 response carrying an
/// `exception` object.
fn check_exception(function: &str, value: &Value) -> Result<(), FetchError> {
    if value.get("exception").is_none() {
        return Ok(());
    }

    let exception: MoodleException =
        serde_json::from_value(value.clone()).map_err(|e| FetchError::Decode {
            function: function.to_string(),
            detail: format!("malformed exception payload: {}", e),
        })?;

    debug!(
        function,
        exception = %exception.exception,
        debuginfo = exception.debuginfo.as_deref().unwrap_or(""),
        "Moodle returned an exception"
    );

    Err(FetchError::Api {
        function: function.to_string(),
        errorcode: exception.errorcode.unwrap_or_else(|| "N/A".to_string()),
        message: exception.message.unwrap_or_else(|| "no message".to_string()),
    })
}

/// The assignments call may return several courses; keep only the requested one.
fn assignments_for_course(response: CoursesResponse, course_id: u64) -> Vec<Assignment> {
    response
        .courses
        .into_iter()
        .find(|course| course.id == course_id)
        .map(|course| {
            let course_name = course.fullname;
            course
                .assignments
                .into_iter()
                .map(|record| Assignment::from_record(course_id, course_name.clone(), record))
                .collect()
        })
        .unwrap_or_default()
}

/// Pick the block for the requested assignment. Older Moodle versions omit
/// `assignmentid`, so an unlabeled block is accepted too; a block labeled with
/// another assignment never is.
fn pick_assignment<T>(
    blocks: Vec<T>,
    assignment_id: u64,
    block_id: impl Fn(&T) -> Option<u64>,
) -> Option<T> {
    let position = blocks
        .iter()
        .position(|b| block_id(b) == Some(assignment_id))
        .or_else(|| blocks.iter().position(|b| block_id(b).is_none()));

    if position.is_none() && !blocks.is_empty() {
        warn!(
            assignment_id,
            blocks = blocks.len(),
            "response only contains other assignments, ignoring it"
        );
    }

    position.and_then(|p| blocks.into_iter().nth(p))
}

fn roster_from_records(records: Vec<ParticipantRecord>) -> Roster {
    records
        .into_iter()
        .filter_map(|p| {
            let id = p.id?;
            let name = p
                .fullname
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_NAME.to_string());
            Some((id, name))
        })
        .collect()
}

fn truncate(body: &str) -> String {
    body.chars().take(500).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_exception_detects_moodle_error() {
        let value = json!({
            "exception": "moodle_exception",
            "errorcode": "invalidtoken",
            "message": "Invalid token - token not found"
        });

        match check_exception("mod_assign_get_grades", &value) {
            Err(FetchError::Api {
                function,
                errorcode,
                message,
            }) => {
                assert_eq!(function, "mod_assign_get_grades");
                assert_eq!(errorcode, "invalidtoken");
                assert_eq!(message, "Invalid token - token not found");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_check_exception_passes_normal_payloads() {
        assert!(check_exception("f", &json!({"assignments": []})).is_ok());
        assert!(check_exception("f", &json!([{"id": 1}])).is_ok());
    }

    #[test]
    fn test_assignments_for_course_filters_other_courses() {
        let response: CoursesResponse = serde_json::from_value(json!({
            "courses": [
                {"id": 1, "assignments": [{"id": 10, "name": "Other"}]},
                {"id": 2, "fullname": "Rust 101", "assignments": [
                    {"id": 20, "name": "Ownership", "duedate": 1700000000},
                    {"id": 21, "name": "Lifetimes"}
                ]}
            ],
            "warnings": []
        }))
        .unwrap();

        let assignments = assignments_for_course(response, 2);
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[0].id, 20);
        assert_eq!(assignments[0].course_id, 2);
        assert_eq!(assignments[1].name, "Lifetimes");
        assert_eq!(assignments[1].course_name.as_deref(), Some("Rust 101"));
    }

    #[test]
    fn test_assignments_for_missing_course_is_empty() {
        let response: CoursesResponse = serde_json::from_value(json!({"courses": []})).unwrap();
        assert!(assignments_for_course(response, 5).is_empty());
    }

    #[test]
    fn test_roster_preserves_order_and_skips_missing_ids() {
        let records: Vec<ParticipantRecord> = serde_json::from_value(json!([
            {"id": 30, "fullname": "Zoe"},
            {"fullname": "No Id"},
            {"id": 4},
            {"id": 12, "fullname": "Ana"}
        ]))
        .unwrap();

        let roster = roster_from_records(records);
        let entries: Vec<(u64, &str)> = roster.iter().map(|(id, n)| (*id, n.as_str())).collect();
        assert_eq!(
            entries,
            vec![(30, "Zoe"), (4, "Unknown name"), (12, "Ana")]
        );
    }

    #[test]
    fn test_pick_assignment_block() {
        let response: GradesResponse = serde_json::from_value(json!({
            "assignments": [
                {"assignmentid": 1, "grades": [{"userid": 5, "grade": "1.0", "timemodified": 10}]},
                {"assignmentid": 2, "grades": [{"userid": 6, "grade": "2.0", "timemodified": 20}]}
            ]
        }))
        .unwrap();

        let block = pick_assignment(response.assignments.clone(), 2, |a| a.assignmentid).unwrap();
        assert_eq!(block.grades[0].userid, Some(6));

        // A block labeled with another assignment is never borrowed.
        assert!(pick_assignment(response.assignments, 9, |a| a.assignmentid).is_none());

        let unlabeled: GradesResponse = serde_json::from_value(json!({
            "assignments": [
                {"assignmentid": 1, "grades": [{"userid": 5, "grade": "1.0", "timemodified": 10}]},
                {"grades": [{"userid": 7, "grade": "3.0", "timemodified": 30}]}
            ]
        }))
        .unwrap();
        let block = pick_assignment(unlabeled.assignments, 9, |a| a.assignmentid).unwrap();
        assert_eq!(block.grades[0].userid, Some(7));

        let empty: Vec<crate::models::AssignmentGrades> = Vec::new();
        assert!(pick_assignment(empty, 1, |a| a.assignmentid).is_none());
    }

    #[test]
    fn test_participants_payload_must_be_a_list() {
        let result: Result<Vec<ParticipantRecord>, _> =
            serde_json::from_value(json!({"participants": []}));
        assert!(result.is_err());
    }
}
