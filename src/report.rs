use crate::models::{AnalysisRecord, DelayEntry, DelayReport};
use crate::timefmt::{self, SECONDS_PER_DAY};
use indexmap::IndexMap;

pub const DEFAULT_THRESHOLD_DAYS: u32 = 7;

pub fn threshold_seconds(days: u32) -> i64 {
    i64::from(days) * SECONDS_PER_DAY
}

/// Grading delay in seconds, when the record has a forward submission-to-grade
/// interval. Grading at or before submission is never a delay.
fn grading_delay(record: &AnalysisRecord) -> Option<i64> {
    match (record.submitted_at, record.graded_at) {
        (Some(submitted), Some(graded)) if submitted > 0 && graded > 0 && graded > submitted => {
            Some(graded - submitted)
        }
        _ => None,
    }
}

/// Scan every stored analysis for students graded later than the threshold.
pub fn build_report(
    analyses: &IndexMap<u64, Vec<AnalysisRecord>>,
    display_names: &IndexMap<u64, String>,
    threshold_seconds: i64,
) -> DelayReport {
    if analyses.is_empty() {
        return DelayReport::NothingAnalyzed;
    }

    let mut summary: IndexMap<String, usize> = IndexMap::new();
    let mut detail = Vec::new();

    for (assignment_id, records) in analyses {
        let assignment_name = display_names
            .get(assignment_id)
            .cloned()
            .unwrap_or_else(|| format!("Assignment {}", assignment_id));

        let mut delayed = 0;
        for record in records {
            let Some(delay) = grading_delay(record) else {
                continue;
            };
            if delay <= threshold_seconds {
                continue;
            }

            delayed += 1;
            detail.push(DelayEntry {
                assignment_name: assignment_name.clone(),
                student_name: record.student_name.clone(),
                submitted_on: timefmt::format_timestamp(record.submitted_at),
                graded_on: timefmt::format_timestamp(record.graded_at),
                delay_days: format!("{:.1}", delay as f64 / SECONDS_PER_DAY as f64),
            });
        }

        if delayed > 0 {
            *summary.entry(assignment_name).or_insert(0) += delayed;
        }
    }

    if detail.is_empty() {
        DelayReport::NoDelays {
            assignments_checked: analyses.len(),
        }
    } else {
        DelayReport::Delays { summary, detail }
    }
}
