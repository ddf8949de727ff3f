use crate::models::{AnalysisRecord, DelayEntry};
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};

const ANALYSIS_HEADERS: [&str; 8] = [
    "assignment_id",
    "student_id",
    "student_name",
    "submission_status",
    "submitted_at",
    "graded_at",
    "time_to_grade",
    "grade",
];

const DELAY_HEADERS: [&str; 5] = [
    "assignment",
    "student_name",
    "submitted_at",
    "graded_at",
    "delay_days",
];

fn timestamped_filename(prefix: &str) -> PathBuf {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("{}_{}.csv", prefix, timestamp))
}

/// Export one assignment's analysis to a CSV file in the working directory
pub fn export_analysis_to_csv(records: &[AnalysisRecord], assignment_id: u64) -> Result<PathBuf> {
    let filepath = timestamped_filename(&format!("analysis_{}", assignment_id));
    write_analysis(records, &filepath)?;
    Ok(filepath)
}

/// Export the delayed-grading detail table to a CSV file in the working directory
pub fn export_delays_to_csv(entries: &[DelayEntry]) -> Result<PathBuf> {
    let filepath = timestamped_filename("grading_delays");
    write_delays(entries, &filepath)?;
    Ok(filepath)
}

fn write_analysis(records: &[AnalysisRecord], filepath: &Path) -> Result<()> {
    if records.is_empty() {
        anyhow::bail!("No analysis results to export");
    }

    let mut wtr = csv::Writer::from_path(filepath).context("Failed to create CSV file")?;

    wtr.write_record(ANALYSIS_HEADERS)
        .context("Failed to write CSV headers")?;

    for record in records {
        wtr.write_record([
            record.assignment_id.to_string(),
            record.student_id.to_string(),
            record.student_name.clone(),
            record.status_label().to_string(),
            record.submitted_label(),
            record.graded_label(),
            record.latency.label().to_string(),
            record.grade_label(),
        ])
        .context("Failed to write CSV record")?;
    }

    wtr.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

fn write_delays(entries: &[DelayEntry], filepath: &Path) -> Result<()> {
    if entries.is_empty() {
        anyhow::bail!("No delayed grading to export");
    }

    let mut wtr = csv::Writer::from_path(filepath).context("Failed to create CSV file")?;

    wtr.write_record(DELAY_HEADERS)
        .context("Failed to write CSV headers")?;

    for entry in entries {
        wtr.write_record([
            entry.assignment_name.as_str(),
            entry.student_name.as_str(),
            entry.submitted_on.as_str(),
            entry.graded_on.as_str(),
            entry.delay_days.as_str(),
        ])
        .context("Failed to write CSV record")?;
    }

    wtr.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Latency;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("{}_{}.csv", name, std::process::id()))
    }

    #[test]
    fn test_export_analysis_csv() {
        let records = vec![
            AnalysisRecord {
                assignment_id: 10,
                student_id: 1,
                student_name: "Ada, Countess".to_string(),
                submission_status: Some("submitted".to_string()),
                submitted_at: Some(1_700_000_000),
                graded_at: Some(1_700_090_000),
                grade: Some(0.0),
                latency: Latency::Measured {
                    seconds: 90_000,
                    description: "1 day, 1 hour".to_string(),
                },
            },
            AnalysisRecord {
                assignment_id: 10,
                student_id: 2,
                student_name: "Grace".to_string(),
                submission_status: None,
                submitted_at: None,
                graded_at: None,
                grade: None,
                latency: Latency::NotSubmitted,
            },
        ];

        let filepath = temp_path("analysis_export");
        write_analysis(&records, &filepath).unwrap();

        let mut reader = csv::Reader::from_path(&filepath).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][2], "Ada, Countess");
        assert_eq!(&rows[0][6], "1 day, 1 hour");
        assert_eq!(&rows[0][7], "0.00");
        assert_eq!(&rows[1][3], "No submission info");
        assert_eq!(&rows[1][4], "N/A");
        assert_eq!(&rows[1][7], "Ungraded");

        // Clean up
        std::fs::remove_file(filepath).ok();
    }

    #[test]
    fn test_export_delays_csv() {
        let entries = vec![DelayEntry {
            assignment_name: "Essay".to_string(),
            student_name: "Late".to_string(),
            submitted_on: "2023-11-14 22:13:20".to_string(),
            graded_on: "2023-11-22 22:13:20".to_string(),
            delay_days: "8.0".to_string(),
        }];

        let filepath = temp_path("delay_export");
        write_delays(&entries, &filepath).unwrap();

        let mut reader = csv::Reader::from_path(&filepath).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[4], "delay_days");
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[4], "8.0");

        std::fs::remove_file(filepath).ok();
    }

    #[test]
    fn test_export_rejects_empty_input() {
        assert!(write_analysis(&[], &temp_path("empty_analysis")).is_err());
        assert!(write_delays(&[], &temp_path("empty_delays")).is_err());
    }
}
