use crate::api::GradingSource;
use crate::export;
use crate::models::DelayReport;
use crate::session::{self, AnalysisStep, AuditSession};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use tracing::info;

/// Audit how long instructors take to grade Moodle assignments.
///
/// Without `--courses` the interactive dashboard starts.
#[derive(Debug, Parser)]
#[command(name = "moodle_grading_auditor", version, about)]
pub struct Cli {
    /// Course ids to query, comma separated
    #[arg(long, value_delimiter = ',')]
    pub courses: Vec<u64>,

    /// Assignment ids to analyze (default: every assignment of the courses)
    #[arg(long, value_delimiter = ',')]
    pub assignments: Vec<u64>,

    /// Flag grading that took longer than this many days
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub threshold_days: Option<u32>,

    /// Write the analysis and delay tables to CSV files
    #[arg(long)]
    pub export: bool,
}

impl Cli {
    pub fn is_headless(&self) -> bool {
        !self.courses.is_empty()
    }
}

/// Fetch, analyze and print a report without the terminal UI.
pub async fn run<S: GradingSource>(
    cli: &Cli,
    source: &S,
    mut session: AuditSession,
    out: &mut impl Write,
) -> Result<()> {
    let fetch = session::collect_assignments(source, &cli.courses).await;
    for (course_id, e) in &fetch.failures {
        eprintln!("Error loading course {}: {}", course_id, e);
    }

    if fetch.assignments.is_empty() {
        if fetch.failures.len() == cli.courses.len() {
            anyhow::bail!("Could not load assignments from any course");
        }
        writeln!(out, "No assignments found in the requested course(s).")?;
        return Ok(());
    }

    session.replace_assignments(fetch.assignments);

    let assignment_ids: Vec<u64> = if cli.assignments.is_empty() {
        session.assignments().iter().map(|a| a.id).collect()
    } else {
        for id in &cli.assignments {
            if session.assignment(*id).is_none() {
                eprintln!("Assignment {} is not part of the requested courses", id);
            }
        }
        cli.assignments.clone()
    };

    info!(assignments = assignment_ids.len(), "starting headless analysis");
    session::analyze_all(source, &mut session, &assignment_ids, |step| {
        if let AnalysisStep::Finished { name, participants } = step {
            info!(assignment = name, participants, "assignment finished");
        }
    })
    .await;

    write_analyses(&session, out)?;
    let report = session.report();
    write_report(&report, session.threshold_days(), out)?;

    if cli.export {
        for (assignment_id, records) in session.analyses() {
            if records.is_empty() {
                continue;
            }
            let path = export::export_analysis_to_csv(records, *assignment_id)?;
            writeln!(out, "Exported analysis to {}", path.display())?;
        }
        if let DelayReport::Delays { detail, .. } = &report {
            let path = export::export_delays_to_csv(detail)?;
            writeln!(out, "Exported delays to {}", path.display())?;
        }
    }

    out.flush().context("Failed to flush output")?;
    Ok(())
}

fn write_analyses(session: &AuditSession, out: &mut impl Write) -> Result<()> {
    for (assignment_id, records) in session.analyses() {
        writeln!(out, "== {} ==", session.display_name(*assignment_id))?;

        if records.is_empty() {
            writeln!(out, "No participants or grading data found.")?;
            writeln!(out)?;
            continue;
        }

        writeln!(
            out,
            "{:<28} {:<20} {:<19} {:<19} {:<28} {:>8}",
            "Student", "Submission status", "Submitted", "Graded", "Time to grade", "Grade"
        )?;
        for record in records {
            writeln!(
                out,
                "{:<28} {:<20} {:<19} {:<19} {:<28} {:>8}",
                record.student_name,
                record.status_label(),
                record.submitted_label(),
                record.graded_label(),
                record.latency,
                record.grade_label()
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_report(report: &DelayReport, threshold_days: u32, out: &mut impl Write) -> Result<()> {
    writeln!(out, "== Delayed grading (more than {} days) ==", threshold_days)?;

    match report {
        DelayReport::NothingAnalyzed => {
            writeln!(out, "Nothing has been analyzed.")?;
        }
        DelayReport::NoDelays {
            assignments_checked,
        } => {
            writeln!(
                out,
                "No delays found across {} analyzed assignment(s).",
                assignments_checked
            )?;
        }
        DelayReport::Delays { summary, detail } => {
            for (name, count) in summary {
                writeln!(out, "- {}: {} student(s)", name, count)?;
            }
            writeln!(out)?;
            for entry in detail {
                writeln!(
                    out,
                    "{} | {} | submitted {} | graded {} | {} days",
                    entry.assignment_name,
                    entry.student_name,
                    entry.submitted_on,
                    entry.graded_on,
                    entry.delay_days
                )?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::tests::{grade, roster, submission, StubSource};
    use crate::models::Assignment;
    use std::collections::HashMap;

    fn cli(courses: &[u64], assignments: &[u64]) -> Cli {
        Cli {
            courses: courses.to_vec(),
            assignments: assignments.to_vec(),
            threshold_days: None,
            export: false,
        }
    }

    fn source() -> StubSource {
        let t1 = 1_700_000_000;
        let mut assignments = HashMap::new();
        assignments.insert(
            1,
            vec![Assignment {
                id: 10,
                course_id: 1,
                course_name: None,
                name: "Essay".to_string(),
                cmid: None,
                submissions_open: None,
                due: None,
                cutoff: None,
                grading_due: None,
            }],
        );

        StubSource {
            assignments,
            participants: Some(roster(&[(1, "Late Student")])),
            submissions: Some(vec![submission(1, "submitted", t1)]),
            grades: Some(vec![grade(1, Some(80.0), t1 + 9 * 86_400)]),
        }
    }

    #[test]
    fn test_cli_parsing() {
        let args = Cli::parse_from([
            "moodle_grading_auditor",
            "--courses",
            "1,2",
            "--threshold-days",
            "10",
            "--export",
        ]);
        assert_eq!(args.courses, vec![1, 2]);
        assert!(args.assignments.is_empty());
        assert_eq!(args.threshold_days, Some(10));
        assert!(args.export);
        assert!(args.is_headless());

        let args = Cli::parse_from(["moodle_grading_auditor"]);
        assert!(!args.is_headless());

        assert!(Cli::try_parse_from(["moodle_grading_auditor", "--threshold-days", "0"]).is_err());
    }

    #[tokio::test]
    async fn test_headless_run_prints_report() {
        let mut out = Vec::new();
        run(&cli(&[1], &[]), &source(), AuditSession::new(7), &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("== Essay (Course ID: 1, Assignment ID: 10) =="));
        assert!(text.contains("Late Student"));
        assert!(text.contains("9 days"));
        assert!(text.contains("- Essay (Course ID: 1, Assignment ID: 10): 1 student(s)"));
        assert!(text.contains("9.0 days"));
    }

    #[tokio::test]
    async fn test_headless_run_fails_when_every_course_fails() {
        let mut out = Vec::new();
        let result = run(&cli(&[5], &[]), &source(), AuditSession::new(7), &mut out).await;
        assert!(result.is_err());
    }
}
