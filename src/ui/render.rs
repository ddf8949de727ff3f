use crate::models::{AnalysisStats, Assignment, DelayReport};
use crate::session::AuditSession;
use crate::timefmt;
use crate::ui::state::{AnalysisProgress, AppState};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, List, ListItem, Paragraph, Row, Table, Tabs, Wrap},
    Frame,
};

const TITLE: &str = "Moodle Grading Auditor";

pub fn render_ui(frame: &mut Frame, state: &AppState, session: &AuditSession) {
    match state {
        AppState::CourseInput { input, notice } => {
            render_course_input(frame, input, notice.as_deref())
        }
        AppState::LoadingAssignments { course_ids } => {
            let ids: Vec<String> = course_ids.iter().map(|id| id.to_string()).collect();
            render_loading(
                frame,
                &format!("Loading assignments for course(s) {}...", ids.join(", ")),
            )
        }
        AppState::AssignmentSelection {
            selected_index,
            marked,
            notice,
        } => render_assignment_selection(frame, session, *selected_index, marked, notice.as_deref()),
        AppState::Analyzing { progress } => render_analyzing(frame, progress),
        AppState::AnalysisResults { tab, scroll, notice } => {
            render_analysis_results(frame, session, *tab, *scroll, notice.as_deref())
        }
        AppState::DelayReport { scroll, notice } => {
            render_delay_report(frame, session, *scroll, notice.as_deref())
        }
        AppState::Error { message } => render_error(frame, message),
    }
}

fn cyan_block(title: impl Into<String>) -> Block<'static> {
    Block::default()
        .title(title.into())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn render_footer(frame: &mut Frame, area: Rect, notice: Option<&str>, help: &str) {
    let mut lines = Vec::new();
    if let Some(notice) = notice {
        lines.push(Line::from(Span::styled(
            notice.to_string(),
            Style::default().fg(Color::Yellow),
        )));
    }
    lines.push(Line::from(help.to_string()));

    let footer = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    frame.render_widget(footer, area);
}

fn render_loading(frame: &mut Frame, message: &str) {
    let paragraph = Paragraph::new(message)
        .block(cyan_block(TITLE))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    frame.render_widget(paragraph, frame.area());
}

fn render_course_input(frame: &mut Frame, input: &str, notice: Option<&str>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let title = Paragraph::new("Query assignments by course")
        .block(cyan_block(TITLE))
        .alignment(Alignment::Center);
    frame.render_widget(title, chunks[0]);

    let field = Paragraph::new(format!("Course ID(s), comma separated: {}_", input)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
    );
    frame.render_widget(field, chunks[1]);

    let hint = Paragraph::new("Example: 33538, 33539, 12345")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(hint, chunks[2]);

    render_footer(frame, chunks[3], notice, "[Enter: Query | Backspace: Delete | Esc: Quit]");
}

fn date_line<'a>(label: &'a str, ts: Option<i64>) -> Line<'a> {
    Line::from(vec![
        Span::styled(label, bold()),
        Span::raw(timefmt::format_date(ts)),
    ])
}

fn render_dates_panel(frame: &mut Frame, area: Rect, assignment: Option<&Assignment>) {
    let lines = match assignment {
        Some(a) => vec![
            Line::from(Span::styled(a.name.clone(), bold().fg(Color::Yellow))),
            Line::from(a.course_name.clone().unwrap_or_else(|| format!("Course {}", a.course_id))),
            Line::from(format!(
                "Course ID: {} | Assignment ID: {} | Module ID: {}",
                a.course_id,
                a.id,
                a.cmid.map(|c| c.to_string()).unwrap_or_else(|| "N/A".to_string())
            )),
            Line::from(""),
            date_line("Submissions open: ", a.submissions_open),
            date_line("Due: ", a.due),
            date_line("Cutoff: ", a.cutoff),
            date_line("Grading due: ", a.grading_due),
        ],
        None => vec![Line::from("No assignment selected")],
    };

    let panel = Paragraph::new(lines)
        .block(cyan_block("Configured Dates"))
        .wrap(Wrap { trim: true });
    frame.render_widget(panel, area);
}

fn render_assignment_selection(
    frame: &mut Frame,
    session: &AuditSession,
    selected_index: usize,
    marked: &[bool],
    notice: Option<&str>,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(4)])
        .split(frame.area());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[0]);

    let assignments = session.assignments();
    let items: Vec<ListItem> = assignments
        .iter()
        .enumerate()
        .map(|(i, assignment)| {
            let style = if i == selected_index {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };

            let prefix = if i == selected_index { "> " } else { "  " };
            let check = if marked.get(i).copied().unwrap_or(false) {
                "[x] "
            } else {
                "[ ] "
            };
            let due = assignment
                .due
                .filter(|d| *d > 0)
                .map(|d| format!(" (Due: {})", timefmt::format_date(Some(d))))
                .unwrap_or_default();
            let analyzed = if session.analysis(assignment.id).is_some() {
                " *"
            } else {
                ""
            };

            ListItem::new(format!(
                "{}{}{}{} [course {}]{}",
                prefix, check, assignment.name, due, assignment.course_id, analyzed
            ))
            .style(style)
        })
        .collect();

    let marked_count = marked.iter().filter(|m| **m).count();
    let list = List::new(items).block(cyan_block(format!(
        "Assignments ({} found, {} marked)",
        assignments.len(),
        marked_count
    )));
    frame.render_widget(list, columns[0]);

    render_dates_panel(frame, columns[1], assignments.get(selected_index));

    render_footer(
        frame,
        chunks[1],
        notice,
        "[↑↓: Navigate | Space: Mark | a: Mark all | Enter: Analyze | v: Results | r: Delay report | Esc: Courses | q: Quit]",
    );
}

pub fn render_analyzing(frame: &mut Frame, progress: &AnalysisProgress) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let title = Paragraph::new("Analyzing grading times")
        .block(cyan_block(TITLE))
        .alignment(Alignment::Center);
    frame.render_widget(title, chunks[0]);

    let gauge = Gauge::default()
        .block(Block::default().title("Progress").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Green))
        .percent(progress.percentage().clamp(0.0, 100.0) as u16)
        .label(format!(
            "{}/{} assignments | {} without data",
            progress.completed, progress.total_assignments, progress.empty_results
        ));
    frame.render_widget(gauge, chunks[1]);

    let status_items: Vec<ListItem> = progress
        .status_messages
        .iter()
        .map(|msg| ListItem::new(format!("• {}", msg)).style(Style::default().fg(Color::Green)))
        .collect();

    let status_list = List::new(status_items).block(
        Block::default()
            .title("Status Log")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow)),
    );
    frame.render_widget(status_list, chunks[2]);

    let info_text = if progress.current_assignment.is_empty() {
        "Preparing...".to_string()
    } else {
        format!("Current assignment: {}", progress.current_assignment)
    };
    let info = Paragraph::new(info_text)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Cyan));
    frame.render_widget(info, chunks[3]);
}

fn stats_line(stats: &AnalysisStats) -> Line<'static> {
    Line::from(vec![
        Span::styled("Students: ", bold()),
        Span::raw(format!("{}  ", stats.total_students)),
        Span::styled("Graded: ", bold()),
        Span::raw(format!("{}  ", stats.measured)),
        Span::styled("Pending: ", bold()),
        Span::raw(format!("{}  ", stats.pending)),
        Span::styled("Not submitted: ", bold()),
        Span::raw(format!("{}  ", stats.not_submitted)),
        Span::styled("Anomalies: ", bold()),
        Span::raw(format!(
            "{}  ",
            stats.graded_without_submission + stats.graded_before_submission
        )),
        Span::styled("Avg/median hours to grade: ", bold()),
        Span::raw(format!("{:.1} / {:.1}", stats.average_hours, stats.median_hours)),
    ])
}

fn render_analysis_results(
    frame: &mut Frame,
    session: &AuditSession,
    tab: usize,
    scroll: usize,
    notice: Option<&str>,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let ids = session.analyzed_ids();
    let titles: Vec<String> = ids
        .iter()
        .map(|id| {
            session
                .assignment(*id)
                .map(|a| a.name.clone())
                .unwrap_or_else(|| format!("Assignment {}", id))
        })
        .collect();

    let tabs = Tabs::new(titles)
        .block(cyan_block("Analyzed Assignments"))
        .select(tab)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, chunks[0]);

    let records = ids
        .get(tab)
        .and_then(|id| session.analysis(*id))
        .unwrap_or(&[]);

    let stats = AnalysisStats::calculate(records);
    let stats_widget = Paragraph::new(stats_line(&stats))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(stats_widget, chunks[1]);

    if records.is_empty() {
        let empty = Paragraph::new(
            "No participants or grading data were found for this assignment.",
        )
        .block(cyan_block("Grading Times"))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
        frame.render_widget(empty, chunks[2]);
    } else {
        let header = Row::new(vec![
            "Student",
            "Submission status",
            "Submitted",
            "Graded",
            "Time to grade",
            "Grade",
        ])
        .style(bold().fg(Color::Cyan));

        let rows: Vec<Row> = records
            .iter()
            .skip(scroll)
            .map(|r| {
                Row::new(vec![
                    Cell::from(r.student_name.clone()),
                    Cell::from(r.status_label().to_string()),
                    Cell::from(r.submitted_label()),
                    Cell::from(r.graded_label()),
                    Cell::from(r.latency.label().to_string()),
                    Cell::from(r.grade_label()),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Percentage(22),
                Constraint::Percentage(14),
                Constraint::Length(20),
                Constraint::Length(20),
                Constraint::Percentage(24),
                Constraint::Length(10),
            ],
        )
        .header(header)
        .block(cyan_block(format!(
            "Grading Times ({}/{})",
            (scroll + 1).min(records.len()),
            records.len()
        )));
        frame.render_widget(table, chunks[2]);
    }

    render_footer(
        frame,
        chunks[3],
        notice,
        "[←→: Assignment | ↑↓: Scroll | e: Export CSV | r: Delay report | Esc: Assignments | q: Quit]",
    );
}

fn render_delay_report(frame: &mut Frame, session: &AuditSession, scroll: usize, notice: Option<&str>) {
    let threshold = session.threshold_days();
    let help = "[↑↓: Scroll | e: Export CSV | Esc: Back | q: Quit]";
    let report = session.report();

    let (summary, detail) = match &report {
        DelayReport::NothingAnalyzed => {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(3), Constraint::Length(4)])
                .split(frame.area());
            let message = Paragraph::new(
                "Analyze grading times for one or more assignments to see this report.",
            )
            .block(cyan_block(format!("Delayed Grading Report (+{} days)", threshold)))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
            frame.render_widget(message, chunks[0]);
            render_footer(frame, chunks[1], notice, help);
            return;
        }
        DelayReport::NoDelays {
            assignments_checked,
        } => {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(3), Constraint::Length(4)])
                .split(frame.area());
            let message = Paragraph::new(vec![
                Line::from(Span::styled(
                    "No delays found",
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
                Line::from(format!(
                    "No submission in the {} analyzed assignment(s) took more than {} days to grade.",
                    assignments_checked, threshold
                )),
            ])
            .block(cyan_block(format!("Delayed Grading Report (+{} days)", threshold)))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
            frame.render_widget(message, chunks[0]);
            render_footer(frame, chunks[1], notice, help);
            return;
        }
        DelayReport::Delays { summary, detail } => (summary, detail),
    };

    let summary_height = (summary.len() as u16).saturating_add(2).min(10);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(summary_height),
            Constraint::Min(5),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let summary_items: Vec<ListItem> = summary
        .iter()
        .map(|(name, count)| {
            ListItem::new(Line::from(vec![
                Span::styled(name.clone(), bold()),
                Span::raw(format!(
                    ": {} student(s) graded more than {} days after submitting",
                    count, threshold
                )),
            ]))
        })
        .collect();
    let summary_list = List::new(summary_items).block(
        Block::default()
            .title(format!("Assignments with Delayed Grading (+{} days)", threshold))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red)),
    );
    frame.render_widget(summary_list, chunks[0]);

    let header = Row::new(vec!["Assignment", "Student", "Submitted", "Graded", "Days"])
        .style(bold().fg(Color::Cyan));
    let rows: Vec<Row> = detail
        .iter()
        .skip(scroll)
        .map(|entry| {
            Row::new(vec![
                Cell::from(entry.assignment_name.clone()),
                Cell::from(entry.student_name.clone()),
                Cell::from(entry.submitted_on.clone()),
                Cell::from(entry.graded_on.clone()),
                Cell::from(entry.delay_days.clone()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(30),
            Constraint::Percentage(25),
            Constraint::Length(20),
            Constraint::Length(20),
            Constraint::Length(6),
        ],
    )
    .header(header)
    .block(cyan_block(format!("Delayed Students ({})", detail.len())));
    frame.render_widget(table, chunks[1]);

    render_footer(frame, chunks[2], notice, help);
}

fn render_error(frame: &mut Frame, message: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(frame.area());

    let mut text = vec![
        Line::from(vec![Span::styled(
            "Error",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )]),
        Line::from(""),
    ];
    text.extend(message.lines().map(|l| Line::from(l.to_string())));

    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, chunks[0]);

    let help = Paragraph::new("[Enter: Continue | q: Quit]")
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(help, chunks[1]);
}
