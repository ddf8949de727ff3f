use crate::api::MoodleClient;
use crate::export;
use crate::models::DelayReport;
use crate::parser;
use crate::session::{self, AnalysisStep, AuditSession};
use crate::ui::render::{render_analyzing, render_ui};
use crate::ui::state::{AnalysisProgress, AppState};
use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use tracing::{error, info};

type Term = Terminal<CrosstermBackend<io::Stdout>>;

const MAX_INPUT_LEN: usize = 200;

pub struct App {
    client: MoodleClient,
    session: AuditSession,
    course_input: String,
    state: AppState,
}

impl App {
    pub fn new(client: MoodleClient, session: AuditSession) -> Self {
        Self {
            client,
            session,
            course_input: String::new(),
            state: AppState::CourseInput {
                input: String::new(),
                notice: None,
            },
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Main event loop
        let result = self.event_loop(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    async fn event_loop(&mut self, terminal: &mut Term) -> Result<()> {
        loop {
            self.draw(terminal)?;

            // Check for keyboard events with a short timeout
            if event::poll(std::time::Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key_event(key, terminal).await? {
                        break; // User quit
                    }
                }
            }

            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        Ok(())
    }

    fn draw(&self, terminal: &mut Term) -> Result<()> {
        terminal.draw(|f| render_ui(f, &self.state, &self.session))?;
        Ok(())
    }

    /// Selection screen with the analyzed assignments pre-marked.
    fn selection_state(&self, notice: Option<String>) -> AppState {
        let analyzed = self.session.analyzed_ids();
        let marked = self
            .session
            .assignments()
            .iter()
            .map(|a| analyzed.contains(&a.id))
            .collect();

        AppState::AssignmentSelection {
            selected_index: 0,
            marked,
            notice,
        }
    }

    async fn handle_key_event(&mut self, key: KeyEvent, terminal: &mut Term) -> Result<bool> {
        let current_state = std::mem::replace(
            &mut self.state,
            AppState::Error {
                message: String::new(),
            },
        );

        match current_state {
            AppState::CourseInput { mut input, notice } => match key.code {
                KeyCode::Esc => return Ok(true),
                KeyCode::Char(c) => {
                    if input.len() < MAX_INPUT_LEN {
                        input.push(c);
                    }
                    self.state = AppState::CourseInput { input, notice };
                }
                KeyCode::Backspace => {
                    input.pop();
                    self.state = AppState::CourseInput { input, notice };
                }
                KeyCode::Enter => {
                    let parsed = parser::parse_id_list(&input);
                    if parsed.ids.is_empty() {
                        let mut message = "Enter at least one numeric course id.".to_string();
                        if !parsed.rejected.is_empty() {
                            message.push_str(&format!(
                                " Not valid ids: {}",
                                parsed.rejected.join(", ")
                            ));
                        }
                        self.state = AppState::CourseInput {
                            input,
                            notice: Some(message),
                        };
                    } else {
                        self.course_input = input;
                        self.load_assignments(parsed.ids, parsed.rejected, terminal)
                            .await?;
                    }
                }
                _ => {
                    self.state = AppState::CourseInput { input, notice };
                }
            },
            AppState::AssignmentSelection {
                mut selected_index,
                mut marked,
                notice,
            } => {
                let count = self.session.assignments().len();
                match key.code {
                    KeyCode::Char('q') => return Ok(true),
                    KeyCode::Esc => {
                        self.state = AppState::CourseInput {
                            input: self.course_input.clone(),
                            notice: None,
                        };
                    }
                    KeyCode::Up => {
                        selected_index = selected_index.saturating_sub(1);
                        self.state = AppState::AssignmentSelection {
                            selected_index,
                            marked,
                            notice,
                        };
                    }
                    KeyCode::Down => {
                        if selected_index < count.saturating_sub(1) {
                            selected_index += 1;
                        }
                        self.state = AppState::AssignmentSelection {
                            selected_index,
                            marked,
                            notice,
                        };
                    }
                    KeyCode::Char(' ') => {
                        if let Some(flag) = marked.get_mut(selected_index) {
                            *flag = !*flag;
                        }
                        self.state = AppState::AssignmentSelection {
                            selected_index,
                            marked,
                            notice,
                        };
                    }
                    KeyCode::Char('a') => {
                        let all_marked = marked.iter().all(|m| *m);
                        marked.iter_mut().for_each(|m| *m = !all_marked);
                        self.state = AppState::AssignmentSelection {
                            selected_index,
                            marked,
                            notice,
                        };
                    }
                    KeyCode::Enter => {
                        let mut ids: Vec<u64> = self
                            .session
                            .assignments()
                            .iter()
                            .zip(marked.iter())
                            .filter(|(_, m)| **m)
                            .map(|(a, _)| a.id)
                            .collect();

                        // Nothing marked: analyze the highlighted assignment
                        if ids.is_empty() {
                            if let Some(a) = self.session.assignments().get(selected_index) {
                                ids.push(a.id);
                            }
                        }

                        if ids.is_empty() {
                            self.state = AppState::AssignmentSelection {
                                selected_index,
                                marked,
                                notice,
                            };
                        } else {
                            self.analyze_assignments(ids, terminal).await?;
                        }
                    }
                    KeyCode::Char('v') if !self.session.analyses().is_empty() => {
                        self.state = AppState::AnalysisResults {
                            tab: 0,
                            scroll: 0,
                            notice: None,
                        };
                    }
                    KeyCode::Char('r') => {
                        self.state = AppState::DelayReport {
                            scroll: 0,
                            notice: None,
                        };
                    }
                    _ => {
                        self.state = AppState::AssignmentSelection {
                            selected_index,
                            marked,
                            notice,
                        };
                    }
                }
            }
            AppState::AnalysisResults {
                mut tab,
                mut scroll,
                notice,
            } => {
                let tabs = self.session.analyzed_ids();
                match key.code {
                    KeyCode::Char('q') => return Ok(true),
                    KeyCode::Esc => {
                        self.state = self.selection_state(None);
                    }
                    KeyCode::Right | KeyCode::Tab => {
                        if !tabs.is_empty() {
                            tab = (tab + 1) % tabs.len();
                        }
                        self.state = AppState::AnalysisResults {
                            tab,
                            scroll: 0,
                            notice: None,
                        };
                    }
                    KeyCode::Left | KeyCode::BackTab => {
                        if !tabs.is_empty() {
                            tab = (tab + tabs.len() - 1) % tabs.len();
                        }
                        self.state = AppState::AnalysisResults {
                            tab,
                            scroll: 0,
                            notice: None,
                        };
                    }
                    KeyCode::Up => {
                        scroll = scroll.saturating_sub(1);
                        self.state = AppState::AnalysisResults { tab, scroll, notice };
                    }
                    KeyCode::Down => {
                        let rows = tabs
                            .get(tab)
                            .and_then(|id| self.session.analysis(*id))
                            .map(|r| r.len())
                            .unwrap_or(0);
                        if scroll + 1 < rows {
                            scroll += 1;
                        }
                        self.state = AppState::AnalysisResults { tab, scroll, notice };
                    }
                    KeyCode::Char('e') => {
                        let notice = match tabs.get(tab) {
                            Some(id) => {
                                let records = self.session.analysis(*id).unwrap_or(&[]);
                                Some(export_notice(export::export_analysis_to_csv(records, *id)))
                            }
                            None => notice,
                        };
                        self.state = AppState::AnalysisResults { tab, scroll, notice };
                    }
                    KeyCode::Char('r') => {
                        self.state = AppState::DelayReport {
                            scroll: 0,
                            notice: None,
                        };
                    }
                    _ => {
                        self.state = AppState::AnalysisResults { tab, scroll, notice };
                    }
                }
            }
            AppState::DelayReport { mut scroll, notice } => {
                let report = self.session.report();
                match key.code {
                    KeyCode::Char('q') => return Ok(true),
                    KeyCode::Esc => {
                        self.state = if self.session.analyses().is_empty() {
                            self.selection_state(None)
                        } else {
                            AppState::AnalysisResults {
                                tab: 0,
                                scroll: 0,
                                notice: None,
                            }
                        };
                    }
                    KeyCode::Up => {
                        scroll = scroll.saturating_sub(1);
                        self.state = AppState::DelayReport { scroll, notice };
                    }
                    KeyCode::Down => {
                        if scroll + 1 < report.delayed_students() {
                            scroll += 1;
                        }
                        self.state = AppState::DelayReport { scroll, notice };
                    }
                    KeyCode::Char('e') => {
                        let notice = match &report {
                            DelayReport::Delays { detail, .. } => {
                                Some(export_notice(export::export_delays_to_csv(detail)))
                            }
                            _ => Some("Nothing to export".to_string()),
                        };
                        self.state = AppState::DelayReport { scroll, notice };
                    }
                    _ => {
                        self.state = AppState::DelayReport { scroll, notice };
                    }
                }
            }
            AppState::Error { message } => match key.code {
                KeyCode::Char('q') => return Ok(true),
                KeyCode::Enter | KeyCode::Esc => {
                    self.state = AppState::CourseInput {
                        input: self.course_input.clone(),
                        notice: None,
                    };
                }
                _ => {
                    self.state = AppState::Error { message };
                }
            },
            state => {
                // Loading and analyzing screens ignore input
                self.state = state;
            }
        }

        Ok(false)
    }

    async fn load_assignments(
        &mut self,
        course_ids: Vec<u64>,
        rejected: Vec<String>,
        terminal: &mut Term,
    ) -> Result<()> {
        self.state = AppState::LoadingAssignments {
            course_ids: course_ids.clone(),
        };
        self.draw(terminal)?;

        let fetch = session::collect_assignments(&self.client, &course_ids).await;
        let failed_courses = fetch.failures.len();

        let mut notices = Vec::new();
        if !rejected.is_empty() {
            notices.push(format!("Ignored invalid ids: {}", rejected.join(", ")));
        }
        for (course_id, e) in &fetch.failures {
            notices.push(format!("Course {} failed: {}", course_id, e));
        }

        info!(
            courses = course_ids.len(),
            failed_courses,
            assignments = fetch.assignments.len(),
            "course assignments loaded"
        );

        self.session.replace_assignments(fetch.assignments);

        if self.session.assignments().is_empty() {
            let message = if failed_courses == course_ids.len() {
                "Could not load assignments from any course. Check the log for details."
            } else {
                "No assignments found in the requested course(s)."
            };
            notices.insert(0, message.to_string());

            if failed_courses == course_ids.len() {
                error!("every requested course failed to load");
                self.state = AppState::Error {
                    message: notices.join("\n"),
                };
            } else {
                self.state = AppState::CourseInput {
                    input: self.course_input.clone(),
                    notice: Some(notices.join(" | ")),
                };
            }
            return Ok(());
        }

        notices.insert(
            0,
            format!("Found {} assignment(s)", self.session.assignments().len()),
        );
        self.state = AppState::AssignmentSelection {
            selected_index: 0,
            marked: vec![false; self.session.assignments().len()],
            notice: Some(notices.join(" | ")),
        };
        Ok(())
    }

    async fn analyze_assignments(&mut self, assignment_ids: Vec<u64>, terminal: &mut Term) -> Result<()> {
        let mut progress = AnalysisProgress::new(assignment_ids.len());
        let mut draw_error = None;

        session::analyze_all(&self.client, &mut self.session, &assignment_ids, |step| {
            match step {
                AnalysisStep::Started { index, total, name } => {
                    progress.completed = index;
                    progress.current_assignment = name.to_string();
                    progress.add_status(format!("[{}/{}] Analyzing: {}", index + 1, total, name));
                }
                AnalysisStep::Finished {
                    name,
                    participants: 0,
                } => {
                    progress.empty_results += 1;
                    progress.add_status(format!("  ✗ {} - no participants or data", name));
                }
                AnalysisStep::Finished { name, participants } => {
                    progress.add_status(format!("  ✓ {} - {} participants", name, participants));
                }
            }

            if draw_error.is_none() {
                if let Err(e) = terminal.draw(|f| render_analyzing(f, &progress)) {
                    draw_error = Some(e);
                }
            }
        })
        .await;

        if let Some(e) = draw_error {
            return Err(e.into());
        }

        progress.completed = assignment_ids.len();
        progress.add_status("✓ Analysis complete".to_string());
        self.state = AppState::Analyzing { progress };
        self.draw(terminal)?;

        self.state = AppState::AnalysisResults {
            tab: 0,
            scroll: 0,
            notice: None,
        };
        Ok(())
    }
}

fn export_notice(result: Result<std::path::PathBuf>) -> String {
    match result {
        Ok(path) => format!("Exported to {}", path.display()),
        Err(e) => {
            error!(error = %e, "CSV export failed");
            format!("Export failed: {}", e)
        }
    }
}
