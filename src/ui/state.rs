#[derive(Debug, Clone)]
pub enum AppState {
    CourseInput {
        input: String,
        notice: Option<String>,
    },
    LoadingAssignments {
        course_ids: Vec<u64>,
    },
    AssignmentSelection {
        selected_index: usize,
        marked: Vec<bool>,
        notice: Option<String>,
    },
    Analyzing {
        progress: AnalysisProgress,
    },
    AnalysisResults {
        tab: usize,
        scroll: usize,
        notice: Option<String>,
    },
    DelayReport {
        scroll: usize,
        notice: Option<String>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct AnalysisProgress {
    pub total_assignments: usize,
    pub completed: usize,
    pub current_assignment: String,
    pub empty_results: usize,
    pub status_messages: Vec<String>,
}

impl AnalysisProgress {
    pub fn new(total_assignments: usize) -> Self {
        Self {
            total_assignments,
            completed: 0,
            current_assignment: String::new(),
            empty_results: 0,
            status_messages: vec!["Initializing...".to_string()],
        }
    }

    pub fn add_status(&mut self, message: String) {
        self.status_messages.push(message);
        // Keep only the last 20 messages
        if self.status_messages.len() > 20 {
            self.status_messages.remove(0);
        }
    }

    pub fn percentage(&self) -> f64 {
        if self.total_assignments == 0 {
            0.0
        } else {
            (self.completed as f64 / self.total_assignments as f64) * 100.0
        }
    }
}
