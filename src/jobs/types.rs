use chrono::{DateTime, Utc};
use mediashift_common::{JobId, Principal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub principal: Principal,
    pub state: JobState,
    /// Units of work completed so far.
    pub processed: u64,
    pub messages: Vec<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobState {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl Job {
    pub fn new(name: &str, principal: Principal) -> Self {
        Self {
            id: JobId::new(),
            name: name.to_string(),
            principal,
            state: JobState::Queued,
            processed: 0,
            messages: Vec::new(),
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start(&mut self) {
        self.state = JobState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self) {
        self.state = JobState::Done;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: &str) {
        self.state = JobState::Failed;
        self.error = Some(error.to_string());
        self.finished_at = Some(Utc::now());
    }

    pub fn latest_message(&self) -> Option<&str> {
        self.messages.last().map(String::as_str)
    }
}
