use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A timed task on a calendar day. `reminder_at` is fixed at creation time
/// from the owner's timezone at that moment; a later timezone change does
/// not recompute it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub text: String,
    /// Local time of day, "HH:MM".
    pub time: String,
    pub reminder_minutes: u32,
    pub reminder_at: DateTime<Utc>,
    pub reminder_sent: bool,
}

/// Row shape returned by the due-reminder scan; just enough to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueReminder {
    pub task_id: i64,
    pub user_id: i64,
    pub text: String,
}
