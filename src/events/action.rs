use crate::models::user::{Mode, UserRef};

/// Typed button payload. Raw payload strings from the transport are decoded
/// exactly once at the gateway boundary; the dialog engine only ever sees
/// this enum and matches on it exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Timezone(String),
    TimezoneOther,
    SelectMode(Mode),
    Theme(String),
    SelectDay(u32),
    EditDay(u32),
    DeleteDay(u32),
    SkipTask,
    Time(String),
    TimePage(u8),
    Reminder(u32),
    EditTask(i64),
    DeleteTask(i64),
    AddAnotherTask,
    BackToCalendar,
    BackToDays,
    ResetAll,
    EditTasks,
    DeleteDayMode,
    Done,
    ConfirmReset,
    CancelReset,
}

impl Action {
    /// Decodes a raw payload string. Returns `None` for anything that is not
    /// part of the button grammar.
    pub fn parse(payload: &str) -> Option<Action> {
        match payload {
            "tz_other" => return Some(Action::TimezoneOther),
            "mode_meeting" => return Some(Action::SelectMode(Mode::Meeting)),
            "mode_todo" => return Some(Action::SelectMode(Mode::Todo)),
            "skip_task" => return Some(Action::SkipTask),
            "add_another_task" => return Some(Action::AddAnotherTask),
            "back_to_calendar" => return Some(Action::BackToCalendar),
            "back_to_days" => return Some(Action::BackToDays),
            "reset_all" => return Some(Action::ResetAll),
            "edit_tasks" => return Some(Action::EditTasks),
            "delete_day_mode" => return Some(Action::DeleteDayMode),
            "done" => return Some(Action::Done),
            "confirm_reset" => return Some(Action::ConfirmReset),
            "cancel_reset" => return Some(Action::CancelReset),
            _ => {}
        }
        if let Some(tz) = payload.strip_prefix("tz_") {
            return Some(Action::Timezone(tz.to_string()));
        }
        if let Some(theme) = payload.strip_prefix("theme_") {
            return Some(Action::Theme(theme.to_string()));
        }
        if let Some(day) = payload.strip_prefix("select_day_") {
            return day.parse().ok().map(Action::SelectDay);
        }
        if let Some(day) = payload.strip_prefix("edit_day_") {
            return day.parse().ok().map(Action::EditDay);
        }
        if let Some(day) = payload.strip_prefix("delete_day_") {
            return day.parse().ok().map(Action::DeleteDay);
        }
        if let Some(page) = payload.strip_prefix("time_page_") {
            return page.parse().ok().map(Action::TimePage);
        }
        if let Some(time) = payload.strip_prefix("time_") {
            return Some(Action::Time(time.to_string()));
        }
        if let Some(minutes) = payload.strip_prefix("reminder_") {
            return minutes.parse().ok().map(Action::Reminder);
        }
        if let Some(id) = payload.strip_prefix("edit_task_") {
            return id.parse().ok().map(Action::EditTask);
        }
        if let Some(id) = payload.strip_prefix("delete_task_") {
            return id.parse().ok().map(Action::DeleteTask);
        }
        None
    }

    /// Encodes the action back into its wire payload.
    pub fn payload(&self) -> String {
        match self {
            Action::Timezone(tz) => format!("tz_{}", tz),
            Action::TimezoneOther => "tz_other".to_string(),
            Action::SelectMode(mode) => format!("mode_{}", mode.as_str()),
            Action::Theme(theme) => format!("theme_{}", theme),
            Action::SelectDay(day) => format!("select_day_{}", day),
            Action::EditDay(day) => format!("edit_day_{}", day),
            Action::DeleteDay(day) => format!("delete_day_{}", day),
            Action::SkipTask => "skip_task".to_string(),
            Action::Time(time) => format!("time_{}", time),
            Action::TimePage(page) => format!("time_page_{}", page),
            Action::Reminder(minutes) => format!("reminder_{}", minutes),
            Action::EditTask(id) => format!("edit_task_{}", id),
            Action::DeleteTask(id) => format!("delete_task_{}", id),
            Action::AddAnotherTask => "add_another_task".to_string(),
            Action::BackToCalendar => "back_to_calendar".to_string(),
            Action::BackToDays => "back_to_days".to_string(),
            Action::ResetAll => "reset_all".to_string(),
            Action::EditTasks => "edit_tasks".to_string(),
            Action::DeleteDayMode => "delete_day_mode".to_string(),
            Action::Done => "done".to_string(),
            Action::ConfirmReset => "confirm_reset".to_string(),
            Action::CancelReset => "cancel_reset".to_string(),
        }
    }
}

/// Inbound event from the messaging gateway, already decoded.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Text { user: UserRef, text: String },
    Action { user: UserRef, action: Action },
}

impl InboundEvent {
    pub fn user(&self) -> &UserRef {
        match self {
            InboundEvent::Text { user, .. } => user,
            InboundEvent::Action { user, .. } => user,
        }
    }
}
