use serde::{Deserialize, Serialize};

/// Identity of the person behind a conversation, as reported by the
/// messaging gateway. The numeric id is the gateway's stable identifier;
/// the username is the optional handle used for group lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: i64,
    pub username: Option<String>,
    pub full_name: String,
}

impl UserRef {
    pub fn new(id: i64, username: Option<&str>, full_name: &str) -> Self {
        Self {
            id,
            username: username.map(|u| u.to_string()),
            full_name: full_name.to_string(),
        }
    }
}

/// How day selection behaves in the calendar: meeting mode marks days busy
/// directly, to-do mode starts the task creation dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Meeting,
    Todo,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Meeting => "meeting",
            Mode::Todo => "todo",
        }
    }

    pub fn parse(value: &str) -> Option<Mode> {
        match value {
            "meeting" => Some(Mode::Meeting),
            "todo" => Some(Mode::Todo),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mode::Meeting => "meetings",
            Mode::Todo => "to-do",
        }
    }
}

pub const DEFAULT_MODE: Mode = Mode::Meeting;
pub const DEFAULT_REMINDER_MINUTES: u32 = 60;
pub const DEFAULT_TIMEZONE: &str = "Europe/Moscow";
pub const DEFAULT_THEME: &str = "default";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_round_trips_through_storage_form() {
        assert_eq!(Mode::parse(Mode::Meeting.as_str()), Some(Mode::Meeting));
        assert_eq!(Mode::parse(Mode::Todo.as_str()), Some(Mode::Todo));
        assert_eq!(Mode::parse("something else"), None);
    }
}
