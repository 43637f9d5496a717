use crate::events::action::Action;
use crate::gateway::{Button, Keyboard};
use crate::models::calendar::{MonthView, days_in_month};
use crate::models::task::Task;
use crate::models::user::Mode;

pub const MENU_CALENDAR: &str = "📅 Calendar";
pub const MENU_EDIT_TASKS: &str = "✏️ Edit tasks";
pub const MENU_DELETE_DAY: &str = "🗑️ Delete day";
pub const MENU_SHARED_DAYS: &str = "👥 Shared days";
pub const MENU_SETTINGS: &str = "⚙️ Settings";

pub const SETTINGS_SWITCH_MODE: &str = "🔄 Switch mode";
pub const SETTINGS_REMINDER: &str = "⏱ Reminder";
pub const SETTINGS_TIMEZONE: &str = "🌍 Timezone";
pub const SETTINGS_THEME: &str = "🎨 Theme";
pub const SETTINGS_MAIN_MENU: &str = "↩️ Main menu";

pub const GROUP_BACK: &str = "↩️ Back";

/// Which set of per-day payloads the calendar keyboard emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarMode {
    Normal,
    Edit,
    Delete,
}

pub fn mode_selection() -> Keyboard {
    Keyboard::new()
        .row(vec![Button::action(
            "📅 Meeting mode",
            Action::SelectMode(Mode::Meeting),
        )])
        .row(vec![Button::action(
            "✅ To-Do mode",
            Action::SelectMode(Mode::Todo),
        )])
}

pub fn timezone_presets() -> Keyboard {
    let zones = [
        ("Moscow (UTC+3)", "Europe/Moscow"),
        ("Kyiv (UTC+2)", "Europe/Kiev"),
        ("London (UTC+1)", "Europe/London"),
        ("New York (UTC-4)", "America/New_York"),
        ("Tokyo (UTC+9)", "Asia/Tokyo"),
    ];
    let mut buttons: Vec<Button> = zones
        .iter()
        .map(|(label, zone)| Button::action(*label, Action::Timezone(zone.to_string())))
        .collect();
    buttons.push(Button::action("Other", Action::TimezoneOther));
    rows_of(buttons, 2)
}

pub fn theme_selection() -> Keyboard {
    let themes = [
        ("🔵 Blue", "blue"),
        ("🟣 Purple", "purple"),
        ("🌸 Pink", "pink"),
        ("🌊 Ocean", "ocean"),
        ("🌙 Default", "default"),
    ];
    let buttons = themes
        .iter()
        .map(|(label, theme)| Button::action(*label, Action::Theme(theme.to_string())))
        .collect();
    rows_of(buttons, 2)
}

/// One button per day of the month, seven per row, followed by the controls
/// matching the browsing mode. Occupied days are tagged with a task or busy
/// marker in the label.
pub fn calendar(year: i32, month: u32, view: &MonthView, mode: CalendarMode) -> Keyboard {
    let mut days: Vec<Button> = Vec::new();
    for day in 1..=days_in_month(year, month) {
        let label = match view.get(&day) {
            Some(summary) if summary.task_count > 0 => format!("{day}📝"),
            Some(_) => format!("{day}✅"),
            None => day.to_string(),
        };
        let action = match mode {
            CalendarMode::Normal => Action::SelectDay(day),
            CalendarMode::Edit => Action::EditDay(day),
            CalendarMode::Delete => Action::DeleteDay(day),
        };
        days.push(Button::action(label, action));
    }
    let mut keyboard = rows_of(days, 7);
    match mode {
        CalendarMode::Normal => {
            keyboard = keyboard.row(vec![
                Button::action("🔄 Reset", Action::ResetAll),
                Button::action("✏️ Edit", Action::EditTasks),
                Button::action("🗑️ Delete", Action::DeleteDayMode),
            ]);
        }
        CalendarMode::Edit | CalendarMode::Delete => {
            keyboard = keyboard.row(vec![Button::action("↩️ Back", Action::BackToCalendar)]);
        }
    }
    keyboard.row(vec![Button::action("✅ Done", Action::Done)])
}

/// Half-hour grid; page 0 covers 00:00-17:30, page 1 covers 18:00-23:00.
pub fn time_selection(page: u8) -> Keyboard {
    let (start, end) = if page == 0 { (0u32, 17u32) } else { (18, 23) };
    let mut buttons = Vec::new();
    for hour in start..=end {
        for minute in [0u32, 30] {
            if hour == 23 && minute == 30 {
                break;
            }
            let time = format!("{hour:02}:{minute:02}");
            buttons.push(Button::action(time.clone(), Action::Time(time)));
        }
    }
    let nav = if page == 0 {
        Button::action("Evening →", Action::TimePage(1))
    } else {
        Button::action("← Daytime", Action::TimePage(0))
    };
    rows_of(buttons, 4).row(vec![nav])
}

pub fn skip_task() -> Keyboard {
    Keyboard::new().row(vec![Button::action("⏩ Skip", Action::SkipTask)])
}

pub fn task_decision() -> Keyboard {
    Keyboard::new()
        .row(vec![Button::action("➕ Add a task", Action::AddAnotherTask)])
        .row(vec![Button::action(
            "↩️ Back to calendar",
            Action::BackToCalendar,
        )])
}

pub fn reminder_presets() -> Keyboard {
    let buttons = [5u32, 15, 30, 60, 120]
        .iter()
        .map(|minutes| Button::action(format!("⏱ {minutes} min"), Action::Reminder(*minutes)))
        .collect();
    rows_of(buttons, 3)
}

/// Edit/delete pair per task, then a back row.
pub fn task_list(tasks: &[Task]) -> Keyboard {
    let mut keyboard = Keyboard::new();
    for task in tasks {
        let short: String = task.text.chars().take(10).collect();
        keyboard = keyboard.row(vec![
            Button::action(format!("✏️ {short}"), Action::EditTask(task.id)),
            Button::action("❌", Action::DeleteTask(task.id)),
        ]);
    }
    keyboard.row(vec![Button::action("↩️ Back", Action::BackToDays)])
}

pub fn confirmation() -> Keyboard {
    Keyboard::new().row(vec![
        Button::action("✅ Yes", Action::ConfirmReset),
        Button::action("❌ No", Action::CancelReset),
    ])
}

/// Inline back control for views that short-circuit (e.g. an empty month in
/// edit mode).
pub fn back_to_calendar() -> Keyboard {
    Keyboard::new().row(vec![Button::action("↩️ Back", Action::BackToCalendar)])
}

/// Reply-style menu; pressed buttons come back as plain text. The edit
/// entry only shows up in to-do mode.
pub fn main_menu(mode: Mode) -> Keyboard {
    let mut buttons = vec![Button::text(MENU_CALENDAR)];
    if mode == Mode::Todo {
        buttons.push(Button::text(MENU_EDIT_TASKS));
    }
    buttons.push(Button::text(MENU_DELETE_DAY));
    buttons.push(Button::text(MENU_SHARED_DAYS));
    buttons.push(Button::text(MENU_SETTINGS));
    rows_of(buttons, 2)
}

pub fn settings_menu() -> Keyboard {
    rows_of(
        vec![
            Button::text(SETTINGS_SWITCH_MODE),
            Button::text(SETTINGS_REMINDER),
            Button::text(SETTINGS_TIMEZONE),
            Button::text(SETTINGS_THEME),
            Button::text(SETTINGS_MAIN_MENU),
        ],
        2,
    )
}

pub fn group_back() -> Keyboard {
    Keyboard::new().row(vec![Button::text(GROUP_BACK)])
}

fn rows_of(buttons: Vec<Button>, width: usize) -> Keyboard {
    let mut keyboard = Keyboard::new();
    let mut row = Vec::with_capacity(width);
    for button in buttons {
        row.push(button);
        if row.len() == width {
            keyboard.rows.push(std::mem::take(&mut row));
        }
    }
    if !row.is_empty() {
        keyboard.rows.push(row);
    }
    keyboard
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::calendar::DaySummary;

    #[test]
    fn calendar_marks_occupied_days() {
        let mut view = MonthView::new();
        view.insert(
            3,
            DaySummary {
                occupied: true,
                task_count: 0,
            },
        );
        view.insert(
            5,
            DaySummary {
                occupied: true,
                task_count: 2,
            },
        );
        let keyboard = calendar(2024, 6, &view, CalendarMode::Normal);
        let labels: Vec<&str> = keyboard.buttons().map(|b| b.label.as_str()).collect();
        assert!(labels.contains(&"3✅"));
        assert!(labels.contains(&"5📝"));
        assert!(labels.contains(&"4"));
        // 30 day buttons in rows of 7, controls below.
        assert_eq!(keyboard.rows[0].len(), 7);
        assert_eq!(
            keyboard
                .buttons()
                .filter(|b| matches!(b.action, Some(Action::SelectDay(_))))
                .count(),
            30
        );
    }

    #[test]
    fn calendar_edit_mode_emits_edit_payloads() {
        let keyboard = calendar(2024, 6, &MonthView::new(), CalendarMode::Edit);
        assert!(
            keyboard
                .buttons()
                .any(|b| matches!(b.action, Some(Action::EditDay(1))))
        );
        assert!(
            keyboard
                .buttons()
                .all(|b| !matches!(b.action, Some(Action::ResetAll)))
        );
    }

    #[test]
    fn time_pages_cover_the_day_without_2330() {
        let day = time_selection(0);
        let evening = time_selection(1);
        let day_times: Vec<&str> = day.buttons().map(|b| b.label.as_str()).collect();
        let evening_times: Vec<&str> = evening.buttons().map(|b| b.label.as_str()).collect();
        assert!(day_times.contains(&"00:00"));
        assert!(day_times.contains(&"17:30"));
        assert!(evening_times.contains(&"18:00"));
        assert!(evening_times.contains(&"23:00"));
        assert!(!evening_times.contains(&"23:30"));
    }

    #[test]
    fn main_menu_hides_edit_entry_in_meeting_mode() {
        let meeting: Vec<String> = main_menu(Mode::Meeting)
            .buttons()
            .map(|b| b.label.clone())
            .collect();
        let todo: Vec<String> = main_menu(Mode::Todo)
            .buttons()
            .map(|b| b.label.clone())
            .collect();
        assert!(!meeting.contains(&MENU_EDIT_TASKS.to_string()));
        assert!(todo.contains(&MENU_EDIT_TASKS.to_string()));
    }
}
