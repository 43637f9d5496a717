use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Utc};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::errors::BotError;
use crate::events::action::{Action, InboundEvent};
use crate::gateway::{CalendarRenderer, Highlight, MessageGateway};
use crate::models::user::{Mode, UserRef};
use crate::service::free_days::MAX_GROUP_USERS;
use crate::service::keyboards::{self, CalendarMode};
use crate::service::reminder_time;
use crate::store::CalendarStore;

const CONTROLS_NOTICE: &str = "ℹ️ Please use the controls below.";
const OOPS_NOTICE: &str = "⚠️ Something went wrong, please try again.";
const EMPTY_MONTH_NOTICE: &str = "📭 No marked days this month yet.";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Where the conversation with one user currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    SelectTimezone,
    TimezoneInput,
    SelectMode,
    MainMenu,
    CalendarView,
    DaySelected,
    TaskNameInput,
    TaskTimeSelect,
    TaskReminderSelect,
    EditTasksMode,
    DayTasksView,
    GroupMode,
    ConfirmReset,
    SettingsMode,
    DeleteDayMode,
    ConfirmDeleteDay,
}

/// Partial task being assembled across several steps.
#[derive(Debug, Clone, Default)]
struct Draft {
    day: Option<u32>,
    task_text: Option<String>,
    task_time: Option<String>,
    /// Set while re-entering the task flow from an existing task; on save
    /// the old task is removed and the new one inserted in its place.
    editing_task_id: Option<i64>,
}

#[derive(Debug, Clone)]
struct Session {
    state: ChatState,
    draft: Draft,
    last_message: Option<crate::gateway::MessageRef>,
}

impl Session {
    fn at(state: ChatState) -> Self {
        Self {
            state,
            draft: Draft::default(),
            last_message: None,
        }
    }

    fn goto(mut self, state: ChatState) -> Self {
        self.state = state;
        self
    }
}

/// The conversational core. One instance serves every user; per-user
/// position lives in the session map. Events arrive one at a time from the
/// worker, so steps never interleave.
pub struct DialogEngine {
    store: CalendarStore,
    gateway: Arc<dyn MessageGateway>,
    renderer: Arc<dyn CalendarRenderer>,
    sessions: Arc<Mutex<HashMap<i64, Session>>>,
}

impl DialogEngine {
    pub fn new(
        store: CalendarStore,
        gateway: Arc<dyn MessageGateway>,
        renderer: Arc<dyn CalendarRenderer>,
    ) -> Self {
        Self {
            store,
            gateway,
            renderer,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Current dialog position of a user, if any. Used by the console front
    /// end and by tests.
    pub async fn current_state(&self, user_id: i64) -> Option<ChatState> {
        self.sessions.lock().await.get(&user_id).map(|s| s.state)
    }

    /// Drives one inbound event through the state machine. A failed step
    /// leaves the session where it was; the user just sees a retry notice.
    pub async fn handle_event(&self, event: InboundEvent) {
        let user = event.user().clone();
        let mut sessions = self.sessions.lock().await;
        let restart = matches!(&event, InboundEvent::Text { text, .. } if text.trim() == "/start");
        let result = match sessions.get(&user.id) {
            None => self.first_contact(&user).await,
            Some(_) if restart => self.first_contact(&user).await,
            Some(session) => self.step(&user, session.clone(), &event).await,
        };
        match result {
            Ok(next) => {
                sessions.insert(user.id, next);
            }
            Err(err) => {
                error!(user_id = user.id, %err, "dialog step failed");
                let _ = self.gateway.send_text(user.id, OOPS_NOTICE, None).await;
            }
        }
    }

    /// First event from a user this process has not spoken to yet. New users
    /// get onboarded; returning ones land in the main menu.
    async fn first_contact(&self, user: &UserRef) -> Result<Session, BotError> {
        if self.store.user_exists(user.id).await? {
            return self.goto_main_menu(user.id, Session::at(ChatState::MainMenu)).await;
        }
        self.store.create_user(user).await?;
        info!(user_id = user.id, username = ?user.username, "registered new user");
        self.gateway
            .send_text(
                user.id,
                "👋 Welcome! Let's set you up.\nPick your timezone:",
                Some(keyboards::timezone_presets()),
            )
            .await?;
        Ok(Session::at(ChatState::SelectTimezone))
    }

    async fn step(
        &self,
        user: &UserRef,
        session: Session,
        event: &InboundEvent,
    ) -> Result<Session, BotError> {
        match session.state {
            ChatState::SelectTimezone => self.on_select_timezone(user, session, event).await,
            ChatState::TimezoneInput => self.on_timezone_input(user, session, event).await,
            ChatState::SelectMode => self.on_select_mode(user, session, event).await,
            ChatState::MainMenu => self.on_main_menu(user, session, event).await,
            ChatState::CalendarView => self.on_calendar_view(user, session, event).await,
            ChatState::DaySelected => self.on_day_selected(user, session, event).await,
            ChatState::TaskNameInput => self.on_task_name(user, session, event).await,
            ChatState::TaskTimeSelect => self.on_task_time(user, session, event).await,
            ChatState::TaskReminderSelect => self.on_task_reminder(user, session, event).await,
            ChatState::EditTasksMode => self.on_edit_tasks(user, session, event).await,
            ChatState::DayTasksView => self.on_day_tasks(user, session, event).await,
            ChatState::GroupMode => self.on_group(user, session, event).await,
            ChatState::ConfirmReset => self.on_confirm_reset(user, session, event).await,
            ChatState::SettingsMode => self.on_settings(user, session, event).await,
            ChatState::DeleteDayMode => self.on_delete_day(user, session, event).await,
            ChatState::ConfirmDeleteDay => self.on_confirm_delete_day(user, session, event).await,
        }
    }

    async fn on_select_timezone(
        &self,
        user: &UserRef,
        session: Session,
        event: &InboundEvent,
    ) -> Result<Session, BotError> {
        match event {
            InboundEvent::Action {
                action: Action::Timezone(tz),
                ..
            } => {
                self.store.set_timezone(user.id, tz).await?;
                self.prompt_mode(user.id).await?;
                Ok(session.goto(ChatState::SelectMode))
            }
            InboundEvent::Action {
                action: Action::TimezoneOther,
                ..
            } => {
                self.gateway
                    .send_text(
                        user.id,
                        "🌍 Send your timezone as an IANA name, e.g. Europe/Berlin.",
                        None,
                    )
                    .await?;
                Ok(session.goto(ChatState::TimezoneInput))
            }
            _ => self.notice(user.id, session).await,
        }
    }

    async fn on_timezone_input(
        &self,
        user: &UserRef,
        session: Session,
        event: &InboundEvent,
    ) -> Result<Session, BotError> {
        let InboundEvent::Text { text, .. } = event else {
            return self.notice(user.id, session).await;
        };
        let tz = text.trim();
        if reminder_time::validate_timezone(tz).is_err() {
            self.gateway
                .send_text(
                    user.id,
                    "❌ I don't know that timezone. Try again, e.g. Europe/Berlin.",
                    None,
                )
                .await?;
            return Ok(session);
        }
        self.store.set_timezone(user.id, tz).await?;
        self.prompt_mode(user.id).await?;
        Ok(session.goto(ChatState::SelectMode))
    }

    async fn on_select_mode(
        &self,
        user: &UserRef,
        session: Session,
        event: &InboundEvent,
    ) -> Result<Session, BotError> {
        match event {
            InboundEvent::Action {
                action: Action::SelectMode(mode),
                ..
            } => {
                self.store.set_mode(user.id, *mode).await?;
                self.goto_main_menu(user.id, session).await
            }
            _ => self.notice(user.id, session).await,
        }
    }

    async fn on_main_menu(
        &self,
        user: &UserRef,
        session: Session,
        event: &InboundEvent,
    ) -> Result<Session, BotError> {
        let InboundEvent::Text { text, .. } = event else {
            return self.notice(user.id, session).await;
        };
        let mode = self.store.mode(user.id).await?;
        match text.trim() {
            keyboards::MENU_CALENDAR => {
                self.show_calendar(user.id, session, CalendarMode::Normal).await
            }
            keyboards::MENU_EDIT_TASKS if mode == Mode::Todo => {
                self.show_calendar(user.id, session, CalendarMode::Edit).await
            }
            keyboards::MENU_DELETE_DAY => {
                self.show_calendar(user.id, session, CalendarMode::Delete).await
            }
            keyboards::MENU_SHARED_DAYS => {
                self.gateway
                    .send_text(
                        user.id,
                        &format!(
                            "👥 Send the @handles of up to {MAX_GROUP_USERS} people, \
                             separated by spaces."
                        ),
                        Some(keyboards::group_back()),
                    )
                    .await?;
                Ok(session.goto(ChatState::GroupMode))
            }
            keyboards::MENU_SETTINGS => self.show_settings(user.id, session).await,
            _ => self.notice(user.id, session).await,
        }
    }

    async fn on_calendar_view(
        &self,
        user: &UserRef,
        mut session: Session,
        event: &InboundEvent,
    ) -> Result<Session, BotError> {
        let InboundEvent::Action { action, .. } = event else {
            return self.notice(user.id, session).await;
        };
        match action {
            Action::SelectDay(day) => {
                let mode = self.store.mode(user.id).await?;
                if mode == Mode::Meeting {
                    let (year, month) = today();
                    self.store.mark_day_busy(user.id, year, month, *day).await?;
                    return self.show_calendar(user.id, session, CalendarMode::Normal).await;
                }
                session.draft = Draft {
                    day: Some(*day),
                    ..Draft::default()
                };
                self.prompt_task_name(user.id, *day).await?;
                Ok(session.goto(ChatState::TaskNameInput))
            }
            Action::EditTasks => self.show_calendar(user.id, session, CalendarMode::Edit).await,
            Action::DeleteDayMode => {
                self.show_calendar(user.id, session, CalendarMode::Delete).await
            }
            Action::ResetAll => {
                self.gateway
                    .send_text(
                        user.id,
                        "⚠️ Reset the whole month? All marks and tasks will be gone.",
                        Some(keyboards::confirmation()),
                    )
                    .await?;
                Ok(session.goto(ChatState::ConfirmReset))
            }
            Action::Done => self.goto_main_menu(user.id, session).await,
            _ => self.notice(user.id, session).await,
        }
    }

    async fn on_day_selected(
        &self,
        user: &UserRef,
        session: Session,
        event: &InboundEvent,
    ) -> Result<Session, BotError> {
        let InboundEvent::Action { action, .. } = event else {
            return self.notice(user.id, session).await;
        };
        match action {
            Action::AddAnotherTask => {
                let day = session.draft.day.unwrap_or(1);
                self.prompt_task_name(user.id, day).await?;
                Ok(session.goto(ChatState::TaskNameInput))
            }
            Action::BackToCalendar => {
                self.show_calendar(user.id, session, CalendarMode::Normal).await
            }
            _ => self.notice(user.id, session).await,
        }
    }

    async fn on_task_name(
        &self,
        user: &UserRef,
        mut session: Session,
        event: &InboundEvent,
    ) -> Result<Session, BotError> {
        match event {
            InboundEvent::Text { text, .. } if !text.trim().is_empty() => {
                session.draft.task_text = Some(text.trim().to_string());
                let reference = self
                    .gateway
                    .send_text(
                        user.id,
                        "🕐 Pick a time:",
                        Some(keyboards::time_selection(0)),
                    )
                    .await?;
                session.last_message = Some(reference);
                Ok(session.goto(ChatState::TaskTimeSelect))
            }
            InboundEvent::Action {
                action: Action::SkipTask,
                ..
            } if session.draft.editing_task_id.is_none() => {
                let day = session.draft.day.unwrap_or(1);
                let (year, month) = today();
                self.store.mark_day_busy(user.id, year, month, day).await?;
                self.show_calendar(user.id, session, CalendarMode::Normal).await
            }
            _ => self.notice(user.id, session).await,
        }
    }

    async fn on_task_time(
        &self,
        user: &UserRef,
        mut session: Session,
        event: &InboundEvent,
    ) -> Result<Session, BotError> {
        let InboundEvent::Action { action, .. } = event else {
            return self.notice(user.id, session).await;
        };
        match action {
            Action::Time(time) => {
                session.draft.task_time = Some(time.clone());
                self.gateway
                    .send_text(
                        user.id,
                        "⏰ Remind how long before?",
                        Some(keyboards::reminder_presets()),
                    )
                    .await?;
                Ok(session.goto(ChatState::TaskReminderSelect))
            }
            Action::TimePage(page) => {
                // Flip the grid in place instead of stacking messages.
                match session.last_message {
                    Some(reference) => {
                        self.gateway
                            .edit_text(
                                user.id,
                                reference,
                                "🕐 Pick a time:",
                                Some(keyboards::time_selection(*page)),
                            )
                            .await?;
                    }
                    None => {
                        let reference = self
                            .gateway
                            .send_text(
                                user.id,
                                "🕐 Pick a time:",
                                Some(keyboards::time_selection(*page)),
                            )
                            .await?;
                        session.last_message = Some(reference);
                    }
                }
                Ok(session)
            }
            _ => self.notice(user.id, session).await,
        }
    }

    async fn on_task_reminder(
        &self,
        user: &UserRef,
        mut session: Session,
        event: &InboundEvent,
    ) -> Result<Session, BotError> {
        let InboundEvent::Action {
            action: Action::Reminder(minutes),
            ..
        } = event
        else {
            return self.notice(user.id, session).await;
        };
        let (year, month) = today();
        let day = session.draft.day.unwrap_or(1);
        let text = session.draft.task_text.take().unwrap_or_default();
        let time = session.draft.task_time.take().unwrap_or_else(|| "09:00".to_string());
        let editing = session.draft.editing_task_id.take();
        if let Some(old_id) = editing {
            self.store.delete_task(old_id).await?;
        }
        // No explicit marker here: the task row itself makes the day count
        // as occupied, and goes away with the task.
        self.store
            .add_task(user.id, year, month, day, &text, &time, *minutes)
            .await?;
        if editing.is_some() {
            self.gateway
                .send_text(user.id, &format!("✅ Task updated: {time} — {text}"), None)
                .await?;
            return self.show_day_tasks(user.id, session, day).await;
        }
        self.gateway
            .send_text(
                user.id,
                &format!("✅ Task saved for day {day} at {time}.\nAnything else for this day?"),
                Some(keyboards::task_decision()),
            )
            .await?;
        Ok(session.goto(ChatState::DaySelected))
    }

    async fn on_edit_tasks(
        &self,
        user: &UserRef,
        mut session: Session,
        event: &InboundEvent,
    ) -> Result<Session, BotError> {
        let InboundEvent::Action { action, .. } = event else {
            return self.notice(user.id, session).await;
        };
        match action {
            Action::EditDay(day) => {
                session.draft.day = Some(*day);
                self.show_day_tasks(user.id, session, *day).await
            }
            Action::BackToCalendar => {
                self.show_calendar(user.id, session, CalendarMode::Normal).await
            }
            Action::Done => self.goto_main_menu(user.id, session).await,
            _ => self.notice(user.id, session).await,
        }
    }

    async fn on_day_tasks(
        &self,
        user: &UserRef,
        mut session: Session,
        event: &InboundEvent,
    ) -> Result<Session, BotError> {
        let InboundEvent::Action { action, .. } = event else {
            return self.notice(user.id, session).await;
        };
        match action {
            Action::EditTask(task_id) => {
                let Some(task) = self.store.task_by_id(*task_id).await? else {
                    self.gateway
                        .send_text(user.id, "❌ That task is gone.", None)
                        .await?;
                    let day = session.draft.day.unwrap_or(1);
                    return self.show_day_tasks(user.id, session, day).await;
                };
                session.draft = Draft {
                    day: Some(task.day),
                    editing_task_id: Some(task.id),
                    ..Draft::default()
                };
                self.gateway
                    .send_text(
                        user.id,
                        &format!("✏️ Editing \"{}\". Send the new task text:", task.text),
                        None,
                    )
                    .await?;
                Ok(session.goto(ChatState::TaskNameInput))
            }
            Action::DeleteTask(task_id) => {
                if !self.store.delete_task(*task_id).await? {
                    self.gateway
                        .send_text(user.id, "❌ That task is gone.", None)
                        .await?;
                }
                let day = session.draft.day.unwrap_or(1);
                let (year, month) = today();
                if self.store.tasks_for_day(user.id, year, month, day).await?.is_empty() {
                    return self.show_calendar(user.id, session, CalendarMode::Edit).await;
                }
                self.show_day_tasks(user.id, session, day).await
            }
            Action::BackToDays => self.show_calendar(user.id, session, CalendarMode::Edit).await,
            _ => self.notice(user.id, session).await,
        }
    }

    async fn on_group(
        &self,
        user: &UserRef,
        session: Session,
        event: &InboundEvent,
    ) -> Result<Session, BotError> {
        let InboundEvent::Text { text, .. } = event else {
            return self.notice(user.id, session).await;
        };
        if text.trim() == keyboards::GROUP_BACK {
            return self.goto_main_menu(user.id, session).await;
        }
        let handles: Vec<String> = text
            .split_whitespace()
            .filter_map(|word| word.strip_prefix('@'))
            .filter(|handle| !handle.is_empty())
            .map(str::to_string)
            .collect();
        if handles.is_empty() {
            self.gateway
                .send_text(
                    user.id,
                    "❌ Send at least one @handle, e.g. @alice @bob.",
                    Some(keyboards::group_back()),
                )
                .await?;
            return Ok(session);
        }
        if handles.len() > MAX_GROUP_USERS {
            self.gateway
                .send_text(
                    user.id,
                    &format!("❌ At most {MAX_GROUP_USERS} people per query."),
                    Some(keyboards::group_back()),
                )
                .await?;
            return Ok(session);
        }
        let mut ids = self.store.users_by_handles(&handles).await?;
        if ids.is_empty() {
            self.gateway
                .send_text(
                    user.id,
                    "❌ None of those handles are known here yet.",
                    Some(keyboards::group_back()),
                )
                .await?;
            return Ok(session);
        }
        // The requester's own calendar counts too.
        if !ids.contains(&user.id) {
            ids.push(user.id);
        }
        let (year, month) = today();
        let free = self
            .store
            .find_common_free_days(user.id, &ids, year, month)
            .await?;
        let caption = if free.is_empty() {
            format!("😔 No common free days in {}.", month_name(month))
        } else {
            format!(
                "🎉 Common free days in {}: {}",
                month_name(month),
                free.iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        let view = self.store.month_view(user.id, year, month).await?;
        let theme = self.store.theme(user.id).await?;
        let image = self
            .renderer
            .render_month(year, month, &view, &theme, &Highlight::FreeDays(free))
            .await?;
        self.gateway
            .send_image(user.id, image, &caption, None)
            .await?;
        self.goto_main_menu(user.id, session).await
    }

    async fn on_confirm_reset(
        &self,
        user: &UserRef,
        session: Session,
        event: &InboundEvent,
    ) -> Result<Session, BotError> {
        let InboundEvent::Action { action, .. } = event else {
            return self.notice(user.id, session).await;
        };
        match action {
            Action::ConfirmReset => {
                let (year, month) = today();
                self.store.reset_month(user.id, year, month).await?;
                self.gateway
                    .send_text(user.id, "🧹 The month is clear.", None)
                    .await?;
                self.goto_main_menu(user.id, session).await
            }
            Action::CancelReset => self.goto_main_menu(user.id, session).await,
            _ => self.notice(user.id, session).await,
        }
    }

    async fn on_settings(
        &self,
        user: &UserRef,
        session: Session,
        event: &InboundEvent,
    ) -> Result<Session, BotError> {
        match event {
            InboundEvent::Text { text, .. } => match text.trim() {
                keyboards::SETTINGS_SWITCH_MODE => {
                    self.prompt_mode(user.id).await?;
                    Ok(session.goto(ChatState::SelectMode))
                }
                keyboards::SETTINGS_REMINDER => {
                    self.gateway
                        .send_text(
                            user.id,
                            "⏱ Default reminder offset:",
                            Some(keyboards::reminder_presets()),
                        )
                        .await?;
                    Ok(session)
                }
                keyboards::SETTINGS_TIMEZONE => {
                    self.gateway
                        .send_text(
                            user.id,
                            "🌍 Pick your timezone:",
                            Some(keyboards::timezone_presets()),
                        )
                        .await?;
                    Ok(session.goto(ChatState::SelectTimezone))
                }
                keyboards::SETTINGS_THEME => {
                    self.gateway
                        .send_text(
                            user.id,
                            "🎨 Pick a calendar theme:",
                            Some(keyboards::theme_selection()),
                        )
                        .await?;
                    Ok(session)
                }
                keyboards::SETTINGS_MAIN_MENU => self.goto_main_menu(user.id, session).await,
                _ => self.notice(user.id, session).await,
            },
            InboundEvent::Action { action, .. } => match action {
                Action::Reminder(minutes) => {
                    self.store.set_reminder_default(user.id, *minutes).await?;
                    self.refresh_settings(user.id, session).await
                }
                Action::Theme(theme) => {
                    self.store.set_theme(user.id, theme).await?;
                    self.refresh_settings(user.id, session).await
                }
                _ => self.notice(user.id, session).await,
            },
        }
    }

    async fn on_delete_day(
        &self,
        user: &UserRef,
        mut session: Session,
        event: &InboundEvent,
    ) -> Result<Session, BotError> {
        let InboundEvent::Action { action, .. } = event else {
            return self.notice(user.id, session).await;
        };
        match action {
            Action::DeleteDay(day) => {
                session.draft.day = Some(*day);
                self.gateway
                    .send_text(
                        user.id,
                        &format!("⚠️ Delete day {day} and all its tasks?"),
                        Some(keyboards::confirmation()),
                    )
                    .await?;
                Ok(session.goto(ChatState::ConfirmDeleteDay))
            }
            Action::BackToCalendar => {
                self.show_calendar(user.id, session, CalendarMode::Normal).await
            }
            Action::Done => self.goto_main_menu(user.id, session).await,
            _ => self.notice(user.id, session).await,
        }
    }

    async fn on_confirm_delete_day(
        &self,
        user: &UserRef,
        session: Session,
        event: &InboundEvent,
    ) -> Result<Session, BotError> {
        let InboundEvent::Action { action, .. } = event else {
            return self.notice(user.id, session).await;
        };
        match action {
            Action::ConfirmReset => {
                let day = session.draft.day.unwrap_or(1);
                let (year, month) = today();
                self.store.mark_day_free(user.id, year, month, day).await?;
                self.gateway
                    .send_text(user.id, &format!("🗑️ Day {day} is free again."), None)
                    .await?;
                self.show_calendar(user.id, session, CalendarMode::Normal).await
            }
            Action::CancelReset => {
                self.show_calendar(user.id, session, CalendarMode::Normal).await
            }
            _ => self.notice(user.id, session).await,
        }
    }

    /// Renders and sends the month, wired with the keyboard for the given
    /// browsing mode. Edit and delete views over a blank month short-circuit
    /// with a notice instead of an image.
    async fn show_calendar(
        &self,
        user_id: i64,
        mut session: Session,
        mode: CalendarMode,
    ) -> Result<Session, BotError> {
        let (year, month) = today();
        let view = self.store.month_view(user_id, year, month).await?;
        if view.is_empty() && mode != CalendarMode::Normal {
            self.gateway
                .send_text(
                    user_id,
                    EMPTY_MONTH_NOTICE,
                    Some(keyboards::back_to_calendar()),
                )
                .await?;
            let state = match mode {
                CalendarMode::Edit => ChatState::EditTasksMode,
                _ => ChatState::DeleteDayMode,
            };
            return Ok(session.goto(state));
        }
        let theme = self.store.theme(user_id).await?;
        let image = self
            .renderer
            .render_month(year, month, &view, &theme, &Highlight::Busy)
            .await?;
        let caption = match mode {
            CalendarMode::Normal => format!("📅 {} {year}", month_name(month)),
            CalendarMode::Edit => format!("✏️ Pick a day to edit — {} {year}", month_name(month)),
            CalendarMode::Delete => {
                format!("🗑️ Pick a day to delete — {} {year}", month_name(month))
            }
        };
        let reference = self
            .gateway
            .send_image(
                user_id,
                image,
                &caption,
                Some(keyboards::calendar(year, month, &view, mode)),
            )
            .await?;
        session.last_message = Some(reference);
        let state = match mode {
            CalendarMode::Normal => ChatState::CalendarView,
            CalendarMode::Edit => ChatState::EditTasksMode,
            CalendarMode::Delete => ChatState::DeleteDayMode,
        };
        Ok(session.goto(state))
    }

    async fn show_day_tasks(
        &self,
        user_id: i64,
        session: Session,
        day: u32,
    ) -> Result<Session, BotError> {
        let (year, month) = today();
        let tasks = self.store.tasks_for_day(user_id, year, month, day).await?;
        if tasks.is_empty() {
            self.gateway
                .send_text(
                    user_id,
                    &format!("📭 Nothing scheduled on day {day}."),
                    Some(keyboards::back_to_calendar()),
                )
                .await?;
            return Ok(session.goto(ChatState::EditTasksMode));
        }
        let mut lines = vec![format!("📋 Day {day}:")];
        for task in &tasks {
            lines.push(format!("• {} — {}", task.time, task.text));
        }
        self.gateway
            .send_text(
                user_id,
                &lines.join("\n"),
                Some(keyboards::task_list(&tasks)),
            )
            .await?;
        Ok(session.goto(ChatState::DayTasksView))
    }

    async fn show_settings(
        &self,
        user_id: i64,
        mut session: Session,
    ) -> Result<Session, BotError> {
        let text = self.settings_text(user_id).await?;
        let reference = self
            .gateway
            .send_text(user_id, &text, Some(keyboards::settings_menu()))
            .await?;
        session.last_message = Some(reference);
        Ok(session.goto(ChatState::SettingsMode))
    }

    /// Updates the settings message in place; a failed edit (or none to
    /// edit) falls back to sending a fresh one.
    async fn refresh_settings(
        &self,
        user_id: i64,
        mut session: Session,
    ) -> Result<Session, BotError> {
        let text = self.settings_text(user_id).await?;
        let edited = match session.last_message {
            Some(reference) => self
                .gateway
                .edit_text(user_id, reference, &text, Some(keyboards::settings_menu()))
                .await
                .is_ok(),
            None => false,
        };
        if !edited {
            let reference = self
                .gateway
                .send_text(user_id, &text, Some(keyboards::settings_menu()))
                .await?;
            session.last_message = Some(reference);
        }
        Ok(session.goto(ChatState::SettingsMode))
    }

    async fn settings_text(&self, user_id: i64) -> Result<String, BotError> {
        let mode = self.store.mode(user_id).await?;
        let reminder = self.store.reminder_default(user_id).await?;
        let timezone = self.store.timezone(user_id).await?;
        let theme = self.store.theme(user_id).await?;
        Ok(format!(
            "⚙️ Settings\nMode: {}\nReminder: {} min before\nTimezone: {}\nTheme: {}",
            mode.label(),
            reminder,
            timezone,
            theme
        ))
    }

    async fn goto_main_menu(
        &self,
        user_id: i64,
        mut session: Session,
    ) -> Result<Session, BotError> {
        let mode = self.store.mode(user_id).await?;
        self.gateway
            .send_text(user_id, "🏠 Main menu", Some(keyboards::main_menu(mode)))
            .await?;
        session.draft = Draft::default();
        Ok(session.goto(ChatState::MainMenu))
    }

    async fn prompt_mode(&self, user_id: i64) -> Result<(), BotError> {
        self.gateway
            .send_text(
                user_id,
                "How will you use the calendar?",
                Some(keyboards::mode_selection()),
            )
            .await?;
        Ok(())
    }

    async fn prompt_task_name(&self, user_id: i64, day: u32) -> Result<(), BotError> {
        self.gateway
            .send_text(
                user_id,
                &format!("📌 Day {day}. Enter a task, or skip to just mark it busy:"),
                Some(keyboards::skip_task()),
            )
            .await?;
        Ok(())
    }

    /// Out-of-grammar input: nudge the user, change nothing.
    async fn notice(&self, user_id: i64, session: Session) -> Result<Session, BotError> {
        self.gateway.send_text(user_id, CONTROLS_NOTICE, None).await?;
        Ok(session)
    }
}

fn today() -> (i32, u32) {
    let now = Utc::now().date_naive();
    (now.year(), now.month())
}

fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("?")
}
