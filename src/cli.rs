use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use inquire::Text;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::errors::BotError;
use crate::events::action::{Action, InboundEvent};
use crate::events::queue::EventBus;
use crate::gateway::{CalendarRenderer, Highlight, Keyboard, MessageGateway, MessageRef};
use crate::models::calendar::{MonthView, days_in_month};
use crate::models::user::UserRef;

/// How many recent messages we remember per chat for input mapping.
const KEPT_MESSAGES: usize = 20;

#[derive(Default)]
struct ChatConsole {
    next_ref: MessageRef,
    /// Newest last; pressed "buttons" are resolved against these.
    keyboards: VecDeque<(MessageRef, Keyboard)>,
}

/// Terminal stand-in for a real messaging transport: messages go to stdout
/// and button presses come back as typed lines matching a button label.
pub struct ConsoleGateway {
    chats: Mutex<HashMap<i64, ChatConsole>>,
}

impl ConsoleGateway {
    pub fn new() -> Self {
        Self {
            chats: Mutex::new(HashMap::new()),
        }
    }

    async fn record(&self, user_id: i64, keyboard: Option<Keyboard>) -> MessageRef {
        let mut chats = self.chats.lock().await;
        let chat = chats.entry(user_id).or_default();
        chat.next_ref += 1;
        let reference = chat.next_ref;
        if let Some(keyboard) = keyboard {
            chat.keyboards.push_back((reference, keyboard));
            while chat.keyboards.len() > KEPT_MESSAGES {
                chat.keyboards.pop_front();
            }
        }
        reference
    }

    /// Maps a typed line to the action of a matching button on a recent
    /// keyboard, newest first. Raw payload strings work too, which keeps
    /// scripted sessions possible.
    pub async fn map_input(&self, user_id: i64, input: &str) -> Option<Action> {
        let input = input.trim();
        let chats = self.chats.lock().await;
        if let Some(chat) = chats.get(&user_id) {
            for (_, keyboard) in chat.keyboards.iter().rev() {
                for button in keyboard.buttons() {
                    if button.label == input {
                        return button.action.clone();
                    }
                }
            }
        }
        Action::parse(input)
    }

    fn print_keyboard(keyboard: &Keyboard) {
        for row in &keyboard.rows {
            let labels: Vec<&str> = row.iter().map(|b| b.label.as_str()).collect();
            println!("  [ {} ]", labels.join(" | "));
        }
    }
}

impl Default for ConsoleGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageGateway for ConsoleGateway {
    async fn send_text(
        &self,
        user_id: i64,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, BotError> {
        println!("\n{text}");
        if let Some(keyboard) = &keyboard {
            Self::print_keyboard(keyboard);
        }
        Ok(self.record(user_id, keyboard).await)
    }

    async fn send_image(
        &self,
        user_id: i64,
        image: Vec<u8>,
        caption: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, BotError> {
        println!("\n{}", String::from_utf8_lossy(&image));
        println!("{caption}");
        if let Some(keyboard) = &keyboard {
            Self::print_keyboard(keyboard);
        }
        Ok(self.record(user_id, keyboard).await)
    }

    async fn edit_text(
        &self,
        user_id: i64,
        message: MessageRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), BotError> {
        println!("\n(updated) {text}");
        if let Some(keyboard) = &keyboard {
            Self::print_keyboard(keyboard);
        }
        let mut chats = self.chats.lock().await;
        if let Some(chat) = chats.get_mut(&user_id) {
            chat.keyboards.retain(|(reference, _)| *reference != message);
            if let Some(keyboard) = keyboard {
                chat.keyboards.push_back((message, keyboard));
            }
        }
        Ok(())
    }
}

/// Draws the month as a character grid: `NN#` has tasks, `NN*` is busy,
/// `(NN)` is highlighted as a common free day.
pub struct AsciiCalendarRenderer;

#[async_trait]
impl CalendarRenderer for AsciiCalendarRenderer {
    async fn render_month(
        &self,
        year: i32,
        month: u32,
        view: &MonthView,
        theme: &str,
        highlight: &Highlight,
    ) -> Result<Vec<u8>, BotError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            BotError::Validation(format!("no such month: {year}-{month:02}"))
        })?;
        let mut out = format!("~ {theme} ~\n Mo  Tu  We  Th  Fr  Sa  Su\n");
        let mut column = first.weekday().num_days_from_monday();
        out.push_str(&"    ".repeat(column as usize));
        for day in 1..=days_in_month(year, month) {
            let cell = match (view.get(&day), highlight) {
                (_, Highlight::FreeDays(free)) if free.contains(&day) => format!("({day:2})"),
                (Some(summary), _) if summary.task_count > 0 => format!("{day:2}# "),
                (Some(_), _) => format!("{day:2}* "),
                (None, _) => format!("{day:2}  "),
            };
            out.push_str(&cell);
            column += 1;
            if column == 7 {
                out.push('\n');
                column = 0;
            }
        }
        Ok(out.into_bytes())
    }
}

/// Interactive loop: read a line, translate it, push it on the bus. The
/// dialog worker prints replies through the gateway in between prompts.
pub async fn run_console_session(bus: EventBus, gateway: Arc<ConsoleGateway>, user: UserRef) {
    bus.emit(InboundEvent::Text {
        user: user.clone(),
        text: "/start".to_string(),
    })
    .await;
    sleep(Duration::from_millis(200)).await;
    loop {
        let line = match Text::new(">").prompt() {
            Ok(line) => line,
            Err(_) => break,
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "quit" || trimmed == "exit" {
            break;
        }
        let event = match gateway.map_input(user.id, trimmed).await {
            Some(action) => InboundEvent::Action {
                user: user.clone(),
                action,
            },
            None => InboundEvent::Text {
                user: user.clone(),
                text: trimmed.to_string(),
            },
        };
        bus.emit(event).await;
        // Give the worker a beat so replies land before the next prompt.
        sleep(Duration::from_millis(200)).await;
    }
}
