use async_trait::async_trait;

use crate::errors::BotError;
use crate::events::action::Action;
use crate::models::calendar::MonthView;

/// Opaque reference to a previously sent message, used for in-place edits.
pub type MessageRef = u64;

/// A button either carries a typed action payload or, for reply-style
/// menus, echoes its label back as a text event when pressed.
#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    pub label: String,
    pub action: Option<Action>,
}

impl Button {
    pub fn action(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action: Some(action),
        }
    }

    pub fn text(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}

/// Outbound side of the messaging transport. Implementations own all
/// presentation concerns, including any cleanup of previously sent
/// messages; the core never sees that bookkeeping.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send_text(
        &self,
        user_id: i64,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, BotError>;

    async fn send_image(
        &self,
        user_id: i64,
        image: Vec<u8>,
        caption: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, BotError>;

    async fn edit_text(
        &self,
        user_id: i64,
        message: MessageRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), BotError>;
}

/// What the calendar image should emphasize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Highlight {
    /// Occupied days (normal browsing).
    Busy,
    /// The given common free days (group queries).
    FreeDays(Vec<u32>),
}

/// Stateless month-image renderer; a collaborator, not part of the core.
#[async_trait]
pub trait CalendarRenderer: Send + Sync {
    async fn render_month(
        &self,
        year: i32,
        month: u32,
        view: &MonthView,
        theme: &str,
        highlight: &Highlight,
    ) -> Result<Vec<u8>, BotError>;
}
