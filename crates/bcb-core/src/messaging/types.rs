use crate::domain::{ChatId, MessageId, MessageRef, UserId};

/// Cross-messenger incoming event model.
///
/// One event per poll update; never stored. Telegram-specific fields live in
/// the Telegram adapter, which maps raw updates into this union.
#[derive(Clone, Debug)]
pub enum InboundEvent {
    Command(CommandEvent),
    Reply(PlainReply),
    Button(ButtonPress),
    Inline(InlineQueryEvent),
}

/// `/command args` message. The adapter strips the platform `@botname`
/// suffix; name matching downstream is case-sensitive.
#[derive(Clone, Debug)]
pub struct CommandEvent {
    pub chat: ChatInfo,
    pub sender: UserInfo,
    pub message_id: MessageId,
    pub name: String,
    pub args: String,
}

/// A non-command message sent as a reply to another message.
///
/// `text` may be empty (media replies, used by the ebook/audiobook wizards,
/// which only need the message id).
#[derive(Clone, Debug)]
pub struct PlainReply {
    pub chat: ChatInfo,
    pub sender: UserInfo,
    pub message_id: MessageId,
    pub text: String,
    pub in_reply_to: MessageId,
}

/// An inline-keyboard button press.
#[derive(Clone, Debug)]
pub struct ButtonPress {
    pub chat: ChatInfo,
    pub sender: UserInfo,
    pub callback_id: String,
    pub data: String,
    /// The message carrying the keyboard that was pressed.
    pub prompt: MessageRef,
}

#[derive(Clone, Debug)]
pub struct InlineQueryEvent {
    pub id: String,
    pub sender: UserInfo,
    pub query: String,
}

#[derive(Clone, Debug)]
pub struct ChatInfo {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: Option<String>,
    pub username: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl ChatKind {
    pub fn is_group_like(self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup)
    }
}

#[derive(Clone, Debug)]
pub struct UserInfo {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserInfo {
    /// `@username` when set, otherwise "First Last".
    pub fn display_name(&self) -> String {
        if let Some(u) = &self.username {
            return format!("@{u}");
        }
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        format!("{first} {last}").trim().to_string()
    }
}

/// Inline keyboard (button grid) attached to a prompt.
#[derive(Clone, Debug, Default)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

#[derive(Clone, Debug)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: Vec<InlineButton>) -> Self {
        self.rows.push(buttons);
        self
    }

    /// Convenience for "one button per row" layouts.
    pub fn one_per_row(buttons: Vec<InlineButton>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }
}

impl InlineButton {
    pub fn new(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback_data: callback_data.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_username() {
        let user = UserInfo {
            id: UserId(1),
            username: Some("reader".to_string()),
            first_name: Some("Ada".to_string()),
            last_name: Some("L".to_string()),
        };
        assert_eq!(user.display_name(), "@reader");
    }

    #[test]
    fn display_name_falls_back_to_names() {
        let user = UserInfo {
            id: UserId(1),
            username: None,
            first_name: Some("Ada".to_string()),
            last_name: None,
        };
        assert_eq!(user.display_name(), "Ada");
    }
}
