//! Maps raw teloxide updates into the core `InboundEvent` union.

use teloxide::types::{CallbackQuery, Chat, InlineQuery, Message, User};

use bcb_core::{
    domain::{ChatId, MessageId, MessageRef},
    messaging::types::{
        ButtonPress, ChatInfo, ChatKind, CommandEvent, InboundEvent, InlineQueryEvent, PlainReply,
        UserInfo,
    },
};

/// Classifies a message as a command, a reply, or nothing the bot routes.
/// Plain non-reply chatter is dropped here, before it reaches the core.
pub fn map_message(msg: &Message, bot_username: &str) -> Option<InboundEvent> {
    let sender = user_info(msg.from()?);
    let chat = chat_info(&msg.chat);
    let message_id = MessageId(msg.id.0);
    let text = msg.text().or_else(|| msg.caption()).unwrap_or("");

    if let Some((name, args)) = parse_command(text, bot_username) {
        return Some(InboundEvent::Command(CommandEvent {
            chat,
            sender,
            message_id,
            name,
            args,
        }));
    }

    let replied = msg.reply_to_message()?;
    Some(InboundEvent::Reply(PlainReply {
        chat,
        sender,
        message_id,
        text: text.to_string(),
        in_reply_to: MessageId(replied.id.0),
    }))
}

/// A press is only routable when Telegram still has the keyboard message
/// (it is dropped for very old messages) and the button carried data.
pub fn map_callback(query: &CallbackQuery) -> Option<InboundEvent> {
    let message = query.message.as_ref()?;
    let data = query.data.clone()?;
    Some(InboundEvent::Button(ButtonPress {
        chat: chat_info(&message.chat),
        sender: user_info(&query.from),
        callback_id: query.id.clone(),
        data,
        prompt: MessageRef {
            chat_id: ChatId(message.chat.id.0),
            message_id: MessageId(message.id.0),
        },
    }))
}

pub fn map_inline(query: &InlineQuery) -> InboundEvent {
    InboundEvent::Inline(InlineQueryEvent {
        id: query.id.clone(),
        sender: user_info(&query.from),
        query: query.query.clone(),
    })
}

fn chat_info(chat: &Chat) -> ChatInfo {
    let kind = if chat.is_private() {
        ChatKind::Private
    } else if chat.is_group() {
        ChatKind::Group
    } else if chat.is_supergroup() {
        ChatKind::Supergroup
    } else {
        ChatKind::Channel
    };
    ChatInfo {
        id: ChatId(chat.id.0),
        kind,
        title: chat.title().map(str::to_string),
        username: chat.username().map(str::to_string),
    }
}

fn user_info(user: &User) -> UserInfo {
    UserInfo {
        id: bcb_core::domain::UserId(user.id.0 as i64),
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()),
        last_name: user.last_name.clone(),
    }
}

/// Splits `/name args` and strips an optional `@botname` suffix. Commands
/// addressed to a different bot in the same group are ignored entirely.
/// Usernames compare case-insensitively; the command name itself does not.
fn parse_command(text: &str, bot_username: &str) -> Option<(String, String)> {
    let text = text.trim_start();
    let rest = text.strip_prefix('/')?;
    if rest.is_empty() {
        return None;
    }

    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim().to_string()),
        None => (rest, String::new()),
    };

    let name = match head.split_once('@') {
        Some((name, addressee)) => {
            if !addressee.eq_ignore_ascii_case(bot_username) {
                return None;
            }
            name
        }
        None => head,
    };
    if name.is_empty() {
        return None;
    }

    Some((name.to_string(), args))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOT: &str = "bookclub_bot";

    #[test]
    fn parses_bare_command() {
        assert_eq!(
            parse_command("/add_book", BOT),
            Some(("add_book".to_string(), String::new()))
        );
    }

    #[test]
    fn parses_command_with_args() {
        assert_eq!(
            parse_command("/add_book Dune by Frank Herbert", BOT),
            Some(("add_book".to_string(), "Dune by Frank Herbert".to_string()))
        );
    }

    #[test]
    fn strips_own_bot_suffix_case_insensitively() {
        assert_eq!(
            parse_command("/join_book@BookClub_Bot", BOT),
            Some(("join_book".to_string(), String::new()))
        );
    }

    #[test]
    fn ignores_commands_for_other_bots() {
        assert_eq!(parse_command("/join_book@other_bot", BOT), None);
    }

    #[test]
    fn command_name_keeps_its_case() {
        assert_eq!(
            parse_command("/Add_Book", BOT),
            Some(("Add_Book".to_string(), String::new()))
        );
    }

    #[test]
    fn non_commands_are_rejected() {
        assert_eq!(parse_command("hello", BOT), None);
        assert_eq!(parse_command("/", BOT), None);
        assert_eq!(parse_command("/@bookclub_bot", BOT), None);
    }
}
