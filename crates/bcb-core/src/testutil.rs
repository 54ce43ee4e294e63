//! Shared test doubles: fixture builders, a canned admin directory and a
//! recording messenger.

use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatInfo, ChatKind, InlineKeyboard, UserInfo},
    },
    permissions::AdminDirectory,
    Result,
};

pub(crate) fn chat(id: i64) -> ChatInfo {
    ChatInfo {
        id: ChatId(id),
        kind: ChatKind::Private,
        title: None,
        username: None,
    }
}

pub(crate) fn group_chat(id: i64) -> ChatInfo {
    ChatInfo {
        id: ChatId(id),
        kind: ChatKind::Group,
        title: Some(format!("group-{id}")),
        username: None,
    }
}

pub(crate) fn user(id: i64) -> UserInfo {
    UserInfo {
        id: UserId(id),
        username: Some(format!("user{id}")),
        first_name: None,
        last_name: None,
    }
}

/// Fixed admin list, same for every chat.
pub(crate) struct StubAdmins {
    admins: Vec<UserId>,
}

impl StubAdmins {
    pub(crate) fn new(admins: Vec<UserId>) -> Self {
        Self { admins }
    }
}

#[async_trait]
impl AdminDirectory for StubAdmins {
    async fn chat_admins(&self, _chat_id: ChatId) -> Result<Vec<UserId>> {
        Ok(self.admins.clone())
    }
}

/// One message sent through the mock, in send order.
#[derive(Clone, Debug)]
pub(crate) struct SentMessage {
    pub chat: ChatId,
    pub reply_to: Option<MessageId>,
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,
    pub force_reply: bool,
    /// Ref the mock assigned to this message.
    pub msg: MessageRef,
}

#[derive(Clone, Debug)]
pub(crate) struct EditedMessage {
    pub msg: MessageRef,
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,
}

/// Recording [`MessagingPort`] double. Message ids are handed out
/// sequentially from 1000 so tests can key continuations to them.
pub(crate) struct MockMessenger {
    next_id: AtomicI32,
    sent: Mutex<Vec<SentMessage>>,
    edits: Mutex<Vec<EditedMessage>>,
    callbacks: Mutex<Vec<(String, Option<String>)>>,
    forwards: Mutex<Vec<(ChatId, ChatId, MessageId)>>,
    fail_forwards: bool,
    fail_callbacks: bool,
}

impl MockMessenger {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicI32::new(1000),
            sent: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            callbacks: Mutex::new(Vec::new()),
            forwards: Mutex::new(Vec::new()),
            fail_forwards: false,
            fail_callbacks: false,
        }
    }

    /// Every `forward_message` call fails, as if the original was deleted.
    pub(crate) fn failing_forwards() -> Self {
        Self {
            fail_forwards: true,
            ..Self::new()
        }
    }

    /// Every `answer_callback` call fails, as if the ack hit a transport
    /// error.
    pub(crate) fn failing_callbacks() -> Self {
        Self {
            fail_callbacks: true,
            ..Self::new()
        }
    }

    fn next_ref(&self, chat: ChatId) -> MessageRef {
        MessageRef {
            chat_id: chat,
            message_id: MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)),
        }
    }

    async fn record(
        &self,
        chat: ChatId,
        reply_to: Option<MessageId>,
        text: &str,
        keyboard: Option<InlineKeyboard>,
        force_reply: bool,
    ) -> MessageRef {
        let msg = self.next_ref(chat);
        self.sent.lock().await.push(SentMessage {
            chat,
            reply_to,
            text: text.to_string(),
            keyboard,
            force_reply,
            msg,
        });
        msg
    }

    pub(crate) async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub(crate) async fn last_sent(&self) -> SentMessage {
        let sent = self.sent.lock().await;
        sent.last().cloned().unwrap()
    }

    pub(crate) async fn edits(&self) -> Vec<EditedMessage> {
        self.edits.lock().await.clone()
    }

    pub(crate) async fn callbacks_answered(&self) -> usize {
        self.callbacks.lock().await.len()
    }

    pub(crate) async fn forwards(&self) -> Vec<(ChatId, ChatId, MessageId)> {
        self.forwards.lock().await.clone()
    }
}

#[async_trait]
impl MessagingPort for MockMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        Ok(self.record(chat_id, None, text, None, false).await)
    }

    async fn reply_text(
        &self,
        chat_id: ChatId,
        reply_to: MessageId,
        text: &str,
    ) -> Result<MessageRef> {
        Ok(self.record(chat_id, Some(reply_to), text, None, false).await)
    }

    async fn prompt_reply(
        &self,
        chat_id: ChatId,
        reply_to: MessageId,
        text: &str,
    ) -> Result<MessageRef> {
        Ok(self.record(chat_id, Some(reply_to), text, None, true).await)
    }

    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        reply_to: Option<MessageId>,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        Ok(self
            .record(chat_id, reply_to, text, Some(keyboard), false)
            .await)
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()> {
        self.edits.lock().await.push(EditedMessage {
            msg,
            text: text.to_string(),
            keyboard: None,
        });
        Ok(())
    }

    async fn edit_keyboard(
        &self,
        msg: MessageRef,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<()> {
        self.edits.lock().await.push(EditedMessage {
            msg,
            text: text.to_string(),
            keyboard: Some(keyboard),
        });
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        if self.fail_callbacks {
            return Err(Error::Transport("callback ack failed".into()));
        }
        self.callbacks
            .lock()
            .await
            .push((callback_id.to_string(), text.map(str::to_string)));
        Ok(())
    }

    async fn forward_message(
        &self,
        to: ChatId,
        from: ChatId,
        message_id: MessageId,
    ) -> Result<MessageRef> {
        if self.fail_forwards {
            return Err(Error::Transport("message to forward not found".into()));
        }
        self.forwards.lock().await.push((to, from, message_id));
        Ok(self.next_ref(to))
    }
}
