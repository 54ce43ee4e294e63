//! Continuation registry: the suspend/resume half of the conversational
//! engine.
//!
//! A wizard step that needs one more message from the chat registers a
//! [`Continuation`] keyed to the prompt it just sent. The dispatcher offers
//! every later reply or button press to [`DialogRegistry::try_consume`]; a
//! match removes the entry (single use) and hands the stored stage back to
//! the application to resume.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    domain::{MessageRef, UserId},
    messaging::types::{ButtonPress, ChatInfo, PlainReply, UserInfo},
    permissions::{Decision, Permission, PermissionEvaluator},
    Result,
};

/// What kind of follow-up event satisfies a pending continuation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CorrelationKind {
    /// A plain message sent in reply to the prompt.
    ReplyTo,
    /// An inline-keyboard press on the prompt.
    ButtonOn,
}

/// Correlation key: (kind, prompt message). The prompt is a full
/// [`MessageRef`] because Telegram message ids are only unique per chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    pub kind: CorrelationKind,
    pub prompt: MessageRef,
}

impl CorrelationKey {
    pub fn reply_to(prompt: MessageRef) -> Self {
        Self {
            kind: CorrelationKind::ReplyTo,
            prompt,
        }
    }

    pub fn button_on(prompt: MessageRef) -> Self {
        Self {
            kind: CorrelationKind::ButtonOn,
            prompt,
        }
    }
}

/// A suspended wizard step.
///
/// `stage` is the application's own enum of wizard stages plus whatever
/// arguments have been accumulated so far; keeping it as plain data (rather
/// than a closure chain) makes pending conversations inspectable in tests.
#[derive(Clone, Debug)]
pub struct Continuation<S> {
    pub permission: Permission,
    /// The user who triggered the command that produced the prompt; required
    /// when `permission` is [`Permission::SameUser`].
    pub originator: Option<UserId>,
    pub stage: S,
    pub created_at: DateTime<Utc>,
}

impl<S> Continuation<S> {
    pub fn anyone(stage: S) -> Self {
        Self {
            permission: Permission::Anyone,
            originator: None,
            stage,
            created_at: Utc::now(),
        }
    }

    pub fn same_user(stage: S, originator: UserId) -> Self {
        Self {
            permission: Permission::SameUser,
            originator: Some(originator),
            stage,
            created_at: Utc::now(),
        }
    }
}

/// Outcome of offering an event to the registry.
#[derive(Debug)]
pub enum ConsumeOutcome<S> {
    /// No continuation under this key; the event is not conversational.
    NotFound,
    /// A continuation exists but the sender may not satisfy it. The entry is
    /// kept so the real owner can still answer; the presser gets no feedback.
    Denied,
    /// The continuation was removed and should be resumed now.
    Resumed(Continuation<S>),
}

/// The follow-up event a resumed stage receives.
#[derive(Clone, Debug)]
pub enum ResumeEvent {
    Reply(PlainReply),
    Button(ButtonPress),
}

impl ResumeEvent {
    pub fn chat(&self) -> &ChatInfo {
        match self {
            ResumeEvent::Reply(r) => &r.chat,
            ResumeEvent::Button(b) => &b.chat,
        }
    }

    pub fn sender(&self) -> &UserInfo {
        match self {
            ResumeEvent::Reply(r) => &r.sender,
            ResumeEvent::Button(b) => &b.sender,
        }
    }
}

/// Pending continuations, keyed by correlation key.
///
/// All access goes through one async mutex; `try_consume` holds it across
/// the permission check so a register/consume pair can never interleave with
/// another event's register/consume on the same key.
pub struct DialogRegistry<S> {
    pending: Mutex<HashMap<CorrelationKey, Continuation<S>>>,
}

impl<S> Default for DialogRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> DialogRegistry<S> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Stores `continuation` under `key`. Last write wins: a second
    /// registration for the same key supersedes the first.
    pub async fn register(&self, key: CorrelationKey, continuation: Continuation<S>) {
        let mut pending = self.pending.lock().await;
        if pending.insert(key, continuation).is_some() {
            tracing::debug!(?key, "superseded pending continuation");
        }
    }

    /// Looks up `key` and, if present, evaluates the stored permission
    /// against the event's sender. Allow removes the entry and returns it;
    /// Deny leaves it pending.
    pub async fn try_consume(
        &self,
        key: CorrelationKey,
        chat: &ChatInfo,
        sender: &UserInfo,
        gate: &PermissionEvaluator,
    ) -> Result<ConsumeOutcome<S>> {
        let mut pending = self.pending.lock().await;

        let (permission, originator) = match pending.get(&key) {
            Some(c) => (c.permission, c.originator),
            None => return Ok(ConsumeOutcome::NotFound),
        };

        match gate.evaluate(permission, chat, sender, originator).await? {
            Decision::Deny => Ok(ConsumeOutcome::Denied),
            Decision::Allow => match pending.remove(&key) {
                Some(c) => Ok(ConsumeOutcome::Resumed(c)),
                None => Ok(ConsumeOutcome::NotFound),
            },
        }
    }

    /// Number of pending continuations. There is no TTL; abandoned wizards
    /// stay until the process restarts.
    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::{ChatId, MessageId};
    use crate::testutil::{group_chat, user, StubAdmins};

    fn prompt(chat: i64, msg: i32) -> MessageRef {
        MessageRef {
            chat_id: ChatId(chat),
            message_id: MessageId(msg),
        }
    }

    fn gate() -> PermissionEvaluator {
        PermissionEvaluator::new(Arc::new(StubAdmins::new(vec![])))
    }

    #[tokio::test]
    async fn matching_event_consumes_exactly_once() {
        let registry: DialogRegistry<&'static str> = DialogRegistry::new();
        let key = CorrelationKey::reply_to(prompt(1, 10));
        registry.register(key, Continuation::anyone("title")).await;

        let gate = gate();
        let first = registry
            .try_consume(key, &group_chat(1), &user(5), &gate)
            .await
            .unwrap();
        assert!(matches!(first, ConsumeOutcome::Resumed(c) if c.stage == "title"));

        // A second event under the same key falls through to "unhandled".
        let second = registry
            .try_consume(key, &group_chat(1), &user(5), &gate)
            .await
            .unwrap();
        assert!(matches!(second, ConsumeOutcome::NotFound));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn second_registration_supersedes_the_first() {
        let registry: DialogRegistry<&'static str> = DialogRegistry::new();
        let key = CorrelationKey::button_on(prompt(1, 10));
        registry.register(key, Continuation::anyone("old")).await;
        registry.register(key, Continuation::anyone("new")).await;
        assert_eq!(registry.len().await, 1);

        let gate = gate();
        let out = registry
            .try_consume(key, &group_chat(1), &user(5), &gate)
            .await
            .unwrap();
        assert!(matches!(out, ConsumeOutcome::Resumed(c) if c.stage == "new"));
    }

    #[tokio::test]
    async fn same_user_denial_keeps_continuation_consumable_by_owner() {
        let registry: DialogRegistry<&'static str> = DialogRegistry::new();
        let key = CorrelationKey::button_on(prompt(1, 10));
        registry
            .register(key, Continuation::same_user("pick", UserId(1001)))
            .await;

        let gate = gate();
        let stranger = registry
            .try_consume(key, &group_chat(1), &user(1002), &gate)
            .await
            .unwrap();
        assert!(matches!(stranger, ConsumeOutcome::Denied));
        assert_eq!(registry.len().await, 1);

        let owner = registry
            .try_consume(key, &group_chat(1), &user(1001), &gate)
            .await
            .unwrap();
        assert!(matches!(owner, ConsumeOutcome::Resumed(_)));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn distinct_prompts_hold_independent_continuations() {
        let registry: DialogRegistry<&'static str> = DialogRegistry::new();
        let key_a = CorrelationKey::reply_to(prompt(1, 10));
        let key_b = CorrelationKey::reply_to(prompt(1, 11));
        registry.register(key_a, Continuation::anyone("a")).await;
        registry.register(key_b, Continuation::anyone("b")).await;

        let gate = gate();
        let out = registry
            .try_consume(key_b, &group_chat(1), &user(5), &gate)
            .await
            .unwrap();
        assert!(matches!(out, ConsumeOutcome::Resumed(c) if c.stage == "b"));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn reply_and_button_keys_do_not_collide() {
        let registry: DialogRegistry<&'static str> = DialogRegistry::new();
        registry
            .register(
                CorrelationKey::reply_to(prompt(1, 10)),
                Continuation::anyone("reply"),
            )
            .await;

        let gate = gate();
        let out = registry
            .try_consume(
                CorrelationKey::button_on(prompt(1, 10)),
                &group_chat(1),
                &user(5),
                &gate,
            )
            .await
            .unwrap();
        assert!(matches!(out, ConsumeOutcome::NotFound));
    }
}
