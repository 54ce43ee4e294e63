//! Event router: classifies each inbound event and hands it to either a
//! registered command or a pending continuation.
//!
//! Per event the pipeline is: upsert chat/user metadata, then route. Button
//! presses and plain replies are offered to the [`DialogRegistry`] first;
//! commands go through the [`CommandRegistry`] and the permission gate.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;

use crate::{
    dialog::{ConsumeOutcome, CorrelationKey, DialogRegistry, ResumeEvent},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ButtonPress, CommandEvent, InboundEvent, InlineQueryEvent, PlainReply},
    },
    permissions::{Decision, Permission, PermissionEvaluator},
    store::Store,
    Result,
};

/// A registered command: required permission plus the application-side
/// command tag the handlers match on.
#[derive(Clone, Copy, Debug)]
pub struct CommandSpec<C> {
    pub permission: Permission,
    pub command: C,
}

/// Exact-match command table, populated once at startup.
pub struct CommandRegistry<C> {
    commands: HashMap<String, CommandSpec<C>>,
}

impl<C> Default for CommandRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CommandRegistry<C> {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers a command. `SameUser` only makes sense when consuming a
    /// continuation, so declaring it on a command fails fast here.
    pub fn register(&mut self, name: &str, permission: Permission, command: C) -> Result<()> {
        if permission == Permission::SameUser {
            return Err(Error::Config(format!(
                "command /{name}: SameUser permission is only valid for continuations"
            )));
        }
        if self.commands.contains_key(name) {
            return Err(Error::Config(format!("command /{name} registered twice")));
        }
        self.commands.insert(
            name.to_string(),
            CommandSpec {
                permission,
                command,
            },
        );
        Ok(())
    }

    /// Case-sensitive exact match; `@botname` suffixes are already stripped
    /// by the adapter when the event is parsed.
    pub fn get(&self, name: &str) -> Option<&CommandSpec<C>> {
        self.commands.get(name)
    }
}

/// Application hooks the dispatcher routes into. One uniform signature per
/// event class; the application matches on its own command/stage enums.
#[async_trait]
pub trait EventHandlers: Send + Sync {
    type Command: Copy + Send + Sync;
    type Stage: Send + Sync;

    async fn run_command(&self, command: Self::Command, event: CommandEvent) -> Result<()>;
    async fn resume(&self, stage: Self::Stage, event: ResumeEvent) -> Result<()>;
    async fn inline_query(&self, _query: InlineQueryEvent) -> Result<()> {
        Ok(())
    }
}

pub struct Dispatcher<H: EventHandlers> {
    handlers: Arc<H>,
    commands: CommandRegistry<H::Command>,
    dialogs: Arc<DialogRegistry<H::Stage>>,
    gate: PermissionEvaluator,
    store: Arc<dyn Store>,
    messenger: Arc<dyn MessagingPort>,
}

impl<H: EventHandlers> Dispatcher<H> {
    pub fn new(
        handlers: Arc<H>,
        commands: CommandRegistry<H::Command>,
        dialogs: Arc<DialogRegistry<H::Stage>>,
        gate: PermissionEvaluator,
        store: Arc<dyn Store>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            handlers,
            commands,
            dialogs,
            gate,
            store,
            messenger,
        }
    }

    /// Routes one event. Errors returned here are per-event; the polling
    /// loop logs them and keeps running.
    pub async fn dispatch(&self, event: InboundEvent) -> Result<()> {
        self.upsert_metadata(&event).await?;

        match event {
            InboundEvent::Button(press) => self.dispatch_button(press).await,
            InboundEvent::Reply(reply) => self.dispatch_reply(reply).await,
            InboundEvent::Command(cmd) => self.dispatch_command(cmd).await,
            InboundEvent::Inline(query) => self.handlers.inline_query(query).await,
        }
    }

    /// Identity records are upserted before any routing so permission checks
    /// and handlers can rely on them existing. Private chats are not stored,
    /// only group-like ones.
    async fn upsert_metadata(&self, event: &InboundEvent) -> Result<()> {
        let (chat, sender) = match event {
            InboundEvent::Command(e) => (Some(&e.chat), &e.sender),
            InboundEvent::Reply(e) => (Some(&e.chat), &e.sender),
            InboundEvent::Button(e) => (Some(&e.chat), &e.sender),
            InboundEvent::Inline(e) => (None, &e.sender),
        };
        if let Some(chat) = chat {
            if chat.kind.is_group_like() {
                self.store.upsert_chat(chat).await?;
            }
        }
        self.store.upsert_user(sender).await
    }

    async fn dispatch_button(&self, press: ButtonPress) -> Result<()> {
        let key = CorrelationKey::button_on(press.prompt);
        let outcome = self
            .dialogs
            .try_consume(key, &press.chat, &press.sender, &self.gate)
            .await?;

        // The client shows a spinner until the callback is answered, so ack
        // every press, including denied and stray ones (silently: denials
        // must not reveal which conversations exist). The continuation is
        // already consumed at this point, so a failed ack must not abort the
        // resume.
        if let Err(err) = self
            .messenger
            .answer_callback(&press.callback_id, None)
            .await
        {
            tracing::warn!(%err, "failed to acknowledge button press");
        }

        match outcome {
            ConsumeOutcome::Resumed(cont) => {
                self.handlers
                    .resume(cont.stage, ResumeEvent::Button(press))
                    .await
            }
            ConsumeOutcome::Denied => {
                tracing::debug!(user = press.sender.id.0, "button press denied");
                Ok(())
            }
            ConsumeOutcome::NotFound => {
                tracing::debug!(data = %press.data, "stray button press");
                Ok(())
            }
        }
    }

    async fn dispatch_reply(&self, reply: PlainReply) -> Result<()> {
        let key = CorrelationKey::reply_to(crate::domain::MessageRef {
            chat_id: reply.chat.id,
            message_id: reply.in_reply_to,
        });
        let outcome = self
            .dialogs
            .try_consume(key, &reply.chat, &reply.sender, &self.gate)
            .await?;

        match outcome {
            ConsumeOutcome::Resumed(cont) => {
                self.handlers
                    .resume(cont.stage, ResumeEvent::Reply(reply))
                    .await
            }
            // Not every reply is conversational; drop without feedback.
            ConsumeOutcome::Denied | ConsumeOutcome::NotFound => Ok(()),
        }
    }

    async fn dispatch_command(&self, cmd: CommandEvent) -> Result<()> {
        let Some(spec) = self.commands.get(&cmd.name) else {
            self.messenger
                .reply_text(cmd.chat.id, cmd.message_id, "Unknown command.")
                .await?;
            return Ok(());
        };
        let spec = *spec;

        match self
            .gate
            .evaluate(spec.permission, &cmd.chat, &cmd.sender, None)
            .await?
        {
            Decision::Deny => {
                self.messenger
                    .reply_text(
                        cmd.chat.id,
                        cmd.message_id,
                        "You need to be a chat administrator to do that.",
                    )
                    .await?;
                Ok(())
            }
            Decision::Allow => self.handlers.run_command(spec.command, cmd).await,
        }
    }
}
