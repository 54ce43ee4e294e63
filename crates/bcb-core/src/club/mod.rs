//! Book-club commands and their multi-step wizards.
//!
//! Every handler works against the core ports ([`Store`], [`MessagingPort`],
//! [`BookSearch`]) and the shared [`DialogRegistry`], so the whole module is
//! testable without a live transport. A wizard step sends a prompt (force
//! reply or inline keyboard), registers a [`WizardStage`] continuation keyed
//! to that prompt, and returns; the dispatcher resumes it when the answer
//! arrives.

mod books;
mod media;
mod membership;
mod progress;
mod schedule;
mod stage;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};

use crate::{
    dialog::{Continuation, CorrelationKey, DialogRegistry, ResumeEvent},
    dispatch::{CommandRegistry, EventHandlers},
    domain::{AssignmentId, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatInfo, CommandEvent, InlineButton, InlineKeyboard},
    },
    metadata::BookSearch,
    permissions::Permission,
    store::{AssignmentView, Store},
    Result,
};

pub use stage::WizardStage;

/// Tags for the registered commands; the dispatcher hands the matched tag
/// back to [`ClubBot::run_command`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClubCommand {
    AddBook,
    StartBook,
    RegisterEbook,
    RegisterAudiobook,
    SetDeadline,
    GetBook,
    JoinBook,
    QuitBook,
    SetProgress,
    GetProgress,
    GetDeadline,
}

/// Registers the full command table: five admin commands, six open to
/// everyone.
pub fn register_commands(registry: &mut CommandRegistry<ClubCommand>) -> Result<()> {
    use ClubCommand::*;
    use Permission::*;

    registry.register("add_book", ChatAdmin, AddBook)?;
    registry.register("start_book", ChatAdmin, StartBook)?;
    registry.register("register_ebook", ChatAdmin, RegisterEbook)?;
    registry.register("register_audiobook", ChatAdmin, RegisterAudiobook)?;
    registry.register("set_deadline", ChatAdmin, SetDeadline)?;
    registry.register("get_book", Anyone, GetBook)?;
    registry.register("join_book", Anyone, JoinBook)?;
    registry.register("quit_book", Anyone, QuitBook)?;
    registry.register("set_progress", Anyone, SetProgress)?;
    registry.register("get_progress", Anyone, GetProgress)?;
    registry.register("get_deadline", Anyone, GetDeadline)?;
    Ok(())
}

pub struct ClubBot {
    store: Arc<dyn Store>,
    messenger: Arc<dyn MessagingPort>,
    dialogs: Arc<DialogRegistry<WizardStage>>,
    search: Option<Arc<dyn BookSearch>>,
    button_label_max: usize,
    deadline_offset: FixedOffset,
}

impl ClubBot {
    pub fn new(
        store: Arc<dyn Store>,
        messenger: Arc<dyn MessagingPort>,
        dialogs: Arc<DialogRegistry<WizardStage>>,
        search: Option<Arc<dyn BookSearch>>,
        button_label_max: usize,
        deadline_offset_hours: i32,
    ) -> Result<Self> {
        let deadline_offset = FixedOffset::east_opt(deadline_offset_hours * 3600)
            .ok_or_else(|| {
                Error::Config(format!(
                    "DEADLINE_UTC_OFFSET out of range: {deadline_offset_hours}"
                ))
            })?;
        Ok(Self {
            store,
            messenger,
            dialogs,
            search,
            button_label_max,
            deadline_offset,
        })
    }

    /// Sends a force-reply prompt and suspends `stage` on it, bound to
    /// `originator`.
    async fn prompt(
        &self,
        chat: &ChatInfo,
        reply_to: MessageId,
        text: &str,
        stage: WizardStage,
        originator: UserId,
    ) -> Result<()> {
        let msg = self.messenger.prompt_reply(chat.id, reply_to, text).await?;
        self.dialogs
            .register(
                CorrelationKey::reply_to(msg),
                Continuation::same_user(stage, originator),
            )
            .await;
        Ok(())
    }

    /// Sends an inline keyboard and suspends `stage` on it.
    async fn ask(
        &self,
        chat: &ChatInfo,
        reply_to: Option<MessageId>,
        text: &str,
        keyboard: InlineKeyboard,
        stage: WizardStage,
        originator: UserId,
    ) -> Result<()> {
        let msg = self
            .messenger
            .send_keyboard(chat.id, reply_to, text, keyboard)
            .await?;
        self.dialogs
            .register(
                CorrelationKey::button_on(msg),
                Continuation::same_user(stage, originator),
            )
            .await;
        Ok(())
    }

    /// Edits an existing keyboard message in place and re-suspends `stage`
    /// on it (used for keyboard-to-keyboard transitions).
    async fn ask_again(
        &self,
        msg: MessageRef,
        text: &str,
        keyboard: InlineKeyboard,
        stage: WizardStage,
        originator: UserId,
    ) -> Result<()> {
        self.messenger.edit_keyboard(msg, text, keyboard).await?;
        self.dialogs
            .register(
                CorrelationKey::button_on(msg),
                Continuation::same_user(stage, originator),
            )
            .await;
        Ok(())
    }

    /// Tells the user their answer was unusable and re-asks the same
    /// question, keeping the wizard alive.
    async fn reprompt(
        &self,
        chat: &ChatInfo,
        reply_to: MessageId,
        question: &str,
        stage: WizardStage,
        originator: UserId,
    ) -> Result<()> {
        let text = format!("Sorry, there was an error processing your answer. {question}");
        self.prompt(chat, reply_to, &text, stage, originator).await
    }

    /// One button per assignment, labelled with the friendly name and
    /// carrying the assignment id as callback data.
    fn assignment_keyboard(&self, views: &[AssignmentView]) -> InlineKeyboard {
        InlineKeyboard::one_per_row(
            views
                .iter()
                .map(|v| {
                    InlineButton::new(
                        self.truncate_label(&v.friendly_name()),
                        v.assignment.id.0.to_string(),
                    )
                })
                .collect(),
        )
    }

    fn truncate_label(&self, label: &str) -> String {
        if label.chars().count() <= self.button_label_max {
            return label.to_string();
        }
        let mut out: String = label
            .chars()
            .take(self.button_label_max.saturating_sub(1))
            .collect();
        out.push('…');
        out
    }

    /// Looks up the assignment a button carried; a vanished assignment edits
    /// the prompt and ends the wizard.
    async fn assignment_or_note(
        &self,
        id: AssignmentId,
        prompt: MessageRef,
    ) -> Result<Option<AssignmentView>> {
        match self.store.assignment(id).await? {
            Some(view) => Ok(Some(view)),
            None => {
                self.messenger
                    .edit_text(prompt, "That book is no longer on the list.")
                    .await?;
                Ok(None)
            }
        }
    }

    fn format_due(&self, due: DateTime<Utc>) -> String {
        due.with_timezone(&self.deadline_offset)
            .format("%Y-%m-%d %H:%M")
            .to_string()
    }
}

fn parse_id(data: &str) -> Option<i64> {
    data.parse().ok()
}

#[async_trait]
impl EventHandlers for ClubBot {
    type Command = ClubCommand;
    type Stage = WizardStage;

    async fn run_command(&self, command: ClubCommand, event: CommandEvent) -> Result<()> {
        match command {
            ClubCommand::AddBook => self.add_book(event).await,
            ClubCommand::StartBook => self.start_book(event).await,
            ClubCommand::RegisterEbook => {
                self.register_media(event, crate::store::MediaKind::Ebook).await
            }
            ClubCommand::RegisterAudiobook => {
                self.register_media(event, crate::store::MediaKind::Audiobook)
                    .await
            }
            ClubCommand::SetDeadline => self.set_deadline(event).await,
            ClubCommand::GetBook => self.get_book(event).await,
            ClubCommand::JoinBook => self.join_book(event).await,
            ClubCommand::QuitBook => self.quit_book(event).await,
            ClubCommand::SetProgress => self.set_progress(event).await,
            ClubCommand::GetProgress => self.get_progress(event).await,
            ClubCommand::GetDeadline => self.get_deadline(event).await,
        }
    }

    async fn resume(&self, stage: WizardStage, event: ResumeEvent) -> Result<()> {
        use WizardStage::*;
        match (stage, event) {
            (AddBookTitle, ResumeEvent::Reply(reply)) => self.add_book_title(reply).await,
            (AddBookPick { query }, ResumeEvent::Button(press)) => {
                self.add_book_pick(query, press).await
            }
            (AddBookAuthor { title }, ResumeEvent::Reply(reply)) => {
                self.add_book_author(title, reply).await
            }
            (StartBookPick, ResumeEvent::Button(press)) => self.start_book_pick(press).await,
            (RegisterMediaPick { kind }, ResumeEvent::Button(press)) => {
                self.register_media_pick(kind, press).await
            }
            (RegisterMediaFile { kind, assignment }, ResumeEvent::Reply(reply)) => {
                self.register_media_file(kind, assignment, reply).await
            }
            (DeadlinePickBook, ResumeEvent::Button(press)) => self.deadline_pick(press).await,
            (DeadlineDate { assignment }, ResumeEvent::Reply(reply)) => {
                self.deadline_date(assignment, reply).await
            }
            (DeadlineTarget { assignment, due }, ResumeEvent::Reply(reply)) => {
                self.deadline_target(assignment, due, reply).await
            }
            (DeadlineShowPick, ResumeEvent::Button(press)) => {
                self.deadline_show_pick(press).await
            }
            (BookInfoPick, ResumeEvent::Button(press)) => self.book_info_pick(press).await,
            (BookInfoType { assignment }, ResumeEvent::Button(press)) => {
                self.book_info_type(assignment, press).await
            }
            (JoinPick, ResumeEvent::Button(press)) => self.join_pick(press).await,
            (QuitPick, ResumeEvent::Button(press)) => self.quit_pick(press).await,
            (ProgressPickBook { progress }, ResumeEvent::Button(press)) => {
                self.progress_pick_book(progress, press).await
            }
            (ProgressValue { participation }, ResumeEvent::Reply(reply)) => {
                self.progress_value(participation, reply).await
            }
            (GetProgressPick { verbose }, ResumeEvent::Button(press)) => {
                self.get_progress_pick(verbose, press).await
            }
            (stage, _) => {
                tracing::warn!(?stage, "continuation resumed with mismatched event kind");
                Ok(())
            }
        }
    }
}
