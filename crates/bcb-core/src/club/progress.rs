//! Recording and reporting reading progress.

use std::fmt::Write as _;

use super::{parse_id, ClubBot, WizardStage};
use crate::{
    domain::{AssignmentId, ParticipationId},
    errors::Error,
    messaging::types::{ButtonPress, CommandEvent, InlineButton, InlineKeyboard, PlainReply},
    store::AssignmentView,
    Result,
};

const PROGRESS_QUESTION: &str = "How far along are you? (a number)";

impl ClubBot {
    pub(super) async fn set_progress(&self, event: CommandEvent) -> Result<()> {
        let args = event.args.trim();
        let progress = if args.is_empty() {
            None
        } else {
            match args.parse::<i64>() {
                Ok(p) => Some(p),
                Err(_) => {
                    self.messenger
                        .reply_text(
                            event.chat.id,
                            event.message_id,
                            "That doesn't look like a number.",
                        )
                        .await?;
                    return Ok(());
                }
            }
        };

        let chat_filter = event.chat.kind.is_group_like().then_some(event.chat.id);
        let parts = self
            .store
            .active_participation(event.sender.id, chat_filter)
            .await?;
        match parts.as_slice() {
            [] => {
                self.messenger
                    .reply_text(
                        event.chat.id,
                        event.message_id,
                        "Join a book first with /join_book.",
                    )
                    .await?;
                Ok(())
            }
            [only] => match progress {
                Some(p) => {
                    let text = self
                        .record_with_feedback(only.participation.id, p, &only.friendly_name())
                        .await?;
                    self.messenger
                        .reply_text(event.chat.id, event.message_id, &text)
                        .await?;
                    Ok(())
                }
                None => {
                    self.prompt(
                        &event.chat,
                        event.message_id,
                        PROGRESS_QUESTION,
                        WizardStage::ProgressValue {
                            participation: only.participation.id,
                        },
                        event.sender.id,
                    )
                    .await
                }
            },
            _ => {
                let keyboard = InlineKeyboard::one_per_row(
                    parts
                        .iter()
                        .map(|p| {
                            InlineButton::new(
                                self.truncate_label(&p.friendly_name()),
                                p.participation.id.0.to_string(),
                            )
                        })
                        .collect(),
                );
                self.ask(
                    &event.chat,
                    Some(event.message_id),
                    "Which book is this for?",
                    keyboard,
                    WizardStage::ProgressPickBook { progress },
                    event.sender.id,
                )
                .await
            }
        }
    }

    pub(super) async fn progress_pick_book(
        &self,
        progress: Option<i64>,
        press: ButtonPress,
    ) -> Result<()> {
        let Some(id) = parse_id(&press.data) else {
            tracing::warn!(data = %press.data, "unrecognized progress pick");
            return Ok(());
        };
        let Some(view) = self.store.participation(ParticipationId(id)).await? else {
            return self
                .messenger
                .edit_text(press.prompt, "That book is no longer on your list.")
                .await;
        };
        match progress {
            Some(p) => {
                let text = self
                    .record_with_feedback(view.participation.id, p, &view.friendly_name())
                    .await?;
                self.messenger.edit_text(press.prompt, &text).await
            }
            None => {
                self.prompt(
                    &press.chat,
                    press.prompt.message_id,
                    PROGRESS_QUESTION,
                    WizardStage::ProgressValue {
                        participation: view.participation.id,
                    },
                    press.sender.id,
                )
                .await
            }
        }
    }

    pub(super) async fn progress_value(
        &self,
        participation: ParticipationId,
        reply: PlainReply,
    ) -> Result<()> {
        let Ok(progress) = reply.text.trim().parse::<i64>() else {
            return self
                .reprompt(
                    &reply.chat,
                    reply.message_id,
                    PROGRESS_QUESTION,
                    WizardStage::ProgressValue { participation },
                    reply.sender.id,
                )
                .await;
        };
        let Some(view) = self.store.participation(participation).await? else {
            self.messenger
                .reply_text(
                    reply.chat.id,
                    reply.message_id,
                    "That book is no longer on your list.",
                )
                .await?;
            return Ok(());
        };
        match self.record(participation, progress, &view.friendly_name()).await {
            Ok(text) => {
                self.messenger
                    .reply_text(reply.chat.id, reply.message_id, &text)
                    .await?;
                Ok(())
            }
            // Out-of-range values re-ask instead of killing the wizard.
            Err(Error::Store(_)) => {
                self.reprompt(
                    &reply.chat,
                    reply.message_id,
                    PROGRESS_QUESTION,
                    WizardStage::ProgressValue { participation },
                    reply.sender.id,
                )
                .await
            }
            Err(err) => Err(err),
        }
    }

    async fn record(
        &self,
        participation: ParticipationId,
        progress: i64,
        friendly: &str,
    ) -> Result<String> {
        let update = self.store.record_progress(participation, progress).await?;
        Ok(format!(
            "Progress for {friendly} set to {}.",
            update.progress
        ))
    }

    /// Like [`Self::record`], but a rejected value becomes a user-facing
    /// message instead of an error. Used where there is no prompt to re-ask
    /// through (the value arrived as a command argument).
    async fn record_with_feedback(
        &self,
        participation: ParticipationId,
        progress: i64,
        friendly: &str,
    ) -> Result<String> {
        match self.record(participation, progress, friendly).await {
            Ok(text) => Ok(text),
            Err(Error::Store(_)) => Ok(
                "Sorry, there was an error processing your answer. \
                 The number may be too large or invalid."
                    .to_string(),
            ),
            Err(err) => Err(err),
        }
    }

    pub(super) async fn get_progress(&self, event: CommandEvent) -> Result<()> {
        let verbose = event.args.split_whitespace().any(|a| a == "-v");
        let current = self.store.current_assignments(event.chat.id).await?;
        match current.as_slice() {
            [] => {
                self.messenger
                    .reply_text(
                        event.chat.id,
                        event.message_id,
                        "No book is currently being read.",
                    )
                    .await?;
                Ok(())
            }
            [only] => {
                let report = self.progress_report_text(only, verbose).await?;
                self.messenger
                    .reply_text(event.chat.id, event.message_id, &report)
                    .await?;
                Ok(())
            }
            _ => {
                self.ask(
                    &event.chat,
                    Some(event.message_id),
                    "Progress on which book?",
                    self.assignment_keyboard(&current),
                    WizardStage::GetProgressPick { verbose },
                    event.sender.id,
                )
                .await
            }
        }
    }

    pub(super) async fn get_progress_pick(&self, verbose: bool, press: ButtonPress) -> Result<()> {
        let Some(id) = parse_id(&press.data) else {
            tracing::warn!(data = %press.data, "unrecognized progress-report pick");
            return Ok(());
        };
        let Some(view) = self
            .assignment_or_note(AssignmentId(id), press.prompt)
            .await?
        else {
            return Ok(());
        };
        let report = self.progress_report_text(&view, verbose).await?;
        self.messenger.edit_text(press.prompt, &report).await
    }

    /// Latest update per active participant, highest progress first, headed
    /// by the current deadline when one is set.
    async fn progress_report_text(&self, view: &AssignmentView, verbose: bool) -> Result<String> {
        let mut text = view.friendly_name();
        if let Some(schedule) = self.store.latest_schedule(view.assignment.id).await? {
            let _ = write!(
                text,
                "\nDeadline: reach {} by {}",
                schedule.end,
                self.format_due(schedule.due_date)
            );
        }
        let entries = self.store.progress_report(view.assignment.id).await?;
        if entries.is_empty() {
            text.push_str("\nNo progress reported yet.");
            return Ok(text);
        }
        for entry in entries {
            let _ = write!(text, "\n{}: {}", entry.user.display_name(), entry.progress);
            if verbose {
                let _ = write!(text, " ({})", self.format_due(entry.update_date));
            }
        }
        Ok(text)
    }
}
