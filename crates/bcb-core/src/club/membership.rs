//! Joining and quitting group reads.

use super::{parse_id, ClubBot, WizardStage};
use crate::{
    domain::{AssignmentId, ParticipationId},
    messaging::types::{ButtonPress, CommandEvent, InlineButton, InlineKeyboard},
    Result,
};

const PICK_CANCEL: &str = "CANCEL";

impl ClubBot {
    pub(super) async fn join_book(&self, event: CommandEvent) -> Result<()> {
        let current = self.store.current_assignments(event.chat.id).await?;
        if current.is_empty() {
            self.messenger
                .reply_text(
                    event.chat.id,
                    event.message_id,
                    "No book is currently being read.",
                )
                .await?;
            return Ok(());
        }

        let joined: Vec<AssignmentId> = self
            .store
            .active_participation(event.sender.id, Some(event.chat.id))
            .await?
            .into_iter()
            .map(|p| p.assignment.id)
            .collect();
        let candidates: Vec<_> = current
            .into_iter()
            .filter(|v| !joined.contains(&v.assignment.id))
            .collect();

        match candidates.as_slice() {
            [] => {
                self.messenger
                    .reply_text(
                        event.chat.id,
                        event.message_id,
                        "You have already joined every current book.",
                    )
                    .await?;
                Ok(())
            }
            [only] => {
                self.store
                    .join_book(event.sender.id, only.assignment.id)
                    .await?;
                self.messenger
                    .reply_text(
                        event.chat.id,
                        event.message_id,
                        &format!("You joined {}!", only.friendly_name()),
                    )
                    .await?;
                Ok(())
            }
            _ => {
                self.ask(
                    &event.chat,
                    Some(event.message_id),
                    "Which book do you want to join?",
                    self.assignment_keyboard(&candidates),
                    WizardStage::JoinPick,
                    event.sender.id,
                )
                .await
            }
        }
    }

    pub(super) async fn join_pick(&self, press: ButtonPress) -> Result<()> {
        let Some(id) = parse_id(&press.data) else {
            tracing::warn!(data = %press.data, "unrecognized join pick");
            return Ok(());
        };
        let Some(view) = self
            .assignment_or_note(AssignmentId(id), press.prompt)
            .await?
        else {
            return Ok(());
        };
        self.store
            .join_book(press.sender.id, view.assignment.id)
            .await?;
        self.messenger
            .edit_text(
                press.prompt,
                &format!("You joined {}!", view.friendly_name()),
            )
            .await
    }

    /// In a group this lists the books of that chat; invoked privately it
    /// spans every chat the user reads in.
    pub(super) async fn quit_book(&self, event: CommandEvent) -> Result<()> {
        let chat_filter = event.chat.kind.is_group_like().then_some(event.chat.id);
        let parts = self
            .store
            .active_participation(event.sender.id, chat_filter)
            .await?;
        if parts.is_empty() {
            self.messenger
                .reply_text(
                    event.chat.id,
                    event.message_id,
                    "You are not reading anything right now.",
                )
                .await?;
            return Ok(());
        }

        let mut keyboard = InlineKeyboard::one_per_row(
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
        keyboard = keyboard.row(vec![InlineButton::new("Cancel", PICK_CANCEL)]);

        self.ask(
            &event.chat,
            Some(event.message_id),
            "Which book do you want to quit?",
            keyboard,
            WizardStage::QuitPick,
            event.sender.id,
        )
        .await
    }

    pub(super) async fn quit_pick(&self, press: ButtonPress) -> Result<()> {
        if press.data == PICK_CANCEL {
            return self.messenger.edit_text(press.prompt, "Cancelled.").await;
        }
        let Some(id) = parse_id(&press.data) else {
            tracing::warn!(data = %press.data, "unrecognized quit pick");
            return Ok(());
        };
        let text = match self.store.quit_book(ParticipationId(id)).await? {
            Some(view) => format!("You quit {}.", view.friendly_name()),
            None => "You already quit that one.".to_string(),
        };
        self.messenger.edit_text(press.prompt, &text).await
    }
}
