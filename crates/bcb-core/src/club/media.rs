//! Attaching ebook/audiobook files to a book.
//!
//! The bot never stores the file itself; it remembers the id of the chat
//! message carrying it and forwards that message on request.

use super::{parse_id, ClubBot, WizardStage};
use crate::{
    domain::{AssignmentId, MessageId, UserId},
    messaging::types::{ButtonPress, ChatInfo, CommandEvent, PlainReply},
    store::MediaKind,
    Result,
};

impl ClubBot {
    pub(super) async fn register_media(&self, event: CommandEvent, kind: MediaKind) -> Result<()> {
        let open = self.store.open_assignments(event.chat.id).await?;
        match open.as_slice() {
            [] => {
                self.messenger
                    .reply_text(
                        event.chat.id,
                        event.message_id,
                        &format!("There are no books to attach an {} to.", kind.noun()),
                    )
                    .await?;
                Ok(())
            }
            [only] => {
                self.prompt_for_file(
                    &event.chat,
                    event.sender.id,
                    event.message_id,
                    kind,
                    only.assignment.id,
                    &only.friendly_name(),
                )
                .await
            }
            _ => {
                self.ask(
                    &event.chat,
                    Some(event.message_id),
                    &format!("Which book is the {} for?", kind.noun()),
                    self.assignment_keyboard(&open),
                    WizardStage::RegisterMediaPick { kind },
                    event.sender.id,
                )
                .await
            }
        }
    }

    pub(super) async fn register_media_pick(
        &self,
        kind: MediaKind,
        press: ButtonPress,
    ) -> Result<()> {
        let Some(id) = parse_id(&press.data) else {
            tracing::warn!(data = %press.data, "unrecognized media pick");
            return Ok(());
        };
        let Some(view) = self
            .assignment_or_note(AssignmentId(id), press.prompt)
            .await?
        else {
            return Ok(());
        };
        self.prompt_for_file(
            &press.chat,
            press.sender.id,
            press.prompt.message_id,
            kind,
            view.assignment.id,
            &view.friendly_name(),
        )
        .await
    }

    async fn prompt_for_file(
        &self,
        chat: &ChatInfo,
        originator: UserId,
        reply_to: MessageId,
        kind: MediaKind,
        assignment: AssignmentId,
        friendly: &str,
    ) -> Result<()> {
        self.prompt(
            chat,
            reply_to,
            &format!("Reply to this message with the {} for {friendly}.", kind.noun()),
            WizardStage::RegisterMediaFile { kind, assignment },
            originator,
        )
        .await
    }

    /// The reply itself is the media message; only its id is stored.
    pub(super) async fn register_media_file(
        &self,
        kind: MediaKind,
        assignment: AssignmentId,
        reply: PlainReply,
    ) -> Result<()> {
        let Some(view) = self.store.assignment(assignment).await? else {
            self.messenger
                .reply_text(
                    reply.chat.id,
                    reply.message_id,
                    "That book is no longer on the list.",
                )
                .await?;
            return Ok(());
        };
        self.store
            .set_media_message(assignment, kind, Some(reply.message_id))
            .await?;
        self.messenger
            .reply_text(
                reply.chat.id,
                reply.message_id,
                &format!("Saved the {} for {}.", kind.noun(), view.friendly_name()),
            )
            .await?;
        Ok(())
    }
}
