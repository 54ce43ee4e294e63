//! Reading deadlines: setting them and showing the current one.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::{parse_id, ClubBot, WizardStage};
use crate::{
    domain::{AssignmentId, MessageId, UserId},
    messaging::types::{ButtonPress, ChatInfo, CommandEvent, PlainReply},
    store::AssignmentView,
    Result,
};

const DATE_QUESTION: &str = "When is the deadline? (YYYY-MM-DD or YYYY-MM-DD HH:MM)";
const TARGET_QUESTION: &str = "Read up to where by then? (a number)";

impl ClubBot {
    pub(super) async fn set_deadline(&self, event: CommandEvent) -> Result<()> {
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
                self.prompt_date(&event.chat, event.sender.id, event.message_id, only.assignment.id)
                    .await
            }
            _ => {
                self.ask(
                    &event.chat,
                    Some(event.message_id),
                    "Set a deadline for which book?",
                    self.assignment_keyboard(&current),
                    WizardStage::DeadlinePickBook,
                    event.sender.id,
                )
                .await
            }
        }
    }

    pub(super) async fn deadline_pick(&self, press: ButtonPress) -> Result<()> {
        let Some(id) = parse_id(&press.data) else {
            tracing::warn!(data = %press.data, "unrecognized deadline pick");
            return Ok(());
        };
        let Some(view) = self
            .assignment_or_note(AssignmentId(id), press.prompt)
            .await?
        else {
            return Ok(());
        };
        self.prompt_date(
            &press.chat,
            press.sender.id,
            press.prompt.message_id,
            view.assignment.id,
        )
        .await
    }

    async fn prompt_date(
        &self,
        chat: &ChatInfo,
        originator: UserId,
        reply_to: MessageId,
        assignment: AssignmentId,
    ) -> Result<()> {
        self.prompt(
            chat,
            reply_to,
            DATE_QUESTION,
            WizardStage::DeadlineDate { assignment },
            originator,
        )
        .await
    }

    pub(super) async fn deadline_date(
        &self,
        assignment: AssignmentId,
        reply: PlainReply,
    ) -> Result<()> {
        let Some(due) = self.parse_deadline(&reply.text) else {
            return self
                .reprompt(
                    &reply.chat,
                    reply.message_id,
                    DATE_QUESTION,
                    WizardStage::DeadlineDate { assignment },
                    reply.sender.id,
                )
                .await;
        };
        self.prompt(
            &reply.chat,
            reply.message_id,
            TARGET_QUESTION,
            WizardStage::DeadlineTarget { assignment, due },
            reply.sender.id,
        )
        .await
    }

    pub(super) async fn deadline_target(
        &self,
        assignment: AssignmentId,
        due: DateTime<Utc>,
        reply: PlainReply,
    ) -> Result<()> {
        let Ok(end) = reply.text.trim().parse::<i64>() else {
            return self
                .reprompt(
                    &reply.chat,
                    reply.message_id,
                    TARGET_QUESTION,
                    WizardStage::DeadlineTarget { assignment, due },
                    reply.sender.id,
                )
                .await;
        };
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
        let schedule = self.store.add_schedule(assignment, due, end).await?;
        self.messenger
            .reply_text(
                reply.chat.id,
                reply.message_id,
                &format!(
                    "Deadline for {}: reach {} by {}.",
                    view.friendly_name(),
                    schedule.end,
                    self.format_due(schedule.due_date)
                ),
            )
            .await?;
        Ok(())
    }

    pub(super) async fn get_deadline(&self, event: CommandEvent) -> Result<()> {
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
                let text = self.deadline_text(only).await?;
                self.messenger
                    .reply_text(event.chat.id, event.message_id, &text)
                    .await?;
                Ok(())
            }
            _ => {
                self.ask(
                    &event.chat,
                    Some(event.message_id),
                    "Deadline for which book?",
                    self.assignment_keyboard(&current),
                    WizardStage::DeadlineShowPick,
                    event.sender.id,
                )
                .await
            }
        }
    }

    pub(super) async fn deadline_show_pick(&self, press: ButtonPress) -> Result<()> {
        let Some(id) = parse_id(&press.data) else {
            tracing::warn!(data = %press.data, "unrecognized deadline pick");
            return Ok(());
        };
        let Some(view) = self
            .assignment_or_note(AssignmentId(id), press.prompt)
            .await?
        else {
            return Ok(());
        };
        let text = self.deadline_text(&view).await?;
        self.messenger.edit_text(press.prompt, &text).await
    }

    async fn deadline_text(&self, view: &AssignmentView) -> Result<String> {
        Ok(match self.store.latest_schedule(view.assignment.id).await? {
            Some(schedule) => format!(
                "Deadline for {}: reach {} by {}.",
                view.friendly_name(),
                schedule.end,
                self.format_due(schedule.due_date)
            ),
            None => format!("No deadline set for {}.", view.friendly_name()),
        })
    }

    /// A bare date means end of that day; both forms are interpreted in the
    /// configured UTC offset.
    fn parse_deadline(&self, text: &str) -> Option<DateTime<Utc>> {
        let text = text.trim();
        let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M")
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(23, 59, 0))
            })?;
        Some(
            naive
                .and_local_timezone(self.deadline_offset)
                .single()?
                .with_timezone(&Utc),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Timelike;

    use super::*;
    use crate::club::ClubBot;
    use crate::dialog::DialogRegistry;
    use crate::store::MemStore;
    use crate::testutil::MockMessenger;

    fn bot(offset_hours: i32) -> ClubBot {
        ClubBot::new(
            Arc::new(MemStore::new()),
            Arc::new(MockMessenger::new()),
            Arc::new(DialogRegistry::new()),
            None,
            30,
            offset_hours,
        )
        .unwrap()
    }

    #[test]
    fn parses_date_with_time() {
        let bot = bot(0);
        let due = bot.parse_deadline("2026-09-01 18:30").unwrap();
        assert_eq!(due.hour(), 18);
        assert_eq!(due.minute(), 30);
    }

    #[test]
    fn bare_date_means_end_of_day() {
        let bot = bot(0);
        let due = bot.parse_deadline("2026-09-01").unwrap();
        assert_eq!(due.hour(), 23);
        assert_eq!(due.minute(), 59);
    }

    #[test]
    fn offset_shifts_into_utc() {
        let bot = bot(2);
        let due = bot.parse_deadline("2026-09-01 18:30").unwrap();
        assert_eq!(due.hour(), 16);
    }

    #[test]
    fn rejects_garbage() {
        let bot = bot(0);
        assert!(bot.parse_deadline("next tuesday").is_none());
        assert!(bot.parse_deadline("").is_none());
    }
}
