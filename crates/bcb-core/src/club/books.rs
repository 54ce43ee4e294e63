//! Adding books, starting a group read, and the book-info wizard.

use super::{parse_id, ClubBot, WizardStage};
use crate::{
    domain::{AssignmentId, ChatId, MessageId, UserId},
    errors::Error,
    messaging::types::{ButtonPress, ChatInfo, CommandEvent, InlineButton, InlineKeyboard, PlainReply},
    store::{AssignmentView, MediaKind, NewBook},
    Result,
};

/// Book fields gathered by either add-book branch, before the author row
/// exists.
struct BookDetails {
    title: String,
    isbn: Option<String>,
    metadata_id: Option<String>,
    thumb_url: Option<String>,
}

const PICK_RAW: &str = "RAW";
const PICK_CANCEL: &str = "CANCEL";
const INFO_DESCRIPTION: &str = "DESC";
const INFO_EBOOK: &str = "EBOOK";
const INFO_AUDIOBOOK: &str = "AUDIO";
const MAX_SEARCH_HITS: usize = 5;

impl ClubBot {
    pub(super) async fn add_book(&self, event: CommandEvent) -> Result<()> {
        let title = event.args.trim();
        if title.is_empty() {
            return self
                .prompt(
                    &event.chat,
                    event.message_id,
                    "Title of book to add?",
                    WizardStage::AddBookTitle,
                    event.sender.id,
                )
                .await;
        }
        self.begin_add_book(&event.chat, event.sender.id, event.message_id, title)
            .await
    }

    pub(super) async fn add_book_title(&self, reply: PlainReply) -> Result<()> {
        let title = reply.text.trim().to_string();
        if title.is_empty() {
            return self
                .reprompt(
                    &reply.chat,
                    reply.message_id,
                    "Title of book to add?",
                    WizardStage::AddBookTitle,
                    reply.sender.id,
                )
                .await;
        }
        self.begin_add_book(&reply.chat, reply.sender.id, reply.message_id, &title)
            .await
    }

    /// With a metadata client: show a pick keyboard of search hits. Without
    /// one (or when the search comes back empty) fall back to asking for the
    /// author directly.
    async fn begin_add_book(
        &self,
        chat: &ChatInfo,
        originator: UserId,
        reply_to: MessageId,
        title: &str,
    ) -> Result<()> {
        let hits = match &self.search {
            Some(search) => match search.search(title).await {
                Ok(hits) => hits,
                Err(err) => {
                    tracing::warn!(%err, "book search failed, falling back to manual entry");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        if hits.is_empty() {
            return self
                .prompt(
                    chat,
                    reply_to,
                    "Who is the author?",
                    WizardStage::AddBookAuthor {
                        title: title.to_string(),
                    },
                    originator,
                )
                .await;
        }

        let mut buttons: Vec<InlineButton> = hits
            .iter()
            .take(MAX_SEARCH_HITS)
            .map(|hit| {
                let year = hit
                    .year
                    .as_deref()
                    .map(|y| format!(" ({y})"))
                    .unwrap_or_default();
                InlineButton::new(
                    self.truncate_label(&format!("{} - {}{year}", hit.author, hit.title)),
                    format!("META:{}", hit.id),
                )
            })
            .collect();
        buttons.push(InlineButton::new("As Entered", PICK_RAW));
        buttons.push(InlineButton::new("Cancel", PICK_CANCEL));

        self.ask(
            chat,
            Some(reply_to),
            "Which book did you mean?",
            InlineKeyboard::one_per_row(buttons),
            WizardStage::AddBookPick {
                query: title.to_string(),
            },
            originator,
        )
        .await
    }

    pub(super) async fn add_book_pick(&self, query: String, press: ButtonPress) -> Result<()> {
        match press.data.as_str() {
            PICK_CANCEL => self.messenger.edit_text(press.prompt, "Cancelled.").await,
            PICK_RAW => {
                self.messenger
                    .edit_text(press.prompt, &format!("Adding \"{query}\" as entered."))
                    .await?;
                self.prompt(
                    &press.chat,
                    press.prompt.message_id,
                    "Who is the author?",
                    WizardStage::AddBookAuthor { title: query },
                    press.sender.id,
                )
                .await
            }
            data => {
                let Some(meta_id) = data.strip_prefix("META:") else {
                    tracing::warn!(data, "unrecognized add-book pick");
                    return Ok(());
                };
                let Some(search) = &self.search else {
                    return self
                        .messenger
                        .edit_text(press.prompt, "Book search is not configured.")
                        .await;
                };
                let meta = search.get(meta_id).await?;
                let details = BookDetails {
                    title: meta.title,
                    isbn: meta.isbn,
                    metadata_id: Some(meta.id),
                    thumb_url: meta.thumb_url,
                };
                let (view, created) = self
                    .persist_book(press.chat.id, &meta.author, details)
                    .await?;
                self.messenger
                    .edit_text(press.prompt, &added_text(&view, created))
                    .await
            }
        }
    }

    pub(super) async fn add_book_author(&self, title: String, reply: PlainReply) -> Result<()> {
        let author = reply.text.trim().to_string();
        if author.is_empty() {
            return self
                .reprompt(
                    &reply.chat,
                    reply.message_id,
                    "Who is the author?",
                    WizardStage::AddBookAuthor { title },
                    reply.sender.id,
                )
                .await;
        }
        let details = BookDetails {
            title,
            isbn: None,
            metadata_id: None,
            thumb_url: None,
        };
        let (view, created) = self.persist_book(reply.chat.id, &author, details).await?;
        self.messenger
            .reply_text(reply.chat.id, reply.message_id, &added_text(&view, created))
            .await?;
        Ok(())
    }

    /// Author, book and assignment are all create-or-get; returns the
    /// assignment view and whether the assignment is new to this chat.
    async fn persist_book(
        &self,
        chat_id: ChatId,
        author_name: &str,
        details: BookDetails,
    ) -> Result<(AssignmentView, bool)> {
        let author = self.store.create_or_get_author(author_name).await?;
        let book = self
            .store
            .create_or_get_book(NewBook {
                title: details.title,
                author_id: author.id,
                isbn: details.isbn,
                metadata_id: details.metadata_id,
                thumb_url: details.thumb_url,
            })
            .await?;
        let (assignment, created) = self
            .store
            .create_or_get_assignment(book.id, chat_id)
            .await?;
        let view = self
            .store
            .assignment(assignment.id)
            .await?
            .ok_or_else(|| Error::Store("assignment vanished after creation".into()))?;
        Ok((view, created))
    }

    pub(super) async fn start_book(&self, event: CommandEvent) -> Result<()> {
        let candidates = self.store.startable_assignments(event.chat.id).await?;
        if candidates.is_empty() {
            self.messenger
                .reply_text(
                    event.chat.id,
                    event.message_id,
                    "There are no books to start. Add one with /add_book.",
                )
                .await?;
            return Ok(());
        }
        self.ask(
            &event.chat,
            Some(event.message_id),
            "Which book should we start?",
            self.assignment_keyboard(&candidates),
            WizardStage::StartBookPick,
            event.sender.id,
        )
        .await
    }

    pub(super) async fn start_book_pick(&self, press: ButtonPress) -> Result<()> {
        let Some(id) = parse_id(&press.data) else {
            tracing::warn!(data = %press.data, "unrecognized start-book pick");
            return Ok(());
        };
        let Some(view) = self
            .assignment_or_note(AssignmentId(id), press.prompt)
            .await?
        else {
            return Ok(());
        };
        self.store.mark_current(view.assignment.id).await?;
        self.messenger
            .edit_text(
                press.prompt,
                &format!("Now reading {}!", view.friendly_name()),
            )
            .await
    }

    pub(super) async fn get_book(&self, event: CommandEvent) -> Result<()> {
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
                self.show_book_info(&event.chat, event.sender.id, event.message_id, only)
                    .await
            }
            _ => {
                self.ask(
                    &event.chat,
                    Some(event.message_id),
                    "Which book?",
                    self.assignment_keyboard(&current),
                    WizardStage::BookInfoPick,
                    event.sender.id,
                )
                .await
            }
        }
    }

    pub(super) async fn book_info_pick(&self, press: ButtonPress) -> Result<()> {
        let Some(id) = parse_id(&press.data) else {
            tracing::warn!(data = %press.data, "unrecognized book-info pick");
            return Ok(());
        };
        let Some(view) = self
            .assignment_or_note(AssignmentId(id), press.prompt)
            .await?
        else {
            return Ok(());
        };
        let Some(keyboard) = self.info_keyboard(&view) else {
            return self
                .messenger
                .edit_text(
                    press.prompt,
                    &format!("Currently reading {}.", view.friendly_name()),
                )
                .await;
        };
        self.ask_again(
            press.prompt,
            &view.friendly_name(),
            keyboard,
            WizardStage::BookInfoType {
                assignment: view.assignment.id,
            },
            press.sender.id,
        )
        .await
    }

    async fn show_book_info(
        &self,
        chat: &ChatInfo,
        originator: UserId,
        reply_to: MessageId,
        view: &AssignmentView,
    ) -> Result<()> {
        let Some(keyboard) = self.info_keyboard(view) else {
            self.messenger
                .reply_text(
                    chat.id,
                    reply_to,
                    &format!("Currently reading {}.", view.friendly_name()),
                )
                .await?;
            return Ok(());
        };
        self.ask(
            chat,
            Some(reply_to),
            &view.friendly_name(),
            keyboard,
            WizardStage::BookInfoType {
                assignment: view.assignment.id,
            },
            originator,
        )
        .await
    }

    /// Offers only what exists for this book; `None` when there is nothing
    /// beyond the title to show.
    fn info_keyboard(&self, view: &AssignmentView) -> Option<InlineKeyboard> {
        let mut buttons = Vec::new();
        if self.search.is_some() && view.book.metadata_id.is_some() {
            buttons.push(InlineButton::new("Description", INFO_DESCRIPTION));
        }
        if view.assignment.ebook_message_id.is_some() {
            buttons.push(InlineButton::new("eBook", INFO_EBOOK));
        }
        if view.assignment.audiobook_message_id.is_some() {
            buttons.push(InlineButton::new("Audiobook", INFO_AUDIOBOOK));
        }
        if buttons.is_empty() {
            None
        } else {
            Some(InlineKeyboard::new().row(buttons))
        }
    }

    pub(super) async fn book_info_type(
        &self,
        assignment: AssignmentId,
        press: ButtonPress,
    ) -> Result<()> {
        let Some(view) = self.assignment_or_note(assignment, press.prompt).await? else {
            return Ok(());
        };
        match press.data.as_str() {
            INFO_DESCRIPTION => self.send_description(&view, press).await,
            INFO_EBOOK => self.forward_media(&view, MediaKind::Ebook, press).await,
            INFO_AUDIOBOOK => self.forward_media(&view, MediaKind::Audiobook, press).await,
            data => {
                tracing::warn!(data, "unrecognized book-info choice");
                Ok(())
            }
        }
    }

    async fn send_description(&self, view: &AssignmentView, press: ButtonPress) -> Result<()> {
        let meta = match (&self.search, &view.book.metadata_id) {
            (Some(search), Some(id)) => search.get(id).await,
            _ => {
                return self
                    .messenger
                    .edit_text(press.prompt, "No description is available for this book.")
                    .await
            }
        };
        let text = match meta {
            Ok(meta) => {
                let mut text = view.friendly_name();
                if let Some(description) = meta.description {
                    text.push_str("\n\n");
                    text.push_str(&description);
                }
                if let Some(url) = meta.url {
                    text.push('\n');
                    text.push_str(&url);
                }
                text
            }
            Err(err) => {
                tracing::warn!(%err, "description lookup failed");
                "Couldn't fetch the description right now.".to_string()
            }
        };
        self.messenger.edit_text(press.prompt, &text).await
    }

    /// Forwards the stored media message. A failed forward means the
    /// original is gone, so the stale id is cleared.
    async fn forward_media(
        &self,
        view: &AssignmentView,
        kind: MediaKind,
        press: ButtonPress,
    ) -> Result<()> {
        let stored = match kind {
            MediaKind::Ebook => view.assignment.ebook_message_id,
            MediaKind::Audiobook => view.assignment.audiobook_message_id,
        };
        let Some(message_id) = stored else {
            return self
                .messenger
                .edit_text(
                    press.prompt,
                    &format!("No {} is registered for this book.", kind.noun()),
                )
                .await;
        };

        match self
            .messenger
            .forward_message(press.chat.id, press.chat.id, message_id)
            .await
        {
            Ok(_) => {
                self.messenger
                    .edit_text(press.prompt, &view.friendly_name())
                    .await
            }
            Err(err) => {
                tracing::warn!(%err, noun = kind.noun(), "stored media message is gone");
                self.store
                    .set_media_message(view.assignment.id, kind, None)
                    .await?;
                self.messenger
                    .edit_text(
                        press.prompt,
                        &format!(
                            "The stored {} message is gone. Please register it again.",
                            kind.noun()
                        ),
                    )
                    .await
            }
        }
    }
}

fn added_text(view: &AssignmentView, created: bool) -> String {
    if created {
        format!("Added {} to the book list.", view.friendly_name())
    } else {
        format!("{} is already on the book list.", view.friendly_name())
    }
}
