//! Persistence collaborator: entities, the async [`Store`] port, and the
//! in-memory implementation.
//!
//! The core only requires create-or-get semantics to be upsert-atomic; a
//! durable backend can replace [`MemStore`] behind the same trait.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::{AssignmentId, AuthorId, BookId, ChatId, MessageId, ParticipationId, ScheduleId, UserId},
    messaging::types::{ChatInfo, ChatKind, UserInfo},
    Result,
};

pub use memory::MemStore;

/// Progress values above this are rejected as implausible.
pub const MAX_PROGRESS: i64 = 100_000;

#[derive(Clone, Debug)]
pub struct ChatRecord {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: Option<String>,
    pub username: Option<String>,
}

#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UserRecord {
    pub fn display_name(&self) -> String {
        if let Some(u) = &self.username {
            return format!("@{u}");
        }
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        format!("{first} {last}").trim().to_string()
    }
}

#[derive(Clone, Debug)]
pub struct Author {
    pub id: AuthorId,
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author_id: AuthorId,
    pub isbn: Option<String>,
    /// Id of this book in the external metadata service, when it was added
    /// via search.
    pub metadata_id: Option<String>,
    pub thumb_url: Option<String>,
}

/// A book assigned to a chat for a group read.
#[derive(Clone, Debug)]
pub struct BookAssignment {
    pub id: AssignmentId,
    pub book_id: BookId,
    pub chat_id: ChatId,
    /// Actively being read.
    pub current: bool,
    /// Finished; excluded from every pick list.
    pub done: bool,
    pub ebook_message_id: Option<MessageId>,
    pub audiobook_message_id: Option<MessageId>,
    pub start_date: DateTime<Utc>,
}

/// Which stored media message a wizard is registering or forwarding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Ebook,
    Audiobook,
}

impl MediaKind {
    pub fn noun(self) -> &'static str {
        match self {
            MediaKind::Ebook => "ebook",
            MediaKind::Audiobook => "audiobook",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BookSchedule {
    pub id: ScheduleId,
    pub assignment_id: AssignmentId,
    pub due_date: DateTime<Utc>,
    /// Progress range covered by this deadline; `start` is the previous
    /// schedule's `end` (0 for the first).
    pub start: i64,
    pub end: i64,
}

#[derive(Clone, Debug)]
pub struct UserParticipation {
    pub id: ParticipationId,
    pub user_id: UserId,
    pub assignment_id: AssignmentId,
    pub active: bool,
    pub join_date: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct ProgressUpdate {
    pub participation_id: ParticipationId,
    pub progress: i64,
    pub update_date: DateTime<Utc>,
}

/// Assignment joined with its book and author for display.
#[derive(Clone, Debug)]
pub struct AssignmentView {
    pub assignment: BookAssignment,
    pub book: Book,
    pub author_name: String,
}

impl AssignmentView {
    /// "Author - Title", the label used everywhere a book is shown.
    pub fn friendly_name(&self) -> String {
        format!("{} - {}", self.author_name, self.book.title)
    }
}

/// Participation joined with its assignment, book and author.
#[derive(Clone, Debug)]
pub struct ParticipationView {
    pub participation: UserParticipation,
    pub assignment: BookAssignment,
    pub book: Book,
    pub author_name: String,
}

impl ParticipationView {
    pub fn friendly_name(&self) -> String {
        format!("{} - {}", self.author_name, self.book.title)
    }
}

/// One row of a progress report: a participant's latest update.
#[derive(Clone, Debug)]
pub struct ProgressEntry {
    pub user: UserRecord,
    pub progress: i64,
    pub update_date: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewBook {
    pub title: String,
    pub author_id: AuthorId,
    pub isbn: Option<String>,
    pub metadata_id: Option<String>,
    pub thumb_url: Option<String>,
}

/// Async persistence port consumed by the dispatcher (identity upserts) and
/// the wizards (everything else).
#[async_trait]
pub trait Store: Send + Sync {
    /// Create-or-get keyed by platform id; must be upsert-atomic.
    async fn upsert_chat(&self, chat: &ChatInfo) -> Result<()>;
    async fn upsert_user(&self, user: &UserInfo) -> Result<()>;
    async fn user(&self, id: UserId) -> Result<Option<UserRecord>>;

    async fn create_or_get_author(&self, name: &str) -> Result<Author>;
    async fn create_or_get_book(&self, book: NewBook) -> Result<Book>;

    /// Returns the assignment and whether it was newly created.
    async fn create_or_get_assignment(
        &self,
        book_id: BookId,
        chat_id: ChatId,
    ) -> Result<(BookAssignment, bool)>;
    async fn assignment(&self, id: AssignmentId) -> Result<Option<AssignmentView>>;
    /// Not done (open for ebook/audiobook registration etc.).
    async fn open_assignments(&self, chat_id: ChatId) -> Result<Vec<AssignmentView>>;
    /// Not done and not yet current (candidates for `/start_book`).
    async fn startable_assignments(&self, chat_id: ChatId) -> Result<Vec<AssignmentView>>;
    /// Actively being read.
    async fn current_assignments(&self, chat_id: ChatId) -> Result<Vec<AssignmentView>>;
    async fn mark_current(&self, id: AssignmentId) -> Result<()>;
    async fn set_media_message(
        &self,
        id: AssignmentId,
        kind: MediaKind,
        message: Option<MessageId>,
    ) -> Result<()>;

    /// Appends a schedule whose `start` continues from the latest one.
    async fn add_schedule(
        &self,
        assignment_id: AssignmentId,
        due_date: DateTime<Utc>,
        end: i64,
    ) -> Result<BookSchedule>;
    async fn latest_schedule(&self, assignment_id: AssignmentId) -> Result<Option<BookSchedule>>;

    /// Idempotent: an existing active participation is returned as-is.
    async fn join_book(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
    ) -> Result<UserParticipation>;
    /// Deactivates the participation; `None` when the id is unknown.
    async fn quit_book(&self, id: ParticipationId) -> Result<Option<ParticipationView>>;
    async fn participation(&self, id: ParticipationId) -> Result<Option<ParticipationView>>;
    /// Active participations for a user; `chat_id = None` spans all chats
    /// (private-chat `/quit_book`).
    async fn active_participation(
        &self,
        user_id: UserId,
        chat_id: Option<ChatId>,
    ) -> Result<Vec<ParticipationView>>;

    /// Rejects values outside `0..=MAX_PROGRESS` with [`crate::Error::Store`].
    async fn record_progress(
        &self,
        participation_id: ParticipationId,
        progress: i64,
    ) -> Result<ProgressUpdate>;
    /// Latest update per active participant, highest progress first.
    async fn progress_report(&self, assignment_id: AssignmentId) -> Result<Vec<ProgressEntry>>;
}
