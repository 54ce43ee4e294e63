//! In-memory [`Store`] implementation.
//!
//! One mutex over all tables makes every create-or-get atomic, which is the
//! contract the dispatcher relies on when two identical commands race.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    domain::{AssignmentId, AuthorId, BookId, ChatId, MessageId, ParticipationId, ScheduleId, UserId},
    errors::Error,
    messaging::types::{ChatInfo, UserInfo},
    Result,
};

use super::{
    AssignmentView, Author, Book, BookAssignment, BookSchedule, ChatRecord, MediaKind, NewBook,
    ParticipationView, ProgressEntry, ProgressUpdate, Store, UserParticipation, UserRecord,
    MAX_PROGRESS,
};

#[derive(Default)]
struct Tables {
    chats: HashMap<ChatId, ChatRecord>,
    users: HashMap<UserId, UserRecord>,
    authors: Vec<Author>,
    books: Vec<Book>,
    assignments: Vec<BookAssignment>,
    schedules: Vec<BookSchedule>,
    participations: Vec<UserParticipation>,
    progress: Vec<ProgressUpdate>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn author_name(&self, id: AuthorId) -> String {
        self.authors
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.name.clone())
            .unwrap_or_default()
    }

    fn view(&self, assignment: &BookAssignment) -> Option<AssignmentView> {
        let book = self.books.iter().find(|b| b.id == assignment.book_id)?;
        Some(AssignmentView {
            assignment: assignment.clone(),
            book: book.clone(),
            author_name: self.author_name(book.author_id),
        })
    }

    fn participation_view(&self, p: &UserParticipation) -> Option<ParticipationView> {
        let assignment = self
            .assignments
            .iter()
            .find(|a| a.id == p.assignment_id)?;
        let book = self.books.iter().find(|b| b.id == assignment.book_id)?;
        Some(ParticipationView {
            participation: p.clone(),
            assignment: assignment.clone(),
            book: book.clone(),
            author_name: self.author_name(book.author_id),
        })
    }
}

pub struct MemStore {
    tables: Mutex<Tables>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }
}

#[async_trait]
impl Store for MemStore {
    async fn upsert_chat(&self, chat: &ChatInfo) -> Result<()> {
        let mut t = self.tables.lock().await;
        t.chats.insert(
            chat.id,
            ChatRecord {
                id: chat.id,
                kind: chat.kind,
                title: chat.title.clone(),
                username: chat.username.clone(),
            },
        );
        Ok(())
    }

    async fn upsert_user(&self, user: &UserInfo) -> Result<()> {
        let mut t = self.tables.lock().await;
        t.users.insert(
            user.id,
            UserRecord {
                id: user.id,
                username: user.username.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
            },
        );
        Ok(())
    }

    async fn user(&self, id: UserId) -> Result<Option<UserRecord>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn create_or_get_author(&self, name: &str) -> Result<Author> {
        let mut t = self.tables.lock().await;
        if let Some(existing) = t.authors.iter().find(|a| a.name == name) {
            return Ok(existing.clone());
        }
        let author = Author {
            id: AuthorId(t.next_id()),
            name: name.to_string(),
        };
        t.authors.push(author.clone());
        Ok(author)
    }

    async fn create_or_get_book(&self, book: NewBook) -> Result<Book> {
        let mut t = self.tables.lock().await;
        // Match by metadata id when present, else by title.
        let existing = t.books.iter().find(|b| match &book.metadata_id {
            Some(mid) => b.metadata_id.as_deref() == Some(mid.as_str()),
            None => b.title == book.title,
        });
        if let Some(existing) = existing {
            return Ok(existing.clone());
        }
        let created = Book {
            id: BookId(t.next_id()),
            title: book.title,
            author_id: book.author_id,
            isbn: book.isbn,
            metadata_id: book.metadata_id,
            thumb_url: book.thumb_url,
        };
        t.books.push(created.clone());
        Ok(created)
    }

    async fn create_or_get_assignment(
        &self,
        book_id: BookId,
        chat_id: ChatId,
    ) -> Result<(BookAssignment, bool)> {
        let mut t = self.tables.lock().await;
        if let Some(existing) = t
            .assignments
            .iter()
            .find(|a| a.book_id == book_id && a.chat_id == chat_id)
        {
            return Ok((existing.clone(), false));
        }
        let assignment = BookAssignment {
            id: AssignmentId(t.next_id()),
            book_id,
            chat_id,
            current: false,
            done: false,
            ebook_message_id: None,
            audiobook_message_id: None,
            start_date: Utc::now(),
        };
        t.assignments.push(assignment.clone());
        Ok((assignment, true))
    }

    async fn assignment(&self, id: AssignmentId) -> Result<Option<AssignmentView>> {
        let t = self.tables.lock().await;
        Ok(t.assignments
            .iter()
            .find(|a| a.id == id)
            .and_then(|a| t.view(a)))
    }

    async fn open_assignments(&self, chat_id: ChatId) -> Result<Vec<AssignmentView>> {
        let t = self.tables.lock().await;
        Ok(t.assignments
            .iter()
            .filter(|a| a.chat_id == chat_id && !a.done)
            .filter_map(|a| t.view(a))
            .collect())
    }

    async fn startable_assignments(&self, chat_id: ChatId) -> Result<Vec<AssignmentView>> {
        let t = self.tables.lock().await;
        Ok(t.assignments
            .iter()
            .filter(|a| a.chat_id == chat_id && !a.done && !a.current)
            .filter_map(|a| t.view(a))
            .collect())
    }

    async fn current_assignments(&self, chat_id: ChatId) -> Result<Vec<AssignmentView>> {
        let t = self.tables.lock().await;
        Ok(t.assignments
            .iter()
            .filter(|a| a.chat_id == chat_id && a.current)
            .filter_map(|a| t.view(a))
            .collect())
    }

    async fn mark_current(&self, id: AssignmentId) -> Result<()> {
        let mut t = self.tables.lock().await;
        match t.assignments.iter_mut().find(|a| a.id == id) {
            Some(a) => {
                a.current = true;
                Ok(())
            }
            None => Err(Error::Store(format!("unknown assignment {}", id.0))),
        }
    }

    async fn set_media_message(
        &self,
        id: AssignmentId,
        kind: MediaKind,
        message: Option<MessageId>,
    ) -> Result<()> {
        let mut t = self.tables.lock().await;
        match t.assignments.iter_mut().find(|a| a.id == id) {
            Some(a) => {
                match kind {
                    MediaKind::Ebook => a.ebook_message_id = message,
                    MediaKind::Audiobook => a.audiobook_message_id = message,
                }
                Ok(())
            }
            None => Err(Error::Store(format!("unknown assignment {}", id.0))),
        }
    }

    async fn add_schedule(
        &self,
        assignment_id: AssignmentId,
        due_date: DateTime<Utc>,
        end: i64,
    ) -> Result<BookSchedule> {
        let mut t = self.tables.lock().await;
        let start = t
            .schedules
            .iter()
            .filter(|s| s.assignment_id == assignment_id)
            .max_by_key(|s| s.due_date)
            .map(|s| s.end)
            .unwrap_or(0);
        let schedule = BookSchedule {
            id: ScheduleId(t.next_id()),
            assignment_id,
            due_date,
            start,
            end,
        };
        t.schedules.push(schedule.clone());
        Ok(schedule)
    }

    async fn latest_schedule(&self, assignment_id: AssignmentId) -> Result<Option<BookSchedule>> {
        let t = self.tables.lock().await;
        Ok(t.schedules
            .iter()
            .filter(|s| s.assignment_id == assignment_id)
            .max_by_key(|s| s.due_date)
            .cloned())
    }

    async fn join_book(
        &self,
        user_id: UserId,
        assignment_id: AssignmentId,
    ) -> Result<UserParticipation> {
        let mut t = self.tables.lock().await;
        if let Some(existing) = t
            .participations
            .iter()
            .find(|p| p.user_id == user_id && p.assignment_id == assignment_id && p.active)
        {
            return Ok(existing.clone());
        }
        let participation = UserParticipation {
            id: ParticipationId(t.next_id()),
            user_id,
            assignment_id,
            active: true,
            join_date: Utc::now(),
        };
        t.participations.push(participation.clone());
        Ok(participation)
    }

    async fn quit_book(&self, id: ParticipationId) -> Result<Option<ParticipationView>> {
        let mut t = self.tables.lock().await;
        let Some(p) = t.participations.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        p.active = false;
        let snapshot = p.clone();
        Ok(t.participation_view(&snapshot))
    }

    async fn participation(&self, id: ParticipationId) -> Result<Option<ParticipationView>> {
        let t = self.tables.lock().await;
        Ok(t.participations
            .iter()
            .find(|p| p.id == id)
            .and_then(|p| t.participation_view(p)))
    }

    async fn active_participation(
        &self,
        user_id: UserId,
        chat_id: Option<ChatId>,
    ) -> Result<Vec<ParticipationView>> {
        let t = self.tables.lock().await;
        Ok(t.participations
            .iter()
            .filter(|p| p.user_id == user_id && p.active)
            .filter_map(|p| t.participation_view(p))
            .filter(|v| match chat_id {
                Some(chat) => v.assignment.chat_id == chat,
                None => true,
            })
            .collect())
    }

    async fn record_progress(
        &self,
        participation_id: ParticipationId,
        progress: i64,
    ) -> Result<ProgressUpdate> {
        if !(0..=MAX_PROGRESS).contains(&progress) {
            return Err(Error::Store(format!("progress {progress} out of range")));
        }
        let mut t = self.tables.lock().await;
        if !t.participations.iter().any(|p| p.id == participation_id) {
            return Err(Error::Store(format!(
                "unknown participation {}",
                participation_id.0
            )));
        }
        let update = ProgressUpdate {
            participation_id,
            progress,
            update_date: Utc::now(),
        };
        t.progress.push(update.clone());
        Ok(update)
    }

    async fn progress_report(&self, assignment_id: AssignmentId) -> Result<Vec<ProgressEntry>> {
        let t = self.tables.lock().await;
        let mut entries: Vec<ProgressEntry> = Vec::new();
        for p in t
            .participations
            .iter()
            .filter(|p| p.assignment_id == assignment_id && p.active)
        {
            let latest = t
                .progress
                .iter()
                .filter(|u| u.participation_id == p.id)
                .max_by_key(|u| u.update_date);
            let Some(latest) = latest else { continue };
            let user = t.users.get(&p.user_id).cloned().unwrap_or(UserRecord {
                id: p.user_id,
                username: None,
                first_name: None,
                last_name: None,
            });
            entries.push(ProgressEntry {
                user,
                progress: latest.progress,
                update_date: latest.update_date,
            });
        }
        entries.sort_by(|a, b| b.progress.cmp(&a.progress));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{group_chat, user};

    fn info(id: i64) -> UserInfo {
        user(id)
    }

    #[tokio::test]
    async fn create_or_get_author_and_book_deduplicate() {
        let store = MemStore::new();
        let a1 = store.create_or_get_author("Frank Herbert").await.unwrap();
        let a2 = store.create_or_get_author("Frank Herbert").await.unwrap();
        assert_eq!(a1.id, a2.id);

        let b1 = store
            .create_or_get_book(NewBook {
                title: "Dune".to_string(),
                author_id: a1.id,
                isbn: None,
                metadata_id: None,
                thumb_url: None,
            })
            .await
            .unwrap();
        let b2 = store
            .create_or_get_book(NewBook {
                title: "Dune".to_string(),
                author_id: a1.id,
                isbn: None,
                metadata_id: None,
                thumb_url: None,
            })
            .await
            .unwrap();
        assert_eq!(b1.id, b2.id);
    }

    #[tokio::test]
    async fn assignment_created_once_per_book_and_chat() {
        let store = MemStore::new();
        let author = store.create_or_get_author("A").await.unwrap();
        let book = store
            .create_or_get_book(NewBook {
                title: "T".to_string(),
                author_id: author.id,
                isbn: None,
                metadata_id: None,
                thumb_url: None,
            })
            .await
            .unwrap();

        let (first, created) = store
            .create_or_get_assignment(book.id, ChatId(9))
            .await
            .unwrap();
        assert!(created);
        let (second, created) = store
            .create_or_get_assignment(book.id, ChatId(9))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);

        let open = store.open_assignments(ChatId(9)).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].friendly_name(), "A - T");
    }

    #[tokio::test]
    async fn schedule_start_chains_from_previous_end() {
        let store = MemStore::new();
        let author = store.create_or_get_author("A").await.unwrap();
        let book = store
            .create_or_get_book(NewBook {
                title: "T".to_string(),
                author_id: author.id,
                isbn: None,
                metadata_id: None,
                thumb_url: None,
            })
            .await
            .unwrap();
        let (assignment, _) = store
            .create_or_get_assignment(book.id, ChatId(9))
            .await
            .unwrap();

        let s1 = store
            .add_schedule(assignment.id, Utc::now(), 5)
            .await
            .unwrap();
        assert_eq!(s1.start, 0);
        let s2 = store
            .add_schedule(
                assignment.id,
                Utc::now() + chrono::Duration::days(7),
                12,
            )
            .await
            .unwrap();
        assert_eq!(s2.start, 5);

        let latest = store.latest_schedule(assignment.id).await.unwrap().unwrap();
        assert_eq!(latest.end, 12);
    }

    #[tokio::test]
    async fn progress_report_keeps_latest_per_user_descending() {
        let store = MemStore::new();
        store.upsert_chat(&group_chat(9)).await.unwrap();
        store.upsert_user(&info(1)).await.unwrap();
        store.upsert_user(&info(2)).await.unwrap();

        let author = store.create_or_get_author("A").await.unwrap();
        let book = store
            .create_or_get_book(NewBook {
                title: "T".to_string(),
                author_id: author.id,
                isbn: None,
                metadata_id: None,
                thumb_url: None,
            })
            .await
            .unwrap();
        let (assignment, _) = store
            .create_or_get_assignment(book.id, ChatId(9))
            .await
            .unwrap();

        let p1 = store.join_book(UserId(1), assignment.id).await.unwrap();
        let p2 = store.join_book(UserId(2), assignment.id).await.unwrap();

        store.record_progress(p1.id, 3).await.unwrap();
        store.record_progress(p1.id, 8).await.unwrap();
        store.record_progress(p2.id, 5).await.unwrap();

        let report = store.progress_report(assignment.id).await.unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].progress, 8);
        assert_eq!(report[1].progress, 5);
    }

    #[tokio::test]
    async fn record_progress_rejects_out_of_range() {
        let store = MemStore::new();
        let author = store.create_or_get_author("A").await.unwrap();
        let book = store
            .create_or_get_book(NewBook {
                title: "T".to_string(),
                author_id: author.id,
                isbn: None,
                metadata_id: None,
                thumb_url: None,
            })
            .await
            .unwrap();
        let (assignment, _) = store
            .create_or_get_assignment(book.id, ChatId(9))
            .await
            .unwrap();
        let p = store.join_book(UserId(1), assignment.id).await.unwrap();

        assert!(store.record_progress(p.id, -1).await.is_err());
        assert!(store.record_progress(p.id, MAX_PROGRESS + 1).await.is_err());
        assert!(store.record_progress(p.id, MAX_PROGRESS).await.is_ok());
    }

    #[tokio::test]
    async fn quit_deactivates_participation() {
        let store = MemStore::new();
        let author = store.create_or_get_author("A").await.unwrap();
        let book = store
            .create_or_get_book(NewBook {
                title: "T".to_string(),
                author_id: author.id,
                isbn: None,
                metadata_id: None,
                thumb_url: None,
            })
            .await
            .unwrap();
        let (assignment, _) = store
            .create_or_get_assignment(book.id, ChatId(9))
            .await
            .unwrap();
        let p = store.join_book(UserId(1), assignment.id).await.unwrap();

        let view = store.quit_book(p.id).await.unwrap().unwrap();
        assert!(!view.participation.active);
        let active = store
            .active_participation(UserId(1), Some(ChatId(9)))
            .await
            .unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn join_book_is_idempotent_while_active() {
        let store = MemStore::new();
        let author = store.create_or_get_author("A").await.unwrap();
        let book = store
            .create_or_get_book(NewBook {
                title: "T".to_string(),
                author_id: author.id,
                isbn: None,
                metadata_id: None,
                thumb_url: None,
            })
            .await
            .unwrap();
        let (assignment, _) = store
            .create_or_get_assignment(book.id, ChatId(9))
            .await
            .unwrap();

        let p1 = store.join_book(UserId(1), assignment.id).await.unwrap();
        let p2 = store.join_book(UserId(1), assignment.id).await.unwrap();
        assert_eq!(p1.id, p2.id);
    }
}
