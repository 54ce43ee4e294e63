use chrono::{DateTime, Utc};

use crate::{
    domain::{AssignmentId, ParticipationId},
    store::MediaKind,
};

/// Suspended wizard step plus the arguments accumulated so far.
///
/// Each variant names the prompt the user is answering; resuming a stage
/// with the follow-up event yields either a further stage or a completed
/// action.
#[derive(Clone, Debug)]
pub enum WizardStage {
    /// "Title of book to add?"
    AddBookTitle,
    /// Search-hit keyboard; `query` is the title as entered, kept for the
    /// "As Entered" fallback.
    AddBookPick { query: String },
    /// "Who is the author?" (manual flow)
    AddBookAuthor { title: String },
    /// Which book to start reading.
    StartBookPick,
    /// Which book the file is for.
    RegisterMediaPick { kind: MediaKind },
    /// "Reply with the file."
    RegisterMediaFile {
        kind: MediaKind,
        assignment: AssignmentId,
    },
    /// Which current book to set a deadline on.
    DeadlinePickBook,
    /// "When is the deadline?"
    DeadlineDate { assignment: AssignmentId },
    /// "Read up to where by then?"
    DeadlineTarget {
        assignment: AssignmentId,
        due: DateTime<Utc>,
    },
    /// Which book to show the deadline of.
    DeadlineShowPick,
    /// Which current book to show info about.
    BookInfoPick,
    /// Description / eBook / Audiobook keyboard.
    BookInfoType { assignment: AssignmentId },
    /// Which book to join.
    JoinPick,
    /// Which participation to quit.
    QuitPick,
    /// Which book the progress update is for; `progress` is set when the
    /// command already carried a numeric argument.
    ProgressPickBook { progress: Option<i64> },
    /// "How far along are you?"
    ProgressValue { participation: ParticipationId },
    /// Which book to report progress on.
    GetProgressPick { verbose: bool },
}
