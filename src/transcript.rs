//! Ordered conversation transcript and per-session usage counter.
//!
//! The store is the only place chat state is mutated. A stream feeds it through
//! [`TranscriptStore::apply_increment`], which grows the trailing assistant
//! message in place.

use crate::error::SubmitError;
use crate::types::{ChatMessage, Role};
use tracing::debug;

/// Maximum number of user submissions per session.
pub const QUERY_LIMIT: u32 = 2;

/// Shown as an assistant message whenever a remote call fails.
pub const ERROR_NOTICE: &str =
    "I encountered an error while processing your request. Please try again later.";

/// Shown instead of a transcript entry once [`QUERY_LIMIT`] is reached.
pub const LIMIT_NOTICE: &str = "You have reached the limit of 2 free queries. To continue using SAHAB, please contact the owner.";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TurnStatus {
    #[default]
    Idle,
    Streaming,
    Errored,
}

#[derive(Debug, Default)]
pub struct TranscriptStore {
    messages: Vec<ChatMessage>,
    submissions: u32,
    status: TurnStatus,
    /// Transcript length when the current stream began.
    stream_start: Option<usize>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn submissions(&self) -> u32 {
        self.submissions
    }

    pub fn limit_reached(&self) -> bool {
        self.submissions >= QUERY_LIMIT
    }

    pub fn status(&self) -> TurnStatus {
        self.status
    }

    /// Check a submission without mutating anything.
    pub fn validate(&self, content: &str) -> Result<(), SubmitError> {
        if self.status == TurnStatus::Streaming {
            return Err(SubmitError::InFlight);
        }
        if content.trim().is_empty() {
            return Err(SubmitError::Empty);
        }
        if self.limit_reached() {
            return Err(SubmitError::LimitReached { limit: QUERY_LIMIT });
        }
        Ok(())
    }

    /// Append a user turn and count it against the session limit.
    ///
    /// A rejected submission leaves the store untouched.
    pub fn append_user(&mut self, content: &str) -> Result<(), SubmitError> {
        if let Err(err) = self.validate(content) {
            debug!(reason = %err, "submission rejected");
            return Err(err);
        }
        self.messages.push(ChatMessage::user(content));
        self.submissions += 1;
        Ok(())
    }

    /// Grow the trailing assistant message, or start one.
    ///
    /// Deltas are concatenated verbatim. Empty deltas are ignored so that no
    /// empty assistant message is ever created.
    pub fn apply_increment(&mut self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        match self.messages.last_mut() {
            Some(last) if last.role == Role::Assistant => last.content.push_str(delta),
            _ => self.messages.push(ChatMessage::assistant(delta)),
        }
    }

    /// Append the fixed failure notice as its own assistant message.
    pub fn append_assistant_error(&mut self) {
        self.messages.push(ChatMessage::assistant(ERROR_NOTICE));
    }

    pub fn begin_stream(&mut self) -> Result<(), SubmitError> {
        if self.status == TurnStatus::Streaming {
            return Err(SubmitError::InFlight);
        }
        self.status = TurnStatus::Streaming;
        self.stream_start = Some(self.messages.len());
        Ok(())
    }

    pub fn finish_stream(&mut self) {
        self.status = TurnStatus::Idle;
        self.stream_start = None;
    }

    /// End the current stream with a failure notice. Partial content stays.
    pub fn fail_stream(&mut self) {
        self.append_assistant_error();
        self.status = TurnStatus::Errored;
        self.stream_start = None;
    }

    /// End the current stream early, flagging whatever it produced as truncated.
    pub fn truncate_stream(&mut self) {
        if let Some(start) = self.stream_start.take() {
            if let Some(last) = self.messages.get_mut(start..).and_then(|tail| tail.last_mut()) {
                if last.role == Role::Assistant {
                    last.truncated = true;
                }
            }
        }
        self.status = TurnStatus::Idle;
    }

    /// Clear the transcript and the usage counter, ending the session.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.submissions = 0;
        self.status = TurnStatus::Idle;
        self.stream_start = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_user_grows_by_one() {
        let mut store = TranscriptStore::new();
        store.append_user("What is bail?").unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.submissions(), 1);
        assert_eq!(store.messages()[0], ChatMessage::user("What is bail?"));
    }

    #[test]
    fn blank_submissions_are_ignored() {
        let mut store = TranscriptStore::new();
        assert_eq!(store.append_user("   \n\t"), Err(SubmitError::Empty));
        assert_eq!(store.append_user(""), Err(SubmitError::Empty));
        assert!(store.is_empty());
        assert_eq!(store.submissions(), 0);
    }

    #[test]
    fn increments_collapse_into_one_message() {
        let mut store = TranscriptStore::new();
        store.append_user("Explain \"Bail\" simply.").unwrap();
        for delta in ["Bail ", "is ", "temporary ", "release."] {
            store.apply_increment(delta);
        }
        assert_eq!(store.len(), 2);
        let last = store.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "Bail is temporary release.");
    }

    #[test]
    fn empty_increment_does_not_create_message() {
        let mut store = TranscriptStore::new();
        store.append_user("hi").unwrap();
        store.apply_increment("");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn third_submission_is_rejected() {
        let mut store = TranscriptStore::new();
        store.append_user("one").unwrap();
        store.apply_increment("a");
        store.append_user("two").unwrap();
        store.apply_increment("b");
        assert!(store.limit_reached());

        let before = store.messages().to_vec();
        assert_eq!(
            store.append_user("three"),
            Err(SubmitError::LimitReached { limit: QUERY_LIMIT })
        );
        assert_eq!(store.messages(), before.as_slice());
        assert_eq!(store.submissions(), 2);
    }

    #[test]
    fn reset_reopens_the_session() {
        let mut store = TranscriptStore::new();
        store.append_user("one").unwrap();
        store.append_user("two").unwrap();
        assert!(store.append_user("three").is_err());

        store.reset();
        assert!(store.is_empty());
        assert_eq!(store.submissions(), 0);
        assert!(!store.limit_reached());
        store.append_user("four").unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn streaming_blocks_new_submissions() {
        let mut store = TranscriptStore::new();
        store.append_user("one").unwrap();
        store.begin_stream().unwrap();
        assert_eq!(store.append_user("two"), Err(SubmitError::InFlight));
        assert_eq!(store.begin_stream(), Err(SubmitError::InFlight));
        store.finish_stream();
        assert_eq!(store.status(), TurnStatus::Idle);
        store.append_user("two").unwrap();
    }

    #[test]
    fn failed_stream_keeps_partial_content() {
        let mut store = TranscriptStore::new();
        store.append_user("q").unwrap();
        store.begin_stream().unwrap();
        store.apply_increment("partial ans");
        store.fail_stream();

        assert_eq!(store.status(), TurnStatus::Errored);
        assert_eq!(store.len(), 3);
        assert_eq!(store.messages()[1].content, "partial ans");
        assert_eq!(store.messages()[2].content, ERROR_NOTICE);
        // Errored sessions still accept input.
        store.append_user("again").unwrap();
    }

    #[test]
    fn truncation_flags_only_this_turns_message() {
        let mut store = TranscriptStore::new();
        store.append_user("q1").unwrap();
        store.apply_increment("full answer");

        store.append_user("q2").unwrap();
        store.begin_stream().unwrap();
        store.truncate_stream();
        assert!(store.messages().iter().all(|m| !m.truncated));

        store.reset();
        store.append_user("q3").unwrap();
        store.begin_stream().unwrap();
        store.apply_increment("half");
        store.truncate_stream();
        assert!(store.last().unwrap().truncated);
        assert_eq!(store.status(), TurnStatus::Idle);
    }
}
