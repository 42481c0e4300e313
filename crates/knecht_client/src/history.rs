//! In-memory chat history: question/answer entries in submission order.

/// Where an entry is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EntryStatus {
    /// Waiting for the bridge.
    #[default]
    Pending,
    Answered,
    /// The bridge failed; the answer holds whatever output arrived before.
    Failed(String),
    Cancelled,
}

/// One question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub question: String,
    pub answer: String,
    pub status: EntryStatus,
}

impl ChatEntry {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: String::new(),
            status: EntryStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == EntryStatus::Pending
    }
}

/// Append-only list of entries. Only the newest entry can be resolved, and only once.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<ChatEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pending entry and return its index.
    pub fn push(&mut self, question: impl Into<String>) -> usize {
        self.entries.push(ChatEntry::new(question));
        self.entries.len() - 1
    }

    /// Set answer and final status of the newest entry.
    ///
    /// Returns `None` when the history is empty, `index` is not the newest entry,
    /// or that entry is already resolved.
    pub fn resolve(
        &mut self,
        index: usize,
        answer: String,
        status: EntryStatus,
    ) -> Option<&ChatEntry> {
        if index + 1 != self.entries.len() {
            return None;
        }
        let entry = self.entries.last_mut()?;
        if !entry.is_pending() {
            return None;
        }
        entry.answer = answer;
        entry.status = status;
        Some(entry)
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&ChatEntry> {
        self.entries.get(index)
    }

    pub fn last(&self) -> Option<&ChatEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a ChatEntry;
    type IntoIter = std::slice::Iter<'a, ChatEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
