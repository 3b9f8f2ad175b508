//! Core domain models held by the chat session.

use std::collections::{HashMap, HashSet, VecDeque};

use super::value_object::{Color, Seq, TokenHash};

/// Default scrollback used until the server declares its own.
pub const DEFAULT_SCROLLBACK: usize = 256;

/// Password-derived identity marker shown next to a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tripcode {
    /// Short digest derived from the password
    pub digest: String,
    /// Badge background colour
    pub background_color: Color,
    /// Badge foreground colour
    pub foreground_color: Color,
}

/// Whether a user is currently watching the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watching {
    Yes,
    No,
    /// Presence is tentative or unknown to the server
    Unknown,
}

impl From<Option<bool>> for Watching {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::Yes,
            Some(false) => Self::No,
            None => Self::Unknown,
        }
    }
}

/// A viewer as described by the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Chosen display name; `None` means the default name applies
    pub name: Option<String>,
    /// Name colour
    pub color: Color,
    /// Optional tripcode
    pub tripcode: Option<Tripcode>,
    /// Whether this user is the broadcaster
    pub broadcaster: bool,
    /// Presence
    pub watching: Watching,
    /// Short identifier the server uses for anonymous users
    pub tag: Option<String>,
}

/// Display names used for users without a chosen name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultNames {
    pub broadcaster: String,
    pub anonymous: String,
}

impl Default for DefaultNames {
    fn default() -> Self {
        Self {
            broadcaster: "Broadcaster".to_string(),
            anonymous: "Anonymous".to_string(),
        }
    }
}

impl DefaultNames {
    /// Name to display for `user`.
    pub fn display_name<'a>(&'a self, user: &'a User) -> &'a str {
        match (&user.name, user.broadcaster) {
            (Some(name), _) => name,
            (None, true) => &self.broadcaster,
            (None, false) => &self.anonymous,
        }
    }
}

/// Uptime and viewer count reported over the WebSocket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamStats {
    /// Seconds since the stream started
    pub uptime: f64,
    /// Number of viewers currently watching
    pub viewership: u64,
}

/// A chat message as received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Sequence number (server-assigned, monotonic)
    pub seq: Seq,
    /// Author
    pub token_hash: TokenHash,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM:SS`
    pub time: String,
    /// Server-rendered markup
    pub markup: String,
}

/// The set of known users keyed by token hash.
///
/// Updates are keyed replacements, so replaying the same update is harmless.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    users: HashMap<TokenHash, User>,
}

impl Roster {
    /// Replace the whole roster.
    pub fn replace_all(&mut self, users: HashMap<TokenHash, User>) {
        self.users = users;
    }

    /// Insert or replace each user.
    pub fn set_users(&mut self, users: impl IntoIterator<Item = (TokenHash, User)>) {
        self.users.extend(users);
    }

    /// Remove each user; unknown hashes are ignored.
    pub fn remove_users<'a>(&mut self, token_hashes: impl IntoIterator<Item = &'a TokenHash>) {
        for token_hash in token_hashes {
            self.users.remove(token_hash);
        }
    }

    /// Look a user up.
    pub fn get(&self, token_hash: &TokenHash) -> Option<&User> {
        self.users.get(token_hash)
    }

    /// Iterate over all users.
    pub fn iter(&self) -> impl Iterator<Item = (&TokenHash, &User)> {
        self.users.iter()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Visible chat window bounded by the server scrollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageLog {
    messages: VecDeque<ChatMessage>,
    scrollback: usize,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::with_scrollback(DEFAULT_SCROLLBACK)
    }
}

impl MessageLog {
    /// Create an empty log keeping at most `scrollback` messages.
    pub fn with_scrollback(scrollback: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            scrollback,
        }
    }

    /// Change the bound, evicting the oldest messages if needed.
    pub fn set_scrollback(&mut self, scrollback: usize) {
        self.scrollback = scrollback;
        self.evict();
    }

    pub fn scrollback(&self) -> usize {
        self.scrollback
    }

    /// Synchronize with a snapshot.
    ///
    /// Messages absent from the snapshot are pruned first, then snapshot
    /// messages not held locally are appended. The result contains exactly
    /// the snapshot's messages (subject to scrollback), ordered by seq.
    ///
    /// # Returns
    ///
    /// The messages that were newly appended
    pub fn synchronize(&mut self, snapshot: Vec<ChatMessage>) -> Vec<ChatMessage> {
        let wanted: HashSet<Seq> = snapshot.iter().map(|m| m.seq).collect();
        self.messages.retain(|m| wanted.contains(&m.seq));

        let mut appended = Vec::new();
        for message in snapshot {
            if !self.contains(message.seq) {
                appended.push(message.clone());
                self.messages.push_back(message);
            }
        }
        self.messages.make_contiguous().sort_by_key(|m| m.seq);
        self.evict();
        appended
    }

    /// Append a message. Returns `false` when its seq is already held.
    pub fn append(&mut self, message: ChatMessage) -> bool {
        if self.contains(message.seq) {
            return false;
        }
        self.messages.push_back(message);
        self.evict();
        true
    }

    /// Delete messages by seq; returns the seqs actually removed.
    pub fn delete(&mut self, seqs: &[Seq]) -> Vec<Seq> {
        let targets: HashSet<Seq> = seqs.iter().copied().collect();
        let mut removed = Vec::new();
        self.messages.retain(|m| {
            if targets.contains(&m.seq) {
                removed.push(m.seq);
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn contains(&self, seq: Seq) -> bool {
        self.messages.iter().any(|m| m.seq == seq)
    }

    /// Sequence numbers currently held, oldest first.
    pub fn seqs(&self) -> Vec<Seq> {
        self.messages.iter().map(|m| m.seq).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn evict(&mut self) {
        while self.messages.len() > self.scrollback {
            self.messages.pop_front();
        }
    }
}
