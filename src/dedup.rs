use log::{debug, info};
use std::collections::{HashSet, VecDeque};

// ─── Identity ────────────────────────────────────────────────────────

/// Set-membership key for a subtitle: coarse element kind plus the exact
/// extracted text. Deliberately not normalized — two captions differing
/// only in case, inner whitespace or trailing punctuation are distinct
/// and each gets its own translation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub kind: String,
    pub text: String,
}

impl IdentityKey {
    pub fn new(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            text: text.into(),
        }
    }
}

// ─── Seen-identity set ───────────────────────────────────────────────

pub const SEEN_SET_CAP: usize = 100;

/// Insertion-ordered set of identities already dispatched this session.
/// Membership is O(1); eviction is oldest-inserted-first (not LRU) and
/// runs only when the caller asks, after a translation completes.
pub struct SeenSet {
    order: VecDeque<IdentityKey>,
    members: HashSet<IdentityKey>,
    cap: usize,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::with_cap(SEEN_SET_CAP)
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            order: VecDeque::new(),
            members: HashSet::new(),
            cap,
        }
    }

    /// Insert, returning false when the identity was already present.
    pub fn insert(&mut self, key: IdentityKey) -> bool {
        if !self.members.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        true
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.members.contains(key)
    }

    /// Drop oldest entries until the set is back within its bound.
    /// Returns the evicted keys, oldest first.
    pub fn evict_over_cap(&mut self) -> Vec<IdentityKey> {
        let mut evicted = Vec::new();
        while self.order.len() > self.cap {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
                debug!("seen set over cap, evicted oldest: \"{}\"", oldest.text);
                evicted.push(oldest);
            }
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tracker ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerState {
    /// No current subtitle text.
    Idle,
    /// A subtitle has been classified and dispatched (or is in flight).
    Tracking(IdentityKey),
}

/// What a poll tick decided about the container's current text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollVerdict {
    /// Same text as last tick; nothing to do, signal already handled.
    Unchanged,
    /// Text became empty: history invalidated, back to idle.
    Cleared,
    /// Text changed to a new non-empty value: history invalidated, the
    /// fresh container should be classified as a candidate.
    Changed,
    /// Text changed, but the tracked in-flight identity already covers
    /// it: the mutation path dispatched this caption instant first. The
    /// identity survives the wipe; nothing to dispatch.
    AlreadyTracked,
}

/// Dedup/identity state for one observation session. The poll path is the
/// sole authority for "did the caption change": any change it sees wipes
/// the whole seen set, because a changed caption means the previous
/// caption's context is gone. Mutation-sourced candidates only ever
/// consult and insert, never compare against last-observed text.
pub struct DedupTracker {
    seen: SeenSet,
    last_observed: String,
    state: TrackerState,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self {
            seen: SeenSet::new(),
            last_observed: String::new(),
            state: TrackerState::Idle,
        }
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            seen: SeenSet::with_cap(cap),
            last_observed: String::new(),
            state: TrackerState::Idle,
        }
    }

    /// Seed last-observed text at session start so the text already on
    /// screen is not double-handled by the first poll tick.
    pub fn prime(&mut self, text: &str) {
        if !text.is_empty() {
            self.last_observed = text.to_string();
        }
    }

    /// Classify a poll-tick extraction against the last observed text.
    pub fn observe_poll(&mut self, text: &str) -> PollVerdict {
        if text == self.last_observed {
            return PollVerdict::Unchanged;
        }
        // Any change invalidates the whole set, transient flicker included.
        self.seen.clear();
        if text.is_empty() {
            debug!("caption cleared, seen set wiped");
            self.last_observed.clear();
            self.state = TrackerState::Idle;
            return PollVerdict::Cleared;
        }
        self.last_observed = text.to_string();
        if let TrackerState::Tracking(key) = &self.state {
            if key.text == text {
                // The two signal sources straddled the same text change
                // and the mutation path won the race. Re-insert so later
                // redundant signals still see it; do not re-dispatch.
                let key = key.clone();
                self.seen.insert(key);
                debug!("caption change already tracked, seen set re-seeded");
                return PollVerdict::AlreadyTracked;
            }
        }
        debug!("caption changed, seen set wiped: \"{}\"", text);
        PollVerdict::Changed
    }

    /// Insert-before-dispatch: returns true exactly once per identity per
    /// session, regardless of how many redundant signals arrive and in
    /// which order the two signal sources straddle a change.
    pub fn try_begin(&mut self, key: IdentityKey) -> bool {
        if !self.seen.insert(key.clone()) {
            return false;
        }
        self.state = TrackerState::Tracking(key);
        true
    }

    /// Post-completion bookkeeping.
    pub fn evict_over_cap(&mut self) -> Vec<IdentityKey> {
        self.seen.evict_over_cap()
    }

    pub fn reset(&mut self) {
        info!("dedup tracker reset");
        self.seen.clear();
        self.last_observed.clear();
        self.state = TrackerState::Idle;
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn last_observed(&self) -> &str {
        &self.last_observed
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    pub fn has_seen(&self, key: &IdentityKey) -> bool {
        self.seen.contains(key)
    }
}

impl Default for DedupTracker {
    fn default() -> Self {
        Self::new()
    }
}
