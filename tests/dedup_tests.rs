use nrk_subtitle_translator::dedup::{
    DedupTracker, IdentityKey, PollVerdict, SeenSet, TrackerState, SEEN_SET_CAP,
};

fn key(text: &str) -> IdentityKey {
    IdentityKey::new("SPAN", text)
}

// =========================================================================
// SeenSet
// =========================================================================

#[test]
fn duplicate_insert_is_rejected() {
    let mut seen = SeenSet::new();
    assert!(seen.insert(key("Hei")));
    assert!(!seen.insert(key("Hei")), "second insert of same identity");
    assert_eq!(seen.len(), 1);
}

#[test]
fn identities_differing_only_by_punctuation_are_distinct() {
    let mut seen = SeenSet::new();
    assert!(seen.insert(key("Hei")));
    assert!(seen.insert(key("Hei!")), "trailing punctuation is significant");
    assert!(seen.insert(IdentityKey::new("DIV", "Hei")), "element kind is significant");
    assert_eq!(seen.len(), 3);
}

#[test]
fn eviction_removes_oldest_inserted_first() {
    let mut seen = SeenSet::with_cap(3);
    for t in ["a", "b", "c", "d"] {
        seen.insert(key(t));
    }
    // Membership of "a" does not protect it: eviction is insertion-order,
    // not LRU-by-access.
    assert!(seen.contains(&key("a")));
    let evicted = seen.evict_over_cap();
    assert_eq!(evicted, vec![key("a")]);
    assert_eq!(seen.len(), 3);
    assert!(!seen.contains(&key("a")));
    assert!(seen.contains(&key("d")));
}

#[test]
fn set_never_exceeds_cap_after_eviction_pass() {
    let mut seen = SeenSet::new();
    for i in 0..=SEEN_SET_CAP {
        seen.insert(key(&format!("caption {}", i)));
    }
    assert_eq!(seen.len(), SEEN_SET_CAP + 1);
    let evicted = seen.evict_over_cap();
    assert_eq!(evicted, vec![key("caption 0")], "oldest entry goes first");
    assert_eq!(seen.len(), SEEN_SET_CAP);
}

// =========================================================================
// DedupTracker poll transitions
// =========================================================================

#[test]
fn unchanged_text_is_a_no_op() {
    let mut tracker = DedupTracker::new();
    assert_eq!(tracker.observe_poll("Hei"), PollVerdict::Changed);
    assert!(tracker.try_begin(key("Hei")));
    assert_eq!(tracker.observe_poll("Hei"), PollVerdict::Unchanged);
    assert_eq!(tracker.seen_len(), 1, "no-op leaves the set alone");
}

#[test]
fn empty_text_clears_set_and_last_observed() {
    let mut tracker = DedupTracker::new();
    tracker.observe_poll("Hei");
    tracker.try_begin(key("Hei"));

    assert_eq!(tracker.observe_poll(""), PollVerdict::Cleared);
    assert_eq!(tracker.seen_len(), 0);
    assert_eq!(tracker.last_observed(), "");
    assert_eq!(*tracker.state(), TrackerState::Idle);
}

#[test]
fn changed_text_wipes_history_before_new_identity_goes_in() {
    let mut tracker = DedupTracker::new();
    tracker.observe_poll("Hei");
    tracker.try_begin(key("Hei"));
    tracker.observe_poll("Hei!");
    tracker.try_begin(key("Hei!"));

    assert_eq!(tracker.observe_poll("Takk"), PollVerdict::Changed);
    assert_eq!(tracker.seen_len(), 0, "old identities are not stragglers");
    assert!(!tracker.has_seen(&key("Hei")));
    assert!(tracker.try_begin(key("Takk")));
    assert_eq!(*tracker.state(), TrackerState::Tracking(key("Takk")));
}

#[test]
fn caption_reappearing_after_flicker_is_retranslatable() {
    // Deliberate: a blank flicker between captions invalidates history,
    // so the same text coming back verbatim counts as novel again.
    let mut tracker = DedupTracker::new();
    tracker.observe_poll("Hei");
    tracker.try_begin(key("Hei"));
    tracker.observe_poll("");
    assert_eq!(tracker.observe_poll("Hei"), PollVerdict::Changed);
    assert!(tracker.try_begin(key("Hei")), "novel again after the wipe");
}

#[test]
fn straddled_change_already_dispatched_by_mutation_is_not_redispatched() {
    let mut tracker = DedupTracker::new();
    // Mutation path classifies the fresh caption first.
    assert!(tracker.try_begin(key("Takk")));
    // The poll then notices the same "" → "Takk" change.
    assert_eq!(tracker.observe_poll("Takk"), PollVerdict::AlreadyTracked);
    assert_eq!(tracker.last_observed(), "Takk");
    assert!(
        tracker.has_seen(&key("Takk")),
        "tracked identity survives the wipe so later signals still dedup"
    );
    assert!(!tracker.try_begin(key("Takk")), "still at most one dispatch");
}

#[test]
fn priming_prevents_initial_text_from_reading_as_a_change() {
    let mut tracker = DedupTracker::new();
    tracker.prime("Hei");
    assert_eq!(tracker.observe_poll("Hei"), PollVerdict::Unchanged);
}

#[test]
fn reset_returns_to_idle() {
    let mut tracker = DedupTracker::new();
    tracker.observe_poll("Hei");
    tracker.try_begin(key("Hei"));
    tracker.reset();
    assert_eq!(tracker.seen_len(), 0);
    assert_eq!(tracker.last_observed(), "");
    assert_eq!(*tracker.state(), TrackerState::Idle);
}

#[test]
fn tracker_eviction_respects_configured_cap() {
    let mut tracker = DedupTracker::with_cap(2);
    tracker.observe_poll("a");
    tracker.try_begin(key("a"));
    // Mutation-sourced inserts pile up within the same caption instant.
    tracker.try_begin(key("b"));
    tracker.try_begin(key("c"));
    let evicted = tracker.evict_over_cap();
    assert_eq!(evicted, vec![key("a")]);
}
