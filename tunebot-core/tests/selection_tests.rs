// tests/selection_tests.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use tunebot_common::models::{Candidate, PresentationHandle, ResultSet, Selection};
use tunebot_common::traits::Notifier;
use tunebot_core::Error;
use tunebot_core::selection::{ReactionRouter, SelectionCollector};
use tunebot_core::test_utils::fakes::RecordingNotifier;
use tunebot_core::test_utils::helpers::*;

struct Harness {
    router: Arc<ReactionRouter>,
    notifier: Arc<RecordingNotifier>,
    collector: Arc<SelectionCollector>,
}

fn harness(window: Duration) -> Harness {
    let router = Arc::new(ReactionRouter::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let collector = Arc::new(SelectionCollector::new(Arc::clone(&router), notifier.clone(), window));
    Harness {
        router,
        notifier,
        collector,
    }
}

/// Presents `set` and starts collecting Alice's pick in a background task.
async fn start(h: &Harness, set: ResultSet) -> (PresentationHandle, JoinHandle<Result<Selection, Error>>) {
    let presentation = h.notifier.present_choices(&origin(1, ALICE), &set).await.unwrap();
    let collector = Arc::clone(&h.collector);
    let request = collector.request(set, user(ALICE));
    let p = presentation.clone();
    let task = tokio::spawn(async move { collector.collect(p, request).await });
    wait_for_gate(&h.router).await;
    (presentation, task)
}

#[tokio::test]
async fn test_requester_pick_resolves_selection() {
    let h = harness(Duration::from_secs(30));
    let (presentation, task) = start(&h, ResultSet::build(candidates(3)).unwrap()).await;

    assert!(h.router.dispatch(&pick(&presentation, ALICE, 2)));

    let selection = task.await.unwrap().unwrap();
    assert_eq!(selection.token.number(), 2);
    assert_eq!(selection.candidate.media_id(), Some("vid2"));
    assert_eq!(h.notifier.cleared(), vec![presentation.message]);
    assert_eq!(h.router.pending(), 0);
}

#[tokio::test]
async fn test_other_users_and_foreign_emoji_are_ignored() {
    let h = harness(Duration::from_secs(30));
    let (presentation, task) = start(&h, ResultSet::build(candidates(3)).unwrap()).await;

    assert!(!h.router.dispatch(&pick(&presentation, BOB, 1)));
    // 4️⃣ is not offered for a set of three.
    assert!(!h.router.dispatch(&reaction(&presentation, ALICE, "4️⃣")));
    assert!(!h.router.dispatch(&reaction(&presentation, ALICE, "👍")));
    assert!(!task.is_finished());

    assert!(h.router.dispatch(&pick(&presentation, ALICE, 3)));
    let selection = task.await.unwrap().unwrap();
    assert_eq!(selection.candidate.media_id(), Some("vid3"));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_fires_exactly_at_deadline() {
    let h = harness(Duration::from_secs(30));
    let set = ResultSet::build(candidates(5)).unwrap();
    let presentation = h.notifier.present_choices(&origin(1, ALICE), &set).await.unwrap();

    let started = Instant::now();
    let request = h.collector.request(set, user(ALICE));
    let deadline = request.deadline;
    let outcome = h.collector.collect(presentation.clone(), request).await;

    assert!(matches!(outcome, Err(Error::SelectionTimeout(w)) if w == Duration::from_secs(30)));
    let now = Instant::now();
    assert_eq!(deadline - started, Duration::from_secs(30));
    assert!(now >= deadline);
    assert!(now - deadline < Duration::from_millis(1));
    assert_eq!(h.notifier.cleared(), vec![presentation.message]);
    assert_eq!(h.router.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pick_just_before_deadline_still_counts() {
    let h = harness(Duration::from_secs(30));
    let (presentation, task) = start(&h, ResultSet::build(candidates(2)).unwrap()).await;

    tokio::time::sleep(Duration::from_millis(29_999)).await;
    assert!(h.router.dispatch(&pick(&presentation, ALICE, 1)));
    assert!(task.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_aborted_wait_clears_choices_once() {
    let h = harness(Duration::from_secs(30));
    let (presentation, task) = start(&h, ResultSet::build(candidates(3)).unwrap()).await;

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    h.notifier.wait_for_clears(1).await;

    tokio::task::yield_now().await;
    assert_eq!(h.notifier.cleared(), vec![presentation.message]);
    assert_eq!(h.router.pending(), 0);
    assert!(!h.router.dispatch(&pick(&presentation, ALICE, 1)));
}

#[tokio::test]
async fn test_candidate_without_media_id_is_invalid() {
    let h = harness(Duration::from_secs(30));
    let mut hits = candidates(2);
    hits[1] = Candidate {
        external_id: None,
        title: "A channel, not a video".into(),
        description: String::new(),
    };
    let (presentation, task) = start(&h, ResultSet::build(hits).unwrap()).await;

    assert!(h.router.dispatch(&pick(&presentation, ALICE, 2)));
    let outcome = task.await.unwrap();
    assert!(matches!(outcome, Err(Error::InvalidSelection(_))));
    assert_eq!(h.notifier.cleared().len(), 1);
}

#[tokio::test]
async fn test_second_wait_on_same_message_is_rejected() {
    let h = harness(Duration::from_secs(30));
    let set = ResultSet::build(candidates(2)).unwrap();
    let (presentation, task) = start(&h, set.clone()).await;

    let request = h.collector.request(set, user(BOB));
    let second = h.collector.collect(presentation.clone(), request).await;
    assert!(matches!(second, Err(Error::DuplicateSelectionInProgress(_))));

    // The rejected wait never started, so the first wait's choices stay up.
    assert!(h.notifier.cleared().is_empty());
    assert!(h.router.dispatch(&pick(&presentation, ALICE, 1)));
    assert!(task.await.unwrap().is_ok());
}
