//! Single-flight and coalescing guarantees of the indexing queue.
//!
//! These tests run on the current-thread runtime: a spawned index pass does
//! not begin until the test first awaits, which makes the
//! coalescing windows deterministic.

mod support;

use std::fs;

use cindex::{
   error::Error,
   indexer::IndexSource,
   queue::IndexOutcome,
};
use tokio::sync::watch;

async fn wait_outcome(mut rx: watch::Receiver<Option<IndexOutcome>>) -> IndexOutcome {
   loop {
      let current = rx.borrow_and_update().clone();
      if let Some(outcome) = current {
         return outcome;
      }
      rx.changed().await.expect("index task dropped");
   }
}

#[tokio::test]
async fn concurrent_requests_share_exactly_one_pass() {
   let fixture = support::queue_fixture();
   fs::write(fixture.workspace.join("a.rs"), "fn a() {}\n").unwrap();
   fs::write(fixture.workspace.join("b.rs"), "fn b() {}\n").unwrap();

   let (id1, coalesced1, rx1) = fixture.queue.request(IndexSource::Manual, false);
   let (id2, coalesced2, rx2) = fixture.queue.request(IndexSource::Manual, false);

   assert_eq!(id1, id2, "second request must join the first task");
   assert!(!coalesced1);
   assert!(coalesced2);

   let first = wait_outcome(rx1).await.unwrap();
   let second = wait_outcome(rx2).await.unwrap();

   // Both callers observe the same pass: both see the two files indexed. A
   // second underlying pass would have found nothing left to do.
   assert_eq!(first.indexed, 2);
   assert_eq!(second.indexed, 2);

   // After completion a new request starts a fresh pass with nothing to do.
   let next = fixture
      .queue
      .request_and_wait(IndexSource::Manual, false)
      .await
      .unwrap();
   assert_eq!(next.indexed, 0);
   assert_eq!(next.skipped, 2);
}

#[tokio::test]
async fn coalesced_waiters_all_see_the_same_failure() {
   let fixture = support::broken_queue_fixture();

   let (_id1, _c1, rx1) = fixture.queue.request(IndexSource::Manual, false);
   let (_id2, c2, rx2) = fixture.queue.request(IndexSource::Manual, false);
   assert!(c2);

   let first = wait_outcome(rx1).await;
   let second = wait_outcome(rx2).await;

   assert!(matches!(
      first.as_ref().unwrap_err().as_ref(),
      Error::WorkspaceUnavailable(_)
   ));
   assert!(matches!(
      second.as_ref().unwrap_err().as_ref(),
      Error::WorkspaceUnavailable(_)
   ));

   // The queue stays serviceable after a failed pass.
   let (id3, coalesced3, rx3) = fixture.queue.request(IndexSource::Manual, false);
   assert!(!coalesced3);
   assert!(!id3.is_empty());
   let _ = wait_outcome(rx3).await;
}

#[tokio::test]
async fn force_upgrades_a_queued_run_and_shares_its_outcome() {
   let fixture = support::queue_fixture();
   fs::write(fixture.workspace.join("a.rs"), "fn a() {}\n").unwrap();

   // Establish a completed index so an incremental pass would not rebuild.
   fixture
      .queue
      .request_and_wait(IndexSource::Manual, false)
      .await
      .unwrap();

   let (id1, _c1, rx1) = fixture.queue.request(IndexSource::Manual, false);
   let (id2, coalesced2, _rx2) = fixture.queue.request(IndexSource::Manual, true);
   assert_eq!(id1, id2);
   assert!(coalesced2);

   let outcome = wait_outcome(rx1).await.unwrap();
   assert!(
      outcome.full_rebuild,
      "queued run must have been upgraded to forced before it started"
   );
   assert_eq!(outcome.indexed, 1);
}

#[tokio::test]
async fn watch_changes_feed_the_dirty_set_until_the_next_pass() {
   let fixture = support::queue_fixture();
   fs::write(fixture.workspace.join("a.rs"), "fn a() {}\n").unwrap();

   fixture
      .queue
      .note_changes(vec![fixture.workspace.join("a.rs")]);
   assert_eq!(fixture.queue.pending_changes(), 1);

   fixture
      .queue
      .request_and_wait(IndexSource::Watch, false)
      .await
      .unwrap();
   assert_eq!(fixture.queue.pending_changes(), 0);
}
