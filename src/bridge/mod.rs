//! # Registration Bridge
//!
//! Synchronous hand-off between the HTTP tasks that receive registrations and
//! the single consumer loop that decides on them.
//!
//! ## Hand-off Protocol
//!
//! The bridge is a rendezvous point, not a queue. A consumer calling
//! [`Bridge::next_registration`] publishes a one-shot *slot*; a submitter waits
//! for a live slot and moves its [`PendingRequest`] through it. Nothing is
//! buffered ahead of a ready consumer, so when nobody is pulling every submitter
//! stays suspended and the HTTP layer applies backpressure naturally.
//!
//! Each pending request carries its own `oneshot` responder. The consumer gets
//! it wrapped in an [`AckNacker`], which enforces at-most-once delivery.
//!
//! ## Suspension Points
//!
//! - `submit` waiting for a consumer slot
//! - `submit` waiting for the outcome on its responder
//! - `next_registration` waiting for a submitter
//!
//! Dropping any of these futures is safe. A dropped consumer closes its slot,
//! and a request already handed through that slot goes back to the bridge,
//! where the next `next_registration` call takes it before anything else.
//! Closed slots are pruned whenever a new one is published. An abandoned
//! submit never reaches the consumer, and an outcome sent to an abandoned
//! caller is discarded without blocking.

mod ack_nacker;

pub use ack_nacker::{AckNacker, Delivery};

use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch, Mutex, Notify};
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::registration::Registration;

/// Response delivered to the waiting caller: an HTTP status and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status_code: u16,
    pub content: Bytes,
}

impl Outcome {
    pub fn new(status_code: u16, content: impl Into<Bytes>) -> Self {
        Self {
            status_code,
            content: content.into(),
        }
    }
}

/// Type alias for the per-request response channel
pub(crate) type OutcomeResponder = oneshot::Sender<Outcome>;

/// A consumer's readiness to take exactly one request
type HandoffSlot = oneshot::Sender<PendingRequest>;

/// A registration travelling from its HTTP task to the consumer
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub(crate) id: u64,
    pub(crate) registration: Registration,
    pub(crate) responder: OutcomeResponder,
    pub(crate) enqueued_at: Instant,
}

/// Counters describing bridge activity since construction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeProcessingStats {
    pub registrations_submitted: u64,
    pub registrations_delivered: u64,
    pub registrations_acked: u64,
    pub registrations_nacked: u64,
    /// Outcomes sent after the caller had stopped waiting
    pub responses_abandoned: u64,
    /// Acknowledgers dropped without an ack or nack
    pub responses_missing: u64,
    pub submissions_timed_out: u64,
}

pub(crate) type SharedStats = Arc<RwLock<BridgeProcessingStats>>;

async fn wait_closed(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also means the bridge is gone.
    let _ = shutdown.wait_for(|closed| *closed).await;
}

struct BridgeInner {
    /// Slots published by consumers, oldest first
    slots: parking_lot::Mutex<VecDeque<HandoffSlot>>,
    slot_published: Notify,
    /// Submitters queue on this fair mutex, which keeps hand-offs FIFO
    handoff_turn: Mutex<()>,
    /// Requests taken back from consumers dropped mid hand-off
    returned: parking_lot::Mutex<VecDeque<PendingRequest>>,
    request_returned: Notify,
    shutdown: watch::Sender<bool>,
    next_request_id: AtomicU64,
    stats: SharedStats,
}

impl BridgeInner {
    fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn publish_slot(&self, slot: HandoffSlot) {
        {
            let mut slots = self.slots.lock();
            slots.retain(|published| !published.is_closed());
            slots.push_back(slot);
        }
        self.slot_published.notify_one();
    }

    /// Keep a request whose consumer went away for the next consumer
    fn return_pending(&self, pending: PendingRequest) {
        let mut returned = self.returned.lock();
        if self.is_closed() {
            // Dropping the responder releases the caller.
            debug!(request_id = pending.id, "Bridge closed; releasing returned registration");
            return;
        }

        debug!(request_id = pending.id, "Registration returned by a cancelled consumer");
        returned.push_back(pending);
        drop(returned);
        self.request_returned.notify_one();
    }
}

/// Receiving end of a published slot
///
/// Dropped before its request was taken, it closes the slot and returns any
/// request already handed through it to the bridge.
struct SlotReceiver<'a> {
    handed: oneshot::Receiver<PendingRequest>,
    inner: &'a BridgeInner,
}

impl Drop for SlotReceiver<'_> {
    fn drop(&mut self) {
        self.handed.close();
        if let Ok(pending) = self.handed.try_recv() {
            self.inner.return_pending(pending);
        }
    }
}

/// Rendezvous between registration submitters and the consumer
///
/// Cheap to clone; every clone refers to the same hand-off point. Construct one
/// at startup, share it with the HTTP layer and the consumer loop, and call
/// [`Bridge::close`] at shutdown.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("closed", &self.is_closed())
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Bridge {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(BridgeInner {
                slots: parking_lot::Mutex::new(VecDeque::new()),
                slot_published: Notify::new(),
                handoff_turn: Mutex::new(()),
                returned: parking_lot::Mutex::new(VecDeque::new()),
                request_returned: Notify::new(),
                shutdown,
                next_request_id: AtomicU64::new(1),
                stats: Arc::new(RwLock::new(BridgeProcessingStats::default())),
            }),
        }
    }

    /// Hand a registration to the consumer and wait for its decision
    ///
    /// Suspends until a consumer takes the registration and then until it acks
    /// or nacks. No deadline is applied; see [`Bridge::submit_with_deadline`].
    pub async fn submit(&self, registration: Registration) -> Result<Outcome, BridgeError> {
        let request_id = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (responder, response_rx) = oneshot::channel();

        self.inner.stats.write().registrations_submitted += 1;

        let pending = PendingRequest {
            id: request_id,
            registration,
            responder,
            enqueued_at: Instant::now(),
        };

        self.hand_off(pending).await?;

        match response_rx.await {
            Ok(outcome) => {
                debug!(
                    request_id = request_id,
                    status_code = outcome.status_code,
                    "Consumer answered registration"
                );
                Ok(outcome)
            }
            Err(_) => {
                warn!(
                    request_id = request_id,
                    "Registration responder dropped without an outcome"
                );
                Err(BridgeError::ConsumerUnavailable)
            }
        }
    }

    /// Like [`Bridge::submit`] but gives up once `deadline` has elapsed
    ///
    /// A registration abandoned before hand-off never reaches the consumer. One
    /// abandoned after hand-off still does, and its outcome is discarded.
    pub async fn submit_with_deadline(
        &self,
        registration: Registration,
        deadline: Duration,
    ) -> Result<Outcome, BridgeError> {
        match tokio::time::timeout(deadline, self.submit(registration)).await {
            Ok(result) => result,
            Err(_) => {
                self.inner.stats.write().submissions_timed_out += 1;
                Err(BridgeError::Timeout {
                    elapsed_ms: deadline.as_millis() as u64,
                })
            }
        }
    }

    async fn hand_off(&self, mut pending: PendingRequest) -> Result<(), BridgeError> {
        let mut shutdown = self.inner.shutdown.subscribe();
        if *shutdown.borrow() {
            return Err(BridgeError::Closed);
        }

        let _turn = tokio::select! {
            guard = self.inner.handoff_turn.lock() => guard,
            _ = wait_closed(&mut shutdown) => return Err(BridgeError::Closed),
        };

        loop {
            let next_slot = self.inner.slots.lock().pop_front();
            let slot = match next_slot {
                Some(slot) => slot,
                None => {
                    // notify_one keeps a permit, so a slot published between
                    // the pop and this wait still wakes us.
                    tokio::select! {
                        _ = self.inner.slot_published.notified() => {}
                        _ = wait_closed(&mut shutdown) => return Err(BridgeError::Closed),
                    }
                    continue;
                }
            };

            match slot.send(pending) {
                Ok(()) => return Ok(()),
                Err(returned) => {
                    debug!(request_id = returned.id, "Skipping abandoned consumer slot");
                    pending = returned;
                }
            }
        }
    }

    /// Wait for the next registration and the capability to answer it
    ///
    /// Fails only with [`BridgeError::Closed`] once the bridge is shut down.
    /// Cancel safe: a registration handed to a dropped call is delivered by
    /// the next one.
    pub async fn next_registration(&self) -> Result<(Registration, AckNacker), BridgeError> {
        let mut shutdown = self.inner.shutdown.subscribe();

        loop {
            if *shutdown.borrow_and_update() {
                return Err(BridgeError::Closed);
            }

            let next_returned = self.inner.returned.lock().pop_front();
            if let Some(pending) = next_returned {
                return Ok(self.deliver(pending));
            }

            let (slot, handed) = oneshot::channel();
            let mut receiver = SlotReceiver {
                handed,
                inner: &self.inner,
            };
            self.inner.publish_slot(slot);

            let pending = tokio::select! {
                biased;
                handed = &mut receiver.handed => match handed {
                    Ok(pending) => pending,
                    Err(_) => continue,
                },
                // Dropping the receiver on `continue` returns anything that
                // raced in, and the loop picks it up from `returned`.
                _ = self.inner.request_returned.notified() => continue,
                _ = wait_closed(&mut shutdown) => return Err(BridgeError::Closed),
            };

            return Ok(self.deliver(pending));
        }
    }

    fn deliver(&self, pending: PendingRequest) -> (Registration, AckNacker) {
        self.inner.stats.write().registrations_delivered += 1;

        debug!(
            request_id = pending.id,
            waited_ms = pending.enqueued_at.elapsed().as_millis() as u64,
            "Registration handed to consumer"
        );

        let acker = AckNacker::new(pending.id, pending.responder, self.inner.stats.clone());
        (pending.registration, acker)
    }

    /// Shut the bridge down
    ///
    /// Wakes every suspended submitter and consumer with [`BridgeError::Closed`].
    /// Registrations already handed to the consumer can still be answered;
    /// ones returned by cancelled consumers are released as unavailable.
    pub fn close(&self) {
        let was_open = !self.inner.shutdown.send_replace(true);
        let released: Vec<PendingRequest> = self.inner.returned.lock().drain(..).collect();
        if was_open {
            info!(released = released.len(), "Registration bridge closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Snapshot of the processing counters
    pub fn stats(&self) -> BridgeProcessingStats {
        self.inner.stats.read().clone()
    }

    #[cfg(test)]
    fn published_slots(&self) -> usize {
        self.inner.slots.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::DevAddr;

    fn registration(addr: &str) -> Registration {
        Registration::new(addr.parse::<DevAddr>().unwrap())
    }

    /// Hand a registration to a consumer future, then drop that future
    /// before it is polled again
    async fn hand_off_to_cancelled_consumer(
        bridge: &Bridge,
    ) -> tokio::task::JoinHandle<Result<Outcome, BridgeError>> {
        let mut consumer = Box::pin(bridge.next_registration());

        // One poll publishes the slot.
        let idle = tokio::time::timeout(Duration::from_millis(20), &mut consumer).await;
        assert!(idle.is_err());
        assert_eq!(bridge.published_slots(), 1);

        let submitter = bridge.clone();
        let submit_task =
            tokio::spawn(async move { submitter.submit(registration("26001ADA")).await });

        tokio::time::timeout(Duration::from_secs(1), async {
            while bridge.published_slots() != 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("submitter should take the published slot");

        drop(consumer);
        submit_task
    }

    #[tokio::test]
    async fn test_submit_receives_ack() {
        let bridge = Bridge::new();
        let consumer = bridge.clone();

        let consumer_task = tokio::spawn(async move {
            let (registration, acker) = consumer.next_registration().await.unwrap();
            assert_eq!(registration.dev_addr.to_string(), "26001ADA");
            acker.ack(200, "registered").unwrap()
        });

        let outcome = bridge.submit(registration("26001ADA")).await.unwrap();
        assert_eq!(outcome, Outcome::new(200, "registered"));
        assert_eq!(consumer_task.await.unwrap(), Delivery::Delivered);

        let stats = bridge.stats();
        assert_eq!(stats.registrations_submitted, 1);
        assert_eq!(stats.registrations_delivered, 1);
        assert_eq!(stats.registrations_acked, 1);
    }

    #[tokio::test]
    async fn test_submit_receives_nack() {
        let bridge = Bridge::new();
        let consumer = bridge.clone();

        tokio::spawn(async move {
            let (_, acker) = consumer.next_registration().await.unwrap();
            acker.nack(409, "device already registered").unwrap();
        });

        let outcome = bridge.submit(registration("26001ADA")).await.unwrap();
        assert_eq!(outcome.status_code, 409);
        assert_eq!(&outcome.content[..], b"device already registered");
        assert_eq!(bridge.stats().registrations_nacked, 1);
    }

    #[tokio::test]
    async fn test_submit_blocks_without_consumer() {
        let bridge = Bridge::new();

        let result = tokio::time::timeout(
            Duration::from_millis(100),
            bridge.submit(registration("26001ADA")),
        )
        .await;

        assert!(result.is_err(), "submit must not complete without a consumer");
    }

    #[tokio::test]
    async fn test_submit_with_deadline_times_out() {
        let bridge = Bridge::new();

        let err = bridge
            .submit_with_deadline(registration("26001ADA"), Duration::from_millis(50))
            .await
            .unwrap_err();

        assert_eq!(err, BridgeError::Timeout { elapsed_ms: 50 });
        assert_eq!(bridge.stats().submissions_timed_out, 1);
    }

    #[tokio::test]
    async fn test_timed_out_submit_never_reaches_consumer() {
        let bridge = Bridge::new();
        let _ = bridge
            .submit_with_deadline(registration("26001ADA"), Duration::from_millis(20))
            .await;

        let consumer = bridge.clone();
        let consumer_task = tokio::spawn(async move {
            let (registration, acker) = consumer.next_registration().await.unwrap();
            acker.ack(200, "ok").unwrap();
            registration
        });

        let outcome = bridge.submit(registration("26001ADB")).await.unwrap();
        assert_eq!(outcome.status_code, 200);
        assert_eq!(
            consumer_task.await.unwrap().dev_addr.to_string(),
            "26001ADB"
        );
    }

    #[tokio::test]
    async fn test_dropped_acker_reports_consumer_unavailable() {
        let bridge = Bridge::new();
        let consumer = bridge.clone();

        tokio::spawn(async move {
            let (_, acker) = consumer.next_registration().await.unwrap();
            drop(acker);
        });

        let err = bridge.submit(registration("26001ADA")).await.unwrap_err();
        assert_eq!(err, BridgeError::ConsumerUnavailable);
        assert_eq!(bridge.stats().responses_missing, 1);
    }

    #[tokio::test]
    async fn test_ack_after_caller_abandoned_does_not_block() {
        let bridge = Bridge::new();
        let consumer = bridge.clone();
        let (acker_tx, acker_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (_, acker) = consumer.next_registration().await.unwrap();
            let _ = acker_tx.send(acker);
        });

        let submit = bridge.submit_with_deadline(registration("26001ADA"), Duration::from_millis(100));
        let acker = {
            let (result, acker) = tokio::join!(submit, acker_rx);
            assert!(matches!(result, Err(BridgeError::Timeout { .. })));
            acker.unwrap()
        };

        assert_eq!(acker.ack(200, "late").unwrap(), Delivery::Abandoned);
        assert_eq!(bridge.stats().responses_abandoned, 1);
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_consumer() {
        let bridge = Bridge::new();
        let consumer = bridge.clone();

        let consumer_task = tokio::spawn(async move { consumer.next_registration().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        bridge.close();

        let result = consumer_task.await.unwrap();
        assert!(matches!(result, Err(BridgeError::Closed)));
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_submitter() {
        let bridge = Bridge::new();
        let submitter = bridge.clone();

        let submit_task =
            tokio::spawn(async move { submitter.submit(registration("26001ADA")).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        bridge.close();

        assert_eq!(submit_task.await.unwrap(), Err(BridgeError::Closed));
        assert!(bridge.is_closed());
        assert_eq!(
            bridge.submit(registration("26001ADA")).await,
            Err(BridgeError::Closed)
        );
    }

    #[tokio::test]
    async fn test_cancelled_consumer_slot_is_skipped() {
        let bridge = Bridge::new();

        // A consumer that gives up leaves a dead slot behind.
        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), bridge.next_registration()).await;
        assert!(abandoned.is_err());

        let consumer = bridge.clone();
        tokio::spawn(async move {
            let (_, acker) = consumer.next_registration().await.unwrap();
            acker.ack(201, "created").unwrap();
        });

        let outcome = bridge.submit(registration("26001ADA")).await.unwrap();
        assert_eq!(outcome.status_code, 201);
    }

    #[tokio::test]
    async fn test_each_registration_delivered_once() {
        let bridge = Bridge::new();
        let consumer = bridge.clone();

        let consumer_task = tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..5 {
                let (registration, acker) = consumer.next_registration().await.unwrap();
                seen.push(registration.dev_addr.to_string());
                acker.ack(200, registration.dev_addr.to_string()).unwrap();
            }
            seen
        });

        let mut submits = Vec::new();
        for i in 0..5u8 {
            let submitter = bridge.clone();
            submits.push(tokio::spawn(async move {
                let addr = DevAddr::new([0x26, 0x00, 0x1A, i]);
                let outcome = submitter.submit(Registration::new(addr)).await.unwrap();
                assert_eq!(outcome.content, Bytes::from(addr.to_string()));
            }));
        }
        for submit in submits {
            submit.await.unwrap();
        }

        let mut seen = consumer_task.await.unwrap();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn test_registration_survives_consumer_cancelled_after_hand_off() {
        let bridge = Bridge::new();
        let submit_task = hand_off_to_cancelled_consumer(&bridge).await;

        let (registration, acker) =
            tokio::time::timeout(Duration::from_secs(1), bridge.next_registration())
                .await
                .expect("returned registration should be delivered")
                .unwrap();
        assert_eq!(registration.dev_addr.to_string(), "26001ADA");
        acker.ack(200, "registered").unwrap();

        let outcome = submit_task.await.unwrap().unwrap();
        assert_eq!(outcome, Outcome::new(200, "registered"));
        assert_eq!(bridge.stats().registrations_delivered, 1);
    }

    #[tokio::test]
    async fn test_close_releases_returned_registration() {
        let bridge = Bridge::new();
        let submit_task = hand_off_to_cancelled_consumer(&bridge).await;

        bridge.close();

        assert_eq!(
            submit_task.await.unwrap(),
            Err(BridgeError::ConsumerUnavailable)
        );
        assert!(matches!(
            bridge.next_registration().await,
            Err(BridgeError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_cancelled_consumers_do_not_accumulate_slots() {
        let bridge = Bridge::new();

        for _ in 0..1_000 {
            let _ =
                tokio::time::timeout(Duration::from_micros(1), bridge.next_registration()).await;
        }
        assert!(bridge.published_slots() <= 1);

        let consumer = bridge.clone();
        tokio::spawn(async move {
            let (_, acker) = consumer.next_registration().await.unwrap();
            acker.ack(200, "ok").unwrap();
        });

        let outcome = bridge.submit(registration("26001ADA")).await.unwrap();
        assert_eq!(outcome.status_code, 200);
    }

    #[tokio::test]
    async fn test_waiting_submitters_are_served_in_arrival_order() {
        let bridge = Bridge::new();

        let mut submits = Vec::new();
        for i in 0..5u8 {
            let submitter = bridge.clone();
            submits.push(tokio::spawn(async move {
                let addr = DevAddr::new([0x26, 0x00, 0x1A, i]);
                submitter.submit(Registration::new(addr)).await
            }));
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let mut arrival_order = Vec::new();
        for _ in 0..5 {
            let (registration, acker) = bridge.next_registration().await.unwrap();
            arrival_order.push(registration.dev_addr.as_bytes()[3]);
            acker.ack(200, "ok").unwrap();
        }
        assert_eq!(arrival_order, vec![0, 1, 2, 3, 4]);

        for submit in submits {
            assert_eq!(submit.await.unwrap().unwrap().status_code, 200);
        }
    }
}
