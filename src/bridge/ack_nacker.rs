//! Single-use acknowledgement capability handed to the consumer.

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use super::{Outcome, OutcomeResponder, SharedStats};
use crate::error::BridgeError;

/// What happened to an outcome once it was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The original caller was still waiting and received the outcome
    Delivered,
    /// The caller had already given up; the outcome was discarded
    Abandoned,
}

#[derive(Debug, Clone, Copy)]
enum Decision {
    Ack,
    Nack,
}

/// Answers exactly one pending registration
///
/// The first call to [`AckNacker::ack`] or [`AckNacker::nack`] delivers an
/// [`Outcome`] to the waiting caller. Any later call is a contract violation
/// and fails with [`BridgeError::AlreadyResponded`] without delivering
/// anything. Dropping an unanswered `AckNacker` releases the caller with
/// [`BridgeError::ConsumerUnavailable`].
#[derive(Debug)]
pub struct AckNacker {
    request_id: u64,
    responder: Mutex<Option<OutcomeResponder>>,
    stats: SharedStats,
}

impl AckNacker {
    pub(crate) fn new(request_id: u64, responder: OutcomeResponder, stats: SharedStats) -> Self {
        Self {
            request_id,
            responder: Mutex::new(Some(responder)),
            stats,
        }
    }

    /// Identifier of the registration this acknowledger answers
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Accept the registration with a success status and body
    pub fn ack(&self, status_code: u16, content: impl Into<Bytes>) -> Result<Delivery, BridgeError> {
        self.respond(Decision::Ack, Outcome::new(status_code, content))
    }

    /// Reject the registration
    ///
    /// `status_code` should be a 4xx or 5xx code; the range is not enforced here.
    pub fn nack(&self, status_code: u16, content: impl Into<Bytes>) -> Result<Delivery, BridgeError> {
        self.respond(Decision::Nack, Outcome::new(status_code, content))
    }

    /// Whether an outcome has already been sent
    pub fn is_answered(&self) -> bool {
        self.responder.lock().is_none()
    }

    fn respond(&self, decision: Decision, outcome: Outcome) -> Result<Delivery, BridgeError> {
        let Some(responder) = self.responder.lock().take() else {
            error!(
                request_id = self.request_id,
                decision = ?decision,
                status_code = outcome.status_code,
                "Registration answered more than once; outcome dropped"
            );
            return Err(BridgeError::AlreadyResponded {
                request_id: self.request_id,
            });
        };

        {
            let mut stats = self.stats.write();
            match decision {
                Decision::Ack => stats.registrations_acked += 1,
                Decision::Nack => stats.registrations_nacked += 1,
            }
        }

        let status_code = outcome.status_code;
        match responder.send(outcome) {
            Ok(()) => {
                debug!(
                    request_id = self.request_id,
                    decision = ?decision,
                    status_code = status_code,
                    "Outcome delivered"
                );
                Ok(Delivery::Delivered)
            }
            Err(_) => {
                self.stats.write().responses_abandoned += 1;
                warn!(
                    request_id = self.request_id,
                    decision = ?decision,
                    status_code = status_code,
                    "Caller stopped waiting before the outcome arrived"
                );
                Ok(Delivery::Abandoned)
            }
        }
    }
}

impl Drop for AckNacker {
    fn drop(&mut self) {
        if self.responder.get_mut().is_some() {
            self.stats.write().responses_missing += 1;
            warn!(
                request_id = self.request_id,
                "AckNacker dropped without ack or nack"
            );
        }
    }
}
