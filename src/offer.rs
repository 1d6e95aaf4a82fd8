use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::Error;

/// Offer rounds older than this are reclaimed by the sweeper.
pub const OFFER_TTL_MINUTES: i64 = 10;

/// Why an accept attempt lost. Losing a race is an expected outcome, so
/// these travel inside [`AcceptOutcome`] rather than as errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    OfferExpired,
    AlreadyAcceptedByOther,
    NotOffered,
    NotAvailable,
}

#[derive(Clone, Debug, Serialize)]
pub struct AcceptOutcome {
    pub won: bool,
    pub reason: Option<RejectReason>,
}

impl AcceptOutcome {
    pub fn won() -> Self {
        Self {
            won: true,
            reason: None,
        }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            won: false,
            reason: Some(reason),
        }
    }
}

/// Result of per-ride arbitration. A win carries the drained losers
/// (driver id, push address) so the caller can send withdrawal notices.
#[derive(Debug)]
pub enum Arbitration {
    Won {
        withdrawn: Vec<(Uuid, Option<String>)>,
    },
    Rejected(RejectReason),
}

#[derive(Debug)]
pub enum RejectAck {
    Noted,
    Exhausted,
    NoRound,
}

/// Ephemeral record of one ride's dispatch attempt: which drivers hold an
/// unexpired offer and whether any of them has won.
#[derive(Debug)]
struct OfferRound {
    candidates: HashMap<Uuid, Option<String>>,
    accepted: bool,
    winner: Option<Uuid>,
    created_at: DateTime<Utc>,
}

/// In-memory map of ride id -> offer round, with one async mutex per round
/// so accept attempts for the same ride serialize while unrelated rides
/// proceed in parallel. Never persisted; rounds are lost on restart and the
/// affected rides simply stay pending.
pub struct OfferBoard {
    rounds: DashMap<Uuid, Arc<Mutex<OfferRound>>>,
    max_age: Duration,
}

impl OfferBoard {
    pub fn new(max_age: Duration) -> Self {
        Self {
            rounds: DashMap::new(),
            max_age,
        }
    }

    fn round(&self, ride_id: Uuid) -> Option<Arc<Mutex<OfferRound>>> {
        // clone the Arc out so no shard lock is held across an await
        self.rounds.get(&ride_id).map(|entry| entry.value().clone())
    }

    /// Record a fan-out. Returns false while a live (unaccepted, unexpired)
    /// round already exists, suppressing duplicate broadcasts; an accepted
    /// or expired round is replaced.
    pub async fn open_round(
        &self,
        ride_id: Uuid,
        candidates: HashMap<Uuid, Option<String>>,
        now: DateTime<Utc>,
    ) -> bool {
        if let Some(existing) = self.round(ride_id) {
            let round = existing.lock().await;
            if !round.accepted && now - round.created_at < self.max_age {
                return false;
            }
        }

        let round = OfferRound {
            candidates,
            accepted: false,
            winner: None,
            created_at: now,
        };
        self.rounds.insert(ride_id, Arc::new(Mutex::new(round)));

        true
    }

    /// Resolve one accept attempt. The whole check-and-flip sequence runs
    /// under this ride's round mutex: no round, an already-set acceptance
    /// flag, a missing candidate, or a failed persisted-status probe reject
    /// the caller; otherwise the flag flips and the candidate set drains.
    ///
    /// The probe runs inside the critical section; everything slower (the
    /// storage transaction, push sends) happens after release. The returned
    /// win is never rolled back here — the transactional mutator is the
    /// final authority on persisted state, the flag only stops other
    /// drivers from winning concurrently.
    pub async fn try_accept<F, Fut>(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
        persisted_pending: F,
    ) -> Result<Arbitration, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool, Error>>,
    {
        let round = match self.round(ride_id) {
            Some(round) => round,
            None => return Ok(Arbitration::Rejected(RejectReason::OfferExpired)),
        };

        let mut round = round.lock().await;

        if round.accepted {
            return Ok(Arbitration::Rejected(RejectReason::AlreadyAcceptedByOther));
        }

        if !round.candidates.contains_key(&driver_id) {
            return Ok(Arbitration::Rejected(RejectReason::NotOffered));
        }

        if !persisted_pending().await? {
            return Ok(Arbitration::Rejected(RejectReason::NotAvailable));
        }

        round.accepted = true;
        round.winner = Some(driver_id);

        let withdrawn = round
            .candidates
            .drain()
            .filter(|(id, _)| *id != driver_id)
            .collect();

        Ok(Arbitration::Won { withdrawn })
    }

    /// Shrink the candidate set. When the last candidate of an unaccepted
    /// round walks away the round is dropped and the caller is told the
    /// offer is exhausted.
    pub async fn reject(&self, ride_id: Uuid, driver_id: Uuid) -> RejectAck {
        let round = match self.round(ride_id) {
            Some(round) => round,
            None => return RejectAck::NoRound,
        };

        let mut guard = round.lock().await;
        guard.candidates.remove(&driver_id);

        if !guard.accepted && guard.candidates.is_empty() {
            drop(guard);
            self.rounds.remove_if(&ride_id, |_, v| Arc::ptr_eq(v, &round));
            return RejectAck::Exhausted;
        }

        RejectAck::Noted
    }

    /// Drop the round on a terminal ride transition.
    pub fn close(&self, ride_id: Uuid) {
        self.rounds.remove(&ride_id);
    }

    /// Reclaim rounds older than the board's max age. Returns the ride ids
    /// of reclaimed *unaccepted* rounds (those rides stay pending); stale
    /// accepted rounds are garbage-collected silently. Rounds locked by an
    /// in-flight accept are skipped until the next pass.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        let mut stale = vec![];

        for entry in self.rounds.iter() {
            if let Ok(round) = entry.value().try_lock() {
                if now - round.created_at >= self.max_age {
                    stale.push((*entry.key(), entry.value().clone(), round.accepted));
                }
            }
        }

        let mut reclaimed = vec![];
        for (ride_id, round, accepted) in stale {
            // remove only the round that was scanned: a re-broadcast may
            // have already replaced it, and the replacement must survive
            let removed = self
                .rounds
                .remove_if(&ride_id, |_, v| Arc::ptr_eq(v, &round))
                .is_some();
            if removed && !accepted {
                reclaimed.push(ride_id);
            }
        }

        reclaimed
    }

    pub async fn winner(&self, ride_id: Uuid) -> Option<Uuid> {
        let round = self.round(ride_id)?;
        let guard = round.lock().await;
        guard.winner
    }

    pub async fn candidate_count(&self, ride_id: Uuid) -> Option<usize> {
        let round = self.round(ride_id)?;
        let guard = round.lock().await;
        Some(guard.candidates.len())
    }
}

impl Default for OfferBoard {
    fn default() -> Self {
        Self::new(Duration::minutes(OFFER_TTL_MINUTES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;

    fn candidates(ids: &[Uuid]) -> HashMap<Uuid, Option<String>> {
        ids.iter().map(|id| (*id, Some(format!("push:{}", id)))).collect()
    }

    #[tokio::test]
    async fn exactly_one_winner_under_contention() {
        let board = Arc::new(OfferBoard::default());
        let ride_id = Uuid::new_v4();
        let drivers: Vec<Uuid> = (0..16).map(|_| Uuid::new_v4()).collect();

        assert!(board.open_round(ride_id, candidates(&drivers), Utc::now()).await);

        let attempts = drivers.iter().map(|driver_id| {
            let board = board.clone();
            let driver_id = *driver_id;
            tokio::spawn(async move {
                board
                    .try_accept(ride_id, driver_id, || async { Ok(true) })
                    .await
                    .unwrap()
            })
        });

        let results: Vec<Arbitration> = join_all(attempts)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let wins = results
            .iter()
            .filter(|r| matches!(r, Arbitration::Won { .. }))
            .count();
        assert_eq!(wins, 1);

        for result in &results {
            match result {
                Arbitration::Won { withdrawn } => assert_eq!(withdrawn.len(), drivers.len() - 1),
                Arbitration::Rejected(reason) => {
                    assert_eq!(*reason, RejectReason::AlreadyAcceptedByOther)
                }
            }
        }

        let winner = board.winner(ride_id).await.unwrap();
        assert!(drivers.contains(&winner));
        assert_eq!(board.candidate_count(ride_id).await, Some(0));
    }

    #[tokio::test]
    async fn accept_without_offer_is_rejected() {
        let board = OfferBoard::default();
        let ride_id = Uuid::new_v4();
        let offered = Uuid::new_v4();
        let uninvited = Uuid::new_v4();

        // no round at all
        let result = board
            .try_accept(ride_id, offered, || async { Ok(true) })
            .await
            .unwrap();
        assert!(matches!(
            result,
            Arbitration::Rejected(RejectReason::OfferExpired)
        ));

        board.open_round(ride_id, candidates(&[offered]), Utc::now()).await;

        // a driver that was never offered the ride
        let result = board
            .try_accept(ride_id, uninvited, || async { Ok(true) })
            .await
            .unwrap();
        assert!(matches!(
            result,
            Arbitration::Rejected(RejectReason::NotOffered)
        ));
    }

    #[tokio::test]
    async fn failed_status_probe_leaves_round_open() {
        let board = OfferBoard::default();
        let ride_id = Uuid::new_v4();
        let driver_id = Uuid::new_v4();

        board.open_round(ride_id, candidates(&[driver_id]), Utc::now()).await;

        let result = board
            .try_accept(ride_id, driver_id, || async { Ok(false) })
            .await
            .unwrap();
        assert!(matches!(
            result,
            Arbitration::Rejected(RejectReason::NotAvailable)
        ));
        assert_eq!(board.winner(ride_id).await, None);

        // the ride flipped back to pending in storage; a later attempt wins
        let result = board
            .try_accept(ride_id, driver_id, || async { Ok(true) })
            .await
            .unwrap();
        assert!(matches!(result, Arbitration::Won { .. }));
    }

    #[tokio::test]
    async fn probe_error_does_not_burn_the_round() {
        let board = OfferBoard::default();
        let ride_id = Uuid::new_v4();
        let driver_id = Uuid::new_v4();

        board.open_round(ride_id, candidates(&[driver_id]), Utc::now()).await;

        let result = board
            .try_accept(ride_id, driver_id, || async {
                Err(crate::error::unexpected_error())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(board.winner(ride_id).await, None);

        let result = board
            .try_accept(ride_id, driver_id, || async { Ok(true) })
            .await
            .unwrap();
        assert!(matches!(result, Arbitration::Won { .. }));
    }

    #[tokio::test]
    async fn rejections_shrink_then_exhaust_the_round() {
        let board = OfferBoard::default();
        let ride_id = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        board.open_round(ride_id, candidates(&[a, b]), Utc::now()).await;

        assert!(matches!(board.reject(ride_id, a).await, RejectAck::Noted));
        assert_eq!(board.candidate_count(ride_id).await, Some(1));

        assert!(matches!(
            board.reject(ride_id, b).await,
            RejectAck::Exhausted
        ));
        assert_eq!(board.candidate_count(ride_id).await, None);

        // the rejecting driver can no longer accept
        let result = board
            .try_accept(ride_id, a, || async { Ok(true) })
            .await
            .unwrap();
        assert!(matches!(
            result,
            Arbitration::Rejected(RejectReason::OfferExpired)
        ));
    }

    #[tokio::test]
    async fn sweep_reclaims_only_stale_unaccepted_rounds() {
        let board = OfferBoard::default();
        let now = Utc::now();
        let stale_pending = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        let stale_accepted = Uuid::new_v4();
        let driver_id = Uuid::new_v4();

        board
            .open_round(stale_pending, candidates(&[driver_id]), now - Duration::minutes(11))
            .await;
        board.open_round(fresh, candidates(&[driver_id]), now).await;
        board
            .open_round(stale_accepted, candidates(&[driver_id]), now - Duration::minutes(11))
            .await;
        let result = board
            .try_accept(stale_accepted, driver_id, || async { Ok(true) })
            .await
            .unwrap();
        assert!(matches!(result, Arbitration::Won { .. }));

        let reclaimed = board.sweep(now);

        assert_eq!(reclaimed, vec![stale_pending]);
        assert_eq!(board.candidate_count(stale_pending).await, None);
        assert_eq!(board.candidate_count(fresh).await, Some(1));
        // the stale accepted round was garbage-collected without being reported
        assert_eq!(board.winner(stale_accepted).await, None);
    }

    #[tokio::test]
    async fn sweep_never_removes_a_replacing_rebroadcast_round() {
        let board = Arc::new(OfferBoard::default());
        let driver_id = Uuid::new_v4();

        // interleave the sweep with a re-broadcast replacing the expired
        // round; whichever order they land in, the fresh round survives
        for _ in 0..500 {
            let ride_id = Uuid::new_v4();
            let now = Utc::now();

            board
                .open_round(ride_id, candidates(&[driver_id]), now - Duration::minutes(11))
                .await;

            let sweeper = {
                let board = board.clone();
                tokio::spawn(async move {
                    board.sweep(now);
                })
            };
            let rebroadcast = {
                let board = board.clone();
                let roster = candidates(&[driver_id]);
                tokio::spawn(async move { board.open_round(ride_id, roster, now).await })
            };

            sweeper.await.unwrap();
            assert!(rebroadcast.await.unwrap());

            // the re-broadcast round is intact and still winnable
            assert_eq!(board.candidate_count(ride_id).await, Some(1));
            let result = board
                .try_accept(ride_id, driver_id, || async { Ok(true) })
                .await
                .unwrap();
            assert!(matches!(result, Arbitration::Won { .. }));

            board.close(ride_id);
        }
    }

    #[tokio::test]
    async fn duplicate_broadcast_is_suppressed_while_round_is_live() {
        let board = OfferBoard::default();
        let ride_id = Uuid::new_v4();
        let driver_id = Uuid::new_v4();
        let now = Utc::now();

        assert!(board.open_round(ride_id, candidates(&[driver_id]), now).await);
        assert!(!board.open_round(ride_id, candidates(&[driver_id]), now).await);

        // an expired round may be replaced by a re-broadcast
        let later = now + Duration::minutes(11);
        assert!(board.open_round(ride_id, candidates(&[driver_id]), later).await);
    }
}
