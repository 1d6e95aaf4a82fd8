use super::{Engine, MAX_PICKUP_DISTANCE_METERS, SEARCH_RADIUS_KM};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Executor, Row};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    api::DispatchAPI,
    entities::{Coordinates, Ride},
    error::{invalid_transition_error, Error},
    events::RideEvent,
    external::PushMessage,
    offer::{AcceptOutcome, Arbitration, RejectAck},
};

#[async_trait]
impl DispatchAPI for Engine {
    /// Fan an offer out to every proximity-ranked candidate. Zero
    /// candidates is not a failure: the requester is told and the ride
    /// stays pending for a later re-broadcast.
    #[tracing::instrument(skip(self, ride), fields(ride_id = %ride.id))]
    async fn broadcast_offer(&self, ride: &Ride) -> Result<usize, Error> {
        if !ride.is_pending() || ride.driver_id.is_some() {
            return Err(invalid_transition_error());
        }

        let candidates = match self.find_nearby_drivers(ride.pickup, SEARCH_RADIUS_KM).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!("driver search failed, treating as zero candidates: {:?}", e);
                vec![]
            }
        };

        if candidates.is_empty() {
            tracing::info!("no drivers nearby, ride stays pending");
            self.events.publish(ride.id, RideEvent::NoDriverAvailable);
            return Ok(0);
        }

        let roster: HashMap<Uuid, Option<String>> = candidates
            .iter()
            .map(|c| (c.driver_id, c.push_address.clone()))
            .collect();
        let offers_sent = roster.len();

        if !self.offers.open_round(ride.id, roster, Utc::now()).await {
            tracing::info!("live offer round already exists, broadcast suppressed");
            return Ok(0);
        }

        // fire-and-forget: one task per candidate, an unreachable driver
        // never blocks the others or fails the broadcast
        for candidate in candidates {
            let address = match candidate.push_address {
                Some(address) => address,
                None => {
                    tracing::debug!(driver_id = %candidate.driver_id, "candidate has no push address");
                    continue;
                }
            };

            let push = self.push.clone();
            let driver_id = candidate.driver_id;
            let message = PushMessage::RideOffer {
                ride_id: ride.id,
                pickup: ride.pickup,
                dropoff: ride.dropoff,
                estimated_price: ride.estimated_price,
                distance_km: ride.distance_km,
            };

            tokio::spawn(async move {
                if let Err(e) = push.send(&address, &message).await {
                    tracing::warn!(%driver_id, "offer push failed: {:?}", e);
                }
            });
        }

        self.events.publish(
            ride.id,
            RideEvent::Searching {
                drivers_notified: offers_sent,
            },
        );

        Ok(offers_sent)
    }

    /// Resolve the accept race for one ride. Losing is an expected outcome
    /// and comes back as a rejection reason, not an error.
    #[tracing::instrument(skip(self))]
    async fn driver_accept(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
        driver_location: Coordinates,
    ) -> Result<AcceptOutcome, Error> {
        let arbitration = self
            .offers
            .try_accept(ride_id, driver_id, || async move {
                // defensive re-check against storage, still inside the
                // per-ride critical section
                let mut conn = self.pool.acquire().await?;

                let maybe_row = conn
                    .fetch_optional(
                        sqlx::query("SELECT status FROM rides WHERE id = $1").bind(&ride_id),
                    )
                    .await?;

                match maybe_row {
                    Some(row) => {
                        let status: String = row.try_get("status")?;
                        Ok(status == "pending")
                    }
                    None => Ok(false),
                }
            })
            .await?;

        let withdrawn = match arbitration {
            Arbitration::Rejected(reason) => return Ok(AcceptOutcome::rejected(reason)),
            Arbitration::Won { withdrawn } => withdrawn,
        };

        // drivers mid-flight with a stale offer self-correct their UI
        for (loser_id, address) in withdrawn {
            if let Some(address) = address {
                let push = self.push.clone();
                let message = PushMessage::OfferWithdrawn { ride_id };

                tokio::spawn(async move {
                    if let Err(e) = push.send(&address, &message).await {
                        tracing::warn!(driver_id = %loser_id, "withdrawal push failed: {:?}", e);
                    }
                });
            }
        }

        // the transactional accept is the final authority on persisted
        // state; the in-memory win above is not unwound if it fails, it
        // only prevents other drivers from winning concurrently
        self.accept_transition(ride_id, driver_id, driver_location, MAX_PICKUP_DISTANCE_METERS)
            .await?;

        self.events.publish(ride_id, RideEvent::Accepted { driver_id });

        Ok(AcceptOutcome::won())
    }

    #[tracing::instrument(skip(self))]
    async fn driver_reject(&self, ride_id: Uuid, driver_id: Uuid) -> Result<(), Error> {
        match self.offers.reject(ride_id, driver_id).await {
            RejectAck::Exhausted => {
                tracing::info!("all offered drivers rejected the ride");
                self.events.publish(ride_id, RideEvent::AllDriversRejected);
            }
            RejectAck::NoRound => {
                tracing::debug!("reject for an unknown or expired offer round");
            }
            RejectAck::Noted => (),
        }

        Ok(())
    }
}
