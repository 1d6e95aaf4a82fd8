use super::helpers::{fetch_driver_for_update, fetch_ride_for_update, update_driver, update_ride};
use super::Engine;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Acquire, Executor};
use uuid::Uuid;

use crate::{
    api::TransitionAPI,
    entities::{haversine_meters, Coordinates, Ride},
    error::{driver_offline_error, driver_too_far_error, ride_not_available_error, Error},
    events::RideEvent,
    external::PushMessage,
};

impl Engine {
    /// Atomic accept: ride row and driver row flip together or not at all.
    /// Every guard failure before commit rolls the transaction back, so a
    /// rejected accept never leaves a ride-without-driver-update behind.
    #[tracing::instrument(skip(self))]
    pub async fn accept_transition(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
        driver_location: Coordinates,
        max_distance_meters: f64,
    ) -> Result<Ride, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut ride = fetch_ride_for_update(&mut tx, &ride_id).await?;

        if !ride.is_pending() {
            return Err(ride_not_available_error());
        }

        let mut driver = fetch_driver_for_update(&mut tx, &driver_id).await?;

        if !driver.is_online() {
            return Err(driver_offline_error());
        }

        let distance_meters = haversine_meters(&driver_location, &ride.pickup);
        if distance_meters > max_distance_meters {
            return Err(driver_too_far_error(distance_meters, max_distance_meters));
        }

        ride.accept(driver_id)?;
        driver.begin_ride(ride_id)?;

        update_ride(&mut tx, &ride).await?;
        update_driver(&mut tx, &driver).await?;

        tx.commit().await?;

        Ok(ride)
    }
}

#[async_trait]
impl TransitionAPI for Engine {
    /// Completion commits three effects together: ride terminal state with
    /// its final price, the payment ledger row, and the driver release
    /// (still online, available again).
    #[tracing::instrument(skip(self))]
    async fn complete_ride(
        &self,
        ride_id: Uuid,
        final_price: f64,
        payment_token: String,
    ) -> Result<Ride, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut ride = fetch_ride_for_update(&mut tx, &ride_id).await?;

        ride.complete(final_price, Utc::now())?;

        if let Some(driver_id) = ride.driver_id {
            let mut driver = fetch_driver_for_update(&mut tx, &driver_id).await?;
            driver.clear_ride()?;
            update_driver(&mut tx, &driver).await?;
        }

        update_ride(&mut tx, &ride).await?;

        tx.execute(
            sqlx::query(
                "INSERT INTO payments (ride_id, amount, token, status) VALUES ($1, $2, $3, 'charged')",
            )
            .bind(&ride.id)
            .bind(final_price)
            .bind(&payment_token),
        )
        .await?;

        tx.commit().await?;

        self.offers.close(ride_id);
        self.events.publish(
            ride_id,
            RideEvent::StatusUpdate {
                status: ride.status.name(),
            },
        );
        self.events.close(ride_id);

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_ride(&self, ride_id: Uuid, reason: String) -> Result<Ride, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut ride = fetch_ride_for_update(&mut tx, &ride_id).await?;

        let freed_driver = ride.cancel(reason.clone(), Utc::now())?;

        update_ride(&mut tx, &ride).await?;

        let mut freed_address = None;

        if let Some(driver_id) = freed_driver {
            let mut driver = fetch_driver_for_update(&mut tx, &driver_id).await?;
            driver.clear_ride()?;
            update_driver(&mut tx, &driver).await?;

            freed_address = driver.push_address;
        }

        tx.commit().await?;

        self.offers.close(ride_id);
        self.events.publish(
            ride_id,
            RideEvent::Cancelled {
                reason: reason.clone(),
            },
        );
        self.events.close(ride_id);

        if let Some(address) = freed_address {
            let push = self.push.clone();
            let message = PushMessage::RideCancelled { ride_id, reason };

            tokio::spawn(async move {
                if let Err(e) = push.send(&address, &message).await {
                    tracing::warn!("cancellation push failed: {:?}", e);
                }
            });
        }

        Ok(ride)
    }
}
