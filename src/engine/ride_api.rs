use super::helpers::{fetch_driver_for_update, fetch_ride_for_update, update_driver, update_ride};
use super::Engine;

use async_channel::Receiver;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{types::Json, Acquire, Executor, Row};
use uuid::Uuid;

use crate::{
    api::{DispatchAPI, ProgressUpdate, RideAPI},
    entities::{Coordinates, Ride},
    error::{invalid_input_error, ride_not_found_error, Error},
    events::RideEvent,
};

#[async_trait]
impl RideAPI for Engine {
    /// A new request enters the state machine at pending and is broadcast
    /// immediately. A broadcast that finds nobody leaves the ride pending;
    /// it never fails the submission.
    #[tracing::instrument(skip(self))]
    async fn submit_ride_request(
        &self,
        requester_id: Uuid,
        pickup: Coordinates,
        dropoff: Coordinates,
        estimated_price: f64,
    ) -> Result<Ride, Error> {
        if !pickup.is_valid() || !dropoff.is_valid() || estimated_price < 0.0 {
            return Err(invalid_input_error());
        }

        let ride = Ride::new(requester_id, pickup, dropoff, estimated_price);

        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query("INSERT INTO rides (id, status, data) VALUES ($1, $2, $3)")
                .bind(&ride.id)
                .bind(ride.status.name())
                .bind(Json(&ride)),
        )
        .await?;

        self.broadcast_offer(&ride).await?;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn find_ride(&self, id: Uuid) -> Result<Ride, Error> {
        let mut conn = self.pool.acquire().await?;

        let maybe_result = conn
            .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1").bind(&id))
            .await?;

        let result = maybe_result.ok_or_else(|| ride_not_found_error())?;
        let Json(ride): Json<Ride> = result.try_get("data")?;

        Ok(ride)
    }

    /// Driver-reported progress, validated against the persisted status
    /// rather than trusting client-submitted ordering. Pickup confirmation
    /// also flips the driver record en-route -> busy, in the same
    /// transaction.
    #[tracing::instrument(skip(self))]
    async fn driver_status_update(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
        progress: ProgressUpdate,
    ) -> Result<Ride, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut ride = fetch_ride_for_update(&mut tx, &ride_id).await?;

        match progress {
            ProgressUpdate::DriverArriving => {
                ride.driver_arriving(driver_id)?;
            }
            ProgressUpdate::InProgress => {
                ride.begin(driver_id, Utc::now())?;

                let mut driver = fetch_driver_for_update(&mut tx, &driver_id).await?;
                driver.picked_up(ride_id)?;
                update_driver(&mut tx, &driver).await?;
            }
        }

        update_ride(&mut tx, &ride).await?;

        tx.commit().await?;

        self.events.publish(
            ride_id,
            RideEvent::StatusUpdate {
                status: ride.status.name(),
            },
        );

        Ok(ride)
    }

    fn subscribe_events(&self, ride_id: Uuid) -> Receiver<RideEvent> {
        self.events.subscribe(ride_id)
    }
}
