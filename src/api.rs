use async_channel::Receiver;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{Coordinates, Driver, Ride};
use crate::error::Error;
use crate::events::RideEvent;
use crate::offer::AcceptOutcome;

/// Driver-reported progress on an assigned ride. Wire names match the
/// client apps' status strings.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgressUpdate {
    DriverArriving,
    InProgress,
}

#[async_trait]
pub trait RideAPI {
    async fn submit_ride_request(
        &self,
        requester_id: Uuid,
        pickup: Coordinates,
        dropoff: Coordinates,
        estimated_price: f64,
    ) -> Result<Ride, Error>;

    async fn find_ride(&self, id: Uuid) -> Result<Ride, Error>;

    async fn driver_status_update(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
        progress: ProgressUpdate,
    ) -> Result<Ride, Error>;

    fn subscribe_events(&self, ride_id: Uuid) -> Receiver<RideEvent>;
}

#[async_trait]
pub trait DispatchAPI {
    async fn broadcast_offer(&self, ride: &Ride) -> Result<usize, Error>;

    async fn driver_accept(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
        driver_location: Coordinates,
    ) -> Result<AcceptOutcome, Error>;

    async fn driver_reject(&self, ride_id: Uuid, driver_id: Uuid) -> Result<(), Error>;
}

#[async_trait]
pub trait TransitionAPI {
    async fn complete_ride(
        &self,
        ride_id: Uuid,
        final_price: f64,
        payment_token: String,
    ) -> Result<Ride, Error>;

    async fn cancel_ride(&self, ride_id: Uuid, reason: String) -> Result<Ride, Error>;
}

#[async_trait]
pub trait DriverAPI {
    async fn create_driver(&self, push_address: Option<String>) -> Result<Driver, Error>;

    async fn find_driver(&self, id: Uuid) -> Result<Driver, Error>;

    async fn start_shift(&self, id: Uuid) -> Result<Driver, Error>;

    async fn stop_shift(&self, id: Uuid) -> Result<Driver, Error>;

    async fn update_driver_location(
        &self,
        id: Uuid,
        coordinates: Coordinates,
    ) -> Result<(), Error>;
}

pub trait API: RideAPI + DispatchAPI + TransitionAPI + DriverAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;
