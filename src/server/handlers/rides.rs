use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{DynAPI, ProgressUpdate};
use crate::entities::{Coordinates, Ride};
use crate::error::Error;
use crate::offer::AcceptOutcome;

#[derive(Serialize, Deserialize)]
pub struct CreateParams {
    requester_id: Uuid,
    pickup: Coordinates,
    dropoff: Coordinates,
    estimated_price: f64,
}

#[derive(Deserialize)]
pub struct AcceptParams {
    driver_id: Uuid,
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
pub struct RejectParams {
    driver_id: Uuid,
}

#[derive(Deserialize)]
pub struct ProgressParams {
    driver_id: Uuid,
    status: ProgressUpdate,
}

#[derive(Deserialize)]
pub struct CompleteParams {
    final_price: f64,
    payment_token: String,
}

#[derive(Deserialize)]
pub struct CancelParams {
    reason: String,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    Json(params): Json<CreateParams>,
) -> Result<Json<Ride>, Error> {
    let ride = api
        .submit_ride_request(
            params.requester_id,
            params.pickup,
            params.dropoff,
            params.estimated_price,
        )
        .await?;

    Ok(ride.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, Error> {
    let ride = api.find_ride(id).await?;

    Ok(ride.into())
}

pub async fn accept(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<AcceptParams>,
) -> Result<Json<AcceptOutcome>, Error> {
    let location = Coordinates::new(params.latitude, params.longitude);
    let outcome = api.driver_accept(id, params.driver_id, location).await?;

    Ok(outcome.into())
}

pub async fn reject(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<RejectParams>,
) -> Result<(), Error> {
    api.driver_reject(id, params.driver_id).await
}

pub async fn progress(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<ProgressParams>,
) -> Result<Json<Ride>, Error> {
    let ride = api
        .driver_status_update(id, params.driver_id, params.status)
        .await?;

    Ok(ride.into())
}

pub async fn complete(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<CompleteParams>,
) -> Result<Json<Ride>, Error> {
    let ride = api
        .complete_ride(id, params.final_price, params.payment_token)
        .await?;

    Ok(ride.into())
}

pub async fn cancel(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<CancelParams>,
) -> Result<Json<Ride>, Error> {
    let ride = api.cancel_ride(id, params.reason).await?;

    Ok(ride.into())
}
