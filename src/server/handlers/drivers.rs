use axum::extract::{Extension, Json, Path};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::DynAPI;
use crate::entities::{Coordinates, Driver};
use crate::error::Error;

#[derive(Deserialize)]
pub struct CreateParams {
    push_address: Option<String>,
}

#[derive(Deserialize)]
pub struct LocationParams {
    latitude: f64,
    longitude: f64,
}

pub async fn create(
    Extension(api): Extension<DynAPI>,
    Json(params): Json<CreateParams>,
) -> Result<Json<Driver>, Error> {
    let driver = api.create_driver(params.push_address).await?;

    Ok(driver.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, Error> {
    let driver = api.find_driver(id).await?;

    Ok(driver.into())
}

pub async fn start(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, Error> {
    let driver = api.start_shift(id).await?;

    Ok(driver.into())
}

pub async fn stop(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
) -> Result<Json<Driver>, Error> {
    let driver = api.stop_shift(id).await?;

    Ok(driver.into())
}

pub async fn update_location(
    Extension(api): Extension<DynAPI>,
    Path(id): Path<Uuid>,
    Json(params): Json<LocationParams>,
) -> Result<(), Error> {
    let coordinates = Coordinates::new(params.latitude, params.longitude);

    api.update_driver_location(id, coordinates).await
}
