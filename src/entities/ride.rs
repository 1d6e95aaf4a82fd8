use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{haversine_meters, Coordinates};
use crate::error::{
    invalid_transition_error, ride_already_cancelled_error, ride_already_completed_error,
    ride_not_available_error, Error,
};

/// One transport request, from creation to a terminal state.
///
/// Rides are mutated exclusively through the transition methods below and
/// never deleted; terminal rides are retained for history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub status: Status,
    pub requester_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub pickup: Coordinates,
    pub dropoff: Coordinates,
    pub estimated_price: f64,
    pub final_price: Option<f64>,
    pub distance_km: f64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Status {
    Pending,
    Accepted,
    DriverArriving,
    InProgress,
    Completed,
    Cancelled,
}

impl Status {
    pub fn name(&self) -> String {
        match self {
            Self::Pending => "pending".into(),
            Self::Accepted => "accepted".into(),
            Self::DriverArriving => "driver_arriving".into(),
            Self::InProgress => "in_progress".into(),
            Self::Completed => "completed".into(),
            Self::Cancelled => "cancelled".into(),
        }
    }
}

impl Ride {
    pub fn new(
        requester_id: Uuid,
        pickup: Coordinates,
        dropoff: Coordinates,
        estimated_price: f64,
    ) -> Self {
        let distance_km = haversine_meters(&pickup, &dropoff) / 1000.0;

        Self {
            id: Uuid::new_v4(),
            status: Status::Pending,
            requester_id,
            driver_id: None,
            pickup,
            dropoff,
            estimated_price,
            final_price: None,
            distance_km,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, Status::Completed | Status::Cancelled)
    }

    /// pending -> accepted, assigning the winning driver.
    #[tracing::instrument]
    pub fn accept(&mut self, driver_id: Uuid) -> Result<(), Error> {
        match self.status {
            Status::Pending => {
                self.status = Status::Accepted;
                self.driver_id = Some(driver_id);
                Ok(())
            }
            _ => Err(ride_not_available_error()),
        }
    }

    /// accepted -> driver_arriving, assigned driver only.
    #[tracing::instrument]
    pub fn driver_arriving(&mut self, driver_id: Uuid) -> Result<(), Error> {
        match self.status {
            Status::Accepted if self.driver_id == Some(driver_id) => {
                self.status = Status::DriverArriving;
                Ok(())
            }
            _ => Err(invalid_transition_error()),
        }
    }

    /// driver_arriving -> in_progress, assigned driver only.
    #[tracing::instrument]
    pub fn begin(&mut self, driver_id: Uuid, now: DateTime<Utc>) -> Result<(), Error> {
        match self.status {
            Status::DriverArriving if self.driver_id == Some(driver_id) => {
                self.status = Status::InProgress;
                self.started_at = Some(now);
                Ok(())
            }
            _ => Err(invalid_transition_error()),
        }
    }

    /// in_progress -> completed, recording the final price.
    #[tracing::instrument]
    pub fn complete(&mut self, final_price: f64, now: DateTime<Utc>) -> Result<(), Error> {
        match self.status {
            Status::InProgress => {
                self.status = Status::Completed;
                self.final_price = Some(final_price);
                self.completed_at = Some(now);
                Ok(())
            }
            Status::Completed => Err(ride_already_completed_error()),
            Status::Cancelled => Err(ride_already_cancelled_error()),
            _ => Err(invalid_transition_error()),
        }
    }

    /// Any non-terminal state -> cancelled. Returns the freed driver, if one
    /// was assigned, so the caller can release its availability record.
    #[tracing::instrument]
    pub fn cancel(&mut self, reason: String, now: DateTime<Utc>) -> Result<Option<Uuid>, Error> {
        match self.status {
            Status::Completed => Err(ride_already_completed_error()),
            Status::Cancelled => Err(ride_already_cancelled_error()),
            _ => {
                self.status = Status::Cancelled;
                self.cancelled_at = Some(now);
                self.cancellation_reason = Some(reason);
                Ok(self.driver_id.take())
            }
        }
    }
}
