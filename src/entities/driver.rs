use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{driver_offline_error, invalid_transition_error, Error};

/// The mutable real-time portion of a driver's state.
///
/// The active ride id is carried inside the status variants, so "a driver
/// with a current ride is online and not available" holds by construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub status: Status,
    pub push_address: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Status {
    Offline,
    Available,
    EnRouteToPickup { ride_id: Uuid },
    Busy { ride_id: Uuid },
}

impl Driver {
    pub fn new(push_address: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: Status::Offline,
            push_address,
        }
    }

    pub fn status_string(&self) -> String {
        match self.status {
            Status::Offline => "OFFLINE".into(),
            Status::Available => "AVAILABLE".into(),
            Status::EnRouteToPickup { ride_id: _ } => "EN_ROUTE_TO_PICKUP".into(),
            Status::Busy { ride_id: _ } => "BUSY".into(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.status != Status::Offline
    }

    pub fn is_available(&self) -> bool {
        self.status == Status::Available
    }

    pub fn current_ride_id(&self) -> Option<Uuid> {
        match self.status {
            Status::EnRouteToPickup { ride_id } | Status::Busy { ride_id } => Some(ride_id),
            _ => None,
        }
    }

    /// Begin a shift: offline -> available.
    #[tracing::instrument]
    pub fn start(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Offline => {
                self.status = Status::Available;
            }
            _ => (),
        };

        Ok(())
    }

    /// End a shift. Refused while a ride is in hand.
    #[tracing::instrument]
    pub fn stop(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Offline | Status::Available => {
                self.status = Status::Offline;
                Ok(())
            }
            _ => Err(invalid_transition_error()),
        }
    }

    /// Couple the driver to a freshly accepted ride.
    #[tracing::instrument]
    pub fn begin_ride(&mut self, ride_id: Uuid) -> Result<(), Error> {
        match self.status {
            Status::Available => {
                self.status = Status::EnRouteToPickup { ride_id };
                Ok(())
            }
            Status::Offline => Err(driver_offline_error()),
            _ => Err(invalid_transition_error()),
        }
    }

    /// Passenger on board: en-route-to-pickup -> busy, same ride only.
    #[tracing::instrument]
    pub fn picked_up(&mut self, ride_id: Uuid) -> Result<(), Error> {
        match self.status {
            Status::EnRouteToPickup { ride_id: current } if current == ride_id => {
                self.status = Status::Busy { ride_id };
                Ok(())
            }
            _ => Err(invalid_transition_error()),
        }
    }

    /// Release the driver after completion or cancellation; keeps the
    /// driver online and available. No-op when no ride is in hand.
    #[tracing::instrument]
    pub fn clear_ride(&mut self) -> Result<(), Error> {
        match self.status {
            Status::EnRouteToPickup { ride_id: _ } | Status::Busy { ride_id: _ } => {
                self.status = Status::Available;
            }
            _ => (),
        };

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_and_ride_coupling() {
        let ride_id = Uuid::new_v4();
        let mut driver = Driver::new(Some("push:abc".into()));

        assert!(!driver.is_online());
        assert_eq!(driver.begin_ride(ride_id).unwrap_err().code, 106);

        driver.start().unwrap();
        assert!(driver.is_available());
        assert!(driver.current_ride_id().is_none());

        driver.begin_ride(ride_id).unwrap();
        assert!(driver.is_online());
        assert!(!driver.is_available());
        assert_eq!(driver.current_ride_id(), Some(ride_id));

        driver.picked_up(ride_id).unwrap();
        assert_eq!(driver.status, Status::Busy { ride_id });

        driver.clear_ride().unwrap();
        assert!(driver.is_online());
        assert!(driver.is_available());
        assert!(driver.current_ride_id().is_none());
    }

    #[test]
    fn busy_driver_cannot_take_another_ride_or_stop() {
        let ride_id = Uuid::new_v4();
        let mut driver = Driver::new(None);

        driver.start().unwrap();
        driver.begin_ride(ride_id).unwrap();

        assert_eq!(driver.begin_ride(Uuid::new_v4()).unwrap_err().code, 100);
        assert_eq!(driver.stop().unwrap_err().code, 100);
        assert_eq!(driver.current_ride_id(), Some(ride_id));
    }

    #[test]
    fn picked_up_requires_matching_ride() {
        let ride_id = Uuid::new_v4();
        let mut driver = Driver::new(None);

        driver.start().unwrap();
        driver.begin_ride(ride_id).unwrap();

        assert_eq!(driver.picked_up(Uuid::new_v4()).unwrap_err().code, 100);
        assert_eq!(driver.status, Status::EnRouteToPickup { ride_id });
    }

    #[test]
    fn clear_ride_is_a_noop_when_idle() {
        let mut driver = Driver::new(None);

        driver.clear_ride().unwrap();
        assert_eq!(driver.status, Status::Offline);
    }
}
