pub mod driver;
pub mod location;
pub mod ride;

pub use driver::Driver;
pub use location::{haversine_meters, Coordinates};
pub use ride::Ride;
