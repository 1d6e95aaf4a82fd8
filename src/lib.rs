pub mod api;
pub mod db;
pub mod engine;
pub mod entities;
pub mod error;
pub mod events;
pub mod external;
pub mod offer;
pub mod server;
