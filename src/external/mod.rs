pub mod push;

pub use push::{DynPushChannel, HttpPush, PushChannel, PushMessage};
