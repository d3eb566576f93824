mod common;
pub use common::*;

mod config;
pub use config::*;

mod currency;
pub use currency::*;

mod events;
pub use events::*;

mod snapshot;
pub use snapshot::*;

pub mod contracts;
pub mod errors;
pub mod math;
pub mod serde_utils;
