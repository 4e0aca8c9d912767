pub mod client;
pub mod mock;

pub use client::{ApiRelay, HttpRelay};
pub use mock::MockRelay;
