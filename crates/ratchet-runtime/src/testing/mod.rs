//! Testing utilities for ratchet: a scripted in-memory driver.

mod mock;

pub use mock::{DriverCall, MockDriver};
