//! Collaborator drivers behind the traits in [`crate::hal`]

pub mod battery;
pub mod esc;
pub mod gy87;
pub mod nrf24;
