pub mod client;
pub mod error;
pub mod wire;

pub use client::{HttpIssuingClient, IssuingClient};
pub use error::IssuingError;
pub use wire::{StoreRequest, StoreResponse};
