//! Data Transfer Objects for REST request/response serialization.
//!
//! Money amounts are serialized as JSON strings to avoid float rounding.

pub mod availability_dto;
pub mod notification_dto;
pub mod reservation_dto;

pub use availability_dto::*;
pub use notification_dto::*;
pub use reservation_dto::*;
