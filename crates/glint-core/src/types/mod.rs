//! Platform-agnostic value types shared across the crate.

pub mod address;
pub mod registers;

pub use address::Address;
pub use registers::RegisterSnapshot;
