//! Database connection management and SeaORM entities.

#[cfg(feature = "postgres")]
mod connections;

#[cfg(feature = "postgres")]
pub mod entity;

#[cfg(feature = "postgres")]
pub use connections::{DatabaseConfig, connect};

#[cfg(feature = "postgres")]
#[cfg(test)]
mod tests;
