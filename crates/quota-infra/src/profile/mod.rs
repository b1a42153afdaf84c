//! Profile sources - a static directory and the PostgreSQL `profiles` table.

mod memory;

pub use memory::StaticProfileDirectory;

#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "postgres")]
pub use self::postgres::PostgresProfileSource;
