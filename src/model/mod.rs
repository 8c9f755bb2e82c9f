//! Logical model consumed by discovery: stars, cubes and the schema.

pub mod schema;
pub mod star;

pub use schema::{Cube, StarSchema};
pub use star::{Aggregator, FactColumnRole, LogicalStar};
