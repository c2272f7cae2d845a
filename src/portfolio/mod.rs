pub mod aggregate;
pub mod enrich;
pub mod math;
