//! Inter-stop distance calculation
//!
//! A tenant-scoped override on the (first, last) location pair
//! short-circuits the calculation; otherwise consecutive stop pairs are
//! summed with the haversine great-circle distance. Segments missing
//! coordinates are skipped with a warning and never abort.

pub mod calculator;

pub use calculator::{
    DistanceOutcome, DistanceResult, DistanceSource, calculate, haversine_miles,
};
