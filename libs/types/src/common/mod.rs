//! Common numeric types shared by the stable-pool crates

pub mod errors;
pub mod fixed_point;
pub mod math;
