//! Core simulation infrastructure (time management)

pub mod time;
