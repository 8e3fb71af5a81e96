// Aggregates the response model, per-platform detectors and the check pipeline that ties them to the rate limiter and sessions.

pub mod core;
pub mod detectors;
pub mod pipeline;
