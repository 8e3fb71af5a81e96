//! Core utilities shared by detectors, the throttling classifier and the
//! check pipeline.

pub mod client;
pub mod outcome;
pub mod reqwest_client;
pub mod throttle;
pub mod types;
pub mod validation;

pub use client::{ProbeHttpClient, ProbeHttpError};
pub use outcome::{CheckOutcome, CheckReport};
pub use reqwest_client::ReqwestProbeClient;
pub use throttle::{ThrottleSignal, is_rate_limited, retry_after_hint, throttle_signal};
pub use types::ProbeResponse;
pub use validation::{HandleError, MAX_HANDLE_LEN, is_valid_handle, normalize_handle, validate_handle};
