//! mws-payments - Amazon MWS Off-Amazon Payments API client
//!
//! Builds Signature Version 2 signed requests, retries transient server
//! failures on a fixed cadence, parses XML responses into nested maps, and
//! maps remote error codes to typed errors.

pub mod config;
pub mod payments;

pub use config::Config;
pub use payments::client::{PaymentsApi, PaymentsClient};
pub use payments::error::{ActionErrorKind, PaymentError};
pub use payments::models::{ApiResponse, ErrorInfo};
