//! Payment-API modules: signing, transport, parsing, and error mapping.

pub mod client;
pub mod error;
pub mod models;
pub mod parser;
pub mod signer;

pub use client::{PaymentsApi, PaymentsClient, SERVICE_VERSION};
pub use error::{ActionErrorKind, PaymentError};
pub use models::{ApiResponse, ErrorInfo};
