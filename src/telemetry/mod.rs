pub mod http;
pub mod init;
pub mod metrics;

pub use http::{REQUEST_ID_HEADER, RequestOutcome, RequestSpan};
pub use init::init_telemetry;
