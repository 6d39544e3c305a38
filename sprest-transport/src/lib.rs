pub mod transport;
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;

pub use transport::{RawResponse, ResponseBody, Transport, TransportError};
#[cfg(feature = "http")]
pub use http::{HttpTransport, ODATA_VERBOSE};
#[cfg(feature = "mock")]
pub use mock::MockTransport;
