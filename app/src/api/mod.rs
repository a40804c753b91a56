pub mod client;
pub mod transport;

pub use client::ConversionClient;
pub use transport::{HttpTransport, Transport};
