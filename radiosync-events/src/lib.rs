pub mod error;
pub mod transport;

pub use error::{EventsError, Result};
pub use transport::WebSocketTransport;
