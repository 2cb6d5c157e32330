mod backend;
mod client;
mod error;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod value;
pub mod wire;

pub use backend::SnmpBackend;
pub use client::{DEFAULT_RETRIES, DEFAULT_TIMEOUT, UdpBackend};
pub use error::SnmpError;
pub use value::{Value, VarBind};
