mod oid;
mod path;
mod time;

pub use oid::{Oid, OidError};
pub use path::{Path, PathError};
pub use time::UnixTime;
