pub mod commit;
pub mod registry;

pub use registry::{SessionError, SessionRegistry};
