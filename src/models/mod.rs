pub mod record;
pub mod session;

pub use record::{LogRecord, format_hms};
pub use session::{Session, SessionState};
