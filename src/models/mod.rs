pub mod batch;
pub mod events;
pub mod session;

pub use batch::UploadBatch;
pub use events::{Frame, NavigationEvent, NavigationTrigger, ScrollEvent, TapEvent, TapOrigin};
pub use session::{Session, SessionIdentity, SessionSummary};
