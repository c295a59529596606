pub mod ask;
pub mod debug;
pub mod install;
pub mod models;

pub use ask::{ConversationRequest, ask};
pub use debug::debug_report;
pub use install::{MAX_UPLOAD_BYTES, create_model};
pub use models::list_models;
