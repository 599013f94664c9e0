pub mod environment;
pub mod paths;
pub mod terminal;

pub use environment::get_claude_dir;
pub use paths::{
    SESSION_LOG_EXTENSION, encode_path, format_path_with_tilde, session_log_path, sessions_dir,
    validate_session_id,
};
