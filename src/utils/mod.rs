pub mod environment;
pub mod paths;
pub mod terminal;

pub use environment::get_claude_dir;
pub use paths::{agent_id_from_path, format_path_with_tilde, is_log_file, safe_open_file, session_id_from_path};
pub use terminal::preview_line;
