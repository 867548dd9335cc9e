pub mod http;
pub mod session_file;

pub use http::HttpPortalAdapter;
pub use session_file::FileSessionStore;
