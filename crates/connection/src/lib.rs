pub mod manager;
pub mod notice;
pub mod state;
pub mod token;

pub use manager::ConnectionManager;
pub use notice::{Notice, NoticeId};
pub use state::ConnectionState;
pub use token::{StaticTokenSource, TokenSource};
