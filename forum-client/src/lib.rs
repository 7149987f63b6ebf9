mod client;
pub use client::{ContentApi, HttpClient};

mod error;
pub use error::Error;

mod order;
pub use order::{sort_categories, sort_tags, ThreadOrder};

mod reply;
pub use reply::{ReplyForm, ThreadForm};

mod session;
pub use session::{FileStore, MemoryStore, Session, SessionStore};
#[cfg(target_arch = "wasm32")]
pub use session::LocalStore;

mod time;
pub use time::format_time_ago;

mod tree;
pub use tree::{RenderedPost, ReplyTree, ThreadView, DEFAULT_MAX_DEPTH};

pub mod api {
    pub use forum_api::*;
}

#[cfg(test)]
mod fixtures;
