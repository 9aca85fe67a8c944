//! Database repositories.

pub mod comment;
pub mod reaction;
pub mod user;
pub mod video;
pub mod watch_history;

pub use comment::CommentRepository;
pub use reaction::{ReactionCounts, ReactionRepository, ReactionTarget, Transition};
pub use user::UserRepository;
pub use video::{SortOrder, VideoFilter, VideoRepository, VideoSort};
pub use watch_history::WatchHistoryRepository;
