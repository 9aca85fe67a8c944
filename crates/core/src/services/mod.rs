//! Business logic services.

#![allow(missing_docs)]

pub mod comment;
pub mod page;
pub mod reaction;
pub mod search;
pub mod user;
pub mod video;

pub use comment::{CommentInput, CommentService, CommentWithAuthor, MAX_COMMENT_LENGTH};
pub use page::Page;
pub use reaction::{ReactionService, ReactionState, ReactionSummary};
pub use search::{DEFAULT_SEARCH_LIMIT, SearchQuery, SearchService};
pub use user::{CreateUserInput, UpdateUserInput, UserService};
pub use video::{
    CreateVideoInput, MediaUpload, ProgressInput, UpdateVideoInput, VideoService,
    WatchHistoryEntry, ensure_can_view,
};
