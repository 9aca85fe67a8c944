//! Database entities.

pub mod comment;
pub mod reaction;
pub mod user;
pub mod video;
pub mod watch_history;

pub use comment::Entity as Comment;
pub use reaction::Entity as Reaction;
pub use user::Entity as User;
pub use video::Entity as Video;
pub use watch_history::Entity as WatchHistory;
