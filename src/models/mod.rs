pub mod comment;
pub mod live;
pub mod post;
pub mod stats;
pub mod user;
pub mod vote;

pub use comment::*;
pub use live::*;
pub use post::*;
pub use stats::*;
pub use user::*;
pub use vote::*;
