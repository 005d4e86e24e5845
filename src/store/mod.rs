//! 求人IDの導出と永続化

mod listing;
mod sqlite;

pub use listing::{identify, Listing, SubscribeOutcome, Subscriber};
pub use sqlite::SqliteStore;
