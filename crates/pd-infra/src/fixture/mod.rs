pub mod feed;

pub use feed::{Fixture, FixtureFeed};
