mod config;
mod sessions;
mod users;
pub mod utils;

pub use utils::test_utils;
