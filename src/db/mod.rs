pub mod accounts;
pub mod profiles;
pub mod setlists;
pub mod song_types;
pub mod songs;

pub use accounts::*;
pub use profiles::*;
pub use setlists::*;
pub use song_types::*;
pub use songs::*;
