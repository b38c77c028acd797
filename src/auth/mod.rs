pub mod guard;
pub mod identity;
pub mod permissions;
pub mod session;
pub mod user;

pub use guard::*;
pub use identity::*;
pub use permissions::*;
pub use session::*;
pub use user::*;
