pub mod enums;
pub mod screenshot;
pub mod session;

pub use enums::*;
pub use screenshot::*;
pub use session::*;
