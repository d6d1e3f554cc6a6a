pub mod organization;
pub mod agent;
pub mod call;
pub mod parking;
pub mod presence;

pub use organization::*;
pub use agent::*;
pub use call::*;
pub use parking::*;
pub use presence::*;
