pub mod offer;
pub mod request;
pub mod status;

pub use offer::*;
pub use request::*;
pub use status::*;
