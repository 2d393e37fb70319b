pub mod responder;

pub use responder::*;
