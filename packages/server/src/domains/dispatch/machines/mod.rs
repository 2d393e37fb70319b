pub mod lifecycle;

pub use lifecycle::{
    check_advance, check_bind, check_cancel, check_exhausted, destination_selectable,
    IllegalTransition,
};
