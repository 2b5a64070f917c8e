//! Data types shared by the cache, selection and history layers.

mod cell;
mod selection;

pub use cell::*;
pub use selection::*;
