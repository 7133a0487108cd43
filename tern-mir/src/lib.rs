#![forbid(unsafe_code)]

pub mod ir;

pub mod debug;
pub mod emit;
pub mod validate;

pub use debug::*;
pub use emit::*;
pub use ir::*;
pub use validate::*;
