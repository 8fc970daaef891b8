//! Script module - script parsing and construction, evaluation seam

mod instructions;
mod interpreter;

pub use instructions::*;
pub use interpreter::*;
