//! Transaction structures and signature hashing

mod transaction;

pub use transaction::*;
