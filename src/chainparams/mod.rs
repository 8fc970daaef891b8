//! Chain parameters - network identities, per-network consensus rules and
//! startup option handling

mod chain_type;
mod deployments;
mod genesis;
mod options;
mod params;

pub use chain_type::*;
pub use deployments::*;
pub use genesis::*;
pub use options::*;
pub use params::*;
