pub mod primitive_kind;
pub use primitive_kind::*;

pub mod facets;
pub use facets::*;

pub mod type_usage;
pub use type_usage::*;

pub mod entity_set;
pub use entity_set::*;

pub mod catalog;
pub use catalog::*;

pub mod provider_manifest;
pub use provider_manifest::*;
