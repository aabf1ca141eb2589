mod group_registry;

pub use group_registry::*;
