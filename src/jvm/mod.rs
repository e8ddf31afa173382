mod access_flags;
pub mod class_file;
mod class_hierarchy;
pub mod code;
mod constant_pool;
mod descriptors;
mod errors;
pub mod model;
mod names;
mod types;

pub use access_flags::*;
pub use class_hierarchy::*;
pub use constant_pool::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
pub use types::*;
