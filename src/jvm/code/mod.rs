//! Bytecode instructions and mutable lists of them
//!
//! Instructions live in an [`InstructionList`] and are addressed through [`InstructionHandle`]s.
//! Branches refer to their targets by handle, so the list can be freely edited without having to
//! recompute offsets by hand: byte offsets only get worked out when the list is serialized.

mod branch;
mod decode;
mod factory;
mod handle;
mod instruction;
mod instruction_list;
pub mod opcodes;
mod targeters;
mod visitor;

pub use branch::*;
pub use factory::*;
pub use handle::*;
pub use instruction::*;
pub use instruction_list::*;
pub use targeters::*;
pub use visitor::{Capability, Visitor};
