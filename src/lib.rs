//! Build JVM class files in memory
//!
//! The interesting parts live under [`jvm`]: a deduplicating constant pool builder, a mutable
//! list of bytecode instructions whose branch targets, exception ranges, local variable scopes,
//! and line numbers stay consistent across edits, and builders for methods, fields, and classes
//! that resolve everything into the binary class file format.

pub mod jvm;
pub mod util;
