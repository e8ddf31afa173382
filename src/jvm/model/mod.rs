//! Mutable builders for classes, fields, and methods
//!
//! Builders own names and types as plain strings and [`crate::jvm::Type`]s. Nothing touches a
//! constant pool until the builder is resolved into its class file record (see
//! [`FieldGen::field`], [`MethodGen::method`], and [`ClassGen::java_class`]).

mod annotation;
mod class;
mod comparator;
mod field;
mod method;
mod observer;

pub use annotation::{
    Annotation, AnnotationEntryGen, ElementValue, ElementValueGen, ElementValuePair,
    RuntimeInvisibleAnnotations, RuntimeInvisibleParameterAnnotations, RuntimeVisibleAnnotations,
    RuntimeVisibleParameterAnnotations,
};
pub use class::*;
pub use comparator::*;
pub use field::FieldGen;
pub use method::*;
pub use observer::*;
