use super::{AnyInstruction, BranchInstruction, Instruction};

/// Traits an instruction has, on top of being a specific instruction
///
/// Generic passes tend to care about what an instruction _does_ (produces values on the stack,
/// refers to the constant pool, may throw, ...) more than about which instruction it is. Every
/// instruction has a fixed, ordered list of capabilities which is what
/// [`AnyInstruction::accept`] walks before the instruction-specific visit.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Capability {
    /// May throw an exception at runtime
    ExceptionThrower,

    /// Has an associated type (the type of the operand, result, or array element)
    Typed,

    /// Pushes values onto the operand stack
    StackProducer,

    /// Pops values off of the operand stack
    StackConsumer,

    Arithmetic,

    /// May cause a class to be loaded
    LoadClass,

    /// Has an operand which is an index into the constant pool
    ConstantPool,

    FieldOrMethod,
    Field,

    /// Simple push of a value (without consuming anything)
    Push,

    /// Simple pop of a value (without producing anything)
    Pop,

    /// Accesses a local variable slot
    LocalVariable,
    Load,
    Store,

    Branch,
    If,

    /// Has a short and a long encoding
    VariableLength,

    /// Never falls through to the next instruction
    UnconditionalBranch,

    Goto,
    Jsr,
    Select,
    Return,

    /// Operand is an index (of a local variable)
    Indexed,

    /// Reads or writes an array element
    Array,

    /// Pushes a constant which is encoded in the instruction itself
    ConstantPush,

    Conversion,

    /// Generic operation on stack slots
    Stack,

    Invoke,
    Allocation,
}

/// Visitor over instructions
///
/// Accepting a visitor calls `visit_capability` once for every capability of the instruction, in
/// the fixed order for the instruction, and then finishes with the visit that is specific to the
/// instruction. All methods default to doing nothing.
pub trait Visitor {
    fn visit_capability(&mut self, _capability: Capability, _instruction: &AnyInstruction) {}

    fn visit_instruction(&mut self, _instruction: &Instruction) {}

    fn visit_branch_instruction(&mut self, _instruction: &BranchInstruction) {}
}

use Capability::*;

pub(super) const NONE: &[Capability] = &[];
pub(super) const ACONST_NULL: &[Capability] = &[StackProducer, Push, Typed];
pub(super) const CONSTANT_PUSH: &[Capability] = &[Push, StackProducer, Typed, ConstantPush];
pub(super) const LDC: &[Capability] = &[StackProducer, Push, ExceptionThrower, Typed, ConstantPool];
pub(super) const LDC2_W: &[Capability] = &[StackProducer, Push, Typed, ConstantPool];
pub(super) const LOAD: &[Capability] = &[StackProducer, Push, Typed, LocalVariable, Load];
pub(super) const STORE: &[Capability] = &[StackConsumer, Pop, Typed, LocalVariable, Store];
pub(super) const ARRAY_LOAD: &[Capability] = &[StackProducer, ExceptionThrower, Typed, Array];
pub(super) const ARRAY_STORE: &[Capability] = &[StackConsumer, ExceptionThrower, Typed, Array];
pub(super) const POP: &[Capability] = &[StackConsumer, Pop, Stack];
pub(super) const DUP: &[Capability] = &[StackProducer, Push, Stack];
pub(super) const DUP_X: &[Capability] = &[Stack];
pub(super) const SWAP: &[Capability] = &[StackConsumer, StackProducer, Stack];
pub(super) const ARITHMETIC: &[Capability] = &[Typed, StackProducer, StackConsumer, Arithmetic];
pub(super) const DIVISION: &[Capability] = &[
    ExceptionThrower,
    Typed,
    StackProducer,
    StackConsumer,
    Arithmetic,
];
pub(super) const IINC: &[Capability] = &[LocalVariable];
pub(super) const CONVERSION: &[Capability] = &[Typed, StackProducer, StackConsumer, Conversion];
pub(super) const COMPARISON: &[Capability] = &[Typed, StackProducer, StackConsumer];
pub(super) const RET: &[Capability] = &[Indexed, Typed];
pub(super) const RETURN: &[Capability] = &[ExceptionThrower, Typed, StackConsumer, Return];
pub(super) const GET_STATIC: &[Capability] = &[
    StackProducer,
    Push,
    ExceptionThrower,
    Typed,
    LoadClass,
    ConstantPool,
    FieldOrMethod,
    Field,
];
pub(super) const PUT_STATIC: &[Capability] = &[
    ExceptionThrower,
    StackConsumer,
    Pop,
    Typed,
    LoadClass,
    ConstantPool,
    FieldOrMethod,
    Field,
];
pub(super) const GET_FIELD: &[Capability] = &[
    ExceptionThrower,
    StackConsumer,
    StackProducer,
    Typed,
    LoadClass,
    ConstantPool,
    FieldOrMethod,
    Field,
];
pub(super) const PUT_FIELD: &[Capability] = PUT_STATIC;
pub(super) const INVOKE: &[Capability] = &[
    ExceptionThrower,
    Typed,
    StackConsumer,
    StackProducer,
    LoadClass,
    ConstantPool,
    FieldOrMethod,
    Invoke,
];
pub(super) const NEW: &[Capability] = &[
    LoadClass,
    Allocation,
    ExceptionThrower,
    StackProducer,
    Typed,
    ConstantPool,
];
pub(super) const NEWARRAY: &[Capability] = &[Allocation, ExceptionThrower, StackProducer];
pub(super) const MULTIANEWARRAY: &[Capability] = &[
    LoadClass,
    Allocation,
    ExceptionThrower,
    Typed,
    ConstantPool,
];
pub(super) const ARRAYLENGTH: &[Capability] = &[ExceptionThrower, StackProducer];
pub(super) const ATHROW: &[Capability] = &[UnconditionalBranch, ExceptionThrower];
pub(super) const TYPE_CHECK: &[Capability] = &[
    LoadClass,
    ExceptionThrower,
    StackProducer,
    StackConsumer,
    Typed,
    ConstantPool,
];
pub(super) const MONITOR: &[Capability] = &[ExceptionThrower, StackConsumer];

pub(super) const IF: &[Capability] = &[StackConsumer, Branch, If];
pub(super) const GOTO: &[Capability] = &[VariableLength, UnconditionalBranch, Branch, Goto];
pub(super) const GOTO_W: &[Capability] = &[UnconditionalBranch, Branch, Goto];
pub(super) const JSR: &[Capability] = &[StackProducer, VariableLength, Branch, Jsr];
pub(super) const JSR_W: &[Capability] = &[StackProducer, Branch, Jsr];
pub(super) const SELECT: &[Capability] = &[VariableLength, StackConsumer, Branch, Select];
