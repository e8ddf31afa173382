use super::class_file::{Constant, ConstantIndex};
use super::code::{InstructionHandle, TargetLost};
use super::BinaryName;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum Error {
    /// Reading or writing the binary class file format failed
    IoError(std::io::Error),

    /// The constant pool ran out of space (it is indexed with `u16`)
    ConstantPoolOverflow(ConstantPoolOverflow),

    /// Nothing starts at this index in the constant pool
    MissingConstant(ConstantIndex),

    /// The constant at this index is not of the expected kind
    UnexpectedConstant {
        index: ConstantIndex,
        expected: &'static str,
    },

    /// An attribute body did not decode cleanly
    MalformedAttribute(&'static str),

    /// A type or method descriptor did not parse
    BadDescriptor(String),

    /// Arguments to an operation were out of range or otherwise unusable
    NegativeOrInvalidArgument(String),

    /// Tried to put a branching instruction into a plain handle, or the other way around
    IncompatibleHandleKind(InstructionHandle),

    /// Switch construction got a different number of match values and targets
    MismatchedSwitchArrays { matches: usize, targets: usize },

    /// Arrays need at least one dimension (and no more than 255)
    InvalidDimensions(usize),

    /// Unknown opcode (or truncated instruction) while decoding bytecode
    InvalidOpcode { opcode: u8, offset: usize },

    /// A range of instructions cannot be moved to a target inside the range
    InvalidMove(InstructionHandle),

    /// A branch (or switch case) points outside of the list it is in
    BranchTargetNotInList {
        branch: InstructionHandle,
        target: InstructionHandle,
    },

    /// Position of the instruction is not known yet
    UnresolvedPosition(InstructionHandle),

    /// Offset of a branch doesn't fit in the encoding of the instruction
    BranchOffsetOverflow {
        branch: InstructionHandle,
        offset: isize,
    },

    /// The handle is not (or no longer) part of this instruction list
    NotInList(InstructionHandle),

    /// Deleting instructions would leave dangling references to them
    TargetLost(TargetLost),

    /// Local variables cannot have this type (eg. `void`)
    InvalidLocalVariableType(String),

    /// Initial values are only allowed on final fields of primitive or string type
    InitialValueNotAllowed(String),

    /// No primitive conversion or reference cast exists between the types
    InvalidCast { from: String, to: String },

    /// Method bytecode is more than the 65535 bytes allowed
    MethodCodeOverflow(usize),

    /// Class hierarchy lookup failed for a class
    MissingClass(BinaryName),
}

/// Details of a constant which could not be added to the pool
#[derive(Debug)]
pub struct ConstantPoolOverflow {
    pub constant: Constant,
    pub offset: usize,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<ConstantPoolOverflow> for Error {
    fn from(err: ConstantPoolOverflow) -> Error {
        Error::ConstantPoolOverflow(err)
    }
}

impl From<TargetLost> for Error {
    fn from(err: TargetLost) -> Error {
        Error::TargetLost(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::ConstantPoolOverflow(overflow) => write!(
                f,
                "Constant pool overflow adding {:?} at {}",
                overflow.constant, overflow.offset
            ),
            Error::MissingConstant(index) => write!(f, "No constant at index {}", index.0),
            Error::UnexpectedConstant { index, expected } => {
                write!(f, "Expected a {} constant at index {}", expected, index.0)
            }
            Error::MalformedAttribute(name) => write!(f, "Malformed {} attribute", name),
            Error::BadDescriptor(msg) => write!(f, "Bad descriptor: {}", msg),
            Error::NegativeOrInvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::IncompatibleHandleKind(handle) => write!(
                f,
                "{:?} cannot swap between plain and branch instructions",
                handle
            ),
            Error::MismatchedSwitchArrays { matches, targets } => write!(
                f,
                "Switch has {} match values but {} targets",
                matches, targets
            ),
            Error::InvalidDimensions(dims) => write!(f, "Invalid array dimensions {}", dims),
            Error::InvalidOpcode { opcode, offset } => {
                write!(f, "Invalid opcode {:#04x} at offset {}", opcode, offset)
            }
            Error::InvalidMove(handle) => {
                write!(f, "Cannot move a range of instructions to {:?} inside it", handle)
            }
            Error::BranchTargetNotInList { branch, target } => write!(
                f,
                "Branch {:?} targets {:?}, which is not in the list",
                branch, target
            ),
            Error::UnresolvedPosition(handle) => {
                write!(f, "Position of {:?} has not been resolved", handle)
            }
            Error::BranchOffsetOverflow { branch, offset } => {
                write!(f, "Branch offset {} of {:?} is out of range", offset, branch)
            }
            Error::NotInList(handle) => write!(f, "{:?} is not in the instruction list", handle),
            Error::TargetLost(lost) => write!(f, "{}", lost),
            Error::InvalidLocalVariableType(typ) => {
                write!(f, "Local variables cannot have type {}", typ)
            }
            Error::InitialValueNotAllowed(msg) => write!(f, "Initial value not allowed: {}", msg),
            Error::InvalidCast { from, to } => write!(f, "Cannot cast from {} to {}", from, to),
            Error::MethodCodeOverflow(len) => {
                write!(f, "Method code is {} bytes (limit is 65535)", len)
            }
            Error::MissingClass(name) => write!(f, "Class {} is not in the hierarchy", name),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}
