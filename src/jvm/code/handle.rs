use super::visitor::{Capability, Visitor};
use super::{BranchInstruction, Instruction};
use crate::jvm::class_file::ConstantLookup;
use crate::jvm::{BinaryName, Error};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_HANDLE: AtomicUsize = AtomicUsize::new(0);

/// Identity of one instruction in an [`InstructionList`](super::InstructionList)
///
/// Handles are cheap copyable keys: the instruction, its neighbours, its position, and the set of
/// things targeting it all live in the list. Every handle ever created is distinct (even across
/// lists), so a handle which has been deleted from a list never accidentally refers to something
/// else later.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionHandle(usize);

impl InstructionHandle {
    /// Mint a handle which is not yet attached to any instruction
    ///
    /// This is useful for forward jumps: branches can target the handle right away, and the
    /// instruction gets attached later with
    /// [`InstructionList::append_with_handle`](super::InstructionList::append_with_handle).
    pub fn fresh() -> InstructionHandle {
        InstructionHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}

impl Debug for InstructionHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// Either kind of instruction
///
/// The variant also determines the kind of handle holding the instruction: a handle created for a
/// plain instruction can only ever hold plain instructions, and the same for branches.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AnyInstruction {
    Plain(Instruction),
    Branch(BranchInstruction),
}

impl From<Instruction> for AnyInstruction {
    fn from(instruction: Instruction) -> AnyInstruction {
        AnyInstruction::Plain(instruction)
    }
}

impl From<BranchInstruction> for AnyInstruction {
    fn from(instruction: BranchInstruction) -> AnyInstruction {
        AnyInstruction::Branch(instruction)
    }
}

impl AnyInstruction {
    pub fn is_branch(&self) -> bool {
        matches!(self, AnyInstruction::Branch(_))
    }

    /// Do the two instructions belong in the same kind of handle?
    pub fn same_kind(&self, other: &AnyInstruction) -> bool {
        self.is_branch() == other.is_branch()
    }

    pub fn as_plain(&self) -> Option<&Instruction> {
        match self {
            AnyInstruction::Plain(instruction) => Some(instruction),
            AnyInstruction::Branch(_) => None,
        }
    }

    pub fn as_branch(&self) -> Option<&BranchInstruction> {
        match self {
            AnyInstruction::Plain(_) => None,
            AnyInstruction::Branch(branch) => Some(branch),
        }
    }

    pub fn as_branch_mut(&mut self) -> Option<&mut BranchInstruction> {
        match self {
            AnyInstruction::Plain(_) => None,
            AnyInstruction::Branch(branch) => Some(branch),
        }
    }

    pub fn opcode(&self) -> u8 {
        match self {
            AnyInstruction::Plain(instruction) => instruction.opcode(),
            AnyInstruction::Branch(branch) => branch.opcode(),
        }
    }

    pub fn length(&self) -> usize {
        match self {
            AnyInstruction::Plain(instruction) => instruction.length(),
            AnyInstruction::Branch(branch) => branch.length(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnyInstruction::Plain(instruction) => instruction.name(),
            AnyInstruction::Branch(branch) => branch.name(),
        }
    }

    pub fn stack_effect(&self, pool: &impl ConstantLookup) -> Result<(usize, usize), Error> {
        match self {
            AnyInstruction::Plain(instruction) => instruction.stack_effect(pool),
            AnyInstruction::Branch(branch) => Ok(branch.stack_effect()),
        }
    }

    pub fn consume_stack(&self, pool: &impl ConstantLookup) -> Result<usize, Error> {
        Ok(self.stack_effect(pool)?.0)
    }

    pub fn produce_stack(&self, pool: &impl ConstantLookup) -> Result<usize, Error> {
        Ok(self.stack_effect(pool)?.1)
    }

    pub fn exceptions(&self) -> Vec<BinaryName> {
        match self {
            AnyInstruction::Plain(instruction) => instruction.exceptions(),
            AnyInstruction::Branch(_) => vec![],
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            AnyInstruction::Plain(instruction) => instruction.capabilities(),
            AnyInstruction::Branch(branch) => branch.capabilities(),
        }
    }

    /// Visit the capabilities of the instruction (in order), then the instruction itself
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        for capability in self.capabilities() {
            visitor.visit_capability(*capability, self);
        }
        match self {
            AnyInstruction::Plain(instruction) => visitor.visit_instruction(instruction),
            AnyInstruction::Branch(branch) => visitor.visit_branch_instruction(branch),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{OrdComparison, Visitor};

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl Visitor for Recorder {
        fn visit_capability(&mut self, capability: Capability, _: &AnyInstruction) {
            self.0.push(format!("{:?}", capability));
        }

        fn visit_instruction(&mut self, instruction: &Instruction) {
            self.0.push(instruction.name().to_string());
        }

        fn visit_branch_instruction(&mut self, branch: &BranchInstruction) {
            self.0.push(branch.name().to_string());
        }
    }

    #[test]
    fn visit_order() {
        let mut recorder = Recorder::default();
        AnyInstruction::from(Instruction::ILoad(4)).accept(&mut recorder);
        assert_eq!(
            recorder.0,
            vec!["StackProducer", "Push", "Typed", "LocalVariable", "Load", "iload"]
        );

        let mut recorder = Recorder::default();
        let target = InstructionHandle::fresh();
        AnyInstruction::from(BranchInstruction::If(OrdComparison::LT, target))
            .accept(&mut recorder);
        assert_eq!(recorder.0, vec!["StackConsumer", "Branch", "If", "iflt"]);
    }

    #[test]
    fn fresh_handles_are_distinct() {
        let first = InstructionHandle::fresh();
        let second = InstructionHandle::fresh();
        assert_ne!(first, second);
        assert!(first < second);
    }
}
