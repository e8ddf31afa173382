use super::{InstructionHandle, InstructionList};
use crate::jvm::class_file::{BytecodeIndex, ExceptionHandler, LineNumber, LocalVariable};
use crate::jvm::{ConstantPoolGen, Error, RenderDescriptor, Type};
use std::convert::TryFrom;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_TARGETER: AtomicUsize = AtomicUsize::new(0);

/// Identity of a non-branch targeter (exception handler, local variable, or line number)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargeterId(usize);

impl TargeterId {
    pub fn fresh() -> TargeterId {
        TargeterId(NEXT_TARGETER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Something which refers to an instruction in a list
///
/// Each instruction tracks what targets it, so that deleting an instruction can refuse to leave
/// references dangling. The same targeter may appear several times on one instruction (eg. a
/// switch with two cases jumping to the same place).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Targeter {
    /// Branch instruction (identified by its handle) jumping to the instruction
    Branch(InstructionHandle),

    /// Exception handler whose range starts or ends at (or whose handler starts at) the
    /// instruction
    ExceptionHandler(TargeterId),

    /// Local variable whose live range starts or ends at the instruction
    LocalVariable(TargeterId),

    /// Line number entry attached to the instruction
    LineNumber(TargeterId),
}

/// Instructions could not be deleted because things still target them
///
/// Nothing was changed in the list. Each entry is a handle that was going to be deleted, along
/// with all of the targeters still referring to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetLost {
    pub orphans: Vec<(InstructionHandle, Vec<Targeter>)>,
}

impl TargetLost {
    /// Handles which are still targeted
    pub fn handles(&self) -> impl Iterator<Item = InstructionHandle> + '_ {
        self.orphans.iter().map(|(handle, _)| *handle)
    }
}

impl Display for TargetLost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Deleted instructions are still targeted:")?;
        for (handle, targeters) in &self.orphans {
            write!(f, " {:?} by {:?};", handle, targeters)?;
        }
        Ok(())
    }
}

fn bytecode_index(offset: usize) -> Result<BytecodeIndex, Error> {
    u16::try_from(offset)
        .map(BytecodeIndex)
        .map_err(|_| Error::MethodCodeOverflow(offset))
}

/// Move one registration of `targeter` from `old` to `new` (either may be absent)
fn rebind(
    code: &mut InstructionList,
    targeter: Targeter,
    old: Option<InstructionHandle>,
    new: Option<InstructionHandle>,
) {
    if let Some(old) = old {
        code.remove_targeter(old, targeter);
    }
    if let Some(new) = new {
        code.add_targeter(new, targeter);
    }
}

/// Local variable with a live range over a section of an instruction list
///
/// The bounds of the range are registered as targeters on the instructions they point to, so
/// they can only be moved through setters which also update the list.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalVariableGen {
    pub(crate) id: TargeterId,
    pub name: String,
    pub typ: Type,

    /// Local variable slot
    pub index: u16,

    /// First instruction where the variable is live (`None` means the start of the list)
    pub(crate) start: Option<InstructionHandle>,

    /// Last instruction where the variable is live (`None` means the end of the list)
    pub(crate) end: Option<InstructionHandle>,

    /// When the range ends on the last instruction of the list, whether to include that
    /// instruction in the range
    pub live_to_end: bool,
}

impl LocalVariableGen {
    pub fn new(
        name: impl Into<String>,
        typ: Type,
        index: u16,
        start: Option<InstructionHandle>,
        end: Option<InstructionHandle>,
    ) -> LocalVariableGen {
        LocalVariableGen {
            id: TargeterId::fresh(),
            name: name.into(),
            typ,
            index,
            start,
            end,
            live_to_end: true,
        }
    }

    pub fn id(&self) -> TargeterId {
        self.id
    }

    pub fn targeter(&self) -> Targeter {
        Targeter::LocalVariable(self.id)
    }

    pub fn start(&self) -> Option<InstructionHandle> {
        self.start
    }

    pub fn end(&self) -> Option<InstructionHandle> {
        self.end
    }

    /// Move the start of the live range, updating the targeters registered in `code`
    pub fn set_start(&mut self, code: &mut InstructionList, start: Option<InstructionHandle>) {
        rebind(code, self.targeter(), self.start, start);
        self.start = start;
    }

    /// Move the end of the live range, updating the targeters registered in `code`
    pub fn set_end(&mut self, code: &mut InstructionList, end: Option<InstructionHandle>) {
        rebind(code, self.targeter(), self.end, end);
        self.end = end;
    }

    /// Resolve into a `LocalVariableTable` entry
    ///
    /// Positions in the list must already be resolved.
    pub fn local_variable(
        &self,
        code: &InstructionList,
        constants: &mut ConstantPoolGen,
    ) -> Result<LocalVariable, Error> {
        let (start, end) = match (self.start.or(code.start()), self.end.or(code.end())) {
            (Some(start), Some(end)) => {
                let start_pc = code.position(start)?;
                let mut end_pc = code.position(end)?;
                if self.live_to_end && code.next(end)?.is_none() {
                    end_pc += code.instruction(end)?.length();
                }
                (start_pc, end_pc)
            }
            _ => (0, 0),
        };

        let descriptor = match &self.typ {
            Type::Field(field_type) => field_type.render(),
            other => return Err(Error::InvalidLocalVariableType(other.to_string())),
        };

        Ok(LocalVariable {
            start_pc: bytecode_index(start)?,
            length: bytecode_index(end.saturating_sub(start))?.0,
            name_index: constants.add_utf8(self.name.as_str())?,
            descriptor_index: constants.add_utf8(descriptor)?,
            index: self.index,
        })
    }
}

/// Exception handler covering a range of instructions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeExceptionGen {
    pub(crate) id: TargeterId,

    /// First instruction covered
    pub(crate) start: InstructionHandle,

    /// Last instruction covered (inclusive)
    pub(crate) end: InstructionHandle,

    /// Start of the handler code
    pub(crate) handler: InstructionHandle,

    /// Class of exceptions caught (`None` catches everything)
    pub catch_type: Option<String>,
}

impl CodeExceptionGen {
    pub fn new(
        start: InstructionHandle,
        end: InstructionHandle,
        handler: InstructionHandle,
        catch_type: Option<String>,
    ) -> CodeExceptionGen {
        CodeExceptionGen {
            id: TargeterId::fresh(),
            start,
            end,
            handler,
            catch_type,
        }
    }

    pub fn id(&self) -> TargeterId {
        self.id
    }

    pub fn targeter(&self) -> Targeter {
        Targeter::ExceptionHandler(self.id)
    }

    pub fn start(&self) -> InstructionHandle {
        self.start
    }

    pub fn end(&self) -> InstructionHandle {
        self.end
    }

    pub fn handler(&self) -> InstructionHandle {
        self.handler
    }

    pub fn set_start(&mut self, code: &mut InstructionList, start: InstructionHandle) {
        rebind(code, self.targeter(), Some(self.start), Some(start));
        self.start = start;
    }

    pub fn set_end(&mut self, code: &mut InstructionList, end: InstructionHandle) {
        rebind(code, self.targeter(), Some(self.end), Some(end));
        self.end = end;
    }

    pub fn set_handler(&mut self, code: &mut InstructionList, handler: InstructionHandle) {
        rebind(code, self.targeter(), Some(self.handler), Some(handler));
        self.handler = handler;
    }

    /// Resolve into an exception table entry
    ///
    /// The end offset is exclusive: it points just past the last instruction covered.
    pub fn code_exception(
        &self,
        code: &InstructionList,
        constants: &mut ConstantPoolGen,
    ) -> Result<ExceptionHandler, Error> {
        let end_pc = code.position(self.end)? + code.instruction(self.end)?.length();
        let catch_type = match &self.catch_type {
            None => None,
            Some(class_name) => Some(constants.add_class(class_name)?),
        };
        Ok(ExceptionHandler {
            start_pc: bytecode_index(code.position(self.start)?)?,
            end_pc: bytecode_index(end_pc)?,
            handler_pc: bytecode_index(code.position(self.handler)?)?,
            catch_type,
        })
    }
}

/// Source line number attached to an instruction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineNumberGen {
    pub(crate) id: TargeterId,
    pub(crate) handle: InstructionHandle,
    pub line: u16,
}

impl LineNumberGen {
    pub fn new(handle: InstructionHandle, line: u16) -> LineNumberGen {
        LineNumberGen {
            id: TargeterId::fresh(),
            handle,
            line,
        }
    }

    pub fn id(&self) -> TargeterId {
        self.id
    }

    pub fn targeter(&self) -> Targeter {
        Targeter::LineNumber(self.id)
    }

    pub fn handle(&self) -> InstructionHandle {
        self.handle
    }

    /// Attach the line number to another instruction, updating the targeters registered in
    /// `code`
    pub fn set_handle(&mut self, code: &mut InstructionList, handle: InstructionHandle) {
        rebind(code, self.targeter(), Some(self.handle), Some(handle));
        self.handle = handle;
    }

    pub fn line_number(&self, code: &InstructionList) -> Result<LineNumber, Error> {
        Ok(LineNumber {
            start_pc: bytecode_index(code.position(self.handle)?)?,
            line_number: self.line,
        })
    }
}
