//! Straight-line JVM instructions
//!
//! The representation is slightly different from the usual presentation to make it more
//! convenient to construct bytecode:
//!
//!   - The "wide" instruction doesn't show up at all, but instead gets merged into the
//!     instructions it is allowed to modify
//!
//!   - The short forms of local variable instructions (eg. `iload_2`) and `ldc_w` are chosen
//!     automatically from the index when serializing
//!
//!   - Some instructions (like the shifts) get abstracted into one instruction with a field
//!
//! Anything that branches to another instruction lives in [`BranchInstruction`] instead. Returns
//! and `athrow` end the flow of control but have no targets, so they are plain instructions.
//!
//! [`BranchInstruction`]: super::BranchInstruction

use super::opcodes as op;
use super::visitor::{self as caps, Capability, Visitor};
use super::AnyInstruction;
use crate::jvm::class_file::{
    ClassConstantIndex, ConstantIndex, ConstantLookup, FieldRefConstantIndex,
    InvokeDynamicConstantIndex, MethodRefConstantIndex, Serialize,
};
use crate::jvm::{BaseType, BinaryName, Error, Type};
use crate::util::Width;
use byteorder::WriteBytesExt;
use std::convert::TryFrom;
use std::ops::Not;

/// Non-branching JVM bytecode instruction
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Instruction {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(ConstantIndex), // covers both `ldc` and `ldc_w`
    Ldc2(ConstantIndex),
    ILoad(u16), // covers `iload`, `iload{0,3}`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16), // covers `istore`, `istore{0,3}`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType), // covers `ishl`, `ishr`, `iushr`
    LSh(ShiftType), // covers `lshl`, `lshr`, `lushr`
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode), // covers `fcmpl` and `fcmpg`
    DCmp(CompareMode), // covers `dcmpl` and `dcmpg`
    Ret(u16),          // covers `ret` and `wide ret`
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    GetStatic(FieldRefConstantIndex),
    PutStatic(FieldRefConstantIndex),
    GetField(FieldRefConstantIndex),
    PutField(FieldRefConstantIndex),
    Invoke(InvokeType, MethodRefConstantIndex),
    InvokeDynamic(InvokeDynamicConstantIndex),
    New(ClassConstantIndex),
    NewArray(BaseType),
    ANewArray(ClassConstantIndex),
    ArrayLength,
    AThrow,
    CheckCast(ClassConstantIndex),
    InstanceOf(ClassConstantIndex),
    MonitorEnter,
    MonitorExit,
    MultiANewArray(ClassConstantIndex, u8),
    Breakpoint,
    ImpDep1,
    ImpDep2,
}

/// Pick the `xload_n` short form, the regular form, or the `wide` form
fn local_opcode(index: u16, short_form_start: u8, normal_form: u8) -> u8 {
    match index {
        0..=3 => short_form_start + index as u8,
        _ => normal_form,
    }
}

fn local_width(index: u16) -> usize {
    match index {
        0..=3 => 1,
        4..=255 => 2,
        _ => 4,
    }
}

impl Instruction {
    /// Opcode of the instruction, as it will be encoded
    ///
    /// For instructions which get a `wide` prefix, this is the opcode being widened.
    pub fn opcode(&self) -> u8 {
        use Instruction::*;

        match self {
            Nop => op::NOP,
            AConstNull => op::ACONST_NULL,
            IConstM1 => op::ICONST_M1,
            IConst0 => op::ICONST_0,
            IConst1 => op::ICONST_1,
            IConst2 => op::ICONST_2,
            IConst3 => op::ICONST_3,
            IConst4 => op::ICONST_4,
            IConst5 => op::ICONST_5,
            LConst0 => op::LCONST_0,
            LConst1 => op::LCONST_1,
            FConst0 => op::FCONST_0,
            FConst1 => op::FCONST_1,
            FConst2 => op::FCONST_2,
            DConst0 => op::DCONST_0,
            DConst1 => op::DCONST_1,
            BiPush(_) => op::BIPUSH,
            SiPush(_) => op::SIPUSH,
            Ldc(ConstantIndex(0..=255)) => op::LDC,
            Ldc(_) => op::LDC_W,
            Ldc2(_) => op::LDC2_W,
            ILoad(idx) => local_opcode(*idx, op::ILOAD_0, op::ILOAD),
            LLoad(idx) => local_opcode(*idx, op::LLOAD_0, op::LLOAD),
            FLoad(idx) => local_opcode(*idx, op::FLOAD_0, op::FLOAD),
            DLoad(idx) => local_opcode(*idx, op::DLOAD_0, op::DLOAD),
            ALoad(idx) => local_opcode(*idx, op::ALOAD_0, op::ALOAD),
            IALoad => op::IALOAD,
            LALoad => op::LALOAD,
            FALoad => op::FALOAD,
            DALoad => op::DALOAD,
            AALoad => op::AALOAD,
            BALoad => op::BALOAD,
            CALoad => op::CALOAD,
            SALoad => op::SALOAD,
            IStore(idx) => local_opcode(*idx, op::ISTORE_0, op::ISTORE),
            LStore(idx) => local_opcode(*idx, op::LSTORE_0, op::LSTORE),
            FStore(idx) => local_opcode(*idx, op::FSTORE_0, op::FSTORE),
            DStore(idx) => local_opcode(*idx, op::DSTORE_0, op::DSTORE),
            AStore(idx) => local_opcode(*idx, op::ASTORE_0, op::ASTORE),
            IAStore => op::IASTORE,
            LAStore => op::LASTORE,
            FAStore => op::FASTORE,
            DAStore => op::DASTORE,
            AAStore => op::AASTORE,
            BAStore => op::BASTORE,
            CAStore => op::CASTORE,
            SAStore => op::SASTORE,
            Pop => op::POP,
            Pop2 => op::POP2,
            Dup => op::DUP,
            DupX1 => op::DUP_X1,
            DupX2 => op::DUP_X2,
            Dup2 => op::DUP2,
            Dup2X1 => op::DUP2_X1,
            Dup2X2 => op::DUP2_X2,
            Swap => op::SWAP,
            IAdd => op::IADD,
            LAdd => op::LADD,
            FAdd => op::FADD,
            DAdd => op::DADD,
            ISub => op::ISUB,
            LSub => op::LSUB,
            FSub => op::FSUB,
            DSub => op::DSUB,
            IMul => op::IMUL,
            LMul => op::LMUL,
            FMul => op::FMUL,
            DMul => op::DMUL,
            IDiv => op::IDIV,
            LDiv => op::LDIV,
            FDiv => op::FDIV,
            DDiv => op::DDIV,
            IRem => op::IREM,
            LRem => op::LREM,
            FRem => op::FREM,
            DRem => op::DREM,
            INeg => op::INEG,
            LNeg => op::LNEG,
            FNeg => op::FNEG,
            DNeg => op::DNEG,
            ISh(ShiftType::Left) => op::ISHL,
            ISh(ShiftType::ArithmeticRight) => op::ISHR,
            ISh(ShiftType::LogicalRight) => op::IUSHR,
            LSh(ShiftType::Left) => op::LSHL,
            LSh(ShiftType::ArithmeticRight) => op::LSHR,
            LSh(ShiftType::LogicalRight) => op::LUSHR,
            IAnd => op::IAND,
            LAnd => op::LAND,
            IOr => op::IOR,
            LOr => op::LOR,
            IXor => op::IXOR,
            LXor => op::LXOR,
            IInc(_, _) => op::IINC,
            I2L => op::I2L,
            I2F => op::I2F,
            I2D => op::I2D,
            L2I => op::L2I,
            L2F => op::L2F,
            L2D => op::L2D,
            F2I => op::F2I,
            F2L => op::F2L,
            F2D => op::F2D,
            D2I => op::D2I,
            D2L => op::D2L,
            D2F => op::D2F,
            I2B => op::I2B,
            I2C => op::I2C,
            I2S => op::I2S,
            LCmp => op::LCMP,
            FCmp(CompareMode::L) => op::FCMPL,
            FCmp(CompareMode::G) => op::FCMPG,
            DCmp(CompareMode::L) => op::DCMPL,
            DCmp(CompareMode::G) => op::DCMPG,
            Ret(_) => op::RET,
            IReturn => op::IRETURN,
            LReturn => op::LRETURN,
            FReturn => op::FRETURN,
            DReturn => op::DRETURN,
            AReturn => op::ARETURN,
            Return => op::RETURN,
            GetStatic(_) => op::GETSTATIC,
            PutStatic(_) => op::PUTSTATIC,
            GetField(_) => op::GETFIELD,
            PutField(_) => op::PUTFIELD,
            Invoke(InvokeType::Virtual, _) => op::INVOKEVIRTUAL,
            Invoke(InvokeType::Special, _) => op::INVOKESPECIAL,
            Invoke(InvokeType::Static, _) => op::INVOKESTATIC,
            Invoke(InvokeType::Interface(_), _) => op::INVOKEINTERFACE,
            InvokeDynamic(_) => op::INVOKEDYNAMIC,
            New(_) => op::NEW,
            NewArray(_) => op::NEWARRAY,
            ANewArray(_) => op::ANEWARRAY,
            ArrayLength => op::ARRAYLENGTH,
            AThrow => op::ATHROW,
            CheckCast(_) => op::CHECKCAST,
            InstanceOf(_) => op::INSTANCEOF,
            MonitorEnter => op::MONITORENTER,
            MonitorExit => op::MONITOREXIT,
            MultiANewArray(_, _) => op::MULTIANEWARRAY,
            Breakpoint => op::BREAKPOINT,
            ImpDep1 => op::IMPDEP1,
            ImpDep2 => op::IMPDEP2,
        }
    }

    /// Encoded length of the instruction in bytes
    pub fn length(&self) -> usize {
        self.width()
    }

    /// Mnemonic of the instruction (eg. `iload_1`)
    pub fn name(&self) -> &'static str {
        op::mnemonic(self.opcode()).unwrap_or("<invalid>")
    }

    /// Stack slots consumed and produced
    ///
    /// Most instructions have a fixed effect. Field accesses and invocations need to consult the
    /// constant pool for the descriptor of the member.
    pub fn stack_effect(&self, pool: &impl ConstantLookup) -> Result<(usize, usize), Error> {
        use Instruction::*;

        Ok(match self {
            Nop | IInc(_, _) | Ret(_) | Return | Breakpoint | ImpDep1 | ImpDep2 => (0, 0),

            AConstNull | IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5
            | FConst0 | FConst1 | FConst2 | BiPush(_) | SiPush(_) | Ldc(_) | ILoad(_)
            | FLoad(_) | ALoad(_) | New(_) => (0, 1),

            LConst0 | LConst1 | DConst0 | DConst1 | Ldc2(_) | LLoad(_) | DLoad(_) => (0, 2),

            IALoad | FALoad | AALoad | BALoad | CALoad | SALoad => (2, 1),
            LALoad | DALoad => (2, 2),

            IStore(_) | FStore(_) | AStore(_) => (1, 0),
            LStore(_) | DStore(_) => (2, 0),

            IAStore | FAStore | AAStore | BAStore | CAStore | SAStore => (3, 0),
            LAStore | DAStore => (4, 0),

            Pop => (1, 0),
            Pop2 => (2, 0),
            Dup => (1, 2),
            DupX1 => (2, 3),
            DupX2 => (3, 4),
            Dup2 => (2, 4),
            Dup2X1 => (3, 5),
            Dup2X2 => (4, 6),
            Swap => (2, 2),

            IAdd | FAdd | ISub | FSub | IMul | FMul | IDiv | FDiv | IRem | FRem | ISh(_)
            | IAnd | IOr | IXor => (2, 1),
            LAdd | DAdd | LSub | DSub | LMul | DMul | LDiv | DDiv | LRem | DRem | LAnd | LOr
            | LXor => (4, 2),
            LSh(_) => (3, 2),

            INeg | FNeg => (1, 1),
            LNeg | DNeg => (2, 2),

            I2F | F2I | I2B | I2C | I2S => (1, 1),
            I2L | I2D | F2L | F2D => (1, 2),
            L2I | L2F | D2I | D2F => (2, 1),
            L2D | D2L => (2, 2),

            LCmp | DCmp(_) => (4, 1),
            FCmp(_) => (2, 1),

            IReturn | FReturn | AReturn => (1, 0),
            LReturn | DReturn => (2, 0),

            GetStatic(field) => (0, field_size(pool, *field)?),
            PutStatic(field) => (field_size(pool, *field)?, 0),
            GetField(field) => (1, field_size(pool, *field)?),
            PutField(field) => (field_size(pool, *field)? + 1, 0),

            Invoke(invoke_type, method) => {
                let member = pool.member_ref((*method).into())?;
                let mut consumed = Type::argument_types_size(member.descriptor)?;
                if *invoke_type != InvokeType::Static {
                    consumed += 1;
                }
                (consumed, Type::return_type_size(member.descriptor)?)
            }
            InvokeDynamic(call_site) => {
                let (_, descriptor) = pool.dynamic_name_and_type((*call_site).into())?;
                (
                    Type::argument_types_size(descriptor)?,
                    Type::return_type_size(descriptor)?,
                )
            }

            NewArray(_) | ANewArray(_) | ArrayLength | CheckCast(_) | InstanceOf(_) => (1, 1),
            AThrow => (1, 1),
            MonitorEnter | MonitorExit => (1, 0),
            MultiANewArray(_, dimensions) => (*dimensions as usize, 1),
        })
    }

    /// Number of operand stack slots popped by the instruction
    pub fn consume_stack(&self, pool: &impl ConstantLookup) -> Result<usize, Error> {
        self.stack_effect(pool).map(|(consumed, _)| consumed)
    }

    /// Number of operand stack slots pushed by the instruction
    pub fn produce_stack(&self, pool: &impl ConstantLookup) -> Result<usize, Error> {
        self.stack_effect(pool).map(|(_, produced)| produced)
    }

    /// Exceptions (and linking errors) which executing the instruction may throw
    pub fn exceptions(&self) -> Vec<BinaryName> {
        use Instruction::*;

        let mut exceptions = vec![];
        match self {
            IALoad | LALoad | FALoad | DALoad | AALoad | BALoad | CALoad | SALoad | IAStore
            | LAStore | FAStore | DAStore | BAStore | CAStore | SAStore => {
                exceptions.push(BinaryName::NULLPOINTEREXCEPTION);
                exceptions.push(BinaryName::ARRAYINDEXOUTOFBOUNDSEXCEPTION);
            }
            AAStore => {
                exceptions.push(BinaryName::NULLPOINTEREXCEPTION);
                exceptions.push(BinaryName::ARRAYINDEXOUTOFBOUNDSEXCEPTION);
                exceptions.push(BinaryName::ARRAYSTOREEXCEPTION);
            }
            IDiv | IRem | LDiv | LRem => exceptions.push(BinaryName::ARITHMETICEXCEPTION),
            IReturn | LReturn | FReturn | DReturn | AReturn | Return => {
                exceptions.push(BinaryName::ILLEGALMONITORSTATEEXCEPTION)
            }
            ArrayLength | MonitorEnter | MonitorExit => {
                exceptions.push(BinaryName::NULLPOINTEREXCEPTION)
            }
            AThrow => exceptions.push(BinaryName::THROWABLE),
            Ldc(_) => exceptions.extend(class_resolution_errors()),
            GetStatic(_) | PutStatic(_) => {
                exceptions.extend(member_resolution_errors());
                exceptions.push(BinaryName::INCOMPATIBLECLASSCHANGEERROR);
                exceptions.push(BinaryName::EXCEPTIONININITIALIZERERROR);
            }
            GetField(_) | PutField(_) => {
                exceptions.extend(member_resolution_errors());
                exceptions.push(BinaryName::NULLPOINTEREXCEPTION);
                exceptions.push(BinaryName::INCOMPATIBLECLASSCHANGEERROR);
            }
            Invoke(InvokeType::Static, _) => {
                exceptions.extend(member_resolution_errors());
                exceptions.push(BinaryName::INCOMPATIBLECLASSCHANGEERROR);
                exceptions.push(BinaryName::UNSATISFIEDLINKERROR);
                exceptions.push(BinaryName::EXCEPTIONININITIALIZERERROR);
            }
            Invoke(_, _) => {
                exceptions.extend(member_resolution_errors());
                exceptions.push(BinaryName::INCOMPATIBLECLASSCHANGEERROR);
                exceptions.push(BinaryName::NULLPOINTEREXCEPTION);
                exceptions.push(BinaryName::ABSTRACTMETHODERROR);
                exceptions.push(BinaryName::UNSATISFIEDLINKERROR);
            }
            InvokeDynamic(_) => {
                exceptions.push(BinaryName::BOOTSTRAPMETHODERROR);
                exceptions.push(BinaryName::UNSATISFIEDLINKERROR);
                exceptions.push(BinaryName::ABSTRACTMETHODERROR);
                exceptions.push(BinaryName::ILLEGALACCESSERROR);
                exceptions.push(BinaryName::INCOMPATIBLECLASSCHANGEERROR);
            }
            New(_) => {
                exceptions.extend(class_resolution_errors());
                exceptions.push(BinaryName::INSTANTIATIONERROR);
            }
            NewArray(_) => exceptions.push(BinaryName::NEGATIVEARRAYSIZEEXCEPTION),
            ANewArray(_) | MultiANewArray(_, _) => {
                exceptions.extend(class_resolution_errors());
                exceptions.push(BinaryName::NEGATIVEARRAYSIZEEXCEPTION);
            }
            CheckCast(_) => {
                exceptions.extend(class_resolution_errors());
                exceptions.push(BinaryName::CLASSCASTEXCEPTION);
            }
            InstanceOf(_) => exceptions.extend(class_resolution_errors()),
            _ => (),
        }
        exceptions
    }

    /// Local variable slot accessed, along with the number of slots accessed
    pub fn local_variable(&self) -> Option<(u16, usize)> {
        use Instruction::*;

        match self {
            ILoad(idx) | FLoad(idx) | ALoad(idx) | IStore(idx) | FStore(idx) | AStore(idx)
            | IInc(idx, _) | Ret(idx) => Some((*idx, 1)),
            LLoad(idx) | DLoad(idx) | LStore(idx) | DStore(idx) => Some((*idx, 2)),
            _ => None,
        }
    }

    /// Local variable slot accessed by the instruction
    pub fn local_index(&self) -> Option<u16> {
        self.local_variable().map(|(index, _)| index)
    }

    /// Type of the value in the local variable slot accessed by the instruction
    pub fn local_type(&self) -> Option<Type> {
        use Instruction::*;

        match self {
            ILoad(_) | IStore(_) | IInc(_, _) => Some(Type::INT),
            LLoad(_) | LStore(_) => Some(Type::LONG),
            FLoad(_) | FStore(_) => Some(Type::FLOAT),
            DLoad(_) | DStore(_) => Some(Type::DOUBLE),
            ALoad(_) | AStore(_) => Some(Type::OBJECT),
            Ret(_) => Some(Type::ReturnAddress),
            _ => None,
        }
    }

    /// Change the local variable slot accessed, returning `false` if the instruction does not
    /// access any local variable
    pub fn set_local_index(&mut self, index: u16) -> bool {
        use Instruction::*;

        match self {
            ILoad(idx) | LLoad(idx) | FLoad(idx) | DLoad(idx) | ALoad(idx) | IStore(idx)
            | LStore(idx) | FStore(idx) | DStore(idx) | AStore(idx) | IInc(idx, _)
            | Ret(idx) => {
                *idx = index;
                true
            }
            _ => false,
        }
    }

    /// Constant pool entry referenced by the instruction
    pub fn cp_index(&self) -> Option<ConstantIndex> {
        use Instruction::*;

        match self {
            Ldc(idx) | Ldc2(idx) => Some(*idx),
            GetStatic(idx) | PutStatic(idx) | GetField(idx) | PutField(idx) => Some(idx.0),
            Invoke(_, idx) => Some(idx.0),
            InvokeDynamic(idx) => Some(idx.0),
            New(idx) | ANewArray(idx) | CheckCast(idx) | InstanceOf(idx)
            | MultiANewArray(idx, _) => Some(idx.0),
            _ => None,
        }
    }

    /// Same instruction, but referring to a different constant pool entry
    ///
    /// Instructions without a constant pool operand are returned unchanged.
    pub fn with_cp_index(self, index: ConstantIndex) -> Instruction {
        use Instruction::*;

        match self {
            Ldc(_) => Ldc(index),
            Ldc2(_) => Ldc2(index),
            GetStatic(_) => GetStatic(FieldRefConstantIndex(index)),
            PutStatic(_) => PutStatic(FieldRefConstantIndex(index)),
            GetField(_) => GetField(FieldRefConstantIndex(index)),
            PutField(_) => PutField(FieldRefConstantIndex(index)),
            Invoke(invoke_type, _) => Invoke(invoke_type, MethodRefConstantIndex(index)),
            InvokeDynamic(_) => InvokeDynamic(InvokeDynamicConstantIndex(index)),
            New(_) => New(ClassConstantIndex(index)),
            ANewArray(_) => ANewArray(ClassConstantIndex(index)),
            CheckCast(_) => CheckCast(ClassConstantIndex(index)),
            InstanceOf(_) => InstanceOf(ClassConstantIndex(index)),
            MultiANewArray(_, dimensions) => MultiANewArray(ClassConstantIndex(index), dimensions),
            other => other,
        }
    }

    /// Does control never continue to the following instruction?
    pub fn ends_flow(&self) -> bool {
        use Instruction::*;

        matches!(
            self,
            IReturn | LReturn | FReturn | DReturn | AReturn | Return | AThrow | Ret(_)
        )
    }

    /// Capabilities of the instruction, in the order in which visitors see them
    pub fn capabilities(&self) -> &'static [Capability] {
        use Instruction::*;

        match self {
            Nop | Breakpoint | ImpDep1 | ImpDep2 => caps::NONE,
            AConstNull => caps::ACONST_NULL,
            IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 | LConst0
            | LConst1 | FConst0 | FConst1 | FConst2 | DConst0 | DConst1 | BiPush(_)
            | SiPush(_) => caps::CONSTANT_PUSH,
            Ldc(_) => caps::LDC,
            Ldc2(_) => caps::LDC2_W,
            ILoad(_) | LLoad(_) | FLoad(_) | DLoad(_) | ALoad(_) => caps::LOAD,
            IStore(_) | LStore(_) | FStore(_) | DStore(_) | AStore(_) => caps::STORE,
            IALoad | LALoad | FALoad | DALoad | AALoad | BALoad | CALoad | SALoad => {
                caps::ARRAY_LOAD
            }
            IAStore | LAStore | FAStore | DAStore | AAStore | BAStore | CAStore | SAStore => {
                caps::ARRAY_STORE
            }
            Pop | Pop2 => caps::POP,
            Dup | Dup2 => caps::DUP,
            DupX1 | DupX2 | Dup2X1 | Dup2X2 => caps::DUP_X,
            Swap => caps::SWAP,
            IDiv | IRem | LDiv | LRem => caps::DIVISION,
            IAdd | LAdd | FAdd | DAdd | ISub | LSub | FSub | DSub | IMul | LMul | FMul | DMul
            | FDiv | DDiv | FRem | DRem | INeg | LNeg | FNeg | DNeg | ISh(_) | LSh(_) | IAnd
            | LAnd | IOr | LOr | IXor | LXor => caps::ARITHMETIC,
            IInc(_, _) => caps::IINC,
            I2L | I2F | I2D | L2I | L2F | L2D | F2I | F2L | F2D | D2I | D2L | D2F | I2B | I2C
            | I2S => caps::CONVERSION,
            LCmp | FCmp(_) | DCmp(_) => caps::COMPARISON,
            Ret(_) => caps::RET,
            IReturn | LReturn | FReturn | DReturn | AReturn | Return => caps::RETURN,
            GetStatic(_) => caps::GET_STATIC,
            PutStatic(_) => caps::PUT_STATIC,
            GetField(_) => caps::GET_FIELD,
            PutField(_) => caps::PUT_FIELD,
            Invoke(_, _) | InvokeDynamic(_) => caps::INVOKE,
            New(_) | ANewArray(_) => caps::NEW,
            NewArray(_) => caps::NEWARRAY,
            MultiANewArray(_, _) => caps::MULTIANEWARRAY,
            ArrayLength => caps::ARRAYLENGTH,
            AThrow => caps::ATHROW,
            CheckCast(_) | InstanceOf(_) => caps::TYPE_CHECK,
            MonitorEnter | MonitorExit => caps::MONITOR,
        }
    }

    /// Visit the capabilities of the instruction, then the instruction itself
    pub fn accept(&self, visitor: &mut impl Visitor) {
        AnyInstruction::Plain(*self).accept(visitor)
    }
}

fn field_size(pool: &impl ConstantLookup, field: FieldRefConstantIndex) -> Result<usize, Error> {
    let member = pool.member_ref(field.into())?;
    Ok(Type::from_signature(member.descriptor)?.size())
}

fn class_resolution_errors() -> Vec<BinaryName> {
    vec![
        BinaryName::NOCLASSDEFFOUNDERROR,
        BinaryName::CLASSFORMATERROR,
        BinaryName::VERIFYERROR,
        BinaryName::ILLEGALACCESSERROR,
    ]
}

fn member_resolution_errors() -> Vec<BinaryName> {
    let mut errors = class_resolution_errors();
    errors.push(BinaryName::NOSUCHFIELDERROR);
    errors.push(BinaryName::NOSUCHMETHODERROR);
    errors
}

impl Width for Instruction {
    fn width(&self) -> usize {
        use Instruction::*;

        match self {
            ILoad(idx) | LLoad(idx) | FLoad(idx) | DLoad(idx) | ALoad(idx) | IStore(idx)
            | LStore(idx) | FStore(idx) | DStore(idx) | AStore(idx) => local_width(*idx),

            BiPush(_) | Ldc(ConstantIndex(0..=255)) | NewArray(_) | Ret(0..=255) => 2,

            SiPush(_)
            | Ldc(_)
            | Ldc2(_) // always wide, unlike `ldc` vs. `ldc_w`
            | IInc(0..=255, -128..=127)
            | GetStatic(_)
            | PutStatic(_)
            | GetField(_)
            | PutField(_)
            | Invoke(InvokeType::Special, _)
            | Invoke(InvokeType::Static, _)
            | Invoke(InvokeType::Virtual, _)
            | New(_)
            | ANewArray(_)
            | CheckCast(_)
            | InstanceOf(_) => 3,

            Ret(_) | MultiANewArray(_, _) => 4,

            Invoke(InvokeType::Interface(_), _) | InvokeDynamic(_) => 5,

            IInc(_, _) => 6,

            _ => 1,
        }
    }
}

impl Serialize for Instruction {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        /* The load/store instructions follow the same pattern:
         *
         *   - indices 0 to 3 have a dedicated single-byte opcode
         *   - indices up to 255 use the regular opcode and a one byte index
         *   - bigger indices need the `wide` prefix and a two byte index
         */
        fn serialize_local<W: WriteBytesExt>(
            idx: u16,
            short_form_start: u8,
            normal_form: u8,
            writer: &mut W,
        ) -> std::io::Result<()> {
            match u8::try_from(idx) {
                Ok(n @ 0..=3) => (short_form_start + n).serialize(writer),
                Ok(n) => {
                    normal_form.serialize(writer)?;
                    n.serialize(writer)
                }
                Err(_) => {
                    op::WIDE.serialize(writer)?;
                    normal_form.serialize(writer)?;
                    idx.serialize(writer)
                }
            }
        }

        match self {
            Instruction::BiPush(byte) => {
                op::BIPUSH.serialize(writer)?;
                byte.serialize(writer)?;
            }
            Instruction::SiPush(short) => {
                op::SIPUSH.serialize(writer)?;
                short.serialize(writer)?;
            }
            Instruction::Ldc(idx) => match u8::try_from(idx.0) {
                Ok(short_idx) => {
                    op::LDC.serialize(writer)?;
                    short_idx.serialize(writer)?;
                }
                Err(_) => {
                    op::LDC_W.serialize(writer)?;
                    idx.serialize(writer)?;
                }
            },
            Instruction::Ldc2(idx) => {
                op::LDC2_W.serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::ILoad(idx) => serialize_local(*idx, op::ILOAD_0, op::ILOAD, writer)?,
            Instruction::LLoad(idx) => serialize_local(*idx, op::LLOAD_0, op::LLOAD, writer)?,
            Instruction::FLoad(idx) => serialize_local(*idx, op::FLOAD_0, op::FLOAD, writer)?,
            Instruction::DLoad(idx) => serialize_local(*idx, op::DLOAD_0, op::DLOAD, writer)?,
            Instruction::ALoad(idx) => serialize_local(*idx, op::ALOAD_0, op::ALOAD, writer)?,
            Instruction::IStore(idx) => serialize_local(*idx, op::ISTORE_0, op::ISTORE, writer)?,
            Instruction::LStore(idx) => serialize_local(*idx, op::LSTORE_0, op::LSTORE, writer)?,
            Instruction::FStore(idx) => serialize_local(*idx, op::FSTORE_0, op::FSTORE, writer)?,
            Instruction::DStore(idx) => serialize_local(*idx, op::DSTORE_0, op::DSTORE, writer)?,
            Instruction::AStore(idx) => serialize_local(*idx, op::ASTORE_0, op::ASTORE, writer)?,
            Instruction::IInc(idx, diff) => match (u8::try_from(*idx), i8::try_from(*diff)) {
                (Ok(idx), Ok(diff)) => {
                    op::IINC.serialize(writer)?;
                    idx.serialize(writer)?;
                    diff.serialize(writer)?;
                }
                _ => {
                    op::WIDE.serialize(writer)?;
                    op::IINC.serialize(writer)?;
                    idx.serialize(writer)?;
                    diff.serialize(writer)?;
                }
            },
            Instruction::Ret(idx) => match u8::try_from(*idx) {
                Ok(short_idx) => {
                    op::RET.serialize(writer)?;
                    short_idx.serialize(writer)?;
                }
                Err(_) => {
                    op::WIDE.serialize(writer)?;
                    op::RET.serialize(writer)?;
                    idx.serialize(writer)?;
                }
            },
            Instruction::GetStatic(idx)
            | Instruction::PutStatic(idx)
            | Instruction::GetField(idx)
            | Instruction::PutField(idx) => {
                self.opcode().serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::Invoke(InvokeType::Interface(cnt), idx) => {
                op::INVOKEINTERFACE.serialize(writer)?;
                idx.serialize(writer)?;
                cnt.serialize(writer)?;
                0u8.serialize(writer)?;
            }
            Instruction::Invoke(_, idx) => {
                self.opcode().serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::InvokeDynamic(idx) => {
                op::INVOKEDYNAMIC.serialize(writer)?;
                idx.serialize(writer)?;
                0u16.serialize(writer)?;
            }
            Instruction::NewArray(base_type) => {
                op::NEWARRAY.serialize(writer)?;
                base_type.array_type_code().serialize(writer)?;
            }
            Instruction::New(idx)
            | Instruction::ANewArray(idx)
            | Instruction::CheckCast(idx)
            | Instruction::InstanceOf(idx) => {
                self.opcode().serialize(writer)?;
                idx.serialize(writer)?;
            }
            Instruction::MultiANewArray(idx, dimensions) => {
                op::MULTIANEWARRAY.serialize(writer)?;
                idx.serialize(writer)?;
                dimensions.serialize(writer)?;
            }

            // Everything else is just the opcode
            other => other.opcode().serialize(writer)?,
        }
        Ok(())
    }
}

/// Type of shift
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShiftType {
    /// Left shift
    Left,

    /// Arithmetic right shift (preserves the sign bit)
    ArithmeticRight,

    /// Logical right shift (fills with zeros)
    LogicalRight,
}

/// Floating point comparison modes (they differ in how they treat `NaN`)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CompareMode {
    /// `NaN` compares as less than everything
    L,

    /// `NaN` compares as greater than everything
    G,
}

/// Ordered comparison
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OrdComparison {
    EQ,
    NE,
    LT,
    GE,
    GT,
    LE,
}

impl Not for OrdComparison {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            OrdComparison::EQ => OrdComparison::NE,
            OrdComparison::NE => OrdComparison::EQ,
            OrdComparison::LT => OrdComparison::GE,
            OrdComparison::GE => OrdComparison::LT,
            OrdComparison::GT => OrdComparison::LE,
            OrdComparison::LE => OrdComparison::GT,
        }
    }
}

/// Equality comparison
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

impl Not for EqComparison {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            EqComparison::EQ => EqComparison::NE,
            EqComparison::NE => EqComparison::EQ,
        }
    }
}

/// Type of invocation
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,

    /// Interface invocation, along with the number of argument slots (including the receiver)
    Interface(u8),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::ConstantPoolGen;

    fn serialized(instruction: Instruction) -> Vec<u8> {
        let mut bytes = vec![];
        instruction.serialize(&mut bytes).unwrap();
        assert_eq!(bytes.len(), instruction.length(), "{:?}", instruction);
        bytes
    }

    #[test]
    fn local_variable_forms() {
        assert_eq!(serialized(Instruction::ILoad(2)), vec![0x1c]);
        assert_eq!(serialized(Instruction::ILoad(7)), vec![0x15, 7]);
        assert_eq!(serialized(Instruction::AStore(300)), vec![0xc4, 0x3a, 0x01, 0x2c]);
        assert_eq!(serialized(Instruction::IInc(1, 5)), vec![0x84, 1, 5]);
        assert_eq!(
            serialized(Instruction::IInc(1, 500)),
            vec![0xc4, 0x84, 0, 1, 0x01, 0xf4]
        );
        assert_eq!(serialized(Instruction::Ret(3)), vec![0xa9, 3]);
        assert_eq!(serialized(Instruction::Ret(256)), vec![0xc4, 0xa9, 1, 0]);
        assert_eq!(Instruction::ILoad(2).name(), "iload_2");
        assert_eq!(Instruction::ILoad(7).name(), "iload");
    }

    #[test]
    fn constant_forms() {
        assert_eq!(serialized(Instruction::Ldc(ConstantIndex(4))), vec![0x12, 4]);
        assert_eq!(
            serialized(Instruction::Ldc(ConstantIndex(256))),
            vec![0x13, 1, 0]
        );
        assert_eq!(
            serialized(Instruction::Ldc2(ConstantIndex(3))),
            vec![0x14, 0, 3]
        );
        assert_eq!(serialized(Instruction::SiPush(-2)), vec![0x11, 0xff, 0xfe]);
        assert_eq!(
            serialized(Instruction::NewArray(BaseType::Int)),
            vec![0xbc, 10]
        );
        assert_eq!(
            serialized(Instruction::Invoke(
                InvokeType::Interface(2),
                MethodRefConstantIndex(ConstantIndex(9))
            )),
            vec![0xb9, 0, 9, 2, 0]
        );
        assert_eq!(
            serialized(Instruction::MultiANewArray(
                ClassConstantIndex(ConstantIndex(5)),
                3
            )),
            vec![0xc5, 0, 5, 3]
        );
    }

    #[test]
    fn stack_effects_from_pool() {
        let mut pool = ConstantPoolGen::new();
        let field = pool.add_fieldref("Foo", "bar", "J").unwrap();
        let method = pool.add_methodref("Foo", "baz", "(IJLjava/lang/String;)D").unwrap();

        assert_eq!(Instruction::GetStatic(field).stack_effect(&pool).unwrap(), (0, 2));
        assert_eq!(Instruction::PutField(field).stack_effect(&pool).unwrap(), (3, 0));
        assert_eq!(
            Instruction::Invoke(InvokeType::Static, method)
                .stack_effect(&pool)
                .unwrap(),
            (4, 2)
        );
        assert_eq!(
            Instruction::Invoke(InvokeType::Virtual, method)
                .stack_effect(&pool)
                .unwrap(),
            (5, 2)
        );
        assert_eq!(Instruction::Dup2X1.stack_effect(&pool).unwrap(), (3, 5));
        assert_eq!(Instruction::LSh(ShiftType::Left).stack_effect(&pool).unwrap(), (3, 2));
    }

    #[test]
    fn missing_pool_entries() {
        let pool = ConstantPoolGen::new();
        let field = FieldRefConstantIndex(ConstantIndex(3));
        assert!(matches!(
            Instruction::GetField(field).consume_stack(&pool),
            Err(Error::MissingConstant(ConstantIndex(3)))
        ));
    }

    #[test]
    fn local_variables() {
        let mut instruction = Instruction::DStore(4);
        assert_eq!(instruction.local_variable(), Some((4, 2)));
        assert!(instruction.set_local_index(9));
        assert_eq!(instruction, Instruction::DStore(9));
        assert_eq!(instruction.local_type(), Some(Type::DOUBLE));

        let mut other = Instruction::IAdd;
        assert!(!other.set_local_index(1));
        assert_eq!(other.local_index(), None);
    }

    #[test]
    fn exceptions_thrown() {
        assert!(Instruction::IAdd.exceptions().is_empty());
        assert_eq!(
            Instruction::IDiv.exceptions(),
            vec![BinaryName::ARITHMETICEXCEPTION]
        );
        assert!(Instruction::AAStore
            .exceptions()
            .contains(&BinaryName::ARRAYSTOREEXCEPTION));
    }

    #[test]
    fn negated_comparisons() {
        assert_eq!(!OrdComparison::LT, OrdComparison::GE);
        assert_eq!(!!OrdComparison::GT, OrdComparison::GT);
        assert_eq!(!EqComparison::EQ, EqComparison::NE);
    }
}
