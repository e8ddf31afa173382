use super::opcodes as op;
use super::{
    AnyInstruction, BranchInstruction, CompareMode, EqComparison, Instruction, InstructionHandle,
    InstructionList, InvokeType, OrdComparison, ShiftType,
};
use crate::jvm::class_file::{
    ClassConstantIndex, ConstantIndex, Deserialize, FieldRefConstantIndex,
    InvokeDynamicConstantIndex, MethodRefConstantIndex,
};
use crate::jvm::{BaseType, Error};
use std::collections::HashMap;
use std::io::Cursor;

/// Instruction whose jump targets are still absolute byte offsets
enum Decoded {
    Plain(Instruction),
    Branch(BranchInstruction<usize>),
}

/// Reads the operands of one instruction at a time
struct Decoder<'a> {
    cursor: Cursor<&'a [u8]>,

    /// Opcode and offset of the instruction being decoded (for error reporting)
    opcode: u8,
    offset: usize,
}

impl<'a> Decoder<'a> {
    fn read<T: Deserialize>(&mut self) -> Result<T, Error> {
        T::deserialize(&mut self.cursor).map_err(|_| Error::InvalidOpcode {
            opcode: self.opcode,
            offset: self.offset,
        })
    }

    fn at_end(&self) -> bool {
        self.cursor.position() as usize >= self.cursor.get_ref().len()
    }

    /// Absolute target of a jump relative to the current instruction
    fn target(&self, relative: i32) -> Result<usize, Error> {
        let absolute = self.offset as i64 + relative as i64;
        if absolute < 0 {
            return Err(Error::NegativeOrInvalidArgument(format!(
                "Branch at {} jumps to negative offset {}",
                self.offset, absolute
            )));
        }
        Ok(absolute as usize)
    }

    fn short_target(&mut self) -> Result<usize, Error> {
        let relative: i16 = self.read()?;
        self.target(relative as i32)
    }

    fn wide_target(&mut self) -> Result<usize, Error> {
        let relative: i32 = self.read()?;
        self.target(relative)
    }

    /// Skip the padding which aligns switch operands on 4-byte boundaries
    fn skip_padding(&mut self) -> Result<u8, Error> {
        let padding = ((4 - ((self.offset + 1) % 4)) % 4) as u8;
        for _ in 0..padding {
            let _: u8 = self.read()?;
        }
        Ok(padding)
    }

    fn local_index(&mut self, wide: bool) -> Result<u16, Error> {
        if wide {
            self.read::<u16>()
        } else {
            Ok(self.read::<u8>()? as u16)
        }
    }

    fn class(&mut self) -> Result<ClassConstantIndex, Error> {
        Ok(ClassConstantIndex(ConstantIndex(self.read()?)))
    }

    fn field(&mut self) -> Result<FieldRefConstantIndex, Error> {
        Ok(FieldRefConstantIndex(ConstantIndex(self.read()?)))
    }

    fn method(&mut self) -> Result<MethodRefConstantIndex, Error> {
        Ok(MethodRefConstantIndex(ConstantIndex(self.read()?)))
    }

    fn invalid(&self) -> Error {
        Error::InvalidOpcode {
            opcode: self.opcode,
            offset: self.offset,
        }
    }

    /// Decode the next instruction (including any `wide` prefix)
    fn decode(&mut self) -> Result<Decoded, Error> {
        use Instruction::*;

        self.offset = self.cursor.position() as usize;
        self.opcode = self.read()?;
        let wide = self.opcode == op::WIDE;
        if wide {
            self.opcode = self.read()?;
            let widenable = matches!(
                self.opcode,
                op::ILOAD..=op::ALOAD | op::ISTORE..=op::ASTORE | op::IINC | op::RET
            );
            if !widenable {
                return Err(self.invalid());
            }
        }

        let instruction = match self.opcode {
            op::NOP => Nop,
            op::ACONST_NULL => AConstNull,
            op::ICONST_M1 => IConstM1,
            op::ICONST_0 => IConst0,
            op::ICONST_1 => IConst1,
            op::ICONST_2 => IConst2,
            op::ICONST_3 => IConst3,
            op::ICONST_4 => IConst4,
            op::ICONST_5 => IConst5,
            op::LCONST_0 => LConst0,
            op::LCONST_1 => LConst1,
            op::FCONST_0 => FConst0,
            op::FCONST_1 => FConst1,
            op::FCONST_2 => FConst2,
            op::DCONST_0 => DConst0,
            op::DCONST_1 => DConst1,
            op::BIPUSH => BiPush(self.read()?),
            op::SIPUSH => SiPush(self.read()?),
            op::LDC => Ldc(ConstantIndex(self.read::<u8>()? as u16)),
            op::LDC_W => Ldc(ConstantIndex(self.read()?)),
            op::LDC2_W => Ldc2(ConstantIndex(self.read()?)),

            op::ILOAD..=op::ALOAD => {
                let index = self.local_index(wide)?;
                load(self.opcode - op::ILOAD, index)
            }
            op::ILOAD_0..=op::ALOAD_3 => {
                let short = self.opcode - op::ILOAD_0;
                load(short / 4, (short % 4) as u16)
            }
            op::IALOAD => IALoad,
            op::LALOAD => LALoad,
            op::FALOAD => FALoad,
            op::DALOAD => DALoad,
            op::AALOAD => AALoad,
            op::BALOAD => BALoad,
            op::CALOAD => CALoad,
            op::SALOAD => SALoad,

            op::ISTORE..=op::ASTORE => {
                let index = self.local_index(wide)?;
                store(self.opcode - op::ISTORE, index)
            }
            op::ISTORE_0..=op::ASTORE_3 => {
                let short = self.opcode - op::ISTORE_0;
                store(short / 4, (short % 4) as u16)
            }
            op::IASTORE => IAStore,
            op::LASTORE => LAStore,
            op::FASTORE => FAStore,
            op::DASTORE => DAStore,
            op::AASTORE => AAStore,
            op::BASTORE => BAStore,
            op::CASTORE => CAStore,
            op::SASTORE => SAStore,

            op::POP => Pop,
            op::POP2 => Pop2,
            op::DUP => Dup,
            op::DUP_X1 => DupX1,
            op::DUP_X2 => DupX2,
            op::DUP2 => Dup2,
            op::DUP2_X1 => Dup2X1,
            op::DUP2_X2 => Dup2X2,
            op::SWAP => Swap,

            op::IADD => IAdd,
            op::LADD => LAdd,
            op::FADD => FAdd,
            op::DADD => DAdd,
            op::ISUB => ISub,
            op::LSUB => LSub,
            op::FSUB => FSub,
            op::DSUB => DSub,
            op::IMUL => IMul,
            op::LMUL => LMul,
            op::FMUL => FMul,
            op::DMUL => DMul,
            op::IDIV => IDiv,
            op::LDIV => LDiv,
            op::FDIV => FDiv,
            op::DDIV => DDiv,
            op::IREM => IRem,
            op::LREM => LRem,
            op::FREM => FRem,
            op::DREM => DRem,
            op::INEG => INeg,
            op::LNEG => LNeg,
            op::FNEG => FNeg,
            op::DNEG => DNeg,
            op::ISHL => ISh(ShiftType::Left),
            op::LSHL => LSh(ShiftType::Left),
            op::ISHR => ISh(ShiftType::ArithmeticRight),
            op::LSHR => LSh(ShiftType::ArithmeticRight),
            op::IUSHR => ISh(ShiftType::LogicalRight),
            op::LUSHR => LSh(ShiftType::LogicalRight),
            op::IAND => IAnd,
            op::LAND => LAnd,
            op::IOR => IOr,
            op::LOR => LOr,
            op::IXOR => IXor,
            op::LXOR => LXor,
            op::IINC => {
                let index = self.local_index(wide)?;
                let delta = if wide {
                    self.read::<i16>()?
                } else {
                    self.read::<i8>()? as i16
                };
                IInc(index, delta)
            }

            op::I2L => I2L,
            op::I2F => I2F,
            op::I2D => I2D,
            op::L2I => L2I,
            op::L2F => L2F,
            op::L2D => L2D,
            op::F2I => F2I,
            op::F2L => F2L,
            op::F2D => F2D,
            op::D2I => D2I,
            op::D2L => D2L,
            op::D2F => D2F,
            op::I2B => I2B,
            op::I2C => I2C,
            op::I2S => I2S,
            op::LCMP => LCmp,
            op::FCMPL => FCmp(CompareMode::L),
            op::FCMPG => FCmp(CompareMode::G),
            op::DCMPL => DCmp(CompareMode::L),
            op::DCMPG => DCmp(CompareMode::G),

            op::IFEQ..=op::IFLE => {
                let comparison = ord_comparison(self.opcode - op::IFEQ);
                let target = self.short_target()?;
                return Ok(Decoded::Branch(BranchInstruction::If(comparison, target)));
            }
            op::IF_ICMPEQ..=op::IF_ICMPLE => {
                let comparison = ord_comparison(self.opcode - op::IF_ICMPEQ);
                let target = self.short_target()?;
                return Ok(Decoded::Branch(BranchInstruction::IfICmp(comparison, target)));
            }
            op::IF_ACMPEQ | op::IF_ACMPNE => {
                let comparison = eq_comparison(self.opcode == op::IF_ACMPEQ);
                let target = self.short_target()?;
                return Ok(Decoded::Branch(BranchInstruction::IfACmp(comparison, target)));
            }
            op::IFNULL | op::IFNONNULL => {
                let comparison = eq_comparison(self.opcode == op::IFNULL);
                let target = self.short_target()?;
                return Ok(Decoded::Branch(BranchInstruction::IfNull(comparison, target)));
            }
            op::GOTO => return Ok(Decoded::Branch(BranchInstruction::Goto(self.short_target()?))),
            op::JSR => return Ok(Decoded::Branch(BranchInstruction::Jsr(self.short_target()?))),
            op::GOTO_W => return Ok(Decoded::Branch(BranchInstruction::GotoW(self.wide_target()?))),
            op::JSR_W => return Ok(Decoded::Branch(BranchInstruction::JsrW(self.wide_target()?))),
            op::RET => Ret(self.local_index(wide)?),

            op::TABLESWITCH => {
                let padding = self.skip_padding()?;
                let default = self.wide_target()?;
                let low: i32 = self.read()?;
                let high: i32 = self.read()?;
                if high < low {
                    return Err(Error::NegativeOrInvalidArgument(format!(
                        "tableswitch at {} has high {} below low {}",
                        self.offset, high, low
                    )));
                }
                let mut targets = vec![];
                for _ in low..=high {
                    targets.push(self.wide_target()?);
                }
                return Ok(Decoded::Branch(BranchInstruction::TableSwitch {
                    padding,
                    default,
                    low,
                    targets,
                }));
            }
            op::LOOKUPSWITCH => {
                let padding = self.skip_padding()?;
                let default = self.wide_target()?;
                let pairs: i32 = self.read()?;
                let mut targets = vec![];
                for _ in 0..pairs.max(0) {
                    let key: i32 = self.read()?;
                    targets.push((key, self.wide_target()?));
                }
                return Ok(Decoded::Branch(BranchInstruction::LookupSwitch {
                    padding,
                    default,
                    targets,
                }));
            }

            op::IRETURN => IReturn,
            op::LRETURN => LReturn,
            op::FRETURN => FReturn,
            op::DRETURN => DReturn,
            op::ARETURN => AReturn,
            op::RETURN => Return,

            op::GETSTATIC => GetStatic(self.field()?),
            op::PUTSTATIC => PutStatic(self.field()?),
            op::GETFIELD => GetField(self.field()?),
            op::PUTFIELD => PutField(self.field()?),
            op::INVOKEVIRTUAL => Invoke(InvokeType::Virtual, self.method()?),
            op::INVOKESPECIAL => Invoke(InvokeType::Special, self.method()?),
            op::INVOKESTATIC => Invoke(InvokeType::Static, self.method()?),
            op::INVOKEINTERFACE => {
                let method = self.method()?;
                let count: u8 = self.read()?;
                let _zero: u8 = self.read()?;
                Invoke(InvokeType::Interface(count), method)
            }
            op::INVOKEDYNAMIC => {
                let index = ConstantIndex(self.read()?);
                let _zero: u16 = self.read()?;
                InvokeDynamic(InvokeDynamicConstantIndex(index))
            }

            op::NEW => New(self.class()?),
            op::NEWARRAY => {
                let code: u8 = self.read()?;
                NewArray(BaseType::from_array_type_code(code).ok_or_else(|| {
                    Error::NegativeOrInvalidArgument(format!(
                        "newarray at {} has invalid type code {}",
                        self.offset, code
                    ))
                })?)
            }
            op::ANEWARRAY => ANewArray(self.class()?),
            op::ARRAYLENGTH => ArrayLength,
            op::ATHROW => AThrow,
            op::CHECKCAST => CheckCast(self.class()?),
            op::INSTANCEOF => InstanceOf(self.class()?),
            op::MONITORENTER => MonitorEnter,
            op::MONITOREXIT => MonitorExit,
            op::MULTIANEWARRAY => {
                let class = self.class()?;
                MultiANewArray(class, self.read()?)
            }
            op::BREAKPOINT => Breakpoint,
            op::IMPDEP1 => ImpDep1,
            op::IMPDEP2 => ImpDep2,

            _ => return Err(self.invalid()),
        };
        Ok(Decoded::Plain(instruction))
    }
}

/// Load for a kind (in opcode order: int, long, float, double, reference)
fn load(kind: u8, index: u16) -> Instruction {
    match kind {
        0 => Instruction::ILoad(index),
        1 => Instruction::LLoad(index),
        2 => Instruction::FLoad(index),
        3 => Instruction::DLoad(index),
        _ => Instruction::ALoad(index),
    }
}

/// Store for a kind (in opcode order: int, long, float, double, reference)
fn store(kind: u8, index: u16) -> Instruction {
    match kind {
        0 => Instruction::IStore(index),
        1 => Instruction::LStore(index),
        2 => Instruction::FStore(index),
        3 => Instruction::DStore(index),
        _ => Instruction::AStore(index),
    }
}

/// Comparison for an offset from `ifeq` or `if_icmpeq`
fn ord_comparison(offset: u8) -> OrdComparison {
    match offset {
        0 => OrdComparison::EQ,
        1 => OrdComparison::NE,
        2 => OrdComparison::LT,
        3 => OrdComparison::GE,
        4 => OrdComparison::GT,
        _ => OrdComparison::LE,
    }
}

fn eq_comparison(is_eq: bool) -> EqComparison {
    if is_eq {
        EqComparison::EQ
    } else {
        EqComparison::NE
    }
}

impl InstructionList {
    /// Decode bytecode (eg. the body of a `Code` attribute) into an instruction list
    ///
    /// Instruction positions are set to their offsets in the input, so
    /// [`InstructionList::find_handle`] can map offsets from other attributes (exception tables,
    /// line numbers, etc.) onto handles. Every jump must land on the start of an instruction.
    pub fn from_bytes(code: &[u8]) -> Result<InstructionList, Error> {
        let mut decoder = Decoder {
            cursor: Cursor::new(code),
            opcode: 0,
            offset: 0,
        };

        let mut decoded = vec![];
        while !decoder.at_end() {
            let instruction = decoder.decode()?;
            decoded.push((decoder.offset, instruction));
        }

        let handles: HashMap<usize, InstructionHandle> = decoded
            .iter()
            .map(|(offset, _)| (*offset, InstructionHandle::fresh()))
            .collect();

        let mut list = InstructionList::new();
        for (offset, instruction) in decoded {
            let instruction = match instruction {
                Decoded::Plain(instruction) => AnyInstruction::Plain(instruction),
                Decoded::Branch(branch) => {
                    AnyInstruction::Branch(branch.try_map_targets(|target| {
                        handles.get(target).copied().ok_or_else(|| {
                            Error::NegativeOrInvalidArgument(format!(
                                "Branch at {} jumps to {}, which is not the start of an instruction",
                                offset, target
                            ))
                        })
                    })?)
                }
            };
            if let Some(handle) = handles.get(&offset) {
                list.insert_node(*handle, instruction, list.end());
                list.set_position(*handle, offset);
            }
        }
        log::trace!("Decoded {} instructions from {} bytes", list.len(), code.len());
        Ok(list)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::Targeter;

    #[test]
    fn decode_loop() {
        // 0: iconst_0, 1: istore_1, 2: iinc 1 1, 5: iload_1, 6: bipush 10, 8: if_icmplt -6, 11: return
        let code = [
            0x03, 0x3c, 0x84, 0x01, 0x01, 0x1b, 0x10, 0x0a, 0xa1, 0xff, 0xfa, 0xb1,
        ];
        let list = InstructionList::from_bytes(&code).unwrap();
        assert_eq!(list.len(), 7);
        assert_eq!(list.instruction_positions(), &[0, 1, 2, 5, 6, 8, 11]);

        let increment = list.find_handle(2).unwrap();
        let branch = list.find_handle(8).unwrap();
        assert_eq!(
            list.instruction(increment).unwrap(),
            &AnyInstruction::Plain(Instruction::IInc(1, 1))
        );
        assert_eq!(
            list.instruction(branch).unwrap(),
            &AnyInstruction::Branch(BranchInstruction::IfICmp(OrdComparison::LT, increment))
        );
        assert_eq!(list.targeters(increment), &[Targeter::Branch(branch)]);
    }

    #[test]
    fn decode_wide_and_switch() {
        let mut code = vec![0xc4, 0x15, 0x01, 0x00]; // wide iload 256
        code.push(0xaa); // tableswitch at 4, so 3 bytes of padding
        code.extend_from_slice(&[0, 0, 0]);
        for word in &[24i32, 0, 1, 24, 24] {
            code.extend_from_slice(&word.to_be_bytes());
        }
        code.push(0xb1); // return at 28

        let mut list = InstructionList::from_bytes(&code).unwrap();
        let ret = list.find_handle(28).unwrap();
        let switch = list.find_handle(4).unwrap();
        assert_eq!(
            list.instruction(list.start().unwrap()).unwrap(),
            &AnyInstruction::Plain(Instruction::ILoad(256))
        );
        assert_eq!(list.targeters(ret).len(), 3);
        assert_eq!(list.byte_code().unwrap(), code);
        assert!(list.instruction(switch).unwrap().is_branch());
    }

    #[test]
    fn wide_jumps_stay_wide() {
        // 0: goto_w +8, 5: ldc_w #3, 8: return
        let code = [0xc8, 0x00, 0x00, 0x00, 0x08, 0x13, 0x00, 0x03, 0xb1];
        let mut list = InstructionList::from_bytes(&code).unwrap();
        assert!(matches!(
            list.instruction(list.start().unwrap()).unwrap().as_branch(),
            Some(BranchInstruction::GotoW(_))
        ));

        // `ldc_w` goes back to `ldc` since the index fits in a byte, but `goto_w` is kept
        assert_eq!(
            list.byte_code().unwrap(),
            vec![0xc8, 0x00, 0x00, 0x00, 0x07, 0x12, 0x03, 0xb1]
        );
    }

    #[test]
    fn decode_errors() {
        assert!(matches!(
            InstructionList::from_bytes(&[0xcb]),
            Err(Error::InvalidOpcode {
                opcode: 0xcb,
                offset: 0
            })
        ));
        assert!(matches!(
            InstructionList::from_bytes(&[0x00, 0x11, 0x01]),
            Err(Error::InvalidOpcode {
                opcode: 0x11,
                offset: 1
            })
        ));
        assert!(matches!(
            InstructionList::from_bytes(&[0xa7, 0x00, 0x02, 0xb1]),
            Err(Error::NegativeOrInvalidArgument(_))
        ));
    }
}
