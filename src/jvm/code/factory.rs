use super::opcodes as op;
use super::{
    BranchInstruction, EqComparison, Instruction, InstructionHandle, InstructionList, InvokeType,
    OrdComparison, ShiftType,
};
use crate::jvm::class_file::{ConstantIndex, FieldRefConstantIndex};
use crate::jvm::{
    BaseType, BinaryName, ConstantPoolGen, Error, FieldType, Literal, Name, RefType, Type, UnqualifiedName,
};
use std::convert::TryFrom;

/// Kinds of field access
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldAccess {
    GetField,
    PutField,
    GetStatic,
    PutStatic,
}

/// Binary arithmetic and bitwise operations
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOperation {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    UShr,
}

/// Shortcuts for making instructions which are tedious to put together by hand
///
/// Instructions which refer to the constant pool need the factory's pool. Everything else is an
/// associated function.
pub struct InstructionFactory<'a> {
    constants: &'a mut ConstantPoolGen,
}

impl<'a> InstructionFactory<'a> {
    pub fn new(constants: &'a mut ConstantPoolGen) -> InstructionFactory<'a> {
        InstructionFactory { constants }
    }

    pub fn constants(&mut self) -> &mut ConstantPoolGen {
        self.constants
    }

    /// Method call
    ///
    /// For interface calls, the argument count stored in `invokeinterface` is computed from the
    /// argument types (whatever count `kind` carries is ignored).
    pub fn create_invoke(
        &mut self,
        class_name: &str,
        name: &str,
        return_type: &Type,
        argument_types: &[Type],
        kind: InvokeType,
    ) -> Result<Instruction, Error> {
        let descriptor = Type::method_signature(return_type, argument_types);
        Ok(match kind {
            InvokeType::Interface(_) => {
                let arguments_size: usize = argument_types.iter().map(Type::size).sum();
                let count = u8::try_from(arguments_size + 1).map_err(|_| {
                    Error::NegativeOrInvalidArgument(format!(
                        "Too many arguments for {}.{}{}",
                        class_name, name, descriptor
                    ))
                })?;
                let method = self
                    .constants
                    .add_interface_methodref(class_name, name, &descriptor)?;
                Instruction::Invoke(InvokeType::Interface(count), method)
            }
            other => {
                let method = self.constants.add_methodref(class_name, name, &descriptor)?;
                Instruction::Invoke(other, method)
            }
        })
    }

    /// Dynamically-computed call site (`bootstrap_method` indexes the `BootstrapMethods`)
    pub fn create_invoke_dynamic(
        &mut self,
        bootstrap_method: u16,
        name: &str,
        return_type: &Type,
        argument_types: &[Type],
    ) -> Result<Instruction, Error> {
        let descriptor = Type::method_signature(return_type, argument_types);
        let call_site = self
            .constants
            .add_invoke_dynamic(bootstrap_method, name, &descriptor)?;
        Ok(Instruction::InvokeDynamic(call_site))
    }

    pub fn create_field_access(
        &mut self,
        class_name: &str,
        name: &str,
        typ: &Type,
        kind: FieldAccess,
    ) -> Result<Instruction, Error> {
        if typ.as_field_type().is_none() {
            return Err(Error::NegativeOrInvalidArgument(format!(
                "Field {}.{} cannot have type {}",
                class_name, name, typ
            )));
        }
        let field: FieldRefConstantIndex =
            self.constants
                .add_fieldref(class_name, name, &typ.signature())?;
        Ok(match kind {
            FieldAccess::GetField => Instruction::GetField(field),
            FieldAccess::PutField => Instruction::PutField(field),
            FieldAccess::GetStatic => Instruction::GetStatic(field),
            FieldAccess::PutStatic => Instruction::PutStatic(field),
        })
    }

    pub fn create_get_field(
        &mut self,
        class_name: &str,
        name: &str,
        typ: &Type,
    ) -> Result<Instruction, Error> {
        self.create_field_access(class_name, name, typ, FieldAccess::GetField)
    }

    pub fn create_put_field(
        &mut self,
        class_name: &str,
        name: &str,
        typ: &Type,
    ) -> Result<Instruction, Error> {
        self.create_field_access(class_name, name, typ, FieldAccess::PutField)
    }

    pub fn create_get_static(
        &mut self,
        class_name: &str,
        name: &str,
        typ: &Type,
    ) -> Result<Instruction, Error> {
        self.create_field_access(class_name, name, typ, FieldAccess::GetStatic)
    }

    pub fn create_put_static(
        &mut self,
        class_name: &str,
        name: &str,
        typ: &Type,
    ) -> Result<Instruction, Error> {
        self.create_field_access(class_name, name, typ, FieldAccess::PutStatic)
    }

    pub fn create_new(&mut self, class_name: &str) -> Result<Instruction, Error> {
        Ok(Instruction::New(self.constants.add_class(class_name)?))
    }

    /// Allocate an array with elements of type `typ` and `dimensions` dimensions
    ///
    /// A single dimension uses `newarray` or `anewarray`, more use `multianewarray`.
    pub fn create_new_array(
        &mut self,
        typ: &Type,
        dimensions: usize,
    ) -> Result<Instruction, Error> {
        let field_type = typ.as_field_type().ok_or_else(|| {
            Error::NegativeOrInvalidArgument(format!("Cannot make an array of {}", typ))
        })?;
        match dimensions {
            0 => Err(Error::InvalidDimensions(dimensions)),
            1 => Ok(match field_type {
                FieldType::Base(base_type) => Instruction::NewArray(*base_type),
                FieldType::Ref(ref_type) => {
                    Instruction::ANewArray(self.constants.add_ref_type(ref_type)?)
                }
            }),
            _ => {
                let dimensions_u8 =
                    u8::try_from(dimensions).map_err(|_| Error::InvalidDimensions(dimensions))?;
                let class = self.constants.add_array_type(field_type, dimensions)?;
                Ok(Instruction::MultiANewArray(class, dimensions_u8))
            }
        }
    }

    pub fn create_check_cast(
        &mut self,
        ref_type: &RefType<BinaryName>,
    ) -> Result<Instruction, Error> {
        Ok(Instruction::CheckCast(self.constants.add_ref_type(ref_type)?))
    }

    pub fn create_instance_of(
        &mut self,
        ref_type: &RefType<BinaryName>,
    ) -> Result<Instruction, Error> {
        Ok(Instruction::InstanceOf(self.constants.add_ref_type(ref_type)?))
    }

    /// Conversion between primitive types, or a `checkcast` between reference types
    ///
    /// `byte`, `short`, `char`, and `boolean` values are `int`s on the operand stack, so they
    /// convert like `int`. Converting to `byte`, `short`, or `char` is only possible from `int`.
    pub fn create_cast(&mut self, from: &Type, to: &Type) -> Result<Instruction, Error> {
        use BaseType::*;

        let invalid = || Error::InvalidCast {
            from: from.to_string(),
            to: to.to_string(),
        };

        match (from, to) {
            (Type::Field(FieldType::Base(from_base)), Type::Field(FieldType::Base(to_base))) => {
                let from_base = if from_base.is_int_like() { Int } else { *from_base };
                Ok(match (from_base, *to_base) {
                    (Int, Long) => Instruction::I2L,
                    (Int, Float) => Instruction::I2F,
                    (Int, Double) => Instruction::I2D,
                    (Int, Byte) => Instruction::I2B,
                    (Int, Char) => Instruction::I2C,
                    (Int, Short) => Instruction::I2S,
                    (Long, Int) => Instruction::L2I,
                    (Long, Float) => Instruction::L2F,
                    (Long, Double) => Instruction::L2D,
                    (Float, Int) => Instruction::F2I,
                    (Float, Long) => Instruction::F2L,
                    (Float, Double) => Instruction::F2D,
                    (Double, Int) => Instruction::D2I,
                    (Double, Long) => Instruction::D2L,
                    (Double, Float) => Instruction::D2F,
                    _ => return Err(invalid()),
                })
            }
            (Type::Field(FieldType::Ref(_)), Type::Field(FieldType::Ref(ref_type))) => {
                self.create_check_cast(ref_type)
            }
            _ => Err(invalid()),
        }
    }

    /// Push a constant, picking the shortest encoding
    pub fn create_constant(&mut self, literal: &Literal) -> Result<Instruction, Error> {
        match literal {
            Literal::Integer(integer) => self.create_push_int(*integer),
            Literal::Long(long) => self.create_push_long(*long),
            Literal::Float(float) => self.create_push_float(*float),
            Literal::Double(double) => self.create_push_double(*double),
            Literal::String(string) => self.create_push_string(string),
            Literal::Class(class) => {
                let class = self.constants.add_class(class)?;
                Ok(Instruction::Ldc(class.into()))
            }
        }
    }

    /// Push an `int`: `iconst_*` for -1 to 5, `bipush`/`sipush` for values fitting in a byte or
    /// short, and an `ldc` of an integer constant otherwise
    pub fn create_push_int(&mut self, integer: i32) -> Result<Instruction, Error> {
        Ok(match integer {
            -1 => Instruction::IConstM1,
            0 => Instruction::IConst0,
            1 => Instruction::IConst1,
            2 => Instruction::IConst2,
            3 => Instruction::IConst3,
            4 => Instruction::IConst4,
            5 => Instruction::IConst5,
            _ => {
                if let Ok(byte) = i8::try_from(integer) {
                    Instruction::BiPush(byte)
                } else if let Ok(short) = i16::try_from(integer) {
                    Instruction::SiPush(short)
                } else {
                    Instruction::Ldc(self.constants.add_integer(integer)?)
                }
            }
        })
    }

    pub fn create_push_long(&mut self, long: i64) -> Result<Instruction, Error> {
        Ok(match long {
            0 => Instruction::LConst0,
            1 => Instruction::LConst1,
            _ => Instruction::Ldc2(self.constants.add_long(long)?),
        })
    }

    /// Push a `float` (`-0.0` is not `0.0`, so it goes through the constant pool)
    pub fn create_push_float(&mut self, float: f32) -> Result<Instruction, Error> {
        Ok(if float.to_bits() == 0.0f32.to_bits() {
            Instruction::FConst0
        } else if float.to_bits() == 1.0f32.to_bits() {
            Instruction::FConst1
        } else if float.to_bits() == 2.0f32.to_bits() {
            Instruction::FConst2
        } else {
            Instruction::Ldc(self.constants.add_float(float)?)
        })
    }

    pub fn create_push_double(&mut self, double: f64) -> Result<Instruction, Error> {
        Ok(if double.to_bits() == 0.0f64.to_bits() {
            Instruction::DConst0
        } else if double.to_bits() == 1.0f64.to_bits() {
            Instruction::DConst1
        } else {
            Instruction::Ldc2(self.constants.add_double(double)?)
        })
    }

    pub fn create_push_string(&mut self, string: &str) -> Result<Instruction, Error> {
        let string = self.constants.add_string(string)?;
        Ok(Instruction::Ldc(ConstantIndex::from(string)))
    }

    /// `System.out.println(string)`
    pub fn create_print_ln(&mut self, string: &str) -> Result<InstructionList, Error> {
        let out = self.create_get_static(
            BinaryName::SYSTEM.as_str(),
            UnqualifiedName::OUT.as_str(),
            &Type::object(BinaryName::PRINTSTREAM),
        )?;
        let push = self.create_push_string(string)?;
        let println = self.create_invoke(
            BinaryName::PRINTSTREAM.as_str(),
            UnqualifiedName::PRINTLN.as_str(),
            &Type::Void,
            &[Type::STRING],
            InvokeType::Virtual,
        )?;

        let mut list = InstructionList::new();
        list.append(out);
        list.append(push);
        list.append(println);
        Ok(list)
    }

    /// Load a local variable of the given type
    pub fn create_load(typ: &Type, index: u16) -> Result<Instruction, Error> {
        Ok(match slot_kind(typ)? {
            SlotKind::Int => Instruction::ILoad(index),
            SlotKind::Long => Instruction::LLoad(index),
            SlotKind::Float => Instruction::FLoad(index),
            SlotKind::Double => Instruction::DLoad(index),
            SlotKind::Reference => Instruction::ALoad(index),
        })
    }

    /// Store into a local variable of the given type
    pub fn create_store(typ: &Type, index: u16) -> Result<Instruction, Error> {
        Ok(match slot_kind(typ)? {
            SlotKind::Int => Instruction::IStore(index),
            SlotKind::Long => Instruction::LStore(index),
            SlotKind::Float => Instruction::FStore(index),
            SlotKind::Double => Instruction::DStore(index),
            SlotKind::Reference => Instruction::AStore(index),
        })
    }

    /// Return a value of the given type (or nothing, for `void`)
    pub fn create_return(typ: &Type) -> Result<Instruction, Error> {
        if let Type::Void = typ {
            return Ok(Instruction::Return);
        }
        Ok(match slot_kind(typ)? {
            SlotKind::Int => Instruction::IReturn,
            SlotKind::Long => Instruction::LReturn,
            SlotKind::Float => Instruction::FReturn,
            SlotKind::Double => Instruction::DReturn,
            SlotKind::Reference => Instruction::AReturn,
        })
    }

    /// Arithmetic or bitwise operation on two operands of the given type
    ///
    /// Bitwise operations and shifts only exist for `int` and `long`.
    pub fn create_binary_operation(
        operation: BinaryOperation,
        typ: &Type,
    ) -> Result<Instruction, Error> {
        use BinaryOperation::*;
        use Instruction::*;

        let kind = slot_kind(typ)?;
        Ok(match (kind, operation) {
            (SlotKind::Int, Add) => IAdd,
            (SlotKind::Int, Sub) => ISub,
            (SlotKind::Int, Mul) => IMul,
            (SlotKind::Int, Div) => IDiv,
            (SlotKind::Int, Rem) => IRem,
            (SlotKind::Int, And) => IAnd,
            (SlotKind::Int, Or) => IOr,
            (SlotKind::Int, Xor) => IXor,
            (SlotKind::Int, Shl) => ISh(ShiftType::Left),
            (SlotKind::Int, Shr) => ISh(ShiftType::ArithmeticRight),
            (SlotKind::Int, UShr) => ISh(ShiftType::LogicalRight),
            (SlotKind::Long, Add) => LAdd,
            (SlotKind::Long, Sub) => LSub,
            (SlotKind::Long, Mul) => LMul,
            (SlotKind::Long, Div) => LDiv,
            (SlotKind::Long, Rem) => LRem,
            (SlotKind::Long, And) => LAnd,
            (SlotKind::Long, Or) => LOr,
            (SlotKind::Long, Xor) => LXor,
            (SlotKind::Long, Shl) => LSh(ShiftType::Left),
            (SlotKind::Long, Shr) => LSh(ShiftType::ArithmeticRight),
            (SlotKind::Long, UShr) => LSh(ShiftType::LogicalRight),
            (SlotKind::Float, Add) => FAdd,
            (SlotKind::Float, Sub) => FSub,
            (SlotKind::Float, Mul) => FMul,
            (SlotKind::Float, Div) => FDiv,
            (SlotKind::Float, Rem) => FRem,
            (SlotKind::Double, Add) => DAdd,
            (SlotKind::Double, Sub) => DSub,
            (SlotKind::Double, Mul) => DMul,
            (SlotKind::Double, Div) => DDiv,
            (SlotKind::Double, Rem) => DRem,
            _ => {
                return Err(Error::NegativeOrInvalidArgument(format!(
                    "No {:?} operation for {}",
                    operation, typ
                )))
            }
        })
    }

    /// Pop a value taking up `size` stack slots
    pub fn create_pop(size: usize) -> Instruction {
        if size == 2 {
            Instruction::Pop2
        } else {
            Instruction::Pop
        }
    }

    /// Duplicate a value taking up `size` stack slots
    pub fn create_dup(size: usize) -> Instruction {
        if size == 2 {
            Instruction::Dup2
        } else {
            Instruction::Dup
        }
    }

    /// Duplicate a value taking up `size` stack slots, inserting it one slot down
    pub fn create_dup_1(size: usize) -> Instruction {
        if size == 2 {
            Instruction::Dup2X1
        } else {
            Instruction::DupX1
        }
    }

    /// Duplicate a value taking up `size` stack slots, inserting it two slots down
    pub fn create_dup_2(size: usize) -> Instruction {
        if size == 2 {
            Instruction::Dup2X2
        } else {
            Instruction::DupX2
        }
    }

    /// Load `this` (in an instance method)
    pub fn create_this() -> Instruction {
        Instruction::ALoad(0)
    }

    /// Push the default value of a type (`nop` for `void`)
    pub fn create_null(typ: &Type) -> Result<Instruction, Error> {
        if let Type::Void = typ {
            return Ok(Instruction::Nop);
        }
        Ok(match slot_kind(typ)? {
            SlotKind::Int => Instruction::IConst0,
            SlotKind::Long => Instruction::LConst0,
            SlotKind::Float => Instruction::FConst0,
            SlotKind::Double => Instruction::DConst0,
            SlotKind::Reference => Instruction::AConstNull,
        })
    }

    /// Load from an array with elements of the given type
    pub fn create_array_load(typ: &Type) -> Result<Instruction, Error> {
        use Instruction::*;

        Ok(match array_element_kind(typ)? {
            ArrayElementKind::Boolean | ArrayElementKind::Byte => BALoad,
            ArrayElementKind::Char => CALoad,
            ArrayElementKind::Short => SALoad,
            ArrayElementKind::Int => IALoad,
            ArrayElementKind::Long => LALoad,
            ArrayElementKind::Float => FALoad,
            ArrayElementKind::Double => DALoad,
            ArrayElementKind::Reference => AALoad,
        })
    }

    /// Store into an array with elements of the given type
    pub fn create_array_store(typ: &Type) -> Result<Instruction, Error> {
        use Instruction::*;

        Ok(match array_element_kind(typ)? {
            ArrayElementKind::Boolean | ArrayElementKind::Byte => BAStore,
            ArrayElementKind::Char => CAStore,
            ArrayElementKind::Short => SAStore,
            ArrayElementKind::Int => IAStore,
            ArrayElementKind::Long => LAStore,
            ArrayElementKind::Float => FAStore,
            ArrayElementKind::Double => DAStore,
            ArrayElementKind::Reference => AAStore,
        })
    }

    /// Branch instruction for a (non-switch) branching opcode
    pub fn create_branch(
        opcode: u8,
        target: InstructionHandle,
    ) -> Result<BranchInstruction, Error> {
        let ord = |base: u8| match opcode - base {
            0 => OrdComparison::EQ,
            1 => OrdComparison::NE,
            2 => OrdComparison::LT,
            3 => OrdComparison::GE,
            4 => OrdComparison::GT,
            _ => OrdComparison::LE,
        };
        Ok(match opcode {
            op::IFEQ..=op::IFLE => BranchInstruction::If(ord(op::IFEQ), target),
            op::IF_ICMPEQ..=op::IF_ICMPLE => BranchInstruction::IfICmp(ord(op::IF_ICMPEQ), target),
            op::IF_ACMPEQ => BranchInstruction::IfACmp(EqComparison::EQ, target),
            op::IF_ACMPNE => BranchInstruction::IfACmp(EqComparison::NE, target),
            op::IFNULL => BranchInstruction::IfNull(EqComparison::EQ, target),
            op::IFNONNULL => BranchInstruction::IfNull(EqComparison::NE, target),
            op::GOTO => BranchInstruction::Goto(target),
            op::GOTO_W => BranchInstruction::GotoW(target),
            op::JSR => BranchInstruction::Jsr(target),
            op::JSR_W => BranchInstruction::JsrW(target),
            _ => {
                return Err(Error::NegativeOrInvalidArgument(format!(
                    "{:#04x} is not a branch opcode",
                    opcode
                )))
            }
        })
    }

    /// Switch over the given values
    ///
    /// Cases get sorted by value. When the values are contiguous, this makes a `tableswitch`,
    /// otherwise a `lookupswitch`.
    pub fn create_switch(
        matches: &[i32],
        targets: &[InstructionHandle],
        default: InstructionHandle,
    ) -> Result<BranchInstruction, Error> {
        if matches.len() != targets.len() {
            return Err(Error::MismatchedSwitchArrays {
                matches: matches.len(),
                targets: targets.len(),
            });
        }
        let mut cases: Vec<(i32, InstructionHandle)> =
            matches.iter().copied().zip(targets.iter().copied()).collect();
        cases.sort_by_key(|(key, _)| *key);
        if cases.windows(2).any(|pair| pair[0].0 == pair[1].0) {
            return Err(Error::NegativeOrInvalidArgument(String::from(
                "Switch has duplicate match values",
            )));
        }

        let contiguous = cases
            .windows(2)
            .all(|pair| pair[1].0 as i64 - pair[0].0 as i64 <= 1);
        Ok(match cases.first() {
            Some((low, _)) if contiguous => BranchInstruction::table_switch(
                *low,
                cases.iter().map(|(_, target)| *target).collect(),
                default,
            ),
            _ => BranchInstruction::lookup_switch(cases, default),
        })
    }
}

/// How a type is stored in a local variable or on the operand stack
enum SlotKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
}

fn slot_kind(typ: &Type) -> Result<SlotKind, Error> {
    Ok(match typ {
        Type::Field(FieldType::Base(BaseType::Long)) => SlotKind::Long,
        Type::Field(FieldType::Base(BaseType::Float)) => SlotKind::Float,
        Type::Field(FieldType::Base(BaseType::Double)) => SlotKind::Double,
        Type::Field(FieldType::Base(_)) => SlotKind::Int,
        Type::Field(FieldType::Ref(_)) | Type::Null => SlotKind::Reference,
        other => {
            return Err(Error::NegativeOrInvalidArgument(format!(
                "Invalid type {}",
                other
            )))
        }
    })
}

/// How elements of an array are loaded and stored
enum ArrayElementKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Reference,
}

fn array_element_kind(typ: &Type) -> Result<ArrayElementKind, Error> {
    Ok(match typ {
        Type::Field(FieldType::Base(base_type)) => match base_type {
            BaseType::Boolean => ArrayElementKind::Boolean,
            BaseType::Byte => ArrayElementKind::Byte,
            BaseType::Char => ArrayElementKind::Char,
            BaseType::Short => ArrayElementKind::Short,
            BaseType::Int => ArrayElementKind::Int,
            BaseType::Long => ArrayElementKind::Long,
            BaseType::Float => ArrayElementKind::Float,
            BaseType::Double => ArrayElementKind::Double,
        },
        Type::Field(FieldType::Ref(_)) => ArrayElementKind::Reference,
        other => {
            return Err(Error::NegativeOrInvalidArgument(format!(
                "Invalid array element type {}",
                other
            )))
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{Constant, ConstantLookup};

    #[test]
    fn push_selection() {
        let mut constants = ConstantPoolGen::new();
        let mut factory = InstructionFactory::new(&mut constants);
        assert_eq!(factory.create_push_int(-1).unwrap(), Instruction::IConstM1);
        assert_eq!(factory.create_push_int(5).unwrap(), Instruction::IConst5);
        assert_eq!(factory.create_push_int(100).unwrap(), Instruction::BiPush(100));
        assert_eq!(factory.create_push_int(-300).unwrap(), Instruction::SiPush(-300));
        let big = factory.create_push_int(40000).unwrap();
        assert_eq!(factory.create_push_float(-0.0).unwrap().opcode(), op::LDC);
        assert_eq!(factory.create_push_double(1.0).unwrap(), Instruction::DConst1);
        assert_eq!(factory.create_push_long(1).unwrap(), Instruction::LConst1);

        match big {
            Instruction::Ldc(index) => {
                assert_eq!(constants.lookup(index).unwrap(), &Constant::Integer(40000))
            }
            other => panic!("Expected ldc, got {:?}", other),
        }
    }

    #[test]
    fn invokes_and_fields() {
        let mut constants = ConstantPoolGen::new();
        let mut factory = InstructionFactory::new(&mut constants);
        let call = factory
            .create_invoke(
                "java/util/List",
                "add",
                &Type::BOOLEAN,
                &[Type::OBJECT],
                InvokeType::Interface(0),
            )
            .unwrap();
        assert!(matches!(call, Instruction::Invoke(InvokeType::Interface(2), _)));
        assert_eq!(call.stack_effect(&constants).unwrap(), (2, 1));

        let mut factory = InstructionFactory::new(&mut constants);
        let get = factory
            .create_get_static("java.lang.Long", "MAX_VALUE", &Type::LONG)
            .unwrap();
        let member = match get {
            Instruction::GetStatic(field) => constants.member_ref(field.into()).unwrap(),
            other => panic!("Expected getstatic, got {:?}", other),
        };
        assert_eq!(member.class_name, "java/lang/Long");
        assert_eq!(member.descriptor, "J");
    }

    #[test]
    fn casts() {
        let mut constants = ConstantPoolGen::new();
        let mut factory = InstructionFactory::new(&mut constants);
        assert_eq!(factory.create_cast(&Type::INT, &Type::LONG).unwrap(), Instruction::I2L);
        assert_eq!(factory.create_cast(&Type::SHORT, &Type::DOUBLE).unwrap(), Instruction::I2D);
        assert_eq!(factory.create_cast(&Type::INT, &Type::CHAR).unwrap(), Instruction::I2C);
        assert!(matches!(
            factory.create_cast(&Type::LONG, &Type::BYTE),
            Err(Error::InvalidCast { .. })
        ));
        assert!(matches!(
            factory.create_cast(&Type::INT, &Type::STRING),
            Err(Error::InvalidCast { .. })
        ));
        assert!(matches!(
            factory.create_cast(&Type::OBJECT, &Type::STRING).unwrap(),
            Instruction::CheckCast(_)
        ));
    }

    #[test]
    fn arrays() {
        let mut constants = ConstantPoolGen::new();
        let mut factory = InstructionFactory::new(&mut constants);
        assert_eq!(
            factory.create_new_array(&Type::INT, 1).unwrap(),
            Instruction::NewArray(BaseType::Int)
        );
        assert!(matches!(
            factory.create_new_array(&Type::STRING, 1).unwrap(),
            Instruction::ANewArray(_)
        ));
        let multi = factory.create_new_array(&Type::INT, 3).unwrap();
        assert!(matches!(
            factory.create_new_array(&Type::INT, 0),
            Err(Error::InvalidDimensions(0))
        ));
        match multi {
            Instruction::MultiANewArray(class, 3) => {
                assert_eq!(constants.class_name(class).unwrap(), "[[[I")
            }
            other => panic!("Expected multianewarray, got {:?}", other),
        }
        assert_eq!(
            InstructionFactory::create_array_load(&Type::BOOLEAN).unwrap(),
            Instruction::BALoad
        );
        assert_eq!(
            InstructionFactory::create_array_store(&Type::STRING).unwrap(),
            Instruction::AAStore
        );
    }

    #[test]
    fn typed_instructions() {
        assert_eq!(
            InstructionFactory::create_load(&Type::CHAR, 2).unwrap(),
            Instruction::ILoad(2)
        );
        assert_eq!(
            InstructionFactory::create_store(&Type::DOUBLE, 4).unwrap(),
            Instruction::DStore(4)
        );
        assert_eq!(
            InstructionFactory::create_return(&Type::Void).unwrap(),
            Instruction::Return
        );
        assert!(InstructionFactory::create_load(&Type::Void, 0).is_err());
        assert_eq!(
            InstructionFactory::create_binary_operation(BinaryOperation::UShr, &Type::LONG)
                .unwrap(),
            Instruction::LSh(ShiftType::LogicalRight)
        );
        assert!(
            InstructionFactory::create_binary_operation(BinaryOperation::Xor, &Type::FLOAT)
                .is_err()
        );
        assert_eq!(InstructionFactory::create_dup_1(2), Instruction::Dup2X1);
        assert_eq!(
            InstructionFactory::create_null(&Type::STRING).unwrap(),
            Instruction::AConstNull
        );
    }

    #[test]
    fn switches() {
        let handles: Vec<InstructionHandle> = (0..4).map(|_| InstructionHandle::fresh()).collect();
        let default = InstructionHandle::fresh();

        let table =
            InstructionFactory::create_switch(&[3, 1, 2], &handles[..3], default).unwrap();
        assert_eq!(
            table,
            BranchInstruction::TableSwitch {
                padding: 0,
                default,
                low: 1,
                targets: vec![handles[1], handles[2], handles[0]],
            }
        );

        let lookup =
            InstructionFactory::create_switch(&[10, -5, 1000], &handles[..3], default).unwrap();
        assert_eq!(lookup.matches(), vec![-5, 10, 1000]);
        assert_eq!(lookup.opcode(), op::LOOKUPSWITCH);

        assert!(matches!(
            InstructionFactory::create_switch(&[1, 2], &handles[..1], default),
            Err(Error::MismatchedSwitchArrays {
                matches: 2,
                targets: 1
            })
        ));
    }

    #[test]
    fn print_ln() {
        let mut constants = ConstantPoolGen::new();
        let mut factory = InstructionFactory::new(&mut constants);
        let mut list = factory.create_print_ln("hi").unwrap();
        assert_eq!(list.len(), 3);
        let code = list.byte_code().unwrap();
        assert_eq!(code[0], op::GETSTATIC);
        assert_eq!(code[3], op::LDC);
        assert_eq!(code[5], op::INVOKEVIRTUAL);
        assert_eq!(
            InstructionFactory::create_branch(op::IFNONNULL, list.start().unwrap()).unwrap(),
            BranchInstruction::IfNull(EqComparison::NE, list.start().unwrap())
        );
        assert!(InstructionFactory::create_branch(op::RETURN, list.start().unwrap()).is_err());
    }
}
