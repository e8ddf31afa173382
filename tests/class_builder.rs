use classgen::jvm::class_file::{
    BytecodeIndex, ClassFile, Code, ConstantLookup, ExceptionHandler, LocalVariableTable,
};
use classgen::jvm::code::{
    opcodes, BranchInstruction, Instruction, InstructionFactory, InstructionHandle,
    InstructionList, InvokeType,
};
use classgen::jvm::model::{ClassGen, MethodGen};
use classgen::jvm::{
    ClassAccessFlags, ConstantPoolGen, Error, MethodAccessFlags, Type,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `for (int i = 0; i < 3; i++) System.out.println("Hello");`
fn hello_loop(constants: &mut ConstantPoolGen) -> Result<MethodGen, Error> {
    let mut factory = InstructionFactory::new(constants);
    let mut code = InstructionList::new();

    code.append(factory.create_push_int(0)?);
    code.append(InstructionFactory::create_store(&Type::INT, 1)?);
    let condition = InstructionHandle::fresh();
    code.append(BranchInstruction::Goto(condition));
    let mut print = factory.create_print_ln("Hello")?;
    let body = code.append_list(&mut print).expect("print list is not empty");
    code.append(Instruction::IInc(1, 1));
    code.append_with_handle(condition, InstructionFactory::create_load(&Type::INT, 1)?)?;
    code.append(factory.create_push_int(3)?);
    code.append(InstructionFactory::create_branch(opcodes::IF_ICMPLT, body)?);
    code.append(InstructionFactory::create_return(&Type::Void)?);

    let mut method = MethodGen::new(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        Type::Void,
        vec![Type::from_signature("[Ljava/lang/String;")?],
        Some(vec![String::from("args")]),
        "main",
        "com.example.Hello",
        code,
    )?;
    method.add_local_variable_auto("i", Type::INT, None, None)?;
    method.set_max_stack(&*constants)?;
    method.set_max_locals();
    Ok(method)
}

/// `try { return Integer.parseInt(s); } catch (NumberFormatException e) { return -1; }`
fn parse_or_default(constants: &mut ConstantPoolGen) -> Result<MethodGen, Error> {
    let mut factory = InstructionFactory::new(constants);
    let mut code = InstructionList::new();

    let start = code.append(Instruction::ALoad(0));
    code.append(factory.create_invoke(
        "java.lang.Integer",
        "parseInt",
        &Type::INT,
        &[Type::STRING],
        InvokeType::Static,
    )?);
    let end = code.append(Instruction::IReturn);
    let handler = code.append(Instruction::AStore(1));
    code.append(factory.create_push_int(-1)?);
    code.append(Instruction::IReturn);

    let mut method = MethodGen::new(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        Type::INT,
        vec![Type::STRING],
        Some(vec![String::from("s")]),
        "parseOrDefault",
        "com.example.Hello",
        code,
    )?;
    method.add_exception_handler(
        start,
        end,
        handler,
        Some(String::from("java.lang.NumberFormatException")),
    );
    method.set_max_stack(&*constants)?;
    method.set_max_locals();
    Ok(method)
}

fn hello_class() -> Result<ClassFile, Error> {
    let mut class = ClassGen::new(
        "com.example.Hello",
        "java.lang.Object",
        Some(String::from("Hello.java")),
        ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        vec![],
        ConstantPoolGen::new(),
    );
    class.add_empty_constructor(MethodAccessFlags::PUBLIC)?;
    let mut main = hello_loop(class.constant_pool_mut())?;
    class.add_method_gen(&mut main)?;
    let mut parse = parse_or_default(class.constant_pool_mut())?;
    class.add_method_gen(&mut parse)?;
    class.java_class()
}

fn code_of(class: &ClassFile, index: usize) -> Code {
    class.methods[index]
        .attribute::<Code>(&class.constants)
        .unwrap()
        .unwrap()
}

#[test]
fn loop_encoding() {
    init_logging();
    let class = hello_class().unwrap();
    let code = code_of(&class, 1);

    assert_eq!(code.max_stack, 2);
    assert_eq!(code.max_locals, 2);

    let bytes = &code.code_array.0;
    assert_eq!(bytes.len(), 22);
    assert_eq!(&bytes[0..2], &[0x03, 0x3C]);
    // goto from 2 to the condition at 16
    assert_eq!(&bytes[2..5], &[0xA7, 0x00, 0x0E]);
    // if_icmplt from 18 back to the body at 5
    assert_eq!(&bytes[18..21], &[0xA1, 0xFF, 0xF3]);
    assert_eq!(bytes[21], 0xB1);

    let variables = code
        .attributes
        .iter()
        .find(|attribute| attribute.name(&class.constants).unwrap() == "LocalVariableTable")
        .unwrap()
        .decode::<LocalVariableTable>()
        .unwrap();
    let ranges: Vec<(u16, u16, u16, &str)> = variables
        .0
        .iter()
        .map(|variable| {
            (
                variable.index,
                variable.start_pc.0,
                variable.length,
                class.constants.utf8(variable.name_index).unwrap(),
            )
        })
        .collect();
    assert_eq!(ranges, vec![(0, 0, 22, "args"), (1, 0, 22, "i")]);
}

#[test]
fn exception_table() {
    let class = hello_class().unwrap();
    let code = code_of(&class, 2);

    assert_eq!(code.max_stack, 1);
    assert_eq!(code.max_locals, 2);
    assert_eq!(
        code.exception_table,
        vec![ExceptionHandler {
            start_pc: BytecodeIndex(0),
            end_pc: BytecodeIndex(5),
            handler_pc: BytecodeIndex(5),
            catch_type: Some(
                ConstantPoolGen::from_pool(&class.constants)
                    .lookup_class("java.lang.NumberFormatException")
                    .unwrap()
            ),
        }]
    );
}

#[test]
fn class_round_trip() {
    let bytes = hello_class().unwrap().to_bytes().unwrap();
    assert_eq!(&bytes[0..4], &ClassFile::MAGIC);

    let parsed = ClassFile::parse(&bytes).unwrap();
    assert_eq!(parsed.to_bytes().unwrap(), bytes);

    let mut reloaded = ClassGen::from_class_file(parsed).unwrap();
    assert_eq!(reloaded.java_class().unwrap().to_bytes().unwrap(), bytes);
}

#[test]
fn methods_decode_and_rebuild() {
    let class = hello_class().unwrap();
    let mut constants = ConstantPoolGen::from_pool(&class.constants);

    for method in &class.methods {
        let mut method_gen =
            MethodGen::from_method(method, "com.example.Hello", &constants).unwrap();
        let rebuilt = method_gen.method(&mut constants).unwrap();
        assert_eq!(&rebuilt, method);
    }
    assert_eq!(constants.final_pool(), class.constants);
}

#[test]
fn decoded_methods_can_be_edited() {
    let class = hello_class().unwrap();
    let mut constants = ConstantPoolGen::from_pool(&class.constants);
    let mut main = MethodGen::from_method(&class.methods[1], "com.example.Hello", &constants)
        .unwrap();

    // Pad the start of the loop body with `nop`s, then take them back out
    let body = main.code().find_handle(5).unwrap();
    let first_nop = main.code_mut().insert_before(body, Instruction::Nop).unwrap();
    main.code_mut().insert_before(body, Instruction::Nop).unwrap();
    main.redirect_targeters(body, first_nop);
    assert_eq!(
        main.method(&mut constants)
            .unwrap()
            .attribute::<Code>(&constants)
            .unwrap()
            .unwrap()
            .code_array
            .0
            .len(),
        24
    );

    main.remove_nops().unwrap();
    assert_eq!(main.code().len(), 11);
    assert_eq!(main.method(&mut constants).unwrap(), class.methods[1]);
}

#[test]
fn long_jumps_get_widened() {
    init_logging();
    let mut code = InstructionList::new();
    let end = InstructionHandle::fresh();
    let jump = code.append(BranchInstruction::Goto(end));
    for _ in 0..40_000 {
        code.append(Instruction::Nop);
    }
    code.append_with_handle(end, Instruction::Return).unwrap();

    let bytes = code.byte_code().unwrap();
    assert_eq!(bytes.len(), 5 + 40_000 + 1);
    assert_eq!(bytes[0], opcodes::GOTO_W);
    assert_eq!(&bytes[1..5], &40_005i32.to_be_bytes());
    assert!(matches!(
        code.instruction(jump).unwrap().as_branch(),
        Some(BranchInstruction::GotoW(_))
    ));

    let positions = code.instruction_positions().to_vec();
    code.set_positions(true).unwrap();
    assert_eq!(code.instruction_positions(), positions.as_slice());
    assert_eq!(code.byte_code().unwrap(), bytes);
}

#[test]
fn repeated_builds_are_identical() {
    let mut constants = ConstantPoolGen::new();
    let mut method = parse_or_default(&mut constants).unwrap();
    method.add_exception("java.io.IOException");
    method.add_line_number(method.code().start().unwrap(), 7);

    let first = method.method(&mut constants).unwrap();
    let pool_size = constants.len();
    let second = method.method(&mut constants).unwrap();
    assert_eq!(first, second);
    assert_eq!(constants.len(), pool_size);
    assert_eq!(first.attributes.len(), 2);
    assert!(method.attributes().is_empty());
    assert!(method.code_attributes().is_empty());
}

#[test]
fn return_only_instance_method() {
    let mut constants = ConstantPoolGen::new();
    let mut code = InstructionList::new();
    code.append(Instruction::Return);

    let mut method = MethodGen::new(
        MethodAccessFlags::PUBLIC,
        Type::Void,
        vec![],
        None,
        "run",
        "com.example.Hello",
        code,
    )
    .unwrap();
    method.set_max_stack(&constants).unwrap();
    method.set_max_locals();
    assert_eq!((method.max_stack(), method.max_locals()), (0, 1));

    let built = method.method(&mut constants).unwrap();
    let code = built.attribute::<Code>(&constants).unwrap().unwrap();
    assert_eq!((code.max_stack, code.max_locals), (0, 1));
    assert_eq!(code.code_array.0, vec![0xB1]);
}
