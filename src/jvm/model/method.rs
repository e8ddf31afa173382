use super::annotation::{
    annotation_attributes, is_annotation_attribute, parameter_annotation_attributes,
    read_annotations, read_parameter_annotations,
};
use super::field::remove_first;
use super::{AnnotationEntryGen, Member, Observer, ObserverId, Observers};
use crate::jvm::class_file::{
    Attribute, AttributeLike, BytecodeArray, BytecodeIndex, Code, ConstantLookup,
    ExceptionHandler, Exceptions, LineNumberTable, LocalVariableTable, Method,
};
use crate::jvm::code::{
    AnyInstruction, CodeExceptionGen, Instruction, InstructionHandle, InstructionList,
    LineNumberGen, LocalVariableGen, TargeterId,
};
use crate::jvm::{BinaryName, ConstantPoolGen, Error, MethodAccessFlags, Type};
use std::collections::HashSet;
use std::convert::TryFrom;
use std::fmt;

/// Mutable method, resolved into a [`Method`] against a constant pool when done
///
/// Besides the code itself, the builder tracks everything that refers into the code: local
/// variable scopes, line numbers, and exception handlers. These are registered as targeters of the
/// instructions they refer to, so the instruction list refuses to delete instructions out from
/// under them.
#[derive(Debug)]
pub struct MethodGen {
    pub access_flags: MethodAccessFlags,
    name: String,
    class_name: String,
    return_type: Type,
    argument_types: Vec<Type>,
    argument_names: Vec<String>,
    code: InstructionList,
    max_stack: u16,
    max_locals: u16,
    local_variables: Vec<LocalVariableGen>,
    line_numbers: Vec<LineNumberGen>,
    exception_handlers: Vec<CodeExceptionGen>,

    /// Classes in the `throws` clause
    exceptions: Vec<String>,

    attributes: Vec<Attribute>,

    /// Attributes nested inside the `Code` attribute
    code_attributes: Vec<Attribute>,

    annotations: Vec<AnnotationEntryGen>,
    parameter_annotations: Vec<Vec<AnnotationEntryGen>>,

    /// Skip generating `LocalVariableTable` and `LineNumberTable`
    strip_attributes: bool,

    observers: Observers<MethodGen>,
}

impl MethodGen {
    /// Make a method builder around some code
    ///
    /// Unless the method is abstract or native, `this` (for instance methods) and the arguments
    /// get registered as local variables live over the whole method. Missing argument names
    /// default to `arg0`, `arg1`, ...
    pub fn new(
        access_flags: MethodAccessFlags,
        return_type: Type,
        argument_types: Vec<Type>,
        argument_names: Option<Vec<String>>,
        name: impl Into<String>,
        class_name: impl Into<String>,
        code: InstructionList,
    ) -> Result<MethodGen, Error> {
        let name = name.into();
        let class_name = class_name.into();

        let argument_names = match argument_names {
            Some(names) if names.len() != argument_types.len() => {
                return Err(Error::NegativeOrInvalidArgument(format!(
                    "{} has {} argument types but {} argument names",
                    name,
                    argument_types.len(),
                    names.len()
                )))
            }
            Some(names) => names,
            None => (0..argument_types.len())
                .map(|i| format!("arg{}", i))
                .collect(),
        };
        if let Some(bad) = argument_types.iter().find(|typ| typ.as_field_type().is_none()) {
            return Err(Error::NegativeOrInvalidArgument(format!(
                "{} cannot take an argument of type {}",
                name, bad
            )));
        }

        let mut method = MethodGen {
            access_flags,
            name,
            class_name,
            return_type,
            argument_types,
            argument_names,
            code,
            max_stack: 0,
            max_locals: 0,
            local_variables: vec![],
            line_numbers: vec![],
            exception_handlers: vec![],
            exceptions: vec![],
            attributes: vec![],
            code_attributes: vec![],
            annotations: vec![],
            parameter_annotations: vec![],
            strip_attributes: false,
            observers: Observers::default(),
        };

        if !method.is_abstract() && !method.is_native() {
            if !method.is_static() {
                let this_class = BinaryName::from_dotted(&method.class_name)
                    .map_err(Error::NegativeOrInvalidArgument)?;
                method.add_local_variable_auto("this", Type::object(this_class), None, None)?;
            }
            let arguments: Vec<(String, Type)> = method
                .argument_names
                .iter()
                .cloned()
                .zip(method.argument_types.iter().cloned())
                .collect();
            for (argument_name, argument_type) in arguments {
                method.add_local_variable_auto(argument_name, argument_type, None, None)?;
            }
        }

        Ok(method)
    }

    /// Read a method back out of a class file
    ///
    /// The `Code` attribute is decoded into an instruction list, along with its exception table,
    /// line numbers, and local variables. Other attributes are kept as they are, so `constants`
    /// should be the pool the method will get added back into (eg. a pool made with
    /// [`ConstantPoolGen::from_pool`] from the method's class).
    pub fn from_method(
        method: &Method,
        class_name: &str,
        constants: &impl ConstantLookup,
    ) -> Result<MethodGen, Error> {
        let name = constants.utf8(method.name_index)?;
        let descriptor = constants.utf8(method.descriptor_index)?;

        let mut code = None;
        let mut exceptions = vec![];
        let mut attributes = vec![];
        for attribute in &method.attributes {
            let attribute_name = attribute.name(constants)?;
            if attribute_name == Code::NAME {
                code = Some(attribute.decode::<Code>()?);
            } else if attribute_name == Exceptions::NAME {
                for class in attribute.decode::<Exceptions>()?.0 {
                    exceptions.push(constants.class_name(class)?.to_owned());
                }
            } else if !is_annotation_attribute(attribute_name) {
                attributes.push(attribute.clone());
            }
        }

        let list = match &code {
            Some(code) => InstructionList::from_bytes(&code.code_array.0)?,
            None => InstructionList::new(),
        };
        let mut method_gen = MethodGen::new(
            method.access_flags,
            Type::return_type(descriptor)?,
            Type::argument_types(descriptor)?,
            None,
            name,
            class_name,
            list,
        )?;
        method_gen.exceptions = exceptions;
        method_gen.attributes = attributes;
        method_gen.annotations = read_annotations(&method.attributes, constants)?;
        method_gen.parameter_annotations = read_parameter_annotations(&method.attributes, constants)?;

        if let Some(code) = code {
            method_gen.read_code(&code, constants)?;
        }
        Ok(method_gen)
    }

    /// Attach the exception table and debug information from a decoded `Code` attribute
    fn read_code(&mut self, code: &Code, constants: &impl ConstantLookup) -> Result<(), Error> {
        let code_length = code.code_array.0.len();

        for entry in &code.exception_table {
            let start = self.handle_at(entry.start_pc)?;
            let last_covered = if entry.end_pc.0 as usize >= code_length {
                self.code.end()
            } else {
                self.code.prev(self.handle_at(entry.end_pc)?)?
            };
            let end = last_covered.ok_or_else(|| {
                Error::NegativeOrInvalidArgument(format!(
                    "Exception range ending at {} is empty",
                    entry.end_pc.0
                ))
            })?;
            let handler = self.handle_at(entry.handler_pc)?;
            let catch_type = match entry.catch_type {
                None => None,
                Some(class) => Some(constants.class_name(class)?.to_owned()),
            };
            self.add_exception_handler(start, end, handler, catch_type);
        }

        let mut seen_local_variables = false;
        for attribute in &code.attributes {
            let attribute_name = attribute.name(constants)?;
            if attribute_name == LineNumberTable::NAME {
                for entry in attribute.decode::<LineNumberTable>()?.0 {
                    let handle = self.handle_at(entry.start_pc)?;
                    self.add_line_number(handle, entry.line_number);
                }
            } else if attribute_name == LocalVariableTable::NAME {
                // Debug information replaces the generated `this` and `argN` variables
                if !seen_local_variables {
                    self.remove_local_variables();
                    seen_local_variables = true;
                }
                for entry in attribute.decode::<LocalVariableTable>()?.0 {
                    let start = self.handle_at(entry.start_pc)?;
                    let end_pc = entry.start_pc.0 as usize + entry.length as usize;
                    let (end, live_to_end) = match self.code.find_handle(end_pc) {
                        Some(end) => (Some(end), false),
                        None => {
                            if end_pc != code_length {
                                log::warn!("Local variable range ends mid-instruction at {}", end_pc);
                            }
                            (self.code.end(), true)
                        }
                    };
                    let typ = Type::from_signature(constants.utf8(entry.descriptor_index)?)?;
                    let name = constants.utf8(entry.name_index)?;
                    let variable =
                        self.add_local_variable(name, typ, entry.index, Some(start), end)?;
                    variable.live_to_end = live_to_end;
                }
            } else {
                self.code_attributes.push(attribute.clone());
            }
        }

        self.max_stack = code.max_stack;
        self.max_locals = code.max_locals;
        Ok(())
    }

    fn handle_at(&self, offset: BytecodeIndex) -> Result<InstructionHandle, Error> {
        self.code.find_handle(offset.0 as usize).ok_or_else(|| {
            Error::NegativeOrInvalidArgument(format!("No instruction starts at {}", offset.0))
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn set_class_name(&mut self, class_name: impl Into<String>) {
        self.class_name = class_name.into();
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    pub fn set_return_type(&mut self, return_type: Type) {
        self.return_type = return_type;
    }

    pub fn argument_types(&self) -> &[Type] {
        &self.argument_types
    }

    pub fn argument_names(&self) -> &[String] {
        &self.argument_names
    }

    /// Replace the arguments (`names` must line up with `types`)
    pub fn set_arguments(&mut self, types: Vec<Type>, names: Vec<String>) -> Result<(), Error> {
        if types.len() != names.len() {
            return Err(Error::NegativeOrInvalidArgument(format!(
                "{} argument types but {} argument names",
                types.len(),
                names.len()
            )));
        }
        self.argument_types = types;
        self.argument_names = names;
        Ok(())
    }

    /// Method descriptor (eg. `(I[Ljava/lang/String;)V`)
    pub fn signature(&self) -> String {
        Type::method_signature(&self.return_type, &self.argument_types)
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::ABSTRACT)
    }

    pub fn is_native(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::NATIVE)
    }

    pub fn code(&self) -> &InstructionList {
        &self.code
    }

    pub fn code_mut(&mut self) -> &mut InstructionList {
        &mut self.code
    }

    /// Swap in a different instruction list, returning the old one
    ///
    /// Local variables, line numbers, and exception handlers are not moved over: they still refer
    /// to handles in the old list.
    pub fn set_instruction_list(&mut self, code: InstructionList) -> InstructionList {
        std::mem::replace(&mut self.code, code)
    }

    /// Whether to leave out the `LocalVariableTable` and `LineNumberTable` attributes
    pub fn strip_attributes(&mut self, strip: bool) {
        self.strip_attributes = strip;
    }

    /// Add a local variable in a given slot
    ///
    /// A `None` bound means the variable is live from the start (or to the end) of the code,
    /// however the code changes. A variable with the same slot and bounds as an existing one
    /// replaces it.
    pub fn add_local_variable(
        &mut self,
        name: impl Into<String>,
        typ: Type,
        index: u16,
        start: Option<InstructionHandle>,
        end: Option<InstructionHandle>,
    ) -> Result<&mut LocalVariableGen, Error> {
        let name = name.into();
        if typ.as_field_type().is_none() {
            return Err(Error::InvalidLocalVariableType(typ.to_string()));
        }
        let top = u16::try_from(index as usize + typ.size()).map_err(|_| {
            Error::NegativeOrInvalidArgument(format!(
                "Local variable {} does not fit in slot {}",
                name, index
            ))
        })?;
        self.max_locals = self.max_locals.max(top);

        let variable = LocalVariableGen::new(name, typ, index, start, end);
        for bound in [start, end].iter().flatten() {
            self.code.add_targeter(*bound, variable.targeter());
        }

        let existing = self.local_variables.iter().position(|existing| {
            existing.index == index && existing.start == start && existing.end == end
        });
        let position = match existing {
            Some(position) => {
                let old = std::mem::replace(&mut self.local_variables[position], variable);
                self.unregister_local_variable(&old);
                position
            }
            None => {
                self.local_variables.push(variable);
                self.local_variables.len() - 1
            }
        };
        Ok(&mut self.local_variables[position])
    }

    /// Add a local variable in the next free slot
    pub fn add_local_variable_auto(
        &mut self,
        name: impl Into<String>,
        typ: Type,
        start: Option<InstructionHandle>,
        end: Option<InstructionHandle>,
    ) -> Result<&mut LocalVariableGen, Error> {
        let index = self.max_locals;
        self.add_local_variable(name, typ, index, start, end)
    }

    fn unregister_local_variable(&mut self, variable: &LocalVariableGen) {
        for bound in [variable.start, variable.end].iter().flatten() {
            self.code.remove_targeter(*bound, variable.targeter());
        }
    }

    pub fn remove_local_variable(&mut self, id: TargeterId) -> bool {
        match self.local_variables.iter().position(|variable| variable.id == id) {
            Some(position) => {
                let variable = self.local_variables.remove(position);
                self.unregister_local_variable(&variable);
                true
            }
            None => false,
        }
    }

    pub fn remove_local_variables(&mut self) {
        for variable in std::mem::take(&mut self.local_variables) {
            self.unregister_local_variable(&variable);
        }
    }

    /// Local variables, sorted by slot
    pub fn local_variables(&self) -> Vec<&LocalVariableGen> {
        let mut variables: Vec<&LocalVariableGen> = self.local_variables.iter().collect();
        variables.sort_by_key(|variable| variable.index);
        variables
    }

    /// Local variable along with the code, so that its range can be moved
    pub fn local_variable_mut(
        &mut self,
        id: TargeterId,
    ) -> Option<(&mut LocalVariableGen, &mut InstructionList)> {
        let variable = self
            .local_variables
            .iter_mut()
            .find(|variable| variable.id == id)?;
        Some((variable, &mut self.code))
    }

    /// Resolve the local variables (positions in the code must already be resolved)
    pub fn local_variable_table(
        &self,
        constants: &mut ConstantPoolGen,
    ) -> Result<LocalVariableTable, Error> {
        let entries = self
            .local_variables()
            .into_iter()
            .map(|variable| variable.local_variable(&self.code, constants))
            .collect::<Result<_, _>>()?;
        Ok(LocalVariableTable(entries))
    }

    pub fn add_line_number(&mut self, handle: InstructionHandle, line: u16) -> &LineNumberGen {
        let line_number = LineNumberGen::new(handle, line);
        self.code.add_targeter(handle, line_number.targeter());
        self.line_numbers.push(line_number);
        &self.line_numbers[self.line_numbers.len() - 1]
    }

    pub fn remove_line_number(&mut self, id: TargeterId) -> bool {
        match self.line_numbers.iter().position(|line| line.id == id) {
            Some(position) => {
                let line_number = self.line_numbers.remove(position);
                self.code
                    .remove_targeter(line_number.handle, line_number.targeter());
                true
            }
            None => false,
        }
    }

    pub fn remove_line_numbers(&mut self) {
        for line_number in std::mem::take(&mut self.line_numbers) {
            self.code
                .remove_targeter(line_number.handle, line_number.targeter());
        }
    }

    pub fn line_numbers(&self) -> &[LineNumberGen] {
        &self.line_numbers
    }

    pub fn line_number_mut(
        &mut self,
        id: TargeterId,
    ) -> Option<(&mut LineNumberGen, &mut InstructionList)> {
        let line_number = self.line_numbers.iter_mut().find(|line| line.id == id)?;
        Some((line_number, &mut self.code))
    }

    /// Resolve the line numbers (positions in the code must already be resolved)
    pub fn line_number_table(&self) -> Result<LineNumberTable, Error> {
        let entries = self
            .line_numbers
            .iter()
            .map(|line_number| line_number.line_number(&self.code))
            .collect::<Result<_, _>>()?;
        Ok(LineNumberTable(entries))
    }

    /// Add an exception handler covering `start` through `end` (inclusive)
    ///
    /// A `catch_type` of `None` catches everything (as for `finally` blocks).
    pub fn add_exception_handler(
        &mut self,
        start: InstructionHandle,
        end: InstructionHandle,
        handler: InstructionHandle,
        catch_type: Option<String>,
    ) -> &CodeExceptionGen {
        let exception_handler = CodeExceptionGen::new(start, end, handler, catch_type);
        let targeter = exception_handler.targeter();
        for handle in [start, end, handler] {
            self.code.add_targeter(handle, targeter);
        }
        self.exception_handlers.push(exception_handler);
        &self.exception_handlers[self.exception_handlers.len() - 1]
    }

    fn unregister_exception_handler(&mut self, exception_handler: &CodeExceptionGen) {
        let targeter = exception_handler.targeter();
        for handle in [
            exception_handler.start,
            exception_handler.end,
            exception_handler.handler,
        ] {
            self.code.remove_targeter(handle, targeter);
        }
    }

    pub fn remove_exception_handler(&mut self, id: TargeterId) -> bool {
        match self
            .exception_handlers
            .iter()
            .position(|handler| handler.id == id)
        {
            Some(position) => {
                let handler = self.exception_handlers.remove(position);
                self.unregister_exception_handler(&handler);
                true
            }
            None => false,
        }
    }

    pub fn remove_exception_handlers(&mut self) {
        for handler in std::mem::take(&mut self.exception_handlers) {
            self.unregister_exception_handler(&handler);
        }
    }

    pub fn exception_handlers(&self) -> &[CodeExceptionGen] {
        &self.exception_handlers
    }

    /// Exception handler along with the code, so that its range or entry point can be moved
    pub fn exception_handler_mut(
        &mut self,
        id: TargeterId,
    ) -> Option<(&mut CodeExceptionGen, &mut InstructionList)> {
        let handler = self
            .exception_handlers
            .iter_mut()
            .find(|handler| handler.id == id)?;
        Some((handler, &mut self.code))
    }

    /// Resolve the exception table (positions in the code must already be resolved)
    pub fn code_exceptions(
        &self,
        constants: &mut ConstantPoolGen,
    ) -> Result<Vec<ExceptionHandler>, Error> {
        self.exception_handlers
            .iter()
            .map(|handler| handler.code_exception(&self.code, constants))
            .collect()
    }

    /// Add a class to the `throws` clause
    pub fn add_exception(&mut self, class_name: impl Into<String>) {
        let class_name = class_name.into();
        if !self.exceptions.contains(&class_name) {
            self.exceptions.push(class_name);
        }
    }

    pub fn remove_exception(&mut self, class_name: &str) -> bool {
        let before = self.exceptions.len();
        self.exceptions.retain(|exception| exception != class_name);
        self.exceptions.len() != before
    }

    pub fn remove_exceptions(&mut self) {
        self.exceptions.clear();
    }

    pub fn exceptions(&self) -> &[String] {
        &self.exceptions
    }

    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    pub fn remove_attribute(&mut self, attribute: &Attribute) -> bool {
        remove_first(&mut self.attributes, attribute)
    }

    pub fn remove_attributes(&mut self) {
        self.attributes.clear();
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn add_code_attribute(&mut self, attribute: Attribute) {
        self.code_attributes.push(attribute);
    }

    pub fn remove_code_attribute(&mut self, attribute: &Attribute) -> bool {
        remove_first(&mut self.code_attributes, attribute)
    }

    pub fn remove_code_attributes(&mut self) {
        self.code_attributes.clear();
    }

    pub fn code_attributes(&self) -> &[Attribute] {
        &self.code_attributes
    }

    pub fn add_annotation_entry(&mut self, annotation: AnnotationEntryGen) {
        self.annotations.push(annotation);
    }

    pub fn remove_annotation_entry(&mut self, annotation: &AnnotationEntryGen) -> bool {
        remove_first(&mut self.annotations, annotation)
    }

    pub fn remove_annotation_entries(&mut self) {
        self.annotations.clear();
    }

    pub fn annotation_entries(&self) -> &[AnnotationEntryGen] {
        &self.annotations
    }

    /// Annotate one of the method parameters
    pub fn add_parameter_annotation(
        &mut self,
        parameter: usize,
        annotation: AnnotationEntryGen,
    ) -> Result<(), Error> {
        if parameter >= self.argument_types.len() {
            return Err(Error::NegativeOrInvalidArgument(format!(
                "{} has no parameter {}",
                self.name, parameter
            )));
        }
        if self.parameter_annotations.len() < self.argument_types.len() {
            self.parameter_annotations
                .resize(self.argument_types.len(), vec![]);
        }
        self.parameter_annotations[parameter].push(annotation);
        Ok(())
    }

    pub fn parameter_annotations(&self, parameter: usize) -> &[AnnotationEntryGen] {
        self.parameter_annotations
            .get(parameter)
            .map_or(&[], |annotations| annotations.as_slice())
    }

    pub fn remove_parameter_annotations(&mut self) {
        self.parameter_annotations.clear();
    }

    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }

    pub fn set_max_locals_to(&mut self, max_locals: u16) {
        self.max_locals = max_locals;
    }

    /// Compute the number of local variable slots from the arguments and the instructions which
    /// access local variables
    pub fn set_max_locals(&mut self) {
        let mut max_locals = if self.is_static() { 0 } else { 1 };
        max_locals += self.argument_types.iter().map(Type::size).sum::<usize>();
        for instruction in self.code.instructions() {
            if let AnyInstruction::Plain(instruction) = instruction {
                if let Some((index, size)) = instruction.local_variable() {
                    max_locals = max_locals.max(index as usize + size);
                }
            }
        }
        self.max_locals = u16::try_from(max_locals).unwrap_or(u16::MAX);
    }

    pub fn max_stack(&self) -> u16 {
        self.max_stack
    }

    pub fn set_max_stack_to(&mut self, max_stack: u16) {
        self.max_stack = max_stack;
    }

    /// Compute the maximum operand stack depth of the code
    pub fn set_max_stack(&mut self, constants: &impl ConstantLookup) -> Result<(), Error> {
        self.max_stack =
            MethodGen::compute_max_stack(constants, &self.code, &self.exception_handlers)?;
        Ok(())
    }

    /// Maximum operand stack depth reached by the code
    ///
    /// This walks the code from the start, following branches. Each exception handler is also
    /// explored, starting with the exception on the stack. Every instruction is explored at most
    /// once per branch into it: if two paths reach the same branch target with different stack
    /// depths, only the first depth is used.
    pub fn compute_max_stack(
        constants: &impl ConstantLookup,
        code: &InstructionList,
        exception_handlers: &[CodeExceptionGen],
    ) -> Result<u16, Error> {
        let mut branch_targets = BranchTargets::default();

        let mut max_depth: i64 = 0;
        for handler in exception_handlers {
            max_depth = 1;
            branch_targets.push(handler.handler, 1);
        }

        let mut depth: i64 = 0;
        let mut current = code.start();
        while let Some(handle) = current {
            let instruction = code.instruction(handle)?;
            let (consumed, produced) = instruction.stack_effect(constants)?;
            depth += produced as i64 - consumed as i64;
            max_depth = max_depth.max(depth);

            let mut next = code.next(handle)?;
            match instruction {
                AnyInstruction::Branch(branch) => {
                    if branch.is_switch() {
                        for target in branch.case_targets() {
                            branch_targets.push(target, depth);
                        }
                        next = None;
                    } else if !branch.is_conditional() {
                        if branch.is_jsr() {
                            if let Some(after) = next {
                                branch_targets.push(after, depth - 1);
                            }
                        }
                        next = None;
                    }
                    branch_targets.push(branch.target(), depth);
                }
                AnyInstruction::Plain(plain) => {
                    if plain.ends_flow() {
                        next = None;
                    }
                }
            }

            current = match next {
                Some(next) => Some(next),
                None => branch_targets.pop().map(|(target, target_depth)| {
                    depth = target_depth;
                    target
                }),
            };
        }

        log::trace!("Maximum stack depth is {}", max_depth);
        Ok(u16::try_from(max_depth.max(0)).unwrap_or(u16::MAX))
    }

    /// Delete `nop` instructions, moving anything targeting them onto the next instruction
    ///
    /// A `nop` at the very end of the code is kept, since there is nothing to move its targeters
    /// onto.
    pub fn remove_nops(&mut self) -> Result<(), Error> {
        let mut current = self.code.start();
        while let Some(handle) = current {
            let next = self.code.next(handle)?;
            let is_nop = matches!(
                self.code.instruction(handle)?,
                AnyInstruction::Plain(Instruction::Nop)
            );
            if let (true, Some(next_handle)) = (is_nop, next) {
                if self.code.has_targeters(handle) {
                    self.redirect_targeters(handle, next_handle);
                }
                self.code.delete(handle)?;
            }
            current = next;
        }
        Ok(())
    }

    /// Move everything targeting `old_target` (branches, local variable bounds, exception
    /// handlers, and line numbers) onto `new_target`
    pub fn redirect_targeters(
        &mut self,
        old_target: InstructionHandle,
        new_target: InstructionHandle,
    ) {
        self.code.redirect_branches(old_target, new_target);
        self.code
            .redirect_local_variables(&mut self.local_variables, old_target, new_target);
        self.code
            .redirect_exception_handlers(&mut self.exception_handlers, old_target, new_target);
        self.code
            .redirect_line_numbers(&mut self.line_numbers, old_target, new_target);
    }

    /// Resolve into a class file method
    ///
    /// The `Code`, `LocalVariableTable`, `LineNumberTable`, annotation, and `Exceptions`
    /// attributes only exist in the output: the builder's own attribute lists are left as they
    /// were, so building twice produces the same attributes. `max_stack` and `max_locals` are
    /// used as they are (see [`MethodGen::set_max_stack`] and [`MethodGen::set_max_locals`]).
    pub fn method(&mut self, constants: &mut ConstantPoolGen) -> Result<Method, Error> {
        let name_index = constants.add_utf8(self.name.as_str())?;
        let descriptor_index = constants.add_utf8(self.signature())?;

        let mut attributes = vec![];
        for attribute in &self.attributes {
            if attribute.name(&*constants)? != Code::NAME {
                attributes.push(attribute.clone());
            }
        }

        if !self.is_abstract() && !self.is_native() {
            let byte_code = self.code.byte_code()?;
            if byte_code.len() > u16::MAX as usize {
                return Err(Error::MethodCodeOverflow(byte_code.len()));
            }

            let mut code_attributes = self.code_attributes.clone();
            if !self.strip_attributes {
                if !self.local_variables.is_empty() {
                    let table = self.local_variable_table(constants)?;
                    code_attributes.push(constants.add_attribute(&table)?);
                }
                if !self.line_numbers.is_empty() {
                    let table = self.line_number_table()?;
                    code_attributes.push(constants.add_attribute(&table)?);
                }
            }

            let code = Code {
                max_stack: self.max_stack,
                max_locals: self.max_locals,
                code_array: BytecodeArray(byte_code),
                exception_table: self.code_exceptions(constants)?,
                attributes: code_attributes,
            };
            attributes.push(constants.add_attribute(&code)?);
        }

        attributes.extend(annotation_attributes(&self.annotations, constants)?);
        attributes.extend(parameter_annotation_attributes(
            &self.parameter_annotations,
            constants,
        )?);

        if !self.exceptions.is_empty() {
            let classes = self
                .exceptions
                .iter()
                .map(|class_name| constants.add_class(class_name))
                .collect::<Result<_, _>>()?;
            attributes.push(constants.add_attribute(&Exceptions(classes))?);
        }

        log::debug!("Built method {}", self);
        Ok(Method {
            access_flags: self.access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    pub fn add_observer(&mut self, observer: impl Observer<MethodGen> + 'static) -> ObserverId {
        self.observers.add(observer)
    }

    pub fn remove_observer(&mut self, observer: ObserverId) -> bool {
        self.observers.remove(observer)
    }

    /// Notify all observers
    pub fn update(&mut self) {
        let mut observers = std::mem::take(&mut self.observers);
        observers.notify_all(self);
        self.observers = observers;
    }
}

impl Member for MethodGen {
    fn member_name(&self) -> &str {
        &self.name
    }

    fn member_signature(&self) -> String {
        self.signature()
    }
}

/// Work-list of branch targets still to explore, each with the stack depth on entry
#[derive(Default)]
struct BranchTargets {
    visited: HashSet<InstructionHandle>,
    pending: Vec<(InstructionHandle, i64)>,
}

impl BranchTargets {
    /// Queue a target, unless it has been queued before
    fn push(&mut self, target: InstructionHandle, depth: i64) {
        if self.visited.insert(target) {
            self.pending.push((target, depth));
        }
    }

    fn pop(&mut self) -> Option<(InstructionHandle, i64)> {
        self.pending.pop()
    }
}

/// Renders like a Java method declaration (eg. `public static void main(java.lang.String[] args)`)
impl fmt::Display for MethodGen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modifiers = [
            (MethodAccessFlags::PUBLIC, "public "),
            (MethodAccessFlags::PRIVATE, "private "),
            (MethodAccessFlags::PROTECTED, "protected "),
            (MethodAccessFlags::STATIC, "static "),
            (MethodAccessFlags::FINAL, "final "),
            (MethodAccessFlags::SYNCHRONIZED, "synchronized "),
            (MethodAccessFlags::NATIVE, "native "),
            (MethodAccessFlags::ABSTRACT, "abstract "),
        ];
        for (flag, modifier) in modifiers {
            if self.access_flags.contains(flag) {
                f.write_str(modifier)?;
            }
        }
        write!(f, "{} {}(", self.return_type, self.name)?;
        for (i, (typ, name)) in self
            .argument_types
            .iter()
            .zip(&self.argument_names)
            .enumerate()
        {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", typ, name)?;
        }
        f.write_str(")")?;
        if !self.exceptions.is_empty() {
            write!(f, " throws {}", self.exceptions.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{BranchInstruction, OrdComparison};

    fn static_method(argument_types: Vec<Type>, code: InstructionList) -> MethodGen {
        MethodGen::new(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            Type::INT,
            argument_types,
            None,
            "run",
            "Example",
            code,
        )
        .unwrap()
    }

    #[test]
    fn implicit_locals() {
        let method = MethodGen::new(
            MethodAccessFlags::PUBLIC,
            Type::Void,
            vec![Type::LONG, Type::STRING],
            Some(vec![String::from("count"), String::from("label")]),
            "run",
            "com.example.Example",
            InstructionList::new(),
        )
        .unwrap();

        let variables: Vec<(&str, u16)> = method
            .local_variables()
            .into_iter()
            .map(|variable| (variable.name.as_str(), variable.index))
            .collect();
        assert_eq!(variables, vec![("this", 0), ("count", 1), ("label", 3)]);
        assert_eq!(method.max_locals(), 4);
        assert_eq!(method.signature(), "(JLjava/lang/String;)V");
        assert_eq!(
            method.to_string(),
            "public void run(long count, java.lang.String label)"
        );
    }

    #[test]
    fn mismatched_argument_names() {
        let result = MethodGen::new(
            MethodAccessFlags::STATIC,
            Type::Void,
            vec![Type::INT],
            Some(vec![]),
            "run",
            "Example",
            InstructionList::new(),
        );
        assert!(matches!(result, Err(Error::NegativeOrInvalidArgument(_))));
    }

    #[test]
    fn max_stack_follows_branches() {
        let constants = ConstantPoolGen::new();
        let mut code = InstructionList::new();
        let else_branch = InstructionHandle::fresh();
        code.append(Instruction::ILoad(0));
        code.append(BranchInstruction::If(OrdComparison::EQ, else_branch));
        code.append(Instruction::IConst1);
        code.append(Instruction::IConst2);
        code.append(Instruction::IAdd);
        code.append(Instruction::IReturn);
        code.append_with_handle(else_branch, Instruction::IConst0)
            .unwrap();
        code.append(Instruction::IReturn);

        let mut method = static_method(vec![Type::INT], code);
        method.set_max_stack(&constants).unwrap();
        assert_eq!(method.max_stack(), 2);
    }

    #[test]
    fn max_stack_counts_handlers() {
        let constants = ConstantPoolGen::new();
        let mut code = InstructionList::new();
        let start = code.append(Instruction::IConst0);
        let end = code.append(Instruction::IReturn);
        let handler = code.append(Instruction::Pop);
        code.append(Instruction::IConst1);
        code.append(Instruction::IReturn);

        let mut method = static_method(vec![], code);
        assert_eq!(
            MethodGen::compute_max_stack(&constants, method.code(), &[]).unwrap(),
            1
        );
        method.add_exception_handler(start, end, handler, None);
        method.set_max_stack(&constants).unwrap();
        assert_eq!(method.max_stack(), 1);
    }

    #[test]
    fn max_locals_from_instructions() {
        let mut code = InstructionList::new();
        code.append(Instruction::DLoad(3));
        code.append(Instruction::IReturn);
        let mut method = static_method(vec![Type::INT], code);
        method.set_max_locals();
        assert_eq!(method.max_locals(), 5);
    }

    #[test]
    fn local_variables_block_deletion() {
        let mut code = InstructionList::new();
        let start = code.append(Instruction::IConst0);
        code.append(Instruction::IStore(1));
        let end = code.append(Instruction::ILoad(1));
        code.append(Instruction::IReturn);

        let mut method = static_method(vec![Type::INT], code);
        let id = method
            .add_local_variable("x", Type::INT, 1, Some(start), Some(end))
            .unwrap()
            .id();
        assert!(matches!(
            method.code_mut().delete(start),
            Err(Error::TargetLost(_))
        ));
        assert!(method.remove_local_variable(id));
        method.code_mut().delete(start).unwrap();
    }

    #[test]
    fn moved_bounds_update_targeters() {
        let mut code = InstructionList::new();
        let first = code.append(Instruction::IConst0);
        let store = code.append(Instruction::IStore(1));
        let load = code.append(Instruction::ILoad(1));
        code.append(Instruction::IReturn);

        let mut method = static_method(vec![Type::INT], code);
        let variable = method
            .add_local_variable("x", Type::INT, 1, Some(first), Some(load))
            .unwrap()
            .id();
        let handler = method.add_exception_handler(first, first, load, None).id();
        let line = method.add_line_number(first, 3).id();

        let (local, code) = method.local_variable_mut(variable).unwrap();
        local.set_start(code, Some(store));
        let (entry, code) = method.exception_handler_mut(handler).unwrap();
        entry.set_start(code, store);
        entry.set_end(code, store);
        let (line_number, code) = method.line_number_mut(line).unwrap();
        line_number.set_handle(code, store);

        assert!(method.code().targeters(first).is_empty());
        assert_eq!(method.code().targeters(store).len(), 4);
        assert_eq!(method.exception_handlers()[0].start(), store);
        assert_eq!(method.line_numbers()[0].handle(), store);

        // Nothing refers to the first instruction anymore, but the moved bounds protect `store`
        method.code_mut().delete(first).unwrap();
        match method.code_mut().delete(store) {
            Err(Error::TargetLost(lost)) => {
                assert_eq!(lost.handles().collect::<Vec<_>>(), vec![store]);
            }
            other => panic!("expected lost targets, got {:?}", other),
        }
    }

    #[test]
    fn void_locals_are_rejected() {
        let mut method = static_method(vec![], InstructionList::new());
        assert!(matches!(
            method.add_local_variable_auto("nothing", Type::Void, None, None),
            Err(Error::InvalidLocalVariableType(_))
        ));
    }

    #[test]
    fn parameter_annotations_need_parameters() {
        let mut method = static_method(vec![Type::INT], InstructionList::new());
        let annotation = AnnotationEntryGen::new("Ljavax/annotation/Nonnull;", true);
        assert!(method
            .add_parameter_annotation(1, annotation.clone())
            .is_err());
        method.add_parameter_annotation(0, annotation).unwrap();
        assert_eq!(method.parameter_annotations(0).len(), 1);
        assert!(method.parameter_annotations(1).is_empty());
    }
}
