use super::annotation::{
    annotation_attributes, read_annotations, RuntimeInvisibleAnnotations, RuntimeVisibleAnnotations,
};
use super::field::remove_first;
use super::{
    AnnotationEntryGen, Comparator, FieldGen, MemberKey, MethodGen, NameAndSignature, NameOnly,
    Observer, ObserverId, Observers,
};
use crate::jvm::class_file::{
    Attribute, AttributeLike, ClassFile, ConstantLookup, Field, Method, SourceFile,
    Utf8ConstantIndex, Version,
};
use crate::jvm::code::{Instruction, InstructionFactory, InstructionList, InvokeType};
use crate::jvm::{
    ClassAccessFlags, ConstantPoolGen, Error, MethodAccessFlags, Name, Type, UnqualifiedName,
};

/// Mutable class, resolved into a [`ClassFile`] when done
///
/// Class names are in the dotted form (`java.lang.Object`). Methods and fields are kept as
/// already-resolved class file records pointing into the class's own constant pool: build them
/// with [`MethodGen`] and [`FieldGen`] against [`ClassGen::constant_pool_mut`] (or use
/// [`ClassGen::add_method_gen`] and [`ClassGen::add_field_gen`]).
#[derive(Debug)]
pub struct ClassGen {
    pub access_flags: ClassAccessFlags,
    class_name: String,
    super_class_name: String,

    /// Source file, for the `SourceFile` attribute
    file_name: Option<String>,

    version: Version,
    constants: ConstantPoolGen,
    interfaces: Vec<String>,
    fields: Vec<Field>,
    methods: Vec<Method>,
    attributes: Vec<Attribute>,
    annotations: Vec<AnnotationEntryGen>,

    /// Where attributes lifted out of a parsed class file used to be
    placements: Vec<Placement>,

    observers: Observers<ClassGen>,
}

/// Attribute made from builder state when the class is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Synthesized {
    SourceFile,
    VisibleAnnotations,
    InvisibleAnnotations,
}

/// Position of a synthesized attribute in the class file the builder was read from
#[derive(Debug, Clone, Copy)]
struct Placement {
    kind: Synthesized,

    /// Number of kept attributes that came before it
    after_kept: usize,

    /// Index among all of the class file's attributes
    original_index: usize,
}

impl ClassGen {
    pub fn new(
        class_name: impl Into<String>,
        super_class_name: impl Into<String>,
        file_name: Option<String>,
        access_flags: ClassAccessFlags,
        interfaces: Vec<String>,
        constants: ConstantPoolGen,
    ) -> ClassGen {
        ClassGen {
            access_flags,
            class_name: class_name.into(),
            super_class_name: super_class_name.into(),
            file_name,
            version: Version::default(),
            constants,
            interfaces,
            fields: vec![],
            methods: vec![],
            attributes: vec![],
            annotations: vec![],
            placements: vec![],
            observers: Observers::default(),
        }
    }

    /// Start from an existing class file
    ///
    /// The class's constant pool is kept, so its methods and fields can be carried over as they
    /// are. `SourceFile` and annotation attributes are lifted out into the builder, and get put
    /// back in the same spot among the other attributes when the class is resolved.
    pub fn from_class_file(class_file: ClassFile) -> Result<ClassGen, Error> {
        let ClassFile {
            version,
            constants: pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        } = class_file;

        let class_name = pool.class_name(this_class)?.replace('/', ".");
        let super_class_name = match super_class {
            Some(super_class) => pool.class_name(super_class)?.replace('/', "."),
            None => String::from("java.lang.Object"),
        };
        let interfaces = interfaces
            .into_iter()
            .map(|interface| -> Result<String, Error> {
                Ok(pool.class_name(interface)?.replace('/', "."))
            })
            .collect::<Result<Vec<String>, Error>>()?;

        let mut file_name = None;
        let mut kept_attributes = vec![];
        let mut placements = vec![];
        for (original_index, attribute) in attributes.iter().enumerate() {
            let name = attribute.name(&pool)?;
            let kind = if name == SourceFile::NAME {
                let SourceFile(index) = attribute.decode::<SourceFile>()?;
                file_name = Some(pool.utf8(index)?.to_owned());
                Synthesized::SourceFile
            } else if name == RuntimeVisibleAnnotations::NAME {
                Synthesized::VisibleAnnotations
            } else if name == RuntimeInvisibleAnnotations::NAME {
                Synthesized::InvisibleAnnotations
            } else {
                kept_attributes.push(attribute.clone());
                continue;
            };
            placements.push(Placement {
                kind,
                after_kept: kept_attributes.len(),
                original_index,
            });
        }
        let annotations = read_annotations(&attributes, &pool)?;

        Ok(ClassGen {
            access_flags,
            class_name,
            super_class_name,
            file_name,
            version,
            constants: ConstantPoolGen::from_pool(&pool),
            interfaces,
            fields,
            methods,
            attributes: kept_attributes,
            annotations,
            placements,
            observers: Observers::default(),
        })
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn set_class_name(&mut self, class_name: impl Into<String>) {
        self.class_name = class_name.into();
    }

    pub fn super_class_name(&self) -> &str {
        &self.super_class_name
    }

    pub fn set_super_class_name(&mut self, super_class_name: impl Into<String>) {
        self.super_class_name = super_class_name.into();
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn set_file_name(&mut self, file_name: Option<String>) {
        self.file_name = file_name;
    }

    pub fn major(&self) -> u16 {
        self.version.major_version
    }

    pub fn set_major(&mut self, major_version: u16) {
        self.version.major_version = major_version;
    }

    pub fn minor(&self) -> u16 {
        self.version.minor_version
    }

    pub fn set_minor(&mut self, minor_version: u16) {
        self.version.minor_version = minor_version;
    }

    pub fn constant_pool(&self) -> &ConstantPoolGen {
        &self.constants
    }

    pub fn constant_pool_mut(&mut self) -> &mut ConstantPoolGen {
        &mut self.constants
    }

    /// Swap in a different constant pool, returning the old one
    ///
    /// Methods, fields, and attributes already added still point into the old pool.
    pub fn set_constant_pool(&mut self, constants: ConstantPoolGen) -> ConstantPoolGen {
        std::mem::replace(&mut self.constants, constants)
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    pub fn add_interface(&mut self, interface: impl Into<String>) {
        self.interfaces.push(interface.into());
    }

    pub fn remove_interface(&mut self, interface: &str) -> bool {
        match self.interfaces.iter().position(|name| name == interface) {
            Some(position) => {
                self.interfaces.remove(position);
                true
            }
            None => false,
        }
    }

    pub fn interface_names(&self) -> &[String] {
        &self.interfaces
    }

    /// Name and descriptor of a method or field in this class
    fn member_key(
        &self,
        name_index: Utf8ConstantIndex,
        descriptor_index: Utf8ConstantIndex,
    ) -> Result<MemberKey, Error> {
        Ok(MemberKey::new(
            self.constants.utf8(name_index)?,
            self.constants.utf8(descriptor_index)?,
        ))
    }

    pub fn add_method(&mut self, method: Method) {
        self.methods.push(method);
    }

    /// Build a method against this class's constant pool and add it
    pub fn add_method_gen(&mut self, method: &mut MethodGen) -> Result<(), Error> {
        let method = method.method(&mut self.constants)?;
        self.methods.push(method);
        Ok(())
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn set_methods(&mut self, methods: Vec<Method>) {
        self.methods = methods;
    }

    /// Find a method, comparing members with the given strategy
    pub fn find_method(
        &self,
        key: &MemberKey,
        comparator: &impl Comparator<MemberKey>,
    ) -> Result<Option<&Method>, Error> {
        for method in &self.methods {
            let method_key = self.member_key(method.name_index, method.descriptor_index)?;
            if comparator.equals(&method_key, key) {
                return Ok(Some(method));
            }
        }
        Ok(None)
    }

    /// Look up a method by name and descriptor
    pub fn containing_method(&self, name: &str, descriptor: &str) -> Result<Option<&Method>, Error> {
        self.find_method(&MemberKey::new(name, descriptor), &NameAndSignature)
    }

    /// Whether the class has a method with the same name and descriptor
    pub fn contains_method(&self, method: &Method) -> Result<bool, Error> {
        let key = self.member_key(method.name_index, method.descriptor_index)?;
        Ok(self.find_method(&key, &NameAndSignature)?.is_some())
    }

    /// Replace a method in place (or add the new one, if the old one is not there)
    pub fn replace_method(&mut self, old: &Method, new: Method) {
        match self.methods.iter().position(|method| method == old) {
            Some(position) => self.methods[position] = new,
            None => self.methods.push(new),
        }
    }

    pub fn remove_method(&mut self, method: &Method) -> bool {
        remove_first(&mut self.methods, method)
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Build a field against this class's constant pool and add it
    pub fn add_field_gen(&mut self, field: &FieldGen) -> Result<(), Error> {
        let field = field.field(&mut self.constants)?;
        self.fields.push(field);
        Ok(())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn set_fields(&mut self, fields: Vec<Field>) {
        self.fields = fields;
    }

    /// Find a field, comparing members with the given strategy
    pub fn find_field(
        &self,
        key: &MemberKey,
        comparator: &impl Comparator<MemberKey>,
    ) -> Result<Option<&Field>, Error> {
        for field in &self.fields {
            let field_key = self.member_key(field.name_index, field.descriptor_index)?;
            if comparator.equals(&field_key, key) {
                return Ok(Some(field));
            }
        }
        Ok(None)
    }

    /// Look up a field by name (fields can't be overloaded, so the descriptor is not needed)
    pub fn containing_field(&self, name: &str) -> Result<Option<&Field>, Error> {
        self.find_field(&MemberKey::new(name, ""), &NameOnly)
    }

    /// Whether the class has a field with the same name
    pub fn contains_field(&self, field: &Field) -> Result<bool, Error> {
        let name = self.constants.utf8(field.name_index)?;
        Ok(self.containing_field(name)?.is_some())
    }

    /// Replace a field in place (or add the new one, if the old one is not there)
    pub fn replace_field(&mut self, old: &Field, new: Field) {
        match self.fields.iter().position(|field| field == old) {
            Some(position) => self.fields[position] = new,
            None => self.fields.push(new),
        }
    }

    pub fn remove_field(&mut self, field: &Field) -> bool {
        remove_first(&mut self.fields, field)
    }

    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    pub fn remove_attribute(&mut self, attribute: &Attribute) -> bool {
        remove_first(&mut self.attributes, attribute)
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn add_annotation_entry(&mut self, annotation: AnnotationEntryGen) {
        self.annotations.push(annotation);
    }

    pub fn remove_annotation_entry(&mut self, annotation: &AnnotationEntryGen) -> bool {
        remove_first(&mut self.annotations, annotation)
    }

    pub fn annotation_entries(&self) -> &[AnnotationEntryGen] {
        &self.annotations
    }

    /// Add a no-argument constructor which just calls the superclass constructor
    pub fn add_empty_constructor(&mut self, access_flags: MethodAccessFlags) -> Result<(), Error> {
        let mut code = InstructionList::new();
        code.append(Instruction::ALoad(0));
        let super_init = InstructionFactory::new(&mut self.constants).create_invoke(
            &self.super_class_name,
            UnqualifiedName::INIT.as_str(),
            &Type::Void,
            &[],
            InvokeType::Special,
        )?;
        code.append(super_init);
        code.append(Instruction::Return);

        let mut constructor = MethodGen::new(
            access_flags,
            Type::Void,
            vec![],
            None,
            UnqualifiedName::INIT.as_str(),
            self.class_name.as_str(),
            code,
        )?;
        constructor.set_max_stack_to(1);
        self.add_method_gen(&mut constructor)
    }

    /// Interleave synthesized attributes with the kept ones
    ///
    /// Attributes that were lifted out of a parsed class file go back where they were. Otherwise
    /// `SourceFile` comes first and annotations come last.
    fn arrange_attributes(&self, synthesized: Vec<(Synthesized, Attribute)>) -> Vec<Attribute> {
        let kept_count = self.attributes.len();
        let mut placed: Vec<(usize, usize, usize, Attribute)> = synthesized
            .into_iter()
            .enumerate()
            .map(|(order, (kind, attribute))| {
                let placement = self.placements.iter().find(|placement| placement.kind == kind);
                let (after_kept, original_index) = match placement {
                    Some(placement) => {
                        (placement.after_kept.min(kept_count), placement.original_index)
                    }
                    None if kind == Synthesized::SourceFile => (0, usize::MAX),
                    None => (kept_count, usize::MAX),
                };
                (after_kept, original_index, order, attribute)
            })
            .collect();
        placed.sort_by_key(|(after_kept, original_index, order, _)| {
            (*after_kept, *original_index, *order)
        });

        let mut placed = placed.into_iter().peekable();
        let mut attributes = Vec::with_capacity(kept_count + placed.len());
        for (index, kept) in self.attributes.iter().enumerate() {
            while let Some((_, _, _, attribute)) = placed.next_if(|entry| entry.0 <= index) {
                attributes.push(attribute);
            }
            attributes.push(kept.clone());
        }
        attributes.extend(placed.map(|(_, _, _, attribute)| attribute));
        attributes
    }

    /// Resolve into a class file
    ///
    /// The `SourceFile` and annotation attributes only exist in the output, so building twice
    /// produces the same class.
    pub fn java_class(&mut self) -> Result<ClassFile, Error> {
        let this_class = self.constants.add_class(&self.class_name)?;
        let super_class = if self.class_name == "java.lang.Object" {
            None
        } else {
            Some(self.constants.add_class(&self.super_class_name)?)
        };
        let interfaces = self
            .interfaces
            .iter()
            .map(|interface| self.constants.add_class(interface))
            .collect::<Result<Vec<_>, _>>()?;

        let mut synthesized = vec![];
        if let Some(file_name) = &self.file_name {
            let source_file = SourceFile(self.constants.add_utf8(file_name.as_str())?);
            synthesized.push((
                Synthesized::SourceFile,
                self.constants.add_attribute(&source_file)?,
            ));
        }
        let (visible, invisible): (Vec<AnnotationEntryGen>, Vec<AnnotationEntryGen>) = self
            .annotations
            .iter()
            .cloned()
            .partition(|annotation| annotation.runtime_visible);
        for (kind, annotations) in [
            (Synthesized::VisibleAnnotations, visible),
            (Synthesized::InvisibleAnnotations, invisible),
        ] {
            for attribute in annotation_attributes(&annotations, &mut self.constants)? {
                synthesized.push((kind, attribute));
            }
        }
        let attributes = self.arrange_attributes(synthesized);

        log::debug!(
            "Built class {} ({} fields, {} methods, {} constants)",
            self.class_name,
            self.fields.len(),
            self.methods.len(),
            self.constants.len()
        );
        Ok(ClassFile {
            version: self.version,
            constants: self.constants.final_pool(),
            access_flags: self.access_flags,
            this_class,
            super_class,
            interfaces,
            fields: self.fields.clone(),
            methods: self.methods.clone(),
            attributes,
        })
    }

    pub fn add_observer(&mut self, observer: impl Observer<ClassGen> + 'static) -> ObserverId {
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

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::Code;
    use crate::jvm::{FieldAccessFlags, Literal};
    use std::cell::Cell;
    use std::rc::Rc;

    fn hello_class() -> ClassGen {
        ClassGen::new(
            "com.example.Hello",
            "java.lang.Object",
            Some(String::from("Hello.java")),
            ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            vec![String::from("java.lang.Runnable")],
            ConstantPoolGen::new(),
        )
    }

    #[test]
    fn empty_constructor() {
        let mut class = hello_class();
        class.add_empty_constructor(MethodAccessFlags::PUBLIC).unwrap();

        let constructor = class.containing_method("<init>", "()V").unwrap().unwrap();
        let code = constructor
            .attribute::<Code>(class.constant_pool())
            .unwrap()
            .unwrap();
        assert_eq!(code.max_stack, 1);
        assert_eq!(code.max_locals, 1);
        assert_eq!(code.code_array.0[0], 0x2A);
        assert_eq!(code.code_array.0[1], 0xB7);
        assert_eq!(code.code_array.0[4], 0xB1);
    }

    #[test]
    fn build_and_reload() {
        let mut class = hello_class();
        class.set_major(Version::JAVA8.major_version);
        class.set_minor(Version::JAVA8.minor_version);
        class.add_empty_constructor(MethodAccessFlags::PUBLIC).unwrap();

        let mut field = FieldGen::new(
            FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
            Type::INT,
            "ANSWER",
        )
        .unwrap();
        field.set_initial_value(Literal::Integer(42)).unwrap();
        class.add_field_gen(&field).unwrap();
        class.add_annotation_entry(AnnotationEntryGen::new("Ljava/lang/Deprecated;", true));

        let built = class.java_class().unwrap();
        assert_eq!(built.version, Version::JAVA8);
        assert_eq!(built.attributes.len(), 2);
        let SourceFile(file_name) = built.attribute::<SourceFile>().unwrap().unwrap();
        assert_eq!(built.constants.utf8(file_name).unwrap(), "Hello.java");

        let bytes = built.to_bytes().unwrap();
        let reloaded = ClassGen::from_class_file(ClassFile::parse(&bytes).unwrap()).unwrap();
        assert_eq!(reloaded.class_name(), "com.example.Hello");
        assert_eq!(reloaded.super_class_name(), "java.lang.Object");
        assert_eq!(reloaded.file_name(), Some("Hello.java"));
        assert_eq!(reloaded.interface_names(), &[String::from("java.lang.Runnable")]);
        assert_eq!(reloaded.annotation_entries(), class.annotation_entries());
        assert!(reloaded.attributes().is_empty());
        assert!(reloaded.containing_field("ANSWER").unwrap().is_some());

        let mut reloaded = reloaded;
        assert_eq!(reloaded.java_class().unwrap().to_bytes().unwrap(), bytes);
    }

    #[test]
    fn reloaded_attributes_keep_their_order() {
        let mut class = hello_class();
        let deprecated = Attribute {
            name_index: class.constant_pool_mut().add_utf8("Deprecated").unwrap(),
            info: vec![],
        };
        class.add_attribute(deprecated);
        class.add_annotation_entry(AnnotationEntryGen::new("Ljava/lang/Deprecated;", true));
        class.add_annotation_entry(AnnotationEntryGen::new("Lcom/example/Marker;", false));

        let mut built = class.java_class().unwrap();
        let names = |class_file: &ClassFile| -> Vec<String> {
            class_file
                .attributes
                .iter()
                .map(|attribute| attribute.name(&class_file.constants).unwrap().to_owned())
                .collect()
        };
        assert_eq!(
            names(&built),
            vec![
                "SourceFile",
                "Deprecated",
                "RuntimeVisibleAnnotations",
                "RuntimeInvisibleAnnotations"
            ]
        );

        // Annotations ahead of everything else, `SourceFile` last
        built.attributes.reverse();
        let bytes = built.to_bytes().unwrap();
        let mut reloaded = ClassGen::from_class_file(ClassFile::parse(&bytes).unwrap()).unwrap();
        assert_eq!(reloaded.attributes().len(), 1);
        assert_eq!(reloaded.annotation_entries().len(), 2);

        let rebuilt = reloaded.java_class().unwrap();
        assert_eq!(
            names(&rebuilt),
            vec![
                "RuntimeInvisibleAnnotations",
                "RuntimeVisibleAnnotations",
                "Deprecated",
                "SourceFile"
            ]
        );
        assert_eq!(rebuilt.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn methods_by_name_and_descriptor() {
        let mut class = hello_class();
        let mut code = InstructionList::new();
        code.append(Instruction::Return);
        let mut run = MethodGen::new(
            MethodAccessFlags::PUBLIC,
            Type::Void,
            vec![],
            None,
            "run",
            "com.example.Hello",
            code,
        )
        .unwrap();
        class.add_method_gen(&mut run).unwrap();
        let built = class.methods()[0].clone();
        assert!(class.contains_method(&built).unwrap());

        let overload = MemberKey::new("run", "(I)V");
        assert!(class
            .find_method(&overload, &NameAndSignature)
            .unwrap()
            .is_none());
        assert!(class
            .find_method(&overload, &NameOnly)
            .unwrap()
            .is_some());

        let mut replacement = built.clone();
        replacement.access_flags |= MethodAccessFlags::FINAL;
        class.replace_method(&built, replacement.clone());
        assert_eq!(class.methods(), &[replacement.clone()]);
        assert!(class.remove_method(&replacement));
        assert!(class.methods().is_empty());
    }

    #[test]
    fn interfaces_and_observers() {
        let mut class = hello_class();
        let notified = Rc::new(Cell::new(0));
        let counter = notified.clone();
        class.add_observer(move |class: &ClassGen| {
            counter.set(counter.get() + class.interface_names().len())
        });

        class.add_interface("java.io.Serializable");
        class.update();
        assert!(class.remove_interface("java.lang.Runnable"));
        assert!(!class.remove_interface("java.lang.Runnable"));
        class.update();
        assert_eq!(notified.get(), 3);
    }
}
