use crate::jvm::class_file::{
    Attribute, AttributeLike, ClassConstantIndex, Constant, ConstantIndex, ConstantLookup, ConstantPool,
    FieldRefConstantIndex, HandleKind, InvokeDynamicConstantIndex, MethodRefConstantIndex,
    MethodTypeConstantIndex, NameAndTypeConstantIndex, StringConstantIndex, Utf8ConstantIndex,
};
use crate::jvm::{BinaryName, ConstantPoolOverflow, Error, FieldType, RefType, RenderDescriptor};
use crate::util::{Offset, SlotError, SlotVec, Width};
use std::borrow::{Borrow, Cow};
use std::collections::HashMap;

/// Loadable constant values, as used for `ldc` and for the initial values of fields
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),

    /// Class literal, given as a binary name or an array descriptor
    Class(String),
}

/// Key under which constants (other than UTF-8 ones) are deduplicated
///
/// Floating point values are keyed by their bits so that `NaN` and `-0.0` deduplicate properly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ConstantKey {
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(Utf8ConstantIndex),
    String(Utf8ConstantIndex),
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),
    MethodRef(ClassConstantIndex, NameAndTypeConstantIndex, bool),
    NameAndType(Utf8ConstantIndex, Utf8ConstantIndex),
    MethodHandle(HandleKind, ConstantIndex),
    MethodType(Utf8ConstantIndex),
    Dynamic(u16, NameAndTypeConstantIndex),
    InvokeDynamic(u16, NameAndTypeConstantIndex),
    Module(Utf8ConstantIndex),
    Package(Utf8ConstantIndex),
}

impl ConstantKey {
    /// Key for a constant, or `None` for UTF-8 constants (which are keyed by their contents)
    fn of(constant: &Constant) -> Option<ConstantKey> {
        Some(match constant {
            Constant::Utf8(_) => return None,
            Constant::Integer(integer) => ConstantKey::Integer(*integer),
            Constant::Float(float) => ConstantKey::Float(float.to_bits()),
            Constant::Long(long) => ConstantKey::Long(*long),
            Constant::Double(double) => ConstantKey::Double(double.to_bits()),
            Constant::Class(name) => ConstantKey::Class(*name),
            Constant::String(string) => ConstantKey::String(*string),
            Constant::FieldRef(class, name_and_type) => {
                ConstantKey::FieldRef(*class, *name_and_type)
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => ConstantKey::MethodRef(*class, *name_and_type, *is_interface),
            Constant::NameAndType { name, descriptor } => {
                ConstantKey::NameAndType(*name, *descriptor)
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => ConstantKey::MethodHandle(*handle_kind, *member),
            Constant::MethodType { descriptor } => ConstantKey::MethodType(*descriptor),
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => ConstantKey::Dynamic(*bootstrap_method, *name_and_type),
            Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            } => ConstantKey::InvokeDynamic(*bootstrap_method, *method_descriptor),
            Constant::Module(name) => ConstantKey::Module(*name),
            Constant::Package(name) => ConstantKey::Package(*name),
        })
    }
}

/// Growable constant pool, which avoids adding the same constant twice
///
/// Every `add_*` method first checks whether an equal constant is already in the pool, and
/// returns its index if so. Constants are never removed, so indices handed out stay valid for the
/// lifetime of the pool.
#[derive(Debug, Clone)]
pub struct ConstantPoolGen {
    constants: SlotVec<Constant>,
    utf8s: HashMap<String, Utf8ConstantIndex>,
    keyed: HashMap<ConstantKey, ConstantIndex>,
}

impl Default for ConstantPoolGen {
    fn default() -> Self {
        ConstantPoolGen::new()
    }
}

impl ConstantPoolGen {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantPoolGen {
        ConstantPoolGen {
            constants: SlotVec::new_starting_at(Offset(1)),
            utf8s: HashMap::new(),
            keyed: HashMap::new(),
        }
    }

    /// Make a pool which starts out with all of the constants in an existing pool (at the same
    /// indices)
    pub fn from_pool(pool: &ConstantPool) -> ConstantPoolGen {
        let mut gen = ConstantPoolGen {
            constants: pool.constants().clone(),
            utf8s: HashMap::new(),
            keyed: HashMap::new(),
        };
        gen.reindex();
        gen
    }

    /// Rebuild the deduplication maps from scratch
    ///
    /// When a pool contains duplicates, the first one is the one that gets reused.
    fn reindex(&mut self) {
        self.utf8s.clear();
        self.keyed.clear();
        for (offset, constant) in &self.constants {
            let index = ConstantIndex(offset.0 as u16);
            match (constant, ConstantKey::of(constant)) {
                (Constant::Utf8(string), _) => {
                    self.utf8s
                        .entry(string.clone())
                        .or_insert(Utf8ConstantIndex(index));
                }
                (_, Some(key)) => {
                    self.keyed.entry(key).or_insert(index);
                }
                (_, None) => (),
            }
        }
    }

    /// Push a constant into the constant pool, provided there is space for it
    ///
    /// Note: the largest valid index is 65535, indexing starts at 1, and some constants take two
    /// spaces.
    fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, ConstantPoolOverflow> {
        // Compute the offset at which this constant will be inserted
        let offset = self.constants.offset_len().0;

        // Detect if the next constant would overflow the pool
        if offset + constant.width() > u16::MAX as usize {
            return Err(ConstantPoolOverflow { constant, offset });
        }

        self.constants.push(constant);
        Ok(ConstantIndex(offset as u16))
    }

    /// Look up a keyed constant, adding it if it isn't there yet
    fn add_keyed(&mut self, constant: Constant) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let key = match ConstantKey::of(&constant) {
            Some(key) => key,
            None => return self.push_constant(constant),
        };
        if let Some(idx) = self.keyed.get(&key) {
            Ok(*idx)
        } else {
            let idx = self.push_constant(constant)?;
            self.keyed.insert(key, idx);
            Ok(idx)
        }
    }

    /// Next free index in the pool (this is also the count written into the class file)
    pub fn size(&self) -> usize {
        self.constants.offset_len().0
    }

    /// Number of constants in the pool
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Get the constant at an index
    ///
    /// Panics if there is no constant starting at that index. Use `try_get_constant` when the
    /// index might not be valid.
    pub fn get_constant(&self, index: ConstantIndex) -> &Constant {
        self.try_get_constant(index)
            .unwrap_or_else(|| panic!("No constant at index {}", index.0))
    }

    /// Get the constant at an index, if there is one
    pub fn try_get_constant(&self, index: ConstantIndex) -> Option<&Constant> {
        self.constants.get(Offset(index.0 as usize))
    }

    /// Replace the constant at an index, returning the previous constant
    ///
    /// This is a low-level operation: nothing checks that references to the constant still make
    /// sense afterwards. The replacement must take up as many slots as the constant it replaces.
    pub fn set_constant(
        &mut self,
        index: ConstantIndex,
        constant: Constant,
    ) -> Result<Constant, Error> {
        match self.constants.replace(Offset(index.0 as usize), constant) {
            Ok(previous) => {
                self.reindex();
                Ok(previous)
            }
            Err(SlotError::WidthMismatch {
                replacement,
                existing,
            }) => Err(Error::NegativeOrInvalidArgument(format!(
                "Constant of width {} cannot replace constant of width {} at {}",
                replacement, existing, index.0
            ))),
            Err(SlotError::OutOfRange(_) | SlotError::Continuation(_)) => {
                Err(Error::MissingConstant(index))
            }
        }
    }

    /// Snapshot of the pool, sized exactly to the constants in it
    pub fn final_pool(&self) -> ConstantPool {
        ConstantPool::new(self.constants.clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConstantIndex, &Constant)> {
        self.constants
            .iter()
            .map(|(offset, constant)| (ConstantIndex(offset.0 as u16), constant))
    }

    /// Get or insert a utf8 constant from the constant pool
    pub fn add_utf8<'a, S: Into<Cow<'a, str>>>(
        &mut self,
        utf8: S,
    ) -> Result<Utf8ConstantIndex, ConstantPoolOverflow> {
        let cow = utf8.into();

        if let Some(idx) = self.utf8s.get::<str>(cow.borrow()) {
            Ok(*idx)
        } else {
            let owned = cow.into_owned();
            let constant = Constant::Utf8(owned.clone());
            let idx = Utf8ConstantIndex(self.push_constant(constant)?);
            self.utf8s.insert(owned, idx);
            Ok(idx)
        }
    }

    pub fn lookup_utf8(&self, utf8: &str) -> Option<Utf8ConstantIndex> {
        self.utf8s.get(utf8).copied()
    }

    /// Get or insert a class constant
    ///
    /// The name may be given in either the internal form (`java/lang/Object`) or the dotted form
    /// (`java.lang.Object`). Array classes are named by their descriptor (`[I`).
    pub fn add_class(&mut self, class_name: &str) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        let name = self.add_utf8(class_name.replace('.', "/"))?;
        self.add_keyed(Constant::Class(name)).map(ClassConstantIndex)
    }

    pub fn lookup_class(&self, class_name: &str) -> Option<ClassConstantIndex> {
        let name = self.lookup_utf8(&class_name.replace('.', "/"))?;
        self.keyed
            .get(&ConstantKey::Class(name))
            .copied()
            .map(ClassConstantIndex)
    }

    /// Get or insert a class constant for a reference type
    ///
    /// When making a `CONSTANT_Class_info`, reference types are almost always objects. However,
    /// there are a handful of places where an array type needs to be fit in (eg. for a
    /// `checkcast` to an array type). See section 4.4.1 for more.
    pub fn add_ref_type(
        &mut self,
        ref_type: &RefType<BinaryName>,
    ) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        match ref_type {
            RefType::Object(class) => self.add_class(class.as_ref()),
            other => self.add_class(&other.render()),
        }
    }

    /// Get or insert a class constant for an array type
    pub fn add_array_type(
        &mut self,
        element_type: &FieldType<BinaryName>,
        dimensions: usize,
    ) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        let mut descriptor = "[".repeat(dimensions);
        element_type.render_to(&mut descriptor);
        self.add_class(&descriptor)
    }

    /// Get or insert a string constant
    pub fn add_string(&mut self, string: &str) -> Result<StringConstantIndex, ConstantPoolOverflow> {
        let utf8 = self.add_utf8(string)?;
        self.add_keyed(Constant::String(utf8))
            .map(StringConstantIndex)
    }

    pub fn lookup_string(&self, string: &str) -> Option<StringConstantIndex> {
        let utf8 = self.lookup_utf8(string)?;
        self.keyed
            .get(&ConstantKey::String(utf8))
            .copied()
            .map(StringConstantIndex)
    }

    pub fn add_integer(&mut self, integer: i32) -> Result<ConstantIndex, ConstantPoolOverflow> {
        self.add_keyed(Constant::Integer(integer))
    }

    pub fn lookup_integer(&self, integer: i32) -> Option<ConstantIndex> {
        self.keyed.get(&ConstantKey::Integer(integer)).copied()
    }

    pub fn add_long(&mut self, long: i64) -> Result<ConstantIndex, ConstantPoolOverflow> {
        self.add_keyed(Constant::Long(long))
    }

    pub fn lookup_long(&self, long: i64) -> Option<ConstantIndex> {
        self.keyed.get(&ConstantKey::Long(long)).copied()
    }

    pub fn add_float(&mut self, float: f32) -> Result<ConstantIndex, ConstantPoolOverflow> {
        self.add_keyed(Constant::Float(float))
    }

    pub fn lookup_float(&self, float: f32) -> Option<ConstantIndex> {
        self.keyed.get(&ConstantKey::Float(float.to_bits())).copied()
    }

    pub fn add_double(&mut self, double: f64) -> Result<ConstantIndex, ConstantPoolOverflow> {
        self.add_keyed(Constant::Double(double))
    }

    pub fn lookup_double(&self, double: f64) -> Option<ConstantIndex> {
        self.keyed.get(&ConstantKey::Double(double.to_bits())).copied()
    }

    /// Get or insert a name and type constant
    pub fn add_name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> Result<NameAndTypeConstantIndex, ConstantPoolOverflow> {
        let name = self.add_utf8(name)?;
        let descriptor = self.add_utf8(descriptor)?;
        self.add_keyed(Constant::NameAndType { name, descriptor })
            .map(NameAndTypeConstantIndex)
    }

    pub fn lookup_name_and_type(
        &self,
        name: &str,
        descriptor: &str,
    ) -> Option<NameAndTypeConstantIndex> {
        let key = ConstantKey::NameAndType(self.lookup_utf8(name)?, self.lookup_utf8(descriptor)?);
        self.keyed.get(&key).copied().map(NameAndTypeConstantIndex)
    }

    /// Get or insert a field reference constant
    pub fn add_fieldref(
        &mut self,
        class_name: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<FieldRefConstantIndex, ConstantPoolOverflow> {
        let class = self.add_class(class_name)?;
        let name_and_type = self.add_name_and_type(name, descriptor)?;
        self.add_keyed(Constant::FieldRef(class, name_and_type))
            .map(FieldRefConstantIndex)
    }

    pub fn lookup_fieldref(
        &self,
        class_name: &str,
        name: &str,
        descriptor: &str,
    ) -> Option<FieldRefConstantIndex> {
        let class = self.lookup_class(class_name)?;
        let name_and_type = self.lookup_name_and_type(name, descriptor)?;
        self.keyed
            .get(&ConstantKey::FieldRef(class, name_and_type))
            .copied()
            .map(FieldRefConstantIndex)
    }

    fn add_any_methodref(
        &mut self,
        class_name: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<MethodRefConstantIndex, ConstantPoolOverflow> {
        let class = self.add_class(class_name)?;
        let name_and_type = self.add_name_and_type(name, descriptor)?;
        let constant = Constant::MethodRef {
            class,
            name_and_type,
            is_interface,
        };
        self.add_keyed(constant).map(MethodRefConstantIndex)
    }

    fn lookup_any_methodref(
        &self,
        class_name: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Option<MethodRefConstantIndex> {
        let class = self.lookup_class(class_name)?;
        let name_and_type = self.lookup_name_and_type(name, descriptor)?;
        self.keyed
            .get(&ConstantKey::MethodRef(class, name_and_type, is_interface))
            .copied()
            .map(MethodRefConstantIndex)
    }

    /// Get or insert a method reference constant (for a method on a class)
    pub fn add_methodref(
        &mut self,
        class_name: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<MethodRefConstantIndex, ConstantPoolOverflow> {
        self.add_any_methodref(class_name, name, descriptor, false)
    }

    pub fn lookup_methodref(
        &self,
        class_name: &str,
        name: &str,
        descriptor: &str,
    ) -> Option<MethodRefConstantIndex> {
        self.lookup_any_methodref(class_name, name, descriptor, false)
    }

    /// Get or insert a method reference constant (for a method on an interface)
    pub fn add_interface_methodref(
        &mut self,
        class_name: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<MethodRefConstantIndex, ConstantPoolOverflow> {
        self.add_any_methodref(class_name, name, descriptor, true)
    }

    pub fn lookup_interface_methodref(
        &self,
        class_name: &str,
        name: &str,
        descriptor: &str,
    ) -> Option<MethodRefConstantIndex> {
        self.lookup_any_methodref(class_name, name, descriptor, true)
    }

    /// Get or insert a method handle constant
    ///
    /// The member must be a field reference for the field handle kinds and a method reference
    /// otherwise.
    pub fn add_method_handle(
        &mut self,
        handle_kind: HandleKind,
        member: ConstantIndex,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        self.add_keyed(Constant::MethodHandle {
            handle_kind,
            member,
        })
    }

    /// Get or insert a method type constant
    pub fn add_method_type(
        &mut self,
        descriptor: &str,
    ) -> Result<MethodTypeConstantIndex, ConstantPoolOverflow> {
        let descriptor = self.add_utf8(descriptor)?;
        self.add_keyed(Constant::MethodType { descriptor })
            .map(MethodTypeConstantIndex)
    }

    pub fn lookup_method_type(&self, descriptor: &str) -> Option<MethodTypeConstantIndex> {
        let descriptor = self.lookup_utf8(descriptor)?;
        self.keyed
            .get(&ConstantKey::MethodType(descriptor))
            .copied()
            .map(MethodTypeConstantIndex)
    }

    /// Get or insert a dynamically-computed call site
    ///
    /// `bootstrap_method` is an index into the class' `BootstrapMethods` attribute.
    pub fn add_invoke_dynamic(
        &mut self,
        bootstrap_method: u16,
        name: &str,
        descriptor: &str,
    ) -> Result<InvokeDynamicConstantIndex, ConstantPoolOverflow> {
        let method_descriptor = self.add_name_and_type(name, descriptor)?;
        self.add_keyed(Constant::InvokeDynamic {
            bootstrap_method,
            method_descriptor,
        })
        .map(InvokeDynamicConstantIndex)
    }

    /// Get or insert a dynamically-computed constant
    pub fn add_dynamic(
        &mut self,
        bootstrap_method: u16,
        name: &str,
        descriptor: &str,
    ) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let name_and_type = self.add_name_and_type(name, descriptor)?;
        self.add_keyed(Constant::Dynamic {
            bootstrap_method,
            name_and_type,
        })
    }

    pub fn add_module(&mut self, name: &str) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let name = self.add_utf8(name)?;
        self.add_keyed(Constant::Module(name))
    }

    pub fn add_package(&mut self, name: &str) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let name = self.add_utf8(name)?;
        self.add_keyed(Constant::Package(name))
    }

    /// Get or insert the constant for a literal value
    pub fn add_literal(&mut self, literal: &Literal) -> Result<ConstantIndex, ConstantPoolOverflow> {
        match literal {
            Literal::Integer(integer) => self.add_integer(*integer),
            Literal::Long(long) => self.add_long(*long),
            Literal::Float(float) => self.add_float(*float),
            Literal::Double(double) => self.add_double(*double),
            Literal::String(string) => self.add_string(string).map(ConstantIndex::from),
            Literal::Class(class) => self.add_class(class).map(ConstantIndex::from),
        }
    }

    /// Serialize an attribute, adding its name to the pool
    pub fn add_attribute<A: AttributeLike>(&mut self, attribute: &A) -> Result<Attribute, Error> {
        let name_index = self.add_utf8(A::NAME)?;
        Ok(Attribute::from_attribute_like(name_index, attribute)?)
    }

    /// Copy a constant from another pool into this one, returning its index in this pool
    ///
    /// Constants referenced by the imported constant get imported too.
    pub fn import_constant(
        &mut self,
        index: ConstantIndex,
        from: &impl ConstantLookup,
    ) -> Result<ConstantIndex, Error> {
        let imported = match from.lookup(index)? {
            Constant::Utf8(string) => self.add_utf8(string.as_str())?.into(),
            Constant::Integer(integer) => self.add_integer(*integer)?,
            Constant::Float(float) => self.add_float(*float)?,
            Constant::Long(long) => self.add_long(*long)?,
            Constant::Double(double) => self.add_double(*double)?,
            Constant::Class(name) => self.add_class(from.utf8(*name)?)?.into(),
            Constant::String(string) => self.add_string(from.utf8(*string)?)?.into(),
            Constant::FieldRef(_, _) => {
                let member = from.member_ref(index)?;
                self.add_fieldref(member.class_name, member.name, member.descriptor)?
                    .into()
            }
            Constant::MethodRef { is_interface, .. } => {
                let member = from.member_ref(index)?;
                self.add_any_methodref(
                    member.class_name,
                    member.name,
                    member.descriptor,
                    *is_interface,
                )?
                .into()
            }
            Constant::NameAndType { name, descriptor } => self
                .add_name_and_type(from.utf8(*name)?, from.utf8(*descriptor)?)?
                .into(),
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                let member = self.import_constant(*member, from)?;
                self.add_method_handle(*handle_kind, member)?
            }
            Constant::MethodType { descriptor } => {
                self.add_method_type(from.utf8(*descriptor)?)?.into()
            }
            Constant::Dynamic {
                bootstrap_method, ..
            } => {
                let (name, descriptor) = from.dynamic_name_and_type(index)?;
                self.add_dynamic(*bootstrap_method, name, descriptor)?
            }
            Constant::InvokeDynamic {
                bootstrap_method, ..
            } => {
                let (name, descriptor) = from.dynamic_name_and_type(index)?;
                self.add_invoke_dynamic(*bootstrap_method, name, descriptor)?
                    .into()
            }
            Constant::Module(name) => self.add_module(from.utf8(*name)?)?,
            Constant::Package(name) => self.add_package(from.utf8(*name)?)?,
        };
        Ok(imported)
    }
}

impl ConstantLookup for ConstantPoolGen {
    fn constant(&self, index: ConstantIndex) -> Option<&Constant> {
        self.try_get_constant(index)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn adding_twice_is_idempotent() {
        let mut pool = ConstantPoolGen::new();
        let string = pool.add_string("hello").unwrap();
        let size = pool.size();
        assert_eq!(pool.add_string("hello").unwrap(), string);
        assert_eq!(pool.size(), size);

        let methodref = pool
            .add_methodref("java.lang.Object", "<init>", "()V")
            .unwrap();
        let size = pool.size();
        assert_eq!(
            pool.add_methodref("java/lang/Object", "<init>", "()V").unwrap(),
            methodref
        );
        assert_eq!(pool.size(), size);
        assert_ne!(
            ConstantIndex::from(
                pool.add_interface_methodref("java/lang/Object", "<init>", "()V")
                    .unwrap()
            ),
            ConstantIndex::from(methodref)
        );
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let mut pool = ConstantPoolGen::new();
        assert_eq!(pool.size(), 1);
        assert_eq!(pool.add_long(7).unwrap(), ConstantIndex(1));
        assert_eq!(pool.add_integer(7).unwrap(), ConstantIndex(3));
        assert_eq!(pool.add_double(0.5).unwrap(), ConstantIndex(4));
        assert_eq!(pool.size(), 6);
        assert_eq!(pool.try_get_constant(ConstantIndex(2)), None);
    }

    #[test]
    fn floats_dedupe_by_bits() {
        let mut pool = ConstantPoolGen::new();
        let nan = pool.add_float(f32::NAN).unwrap();
        assert_eq!(pool.add_float(f32::NAN).unwrap(), nan);
        let zero = pool.add_double(0.0).unwrap();
        let negative_zero = pool.add_double(-0.0).unwrap();
        assert_ne!(zero, negative_zero);
        assert_eq!(pool.lookup_double(-0.0), Some(negative_zero));
    }

    #[test]
    fn lookups_do_not_insert() {
        let mut pool = ConstantPoolGen::new();
        assert_eq!(pool.lookup_class("java/lang/String"), None);
        assert_eq!(pool.size(), 1);
        let class = pool.add_class("java.lang.String").unwrap();
        assert_eq!(pool.lookup_class("java/lang/String"), Some(class));
        assert_eq!(pool.class_name(class).unwrap(), "java/lang/String");
    }

    #[test]
    fn import_pulls_in_dependencies() {
        let mut source = ConstantPoolGen::new();
        let field = source
            .add_fieldref("com/example/Point", "x", "I")
            .unwrap();
        let handle = source
            .add_method_handle(HandleKind::GetField, field.into())
            .unwrap();
        let source = source.final_pool();

        let mut target = ConstantPoolGen::new();
        target.add_utf8("unrelated").unwrap();
        let imported = target.import_constant(handle, &source).unwrap();
        match target.get_constant(imported) {
            Constant::MethodHandle {
                handle_kind: HandleKind::GetField,
                member,
            } => {
                let member = target.member_ref(*member).unwrap();
                assert_eq!(member.class_name, "com/example/Point");
                assert_eq!(member.name, "x");
                assert_eq!(member.descriptor, "I");
            }
            other => panic!("unexpected constant {:?}", other),
        }
    }

    #[test]
    fn seeded_pool_dedupes_existing_entries() {
        let mut source = ConstantPoolGen::new();
        let class = source.add_class("java/lang/Object").unwrap();
        let long = source.add_long(-1).unwrap();

        let mut seeded = ConstantPoolGen::from_pool(&source.final_pool());
        assert_eq!(seeded.size(), source.size());
        assert_eq!(seeded.add_class("java/lang/Object").unwrap(), class);
        assert_eq!(seeded.add_long(-1).unwrap(), long);
        assert_eq!(seeded.size(), source.size());
    }

    #[test]
    fn replacing_constants() {
        let mut pool = ConstantPoolGen::new();
        let index = pool.add_integer(1).unwrap();
        assert_eq!(
            pool.set_constant(index, Constant::Integer(2)).unwrap(),
            Constant::Integer(1)
        );
        assert_eq!(pool.lookup_integer(1), None);
        assert_eq!(pool.lookup_integer(2), Some(index));
        assert!(pool.set_constant(index, Constant::Long(2)).is_err());
    }

    #[test]
    #[should_panic]
    fn get_constant_out_of_range() {
        let pool = ConstantPoolGen::new();
        pool.get_constant(ConstantIndex(3));
    }
}
