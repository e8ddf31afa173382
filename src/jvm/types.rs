use crate::jvm::{
    ArrayType, BaseType, BinaryName, ClassHierarchy, Error, FieldType, MethodDescriptor,
    ParseDescriptor, RefType, RenderDescriptor,
};
use crate::util::Width;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// Any type that can show up while generating code
///
/// Besides the types which have descriptors, this includes the types of things which only the
/// verifier knows about: `null`, return addresses pushed by `jsr`, and an unknown type.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Type {
    /// No value (only valid as a method return type)
    Void,

    /// Primitive or reference type
    Field(FieldType<BinaryName>),

    /// Type of the `null` reference
    Null,

    /// Return address pushed by `jsr`
    ReturnAddress,

    /// Placeholder for a type which isn't known
    Unknown,
}

impl Type {
    pub const BOOLEAN: Type = Type::Field(FieldType::boolean());
    pub const BYTE: Type = Type::Field(FieldType::byte());
    pub const CHAR: Type = Type::Field(FieldType::char());
    pub const SHORT: Type = Type::Field(FieldType::short());
    pub const INT: Type = Type::Field(FieldType::int());
    pub const LONG: Type = Type::Field(FieldType::long());
    pub const FLOAT: Type = Type::Field(FieldType::float());
    pub const DOUBLE: Type = Type::Field(FieldType::double());
    pub const OBJECT: Type = Type::Field(FieldType::object(BinaryName::OBJECT));
    pub const STRING: Type = Type::Field(FieldType::object(BinaryName::STRING));
    pub const THROWABLE: Type = Type::Field(FieldType::object(BinaryName::THROWABLE));

    /// Object type of a class or interface
    pub const fn object(class: BinaryName) -> Type {
        Type::Field(FieldType::object(class))
    }

    /// Array with elements of the given type
    ///
    /// Fails when `dimensions` is zero or when the element type is not a field type.
    pub fn array(element_type: Type, dimensions: usize) -> Result<Type, Error> {
        let mut field_type = match element_type {
            Type::Field(field_type) => field_type,
            other => return Err(Error::BadDescriptor(format!("{} array", other))),
        };
        if dimensions == 0 {
            return Err(Error::InvalidDimensions(dimensions));
        }
        for _ in 0..dimensions {
            field_type = FieldType::array(field_type);
        }
        Ok(Type::Field(field_type))
    }

    /// Number of local variable or operand stack slots taken up by a value of this type
    pub fn size(&self) -> usize {
        match self {
            Type::Void => 0,
            Type::Field(field_type) => field_type.width(),
            Type::Null | Type::ReturnAddress | Type::Unknown => 1,
        }
    }

    /// Descriptor string of the type
    ///
    /// Types without descriptors render as a description in angle brackets.
    pub fn signature(&self) -> String {
        match self {
            Type::Void => String::from("V"),
            Type::Field(field_type) => field_type.render(),
            Type::Null => String::from("<null object>"),
            Type::ReturnAddress => String::from("<return address>"),
            Type::Unknown => String::from("<unknown object>"),
        }
    }

    /// Parse a type from a complete descriptor string
    pub fn from_signature(signature: &str) -> Result<Type, Error> {
        match Type::parse_prefix(signature)? {
            (typ, consumed) if consumed == signature.len() => Ok(typ),
            _ => Err(Error::BadDescriptor(format!(
                "Unexpected leftover input in '{}'",
                signature
            ))),
        }
    }

    /// Parse a type off the front of a descriptor, also returning how many bytes were consumed
    pub fn parse_prefix(signature: &str) -> Result<(Type, usize), Error> {
        if signature.starts_with('V') {
            return Ok((Type::Void, 1));
        }
        let (field_type, consumed) = FieldType::parse_prefix(signature)?;
        Ok((Type::Field(field_type), consumed))
    }

    /// Types of the arguments in a method descriptor
    pub fn argument_types(signature: &str) -> Result<Vec<Type>, Error> {
        let descriptor = parse_method_descriptor(signature)?;
        Ok(descriptor.parameters.into_iter().map(Type::Field).collect())
    }

    /// Return type in a method descriptor
    pub fn return_type(signature: &str) -> Result<Type, Error> {
        let descriptor = parse_method_descriptor(signature)?;
        Ok(Type::from_return(descriptor.return_type))
    }

    /// Number of slots taken up by the arguments in a method descriptor
    pub fn argument_types_size(signature: &str) -> Result<usize, Error> {
        Ok(parse_method_descriptor(signature)?.parameter_length(false))
    }

    /// Number of slots taken up by the return value in a method descriptor
    pub fn return_type_size(signature: &str) -> Result<usize, Error> {
        Ok(Type::return_type(signature)?.size())
    }

    /// Render a method descriptor from its parts
    pub fn method_signature(return_type: &Type, argument_types: &[Type]) -> String {
        let mut signature = String::from("(");
        for argument_type in argument_types {
            signature.push_str(&argument_type.signature());
        }
        signature.push(')');
        signature.push_str(&return_type.signature());
        signature
    }

    fn from_return(return_type: Option<FieldType<BinaryName>>) -> Type {
        match return_type {
            None => Type::Void,
            Some(field_type) => Type::Field(field_type),
        }
    }

    pub fn as_field_type(&self) -> Option<&FieldType<BinaryName>> {
        match self {
            Type::Field(field_type) => Some(field_type),
            _ => None,
        }
    }

    pub fn as_ref_type(&self) -> Option<&RefType<BinaryName>> {
        match self {
            Type::Field(FieldType::Ref(ref_type)) => Some(ref_type),
            _ => None,
        }
    }

    pub fn base_type(&self) -> Option<BaseType> {
        match self {
            Type::Field(FieldType::Base(base_type)) => Some(*base_type),
            _ => None,
        }
    }

    /// Is this an object, array, or the null type?
    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Field(FieldType::Ref(_)) | Type::Null)
    }

    /// Is the value represented as an `int` on the operand stack?
    pub fn is_int_like(&self) -> bool {
        matches!(self.base_type(), Some(base_type) if base_type.is_int_like())
    }

    /// Can a value of this type be stored into a location of the target type without a cast?
    ///
    /// Primitive types are only assignable to themselves. For references, this follows the
    /// rules of the JVM specification: `null` is assignable to any reference, arrays are
    /// assignable to `Object`, `Cloneable`, and `Serializable`, and arrays of references are
    /// covariant in their element type.
    pub fn is_assignment_compatible_with(
        &self,
        target: &Type,
        hierarchy: &impl ClassHierarchy,
    ) -> Result<bool, Error> {
        match (self, target) {
            (Type::Null, target) => Ok(target.is_reference()),
            (Type::Field(FieldType::Ref(source)), Type::Field(FieldType::Ref(target))) => {
                is_ref_assignable(source, target, hierarchy)
            }
            (source, target) => Ok(source == target),
        }
    }

    /// Can a value of this type be cast to the target type with `checkcast`, with some chance of
    /// the cast succeeding?
    ///
    /// Upcasts and downcasts are both castable. Casts involving interfaces are allowed whenever
    /// the other side is not an array, since some subclass might implement the interface.
    pub fn is_castable_to(
        &self,
        target: &Type,
        hierarchy: &impl ClassHierarchy,
    ) -> Result<bool, Error> {
        match (self, target) {
            (Type::Null, target) => Ok(target.is_reference()),
            (Type::Field(FieldType::Ref(source)), Type::Field(FieldType::Ref(target))) => {
                is_ref_castable(source, target, hierarchy)
            }
            (source, target) => Ok(source == target),
        }
    }
}

impl From<FieldType<BinaryName>> for Type {
    fn from(field_type: FieldType<BinaryName>) -> Type {
        Type::Field(field_type)
    }
}

impl From<BaseType> for Type {
    fn from(base_type: BaseType) -> Type {
        Type::Field(FieldType::Base(base_type))
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Void => f.write_str("void"),
            Type::Field(FieldType::Base(base_type)) => f.write_str(base_type.java_name()),
            Type::Field(FieldType::Ref(RefType::Object(class))) => {
                f.write_str(&class.to_dotted())
            }
            Type::Field(FieldType::Ref(RefType::PrimitiveArray(arr))) => {
                f.write_str(arr.element_type.java_name())?;
                write_dimensions(f, arr.dimensions())
            }
            Type::Field(FieldType::Ref(RefType::ObjectArray(arr))) => {
                f.write_str(&arr.element_type.to_dotted())?;
                write_dimensions(f, arr.dimensions())
            }
            Type::Null => f.write_str("<null object>"),
            Type::ReturnAddress => f.write_str("<return address>"),
            Type::Unknown => f.write_str("<unknown object>"),
        }
    }
}

fn write_dimensions(f: &mut Formatter<'_>, dimensions: usize) -> std::fmt::Result {
    for _ in 0..dimensions {
        f.write_str("[]")?;
    }
    Ok(())
}

fn parse_method_descriptor(signature: &str) -> Result<MethodDescriptor<BinaryName>, Error> {
    MethodDescriptor::parse(signature)
}

/// Reference assignability, matching the semantics of the prolog predicate
/// `isJavaAssignable(sub_type, super_type)` in the JVM verifier specification.
fn is_ref_assignable(
    source: &RefType<BinaryName>,
    target: &RefType<BinaryName>,
    hierarchy: &impl ClassHierarchy,
) -> Result<bool, Error> {
    Ok(match (source, target) {
        // Special superclass and interfaces of all arrays
        (RefType::PrimitiveArray(_) | RefType::ObjectArray(_), RefType::Object(object_type)) => {
            is_array_type_assignable(object_type)
        }

        // Primitive arrays must match in dimension and type
        (RefType::PrimitiveArray(arr1), RefType::PrimitiveArray(arr2)) => arr1 == arr2,

        // Higher dimensional primitive arrays can be subtypes of object arrays
        (RefType::PrimitiveArray(arr1), RefType::ObjectArray(arr2)) => {
            match arr1.additional_dimensions.cmp(&arr2.additional_dimensions) {
                Ordering::Less | Ordering::Equal => false,
                Ordering::Greater => is_array_type_assignable(&arr2.element_type),
            }
        }

        // Cursed (unsound) covariance of arrays
        (RefType::ObjectArray(arr1), RefType::ObjectArray(arr2)) => {
            match arr1.additional_dimensions.cmp(&arr2.additional_dimensions) {
                Ordering::Less => false,
                Ordering::Equal => hierarchy.is_subtype(&arr1.element_type, &arr2.element_type)?,
                Ordering::Greater => is_array_type_assignable(&arr2.element_type),
            }
        }

        // Object-to-object assignability holds if there is a path through super type edges
        (RefType::Object(cls1), RefType::Object(cls2)) => hierarchy.is_subtype(cls1, cls2)?,

        _ => false,
    })
}

fn is_ref_castable(
    source: &RefType<BinaryName>,
    target: &RefType<BinaryName>,
    hierarchy: &impl ClassHierarchy,
) -> Result<bool, Error> {
    if is_ref_assignable(source, target, hierarchy)? || is_ref_assignable(target, source, hierarchy)?
    {
        return Ok(true);
    }
    Ok(match (source, target) {
        (RefType::Object(cls1), RefType::Object(cls2)) => {
            hierarchy.is_interface(cls1)? || hierarchy.is_interface(cls2)?
        }
        (RefType::ObjectArray(arr1), RefType::ObjectArray(arr2))
            if arr1.additional_dimensions == arr2.additional_dimensions =>
        {
            let element = |arr: &ArrayType<BinaryName>| RefType::Object(arr.element_type.clone());
            is_ref_castable(&element(arr1), &element(arr2), hierarchy)?
        }
        _ => false,
    })
}

/// Check if arrays can be assigned to a super type
///
/// This bakes in knowledge of the small, finite set of super types arrays have.
fn is_array_type_assignable(super_type: &BinaryName) -> bool {
    super_type == &BinaryName::OBJECT
        || super_type == &BinaryName::CLONEABLE
        || super_type == &BinaryName::SERIALIZABLE
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{MapClassHierarchy, Name};

    fn name(s: &str) -> BinaryName {
        BinaryName::from_string(s.to_owned()).unwrap()
    }

    #[test]
    fn sizes() {
        assert_eq!(Type::Void.size(), 0);
        assert_eq!(Type::INT.size(), 1);
        assert_eq!(Type::LONG.size(), 2);
        assert_eq!(Type::DOUBLE.size(), 2);
        assert_eq!(Type::STRING.size(), 1);
        assert_eq!(Type::Null.size(), 1);
    }

    #[test]
    fn method_signatures() {
        let sig = "(IJ[Ljava/lang/String;)D";
        assert_eq!(
            Type::argument_types(sig).unwrap(),
            vec![
                Type::INT,
                Type::LONG,
                Type::array(Type::STRING, 1).unwrap()
            ]
        );
        assert_eq!(Type::return_type(sig).unwrap(), Type::DOUBLE);
        assert_eq!(Type::argument_types_size(sig).unwrap(), 4);
        assert_eq!(Type::return_type_size(sig).unwrap(), 2);
        assert_eq!(Type::return_type_size("()V").unwrap(), 0);

        let rebuilt = Type::method_signature(
            &Type::DOUBLE,
            &Type::argument_types(sig).unwrap(),
        );
        assert_eq!(rebuilt, sig);
        assert!(Type::argument_types("(I").is_err());
    }

    #[test]
    fn parse_prefix_consumed() {
        assert_eq!(Type::parse_prefix("VI").unwrap(), (Type::Void, 1));
        assert_eq!(
            Type::parse_prefix("Ljava/lang/Object;II").unwrap(),
            (Type::OBJECT, 18)
        );
        assert_eq!(Type::from_signature("[[I").unwrap().signature(), "[[I");
        assert!(Type::from_signature("II").is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Type::INT.to_string(), "int");
        assert_eq!(Type::STRING.to_string(), "java.lang.String");
        assert_eq!(Type::array(Type::INT, 2).unwrap().to_string(), "int[][]");
    }

    #[test]
    fn assignability() {
        let hierarchy = MapClassHierarchy::with_java_lang();
        let string_array = Type::array(Type::STRING, 1).unwrap();
        let object_array = Type::array(Type::OBJECT, 1).unwrap();
        let int_array = Type::array(Type::INT, 1).unwrap();
        let serializable = Type::object(BinaryName::SERIALIZABLE);

        let assignable = |from: &Type, to: &Type| {
            from.is_assignment_compatible_with(to, &hierarchy).unwrap()
        };

        assert!(assignable(&Type::Null, &Type::STRING));
        assert!(!assignable(&Type::Null, &Type::INT));
        assert!(assignable(&Type::INT, &Type::INT));
        assert!(!assignable(&Type::INT, &Type::LONG));
        assert!(assignable(&Type::STRING, &Type::OBJECT));
        assert!(!assignable(&Type::OBJECT, &Type::STRING));
        assert!(assignable(&string_array, &object_array));
        assert!(!assignable(&object_array, &string_array));
        assert!(assignable(&int_array, &Type::OBJECT));
        assert!(assignable(&int_array, &serializable));
        assert!(!assignable(&int_array, &object_array));
        assert!(assignable(
            &Type::array(Type::INT, 2).unwrap(),
            &object_array
        ));
    }

    #[test]
    fn castability() {
        let mut hierarchy = MapClassHierarchy::with_java_lang();
        hierarchy.insert_interface(name("java/lang/Runnable"), vec![]);
        let runnable = Type::object(name("java/lang/Runnable"));

        let castable =
            |from: &Type, to: &Type| from.is_castable_to(to, &hierarchy).unwrap();

        assert!(castable(&Type::OBJECT, &Type::STRING));
        assert!(castable(&Type::STRING, &Type::OBJECT));
        assert!(castable(&Type::THROWABLE, &runnable));
        assert!(!castable(&Type::STRING, &Type::THROWABLE));
        assert!(!castable(&Type::array(Type::INT, 1).unwrap(), &Type::STRING));
    }
}
