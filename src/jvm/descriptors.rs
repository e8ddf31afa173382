//! Field and method descriptors
//!
//! See section 4.3 of the JVM specification. Descriptors are parsed off the front of a string
//! with a [`DescriptorReader`], so that callers which need to know how much of the string was a
//! descriptor (eg. when walking the parameters of a method descriptor) get the consumed length
//! back directly.

use super::{BinaryName, Error, Name};
use crate::util::Width;

/// Conversion of descriptors into their string representations
pub trait RenderDescriptor {
    fn render(&self) -> String {
        let mut string = String::new();
        self.render_to(&mut string);
        string
    }

    /// Append the descriptor onto a string
    fn render_to(&self, write_to: &mut String);
}

/// Conversion of descriptors from their string representations
pub trait ParseDescriptor: Sized {
    /// Read one descriptor, advancing the reader past it
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error>;

    /// Parse a string which must be exactly one descriptor
    fn parse(source: &str) -> Result<Self, Error> {
        let mut reader = DescriptorReader::new(source);
        let parsed = Self::read(&mut reader)?;
        if !reader.is_done() {
            return Err(reader.error("unexpected leftover input"));
        }
        Ok(parsed)
    }

    /// Parse a descriptor off the front of a string, returning how many bytes it spans
    fn parse_prefix(source: &str) -> Result<(Self, usize), Error> {
        let mut reader = DescriptorReader::new(source);
        let parsed = Self::read(&mut reader)?;
        Ok((parsed, reader.position()))
    }
}

/// Cursor over the bytes of a descriptor
///
/// Descriptors are made of ASCII punctuation and letters, except for class names, which are read
/// out whole up to their terminating `;`. That means the cursor is always on a `char` boundary.
pub struct DescriptorReader<'a> {
    source: &'a str,
    position: usize,
}

impl<'a> DescriptorReader<'a> {
    pub fn new(source: &'a str) -> DescriptorReader<'a> {
        DescriptorReader {
            source,
            position: 0,
        }
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_done(&self) -> bool {
        self.position >= self.source.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.position).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let next = self.peek()?;
        self.position += 1;
        Some(next)
    }

    /// Consume the next byte if it is `expected`
    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: u8) -> Result<(), Error> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(match expected {
                b'(' => "expected '(' to open method parameters",
                b')' => "expected ')' to close method parameters",
                b'L' => "expected 'L' to start a class name",
                _ => "unexpected character",
            }))
        }
    }

    /// Read everything up to (and consume) a terminating `;`
    fn read_until_semicolon(&mut self) -> Result<&'a str, Error> {
        let rest = &self.source[self.position..];
        match rest.find(';') {
            Some(length) => {
                self.position += length + 1;
                Ok(&rest[..length])
            }
            None => Err(self.error("missing ';' after class name")),
        }
    }

    fn error(&self, message: &str) -> Error {
        Error::BadDescriptor(format!(
            "{} at offset {} of '{}'",
            message, self.position, self.source
        ))
    }
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

/// Descriptor character, Java name, and `newarray` code of every base type
static BASE_TYPES: [(BaseType, u8, &str, u8); 8] = [
    (BaseType::Byte, b'B', "byte", 8),
    (BaseType::Char, b'C', "char", 5),
    (BaseType::Double, b'D', "double", 7),
    (BaseType::Float, b'F', "float", 6),
    (BaseType::Int, b'I', "int", 10),
    (BaseType::Long, b'J', "long", 11),
    (BaseType::Short, b'S', "short", 9),
    (BaseType::Boolean, b'Z', "boolean", 4),
];

impl BaseType {
    fn entry(&self) -> &'static (BaseType, u8, &'static str, u8) {
        let index = match self {
            BaseType::Byte => 0,
            BaseType::Char => 1,
            BaseType::Double => 2,
            BaseType::Float => 3,
            BaseType::Int => 4,
            BaseType::Long => 5,
            BaseType::Short => 6,
            BaseType::Boolean => 7,
        };
        &BASE_TYPES[index]
    }

    pub fn descriptor_char(&self) -> char {
        self.entry().1 as char
    }

    pub fn from_descriptor_char(c: u8) -> Option<BaseType> {
        BASE_TYPES
            .iter()
            .find(|(_, descriptor, _, _)| *descriptor == c)
            .map(|(base_type, _, _, _)| *base_type)
    }

    /// Name of the type, as it appears in Java source
    pub fn java_name(&self) -> &'static str {
        self.entry().2
    }

    /// Types which are represented as `int` on the operand stack and in locals
    pub fn is_int_like(&self) -> bool {
        matches!(
            self,
            BaseType::Byte | BaseType::Char | BaseType::Int | BaseType::Short | BaseType::Boolean
        )
    }

    /// Type code used by the `newarray` instruction
    pub fn array_type_code(&self) -> u8 {
        self.entry().3
    }

    /// Inverse of `array_type_code`
    pub fn from_array_type_code(code: u8) -> Option<BaseType> {
        BASE_TYPES
            .iter()
            .find(|(_, _, _, array_code)| *array_code == code)
            .map(|(base_type, _, _, _)| *base_type)
    }
}

impl Width for BaseType {
    fn width(&self) -> usize {
        match self {
            BaseType::Double | BaseType::Long => 2,
            _ => 1,
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, write_to: &mut String) {
        write_to.push(self.descriptor_char());
    }
}

impl ParseDescriptor for BaseType {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error> {
        match reader.peek().and_then(BaseType::from_descriptor_char) {
            Some(base_type) => {
                reader.bump();
                Ok(base_type)
            }
            None if reader.is_done() => Err(reader.error("missing base type")),
            None => Err(reader.error("invalid base type")),
        }
    }
}

impl RenderDescriptor for BinaryName {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('L');
        write_to.push_str(self.as_str());
        write_to.push(';');
    }
}

impl ParseDescriptor for BinaryName {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error> {
        reader.expect(b'L')?;
        let start = reader.position();
        let name = reader.read_until_semicolon()?;
        BinaryName::from_string(name.to_owned()).map_err(|msg| {
            Error::BadDescriptor(format!("{} (class name starting at offset {})", msg, start))
        })
    }
}

/// Array type, split into its innermost element type and number of dimensions
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ArrayType<T> {
    /// Dimensions beyond the first (`A[]` has 0 additional dimensions, `A[][][][]` has 3)
    pub additional_dimensions: usize,

    /// Innermost element type (`A` for `A[][]`)
    pub element_type: T,
}

impl<T> ArrayType<T> {
    fn wrap(additional_dimensions: usize, element_type: T) -> ArrayType<T> {
        ArrayType {
            additional_dimensions,
            element_type,
        }
    }

    pub const fn dimensions(&self) -> usize {
        self.additional_dimensions + 1
    }

    /// Array type with one fewer dimension, or `None` if this is already one-dimensional
    fn peel(&self) -> Option<ArrayType<T>>
    where
        T: Clone,
    {
        match self.additional_dimensions {
            0 => None,
            n => Some(ArrayType {
                additional_dimensions: n - 1,
                element_type: self.element_type.clone(),
            }),
        }
    }
}

impl<T: RenderDescriptor> RenderDescriptor for ArrayType<T> {
    fn render_to(&self, write_to: &mut String) {
        write_to.extend(std::iter::repeat('[').take(self.dimensions()));
        self.element_type.render_to(write_to);
    }
}

/// Reference type
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum RefType<Class> {
    Object(Class),
    ObjectArray(ArrayType<Class>),
    PrimitiveArray(ArrayType<BaseType>),
}

impl<C> RefType<C> {
    /// Type of the elements, if this is an array type
    pub fn element_type(&self) -> Option<FieldType<C>>
    where
        C: Clone,
    {
        match self {
            RefType::Object(_) => None,
            RefType::PrimitiveArray(arr) => Some(match arr.peel() {
                None => FieldType::Base(arr.element_type),
                Some(inner) => FieldType::Ref(RefType::PrimitiveArray(inner)),
            }),
            RefType::ObjectArray(arr) => Some(match arr.peel() {
                None => FieldType::object(arr.element_type.clone()),
                Some(inner) => FieldType::Ref(RefType::ObjectArray(inner)),
            }),
        }
    }

    /// Number of array dimensions (0 for a non-array type)
    pub fn dimensions(&self) -> usize {
        match self {
            RefType::Object(_) => 0,
            RefType::PrimitiveArray(arr) => arr.dimensions(),
            RefType::ObjectArray(arr) => arr.dimensions(),
        }
    }

    /// Array type whose elements have the given type
    pub fn array(element: FieldType<C>) -> RefType<C> {
        match element {
            FieldType::Base(base) => RefType::PrimitiveArray(ArrayType::wrap(0, base)),
            FieldType::Ref(RefType::Object(class)) => {
                RefType::ObjectArray(ArrayType::wrap(0, class))
            }
            FieldType::Ref(RefType::PrimitiveArray(arr)) => RefType::PrimitiveArray(
                ArrayType::wrap(arr.additional_dimensions + 1, arr.element_type),
            ),
            FieldType::Ref(RefType::ObjectArray(arr)) => RefType::ObjectArray(ArrayType::wrap(
                arr.additional_dimensions + 1,
                arr.element_type,
            )),
        }
    }
}

impl<C: RenderDescriptor> RenderDescriptor for RefType<C> {
    fn render_to(&self, write_to: &mut String) {
        match self {
            RefType::Object(class) => class.render_to(write_to),
            RefType::PrimitiveArray(arr) => arr.render_to(write_to),
            RefType::ObjectArray(arr) => arr.render_to(write_to),
        }
    }
}

impl<C: ParseDescriptor> ParseDescriptor for RefType<C> {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error> {
        let mut dimensions = 0;
        while reader.eat(b'[') {
            dimensions += 1;
        }
        if dimensions > 255 {
            return Err(reader.error("array type has more than 255 dimensions"));
        }

        match (dimensions, reader.peek()) {
            (0, Some(b'L')) => Ok(RefType::Object(C::read(reader)?)),
            (0, _) => Err(reader.error("expected a class or array type")),
            (_, Some(b'L')) => Ok(RefType::ObjectArray(ArrayType {
                additional_dimensions: dimensions - 1,
                element_type: C::read(reader)?,
            })),
            (_, _) => Ok(RefType::PrimitiveArray(ArrayType {
                additional_dimensions: dimensions - 1,
                element_type: BaseType::read(reader)?,
            })),
        }
    }
}

/// Type of a class, instance, or local variable
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType<Class> {
    Base(BaseType),
    Ref(RefType<Class>),
}

impl<C> Width for FieldType<C> {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base_type) => base_type.width(),
            FieldType::Ref(_) => 1,
        }
    }
}

impl<C> FieldType<C> {
    pub fn array(field_type: FieldType<C>) -> FieldType<C> {
        FieldType::Ref(RefType::array(field_type))
    }

    pub const fn object(class_name: C) -> FieldType<C> {
        FieldType::Ref(RefType::Object(class_name))
    }

    pub const fn int() -> FieldType<C> {
        FieldType::Base(BaseType::Int)
    }

    pub const fn long() -> FieldType<C> {
        FieldType::Base(BaseType::Long)
    }

    pub const fn float() -> FieldType<C> {
        FieldType::Base(BaseType::Float)
    }

    pub const fn double() -> FieldType<C> {
        FieldType::Base(BaseType::Double)
    }

    pub const fn char() -> FieldType<C> {
        FieldType::Base(BaseType::Char)
    }

    pub const fn short() -> FieldType<C> {
        FieldType::Base(BaseType::Short)
    }

    pub const fn byte() -> FieldType<C> {
        FieldType::Base(BaseType::Byte)
    }

    pub const fn boolean() -> FieldType<C> {
        FieldType::Base(BaseType::Boolean)
    }
}

impl<C: RenderDescriptor> RenderDescriptor for FieldType<C> {
    fn render_to(&self, write_to: &mut String) {
        match self {
            FieldType::Base(base_type) => base_type.render_to(write_to),
            FieldType::Ref(ref_type) => ref_type.render_to(write_to),
        }
    }
}

impl<C: ParseDescriptor> ParseDescriptor for FieldType<C> {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error> {
        match reader.peek() {
            Some(b'L') | Some(b'[') => RefType::read(reader).map(FieldType::Ref),
            _ => BaseType::read(reader).map(FieldType::Base),
        }
    }
}

/// Signature of a method
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct MethodDescriptor<Class> {
    pub parameters: Vec<FieldType<Class>>,

    /// `None` is for `void`
    pub return_type: Option<FieldType<Class>>,
}

impl<C> MethodDescriptor<C> {
    /// Number of local variable slots the parameters take up (at most 255 in a valid method)
    pub fn parameter_length(&self, has_this_param: bool) -> usize {
        let this_length = if has_this_param { 1 } else { 0 };
        this_length + self.parameters.iter().map(Width::width).sum::<usize>()
    }
}

impl<C: RenderDescriptor> RenderDescriptor for MethodDescriptor<C> {
    fn render_to(&self, write_to: &mut String) {
        write_to.push('(');
        for parameter in &self.parameters {
            parameter.render_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(return_type) => return_type.render_to(write_to),
        }
    }
}

impl<C: ParseDescriptor> ParseDescriptor for MethodDescriptor<C> {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, Error> {
        reader.expect(b'(')?;
        let mut parameters = vec![];
        while !reader.eat(b')') {
            if reader.is_done() {
                return Err(reader.error("expected ')' to close method parameters"));
            }
            parameters.push(FieldType::read(reader)?);
        }
        let return_type = if reader.eat(b'V') {
            None
        } else {
            Some(FieldType::read(reader)?)
        };
        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    type FT = FieldType<BinaryName>;

    const INT: FT = FieldType::int();
    const LONG: FT = FieldType::long();
    const STRING: FT = FieldType::object(BinaryName::STRING);

    #[test]
    fn base_type_tables() {
        for c in "BCDFIJSZ".bytes() {
            let base_type = BaseType::from_descriptor_char(c).unwrap();
            assert_eq!(base_type.descriptor_char() as u8, c);
            assert_eq!(
                BaseType::from_array_type_code(base_type.array_type_code()),
                Some(base_type)
            );
        }
        assert_eq!(BaseType::from_descriptor_char(b'V'), None);
        assert_eq!(BaseType::Boolean.java_name(), "boolean");
        assert_eq!(BaseType::Int.array_type_code(), 10);
    }

    #[test]
    fn field_types() {
        let grid: FT = FieldType::array(FieldType::array(FieldType::boolean()));
        assert_eq!(grid.render(), "[[Z");
        assert_eq!(FT::parse("[[Z").unwrap(), grid);

        let names: FT = FieldType::array(STRING);
        assert_eq!(FT::parse("[Ljava/lang/String;").unwrap(), names);
        assert_eq!(FT::parse("Ljava/lang/String;").unwrap(), STRING);
    }

    #[test]
    fn method_descriptors() {
        let descriptor = MethodDescriptor {
            parameters: vec![LONG, FieldType::array(INT), STRING],
            return_type: None,
        };
        let rendered = "(J[ILjava/lang/String;)V";
        assert_eq!(descriptor.render(), rendered);
        assert_eq!(MethodDescriptor::parse(rendered).unwrap(), descriptor);
        assert_eq!(descriptor.parameter_length(true), 5);

        assert!(MethodDescriptor::<BinaryName>::parse("(I").is_err());
        assert!(MethodDescriptor::<BinaryName>::parse("I)V").is_err());
    }

    #[test]
    fn prefixes_report_consumed_length() {
        assert_eq!(FT::parse_prefix("JI").unwrap(), (LONG, 1));
        assert_eq!(
            FT::parse_prefix("[Ljava/lang/String;I").unwrap(),
            (FieldType::array(STRING), 19)
        );
        assert!(FT::parse_prefix("Ljava/lang/String").is_err());
        assert!(FT::parse("II").is_err());
        assert!(FT::parse("[").is_err());
    }

    #[test]
    fn array_element_types() {
        let matrix: FT = FieldType::array(FieldType::array(FieldType::double()));
        match matrix {
            FieldType::Ref(ref_type) => {
                assert_eq!(ref_type.dimensions(), 2);
                assert_eq!(
                    ref_type.element_type(),
                    Some(FieldType::array(FieldType::double()))
                );
            }
            FieldType::Base(_) => panic!("expected an array type"),
        }
        assert_eq!(RefType::Object(BinaryName::OBJECT).element_type(), None);
    }

    #[test]
    fn arrays_of_every_element_kind() {
        let ints = RefType::array(INT);
        let strings = RefType::array(STRING);
        assert_eq!(ints.render(), "[I");
        assert_eq!(strings.render(), "[Ljava/lang/String;");

        let int_grid = RefType::array(FieldType::Ref(ints));
        let string_grid = RefType::array(FieldType::Ref(strings));
        assert_eq!(int_grid.render(), "[[I");
        assert_eq!(string_grid.render(), "[[Ljava/lang/String;");
        assert_eq!(int_grid.dimensions(), 2);
        assert_eq!(string_grid.dimensions(), 2);
    }
}
