use crate::jvm::class_file::{
    Attribute, AttributeLike, Constant, ConstantIndex, ConstantLookup, Deserialize, Serialize,
    Utf8ConstantIndex,
};
use crate::jvm::{ConstantPoolGen, Error};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};

/// Annotation as it appears in a class file
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.16
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Field descriptor of the annotation interface (eg. `Ljava/lang/Deprecated;`)
    pub type_index: Utf8ConstantIndex,
    pub element_value_pairs: Vec<ElementValuePair>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementValuePair {
    pub name_index: Utf8ConstantIndex,
    pub value: ElementValue,
}

/// Value of an annotation element, as it appears in a class file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementValue {
    /// Primitive or string constant (`tag` is one of `BCDFIJSZs`)
    Const { tag: u8, value: ConstantIndex },

    /// Enum constant
    Enum {
        type_name: Utf8ConstantIndex,
        const_name: Utf8ConstantIndex,
    },

    /// Class literal, stored as a return descriptor (eg. `Ljava/lang/Object;` or `V`)
    Class(Utf8ConstantIndex),

    Annotation(Annotation),

    Array(Vec<ElementValue>),
}

impl Serialize for Annotation {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> IoResult<()> {
        self.type_index.serialize(writer)?;
        self.element_value_pairs.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Annotation {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> IoResult<Self> {
        Ok(Annotation {
            type_index: Utf8ConstantIndex::deserialize(reader)?,
            element_value_pairs: Vec::deserialize(reader)?,
        })
    }
}

impl Serialize for ElementValuePair {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> IoResult<()> {
        self.name_index.serialize(writer)?;
        self.value.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ElementValuePair {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> IoResult<Self> {
        Ok(ElementValuePair {
            name_index: Utf8ConstantIndex::deserialize(reader)?,
            value: ElementValue::deserialize(reader)?,
        })
    }
}

impl ElementValue {
    pub fn tag(&self) -> u8 {
        match self {
            ElementValue::Const { tag, .. } => *tag,
            ElementValue::Enum { .. } => b'e',
            ElementValue::Class(_) => b'c',
            ElementValue::Annotation(_) => b'@',
            ElementValue::Array(_) => b'[',
        }
    }
}

impl Serialize for ElementValue {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> IoResult<()> {
        self.tag().serialize(writer)?;
        match self {
            ElementValue::Const { value, .. } => value.serialize(writer),
            ElementValue::Enum {
                type_name,
                const_name,
            } => {
                type_name.serialize(writer)?;
                const_name.serialize(writer)
            }
            ElementValue::Class(class_info) => class_info.serialize(writer),
            ElementValue::Annotation(annotation) => annotation.serialize(writer),
            ElementValue::Array(values) => values.serialize(writer),
        }
    }
}

impl Deserialize for ElementValue {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> IoResult<Self> {
        let tag = u8::deserialize(reader)?;
        Ok(match tag {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => ElementValue::Const {
                tag,
                value: ConstantIndex::deserialize(reader)?,
            },
            b'e' => ElementValue::Enum {
                type_name: Utf8ConstantIndex::deserialize(reader)?,
                const_name: Utf8ConstantIndex::deserialize(reader)?,
            },
            b'c' => ElementValue::Class(Utf8ConstantIndex::deserialize(reader)?),
            b'@' => ElementValue::Annotation(Annotation::deserialize(reader)?),
            b'[' => ElementValue::Array(Vec::deserialize(reader)?),
            other => {
                let msg = format!("Unknown element value tag {:#04x}", other);
                return Err(IoError::new(ErrorKind::InvalidData, msg));
            }
        })
    }
}

macro_rules! annotations_attribute {
    ($(#[$doc:meta])* $name:ident = $attribute_name:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(pub Vec<Annotation>);

        impl AttributeLike for $name {
            const NAME: &'static str = $attribute_name;
        }

        impl Serialize for $name {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> IoResult<()> {
                self.0.serialize(writer)
            }
        }

        impl Deserialize for $name {
            fn deserialize<R: ReadBytesExt>(reader: &mut R) -> IoResult<Self> {
                Ok($name(Vec::deserialize(reader)?))
            }
        }
    };
}

macro_rules! parameter_annotations_attribute {
    ($(#[$doc:meta])* $name:ident = $attribute_name:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(pub Vec<Vec<Annotation>>);

        impl AttributeLike for $name {
            const NAME: &'static str = $attribute_name;
        }

        /// The parameter count is a single byte
        impl Serialize for $name {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> IoResult<()> {
                let count = u8::try_from(self.0.len()).map_err(|_| {
                    let msg = format!("{} parameters cannot be annotated", self.0.len());
                    IoError::new(ErrorKind::InvalidInput, msg)
                })?;
                count.serialize(writer)?;
                for annotations in &self.0 {
                    annotations.serialize(writer)?;
                }
                Ok(())
            }
        }

        impl Deserialize for $name {
            fn deserialize<R: ReadBytesExt>(reader: &mut R) -> IoResult<Self> {
                let count = u8::deserialize(reader)?;
                let mut parameters = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    parameters.push(Vec::deserialize(reader)?);
                }
                Ok($name(parameters))
            }
        }
    };
}

annotations_attribute!(
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.16
    RuntimeVisibleAnnotations = "RuntimeVisibleAnnotations"
);
annotations_attribute!(
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.17
    RuntimeInvisibleAnnotations = "RuntimeInvisibleAnnotations"
);
parameter_annotations_attribute!(
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.18
    RuntimeVisibleParameterAnnotations = "RuntimeVisibleParameterAnnotations"
);
parameter_annotations_attribute!(
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.19
    RuntimeInvisibleParameterAnnotations = "RuntimeInvisibleParameterAnnotations"
);

/// Is this the name of one of the attributes annotations get stored in?
pub fn is_annotation_attribute(name: &str) -> bool {
    name == RuntimeVisibleAnnotations::NAME
        || name == RuntimeInvisibleAnnotations::NAME
        || name == RuntimeVisibleParameterAnnotations::NAME
        || name == RuntimeInvisibleParameterAnnotations::NAME
}

/// Value of an annotation element, before it gets put in a constant pool
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValueGen {
    Byte(i8),
    Char(u16),
    Double(f64),
    Float(f32),
    Int(i32),
    Long(i64),
    Short(i16),
    Boolean(bool),
    String(String),

    /// Enum constant, with the enum type as a field descriptor
    Enum {
        type_name: String,
        const_name: String,
    },

    /// Class literal, as a return descriptor
    Class(String),

    Annotation(AnnotationEntryGen),

    Array(Vec<ElementValueGen>),
}

impl ElementValueGen {
    pub fn tag(&self) -> u8 {
        match self {
            ElementValueGen::Byte(_) => b'B',
            ElementValueGen::Char(_) => b'C',
            ElementValueGen::Double(_) => b'D',
            ElementValueGen::Float(_) => b'F',
            ElementValueGen::Int(_) => b'I',
            ElementValueGen::Long(_) => b'J',
            ElementValueGen::Short(_) => b'S',
            ElementValueGen::Boolean(_) => b'Z',
            ElementValueGen::String(_) => b's',
            ElementValueGen::Enum { .. } => b'e',
            ElementValueGen::Class(_) => b'c',
            ElementValueGen::Annotation(_) => b'@',
            ElementValueGen::Array(_) => b'[',
        }
    }

    /// Add whatever constants the value needs to the pool
    ///
    /// Strings are stored as `Utf8` constants (not `String` constants), and all of the `int`-like
    /// primitives as `Integer` constants.
    pub fn resolve(&self, constants: &mut ConstantPoolGen) -> Result<ElementValue, Error> {
        let tag = self.tag();
        let value = match self {
            ElementValueGen::Byte(byte) => constants.add_integer(*byte as i32)?,
            ElementValueGen::Char(char) => constants.add_integer(*char as i32)?,
            ElementValueGen::Short(short) => constants.add_integer(*short as i32)?,
            ElementValueGen::Int(int) => constants.add_integer(*int)?,
            ElementValueGen::Boolean(boolean) => constants.add_integer(*boolean as i32)?,
            ElementValueGen::Long(long) => constants.add_long(*long)?,
            ElementValueGen::Float(float) => constants.add_float(*float)?,
            ElementValueGen::Double(double) => constants.add_double(*double)?,
            ElementValueGen::String(string) => constants.add_utf8(string.as_str())?.into(),
            ElementValueGen::Enum {
                type_name,
                const_name,
            } => {
                return Ok(ElementValue::Enum {
                    type_name: constants.add_utf8(type_name.as_str())?,
                    const_name: constants.add_utf8(const_name.as_str())?,
                })
            }
            ElementValueGen::Class(class) => {
                return Ok(ElementValue::Class(constants.add_utf8(class.as_str())?))
            }
            ElementValueGen::Annotation(annotation) => {
                return Ok(ElementValue::Annotation(annotation.annotation(constants)?))
            }
            ElementValueGen::Array(values) => {
                return Ok(ElementValue::Array(
                    values
                        .iter()
                        .map(|value| value.resolve(constants))
                        .collect::<Result<_, _>>()?,
                ))
            }
        };
        Ok(ElementValue::Const { tag, value })
    }

    /// Read a value back out of a class file
    pub fn from_element_value(
        value: &ElementValue,
        constants: &impl ConstantLookup,
    ) -> Result<ElementValueGen, Error> {
        Ok(match value {
            ElementValue::Const { tag: b's', value } => {
                ElementValueGen::String(constants.utf8(Utf8ConstantIndex(*value))?.to_owned())
            }
            ElementValue::Const { tag, value } => {
                let unexpected = |expected| Error::UnexpectedConstant {
                    index: *value,
                    expected,
                };
                match (*tag, constants.lookup(*value)?) {
                    (b'B', Constant::Integer(int)) => ElementValueGen::Byte(*int as i8),
                    (b'C', Constant::Integer(int)) => ElementValueGen::Char(*int as u16),
                    (b'S', Constant::Integer(int)) => ElementValueGen::Short(*int as i16),
                    (b'Z', Constant::Integer(int)) => ElementValueGen::Boolean(*int != 0),
                    (b'I', Constant::Integer(int)) => ElementValueGen::Int(*int),
                    (b'J', Constant::Long(long)) => ElementValueGen::Long(*long),
                    (b'F', Constant::Float(float)) => ElementValueGen::Float(*float),
                    (b'D', Constant::Double(double)) => ElementValueGen::Double(*double),
                    (b'J', _) => return Err(unexpected("Long")),
                    (b'F', _) => return Err(unexpected("Float")),
                    (b'D', _) => return Err(unexpected("Double")),
                    _ => return Err(unexpected("Integer")),
                }
            }
            ElementValue::Enum {
                type_name,
                const_name,
            } => ElementValueGen::Enum {
                type_name: constants.utf8(*type_name)?.to_owned(),
                const_name: constants.utf8(*const_name)?.to_owned(),
            },
            ElementValue::Class(class) => {
                ElementValueGen::Class(constants.utf8(*class)?.to_owned())
            }
            ElementValue::Annotation(annotation) => ElementValueGen::Annotation(
                AnnotationEntryGen::from_annotation(annotation, true, constants)?,
            ),
            ElementValue::Array(values) => ElementValueGen::Array(
                values
                    .iter()
                    .map(|value| ElementValueGen::from_element_value(value, constants))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

/// Annotation on a class, field, method, or method parameter
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationEntryGen {
    /// Field descriptor of the annotation interface
    pub type_name: String,

    /// Whether the annotation is retained for reflection at runtime
    pub runtime_visible: bool,

    pub element_value_pairs: Vec<(String, ElementValueGen)>,
}

impl AnnotationEntryGen {
    pub fn new(type_name: impl Into<String>, runtime_visible: bool) -> AnnotationEntryGen {
        AnnotationEntryGen {
            type_name: type_name.into(),
            runtime_visible,
            element_value_pairs: vec![],
        }
    }

    pub fn add_element_value_pair(&mut self, name: impl Into<String>, value: ElementValueGen) {
        self.element_value_pairs.push((name.into(), value));
    }

    pub fn annotation(&self, constants: &mut ConstantPoolGen) -> Result<Annotation, Error> {
        let type_index = constants.add_utf8(self.type_name.as_str())?;
        let element_value_pairs = self
            .element_value_pairs
            .iter()
            .map(|(name, value)| -> Result<ElementValuePair, Error> {
                Ok(ElementValuePair {
                    name_index: constants.add_utf8(name.as_str())?,
                    value: value.resolve(constants)?,
                })
            })
            .collect::<Result<_, Error>>()?;
        Ok(Annotation {
            type_index,
            element_value_pairs,
        })
    }

    pub fn from_annotation(
        annotation: &Annotation,
        runtime_visible: bool,
        constants: &impl ConstantLookup,
    ) -> Result<AnnotationEntryGen, Error> {
        Ok(AnnotationEntryGen {
            type_name: constants.utf8(annotation.type_index)?.to_owned(),
            runtime_visible,
            element_value_pairs: annotation
                .element_value_pairs
                .iter()
                .map(|pair| -> Result<(String, ElementValueGen), Error> {
                    Ok((
                        constants.utf8(pair.name_index)?.to_owned(),
                        ElementValueGen::from_element_value(&pair.value, constants)?,
                    ))
                })
                .collect::<Result<_, Error>>()?,
        })
    }
}

/// Attributes holding annotations on a class, field, or method
///
/// Visible and invisible annotations go into separate attributes. Nothing is produced for an
/// empty group.
pub fn annotation_attributes(
    annotations: &[AnnotationEntryGen],
    constants: &mut ConstantPoolGen,
) -> Result<Vec<Attribute>, Error> {
    let mut visible = vec![];
    let mut invisible = vec![];
    for annotation in annotations {
        let resolved = annotation.annotation(constants)?;
        if annotation.runtime_visible {
            visible.push(resolved);
        } else {
            invisible.push(resolved);
        }
    }

    let mut attributes = vec![];
    if !visible.is_empty() {
        attributes.push(constants.add_attribute(&RuntimeVisibleAnnotations(visible))?);
    }
    if !invisible.is_empty() {
        attributes.push(constants.add_attribute(&RuntimeInvisibleAnnotations(invisible))?);
    }
    Ok(attributes)
}

/// Attributes holding the annotations on each parameter of a method
pub fn parameter_annotation_attributes(
    parameters: &[Vec<AnnotationEntryGen>],
    constants: &mut ConstantPoolGen,
) -> Result<Vec<Attribute>, Error> {
    let mut visible = vec![];
    let mut invisible = vec![];
    for annotations in parameters {
        let mut parameter_visible = vec![];
        let mut parameter_invisible = vec![];
        for annotation in annotations {
            let resolved = annotation.annotation(constants)?;
            if annotation.runtime_visible {
                parameter_visible.push(resolved);
            } else {
                parameter_invisible.push(resolved);
            }
        }
        visible.push(parameter_visible);
        invisible.push(parameter_invisible);
    }

    let mut attributes = vec![];
    if visible.iter().any(|annotations| !annotations.is_empty()) {
        let attribute = RuntimeVisibleParameterAnnotations(visible);
        attributes.push(constants.add_attribute(&attribute)?);
    }
    if invisible.iter().any(|annotations| !annotations.is_empty()) {
        let attribute = RuntimeInvisibleParameterAnnotations(invisible);
        attributes.push(constants.add_attribute(&attribute)?);
    }
    Ok(attributes)
}

/// Collect the annotations stored in a list of attributes
pub fn read_annotations(
    attributes: &[Attribute],
    constants: &impl ConstantLookup,
) -> Result<Vec<AnnotationEntryGen>, Error> {
    let mut annotations = vec![];
    for attribute in attributes {
        let name = attribute.name(constants)?;
        let (resolved, visible) = if name == RuntimeVisibleAnnotations::NAME {
            (attribute.decode::<RuntimeVisibleAnnotations>()?.0, true)
        } else if name == RuntimeInvisibleAnnotations::NAME {
            (attribute.decode::<RuntimeInvisibleAnnotations>()?.0, false)
        } else {
            continue;
        };
        for annotation in &resolved {
            annotations.push(AnnotationEntryGen::from_annotation(
                annotation, visible, constants,
            )?);
        }
    }
    Ok(annotations)
}

/// Collect the parameter annotations stored in a list of attributes
///
/// The result has one entry per annotated parameter (visible and invisible annotations merged).
pub fn read_parameter_annotations(
    attributes: &[Attribute],
    constants: &impl ConstantLookup,
) -> Result<Vec<Vec<AnnotationEntryGen>>, Error> {
    let mut parameters: Vec<Vec<AnnotationEntryGen>> = vec![];
    for attribute in attributes {
        let name = attribute.name(constants)?;
        let (resolved, visible) = if name == RuntimeVisibleParameterAnnotations::NAME {
            (attribute.decode::<RuntimeVisibleParameterAnnotations>()?.0, true)
        } else if name == RuntimeInvisibleParameterAnnotations::NAME {
            (attribute.decode::<RuntimeInvisibleParameterAnnotations>()?.0, false)
        } else {
            continue;
        };
        if parameters.len() < resolved.len() {
            parameters.resize(resolved.len(), vec![]);
        }
        for (parameter, annotations) in parameters.iter_mut().zip(&resolved) {
            for annotation in annotations {
                parameter.push(AnnotationEntryGen::from_annotation(
                    annotation, visible, constants,
                )?);
            }
        }
    }
    Ok(parameters)
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> AnnotationEntryGen {
        let mut nested = AnnotationEntryGen::new("Lcom/example/Inner;", true);
        nested.add_element_value_pair("value", ElementValueGen::Class(String::from("V")));

        let mut annotation = AnnotationEntryGen::new("Lcom/example/Marker;", true);
        annotation.add_element_value_pair("count", ElementValueGen::Int(3));
        annotation.add_element_value_pair("name", ElementValueGen::String(String::from("x")));
        annotation.add_element_value_pair(
            "kind",
            ElementValueGen::Enum {
                type_name: String::from("Lcom/example/Kind;"),
                const_name: String::from("FAST"),
            },
        );
        annotation.add_element_value_pair(
            "flags",
            ElementValueGen::Array(vec![
                ElementValueGen::Boolean(true),
                ElementValueGen::Annotation(nested),
            ]),
        );
        annotation
    }

    #[test]
    fn element_value_encoding() {
        let mut constants = ConstantPoolGen::new();
        let value = ElementValueGen::Int(3).resolve(&mut constants).unwrap();
        let mut bytes = vec![];
        value.serialize(&mut bytes).unwrap();
        let index = constants.lookup_integer(3).unwrap();
        assert_eq!(bytes, vec![b'I', (index.0 >> 8) as u8, index.0 as u8]);
    }

    #[test]
    fn annotations_survive_attributes() {
        let mut constants = ConstantPoolGen::new();
        let mut hidden = AnnotationEntryGen::new("Lcom/example/Hidden;", false);
        hidden.add_element_value_pair("weight", ElementValueGen::Double(-0.5));
        let annotations = vec![sample(), hidden];

        let attributes = annotation_attributes(&annotations, &mut constants).unwrap();
        assert_eq!(attributes.len(), 2);
        assert_eq!(
            attributes[0].name(&constants).unwrap(),
            "RuntimeVisibleAnnotations"
        );
        assert_eq!(
            attributes[1].name(&constants).unwrap(),
            "RuntimeInvisibleAnnotations"
        );
        assert_eq!(read_annotations(&attributes, &constants).unwrap(), annotations);
    }

    #[test]
    fn parameter_annotations() {
        let mut constants = ConstantPoolGen::new();
        let parameters = vec![vec![], vec![sample()]];
        let attributes = parameter_annotation_attributes(&parameters, &mut constants).unwrap();
        assert_eq!(attributes.len(), 1);
        assert_eq!(
            read_parameter_annotations(&attributes, &constants).unwrap(),
            parameters
        );

        let empty = parameter_annotation_attributes(&[vec![], vec![]], &mut constants).unwrap();
        assert!(empty.is_empty());
    }
}
