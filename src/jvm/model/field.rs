use super::annotation::{annotation_attributes, is_annotation_attribute, read_annotations};
use super::{AnnotationEntryGen, Member, Observer, ObserverId, Observers};
use crate::jvm::class_file::{
    Attribute, AttributeLike, Constant, ConstantLookup, ConstantValue, Field,
};
use crate::jvm::{ConstantPoolGen, Error, FieldAccessFlags, Literal, Type};
use std::fmt;

/// Mutable field, resolved into a [`Field`] against a constant pool when done
#[derive(Debug)]
pub struct FieldGen {
    pub access_flags: FieldAccessFlags,
    name: String,
    typ: Type,
    initial_value: Option<Literal>,
    attributes: Vec<Attribute>,
    annotations: Vec<AnnotationEntryGen>,
    observers: Observers<FieldGen>,
}

impl FieldGen {
    pub fn new(
        access_flags: FieldAccessFlags,
        typ: Type,
        name: impl Into<String>,
    ) -> Result<FieldGen, Error> {
        let name = name.into();
        if typ.as_field_type().is_none() {
            return Err(Error::NegativeOrInvalidArgument(format!(
                "Field {} cannot have type {}",
                name, typ
            )));
        }
        Ok(FieldGen {
            access_flags,
            name,
            typ,
            initial_value: None,
            attributes: vec![],
            annotations: vec![],
            observers: Observers::default(),
        })
    }

    /// Read a field back out of a class file
    ///
    /// Attributes other than the initial value and annotations are kept as they are, so
    /// `constants` should be the pool the field will get added back into (eg. a pool made with
    /// [`ConstantPoolGen::from_pool`] from the field's class).
    pub fn from_field(field: &Field, constants: &impl ConstantLookup) -> Result<FieldGen, Error> {
        let name = constants.utf8(field.name_index)?;
        let typ = Type::from_signature(constants.utf8(field.descriptor_index)?)?;
        let mut field_gen = FieldGen::new(field.access_flags, typ, name)?;

        for attribute in &field.attributes {
            let attribute_name = attribute.name(constants)?;
            if attribute_name == ConstantValue::NAME {
                let ConstantValue(index) = attribute.decode::<ConstantValue>()?;
                let literal = match constants.lookup(index)? {
                    Constant::Integer(integer) => Literal::Integer(*integer),
                    Constant::Long(long) => Literal::Long(*long),
                    Constant::Float(float) => Literal::Float(*float),
                    Constant::Double(double) => Literal::Double(*double),
                    Constant::String(string) => Literal::String(constants.utf8(*string)?.to_owned()),
                    _ => {
                        return Err(Error::UnexpectedConstant {
                            index,
                            expected: "Integer, Long, Float, Double, or String",
                        })
                    }
                };
                field_gen.initial_value = Some(literal);
            } else if !is_annotation_attribute(attribute_name) {
                field_gen.attributes.push(attribute.clone());
            }
        }
        field_gen.annotations = read_annotations(&field.attributes, constants)?;
        Ok(field_gen)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn field_type(&self) -> &Type {
        &self.typ
    }

    /// Change the type, dropping an initial value which no longer fits
    pub fn set_type(&mut self, typ: Type) -> Result<(), Error> {
        if typ.as_field_type().is_none() {
            return Err(Error::NegativeOrInvalidArgument(format!(
                "Field {} cannot have type {}",
                self.name, typ
            )));
        }
        self.typ = typ;
        if let Some(literal) = &self.initial_value {
            if self.check_initial_value(literal).is_err() {
                self.initial_value = None;
            }
        }
        Ok(())
    }

    pub fn signature(&self) -> String {
        self.typ.signature()
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }

    pub fn is_final(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::FINAL)
    }

    /// Set the value the field is initialized with (stored as a `ConstantValue` attribute)
    ///
    /// Only `final` fields can have initial values, and the value has to match the field type:
    /// `int`-like fields take integers, `String` fields take strings, and `long`, `float`, and
    /// `double` fields take their own kind of literal.
    pub fn set_initial_value(&mut self, literal: Literal) -> Result<(), Error> {
        self.check_initial_value(&literal)?;
        self.initial_value = Some(literal);
        Ok(())
    }

    fn check_initial_value(&self, literal: &Literal) -> Result<(), Error> {
        if !self.is_final() {
            return Err(Error::InitialValueNotAllowed(format!(
                "{} is not final",
                self.name
            )));
        }
        let compatible = match literal {
            Literal::Integer(_) => self.typ.is_int_like(),
            Literal::Long(_) => self.typ == Type::LONG,
            Literal::Float(_) => self.typ == Type::FLOAT,
            Literal::Double(_) => self.typ == Type::DOUBLE,
            Literal::String(_) => self.typ == Type::STRING,
            Literal::Class(_) => false,
        };
        if compatible {
            Ok(())
        } else {
            Err(Error::InitialValueNotAllowed(format!(
                "{:?} does not fit in {} of type {}",
                literal, self.name, self.typ
            )))
        }
    }

    pub fn initial_value(&self) -> Option<&Literal> {
        self.initial_value.as_ref()
    }

    pub fn cancel_initial_value(&mut self) {
        self.initial_value = None;
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

    /// Resolve into a class file field
    ///
    /// The initial value and annotations only become attributes in the output: the builder's own
    /// attribute list is left as it was.
    pub fn field(&self, constants: &mut ConstantPoolGen) -> Result<Field, Error> {
        let name_index = constants.add_utf8(self.name.as_str())?;
        let descriptor_index = constants.add_utf8(self.signature())?;

        let mut attributes = self.attributes.clone();
        if let Some(literal) = &self.initial_value {
            let value = ConstantValue(constants.add_literal(literal)?);
            attributes.push(constants.add_attribute(&value)?);
        }
        attributes.extend(annotation_attributes(&self.annotations, constants)?);

        log::debug!("Built field {}", self);
        Ok(Field {
            access_flags: self.access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    pub fn add_observer(&mut self, observer: impl Observer<FieldGen> + 'static) -> ObserverId {
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

impl Member for FieldGen {
    fn member_name(&self) -> &str {
        &self.name
    }

    fn member_signature(&self) -> String {
        self.signature()
    }
}

/// Renders like a Java field declaration (eg. `static final int SIZE = 4`)
impl fmt::Display for FieldGen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modifiers = [
            (FieldAccessFlags::PUBLIC, "public "),
            (FieldAccessFlags::PRIVATE, "private "),
            (FieldAccessFlags::PROTECTED, "protected "),
            (FieldAccessFlags::STATIC, "static "),
            (FieldAccessFlags::FINAL, "final "),
            (FieldAccessFlags::VOLATILE, "volatile "),
            (FieldAccessFlags::TRANSIENT, "transient "),
        ];
        for (flag, modifier) in modifiers {
            if self.access_flags.contains(flag) {
                f.write_str(modifier)?;
            }
        }
        write!(f, "{} {}", self.typ, self.name)?;
        match &self.initial_value {
            Some(Literal::String(string)) => write!(f, " = {:?}", string),
            Some(Literal::Integer(integer)) => write!(f, " = {}", integer),
            Some(Literal::Long(long)) => write!(f, " = {}L", long),
            Some(Literal::Float(float)) => write!(f, " = {}f", float),
            Some(Literal::Double(double)) => write!(f, " = {}d", double),
            Some(Literal::Class(class)) => write!(f, " = {}.class", class),
            None => Ok(()),
        }
    }
}

/// Remove the first element equal to `value`
pub(super) fn remove_first<T: PartialEq>(values: &mut Vec<T>, value: &T) -> bool {
    match values.iter().position(|existing| existing == value) {
        Some(index) => {
            values.remove(index);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::ConstantIndex;

    #[test]
    fn initial_values() {
        let mut field = FieldGen::new(FieldAccessFlags::STATIC, Type::INT, "SIZE").unwrap();
        assert!(matches!(
            field.set_initial_value(Literal::Integer(4)),
            Err(Error::InitialValueNotAllowed(_))
        ));

        field.access_flags |= FieldAccessFlags::FINAL;
        assert!(field.set_initial_value(Literal::Long(4)).is_err());
        field.set_initial_value(Literal::Integer(4)).unwrap();
        assert_eq!(field.to_string(), "static final int SIZE = 4");

        field.set_type(Type::STRING).unwrap();
        assert_eq!(field.initial_value(), None);
        field
            .set_initial_value(Literal::String(String::from("four")))
            .unwrap();
    }

    #[test]
    fn build_and_read_back() {
        let mut constants = ConstantPoolGen::new();
        let mut field = FieldGen::new(
            FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
            Type::LONG,
            "LIMIT",
        )
        .unwrap();
        field.set_initial_value(Literal::Long(1 << 40)).unwrap();
        field.add_annotation_entry(AnnotationEntryGen::new("Ljava/lang/Deprecated;", true));

        let built = field.field(&mut constants).unwrap();
        assert_eq!(built.attributes.len(), 2);
        assert!(field.attributes().is_empty());
        assert_eq!(constants.utf8(built.descriptor_index).unwrap(), "J");

        let ConstantValue(index) = built.attribute::<ConstantValue>(&constants).unwrap().unwrap();
        assert_eq!(index, constants.lookup_long(1 << 40).unwrap());
        assert_ne!(index, ConstantIndex(0));

        let read = FieldGen::from_field(&built, &constants).unwrap();
        assert_eq!(read.name(), "LIMIT");
        assert_eq!(read.initial_value(), Some(&Literal::Long(1 << 40)));
        assert_eq!(read.annotation_entries(), field.annotation_entries());
        assert!(read.attributes().is_empty());
    }

    #[test]
    fn void_fields_are_rejected() {
        assert!(FieldGen::new(FieldAccessFlags::empty(), Type::Void, "nothing").is_err());
    }
}
