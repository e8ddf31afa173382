use std::borrow::Cow;
use std::fmt;

/// Validated string name
///
/// The JVM has two flavours: unqualified names for members and binary names (segments joined by
/// `/`) for classes. See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2>
pub trait Name: Sized {
    /// Reason `name` is not a valid name, if it isn't
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    fn as_str(&self) -> &str;

    fn from_string(name: String) -> Result<Self, String>;
}

macro_rules! name_type {
    ($(#[$doc:meta])* $name:ident, $check:expr) => {
        $(#[$doc])*
        #[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
        pub struct $name(Cow<'static, str>);

        impl $name {
            const fn borrowed(value: &'static str) -> $name {
                $name(Cow::Borrowed(value))
            }
        }

        impl Name for $name {
            fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
                $check(name.as_ref())
            }

            fn as_str(&self) -> &str {
                &self.0
            }

            fn from_string(name: String) -> Result<Self, String> {
                Self::check_valid(&name)?;
                Ok($name(Cow::Owned(name)))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

fn check_unqualified(name: &str) -> Result<(), String> {
    match name.find(|c: char| matches!(c, '.' | ';' | '[' | '/')) {
        _ if name.is_empty() => Err(String::from("Unqualified name is empty")),
        Some(at) => Err(format!(
            "Unqualified name '{}' has an illegal character at {}",
            name, at
        )),
        None => Ok(()),
    }
}

fn check_binary(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(String::from("Binary name is empty"));
    }
    for segment in name.split('/') {
        check_unqualified(segment).map_err(|msg| format!("In binary name '{}': {}", name, msg))?;
    }
    Ok(())
}

name_type!(
    /// Name of a method or field
    UnqualifiedName,
    check_unqualified
);

name_type!(
    /// Name of a class or interface, in internal form (`java/lang/Object`)
    BinaryName,
    check_binary
);

impl UnqualifiedName {
    pub const OUT: Self = Self::borrowed("out");
    pub const PRINTLN: Self = Self::borrowed("println");

    /// Constructor and static initializer (the only names allowed angle brackets)
    pub const INIT: Self = Self::borrowed("<init>");
    pub const CLINIT: Self = Self::borrowed("<clinit>");
}

impl BinaryName {
    /// Accepts both the internal (`java/lang/Object`) and the source (`java.lang.Object`) form
    pub fn from_dotted(name: &str) -> Result<BinaryName, String> {
        BinaryName::from_string(name.replace('.', "/"))
    }

    /// Source form of the name (`java.lang.Object`)
    pub fn to_dotted(&self) -> String {
        self.0.replace('/', ".")
    }

    pub const OBJECT: Self = Self::borrowed("java/lang/Object");
    pub const STRING: Self = Self::borrowed("java/lang/String");
    pub const SYSTEM: Self = Self::borrowed("java/lang/System");
    pub const THROWABLE: Self = Self::borrowed("java/lang/Throwable");
    pub const CLONEABLE: Self = Self::borrowed("java/lang/Cloneable");
    pub const SERIALIZABLE: Self = Self::borrowed("java/io/Serializable");
    pub const PRINTSTREAM: Self = Self::borrowed("java/io/PrintStream");

    // Thrown by the instructions themselves
    pub const ARITHMETICEXCEPTION: Self = Self::borrowed("java/lang/ArithmeticException");
    pub const ARRAYINDEXOUTOFBOUNDSEXCEPTION: Self =
        Self::borrowed("java/lang/ArrayIndexOutOfBoundsException");
    pub const ARRAYSTOREEXCEPTION: Self = Self::borrowed("java/lang/ArrayStoreException");
    pub const CLASSCASTEXCEPTION: Self = Self::borrowed("java/lang/ClassCastException");
    pub const ILLEGALMONITORSTATEEXCEPTION: Self =
        Self::borrowed("java/lang/IllegalMonitorStateException");
    pub const NEGATIVEARRAYSIZEEXCEPTION: Self =
        Self::borrowed("java/lang/NegativeArraySizeException");
    pub const NULLPOINTEREXCEPTION: Self = Self::borrowed("java/lang/NullPointerException");

    // Thrown while resolving or linking
    pub const ABSTRACTMETHODERROR: Self = Self::borrowed("java/lang/AbstractMethodError");
    pub const BOOTSTRAPMETHODERROR: Self = Self::borrowed("java/lang/BootstrapMethodError");
    pub const CLASSFORMATERROR: Self = Self::borrowed("java/lang/ClassFormatError");
    pub const EXCEPTIONININITIALIZERERROR: Self =
        Self::borrowed("java/lang/ExceptionInInitializerError");
    pub const ILLEGALACCESSERROR: Self = Self::borrowed("java/lang/IllegalAccessError");
    pub const INCOMPATIBLECLASSCHANGEERROR: Self =
        Self::borrowed("java/lang/IncompatibleClassChangeError");
    pub const INSTANTIATIONERROR: Self = Self::borrowed("java/lang/InstantiationError");
    pub const NOCLASSDEFFOUNDERROR: Self = Self::borrowed("java/lang/NoClassDefFoundError");
    pub const NOSUCHFIELDERROR: Self = Self::borrowed("java/lang/NoSuchFieldError");
    pub const NOSUCHMETHODERROR: Self = Self::borrowed("java/lang/NoSuchMethodError");
    pub const UNSATISFIEDLINKERROR: Self = Self::borrowed("java/lang/UnsatisfiedLinkError");
    pub const VERIFYERROR: Self = Self::borrowed("java/lang/VerifyError");
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validation() {
        assert!(UnqualifiedName::from_string(String::from("foo")).is_ok());
        assert!(UnqualifiedName::from_string(String::from("fo/o")).is_err());
        assert!(UnqualifiedName::from_string(String::new()).is_err());
        assert!(BinaryName::from_string(String::from("java/lang/Object")).is_ok());
        assert!(BinaryName::from_string(String::from("java//Object")).is_err());
        assert!(BinaryName::check_valid("java/lang;").is_err());
    }

    #[test]
    fn dotted_names() {
        let name = BinaryName::from_dotted("java.util.List").unwrap();
        assert_eq!(name.as_str(), "java/util/List");
        assert_eq!(name.to_dotted(), "java.util.List");
        assert_eq!(BinaryName::OBJECT.to_string(), "java/lang/Object");
    }
}
