use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Field or method, as far as comparisons are concerned
pub trait Member {
    fn member_name(&self) -> &str;

    /// Type descriptor of a field or method
    fn member_signature(&self) -> String;
}

/// Name and descriptor of a member, detached from whatever it was read out of
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub name: String,
    pub signature: String,
}

impl MemberKey {
    pub fn new(name: impl Into<String>, signature: impl Into<String>) -> MemberKey {
        MemberKey {
            name: name.into(),
            signature: signature.into(),
        }
    }
}

impl Member for MemberKey {
    fn member_name(&self) -> &str {
        &self.name
    }

    fn member_signature(&self) -> String {
        self.signature.clone()
    }
}

/// Equality and hashing strategy for builders
///
/// The two must agree: values which are `equals` need to have the same `hash_code`.
pub trait Comparator<T: ?Sized> {
    fn equals(&self, left: &T, right: &T) -> bool;

    fn hash_code(&self, value: &T) -> u64;
}

/// Members are equal when they have the same name and descriptor
///
/// This matches how the JVM resolves fields and methods, so it is the strategy used by default.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NameAndSignature;

impl<T: Member + ?Sized> Comparator<T> for NameAndSignature {
    fn equals(&self, left: &T, right: &T) -> bool {
        left.member_name() == right.member_name()
            && left.member_signature() == right.member_signature()
    }

    fn hash_code(&self, value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.member_name().hash(&mut hasher);
        value.member_signature().hash(&mut hasher);
        hasher.finish()
    }
}

/// Members are equal when they have the same name (so overloads collide)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NameOnly;

impl<T: Member + ?Sized> Comparator<T> for NameOnly {
    fn equals(&self, left: &T, right: &T) -> bool {
        left.member_name() == right.member_name()
    }

    fn hash_code(&self, value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.member_name().hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strategies() {
        let first = MemberKey::new("run", "()V");
        let overload = MemberKey::new("run", "(I)V");
        let same = MemberKey::new("run", "()V");

        assert!(NameAndSignature.equals(&first, &same));
        assert_eq!(
            NameAndSignature.hash_code(&first),
            NameAndSignature.hash_code(&same)
        );
        assert!(!NameAndSignature.equals(&first, &overload));
        assert!(NameOnly.equals(&first, &overload));
        assert_eq!(NameOnly.hash_code(&first), NameOnly.hash_code(&overload));
    }
}
