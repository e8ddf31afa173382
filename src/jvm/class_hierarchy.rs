use crate::jvm::{BinaryName, Error};
use std::collections::{HashMap, HashSet};

/// Source of answers to subtyping questions about classes
///
/// Generated code often refers to classes which are not being generated (eg. the JDK), so the
/// builders never load classes themselves. Instead, whatever does know about the classes in
/// question implements this trait.
pub trait ClassHierarchy {
    /// Superclass of a class (`None` only for `java/lang/Object`)
    fn superclass(&self, class: &BinaryName) -> Result<Option<BinaryName>, Error>;

    /// Interfaces directly implemented by a class (or extended by an interface)
    fn interfaces(&self, class: &BinaryName) -> Result<Vec<BinaryName>, Error>;

    fn is_interface(&self, class: &BinaryName) -> Result<bool, Error>;

    /// Is the first class assignable to the second?
    ///
    /// This does a traversal of super types to determine assignability.
    fn is_subtype(&self, class: &BinaryName, super_type: &BinaryName) -> Result<bool, Error> {
        let mut supertypes_to_visit: Vec<BinaryName> = vec![class.clone()];
        let mut dont_revisit: HashSet<BinaryName> = HashSet::new();
        dont_revisit.insert(class.clone());

        // Optimization: if the super type is a class, then skip visiting interfaces
        let super_is_class: bool = !self.is_interface(super_type)?;

        while let Some(class) = supertypes_to_visit.pop() {
            if &class == super_type {
                return Ok(true);
            }

            // Enqueue next types to visit
            if let Some(superclass) = self.superclass(&class)? {
                if dont_revisit.insert(superclass.clone()) {
                    supertypes_to_visit.push(superclass);
                }
            }
            if !super_is_class {
                for interface in self.interfaces(&class)? {
                    if dont_revisit.insert(interface.clone()) {
                        supertypes_to_visit.push(interface);
                    }
                }
            }
        }

        Ok(false)
    }
}

/// Class hierarchy stored in memory
#[derive(Debug, Clone, Default)]
pub struct MapClassHierarchy {
    classes: HashMap<BinaryName, ClassEntry>,
}

#[derive(Debug, Clone)]
struct ClassEntry {
    superclass: Option<BinaryName>,
    interfaces: Vec<BinaryName>,
    is_interface: bool,
}

impl MapClassHierarchy {
    pub fn new() -> MapClassHierarchy {
        MapClassHierarchy::default()
    }

    /// Hierarchy pre-populated with the handful of `java.lang` and `java.io` types that
    /// assignability rules always need
    pub fn with_java_lang() -> MapClassHierarchy {
        let mut hierarchy = MapClassHierarchy::new();
        hierarchy.insert(BinaryName::OBJECT, None, vec![], false);
        hierarchy.insert_interface(BinaryName::CLONEABLE, vec![]);
        hierarchy.insert_interface(BinaryName::SERIALIZABLE, vec![]);
        hierarchy.insert_class(
            BinaryName::STRING,
            BinaryName::OBJECT,
            vec![BinaryName::SERIALIZABLE],
        );
        hierarchy.insert_class(
            BinaryName::THROWABLE,
            BinaryName::OBJECT,
            vec![BinaryName::SERIALIZABLE],
        );
        hierarchy
    }

    /// Add (or replace) a class or interface
    pub fn insert(
        &mut self,
        class: BinaryName,
        superclass: Option<BinaryName>,
        interfaces: Vec<BinaryName>,
        is_interface: bool,
    ) {
        let entry = ClassEntry {
            superclass,
            interfaces,
            is_interface,
        };
        self.classes.insert(class, entry);
    }

    /// Add a class with the given superclass and interfaces
    pub fn insert_class(
        &mut self,
        class: BinaryName,
        superclass: BinaryName,
        interfaces: Vec<BinaryName>,
    ) {
        self.insert(class, Some(superclass), interfaces, false);
    }

    /// Add an interface (the superclass of all interfaces is `java/lang/Object`)
    pub fn insert_interface(&mut self, interface: BinaryName, super_interfaces: Vec<BinaryName>) {
        self.insert(interface, Some(BinaryName::OBJECT), super_interfaces, true);
    }

    pub fn contains(&self, class: &BinaryName) -> bool {
        self.classes.contains_key(class)
    }

    fn entry(&self, class: &BinaryName) -> Result<&ClassEntry, Error> {
        self.classes
            .get(class)
            .ok_or_else(|| Error::MissingClass(class.clone()))
    }
}

impl ClassHierarchy for MapClassHierarchy {
    fn superclass(&self, class: &BinaryName) -> Result<Option<BinaryName>, Error> {
        Ok(self.entry(class)?.superclass.clone())
    }

    fn interfaces(&self, class: &BinaryName) -> Result<Vec<BinaryName>, Error> {
        Ok(self.entry(class)?.interfaces.clone())
    }

    fn is_interface(&self, class: &BinaryName) -> Result<bool, Error> {
        Ok(self.entry(class)?.is_interface)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::Name;

    fn name(s: &str) -> BinaryName {
        BinaryName::from_string(s.to_owned()).unwrap()
    }

    fn hierarchy() -> MapClassHierarchy {
        let mut hierarchy = MapClassHierarchy::with_java_lang();
        hierarchy.insert_interface(name("java/lang/CharSequence"), vec![]);
        hierarchy.insert_interface(name("java/util/Collection"), vec![]);
        hierarchy.insert_interface(name("java/util/List"), vec![name("java/util/Collection")]);
        hierarchy.insert_class(name("java/util/AbstractList"), BinaryName::OBJECT, vec![
            name("java/util/List"),
        ]);
        hierarchy.insert_class(
            name("java/util/ArrayList"),
            name("java/util/AbstractList"),
            vec![BinaryName::SERIALIZABLE],
        );
        hierarchy
    }

    #[test]
    fn simple_classes() {
        let hierarchy = hierarchy();
        let object = BinaryName::OBJECT;
        let string = BinaryName::STRING;

        assert!(hierarchy.is_subtype(&object, &object).unwrap());
        assert!(hierarchy.is_subtype(&string, &object).unwrap());
        assert!(!hierarchy.is_subtype(&object, &string).unwrap());
    }

    #[test]
    fn transitive_interfaces() {
        let hierarchy = hierarchy();
        let array_list = name("java/util/ArrayList");
        assert!(hierarchy
            .is_subtype(&array_list, &name("java/util/Collection"))
            .unwrap());
        assert!(hierarchy
            .is_subtype(&array_list, &BinaryName::SERIALIZABLE)
            .unwrap());
        assert!(!hierarchy
            .is_subtype(&array_list, &name("java/lang/CharSequence"))
            .unwrap());
        assert!(hierarchy
            .is_subtype(&name("java/util/List"), &BinaryName::OBJECT)
            .unwrap());
    }

    #[test]
    fn unknown_classes() {
        let hierarchy = hierarchy();
        assert!(matches!(
            hierarchy.is_subtype(&name("com/example/Missing"), &BinaryName::OBJECT),
            Err(Error::MissingClass(_))
        ));
    }
}
