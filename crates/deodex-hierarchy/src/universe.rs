use std::collections::HashMap;
use std::fmt;

/// Descriptor of the universal root class.
pub const ROOT_DESCRIPTOR: &str = "Ljava/lang/Object;";

/// Interfaces every array class implements in the runtime.
const ARRAY_INTERFACES: [&str; 2] = ["Ljava/lang/Cloneable;", "Ljava/io/Serializable;"];

/// Stable arena handle for a class record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClassId(u32);

impl ClassId {
    pub(crate) fn from_index(index: usize) -> Self {
        ClassId(index as u32)
    }

    pub(crate) fn to_index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodKind {
    Static,
    Direct,
    Virtual,
}

impl MethodKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MethodKind::Static => "static",
            MethodKind::Direct => "direct",
            MethodKind::Virtual => "virtual",
        }
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub byte_offset: u32,
    pub name: String,
    /// Field type descriptor.
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    /// Rendered prototype, e.g. `(ILjava/lang/String;)V`.
    pub signature: String,
    /// Descriptor of the class that declares this slot's implementation.
    pub owner: String,
    pub kind: MethodKind,
}

/// One resolved class, interface, array, or primitive type.
#[derive(Clone, Debug)]
pub struct ClassRecord {
    pub descriptor: String,
    /// `None` only for the root class and for primitive records.
    pub superclass: Option<ClassId>,
    pub is_interface: bool,
    pub is_primitive: bool,
    /// 0 for non-array types.
    pub array_dim: u16,
    /// Innermost element record; present iff `array_dim > 0`.
    pub element: Option<ClassId>,
    /// Directly declared interfaces (transitivity is resolved on query).
    pub interfaces: Vec<ClassId>,
    /// Declared instance fields with their computed byte offsets;
    /// inherited fields are reached through `superclass`.
    pub instance_fields: Vec<Field>,
    /// Declared direct and static methods.
    pub direct_methods: Vec<Method>,
    /// Flattened dispatch table: inherited slots in superclass order,
    /// overridden slots replaced in place, own additions appended.
    pub vtable: Vec<Method>,
    /// Byte size of an instance including inherited fields; the first
    /// field of a subclass starts here.
    pub(crate) instance_size: u32,
}

/// Which declared method list [`ClassUniverse::find_method`] searches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodLookup {
    Direct,
    Virtual,
}

/// Arena of class records, interned by descriptor.
///
/// Built once by [`UniverseBuilder::link`](crate::UniverseBuilder::link);
/// afterwards it only grows through [`ClassUniverse::array_class_of`],
/// which reuses an existing record when the same array type is asked for
/// again. Existing records are never mutated.
#[derive(Debug)]
pub struct ClassUniverse {
    records: Vec<ClassRecord>,
    by_descriptor: HashMap<String, ClassId>,
    root: ClassId,
}

impl ClassUniverse {
    pub(crate) fn new(records: Vec<ClassRecord>, by_descriptor: HashMap<String, ClassId>, root: ClassId) -> Self {
        ClassUniverse {
            records,
            by_descriptor,
            root,
        }
    }

    /// The universal root class (`Ljava/lang/Object;`).
    pub fn root(&self) -> ClassId {
        self.root
    }

    pub fn class(&self, id: ClassId) -> &ClassRecord {
        &self.records[id.to_index()]
    }

    pub fn descriptor(&self, id: ClassId) -> &str {
        &self.class(id).descriptor
    }

    /// Number of records, array and primitive synthetics included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Plain (non-array) lookup. Primitive records stay hidden from this
    /// path, matching the runtime's system-class lookup which only knows
    /// classes that came out of a container.
    pub fn find_system_class(&self, descriptor: &str) -> Option<ClassId> {
        let id = *self.by_descriptor.get(descriptor)?;
        if self.class(id).is_primitive {
            None
        } else {
            Some(id)
        }
    }

    /// Resolves a descriptor the way the query protocol does: descriptors
    /// starting with the array marker go through array synthesis, the
    /// rest through the plain lookup.
    pub fn resolve_class(&mut self, descriptor: &str) -> Option<ClassId> {
        if descriptor.starts_with('[') {
            self.find_array_class(descriptor)
        } else {
            self.find_system_class(descriptor)
        }
    }

    /// Resolves (synthesizing as needed) an array class from its
    /// descriptor. Fails when the element class is unknown or the
    /// descriptor is not a well-formed array descriptor.
    pub fn find_array_class(&mut self, descriptor: &str) -> Option<ClassId> {
        if let Some(&id) = self.by_descriptor.get(descriptor) {
            return Some(id);
        }
        let dims = descriptor.bytes().take_while(|&b| b == b'[').count();
        if dims == 0 || dims > u16::MAX as usize {
            return None;
        }
        let element_desc = &descriptor[dims..];
        let element = if is_primitive_descriptor(element_desc) {
            self.primitive_class(element_desc)
        } else {
            self.find_system_class(element_desc)?
        };
        let mut class = element;
        for _ in 0..dims {
            class = self.array_class_of(class);
        }
        Some(class)
    }

    /// The array-construction contract: returns the (memoized) record for
    /// an array whose component is `element`.
    pub fn array_class_of(&mut self, element: ClassId) -> ClassId {
        let descriptor = format!("[{}", self.descriptor(element));
        if let Some(&id) = self.by_descriptor.get(&descriptor) {
            return id;
        }

        let elem_record = self.class(element);
        let innermost = elem_record.element.unwrap_or(element);
        let array_dim = elem_record.array_dim + 1;
        let root = self.root;
        let interfaces = ARRAY_INTERFACES
            .iter()
            .filter_map(|desc| self.find_system_class(desc))
            .collect();
        let record = ClassRecord {
            descriptor,
            superclass: Some(root),
            is_interface: false,
            is_primitive: false,
            array_dim,
            element: Some(innermost),
            interfaces,
            instance_fields: Vec::new(),
            direct_methods: Vec::new(),
            vtable: self.class(root).vtable.clone(),
            instance_size: self.class(root).instance_size,
        };
        self.insert(record)
    }

    /// Record for a primitive type (`I`, `J`, ...), synthesized on first
    /// use as an array element. Never returned by the lookup paths.
    fn primitive_class(&mut self, descriptor: &str) -> ClassId {
        if let Some(&id) = self.by_descriptor.get(descriptor) {
            return id;
        }
        let record = ClassRecord {
            descriptor: descriptor.to_owned(),
            superclass: None,
            is_interface: false,
            is_primitive: true,
            array_dim: 0,
            element: None,
            interfaces: Vec::new(),
            instance_fields: Vec::new(),
            direct_methods: Vec::new(),
            vtable: Vec::new(),
            instance_size: 0,
        };
        self.insert(record)
    }

    pub(crate) fn insert(&mut self, record: ClassRecord) -> ClassId {
        let id = ClassId(self.records.len() as u32);
        self.by_descriptor.insert(record.descriptor.clone(), id);
        self.records.push(record);
        id
    }

    /// Whether `class` (or one of its superclasses) implements `iface`,
    /// directly or through a superinterface.
    pub fn implements_interface(&self, class: ClassId, iface: ClassId) -> bool {
        let mut pending: Vec<ClassId> = Vec::new();
        let mut current = Some(class);
        while let Some(id) = current {
            pending.extend(&self.class(id).interfaces);
            current = self.class(id).superclass;
        }
        let mut seen = std::collections::HashSet::new();
        while let Some(id) = pending.pop() {
            if !seen.insert(id) {
                continue;
            }
            if id == iface {
                return true;
            }
            pending.extend(&self.class(id).interfaces);
        }
        false
    }

    /// Searches the class's *declared* methods of the given kind, as the
    /// runtime's by-descriptor lookups do (no superclass walk).
    pub fn find_method(
        &self,
        class: ClassId,
        name: &str,
        signature: &str,
        lookup: MethodLookup,
    ) -> Option<&Method> {
        let record = self.class(class);
        match lookup {
            MethodLookup::Direct => record
                .direct_methods
                .iter()
                .find(|m| m.name == name && m.signature == signature),
            MethodLookup::Virtual => record
                .vtable
                .iter()
                .find(|m| m.owner == record.descriptor && m.name == name && m.signature == signature),
        }
    }
}

pub(crate) fn is_primitive_descriptor(descriptor: &str) -> bool {
    matches!(descriptor, "B" | "C" | "D" | "F" | "I" | "J" | "S" | "Z")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::tests::tiny_universe;

    #[test]
    fn array_synthesis_is_memoized() {
        let mut universe = tiny_universe();
        let a = universe.find_array_class("[Ljava/lang/String;").unwrap();
        let b = universe.find_array_class("[Ljava/lang/String;").unwrap();
        assert_eq!(a, b);

        let string = universe.find_system_class("Ljava/lang/String;").unwrap();
        assert_eq!(universe.array_class_of(string), a);
    }

    #[test]
    fn array_of_array_tracks_innermost_element() {
        let mut universe = tiny_universe();
        let deep = universe.find_array_class("[[Ljava/lang/String;").unwrap();
        let record = universe.class(deep);
        assert_eq!(record.array_dim, 2);
        let element = record.element.unwrap();
        assert_eq!(universe.descriptor(element), "Ljava/lang/String;");
        assert_eq!(record.superclass, Some(universe.root()));
    }

    #[test]
    fn primitive_arrays_resolve_but_primitives_stay_hidden() {
        let mut universe = tiny_universe();
        let ints = universe.find_array_class("[I").unwrap();
        let element = universe.class(ints).element.unwrap();
        assert!(universe.class(element).is_primitive);
        assert_eq!(universe.find_system_class("I"), None);
        assert_eq!(universe.resolve_class("I"), None);
    }

    #[test]
    fn unknown_element_class_fails_array_resolution() {
        let mut universe = tiny_universe();
        assert_eq!(universe.find_array_class("[Lcom/missing/Type;"), None);
        assert_eq!(universe.find_array_class("["), None);
    }

    #[test]
    fn arrays_implement_the_marker_interfaces() {
        let mut universe = tiny_universe();
        let strings = universe.find_array_class("[Ljava/lang/String;").unwrap();
        let cloneable = universe.find_system_class("Ljava/lang/Cloneable;").unwrap();
        assert!(universe.implements_interface(strings, cloneable));
    }
}
