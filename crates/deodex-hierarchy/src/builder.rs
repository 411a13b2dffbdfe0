use std::collections::{HashMap, HashSet};

use tracing::warn;

use deodex_dex::{ClassStub, DexFile};

use crate::error::{HierarchyError, Result};
use crate::universe::{ClassRecord, ClassUniverse, Field, Method, MethodKind, ROOT_DESCRIPTOR};

/// Byte offset of the first instance field on the root class.
const OBJECT_HEADER_SIZE: u32 = 8;

/// Accumulates class definitions from one or more containers and links
/// them into a [`ClassUniverse`].
///
/// Definitions are kept in arrival order; when the same descriptor shows
/// up twice (a boot container and the target both defining a class), the
/// first definition wins and the duplicate is dropped, mirroring the
/// runtime's multiple-definition handling during optimization.
#[derive(Default)]
pub struct UniverseBuilder {
    stubs: Vec<ClassStub>,
    index: HashMap<String, usize>,
}

impl UniverseBuilder {
    pub fn new() -> Self {
        UniverseBuilder::default()
    }

    pub fn add_dex(&mut self, dex: DexFile) {
        for class in dex.classes {
            self.add_class(class);
        }
    }

    pub fn add_class(&mut self, stub: ClassStub) {
        if self.index.contains_key(&stub.descriptor) {
            warn!(descriptor = %stub.descriptor, "duplicate class definition ignored");
            return;
        }
        self.index.insert(stub.descriptor.clone(), self.stubs.len());
        self.stubs.push(stub);
    }

    /// Links everything accumulated so far.
    ///
    /// Classes whose superclass or interfaces cannot be resolved are
    /// dropped (with a warning), as are definitions forming a superclass
    /// cycle; the runtime refuses to load those too, and queries against
    /// them later answer with the missing-dependency hint.
    pub fn link(self) -> Result<ClassUniverse> {
        if !self.index.contains_key(ROOT_DESCRIPTOR) {
            return Err(HierarchyError::MissingRoot);
        }

        let mut linker = Linker {
            stubs: &self.stubs,
            index: &self.index,
            records: Vec::with_capacity(self.stubs.len()),
            done: HashMap::new(),
            dropped: HashSet::new(),
            visiting: HashSet::new(),
        };
        for stub in &self.stubs {
            linker.link(&stub.descriptor);
        }

        let root = linker.done[ROOT_DESCRIPTOR];
        let by_descriptor = linker
            .done
            .iter()
            .map(|(desc, &id)| (desc.clone(), id))
            .collect();
        Ok(ClassUniverse::new(linker.records, by_descriptor, root))
    }
}

struct Linker<'a> {
    stubs: &'a [ClassStub],
    index: &'a HashMap<String, usize>,
    records: Vec<ClassRecord>,
    done: HashMap<String, crate::ClassId>,
    dropped: HashSet<String>,
    visiting: HashSet<String>,
}

impl Linker<'_> {
    fn link(&mut self, descriptor: &str) -> Option<crate::ClassId> {
        if let Some(&id) = self.done.get(descriptor) {
            return Some(id);
        }
        if self.dropped.contains(descriptor) {
            return None;
        }
        let Some(&stub_idx) = self.index.get(descriptor) else {
            return None;
        };
        if !self.visiting.insert(descriptor.to_owned()) {
            warn!(descriptor, "superclass cycle detected, dropping class");
            self.dropped.insert(descriptor.to_owned());
            return None;
        }
        let id = self.link_stub(stub_idx);
        self.visiting.remove(descriptor);
        if id.is_none() {
            self.dropped.insert(descriptor.to_owned());
        }
        id
    }

    fn link_stub(&mut self, stub_idx: usize) -> Option<crate::ClassId> {
        let descriptor = self.stubs[stub_idx].descriptor.clone();
        let superclass_desc = self.stubs[stub_idx].superclass.clone();
        let interface_descs = self.stubs[stub_idx].interfaces.clone();

        let superclass = match &superclass_desc {
            Some(desc) => match self.link(desc) {
                Some(id) => Some(id),
                None => {
                    warn!(class = %descriptor, superclass = %desc, "superclass unresolved, dropping class");
                    return None;
                }
            },
            None if descriptor == ROOT_DESCRIPTOR => None,
            None => {
                warn!(class = %descriptor, "non-root class without a superclass, dropping");
                return None;
            }
        };

        let mut interfaces = Vec::with_capacity(interface_descs.len());
        for desc in &interface_descs {
            match self.link(desc) {
                Some(id) => interfaces.push(id),
                None => {
                    warn!(class = %descriptor, interface = %desc, "interface unresolved, dropping class");
                    return None;
                }
            }
        }

        let stub = &self.stubs[stub_idx];
        let is_interface = stub.is_interface();

        // Dispatch table: inherited slots first, overrides replace in
        // place, new methods append. Interfaces dispatch through the
        // root's table, so their own stays empty.
        let mut vtable: Vec<Method> = match (is_interface, superclass) {
            (true, _) | (false, None) => Vec::new(),
            (false, Some(superclass)) => self.records[id_index(superclass)].vtable.clone(),
        };
        if !is_interface {
            for m in &stub.virtual_methods {
                let method = Method {
                    name: m.name.clone(),
                    signature: m.signature.clone(),
                    owner: stub.descriptor.clone(),
                    kind: MethodKind::Virtual,
                };
                match vtable
                    .iter_mut()
                    .find(|slot| slot.name == m.name && slot.signature == m.signature)
                {
                    Some(slot) => *slot = method,
                    None => vtable.push(method),
                }
            }
        }

        let direct_methods = stub
            .direct_methods
            .iter()
            .map(|m| Method {
                name: m.name.clone(),
                signature: m.signature.clone(),
                owner: stub.descriptor.clone(),
                kind: if m.is_static() {
                    MethodKind::Static
                } else {
                    MethodKind::Direct
                },
            })
            .collect();

        // Instance layout: fields continue where the superclass's
        // instance ends; 64-bit fields are 8-aligned.
        let mut offset = match superclass {
            Some(superclass) => self.records[id_index(superclass)].instance_size,
            None => OBJECT_HEADER_SIZE,
        };
        let mut instance_fields = Vec::with_capacity(stub.instance_fields.len());
        for f in &stub.instance_fields {
            let (size, align) = match f.descriptor.as_bytes().first() {
                Some(b'J') | Some(b'D') => (8, 8),
                _ => (4, 4),
            };
            offset = (offset + align - 1) & !(align - 1);
            instance_fields.push(Field {
                byte_offset: offset,
                name: f.name.clone(),
                signature: f.descriptor.clone(),
            });
            offset += size;
        }

        let record = ClassRecord {
            descriptor: stub.descriptor.clone(),
            superclass,
            is_interface,
            is_primitive: false,
            array_dim: 0,
            element: None,
            interfaces,
            instance_fields,
            direct_methods,
            vtable,
            instance_size: offset,
        };
        let id = crate::ClassId::from_index(self.records.len());
        self.records.push(record);
        self.done.insert(descriptor, id);
        Some(id)
    }
}

fn id_index(id: crate::ClassId) -> usize {
    id.to_index()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use deodex_dex::{ClassStub, FieldStub, MethodStub};
    use pretty_assertions::assert_eq;

    pub(crate) fn stub(
        descriptor: &str,
        superclass: Option<&str>,
        interfaces: &[&str],
    ) -> ClassStub {
        ClassStub {
            descriptor: descriptor.to_owned(),
            access_flags: 0,
            superclass: superclass.map(str::to_owned),
            interfaces: interfaces.iter().map(|s| (*s).to_owned()).collect(),
            instance_fields: Vec::new(),
            direct_methods: Vec::new(),
            virtual_methods: Vec::new(),
        }
    }

    pub(crate) fn iface_stub(descriptor: &str, extends: &[&str]) -> ClassStub {
        let mut stub = stub(descriptor, Some(ROOT_DESCRIPTOR), extends);
        stub.access_flags |= deodex_dex::ACC_INTERFACE;
        stub
    }

    fn method(name: &str, signature: &str, access_flags: u32) -> MethodStub {
        MethodStub {
            name: name.to_owned(),
            signature: signature.to_owned(),
            access_flags,
        }
    }

    fn field(name: &str, descriptor: &str) -> FieldStub {
        FieldStub {
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
        }
    }

    /// Root + a few well-known classes, enough for most resolver tests.
    pub(crate) fn tiny_universe() -> ClassUniverse {
        let mut builder = UniverseBuilder::new();
        let mut object = stub(ROOT_DESCRIPTOR, None, &[]);
        object.virtual_methods = vec![
            method("equals", "(Ljava/lang/Object;)Z", 0),
            method("hashCode", "()I", 0),
            method("toString", "()Ljava/lang/String;", 0),
        ];
        builder.add_class(object);
        builder.add_class(iface_stub("Ljava/lang/Cloneable;", &[]));
        builder.add_class(iface_stub("Ljava/io/Serializable;", &[]));
        builder.add_class(stub(
            "Ljava/lang/String;",
            Some(ROOT_DESCRIPTOR),
            &["Ljava/lang/Cloneable;"],
        ));
        builder.add_class(stub("Ljava/lang/Integer;", Some(ROOT_DESCRIPTOR), &[]));
        builder.link().unwrap()
    }

    #[test]
    fn link_requires_the_root_class() {
        let mut builder = UniverseBuilder::new();
        builder.add_class(stub("Lcom/example/A;", None, &[]));
        assert!(matches!(builder.link(), Err(HierarchyError::MissingRoot)));
    }

    #[test]
    fn first_definition_wins() {
        let mut builder = UniverseBuilder::new();
        builder.add_class(stub(ROOT_DESCRIPTOR, None, &[]));
        let mut first = stub("Lcom/example/A;", Some(ROOT_DESCRIPTOR), &[]);
        first.instance_fields.push(field("kept", "I"));
        builder.add_class(first);
        let mut second = stub("Lcom/example/A;", Some(ROOT_DESCRIPTOR), &[]);
        second.instance_fields.push(field("ignored", "I"));
        builder.add_class(second);

        let mut universe = builder.link().unwrap();
        let a = universe.resolve_class("Lcom/example/A;").unwrap();
        assert_eq!(universe.class(a).instance_fields[0].name, "kept");
    }

    #[test]
    fn unresolved_superclass_drops_the_class_not_the_link() {
        let mut builder = UniverseBuilder::new();
        builder.add_class(stub(ROOT_DESCRIPTOR, None, &[]));
        builder.add_class(stub("Lcom/example/Orphan;", Some("Lcom/missing/Super;"), &[]));
        builder.add_class(stub("Lcom/example/Fine;", Some(ROOT_DESCRIPTOR), &[]));

        let mut universe = builder.link().unwrap();
        assert_eq!(universe.resolve_class("Lcom/example/Orphan;"), None);
        assert!(universe.resolve_class("Lcom/example/Fine;").is_some());
    }

    #[test]
    fn superclass_cycles_are_dropped() {
        let mut builder = UniverseBuilder::new();
        builder.add_class(stub(ROOT_DESCRIPTOR, None, &[]));
        builder.add_class(stub("Lcom/example/A;", Some("Lcom/example/B;"), &[]));
        builder.add_class(stub("Lcom/example/B;", Some("Lcom/example/A;"), &[]));

        let mut universe = builder.link().unwrap();
        assert_eq!(universe.resolve_class("Lcom/example/A;"), None);
        assert_eq!(universe.resolve_class("Lcom/example/B;"), None);
    }

    #[test]
    fn vtable_overrides_replace_in_slot_order() {
        let mut builder = UniverseBuilder::new();
        let mut object = stub(ROOT_DESCRIPTOR, None, &[]);
        object.virtual_methods = vec![
            method("equals", "(Ljava/lang/Object;)Z", 0),
            method("toString", "()Ljava/lang/String;", 0),
        ];
        builder.add_class(object);
        let mut sub = stub("Lcom/example/Sub;", Some(ROOT_DESCRIPTOR), &[]);
        sub.virtual_methods = vec![
            method("toString", "()Ljava/lang/String;", 0),
            method("extra", "()V", 0),
        ];
        builder.add_class(sub);

        let mut universe = builder.link().unwrap();
        let sub = universe.resolve_class("Lcom/example/Sub;").unwrap();
        let vtable = &universe.class(sub).vtable;
        let slots: Vec<(&str, &str)> = vtable
            .iter()
            .map(|m| (m.name.as_str(), m.owner.as_str()))
            .collect();
        assert_eq!(
            slots,
            vec![
                ("equals", ROOT_DESCRIPTOR),
                ("toString", "Lcom/example/Sub;"),
                ("extra", "Lcom/example/Sub;"),
            ]
        );
    }

    #[test]
    fn field_offsets_continue_the_inherited_layout() {
        let mut builder = UniverseBuilder::new();
        let mut object = stub(ROOT_DESCRIPTOR, None, &[]);
        object.instance_fields = vec![field("shadow", "I")];
        builder.add_class(object);
        let mut sub = stub("Lcom/example/Sub;", Some(ROOT_DESCRIPTOR), &[]);
        sub.instance_fields = vec![field("a", "I"), field("b", "J"), field("c", "Z")];
        builder.add_class(sub);

        let mut universe = builder.link().unwrap();
        let root = universe.root();
        assert_eq!(universe.class(root).instance_fields[0].byte_offset, 8);

        let sub = universe.resolve_class("Lcom/example/Sub;").unwrap();
        let offsets: Vec<u32> = universe
            .class(sub)
            .instance_fields
            .iter()
            .map(|f| f.byte_offset)
            .collect();
        // 12 after the inherited int, then the long 8-aligned at 16.
        assert_eq!(offsets, vec![12, 16, 24]);
    }

    #[test]
    fn interfaces_link_with_empty_vtables() {
        let mut builder = UniverseBuilder::new();
        let mut object = stub(ROOT_DESCRIPTOR, None, &[]);
        object.virtual_methods = vec![method("hashCode", "()I", 0)];
        builder.add_class(object);
        let mut iface = iface_stub("Lcom/example/Iface;", &[]);
        iface.virtual_methods = vec![method("run", "()V", 0)];
        builder.add_class(iface);

        let mut universe = builder.link().unwrap();
        let iface = universe.resolve_class("Lcom/example/Iface;").unwrap();
        assert!(universe.class(iface).is_interface);
        assert!(universe.class(iface).vtable.is_empty());
    }
}
