//! In-memory dex assembler for tests.
//!
//! Emits just enough of the format for [`DexFile::parse`](crate::DexFile)
//! and the hierarchy loader to chew on: real header, id tables, type
//! lists, and class_data sections. Checksums and the map list are left
//! zeroed; the parser does not verify them and neither does the original
//! optimizer when handed a file it produced itself.

use std::collections::HashMap;

const HEADER_SIZE: usize = 0x70;

#[derive(Default)]
pub struct DexBuilder {
    classes: Vec<ClassSpec>,
}

struct ClassSpec {
    descriptor: String,
    access_flags: u32,
    superclass: Option<String>,
    interfaces: Vec<String>,
    instance_fields: Vec<(String, String)>,
    direct_methods: Vec<(String, String, u32)>,
    virtual_methods: Vec<(String, String, u32)>,
}

impl DexBuilder {
    pub fn new() -> Self {
        DexBuilder::default()
    }

    /// Adds a class definition. Methods are `(name, signature, access_flags)`
    /// where the signature is the rendered `(<params>)<ret>` form.
    #[allow(clippy::too_many_arguments)]
    pub fn class(
        mut self,
        descriptor: &str,
        superclass: Option<&str>,
        interfaces: &[&str],
        instance_fields: &[(&str, &str)],
        direct_methods: &[(&str, &str, u32)],
        virtual_methods: &[(&str, &str, u32)],
    ) -> Self {
        self.classes.push(ClassSpec {
            descriptor: descriptor.to_owned(),
            access_flags: 0,
            superclass: superclass.map(str::to_owned),
            interfaces: interfaces.iter().map(|s| (*s).to_owned()).collect(),
            instance_fields: instance_fields
                .iter()
                .map(|(n, d)| ((*n).to_owned(), (*d).to_owned()))
                .collect(),
            direct_methods: direct_methods
                .iter()
                .map(|(n, s, f)| ((*n).to_owned(), (*s).to_owned(), *f))
                .collect(),
            virtual_methods: virtual_methods
                .iter()
                .map(|(n, s, f)| ((*n).to_owned(), (*s).to_owned(), *f))
                .collect(),
        });
        self
    }

    /// Like [`DexBuilder::class`] but flags the definition `ACC_INTERFACE`.
    pub fn interface(
        mut self,
        descriptor: &str,
        superclass: Option<&str>,
        interfaces: &[&str],
        virtual_methods: &[(&str, &str, u32)],
    ) -> Self {
        self = self.class(descriptor, superclass, interfaces, &[], &[], virtual_methods);
        self.classes.last_mut().unwrap().access_flags |= crate::ACC_INTERFACE;
        self
    }

    /// Serializes the accumulated classes to dex bytes.
    pub fn build(self) -> Vec<u8> {
        let mut pool = Pool::default();

        // Register everything so table sizes are known up front.
        for class in &self.classes {
            pool.type_idx(&class.descriptor);
            if let Some(superclass) = &class.superclass {
                pool.type_idx(superclass);
            }
            for iface in &class.interfaces {
                pool.type_idx(iface);
            }
            for (name, desc) in &class.instance_fields {
                pool.field_idx(&class.descriptor, desc, name);
            }
            for (name, sig, _) in class.direct_methods.iter().chain(&class.virtual_methods) {
                pool.method_idx(&class.descriptor, sig, name);
            }
        }

        let string_ids_off = HEADER_SIZE;
        let type_ids_off = string_ids_off + 4 * pool.strings.len();
        let proto_ids_off = type_ids_off + 4 * pool.types.len();
        let field_ids_off = proto_ids_off + 12 * pool.protos.len();
        let method_ids_off = field_ids_off + 8 * pool.fields.len();
        let class_defs_off = method_ids_off + 8 * pool.methods.len();
        let data_off = class_defs_off + 32 * self.classes.len();

        // Data section: type lists (protos + interfaces), class_data, strings.
        let mut data = Vec::new();
        let mut proto_param_offs = Vec::with_capacity(pool.protos.len());
        for (_, params) in &pool.protos {
            if params.is_empty() {
                proto_param_offs.push(0u32);
            } else {
                align4(&mut data, data_off);
                proto_param_offs.push((data_off + data.len()) as u32);
                push_type_list(&mut data, params);
            }
        }

        let mut interface_offs = Vec::with_capacity(self.classes.len());
        let mut class_data_offs = Vec::with_capacity(self.classes.len());
        for class in &self.classes {
            if class.interfaces.is_empty() {
                interface_offs.push(0u32);
            } else {
                align4(&mut data, data_off);
                interface_offs.push((data_off + data.len()) as u32);
                let idxs: Vec<u16> = class
                    .interfaces
                    .iter()
                    .map(|d| pool.type_idx_of(d))
                    .collect();
                push_type_list(&mut data, &idxs);
            }

            let no_members = class.instance_fields.is_empty()
                && class.direct_methods.is_empty()
                && class.virtual_methods.is_empty();
            if no_members {
                class_data_offs.push(0u32);
                continue;
            }
            class_data_offs.push((data_off + data.len()) as u32);
            push_uleb(&mut data, 0); // static_fields_size
            push_uleb(&mut data, class.instance_fields.len() as u32);
            push_uleb(&mut data, class.direct_methods.len() as u32);
            push_uleb(&mut data, class.virtual_methods.len() as u32);
            let mut prev = 0u32;
            for (name, desc) in &class.instance_fields {
                let idx = pool.field_idx_of(&class.descriptor, desc, name);
                push_uleb(&mut data, idx - prev);
                push_uleb(&mut data, 0); // access_flags
                prev = idx;
            }
            for methods in [&class.direct_methods, &class.virtual_methods] {
                let mut prev = 0u32;
                for (name, sig, flags) in methods.iter() {
                    let idx = pool.method_idx_of(&class.descriptor, sig, name);
                    push_uleb(&mut data, idx - prev);
                    push_uleb(&mut data, *flags);
                    push_uleb(&mut data, 0); // code_off
                    prev = idx;
                }
            }
        }

        let mut string_data_offs = Vec::with_capacity(pool.strings.len());
        for s in &pool.strings {
            string_data_offs.push((data_off + data.len()) as u32);
            push_uleb(&mut data, s.chars().map(char::len_utf16).sum::<usize>() as u32);
            data.extend_from_slice(s.as_bytes());
            data.push(0);
        }

        // Now lay the file out front to back.
        let file_size = data_off + data.len();
        let mut out = Vec::with_capacity(file_size);
        out.extend_from_slice(b"dex\n035\0");
        push_u32(&mut out, 0); // checksum
        out.extend_from_slice(&[0u8; 20]); // signature
        push_u32(&mut out, file_size as u32);
        push_u32(&mut out, HEADER_SIZE as u32);
        push_u32(&mut out, 0x1234_5678); // endian_tag
        push_u32(&mut out, 0); // link_size
        push_u32(&mut out, 0); // link_off
        push_u32(&mut out, 0); // map_off
        push_u32(&mut out, pool.strings.len() as u32);
        push_u32(&mut out, string_ids_off as u32);
        push_u32(&mut out, pool.types.len() as u32);
        push_u32(&mut out, type_ids_off as u32);
        push_u32(&mut out, pool.protos.len() as u32);
        push_u32(&mut out, proto_ids_off as u32);
        push_u32(&mut out, pool.fields.len() as u32);
        push_u32(&mut out, field_ids_off as u32);
        push_u32(&mut out, pool.methods.len() as u32);
        push_u32(&mut out, method_ids_off as u32);
        push_u32(&mut out, self.classes.len() as u32);
        push_u32(&mut out, class_defs_off as u32);
        push_u32(&mut out, data.len() as u32);
        push_u32(&mut out, data_off as u32);
        debug_assert_eq!(out.len(), HEADER_SIZE);

        for off in &string_data_offs {
            push_u32(&mut out, *off);
        }
        for descriptor_string_idx in &pool.types {
            push_u32(&mut out, *descriptor_string_idx);
        }
        for (i, (ret, _)) in pool.protos.iter().enumerate() {
            push_u32(&mut out, 0); // shorty_idx, unread
            push_u32(&mut out, u32::from(*ret));
            push_u32(&mut out, proto_param_offs[i]);
        }
        for (type_idx, name_idx) in &pool.fields {
            push_u16(&mut out, 0); // class_idx, unread
            push_u16(&mut out, *type_idx);
            push_u32(&mut out, *name_idx);
        }
        for (proto_idx, name_idx) in &pool.methods {
            push_u16(&mut out, 0); // class_idx, unread
            push_u16(&mut out, *proto_idx);
            push_u32(&mut out, *name_idx);
        }
        for (i, class) in self.classes.iter().enumerate() {
            push_u32(&mut out, u32::from(pool.type_idx_of(&class.descriptor)));
            push_u32(&mut out, class.access_flags);
            match &class.superclass {
                Some(superclass) => push_u32(&mut out, u32::from(pool.type_idx_of(superclass))),
                None => push_u32(&mut out, 0xffff_ffff),
            }
            push_u32(&mut out, interface_offs[i]);
            push_u32(&mut out, 0xffff_ffff); // source_file_idx
            push_u32(&mut out, 0); // annotations_off
            push_u32(&mut out, class_data_offs[i]);
            push_u32(&mut out, 0); // static_values_off
        }
        debug_assert_eq!(out.len(), data_off);
        out.extend_from_slice(&data);
        out
    }

    /// Wraps the built dex in a minimal odex (`dey`) container.
    pub fn build_odex(self) -> Vec<u8> {
        let dex = self.build();
        let mut out = Vec::with_capacity(40 + dex.len());
        out.extend_from_slice(b"dey\n036\0");
        push_u32(&mut out, 40); // dex offset
        push_u32(&mut out, dex.len() as u32);
        out.extend_from_slice(&[0u8; 24]); // deps/opt offsets, flags, checksum
        out.extend_from_slice(&dex);
        out
    }
}

#[derive(Default)]
struct Pool {
    strings: Vec<String>,
    string_map: HashMap<String, u32>,
    types: Vec<u32>,
    type_map: HashMap<String, u16>,
    protos: Vec<(u16, Vec<u16>)>,
    proto_map: HashMap<String, u16>,
    fields: Vec<(u16, u32)>,
    field_map: HashMap<(String, String, String), u32>,
    methods: Vec<(u16, u32)>,
    method_map: HashMap<(String, String, String), u32>,
}

impl Pool {
    fn string_idx(&mut self, s: &str) -> u32 {
        if let Some(&idx) = self.string_map.get(s) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(s.to_owned());
        self.string_map.insert(s.to_owned(), idx);
        idx
    }

    fn type_idx(&mut self, descriptor: &str) -> u16 {
        if let Some(&idx) = self.type_map.get(descriptor) {
            return idx;
        }
        let string_idx = self.string_idx(descriptor);
        let idx = self.types.len() as u16;
        self.types.push(string_idx);
        self.type_map.insert(descriptor.to_owned(), idx);
        idx
    }

    fn type_idx_of(&self, descriptor: &str) -> u16 {
        self.type_map[descriptor]
    }

    fn proto_idx(&mut self, signature: &str) -> u16 {
        if let Some(&idx) = self.proto_map.get(signature) {
            return idx;
        }
        let (params, ret) = split_signature(signature);
        let param_idxs: Vec<u16> = params.iter().map(|p| self.type_idx(p)).collect();
        let ret_idx = self.type_idx(&ret);
        let idx = self.protos.len() as u16;
        self.protos.push((ret_idx, param_idxs));
        self.proto_map.insert(signature.to_owned(), idx);
        idx
    }

    // Members are keyed per declaring class so each class's member list
    // comes out with ascending indices (diff encoding needs that).
    fn field_idx(&mut self, class: &str, descriptor: &str, name: &str) -> u32 {
        let key = (class.to_owned(), descriptor.to_owned(), name.to_owned());
        if let Some(&idx) = self.field_map.get(&key) {
            return idx;
        }
        let type_idx = self.type_idx(descriptor);
        let name_idx = self.string_idx(name);
        let idx = self.fields.len() as u32;
        self.fields.push((type_idx, name_idx));
        self.field_map.insert(key, idx);
        idx
    }

    fn field_idx_of(&self, class: &str, descriptor: &str, name: &str) -> u32 {
        self.field_map[&(class.to_owned(), descriptor.to_owned(), name.to_owned())]
    }

    fn method_idx(&mut self, class: &str, signature: &str, name: &str) -> u32 {
        let key = (class.to_owned(), signature.to_owned(), name.to_owned());
        if let Some(&idx) = self.method_map.get(&key) {
            return idx;
        }
        let proto_idx = self.proto_idx(signature);
        let name_idx = self.string_idx(name);
        let idx = self.methods.len() as u32;
        self.methods.push((proto_idx, name_idx));
        self.method_map.insert(key, idx);
        idx
    }

    fn method_idx_of(&self, class: &str, signature: &str, name: &str) -> u32 {
        self.method_map[&(class.to_owned(), signature.to_owned(), name.to_owned())]
    }
}

/// Splits `(<params>)<ret>` into individual parameter descriptors and the
/// return descriptor.
fn split_signature(signature: &str) -> (Vec<String>, String) {
    let close = signature.find(')').expect("signature missing ')'");
    let mut params = Vec::new();
    let mut rest = &signature[1..close];
    while !rest.is_empty() {
        let len = descriptor_len(rest);
        params.push(rest[..len].to_owned());
        rest = &rest[len..];
    }
    (params, signature[close + 1..].to_owned())
}

fn descriptor_len(s: &str) -> usize {
    let mut len = 0;
    let bytes = s.as_bytes();
    while bytes[len] == b'[' {
        len += 1;
    }
    if bytes[len] == b'L' {
        len + s[len..].find(';').expect("unterminated class descriptor") + 1
    } else {
        len + 1
    }
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_uleb(out: &mut Vec<u8>, mut v: u32) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

fn align4(data: &mut Vec<u8>, base: usize) {
    while (base + data.len()) % 4 != 0 {
        data.push(0);
    }
}

fn push_type_list(data: &mut Vec<u8>, idxs: &[u16]) {
    push_u32(data, idxs.len() as u32);
    for idx in idxs {
        push_u16(data, *idx);
    }
}
