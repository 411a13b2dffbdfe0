use crate::error::{DexError, Result};
use crate::mutf8;
use crate::reader::Reader;
use crate::{ACC_INTERFACE, ACC_STATIC};

const ENDIAN_CONSTANT: u32 = 0x1234_5678;
const NO_INDEX: u32 = 0xffff_ffff;

/// One class definition, fully resolved to owned strings.
///
/// Member lists preserve declaration order; superclass and interface
/// references stay descriptors because linking happens a layer above.
#[derive(Debug, Clone)]
pub struct ClassStub {
    pub descriptor: String,
    pub access_flags: u32,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub instance_fields: Vec<FieldStub>,
    pub direct_methods: Vec<MethodStub>,
    pub virtual_methods: Vec<MethodStub>,
}

impl ClassStub {
    pub fn is_interface(&self) -> bool {
        self.access_flags & ACC_INTERFACE != 0
    }
}

#[derive(Debug, Clone)]
pub struct FieldStub {
    pub name: String,
    /// Field type descriptor, e.g. `I` or `Ljava/lang/String;`.
    pub descriptor: String,
}

#[derive(Debug, Clone)]
pub struct MethodStub {
    pub name: String,
    /// Rendered prototype, e.g. `(ILjava/lang/String;)V`.
    pub signature: String,
    pub access_flags: u32,
}

impl MethodStub {
    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }
}

/// The parsed metadata tables of one dex file.
#[derive(Debug)]
pub struct DexFile {
    pub classes: Vec<ClassStub>,
}

impl DexFile {
    /// Parses a dex payload (not an odex wrapper; see
    /// [`dex_payload`](crate::dex_payload) for that).
    pub fn parse(bytes: &[u8]) -> Result<DexFile> {
        let tables = Tables::parse(bytes)?;
        let mut classes = Vec::with_capacity(tables.class_defs.len());
        for def in &tables.class_defs {
            classes.push(tables.resolve_class(bytes, def)?);
        }
        Ok(DexFile { classes })
    }
}

struct RawClassDef {
    class_idx: u32,
    access_flags: u32,
    superclass_idx: u32,
    interfaces_off: u32,
    class_data_off: u32,
}

struct Tables {
    strings: Vec<String>,
    types: Vec<u32>,
    protos: Vec<String>,
    field_ids: Vec<(u16, u32)>,  // (type_idx, name_idx)
    method_ids: Vec<(u16, u32)>, // (proto_idx, name_idx)
    class_defs: Vec<RawClassDef>,
}

impl Tables {
    fn parse(bytes: &[u8]) -> Result<Tables> {
        let mut header = Reader::new(bytes);
        let magic = header.take(8)?;
        if !magic.starts_with(b"dex\n") {
            let mut m = [0u8; 8];
            m.copy_from_slice(magic);
            return Err(DexError::InvalidMagic(m));
        }
        let version = &magic[4..7];
        if version != b"035" && version != b"036" {
            return Err(DexError::UnsupportedVersion(
                String::from_utf8_lossy(version).into_owned(),
            ));
        }

        // checksum + signature + file_size + header_size
        header.take(4 + 20 + 4 + 4)?;
        let endian_tag = header.read_u32()?;
        if endian_tag != ENDIAN_CONSTANT {
            return Err(DexError::UnsupportedEndianness(endian_tag));
        }
        // link_size, link_off, map_off
        header.take(12)?;

        let (string_ids_size, string_ids_off) = (header.read_u32()?, header.read_u32()?);
        let (type_ids_size, type_ids_off) = (header.read_u32()?, header.read_u32()?);
        let (proto_ids_size, proto_ids_off) = (header.read_u32()?, header.read_u32()?);
        let (field_ids_size, field_ids_off) = (header.read_u32()?, header.read_u32()?);
        let (method_ids_size, method_ids_off) = (header.read_u32()?, header.read_u32()?);
        let (class_defs_size, class_defs_off) = (header.read_u32()?, header.read_u32()?);

        let mut tables = Tables {
            strings: Vec::with_capacity(string_ids_size as usize),
            types: Vec::with_capacity(type_ids_size as usize),
            protos: Vec::with_capacity(proto_ids_size as usize),
            field_ids: Vec::with_capacity(field_ids_size as usize),
            method_ids: Vec::with_capacity(method_ids_size as usize),
            class_defs: Vec::with_capacity(class_defs_size as usize),
        };

        let mut ids = Reader::at(bytes, string_ids_off as usize)?;
        for _ in 0..string_ids_size {
            let data_off = ids.read_u32()? as usize;
            tables.strings.push(read_string_data(bytes, data_off)?);
        }

        let mut ids = Reader::at(bytes, type_ids_off as usize)?;
        for _ in 0..type_ids_size {
            let descriptor_idx = ids.read_u32()?;
            tables.check_string(descriptor_idx)?;
            tables.types.push(descriptor_idx);
        }

        let mut ids = Reader::at(bytes, proto_ids_off as usize)?;
        for _ in 0..proto_ids_size {
            let _shorty_idx = ids.read_u32()?;
            let return_type_idx = ids.read_u32()?;
            let parameters_off = ids.read_u32()?;
            tables
                .protos
                .push(tables.render_proto(bytes, return_type_idx, parameters_off)?);
        }

        let mut ids = Reader::at(bytes, field_ids_off as usize)?;
        for _ in 0..field_ids_size {
            let _class_idx = ids.read_u16()?;
            let type_idx = ids.read_u16()?;
            let name_idx = ids.read_u32()?;
            tables.check_type(u32::from(type_idx))?;
            tables.check_string(name_idx)?;
            tables.field_ids.push((type_idx, name_idx));
        }

        let mut ids = Reader::at(bytes, method_ids_off as usize)?;
        for _ in 0..method_ids_size {
            let _class_idx = ids.read_u16()?;
            let proto_idx = ids.read_u16()?;
            let name_idx = ids.read_u32()?;
            if u32::from(proto_idx) >= proto_ids_size {
                return Err(DexError::IndexOutOfRange {
                    kind: "proto",
                    index: u32::from(proto_idx),
                    size: proto_ids_size,
                });
            }
            tables.check_string(name_idx)?;
            tables.method_ids.push((proto_idx, name_idx));
        }

        let mut defs = Reader::at(bytes, class_defs_off as usize)?;
        for _ in 0..class_defs_size {
            let class_idx = defs.read_u32()?;
            let access_flags = defs.read_u32()?;
            let superclass_idx = defs.read_u32()?;
            let interfaces_off = defs.read_u32()?;
            let _source_file_idx = defs.read_u32()?;
            let _annotations_off = defs.read_u32()?;
            let class_data_off = defs.read_u32()?;
            let _static_values_off = defs.read_u32()?;
            tables.check_type(class_idx)?;
            tables.class_defs.push(RawClassDef {
                class_idx,
                access_flags,
                superclass_idx,
                interfaces_off,
                class_data_off,
            });
        }

        Ok(tables)
    }

    fn check_string(&self, index: u32) -> Result<()> {
        if (index as usize) < self.strings.len() {
            Ok(())
        } else {
            Err(DexError::IndexOutOfRange {
                kind: "string",
                index,
                size: self.strings.len() as u32,
            })
        }
    }

    fn check_type(&self, index: u32) -> Result<()> {
        if (index as usize) < self.types.len() {
            Ok(())
        } else {
            Err(DexError::IndexOutOfRange {
                kind: "type",
                index,
                size: self.types.len() as u32,
            })
        }
    }

    fn string(&self, index: u32) -> &str {
        &self.strings[index as usize]
    }

    fn type_descriptor(&self, index: u32) -> Result<&str> {
        self.check_type(index)?;
        Ok(self.string(self.types[index as usize]))
    }

    fn render_proto(&self, bytes: &[u8], return_type_idx: u32, parameters_off: u32) -> Result<String> {
        let mut sig = String::from("(");
        if parameters_off != 0 {
            let mut list = Reader::at(bytes, parameters_off as usize)?;
            let size = list.read_u32()?;
            for _ in 0..size {
                let type_idx = list.read_u16()?;
                sig.push_str(self.type_descriptor(u32::from(type_idx))?);
            }
        }
        sig.push(')');
        sig.push_str(self.type_descriptor(return_type_idx)?);
        Ok(sig)
    }

    fn read_type_list(&self, bytes: &[u8], off: u32) -> Result<Vec<String>> {
        if off == 0 {
            return Ok(Vec::new());
        }
        let mut list = Reader::at(bytes, off as usize)?;
        let size = list.read_u32()?;
        let mut out = Vec::with_capacity(size as usize);
        for _ in 0..size {
            let type_idx = list.read_u16()?;
            out.push(self.type_descriptor(u32::from(type_idx))?.to_owned());
        }
        Ok(out)
    }

    fn resolve_class(&self, bytes: &[u8], def: &RawClassDef) -> Result<ClassStub> {
        let descriptor = self.type_descriptor(def.class_idx)?.to_owned();
        let superclass = if def.superclass_idx == NO_INDEX {
            None
        } else {
            Some(self.type_descriptor(def.superclass_idx)?.to_owned())
        };
        let interfaces = self.read_type_list(bytes, def.interfaces_off)?;

        let mut stub = ClassStub {
            descriptor,
            access_flags: def.access_flags,
            superclass,
            interfaces,
            instance_fields: Vec::new(),
            direct_methods: Vec::new(),
            virtual_methods: Vec::new(),
        };
        if def.class_data_off == 0 {
            return Ok(stub);
        }

        let mut data = Reader::at(bytes, def.class_data_off as usize)?;
        let static_fields_size = data.read_uleb128()?;
        let instance_fields_size = data.read_uleb128()?;
        let direct_methods_size = data.read_uleb128()?;
        let virtual_methods_size = data.read_uleb128()?;

        // Static fields are skipped but still consume their entries.
        self.read_encoded_fields(&mut data, static_fields_size, None)?;
        self.read_encoded_fields(&mut data, instance_fields_size, Some(&mut stub.instance_fields))?;
        self.read_encoded_methods(&mut data, direct_methods_size, &mut stub.direct_methods)?;
        self.read_encoded_methods(&mut data, virtual_methods_size, &mut stub.virtual_methods)?;
        Ok(stub)
    }

    fn read_encoded_fields(
        &self,
        data: &mut Reader<'_>,
        count: u32,
        mut out: Option<&mut Vec<FieldStub>>,
    ) -> Result<()> {
        let mut field_idx = 0u32;
        for _ in 0..count {
            field_idx = field_idx.wrapping_add(data.read_uleb128()?);
            let _access_flags = data.read_uleb128()?;
            let (type_idx, name_idx) = *self.field_ids.get(field_idx as usize).ok_or(
                DexError::IndexOutOfRange {
                    kind: "field",
                    index: field_idx,
                    size: self.field_ids.len() as u32,
                },
            )?;
            if let Some(fields) = out.as_deref_mut() {
                fields.push(FieldStub {
                    name: self.string(name_idx).to_owned(),
                    descriptor: self.type_descriptor(u32::from(type_idx))?.to_owned(),
                });
            }
        }
        Ok(())
    }

    fn read_encoded_methods(
        &self,
        data: &mut Reader<'_>,
        count: u32,
        out: &mut Vec<MethodStub>,
    ) -> Result<()> {
        let mut method_idx = 0u32;
        for _ in 0..count {
            method_idx = method_idx.wrapping_add(data.read_uleb128()?);
            let access_flags = data.read_uleb128()?;
            let _code_off = data.read_uleb128()?;
            let (proto_idx, name_idx) = *self.method_ids.get(method_idx as usize).ok_or(
                DexError::IndexOutOfRange {
                    kind: "method",
                    index: method_idx,
                    size: self.method_ids.len() as u32,
                },
            )?;
            out.push(MethodStub {
                name: self.string(name_idx).to_owned(),
                signature: self.protos[proto_idx as usize].clone(),
                access_flags,
            });
        }
        Ok(())
    }
}

fn read_string_data(bytes: &[u8], data_off: usize) -> Result<String> {
    let mut data = Reader::at(bytes, data_off)?;
    let _utf16_size = data.read_uleb128()?;
    let start = data.pos();
    loop {
        let byte = data.read_u8()?;
        if byte == 0 {
            break;
        }
    }
    let raw = &bytes[start..data.pos() - 1];
    mutf8::decode(raw, data_off)
}
