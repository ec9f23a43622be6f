//! Byte-level snapshot builder for tests. Produces complete, valid
//! snapshot files that tests then open or deliberately corrupt in place.

use adsnap_core::types::SyntaxKind;

use crate::cursor::ByteCursor;

#[derive(Debug, Clone)]
struct AttributeSpec {
    name: String,
    syntax: SyntaxKind,
    single_valued: bool,
}

#[derive(Debug, Clone)]
struct ObjectSpec {
    prefix_id: u32,
    suffix: String,
    attributes: Vec<(u32, Vec<Vec<u8>>)>,
}

#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    version: u32,
    captured_at: u64,
    description: String,
    server: String,
    attributes: Vec<AttributeSpec>,
    classes: Vec<String>,
    prefixes: Vec<String>,
    objects: Vec<ObjectSpec>,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self {
            version: 1,
            // 2024-01-15T10:30:00Z
            captured_at: 133_497_882_000_000_000,
            description: String::new(),
            server: "DC=corp,DC=local".to_owned(),
            attributes: Vec::new(),
            classes: Vec::new(),
            prefixes: Vec::new(),
            objects: Vec::new(),
        }
    }

    pub fn version(&mut self, version: u32) -> &mut Self {
        self.version = version;
        self
    }

    pub fn captured_at(&mut self, filetime: u64) -> &mut Self {
        self.captured_at = filetime;
        self
    }

    pub fn description(&mut self, text: &str) -> &mut Self {
        self.description = text.to_owned();
        self
    }

    pub fn server(&mut self, dn: &str) -> &mut Self {
        self.server = dn.to_owned();
        self
    }

    /// Registers an attribute and returns its id.
    pub fn attribute(&mut self, name: &str, syntax: SyntaxKind, single_valued: bool) -> u32 {
        self.attributes.push(AttributeSpec {
            name: name.to_owned(),
            syntax,
            single_valued,
        });
        (self.attributes.len() - 1) as u32
    }

    pub fn class(&mut self, name: &str) -> u32 {
        self.classes.push(name.to_owned());
        (self.classes.len() - 1) as u32
    }

    /// Registers a DN prefix and returns its id.
    pub fn prefix(&mut self, prefix: &str) -> u32 {
        self.prefixes.push(prefix.to_owned());
        (self.prefixes.len() - 1) as u32
    }

    /// Appends an object record. Values are raw blobs, typically built
    /// with the `v*` helpers in this module.
    pub fn object(
        &mut self,
        prefix_id: u32,
        suffix: &str,
        attributes: Vec<(u32, Vec<Vec<u8>>)>,
    ) -> &mut Self {
        self.objects.push(ObjectSpec {
            prefix_id,
            suffix: suffix.to_owned(),
            attributes,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut attr_section = Vec::new();
        put_u32_tail(&mut attr_section, self.attributes.len() as u32);
        for (id, attr) in self.attributes.iter().enumerate() {
            ucs(&mut attr_section, &attr.name);
            put_u32_tail(&mut attr_section, attr.syntax.code());
            put_u32_tail(&mut attr_section, u32::from(attr.single_valued));
            ucs(
                &mut attr_section,
                &format!("CN={},CN=Schema,CN=Configuration", attr.name),
            );
            attr_section.extend_from_slice(&guid_bytes(id as u8 + 1));
            attr_section.extend_from_slice(&guid_bytes(id as u8 | 0x80));
        }

        let mut class_section = Vec::new();
        put_u32_tail(&mut class_section, self.classes.len() as u32);
        for (id, name) in self.classes.iter().enumerate() {
            ucs(&mut class_section, name);
            class_section.extend_from_slice(&guid_bytes(id as u8 | 0x40));
        }

        let mut prefix_section = Vec::new();
        put_u32_tail(&mut prefix_section, self.prefixes.len() as u32);
        for prefix in &self.prefixes {
            ucs(&mut prefix_section, prefix);
        }

        let mut object_section = Vec::new();
        put_u32_tail(&mut object_section, self.objects.len() as u32);
        for object in &self.objects {
            let mut body = Vec::new();
            put_u32_tail(&mut body, object.prefix_id);
            ucs(&mut body, &object.suffix);
            put_u32_tail(&mut body, object.attributes.len() as u32);
            for (attr_id, values) in &object.attributes {
                put_u32_tail(&mut body, *attr_id);
                put_u32_tail(&mut body, values.len() as u32);
                for value in values {
                    put_u32_tail(&mut body, value.len() as u32);
                    body.extend_from_slice(value);
                }
            }
            put_u32_tail(&mut object_section, body.len() as u32);
            object_section.extend_from_slice(&body);
        }

        let header_len = 10
            + 4
            + 8
            + ucs_len(&self.description)
            + ucs_len(&self.server)
            + 4 * (4 + 8);
        let attr_offset = header_len as u64;
        let class_offset = attr_offset + attr_section.len() as u64;
        let prefix_offset = class_offset + class_section.len() as u64;
        let object_offset = prefix_offset + prefix_section.len() as u64;

        let mut buf = Vec::with_capacity(header_len + object_offset as usize);
        buf.extend_from_slice(b"win-ad-obj");
        put_u32_tail(&mut buf, self.version);
        buf.extend_from_slice(&self.captured_at.to_le_bytes());
        ucs(&mut buf, &self.description);
        ucs(&mut buf, &self.server);
        put_u32_tail(&mut buf, self.objects.len() as u32);
        buf.extend_from_slice(&object_offset.to_le_bytes());
        put_u32_tail(&mut buf, self.attributes.len() as u32);
        buf.extend_from_slice(&attr_offset.to_le_bytes());
        put_u32_tail(&mut buf, self.classes.len() as u32);
        buf.extend_from_slice(&class_offset.to_le_bytes());
        put_u32_tail(&mut buf, self.prefixes.len() as u32);
        buf.extend_from_slice(&prefix_offset.to_le_bytes());
        debug_assert_eq!(buf.len(), header_len);

        buf.extend_from_slice(&attr_section);
        buf.extend_from_slice(&class_section);
        buf.extend_from_slice(&prefix_section);
        buf.extend_from_slice(&object_section);
        buf
    }
}

/// UTF-16LE value payload for a string-syntax attribute.
pub fn vstr(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

pub fn vint(value: i64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

pub fn vbool(value: bool) -> Vec<u8> {
    u32::from(value).to_le_bytes().to_vec()
}

pub fn vfiletime(value: u64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

/// Binary SID payload.
pub fn vsid(revision: u8, authority: u64, sub_authorities: &[u32]) -> Vec<u8> {
    let mut out = vec![revision, sub_authorities.len() as u8];
    out.extend_from_slice(&authority.to_be_bytes()[2..8]);
    for sub in sub_authorities {
        out.extend_from_slice(&sub.to_le_bytes());
    }
    out
}

/// DN-syntax value payload: prefix id plus raw UTF-16LE suffix.
pub fn vdn(prefix_id: u32, suffix: &str) -> Vec<u8> {
    let mut out = prefix_id.to_le_bytes().to_vec();
    out.extend_from_slice(&vstr(suffix));
    out
}

pub fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn get_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buf[offset..offset + 4].try_into().expect("4 bytes"))
}

/// Absolute offset of the attribute section in a built snapshot.
pub fn attribute_section_offset(data: &[u8]) -> u64 {
    header_offsets(data).1
}

/// Absolute offset of the object section in a built snapshot.
pub fn object_section_offset(data: &[u8]) -> u64 {
    header_offsets(data).0
}

/// Absolute offset of the first object record (after the section count).
pub fn first_object_record_offset(data: &[u8]) -> u64 {
    object_section_offset(data) + 4
}

fn header_offsets(data: &[u8]) -> (u64, u64) {
    let mut cur = ByteCursor::new(data);
    cur.skip(10 + 4 + 8).expect("fixture header");
    cur.read_ucstring().expect("description");
    cur.read_ucstring().expect("server");
    cur.read_u32().expect("object count");
    let object_offset = cur.read_u64().expect("object offset");
    cur.read_u32().expect("attribute count");
    let attribute_offset = cur.read_u64().expect("attribute offset");
    (object_offset, attribute_offset)
}

fn ucs(buf: &mut Vec<u8>, text: &str) {
    let units: Vec<u16> = text.encode_utf16().collect();
    put_u32_tail(buf, units.len() as u32);
    for unit in units {
        buf.extend_from_slice(&unit.to_le_bytes());
    }
}

fn ucs_len(text: &str) -> usize {
    4 + text.encode_utf16().count() * 2
}

fn guid_bytes(seed: u8) -> [u8; 16] {
    let mut out = [seed; 16];
    out[0] = seed.wrapping_mul(31);
    out
}

fn put_u32_tail(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}
