use std::fs::File;
use std::path::{Path, PathBuf};

use adsnap_core::error::{Error, FormatError};
use adsnap_core::types::{HeaderRecord, Object, SyntaxKind, Value};
use memmap2::Mmap;
use tracing::warn;

use crate::codec;
use crate::cursor::ByteCursor;
use crate::schema::{AttributeDef, ClassDef, Schema};

/// ASCII tag at offset 0 of every snapshot, NUL-padded to 10 bytes.
const SIGNATURE: &[u8; 10] = b"win-ad-obj";
/// Format versions observed in the wild; anything else is rejected.
const SUPPORTED_VERSIONS: &[u32] = &[1, 2];

/// An opened, memory-mapped snapshot. The header and schema are parsed
/// eagerly at open time; objects are decoded lazily through [`objects`].
///
/// [`objects`]: Snapshot::objects
#[derive(Debug)]
pub struct Snapshot {
    path: PathBuf,
    mmap: Mmap,
    header: HeaderRecord,
    schema: Schema,
}

impl Snapshot {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let file_size = file.metadata()?.len();
        let mmap = unsafe { Mmap::map(&file)? };

        let bytes: &[u8] = mmap.as_ref();
        let header = parse_header(bytes, file_size)?;
        let schema = parse_schema(bytes, &header)?;

        // The object section's own count must agree with the header.
        let mut cur = ByteCursor::new(bytes);
        cur.seek(header.object_offset)?;
        let count = cur.read_u32()?;
        if count != header.object_count {
            return Err(FormatError::CorruptSnapshot {
                offset: header.object_offset,
                reason: "object section count does not match header",
            }
            .into());
        }

        Ok(Self {
            path,
            mmap,
            header,
            schema,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot metadata decoded from the header.
    pub fn header(&self) -> &HeaderRecord {
        &self.header
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn bytes(&self) -> &[u8] {
        self.mmap.as_ref()
    }

    /// Lazy stream of directory objects in file order. A malformed record
    /// is fatal: the iterator yields the error once, then fuses, and the
    /// error stays observable through [`Objects::error`]. Malformed values
    /// inside a healthy record are demoted to `Value::Unknown` and counted.
    pub fn objects(&self) -> Objects<'_> {
        Objects {
            snapshot: self,
            pos: self.header.object_offset + 4,
            index: 0,
            decode_errors: 0,
            error: None,
            done: false,
        }
    }
}

pub struct Objects<'a> {
    snapshot: &'a Snapshot,
    pos: u64,
    index: u32,
    decode_errors: u64,
    error: Option<FormatError>,
    done: bool,
}

impl<'a> Objects<'a> {
    /// Sticky fatal error, if iteration was aborted by one.
    pub fn error(&self) -> Option<&FormatError> {
        self.error.as_ref()
    }

    /// Values demoted to `Value::Unknown` so far.
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }

    fn read_record(&mut self) -> Result<Object, FormatError> {
        let bytes = self.snapshot.bytes();
        let schema = self.snapshot.schema();
        let start = self.pos;

        let mut cur = ByteCursor::new(bytes);
        cur.seek(start)?;
        let record_len = cur.read_u32()? as u64;
        let end = start
            .checked_add(4 + record_len)
            .filter(|&end| end <= bytes.len() as u64)
            .ok_or(FormatError::CorruptSnapshot {
                offset: start,
                reason: "object record overruns file",
            })?;

        // Bound all further reads to the record so a lying inner length
        // cannot walk into the next record.
        let mut rec = ByteCursor::new(&bytes[(start + 4) as usize..end as usize]);
        let object = self
            .parse_object(&mut rec, schema)
            .map_err(|err| match err {
                FormatError::Truncated { .. } => FormatError::CorruptSnapshot {
                    offset: start,
                    reason: "truncated object record",
                },
                other => other,
            })?;
        if rec.remaining() != 0 {
            return Err(FormatError::CorruptSnapshot {
                offset: start,
                reason: "object record length mismatch",
            });
        }

        self.pos = end;
        Ok(object)
    }

    fn parse_object(
        &mut self,
        rec: &mut ByteCursor<'_>,
        schema: &Schema,
    ) -> Result<Object, FormatError> {
        let prefix_id = rec.read_u32()?;
        let suffix = rec.read_ucstring()?;
        let dn = schema.resolve_dn(prefix_id, &suffix)?;

        let attr_count = rec.read_u32()?;
        let mut attributes = Vec::with_capacity(attr_count as usize);
        for _ in 0..attr_count {
            let attr_id = rec.read_u32()?;
            let def =
                schema
                    .attribute_by_id(attr_id)
                    .ok_or(FormatError::InvalidAttributeId {
                        id: attr_id,
                        count: schema.attributes().len() as u32,
                    })?;
            let value_count = rec.read_u32()?;
            let mut values = Vec::with_capacity(value_count as usize);
            for _ in 0..value_count {
                let len = rec.read_u32()? as usize;
                let blob = rec.read_bytes(len)?;
                values.push(self.decode_value(def, blob, schema));
            }
            // A zero-value attribute is absent, not empty.
            if !values.is_empty() {
                attributes.push((attr_id, values));
            }
        }

        Ok(Object { dn, attributes })
    }

    fn decode_value(&mut self, def: &AttributeDef, blob: &[u8], schema: &Schema) -> Value {
        match decode_value(def.syntax, blob, schema) {
            Ok(value) => value,
            Err(reason) => {
                warn!(attribute = %def.name, reason, "value decode failed, keeping raw bytes");
                self.decode_errors += 1;
                Value::Unknown(blob.to_vec())
            }
        }
    }
}

impl<'a> Iterator for Objects<'a> {
    type Item = Result<Object, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.index >= self.snapshot.header.object_count {
            self.done = true;
            return None;
        }
        match self.read_record() {
            Ok(object) => {
                self.index += 1;
                Some(Ok(object))
            }
            Err(err) => {
                self.done = true;
                self.error = Some(err.clone());
                Some(Err(err))
            }
        }
    }
}

fn decode_value(
    syntax: SyntaxKind,
    blob: &[u8],
    schema: &Schema,
) -> Result<Value, &'static str> {
    match syntax {
        SyntaxKind::String => {
            if blob.len() % 2 != 0 {
                return Err("odd UTF-16 byte length");
            }
            Ok(Value::String(codec::decode_utf16le(blob)))
        }
        SyntaxKind::Integer => match blob.len() {
            8 => Ok(Value::Integer(i64::from_le_bytes(
                blob.try_into().expect("8 bytes"),
            ))),
            4 => Ok(Value::Integer(i64::from(i32::from_le_bytes(
                blob.try_into().expect("4 bytes"),
            )))),
            _ => Err("unexpected integer width"),
        },
        SyntaxKind::Boolean => {
            if blob.len() != 4 {
                return Err("unexpected boolean width");
            }
            let raw = u32::from_le_bytes(blob.try_into().expect("4 bytes"));
            Ok(Value::Boolean(raw != 0))
        }
        SyntaxKind::Guid => codec::decode_guid(blob)
            .map(Value::Guid)
            .ok_or("guid must be 16 bytes"),
        SyntaxKind::Sid => codec::decode_sid(blob).map(Value::Sid).ok_or("malformed sid"),
        SyntaxKind::Filetime => {
            if blob.len() != 8 {
                return Err("unexpected filetime width");
            }
            let raw = u64::from_le_bytes(blob.try_into().expect("8 bytes"));
            Ok(Value::Timestamp(codec::filetime_to_utc(raw)))
        }
        SyntaxKind::Dn => {
            if blob.len() < 4 || (blob.len() - 4) % 2 != 0 {
                return Err("malformed dn value");
            }
            let prefix_id = u32::from_le_bytes(blob[..4].try_into().expect("4 bytes"));
            let suffix = codec::decode_utf16le(&blob[4..]);
            schema
                .resolve_dn(prefix_id, &suffix)
                .map(Value::Dn)
                .map_err(|_| "dn prefix id out of range")
        }
        SyntaxKind::OctetString | SyntaxKind::SecurityDescriptor => {
            Ok(Value::Binary(blob.to_vec()))
        }
        SyntaxKind::Other(_) => Ok(Value::Unknown(blob.to_vec())),
    }
}

fn parse_header(bytes: &[u8], file_size: u64) -> Result<HeaderRecord, FormatError> {
    let mut cur = ByteCursor::new(bytes);
    let raw_signature = cur.read_bytes(SIGNATURE.len())?;
    if raw_signature != SIGNATURE {
        let found: String = raw_signature
            .iter()
            .map(|&b| if b == 0 { ' ' } else { b as char })
            .collect();
        return Err(FormatError::BadSignature(found.trim().to_owned()));
    }
    let version = cur.read_u32()?;
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(FormatError::UnsupportedVersion {
            found: version,
            supported: SUPPORTED_VERSIONS,
        });
    }

    let captured_at = codec::filetime_to_utc(cur.read_u64()?);
    let description = cur.read_ucstring()?;
    let server = cur.read_ucstring()?;

    let object_count = cur.read_u32()?;
    let object_offset = cur.read_u64()?;
    let attribute_count = cur.read_u32()?;
    let attribute_offset = cur.read_u64()?;
    let class_count = cur.read_u32()?;
    let class_offset = cur.read_u64()?;
    let prefix_count = cur.read_u32()?;
    let prefix_offset = cur.read_u64()?;

    for (offset, field) in [
        (object_offset, "object section offset"),
        (attribute_offset, "attribute section offset"),
        (class_offset, "class section offset"),
        (prefix_offset, "prefix table offset"),
    ] {
        if offset >= file_size {
            return Err(FormatError::CorruptSnapshot {
                offset,
                reason: field,
            });
        }
    }

    Ok(HeaderRecord {
        signature: String::from_utf8_lossy(SIGNATURE).into_owned(),
        version,
        captured_at,
        description,
        server,
        object_count,
        object_offset,
        attribute_count,
        attribute_offset,
        class_count,
        class_offset,
        prefix_count,
        prefix_offset,
        file_size,
    })
}

fn parse_schema(bytes: &[u8], header: &HeaderRecord) -> Result<Schema, FormatError> {
    let mut cur = ByteCursor::new(bytes);

    cur.seek(header.attribute_offset)?;
    let count = cur.read_u32()?;
    if count != header.attribute_count {
        return Err(FormatError::CorruptSnapshot {
            offset: header.attribute_offset,
            reason: "attribute section count does not match header",
        });
    }
    let mut attributes = Vec::with_capacity(count as usize);
    for id in 0..count {
        let name = cur.read_ucstring()?;
        let syntax = SyntaxKind::from_code(cur.read_u32()?);
        let single_valued = cur.read_u32()? != 0;
        let schema_dn = cur.read_ucstring()?;
        let schema_guid = read_guid(&mut cur)?;
        let security_guid = read_guid(&mut cur)?;
        attributes.push(AttributeDef {
            id,
            name,
            syntax,
            single_valued,
            schema_dn,
            schema_guid,
            security_guid,
        });
    }

    cur.seek(header.class_offset)?;
    let count = cur.read_u32()?;
    if count != header.class_count {
        return Err(FormatError::CorruptSnapshot {
            offset: header.class_offset,
            reason: "class section count does not match header",
        });
    }
    let mut classes = Vec::with_capacity(count as usize);
    for id in 0..count {
        let name = cur.read_ucstring()?;
        let schema_guid = read_guid(&mut cur)?;
        classes.push(ClassDef {
            id,
            name,
            schema_guid,
        });
    }

    cur.seek(header.prefix_offset)?;
    let count = cur.read_u32()?;
    if count != header.prefix_count {
        return Err(FormatError::CorruptSnapshot {
            offset: header.prefix_offset,
            reason: "prefix table count does not match header",
        });
    }
    let mut prefixes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        prefixes.push(cur.read_ucstring()?);
    }

    Ok(Schema::new(attributes, classes, prefixes))
}

fn read_guid(cur: &mut ByteCursor<'_>) -> Result<String, FormatError> {
    let raw = cur.read_bytes(16)?;
    Ok(codec::decode_guid(raw).expect("16 bytes"))
}
