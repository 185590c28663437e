//! Minimal reader for the PX4 ULog binary format.
//!
//! Only what is needed to recover numeric datasets is decoded: format
//! definitions, subscriptions and data messages. Everything else (info,
//! parameters, log strings, sync markers, dropouts) is skipped by size.
//! Field values are widened to `f64`; fixed arrays are flattened to
//! `name[i]` and nested formats to `outer.inner`.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use tracing::{debug, warn};

use super::TelemetryError;

/// File magic: `ULog` followed by `01 12 35`.
pub const MAGIC: [u8; 7] = [0x55, 0x4c, 0x6f, 0x67, 0x01, 0x12, 0x35];

const HEADER_LEN: usize = 16;
const MSG_HEADER_LEN: usize = 3;
const MAX_NESTING: usize = 8;

const MSG_FORMAT: u8 = b'F';
const MSG_ADD_LOGGED: u8 = b'A';
const MSG_REMOVE_LOGGED: u8 = b'R';
const MSG_DATA: u8 = b'D';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Bool,
    Char,
}

impl ScalarType {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "int8_t" => ScalarType::I8,
            "uint8_t" => ScalarType::U8,
            "int16_t" => ScalarType::I16,
            "uint16_t" => ScalarType::U16,
            "int32_t" => ScalarType::I32,
            "uint32_t" => ScalarType::U32,
            "int64_t" => ScalarType::I64,
            "uint64_t" => ScalarType::U64,
            "float" => ScalarType::F32,
            "double" => ScalarType::F64,
            "bool" => ScalarType::Bool,
            "char" => ScalarType::Char,
            _ => return None,
        })
    }

    fn size(&self) -> usize {
        match self {
            ScalarType::I8 | ScalarType::U8 | ScalarType::Bool | ScalarType::Char => 1,
            ScalarType::I16 | ScalarType::U16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::I64 | ScalarType::U64 | ScalarType::F64 => 8,
        }
    }

    fn decode(&self, buf: &[u8]) -> f64 {
        match self {
            ScalarType::I8 => buf[0] as i8 as f64,
            ScalarType::U8 | ScalarType::Bool | ScalarType::Char => buf[0] as f64,
            ScalarType::I16 => LittleEndian::read_i16(buf) as f64,
            ScalarType::U16 => LittleEndian::read_u16(buf) as f64,
            ScalarType::I32 => LittleEndian::read_i32(buf) as f64,
            ScalarType::U32 => LittleEndian::read_u32(buf) as f64,
            ScalarType::I64 => LittleEndian::read_i64(buf) as f64,
            ScalarType::U64 => LittleEndian::read_u64(buf) as f64,
            ScalarType::F32 => LittleEndian::read_f32(buf) as f64,
            ScalarType::F64 => LittleEndian::read_f64(buf),
        }
    }
}

#[derive(Debug, Clone)]
struct FieldDef {
    type_name: String,
    array_len: Option<usize>,
    name: String,
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    offset: usize,
    ty: ScalarType,
}

#[derive(Debug, Clone, Default)]
struct Layout {
    /// Full size including padding, the stride of nested arrays.
    size: usize,
    columns: Vec<Column>,
}

impl Layout {
    /// Bytes a data row must carry. Writers omit trailing padding.
    fn unpadded_size(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.offset + c.ty.size())
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug)]
struct Subscription {
    dataset: usize,
    row_len: usize,
    layout: Layout,
}

/// One logged topic instance with its decoded columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub multi_id: u8,
    columns: BTreeMap<String, Vec<f64>>,
    rows: usize,
}

impl Dataset {
    pub fn field(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Timestamps in microseconds.
    pub fn timestamps(&self) -> Option<&[f64]> {
        self.field("timestamp")
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

/// A decoded ULog file.
#[derive(Debug, Clone, Default)]
pub struct ULog {
    pub version: u8,
    /// Logging start, microseconds.
    pub start_timestamp: u64,
    datasets: Vec<Dataset>,
}

impl ULog {
    /// The first instance (`multi_id == 0`) of a topic.
    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.dataset_instance(name, 0)
    }

    pub fn dataset_instance(&self, name: &str, multi_id: u8) -> Option<&Dataset> {
        self.datasets
            .iter()
            .find(|d| d.name == name && d.multi_id == multi_id)
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TelemetryError> {
        UlogReader::new(bytes).parse()
    }

    pub fn from_path(path: &std::path::Path) -> Result<Self, TelemetryError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

/// Single-pass decoder over an in-memory ULog image.
pub struct UlogReader<'a> {
    bytes: &'a [u8],
    formats: HashMap<String, Vec<FieldDef>>,
    subscriptions: HashMap<u16, Subscription>,
    log: ULog,
}

impl<'a> UlogReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            formats: HashMap::new(),
            subscriptions: HashMap::new(),
            log: ULog::default(),
        }
    }

    pub fn parse(mut self) -> Result<ULog, TelemetryError> {
        let bytes = self.bytes;
        if bytes.len() < HEADER_LEN {
            return Err(TelemetryError::Truncated {
                what: "file header",
                offset: 0,
            });
        }
        if bytes[..MAGIC.len()] != MAGIC {
            return Err(TelemetryError::BadMagic);
        }

        let mut header = Cursor::new(&bytes[MAGIC.len()..HEADER_LEN]);
        self.log.version = header.read_u8()?;
        self.log.start_timestamp = header.read_u64::<LittleEndian>()?;

        let mut offset = HEADER_LEN;
        while offset < bytes.len() {
            if offset + MSG_HEADER_LEN > bytes.len() {
                warn!(offset, "ignoring truncated trailing message header");
                break;
            }
            let size = LittleEndian::read_u16(&bytes[offset..]) as usize;
            let msg_type = bytes[offset + 2];
            let start = offset + MSG_HEADER_LEN;
            let end = start + size;
            if end > bytes.len() {
                warn!(offset, size, "ignoring truncated trailing message");
                break;
            }

            let payload = &bytes[start..end];
            match msg_type {
                MSG_FORMAT => self.on_format(payload)?,
                MSG_ADD_LOGGED => self.on_subscribe(payload, offset)?,
                MSG_REMOVE_LOGGED => self.on_unsubscribe(payload, offset)?,
                MSG_DATA => self.on_data(payload, offset)?,
                other => debug!(msg_type = %(other as char), size, "skipping message"),
            }
            offset = end;
        }

        Ok(self.log)
    }

    fn on_format(&mut self, payload: &[u8]) -> Result<(), TelemetryError> {
        let text = String::from_utf8_lossy(payload);
        let text = text.trim_end_matches('\0');
        let (name, body) = text
            .split_once(':')
            .ok_or_else(|| TelemetryError::BadFormat(text.to_string()))?;

        let mut fields = Vec::new();
        for decl in body.split(';').map(str::trim).filter(|d| !d.is_empty()) {
            let (ty, field_name) = decl
                .split_once(' ')
                .ok_or_else(|| TelemetryError::BadFormat(decl.to_string()))?;
            let (type_name, array_len) = match ty.split_once('[') {
                Some((base, rest)) => {
                    let len = rest
                        .trim_end_matches(']')
                        .parse::<usize>()
                        .map_err(|_| TelemetryError::BadFormat(decl.to_string()))?;
                    (base.to_string(), Some(len))
                }
                None => (ty.to_string(), None),
            };
            fields.push(FieldDef {
                type_name,
                array_len,
                name: field_name.trim().to_string(),
            });
        }

        self.formats.insert(name.to_string(), fields);
        Ok(())
    }

    fn on_subscribe(&mut self, payload: &[u8], offset: usize) -> Result<(), TelemetryError> {
        let mut cursor = Cursor::new(payload);
        let multi_id = cursor.read_u8().map_err(|_| truncated("subscription", offset))?;
        let msg_id = cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| truncated("subscription", offset))?;
        let mut name = String::new();
        cursor.read_to_string(&mut name)?;
        let name = name.trim_end_matches('\0').to_string();

        let layout = self.layout(&name, 0)?;
        let dataset = match self
            .log
            .datasets
            .iter()
            .position(|d| d.name == name && d.multi_id == multi_id)
        {
            Some(idx) => idx,
            None => {
                let mut columns = BTreeMap::new();
                for column in &layout.columns {
                    columns.insert(column.name.clone(), Vec::new());
                }
                self.log.datasets.push(Dataset {
                    name,
                    multi_id,
                    columns,
                    rows: 0,
                });
                self.log.datasets.len() - 1
            }
        };

        let row_len = layout.unpadded_size();
        self.subscriptions.insert(
            msg_id,
            Subscription {
                dataset,
                row_len,
                layout,
            },
        );
        Ok(())
    }

    fn on_unsubscribe(&mut self, payload: &[u8], offset: usize) -> Result<(), TelemetryError> {
        if payload.len() < 2 {
            return Err(truncated("unsubscription", offset));
        }
        self.subscriptions.remove(&LittleEndian::read_u16(payload));
        Ok(())
    }

    fn on_data(&mut self, payload: &[u8], offset: usize) -> Result<(), TelemetryError> {
        if payload.len() < 2 {
            return Err(truncated("data message", offset));
        }
        let msg_id = LittleEndian::read_u16(payload);
        let Some(sub) = self.subscriptions.get(&msg_id) else {
            debug!(msg_id, "data for unknown subscription");
            return Ok(());
        };

        let row = &payload[2..];
        if row.len() < sub.row_len {
            warn!(msg_id, offset, "dropping short data message");
            return Ok(());
        }

        let dataset = &mut self.log.datasets[sub.dataset];
        for column in &sub.layout.columns {
            let value = column.ty.decode(&row[column.offset..]);
            if let Some(values) = dataset.columns.get_mut(&column.name) {
                values.push(value);
            }
        }
        dataset.rows += 1;
        Ok(())
    }

    fn layout(&self, format: &str, depth: usize) -> Result<Layout, TelemetryError> {
        if depth > MAX_NESTING {
            return Err(TelemetryError::BadFormat(format!(
                "{format}: nesting deeper than {MAX_NESTING}"
            )));
        }
        let fields = self
            .formats
            .get(format)
            .ok_or_else(|| TelemetryError::UnknownFormat(format.to_string()))?;

        let mut layout = Layout::default();
        for field in fields {
            let count = field.array_len.unwrap_or(1);
            let padding = field.name.starts_with("_padding");

            if let Some(ty) = ScalarType::parse(&field.type_name) {
                for i in 0..count {
                    if !padding {
                        let name = match field.array_len {
                            Some(_) => format!("{}[{}]", field.name, i),
                            None => field.name.clone(),
                        };
                        layout.columns.push(Column {
                            name,
                            offset: layout.size + i * ty.size(),
                            ty,
                        });
                    }
                }
                layout.size += count * ty.size();
            } else {
                let nested = self.layout(&field.type_name, depth + 1)?;
                for i in 0..count {
                    let prefix = match field.array_len {
                        Some(_) => format!("{}[{}]", field.name, i),
                        None => field.name.clone(),
                    };
                    let base = layout.size + i * nested.size;
                    for column in &nested.columns {
                        layout.columns.push(Column {
                            name: format!("{}.{}", prefix, column.name),
                            offset: base + column.offset,
                            ty: column.ty,
                        });
                    }
                }
                layout.size += count * nested.size;
            }
        }
        Ok(layout)
    }
}

fn truncated(what: &'static str, offset: usize) -> TelemetryError {
    TelemetryError::Truncated { what, offset }
}
