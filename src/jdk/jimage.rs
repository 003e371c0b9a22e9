//! Reader for the resource directory of a packed JDK image (`lib/modules`)
//!
//! Layout, all integers in the byte order announced by the magic:
//!
//! ```text
//! header     magic, version, flags, resource count, table length,
//!            locations size, strings size (7 x u32)
//! redirect   table length x i32
//! offsets    table length x u32   (offset of each location)
//! locations  locations size bytes (attribute streams)
//! strings    strings size bytes   (NUL-terminated)
//! ```
//!
//! Resource payloads follow the index and are never read here.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::ModuleError;

const MAGIC: u32 = 0xCAFE_DADA;
const MAJOR_VERSION: u32 = 1;
const HEADER_SIZE: usize = 7 * 4;

const ATTRIBUTE_END: usize = 0;
const ATTRIBUTE_MODULE: usize = 1;
const ATTRIBUTE_PARENT: usize = 2;
const ATTRIBUTE_BASE: usize = 3;
const ATTRIBUTE_EXTENSION: usize = 4;
const ATTRIBUTE_COUNT: usize = 8;

type ModuleTable = HashMap<String, Vec<String>>;

/// A packed image, decoded lazily on first lookup
#[derive(Debug)]
pub struct JImage {
    path: PathBuf,
    modules: OnceLock<Result<ModuleTable, String>>,
}

impl JImage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            modules: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resource names of `module`, relative to the module root
    pub fn module_entries(&self, module: &str) -> Result<Option<Vec<String>>, ModuleError> {
        let table = self
            .modules
            .get_or_init(|| read_module_table(&self.path).map_err(|err| err.to_string()));

        match table {
            Ok(table) => Ok(table.get(module).cloned()),
            Err(reason) => Err(ModuleError::Malformed {
                path: self.path.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

fn read_module_table(path: &Path) -> Result<ModuleTable, ModuleError> {
    let io_error = |source| ModuleError::Io {
        path: path.to_path_buf(),
        source,
    };
    let malformed = |reason: &str| ModuleError::Malformed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let file = File::open(path).map_err(io_error)?;
    let file_size = file.metadata().map_err(io_error)?.len();
    let mut reader = BufReader::new(file);
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).map_err(io_error)?;

    let order = ByteOrder::detect(&header[..4]).ok_or_else(|| malformed("bad magic"))?;
    let field = |index: usize| order.u32(&header[index * 4..index * 4 + 4]);

    let version = field(1);
    if version >> 16 != MAJOR_VERSION {
        return Err(malformed(&format!("unsupported version {}.{}", version >> 16, version & 0xFFFF)));
    }

    let table_length = u64::from(field(4));
    let locations_size = u64::from(field(5));
    let strings_size = u64::from(field(6));

    // Header sizes are untrusted until checked against the file itself
    let index_size = table_length
        .checked_mul(8)
        .and_then(|tables| tables.checked_add(locations_size))
        .and_then(|size| size.checked_add(strings_size))
        .filter(|size| *size <= file_size.saturating_sub(HEADER_SIZE as u64))
        .ok_or_else(|| malformed("index larger than file"))?;

    let index_size = usize::try_from(index_size).map_err(|_| malformed("index larger than file"))?;
    let redirect_size = table_length as usize * 4;
    let offsets_size = redirect_size;
    let locations_size = locations_size as usize;

    let mut index = Vec::new();
    reader
        .take(index_size as u64)
        .read_to_end(&mut index)
        .map_err(io_error)?;
    if index.len() != index_size {
        return Err(malformed("truncated index"));
    }

    let offsets = &index[redirect_size..redirect_size + offsets_size];
    let locations = &index[redirect_size + offsets_size..redirect_size + offsets_size + locations_size];
    let strings = &index[redirect_size + offsets_size + locations_size..];

    let mut table = ModuleTable::new();
    for slot in offsets.chunks_exact(4) {
        let offset = order.u32(slot) as usize;
        let attributes = decode_location(locations, offset).ok_or_else(|| malformed("bad location"))?;

        let module = string_at(strings, attributes[ATTRIBUTE_MODULE]).ok_or_else(|| malformed("bad string offset"))?;
        let parent = string_at(strings, attributes[ATTRIBUTE_PARENT]).ok_or_else(|| malformed("bad string offset"))?;
        let base = string_at(strings, attributes[ATTRIBUTE_BASE]).ok_or_else(|| malformed("bad string offset"))?;
        let extension =
            string_at(strings, attributes[ATTRIBUTE_EXTENSION]).ok_or_else(|| malformed("bad string offset"))?;

        if module.is_empty() || base.is_empty() {
            continue;
        }

        let mut name = String::with_capacity(parent.len() + base.len() + extension.len() + 2);
        if !parent.is_empty() {
            name.push_str(&parent);
            name.push('/');
        }
        name.push_str(&base);
        if !extension.is_empty() {
            name.push('.');
            name.push_str(&extension);
        }

        table.entry(module).or_default().push(name);
    }

    Ok(table)
}

/// Decodes the attribute stream at `offset`
///
/// Each attribute starts with a byte `kind << 3 | (length - 1)` followed by
/// `length` big-endian value bytes. Kind 0 ends the stream.
fn decode_location(locations: &[u8], offset: usize) -> Option<[u64; ATTRIBUTE_COUNT]> {
    let mut attributes = [0u64; ATTRIBUTE_COUNT];
    let mut position = offset;

    loop {
        let byte = *locations.get(position)?;
        position += 1;

        let kind = (byte >> 3) as usize;
        if kind == ATTRIBUTE_END {
            return Some(attributes);
        }
        if kind >= ATTRIBUTE_COUNT {
            return None;
        }

        let length = (byte & 0x7) as usize + 1;
        let bytes = locations.get(position..position + length)?;
        attributes[kind] = bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        position += length;
    }
}

fn string_at(strings: &[u8], offset: u64) -> Option<String> {
    let tail = strings.get(usize::try_from(offset).ok()?..)?;
    let end = tail.iter().position(|b| *b == 0)?;
    Some(String::from_utf8_lossy(&tail[..end]).into_owned())
}

#[derive(Debug, Clone, Copy)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn detect(magic: &[u8]) -> Option<Self> {
        if ByteOrder::Little.u32(magic) == MAGIC {
            Some(ByteOrder::Little)
        } else if ByteOrder::Big.u32(magic) == MAGIC {
            Some(ByteOrder::Big)
        } else {
            None
        }
    }

    fn u32(self, bytes: &[u8]) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[..4]);
        match self {
            ByteOrder::Little => u32::from_le_bytes(raw),
            ByteOrder::Big => u32::from_be_bytes(raw),
        }
    }
}

/// Writes a minimal packed image, enough for the reader above
#[cfg(test)]
pub(crate) fn write_test_image(path: &Path, resources: &[&str]) {
    let mut strings = vec![0u8];
    let mut interned: HashMap<String, u64> = HashMap::new();
    let mut intern = |value: &str, strings: &mut Vec<u8>| -> u64 {
        if value.is_empty() {
            return 0;
        }
        *interned.entry(value.to_string()).or_insert_with(|| {
            let offset = strings.len() as u64;
            strings.extend_from_slice(value.as_bytes());
            strings.push(0);
            offset
        })
    };

    let mut locations = Vec::new();
    let mut offsets = Vec::new();
    for resource in resources {
        // "/module/parent/dirs/base.ext"
        let trimmed = resource.trim_start_matches('/');
        let (module, rest) = trimmed.split_once('/').unwrap();
        let (parent, file) = rest.rsplit_once('/').unwrap_or(("", rest));
        let (base, extension) = file.rsplit_once('.').unwrap_or((file, ""));

        offsets.push(locations.len() as u32);
        for (kind, value) in [
            (ATTRIBUTE_MODULE, intern(module, &mut strings)),
            (ATTRIBUTE_PARENT, intern(parent, &mut strings)),
            (ATTRIBUTE_BASE, intern(base, &mut strings)),
            (ATTRIBUTE_EXTENSION, intern(extension, &mut strings)),
        ] {
            if value == 0 {
                continue;
            }
            let bytes = value.to_be_bytes();
            let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
            let length = 8 - skip;
            locations.push(((kind as u8) << 3) | (length as u8 - 1));
            locations.extend_from_slice(&bytes[skip..]);
        }
        locations.push(0);
    }

    let mut image = Vec::new();
    for value in [
        MAGIC,
        MAJOR_VERSION << 16,
        0,
        resources.len() as u32,
        resources.len() as u32,
        locations.len() as u32,
        strings.len() as u32,
    ] {
        image.extend_from_slice(&value.to_le_bytes());
    }
    for _ in resources {
        image.extend_from_slice(&0i32.to_le_bytes());
    }
    for offset in offsets {
        image.extend_from_slice(&offset.to_le_bytes());
    }
    image.extend_from_slice(&locations);
    image.extend_from_slice(&strings);
    image.extend_from_slice(b"resource payloads");

    std::fs::write(path, image).unwrap();
}
