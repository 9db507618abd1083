//! MATLAB Level 5 MAT-file reading and writing.
//!
//! Covers what decoding inputs and outputs need: numeric arrays of any class
//! (read as `f64`), char arrays, structs and cells, plus `miCOMPRESSED`
//! (zlib) elements as written by MATLAB's default `-v7` save. HDF5-based v7.3
//! files are rejected. Files are written little-endian, numeric data as
//! doubles.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use ndarray::{Array2, ShapeBuilder};

const HEADER_LEN: usize = 128;
const HEADER_TEXT_LEN: usize = 116;

// Data element types.
const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;
const MI_UTF8: u32 = 16;
const MI_UTF16: u32 = 17;

// Array classes.
const MX_CELL: u8 = 1;
const MX_STRUCT: u8 = 2;
const MX_OBJECT: u8 = 3;
const MX_CHAR: u8 = 4;
const MX_SPARSE: u8 = 5;
const MX_DOUBLE: u8 = 6;
const MX_UINT64: u8 = 15;

const FLAG_COMPLEX: u32 = 0x0800;
const FLAG_LOGICAL: u32 = 0x0200;

/// Longest field name MATLAB accepts.
const MAX_FIELD_NAME: usize = 63;

#[derive(Debug, thiserror::Error)]
pub enum MatError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file is too short to be a MAT-file ({0} bytes)")]
    Truncated(usize),

    #[error("unrecognised MAT-file endian indicator {0:?}")]
    BadEndianIndicator([u8; 2]),

    #[error("MAT-file version 7.3 (HDF5) is not supported; re-save with -v7")]
    Hdf5Unsupported,

    #[error("unsupported MAT-file version 0x{0:04x}")]
    UnsupportedVersion(u16),

    #[error("data element at byte {offset} overruns its container")]
    ElementOverrun { offset: usize },

    #[error("expected {expected} element, found type {found}")]
    UnexpectedElement { expected: &'static str, found: u32 },

    #[error("data type {0} is not numeric")]
    NonNumericData(u32),

    #[error("array '{name}' has {found} values but dimensions {dims:?}")]
    DimensionMismatch {
        name: String,
        dims: Vec<usize>,
        found: usize,
    },

    #[error("negative dimension {0}")]
    NegativeDimension(i64),

    #[error("array dimensions {0:?} overflow the addressable element count")]
    TooLarge(Vec<usize>),

    #[error("field name '{0}' is empty, too long or not ASCII")]
    BadFieldName(String),

    #[error("struct has {fields} field names but {values} values per element")]
    FieldCountMismatch { fields: usize, values: usize },

    #[error("cannot write {0}")]
    Unwritable(String),
}

/// A decoded MATLAB value.
#[derive(Debug, Clone, PartialEq)]
pub enum MatValue {
    Numeric(NumericArray),
    Char(String),
    Struct(StructArray),
    Cell(CellArray),
    /// Sparse, object, complex or otherwise unhandled content.
    Unsupported(String),
}

impl MatValue {
    pub fn kind(&self) -> &'static str {
        match self {
            MatValue::Numeric(_) => "numeric array",
            MatValue::Char(_) => "char array",
            MatValue::Struct(_) => "struct",
            MatValue::Cell(_) => "cell array",
            MatValue::Unsupported(_) => "unsupported value",
        }
    }

    pub fn as_numeric(&self) -> Option<&NumericArray> {
        match self {
            MatValue::Numeric(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructArray> {
        match self {
            MatValue::Struct(s) => Some(s),
            _ => None,
        }
    }
}

/// Real numeric array in column-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    pub dims: Vec<usize>,
    pub data: Vec<f64>,
    /// Stored as a MATLAB logical.
    pub logical: bool,
}

impl NumericArray {
    pub fn new(dims: Vec<usize>, data: Vec<f64>) -> Self {
        NumericArray {
            dims,
            data,
            logical: false,
        }
    }

    pub fn scalar(value: f64) -> Self {
        Self::new(vec![1, 1], vec![value])
    }

    /// 1×n row vector.
    pub fn row(values: Vec<f64>) -> Self {
        Self::new(vec![1, values.len()], values)
    }

    /// n×1 column vector.
    pub fn column(values: Vec<f64>) -> Self {
        Self::new(vec![values.len(), 1], values)
    }

    pub fn from_array2(a: &Array2<f64>) -> Self {
        let (rows, cols) = a.dim();
        // t() of a row-major view iterates in column-major order.
        let data: Vec<f64> = a.t().iter().copied().collect();
        Self::new(vec![rows, cols], data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// At most one dimension longer than 1.
    pub fn is_vector(&self) -> bool {
        self.dims.iter().filter(|&&d| d != 1).count() <= 1
    }

    /// The array as rows × cols, or `None` if it is not two-dimensional.
    pub fn to_array2(&self) -> Option<Array2<f64>> {
        match self.dims.as_slice() {
            [rows, cols] => Array2::from_shape_vec((*rows, *cols).f(), self.data.clone()).ok(),
            _ => None,
        }
    }
}

/// Struct array: `elements[i][f]` is field `f` of element `i` (column-major).
#[derive(Debug, Clone, PartialEq)]
pub struct StructArray {
    pub dims: Vec<usize>,
    pub field_names: Vec<String>,
    pub elements: Vec<Vec<MatValue>>,
}

impl StructArray {
    /// 1×1 struct from (name, value) pairs.
    pub fn scalar(fields: Vec<(String, MatValue)>) -> Self {
        let (field_names, values) = fields.into_iter().unzip();
        StructArray {
            dims: vec![1, 1],
            field_names,
            elements: vec![values],
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.elements.len() == 1
    }

    pub fn field(&self, element: usize, name: &str) -> Option<&MatValue> {
        let idx = self.field_names.iter().position(|f| f == name)?;
        self.elements.get(element)?.get(idx)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellArray {
    pub dims: Vec<usize>,
    pub cells: Vec<MatValue>,
}

/// Named top-level variables in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatFile {
    pub header_text: String,
    pub variables: Vec<(String, MatValue)>,
}

impl MatFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: MatValue) {
        self.variables.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&MatValue> {
        self.variables.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

pub fn read_mat(path: impl AsRef<Path>) -> Result<MatFile, MatError> {
    let bytes = fs::read(path)?;
    parse_mat(&bytes)
}

pub fn parse_mat(bytes: &[u8]) -> Result<MatFile, MatError> {
    if bytes.len() < HEADER_LEN {
        return Err(MatError::Truncated(bytes.len()));
    }
    let endian = match &bytes[126..128] {
        b"IM" => Endian::Little,
        b"MI" => Endian::Big,
        other => return Err(MatError::BadEndianIndicator([other[0], other[1]])),
    };
    match endian.u16(&bytes[124..126]) {
        0x0100 => {}
        0x0200 => return Err(MatError::Hdf5Unsupported),
        v => return Err(MatError::UnsupportedVersion(v)),
    }
    let header_text = String::from_utf8_lossy(&bytes[..HEADER_TEXT_LEN])
        .trim_end_matches(|c: char| c == ' ' || c == '\0')
        .to_string();

    let mut reader = ElementReader::new(&bytes[HEADER_LEN..], endian, HEADER_LEN);
    let mut variables = Vec::new();
    while !reader.is_done() {
        let element = reader.next_element()?;
        match element.data_type {
            MI_MATRIX => variables.push(parse_matrix(element.data, endian, element.offset)?),
            MI_COMPRESSED => {
                let mut inflated = Vec::new();
                ZlibDecoder::new(element.data).read_to_end(&mut inflated)?;
                let mut inner = ElementReader::new(&inflated, endian, 0);
                while !inner.is_done() {
                    let el = inner.next_element()?;
                    if el.data_type == MI_MATRIX {
                        variables.push(parse_matrix(el.data, endian, el.offset)?);
                    } else {
                        log::debug!("skipping compressed element of type {}", el.data_type);
                    }
                }
            }
            other => log::debug!("skipping top-level element of type {}", other),
        }
    }

    Ok(MatFile {
        header_text,
        variables,
    })
}

#[derive(Debug, Clone, Copy)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn u16(self, b: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(b),
            Endian::Big => BigEndian::read_u16(b),
        }
    }

    fn u32(self, b: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(b),
            Endian::Big => BigEndian::read_u32(b),
        }
    }

    fn i16(self, b: &[u8]) -> i16 {
        match self {
            Endian::Little => LittleEndian::read_i16(b),
            Endian::Big => BigEndian::read_i16(b),
        }
    }

    fn i32(self, b: &[u8]) -> i32 {
        match self {
            Endian::Little => LittleEndian::read_i32(b),
            Endian::Big => BigEndian::read_i32(b),
        }
    }

    fn i64(self, b: &[u8]) -> i64 {
        match self {
            Endian::Little => LittleEndian::read_i64(b),
            Endian::Big => BigEndian::read_i64(b),
        }
    }

    fn u64(self, b: &[u8]) -> u64 {
        match self {
            Endian::Little => LittleEndian::read_u64(b),
            Endian::Big => BigEndian::read_u64(b),
        }
    }

    fn f32(self, b: &[u8]) -> f32 {
        match self {
            Endian::Little => LittleEndian::read_f32(b),
            Endian::Big => BigEndian::read_f32(b),
        }
    }

    fn f64(self, b: &[u8]) -> f64 {
        match self {
            Endian::Little => LittleEndian::read_f64(b),
            Endian::Big => BigEndian::read_f64(b),
        }
    }
}

struct Element<'a> {
    data_type: u32,
    data: &'a [u8],
    /// Absolute byte offset of the tag, for error messages.
    offset: usize,
}

struct ElementReader<'a> {
    buf: &'a [u8],
    pos: usize,
    endian: Endian,
    base: usize,
}

impl<'a> ElementReader<'a> {
    fn new(buf: &'a [u8], endian: Endian, base: usize) -> Self {
        ElementReader {
            buf,
            pos: 0,
            endian,
            base,
        }
    }

    /// Trailing padding shorter than a tag counts as the end.
    fn is_done(&self) -> bool {
        self.buf.len().saturating_sub(self.pos) < 8
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], MatError> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.buf.len()).ok_or(
            MatError::ElementOverrun {
                offset: self.base + self.pos,
            },
        )?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn next_element(&mut self) -> Result<Element<'a>, MatError> {
        let offset = self.base + self.pos;
        let first = self.endian.u32(self.take(4)?);

        // Small data element: size in the upper half-word, data in the
        // following four bytes.
        if first >> 16 != 0 {
            let data_type = first & 0xffff;
            let n_bytes = (first >> 16) as usize;
            let packed = self.take(4)?;
            if n_bytes > 4 {
                return Err(MatError::ElementOverrun { offset });
            }
            return Ok(Element {
                data_type,
                data: &packed[..n_bytes],
                offset,
            });
        }

        let data_type = first;
        let n_bytes = self.endian.u32(self.take(4)?) as usize;
        let data = self.take(n_bytes)?;
        if data_type != MI_COMPRESSED {
            let pad = (8 - n_bytes % 8) % 8;
            // The last element of a file may omit its padding.
            let pad = pad.min(self.buf.len() - self.pos);
            self.take(pad)?;
        }
        Ok(Element {
            data_type,
            data,
            offset,
        })
    }

    fn next_of(&mut self, expected: &'static str, types: &[u32]) -> Result<Element<'a>, MatError> {
        let el = self.next_element()?;
        if !types.contains(&el.data_type) {
            return Err(MatError::UnexpectedElement {
                expected,
                found: el.data_type,
            });
        }
        Ok(el)
    }
}

fn parse_matrix(data: &[u8], endian: Endian, offset: usize) -> Result<(String, MatValue), MatError> {
    if data.is_empty() {
        return Ok((String::new(), MatValue::Numeric(NumericArray::new(vec![0, 0], Vec::new()))));
    }
    let mut r = ElementReader::new(data, endian, offset + 8);

    let flags_el = r.next_of("array flags", &[MI_UINT32])?;
    if flags_el.data.len() < 4 {
        return Err(MatError::ElementOverrun { offset: flags_el.offset });
    }
    let flags = endian.u32(&flags_el.data[..4]);
    let class = (flags & 0xff) as u8;

    let dims_el = r.next_of("dimensions", &[MI_INT32])?;
    let dims = dims_el
        .data
        .chunks_exact(4)
        .map(|c| {
            let d = endian.i32(c);
            usize::try_from(d).map_err(|_| MatError::NegativeDimension(d as i64))
        })
        .collect::<Result<Vec<usize>, _>>()?;
    let count = element_count(&dims).ok_or_else(|| MatError::TooLarge(dims.clone()))?;
    // Every nested array needs at least an 8-byte tag.
    let max_nested = data.len() / 8;

    let name_el = r.next_of("array name", &[MI_INT8, MI_UINT8])?;
    let name = String::from_utf8_lossy(name_el.data).into_owned();

    let value = match class {
        MX_CELL => {
            let mut cells = Vec::with_capacity(count.min(max_nested));
            for _ in 0..count {
                let el = r.next_of("cell element", &[MI_MATRIX])?;
                cells.push(parse_matrix(el.data, endian, el.offset)?.1);
            }
            MatValue::Cell(CellArray { dims, cells })
        }
        MX_STRUCT => {
            let len_el = r.next_of("field name length", &[MI_INT32])?;
            if len_el.data.len() < 4 {
                return Err(MatError::ElementOverrun { offset: len_el.offset });
            }
            let name_len = endian.i32(&len_el.data[..4]).max(1) as usize;
            let names_el = r.next_of("field names", &[MI_INT8, MI_UINT8])?;
            let field_names: Vec<String> = names_el
                .data
                .chunks(name_len)
                .map(|chunk| {
                    let end = chunk.iter().position(|&b| b == 0).unwrap_or(chunk.len());
                    String::from_utf8_lossy(&chunk[..end]).into_owned()
                })
                .collect();

            let mut elements = Vec::with_capacity(count.min(max_nested));
            for _ in 0..count {
                let mut values = Vec::with_capacity(field_names.len());
                for _ in 0..field_names.len() {
                    let el = r.next_of("struct field", &[MI_MATRIX])?;
                    values.push(parse_matrix(el.data, endian, el.offset)?.1);
                }
                elements.push(values);
            }
            MatValue::Struct(StructArray {
                dims,
                field_names,
                elements,
            })
        }
        MX_CHAR => {
            let el = r.next_element()?;
            MatValue::Char(decode_chars(el.data_type, el.data, endian)?)
        }
        MX_OBJECT => MatValue::Unsupported(format!("object array '{}'", name)),
        MX_SPARSE => MatValue::Unsupported(format!("sparse array '{}'", name)),
        MX_DOUBLE..=MX_UINT64 => {
            if flags & FLAG_COMPLEX != 0 {
                MatValue::Unsupported(format!("complex array '{}'", name))
            } else {
                let el = r.next_element()?;
                let values = decode_numeric(el.data_type, el.data, endian)?;
                if values.len() != count {
                    return Err(MatError::DimensionMismatch {
                        name,
                        dims,
                        found: values.len(),
                    });
                }
                MatValue::Numeric(NumericArray {
                    dims,
                    data: values,
                    logical: flags & FLAG_LOGICAL != 0,
                })
            }
        }
        other => MatValue::Unsupported(format!("array class {} for '{}'", other, name)),
    };
    Ok((name, value))
}

fn element_count(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

fn element_size(data_type: u32) -> Option<usize> {
    match data_type {
        MI_INT8 | MI_UINT8 | MI_UTF8 => Some(1),
        MI_INT16 | MI_UINT16 | MI_UTF16 => Some(2),
        MI_INT32 | MI_UINT32 | MI_SINGLE => Some(4),
        MI_DOUBLE | MI_INT64 | MI_UINT64 => Some(8),
        _ => None,
    }
}

fn decode_numeric(data_type: u32, bytes: &[u8], endian: Endian) -> Result<Vec<f64>, MatError> {
    if matches!(data_type, MI_UTF8 | MI_UTF16) {
        return Err(MatError::NonNumericData(data_type));
    }
    let size = element_size(data_type).ok_or(MatError::NonNumericData(data_type))?;
    let values = bytes
        .chunks_exact(size)
        .map(|c| match data_type {
            MI_INT8 => c[0] as i8 as f64,
            MI_UINT8 => c[0] as f64,
            MI_INT16 => endian.i16(c) as f64,
            MI_UINT16 => endian.u16(c) as f64,
            MI_INT32 => endian.i32(c) as f64,
            MI_UINT32 => endian.u32(c) as f64,
            MI_SINGLE => endian.f32(c) as f64,
            MI_INT64 => endian.i64(c) as f64,
            MI_UINT64 => endian.u64(c) as f64,
            _ => endian.f64(c),
        })
        .collect();
    Ok(values)
}

fn decode_chars(data_type: u32, bytes: &[u8], endian: Endian) -> Result<String, MatError> {
    match data_type {
        MI_UTF8 | MI_UINT8 | MI_INT8 => Ok(String::from_utf8_lossy(bytes).into_owned()),
        MI_UTF16 | MI_UINT16 => {
            let units: Vec<u16> = bytes.chunks_exact(2).map(|c| endian.u16(c)).collect();
            Ok(String::from_utf16_lossy(&units))
        }
        other => Err(MatError::UnexpectedElement {
            expected: "character data",
            found: other,
        }),
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

pub fn write_mat(path: impl AsRef<Path>, file: &MatFile, compress: bool) -> Result<(), MatError> {
    let bytes = encode_mat(file, compress)?;
    fs::write(path, bytes)?;
    Ok(())
}

pub fn encode_mat(file: &MatFile, compress: bool) -> Result<Vec<u8>, MatError> {
    let mut out = Vec::new();
    let text = if file.header_text.is_empty() {
        "MATLAB 5.0 MAT-file, Platform: rust, Created by: mad-decoding"
    } else {
        file.header_text.as_str()
    };
    let mut header = text.as_bytes().to_vec();
    header.resize(HEADER_TEXT_LEN, b' ');
    out.extend_from_slice(&header);
    out.extend_from_slice(&[0u8; 8]);
    out.write_u16::<LittleEndian>(0x0100)?;
    out.extend_from_slice(b"IM");

    for (name, value) in &file.variables {
        let element = matrix_element(name, value)?;
        if compress {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&element)?;
            let packed = encoder.finish()?;
            out.write_u32::<LittleEndian>(MI_COMPRESSED)?;
            out.write_u32::<LittleEndian>(element_len(packed.len())?)?;
            out.extend_from_slice(&packed);
        } else {
            out.extend_from_slice(&element);
        }
    }
    Ok(out)
}

/// Element byte counts are stored in 32 bits.
fn element_len(len: usize) -> Result<u32, MatError> {
    u32::try_from(len).map_err(|_| MatError::Unwritable(format!("data element of {} bytes", len)))
}

fn write_sub(out: &mut Vec<u8>, data_type: u32, bytes: &[u8]) -> Result<(), MatError> {
    out.write_u32::<LittleEndian>(data_type)?;
    out.write_u32::<LittleEndian>(element_len(bytes.len())?)?;
    out.extend_from_slice(bytes);
    let pad = (8 - bytes.len() % 8) % 8;
    out.extend(std::iter::repeat(0u8).take(pad));
    Ok(())
}

fn header_subelements(body: &mut Vec<u8>, class: u8, dims: &[usize], name: &str) -> Result<(), MatError> {
    let mut flags = Vec::with_capacity(8);
    flags.write_u32::<LittleEndian>(class as u32)?;
    flags.write_u32::<LittleEndian>(0)?;
    write_sub(body, MI_UINT32, &flags)?;

    let mut dim_bytes = Vec::with_capacity(dims.len() * 4);
    for &d in dims {
        let d = i32::try_from(d).map_err(|_| MatError::Unwritable(format!("dimension {}", d)))?;
        dim_bytes.write_i32::<LittleEndian>(d)?;
    }
    write_sub(body, MI_INT32, &dim_bytes)?;
    write_sub(body, MI_INT8, name.as_bytes())
}

fn matrix_element(name: &str, value: &MatValue) -> Result<Vec<u8>, MatError> {
    let mut body = Vec::new();
    match value {
        MatValue::Numeric(n) => {
            let count = element_count(&n.dims);
            if count != Some(n.data.len()) || n.dims.len() < 2 {
                return Err(MatError::DimensionMismatch {
                    name: name.to_string(),
                    dims: n.dims.clone(),
                    found: n.data.len(),
                });
            }
            header_subelements(&mut body, MX_DOUBLE, &n.dims, name)?;
            let mut data = Vec::with_capacity(n.data.len() * 8);
            for &v in &n.data {
                data.write_f64::<LittleEndian>(v)?;
            }
            write_sub(&mut body, MI_DOUBLE, &data)?;
        }
        MatValue::Char(s) => {
            let units: Vec<u16> = s.encode_utf16().collect();
            header_subelements(&mut body, MX_CHAR, &[1, units.len()], name)?;
            let mut data = Vec::with_capacity(units.len() * 2);
            for u in units {
                data.write_u16::<LittleEndian>(u)?;
            }
            write_sub(&mut body, MI_UINT16, &data)?;
        }
        MatValue::Struct(s) => {
            for f in &s.field_names {
                if f.is_empty() || f.len() > MAX_FIELD_NAME || !f.is_ascii() {
                    return Err(MatError::BadFieldName(f.clone()));
                }
            }
            header_subelements(&mut body, MX_STRUCT, &s.dims, name)?;
            let name_len = s.field_names.iter().map(|f| f.len()).max().unwrap_or(0) + 1;
            let mut len_bytes = Vec::with_capacity(4);
            len_bytes.write_i32::<LittleEndian>(name_len as i32)?;
            write_sub(&mut body, MI_INT32, &len_bytes)?;
            let mut names = vec![0u8; name_len * s.field_names.len()];
            for (i, f) in s.field_names.iter().enumerate() {
                names[i * name_len..i * name_len + f.len()].copy_from_slice(f.as_bytes());
            }
            write_sub(&mut body, MI_INT8, &names)?;
            for element in &s.elements {
                if element.len() != s.field_names.len() {
                    return Err(MatError::FieldCountMismatch {
                        fields: s.field_names.len(),
                        values: element.len(),
                    });
                }
                for v in element {
                    body.extend_from_slice(&matrix_element("", v)?);
                }
            }
        }
        MatValue::Cell(c) => {
            header_subelements(&mut body, MX_CELL, &c.dims, name)?;
            for v in &c.cells {
                body.extend_from_slice(&matrix_element("", v)?);
            }
        }
        MatValue::Unsupported(what) => return Err(MatError::Unwritable(what.clone())),
    }

    let mut out = Vec::with_capacity(body.len() + 8);
    out.write_u32::<LittleEndian>(MI_MATRIX)?;
    out.write_u32::<LittleEndian>(element_len(body.len())?)?;
    out.extend_from_slice(&body);
    Ok(out)
}
