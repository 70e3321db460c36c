//! Minimal NumPy `.npy` reader for 2D depth arrays
//!
//! Supports format versions 1-3, C order, and the integer/float dtypes depth
//! sensors actually produce. Shapes `(H, W)` and `(H, W, 1)` are accepted.

use std::path::Path;

use crate::error::ReadError;
use crate::raster::DepthImage;

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Element type of the stored array
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dtype {
    U8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl Dtype {
    fn parse(descr: &str) -> Result<Self, ReadError> {
        let (order, code) = descr.split_at(1.min(descr.len()));
        if order == ">" && code != "u1" && code != "i1" {
            return Err(ReadError::Malformed(format!("big-endian dtype {descr} not supported")));
        }
        match code {
            "u1" => Ok(Dtype::U8),
            "u2" => Ok(Dtype::U16),
            "i2" => Ok(Dtype::I16),
            "u4" => Ok(Dtype::U32),
            "i4" => Ok(Dtype::I32),
            "f4" => Ok(Dtype::F32),
            "f8" => Ok(Dtype::F64),
            _ => Err(ReadError::Malformed(format!("unsupported dtype {descr}"))),
        }
    }

    fn size(self) -> usize {
        match self {
            Dtype::U8 => 1,
            Dtype::U16 | Dtype::I16 => 2,
            Dtype::U32 | Dtype::I32 | Dtype::F32 => 4,
            Dtype::F64 => 8,
        }
    }

    fn decode(self, bytes: &[u8]) -> f32 {
        match self {
            Dtype::U8 => bytes[0] as f32,
            Dtype::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f32,
            Dtype::I16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f32,
            Dtype::U32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
            Dtype::I32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32,
            Dtype::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            Dtype::F64 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(&bytes[..8]);
                f64::from_le_bytes(b) as f32
            }
        }
    }
}

/// Read a depth array from a `.npy` file
pub fn read_npy_depth(path: &Path) -> Result<DepthImage, ReadError> {
    if !path.exists() {
        return Err(ReadError::Missing(path.to_path_buf()));
    }
    let bytes = std::fs::read(path)?;
    parse_npy_depth(&bytes).map_err(|e| e.in_file(path))
}

/// Parse an in-memory `.npy` payload into a depth image
pub fn parse_npy_depth(bytes: &[u8]) -> Result<DepthImage, ReadError> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(ReadError::Malformed("not an npy file".into()));
    }

    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(ReadError::Malformed("truncated npy header".into()));
            }
            (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            )
        }
        v => return Err(ReadError::Malformed(format!("unsupported npy version {v}"))),
    };

    let data_start = header_start + header_len;
    let header = bytes
        .get(header_start..data_start)
        .and_then(|h| std::str::from_utf8(h).ok())
        .ok_or_else(|| ReadError::Malformed("truncated npy header".into()))?;

    let descr = header_str_value(header, "descr")
        .ok_or_else(|| ReadError::Malformed("npy header lacks 'descr'".into()))?;
    let dtype = Dtype::parse(descr)?;

    if header_raw_value(header, "fortran_order").is_some_and(|v| v.starts_with("True")) {
        return Err(ReadError::Malformed("fortran-ordered arrays not supported".into()));
    }

    let shape = header_shape(header)?;
    let (height, width) = match shape.as_slice() {
        [h, w] | [h, w, 1] => (*h, *w),
        _ => {
            return Err(ReadError::Malformed(format!(
                "expected a 2D depth array, got shape {shape:?}"
            )));
        }
    };

    let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(ReadError::Malformed(format!(
            "npy shape {shape:?} exceeds the supported image size"
        )));
    };
    let (count, byte_len) = width
        .checked_mul(height)
        .and_then(|count| Some((count, count.checked_mul(dtype.size())?)))
        .ok_or_else(|| ReadError::Malformed(format!("npy shape {shape:?} overflows")))?;

    let payload = &bytes[data_start..];
    if payload.len() < byte_len {
        return Err(ReadError::Malformed(format!(
            "npy payload holds {} bytes, expected {}",
            payload.len(),
            byte_len
        )));
    }

    let data = payload
        .chunks_exact(dtype.size())
        .take(count)
        .map(|b| dtype.decode(b))
        .collect();

    DepthImage::new(w, h, data)
}

/// Raw text following `'key':` in the header dict
fn header_raw_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("'{key}':");
    let pos = header.find(&pattern)?;
    Some(header[pos + pattern.len()..].trim_start())
}

/// Quoted string value for `key` in the header dict
fn header_str_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let rest = header_raw_value(header, key)?;
    let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let rest = &rest[1..];
    let end = rest.find(quote)?;
    Some(&rest[..end])
}

fn header_shape(header: &str) -> Result<Vec<usize>, ReadError> {
    let rest = header_raw_value(header, "shape")
        .ok_or_else(|| ReadError::Malformed("npy header lacks 'shape'".into()))?;
    let open = rest
        .find('(')
        .ok_or_else(|| ReadError::Malformed("bad npy shape".into()))?;
    let close = rest[open..]
        .find(')')
        .ok_or_else(|| ReadError::Malformed("bad npy shape".into()))?;

    rest[open + 1..open + close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| ReadError::Malformed(format!("bad npy dimension {s:?}")))
        })
        .collect()
}

/// Encode a little-endian `.npy` v1 payload. Used by tests and tooling that
/// need to produce synthetic depth sequences.
pub fn encode_npy(descr: &str, shape: &[usize], data: &[u8]) -> Vec<u8> {
    let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
    let shape_str = if dims.len() == 1 {
        format!("({},)", dims[0])
    } else {
        format!("({})", dims.join(", "))
    };
    let mut header = format!(
        "{{'descr': '{descr}', 'fortran_order': False, 'shape': {shape_str}, }}"
    );
    // Pad so the payload starts on a 64-byte boundary, newline terminated
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (64 - unpadded % 64) % 64;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let mut out = Vec::with_capacity(10 + header.len() + data.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(data);
    out
}
