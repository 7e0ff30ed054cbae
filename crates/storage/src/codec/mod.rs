//! Array body codec.
//!
//! Chunk bodies hold array elements in row-major order, little-endian:
//!
//! ```text
//! bool   -> u8 (0 or 1)
//! u8     -> u8
//! i32    -> i32 LE
//! i64    -> i64 LE
//! f32    -> f32 LE
//! f64    -> f64 LE
//! S<w>   -> w bytes of UTF-8, NUL padded
//! ```
//!
//! The element type and shape travel in the chunk metadata, never in the body.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};

use neostore_core::{ArrayData, DType, Error, NdArray, Result};

/// Encode array elements into a chunk body.
///
/// Strings are written at the array's own width (its longest element).
pub fn encode_body(array: &NdArray) -> Result<Vec<u8>> {
    let dtype = array.dtype();
    let mut out = Vec::with_capacity(array.len() * dtype.item_size());
    match array.data() {
        ArrayData::Bool(v) => {
            for &b in v {
                out.write_u8(b as u8)?;
            }
        }
        ArrayData::U8(v) => out.write_all(v)?,
        ArrayData::I32(v) => {
            for &x in v {
                out.write_i32::<LittleEndian>(x)?;
            }
        }
        ArrayData::I64(v) => {
            for &x in v {
                out.write_i64::<LittleEndian>(x)?;
            }
        }
        ArrayData::F32(v) => {
            for &x in v {
                out.write_f32::<LittleEndian>(x)?;
            }
        }
        ArrayData::F64(v) => {
            for &x in v {
                out.write_f64::<LittleEndian>(x)?;
            }
        }
        ArrayData::Str(v) => {
            let width = dtype.item_size();
            for s in v {
                out.write_all(s.as_bytes())?;
                out.resize(out.len() + width - s.len(), 0);
            }
        }
    }
    Ok(out)
}

/// Decode a chunk body of the given element type and shape.
///
/// # Errors
/// `Corruption` if the body length does not match the shape, or a string
/// element is not valid UTF-8.
pub fn decode_body(dtype: DType, shape: &[usize], body: &[u8]) -> Result<NdArray> {
    let count: usize = shape.iter().product();
    let expected = count * dtype.item_size();
    if body.len() != expected {
        return Err(Error::Corruption(format!(
            "chunk body is {} bytes, expected {} for {} x {}",
            body.len(),
            expected,
            count,
            dtype
        )));
    }

    let mut cursor = Cursor::new(body);
    let data = match dtype {
        DType::Bool => ArrayData::Bool(body.iter().map(|&b| b != 0).collect()),
        DType::U8 => ArrayData::U8(body.to_vec()),
        DType::I32 => {
            let mut v = vec![0i32; count];
            cursor.read_i32_into::<LittleEndian>(&mut v)?;
            ArrayData::I32(v)
        }
        DType::I64 => {
            let mut v = vec![0i64; count];
            cursor.read_i64_into::<LittleEndian>(&mut v)?;
            ArrayData::I64(v)
        }
        DType::F32 => {
            let mut v = vec![0f32; count];
            cursor.read_f32_into::<LittleEndian>(&mut v)?;
            ArrayData::F32(v)
        }
        DType::F64 => {
            let mut v = vec![0f64; count];
            cursor.read_f64_into::<LittleEndian>(&mut v)?;
            ArrayData::F64(v)
        }
        DType::Str(width) => {
            let width = width as usize;
            let strings = body
                .chunks(width.max(1))
                .take(count)
                .map(|raw| {
                    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                    String::from_utf8(raw[..end].to_vec())
                        .map_err(|e| Error::Corruption(format!("invalid string element: {}", e)))
                })
                .collect::<Result<Vec<_>>>()?;
            ArrayData::Str(strings)
        }
    };
    NdArray::from_shape_vec(shape.to_vec(), data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f64_body_is_little_endian() {
        let a = NdArray::from_vec(vec![1.0f64]);
        let body = encode_body(&a).unwrap();
        assert_eq!(body, 1.0f64.to_le_bytes().to_vec());
    }

    #[test]
    fn test_numeric_roundtrip_keeps_shape() {
        let a = NdArray::from_shape_vec(vec![2, 3], vec![1i32, -2, 3, -4, 5, -6]).unwrap();
        let body = encode_body(&a).unwrap();
        assert_eq!(body.len(), 24);
        let back = decode_body(DType::I32, &[2, 3], &body).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_strings_padded_to_widest() {
        let a = NdArray::from_vec(vec!["lh", "rh-ctx"]);
        assert_eq!(a.dtype(), DType::Str(6));
        let body = encode_body(&a).unwrap();
        assert_eq!(body.len(), 12);
        assert_eq!(&body[0..6], b"lh\0\0\0\0");
        let back = decode_body(DType::Str(6), &[2], &body).unwrap();
        assert_eq!(back.as_strings().unwrap(), &["lh".to_string(), "rh-ctx".to_string()]);
    }

    #[test]
    fn test_bool_roundtrip() {
        let a = NdArray::from_vec(vec![true, false, true]);
        let back = decode_body(DType::Bool, &[3], &encode_body(&a).unwrap()).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_length_mismatch_is_corruption() {
        let err = decode_body(DType::F64, &[2], &[0u8; 15]).unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));
    }

    #[test]
    fn test_invalid_utf8_is_corruption() {
        let err = decode_body(DType::Str(2), &[1], &[0xFF, 0xFE]).unwrap_err();
        assert!(matches!(err, Error::Corruption(_)));
    }
}
