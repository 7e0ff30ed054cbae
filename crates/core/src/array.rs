//! N-dimensional arrays
//!
//! [`NdArray`] is a row-major array with a fixed element type. It is the
//! in-memory form of every dataset field. The storage layer encodes it to
//! little-endian bytes; this module only deals with shape arithmetic,
//! selection, concatenation and extrema.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::slice::DataSlice;
use crate::value::Value;

/// Element type of an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    /// Boolean, one byte per element
    Bool,
    /// Unsigned 8-bit integer
    U8,
    /// Signed 32-bit integer
    I32,
    /// Signed 64-bit integer
    I64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Fixed-width UTF-8 string, padded with NUL bytes
    Str(u32),
}

impl DType {
    /// Bytes per element
    pub fn item_size(&self) -> usize {
        match self {
            DType::Bool | DType::U8 => 1,
            DType::I32 | DType::F32 => 4,
            DType::I64 | DType::F64 => 8,
            DType::Str(width) => *width as usize,
        }
    }

    /// Numeric types carry min/max statistics
    pub fn is_numeric(&self) -> bool {
        !matches!(self, DType::Str(_))
    }

    /// Same element kind, ignoring string width
    pub fn same_kind(&self, other: &DType) -> bool {
        match (self, other) {
            (DType::Str(_), DType::Str(_)) => true,
            (a, b) => a == b,
        }
    }

    /// Whether values of `self` convert to `to` without loss
    pub fn can_cast_to(&self, to: &DType) -> bool {
        use DType::*;
        if self.same_kind(to) {
            return true;
        }
        matches!(
            (self, to),
            (Bool, U8)
                | (Bool, I32)
                | (Bool, I64)
                | (Bool, F64)
                | (U8, I32)
                | (U8, I64)
                | (U8, F32)
                | (U8, F64)
                | (I32, I64)
                | (I32, F64)
                | (F32, F64)
        )
    }

    /// Conventional short name (`float64`, `S12`, ...)
    pub fn name(&self) -> String {
        match self {
            DType::Bool => "bool".to_string(),
            DType::U8 => "uint8".to_string(),
            DType::I32 => "int32".to_string(),
            DType::I64 => "int64".to_string(),
            DType::F32 => "float32".to_string(),
            DType::F64 => "float64".to_string(),
            DType::Str(width) => format!("S{}", width),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Flat element storage of an array
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    /// Booleans
    Bool(Vec<bool>),
    /// Unsigned bytes
    U8(Vec<u8>),
    /// 32-bit integers
    I32(Vec<i32>),
    /// 64-bit integers
    I64(Vec<i64>),
    /// 32-bit floats
    F32(Vec<f32>),
    /// 64-bit floats
    F64(Vec<f64>),
    /// Strings
    Str(Vec<String>),
}

impl ArrayData {
    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Bool(v) => v.len(),
            ArrayData::U8(v) => v.len(),
            ArrayData::I32(v) => v.len(),
            ArrayData::I64(v) => v.len(),
            ArrayData::F32(v) => v.len(),
            ArrayData::F64(v) => v.len(),
            ArrayData::Str(v) => v.len(),
        }
    }

    /// True if there are no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type. String width is the longest element in bytes (at least 1).
    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::Bool(_) => DType::Bool,
            ArrayData::U8(_) => DType::U8,
            ArrayData::I32(_) => DType::I32,
            ArrayData::I64(_) => DType::I64,
            ArrayData::F32(_) => DType::F32,
            ArrayData::F64(_) => DType::F64,
            ArrayData::Str(v) => {
                let width = v.iter().map(|s| s.len()).max().unwrap_or(0).max(1);
                DType::Str(width as u32)
            }
        }
    }

    fn take(&self, indices: &[usize]) -> ArrayData {
        fn pick<T: Clone>(v: &[T], indices: &[usize]) -> Vec<T> {
            indices.iter().map(|&i| v[i].clone()).collect()
        }
        match self {
            ArrayData::Bool(v) => ArrayData::Bool(pick(v, indices)),
            ArrayData::U8(v) => ArrayData::U8(pick(v, indices)),
            ArrayData::I32(v) => ArrayData::I32(pick(v, indices)),
            ArrayData::I64(v) => ArrayData::I64(pick(v, indices)),
            ArrayData::F32(v) => ArrayData::F32(pick(v, indices)),
            ArrayData::F64(v) => ArrayData::F64(pick(v, indices)),
            ArrayData::Str(v) => ArrayData::Str(pick(v, indices)),
        }
    }

    fn empty_like(&self) -> ArrayData {
        self.take(&[])
    }
}

impl From<Vec<bool>> for ArrayData {
    fn from(v: Vec<bool>) -> Self {
        ArrayData::Bool(v)
    }
}

impl From<Vec<u8>> for ArrayData {
    fn from(v: Vec<u8>) -> Self {
        ArrayData::U8(v)
    }
}

impl From<Vec<i32>> for ArrayData {
    fn from(v: Vec<i32>) -> Self {
        ArrayData::I32(v)
    }
}

impl From<Vec<i64>> for ArrayData {
    fn from(v: Vec<i64>) -> Self {
        ArrayData::I64(v)
    }
}

impl From<Vec<f32>> for ArrayData {
    fn from(v: Vec<f32>) -> Self {
        ArrayData::F32(v)
    }
}

impl From<Vec<f64>> for ArrayData {
    fn from(v: Vec<f64>) -> Self {
        ArrayData::F64(v)
    }
}

impl From<Vec<String>> for ArrayData {
    fn from(v: Vec<String>) -> Self {
        ArrayData::Str(v)
    }
}

impl From<Vec<&str>> for ArrayData {
    fn from(v: Vec<&str>) -> Self {
        ArrayData::Str(v.into_iter().map(str::to_string).collect())
    }
}

/// Row-major N-dimensional array
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    shape: Vec<usize>,
    data: ArrayData,
}

impl NdArray {
    /// Build from a shape and flat row-major data
    ///
    /// # Errors
    /// `ShapeError` if the shape's element count differs from the data length.
    pub fn from_shape_vec(shape: Vec<usize>, data: impl Into<ArrayData>) -> Result<Self> {
        let data = data.into();
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::ShapeError(format!(
                "shape {:?} needs {} elements, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(NdArray { shape, data })
    }

    /// One-dimensional array
    pub fn from_vec(data: impl Into<ArrayData>) -> Self {
        let data = data.into();
        NdArray {
            shape: vec![data.len()],
            data,
        }
    }

    /// Array of `shape` filled with 0.0
    pub fn zeros(shape: Vec<usize>) -> Self {
        let n = shape.iter().product();
        NdArray {
            shape,
            data: ArrayData::F64(vec![0.0; n]),
        }
    }

    /// Empty array of the given element type and shape (one axis must be zero)
    pub fn empty(dtype: DType, shape: Vec<usize>) -> Result<Self> {
        let data = match dtype {
            DType::Bool => ArrayData::Bool(Vec::new()),
            DType::U8 => ArrayData::U8(Vec::new()),
            DType::I32 => ArrayData::I32(Vec::new()),
            DType::I64 => ArrayData::I64(Vec::new()),
            DType::F32 => ArrayData::F32(Vec::new()),
            DType::F64 => ArrayData::F64(Vec::new()),
            DType::Str(_) => ArrayData::Str(Vec::new()),
        };
        NdArray::from_shape_vec(shape, data)
    }

    /// Array extent per axis
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of axes
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the array has no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element type
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Flat element storage
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Consume into flat element storage
    pub fn into_data(self) -> ArrayData {
        self.data
    }

    /// Borrow as `f64` elements, if that is the element type
    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.data {
            ArrayData::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow as `i64` elements, if that is the element type
    pub fn as_i64(&self) -> Option<&[i64]> {
        match &self.data {
            ArrayData::I64(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow as strings, if that is the element type
    pub fn as_strings(&self) -> Option<&[String]> {
        match &self.data {
            ArrayData::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Copy numeric elements out as `f64`
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        let out = match &self.data {
            ArrayData::Bool(v) => v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
            ArrayData::U8(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::I32(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::I64(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::F32(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::F64(v) => v.clone(),
            ArrayData::Str(_) => return None,
        };
        Some(out)
    }

    /// Convert to another element type
    ///
    /// # Errors
    /// `ShapeError` if the conversion is lossy (see [`DType::can_cast_to`]).
    pub fn cast(&self, to: DType) -> Result<NdArray> {
        let from = self.dtype();
        if from.same_kind(&to) {
            return Ok(self.clone());
        }
        if !from.can_cast_to(&to) {
            return Err(Error::ShapeError(format!("cannot cast {} to {}", from, to)));
        }
        let data = match (&self.data, to) {
            (ArrayData::Bool(v), DType::U8) => ArrayData::U8(v.iter().map(|&b| b as u8).collect()),
            (ArrayData::Bool(v), DType::I32) => {
                ArrayData::I32(v.iter().map(|&b| b as i32).collect())
            }
            (ArrayData::Bool(v), DType::I64) => {
                ArrayData::I64(v.iter().map(|&b| b as i64).collect())
            }
            (ArrayData::U8(v), DType::I32) => ArrayData::I32(v.iter().map(|&x| x as i32).collect()),
            (ArrayData::U8(v), DType::I64) => ArrayData::I64(v.iter().map(|&x| x as i64).collect()),
            (ArrayData::U8(v), DType::F32) => ArrayData::F32(v.iter().map(|&x| x as f32).collect()),
            (ArrayData::I32(v), DType::I64) => {
                ArrayData::I64(v.iter().map(|&x| x as i64).collect())
            }
            (_, DType::F64) => match self.to_f64_vec() {
                Some(v) => ArrayData::F64(v),
                None => return Err(Error::ShapeError(format!("cannot cast {} to {}", from, to))),
            },
            _ => return Err(Error::ShapeError(format!("cannot cast {} to {}", from, to))),
        };
        Ok(NdArray {
            shape: self.shape.clone(),
            data,
        })
    }

    /// Same data under a new shape with the same element count
    pub fn reshape(self, shape: Vec<usize>) -> Result<NdArray> {
        NdArray::from_shape_vec(shape, self.data)
    }

    /// Insert a length-1 axis at `axis`
    pub fn insert_axis(self, axis: usize) -> Result<NdArray> {
        if axis > self.shape.len() {
            return Err(Error::ShapeError(format!(
                "cannot insert axis {} into a {}-d array",
                axis,
                self.shape.len()
            )));
        }
        let mut shape = self.shape;
        shape.insert(axis, 1);
        Ok(NdArray {
            shape,
            data: self.data,
        })
    }

    /// Gather the cartesian product of per-axis position lists
    pub fn select(&self, selection: &[Vec<usize>]) -> Result<NdArray> {
        if selection.len() != self.shape.len() {
            return Err(Error::ShapeError(format!(
                "selection has {} axes but array has {} dimensions",
                selection.len(),
                self.shape.len()
            )));
        }
        for (axis, (positions, &len)) in selection.iter().zip(&self.shape).enumerate() {
            if let Some(&bad) = positions.iter().find(|&&p| p >= len) {
                return Err(Error::ShapeError(format!(
                    "position {} out of bounds for axis {} of length {}",
                    bad, axis, len
                )));
            }
        }
        let indices = gather_indices(&self.shape, selection);
        Ok(NdArray {
            shape: selection.iter().map(Vec::len).collect(),
            data: self.data.take(&indices),
        })
    }

    /// Sub-array described by a hyperslab selection
    pub fn slice(&self, slice: &DataSlice) -> Result<NdArray> {
        let selection = slice.resolve(&self.shape)?;
        let selected = self.select(&selection)?;
        let dropped = slice.dropped_axes();
        if dropped.is_empty() {
            return Ok(selected);
        }
        let shape = selected
            .shape
            .iter()
            .enumerate()
            .filter(|(axis, _)| !dropped.contains(axis))
            .map(|(_, &len)| len)
            .collect();
        selected.reshape(shape)
    }

    /// Concatenate arrays along `axis`
    ///
    /// All parts must have the same number of dimensions, the same extent on
    /// every other axis, and the same element kind.
    pub fn concat(axis: usize, parts: &[&NdArray]) -> Result<NdArray> {
        let first = parts
            .first()
            .ok_or_else(|| Error::ShapeError("nothing to concatenate".to_string()))?;
        let ndim = first.ndim();
        if axis >= ndim {
            return Err(Error::ShapeError(format!(
                "axis {} out of range for {}-d arrays",
                axis, ndim
            )));
        }
        let dtype = first.dtype();
        let mut shape = first.shape.clone();
        shape[axis] = 0;
        for part in parts {
            if part.ndim() != ndim {
                return Err(Error::ShapeError(format!(
                    "cannot concatenate {}-d and {}-d arrays",
                    ndim,
                    part.ndim()
                )));
            }
            if !part.dtype().same_kind(&dtype) {
                return Err(Error::ShapeError(format!(
                    "cannot concatenate {} and {} arrays",
                    dtype,
                    part.dtype()
                )));
            }
            for (i, (&a, &b)) in first.shape.iter().zip(&part.shape).enumerate() {
                if i != axis && a != b {
                    return Err(Error::ShapeError(format!(
                        "extent mismatch on axis {}: {} vs {}",
                        i, a, b
                    )));
                }
            }
            shape[axis] += part.shape[axis];
        }

        let outer: usize = first.shape[..axis].iter().product();
        let inner: usize = first.shape[axis + 1..].iter().product();
        let blocks: Vec<usize> = parts.iter().map(|p| p.shape[axis] * inner).collect();

        let data = match &first.data {
            ArrayData::Bool(_) => ArrayData::Bool(concat_parts(parts, &blocks, outer, |d| match d {
                ArrayData::Bool(v) => Some(v.as_slice()),
                _ => None,
            })?),
            ArrayData::U8(_) => ArrayData::U8(concat_parts(parts, &blocks, outer, |d| match d {
                ArrayData::U8(v) => Some(v.as_slice()),
                _ => None,
            })?),
            ArrayData::I32(_) => ArrayData::I32(concat_parts(parts, &blocks, outer, |d| match d {
                ArrayData::I32(v) => Some(v.as_slice()),
                _ => None,
            })?),
            ArrayData::I64(_) => ArrayData::I64(concat_parts(parts, &blocks, outer, |d| match d {
                ArrayData::I64(v) => Some(v.as_slice()),
                _ => None,
            })?),
            ArrayData::F32(_) => ArrayData::F32(concat_parts(parts, &blocks, outer, |d| match d {
                ArrayData::F32(v) => Some(v.as_slice()),
                _ => None,
            })?),
            ArrayData::F64(_) => ArrayData::F64(concat_parts(parts, &blocks, outer, |d| match d {
                ArrayData::F64(v) => Some(v.as_slice()),
                _ => None,
            })?),
            ArrayData::Str(_) => ArrayData::Str(concat_parts(parts, &blocks, outer, |d| match d {
                ArrayData::Str(v) => Some(v.as_slice()),
                _ => None,
            })?),
        };
        NdArray::from_shape_vec(shape, data)
    }

    /// Minimum and maximum element
    ///
    /// Returns `None` for string and empty arrays. A NaN anywhere in a float
    /// array makes both extrema NaN.
    pub fn min_max(&self) -> Option<(Value, Value)> {
        if self.is_empty() {
            return None;
        }
        match &self.data {
            ArrayData::Bool(v) => {
                let min = v.iter().all(|&b| b);
                let max = v.iter().any(|&b| b);
                Some((Value::Bool(min), Value::Bool(max)))
            }
            ArrayData::U8(v) => int_extrema(v.iter().map(|&x| x as i64)),
            ArrayData::I32(v) => int_extrema(v.iter().map(|&x| x as i64)),
            ArrayData::I64(v) => int_extrema(v.iter().copied()),
            ArrayData::F32(v) => float_extrema(v.iter().map(|&x| x as f64)),
            ArrayData::F64(v) => float_extrema(v.iter().copied()),
            ArrayData::Str(_) => None,
        }
    }

    /// Empty array with this array's element type and the given shape
    pub fn empty_like(&self, shape: Vec<usize>) -> Result<NdArray> {
        NdArray::from_shape_vec(shape, self.data.empty_like())
    }
}

fn int_extrema(mut iter: impl Iterator<Item = i64>) -> Option<(Value, Value)> {
    let first = iter.next()?;
    let (min, max) = iter.fold((first, first), |(lo, hi), x| (lo.min(x), hi.max(x)));
    Some((Value::Int(min), Value::Int(max)))
}

fn float_extrema(iter: impl Iterator<Item = f64>) -> Option<(Value, Value)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for x in iter {
        if x.is_nan() {
            return Some((Value::Float(f64::NAN), Value::Float(f64::NAN)));
        }
        min = min.min(x);
        max = max.max(x);
    }
    Some((Value::Float(min), Value::Float(max)))
}

fn concat_parts<T: Clone>(
    parts: &[&NdArray],
    blocks: &[usize],
    outer: usize,
    view: impl Fn(&ArrayData) -> Option<&[T]>,
) -> Result<Vec<T>> {
    let slices = parts
        .iter()
        .map(|p| view(&p.data).ok_or_else(|| Error::ShapeError("element type mismatch".to_string())))
        .collect::<Result<Vec<_>>>()?;
    let total: usize = blocks.iter().sum::<usize>() * outer;
    let mut out = Vec::with_capacity(total);
    for o in 0..outer {
        for (slice, &block) in slices.iter().zip(blocks) {
            out.extend_from_slice(&slice[o * block..(o + 1) * block]);
        }
    }
    Ok(out)
}

/// Flat row-major indices of the cartesian product of `selection` in `shape`
fn gather_indices(shape: &[usize], selection: &[Vec<usize>]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    let total: usize = selection.iter().map(Vec::len).product();
    let mut out = Vec::with_capacity(total);
    if total == 0 {
        return out;
    }
    let mut pos = vec![0usize; shape.len()];
    loop {
        let flat = pos
            .iter()
            .zip(selection)
            .zip(&strides)
            .map(|((&p, positions), &stride)| positions[p] * stride)
            .sum();
        out.push(flat);

        let mut axis = shape.len();
        loop {
            if axis == 0 {
                return out;
            }
            axis -= 1;
            pos[axis] += 1;
            if pos[axis] < selection[axis].len() {
                break;
            }
            pos[axis] = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::AxisSlice;
    use proptest::prelude::*;

    fn arange(shape: Vec<usize>) -> NdArray {
        let n: usize = shape.iter().product();
        NdArray::from_shape_vec(shape, (0..n).map(|x| x as f64).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn test_shape_must_match_len() {
        assert!(NdArray::from_shape_vec(vec![2, 3], vec![1.0f64; 5]).is_err());
        assert!(NdArray::from_shape_vec(vec![2, 3], vec![1.0f64; 6]).is_ok());
    }

    #[test]
    fn test_scalar_array_has_one_element() {
        let a = NdArray::from_shape_vec(vec![], vec![7i64]).unwrap();
        assert_eq!(a.ndim(), 0);
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_string_dtype_width() {
        let a = NdArray::from_vec(vec!["ana", "are", "mere"]);
        assert_eq!(a.dtype(), DType::Str(4));
        assert!(!a.dtype().is_numeric());
    }

    #[test]
    fn test_min_max_float() {
        let a = NdArray::from_vec(vec![3.0, -1.5, 2.0]);
        assert_eq!(a.min_max(), Some((Value::Float(-1.5), Value::Float(3.0))));
    }

    #[test]
    fn test_min_max_int_is_exact() {
        let big = i64::MAX - 1;
        let a = NdArray::from_vec(vec![big, 0, -4]);
        assert_eq!(a.min_max(), Some((Value::Int(-4), Value::Int(big))));
    }

    #[test]
    fn test_min_max_absent_for_strings_and_empty() {
        assert_eq!(NdArray::from_vec(vec!["a"]).min_max(), None);
        assert_eq!(NdArray::from_vec(Vec::<f64>::new()).min_max(), None);
    }

    #[test]
    fn test_min_max_nan_propagates() {
        let a = NdArray::from_vec(vec![1.0, f64::NAN]);
        match a.min_max() {
            Some((Value::Float(lo), Value::Float(hi))) => assert!(lo.is_nan() && hi.is_nan()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_slice_2d() {
        let a = arange(vec![3, 4]);
        let s = a
            .slice(&DataSlice::new(vec![AxisSlice::range(1, 3), AxisSlice::step_range(0, 4, 2)]))
            .unwrap();
        assert_eq!(s.shape(), &[2, 2]);
        assert_eq!(s.as_f64().unwrap(), &[4.0, 6.0, 8.0, 10.0]);
    }

    #[test]
    fn test_slice_index_drops_axis() {
        let a = arange(vec![2, 3]);
        let s = a.slice(&DataSlice::new(vec![AxisSlice::Index(1)])).unwrap();
        assert_eq!(s.shape(), &[3]);
        assert_eq!(s.as_f64().unwrap(), &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_concat_axis1() {
        let a = arange(vec![2, 2]);
        let b = NdArray::from_shape_vec(vec![2, 1], vec![10.0, 20.0]).unwrap();
        let c = NdArray::concat(1, &[&a, &b]).unwrap();
        assert_eq!(c.shape(), &[2, 3]);
        assert_eq!(c.as_f64().unwrap(), &[0.0, 1.0, 10.0, 2.0, 3.0, 20.0]);
    }

    #[test]
    fn test_concat_rejects_mismatch() {
        let a = arange(vec![2, 2]);
        let b = arange(vec![3, 1]);
        assert!(NdArray::concat(1, &[&a, &b]).is_err());
        let c = NdArray::from_shape_vec(vec![2, 1], vec![1i64, 2]).unwrap();
        assert!(NdArray::concat(1, &[&a, &c]).is_err());
    }

    #[test]
    fn test_cast_widening_only() {
        let a = NdArray::from_vec(vec![1i32, 2]);
        let f = a.cast(DType::F64).unwrap();
        assert_eq!(f.as_f64().unwrap(), &[1.0, 2.0]);
        let b = NdArray::from_vec(vec![1.5f64]);
        assert!(b.cast(DType::I64).is_err());
    }

    #[test]
    fn test_insert_axis() {
        let a = NdArray::from_vec(vec![1.0, 2.0]).insert_axis(0).unwrap();
        assert_eq!(a.shape(), &[1, 2]);
    }

    proptest! {
        #[test]
        fn prop_concat_then_slice_recovers_parts(rows_a in 0usize..5, rows_b in 0usize..5, cols in 1usize..4) {
            let a = arange(vec![rows_a, cols]);
            let b = arange(vec![rows_b, cols]);
            let c = NdArray::concat(0, &[&a, &b]).unwrap();
            prop_assert_eq!(c.shape(), &[rows_a + rows_b, cols][..]);
            let head = c.slice(&DataSlice::new(vec![AxisSlice::range(0, rows_a)])).unwrap();
            let tail = c.slice(&DataSlice::new(vec![AxisSlice::from(rows_a)])).unwrap();
            prop_assert_eq!(head, a);
            prop_assert_eq!(tail, b);
        }

        #[test]
        fn prop_full_slice_is_identity(d0 in 1usize..4, d1 in 1usize..4, d2 in 1usize..4) {
            let a = arange(vec![d0, d1, d2]);
            prop_assert_eq!(a.slice(&DataSlice::all()).unwrap(), a);
        }
    }
}
