use std::any::Any;

use neostore_core::{Attr, DType, Error, FieldValue, Gid, HasTraits, Link, NdArray, Result, Value};
use serde_json::json;

use crate::accessor::{DataSet, Json, Reference, Scalar};
use crate::h5file::H5File;

/// Functional connectivity dynamics of a time series
///
/// `array_data` is `(time, time, state variable, mode)`: the correlation
/// between the connectivity patterns of every pair of sliding windows.
#[derive(Debug)]
pub struct Fcd {
    /// Identity
    pub gid: Gid,
    /// Time series the matrix was computed from
    pub source: Link,
    /// Window length
    pub sw: f64,
    /// Spacing between window starts
    pub sp: f64,
    /// Correlation matrices
    pub array_data: NdArray,
    /// Name of each axis of `array_data`
    pub labels_ordering: serde_json::Value,
}

impl Default for Fcd {
    fn default() -> Self {
        Fcd {
            gid: Gid::new(),
            source: Link::Unset,
            sw: 120000.0,
            sp: 2000.0,
            array_data: NdArray::zeros(vec![0, 0, 1, 1]),
            labels_ordering: json!(["Time", "Time", "State Variable", "Mode"]),
        }
    }
}

impl HasTraits for Fcd {
    fn type_name(&self) -> &'static str {
        "Fcd"
    }

    fn gid(&self) -> Gid {
        self.gid
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        Some(match name {
            "gid" => FieldValue::Id(self.gid),
            "source" => self.source.as_field(),
            "sw" => FieldValue::Scalar(Value::Float(self.sw)),
            "sp" => FieldValue::Scalar(Value::Float(self.sp)),
            "array_data" => FieldValue::array(&self.array_data),
            "labels_ordering" => FieldValue::Json(self.labels_ordering.clone()),
            _ => return None,
        })
    }

    fn set_field(&mut self, name: &str, value: FieldValue<'static>) -> Result<()> {
        match name {
            "gid" => self.gid = value.into_gid(name)?,
            "source" => self.source = value.into_link(name)?,
            "sw" => self.sw = value.into_f64(name)?,
            "sp" => self.sp = value.into_f64(name)?,
            "array_data" => self.array_data = value.into_array(name)?,
            "labels_ordering" => self.labels_ordering = value.into_json(name)?,
            _ => return Err(Error::schema_mismatch(self.type_name(), name)),
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Container format of [`Fcd`]; the matrix is written whole
pub struct FcdH5 {
    file: H5File,
}

super::h5_format!(FcdH5, "neostore.datatypes.FcdH5");

impl FcdH5 {
    fn declare_accessors(file: &mut H5File) -> Result<()> {
        file.register(DataSet::new(
            Attr::array("array_data").dtype(DType::F64).ndim(4),
        ))?;
        file.register(Reference::new(Attr::reference("source").target("TimeSeries")))?;
        file.register(Scalar::new(Attr::float("sw").default_value(120000.0)))?;
        file.register(Scalar::new(Attr::float("sp").default_value(2000.0)))?;
        file.register(Json::new(Attr::json("labels_ordering")))
    }

    /// Cached `(min, max)` of `array_data`
    pub fn get_min_max_values(&self) -> Result<(Option<Value>, Option<Value>)> {
        let stats = self.cached_stats("array_data")?;
        Ok((stats.min, stats.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h5file::H5Format;
    use tempfile::tempdir;

    #[test]
    fn test_fcd_roundtrip_keeps_window_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Fcd_1.neo5");
        let fcd = Fcd {
            source: Link::to(Gid::new()),
            sw: 60000.0,
            array_data: NdArray::from_shape_vec(vec![2, 2, 1, 1], vec![1.0, 0.25, 0.25, 1.0])
                .unwrap(),
            ..Default::default()
        };
        {
            let mut f = FcdH5::create(&path).unwrap();
            f.store(&fcd, false).unwrap();
            f.close().unwrap();
        }

        let f = FcdH5::open_read(&path).unwrap();
        assert_eq!(
            f.get_min_max_values().unwrap(),
            (Some(Value::Float(0.25)), Some(Value::Float(1.0)))
        );
        let mut loaded = Fcd::default();
        f.load_into(&mut loaded).unwrap();
        assert_eq!(loaded.sw, 60000.0);
        assert_eq!(loaded.sp, 2000.0);
        assert_eq!(loaded.array_data, fcd.array_data);
        assert_eq!(loaded.labels_ordering[0], "Time");
    }

    #[test]
    fn test_fcd_matrix_cannot_grow() {
        let dir = tempdir().unwrap();
        let mut f = FcdH5::create(dir.path().join("fcd.neo5")).unwrap();
        let fcd = Fcd {
            source: Link::to(Gid::new()),
            array_data: NdArray::zeros(vec![2, 2, 1, 1]),
            ..Default::default()
        };
        f.store(&fcd, false).unwrap();
        let err = f.append("array_data", &fcd.array_data).unwrap_err();
        assert!(matches!(err, Error::InvalidAppend(_)));
    }
}
