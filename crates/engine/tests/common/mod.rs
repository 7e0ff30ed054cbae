//! Test-local datatype with a growable 1-d dataset and a self reference

#![allow(dead_code)]

use std::any::Any;
use std::sync::Arc;

use neostore_core::{Attr, DType, Error, FieldValue, Gid, HasTraits, Link, NdArray, Result};
use neostore_engine::{DataSet, H5File, H5Format, Reference, Registry, RegistryEntry, Scalar};

pub const STREAM_WRITTEN_BY: &str = "tests.StreamH5";

/// Labelled stream of samples that may point at another stream
#[derive(Debug, Default)]
pub struct Stream {
    pub gid: Gid,
    pub label: Option<String>,
    pub values: Option<NdArray>,
    pub upstream: Link,
}

impl Stream {
    pub fn labelled(label: &str) -> Self {
        Stream {
            label: Some(label.to_string()),
            ..Default::default()
        }
    }
}

impl HasTraits for Stream {
    fn type_name(&self) -> &'static str {
        "Stream"
    }

    fn gid(&self) -> Gid {
        self.gid
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        Some(match name {
            "gid" => FieldValue::Id(self.gid),
            "label" => FieldValue::optional_scalar(self.label.as_deref()),
            "values" => FieldValue::optional_array(self.values.as_ref()),
            "upstream" => self.upstream.as_field(),
            _ => return None,
        })
    }

    fn set_field(&mut self, name: &str, value: FieldValue<'static>) -> Result<()> {
        match name {
            "gid" => self.gid = value.into_gid(name)?,
            "label" => self.label = value.into_optional_string(name)?,
            "values" => self.values = value.into_optional_array(name)?,
            "upstream" => self.upstream = value.into_link(name)?,
            _ => return Err(Error::schema_mismatch("Stream", name)),
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

pub struct StreamH5 {
    file: H5File,
}

impl H5Format for StreamH5 {
    const WRITTEN_BY: &'static str = STREAM_WRITTEN_BY;

    fn declare(file: &mut H5File) -> Result<()> {
        file.register(Scalar::new(Attr::string("label").optional()))?;
        file.register(DataSet::expandable(
            Attr::array("values").dtype(DType::F64).ndim(1).optional(),
            0,
        ))?;
        file.register(Reference::new(Attr::reference("upstream").optional()))
    }

    fn from_h5file(file: H5File) -> Self {
        StreamH5 { file }
    }

    fn h5file(&self) -> &H5File {
        &self.file
    }

    fn h5file_mut(&mut self) -> &mut H5File {
        &mut self.file
    }

    fn into_h5file(self) -> H5File {
        self.file
    }
}

/// Builtin formats plus `Stream`
pub fn registry() -> Arc<Registry> {
    let mut registry = Registry::with_builtin_formats();
    registry
        .register(RegistryEntry::of::<Stream, StreamH5>("StreamIndex"))
        .unwrap();
    Arc::new(registry)
}

pub fn array(values: &[f64]) -> NdArray {
    NdArray::from_vec(values.to_vec())
}
