//! Time series bound to a spatial support
//!
//! Each variant wraps a [`TimeSeries`] and adds references to the structure
//! its space axis runs over. Their containers extend [`TimeSeriesH5`], so the
//! page and slice helpers work unchanged.

use std::any::Any;

use neostore_core::{
    Attr, AxisSlice, DataSlice, Error, FieldValue, Gid, HasTraits, Link, NdArray, Result,
};
use serde_json::json;

use super::time_series::{TimeSeries, TimeSeriesH5};
use crate::accessor::Reference;
use crate::h5file::H5File;

macro_rules! delegate_traits {
    ($name:ident, $type_name:expr, { $($field:literal => $slot:ident),* $(,)? }) => {
        impl HasTraits for $name {
            fn type_name(&self) -> &'static str {
                $type_name
            }

            fn gid(&self) -> Gid {
                self.series.gid
            }

            fn is_a(&self, type_name: &str) -> bool {
                type_name == $type_name || type_name == "TimeSeries"
            }

            fn field(&self, name: &str) -> Option<FieldValue<'_>> {
                match name {
                    $($field => Some(self.$slot.as_field()),)*
                    _ => self.series.field(name),
                }
            }

            fn set_field(&mut self, name: &str, value: FieldValue<'static>) -> Result<()> {
                match name {
                    $($field => self.$slot = value.into_link(name)?,)*
                    _ => {
                        return self.series.set_field(name, value).map_err(|e| match e {
                            Error::SchemaMismatch { field, .. } => {
                                Error::schema_mismatch($type_name, field)
                            }
                            other => other,
                        })
                    }
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
    };
}

/// Time series over the regions of a connectivity
#[derive(Debug)]
pub struct TimeSeriesRegion {
    /// Samples and timing
    pub series: TimeSeries,
    /// Connectivity whose regions make up the space axis
    pub connectivity: Link,
    /// Volume mapping of the regions
    pub region_mapping_volume: Link,
    /// Surface mapping of the regions
    pub region_mapping: Link,
}

impl Default for TimeSeriesRegion {
    fn default() -> Self {
        TimeSeriesRegion {
            series: TimeSeries {
                labels_ordering: json!(["Time", "State Variable", "Region", "Mode"]),
                ..TimeSeries::default()
            },
            connectivity: Link::Unset,
            region_mapping_volume: Link::Unset,
            region_mapping: Link::Unset,
        }
    }
}

impl TimeSeriesRegion {
    /// Region time series over `data`, one space entry per region of `connectivity`
    pub fn new(data: NdArray, sample_period: f64, connectivity: Gid) -> Self {
        let defaults = TimeSeriesRegion::default();
        TimeSeriesRegion {
            series: TimeSeries {
                labels_ordering: defaults.series.labels_ordering.clone(),
                ..TimeSeries::new(data, sample_period)
            },
            connectivity: Link::to(connectivity),
            ..defaults
        }
    }
}

delegate_traits!(TimeSeriesRegion, "TimeSeriesRegion", {
    "connectivity" => connectivity,
    "region_mapping_volume" => region_mapping_volume,
    "region_mapping" => region_mapping,
});

/// Container format of [`TimeSeriesRegion`]
pub struct TimeSeriesRegionH5 {
    base: TimeSeriesH5,
}

super::h5_format!(TimeSeriesRegionH5 extends TimeSeriesH5, "neostore.datatypes.TimeSeriesRegionH5");

impl TimeSeriesRegionH5 {
    fn declare_accessors(file: &mut H5File) -> Result<()> {
        file.register(Reference::new(
            Attr::reference("connectivity").target("Connectivity"),
        ))?;
        file.register(Reference::new(
            Attr::reference("region_mapping_volume").optional(),
        ))?;
        file.register(Reference::new(Attr::reference("region_mapping").optional()))
    }
}

/// Time series over the vertices of a cortical surface
#[derive(Debug)]
pub struct TimeSeriesSurface {
    /// Samples and timing
    pub series: TimeSeries,
    /// Surface whose vertices make up the space axis
    pub surface: Link,
}

impl Default for TimeSeriesSurface {
    fn default() -> Self {
        TimeSeriesSurface {
            series: TimeSeries {
                labels_ordering: json!(["Time", "State Variable", "Vertex", "Mode"]),
                ..TimeSeries::default()
            },
            surface: Link::Unset,
        }
    }
}

delegate_traits!(TimeSeriesSurface, "TimeSeriesSurface", {
    "surface" => surface,
});

/// Container format of [`TimeSeriesSurface`]
pub struct TimeSeriesSurfaceH5 {
    base: TimeSeriesH5,
}

super::h5_format!(
    TimeSeriesSurfaceH5 extends TimeSeriesH5,
    "neostore.datatypes.TimeSeriesSurfaceH5"
);

impl TimeSeriesSurfaceH5 {
    fn declare_accessors(file: &mut H5File) -> Result<()> {
        file.register(Reference::new(Attr::reference("surface")))
    }
}

/// Time series over the voxels of a volume, `(time, x, y, z)`
#[derive(Debug)]
pub struct TimeSeriesVolume {
    /// Samples and timing
    pub series: TimeSeries,
    /// Volume the voxel axes index into
    pub volume: Link,
}

impl Default for TimeSeriesVolume {
    fn default() -> Self {
        TimeSeriesVolume {
            series: TimeSeries {
                labels_ordering: json!(["Time", "X", "Y", "Z"]),
                ..TimeSeries::default()
            },
            volume: Link::Unset,
        }
    }
}

delegate_traits!(TimeSeriesVolume, "TimeSeriesVolume", {
    "volume" => volume,
});

/// Container format of [`TimeSeriesVolume`]
pub struct TimeSeriesVolumeH5 {
    base: TimeSeriesH5,
}

super::h5_format!(TimeSeriesVolumeH5 extends TimeSeriesH5, "neostore.datatypes.TimeSeriesVolumeH5");

impl TimeSeriesVolumeH5 {
    fn declare_accessors(file: &mut H5File) -> Result<()> {
        file.register(Reference::new(Attr::reference("volume")))
    }

    /// Whole timeline of the voxel at `(x, y, z)`
    ///
    /// Coordinates past the volume edge are clamped to the last voxel.
    pub fn get_voxel_time_series(&self, x: usize, y: usize, z: usize) -> Result<NdArray> {
        let shape = self.read_data_shape()?;
        if shape.len() != 4 || shape[1..].contains(&0) {
            return Err(Error::ShapeError(format!(
                "voxel series needs a non-empty (time, x, y, z) array, got {:?}",
                shape
            )));
        }
        let axes = [x, y, z]
            .into_iter()
            .zip(&shape[1..])
            .map(|(c, &dim)| AxisSlice::Index(c.min(dim - 1)));
        let slice = DataSlice::new(std::iter::once(AxisSlice::Full).chain(axes).collect());
        self.read_data_slice(&slice)
    }
}
