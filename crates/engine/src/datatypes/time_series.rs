use std::any::Any;

use neostore_core::{
    Attr, AxisSlice, DType, DataSlice, Error, FieldValue, Gid, HasTraits, NdArray, Result, Value,
};
use serde_json::json;

use crate::accessor::{DataSet, Json, Scalar};
use crate::h5file::H5File;

/// Axis names of the 4-D `data` array
pub const DEFAULT_LABELS_ORDERING: [&str; 4] = ["Time", "State Variable", "Space", "Mode"];

/// A sampled signal of shape `(time, state variable, space, mode)`
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    /// Identity
    pub gid: Gid,
    /// Display title
    pub title: Option<String>,
    /// Samples
    pub data: NdArray,
    /// Rank of `data`
    pub nr_dimensions: i64,
    /// Name of each axis of `data`
    pub labels_ordering: serde_json::Value,
    /// Labels along named axes, keyed by axis name
    pub labels_dimensions: serde_json::Value,
    /// Sample times
    pub time: Option<NdArray>,
    /// Time of the first sample
    pub start_time: f64,
    /// Time between samples
    pub sample_period: f64,
    /// Unit of `start_time` and `sample_period`
    pub sample_period_unit: String,
    /// Samples per second, when known
    pub sample_rate: Option<f64>,
}

impl Default for TimeSeries {
    fn default() -> Self {
        TimeSeries {
            gid: Gid::new(),
            title: None,
            data: NdArray::zeros(vec![0, 1, 1, 1]),
            nr_dimensions: 4,
            labels_ordering: json!(DEFAULT_LABELS_ORDERING),
            labels_dimensions: json!({}),
            time: None,
            start_time: 0.0,
            sample_period: 1.0,
            sample_period_unit: "ms".to_string(),
            sample_rate: None,
        }
    }
}

impl TimeSeries {
    /// Time series over `data` sampled every `sample_period`
    pub fn new(data: NdArray, sample_period: f64) -> Self {
        TimeSeries {
            nr_dimensions: data.ndim() as i64,
            data,
            sample_period,
            ..Default::default()
        }
    }
}

impl HasTraits for TimeSeries {
    fn type_name(&self) -> &'static str {
        "TimeSeries"
    }

    fn gid(&self) -> Gid {
        self.gid
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        Some(match name {
            "gid" => FieldValue::Id(self.gid),
            "title" => FieldValue::optional_scalar(self.title.as_deref()),
            "data" => FieldValue::array(&self.data),
            "nr_dimensions" => FieldValue::Scalar(Value::Int(self.nr_dimensions)),
            "labels_ordering" => FieldValue::Json(self.labels_ordering.clone()),
            "labels_dimensions" => FieldValue::Json(self.labels_dimensions.clone()),
            "time" => FieldValue::optional_array(self.time.as_ref()),
            "start_time" => FieldValue::Scalar(Value::Float(self.start_time)),
            "sample_period" => FieldValue::Scalar(Value::Float(self.sample_period)),
            "sample_period_unit" => FieldValue::Scalar(Value::from(self.sample_period_unit.as_str())),
            "sample_rate" => FieldValue::optional_scalar(self.sample_rate),
            _ => return None,
        })
    }

    fn set_field(&mut self, name: &str, value: FieldValue<'static>) -> Result<()> {
        match name {
            "gid" => self.gid = value.into_gid(name)?,
            "title" => self.title = value.into_optional_string(name)?,
            "data" => self.data = value.into_array(name)?,
            "nr_dimensions" => self.nr_dimensions = value.into_i64(name)?,
            "labels_ordering" => self.labels_ordering = value.into_json(name)?,
            "labels_dimensions" => self.labels_dimensions = value.into_json(name)?,
            "time" => self.time = value.into_optional_array(name)?,
            "start_time" => self.start_time = value.into_f64(name)?,
            "sample_period" => self.sample_period = value.into_f64(name)?,
            "sample_period_unit" => self.sample_period_unit = value.into_string(name)?,
            "sample_rate" => self.sample_rate = value.into_optional_f64(name)?,
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

/// Container format of [`TimeSeries`]
///
/// `data` and `time` grow along axis 0 while a simulation streams results.
pub struct TimeSeriesH5 {
    file: H5File,
}

super::h5_format!(TimeSeriesH5, "neostore.datatypes.TimeSeriesH5");

impl TimeSeriesH5 {
    fn declare_accessors(file: &mut H5File) -> Result<()> {
        file.register(Scalar::new(Attr::string("title").optional()))?;
        file.register(DataSet::expandable(
            Attr::array("data").dtype(DType::F64).ndim(4),
            0,
        ))?;
        file.register(Scalar::new(Attr::int("nr_dimensions")))?;
        file.register(Json::new(Attr::json("labels_ordering")))?;
        file.register(Json::new(Attr::json("labels_dimensions")))?;
        file.register(DataSet::expandable(
            Attr::array("time").dtype(DType::F64).ndim(1).optional(),
            0,
        ))?;
        file.register(Scalar::new(Attr::float("start_time").default_value(0.0)))?;
        file.register(Scalar::new(Attr::float("sample_period")))?;
        file.register(Scalar::new(
            Attr::string("sample_period_unit").default_value("ms"),
        ))?;
        file.register(Scalar::new(Attr::float("sample_rate").optional()))
    }

    /// Extent of `data`
    pub fn read_data_shape(&self) -> Result<Vec<usize>> {
        self.shape("data")
    }

    /// Hyperslab of `data`
    pub fn read_data_slice(&self, slice: &DataSlice) -> Result<NdArray> {
        self.read_slice("data", slice)
    }

    /// One page of `data` along time, as a 2-D `(time, space)` array
    ///
    /// Reads `from..to` (clipped to the stored length) with `step` on the
    /// time axis and all of the space axis. Every other axis is reduced to
    /// the single position given in `specific_slices` (index per axis), or
    /// position 0.
    pub fn read_data_page(
        &self,
        from: usize,
        to: usize,
        step: Option<usize>,
        specific_slices: Option<&[usize]>,
    ) -> Result<NdArray> {
        let shape = self.read_data_shape()?;
        let step = step.unwrap_or(1);
        let axes = shape
            .iter()
            .enumerate()
            .map(|(axis, &dim)| match axis {
                0 => AxisSlice::step_range(from, to.min(dim), step),
                2 => AxisSlice::Full,
                _ => {
                    let start = specific_slices
                        .and_then(|s| s.get(axis).copied())
                        .unwrap_or(0);
                    AxisSlice::range(start, (start + 1).min(dim))
                }
            })
            .collect();
        let page = self.read_data_slice(&DataSlice::new(axes))?;
        squeeze_page(page)
    }

    /// Sample times of one page, synthesized from `start_time` and
    /// `sample_period`
    ///
    /// `max_size` caps the page length in samples and defaults to
    /// `page_size`.
    pub fn read_time_page(
        &self,
        page: usize,
        page_size: usize,
        max_size: Option<usize>,
    ) -> Result<NdArray> {
        let sample_period = self.load_field("sample_period")?.into_f64("sample_period")?;
        let start_time = self.load_field("start_time")?.into_f64("start_time")?;
        if sample_period.is_nan() || sample_period <= 0.0 {
            return Err(Error::ShapeError(format!(
                "cannot page time with sample_period {}",
                sample_period
            )));
        }
        let max_size = max_size.unwrap_or(page_size);

        let page_span = page_size as f64 * sample_period;
        let start = start_time + page as f64 * page_span;
        let end = start + page_span.min(max_size as f64 * sample_period);
        let count = ((end - start) / sample_period).ceil().max(0.0) as usize;
        let times: Vec<f64> = (0..count)
            .map(|i| start + i as f64 * sample_period)
            .collect();
        Ok(NdArray::from_vec(times))
    }

    /// Append a chunk of samples along time
    pub fn write_data_slice(&mut self, partial: &NdArray) -> Result<Vec<usize>> {
        self.append("data", partial)
    }

    /// Append sample times
    pub fn write_time_slice(&mut self, partial: &NdArray) -> Result<Vec<usize>> {
        self.append("time", partial)
    }

    /// Cached `(min, max)` of `data`
    pub fn get_min_max_values(&self) -> Result<(Option<Value>, Option<Value>)> {
        let stats = self.cached_stats("data")?;
        Ok((stats.min, stats.max))
    }
}

/// Drop length-1 axes, except that a single time step stays a row
fn squeeze_page(page: NdArray) -> Result<NdArray> {
    if page.shape().first() == Some(&1) {
        let len = page.len();
        return page.reshape(vec![1, len]);
    }
    let shape: Vec<usize> = page.shape().iter().copied().filter(|&d| d != 1).collect();
    page.reshape(shape)
}
