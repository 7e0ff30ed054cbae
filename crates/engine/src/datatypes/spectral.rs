use std::any::Any;

use neostore_core::{
    Attr, AxisSlice, DType, DataSlice, Error, FieldValue, Gid, HasTraits, Link, NdArray, Result,
    Value,
};

use crate::accessor::{DataSet, Reference, Scalar};
use crate::h5file::H5File;

/// Power spectrum of a time series
///
/// Arrays are laid out `(frequency, state variable, space, mode)`, the
/// averaged powers included.
#[derive(Debug)]
pub struct FourierSpectrum {
    /// Identity
    pub gid: Gid,
    /// Time series the spectrum was computed from
    pub source: Link,
    /// Length of the analysed segments
    pub segment_length: Option<f64>,
    /// Window applied before the transform
    pub windowing_function: Option<String>,
    /// Raw spectrum
    pub array_data: NdArray,
    /// Amplitude of `array_data`
    pub amplitude: Option<NdArray>,
    /// Phase of `array_data`
    pub phase: Option<NdArray>,
    /// Power of `array_data`
    pub power: Option<NdArray>,
    /// Power averaged over segments
    pub average_power: Option<NdArray>,
    /// `average_power` normalised per node
    pub normalised_average_power: Option<NdArray>,
}

impl Default for FourierSpectrum {
    fn default() -> Self {
        FourierSpectrum {
            gid: Gid::new(),
            source: Link::Unset,
            segment_length: None,
            windowing_function: None,
            array_data: NdArray::zeros(vec![0, 1, 0, 1]),
            amplitude: None,
            phase: None,
            power: None,
            average_power: None,
            normalised_average_power: None,
        }
    }
}

impl FourierSpectrum {
    /// Spectrum of `source` holding only raw data
    pub fn new(source: Gid, array_data: NdArray) -> Self {
        FourierSpectrum {
            source: Link::to(source),
            array_data,
            ..Default::default()
        }
    }
}

impl HasTraits for FourierSpectrum {
    fn type_name(&self) -> &'static str {
        "FourierSpectrum"
    }

    fn gid(&self) -> Gid {
        self.gid
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        Some(match name {
            "gid" => FieldValue::Id(self.gid),
            "source" => self.source.as_field(),
            "segment_length" => FieldValue::optional_scalar(self.segment_length),
            "windowing_function" => FieldValue::optional_scalar(self.windowing_function.as_deref()),
            "array_data" => FieldValue::array(&self.array_data),
            "amplitude" => FieldValue::optional_array(self.amplitude.as_ref()),
            "phase" => FieldValue::optional_array(self.phase.as_ref()),
            "power" => FieldValue::optional_array(self.power.as_ref()),
            "average_power" => FieldValue::optional_array(self.average_power.as_ref()),
            "normalised_average_power" => {
                FieldValue::optional_array(self.normalised_average_power.as_ref())
            }
            _ => return None,
        })
    }

    fn set_field(&mut self, name: &str, value: FieldValue<'static>) -> Result<()> {
        match name {
            "gid" => self.gid = value.into_gid(name)?,
            "source" => self.source = value.into_link(name)?,
            "segment_length" => self.segment_length = value.into_optional_f64(name)?,
            "windowing_function" => self.windowing_function = value.into_optional_string(name)?,
            "array_data" => self.array_data = value.into_array(name)?,
            "amplitude" => self.amplitude = value.into_optional_array(name)?,
            "phase" => self.phase = value.into_optional_array(name)?,
            "power" => self.power = value.into_optional_array(name)?,
            "average_power" => self.average_power = value.into_optional_array(name)?,
            "normalised_average_power" => {
                self.normalised_average_power = value.into_optional_array(name)?
            }
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

/// Container format of [`FourierSpectrum`], growing along the space axis
pub struct FourierSpectrumH5 {
    file: H5File,
}

super::h5_format!(FourierSpectrumH5, "neostore.datatypes.FourierSpectrumH5");

const FOURIER_DERIVED: [&str; 5] = [
    "amplitude",
    "phase",
    "power",
    "average_power",
    "normalised_average_power",
];

/// Averaged power of one state variable and mode, ready for plotting
#[derive(Debug, Clone, PartialEq)]
pub struct FourierView {
    /// `(space, frequency)` matrix
    pub data_matrix: NdArray,
    /// Smallest value of `data_matrix`
    pub ymin: f64,
    /// Largest value of `data_matrix`
    pub ymax: f64,
}

impl FourierSpectrumH5 {
    fn declare_accessors(file: &mut H5File) -> Result<()> {
        file.register(DataSet::expandable(
            Attr::array("array_data").dtype(DType::F64).ndim(4),
            2,
        ))?;
        file.register(Reference::new(Attr::reference("source").target("TimeSeries")))?;
        file.register(Scalar::new(Attr::float("segment_length").optional()))?;
        file.register(Scalar::new(Attr::string("windowing_function").optional()))?;
        for name in FOURIER_DERIVED {
            file.register(DataSet::expandable(
                Attr::array(name).dtype(DType::F64).ndim(4).optional(),
                2,
            ))?;
        }
        Ok(())
    }

    /// Append one partial result
    ///
    /// `array_data` is always appended; each derived array only when the
    /// caller computed it.
    pub fn write_data_slice(&mut self, partial: &FourierSpectrum) -> Result<()> {
        self.append("array_data", &partial.array_data)?;
        let derived = [
            ("amplitude", &partial.amplitude),
            ("phase", &partial.phase),
            ("power", &partial.power),
            ("average_power", &partial.average_power),
            ("normalised_average_power", &partial.normalised_average_power),
        ];
        for (name, chunk) in derived {
            if let Some(chunk) = chunk {
                self.append(name, chunk)?;
            }
        }
        Ok(())
    }

    /// Cached `(min, max)` of `array_data`
    pub fn get_min_max_values(&self) -> Result<(Option<Value>, Option<Value>)> {
        let stats = self.cached_stats("array_data")?;
        Ok((stats.min, stats.max))
    }

    /// Averaged power at one state variable and mode, one row per node
    ///
    /// Reads `normalised_average_power` when `normalized`, `average_power`
    /// otherwise.
    ///
    /// # Errors
    /// `ShapeError` if the selection is empty.
    pub fn get_fourier_data(
        &self,
        state: usize,
        mode: usize,
        normalized: bool,
    ) -> Result<FourierView> {
        let field = if normalized {
            "normalised_average_power"
        } else {
            "average_power"
        };
        let shape = self.shape(field)?;
        if shape.len() != 4 {
            return Err(Error::ShapeError(format!("{} has shape {:?}", field, shape)));
        }
        let slice = DataSlice::new(vec![
            AxisSlice::Full,
            AxisSlice::range(state, (state + 1).min(shape[1])),
            AxisSlice::Full,
            AxisSlice::range(mode, (mode + 1).min(shape[3])),
        ]);
        let values = self
            .read_slice(field, &slice)?
            .to_f64_vec()
            .unwrap_or_default();
        let (freqs, nodes) = (shape[0], shape[2]);
        if values.is_empty() || values.len() != freqs * nodes {
            return Err(Error::ShapeError(format!(
                "no {} at state {} and mode {} in shape {:?}",
                field, state, mode, shape
            )));
        }

        let transposed: Vec<f64> = (0..nodes)
            .flat_map(|node| (0..freqs).map(move |freq| freq * nodes + node))
            .map(|i| values[i])
            .collect();
        let (ymin, ymax) = extrema(&transposed);
        Ok(FourierView {
            data_matrix: NdArray::from_shape_vec(vec![nodes, freqs], transposed)?,
            ymin,
            ymax,
        })
    }
}

fn extrema(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// Wavelet transform of a time series, `(scale, time, node, mode)`
#[derive(Debug)]
pub struct WaveletCoefficients {
    /// Identity
    pub gid: Gid,
    /// Time series the transform was computed from
    pub source: Link,
    /// Mother wavelet
    pub mother: String,
    /// Time between coefficients
    pub sample_period: f64,
    /// Frequency of each scale
    pub frequencies: Option<NdArray>,
    /// Normalisation of the coefficients
    pub normalisation: String,
    /// Ratio of the wavelet centre frequency to its spread
    pub q_ratio: f64,
    /// Coefficients
    pub array_data: NdArray,
    /// Amplitude of `array_data`
    pub amplitude: Option<NdArray>,
    /// Phase of `array_data`
    pub phase: Option<NdArray>,
    /// Power of `array_data`
    pub power: Option<NdArray>,
}

impl Default for WaveletCoefficients {
    fn default() -> Self {
        WaveletCoefficients {
            gid: Gid::new(),
            source: Link::Unset,
            mother: "morlet".to_string(),
            sample_period: 0.0,
            frequencies: None,
            normalisation: "energy".to_string(),
            q_ratio: 5.0,
            array_data: NdArray::zeros(vec![0, 0, 0, 0]),
            amplitude: None,
            phase: None,
            power: None,
        }
    }
}

impl HasTraits for WaveletCoefficients {
    fn type_name(&self) -> &'static str {
        "WaveletCoefficients"
    }

    fn gid(&self) -> Gid {
        self.gid
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        Some(match name {
            "gid" => FieldValue::Id(self.gid),
            "source" => self.source.as_field(),
            "mother" => FieldValue::Scalar(Value::from(self.mother.as_str())),
            "sample_period" => FieldValue::Scalar(Value::Float(self.sample_period)),
            "frequencies" => FieldValue::optional_array(self.frequencies.as_ref()),
            "normalisation" => FieldValue::Scalar(Value::from(self.normalisation.as_str())),
            "q_ratio" => FieldValue::Scalar(Value::Float(self.q_ratio)),
            "array_data" => FieldValue::array(&self.array_data),
            "amplitude" => FieldValue::optional_array(self.amplitude.as_ref()),
            "phase" => FieldValue::optional_array(self.phase.as_ref()),
            "power" => FieldValue::optional_array(self.power.as_ref()),
            _ => return None,
        })
    }

    fn set_field(&mut self, name: &str, value: FieldValue<'static>) -> Result<()> {
        match name {
            "gid" => self.gid = value.into_gid(name)?,
            "source" => self.source = value.into_link(name)?,
            "mother" => self.mother = value.into_string(name)?,
            "sample_period" => self.sample_period = value.into_f64(name)?,
            "frequencies" => self.frequencies = value.into_optional_array(name)?,
            "normalisation" => self.normalisation = value.into_string(name)?,
            "q_ratio" => self.q_ratio = value.into_f64(name)?,
            "array_data" => self.array_data = value.into_array(name)?,
            "amplitude" => self.amplitude = value.into_optional_array(name)?,
            "phase" => self.phase = value.into_optional_array(name)?,
            "power" => self.power = value.into_optional_array(name)?,
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

/// Container format of [`WaveletCoefficients`], growing along the node axis
pub struct WaveletCoefficientsH5 {
    file: H5File,
}

super::h5_format!(WaveletCoefficientsH5, "neostore.datatypes.WaveletCoefficientsH5");

impl WaveletCoefficientsH5 {
    fn declare_accessors(file: &mut H5File) -> Result<()> {
        file.register(DataSet::expandable(
            Attr::array("array_data").dtype(DType::F64).ndim(4),
            2,
        ))?;
        file.register(Reference::new(Attr::reference("source").target("TimeSeries")))?;
        file.register(Scalar::new(Attr::string("mother").default_value("morlet")))?;
        file.register(Scalar::new(Attr::float("sample_period")))?;
        file.register(DataSet::new(
            Attr::array("frequencies").dtype(DType::F64).ndim(1).optional(),
        ))?;
        file.register(Scalar::new(
            Attr::string("normalisation").default_value("energy"),
        ))?;
        file.register(Scalar::new(Attr::float("q_ratio").default_value(5.0)))?;
        for name in ["amplitude", "phase", "power"] {
            file.register(DataSet::expandable(
                Attr::array(name).dtype(DType::F64).ndim(4).optional(),
                2,
            ))?;
        }
        Ok(())
    }

    /// Append one partial result, derived arrays only when present
    pub fn write_data_slice(&mut self, partial: &WaveletCoefficients) -> Result<()> {
        self.append("array_data", &partial.array_data)?;
        let derived = [
            ("amplitude", &partial.amplitude),
            ("phase", &partial.phase),
            ("power", &partial.power),
        ];
        for (name, chunk) in derived {
            if let Some(chunk) = chunk {
                self.append(name, chunk)?;
            }
        }
        Ok(())
    }

    /// Cached `(min, max)` of `array_data`
    pub fn get_min_max_values(&self) -> Result<(Option<Value>, Option<Value>)> {
        let stats = self.cached_stats("array_data")?;
        Ok((stats.min, stats.max))
    }
}

/// Coherence between node pairs, `(node, node, frequency, mode)`
#[derive(Debug)]
pub struct CoherenceSpectrum {
    /// Identity
    pub gid: Gid,
    /// Time series the spectrum was computed from
    pub source: Link,
    /// Transform length
    pub nfft: i64,
    /// Coherence values
    pub array_data: NdArray,
    /// Frequencies of the third axis
    pub frequency: Option<NdArray>,
}

impl Default for CoherenceSpectrum {
    fn default() -> Self {
        CoherenceSpectrum {
            gid: Gid::new(),
            source: Link::Unset,
            nfft: 256,
            array_data: NdArray::zeros(vec![0, 0, 0, 0]),
            frequency: None,
        }
    }
}

impl HasTraits for CoherenceSpectrum {
    fn type_name(&self) -> &'static str {
        "CoherenceSpectrum"
    }

    fn gid(&self) -> Gid {
        self.gid
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        Some(match name {
            "gid" => FieldValue::Id(self.gid),
            "source" => self.source.as_field(),
            "nfft" => FieldValue::Scalar(Value::Int(self.nfft)),
            "array_data" => FieldValue::array(&self.array_data),
            "frequency" => FieldValue::optional_array(self.frequency.as_ref()),
            _ => return None,
        })
    }

    fn set_field(&mut self, name: &str, value: FieldValue<'static>) -> Result<()> {
        match name {
            "gid" => self.gid = value.into_gid(name)?,
            "source" => self.source = value.into_link(name)?,
            "nfft" => self.nfft = value.into_i64(name)?,
            "array_data" => self.array_data = value.into_array(name)?,
            "frequency" => self.frequency = value.into_optional_array(name)?,
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

/// Container format of [`CoherenceSpectrum`], growing along the mode axis
pub struct CoherenceSpectrumH5 {
    file: H5File,
}

super::h5_format!(CoherenceSpectrumH5, "neostore.datatypes.CoherenceSpectrumH5");

impl CoherenceSpectrumH5 {
    fn declare_accessors(file: &mut H5File) -> Result<()> {
        file.register(DataSet::expandable(
            Attr::array("array_data").dtype(DType::F64).ndim(4),
            3,
        ))?;
        file.register(Reference::new(Attr::reference("source").target("TimeSeries")))?;
        file.register(Scalar::new(Attr::int("nfft").default_value(256)))?;
        file.register(DataSet::new(
            Attr::array("frequency").dtype(DType::F64).ndim(1).optional(),
        ))
    }

    /// Append one partial result's `array_data`
    pub fn write_data_slice(&mut self, partial: &CoherenceSpectrum) -> Result<Vec<usize>> {
        self.append("array_data", &partial.array_data)
    }

    /// Cached `(min, max)` of `array_data`
    pub fn get_min_max_values(&self) -> Result<(Option<Value>, Option<Value>)> {
        let stats = self.cached_stats("array_data")?;
        Ok((stats.min, stats.max))
    }
}

/// Complex coherence between node pairs
///
/// Arrays are laid out `(node, node, frequency, 2)`; the last axis holds the
/// real and imaginary parts.
#[derive(Debug)]
pub struct ComplexCoherenceSpectrum {
    /// Identity
    pub gid: Gid,
    /// Time series the spectrum was computed from
    pub source: Link,
    /// Cross spectral density
    pub cross_spectrum: NdArray,
    /// Complex coherence
    pub array_data: NdArray,
    /// Length of the epochs the series was cut into
    pub epoch_length: f64,
    /// Length of the analysed segments
    pub segment_length: f64,
    /// Window applied before the transform
    pub windowing_function: Option<String>,
}

impl Default for ComplexCoherenceSpectrum {
    fn default() -> Self {
        ComplexCoherenceSpectrum {
            gid: Gid::new(),
            source: Link::Unset,
            cross_spectrum: NdArray::zeros(vec![0, 0, 0, 2]),
            array_data: NdArray::zeros(vec![0, 0, 0, 2]),
            epoch_length: 0.0,
            segment_length: 0.0,
            windowing_function: None,
        }
    }
}

impl HasTraits for ComplexCoherenceSpectrum {
    fn type_name(&self) -> &'static str {
        "ComplexCoherenceSpectrum"
    }

    fn gid(&self) -> Gid {
        self.gid
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        Some(match name {
            "gid" => FieldValue::Id(self.gid),
            "source" => self.source.as_field(),
            "cross_spectrum" => FieldValue::array(&self.cross_spectrum),
            "array_data" => FieldValue::array(&self.array_data),
            "epoch_length" => FieldValue::Scalar(Value::Float(self.epoch_length)),
            "segment_length" => FieldValue::Scalar(Value::Float(self.segment_length)),
            "windowing_function" => FieldValue::optional_scalar(self.windowing_function.as_deref()),
            _ => return None,
        })
    }

    fn set_field(&mut self, name: &str, value: FieldValue<'static>) -> Result<()> {
        match name {
            "gid" => self.gid = value.into_gid(name)?,
            "source" => self.source = value.into_link(name)?,
            "cross_spectrum" => self.cross_spectrum = value.into_array(name)?,
            "array_data" => self.array_data = value.into_array(name)?,
            "epoch_length" => self.epoch_length = value.into_f64(name)?,
            "segment_length" => self.segment_length = value.into_f64(name)?,
            "windowing_function" => self.windowing_function = value.into_optional_string(name)?,
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

/// Which part of the complex coherence a summary is computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumKind {
    /// Imaginary part, distinct node pairs only
    Imaginary,
    /// Real part, every node pair
    Real,
    /// Magnitude, every node pair
    Absolute,
}

/// Mean and spread of a coherence spectrum per frequency
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumView {
    /// Mean over node pairs
    pub average: Vec<f64>,
    /// Population standard deviation over node pairs
    pub std_dev: Vec<f64>,
    /// Smallest `average - std_dev`
    pub ymin: f64,
    /// Largest `average + std_dev`
    pub ymax: f64,
}

/// Container format of [`ComplexCoherenceSpectrum`], growing along frequency
pub struct ComplexCoherenceSpectrumH5 {
    file: H5File,
}

super::h5_format!(ComplexCoherenceSpectrumH5, "neostore.datatypes.ComplexCoherenceSpectrumH5");

impl ComplexCoherenceSpectrumH5 {
    fn declare_accessors(file: &mut H5File) -> Result<()> {
        file.register(DataSet::expandable(
            Attr::array("cross_spectrum").dtype(DType::F64).ndim(4),
            2,
        ))?;
        file.register(DataSet::expandable(
            Attr::array("array_data").dtype(DType::F64).ndim(4),
            2,
        ))?;
        file.register(Reference::new(Attr::reference("source").target("TimeSeries")))?;
        file.register(Scalar::new(Attr::float("epoch_length")))?;
        file.register(Scalar::new(Attr::float("segment_length")))?;
        file.register(Scalar::new(Attr::string("windowing_function").optional()))
    }

    /// Append one partial result's `cross_spectrum` and `array_data`
    pub fn write_data_slice(&mut self, partial: &ComplexCoherenceSpectrum) -> Result<()> {
        self.append("cross_spectrum", &partial.cross_spectrum)?;
        self.append("array_data", &partial.array_data)?;
        Ok(())
    }

    /// Cached `(min, max)` of `array_data`
    pub fn get_min_max_values(&self) -> Result<(Option<Value>, Option<Value>)> {
        let stats = self.cached_stats("array_data")?;
        Ok((stats.min, stats.max))
    }

    /// Mean and standard deviation over node pairs at each frequency
    ///
    /// # Errors
    /// `ShapeError` if `array_data` is not `(n, n, freq, 2)` or leaves no
    /// node pair to summarise.
    pub fn get_spectrum_data(&self, kind: SpectrumKind) -> Result<SpectrumView> {
        let shape = self.shape("array_data")?;
        if shape.len() != 4 || shape[0] != shape[1] || shape[3] != 2 {
            return Err(Error::ShapeError(format!(
                "complex coherence needs (n, n, freq, 2), got {:?}",
                shape
            )));
        }
        let (nodes, freqs) = (shape[0], shape[2]);
        let values = self
            .read_slice("array_data", &DataSlice::all())?
            .to_f64_vec()
            .unwrap_or_default();
        let at = |i: usize, j: usize, k: usize| {
            let base = ((i * nodes + j) * freqs + k) * 2;
            (values[base], values[base + 1])
        };

        let pairs: Vec<(usize, usize)> = match kind {
            SpectrumKind::Imaginary => (0..nodes)
                .flat_map(|i| (i + 1..nodes).map(move |j| (i, j)))
                .collect(),
            SpectrumKind::Real | SpectrumKind::Absolute => (0..nodes)
                .flat_map(|i| (0..nodes).map(move |j| (i, j)))
                .collect(),
        };
        if pairs.is_empty() || freqs == 0 {
            return Err(Error::ShapeError(format!(
                "no node pairs to summarise in shape {:?}",
                shape
            )));
        }

        let mut average = Vec::with_capacity(freqs);
        let mut std_dev = Vec::with_capacity(freqs);
        for k in 0..freqs {
            let column: Vec<f64> = pairs
                .iter()
                .map(|&(i, j)| {
                    let (re, im) = at(i, j, k);
                    match kind {
                        SpectrumKind::Imaginary => im,
                        SpectrumKind::Real => re,
                        SpectrumKind::Absolute => re.hypot(im),
                    }
                })
                .collect();
            let n = column.len() as f64;
            let mean = column.iter().sum::<f64>() / n;
            let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            average.push(mean);
            std_dev.push(variance.sqrt());
        }

        let lows: Vec<f64> = average.iter().zip(&std_dev).map(|(a, s)| a - s).collect();
        let highs: Vec<f64> = average.iter().zip(&std_dev).map(|(a, s)| a + s).collect();
        Ok(SpectrumView {
            ymin: extrema(&lows).0,
            ymax: extrema(&highs).1,
            average,
            std_dev,
        })
    }
}
