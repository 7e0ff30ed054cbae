//! Bundled datatypes and their container formats
//!
//! - [`TimeSeries`]: sampled signal with a growable time axis
//! - [`TimeSeriesRegion`], [`TimeSeriesSurface`] and [`TimeSeriesVolume`]:
//!   time series tied to the structure their space axis runs over
//! - [`FourierSpectrum`], [`WaveletCoefficients`], [`CoherenceSpectrum`] and
//!   [`ComplexCoherenceSpectrum`]: spectra computed from a time series,
//!   streamed in chunks
//! - [`Fcd`]: functional connectivity dynamics matrix
//! - [`Connectivity`]: region graph with labels, weights and geometry
//!
//! Complex arrays are stored as `F64` with a trailing axis of length 2
//! holding the real and imaginary parts.

/// Implements [`H5Format`](crate::h5file::H5Format) and `Deref` to
/// [`H5File`](crate::h5file::H5File) for a `struct X { file: H5File }`
/// whose accessors are registered by `X::declare_accessors`.
///
/// `h5_format!(X extends Base, ..)` is for a `struct X { base: Base }`: the
/// accessors of `Base` come first, and `X` derefs to `Base` so its helpers
/// stay available.
macro_rules! h5_format {
    ($name:ident extends $base:ident, $written_by:expr) => {
        impl $crate::h5file::H5Format for $name {
            const WRITTEN_BY: &'static str = $written_by;

            fn declare(file: &mut $crate::h5file::H5File) -> neostore_core::Result<()> {
                <$base as $crate::h5file::H5Format>::declare(file)?;
                $name::declare_accessors(file)
            }

            fn from_h5file(file: $crate::h5file::H5File) -> Self {
                $name {
                    base: <$base as $crate::h5file::H5Format>::from_h5file(file),
                }
            }

            fn h5file(&self) -> &$crate::h5file::H5File {
                $crate::h5file::H5Format::h5file(&self.base)
            }

            fn h5file_mut(&mut self) -> &mut $crate::h5file::H5File {
                $crate::h5file::H5Format::h5file_mut(&mut self.base)
            }

            fn into_h5file(self) -> $crate::h5file::H5File {
                $crate::h5file::H5Format::into_h5file(self.base)
            }
        }

        impl std::ops::Deref for $name {
            type Target = $base;

            fn deref(&self) -> &Self::Target {
                &self.base
            }
        }

        impl std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.base
            }
        }
    };
    ($name:ident, $written_by:expr) => {
        impl $crate::h5file::H5Format for $name {
            const WRITTEN_BY: &'static str = $written_by;

            fn declare(file: &mut $crate::h5file::H5File) -> neostore_core::Result<()> {
                $name::declare_accessors(file)
            }

            fn from_h5file(file: $crate::h5file::H5File) -> Self {
                $name { file }
            }

            fn h5file(&self) -> &$crate::h5file::H5File {
                &self.file
            }

            fn h5file_mut(&mut self) -> &mut $crate::h5file::H5File {
                &mut self.file
            }

            fn into_h5file(self) -> $crate::h5file::H5File {
                self.file
            }
        }

        impl std::ops::Deref for $name {
            type Target = $crate::h5file::H5File;

            fn deref(&self) -> &Self::Target {
                &self.file
            }
        }

        impl std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.file
            }
        }
    };
}

pub(crate) use h5_format;

mod connectivity;
mod fcd;
mod spatial;
mod spectral;
mod time_series;

pub use connectivity::{Connectivity, ConnectivityH5};
pub use fcd::{Fcd, FcdH5};
pub use spatial::{
    TimeSeriesRegion, TimeSeriesRegionH5, TimeSeriesSurface, TimeSeriesSurfaceH5, TimeSeriesVolume,
    TimeSeriesVolumeH5,
};
pub use spectral::{
    CoherenceSpectrum, CoherenceSpectrumH5, ComplexCoherenceSpectrum, ComplexCoherenceSpectrumH5,
    FourierSpectrum, FourierSpectrumH5, FourierView, SpectrumKind, SpectrumView,
    WaveletCoefficients, WaveletCoefficientsH5,
};
pub use time_series::{TimeSeries, TimeSeriesH5, DEFAULT_LABELS_ORDERING};

use crate::registry::RegistryEntry;

/// Registry entries of the bundled datatypes
pub fn builtin_entries() -> Vec<RegistryEntry> {
    vec![
        RegistryEntry::of::<TimeSeries, TimeSeriesH5>("TimeSeriesIndex"),
        RegistryEntry::of::<TimeSeriesRegion, TimeSeriesRegionH5>("TimeSeriesRegionIndex"),
        RegistryEntry::of::<TimeSeriesSurface, TimeSeriesSurfaceH5>("TimeSeriesSurfaceIndex"),
        RegistryEntry::of::<TimeSeriesVolume, TimeSeriesVolumeH5>("TimeSeriesVolumeIndex"),
        RegistryEntry::of::<FourierSpectrum, FourierSpectrumH5>("FourierSpectrumIndex"),
        RegistryEntry::of::<WaveletCoefficients, WaveletCoefficientsH5>("WaveletCoefficientsIndex"),
        RegistryEntry::of::<CoherenceSpectrum, CoherenceSpectrumH5>("CoherenceSpectrumIndex"),
        RegistryEntry::of::<ComplexCoherenceSpectrum, ComplexCoherenceSpectrumH5>(
            "ComplexCoherenceSpectrumIndex",
        ),
        RegistryEntry::of::<Fcd, FcdH5>("FcdIndex"),
        RegistryEntry::of::<Connectivity, ConnectivityH5>("ConnectivityIndex"),
    ]
}
