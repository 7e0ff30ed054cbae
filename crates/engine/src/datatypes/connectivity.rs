use std::any::Any;

use neostore_core::{Attr, DType, Error, FieldValue, Gid, HasTraits, NdArray, Result, Value};

use crate::accessor::{DataSet, Json, Scalar};
use crate::h5file::H5File;

/// Region graph: labels, weighted edges and region geometry
#[derive(Debug, Clone, PartialEq)]
pub struct Connectivity {
    /// Identity
    pub gid: Gid,
    /// One label per region
    pub region_labels: NdArray,
    /// `(regions, regions)` edge weights
    pub weights: NdArray,
    /// Whether `weights` is symmetric
    pub undirected: bool,
    /// `(regions, regions)` fibre tract lengths
    pub tract_lengths: NdArray,
    /// `(regions, 3)` region centres
    pub centres: NdArray,
    /// Per region, whether it is cortical
    pub cortical: Option<NdArray>,
    /// Per region, `true` for the right hemisphere
    pub hemispheres: Option<NdArray>,
    /// `(regions, 3)` average orientation
    pub orientations: Option<NdArray>,
    /// Per region area
    pub areas: Option<NdArray>,
    /// Number of regions
    pub number_of_regions: i64,
    /// Number of non-zero weights
    pub number_of_connections: i64,
    /// Gid of the connectivity this one was derived from
    pub parent_connectivity: Option<String>,
    /// Region subset last selected in the viewer
    pub saved_selection: Option<serde_json::Value>,
}

impl Default for Connectivity {
    fn default() -> Self {
        Connectivity {
            gid: Gid::new(),
            region_labels: NdArray::from_vec(Vec::<String>::new()),
            weights: NdArray::zeros(vec![0, 0]),
            undirected: false,
            tract_lengths: NdArray::zeros(vec![0, 0]),
            centres: NdArray::zeros(vec![0, 3]),
            cortical: None,
            hemispheres: None,
            orientations: None,
            areas: None,
            number_of_regions: 0,
            number_of_connections: 0,
            parent_connectivity: None,
            saved_selection: None,
        }
    }
}

impl Connectivity {
    /// Connectivity over `labels`, counting regions and connections
    pub fn new(labels: Vec<&str>, weights: NdArray, tract_lengths: NdArray, centres: NdArray) -> Self {
        let number_of_regions = labels.len() as i64;
        let number_of_connections = weights
            .to_f64_vec()
            .map(|w| w.iter().filter(|&&x| x != 0.0).count() as i64)
            .unwrap_or(0);
        Connectivity {
            region_labels: NdArray::from_vec(labels),
            weights,
            tract_lengths,
            centres,
            number_of_regions,
            number_of_connections,
            ..Default::default()
        }
    }
}

impl HasTraits for Connectivity {
    fn type_name(&self) -> &'static str {
        "Connectivity"
    }

    fn gid(&self) -> Gid {
        self.gid
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        Some(match name {
            "gid" => FieldValue::Id(self.gid),
            "region_labels" => FieldValue::array(&self.region_labels),
            "weights" => FieldValue::array(&self.weights),
            "undirected" => FieldValue::Scalar(Value::Bool(self.undirected)),
            "tract_lengths" => FieldValue::array(&self.tract_lengths),
            "centres" => FieldValue::array(&self.centres),
            "cortical" => FieldValue::optional_array(self.cortical.as_ref()),
            "hemispheres" => FieldValue::optional_array(self.hemispheres.as_ref()),
            "orientations" => FieldValue::optional_array(self.orientations.as_ref()),
            "areas" => FieldValue::optional_array(self.areas.as_ref()),
            "number_of_regions" => FieldValue::Scalar(Value::Int(self.number_of_regions)),
            "number_of_connections" => FieldValue::Scalar(Value::Int(self.number_of_connections)),
            "parent_connectivity" => FieldValue::optional_scalar(self.parent_connectivity.as_deref()),
            "saved_selection" => match &self.saved_selection {
                Some(sel) => FieldValue::Json(sel.clone()),
                None => FieldValue::None,
            },
            _ => return None,
        })
    }

    fn set_field(&mut self, name: &str, value: FieldValue<'static>) -> Result<()> {
        match name {
            "gid" => self.gid = value.into_gid(name)?,
            "region_labels" => self.region_labels = value.into_array(name)?,
            "weights" => self.weights = value.into_array(name)?,
            "undirected" => self.undirected = value.into_bool(name)?,
            "tract_lengths" => self.tract_lengths = value.into_array(name)?,
            "centres" => self.centres = value.into_array(name)?,
            "cortical" => self.cortical = value.into_optional_array(name)?,
            "hemispheres" => self.hemispheres = value.into_optional_array(name)?,
            "orientations" => self.orientations = value.into_optional_array(name)?,
            "areas" => self.areas = value.into_optional_array(name)?,
            "number_of_regions" => self.number_of_regions = value.into_i64(name)?,
            "number_of_connections" => self.number_of_connections = value.into_i64(name)?,
            "parent_connectivity" => self.parent_connectivity = value.into_optional_string(name)?,
            "saved_selection" => {
                self.saved_selection = match value {
                    FieldValue::None => None,
                    other => Some(other.into_json(name)?),
                }
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

/// Container format of [`Connectivity`]
pub struct ConnectivityH5 {
    file: H5File,
}

super::h5_format!(ConnectivityH5, "neostore.datatypes.ConnectivityH5");

/// Labels grouped by hemisphere: `(hemisphere name, [(region index, label)])`
pub type GroupedLabels = Vec<(String, Vec<(usize, String)>)>;

impl ConnectivityH5 {
    fn declare_accessors(file: &mut H5File) -> Result<()> {
        file.register(DataSet::new(Attr::array("region_labels").ndim(1)))?;
        file.register(DataSet::new(Attr::array("weights").dtype(DType::F64).ndim(2)))?;
        file.register(Scalar::new(Attr::bool("undirected").default_value(false)))?;
        file.register(DataSet::new(Attr::array("tract_lengths").dtype(DType::F64).ndim(2)))?;
        file.register(DataSet::new(Attr::array("centres").dtype(DType::F64).ndim(2)))?;
        file.register(DataSet::new(
            Attr::array("cortical").dtype(DType::Bool).ndim(1).optional(),
        ))?;
        file.register(DataSet::new(
            Attr::array("hemispheres").dtype(DType::Bool).ndim(1).optional(),
        ))?;
        file.register(DataSet::new(
            Attr::array("orientations").dtype(DType::F64).ndim(2).optional(),
        ))?;
        file.register(DataSet::new(
            Attr::array("areas").dtype(DType::F64).ndim(1).optional(),
        ))?;
        file.register(Scalar::new(Attr::int("number_of_regions")))?;
        file.register(Scalar::new(Attr::int("number_of_connections")))?;
        file.register(Scalar::new(Attr::string("parent_connectivity").optional()))?;
        file.register(Json::new(Attr::json("saved_selection").optional()))
    }

    /// Region centres
    pub fn get_centres(&self) -> Result<NdArray> {
        self.load_field("centres")?.into_array("centres")
    }

    /// Region labels
    pub fn get_region_labels(&self) -> Result<Vec<String>> {
        let labels = self.load_field("region_labels")?.into_array("region_labels")?;
        labels.as_strings().map(<[String]>::to_vec).ok_or_else(|| {
            Error::type_mismatch(
                "region_labels",
                format!("expected string labels, found {}", labels.dtype()),
            )
        })
    }

    /// Labels split into `left` and `right` when hemispheres are known,
    /// otherwise a single unnamed group
    pub fn get_grouped_space_labels(&self) -> Result<GroupedLabels> {
        let labels = self.get_region_labels()?;
        let hemispheres = self
            .load_field("hemispheres")?
            .into_optional_array("hemispheres")?
            .filter(|h| !h.is_empty())
            .and_then(|h| h.to_f64_vec());

        match hemispheres {
            Some(right) => {
                let (mut left_group, mut right_group) = (Vec::new(), Vec::new());
                for (i, (is_right, label)) in right.iter().zip(labels).enumerate() {
                    if *is_right != 0.0 {
                        right_group.push((i, label));
                    } else {
                        left_group.push((i, label));
                    }
                }
                Ok(vec![
                    ("left".to_string(), left_group),
                    ("right".to_string(), right_group),
                ])
            }
            None => Ok(vec![(String::new(), labels.into_iter().enumerate().collect())]),
        }
    }

    /// The saved selection, or every region when none is saved
    pub fn get_default_selection(&self) -> Result<Vec<usize>> {
        let saved = match self.load_field("saved_selection")? {
            FieldValue::None => None,
            other => Some(other.into_json("saved_selection")?),
        };
        if let Some(serde_json::Value::Array(items)) = saved {
            if !items.is_empty() {
                return items
                    .iter()
                    .map(|item| {
                        item.as_u64().map(|i| i as usize).ok_or_else(|| {
                            Error::type_mismatch(
                                "saved_selection",
                                format!("region index expected, found {}", item),
                            )
                        })
                    })
                    .collect();
            }
        }
        Ok((0..self.get_region_labels()?.len()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h5file::H5Format;
    use serde_json::json;
    use tempfile::tempdir;

    fn two_regions() -> Connectivity {
        Connectivity::new(
            vec!["lA", "rB"],
            NdArray::from_shape_vec(vec![2, 2], vec![0.0, 1.5, 1.5, 0.0]).unwrap(),
            NdArray::from_shape_vec(vec![2, 2], vec![0.0, 10.0, 10.0, 0.0]).unwrap(),
            NdArray::from_shape_vec(vec![2, 3], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap(),
        )
    }

    #[test]
    fn test_roundtrip_with_string_labels() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Connectivity_1.h5");
        let conn = two_regions();
        assert_eq!(conn.number_of_connections, 2);
        {
            let mut f = ConnectivityH5::create(&path).unwrap();
            f.store(&conn, false).unwrap();
            f.close().unwrap();
        }

        let f = ConnectivityH5::open_read(&path).unwrap();
        let mut loaded = Connectivity::default();
        f.load_into(&mut loaded).unwrap();
        assert_eq!(loaded, conn);
        assert_eq!(f.get_region_labels().unwrap(), vec!["lA", "rB"]);
        assert_eq!(f.get_centres().unwrap().shape(), &[2, 3]);
        assert_eq!(f.get_default_selection().unwrap(), vec![0, 1]);
        assert_eq!(
            f.cached_stats("weights").unwrap().max,
            Some(Value::Float(1.5))
        );
    }

    #[test]
    fn test_grouped_space_labels() {
        let dir = tempdir().unwrap();
        let mut f = ConnectivityH5::create(dir.path().join("c.h5")).unwrap();
        let mut conn = two_regions();
        f.store(&conn, false).unwrap();
        assert_eq!(
            f.get_grouped_space_labels().unwrap(),
            vec![(String::new(), vec![(0, "lA".to_string()), (1, "rB".to_string())])]
        );

        conn.hemispheres = Some(NdArray::from_vec(vec![false, true]));
        f.store(&conn, false).unwrap();
        assert_eq!(
            f.get_grouped_space_labels().unwrap(),
            vec![
                ("left".to_string(), vec![(0, "lA".to_string())]),
                ("right".to_string(), vec![(1, "rB".to_string())]),
            ]
        );
    }

    #[test]
    fn test_saved_selection() {
        let dir = tempdir().unwrap();
        let mut f = ConnectivityH5::create(dir.path().join("c.h5")).unwrap();
        let conn = Connectivity {
            saved_selection: Some(json!([1])),
            ..two_regions()
        };
        f.store(&conn, false).unwrap();
        assert_eq!(f.get_default_selection().unwrap(), vec![1]);
    }
}
