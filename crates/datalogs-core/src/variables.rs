//! Coordinates, data variables and the datasets built from them.
//!
//! Variable data is an arrow array. Multi-dimensional data variables are
//! stored flattened in row-major order; their shape comes from the
//! coordinates named by their dimensions.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, PrimitiveArray, StringArray};
use arrow::datatypes::{ArrowPrimitiveType, DataType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::convert::array_to_json;
use crate::error::{DatalogsError, Result};

/// Conversion of plain Rust collections into arrow arrays.
pub trait IntoArrayRef {
    fn into_array_ref(self) -> ArrayRef;
}

impl IntoArrayRef for ArrayRef {
    fn into_array_ref(self) -> ArrayRef {
        self
    }
}

impl<T: ArrowPrimitiveType> IntoArrayRef for PrimitiveArray<T> {
    fn into_array_ref(self) -> ArrayRef {
        Arc::new(self)
    }
}

impl IntoArrayRef for BooleanArray {
    fn into_array_ref(self) -> ArrayRef {
        Arc::new(self)
    }
}

impl IntoArrayRef for StringArray {
    fn into_array_ref(self) -> ArrayRef {
        Arc::new(self)
    }
}

impl IntoArrayRef for Vec<i32> {
    fn into_array_ref(self) -> ArrayRef {
        Arc::new(arrow::array::Int32Array::from(self))
    }
}

impl IntoArrayRef for Vec<i64> {
    fn into_array_ref(self) -> ArrayRef {
        Arc::new(arrow::array::Int64Array::from(self))
    }
}

impl IntoArrayRef for Vec<u32> {
    fn into_array_ref(self) -> ArrayRef {
        Arc::new(arrow::array::UInt32Array::from(self))
    }
}

impl IntoArrayRef for Vec<u64> {
    fn into_array_ref(self) -> ArrayRef {
        Arc::new(arrow::array::UInt64Array::from(self))
    }
}

impl IntoArrayRef for Vec<f32> {
    fn into_array_ref(self) -> ArrayRef {
        Arc::new(arrow::array::Float32Array::from(self))
    }
}

impl IntoArrayRef for Vec<f64> {
    fn into_array_ref(self) -> ArrayRef {
        Arc::new(arrow::array::Float64Array::from(self))
    }
}

impl IntoArrayRef for Vec<bool> {
    fn into_array_ref(self) -> ArrayRef {
        Arc::new(BooleanArray::from(self))
    }
}

impl IntoArrayRef for Vec<String> {
    fn into_array_ref(self) -> ArrayRef {
        Arc::new(StringArray::from(self))
    }
}

impl IntoArrayRef for Vec<&str> {
    fn into_array_ref(self) -> ArrayRef {
        Arc::new(StringArray::from(self))
    }
}

/// Dimension names accepted by [`DataVar::new`]: a single name or a list.
pub trait IntoDims {
    fn into_dims(self) -> Vec<String>;
}

impl IntoDims for &str {
    fn into_dims(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoDims for String {
    fn into_dims(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoDims for Vec<&str> {
    fn into_dims(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoDims for Vec<String> {
    fn into_dims(self) -> Vec<String> {
        self
    }
}

impl<const N: usize> IntoDims for [&str; N] {
    fn into_dims(self) -> Vec<String> {
        self.iter().map(|d| d.to_string()).collect()
    }
}

/// Whether a variable is a coordinate or a data variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Coord,
    DataVar,
}

/// Named array with dimensions and free-form attributes.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub data: ArrayRef,
    pub attrs: Map<String, Value>,
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.dims == other.dims
            && self.shape == other.shape
            && self.attrs == other.attrs
            && self.data.to_data() == other.data.to_data()
    }
}

impl Variable {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data_type(&self) -> &DataType {
        self.data.data_type()
    }

    /// Data as a flat JSON list.
    pub fn values_json(&self) -> Result<Vec<Value>> {
        array_to_json(self.data.as_ref(), &format!("$.{}", self.name))
    }
}

/// Dimensional coordinate: a 1D array labelling points along the dimension
/// of the same name.
#[derive(Debug, Clone)]
pub struct Coord(Variable);

impl Coord {
    pub fn new(name: impl Into<String>, data: impl IntoArrayRef) -> Self {
        let name = name.into();
        let data = data.into_array_ref();
        Self(Variable {
            dims: vec![name.clone()],
            shape: vec![data.len()],
            name,
            data,
            attrs: Map::new(),
        })
    }

    pub fn long_name(self, long_name: impl Into<String>) -> Self {
        self.attr("long_name", long_name.into())
    }

    pub fn units(self, units: impl Into<String>) -> Self {
        self.attr("units", units.into())
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.attrs.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn variable(&self) -> &Variable {
        &self.0
    }
}

/// Data variable along named dimensions.
#[derive(Debug, Clone)]
pub struct DataVar(Variable);

impl DataVar {
    pub fn new(name: impl Into<String>, dims: impl IntoDims, data: impl IntoArrayRef) -> Self {
        Self(Variable {
            name: name.into(),
            dims: dims.into_dims(),
            shape: Vec::new(),
            data: data.into_array_ref(),
            attrs: Map::new(),
        })
    }

    pub fn long_name(self, long_name: impl Into<String>) -> Self {
        self.attr("long_name", long_name.into())
    }

    pub fn units(self, units: impl Into<String>) -> Self {
        self.attr("units", units.into())
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.attrs.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn variable(&self) -> &Variable {
        &self.0
    }
}

/// Coordinates, data variables and global attributes of one data log.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    coords: Vec<Variable>,
    data_vars: Vec<Variable>,
    attrs: Map<String, Value>,
}

impl Dataset {
    /// Build a dataset, checking that every data variable lines up with the
    /// coordinates it names.
    pub fn from_variables(
        coords: impl IntoIterator<Item = Coord>,
        data_vars: impl IntoIterator<Item = DataVar>,
    ) -> Result<Self> {
        let coords: Vec<Variable> = coords.into_iter().map(|c| c.0).collect();
        let mut data_vars: Vec<Variable> = data_vars.into_iter().map(|d| d.0).collect();

        if coords.is_empty() && data_vars.is_empty() {
            return Err(DatalogsError::Validation(
                "a data log needs at least one coordinate or data variable".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for var in coords.iter().chain(data_vars.iter()) {
            if var.name.is_empty() {
                return Err(DatalogsError::Validation(
                    "variable names cannot be empty".to_string(),
                ));
            }
            if !names.insert(var.name.as_str()) {
                return Err(DatalogsError::Validation(format!(
                    "variable name '{}' is used more than once",
                    var.name
                )));
            }
        }

        for var in &mut data_vars {
            let mut seen = HashSet::new();
            let mut shape = Vec::with_capacity(var.dims.len());
            for dim in &var.dims {
                if !seen.insert(dim.as_str()) {
                    return Err(DatalogsError::Validation(format!(
                        "data variable '{}' repeats dimension '{dim}'",
                        var.name
                    )));
                }
                let coord = coords.iter().find(|c| &c.name == dim).ok_or_else(|| {
                    DatalogsError::Validation(format!(
                        "data variable '{}' has dimension '{dim}' with no matching coordinate",
                        var.name
                    ))
                })?;
                shape.push(coord.len());
            }
            let expected: usize = shape.iter().product();
            if var.len() != expected {
                return Err(DatalogsError::Validation(format!(
                    "data variable '{}' has {} values but its dimensions {:?} hold {expected}",
                    var.name,
                    var.len(),
                    var.dims
                )));
            }
            var.shape = shape;
        }

        Ok(Self {
            coords,
            data_vars,
            attrs: Map::new(),
        })
    }

    /// Reassemble a dataset read back from disk.
    pub(crate) fn from_parts(
        coords: Vec<Variable>,
        data_vars: Vec<Variable>,
        attrs: Map<String, Value>,
    ) -> Self {
        Self {
            coords,
            data_vars,
            attrs,
        }
    }

    pub fn with_attrs(mut self, attrs: Map<String, Value>) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn coords(&self) -> &[Variable] {
        &self.coords
    }

    pub fn data_vars(&self) -> &[Variable] {
        &self.data_vars
    }

    pub fn attrs(&self) -> &Map<String, Value> {
        &self.attrs
    }

    pub fn coord(&self, name: &str) -> Option<&Variable> {
        self.coords.iter().find(|v| v.name == name)
    }

    pub fn data_var(&self, name: &str) -> Option<&Variable> {
        self.data_vars.iter().find(|v| v.name == name)
    }

    /// Dimension names and sizes, in coordinate order.
    pub fn dims(&self) -> Vec<(&str, usize)> {
        self.coords
            .iter()
            .map(|c| (c.name.as_str(), c.len()))
            .collect()
    }

    /// `{"coords": {..}, "data_vars": {..}, "attrs": {..}}` with flat value lists.
    pub fn to_json(&self) -> Result<Value> {
        let section = |vars: &[Variable]| -> Result<Value> {
            let mut out = Map::new();
            for var in vars {
                let mut entry = Map::new();
                entry.insert("dims".to_string(), Value::from(var.dims.clone()));
                entry.insert("shape".to_string(), Value::from(var.shape.clone()));
                entry.insert("data".to_string(), Value::Array(var.values_json()?));
                entry.insert("attrs".to_string(), Value::Object(var.attrs.clone()));
                out.insert(var.name.clone(), Value::Object(entry));
            }
            Ok(Value::Object(out))
        };
        let mut out = Map::new();
        out.insert("coords".to_string(), section(&self.coords)?);
        out.insert("data_vars".to_string(), section(&self.data_vars)?);
        out.insert("attrs".to_string(), Value::Object(self.attrs.clone()));
        Ok(Value::Object(out))
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self
            .dims()
            .iter()
            .map(|(name, size)| format!("{name}: {size}"))
            .collect();
        writeln!(f, "Dimensions:     ({})", dims.join(", "))?;
        write_section(f, "Coordinates:", &self.coords)?;
        write_section(f, "Data variables:", &self.data_vars)?;
        if !self.attrs.is_empty() {
            write!(f, "\nAttributes:")?;
            for (key, value) in &self.attrs {
                write!(f, "\n    {key}: {value}")?;
            }
        }
        Ok(())
    }
}

fn write_section(f: &mut fmt::Formatter<'_>, title: &str, vars: &[Variable]) -> fmt::Result {
    write!(f, "{title}")?;
    for var in vars {
        let values = var
            .values_json()
            .map(|v| Value::Array(v).to_string())
            .unwrap_or_else(|_| format!("<{} values>", var.len()));
        write!(
            f,
            "\n    {:<10} ({}) {} {values}",
            var.name,
            var.dims.join(", "),
            var.data_type()
        )?;
    }
    writeln!(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time() -> Coord {
        Coord::new("time", vec![1i64, 2, 3]).long_name("Time").units("s")
    }

    #[test]
    fn test_coord_is_one_dimensional() {
        let coord = time();
        let var = coord.variable();
        assert_eq!(var.dims, vec!["time"]);
        assert_eq!(var.shape, vec![3]);
        assert_eq!(var.attrs["long_name"], "Time");
        assert_eq!(var.attrs["units"], "s");
    }

    #[test]
    fn test_data_var_shape_comes_from_coords() {
        let x = Coord::new("x", vec![0.0, 1.0]);
        let signal = DataVar::new("signal", ["time", "x"], vec![1i64, 2, 3, 4, 5, 6]);
        let dataset = Dataset::from_variables([time(), x], [signal]).unwrap();
        assert_eq!(dataset.data_var("signal").unwrap().shape, vec![3, 2]);
        assert_eq!(dataset.dims(), vec![("time", 3), ("x", 2)]);
    }

    #[test]
    fn test_missing_coord_fails() {
        let signal = DataVar::new("signal", "freq", vec![1i64, 2, 3]);
        let err = Dataset::from_variables([time()], [signal]).unwrap_err();
        assert!(err.to_string().contains("no matching coordinate"), "{err}");
    }

    #[test]
    fn test_duplicate_names_fail() {
        let err = Dataset::from_variables([time(), time()], Vec::<DataVar>::new()).unwrap_err();
        assert!(matches!(err, DatalogsError::Validation(_)));

        let a = DataVar::new("v", "time", vec![1i64, 2, 3]);
        let b = DataVar::new("v", "time", vec![4i64, 5, 6]);
        let err = Dataset::from_variables([time()], [a, b]).unwrap_err();
        assert!(matches!(err, DatalogsError::Validation(_)));
    }

    #[test]
    fn test_length_mismatch_fails() {
        let signal = DataVar::new("signal", "time", vec![1i64, 2]);
        let err = Dataset::from_variables([time()], [signal]).unwrap_err();
        assert!(err.to_string().contains("has 2 values"), "{err}");
    }

    #[test]
    fn test_empty_dataset_fails() {
        let err = Dataset::from_variables(Vec::<Coord>::new(), Vec::<DataVar>::new()).unwrap_err();
        assert!(matches!(err, DatalogsError::Validation(_)));
    }

    #[test]
    fn test_to_json_lists_values() {
        let signal = DataVar::new("signal", "time", vec![0.5, 1.5, 2.5]);
        let dataset = Dataset::from_variables([time()], [signal]).unwrap();
        let json = dataset.to_json().unwrap();
        assert_eq!(json["coords"]["time"]["data"], serde_json::json!([1, 2, 3]));
        assert_eq!(json["data_vars"]["signal"]["data"], serde_json::json!([0.5, 1.5, 2.5]));
    }

    #[test]
    fn test_variables_compare_by_values() {
        let a = Coord::new("time", vec![1i64, 2, 3]);
        let b = Coord::new("time", vec![1i64, 2, 3]);
        let c = Coord::new("time", vec![1i64, 2, 4]);
        assert_eq!(a.variable(), b.variable());
        assert_ne!(a.variable(), c.variable());
        assert_ne!(a.variable(), b.units("s").variable());
    }
}
