//! Conversion of [`LogValue`]s into JSON.
//!
//! Rules, in order:
//!
//! 1. A caller-supplied hook is tried first, at every level. `Some` is used verbatim.
//! 2. Primitives pass through. Non-finite floats become `null`.
//! 3. Arrow arrays become (nested) lists, arrow scalars their single element.
//! 4. Record batches become `{column: [values]}` in schema order.
//! 5. Lists convert element-wise, maps key-wise; order is preserved.
//! 6. Anything else is an [`DatalogsError::UnsupportedType`].

use arrow::array::{Array, AsArray, Datum};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::record_batch::RecordBatch;
use serde_json::{Map, Number, Value};

use crate::error::{DatalogsError, Result};
use crate::models::LogValue;

/// Conversion hook. Returning `None` hands the value to the built-in rules.
pub type ConvertFn<'a> = dyn Fn(&LogValue) -> Option<Value> + 'a;

/// Return a JSON version of `value`.
pub fn convert_to_json(value: &LogValue, convert: Option<&ConvertFn<'_>>) -> Result<Value> {
    convert_at(value, convert, "$")
}

fn convert_at(value: &LogValue, convert: Option<&ConvertFn<'_>>, path: &str) -> Result<Value> {
    if let Some(hook) = convert {
        if let Some(converted) = hook(value) {
            return Ok(converted);
        }
    }
    match value {
        LogValue::Null => Ok(Value::Null),
        LogValue::Bool(b) => Ok(Value::Bool(*b)),
        LogValue::Int(i) => Ok(Value::from(*i)),
        LogValue::UInt(u) => Ok(Value::from(*u)),
        LogValue::Float(f) => Ok(float_to_json(*f)),
        LogValue::Text(s) => Ok(Value::String(s.clone())),
        LogValue::List(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| convert_at(item, convert, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        LogValue::Map(entries) => {
            let mut out = Map::new();
            for (key, item) in entries {
                let key = key_to_string(key, path)?;
                let converted = convert_at(item, convert, &format!("{path}.{key}"))?;
                if out.insert(key.clone(), converted).is_some() {
                    return Err(DatalogsError::Validation(format!(
                        "duplicate key '{key}' at {path}"
                    )));
                }
            }
            Ok(Value::Object(out))
        }
        LogValue::Array(array) => array_to_json(array.as_ref(), path).map(Value::Array),
        LogValue::Scalar(scalar) => {
            let (array, _) = scalar.get();
            let mut values = array_to_json(array, path)?;
            Ok(values.pop().unwrap_or(Value::Null))
        }
        LogValue::Frame(batch) => frame_to_json(batch, path),
        LogValue::Opaque(opaque) => Err(DatalogsError::UnsupportedType {
            type_name: opaque.type_name().to_string(),
            path: path.to_string(),
        }),
    }
}

fn float_to_json(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn key_to_string(key: &LogValue, path: &str) -> Result<String> {
    match key {
        LogValue::Text(s) => Ok(s.clone()),
        LogValue::Bool(b) => Ok(b.to_string()),
        LogValue::Int(i) => Ok(i.to_string()),
        LogValue::UInt(u) => Ok(u.to_string()),
        LogValue::Float(f) if f.is_finite() => Ok(f.to_string()),
        other => Err(DatalogsError::Validation(format!(
            "map key of type '{}' at {path} cannot be converted to a string",
            other.type_name()
        ))),
    }
}

/// Convert a record batch to `{column: [values]}`.
pub fn frame_to_json(batch: &RecordBatch, path: &str) -> Result<Value> {
    let mut out = Map::new();
    for (field, column) in batch.schema().fields().iter().zip(batch.columns()) {
        let column_path = format!("{path}.{}", field.name());
        let values = array_to_json(column.as_ref(), &column_path)?;
        out.insert(field.name().clone(), Value::Array(values));
    }
    Ok(Value::Object(out))
}

/// Convert every element of an arrow array. Nulls become `null`.
pub fn array_to_json(array: &dyn Array, path: &str) -> Result<Vec<Value>> {
    let values = match array.data_type() {
        DataType::Null => vec![Value::Null; array.len()],
        DataType::Boolean => {
            let arr = array.as_boolean();
            (0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        Value::Null
                    } else {
                        Value::Bool(arr.value(i))
                    }
                })
                .collect()
        }
        DataType::Int8 => integers::<Int8Type>(array),
        DataType::Int16 => integers::<Int16Type>(array),
        DataType::Int32 => integers::<Int32Type>(array),
        DataType::Int64 => integers::<Int64Type>(array),
        DataType::UInt8 => integers::<UInt8Type>(array),
        DataType::UInt16 => integers::<UInt16Type>(array),
        DataType::UInt32 => integers::<UInt32Type>(array),
        DataType::UInt64 => integers::<UInt64Type>(array),
        DataType::Float32 => floats::<Float32Type>(array),
        DataType::Float64 => floats::<Float64Type>(array),
        DataType::Utf8 => {
            let arr = array.as_string::<i32>();
            arr.iter()
                .map(|v| v.map_or(Value::Null, |s| Value::String(s.to_string())))
                .collect()
        }
        DataType::LargeUtf8 => {
            let arr = array.as_string::<i64>();
            arr.iter()
                .map(|v| v.map_or(Value::Null, |s| Value::String(s.to_string())))
                .collect()
        }
        DataType::List(_) => {
            let arr = array.as_list::<i32>();
            nested(arr.len(), |i| arr.is_null(i), |i| arr.value(i), path)?
        }
        DataType::LargeList(_) => {
            let arr = array.as_list::<i64>();
            nested(arr.len(), |i| arr.is_null(i), |i| arr.value(i), path)?
        }
        DataType::FixedSizeList(_, _) => {
            let arr = array.as_fixed_size_list();
            nested(arr.len(), |i| arr.is_null(i), |i| arr.value(i), path)?
        }
        other => {
            return Err(DatalogsError::UnsupportedType {
                type_name: format!("arrow array of {other}"),
                path: path.to_string(),
            })
        }
    };
    Ok(values)
}

fn integers<T>(array: &dyn Array) -> Vec<Value>
where
    T: ArrowPrimitiveType,
    T::Native: Into<Number>,
{
    array
        .as_primitive::<T>()
        .iter()
        .map(|v| v.map_or(Value::Null, |n| Value::Number(n.into())))
        .collect()
}

fn floats<T>(array: &dyn Array) -> Vec<Value>
where
    T: ArrowPrimitiveType,
    T::Native: Into<f64>,
{
    array
        .as_primitive::<T>()
        .iter()
        .map(|v| v.map_or(Value::Null, |n| float_to_json(n.into())))
        .collect()
}

fn nested(
    len: usize,
    is_null: impl Fn(usize) -> bool,
    value: impl Fn(usize) -> arrow::array::ArrayRef,
    path: &str,
) -> Result<Vec<Value>> {
    (0..len)
        .map(|i| {
            if is_null(i) {
                Ok(Value::Null)
            } else {
                array_to_json(value(i).as_ref(), &format!("{path}[{i}]")).map(Value::Array)
            }
        })
        .collect()
}
