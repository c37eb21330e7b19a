//! Arrow `RecordBatch` → `Record` adapter.

use arrow::array::{
    Array, BinaryArray, BooleanArray, Date32Array, Decimal128Array, Float32Array, Float64Array,
    Int16Array, Int32Array, Int64Array, Int8Array, LargeBinaryArray, LargeListArray,
    LargeStringArray, ListArray, PrimitiveArray, StringArray, StructArray, UInt16Array,
    UInt32Array, UInt64Array, UInt8Array,
};
use arrow::datatypes::{
    ArrowTemporalType, DataType, Time32MillisecondType, Time32SecondType, Time64MicrosecondType,
    Time64NanosecondType, TimeUnit, TimestampMicrosecondType, TimestampMillisecondType,
    TimestampNanosecondType, TimestampSecondType,
};
use arrow::record_batch::RecordBatch;
use thiserror::Error;

use crate::value::{Record, Value};

#[derive(Debug, Error)]
pub enum ArrowSourceError {
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: &'static str, got: DataType },

    #[error("unsupported arrow type: {0}")]
    UnsupportedType(DataType),

    #[error("value at row {row} is out of range")]
    OutOfRange { row: usize },
}

/// Convert every row of `batch` into a record keyed by column name.
pub fn records_from_batch(batch: &RecordBatch) -> Result<Vec<Record>, ArrowSourceError> {
    let schema = batch.schema();
    (0..batch.num_rows())
        .map(|row| {
            schema
                .fields()
                .iter()
                .zip(batch.columns())
                .map(|(field, column)| {
                    value_at(column.as_ref(), row).map(|v| (field.name().clone(), v))
                })
                .collect()
        })
        .collect()
}

fn downcast<'a, A: Array + 'static>(
    array: &'a dyn Array,
    expected: &'static str,
) -> Result<&'a A, ArrowSourceError> {
    array
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| ArrowSourceError::TypeMismatch {
            expected,
            got: array.data_type().clone(),
        })
}

/// Read the value at `row` of `array`. Nulls become `Value::Null`.
fn value_at(array: &dyn Array, row: usize) -> Result<Value, ArrowSourceError> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Null => Value::Null,
        DataType::Boolean => Value::Bool(downcast::<BooleanArray>(array, "bool")?.value(row)),
        DataType::Int8 => Value::Int(downcast::<Int8Array>(array, "i8")?.value(row) as i64),
        DataType::Int16 => Value::Int(downcast::<Int16Array>(array, "i16")?.value(row) as i64),
        DataType::Int32 => Value::Int(downcast::<Int32Array>(array, "i32")?.value(row) as i64),
        DataType::Int64 => Value::Int(downcast::<Int64Array>(array, "i64")?.value(row)),
        DataType::UInt8 => Value::Int(downcast::<UInt8Array>(array, "u8")?.value(row) as i64),
        DataType::UInt16 => Value::Int(downcast::<UInt16Array>(array, "u16")?.value(row) as i64),
        DataType::UInt32 => Value::Int(downcast::<UInt32Array>(array, "u32")?.value(row) as i64),
        DataType::UInt64 => {
            let v = downcast::<UInt64Array>(array, "u64")?.value(row);
            // Beyond i64 the exact value survives as decimal text
            i64::try_from(v)
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Decimal(v.to_string()))
        }
        DataType::Float32 => {
            Value::Float(downcast::<Float32Array>(array, "f32")?.value(row) as f64)
        }
        DataType::Float64 => Value::Float(downcast::<Float64Array>(array, "f64")?.value(row)),
        DataType::Utf8 => Value::String(
            downcast::<StringArray>(array, "utf8")?
                .value(row)
                .to_string(),
        ),
        DataType::LargeUtf8 => Value::String(
            downcast::<LargeStringArray>(array, "large utf8")?
                .value(row)
                .to_string(),
        ),
        DataType::Binary => Value::Bytes(
            downcast::<BinaryArray>(array, "binary")?
                .value(row)
                .to_vec(),
        ),
        DataType::LargeBinary => Value::Bytes(
            downcast::<LargeBinaryArray>(array, "large binary")?
                .value(row)
                .to_vec(),
        ),
        DataType::Date32 => {
            let date = downcast::<Date32Array>(array, "date32")?
                .value_as_date(row)
                .ok_or(ArrowSourceError::OutOfRange { row })?;
            Value::Date(date)
        }
        DataType::Time32(TimeUnit::Second) => time_at::<Time32SecondType>(array, row)?,
        DataType::Time32(TimeUnit::Millisecond) => time_at::<Time32MillisecondType>(array, row)?,
        DataType::Time64(TimeUnit::Microsecond) => time_at::<Time64MicrosecondType>(array, row)?,
        DataType::Time64(TimeUnit::Nanosecond) => time_at::<Time64NanosecondType>(array, row)?,
        DataType::Timestamp(unit, tz) => {
            let zoned = tz.is_some();
            match unit {
                TimeUnit::Second => timestamp_at::<TimestampSecondType>(array, row, zoned)?,
                TimeUnit::Millisecond => {
                    timestamp_at::<TimestampMillisecondType>(array, row, zoned)?
                }
                TimeUnit::Microsecond => {
                    timestamp_at::<TimestampMicrosecondType>(array, row, zoned)?
                }
                TimeUnit::Nanosecond => timestamp_at::<TimestampNanosecondType>(array, row, zoned)?,
            }
        }
        DataType::Decimal128(_, _) => {
            Value::Decimal(downcast::<Decimal128Array>(array, "decimal128")?.value_as_string(row))
        }
        DataType::List(_) => {
            let values = downcast::<ListArray>(array, "list")?.value(row);
            list_values(values.as_ref())?
        }
        DataType::LargeList(_) => {
            let values = downcast::<LargeListArray>(array, "large list")?.value(row);
            list_values(values.as_ref())?
        }
        DataType::Struct(_) => {
            let array = downcast::<StructArray>(array, "struct")?;
            let record = array
                .column_names()
                .into_iter()
                .zip(array.columns())
                .map(|(name, column)| value_at(column.as_ref(), row).map(|v| (name.to_string(), v)))
                .collect::<Result<Record, ArrowSourceError>>()?;
            Value::Record(record)
        }
        other => return Err(ArrowSourceError::UnsupportedType(other.clone())),
    };
    Ok(value)
}

fn list_values(values: &dyn Array) -> Result<Value, ArrowSourceError> {
    (0..values.len())
        .map(|i| value_at(values, i))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

fn time_at<T>(array: &dyn Array, row: usize) -> Result<Value, ArrowSourceError>
where
    T: ArrowTemporalType,
    i64: From<T::Native>,
{
    downcast::<PrimitiveArray<T>>(array, "time")?
        .value_as_time(row)
        .map(Value::Time)
        .ok_or(ArrowSourceError::OutOfRange { row })
}

/// Zoned timestamps are instants; zone-less ones are civil date-times.
fn timestamp_at<T>(array: &dyn Array, row: usize, zoned: bool) -> Result<Value, ArrowSourceError>
where
    T: ArrowTemporalType,
    i64: From<T::Native>,
{
    let dt = downcast::<PrimitiveArray<T>>(array, "timestamp")?
        .value_as_datetime(row)
        .ok_or(ArrowSourceError::OutOfRange { row })?;
    Ok(if zoned {
        Value::Timestamp(dt.and_utc())
    } else {
        Value::DateTime(dt)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Time64MicrosecondArray, TimestampMicrosecondArray};
    use arrow::datatypes::{Field, Int32Type};
    use chrono::{NaiveDate, NaiveTime};

    fn batch() -> RecordBatch {
        let address = StructArray::from(vec![(
            Arc::new(Field::new("city", DataType::Utf8, true)),
            Arc::new(StringArray::from(vec![Some("Oslo"), None])) as ArrayRef,
        )]);
        RecordBatch::try_from_iter(vec![
            ("id", Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef),
            ("name", Arc::new(StringArray::from(vec![Some("a"), None])) as ArrayRef),
            ("day", Arc::new(Date32Array::from(vec![0, 19723])) as ArrayRef),
            (
                "at",
                Arc::new(
                    TimestampMicrosecondArray::from(vec![1_704_067_200_000_000, 0])
                        .with_timezone("UTC"),
                ) as ArrayRef,
            ),
            (
                "local",
                Arc::new(TimestampMicrosecondArray::from(vec![0, 1_000])) as ArrayRef,
            ),
            (
                "alarm",
                Arc::new(Time64MicrosecondArray::from(vec![1_500_000, 0])) as ArrayRef,
            ),
            (
                "price",
                Arc::new(
                    Decimal128Array::from(vec![12345, -5])
                        .with_precision_and_scale(10, 2)
                        .unwrap(),
                ) as ArrayRef,
            ),
            (
                "tags",
                Arc::new(ListArray::from_iter_primitive::<Int32Type, _, _>(vec![
                    Some(vec![Some(1), Some(2)]),
                    None,
                ])) as ArrayRef,
            ),
            ("address", Arc::new(address) as ArrayRef),
        ])
        .unwrap()
    }

    #[test]
    fn test_records_from_batch() {
        let records = records_from_batch(&batch()).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first["id"], Value::Int(1));
        assert_eq!(first["name"], Value::from("a"));
        assert_eq!(first["day"], Value::Date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()));
        assert_eq!(
            first["at"],
            Value::Timestamp(
                NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
                    .and_utc()
            )
        );
        assert!(matches!(first["local"], Value::DateTime(_)));
        assert_eq!(
            first["alarm"],
            Value::Time(NaiveTime::from_hms_micro_opt(0, 0, 1, 500_000).unwrap())
        );
        assert_eq!(first["price"], Value::Decimal("123.45".into()));
        assert_eq!(first["tags"], Value::List(vec![Value::Int(1), Value::Int(2)]));
        let address = first["address"].as_record().unwrap();
        assert_eq!(address["city"], Value::from("Oslo"));

        let second = &records[1];
        assert_eq!(second["name"], Value::Null);
        assert_eq!(second["tags"], Value::Null);
        assert_eq!(second["price"], Value::Decimal("-0.05".into()));
        assert_eq!(second["address"].as_record().unwrap()["city"], Value::Null);
    }

    #[test]
    fn test_unsupported_type() {
        let batch = RecordBatch::try_from_iter(vec![(
            "d",
            Arc::new(arrow::array::DurationSecondArray::from(vec![1])) as ArrayRef,
        )])
        .unwrap();
        assert!(matches!(
            records_from_batch(&batch),
            Err(ArrowSourceError::UnsupportedType(_))
        ));
    }
}
