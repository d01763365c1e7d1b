//! Traffic table schema and Arrow conversions
//!
//! The on-disk layout is fixed at ten columns. Records convert to one
//! Arrow `RecordBatch` for writing, and batches read back convert to
//! records, with column lookup by name so column order on disk does not
//! matter.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Date32Array, Int64Array, RecordBatch, StringArray, TimestampMicrosecondArray,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Date32Type, Field, Schema, SchemaRef, TimeUnit};
use chrono::{DateTime, SecondsFormat, Utc};

use super::StoreError;
use crate::domain::TrafficRecord;

// =============================================================================
// Schema
// =============================================================================

/// Column names in schema order.
pub const COLUMNS: [&str; 10] = [
    "date",
    "repo_owner",
    "repo_name",
    "clones_total",
    "clones_unique",
    "views_total",
    "views_unique",
    "forks_count",
    "stars_count",
    "collected_at",
];

/// Create the Arrow schema for traffic rows.
///
/// 1. date         - calendar day (Date32)
/// 2. repo_owner   - key, with repo_name and date
/// 3. repo_name
/// 4-9. metrics    - nullable Int64, null means "not reported"
/// 10. collected_at - RFC 3339 UTC string, provenance only
pub fn stats_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("date", DataType::Date32, false),
        Field::new("repo_owner", DataType::Utf8, false),
        Field::new("repo_name", DataType::Utf8, false),
        Field::new("clones_total", DataType::Int64, true),
        Field::new("clones_unique", DataType::Int64, true),
        Field::new("views_total", DataType::Int64, true),
        Field::new("views_unique", DataType::Int64, true),
        Field::new("forks_count", DataType::Int64, true),
        Field::new("stars_count", DataType::Int64, true),
        Field::new("collected_at", DataType::Utf8, false),
    ]))
}

// =============================================================================
// Compression
// =============================================================================

/// Parquet compression codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// No compression
    None,
    /// Snappy compression (fast, moderate ratio)
    #[default]
    Snappy,
    /// LZ4 compression (very fast, lower ratio)
    Lz4,
    /// Zstd compression (slower, best ratio)
    Zstd,
}

impl Compression {
    /// Convert to parquet compression type
    pub fn to_parquet(self) -> parquet::basic::Compression {
        match self {
            Self::None => parquet::basic::Compression::UNCOMPRESSED,
            Self::Snappy => parquet::basic::Compression::SNAPPY,
            Self::Lz4 => parquet::basic::Compression::LZ4_RAW,
            Self::Zstd => parquet::basic::Compression::ZSTD(Default::default()),
        }
    }

    /// Parse from string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "uncompressed" => Some(Self::None),
            "snappy" => Some(Self::Snappy),
            "lz4" => Some(Self::Lz4),
            "zstd" => Some(Self::Zstd),
            _ => None,
        }
    }
}

// =============================================================================
// Records -> RecordBatch
// =============================================================================

fn to_i64(value: Option<u64>, column: &str) -> Result<Option<i64>, StoreError> {
    value
        .map(|v| {
            i64::try_from(v)
                .map_err(|_| StoreError::Schema(format!("{column} value {v} exceeds Int64")))
        })
        .transpose()
}

fn int_column(
    records: &[TrafficRecord],
    column: &str,
    get: impl Fn(&TrafficRecord) -> Option<u64>,
) -> Result<ArrayRef, StoreError> {
    let values = records
        .iter()
        .map(|r| to_i64(get(r), column))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Arc::new(Int64Array::from(values)))
}

/// Format a collection timestamp the way it is stored.
pub fn format_collected_at(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Convert traffic records to an Arrow `RecordBatch` in schema order.
pub fn records_to_record_batch(
    records: &[TrafficRecord],
    schema: SchemaRef,
) -> Result<RecordBatch, StoreError> {
    let dates: Vec<i32> = records
        .iter()
        .map(|r| Date32Type::from_naive_date(r.record_date))
        .collect();
    let owners: Vec<&str> = records.iter().map(|r| r.repo_owner.as_str()).collect();
    let names: Vec<&str> = records.iter().map(|r| r.repo_name.as_str()).collect();
    let collected: Vec<String> = records
        .iter()
        .map(|r| format_collected_at(&r.collected_at))
        .collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(Date32Array::from(dates)),                          // 0: date
        Arc::new(StringArray::from(owners)),                         // 1: repo_owner
        Arc::new(StringArray::from(names)),                          // 2: repo_name
        int_column(records, "clones_total", |r| r.clones_total)?,    // 3
        int_column(records, "clones_unique", |r| r.clones_unique)?,  // 4
        int_column(records, "views_total", |r| r.views_total)?,      // 5
        int_column(records, "views_unique", |r| r.views_unique)?,    // 6
        int_column(records, "forks_count", |r| r.forks_count)?,      // 7
        int_column(records, "stars_count", |r| r.stars_count)?,      // 8
        Arc::new(StringArray::from(collected)),                      // 9: collected_at
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

// =============================================================================
// RecordBatch -> Records
// =============================================================================

/// Look up `name` and cast it to `to`, so files written with a wider or
/// view string type, or a different integer width, still read.
fn cast_column(batch: &RecordBatch, name: &str, to: &DataType) -> Result<ArrayRef, StoreError> {
    let array = batch
        .column_by_name(name)
        .ok_or_else(|| StoreError::Schema(format!("missing column: {name}")))?;
    if array.data_type() == to {
        return Ok(Arc::clone(array));
    }
    cast(array, to).map_err(|e| {
        StoreError::Schema(format!(
            "cannot read column {name} of type {} as {to}: {e}",
            array.data_type()
        ))
    })
}

fn downcast<'a, A: Array + 'static>(array: &'a ArrayRef, name: &str) -> Result<&'a A, StoreError> {
    array
        .as_any()
        .downcast_ref::<A>()
        .ok_or_else(|| StoreError::Schema(format!("unexpected type for column: {name}")))
}

/// `collected_at` is stored as RFC 3339 text, but a timestamp column is
/// accepted too.
enum CollectedAt {
    Text(ArrayRef),
    Micros(ArrayRef),
}

impl CollectedAt {
    fn from_batch(batch: &RecordBatch) -> Result<Self, StoreError> {
        let name = "collected_at";
        let is_timestamp = matches!(
            batch.column_by_name(name).map(|a| a.data_type()),
            Some(DataType::Timestamp(..))
        );
        if is_timestamp {
            let micros = DataType::Timestamp(TimeUnit::Microsecond, None);
            Ok(Self::Micros(cast_column(batch, name, &micros)?))
        } else {
            Ok(Self::Text(cast_column(batch, name, &DataType::Utf8)?))
        }
    }

    fn value(&self, row: usize) -> Result<DateTime<Utc>, StoreError> {
        match self {
            Self::Text(array) => {
                let raw = downcast::<StringArray>(array, "collected_at")?.value(row);
                DateTime::parse_from_rfc3339(raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| StoreError::Schema(format!("invalid collected_at {raw:?}: {e}")))
            }
            Self::Micros(array) => {
                let micros = downcast::<TimestampMicrosecondArray>(array, "collected_at")?.value(row);
                DateTime::from_timestamp_micros(micros).ok_or_else(|| {
                    StoreError::Schema(format!("collected_at out of range at row {row}"))
                })
            }
        }
    }
}

fn opt_u64(array: &Int64Array, row: usize, name: &str) -> Result<Option<u64>, StoreError> {
    if array.is_null(row) {
        return Ok(None);
    }
    let v = array.value(row);
    u64::try_from(v)
        .map(Some)
        .map_err(|_| StoreError::Schema(format!("negative value {v} in column {name}")))
}

/// Convert a batch read from disk back into traffic records.
pub fn record_batch_to_records(batch: &RecordBatch) -> Result<Vec<TrafficRecord>, StoreError> {
    let date_col = cast_column(batch, "date", &DataType::Date32)?;
    let owner_col = cast_column(batch, "repo_owner", &DataType::Utf8)?;
    let name_col = cast_column(batch, "repo_name", &DataType::Utf8)?;
    let dates = downcast::<Date32Array>(&date_col, "date")?;
    let owners = downcast::<StringArray>(&owner_col, "repo_owner")?;
    let names = downcast::<StringArray>(&name_col, "repo_name")?;

    let metric_cols = [
        "clones_total",
        "clones_unique",
        "views_total",
        "views_unique",
        "forks_count",
        "stars_count",
    ]
    .into_iter()
    .map(|name| cast_column(batch, name, &DataType::Int64).map(|a| (name, a)))
    .collect::<Result<Vec<_>, _>>()?;
    let int = |i: usize, row: usize| -> Result<Option<u64>, StoreError> {
        let (name, array) = &metric_cols[i];
        opt_u64(downcast::<Int64Array>(array, name)?, row, name)
    };

    let collected = CollectedAt::from_batch(batch)?;

    let mut records = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let record_date = dates
            .value_as_date(row)
            .ok_or_else(|| StoreError::Schema(format!("invalid date at row {row}")))?;
        let collected_at = collected.value(row)?;

        records.push(TrafficRecord {
            record_date,
            repo_owner: owners.value(row).to_string(),
            repo_name: names.value(row).to_string(),
            clones_total: int(0, row)?,
            clones_unique: int(1, row)?,
            views_total: int(2, row)?,
            views_unique: int(3, row)?,
            forks_count: int(4, row)?,
            stars_count: int(5, row)?,
            collected_at,
        });
    }

    Ok(records)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn sample() -> TrafficRecord {
        let mut r = TrafficRecord::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "NatLabRockies",
            "floris",
            Utc.with_ymd_and_hms(2024, 1, 15, 6, 0, 0).unwrap(),
        );
        r.views_total = Some(100);
        r.views_unique = Some(50);
        r.stars_count = Some(150);
        r
    }

    #[test]
    fn test_schema_fields() {
        let schema = stats_schema();
        assert_eq!(schema.fields().len(), 10);
        assert_eq!(schema.field(0).name(), "date");
        assert_eq!(schema.field(0).data_type(), &DataType::Date32);
        assert!(schema.field(3).is_nullable());
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, COLUMNS);
    }

    #[test]
    fn test_record_batch_columns() {
        let batch = records_to_record_batch(&[sample()], stats_schema()).unwrap();
        assert_eq!(batch.num_columns(), 10);

        let views = batch
            .column(5)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(views.value(0), 100);

        let clones = batch
            .column(3)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert!(clones.is_null(0));

        let collected = batch
            .column(9)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(collected.value(0), "2024-01-15T06:00:00Z");
    }

    #[test]
    fn test_batch_back_to_records_preserves_nulls() {
        let record = sample();
        let batch = records_to_record_batch(std::slice::from_ref(&record), stats_schema()).unwrap();
        let back = record_batch_to_records(&batch).unwrap();
        assert_eq!(back, vec![record]);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let schema = Arc::new(Schema::new(vec![Field::new("date", DataType::Date32, false)]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(Date32Array::from(vec![19723])) as ArrayRef],
        )
        .unwrap();
        assert!(matches!(record_batch_to_records(&batch), Err(StoreError::Schema(_))));
    }

    /// Columns as another writer may lay them out: large and view strings,
    /// Int32 counts, and a UTC timestamp for `collected_at`.
    fn foreign_batch(collected: ArrayRef) -> RecordBatch {
        use arrow::array::{Int32Array, LargeStringArray, StringViewArray};

        let columns: Vec<(&str, ArrayRef)> = vec![
            ("date", Arc::new(Date32Array::from(vec![19723]))),
            ("repo_owner", Arc::new(LargeStringArray::from(vec!["NatLabRockies"]))),
            ("repo_name", Arc::new(StringViewArray::from(vec!["floris"]))),
            ("clones_total", Arc::new(Int32Array::from(vec![Some(7)]))),
            ("clones_unique", Arc::new(Int32Array::from(vec![None::<i32>]))),
            ("views_total", Arc::new(Int64Array::from(vec![Some(100)]))),
            ("views_unique", Arc::new(Int64Array::from(vec![Some(50)]))),
            ("forks_count", Arc::new(Int64Array::from(vec![None::<i64>]))),
            ("stars_count", Arc::new(Int32Array::from(vec![Some(150)]))),
            ("collected_at", collected),
        ];
        RecordBatch::try_from_iter(columns).unwrap()
    }

    #[test]
    fn test_reads_wider_string_and_integer_types() {
        use arrow::array::LargeStringArray;

        let batch = foreign_batch(Arc::new(LargeStringArray::from(vec!["2024-01-15T06:00:00Z"])));
        let records = record_batch_to_records(&batch).unwrap();

        let mut expected = sample();
        expected.clones_total = Some(7);
        assert_eq!(records, vec![expected]);
    }

    #[test]
    fn test_reads_timestamp_collected_at() {
        use arrow::array::TimestampMillisecondArray;

        let at = Utc.with_ymd_and_hms(2024, 1, 15, 6, 0, 0).unwrap();
        let collected = TimestampMillisecondArray::from(vec![at.timestamp_millis()]).with_timezone("UTC");
        let records = record_batch_to_records(&foreign_batch(Arc::new(collected))).unwrap();

        assert_eq!(records[0].collected_at, at);
    }

    #[test]
    fn test_uncastable_column_is_schema_error() {
        use arrow::array::BooleanArray;

        let batch = foreign_batch(Arc::new(BooleanArray::from(vec![true])));
        // Booleans do cast to text, but "true" is not a timestamp.
        assert!(matches!(record_batch_to_records(&batch), Err(StoreError::Schema(_))));
    }

    #[test]
    fn test_value_too_large_for_int64() {
        let mut record = sample();
        record.views_total = Some(u64::MAX);
        assert!(matches!(
            records_to_record_batch(&[record], stats_schema()),
            Err(StoreError::Schema(_))
        ));
    }

    #[test]
    fn test_compression_from_str() {
        assert_eq!(Compression::parse("none"), Some(Compression::None));
        assert_eq!(Compression::parse("SNAPPY"), Some(Compression::Snappy));
        assert_eq!(Compression::parse("zstd"), Some(Compression::Zstd));
        assert_eq!(Compression::parse("gzip"), None);
        assert_eq!(Compression::default(), Compression::Snappy);
    }
}
