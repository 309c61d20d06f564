//! ## Table loading and persistence
//!
//! - [`load_table`] reads a delimited file into a DataFusion [`DataFrame`] with an explicit
//!   column-to-type schema instead of schema inference.
//! - [`write_table`] streams a DataFrame into a Snappy-compressed Parquet file.
//!
//! The fixed schemas of the three raw input files are provided by [`train_schema`],
//! [`test_schema`] and [`store_schema`].

use crate::exceptions::{StoreFeaturesError, StoreFeaturesResult};
use arrow::datatypes::{DataType, Field, Schema};
use datafusion::physical_plan::RecordBatchStream;
use datafusion::prelude::*;
use futures::StreamExt;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Logical column types of the raw files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    SmallInt,
    Int32,
    Float32,
    Categorical,
    Date,
}

impl ColumnType {
    /// Arrow type used for the column. Dates are read as text when date parsing is off.
    pub fn data_type(&self, parse_dates: bool) -> DataType {
        match self {
            ColumnType::SmallInt => DataType::Int8,
            ColumnType::Int32 => DataType::Int32,
            ColumnType::Float32 => DataType::Float32,
            ColumnType::Categorical => DataType::Utf8,
            ColumnType::Date if parse_dates => DataType::Date32,
            ColumnType::Date => DataType::Utf8,
        }
    }
}

/// Column-to-type mapping of a delimited file, in file column order.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub columns: Vec<(String, ColumnType)>,
    /// Parse `Date` columns from `%Y-%m-%d` text.
    pub parse_dates: bool,
    pub delimiter: u8,
}

impl TableSchema {
    pub fn new(columns: &[(&str, ColumnType)]) -> Self {
        Self {
            columns: columns
                .iter()
                .map(|(name, ty)| (name.to_string(), *ty))
                .collect(),
            parse_dates: true,
            delimiter: b',',
        }
    }

    pub fn without_date_parsing(mut self) -> Self {
        self.parse_dates = false;
        self
    }

    pub fn to_arrow(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(|(name, ty)| Field::new(name, ty.data_type(self.parse_dates), true))
                .collect::<Vec<_>>(),
        )
    }
}

/// Schema of the sales history file.
pub fn train_schema() -> TableSchema {
    use ColumnType::*;
    TableSchema::new(&[
        ("Store", Int32),
        ("DayOfWeek", SmallInt),
        ("Date", Date),
        ("Sales", Int32),
        ("Customers", Int32),
        ("Open", SmallInt),
        ("Promo", SmallInt),
        ("StateHoliday", Categorical),
        ("SchoolHoliday", SmallInt),
    ])
}

/// Schema of the forecast target file. `Open` has gaps, which load as nulls.
pub fn test_schema() -> TableSchema {
    use ColumnType::*;
    TableSchema::new(&[
        ("Id", Int32),
        ("Store", Int32),
        ("DayOfWeek", SmallInt),
        ("Date", Date),
        ("Open", SmallInt),
        ("Promo", SmallInt),
        ("StateHoliday", Categorical),
        ("SchoolHoliday", SmallInt),
    ])
}

/// Schema of the store metadata file.
pub fn store_schema() -> TableSchema {
    use ColumnType::*;
    TableSchema::new(&[
        ("Store", Int32),
        ("StoreType", Categorical),
        ("Assortment", Categorical),
        ("CompetitionDistance", Float32),
        ("CompetitionOpenSinceMonth", Categorical),
        ("CompetitionOpenSinceYear", Categorical),
        ("Promo2", SmallInt),
        ("Promo2SinceWeek", Categorical),
        ("Promo2SinceYear", Categorical),
        ("PromoInterval", Categorical),
    ])
    .without_date_parsing()
}

/// Reads a delimited file with a header row using the given schema.
pub async fn load_table(
    ctx: &SessionContext,
    path: &Path,
    schema: &TableSchema,
) -> StoreFeaturesResult<DataFrame> {
    if !path.is_file() {
        return Err(StoreFeaturesError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Input file '{}' not found", path.display()),
        )));
    }
    let path_str = path.to_str().ok_or_else(|| {
        StoreFeaturesError::InvalidParameter(format!("Path '{}' is not valid UTF-8", path.display()))
    })?;
    let arrow_schema = schema.to_arrow();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    let options = CsvReadOptions::new()
        .has_header(true)
        .delimiter(schema.delimiter)
        .schema(&arrow_schema)
        .file_extension(&extension);
    debug!(path = %path.display(), columns = schema.columns.len(), "loading table");
    ctx.read_csv(path_str, options)
        .await
        .map_err(StoreFeaturesError::from)
}

/// Streams `df` into a Parquet file at `path` and returns the number of rows written.
pub async fn write_table(df: DataFrame, path: &Path) -> StoreFeaturesResult<usize> {
    let mut stream = df.execute_stream().await?;
    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, stream.schema(), Some(props))?;
    let mut rows = 0usize;
    while let Some(batch) = stream.next().await {
        let batch = batch?;
        rows += batch.num_rows();
        writer.write(&batch)?;
    }
    writer.close()?;
    info!(path = %path.display(), rows, "table written");
    Ok(rows)
}
