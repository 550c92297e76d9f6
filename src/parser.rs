//! Loader for the delimited traffic-survey exports.
//!
//! A table is read in two steps: [`read_table`] skips the leading metadata
//! rows and checks the file exists, then one of the `extract_*` functions
//! validates the table against a column layout and converts each row into a
//! typed record. Rows with missing or non-numeric values are dropped and
//! counted, never reported one by one.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use csv::{ByteRecord, ReaderBuilder, StringRecord};
use thiserror::Error;
use tracing::{debug, warn};

use crate::analyzers::types::{
    ClassEmissions, ClassVolume, DailyTotal, HeavyVolume, Hourly, HourlySeries, LinkId,
    LinkRecord, RowCounts, SpeedRecord,
};
use crate::schema::{
    ClassColumns, EmissionSchema, Field, HOURS, HeavySchema, SpeedSchema, VolumeSchema, widest,
};

/// Where a table lives and how its preamble looks.
#[derive(Debug, Clone, Copy)]
pub struct TableSource<'a> {
    pub name: &'static str,
    pub path: &'a Path,
    pub skip_rows: usize,
    pub delimiter: char,
    pub has_header: bool,
}

/// Failures that make a table unusable as a whole.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{table} table not found at {}", path.display())]
    MissingFile { table: &'static str, path: PathBuf },

    #[error("failed to open {table} table at {}: {source}", path.display())]
    Io {
        table: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {table} table at {}: {source}", path.display())]
    Csv {
        table: &'static str,
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{table} table delimiter {delimiter:?} is not a single-byte character")]
    InvalidDelimiter { table: &'static str, delimiter: char },

    #[error("{table} table has no data rows after skipping {skip_rows} rows")]
    Empty { table: &'static str, skip_rows: usize },

    #[error(
        "{table} table has {found} columns but its layout needs {expected} \
         (field `{field}` ends at column {last_index})"
    )]
    TooFewColumns {
        table: &'static str,
        expected: usize,
        found: usize,
        field: &'static str,
        last_index: usize,
    },

    #[error("{table} table header has no column labelled {label:?}")]
    MissingHeader { table: &'static str, label: String },
}

/// A table after its metadata rows were skipped, still untyped.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub name: &'static str,
    pub header: Option<StringRecord>,
    pub rows: Vec<StringRecord>,
    /// Data rows that were not valid UTF-8.
    pub unreadable: usize,
}

/// Typed rows extracted from a table plus how many were dropped.
#[derive(Debug, Clone)]
pub struct Extracted<T> {
    pub rows: Vec<T>,
    pub counts: RowCounts,
}

/// Reads a delimited table, skipping `skip_rows` leading rows and, if
/// requested, one header row after them.
///
/// # Errors
///
/// Returns [`LoadError::MissingFile`] when the file does not exist and
/// [`LoadError::Empty`] when nothing follows the preamble.
pub fn read_table(source: &TableSource) -> Result<RawTable, LoadError> {
    let delimiter = u8::try_from(source.delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or(LoadError::InvalidDelimiter {
            table: source.name,
            delimiter: source.delimiter,
        })?;

    let file = File::open(source.path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            LoadError::MissingFile {
                table: source.name,
                path: source.path.to_path_buf(),
            }
        } else {
            LoadError::Io {
                table: source.name,
                path: source.path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(file);

    let mut header = None;
    let mut rows = Vec::new();
    let mut unreadable = 0usize;
    let mut record = ByteRecord::new();
    let mut position = 0usize;

    loop {
        let more = reader.read_byte_record(&mut record).map_err(|e| LoadError::Csv {
            table: source.name,
            path: source.path.to_path_buf(),
            source: e,
        })?;
        if !more {
            break;
        }

        if position == 0 {
            strip_bom(&mut record);
        }
        position += 1;

        if position <= source.skip_rows {
            continue;
        }

        if source.has_header && header.is_none() {
            header = Some(StringRecord::from_byte_record_lossy(record.clone()));
            continue;
        }

        match StringRecord::from_byte_record(record.clone()) {
            Ok(row) => rows.push(row),
            Err(_) => unreadable += 1,
        }
    }

    if rows.is_empty() && unreadable == 0 {
        return Err(LoadError::Empty {
            table: source.name,
            skip_rows: source.skip_rows,
        });
    }

    debug!(
        table = source.name,
        rows = rows.len(),
        unreadable,
        "Table read"
    );

    Ok(RawTable {
        name: source.name,
        header,
        rows,
        unreadable,
    })
}

fn strip_bom(record: &mut ByteRecord) {
    const BOM: &[u8] = b"\xEF\xBB\xBF";

    let Some(first) = record.get(0) else {
        return;
    };
    if !first.starts_with(BOM) {
        return;
    }

    let mut stripped = ByteRecord::new();
    for (i, field) in record.iter().enumerate() {
        if i == 0 {
            stripped.push_field(&field[BOM.len()..]);
        } else {
            stripped.push_field(field);
        }
    }
    *record = stripped;
}

impl RawTable {
    /// Checks the first data row is wide enough for every field.
    ///
    /// # Errors
    ///
    /// [`LoadError::TooFewColumns`] naming the field that does not fit.
    pub fn check_width(&self, fields: &[Field]) -> Result<(), LoadError> {
        let Some(field) = widest(fields) else {
            return Ok(());
        };
        let expected = field.last_index() + 1;
        let found = self.rows.first().map_or(0, StringRecord::len);

        if found < expected {
            return Err(LoadError::TooFewColumns {
                table: self.name,
                expected,
                found,
                field: field.name,
                last_index: field.last_index(),
            });
        }
        Ok(())
    }

    /// Runs `parse` over every row, keeping the rows it accepts.
    fn extract<T>(&self, parse: impl Fn(&StringRecord) -> Option<T>) -> Extracted<T> {
        let rows: Vec<T> = self.rows.iter().filter_map(parse).collect();
        let dropped = self.rows.len() - rows.len() + self.unreadable;

        if dropped > 0 {
            warn!(
                table = self.name,
                dropped,
                kept = rows.len(),
                "Rows with missing or non-numeric values dropped"
            );
        }

        Extracted {
            counts: RowCounts {
                loaded: rows.len(),
                dropped,
            },
            rows,
        }
    }

    /// Finds the column index of each hourly header label.
    fn hourly_header_columns(&self) -> Result<[usize; HOURS], LoadError> {
        let mut columns = [0usize; HOURS];
        for (hour, column) in columns.iter_mut().enumerate() {
            let label = SpeedSchema::hour_label(hour);
            *column = self
                .header
                .as_ref()
                .and_then(|h| h.iter().position(|cell| cell.trim() == label))
                .ok_or(LoadError::MissingHeader {
                    table: self.name,
                    label,
                })?;
        }
        Ok(columns)
    }
}

/// Link records (geometry + all-vehicle hourly volume) from the volume table.
/// Heavy-vehicle totals are attached separately.
pub fn extract_link_records(
    table: &RawTable,
    schema: &VolumeSchema,
) -> Result<Extracted<LinkRecord>, LoadError> {
    table.check_width(&schema.link_fields())?;

    Ok(table.extract(|row| {
        Some(LinkRecord {
            link_id: parse_link_id(row.get(schema.link_id))?,
            road_class: parse_text(row.get(schema.road_class))?,
            road_name: parse_text(row.get(schema.road_name))?,
            length_km: parse_real(row.get(schema.length_km))?,
            lane_count: parse_count(row.get(schema.lane_count))?,
            hourly_volume: parse_hourly(row, schema.hourly_start)?,
            heavy: None,
        })
    }))
}

/// Bare hourly volume series from the volume table.
pub fn extract_hourly_volumes(
    table: &RawTable,
    schema: &VolumeSchema,
) -> Result<Extracted<HourlySeries>, LoadError> {
    table.check_width(&schema.hourly_fields())?;

    Ok(table.extract(|row| {
        Some(HourlySeries {
            link_id: parse_link_id(row.get(schema.link_id))?,
            values: parse_hourly(row, schema.hourly_start)?,
        })
    }))
}

/// Daily all-vehicle totals from the volume table.
pub fn extract_daily_volumes(
    table: &RawTable,
    schema: &VolumeSchema,
) -> Result<Extracted<DailyTotal>, LoadError> {
    table.check_width(&schema.daily_fields())?;

    Ok(table.extract(|row| {
        Some(DailyTotal {
            link_id: parse_link_id(row.get(schema.link_id))?,
            value: parse_volume(row.get(schema.daily_total))?,
        })
    }))
}

/// Daily bus and truck totals from the heavy-vehicle table.
pub fn extract_heavy_totals(
    table: &RawTable,
    schema: &HeavySchema,
) -> Result<Extracted<(LinkId, HeavyVolume)>, LoadError> {
    table.check_width(&schema.daily_fields())?;

    Ok(table.extract(|row| {
        Some((
            parse_link_id(row.get(schema.link_id))?,
            HeavyVolume {
                bus: parse_volume(row.get(schema.bus_daily))?,
                truck: parse_volume(row.get(schema.truck_daily))?,
            },
        ))
    }))
}

/// Daily and hourly volume of one vehicle class.
pub fn extract_class_volumes(
    table: &RawTable,
    columns: ClassColumns,
) -> Result<Extracted<ClassVolume>, LoadError> {
    table.check_width(&columns.fields())?;

    Ok(table.extract(|row| {
        Some(ClassVolume {
            link_id: parse_link_id(row.get(columns.link_id))?,
            daily: parse_volume(row.get(columns.daily))?,
            hourly: parse_hourly(row, columns.hourly_start)?,
        })
    }))
}

/// Daily CO₂ of each vehicle class from the emission table.
pub fn extract_class_emissions(
    table: &RawTable,
    schema: &EmissionSchema,
) -> Result<Extracted<ClassEmissions>, LoadError> {
    table.check_width(&schema.class_fields())?;

    Ok(table.extract(|row| {
        Some(ClassEmissions {
            link_id: parse_link_id(row.get(schema.link_id))?,
            car: parse_real(row.get(schema.co2_car))?,
            bus: parse_real(row.get(schema.co2_bus))?,
            truck: parse_real(row.get(schema.co2_truck))?,
        })
    }))
}

/// Daily all-class CO₂ from the emission table.
pub fn extract_total_emissions(
    table: &RawTable,
    schema: &EmissionSchema,
) -> Result<Extracted<DailyTotal>, LoadError> {
    table.check_width(&schema.total_fields())?;

    Ok(table.extract(|row| {
        Some(DailyTotal {
            link_id: parse_link_id(row.get(schema.link_id))?,
            value: parse_real(row.get(schema.co2_total))?,
        })
    }))
}

/// Speed records from the average-speed table. The table must have been read
/// with its header row.
///
/// A row is kept when its link id and all 24 speeds parse; blank descriptive
/// cells (class, name, region, length, lanes) do not drop it.
pub fn extract_speed_records(
    table: &RawTable,
    schema: &SpeedSchema,
) -> Result<Extracted<SpeedRecord>, LoadError> {
    table.check_width(&schema.key_fields())?;
    let hour_columns = table.hourly_header_columns()?;

    Ok(table.extract(|row| {
        let mut hourly_speed = [0.0; HOURS];
        for (slot, &column) in hourly_speed.iter_mut().zip(&hour_columns) {
            *slot = parse_volume(row.get(column))?;
        }

        Some(SpeedRecord {
            link_id: parse_link_id(row.get(schema.link_id))?,
            road_class: parse_text(row.get(schema.road_class)).unwrap_or_default(),
            road_name: parse_text(row.get(schema.road_name)).unwrap_or_default(),
            region: parse_text(row.get(schema.region)),
            length_km: parse_real(row.get(schema.length_km)),
            lane_count: parse_count(row.get(schema.lane_count)),
            hourly_speed,
        })
    }))
}

/// Parses a finite real number; blanks and text are `None`.
pub fn parse_real(cell: Option<&str>) -> Option<f64> {
    cell?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// A real that must not be negative (vehicle counts, speeds).
pub fn parse_volume(cell: Option<&str>) -> Option<f64> {
    parse_real(cell).filter(|v| *v >= 0.0)
}

/// A whole, non-negative number such as a lane count. `"2"` and `"2.0"` are
/// both accepted.
pub fn parse_count(cell: Option<&str>) -> Option<u32> {
    let value = parse_volume(cell)?;
    if value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return None;
    }
    Some(value as u32)
}

/// A link id written either as an integer or as an integral float.
pub fn parse_link_id(cell: Option<&str>) -> Option<LinkId> {
    let trimmed = cell?.trim();
    if let Ok(id) = trimmed.parse::<LinkId>() {
        return Some(id);
    }

    let value = trimmed.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        Some(value as LinkId)
    } else {
        None
    }
}

/// Non-blank text, trimmed.
pub fn parse_text(cell: Option<&str>) -> Option<String> {
    let trimmed = cell?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// [`HOURS`] consecutive non-negative values starting at `start`.
pub fn parse_hourly(row: &StringRecord, start: usize) -> Option<Hourly> {
    let mut hourly = [0.0; HOURS];
    for (hour, slot) in hourly.iter_mut().enumerate() {
        *slot = parse_volume(row.get(start + hour))?;
    }
    Some(hourly)
}
