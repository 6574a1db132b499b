use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

use super::pipeline_models::{AnalysisResult, ArchiveRef, CellValue, FileRecord, ReportRow};

/// Columns every report row carries, in order.
pub const BASE_COLUMNS: [&str; 7] = [
    "folder",
    "name",
    "mime_type",
    "size_bytes",
    "modified",
    "archive",
    "labels",
];

/// Builds the object name for an archived file. Prefixes are cosmetic, so
/// trailing slashes are dropped and an empty prefix means "no folder".
pub fn object_name(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

/// Renders labels as `(97.12%) Dog, (88.00%) Pet`.
pub fn label_summary(analysis: &AnalysisResult) -> String {
    analysis
        .labels()
        .iter()
        .map(|label| format!("({:.2}%) {}", label.score * 100.0, label.description))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rejects chrono format strings with unknown or dangling specifiers
/// (`%Q`, a trailing `%`), which would otherwise fail only at render time.
pub fn check_time_format(format: &str) -> Result<(), String> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(format!("'{}' is not a valid time format", format));
    }
    Ok(())
}

pub fn format_timestamp(time: &DateTime<Utc>, format: &str) -> Result<String, String> {
    check_time_format(format)?;
    let mut rendered = String::new();
    write!(rendered, "{}", time.format(format))
        .map_err(|_| format!("cannot render timestamp with '{}'", format))?;
    Ok(rendered)
}

/// Which optional columns a report row carries. The shape is decided once
/// per run so every row in a sheet lines up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowLayout {
    pub description: bool,
    pub location: bool,
}

impl RowLayout {
    pub fn column_count(&self) -> usize {
        BASE_COLUMNS.len() + usize::from(self.description) + usize::from(self.location)
    }

    pub fn header(&self) -> Vec<&'static str> {
        let mut header = BASE_COLUMNS.to_vec();
        if self.description {
            header.push("description");
        }
        if self.location {
            header.push("location");
        }
        header
    }

    pub fn build_row(
        &self,
        folder: &str,
        file: &FileRecord,
        timestamp_format: &str,
        archive: &ArchiveRef,
        analysis: &AnalysisResult,
        description: Option<&str>,
    ) -> Result<ReportRow, String> {
        let mut cells = vec![
            CellValue::from(folder),
            CellValue::from(file.name.as_str()),
            CellValue::from(file.mime_type.as_str()),
            CellValue::from(file.size),
            CellValue::from(format_timestamp(&file.modified_time, timestamp_format)?),
            CellValue::from(archive.browser_url()),
            CellValue::from(label_summary(analysis)),
        ];

        if self.description {
            cells.push(CellValue::from(description.unwrap_or_default()));
        }
        if self.location {
            let link = file.location.map(|l| l.maps_url()).unwrap_or_default();
            cells.push(CellValue::from(link));
        }

        Ok(ReportRow { cells })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::pipeline_models::{GeoLocation, LabelAnnotation};
    use chrono::{TimeZone, Utc};

    fn record(location: Option<GeoLocation>) -> FileRecord {
        FileRecord {
            id: "abc".into(),
            name: "vacation.jpg".into(),
            mime_type: "image/jpeg".into(),
            size: 2048,
            modified_time: Utc.with_ymd_and_hms(2023, 1, 1, 9, 30, 0).unwrap(),
            location,
            payload: vec![0; 2048],
        }
    }

    fn archive() -> ArchiveRef {
        ArchiveRef {
            bucket: "my-bucket".into(),
            object_name: "vacation.jpg".into(),
            generation: None,
            media_link: None,
        }
    }

    fn labels() -> AnalysisResult {
        AnalysisResult::from_service(
            vec![
                LabelAnnotation { description: "Dog".into(), score: 0.9712 },
                LabelAnnotation { description: "Pet".into(), score: 0.88 },
            ],
            5,
        )
    }

    #[test]
    fn object_name_joins_prefix() {
        assert_eq!(object_name("backups", "a.jpg"), "backups/a.jpg");
        assert_eq!(object_name("backups/", "a.jpg"), "backups/a.jpg");
        assert_eq!(object_name("", "a.jpg"), "a.jpg");
        assert_eq!(object_name("2023/trips", "a.jpg"), "2023/trips/a.jpg");
    }

    #[test]
    fn label_summary_format() {
        assert_eq!(label_summary(&labels()), "(97.12%) Dog, (88.00%) Pet");
        assert_eq!(label_summary(&AnalysisResult::default()), "");
    }

    #[test]
    fn base_row_has_seven_columns_even_without_folder() {
        let layout = RowLayout::default();
        let row = layout.build_row("", &record(None), "%Y-%m-%d", &archive(), &labels(), None)
            .unwrap();

        assert_eq!(row.cells.len(), 7);
        assert_eq!(row.cells.len(), layout.column_count());
        assert_eq!(row.cells[0], CellValue::Text(String::new()));
        assert_eq!(row.cells[3], CellValue::Number(2048));
        assert_eq!(row.cells[4], CellValue::Text("2023-01-01".into()));
    }

    #[test]
    fn optional_columns_are_always_present_when_enabled() {
        let layout = RowLayout { description: true, location: true };

        let without = layout
            .build_row("x", &record(None), "%Y-%m-%d", &archive(), &labels(), None)
            .unwrap();
        assert_eq!(without.cells.len(), 9);
        assert_eq!(without.cells[7], CellValue::Text(String::new()));
        assert_eq!(without.cells[8], CellValue::Text(String::new()));

        let location = GeoLocation { latitude: 1.5, longitude: 2.5 };
        let with = layout.build_row(
            "x",
            &record(Some(location)),
            "%Y-%m-%d %H:%M",
            &archive(),
            &labels(),
            Some("A dog on a beach."),
        )
        .unwrap();
        assert_eq!(with.cells.len(), 9);
        assert_eq!(with.cells[4], CellValue::Text("2023-01-01 09:30".into()));
        assert_eq!(with.cells[7], CellValue::Text("A dog on a beach.".into()));
        assert_eq!(with.cells[8], CellValue::Text(location.maps_url()));
    }

    #[test]
    fn time_format_validation() {
        assert!(check_time_format("%Y-%m-%d").is_ok());
        assert!(check_time_format("%d/%m/%Y %H:%M").is_ok());
        assert!(check_time_format("plain text").is_ok());
        assert!(check_time_format("%Q").is_err());
        assert!(check_time_format("%Y-%").is_err());
    }

    #[test]
    fn bad_time_format_is_an_error_not_a_panic() {
        let err = RowLayout::default()
            .build_row("x", &record(None), "%Q", &archive(), &labels(), None)
            .unwrap_err();
        assert!(err.contains("%Q"));
    }

    #[test]
    fn header_matches_column_count() {
        for layout in [
            RowLayout::default(),
            RowLayout { description: true, location: false },
            RowLayout { description: false, location: true },
            RowLayout { description: true, location: true },
        ] {
            assert_eq!(layout.header().len(), layout.column_count());
        }
    }
}
