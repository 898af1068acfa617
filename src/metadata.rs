use crate::models::ExifField;
use exif::{Exif, In, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use time::{Date, Month, PrimitiveDateTime, Time, UtcOffset};

#[derive(Debug, Default)]
pub struct PhotoMetadata {
    /// Unix seconds
    pub time_created: Option<i64>,
}

fn read_exif(path: &Path) -> Option<Exif> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            log::error!("Metadata: Failed to open {:?}: {}", path, e);
            return None;
        }
    };
    let mut reader = BufReader::new(file);
    match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Some(exif),
        Err(e) => {
            log::debug!("Metadata: no EXIF in {:?}: {}", path, e);
            None
        }
    }
}

/// Capture time from EXIF, falling back to the file timestamps.
pub fn extract_metadata(path: &Path) -> PhotoMetadata {
    let mut meta = PhotoMetadata::default();
    let exif = read_exif(path);

    if let Some(exif) = exif.as_ref() {
        meta.time_created = exif_timestamp(exif, Tag::DateTimeOriginal)
            .or_else(|| exif_timestamp(exif, Tag::DateTime));
    }

    if meta.time_created.is_none() {
        let file_meta = std::fs::metadata(path).ok();
        meta.time_created = file_meta
            .as_ref()
            .and_then(|m| m.modified().ok())
            .or_else(|| file_meta.as_ref().and_then(|m| m.created().ok()))
            .and_then(unix_seconds);
    }

    meta
}

/// Every primary-image EXIF field as display text.
pub fn read_exif_fields(path: &Path) -> Vec<ExifField> {
    let Some(exif) = read_exif(path) else {
        return Vec::new();
    };
    exif.fields()
        .filter(|f| f.ifd_num == In::PRIMARY)
        .map(|f| ExifField {
            tag: f.tag.to_string(),
            value: f.display_value().with_unit(&exif).to_string().replace('"', ""),
        })
        .collect()
}

fn exif_timestamp(exif: &Exif, tag: Tag) -> Option<i64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match field.value {
        Value::Ascii(ref values) => parse_exif_datetime(values.first()?),
        _ => None,
    }
}

/// Parses `YYYY:MM:DD HH:MM:SS`. EXIF carries no zone unless an offset tag is
/// present, so the value is read as UTC.
pub fn parse_exif_datetime(raw: &[u8]) -> Option<i64> {
    let dt = exif::DateTime::from_ascii(raw).ok()?;
    let date = Date::from_calendar_date(dt.year as i32, Month::try_from(dt.month).ok()?, dt.day).ok()?;
    let time = Time::from_hms(dt.hour, dt.minute, dt.second).ok()?;
    let offset = match dt.offset {
        Some(minutes) => UtcOffset::from_whole_seconds(minutes as i32 * 60).ok()?,
        None => UtcOffset::UTC,
    };
    Some(
        PrimitiveDateTime::new(date, time)
            .assume_offset(offset)
            .unix_timestamp(),
    )
}

fn unix_seconds(system_time: SystemTime) -> Option<i64> {
    Some(system_time.duration_since(UNIX_EPOCH).ok()?.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exif_datetime() {
        assert_eq!(parse_exif_datetime(b"2021:07:04 10:20:30"), Some(1_625_394_030));
        assert_eq!(parse_exif_datetime(b"not a date"), None);
        assert_eq!(parse_exif_datetime(b"2021:13:04 10:20:30"), None);
    }

    #[test]
    fn test_file_without_exif_falls_back_to_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.jpg");
        std::fs::write(&path, b"not really a jpeg").unwrap();

        let meta = extract_metadata(&path);
        let now = unix_seconds(SystemTime::now()).unwrap();
        let taken = meta.time_created.unwrap();
        assert!((now - taken).abs() < 60);
        assert!(read_exif_fields(&path).is_empty());
    }
}
