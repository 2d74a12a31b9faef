// Primitives for the CSV response store.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

use crate::survey::*;

/// Appends one response to the store at `path`.
///
/// The header row is written only when the file does not exist yet. When the
/// file exists and already has a first row, that row must match the fields of
/// the response, otherwise nothing is written.
pub fn append_response(path: &Path, record: &SurveyResponse) -> CollectorResult<()> {
    let path_s = path.display().to_string();
    let header = record.field_names();
    let file_exists = path.is_file();
    if file_exists {
        if let Some(found) = read_header(path)? {
            ensure!(
                found == header,
                HeaderMismatchSnafu {
                    path: path_s,
                    expected: header,
                    found,
                }
            );
        }
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context(OpeningStoreSnafu {
            path: path_s.clone(),
        })?;
    // Rows always start on a new line, even after a truncated write.
    if file_exists && !ends_with_newline(path)? {
        warn!("append_response: {:?} does not end with a newline", path_s);
        file.write_all(b"\n").context(TerminatingRowSnafu {
            path: path_s.clone(),
        })?;
    }
    let mut wtr = writer_builder().from_writer(file);
    if !file_exists {
        info!("append_response: creating store {:?}", path_s);
        wtr.write_record(&header).context(WritingStoreSnafu {
            path: path_s.clone(),
        })?;
    }
    let row = record.to_row();
    debug!("append_response: {:?} <- {:?}", path_s, row);
    wtr.write_record(&row).context(WritingStoreSnafu {
        path: path_s.clone(),
    })?;
    wtr.flush().context(FlushingStoreSnafu { path: path_s })?;
    Ok(())
}

/// The header row of a questionnaire, as it appears in the store.
pub fn header_line(questionnaire: &Questionnaire) -> CollectorResult<String> {
    let mut wtr = writer_builder().from_writer(vec![]);
    wtr.write_record(questionnaire.field_names())
        .context(WritingStoreSnafu { path: "<header>" })?;
    let bytes = match wtr.into_inner() {
        Ok(b) => b,
        Err(e) => whatever!("Could not render the header: {}", e.error()),
    };
    Ok(String::from_utf8_lossy(&bytes).trim_end().to_string())
}

fn read_header(path: &Path) -> CollectorResult<Option<Vec<String>>> {
    let path_s = path.display().to_string();
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(ReadingHeaderSnafu {
            path: path_s.clone(),
        })?;
    let mut records = rdr.into_records();
    match records.next() {
        None => Ok(None),
        Some(first) => {
            let first = first.context(ReadingHeaderSnafu { path: path_s })?;
            Ok(Some(first.iter().map(|s| s.to_string()).collect()))
        }
    }
}

/// True for an empty file, or when the last byte is a line feed.
fn ends_with_newline(path: &Path) -> CollectorResult<bool> {
    let path_s = path.display().to_string();
    let mut file = File::open(path).context(OpeningStoreSnafu {
        path: path_s.clone(),
    })?;
    let len = file.seek(SeekFrom::End(0)).context(OpeningStoreSnafu {
        path: path_s.clone(),
    })?;
    if len == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))
        .and_then(|_| file.read_exact(&mut last))
        .context(OpeningStoreSnafu { path: path_s })?;
    Ok(last[0] == b'\n')
}

fn writer_builder() -> csv::WriterBuilder {
    let mut builder = csv::WriterBuilder::new();
    builder.has_headers(false).terminator(csv::Terminator::Any(b'\n'));
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use survey_collector::collect;
    use tempfile::TempDir;

    fn questionnaire(language: &str) -> Questionnaire {
        Questionnaire::new(
            language,
            vec![
                Question::single("country", &["Norway", "Spain"]),
                Question::multi("purchase_factors", &["Price", "Taste", "Nutrition"]),
                Question::text("improvement", DEFAULT_MAX_CHARS),
            ],
        )
    }

    fn record(q: &Questionnaire) -> SurveyResponse {
        let mut b = AnswerBuilder::new(q);
        b.select("country", "Norway").unwrap();
        b.check("purchase_factors", "Nutrition").unwrap();
        b.check("purchase_factors", "Price").unwrap();
        b.text("improvement", "Bigger tanks, please").unwrap();
        collect(&b.build(), q).unwrap()
    }

    #[test]
    fn first_append_writes_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("visitor_data.csv");
        let q = questionnaire("English");
        let rec = record(&q);
        append_response(&path, &rec).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "timestamp,language,country,purchase_factors,improvement"
        );
        assert!(lines[1].ends_with(",English,Norway,\"Price, Nutrition\",\"Bigger tanks, please\""));
    }

    #[test]
    fn n_appends_give_n_plus_one_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("visitor_data.csv");
        let q = questionnaire("English");
        let rec = record(&q);
        // The same record twice is stored twice.
        for _ in 0..4 {
            append_response(&path, &rec).unwrap();
        }
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 5);
        assert_eq!(
            contents
                .lines()
                .filter(|l| l.starts_with("timestamp,"))
                .count(),
            1
        );
    }

    #[test]
    fn existing_file_gets_no_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("visitor_data.csv");
        let q = questionnaire("English");
        fs::write(&path, "timestamp,language,country,purchase_factors,improvement\n").unwrap();
        append_response(&path, &record(&q)).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn unterminated_last_row_is_not_extended() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("visitor_data.csv");
        let q = questionnaire("English");
        let previous = "2026-05-17 10:00:00,English,Spain,None,x";
        fs::write(
            &path,
            format!(
                "timestamp,language,country,purchase_factors,improvement\n{}",
                previous
            ),
        )
        .unwrap();
        append_response(&path, &record(&q)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with('\n'));
        let rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(contents.as_bytes());
        let rows: Vec<csv::StringRecord> = rdr.into_records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 5));
        assert_eq!(contents.lines().nth(1), Some(previous));
    }

    #[test]
    fn mismatched_header_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("visitor_data.csv");
        let full = questionnaire("English");
        append_response(&path, &record(&full)).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let reduced = Questionnaire::new("Deutsch", vec![Question::single("country", &["Norway"])]);
        let mut b = AnswerBuilder::new(&reduced);
        b.select("country", "Norway").unwrap();
        let rec = collect(&b.build(), &reduced).unwrap();
        let res = append_response(&path, &rec);
        assert!(matches!(res, Err(CollectorError::HeaderMismatch { .. })));
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no_such_dir").join("visitor_data.csv");
        let q = questionnaire("English");
        let res = append_response(&path, &record(&q));
        assert!(matches!(res, Err(CollectorError::OpeningStore { .. })));
        assert!(!res.unwrap_err().is_recoverable());
    }

    #[test]
    fn header_line_is_comma_separated() {
        let q = questionnaire("English");
        assert_eq!(
            header_line(&q).unwrap(),
            "timestamp,language,country,purchase_factors,improvement"
        );
    }
}
