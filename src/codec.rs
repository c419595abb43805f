//! CSV interchange for the table dataset.
//!
//! Decoding maps every row onto the header names, validates each row against
//! the record schema and fails as a whole on the first problem.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::domain::{CodecError, DecodeError};
use crate::schema::{self, Candidate, Field, Record};

pub fn decode(text: &str) -> Result<Vec<Record>, DecodeError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DecodeError::ParseFailure(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut seen_headers = HashSet::new();
    for h in headers.iter() {
        if !seen_headers.insert(h.as_str()) {
            return Err(DecodeError::ParseFailure(format!(
                "duplicate header \"{h}\""
            )));
        }
    }

    let mut records = Vec::new();
    let mut ids = HashSet::new();
    for (ridx, result) in reader.records().enumerate() {
        let row = ridx + 1;
        let record = result.map_err(|e| DecodeError::ParseFailure(e.to_string()))?;
        let line = record.position().map(|p| p.line()).unwrap_or(row as u64 + 1);

        if record.len() > headers.len() {
            return Err(DecodeError::ParseFailure(format!(
                "line {line}: expected at most {} fields, found {}",
                headers.len(),
                record.len()
            )));
        }

        // Short rows simply lack the trailing keys.
        let candidate: Candidate = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();

        if !schema::is_valid(&candidate) {
            let missing = schema::missing_fields(&candidate);
            debug!("Row {row} (line {line}) misses {missing:?}");
            return Err(DecodeError::InvalidSchema { row, missing });
        }

        let record = Record::from_candidate(&candidate);
        if !ids.insert(record.id.clone()) {
            return Err(DecodeError::DuplicateId { id: record.id, row });
        }
        records.push(record);
    }

    if records.is_empty() {
        return Err(DecodeError::Empty);
    }

    trace!("Decoded {} records with headers {:?}", records.len(), headers);
    Ok(records)
}

pub fn encode<'a, I>(records: I, columns: &[Field]) -> Result<String, CodecError>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(columns.iter().map(|f| f.name()))?;
    for record in records {
        writer.write_record(columns.iter().map(|&f| record.get(f)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| CodecError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = include_str!("../tests/fixtures/testdata_01.csv");

    fn user(id: &str, name: &str) -> Record {
        Record {
            id: id.into(),
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            age: "30".into(),
            role: "Engineer".into(),
            department: "R&D".into(),
            location: "Vienna".into(),
        }
    }

    #[test]
    fn decode_single_record() {
        let records = decode("id,name,email,age,role\n1,Ann,a@x.com,30,Eng\n").unwrap();
        assert_eq!(
            records,
            vec![Record {
                id: "1".into(),
                name: "Ann".into(),
                email: "a@x.com".into(),
                age: "30".into(),
                role: "Eng".into(),
                ..Default::default()
            }]
        );
    }

    #[test]
    fn decode_fixture() {
        let records = decode(FIXTURE).unwrap();
        assert_eq!(records.len(), 25);
        assert_eq!(records[0].name, "Alice Johnson");
        assert_eq!(records[0].department, "Engineering");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let text = "id,name,email,age,role\n\n1,Ann,a@x.com,30,Eng\n\n2,Bo,b@x.com,41,Ops\n\n";
        let records = decode(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "Bo");
    }

    #[test]
    fn headers_are_matched_by_name() {
        let text = "role,age,email,name,id,team\nEng,30,a@x.com,Ann,1,blue\n";
        let records = decode(text).unwrap();
        assert_eq!(records[0].id, "1");
        assert_eq!(records[0].role, "Eng");
        assert_eq!(records[0].age, "30");
    }

    #[test]
    fn quoted_fields_are_unescaped() {
        let text = "id,name,email,age,role\n1,\"Doe, \"\"JD\"\" John\",j@x.com,30,\"line\nbreak\"\n";
        let records = decode(text).unwrap();
        assert_eq!(records[0].name, "Doe, \"JD\" John");
        assert_eq!(records[0].role, "line\nbreak");
    }

    #[test]
    fn missing_email_column_is_rejected() {
        let err = decode("id,name,age,role\n1,Ann,30,Eng\n").unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidSchema {
                row: 1,
                missing: vec![Field::Email]
            }
        );
    }

    #[test]
    fn short_row_misses_trailing_fields() {
        let err = decode("id,name,email,age,role\n1,Ann\n").unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidSchema {
                row: 1,
                missing: vec![Field::Email, Field::Age, Field::Role]
            }
        );
    }

    #[test]
    fn every_row_is_validated() {
        let text = "id,name,email,age,role\n1,Ann,a@x.com,30,Eng\n2,Bo,b@x.com\n";
        let err = decode(text).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidSchema { row: 2, .. }));
    }

    #[test]
    fn unescaped_delimiter_is_a_parse_failure() {
        let text = "id,name,email,age,role\n1,Doe, John,j@x.com,30,Eng\n";
        let err = decode(text).unwrap_err();
        match err {
            DecodeError::ParseFailure(msg) => assert!(msg.contains("line 2"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn duplicate_headers_are_a_parse_failure() {
        let err = decode("id,name,name,email,age,role\n1,a,b,c,1,r\n").unwrap_err();
        assert!(matches!(err, DecodeError::ParseFailure(_)));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(decode(""), Err(DecodeError::Empty));
        assert_eq!(decode("id,name,email,age,role\n"), Err(DecodeError::Empty));
        assert_eq!(decode("id,name,email,age,role\n\n\n"), Err(DecodeError::Empty));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let text = "id,name,email,age,role\n1,Ann,a@x.com,30,Eng\n1,Bo,b@x.com,41,Ops\n";
        assert_eq!(
            decode(text),
            Err(DecodeError::DuplicateId {
                id: "1".into(),
                row: 2
            })
        );
    }

    #[test]
    fn encode_writes_selected_columns_in_order() {
        let records = vec![user("1", "Ann"), user("2", "Bo")];
        let text = encode(&records, &[Field::Email, Field::Name]).unwrap();
        assert_eq!(text, "email,name\nann@example.com,Ann\nbo@example.com,Bo\n");
    }

    #[test]
    fn encode_quotes_when_needed() {
        let mut record = user("1", "Ann");
        record.name = "Doe, \"JD\"".into();
        record.role = "a\nb".into();
        let text = encode([&record], &[Field::Id, Field::Name, Field::Role]).unwrap();
        assert_eq!(text, "id,name,role\n1,\"Doe, \"\"JD\"\"\",\"a\nb\"\n");
    }

    #[test]
    fn encode_then_decode_reproduces_records() {
        let mut tricky = user("3", "Cy");
        tricky.name = " padded, \"quoted\" ".into();
        tricky.location = "multi\r\nline".into();
        tricky.department = String::new();
        let records = vec![user("1", "Ann"), user("2", "Bo"), tricky];

        let text = encode(&records, &Field::ALL).unwrap();
        assert_eq!(decode(&text).unwrap(), records);

        let fixture = decode(FIXTURE).unwrap();
        let text = encode(&fixture, &Field::ALL).unwrap();
        assert_eq!(decode(&text).unwrap(), fixture);
    }
}
