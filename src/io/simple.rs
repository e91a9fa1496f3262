use crate::strategy::AssignmentMetadata;
use crate::summary::AssignmentOutput;
use crate::StudentRecord;
use chrono::{SecondsFormat, Utc};
use serde_json::json;

/// Read the student table from its simple JSON representation: either a bare
/// array of student records or an object with a "students" array.
pub fn read<R: std::io::Read>(reader: R) -> Result<Vec<StudentRecord>, String> {
    let mut data: serde_json::Value =
        serde_json::from_reader(reader).map_err(|err| err.to_string())?;

    let records_value = if data.is_array() {
        data
    } else if data.is_object() {
        data["students"].take()
    } else {
        return Err(
            "expected an array of student records or an object with a \"students\" array"
                .to_string(),
        );
    };
    let records: Vec<StudentRecord> =
        serde_json::from_value(records_value).map_err(|e| format!("{}", e))?;
    Ok(records)
}

/// Write the computed assignment (classes map, summaries and run metadata) as
/// simple JSON representation to a Writer (e.g. an output file).
pub fn write<W: std::io::Write>(
    writer: W,
    output: &AssignmentOutput,
    metadata: &AssignmentMetadata,
) -> Result<(), String> {
    let data = json!({
        "format": "X-classassignment-simple",
        "version": "1.0",
        "generatedAt": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "classes": output.classes,
        "summaries": output.summaries,
        "metadata": metadata,
    });
    serde_json::to_writer(writer, &data).map_err(|e| format!("{}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{read, write};
    use crate::strategy::AssignmentMetadata;
    use crate::summary::AssignmentOutput;
    use std::collections::BTreeMap;

    const TABLE: &str = r#"[
        {"name": "Alice", "gender": "FEMALE", "academicPerformance": "HIGH",
         "behavioralPerformance": "MEDIUM", "friend1": "Bob", "notWith": "",
         "clusterId": 1, "school": "Test School"},
        {"name": "Bob", "gender": "MALE", "academicPerformance": "LOW",
         "behavioralPerformance": "HIGH", "friend1": "Alice", "friend2": ""}
    ]"#;

    #[test]
    fn test_read_bare_array() {
        let records = read(TABLE.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name.as_deref(), Some("Alice"));
        assert_eq!(records[0].gender.as_deref(), Some("FEMALE"));
        assert_eq!(records[0].cluster_id, Some(1));
        assert_eq!(records[0].school.as_deref(), Some("Test School"));
        assert_eq!(records[1].friend1.as_deref(), Some("Alice"));
        assert_eq!(records[1].friend3, None);
        assert_eq!(records[1].not_with, None);
    }

    #[test]
    fn test_read_wrapped_object() {
        let wrapped = format!(r#"{{"students": {}}}"#, TABLE);
        let records = read(wrapped.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name.as_deref(), Some("Bob"));
    }

    #[test]
    fn test_read_rejects_malformed_json() {
        assert!(read("not json".as_bytes()).is_err());
        assert!(read(r#"{"students": 42}"#.as_bytes()).is_err());
    }

    #[test]
    fn test_write_envelope() {
        let records = read(TABLE.as_bytes()).unwrap();
        let mut classes = BTreeMap::new();
        classes.insert(1, records);
        let output = AssignmentOutput {
            classes,
            summaries: Vec::new(),
        };
        let metadata = AssignmentMetadata::new("greedy", 0.01, 1, 2);

        let mut buffer = Vec::new();
        write(&mut buffer, &output, &metadata).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["format"], "X-classassignment-simple");
        assert_eq!(value["version"], "1.0");
        assert!(value["generatedAt"].is_string());
        assert_eq!(value["classes"]["1"][0]["name"], "Alice");
        assert_eq!(value["metadata"]["algorithm"], "greedy");
    }
}
