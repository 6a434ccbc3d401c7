use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::models::{Conversation, Message, Role};

pub const REQUIRED_COLUMNS: [&str; 5] = ["MessageID", "CandidateID", "Entity", "Message", "Date"];

/// Export format first, then ISO-8601 variants.
const TIMESTAMP_FORMATS: [&str; 5] = [
    "%d/%m/%Y %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "CandidateID")]
    candidate_id: String,
    #[serde(rename = "Entity")]
    entity: String,
    #[serde(rename = "Message")]
    message: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "FullName", default)]
    full_name: Option<String>,
}

#[derive(Debug)]
pub struct IngestReport {
    pub conversations: Vec<Conversation>,
    pub total_rows: usize,
    pub error_rows: usize,
}

pub fn load_conversations(path: &Path) -> Result<IngestReport, IngestError> {
    let file = std::fs::File::open(path).map_err(csv::Error::from)?;
    read_conversations(file)
}

/// Reads a transcript export and groups it into per-candidate conversations.
///
/// Rows with an unknown entity or date are skipped and counted, never fatal.
/// Candidates keep the order in which they first appear.
pub fn read_conversations<R: Read>(input: R) -> Result<IngestReport, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|h| h == **column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(IngestError::MissingColumns(missing));
    }

    let mut conversations: Vec<Conversation> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut total_rows = 0usize;
    let mut error_rows = 0usize;

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        total_rows += 1;
        let line = index + 2;

        let row = match result {
            Ok(row) => row,
            Err(err) => {
                warn!(line, error = %err, "skipping malformed row");
                error_rows += 1;
                continue;
            }
        };
        let message = match to_message(&row, line) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "skipping row");
                error_rows += 1;
                continue;
            }
        };

        let slot = *slots.entry(message.candidate_id.clone()).or_insert_with(|| {
            conversations.push(Conversation {
                candidate_id: message.candidate_id.clone(),
                candidate_name: String::new(),
                messages: Vec::new(),
            });
            conversations.len() - 1
        });

        let conversation = &mut conversations[slot];
        if conversation.candidate_name.is_empty() {
            if let Some(name) = row.full_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                conversation.candidate_name = name.to_string();
            }
        }
        conversation.messages.push(message);
    }

    for conversation in &mut conversations {
        if conversation.candidate_name.is_empty() {
            conversation.candidate_name = format!("Candidate {}", conversation.candidate_id);
        }
        conversation.messages.sort_by_key(|m| m.timestamp);
        for (position, message) in conversation.messages.iter_mut().enumerate() {
            message.position = position;
        }
    }

    info!(
        rows = total_rows,
        skipped = error_rows,
        candidates = conversations.len(),
        "transcripts loaded"
    );

    Ok(IngestReport {
        conversations,
        total_rows,
        error_rows,
    })
}

fn to_message(row: &CsvRow, line: usize) -> Result<Message, IngestError> {
    let role = Role::from_entity(&row.entity).ok_or_else(|| IngestError::UnknownEntity {
        row: line,
        value: row.entity.clone(),
    })?;
    let timestamp = parse_timestamp(&row.date).ok_or_else(|| IngestError::InvalidDate {
        row: line,
        value: row.date.clone(),
    })?;

    Ok(Message {
        position: 0,
        role,
        text: row.message.clone(),
        timestamp,
        candidate_id: row.candidate_id.trim().to_string(),
    })
}

/// Parses `d/m/yyyy h:mm am|pm`, falling back to ISO-8601.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// Splits out conversations whose candidate name contains "test".
/// Returns the kept conversations and the names that were removed.
pub fn filter_test_candidates(conversations: Vec<Conversation>) -> (Vec<Conversation>, Vec<String>) {
    let (removed, kept): (Vec<_>, Vec<_>) = conversations
        .into_iter()
        .partition(|c| c.candidate_name.to_lowercase().contains("test"));

    for conversation in &removed {
        debug!(candidate = %conversation.candidate_name, "filtering out test candidate");
    }
    if !removed.is_empty() {
        info!(
            removed = removed.len(),
            remaining = kept.len(),
            "filtered test candidates"
        );
    }

    (kept, removed.into_iter().map(|c| c.candidate_name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    const EXPORT: &str = "\
MessageID,CandidateID,Entity,Message,Date,FullName
m1,42,AI,\"Hi, welcome!\",10/3/2025 9:00 am,Avery Lee
m2,42,user,Thanks,10/3/2025 9:05 am,
m3,7,AI_RECRUITER,Hola,11/3/2025 12:30 pm,
m4,42,AI,What drew you to us?,10/3/2025 9:02 am,
m5,7,robot,beep,11/3/2025 12:31 pm,
m6,7,CANDIDATE,Hola!,not a date,
m7,7,Candidate,Buenas,11/3/2025 12:45 pm,Jules Test
";

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .unwrap()
    }

    #[test]
    fn groups_and_sorts_messages_per_candidate() {
        let report = read_conversations(EXPORT.as_bytes()).unwrap();

        assert_eq!(report.total_rows, 7);
        assert_eq!(report.error_rows, 2);
        let messages: usize = report.conversations.iter().map(|c| c.messages.len()).sum();
        assert_eq!(messages, 5);

        let ids: Vec<&str> = report
            .conversations
            .iter()
            .map(|c| c.candidate_id.as_str())
            .collect();
        assert_eq!(ids, vec!["42", "7"]);

        let avery = &report.conversations[0];
        assert_eq!(avery.candidate_name, "Avery Lee");
        let texts: Vec<&str> = avery.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["Hi, welcome!", "What drew you to us?", "Thanks"]);
        assert_eq!(avery.started_at(), Some(at(10, 9, 0)));
        assert_eq!(avery.messages[2].role, Role::Candidate);

        for conversation in &report.conversations {
            let positions: Vec<usize> = conversation.messages.iter().map(|m| m.position).collect();
            let expected: Vec<usize> = (0..conversation.messages.len()).collect();
            assert_eq!(positions, expected);
        }
    }

    #[test]
    fn name_falls_back_to_first_non_empty_full_name() {
        let report = read_conversations(EXPORT.as_bytes()).unwrap();
        assert_eq!(report.conversations[1].candidate_name, "Jules Test");

        let anonymous = "MessageID,CandidateID,Entity,Message,Date\nm1,9,AI,Hi,1/1/2025 1:00 pm\n";
        let report = read_conversations(anonymous.as_bytes()).unwrap();
        assert_eq!(report.conversations[0].candidate_name, "Candidate 9");
    }

    #[test]
    fn missing_columns_are_reported() {
        let err = read_conversations("MessageID,Entity,Message\n".as_bytes()).unwrap_err();
        match err {
            IngestError::MissingColumns(columns) => {
                assert_eq!(columns, vec!["CandidateID".to_string(), "Date".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parses_export_and_iso_timestamps() {
        assert_eq!(parse_timestamp("10/3/2025 12:15 am"), Some(at(10, 0, 15)));
        assert_eq!(parse_timestamp("10/3/2025 12:15 PM"), Some(at(10, 12, 15)));
        assert_eq!(parse_timestamp("2025-03-10T09:30:00"), Some(at(10, 9, 30)));
        assert_eq!(parse_timestamp(" 2025-03-10 09:30 "), Some(at(10, 9, 30)));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_candidates_are_filtered_by_name() {
        let report = read_conversations(EXPORT.as_bytes()).unwrap();
        let (kept, removed) = filter_test_candidates(report.conversations);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].candidate_name, "Avery Lee");
        assert_eq!(removed, vec!["Jules Test".to_string()]);
    }
}
