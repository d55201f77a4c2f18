//! # Persistent Tracker
//!
//! Durable per-account history of recorded slots, one pretty-printed JSON
//! file per account:
//!
//! ```json
//! {
//!   "2024-05-01": { "transactionCount": 137, "dailyQuota": 137, "blackoutStartHour": 6 },
//!   "2024-05-02": { "transactionCount": 12 }
//! }
//! ```
//!
//! Reads are forgiving: a missing or malformed file is an empty history, and
//! the older `{"transactionCount": N, "dailyCounts": {...}}` layout is
//! accepted. Writes go through a temp file in the same directory and an
//! atomic rename, so a crash mid-write leaves the previous file intact.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::TrackerError;
use crate::state::{DailyRecord, TrackerState};

const DATE_FORMAT: &str = "%Y-%m-%d";
const LEGACY_COUNT_KEY: &str = "transactionCount";
const LEGACY_DAILY_KEY: &str = "dailyCounts";

/// Storage for tracker state, keyed by account index.
pub trait TrackerStore: Send + Sync {
    fn read(&self, account: usize) -> TrackerState;
    fn write(&self, account: usize, state: &TrackerState) -> Result<(), TrackerError>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordBody {
    #[serde(default)]
    transaction_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    daily_quota: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    blackout_start_hour: Option<u32>,
}

/// `wallet_{N}_tracker.json` files in one directory.
#[derive(Debug, Clone)]
pub struct FileTracker {
    dir: PathBuf,
}

impl FileTracker {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, account: usize) -> PathBuf {
        self.dir.join(format!("wallet_{}_tracker.json", account))
    }
}

impl TrackerStore for FileTracker {
    fn read(&self, account: usize) -> TrackerState {
        let path = self.path_for(account);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return TrackerState::default(),
            Err(e) => {
                warn!("Wallet {}: cannot read tracker {}: {}", account, path.display(), e);
                return TrackerState::default();
            }
        };
        match serde_json::from_str::<Value>(&contents) {
            Ok(value) => decode(&value).unwrap_or_else(|| {
                warn!(
                    "Wallet {}: tracker {} is not an object, starting empty",
                    account,
                    path.display()
                );
                TrackerState::default()
            }),
            Err(e) => {
                warn!(
                    "Wallet {}: tracker {} is malformed ({}), starting empty",
                    account,
                    path.display(),
                    e
                );
                TrackerState::default()
            }
        }
    }

    fn write(&self, account: usize, state: &TrackerState) -> Result<(), TrackerError> {
        let path = self.path_for(account);
        let json = serde_json::to_string_pretty(&encode(state))?;
        write_atomic(&self.dir, &path, json.as_bytes())?;
        debug!("Wallet {}: tracker saved to {}", account, path.display());
        Ok(())
    }
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), TrackerError> {
    let io_err = |source| TrackerError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| TrackerError::Persist {
        path: path.display().to_string(),
        reason: e.error.to_string(),
    })?;
    Ok(())
}

fn encode(state: &TrackerState) -> Value {
    let mut root = Map::new();
    for record in state.records() {
        let body = RecordBody {
            transaction_count: record.count,
            daily_quota: record.quota,
            blackout_start_hour: record.blackout_start_hour,
        };
        if let Ok(value) = serde_json::to_value(body) {
            root.insert(record.date.format(DATE_FORMAT).to_string(), value);
        }
    }
    if let Some(count) = state.legacy_count {
        root.insert(LEGACY_COUNT_KEY.to_string(), Value::from(count));
    }
    Value::Object(root)
}

fn decode(value: &Value) -> Option<TrackerState> {
    let root = value.as_object()?;
    let mut state = TrackerState::default();
    for (key, entry) in root {
        match key.as_str() {
            LEGACY_COUNT_KEY => state.legacy_count = entry.as_u64(),
            LEGACY_DAILY_KEY => {
                if let Some(days) = entry.as_object() {
                    for (date, body) in days {
                        decode_record(&mut state, date, body);
                    }
                }
            }
            date => decode_record(&mut state, date, entry),
        }
    }
    Some(state)
}

fn decode_record(state: &mut TrackerState, date: &str, body: &Value) {
    let Ok(date) = NaiveDate::parse_from_str(date, DATE_FORMAT) else {
        warn!("Ignoring unknown tracker key '{}'", date);
        return;
    };
    match serde_json::from_value::<RecordBody>(body.clone()) {
        Ok(body) => state.insert(DailyRecord {
            date,
            count: body.transaction_count,
            quota: body.daily_quota,
            blackout_start_hour: body.blackout_start_hour,
        }),
        Err(e) => warn!("Ignoring malformed tracker record for {}: {}", date, e),
    }
}
