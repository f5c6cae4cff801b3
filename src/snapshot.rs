use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::SnapshotError;
use crate::models::{ListingRecord, Snapshot, SnapshotHandle};

const FILE_PREFIX: &str = "results_";
const FILE_SUFFIX: &str = ".csv";
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";
// Files written by the earlier tool only carry second precision
const LEGACY_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub const COLUMNS: [&str; 10] = [
    "rooms",
    "locationId",
    "multimedia",
    "price",
    "status",
    "size",
    "address",
    "bathrooms",
    "url",
    "district",
];

/// Write-once storage of listing snapshots
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist a new snapshot; never replaces an existing one
    async fn save(&self, records: &[ListingRecord]) -> Result<SnapshotHandle, SnapshotError>;

    /// The most recently written snapshot, if any
    async fn load_latest(&self) -> Result<Option<Snapshot>, SnapshotError>;
}

/// One CSV file per snapshot, named after its creation time
#[derive(Debug, Clone)]
pub struct CsvSnapshotStore {
    dir: PathBuf,
    last_stamp: Arc<Mutex<Option<DateTime<Utc>>>>,
}

/// Fully written rows waiting for their final name
struct StagedSnapshot {
    file: NamedTempFile,
    record_count: usize,
}

/// Flat CSV row; multimedia is stored as a JSON array
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct CsvRow {
    rooms: String,
    #[serde(rename = "locationId")]
    location_id: String,
    multimedia: String,
    price: String,
    status: String,
    size: String,
    address: String,
    bathrooms: String,
    url: String,
    district: String,
}

impl CsvRow {
    fn from_record(record: &ListingRecord) -> Result<Self, SnapshotError> {
        Ok(Self {
            rooms: record.rooms.clone(),
            location_id: record.location_id.clone(),
            multimedia: serde_json::to_string(&record.multimedia)?,
            price: record.price.clone(),
            status: record.status.clone(),
            size: record.size.clone(),
            address: record.address.clone(),
            bathrooms: record.bathrooms.clone(),
            url: record.url.clone(),
            district: record.district.clone(),
        })
    }

    fn into_record(self) -> Result<ListingRecord, SnapshotError> {
        let multimedia = if self.multimedia.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&self.multimedia)?
        };

        Ok(ListingRecord {
            rooms: self.rooms,
            location_id: self.location_id,
            multimedia,
            price: self.price,
            status: self.status,
            size: self.size,
            address: self.address,
            bathrooms: self.bathrooms,
            url: self.url,
            district: self.district,
        })
    }
}

impl CsvSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            last_stamp: Arc::new(Mutex::new(None)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All snapshot files, oldest first
    pub fn list(&self) -> Result<Vec<PathBuf>, SnapshotError> {
        let mut files: Vec<PathBuf> = self
            .snapshot_files()?
            .into_iter()
            .map(|(_, path)| path)
            .collect();
        files.sort();
        Ok(files)
    }

    /// Strictly increasing stamp, even when the clock has not moved or went back
    fn next_stamp(&self) -> DateTime<Utc> {
        let mut last = self
            .last_stamp
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Utc::now().trunc_subsecs(6);
        let stamp = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(stamp);
        stamp
    }

    fn save_blocking(&self, records: &[ListingRecord]) -> Result<SnapshotHandle, SnapshotError> {
        let staged = self.stage(records)?;
        self.publish(staged)
    }

    /// Write the rows under a temporary name that `load_latest` never matches
    fn stage(&self, records: &[ListingRecord]) -> Result<StagedSnapshot, SnapshotError> {
        fs::create_dir_all(&self.dir)?;
        let mut file = NamedTempFile::new_in(&self.dir)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file.as_file_mut());
        writer.write_record(COLUMNS)?;
        for record in records {
            writer.serialize(CsvRow::from_record(record)?)?;
        }
        writer.flush()?;
        drop(writer);
        file.as_file().sync_all()?;

        Ok(StagedSnapshot {
            file,
            record_count: records.len(),
        })
    }

    /// Move a complete file to its final name; existing snapshots are never replaced
    fn publish(&self, staged: StagedSnapshot) -> Result<SnapshotHandle, SnapshotError> {
        let StagedSnapshot {
            mut file,
            record_count,
        } = staged;

        let mut stamp = self.next_stamp();
        loop {
            let path = self.dir.join(file_name(&stamp));
            match file.persist_noclobber(&path) {
                Ok(_) => {
                    info!("💾 Saved {} listings to {}", record_count, path.display());
                    return Ok(SnapshotHandle {
                        path,
                        created_at: stamp,
                        record_count,
                    });
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                    debug!("{} already exists, advancing timestamp", path.display());
                    file = e.file;
                    stamp = stamp + Duration::microseconds(1);
                    *self
                        .last_stamp
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(stamp);
                }
                Err(e) => return Err(e.error.into()),
            }
        }
    }

    fn load_latest_blocking(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let latest = self
            .snapshot_files()?
            .into_iter()
            .max_by(|(a_time, a_path), (b_time, b_path)| {
                a_time.cmp(b_time).then_with(|| a_path.cmp(b_path))
            });

        let Some((modified, path)) = latest else {
            return Ok(None);
        };

        let mut reader = csv::Reader::from_path(&path)?;
        let records = reader
            .deserialize::<CsvRow>()
            .map(|row| row.map_err(SnapshotError::from).and_then(CsvRow::into_record))
            .collect::<Result<Vec<_>, _>>()?;

        let created_at =
            stamp_from_path(&path).unwrap_or_else(|| DateTime::<Utc>::from(modified));
        debug!("Loaded {} listings from {}", records.len(), path.display());

        Ok(Some(Snapshot { created_at, records }))
    }

    fn snapshot_files(&self) -> Result<Vec<(SystemTime, PathBuf)>, SnapshotError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX)) {
                continue;
            }
            let metadata = entry.metadata()?;
            if metadata.is_file() {
                files.push((metadata.modified()?, entry.path()));
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl SnapshotStore for CsvSnapshotStore {
    async fn save(&self, records: &[ListingRecord]) -> Result<SnapshotHandle, SnapshotError> {
        let store = self.clone();
        let records = records.to_vec();
        tokio::task::spawn_blocking(move || store.save_blocking(&records))
            .await
            .map_err(|e| SnapshotError::Io(std::io::Error::new(ErrorKind::Other, e)))?
    }

    async fn load_latest(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.load_latest_blocking())
            .await
            .map_err(|e| SnapshotError::Io(std::io::Error::new(ErrorKind::Other, e)))?
    }
}

fn file_name(stamp: &DateTime<Utc>) -> String {
    format!("{}{}{}", FILE_PREFIX, stamp.format(STAMP_FORMAT), FILE_SUFFIX)
}

fn stamp_from_path(path: &Path) -> Option<DateTime<Utc>> {
    let name = path.file_name()?.to_str()?;
    let stamp = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(stamp, LEGACY_STAMP_FORMAT))
        .ok()
        .map(|naive| naive.and_utc())
}
