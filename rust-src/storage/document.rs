//! Key-value emulation backend: the whole state is one JSON document.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{BackendKind, KeyValueStore, ReadStatements, StorageBackend, StorageError, Transaction};
use crate::models::{Amount, DailyCounter, DateKey, IncrementEvent};


const CURRENT_DOCUMENT_VERSION: u32 = 1;

fn default_document_version() -> u32 {
    CURRENT_DOCUMENT_VERSION
}


/// Persisted layout of the document backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default = "default_document_version")]
    pub version: u32,
    #[serde(default)]
    pub counters: BTreeMap<DateKey, u64>,
    #[serde(default)]
    pub increments: Vec<IncrementEvent>,
    /// Last id handed out; the next event gets `next_id + 1`.
    #[serde(default)]
    pub next_id: i64,
}


/// Counters kept as one serialized document under a single storage key.
///
/// Every transaction takes the store's lock on the key, reloads the stored
/// document and edits a private copy of it. The copy is written back in full
/// only when the body succeeds, so a failed write leaves the previous
/// document in place. Reads load whatever document was last written.
pub struct DocumentBackend {
    store: Box<dyn KeyValueStore>,
    key: String,
    writer: Mutex<()>,
    closed: AtomicBool,
}


impl DocumentBackend {
    /// Open the document under `key`, starting empty when the key is unset.
    ///
    /// The stored document is checked here so corruption surfaces on open.
    pub fn open(store: Box<dyn KeyValueStore>, key: &str) -> Result<Self, StorageError> {
        let backend = Self {
            store,
            key: key.to_string(),
            writer: Mutex::new(()),
            closed: AtomicBool::new(false),
        };

        let document = backend.load()?;
        log::debug!(
            "loaded document {key:?} with {} days and {} events",
            document.counters.len(),
            document.increments.len()
        );
        Ok(backend)
    }

    fn load(&self) -> Result<Document, StorageError> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(Document {
                version: CURRENT_DOCUMENT_VERSION,
                ..Document::default()
            });
        };

        let mut document: Document =
            serde_json::from_str(&raw).map_err(|e| StorageError::CorruptDocument {
                key: self.key.clone(),
                reason: e.to_string(),
            })?;
        if document.version > CURRENT_DOCUMENT_VERSION {
            return Err(StorageError::CorruptDocument {
                key: self.key.clone(),
                reason: format!("unsupported version {}", document.version),
            });
        }
        // Older writers may not have tracked ids.
        let highest = document.increments.iter().map(|e| e.id).max().unwrap_or(0);
        document.next_id = document.next_id.max(highest);
        Ok(document)
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}


impl StorageBackend for DocumentBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    fn run_transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn Transaction) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        let _writer = self.writer.lock();
        self.ensure_open()?;
        let _key_lock = self.store.lock(&self.key)?;

        let mut draft = DocumentTx {
            document: self.load()?,
            dirty: false,
        };
        work(&mut draft)?;

        if draft.dirty {
            draft.document.version = CURRENT_DOCUMENT_VERSION;
            let raw = serde_json::to_string(&draft.document)?;
            self.store.set(&self.key, &raw)?;
        }
        Ok(())
    }

    fn run_read(
        &self,
        work: &mut dyn FnMut(&dyn ReadStatements) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        self.ensure_open()?;
        let document = self.load()?;
        work(&DocumentView(&document))
    }

    fn close(&self) -> Result<(), StorageError> {
        let _writer = self.writer.lock();
        if !self.closed.swap(true, Ordering::SeqCst) {
            log::debug!("closed document backend {:?}", self.key);
        }
        Ok(())
    }
}


/// Read access to a loaded document.
struct DocumentView<'d>(&'d Document);


/// A private copy of the document being edited by one transaction.
struct DocumentTx {
    document: Document,
    dirty: bool,
}


fn select_by_date(document: &Document, date: DateKey) -> Option<DailyCounter> {
    document
        .counters
        .get(&date)
        .map(|count| DailyCounter { date, count: *count })
}


fn select_all_ordered(document: &Document) -> Vec<DailyCounter> {
    // BTreeMap iteration is already ascending by date.
    document
        .counters
        .iter()
        .map(|(date, count)| DailyCounter { date: *date, count: *count })
        .collect()
}


fn select_hour_sums(document: &Document, date: DateKey) -> Result<Vec<(u8, u64)>, StorageError> {
    let mut sums: BTreeMap<u8, u64> = BTreeMap::new();
    for event in document.increments.iter().filter(|e| e.date == date) {
        let sum = sums.entry(event.hour).or_default();
        *sum = sum
            .checked_add(event.amount)
            .ok_or(StorageError::Overflow { date })?;
    }
    Ok(sums.into_iter().collect())
}


fn select_increments(document: &Document, date: DateKey) -> Vec<IncrementEvent> {
    document
        .increments
        .iter()
        .filter(|e| e.date == date)
        .cloned()
        .collect()
}


impl ReadStatements for DocumentView<'_> {
    fn select_by_date(&self, date: DateKey) -> Result<Option<DailyCounter>, StorageError> {
        Ok(select_by_date(self.0, date))
    }

    fn select_all_ordered(&self) -> Result<Vec<DailyCounter>, StorageError> {
        Ok(select_all_ordered(self.0))
    }

    fn select_hour_sums(&self, date: DateKey) -> Result<Vec<(u8, u64)>, StorageError> {
        select_hour_sums(self.0, date)
    }

    fn select_increments(&self, date: DateKey) -> Result<Vec<IncrementEvent>, StorageError> {
        Ok(select_increments(self.0, date))
    }
}


impl ReadStatements for DocumentTx {
    fn select_by_date(&self, date: DateKey) -> Result<Option<DailyCounter>, StorageError> {
        Ok(select_by_date(&self.document, date))
    }

    fn select_all_ordered(&self) -> Result<Vec<DailyCounter>, StorageError> {
        Ok(select_all_ordered(&self.document))
    }

    fn select_hour_sums(&self, date: DateKey) -> Result<Vec<(u8, u64)>, StorageError> {
        select_hour_sums(&self.document, date)
    }

    fn select_increments(&self, date: DateKey) -> Result<Vec<IncrementEvent>, StorageError> {
        Ok(select_increments(&self.document, date))
    }
}


impl Transaction for DocumentTx {
    fn ensure_schema(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    fn ensure_row(&mut self, date: DateKey) -> Result<(), StorageError> {
        if !self.document.counters.contains_key(&date) {
            self.document.counters.insert(date, 0);
            self.dirty = true;
        }
        Ok(())
    }

    fn add_to_count(&mut self, date: DateKey, amount: Amount) -> Result<usize, StorageError> {
        let Some(count) = self.document.counters.get_mut(&date) else {
            return Ok(0);
        };
        *count = count
            .checked_add(amount.get())
            .filter(|total| *total <= i64::MAX as u64)
            .ok_or(StorageError::Overflow { date })?;
        self.dirty = true;
        Ok(1)
    }

    fn insert_count(&mut self, date: DateKey, count: u64) -> Result<(), StorageError> {
        if self.document.counters.contains_key(&date) {
            return Err(StorageError::InvalidValue(format!("counter for {date} already exists")));
        }
        self.document.counters.insert(date, count);
        self.dirty = true;
        Ok(())
    }

    fn set_count(&mut self, date: DateKey, count: u64) -> Result<usize, StorageError> {
        let Some(current) = self.document.counters.get_mut(&date) else {
            return Ok(0);
        };
        *current = count;
        self.dirty = true;
        Ok(1)
    }

    fn append_increment(
        &mut self,
        date: DateKey,
        hour: u8,
        timestamp: &str,
        amount: Amount,
    ) -> Result<i64, StorageError> {
        self.document.next_id += 1;
        let id = self.document.next_id;
        self.document.increments.push(IncrementEvent {
            id,
            date,
            hour,
            timestamp: timestamp.to_string(),
            amount: amount.get(),
        });
        self.dirty = true;
        Ok(id)
    }
}
