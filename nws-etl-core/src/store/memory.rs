use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};

use crate::{
    error::{EtlError, Result},
    model::{CuratedRow, RawExtract},
};

use super::{CURATED_TABLE, ForecastStore};

/// In-process store with the same append-only behaviour as [`super::PgStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    raw: Mutex<Vec<RawExtract>>,
    curated: Mutex<Vec<CuratedRow>>,
    reject_raw: bool,
    reject_curated: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every write fails, as an unreachable database would.
    pub fn unavailable() -> Self {
        Self { reject_raw: true, reject_curated: true, ..Self::default() }
    }

    /// Raw captures succeed but curated appends fail, as when the connection
    /// drops between the two writes.
    pub fn rejecting_curated() -> Self {
        Self { reject_curated: true, ..Self::default() }
    }

    pub fn raw_extracts(&self) -> Vec<RawExtract> {
        lock(&self.raw).clone()
    }

    pub fn curated_rows(&self) -> Vec<CuratedRow> {
        lock(&self.curated).clone()
    }

    fn check_available(&self, rejected: bool) -> Result<()> {
        if rejected {
            return Err(EtlError::Persistence(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ForecastStore for MemoryStore {
    async fn insert_raw_extract(&self, raw: &RawExtract) -> Result<()> {
        self.check_available(self.reject_raw)?;
        lock(&self.raw).push(raw.clone());
        Ok(())
    }

    async fn append_curated(&self, rows: &[CuratedRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        self.check_available(self.reject_curated)?;
        lock(&self.curated).extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn raw_extract_at(&self, run_ts_utc: DateTime<Utc>) -> Result<Option<RawExtract>> {
        Ok(lock(&self.raw).iter().find(|r| r.run_ts_utc == run_ts_utc).cloned())
    }

    fn curated_table(&self) -> String {
        format!("memory.{CURATED_TABLE}")
    }
}
