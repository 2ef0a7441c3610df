//! Database implementation of CacheStore

use anyhow::Result;

use crate::repository::{CacheRecord, Database};

use super::progress::ProgressReporter;
use super::store::{CacheEntry, CacheStore};

impl CacheStore for Database {
    async fn load_entry(&self, commit_id: &str, lineage: &str) -> Result<Option<CacheEntry>> {
        let record = self.load_cache_record(commit_id, lineage).await?;
        Ok(record.map(|r| CacheEntry {
            commit_id: r.commit_id.into_owned(),
            lineage: r.lineage.into_owned(),
            config_hash: r.config_hash.into_owned(),
            checksum: r.checksum.into_owned(),
            state: r.state.into_owned(),
        }))
    }

    async fn save_entries(&self, entries: &[CacheEntry], progress: &dyn ProgressReporter) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let records: Vec<CacheRecord<'_>> = entries
            .iter()
            .map(|e| CacheRecord::new(
                e.commit_id.as_str(),
                e.lineage.as_str(),
                e.config_hash.as_str(),
                e.checksum.as_str(),
                e.state.as_str(),
            ))
            .collect();

        let pb = progress.start("Caching", records.len() as u64);
        self.save_cache_records_with_callback(&records, |n| pb.inc(n as u64))
            .await?;
        pb.finish();
        Ok(())
    }

    async fn entry_count(&self) -> Result<u64> {
        Database::cache_entry_count(self).await
    }

    async fn clear(&self) -> Result<()> {
        Database::clear_cache(self).await
    }
}
