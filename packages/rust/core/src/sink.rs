//! Destinations for finished case records.

use std::future::Future;

use ttabkit_export::CsvExporter;
use ttabkit_shared::{CaseRecord, Result};
use ttabkit_storage::Storage;

/// Consumes finished records. `finish` runs once after the last record,
/// including when the run stops at its record cap.
pub trait CaseSink {
    fn accept(&mut self, record: &CaseRecord) -> impl Future<Output = Result<()>>;
    fn finish(self) -> impl Future<Output = Result<()>>;
}

impl CaseSink for CsvExporter {
    async fn accept(&mut self, record: &CaseRecord) -> Result<()> {
        self.write(record)
    }

    async fn finish(self) -> Result<()> {
        CsvExporter::finish(self).map(|_| ())
    }
}

/// Upserts by case number; nothing to flush.
impl CaseSink for &Storage {
    async fn accept(&mut self, record: &CaseRecord) -> Result<()> {
        self.upsert_case(record).await
    }

    async fn finish(self) -> Result<()> {
        Ok(())
    }
}

/// Collects records in memory.
impl CaseSink for &mut Vec<CaseRecord> {
    async fn accept(&mut self, record: &CaseRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }

    async fn finish(self) -> Result<()> {
        Ok(())
    }
}

/// Sends every record to both sinks, first then second.
pub struct Tee<A, B>(pub A, pub B);

impl<A: CaseSink, B: CaseSink> CaseSink for Tee<A, B> {
    async fn accept(&mut self, record: &CaseRecord) -> Result<()> {
        self.0.accept(record).await?;
        self.1.accept(record).await
    }

    async fn finish(self) -> Result<()> {
        self.0.finish().await?;
        self.1.finish().await
    }
}

/// Optional sink; `None` drops records.
impl<S: CaseSink> CaseSink for Option<S> {
    async fn accept(&mut self, record: &CaseRecord) -> Result<()> {
        match self {
            Some(sink) => sink.accept(record).await,
            None => Ok(()),
        }
    }

    async fn finish(self) -> Result<()> {
        match self {
            Some(sink) => sink.finish().await,
            None => Ok(()),
        }
    }
}
