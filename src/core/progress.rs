use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct TransferProgress {
    pub percentage: f64,
    pub downloaded_objects: u64,
    pub total_objects: u64,
    pub runtime: Duration,
    pub eta: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteCounters {
    pub downloaded: u64,
    pub written: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub usage: u64,
    pub active_tasks: u32,
}

/// Bytes per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSpeed {
    pub raw: u64,
    pub decompressed: u64,
}

/// Bytes per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSpeed {
    pub write: u64,
    pub read: u64,
}

/// One sub-record reported by the installer.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    Transfer(TransferProgress),
    Bytes(ByteCounters),
    Cache(CacheStats),
    Speed(DownloadSpeed),
    Disk(DiskSpeed),
}

/// Latest metrics for the active job. `None` means "not reported yet".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub transfer: Option<TransferProgress>,
    pub bytes: Option<ByteCounters>,
    pub cache: Option<CacheStats>,
    pub speed: Option<DownloadSpeed>,
    pub disk: Option<DiskSpeed>,
}

impl ProgressSnapshot {
    /// Replaces the matching sub-record; the others are left alone.
    pub fn apply(&mut self, update: ProgressUpdate) {
        match update {
            ProgressUpdate::Transfer(t) => self.transfer = Some(t),
            ProgressUpdate::Bytes(b) => self.bytes = Some(b),
            ProgressUpdate::Cache(c) => self.cache = Some(c),
            ProgressUpdate::Speed(s) => self.speed = Some(s),
            ProgressUpdate::Disk(d) => self.disk = Some(d),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transfer.is_none()
            && self.bytes.is_none()
            && self.cache.is_none()
            && self.speed.is_none()
            && self.disk.is_none()
    }

    pub fn percentage(&self) -> Option<f64> {
        self.transfer.as_ref().map(|t| t.percentage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_replaces_only_one_sub_record() {
        let mut s = ProgressSnapshot::default();
        assert!(s.is_empty());

        s.apply(ProgressUpdate::Bytes(ByteCounters { downloaded: 10, written: 5 }));
        s.apply(ProgressUpdate::Cache(CacheStats { usage: 100, active_tasks: 2 }));
        s.apply(ProgressUpdate::Bytes(ByteCounters { downloaded: 20, written: 15 }));

        assert_eq!(s.bytes, Some(ByteCounters { downloaded: 20, written: 15 }));
        assert_eq!(s.cache, Some(CacheStats { usage: 100, active_tasks: 2 }));
        assert!(s.transfer.is_none());
        assert!(s.percentage().is_none());
    }
}
