//! Append-only log of transactions an operator has to verify by hand

use crate::error::RelayerResult;

use ethers::types::{Address, Bytes, H256};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Breadcrumb file for submissions whose fate is unknown.
///
/// Each record is one line written with a single append, so concurrent
/// writers never interleave within a line. The file is never read back.
#[derive(Debug, Clone)]
pub struct ManualCheckLog {
    path: PathBuf,
}

impl ManualCheckLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format of one record
    pub fn format_record(tx_hash: H256, to: Address, data: &Bytes) -> String {
        format!("transactionHash:{:?} to:{:?} data:{}\n", tx_hash, to, data)
    }

    /// Append one record, creating the file if needed
    pub async fn append(&self, tx_hash: H256, to: Address, data: &Bytes) -> RelayerResult<()> {
        let record = Self::format_record(tx_hash, to, data);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(record.as_bytes()).await?;
        file.flush().await?;

        debug!("Recorded {:?} in {:?}", tx_hash, self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_format() {
        let record = ManualCheckLog::format_record(
            H256::repeat_byte(0xab),
            Address::repeat_byte(0x22),
            &Bytes::from(vec![0xca, 0xfe]),
        );
        assert_eq!(
            record,
            format!(
                "transactionHash:0x{} to:0x{} data:0xcafe\n",
                "ab".repeat(32),
                "22".repeat(20)
            )
        );
    }

    #[tokio::test]
    async fn test_appends_without_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let log = ManualCheckLog::new(dir.path().join("manuallyCheck.txt"));

        log.append(H256::repeat_byte(1), Address::repeat_byte(2), &Bytes::new())
            .await
            .unwrap();
        log.append(H256::repeat_byte(3), Address::repeat_byte(4), &Bytes::from(vec![5]))
            .await
            .unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(&format!("transactionHash:0x{}", "01".repeat(32))));
        assert!(lines[1].ends_with("data:0x05"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = ManualCheckLog::new(dir.path().join("missing").join("manuallyCheck.txt"));

        let err = log
            .append(H256::zero(), Address::zero(), &Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::RelayerError::Io(_)));
    }
}
