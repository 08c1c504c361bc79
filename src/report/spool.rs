//! Transient on-disk copies of rendered reports.
//!
//! A spooled report lives in a uniquely named, timestamp-qualified file that
//! is removed when the [`SpooledReport`] guard drops, on success and error
//! paths alike.
//!
//! File creation and removal run on tokio's blocking pool.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

use super::ReportArtifact;

/// Directory that receives spooled reports.
#[derive(Debug, Clone)]
pub struct ReportSpool {
    dir: PathBuf,
}

impl ReportSpool {
    /// Spool into `dir`, created on first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Spool into the system temp directory.
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir().join("esg-reports"))
    }

    /// Target directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the artifact to a fresh file named `esg_report_YYYYmmdd_HHMMSS_*.ext`.
    pub async fn write(
        &self,
        artifact: &ReportArtifact,
        generated_at: DateTime<Utc>,
    ) -> io::Result<SpooledReport> {
        let dir = self.dir.clone();
        let prefix = format!("esg_report_{}_", generated_at.format("%Y%m%d_%H%M%S"));
        let suffix = format!(".{}", artifact.format.extension());
        let bytes = artifact.bytes.clone();

        let file = tokio::task::spawn_blocking(move || -> io::Result<NamedTempFile> {
            std::fs::create_dir_all(&dir)?;
            let mut file = tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(&suffix)
                .tempfile_in(&dir)?;
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(io::Error::other)??;

        tracing::debug!(
            path = %file.path().display(),
            bytes = artifact.bytes.len(),
            "Report spooled"
        );
        Ok(SpooledReport { file })
    }
}

/// A spooled report file, deleted on drop.
#[derive(Debug)]
pub struct SpooledReport {
    file: NamedTempFile,
}

impl SpooledReport {
    /// Location of the file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read the file back for streaming.
    pub async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.file.path()).await
    }

    /// Delete the file off the async worker.
    pub async fn close(self) -> io::Result<()> {
        let file = self.file;
        tokio::task::spawn_blocking(move || file.close())
            .await
            .map_err(io::Error::other)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportFormat;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_spooled_file_is_named_and_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let spool = ReportSpool::new(dir.path());
        let artifact = ReportArtifact {
            bytes: b"%PDF-1.3 test".to_vec(),
            format: ReportFormat::Pdf,
            download_name: "ESG_Report_2024-05-07.pdf".to_string(),
        };
        let at = Utc.with_ymd_and_hms(2024, 5, 7, 8, 9, 10).unwrap();

        let spooled = spool.write(&artifact, at).await.unwrap();
        let path = spooled.path().to_path_buf();
        let name = path.file_name().unwrap().to_string_lossy().to_string();

        assert!(name.starts_with("esg_report_20240507_080910_"));
        assert!(name.ends_with(".pdf"));
        assert_eq!(spooled.read().await.unwrap(), artifact.bytes);

        drop(spooled);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_two_spools_in_same_second_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let spool = ReportSpool::new(dir.path());
        let artifact = ReportArtifact {
            bytes: vec![1, 2, 3],
            format: ReportFormat::Xlsx,
            download_name: "ESG_Report_2024-05-07.xlsx".to_string(),
        };
        let at = Utc.with_ymd_and_hms(2024, 5, 7, 8, 9, 10).unwrap();

        let a = spool.write(&artifact, at).await.unwrap();
        let b = spool.write(&artifact, at).await.unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn test_close_removes_file_and_missing_dir_is_created() {
        let root = tempfile::tempdir().unwrap();
        let spool = ReportSpool::new(root.path().join("nested").join("reports"));
        let artifact = ReportArtifact {
            bytes: b"PK".to_vec(),
            format: ReportFormat::Xlsx,
            download_name: "ESG_Report_2024-05-07.xlsx".to_string(),
        };
        let at = Utc.with_ymd_and_hms(2024, 5, 7, 8, 9, 10).unwrap();

        let spooled = spool.write(&artifact, at).await.unwrap();
        let path = spooled.path().to_path_buf();
        assert!(path.starts_with(spool.dir()));

        spooled.close().await.unwrap();
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(spool.dir()).unwrap().count(), 0);
    }
}
