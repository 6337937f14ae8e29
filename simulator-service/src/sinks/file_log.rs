use std::path::{Path, PathBuf};

use rust_client::domain::Reading;
use tokio::{fs::OpenOptions, io::AsyncWriteExt};

use super::{ReadingSink, SinkError, SinkKind};

/// Appends each reading as one JSON line to a local file.
///
/// The file is opened in append mode per call and each line goes out in a
/// single write, so concurrent meter tasks never interleave partial lines.
pub struct FileLogSink {
    path: PathBuf,
}

impl FileLogSink {
    /// Create the parent directory if needed and check the file is writable.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        OpenOptions::new().create(true).append(true).open(&path).await?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn encode_line(reading: &Reading) -> Result<Vec<u8>, SinkError> {
    let mut line = serde_json::to_vec(reading)?;
    line.push(b'\n');
    Ok(line)
}

#[async_trait::async_trait]
impl ReadingSink for FileLogSink {
    fn kind(&self) -> SinkKind {
        SinkKind::FileLog
    }

    async fn deliver(&self, reading: &Reading) -> Result<(), SinkError> {
        let line = encode_line(reading)?;

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(&line).await?;
        file.flush().await?;

        tracing::debug!(meter_id = %reading.meter_id, path = %self.path.display(), "reading appended to file");
        Ok(())
    }
}
