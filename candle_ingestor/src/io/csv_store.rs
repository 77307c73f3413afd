use std::{
    fs::{self, File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use snafu::{OptionExt, ResultExt};
use tracing::{info, warn};

use crate::{
    io::{
        checkpoint::{self, Checkpoint, checkpoint_path},
        sink::{
            CandleStore, CsvSnafu, IoSnafu, JoinSnafu, MissingColumnSnafu, SinkError, StoredResume,
        },
    },
    models::candle::{CSV_HEADER, CandleRecord},
};

const OPEN_TIME_COLUMN: &str = CSV_HEADER[0];

/// Append-only CSV file store with a checkpoint sidecar.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    /// Opens the store at `path`, creating an empty file (and its parent
    /// directories) when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();

        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).context(IoSnafu { path: parent })?;
            }
            File::create(&path).context(IoSnafu { path: &path })?;
            info!("Created new .csv file: {}", path.display());
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `open_time` of the last data row, `None` for a header-only file.
fn last_open_time(path: &Path) -> Result<Option<String>, SinkError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(CsvSnafu { path })?;

    let column = reader
        .headers()
        .context(CsvSnafu { path })?
        .iter()
        .position(|name| name.trim() == OPEN_TIME_COLUMN);

    let mut record = StringRecord::new();
    let mut last = None;
    while reader.read_record(&mut record).context(CsvSnafu { path })? {
        last = Some(record.clone());
    }

    let Some(last) = last else {
        return Ok(None);
    };
    let column = column.context(MissingColumnSnafu {
        path,
        column: OPEN_TIME_COLUMN,
    })?;

    Ok(last.get(column).map(str::to_string))
}

fn resume_state(path: &Path) -> Result<StoredResume, SinkError> {
    let size = fs::metadata(path).context(IoSnafu { path })?.len();
    if size == 0 {
        info!("{} is empty. Starting point remains the same.", path.display());
        return Ok(StoredResume::Empty);
    }

    let Some(open_time) = last_open_time(path)? else {
        info!("{} has no rows yet. Starting point remains the same.", path.display());
        return Ok(StoredResume::Empty);
    };
    info!("{} is not empty. Last existing data: {open_time}", path.display());

    let sidecar = checkpoint_path(path);
    match checkpoint::read(&sidecar) {
        Ok(Some(cp)) if cp.last_open_time == open_time => Ok(StoredResume::Checkpoint(cp)),
        Ok(Some(cp)) => {
            warn!(
                checkpoint = %cp.last_open_time,
                store = %open_time,
                "checkpoint does not match the last stored row, ignoring it"
            );
            Ok(StoredResume::LastRow { open_time })
        }
        Ok(None) => Ok(StoredResume::LastRow { open_time }),
        Err(e) => {
            warn!("ignoring unreadable checkpoint: {e}");
            Ok(StoredResume::LastRow { open_time })
        }
    }
}

/// True when the file's last byte is not a newline, so appended rows would
/// be glued onto the last existing one.
fn needs_newline(file: &mut File, path: &Path) -> Result<bool, SinkError> {
    let len = file.metadata().context(IoSnafu { path })?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1)).context(IoSnafu { path })?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).context(IoSnafu { path })?;
    Ok(last[0] != b'\n')
}

fn write_rows(path: &Path, rows: &[CandleRecord], cp: &Checkpoint) -> Result<usize, SinkError> {
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .context(IoSnafu { path })?;

    let is_empty = file.metadata().context(IoSnafu { path })?.len() == 0;
    if needs_newline(&mut file, path)? {
        file.write_all(b"\n").context(IoSnafu { path })?;
    }

    let mut writer = WriterBuilder::new().has_headers(is_empty).from_writer(file);
    for row in rows {
        writer.serialize(row).context(CsvSnafu { path })?;
    }
    writer.flush().context(IoSnafu { path })?;

    if is_empty {
        info!("File was empty. Wrote everything to it.");
    } else {
        info!("File was not empty. Appended data.");
    }

    if let Err(e) = checkpoint::write(&checkpoint_path(path), cp) {
        warn!("rows appended but checkpoint not saved, next run resumes from the last row: {e}");
    }
    Ok(rows.len())
}

#[async_trait]
impl CandleStore for CsvStore {
    type Output = usize;

    async fn resume_state(&self) -> Result<StoredResume, SinkError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || resume_state(&path))
            .await
            .context(JoinSnafu)?
    }

    async fn append(
        &self,
        rows: &[CandleRecord],
        checkpoint: &Checkpoint,
    ) -> Result<Self::Output, SinkError> {
        let path = self.path.clone();
        let rows = rows.to_vec();
        let checkpoint = checkpoint.clone();
        tokio::task::spawn_blocking(move || write_rows(&path, &rows, &checkpoint))
            .await
            .context(JoinSnafu)?
    }
}
