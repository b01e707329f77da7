use futures_util::StreamExt;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// How far the download may run ahead of the decoder before it waits.
const READ_AHEAD_LIMIT: usize = 8 * 1024 * 1024;

struct Buffer {
    data: Vec<u8>,
    cursor: usize,
    complete: bool,
    error: Option<String>,
}

struct Shared {
    buffer: Mutex<Buffer>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Buffer>) -> MutexGuard<'a, Buffer> {
        self.changed.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read side of a download in progress. Blocks until the bytes it needs
/// have arrived; everything received is kept so the decoder can seek back.
pub struct RemoteSource {
    shared: Arc<Shared>,
}

/// Write side, fed by the download task.
pub struct RemoteWriter {
    shared: Arc<Shared>,
}

pub fn channel() -> (RemoteSource, RemoteWriter) {
    let shared = Arc::new(Shared {
        buffer: Mutex::new(Buffer {
            data: Vec::with_capacity(1024 * 1024),
            cursor: 0,
            complete: false,
            error: None,
        }),
        changed: Condvar::new(),
    });
    (
        RemoteSource {
            shared: Arc::clone(&shared),
        },
        RemoteWriter { shared },
    )
}

impl Read for RemoteSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.shared.lock();
        while state.cursor >= state.data.len() && !state.complete {
            state = self.shared.wait(state);
        }

        if let Some(err) = &state.error {
            return Err(io::Error::new(io::ErrorKind::Other, err.clone()));
        }

        let available = state.data.len().saturating_sub(state.cursor);
        let n = buf.len().min(available);
        let start = state.cursor;
        buf[..n].copy_from_slice(&state.data[start..start + n]);
        state.cursor += n;
        self.shared.changed.notify_all();
        Ok(n)
    }
}

impl Seek for RemoteSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let mut state = self.shared.lock();
        let target = match pos {
            SeekFrom::Start(offset) => i64::try_from(offset).unwrap_or(i64::MAX),
            SeekFrom::Current(offset) => state.cursor as i64 + offset,
            SeekFrom::End(offset) => state.data.len() as i64 + offset,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of stream",
            ));
        }
        state.cursor = target as usize;
        self.shared.changed.notify_all();
        Ok(state.cursor as u64)
    }
}

impl symphonia::core::io::MediaSource for RemoteSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        let state = self.shared.lock();
        if state.complete && state.error.is_none() {
            Some(state.data.len() as u64)
        } else {
            None
        }
    }
}

impl RemoteWriter {
    /// Append a chunk, waiting while the reader is far behind. Returns
    /// false once the stream has been closed from either end.
    pub fn push(&self, chunk: &[u8]) -> bool {
        let mut state = self.shared.lock();
        while state.data.len().saturating_sub(state.cursor) >= READ_AHEAD_LIMIT && !state.complete {
            state = self.shared.wait(state);
        }
        if state.complete {
            return false;
        }
        state.data.extend_from_slice(chunk);
        self.shared.changed.notify_all();
        true
    }

    pub fn finish(&self) {
        close(&self.shared);
    }

    pub fn fail(&self, error: String) {
        let mut state = self.shared.lock();
        state.error = Some(error);
        state.complete = true;
        self.shared.changed.notify_all();
    }
}

fn close(shared: &Shared) {
    shared.lock().complete = true;
    shared.changed.notify_all();
}

// Either end going away ends the stream, so neither side waits forever.
impl Drop for RemoteSource {
    fn drop(&mut self) {
        close(&self.shared);
    }
}

impl Drop for RemoteWriter {
    fn drop(&mut self) {
        close(&self.shared);
    }
}

/// Start downloading `url` on the current tokio runtime into a new source.
pub fn open_url(
    runtime: &tokio::runtime::Handle,
    http: reqwest::Client,
    url: String,
) -> (RemoteSource, tokio::task::JoinHandle<()>) {
    let (source, writer) = channel();
    let handle = runtime.spawn(download(http, url, writer));
    (source, handle)
}

async fn download(http: reqwest::Client, url: String, writer: RemoteWriter) {
    log::info!("Streaming {}", url);
    let response = match http.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            log::error!("Failed to start audio download: {}", e);
            writer.fail(format!("Failed to start download: {}", e));
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        log::error!("Audio download failed: HTTP {}", status);
        writer.fail(format!("Download failed: HTTP {}", status));
        return;
    }

    let mut body = response.bytes_stream();
    let mut received = 0usize;
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                received += bytes.len();
                // The writer may block on read-ahead; keep that off the async workers.
                let accepted = tokio::task::block_in_place(|| writer.push(&bytes));
                if !accepted {
                    log::debug!("Download abandoned after {} bytes", received);
                    return;
                }
            }
            Err(e) => {
                log::error!("Audio download broke off after {} bytes: {}", received, e);
                writer.fail(format!("Download error: {}", e));
                return;
            }
        }
    }
    log::debug!("Audio download complete: {} bytes", received);
    writer.finish();
}
