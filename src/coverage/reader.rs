//! Per-format reader with a cancellation registry.
//!
//! Every request for a coverage registers a ticket before waiting for any
//! lock. [`FormatReader::abort`] withdraws the tickets of an entry from any
//! thread: a read that has not started yet then returns `None` without
//! touching the decoder, and a read in progress is asked to stop.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::decoder::{AbortFlag, RasterDecoder, ReadRequest};
use super::entry::EntryId;
use super::grid::Raster;
use crate::catalog::FormatEntry;
use crate::error::{CovercatError, Result};

pub type Ticket = u64;

struct PendingRead {
    entry: EntryId,
    /// Set while the read is in progress
    abort: Option<AbortFlag>,
}

pub struct FormatReader {
    format: Arc<FormatEntry>,
    decoder: Arc<dyn RasterDecoder>,
    /// Serializes use of a decoder that is not reentrant
    state: Mutex<()>,
    pending: Mutex<HashMap<Ticket, PendingRead>>,
    next_ticket: AtomicU64,
}

impl FormatReader {
    pub fn new(format: Arc<FormatEntry>, decoder: Arc<dyn RasterDecoder>) -> Self {
        Self {
            format,
            decoder,
            state: Mutex::new(()),
            pending: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
        }
    }

    pub fn format(&self) -> &Arc<FormatEntry> {
        &self.format
    }

    pub fn decoder(&self) -> &Arc<dyn RasterDecoder> {
        &self.decoder
    }

    /// Register a wish to read on behalf of `entry`. The ticket is withdrawn
    /// when the returned guard drops.
    pub fn enqueue(&self, entry: EntryId) -> PendingTicket<'_> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.pending
            .lock()
            .insert(ticket, PendingRead { entry, abort: None });
        PendingTicket {
            reader: self,
            ticket,
        }
    }

    /// Withdraw every ticket of `entry`, stopping reads in progress.
    /// Returns the number of withdrawn tickets.
    pub fn abort(&self, entry: EntryId) -> usize {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|_, read| {
            if read.entry != entry {
                return true;
            }
            if let Some(flag) = &read.abort {
                flag.abort();
            }
            false
        });
        before - pending.len()
    }

    /// Number of registered tickets.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Decode `path` if `ticket` is still wanted.
    ///
    /// `Ok(None)` means the read was withdrawn, before or during decoding.
    /// A failure of a withdrawn read is not reported.
    pub fn read(
        &self,
        ticket: Ticket,
        path: &Path,
        request: &ReadRequest,
    ) -> Result<Option<Raster>> {
        let _state = (!self.decoder.is_reentrant()).then(|| self.state.lock());
        let flag = AbortFlag::new();
        match self.pending.lock().get_mut(&ticket) {
            Some(read) => read.abort = Some(flag.clone()),
            None => {
                debug!(file = %path.display(), "Read withdrawn before decoding");
                return Ok(None);
            }
        }

        let outcome = self.decode(path, request, &flag);
        let wanted = self.pending.lock().remove(&ticket).is_some();
        if !wanted || flag.is_aborted() {
            debug!(file = %path.display(), "Read aborted while decoding");
            return Ok(None);
        }
        outcome
    }

    fn decode(
        &self,
        path: &Path,
        request: &ReadRequest,
        flag: &AbortFlag,
    ) -> Result<Option<Raster>> {
        if let Some(found) = self.decoder.source_size(path)? {
            let expected = (request.expected_width, request.expected_height);
            if found != expected {
                return Err(CovercatError::SizeMismatch {
                    file: path.display().to_string(),
                    expected,
                    found,
                });
            }
        }
        self.decoder.decode(path, request, flag)
    }
}

/// A registered ticket, withdrawn on drop.
pub struct PendingTicket<'a> {
    reader: &'a FormatReader,
    ticket: Ticket,
}

impl PendingTicket<'_> {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }
}

impl Drop for PendingTicket<'_> {
    fn drop(&mut self) {
        self.reader.pending.lock().remove(&self.ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PixelRect;
    use ndarray::Array3;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct StubDecoder {
        calls: AtomicUsize,
        size: Option<(u32, u32)>,
    }

    impl RasterDecoder for StubDecoder {
        fn name(&self) -> &str {
            "stub"
        }

        fn source_size(&self, _path: &Path) -> Result<Option<(u32, u32)>> {
            Ok(self.size)
        }

        fn decode(
            &self,
            _path: &Path,
            _request: &ReadRequest,
            abort: &AbortFlag,
        ) -> Result<Option<Raster>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if abort.is_aborted() {
                return Ok(None);
            }
            Ok(Some(Raster::new(Array3::zeros((1, 2, 2)))))
        }
    }

    fn format() -> Arc<FormatEntry> {
        Arc::new(FormatEntry {
            name: "stub".to_string(),
            mime: "image/x-stub".to_string(),
            extension: String::new(),
            geophysics: true,
            sample_dimensions: vec![],
        })
    }

    fn request() -> ReadRequest {
        ReadRequest {
            image_index: 0,
            region: PixelRect::new(0, 0, 2, 2),
            x_subsampling: 1,
            y_subsampling: 1,
            x_offset: 0,
            y_offset: 0,
            expected_width: 2,
            expected_height: 2,
        }
    }

    #[test]
    fn test_read_and_ticket_lifecycle() {
        let decoder = Arc::new(StubDecoder::default());
        let reader = FormatReader::new(format(), decoder.clone());
        let path = PathBuf::from("stub");
        {
            let ticket = reader.enqueue(7);
            assert_eq!(reader.pending(), 1);
            assert!(reader.read(ticket.ticket(), &path, &request()).unwrap().is_some());
            assert_eq!(reader.pending(), 0);
        }
        let ticket = reader.enqueue(7);
        assert_eq!(reader.pending(), 1);
        drop(ticket);
        assert_eq!(reader.pending(), 0);
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_abort_before_read_skips_the_decoder() {
        let decoder = Arc::new(StubDecoder::default());
        let reader = FormatReader::new(format(), decoder.clone());
        let ticket = reader.enqueue(3);
        let other = reader.enqueue(4);

        assert_eq!(reader.abort(3), 1);
        let result = reader.read(ticket.ticket(), Path::new("stub"), &request()).unwrap();
        assert!(result.is_none());
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 0);

        // Other entries are unaffected
        assert!(reader.read(other.ticket(), Path::new("stub"), &request()).unwrap().is_some());
    }

    #[test]
    fn test_size_mismatch() {
        let decoder = Arc::new(StubDecoder {
            size: Some((3, 2)),
            ..Default::default()
        });
        let reader = FormatReader::new(format(), decoder.clone());
        let ticket = reader.enqueue(1);
        match reader.read(ticket.ticket(), Path::new("stub"), &request()) {
            Err(CovercatError::SizeMismatch { expected, found, .. }) => {
                assert_eq!(expected, (2, 2));
                assert_eq!(found, (3, 2));
            }
            other => panic!("Expected SizeMismatch, got {:?}", other.map(|r| r.is_some())),
        }
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 0);
    }

    /// Waits inside `decode` until a second read joins it or time runs out.
    struct RendezvousDecoder {
        reentrant: bool,
        inside: AtomicUsize,
        peak: AtomicUsize,
    }

    impl RendezvousDecoder {
        fn new(reentrant: bool) -> Self {
            Self {
                reentrant,
                inside: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    impl RasterDecoder for RendezvousDecoder {
        fn name(&self) -> &str {
            "rendezvous"
        }

        fn is_reentrant(&self) -> bool {
            self.reentrant
        }

        fn source_size(&self, _path: &Path) -> Result<Option<(u32, u32)>> {
            Ok(None)
        }

        fn decode(
            &self,
            _path: &Path,
            _request: &ReadRequest,
            _abort: &AbortFlag,
        ) -> Result<Option<Raster>> {
            let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let deadline = Instant::now() + Duration::from_millis(300);
            while self.inside.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(1));
            }
            self.peak.fetch_max(self.inside.load(Ordering::SeqCst), Ordering::SeqCst);
            self.inside.fetch_sub(1, Ordering::SeqCst);
            Ok(Some(Raster::new(Array3::zeros((1, 2, 2)))))
        }
    }

    fn read_two_files_at_once(decoder: Arc<RendezvousDecoder>) -> usize {
        let reader = FormatReader::new(format(), decoder.clone());
        std::thread::scope(|scope| {
            for (entry, file) in [(1, "/volA/a"), (2, "/volB/b")] {
                let reader = &reader;
                scope.spawn(move || {
                    let ticket = reader.enqueue(entry);
                    let raster = reader.read(ticket.ticket(), Path::new(file), &request());
                    assert!(raster.unwrap().is_some());
                });
            }
        });
        decoder.peak.load(Ordering::SeqCst)
    }

    #[test]
    fn test_reentrant_decoder_reads_files_concurrently() {
        assert_eq!(read_two_files_at_once(Arc::new(RendezvousDecoder::new(true))), 2);
    }

    #[test]
    fn test_stateful_decoder_reads_one_file_at_a_time() {
        assert_eq!(read_two_files_at_once(Arc::new(RendezvousDecoder::new(false))), 1);
    }
}
