//! Transparent read-through progress reporting.
//!
//! Wraps an [`AsyncRead`], emitting a progress callback no more often than
//! once per `tick` (default five seconds) with a running byte count, percent
//! complete, and an ETA. The ETA is left unset once the size is unknown, or
//! once the *projected* total runtime would exceed a week — at that point
//! an estimate is more noise than signal.

use std::time::Duration;

use pin_project_lite::pin_project;
use tokio::io::AsyncRead;
use tokio::time::Instant;

const DEFAULT_TICK: Duration = Duration::from_secs(5);
const WEEK: Duration = Duration::from_secs(168 * 60 * 60);

/// A progress snapshot, emitted at most once per tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// `"12.3MiB/45.6MiB"`, or just `"12.3MiB"` when the total size is unknown.
    pub progress: String,
    /// `"27%"`, empty when the total size is unknown.
    pub percent: String,
    /// Remaining time, empty when not (yet, or ever) estimable.
    pub estimate: String,
}

pub type ProgressFn = Box<dyn FnMut(ProgressEvent) + Send>;

/// Builds a [`ProgressFn`] that logs each event via `tracing::info!` under
/// `name`, mirroring the plain structured-logging sink the original wires up
/// by default.
pub fn tracing_progress(name: String) -> ProgressFn {
    Box::new(move |event: ProgressEvent| {
        tracing::info!(
            name = %name,
            progress = %event.progress,
            percent = %event.percent,
            estimate = %event.estimate,
        );
    })
}

pin_project! {
    pub struct ProgressReader<R> {
        #[pin]
        inner: R,
        size: u64,
        count: u64,
        tick: Duration,
        started: Instant,
        last: Instant,
        estimated: Option<Instant>,
        progress: ProgressFn,
    }
}

impl<R> ProgressReader<R> {
    /// `size` is the expected total in bytes; pass `0` when unknown.
    pub fn new(inner: R, size: u64, progress: ProgressFn) -> Self {
        let now = Instant::now();
        Self {
            inner,
            size,
            count: 0,
            tick: DEFAULT_TICK,
            started: now,
            // Set behind `now` by a full tick so the very first read always
            // emits, matching the original's zero-valued `last` timestamp.
            last: now.checked_sub(DEFAULT_TICK).unwrap_or(now),
            estimated: None,
            progress,
        }
    }

    fn percent(&self) -> Option<u8> {
        if self.size == 0 {
            return None;
        }
        if self.count >= self.size {
            return Some(100);
        }
        Some(((self.count as f64 / self.size as f64) * 100.0) as u8)
    }
}

impl<R: AsyncRead> AsyncRead for ProgressReader<R> {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        let filled_before = buf.filled().len();
        let this = self.project();
        let ret = this.inner.poll_read(cx, buf);

        let fresh = buf.filled().len() - filled_before;
        *this.count += fresh as u64;

        let now = Instant::now();
        if now.duration_since(*this.last) < *this.tick {
            return ret;
        }
        *this.last = now;

        if *this.size == 0 {
            (this.progress)(ProgressEvent {
                progress: format_bytes(*this.count),
                percent: String::new(),
                estimate: String::new(),
            });
            return ret;
        }

        let ratio = *this.count as f64 / *this.size as f64;
        let elapsed = now.duration_since(*this.started);
        if *this.count > 0 && ratio > 0.0 {
            let total = Duration::from_secs_f64(elapsed.as_secs_f64() / ratio);
            if total < WEEK {
                *this.estimated = Some(*this.started + total);
            }
        }

        let percent = if *this.size == 0 {
            0
        } else if *this.count >= *this.size {
            100
        } else {
            ((*this.count as f64 / *this.size as f64) * 100.0) as u8
        };

        let estimate = match *this.estimated {
            Some(eta) => {
                let remaining = eta.saturating_duration_since(now);
                format!("{}s", remaining.as_secs_f64().round() as u64)
            }
            None => String::new(),
        };

        (this.progress)(ProgressEvent {
            progress: format!("{}/{}", format_bytes(*this.count), format_bytes(*this.size)),
            percent: format!("{percent}%"),
            estimate,
        });

        ret
    }
}

fn format_bytes(size: u64) -> String {
    humansize::format_size(size, humansize::BINARY).replace(' ', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    #[tokio::test(start_paused = true)]
    async fn emits_at_most_once_per_tick() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        let data = vec![0u8; 1 << 20];
        let mut reader = ProgressReader::new(
            Cursor::new(data.clone()),
            data.len() as u64,
            Box::new(move |event| events_clone.lock().unwrap().push(event)),
        );

        tokio::io::copy(&mut reader, &mut tokio::io::sink())
            .await
            .unwrap();

        // a single synchronous copy with no time advancing between reads
        // should not cross the tick boundary more than once.
        assert!(events.lock().unwrap().len() <= 1);
    }

    #[test]
    fn percent_saturates_at_100() {
        let reader = ProgressReader::new(Cursor::new(Vec::<u8>::new()), 10, Box::new(|_| {}));
        let mut reader = reader;
        reader.count = 15;
        assert_eq!(reader.percent(), Some(100));
    }

    #[test]
    fn percent_is_none_when_size_unknown() {
        let reader = ProgressReader::new(Cursor::new(Vec::<u8>::new()), 0, Box::new(|_| {}));
        assert_eq!(reader.percent(), None);
    }
}
