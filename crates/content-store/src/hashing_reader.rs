//! Streaming hash-while-copy: wraps an [`AsyncRead`] and accumulates a digest
//! over every byte read through it, so a single pass over the body both
//! writes it to disk and computes its content address.

use pin_project_lite::pin_project;
use tokio::io::AsyncRead;

pin_project! {
    pub struct HashingReader<R, H>
    where
        R: AsyncRead,
        H: digest::Digest,
    {
        #[pin]
        inner: R,
        hasher: H,
        count: u64,
    }
}

impl<R, H> HashingReader<R, H>
where
    R: AsyncRead,
    H: digest::Digest,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: H::new(),
            count: 0,
        }
    }

    /// Bytes read through so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Consumes the reader and finalizes the digest over everything read.
    pub fn finalize(self) -> digest::Output<H> {
        self.hasher.finalize()
    }
}

impl<R, H> AsyncRead for HashingReader<R, H>
where
    R: AsyncRead,
    H: digest::Digest,
{
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        let filled_before = buf.filled().len();

        let this = self.project();
        let ret = this.inner.poll_read(cx, buf);

        let fresh = &buf.filled()[filled_before..];
        this.hasher.update(fresh);
        *this.count += fresh.len() as u64;

        ret
    }
}
