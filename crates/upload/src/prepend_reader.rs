//! Prepends a single byte to an `AsyncRead` without buffering the rest of
//! the stream — used to frame part 0 of a split upload with its backend
//! count before any of its content bytes.

use pin_project_lite::pin_project;
use tokio::io::AsyncRead;

pin_project! {
    pub struct PrependByte<R> {
        byte: Option<u8>,
        #[pin]
        inner: R,
    }
}

impl<R> PrependByte<R> {
    pub fn new(byte: u8, inner: R) -> Self {
        Self {
            byte: Some(byte),
            inner,
        }
    }
}

impl<R: AsyncRead> AsyncRead for PrependByte<R> {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        let this = self.project();
        if let Some(byte) = this.byte.take() {
            buf.put_slice(&[byte]);
            return std::task::Poll::Ready(Ok(()));
        }
        this.inner.poll_read(cx, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn prepends_exactly_one_byte() {
        let mut reader = PrependByte::new(3, Cursor::new(b"abc".to_vec()));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, vec![3, b'a', b'b', b'c']);
    }

    #[tokio::test]
    async fn prepend_on_empty_inner_yields_just_the_byte() {
        let mut reader = PrependByte::new(9, Cursor::new(Vec::<u8>::new()));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, vec![9]);
    }
}
