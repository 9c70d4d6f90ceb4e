//! Stream replay buffer
//!
//! [`ReplayBody`] wraps the client-to-server body of a call. The interceptor
//! reads the first gRPC message through [`ReplayBody::first_message`]; every
//! byte pulled off the wire for that is kept and handed to the handler
//! before anything else, so the handler's first read sees exactly the
//! message the interceptor inspected and wire order is preserved.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use http::HeaderMap;
use http_body::{Body, Frame, SizeHint};
use http_body_util::BodyExt;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;

/// Compressed flag plus big-endian length
pub const GRPC_HEADER_SIZE: usize = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("request stream ended before a complete message")]
    Truncated,

    #[error("compressed request messages cannot be inspected")]
    Compressed,

    #[error("request message of {size} bytes exceeds limit of {limit}")]
    TooLarge { size: usize, limit: usize },

    /// The client-side stream failed (reset, disconnect)
    #[error("request stream error: {0}")]
    Transport(String),
}

pub struct ReplayBody<B> {
    inner: B,
    /// Wire bytes read for inspection and not yet handed on
    buffered: BytesMut,
    trailers: Option<HeaderMap>,
    message: Option<Bytes>,
    inner_done: bool,
    max_message_bytes: usize,
}

impl<B> ReplayBody<B> {
    pub fn new(inner: B, max_message_bytes: usize) -> Self {
        Self {
            inner,
            buffered: BytesMut::new(),
            trailers: None,
            message: None,
            inner_done: false,
            max_message_bytes,
        }
    }

    /// Bytes held for replay
    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }
}

impl<B> ReplayBody<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: std::fmt::Display,
{
    /// Payload of the first gRPC message, without framing
    ///
    /// Reads from the wire at most once; later calls return the cached copy.
    pub async fn first_message(&mut self) -> Result<Bytes, ReplayError> {
        if let Some(message) = &self.message {
            return Ok(message.clone());
        }

        loop {
            if let Some(message) = self.complete_message()? {
                self.message = Some(message.clone());
                return Ok(message);
            }

            if self.inner_done {
                return Err(ReplayError::Truncated);
            }

            match self.inner.frame().await {
                None => self.inner_done = true,
                Some(Err(e)) => return Err(ReplayError::Transport(e.to_string())),
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(data) => self.buffered.put(data),
                    Err(frame) => {
                        if let Ok(trailers) = frame.into_trailers() {
                            self.trailers = Some(trailers);
                        }
                        // Trailers end the request stream
                        self.inner_done = true;
                    }
                },
            }
        }
    }

    fn complete_message(&self) -> Result<Option<Bytes>, ReplayError> {
        if self.buffered.len() < GRPC_HEADER_SIZE {
            return Ok(None);
        }

        let mut header = &self.buffered[..GRPC_HEADER_SIZE];
        let compressed = header.get_u8();
        let size = header.get_u32() as usize;

        if compressed != 0 {
            return Err(ReplayError::Compressed);
        }
        if size > self.max_message_bytes {
            return Err(ReplayError::TooLarge {
                size,
                limit: self.max_message_bytes,
            });
        }

        let end = GRPC_HEADER_SIZE + size;
        if self.buffered.len() < end {
            return Ok(None);
        }

        Ok(Some(Bytes::copy_from_slice(
            &self.buffered[GRPC_HEADER_SIZE..end],
        )))
    }
}

impl<B> Body for ReplayBody<B>
where
    B: Body<Data = Bytes> + Unpin,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if !this.buffered.is_empty() {
            let data = this.buffered.split().freeze();
            return Poll::Ready(Some(Ok(Frame::data(data))));
        }

        if let Some(trailers) = this.trailers.take() {
            return Poll::Ready(Some(Ok(Frame::trailers(trailers))));
        }

        if this.inner_done {
            return Poll::Ready(None);
        }

        Pin::new(&mut this.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.buffered.is_empty()
            && self.trailers.is_none()
            && (self.inner_done || self.inner.is_end_stream())
    }

    fn size_hint(&self) -> SizeHint {
        if self.inner_done {
            return SizeHint::with_exact(self.buffered.len() as u64);
        }

        let inner = self.inner.size_hint();
        let buffered = self.buffered.len() as u64;
        let mut hint = SizeHint::new();
        hint.set_lower(inner.lower() + buffered);
        if let Some(upper) = inner.upper() {
            hint.set_upper(upper + buffered);
        }
        hint
    }
}

/// Frame a message the way gRPC puts it on the wire (uncompressed)
pub fn encode_grpc_frame<M: prost::Message>(message: &M) -> Bytes {
    let len = message.encoded_len();
    let mut buf = BytesMut::with_capacity(GRPC_HEADER_SIZE + len);
    buf.put_u8(0);
    buf.put_u32(len as u32);
    // BytesMut grows on demand, encoding cannot run out of capacity
    let _ = message.encode(&mut buf);
    buf.freeze()
}
