use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::error::ContentError;

/// A consumer-paced stream of content chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, ContentError>>;

/// Wrap an in-memory buffer as a single-chunk [`ByteStream`].
pub fn once(data: Bytes) -> ByteStream {
    futures::stream::once(async move { Ok(data) }).boxed()
}

/// Drain a stream into one contiguous buffer.
///
/// Fails with [`ContentError::TooLarge`] as soon as more than `limit` bytes
/// have been read, so an unexpectedly huge object is never fully buffered.
pub async fn collect_bytes(mut stream: ByteStream, limit: u64) -> Result<Bytes, ContentError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if (buf.len() + chunk.len()) as u64 > limit {
            return Err(ContentError::TooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
