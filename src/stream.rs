//! Writing an entity body to an output sink without materializing it.

use crate::body::BodyKind;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::multipart;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Writes the body of `entity` to `sink`.
///
/// - A byte source is copied, then closed and detached.
/// - A live stream is pulled chunk by chunk, each chunk written as soon as it
///   arrives. At end of stream the sink is shut down. The stream is detached
///   on every path, including a producer error, which is returned as an I/O
///   error after a best-effort shutdown of the sink.
/// - A materialized value is written and kept.
/// - A part list is encoded with the declared boundary, or a generated one
///   that is then added to the media type.
pub async fn write_body<W>(entity: &mut Entity, sink: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    match entity.body_kind() {
        BodyKind::Empty => Ok(()),
        BodyKind::DataSource => {
            if let Some(data) = entity.data_source() {
                let bytes = data.to_bytes()?;
                sink.write_all(&bytes).await.map_err(write_error)?;
                sink.flush().await.map_err(write_error)?;
            }
            Ok(())
        }
        BodyKind::PartList => {
            let boundary = entity.ensure_boundary()?;
            multipart::serialize(entity, &boundary, sink).await?;
            sink.flush().await.map_err(write_error)?;
            Ok(())
        }
        BodyKind::ByteSource => {
            if let Some(mut source) = entity.take_byte_source() {
                let copied = tokio::io::copy(&mut source, sink).await;
                let closed = source.close();
                copied.map_err(write_error)?;
                closed?;
                sink.flush().await.map_err(write_error)?;
            }
            Ok(())
        }
        BodyKind::LiveStream => drain_live_stream(entity, sink).await,
    }
}

async fn drain_live_stream<W>(entity: &mut Entity, sink: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let Some(mut stream) = entity.take_live_stream() else {
        return Ok(());
    };

    let mut written = 0u64;
    loop {
        match stream.next().await {
            Some(Ok(chunk)) => {
                sink.write_all(&chunk).await.map_err(write_error)?;
                written += chunk.len() as u64;
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, written, "live stream producer failed");
                if let Err(shutdown_err) = sink.shutdown().await {
                    tracing::warn!(error = %shutdown_err, "failed to close sink after stream error");
                }
                return Err(Error::Io(io::Error::new(
                    e.kind(),
                    format!("Error occurred while streaming content: {e}"),
                )));
            }
            None => {
                tracing::trace!(written, "live stream finished");
                sink.shutdown().await.map_err(write_error)?;
                return Ok(());
            }
        }
    }
}

fn write_error(e: io::Error) -> Error {
    tracing::error!(error = %e, "failed to write body to sink");
    Error::Io(io::Error::new(
        e.kind(),
        format!("Error occurred while writing the stream content: {e}"),
    ))
}
