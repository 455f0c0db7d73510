use crate::AsyncWrite;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Attempt to write and flush the contents of `to_write` to `io`.
///
/// Returns `Ok(true)` when the buffer is drained and flushed, `Ok(false)`
/// when the transport backpressures. In the latter case the waker is
/// registered by the underlying `poll_write`/`poll_flush` and the caller can
/// simply return `Pending`.
pub(crate) fn try_write<S>(
    cx: &mut Context<'_>,
    io: &mut S,
    to_write: &mut Vec<u8>,
    flush_after: &mut bool,
) -> Result<bool, io::Error>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    while !to_write.is_empty() {
        match Pin::new(&mut *io).poll_write(cx, &to_write[..]) {
            Poll::Pending => return Ok(false),
            Poll::Ready(Err(e)) => return Err(e),
            Poll::Ready(Ok(amount)) => {
                trace!("try_write sent: {} of {}", amount, to_write.len());

                if amount == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write to transport",
                    ));
                }

                // drop the written bytes, keep the rest
                let remain = to_write.split_off(amount);
                *to_write = remain;
            }
        }
    }

    if *flush_after {
        match Pin::new(&mut *io).poll_flush(cx) {
            Poll::Pending => return Ok(false),
            Poll::Ready(Err(e)) => return Err(e),
            Poll::Ready(Ok(_)) => {
                trace!("try_write flushed");
                *flush_after = false;
            }
        }
    }

    Ok(true)
}
