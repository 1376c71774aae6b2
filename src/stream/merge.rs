//! `Merge`: interleave events from multiple streams in arrival order.

use tokio::sync::mpsc;

use crate::context::Context;

use super::Stream;

/// Interleave events from `sources` as they arrive. One producer task
/// per source feeds a bounded channel sized `sources.len()`. Merge
/// terminates when every source is exhausted, the ambient context
/// cancels, or the first error from any source is observed (after
/// which further pulls return end-of-stream).
pub fn merge<T>(ctx: Context, sources: Vec<Stream<T>>) -> Stream<T>
where
    T: Send + 'static,
{
    let capacity = sources.len().max(1);
    let (tx, rx) = mpsc::channel(capacity);

    for mut source in sources {
        let tx = tx.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            use futures::StreamExt;
            loop {
                tokio::select! {
                    () = ctx.cancelled() => break,
                    next = source.next() => {
                        match next {
                            Some(event) => {
                                let is_error = event.error_ref().is_some();
                                if tx.send(event).await.is_err() {
                                    break;
                                }
                                if is_error {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
        });
    }
    drop(tx);

    let rx_stream = async_stream::stream! {
        let mut rx = rx;
        while let Some(event) = rx.recv().await {
            let is_error = event.error_ref().is_some();
            yield event;
            if is_error {
                break;
            }
        }
    };
    Box::pin(rx_stream)
}
