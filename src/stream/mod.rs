//! Frame fan-out and multipart wire framing.
//!
//! One publisher loop owns the camera and pushes each encoded frame to a
//! `FrameHub`; every HTTP viewer holds a `Subscription` and drains it onto
//! its own socket. Publishing is non-blocking per subscriber: a slow viewer
//! loses frames, it never stalls capture or other viewers.

mod publisher;

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub use publisher::{Publisher, PublisherConfig};

/// Multipart boundary token used on the wire.
pub const BOUNDARY: &str = "frame";

/// Frames buffered per subscriber before the hub starts dropping for it.
const SUBSCRIBER_QUEUE_DEPTH: usize = 4;

/// One JPEG-encoded frame, immutable once produced. `seq` positions it in
/// the master capture sequence; viewers observe gap-tolerant subsequences.
#[derive(Debug)]
pub struct EncodedFrame {
    pub seq: u64,
    pub jpeg: Vec<u8>,
}

/// Write one multipart part for `jpeg`. The framing is the MJPEG-over-HTTP
/// convention and must stay bit-exact for browser compatibility:
///
/// ```text
/// --frame\r\n
/// Content-Type: image/jpeg\r\n\r\n
/// <jpeg bytes>\r\n
/// ```
pub fn write_chunk(writer: &mut impl Write, jpeg: &[u8]) -> io::Result<()> {
    writer.write_all(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n")?;
    writer.write_all(jpeg)?;
    writer.write_all(b"\r\n")
}

struct SubscriberSlot {
    id: u64,
    tx: SyncSender<Arc<EncodedFrame>>,
}

struct HubShared {
    subscribers: Mutex<Vec<SubscriberSlot>>,
    next_id: AtomicU64,
}

impl HubShared {
    /// The registry mutex is never held across a panic-prone operation;
    /// recover the data if it was poisoned anyway.
    fn registry(&self) -> std::sync::MutexGuard<'_, Vec<SubscriberSlot>> {
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Fan-out point between the publisher loop and viewer connections.
#[derive(Clone)]
pub struct FrameHub {
    shared: Arc<HubShared>,
}

impl FrameHub {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(HubShared {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Attach a viewer. The subscription detaches itself on drop.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::sync_channel(SUBSCRIBER_QUEUE_DEPTH);
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared.registry().push(SubscriberSlot { id, tx });
        Subscription {
            id,
            rx,
            shared: self.shared.clone(),
        }
    }

    /// Offer a frame to every subscriber without blocking. A subscriber
    /// with a full queue keeps its place but misses this frame; one whose
    /// receiver is gone is pruned. Returns how many queues accepted it.
    pub fn publish(&self, frame: Arc<EncodedFrame>) -> usize {
        let mut delivered = 0;
        let mut subscribers = self.shared.registry();
        subscribers.retain(|slot| match slot.tx.try_send(frame.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
        delivered
    }

    pub fn viewer_count(&self) -> usize {
        self.shared.registry().len()
    }

    /// End every current subscription; each attached viewer observes
    /// end-of-stream. New subscriptions are unaffected.
    pub fn close_all(&self) {
        self.shared.registry().clear();
    }
}

impl Default for FrameHub {
    fn default() -> Self {
        Self::new()
    }
}

/// A viewer's attachment to the hub. Frames arrive in capture order;
/// `None` means the stream ended (publisher drained or shut down).
pub struct Subscription {
    id: u64,
    rx: Receiver<Arc<EncodedFrame>>,
    shared: Arc<HubShared>,
}

impl Subscription {
    /// Block for the next frame. `None` ends the stream.
    pub fn recv(&self) -> Option<Arc<EncodedFrame>> {
        self.rx.recv().ok()
    }

    /// Bounded wait for the next frame. `Ok(None)` ends the stream,
    /// `Err(())` is a timeout with the stream still open.
    pub fn recv_timeout(&self, wait: Duration) -> Result<Option<Arc<EncodedFrame>>, ()> {
        match self.rx.recv_timeout(wait) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
            Err(RecvTimeoutError::Timeout) => Err(()),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shared.registry().retain(|slot| slot.id != self.id);
    }
}
