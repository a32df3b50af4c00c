use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one refresh cycle's request. Ids increase monotonically per
/// tracker, starting at 1.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

/// Issues request ids and remembers the latest one.
///
/// Issuing a new id supersedes every earlier ticket.
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    latest: Arc<AtomicU64>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> RequestTicket {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        RequestTicket {
            id: RequestId(id),
            latest: Arc::clone(&self.latest),
        }
    }

    /// Supersedes every outstanding ticket without starting a new request.
    pub fn cancel_all(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    pub fn latest(&self) -> RequestId {
        RequestId(self.latest.load(Ordering::SeqCst))
    }
}

/// Handle carried by an in-flight request.
#[derive(Debug, Clone)]
pub struct RequestTicket {
    id: RequestId,
    latest: Arc<AtomicU64>,
}

impl RequestTicket {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// `false` once a newer request has been issued by the same tracker.
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.id.0
    }
}
