//! Single-flight guards
//!
//! State is only touched from one logical thread, so a plain flag is enough
//! to stop a second submission (or a second QR decode) from starting while
//! the first is still waiting on the network.

/// Guard for one logical action
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    busy: bool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if the caller may start; `false` while another attempt is in flight
    pub fn try_begin(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    pub fn finish(&mut self) {
        self.busy = false;
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }
}

/// Why a scan lock was released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanRelease {
    Success,
    Cancelled,
    Failed,
    /// App came back from background; the camera may have left the lock held
    Foreground,
}

/// Prevents overlapping vehicle fetches from repeated scan events
#[derive(Debug, Clone, Default)]
pub struct ScanLock {
    flight: SingleFlight,
    last_release: Option<ScanRelease>,
}

impl ScanLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_lock(&mut self) -> bool {
        let acquired = self.flight.try_begin();
        if !acquired {
            tracing::debug!("scan ignored, lookup already in flight");
        }
        acquired
    }

    pub fn release(&mut self, reason: ScanRelease) {
        self.flight.finish();
        self.last_release = Some(reason);
    }

    pub fn is_locked(&self) -> bool {
        self.flight.is_busy()
    }

    pub fn last_release(&self) -> Option<ScanRelease> {
        self.last_release
    }
}
