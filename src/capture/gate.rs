/// Default cooldown between captures, in milliseconds.
pub const DEFAULT_CAPTURE_COOLDOWN_MS: u64 = 2000;

/// Cooldown gate shared by every capture path.
///
/// Both the vision-driven state machine and the orientation fallback route
/// their capture attempts through one gate, so a capture from either path
/// suppresses immediate re-fires from both. Single-writer: only the frame or
/// poll loop calls `try_fire`.
pub struct CaptureGate {
    cooldown_ms: u64,
    last_capture_ms: Option<u64>,
}

impl CaptureGate {
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            cooldown_ms,
            last_capture_ms: None,
        }
    }

    /// Attempt a capture at `now_ms`. Returns false while cooling down.
    pub fn try_fire(&mut self, now_ms: u64) -> bool {
        if let Some(last) = self.last_capture_ms {
            if now_ms.saturating_sub(last) < self.cooldown_ms {
                return false;
            }
        }
        self.last_capture_ms = Some(now_ms);
        true
    }

    pub fn reset(&mut self) {
        self.last_capture_ms = None;
    }
}

impl Default for CaptureGate {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTURE_COOLDOWN_MS)
    }
}
