use crate::REPLAY_PROTECTION_BUFFER_SIZE;

const EMPTY_SEQUENCE: u64 = u64::MAX;

/// Sliding window over recently accepted sequence numbers. Sequences older
/// than the trailing 256-wide band, and sequences already present in their
/// slot, are reported as received.
///
/// One window per receive key; the owning connection serializes access.
#[derive(Debug, Clone)]
pub struct ReplayProtection {
    most_recent_sequence: u64,
    received_sequence: [u64; REPLAY_PROTECTION_BUFFER_SIZE],
}

impl ReplayProtection {
    pub fn new() -> Self {
        Self {
            most_recent_sequence: 0,
            received_sequence: [EMPTY_SEQUENCE; REPLAY_PROTECTION_BUFFER_SIZE],
        }
    }

    pub fn reset(&mut self) {
        self.most_recent_sequence = 0;
        self.received_sequence = [EMPTY_SEQUENCE; REPLAY_PROTECTION_BUFFER_SIZE];
    }

    pub fn already_received(&self, sequence: u64) -> bool {
        if sequence + self.received_sequence.len() as u64 <= self.most_recent_sequence {
            return true;
        }

        let index = sequence as usize % self.received_sequence.len();
        self.received_sequence[index] == sequence
    }

    pub fn advance_sequence(&mut self, sequence: u64) {
        if sequence > self.most_recent_sequence {
            self.most_recent_sequence = sequence;
        }

        let index = sequence as usize % self.received_sequence.len();
        self.received_sequence[index] = sequence;
    }
}

impl Default for ReplayProtection {
    fn default() -> Self {
        Self::new()
    }
}
