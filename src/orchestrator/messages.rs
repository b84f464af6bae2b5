//! User-facing progress text for the memorial photo pipeline.

pub const UPLOADING: &str = "Uploading photo...";
pub const GENERATING: &str = "Photo uploaded, generating your memorial photo...";
pub const COMPLETED: &str = "Your memorial photo is ready!";

/// Shown in rotation while the backend is generating.
pub const WAITING_MESSAGES: [&str; 4] = [
    "Hold on, your little one keeps wiggling",
    "Almost there",
    "Finding the best angle",
    "Your keepsake photo is nearly done",
];

/// Cursor over [`WAITING_MESSAGES`]. Each tick moves to the next entry,
/// so the first message shown is the second one in the list.
#[derive(Debug, Default)]
pub struct WaitingMessages {
    index: usize,
}

impl WaitingMessages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self) -> &'static str {
        self.index = (self.index + 1) % WAITING_MESSAGES.len();
        WAITING_MESSAGES[self.index]
    }
}
