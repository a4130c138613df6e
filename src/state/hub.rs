use tokio::sync::broadcast;

/// Serialized push frame fanned out to every socket attached to one room.
pub type PushFrame = String;

/// Broadcast hub fanning room events out to connected push clients.
///
/// One hub exists per live room; it is created alongside the room and dropped
/// when the room is evicted. Subscribers that lag simply skip frames, the next
/// full snapshot resynchronizes them.
#[derive(Debug, Clone)]
pub struct RoomHub {
    sender: broadcast::Sender<PushFrame>,
}

impl RoomHub {
    /// Construct a new hub backed by a Tokio broadcast channel.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent frames.
    pub fn subscribe(&self) -> broadcast::Receiver<PushFrame> {
        self.sender.subscribe()
    }

    /// Send a frame to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, frame: PushFrame) {
        let _ = self.sender.send(frame);
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
