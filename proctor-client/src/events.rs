//! Change notifications to the embedding application.
//!
//! The dispatcher reports three things: regions of the screen that changed
//! (for compositing), the narrower "repaint this" signal used by observer
//! UIs, and cursor shape changes. Everything is posted after the screen
//! write lock is released and in message order, so a consumer handling
//! events in order always reads a consistent screen for each region.

use proctor_common::Region;

/// Receiver for client-side change notifications.
pub trait EventSink: Send {
    /// The given region of the screen changed and must be recomposited.
    fn post_region_changed(&self, region: &Region);

    /// The given region should be repainted by observer UIs.
    fn signal_region_updated(&self, region: &Region);

    /// The cursor shape changed.
    fn signal_cursor_shape_changed(&self);
}

/// An event sink that discards everything.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn post_region_changed(&self, _region: &Region) {}
    fn signal_region_updated(&self, _region: &Region) {}
    fn signal_cursor_shape_changed(&self) {}
}

/// A materialized event, as delivered by [`ChannelEventSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A region of the screen changed.
    RegionChanged(Region),
    /// A region should be repainted.
    RegionUpdated(Region),
    /// The cursor shape changed.
    CursorShapeChanged,
}

/// An [`EventSink`] that fans events out over a channel.
///
/// Sends are non-blocking; if the receiver is gone the event is dropped,
/// which matches the fire-and-forget nature of repaint notifications.
pub struct ChannelEventSink {
    sender: flume::Sender<ClientEvent>,
}

impl ChannelEventSink {
    /// Create a sink and the receiver for its events.
    pub fn unbounded() -> (Self, flume::Receiver<ClientEvent>) {
        let (sender, receiver) = flume::unbounded();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn post_region_changed(&self, region: &Region) {
        let _ = self.sender.send(ClientEvent::RegionChanged(region.clone()));
    }

    fn signal_region_updated(&self, region: &Region) {
        let _ = self.sender.send(ClientEvent::RegionUpdated(region.clone()));
    }

    fn signal_cursor_shape_changed(&self) {
        let _ = self.sender.send(ClientEvent::CursorShapeChanged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_common::Rect;

    #[test]
    fn test_channel_sink_delivers_in_order() {
        let (sink, receiver) = ChannelEventSink::unbounded();
        let region = Region::from(Rect::new(0, 0, 4, 4));

        sink.post_region_changed(&region);
        sink.signal_region_updated(&region);
        sink.signal_cursor_shape_changed();

        assert_eq!(
            receiver.try_recv().unwrap(),
            ClientEvent::RegionChanged(region.clone())
        );
        assert_eq!(
            receiver.try_recv().unwrap(),
            ClientEvent::RegionUpdated(region)
        );
        assert_eq!(receiver.try_recv().unwrap(), ClientEvent::CursorShapeChanged);
    }

    #[test]
    fn test_send_without_receiver_is_harmless() {
        let (sink, receiver) = ChannelEventSink::unbounded();
        drop(receiver);
        sink.signal_cursor_shape_changed();
    }
}
