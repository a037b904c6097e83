use crate::core::protocol::Event;

/// Receives the events routed to one subscription
///
/// Handlers are invoked on the connection task, once per matching event,
/// in the order the transport delivered the frames. Keep them short; hand
/// heavy work to another task or use [`RealtimeClient::subscribe_channel`]
/// to consume events on your own schedule.
///
/// A panicking handler is caught and logged. Other subscriptions matching
/// the same event are still served.
///
/// Any `Fn(&Event) + Send + Sync` closure is a handler:
///
/// ```ignore
/// let subscription = Subscription::new("pothole", [EntityType::Post], |event: &Event| {
///     println!("{} {:?}", event.entity_id, event.event_type);
/// });
/// ```
///
/// [`RealtimeClient::subscribe_channel`]: crate::core::client::RealtimeClient::subscribe_channel
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one matching event
    fn on_update(&self, event: &Event);
}

impl<F> EventHandler for F
where
    F: Fn(&Event) + Send + Sync + 'static,
{
    fn on_update(&self, event: &Event) {
        self(event)
    }
}
