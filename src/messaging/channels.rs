// Communication channels lock-free

use crate::messaging::notification::Notification;
use ringbuf::{HeapRb, traits::Split};

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

/// Single-producer single-consumer notice queue
pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}

/// Push a notice, dropping it when the host is not draining the queue
pub fn post(tx: &mut NotificationProducer, notification: Notification) -> bool {
    let posted = ringbuf::traits::Producer::try_push(tx, notification).is_ok();
    if !posted {
        log::debug!("notification queue full, notice dropped");
    }
    posted
}

/// Take every pending notice
pub fn drain(rx: &mut NotificationConsumer) -> Vec<Notification> {
    let mut notices = Vec::new();
    while let Some(notification) = ringbuf::traits::Consumer::try_pop(rx) {
        notices.push(notification);
    }
    notices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::notification::NotificationCategory;

    #[test]
    fn test_post_and_drain_in_order() {
        let (mut tx, mut rx) = create_notification_channel(4);
        assert!(post(&mut tx, Notification::info(NotificationCategory::Pattern, "a")));
        assert!(post(&mut tx, Notification::warning(NotificationCategory::Audio, "b")));

        let notices = drain(&mut rx);
        let messages: Vec<&str> = notices.iter().map(|n| n.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b"]);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_full_queue_drops_notice() {
        let (mut tx, mut rx) = create_notification_channel(1);
        assert!(post(&mut tx, Notification::info(NotificationCategory::Pattern, "kept")));
        assert!(!post(&mut tx, Notification::info(NotificationCategory::Pattern, "lost")));
        assert_eq!(drain(&mut rx).len(), 1);
    }
}
