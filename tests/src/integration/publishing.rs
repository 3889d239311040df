//! # Publishing Flows
//!
//! Publish ping → topic fetch → delta → per-subscriber delivery.

#[cfg(test)]
mod tests {
    use crate::harness::{atom_feed, wait_until, MockPublisher, MockSubscriber, TestHub};
    use axum::http::StatusCode;
    use hub_core::domain::Secret;
    use hub_core::verify_signature;
    use std::time::Duration;

    const FEED_ID: &str = "urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6";

    #[tokio::test]
    async fn test_publish_delivers_only_new_entries() {
        let hub = TestHub::start().await;
        let publisher = MockPublisher::start().await;
        let subscriber = MockSubscriber::start().await;
        let topic = publisher.topic("/feed");
        let callback = subscriber.callback("/cb");

        let response = hub.subscribe(&topic, &callback, "sync").await;
        assert_eq!(response.status().as_u16(), 204);

        publisher.set_feed(
            "/feed",
            atom_feed(
                FEED_ID,
                &[("tag:example.com,2024:a&amp;b", "2024-01-01T00:00:00Z", "First")],
            ),
        );
        let response = hub.publish(&topic).await;
        assert_eq!(response.status().as_u16(), 204);

        assert!(wait_until(Duration::from_secs(5), || subscriber.notifications().len() == 1).await);
        let first = &subscriber.notifications()[0];
        assert_eq!(
            first.headers["content-type"].to_str().unwrap(),
            "application/atom+xml"
        );
        assert!(first.body.contains("<id>tag:example.com,2024:a&amp;b</id>"));
        assert!(first.body.contains("First"));
        assert!(first.body.contains(FEED_ID));

        publisher.set_feed(
            "/feed",
            atom_feed(
                FEED_ID,
                &[
                    ("tag:example.com,2024:a&amp;b", "2024-01-01T00:00:00Z", "First"),
                    ("tag:example.com,2024:c", "2024-01-02T00:00:00Z", "Second"),
                ],
            ),
        );
        hub.publish(&topic).await;

        assert!(wait_until(Duration::from_secs(5), || subscriber.notifications().len() == 2).await);
        let second = &subscriber.notifications()[1];
        assert!(second.body.contains("<id>tag:example.com,2024:c</id>"));
        assert!(!second.body.contains("tag:example.com,2024:a&amp;b"));
    }

    #[tokio::test]
    async fn test_updated_entry_is_redelivered() {
        let hub = TestHub::start().await;
        let publisher = MockPublisher::start().await;
        let subscriber = MockSubscriber::start().await;
        let topic = publisher.topic("/feed");
        hub.subscribe(&topic, &subscriber.callback("/cb"), "sync").await;

        publisher.set_feed(
            "/feed",
            atom_feed(FEED_ID, &[("urn:entry:1", "2024-01-01T00:00:00Z", "Draft")]),
        );
        hub.publish(&topic).await;
        assert!(wait_until(Duration::from_secs(5), || subscriber.notifications().len() == 1).await);

        // Unchanged content produces no notification.
        hub.publish(&topic).await;
        assert!(wait_until(Duration::from_secs(5), || publisher.fetches().len() == 2).await);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(subscriber.notifications().len(), 1);

        publisher.set_feed(
            "/feed",
            atom_feed(FEED_ID, &[("urn:entry:1", "2024-01-03T00:00:00Z", "Final")]),
        );
        hub.publish(&topic).await;
        assert!(wait_until(Duration::from_secs(5), || subscriber.notifications().len() == 2).await);
        assert!(subscriber.notifications()[1].body.contains("Final"));
    }

    #[tokio::test]
    async fn test_fan_out_and_signatures() {
        let hub = TestHub::start().await;
        let publisher = MockPublisher::start().await;
        let subscriber = MockSubscriber::start().await;
        let topic = publisher.topic("/feed");
        let signed = subscriber.callback("/signed");
        let plain = subscriber.callback("/plain");

        let response = hub
            .post_form(&[
                ("hub.mode", "subscribe"),
                ("hub.topic", &topic),
                ("hub.callback", &signed),
                ("hub.verify", "sync"),
                ("hub.secret", "s3cr3t"),
            ])
            .await;
        assert_eq!(response.status().as_u16(), 204);
        hub.subscribe(&topic, &plain, "sync").await;

        publisher.set_feed(
            "/feed",
            atom_feed(FEED_ID, &[("urn:entry:1", "2024-01-01T00:00:00Z", "Hello")]),
        );
        hub.publish(&topic).await;

        assert!(wait_until(Duration::from_secs(5), || subscriber.notifications().len() == 2).await);

        let fetch = &publisher.fetches()[0];
        assert_eq!(fetch.subscribers.as_deref(), Some("2"));

        let signed_delivery = &subscriber.notifications_to("/signed")[0];
        let signature = signed_delivery.headers["x-hub-signature"].to_str().unwrap();
        assert!(signature.starts_with("sha1="));
        assert!(verify_signature(
            signature,
            &Secret::new("s3cr3t"),
            signed_delivery.body.as_bytes()
        ));

        let plain_delivery = &subscriber.notifications_to("/plain")[0];
        assert!(!plain_delivery.headers.contains_key("x-hub-signature"));
        assert_eq!(plain_delivery.body, signed_delivery.body);
    }

    #[tokio::test]
    async fn test_failing_callback_is_retried() {
        let hub = TestHub::start().await;
        let publisher = MockPublisher::start().await;
        let subscriber = MockSubscriber::start().await;
        let topic = publisher.topic("/feed");
        hub.subscribe(&topic, &subscriber.callback("/cb"), "sync").await;
        subscriber.set_notify_status(StatusCode::INTERNAL_SERVER_ERROR);

        publisher.set_feed(
            "/feed",
            atom_feed(FEED_ID, &[("urn:entry:1", "2024-01-01T00:00:00Z", "Hello")]),
        );
        hub.publish(&topic).await;

        assert!(wait_until(Duration::from_secs(8), || subscriber.notifications().len() >= 4).await);

        subscriber.set_notify_status(StatusCode::NO_CONTENT);
        let settled = subscriber.notifications().len();
        tokio::time::sleep(Duration::from_secs(3)).await;
        let total = subscriber.notifications().len();
        assert!(total > settled);
        let bodies: Vec<String> = subscriber.notifications().into_iter().map(|n| n.body).collect();
        assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(subscriber.notifications().len(), total);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_skips_fetch() {
        let hub = TestHub::start().await;
        let publisher = MockPublisher::start().await;
        let topic = publisher.topic("/lonely");
        publisher.set_feed("/lonely", atom_feed(FEED_ID, &[]));

        let response = hub.publish(&topic).await;
        assert_eq!(response.status().as_u16(), 204);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(publisher.fetches().is_empty());
    }

    #[tokio::test]
    async fn test_publish_requires_url() {
        let hub = TestHub::start().await;

        let response = hub.post_form(&[("hub.mode", "publish")]).await;
        assert_eq!(response.status().as_u16(), 400);
        assert!(response.text().await.unwrap().contains("hub.url"));

        let response = hub
            .post_form(&[("hub.mode", "publish"), ("hub.url", "not a url")])
            .await;
        assert_eq!(response.status().as_u16(), 400);
    }
}
