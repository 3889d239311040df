//! # Subscription Flows
//!
//! Subscribe/unsubscribe over HTTP with a real verification round-trip.

#[cfg(test)]
mod tests {
    use crate::harness::{wait_until, MockSubscriber, TestHub, VerifyBehavior};
    use std::time::Duration;

    const TOPIC: &str = "http://example.com/feed";

    #[tokio::test]
    async fn test_sync_subscribe_verifies_and_commits() {
        let hub = TestHub::start().await;
        let subscriber = MockSubscriber::start().await;
        let callback = subscriber.callback("/cb");

        let response = hub
            .post_form(&[
                ("hub.mode", "subscribe"),
                ("hub.topic", TOPIC),
                ("hub.callback", &callback),
                ("hub.verify", "sync"),
                ("hub.verify_token", "qfwef9"),
                ("hub.lease_seconds", "3600"),
            ])
            .await;
        assert_eq!(response.status().as_u16(), 204);

        let verifications = subscriber.verifications();
        assert_eq!(verifications.len(), 1);
        let params = &verifications[0].params;
        assert_eq!(params["hub.mode"], "subscribe");
        assert_eq!(params["hub.topic"], TOPIC);
        assert_eq!(params["hub.verify_token"], "qfwef9");
        assert_eq!(params["hub.lease_seconds"], "3600");
        assert!(!params["hub.challenge"].is_empty());

        assert_eq!(hub.status(TOPIC, &callback).await, "subscribed");
    }

    #[tokio::test]
    async fn test_callback_query_is_preserved() {
        let hub = TestHub::start().await;
        let subscriber = MockSubscriber::start().await;
        let callback = subscriber.callback("/cb?x=y");

        let response = hub.subscribe(TOPIC, &callback, "sync").await;
        assert_eq!(response.status().as_u16(), 204);

        let raw = &subscriber.verifications()[0].raw_query;
        assert!(raw.starts_with("x=y&hub.mode=subscribe&hub.topic="), "{raw}");
        assert!(raw.contains("&hub.challenge="));
    }

    #[tokio::test]
    async fn test_callback_hub_params_are_not_overwritten() {
        let hub = TestHub::start().await;
        let subscriber = MockSubscriber::start().await;
        let callback = subscriber.callback("/cb?hub.challenge=imahacker");

        let response = hub.subscribe(TOPIC, &callback, "sync").await;
        assert_eq!(response.status().as_u16(), 204);

        let verification = &subscriber.verifications()[0];
        let raw = &verification.raw_query;
        assert!(raw.starts_with("hub.challenge=imahacker&hub.mode=subscribe&"), "{raw}");
        let challenge = &verification.params["hub.challenge"];
        assert_ne!(challenge, "imahacker");
        assert!(raw.contains(&format!("&hub.challenge={challenge}")), "{raw}");
        assert_eq!(hub.status(TOPIC, &callback).await, "subscribed");
    }

    #[tokio::test]
    async fn test_sync_failure_leaves_status_unchanged() {
        let hub = TestHub::start().await;
        let subscriber = MockSubscriber::start().await;
        let callback = subscriber.callback("/cb");

        subscriber.set_verify(VerifyBehavior::NotFound);
        let response = hub.subscribe(TOPIC, &callback, "sync").await;
        assert_eq!(response.status().as_u16(), 409);
        assert_eq!(hub.status(TOPIC, &callback).await, "none");

        subscriber.set_verify(VerifyBehavior::WrongChallenge);
        let response = hub.subscribe(TOPIC, &callback, "sync").await;
        assert_eq!(response.status().as_u16(), 409);
        assert_eq!(hub.status(TOPIC, &callback).await, "none");

        subscriber.set_verify(VerifyBehavior::Echo);
        hub.subscribe(TOPIC, &callback, "sync").await;
        assert_eq!(hub.status(TOPIC, &callback).await, "subscribed");

        subscriber.set_verify(VerifyBehavior::ServerError);
        let response = hub
            .post_form(&[
                ("hub.mode", "unsubscribe"),
                ("hub.topic", TOPIC),
                ("hub.callback", &callback),
                ("hub.verify", "sync"),
            ])
            .await;
        assert_eq!(response.status().as_u16(), 409);
        assert_eq!(hub.status(TOPIC, &callback).await, "subscribed");
    }

    #[tokio::test]
    async fn test_async_not_found_is_never_retried() {
        let hub = TestHub::start().await;
        let subscriber = MockSubscriber::start().await;
        let callback = subscriber.callback("/cb");
        subscriber.set_verify(VerifyBehavior::NotFound);

        let response = hub
            .post_form(&[
                ("hub.mode", "subscribe"),
                ("hub.topic", TOPIC),
                ("hub.callback", &callback),
                ("hub.verify", "async"),
                ("hub.debug.retry_after", "1"),
            ])
            .await;
        assert_eq!(response.status().as_u16(), 202);

        assert!(wait_until(Duration::from_secs(2), || !subscriber.verifications().is_empty()).await);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(subscriber.verifications().len(), 1);
        assert_eq!(hub.status(TOPIC, &callback).await, "none");
    }

    #[tokio::test]
    async fn test_async_server_error_is_retried() {
        let hub = TestHub::start().await;
        let subscriber = MockSubscriber::start().await;
        let callback = subscriber.callback("/cb");
        subscriber.set_verify(VerifyBehavior::ServerError);

        let response = hub
            .post_form(&[
                ("hub.mode", "subscribe"),
                ("hub.topic", TOPIC),
                ("hub.callback", &callback),
                ("hub.verify", "async"),
                ("hub.debug.retry_after", "1"),
            ])
            .await;
        assert_eq!(response.status().as_u16(), 202);

        assert!(wait_until(Duration::from_secs(6), || subscriber.verifications().len() >= 3).await);
        assert_eq!(hub.status(TOPIC, &callback).await, "none");
    }

    #[tokio::test]
    async fn test_async_eventually_verifies() {
        let hub = TestHub::start().await;
        let subscriber = MockSubscriber::start().await;
        let callback = subscriber.callback("/cb");
        subscriber.set_verify(VerifyBehavior::ServerError);

        hub.post_form(&[
            ("hub.mode", "subscribe"),
            ("hub.topic", TOPIC),
            ("hub.callback", &callback),
            ("hub.verify", "async"),
            ("hub.debug.retry_after", "1"),
        ])
        .await;
        assert!(wait_until(Duration::from_secs(2), || !subscriber.verifications().is_empty()).await);

        subscriber.set_verify(VerifyBehavior::Echo);
        let mut subscribed = false;
        for _ in 0..40 {
            if hub.status(TOPIC, &callback).await == "subscribed" {
                subscribed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(subscribed);
    }

    #[tokio::test]
    async fn test_resubscribe_stays_subscribed() {
        let hub = TestHub::start().await;
        let subscriber = MockSubscriber::start().await;
        let callback = subscriber.callback("/cb");

        for _ in 0..2 {
            let response = hub.subscribe(TOPIC, &callback, "sync").await;
            assert_eq!(response.status().as_u16(), 204);
            assert_eq!(hub.status(TOPIC, &callback).await, "subscribed");
        }
        assert_eq!(subscriber.verifications().len(), 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes() {
        let hub = TestHub::start().await;
        let subscriber = MockSubscriber::start().await;
        let callback = subscriber.callback("/cb");

        hub.subscribe(TOPIC, &callback, "sync").await;
        let response = hub
            .post_form(&[
                ("hub.mode", "unsubscribe"),
                ("hub.topic", TOPIC),
                ("hub.callback", &callback),
                ("hub.verify", "sync"),
            ])
            .await;
        assert_eq!(response.status().as_u16(), 204);

        let last = subscriber.verifications().pop().unwrap();
        assert_eq!(last.params["hub.mode"], "unsubscribe");
        assert!(!last.params.contains_key("hub.lease_seconds"));
        assert_eq!(hub.status(TOPIC, &callback).await, "none");
    }

    #[tokio::test]
    async fn test_conflicting_secret_for_pending_pair() {
        let hub = TestHub::start().await;
        let subscriber = MockSubscriber::start().await;
        let callback = subscriber.callback("/cb");
        subscriber.set_verify(VerifyBehavior::ServerError);

        let first = hub
            .post_form(&[
                ("hub.mode", "subscribe"),
                ("hub.topic", TOPIC),
                ("hub.callback", &callback),
                ("hub.verify", "async"),
                ("hub.secret", "first-secret"),
            ])
            .await;
        assert_eq!(first.status().as_u16(), 202);

        let second = hub
            .post_form(&[
                ("hub.mode", "subscribe"),
                ("hub.topic", TOPIC),
                ("hub.callback", &callback),
                ("hub.verify", "async"),
                ("hub.secret", "second-secret"),
            ])
            .await;
        assert!(second.status().is_client_error());
        assert!(second.text().await.unwrap().contains("hub.secret"));
    }

    #[tokio::test]
    async fn test_validation_errors_name_the_field() {
        let hub = TestHub::start().await;

        let cases: Vec<(Vec<(&str, &str)>, &str)> = vec![
            (vec![("hub.topic", TOPIC)], "hub.mode"),
            (vec![("hub.mode", "subscribe"), ("hub.topic", TOPIC)], "hub.callback"),
            (
                vec![
                    ("hub.mode", "subscribe"),
                    ("hub.callback", "http://example.com/cb"),
                    ("hub.verify", "sync"),
                ],
                "hub.topic",
            ),
            (
                vec![
                    ("hub.mode", "subscribe"),
                    ("hub.callback", "http://example.com/cb"),
                    ("hub.topic", "http://example.com/feed#fragment"),
                    ("hub.verify", "sync"),
                ],
                "hub.topic",
            ),
            (
                vec![
                    ("hub.mode", "subscribe"),
                    ("hub.callback", "http://example.com/cb"),
                    ("hub.topic", TOPIC),
                ],
                "hub.verify",
            ),
            (
                vec![
                    ("hub.mode", "subscribe"),
                    ("hub.callback", "http://example.com/cb"),
                    ("hub.topic", TOPIC),
                    ("hub.verify", "sync"),
                    ("hub.lease_seconds", "soon"),
                ],
                "hub.lease_seconds",
            ),
        ];

        for (fields, field) in cases {
            let response = hub.post_form(&fields).await;
            assert_eq!(response.status().as_u16(), 400, "{field}");
            let body = response.text().await.unwrap();
            assert!(body.contains(field), "{field}: {body}");
        }
    }

    #[tokio::test]
    async fn test_protocol_surface_rejections() {
        let hub = TestHub::start().await;

        let response = hub
            .client()
            .post(&hub.url)
            .header("Content-Type", "text/plain")
            .body("hub.mode=publish&hub.url=http://example.com/feed")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 415);

        let response = hub
            .client()
            .get(&hub.url)
            .query(&[
                ("hub.mode", "subscribe"),
                ("hub.topic", TOPIC),
                ("hub.callback", "http://example.com/cb"),
                ("hub.verify", "sync"),
            ])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 405);
    }
}
