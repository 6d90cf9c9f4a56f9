mod mock;

use std::time::Duration;

use chrono::Utc;
use common::metrics::{EFFECTIVE_ETAGS, RATE_LIMIT_HITS, SAMPLED_COLLECTIONS};
use github::{Error, Repository};
use tokio_util::sync::CancellationToken;

use crate::mock::{Behavior, MockServer, harness};

fn repository(stars: u64) -> Repository {
    Repository {
        full_name: "o/r".to_string(),
        stargazers_count: stars,
        created_at: "2019-06-01T12:00:00Z".parse().unwrap(),
    }
}

fn assert_sorted(stars: &[github::StarEvent]) {
    assert!(
        stars.windows(2).all(|w| w[0].starred_at <= w[1].starred_at),
        "not sorted: {stars:?}"
    );
}

#[tokio::test]
async fn single_page_is_returned_sorted() {
    let server = MockServer::start(Behavior::default()).await;
    let h = harness(&server, &[], |_| {});

    let stars = h
        .github
        .collect(&repository(2), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stars.len(), 2);
    assert_sorted(&stars);
    assert!(stars.iter().all(|s| s.ordinal.is_none()));
    assert_eq!(server.pages_requested(), vec![1]);
}

#[tokio::test]
async fn stargazer_requests_ask_for_timestamps() {
    let server = MockServer::start(Behavior {
        last_page: Some(2),
        ..Behavior::default()
    })
    .await;
    let h = harness(&server, &[], |c| c.page_size = 2);

    h.github
        .collect(&repository(4), &CancellationToken::new())
        .await
        .unwrap();

    for request in server.api_requests() {
        assert_eq!(
            request.accept.as_deref(),
            Some("application/vnd.github.v3.star+json")
        );
    }
}

#[tokio::test]
async fn few_pages_are_fetched_exhaustively() {
    let server = MockServer::start(Behavior {
        last_page: Some(10),
        stars_per_page: 3,
        ..Behavior::default()
    })
    .await;
    let h = harness(&server, &[], |c| c.max_sample_pages = 15);

    let stars = h
        .github
        .collect(&repository(30), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(server.pages_requested(), (1..=10).collect::<Vec<_>>());
    assert_eq!(stars.len(), 30);
    assert_sorted(&stars);
    assert_eq!(h.metrics.counter(SAMPLED_COLLECTIONS), 0);
}

#[tokio::test]
async fn many_pages_are_sampled() {
    let server = MockServer::start(Behavior {
        last_page: Some(500),
        stars_per_page: 3,
        ..Behavior::default()
    })
    .await;
    let h = harness(&server, &[], |c| {
        c.max_sample_pages = 15;
        c.page_size = 100;
    });
    let repo = repository(49_876);

    let before = Utc::now();
    let stars = h.github.collect(&repo, &CancellationToken::new()).await.unwrap();

    assert_eq!(stars.len(), 16, "15 samples plus the trailing point");
    assert_eq!(
        server.pages_requested(),
        vec![1, 67, 100, 133, 167, 200, 233, 267, 300, 333, 367, 400, 433, 467, 500]
    );

    let ordinals: Vec<u64> = stars.iter().map(|s| s.ordinal.unwrap()).collect();
    assert_eq!(ordinals[0], 1);
    assert_eq!(ordinals[1], 6601);
    assert_eq!(ordinals[14], 49_901);
    assert_eq!(ordinals[15], 49_876);

    let trailing = stars.last().unwrap();
    assert!(trailing.starred_at >= before);
    assert_sorted(&stars[..15]);
    assert_eq!(h.metrics.counter(SAMPLED_COLLECTIONS), 1);
}

#[tokio::test]
async fn empty_page_ends_exhaustive_collection_quietly() {
    let server = MockServer::start(Behavior {
        last_page: Some(4),
        empty_pages: [4].into(),
        ..Behavior::default()
    })
    .await;
    let h = harness(&server, &[], |_| {});

    let stars = h
        .github
        .collect(&repository(6), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stars.len(), 6);
    assert_sorted(&stars);
}

#[tokio::test]
async fn empty_sampled_page_drops_only_that_point() {
    let server = MockServer::start(Behavior {
        last_page: Some(500),
        empty_pages: [500].into(),
        ..Behavior::default()
    })
    .await;
    let h = harness(&server, &[], |_| {});

    let stars = h
        .github
        .collect(&repository(50_000), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stars.len(), 15);
    assert_eq!(stars.last().unwrap().ordinal, Some(50_000));
}

#[tokio::test]
async fn failing_page_aborts_exhaustive_collection() {
    let server = MockServer::start(Behavior {
        last_page: Some(5),
        page_status: [(3, 500)].into(),
        ..Behavior::default()
    })
    .await;
    let h = harness(&server, &[], |_| {});

    let err = h
        .github
        .collect(&repository(10), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UpstreamApi(_)), "got {err:?}");
}

#[tokio::test]
async fn failing_page_aborts_sampled_collection() {
    let server = MockServer::start(Behavior {
        last_page: Some(500),
        page_status: [(200, 403)].into(),
        ..Behavior::default()
    })
    .await;
    let h = harness(&server, &[], |_| {});

    let err = h
        .github
        .collect(&repository(50_000), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RateLimited), "got {err:?}");
    assert_eq!(h.metrics.counter(RATE_LIMIT_HITS), 1);
}

#[tokio::test]
async fn missing_first_page_is_not_found() {
    let server = MockServer::start(Behavior {
        page_status: [(1, 404)].into(),
        ..Behavior::default()
    })
    .await;
    let h = harness(&server, &[], |_| {});

    let err = h
        .github
        .collect(&repository(1), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound), "got {err:?}");
}

#[tokio::test]
async fn later_pages_are_revalidated_with_etags() {
    let server = MockServer::start(Behavior {
        last_page: Some(3),
        ..Behavior::default()
    })
    .await;
    let h = harness(&server, &[], |_| {});
    let repo = repository(6);
    let cancel = CancellationToken::new();

    let first = h.github.collect(&repo, &cancel).await.unwrap();
    server.clear_requests();
    let second = h.github.collect(&repo, &cancel).await.unwrap();

    assert_eq!(first, second);
    let requests = server.api_requests();
    for request in &requests {
        match request.page {
            Some(1) => assert_eq!(request.if_none_match, None),
            Some(page) => assert_eq!(
                request.if_none_match.as_deref(),
                Some(format!("\"page-{page}\"").as_str())
            ),
            None => panic!("stargazer request without page"),
        }
    }
    assert_eq!(h.metrics.counter(EFFECTIVE_ETAGS), 2);
}

#[tokio::test]
async fn concurrent_page_requests_are_bounded() {
    let server = MockServer::start(Behavior {
        last_page: Some(12),
        page_delay: Some(Duration::from_millis(50)),
        ..Behavior::default()
    })
    .await;
    let h = harness(&server, &[], |c| c.max_concurrent_requests = 3);

    let stars = h
        .github
        .collect(&repository(24), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stars.len(), 24);
    assert!(server.max_in_flight() <= 3, "saw {}", server.max_in_flight());
    assert!(server.max_in_flight() >= 2, "pages were not fetched concurrently");
}

#[tokio::test]
async fn cancellation_stops_collection() {
    let server = MockServer::start(Behavior {
        last_page: Some(10),
        page_delay: Some(Duration::from_secs(30)),
        ..Behavior::default()
    })
    .await;
    let h = harness(&server, &[], |_| {});
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = h
        .github
        .collect(&repository(20), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(10));
}
