//! Lifecycle records driven through the layers with `oneshot`

use std::collections::HashMap;
use std::convert::Infallible;
use std::time::Duration;

use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Empty, Full};
use reqtrail::{CorrelationExt, ErrorPageLayer, Message, ObservedBody};
use tower::{service_fn, ServiceBuilder, ServiceExt};
use tracing::Level;

use crate::helpers::*;

type EmptyReq = Request<ObservedBody<Empty<Bytes>>>;

/// Arrival, request end and response end, in that order, with response
/// facts only on the last record.
#[tokio::test]
async fn test_full_lifecycle() {
    let (logger, sink) = memory_logger();
    let service = ServiceBuilder::new()
        .layer(logger.layer())
        .service_fn(|_req: EmptyReq| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, Infallible>(Response::new(full("hello")))
        });

    let response = service
        .oneshot(Request::new(Empty::<Bytes>::new()))
        .await
        .unwrap();

    assert_eq!(sink.messages(), vec!["request received", "request finished"]);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"hello");

    let records = sink.records();
    let messages: Vec<_> = records.iter().map(|(_, r)| r.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["request received", "request finished", "response finished"]
    );

    let (_, arrival) = &records[0];
    let (_, request_end) = &records[1];
    let (_, response_end) = &records[2];

    assert!(records.iter().all(|(level, _)| *level == Level::INFO));
    assert!(records
        .iter()
        .all(|(_, r)| r.correlation_id == arrival.correlation_id));

    assert!(arrival.elapsed_millis < 20.0);
    assert_eq!(arrival.status_code, None);
    assert_eq!(request_end.status_code, None);
    assert_eq!(request_end.content_length, None);
    assert_eq!(request_end.response_time_millis, None);

    assert_eq!(response_end.status_code, Some(200));
    assert_eq!(response_end.content_length, Some(5));
    assert!(response_end.response_time_millis.unwrap() >= 20.0);

    let elapsed: Vec<f64> = records.iter().map(|(_, r)| r.elapsed_millis).collect();
    assert!(elapsed.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_duplicate_layer_single_arrival() {
    let (logger, sink) = memory_logger();
    let service = ServiceBuilder::new()
        .layer(logger.layer())
        .layer(logger.layer())
        .service_fn(|_req: Request<ObservedBody<ObservedBody<Empty<Bytes>>>>| async {
            Ok::<_, Infallible>(Response::new(full("ok")))
        });

    let response = service
        .oneshot(Request::new(Empty::<Bytes>::new()))
        .await
        .unwrap();
    response.into_body().collect().await.unwrap();

    assert_eq!(
        sink.messages(),
        vec!["request received", "request finished", "response finished"]
    );
}

#[tokio::test]
async fn test_handler_error_logged_and_propagated() {
    let (logger, sink) = memory_logger();
    let service = ServiceBuilder::new()
        .layer(logger.layer())
        .layer(logger.error_layer())
        .service_fn(|_req: Request<ObservedBody<ObservedBody<Empty<Bytes>>>>| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err::<Response<Full<Bytes>>, _>(TestError("boom".to_string()))
        });

    let result = service.oneshot(Request::new(Empty::<Bytes>::new())).await;

    assert_eq!(result.unwrap_err(), TestError("boom".to_string()));

    let errors: Vec<_> = sink
        .records()
        .into_iter()
        .filter(|(level, _)| *level == Level::ERROR)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].1.message, Message::Error("boom".to_string()));
    assert_eq!(errors[0].1.level, Level::ERROR);

    assert_eq!(records_with(&sink, "request received").len(), 1);
    assert!(records_with(&sink, "response finished").is_empty());
}

/// The error hook alone still creates the context and observes the bodies.
#[tokio::test]
async fn test_error_layer_without_lifecycle_layer() {
    let (logger, sink) = memory_logger();
    let service = ServiceBuilder::new()
        .layer(logger.error_layer())
        .service_fn(|_req: EmptyReq| async {
            Err::<Response<Full<Bytes>>, _>(TestError("early failure".to_string()))
        });

    let result = service.oneshot(Request::new(Empty::<Bytes>::new())).await;
    assert!(result.is_err());

    let records = sink.records();
    assert!(records_with(&sink, "request received").is_empty());
    assert_eq!(records_with(&sink, "request finished").len(), 1);

    let errors: Vec<_> = records
        .iter()
        .filter(|(_, r)| r.message.is_error())
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].1.message.as_str(), "early failure");
    assert!(records
        .iter()
        .all(|(_, r)| r.correlation_id == records[0].1.correlation_id));
}

#[tokio::test]
async fn test_response_dropped_before_completion() {
    let (logger, sink) = memory_logger();
    let service = ServiceBuilder::new()
        .layer(logger.layer())
        .service_fn(|_req: EmptyReq| async {
            Ok::<_, Infallible>(Response::new(full("never sent")))
        });

    let response = service
        .oneshot(Request::new(Empty::<Bytes>::new()))
        .await
        .unwrap();
    drop(response);

    assert_eq!(sink.messages(), vec!["request received", "request finished"]);
}

#[tokio::test]
async fn test_stalled_response_never_finishes() {
    let (logger, sink) = memory_logger();
    let service = ServiceBuilder::new()
        .layer(logger.layer())
        .service_fn(|_req: EmptyReq| async {
            Ok::<_, Infallible>(Response::new(PendingBody))
        });

    let response = service
        .oneshot(Request::new(Empty::<Bytes>::new()))
        .await
        .unwrap();

    let polled =
        tokio::time::timeout(Duration::from_millis(20), response.into_body().frame()).await;
    assert!(polled.is_err());

    assert!(records_with(&sink, "response finished").is_empty());
}

#[tokio::test]
async fn test_request_body_read_fully() {
    let (logger, sink) = memory_logger();
    let observed = sink.clone();
    let service = ServiceBuilder::new().layer(logger.layer()).service_fn(
        move |req: Request<ObservedBody<Full<Bytes>>>| {
            let observed = observed.clone();
            async move {
                assert_eq!(observed.messages(), vec!["request received"]);
                let body = req.into_body().collect().await.unwrap().to_bytes();
                assert_eq!(
                    observed.messages(),
                    vec!["request received", "request finished"]
                );
                Ok::<_, Infallible>(Response::new(Full::new(body)))
            }
        },
    );

    let response = service
        .oneshot(Request::new(full("payload")))
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"payload");

    let finished = records_with(&sink, "response finished");
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].1.content_length, Some(7));
}

/// A handler that rejects a request without reading its body still ends
/// the request channel.
#[tokio::test]
async fn test_unread_request_body_finishes_on_drop() {
    let (logger, sink) = memory_logger();
    let service = ServiceBuilder::new()
        .layer(logger.layer())
        .service_fn(|req: Request<ObservedBody<Full<Bytes>>>| async move {
            drop(req);
            let mut response = Response::new(full("unauthorized"));
            *response.status_mut() = StatusCode::UNAUTHORIZED;
            Ok::<_, Infallible>(response)
        });

    let response = service
        .oneshot(Request::new(full("unread")))
        .await
        .unwrap();
    response.into_body().collect().await.unwrap();

    assert_eq!(
        sink.messages(),
        vec!["request received", "request finished", "response finished"]
    );
    let finished = records_with(&sink, "response finished");
    assert_eq!(finished[0].1.status_code, Some(401));
}

/// The transport writes only the head of a HEAD response and drops the body.
#[tokio::test]
async fn test_head_response_finishes_when_body_dropped() {
    let (logger, sink) = memory_logger();
    let service = ServiceBuilder::new()
        .layer(logger.layer())
        .service_fn(|_req: EmptyReq| async {
            Ok::<_, Infallible>(Response::new(full("not sent for HEAD")))
        });

    let request = Request::builder()
        .method(Method::HEAD)
        .uri("/health")
        .body(Empty::<Bytes>::new())
        .unwrap();
    let response = service.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    drop(response);

    let finished = records_with(&sink, "response finished");
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].1.method, "HEAD");
    assert_eq!(finished[0].1.status_code, Some(200));
    assert!(finished[0].1.response_time_millis.is_some());
}

#[tokio::test]
async fn test_no_content_response_finishes_when_body_dropped() {
    let (logger, sink) = memory_logger();
    let service = ServiceBuilder::new()
        .layer(logger.layer())
        .service_fn(|_req: EmptyReq| async {
            let response = Response::builder()
                .status(StatusCode::NO_CONTENT)
                .body(full("ignored"))
                .unwrap();
            Ok::<_, Infallible>(response)
        });

    let response = service
        .oneshot(Request::new(Empty::<Bytes>::new()))
        .await
        .unwrap();
    drop(response);

    let finished = records_with(&sink, "response finished");
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].1.status_code, Some(204));
}

/// Without a lifecycle layer, the error page rendered for a failed request
/// picks up the response signal created by the error layer.
#[tokio::test]
async fn test_error_page_observed_without_lifecycle_layer() {
    let (logger, sink) = memory_logger();
    let service = ServiceBuilder::new()
        .layer(ErrorPageLayer::new(render_error))
        .layer(logger.error_layer())
        .service_fn(|_req: EmptyReq| async {
            Err::<Response<Full<Bytes>>, _>(TestError("boom".to_string()))
        });

    let response = service
        .oneshot(Request::new(Empty::<Bytes>::new()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"internal server error");

    let summary: Vec<_> = sink
        .records()
        .into_iter()
        .map(|(level, r)| (level, r.message))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Level::INFO, Message::from("request finished")),
            (Level::ERROR, Message::Error("boom".to_string())),
            (Level::INFO, Message::from("response finished")),
        ]
    );

    let finished = records_with(&sink, "response finished");
    assert_eq!(finished[0].1.status_code, Some(500));
    assert_eq!(finished[0].1.content_length, Some(21));
}

/// Behind a lifecycle layer the error page is observed by the outer layer;
/// the error layer inside hands over nothing.
#[tokio::test]
async fn test_error_page_under_lifecycle_layer() {
    let (logger, sink) = memory_logger();
    let service = ServiceBuilder::new()
        .layer(logger.layer())
        .layer(ErrorPageLayer::new(render_error))
        .layer(logger.error_layer())
        .service_fn(|_req: Request<ObservedBody<ObservedBody<Empty<Bytes>>>>| async {
            Err::<Response<Full<Bytes>>, _>(TestError("boom".to_string()))
        });

    let response = service
        .oneshot(Request::new(Empty::<Bytes>::new()))
        .await
        .unwrap();
    response.into_body().collect().await.unwrap();

    assert_eq!(
        sink.messages(),
        vec!["request received", "request finished", "boom", "response finished"]
    );
    let finished = records_with(&sink, "response finished");
    assert_eq!(finished[0].1.status_code, Some(500));
}

#[tokio::test]
async fn test_request_body_error() {
    let (logger, sink) = memory_logger();
    let service = ServiceBuilder::new()
        .layer(logger.layer())
        .service_fn(|req: Request<ObservedBody<FailingBody>>| async move {
            let read = req.into_body().collect().await;
            assert!(read.is_err());
            let mut response = Response::new(full("bad body"));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            Ok::<_, Infallible>(response)
        });

    let response = service
        .oneshot(Request::new(FailingBody))
        .await
        .unwrap();
    response.into_body().collect().await.unwrap();

    let records = sink.records();
    let summary: Vec<_> = records
        .iter()
        .map(|(level, r)| (*level, r.message.clone()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Level::INFO, Message::from("request received")),
            (Level::ERROR, Message::Error("stream reset".to_string())),
            (Level::INFO, Message::from("request finished")),
            (Level::INFO, Message::from("response finished")),
        ]
    );
    assert_eq!(records[3].1.status_code, Some(400));
}

#[tokio::test]
async fn test_response_body_error() {
    let (logger, sink) = memory_logger();
    let service = ServiceBuilder::new()
        .layer(logger.layer())
        .service_fn(|_req: EmptyReq| async {
            Ok::<_, Infallible>(Response::new(FailingBody))
        });

    let response = service
        .oneshot(Request::new(Empty::<Bytes>::new()))
        .await
        .unwrap();
    assert!(response.into_body().collect().await.is_err());

    let records = sink.records();
    assert_eq!(records.len(), 4);
    assert_eq!(records[2].0, Level::ERROR);
    assert_eq!(records[2].1.message, Message::Error("stream reset".to_string()));
    assert_eq!(records[3].1.message.as_str(), "response finished");
    // A failed response never completes
    assert_eq!(records[3].1.status_code, None);
    assert_eq!(records[3].1.response_time_millis, None);
}

#[tokio::test]
async fn test_declared_content_length_and_status() {
    let (logger, sink) = memory_logger();
    let service = ServiceBuilder::new()
        .layer(logger.layer())
        .service_fn(|_req: EmptyReq| async {
            let response = Response::builder()
                .status(StatusCode::NOT_FOUND)
                .header(CONTENT_LENGTH, "9")
                .body(full("not found"))
                .unwrap();
            Ok::<_, Infallible>(response)
        });

    let response = service
        .oneshot(Request::new(Empty::<Bytes>::new()))
        .await
        .unwrap();
    response.into_body().collect().await.unwrap();

    let finished = records_with(&sink, "response finished");
    assert_eq!(finished[0].1.status_code, Some(404));
    assert_eq!(finished[0].1.content_length, Some(9));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ids_distinct_across_concurrent_requests() {
    let (logger, sink) = memory_logger();
    let service = ServiceBuilder::new()
        .layer(logger.layer())
        .service_fn(|_req: EmptyReq| async {
            tokio::task::yield_now().await;
            Ok::<_, Infallible>(Response::new(full("ok")))
        });

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move {
                let response = service
                    .oneshot(Request::new(Empty::<Bytes>::new()))
                    .await
                    .unwrap();
                response.into_body().collect().await.unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let mut by_id: HashMap<String, Vec<String>> = HashMap::new();
    for (_, record) in sink.records() {
        by_id
            .entry(record.correlation_id.to_string())
            .or_default()
            .push(record.message.as_str().to_string());
    }

    assert_eq!(by_id.len(), 16);
    for messages in by_id.values() {
        assert_eq!(
            messages,
            &vec!["request received", "request finished", "response finished"]
        );
    }
}

#[tokio::test]
async fn test_handler_logs_through_context() {
    let (logger, sink) = memory_logger();
    let service = ServiceBuilder::new()
        .layer(logger.layer())
        .service_fn(|req: EmptyReq| async move {
            let ctx = req.correlation().cloned().expect("context missing");
            ctx.identify("user-9");
            ctx.log_at(Level::WARN, "cache miss");
            Ok::<_, Infallible>(Response::new(full("ok")))
        });

    let response = service
        .oneshot(Request::new(Empty::<Bytes>::new()))
        .await
        .unwrap();
    response.into_body().collect().await.unwrap();

    let custom = records_with(&sink, "cache miss");
    assert_eq!(custom.len(), 1);
    assert_eq!(custom[0].0, Level::WARN);
    assert_eq!(custom[0].1.user_id.as_deref(), Some("user-9"));

    let finished = records_with(&sink, "response finished");
    assert_eq!(finished[0].1.user_id.as_deref(), Some("user-9"));

    let arrival = records_with(&sink, "request received");
    assert_eq!(arrival[0].1.user_id, None);
}

#[tokio::test]
async fn test_request_passes_through_unchanged() {
    let (logger, _sink) = memory_logger();
    let inner = service_fn(|req: Request<ObservedBody<Empty<Bytes>>>| async move {
        Ok::<_, Infallible>(Response::new(full(if req.uri().path() == "/x" {
            "x"
        } else {
            "other"
        })))
    });
    let service = ServiceBuilder::new().layer(logger.layer()).service(inner);

    let request = Request::builder()
        .uri("/x")
        .body(Empty::<Bytes>::new())
        .unwrap();
    let response = service.oneshot(request).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"x");
}
