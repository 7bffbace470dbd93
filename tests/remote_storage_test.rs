//! End-to-end remote_write / remote_read through the adapter router against an
//! in-memory OpenTSDB stand-in

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use adapter::{AdapterState, create_router};
use axum::{
    Json, Router,
    body::{Body, to_bytes},
    extract::State,
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use common::config::{HttpClientConfig, OpenTsdbConfig};
use common::prompb::{
    self, Label, ReadRequest, ReadResponse, Sample, TimeSeries, WriteRequest, decode_snappy,
    encode_snappy, label_matcher,
};
use opentsdb::Client;
use serde_json::{Value, json};
use tower::ServiceExt;

type Tags = BTreeMap<String, String>;

/// Stored points keyed by (metric, tags), holding (seconds, value)
#[derive(Clone, Default)]
struct FakeTsdb {
    points: Arc<Mutex<HashMap<(String, Tags), Vec<(i64, f64)>>>>,
    /// Metrics whose queries fail with a 500
    failing: Arc<Vec<String>>,
    /// Metrics whose queries never answer in time
    stalled: Arc<Vec<String>>,
}

impl FakeTsdb {
    async fn start(self) -> SocketAddr {
        let app = Router::new()
            .route("/api/put", post(put))
            .route("/api/query", post(query))
            .with_state(self);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }
}

fn tags_of(value: &Value) -> Tags {
    value
        .as_object()
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
                .collect()
        })
        .unwrap_or_default()
}

async fn put(State(tsdb): State<FakeTsdb>, Json(body): Json<Value>) -> Response {
    let mut points = tsdb.points.lock().unwrap();
    for point in body.as_array().unwrap() {
        let key = (
            point["metric"].as_str().unwrap().to_string(),
            tags_of(&point["tags"]),
        );
        points.entry(key).or_default().push((
            point["timestamp"].as_i64().unwrap(),
            point["value"].as_f64().unwrap(),
        ));
    }
    StatusCode::NO_CONTENT.into_response()
}

/// Supports the subset the adapter sends: one sub-query with `literal_or` and
/// `not_literal_or` filters on single values, no aggregation
async fn query(State(tsdb): State<FakeTsdb>, Json(body): Json<Value>) -> Response {
    let start = body["start"].as_i64().unwrap();
    let end = body["end"].as_i64().unwrap();
    let sub = &body["queries"][0];
    let metric = sub["metric"].as_str().unwrap();

    if tsdb.failing.iter().any(|m| m == metric) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable").into_response();
    }
    if tsdb.stalled.iter().any(|m| m == metric) {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }

    let filters = sub["filters"].as_array().cloned().unwrap_or_default();
    let points = tsdb.points.lock().unwrap();
    let mut results = Vec::new();
    for ((name, tags), samples) in points.iter() {
        if name != metric {
            continue;
        }
        let selected = filters.iter().all(|f| {
            let actual = tags.get(f["tagk"].as_str().unwrap());
            let wanted = f["filter"].as_str().unwrap();
            match f["type"].as_str().unwrap() {
                "literal_or" => actual.map(String::as_str) == Some(wanted),
                // Series without the tag do not match OpenTSDB filters at all
                "not_literal_or" => actual.is_some_and(|v| v != wanted),
                other => panic!("unexpected filter type {other}"),
            }
        });
        if !selected {
            continue;
        }

        let dps: serde_json::Map<String, Value> = samples
            .iter()
            .filter(|(ts, _)| (start..=end).contains(ts))
            .map(|(ts, v)| (ts.to_string(), json!(v)))
            .collect();
        if dps.is_empty() {
            continue;
        }
        results.push(json!({
            "metric": name,
            "tags": tags,
            "aggregateTags": [],
            "dps": dps,
        }));
    }

    Json(Value::Array(results)).into_response()
}

fn router_for(addr: SocketAddr, timeout: Duration) -> Router {
    let config = OpenTsdbConfig {
        url: format!("http://{addr}"),
        timeout,
        ..Default::default()
    };
    let client = Client::new(&config, &HttpClientConfig::default()).unwrap();
    create_router(AdapterState::new(client))
}

fn label(name: &str, value: &str) -> Label {
    Label {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn series(labels: &[(&str, &str)], samples: &[(i64, f64)]) -> TimeSeries {
    TimeSeries {
        labels: labels.iter().map(|(n, v)| label(n, v)).collect(),
        samples: samples
            .iter()
            .map(|&(timestamp, value)| Sample { value, timestamp })
            .collect(),
    }
}

fn matcher(t: label_matcher::Type, name: &str, value: &str) -> prompb::LabelMatcher {
    prompb::LabelMatcher {
        r#type: t as i32,
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn snappy_post(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, prompb::PROTOBUF_CONTENT_TYPE)
        .header(header::CONTENT_ENCODING, prompb::SNAPPY_CONTENT_ENCODING)
        .body(Body::from(body))
        .unwrap()
}

async fn remote_write(router: &Router, request: &WriteRequest) -> StatusCode {
    router
        .clone()
        .oneshot(snappy_post("/write", encode_snappy(request).unwrap()))
        .await
        .unwrap()
        .status()
}

async fn remote_read(router: &Router, request: &ReadRequest) -> (StatusCode, Vec<u8>) {
    let response = router
        .clone()
        .oneshot(snappy_post("/read", encode_snappy(request).unwrap()))
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn sample_pairs(ts: &TimeSeries) -> Vec<(i64, f64)> {
    ts.samples.iter().map(|s| (s.timestamp, s.value)).collect()
}

#[tokio::test]
async fn test_write_then_read_back() {
    let addr = FakeTsdb::default().start().await;
    let router = router_for(addr, Duration::from_secs(5));

    let write = WriteRequest {
        timeseries: vec![
            series(
                &[("__name__", "cpu"), ("host", "a"), ("dc", "eu")],
                &[(10_000, 0.5), (20_000, 0.75)],
            ),
            series(
                &[("__name__", "cpu"), ("host", "b"), ("dc", "us")],
                &[(10_000, 0.25)],
            ),
            series(&[("__name__", "mem"), ("host", "a")], &[(10_000, 512.0)]),
        ],
    };
    assert_eq!(remote_write(&router, &write).await, StatusCode::NO_CONTENT);

    let read = ReadRequest {
        queries: vec![prompb::Query {
            start_timestamp_ms: 0,
            end_timestamp_ms: 60_000,
            matchers: vec![
                matcher(label_matcher::Type::Eq, "__name__", "cpu"),
                matcher(label_matcher::Type::Neq, "dc", "us"),
            ],
        }],
    };
    let (status, body) = remote_read(&router, &read).await;
    assert_eq!(status, StatusCode::OK);

    let response: ReadResponse = decode_snappy(&body).unwrap();
    assert_eq!(response.results.len(), 1);
    let timeseries = &response.results[0].timeseries;
    assert_eq!(timeseries.len(), 1);
    assert_eq!(
        timeseries[0].labels,
        vec![
            label("__name__", "cpu"),
            label("dc", "eu"),
            label("host", "a"),
        ]
    );
    assert_eq!(
        sample_pairs(&timeseries[0]),
        vec![(10_000, 0.5), (20_000, 0.75)]
    );
}

#[tokio::test]
async fn test_empty_label_values_round_trip_through_placeholder() {
    let addr = FakeTsdb::default().start().await;
    let router = router_for(addr, Duration::from_secs(5));

    let write = WriteRequest {
        timeseries: vec![series(
            &[("__name__", "jobs"), ("queue", "")],
            &[(5_000, 3.0)],
        )],
    };
    assert_eq!(remote_write(&router, &write).await, StatusCode::NO_CONTENT);

    let read = ReadRequest {
        queries: vec![prompb::Query {
            start_timestamp_ms: 0,
            end_timestamp_ms: 10_000,
            matchers: vec![
                matcher(label_matcher::Type::Eq, "__name__", "jobs"),
                matcher(label_matcher::Type::Eq, "queue", ""),
            ],
        }],
    };
    let (status, body) = remote_read(&router, &read).await;
    assert_eq!(status, StatusCode::OK);

    let response: ReadResponse = decode_snappy(&body).unwrap();
    let timeseries = &response.results[0].timeseries;
    assert_eq!(timeseries.len(), 1);
    assert_eq!(sample_pairs(&timeseries[0]), vec![(5_000, 3.0)]);
}

#[tokio::test]
async fn test_queries_for_same_series_merge_into_one() {
    let addr = FakeTsdb::default().start().await;
    let router = router_for(addr, Duration::from_secs(5));

    let write = WriteRequest {
        timeseries: vec![series(
            &[("__name__", "up"), ("job", "api")],
            &[(1_000, 1.0), (2_000, 1.0), (3_000, 0.0)],
        )],
    };
    assert_eq!(remote_write(&router, &write).await, StatusCode::NO_CONTENT);

    // Two overlapping windows over the same series
    let query = |start, end| prompb::Query {
        start_timestamp_ms: start,
        end_timestamp_ms: end,
        matchers: vec![matcher(label_matcher::Type::Eq, "__name__", "up")],
    };
    let read = ReadRequest {
        queries: vec![query(0, 2_000), query(2_000, 3_000)],
    };
    let (status, body) = remote_read(&router, &read).await;
    assert_eq!(status, StatusCode::OK);

    let response: ReadResponse = decode_snappy(&body).unwrap();
    let timeseries = &response.results[0].timeseries;
    assert_eq!(timeseries.len(), 1);
    assert_eq!(
        sample_pairs(&timeseries[0]),
        vec![(1_000, 1.0), (2_000, 1.0), (3_000, 0.0)]
    );
}

#[tokio::test]
async fn test_non_finite_samples_are_not_stored() {
    let tsdb = FakeTsdb::default();
    let points = Arc::clone(&tsdb.points);
    let addr = tsdb.start().await;
    let router = router_for(addr, Duration::from_secs(5));

    let write = WriteRequest {
        timeseries: vec![series(
            &[("__name__", "temperature")],
            &[(1_000, f64::NAN), (2_000, 2.75)],
        )],
    };
    assert_eq!(remote_write(&router, &write).await, StatusCode::NO_CONTENT);

    let stored = points.lock().unwrap();
    assert_eq!(stored.len(), 1);
    let samples = stored.values().next().unwrap();
    assert_eq!(samples, &vec![(2, 2.75)]);
}

#[tokio::test]
async fn test_backend_failure_is_bad_gateway() {
    let addr = FakeTsdb {
        failing: Arc::new(vec!["broken".to_string()]),
        ..Default::default()
    }
    .start()
    .await;
    let router = router_for(addr, Duration::from_secs(5));

    let read = ReadRequest {
        queries: vec![
            prompb::Query {
                start_timestamp_ms: 0,
                end_timestamp_ms: 1_000,
                matchers: vec![matcher(label_matcher::Type::Eq, "__name__", "up")],
            },
            prompb::Query {
                start_timestamp_ms: 0,
                end_timestamp_ms: 1_000,
                matchers: vec![matcher(label_matcher::Type::Eq, "__name__", "broken")],
            },
        ],
    };
    let (status, body) = remote_read(&router, &read).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(String::from_utf8_lossy(&body).contains("storage unavailable"));
}

#[tokio::test]
async fn test_stalled_backend_is_gateway_timeout() {
    let addr = FakeTsdb {
        stalled: Arc::new(vec!["slow".to_string()]),
        ..Default::default()
    }
    .start()
    .await;
    let router = router_for(addr, Duration::from_millis(200));

    let read = ReadRequest {
        queries: vec![prompb::Query {
            start_timestamp_ms: 0,
            end_timestamp_ms: 1_000,
            matchers: vec![matcher(label_matcher::Type::Eq, "__name__", "slow")],
        }],
    };
    let (status, _) = remote_read(&router, &read).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_missing_metric_name_is_bad_request() {
    let addr = FakeTsdb::default().start().await;
    let router = router_for(addr, Duration::from_secs(5));

    let read = ReadRequest {
        queries: vec![prompb::Query {
            start_timestamp_ms: 0,
            end_timestamp_ms: 1_000,
            matchers: vec![matcher(label_matcher::Type::Eq, "job", "api")],
        }],
    };
    let (status, _) = remote_read(&router, &read).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
