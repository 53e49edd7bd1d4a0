//! Middleware Tests
//!
//! End-to-end behavior of `CacheOnDemand` with a small routing handler.

use cod_http::prelude::*;
use cod_test_utils::WorkCounter;
use http::{header, Method, Response, StatusCode};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

/// Routes of a tiny site, counting every handler run
#[derive(Default)]
struct Site {
    work_count: WorkCounter,
    runs: WorkCounter,
}

#[async_trait::async_trait]
impl Handler for Site {
    async fn call(&self, request: RequestContext, mut out: OutputInterceptor) -> anyhow::Result<()> {
        self.runs.bump();
        match request.target.as_str() {
            "/welcome" => {
                tokio::time::sleep(Duration::from_millis(100)).await;
                let count = self.work_count.bump();
                out.send(Body::from(format!("URL was: {}, work count is: {count}", request.target)))?;
            }
            "/redirect" => out.redirect(Redirect::to("/welcome"))?,
            "/redirect-301" => out.redirect(Redirect::with_status(301, "/welcome"))?,
            "/redirect-302" => out.redirect(Redirect::with_status(302, "/welcome"))?,
            "/created" => {
                out.set_status(201)?;
                out.set_header("X-Resource", "42")?;
                out.end(b"made".to_vec())?;
            }
            "/forgetful" => {
                out.set_header("X-Forgot", "1")?;
            }
            "/broken" => anyhow::bail!("backend unavailable"),
            other => {
                out.set_status(404)?;
                out.send(Body::from(format!("no route for {other}")))?;
            }
        }
        Ok(())
    }
}

async fn serve(
    cod: &CacheOnDemand,
    site: &Arc<Site>,
    request: RequestContext,
) -> Result<Response<Vec<u8>>, HandleError> {
    let mut sink = HttpResponseSink::new();
    cod.handle_with(&request, &mut sink, Arc::clone(site)).await?;
    Ok(sink.into_response())
}

fn body(response: &Response<Vec<u8>>) -> String {
    String::from_utf8_lossy(response.body()).into_owned()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_then_subsequent_requests() {
    let cod = CacheOnDemand::new();
    let site = Arc::new(Site::default());

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let cod = cod.clone();
            let site = Arc::clone(&site);
            tokio::spawn(async move { serve(&cod, &site, RequestContext::get("/welcome")).await })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response), "URL was: /welcome, work count is: 1");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
    }

    let response = serve(&cod, &site, RequestContext::get("/welcome")).await.unwrap();
    assert_eq!(body(&response), "URL was: /welcome, work count is: 2");
}

#[tokio::test]
async fn redirects_keep_their_status() {
    let cod = CacheOnDemand::new();
    let site = Arc::new(Site::default());

    for (target, expected) in [
        ("/redirect", StatusCode::FOUND),
        ("/redirect-301", StatusCode::MOVED_PERMANENTLY),
        ("/redirect-302", StatusCode::FOUND),
    ] {
        let response = serve(&cod, &site, RequestContext::get(target)).await.unwrap();
        assert_eq!(response.status(), expected, "{target}");
        assert_eq!(response.headers()[header::LOCATION], "/welcome");
        assert!(response.body().is_empty());
    }
}

#[tokio::test]
async fn status_headers_and_raw_body_are_replayed() {
    let cod = CacheOnDemand::new();
    let site = Arc::new(Site::default());

    let response = serve(&cod, &site, RequestContext::get("/created")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["x-resource"], "42");
    assert_eq!(response.body(), b"made");
}

#[tokio::test]
async fn transport_status_on_leader_sink_reaches_joiners() {
    let cod = CacheOnDemand::new();
    let site = Arc::new(Site::default());
    let request = RequestContext::get("/welcome");

    let mut leader = HttpResponseSink::new();
    leader.set_status(203).unwrap();
    let mut joiner = HttpResponseSink::new();

    let (first, second) = tokio::join!(
        cod.handle_with(&request, &mut leader, Arc::clone(&site)),
        async {
            tokio::task::yield_now().await;
            cod.handle_with(&request, &mut joiner, Arc::clone(&site)).await
        },
    );
    first.unwrap();
    second.unwrap();

    for response in [leader.into_response(), joiner.into_response()] {
        assert_eq!(response.status(), StatusCode::NON_AUTHORITATIVE_INFORMATION);
        assert_eq!(body(&response), "URL was: /welcome, work count is: 1");
    }
    assert_eq!(site.runs.count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unsafe_or_personal_requests_run_every_time() {
    let cod = CacheOnDemand::new();
    let site = Arc::new(Site::default());

    let requests = vec![
        RequestContext::new(Method::POST, "/welcome"),
        RequestContext::new(Method::POST, "/welcome"),
        RequestContext::get("/welcome").with_user("ada"),
        RequestContext::get("/welcome").with_session_entry("cart", serde_json::json!({ "items": 3 })),
    ];
    let handles: Vec<_> = requests
        .into_iter()
        .map(|request| {
            let cod = cod.clone();
            let site = Arc::clone(&site);
            tokio::spawn(async move { serve(&cod, &site, request).await })
        })
        .collect();

    let mut bodies = Vec::new();
    for handle in handles {
        bodies.push(body(&handle.await.unwrap().unwrap()));
    }
    bodies.sort();

    assert_eq!(site.runs.count(), 4);
    assert_eq!(
        bodies,
        (1..=4)
            .map(|n| format!("URL was: /welcome, work count is: {n}"))
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn missing_terminal_call_is_reported_to_every_caller() {
    let cod = CacheOnDemand::new();
    let site = Arc::new(Site::default());

    let (first, second) = tokio::join!(
        serve(&cod, &site, RequestContext::get("/forgetful")),
        serve(&cod, &site, RequestContext::get("/forgetful")),
    );

    for result in [first, second] {
        let err = result.unwrap_err();
        assert!(err.is_terminal_violation());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
    assert_eq!(site.runs.count(), 1);
}

#[tokio::test]
async fn handler_failure_leaves_caller_sink_usable() {
    let cod = CacheOnDemand::new();
    let site = Arc::new(Site::default());
    let mut sink = HttpResponseSink::new();

    let err = cod
        .handle_with(&RequestContext::get("/broken"), &mut sink, Arc::clone(&site))
        .await
        .unwrap_err();
    assert!(matches!(err, HandleError::Execution(_)));
    assert!(err.to_string().contains("backend unavailable"));

    // The transport answers with its own error page.
    assert!(!sink.is_finalized());
    sink.set_status(err.status().as_u16()).unwrap();
    sink.send(Body::from("sorry")).unwrap();
    let response = sink.into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body(&response), "sorry");
}

#[tokio::test]
async fn in_flight_limit_rejects_new_keys_only() {
    let config = CodConfig::from_toml_str("[scheduler]\nmax_in_flight = 1\n").unwrap();
    let cod = CacheOnDemand::from_config(config);
    let site = Arc::new(Site::default());

    let (first, joined, other) = tokio::join!(
        serve(&cod, &site, RequestContext::get("/welcome")),
        serve(&cod, &site, RequestContext::get("/welcome")),
        serve(&cod, &site, RequestContext::get("/missing")),
    );

    assert_eq!(body(&first.unwrap()), "URL was: /welcome, work count is: 1");
    assert_eq!(body(&joined.unwrap()), "URL was: /welcome, work count is: 1");
    let err = other.unwrap_err();
    assert!(matches!(err, HandleError::MaxInFlight { limit: 1 }));
    assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
}
