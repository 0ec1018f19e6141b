//! Full pipeline runs, without a socket.

use bytes::Bytes;
use http::{Method, StatusCode};
use portcullis_core::{
    done, output, Args, GateError, Handler, Output, Phase, RequestContext, RouteTable, Scope,
    SetCookie,
};
use portcullis_pipeline::Pipeline;
use portcullis_render::{
    default_error_output, Rendered, Renderer, ResponseBody, SendHandler,
};
use portcullis_router::{ParamType, ParamValue};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Registration surface mirroring an application: the built-in error
/// handler first, then whatever the test attaches.
struct TestApp {
    table: RouteTable,
    send: Arc<dyn SendHandler>,
    send_error: Arc<dyn SendHandler>,
}

impl TestApp {
    fn new() -> Self {
        let mut app = Self {
            table: RouteTable::new(),
            send: Arc::new(Renderer::default()),
            send_error: Arc::new(Renderer::default()),
        };
        app.on(Phase::Error, None, &[], default_error_output);
        app
    }

    fn on(
        &mut self,
        phase: Phase,
        spec: Option<&str>,
        bindings: &[&str],
        handler: impl Handler + 'static,
    ) {
        use portcullis_router::RoutePattern;
        self.table.register(
            phase,
            portcullis_core::RouteEntry {
                pattern: Arc::new(RoutePattern::compile(spec).unwrap()),
                bindings: bindings.iter().map(|s| (*s).to_string()).collect(),
                handler: Arc::new(handler),
            },
        );
    }

    fn pipeline(self) -> Pipeline {
        Pipeline::new(Arc::new(self.table), self.send, self.send_error)
    }
}

async fn run(pipeline: &Pipeline, method: Method, path: &str) -> Rendered {
    let scope = RequestContext::new(method, path).into_scope();
    pipeline.run(scope).await
}

fn body_str(rendered: &Rendered) -> &str {
    match &rendered.body {
        ResponseBody::Buffered(bytes) => std::str::from_utf8(bytes).unwrap(),
        ResponseBody::Streamed(_) => panic!("expected a buffered body"),
    }
}

#[tokio::test]
async fn test_typed_route_match_and_miss() {
    let mut app = TestApp::new();
    app.on(
        Phase::Process,
        Some("GET /article/<title:string>"),
        &["title"],
        |_: Scope, args: Args| async move {
            output(format!("Article: {}", args.str("title").unwrap()))
        },
    );
    let pipeline = app.pipeline();

    let ok = run(&pipeline, Method::GET, "/article/testarticle").await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(body_str(&ok), "Article: testarticle");

    // Multi-segment paths do not match a string placeholder.
    let miss = run(&pipeline, Method::GET, "/article/lorem/ipsum").await;
    assert_eq!(miss.status, StatusCode::NOT_FOUND);
    assert_eq!(body_str(&miss), r#"{"errors":["Not found"]}"#);

    let wrong_method = run(&pipeline, Method::POST, "/article/testarticle").await;
    assert_eq!(wrong_method.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unmatched_request_gets_canned_404() {
    let pipeline = TestApp::new().pipeline();
    let rendered = run(&pipeline, Method::GET, "/nowhere").await;
    assert_eq!(rendered.status, StatusCode::NOT_FOUND);
    assert_eq!(rendered.header("Content-Type"), Some("application/json"));
    assert_eq!(body_str(&rendered), r#"{"errors":["Not found"]}"#);
}

#[tokio::test]
async fn test_authentication_failure_maps_to_401() {
    let mut app = TestApp::new();
    app.on(
        Phase::Authentication,
        Some("GET /private"),
        &[],
        |_: Scope, _: Args| async { Err(GateError::authentication("no token")) },
    );
    app.on(
        Phase::Process,
        Some("GET /private"),
        &[],
        |_: Scope, _: Args| async { output("secret") },
    );
    let pipeline = app.pipeline();

    let rendered = run(&pipeline, Method::GET, "/private").await;
    assert_eq!(rendered.status, StatusCode::UNAUTHORIZED);
    assert_eq!(body_str(&rendered), r#"{"errors":["Authentication required"]}"#);
}

#[tokio::test]
async fn test_authorisation_failure_maps_to_403() {
    let mut app = TestApp::new();
    app.on(
        Phase::Authorisation,
        None,
        &[],
        |_: Scope, _: Args| async { Err(GateError::authorization("not allowed")) },
    );
    let pipeline = app.pipeline();
    let rendered = run(&pipeline, Method::GET, "/anything").await;
    assert_eq!(rendered.status, StatusCode::FORBIDDEN);
    assert_eq!(body_str(&rendered), r#"{"errors":["Permission denied"]}"#);
}

#[tokio::test]
async fn test_prevalidation_failure_maps_to_400() {
    let mut app = TestApp::new();
    app.on(
        Phase::Prevalidation,
        Some("POST /submit"),
        &[],
        |_: Scope, _: Args| async { Err(GateError::validation("bad input")) },
    );
    app.on(
        Phase::Process,
        Some("POST /submit"),
        &[],
        |_: Scope, _: Args| async { output("ok") },
    );
    let pipeline = app.pipeline();
    let rendered = run(&pipeline, Method::POST, "/submit").await;
    assert_eq!(rendered.status, StatusCode::BAD_REQUEST);
    assert_eq!(body_str(&rendered), r#"{"errors":["Bad request"]}"#);
}

#[tokio::test]
async fn test_handler_raised_status_survives_failure() {
    let mut app = TestApp::new();
    app.on(
        Phase::Process,
        Some("GET /locked"),
        &["request"],
        |_: Scope, args: Args| async move {
            args.scope("request")
                .unwrap()
                .lock()
                .set_status(StatusCode::FORBIDDEN);
            Err(GateError::internal("boom"))
        },
    );
    let pipeline = app.pipeline();
    let rendered = run(&pipeline, Method::GET, "/locked").await;
    // The phase would imply 500, but the staged 403 is out of the
    // success range and sticks.
    assert_eq!(rendered.status, StatusCode::FORBIDDEN);
    assert_eq!(body_str(&rendered), r#"{"errors":["Permission denied"]}"#);
}

#[tokio::test]
async fn test_extra_parameter_shadows_path_parameter() {
    let mut app = TestApp::new();
    app.on(
        Phase::Preprocess,
        Some("GET /item/<name:string>"),
        &["request"],
        |_: Scope, args: Args| async move {
            let scope = args.scope("request").unwrap();
            scope.lock().set_parameter("name", "bar");
            done()
        },
    );
    app.on(
        Phase::Process,
        Some("GET /item/<name:string>"),
        &["name"],
        |_: Scope, args: Args| async move { output(args.str("name").unwrap().to_string()) },
    );
    let pipeline = app.pipeline();
    let rendered = run(&pipeline, Method::GET, "/item/baz").await;
    assert_eq!(body_str(&rendered), "bar");
}

#[tokio::test]
async fn test_request_binding_is_the_scope_unless_shadowed() {
    let mut app = TestApp::new();
    app.on(
        Phase::Process,
        Some("GET /scope"),
        &["request"],
        |_: Scope, args: Args| async move {
            assert!(args.scope("request").is_some());
            output("bound scope")
        },
    );
    app.on(
        Phase::Process,
        Some("GET /shadow/<request:string>"),
        &["request"],
        |_: Scope, args: Args| async move {
            // The path parameter wins over the scope binding.
            output(args.str("request").unwrap().to_string())
        },
    );
    let pipeline = app.pipeline();

    assert_eq!(
        body_str(&run(&pipeline, Method::GET, "/scope").await),
        "bound scope"
    );
    assert_eq!(
        body_str(&run(&pipeline, Method::GET, "/shadow/literal").await),
        "literal"
    );
}

#[tokio::test]
async fn test_output_variant_picks_content_type() {
    let mut app = TestApp::new();
    app.on(
        Phase::Process,
        Some("GET /text"),
        &[],
        |_: Scope, _: Args| async { output("<p>hi</p>") },
    );
    app.on(
        Phase::Process,
        Some("GET /bytes"),
        &[],
        |_: Scope, _: Args| async { output(Bytes::from_static(&[1, 2, 3])) },
    );
    app.on(
        Phase::Process,
        Some("GET /json"),
        &[],
        |_: Scope, _: Args| async { output(json!({"a": 1})) },
    );
    let pipeline = app.pipeline();

    let text = run(&pipeline, Method::GET, "/text").await;
    assert_eq!(text.header("Content-Type"), Some("text/html; charset=utf-8"));
    assert_eq!(text.header("X-Frame-Options"), Some("deny"));
    assert_eq!(text.header("X-Content-Type-Options"), Some("nosniff"));

    let bytes = run(&pipeline, Method::GET, "/bytes").await;
    assert_eq!(
        bytes.header("Content-Type"),
        Some("application/octet-stream")
    );
    assert_eq!(bytes.header("X-Frame-Options"), None);

    let json_res = run(&pipeline, Method::GET, "/json").await;
    assert_eq!(json_res.header("Content-Type"), Some("application/json"));
    assert_eq!(body_str(&json_res), r#"{"a":1}"#);
}

#[tokio::test]
async fn test_explicit_mime_override() {
    let mut app = TestApp::new();
    app.on(
        Phase::Process,
        Some("GET /plain"),
        &["request"],
        |_: Scope, args: Args| async move {
            args.scope("request").unwrap().lock().set_mime("text/plain");
            output("just text")
        },
    );
    let pipeline = app.pipeline();
    let rendered = run(&pipeline, Method::GET, "/plain").await;
    assert_eq!(
        rendered.header("Content-Type"),
        Some("text/plain; charset=utf-8")
    );
    assert_eq!(rendered.header("X-Frame-Options"), None);
}

#[tokio::test]
async fn test_repeated_runs_share_no_state() {
    let mut app = TestApp::new();
    app.on(
        Phase::Process,
        Some("GET /count/<n:int>"),
        &["n", "request"],
        |_: Scope, args: Args| async move {
            args.scope("request")
                .unwrap()
                .lock()
                .set_header("X-Seen", "yes")?;
            output(format!("n={}", args.i64("n").unwrap()))
        },
    );
    let pipeline = app.pipeline();

    let first = run(&pipeline, Method::GET, "/count/1").await;
    assert_eq!(body_str(&first), "n=1");
    let second = run(&pipeline, Method::GET, "/count/2").await;
    assert_eq!(body_str(&second), "n=2");
    assert_eq!(second.header("X-Seen"), Some("yes"));
    let miss = run(&pipeline, Method::GET, "/count/0").await;
    assert_eq!(miss.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_request_scoped_route_registration() {
    let mut app = TestApp::new();
    app.on(
        Phase::Initialize,
        Some("GET /late"),
        &["request"],
        |_: Scope, args: Args| async move {
            args.scope("request")
                .unwrap()
                .lock()
                .on(
                    Phase::Process,
                    Some("GET /late"),
                    &[],
                    |_: Scope, _: Args| async { output("registered late") },
                )?;
            done()
        },
    );
    let pipeline = app.pipeline();

    let rendered = run(&pipeline, Method::GET, "/late").await;
    assert_eq!(body_str(&rendered), "registered late");
    // The overlay does not leak into the next request.
    let other = run(&pipeline, Method::GET, "/other").await;
    assert_eq!(other.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_custom_error_handler_overrides_canned_body() {
    let mut app = TestApp::new();
    app.on(
        Phase::Error,
        None,
        &["request"],
        |_: Scope, args: Args| async move {
            args.scope("request")
                .unwrap()
                .lock()
                .set_status(StatusCode::BAD_REQUEST);
            output("Error!")
        },
    );
    let pipeline = app.pipeline();
    let rendered = run(&pipeline, Method::GET, "/nowhere").await;
    assert_eq!(rendered.status, StatusCode::BAD_REQUEST);
    assert_eq!(body_str(&rendered), "Error!");
}

#[tokio::test]
async fn test_appended_headers_are_sent_per_value() {
    let mut app = TestApp::new();
    app.on(
        Phase::Process,
        Some("GET /multi"),
        &["request"],
        |_: Scope, args: Args| async move {
            let scope = args.scope("request").unwrap();
            let mut ctx = scope.lock();
            ctx.append_header("x-test", "a")?;
            ctx.append_header("x-test", "b")?;
            drop(ctx);
            output("ok")
        },
    );
    let pipeline = app.pipeline();
    let rendered = run(&pipeline, Method::GET, "/multi").await;
    let values: Vec<&str> = rendered
        .headers
        .iter()
        .filter(|(n, _)| n == "X-Test")
        .map(|(_, v)| v.as_str())
        .collect();
    assert_eq!(values, vec!["a", "b"]);
}

#[tokio::test]
async fn test_header_injection_attempt_is_a_500() {
    let mut app = TestApp::new();
    app.on(
        Phase::Process,
        Some("GET /inject"),
        &["request"],
        |_: Scope, args: Args| async move {
            args.scope("request")
                .unwrap()
                .lock()
                .set_header("X-Test", "bad\r\nX-Sneaky: 1")?;
            output("never sent")
        },
    );
    let pipeline = app.pipeline();
    let rendered = run(&pipeline, Method::GET, "/inject").await;
    assert_eq!(rendered.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_str(&rendered), r#"{"errors":["Internal server error"]}"#);
}

#[tokio::test]
async fn test_percent_decoding_and_malformed_escapes() {
    let mut app = TestApp::new();
    app.on(
        Phase::Process,
        Some("GET /article/<title:string>"),
        &["title"],
        |_: Scope, args: Args| async move { output(args.str("title").unwrap().to_string()) },
    );
    let pipeline = app.pipeline();

    let decoded = run(&pipeline, Method::GET, "/article/Lorem%20ipsum").await;
    assert_eq!(body_str(&decoded), "Lorem ipsum");

    // A malformed escape makes the entry a non-match.
    let malformed = run(&pipeline, Method::GET, "/article/bad%2-escape").await;
    assert_eq!(malformed.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_trailing_slashes_are_canonicalized() {
    let mut app = TestApp::new();
    app.on(
        Phase::Process,
        Some("GET /page"),
        &[],
        |_: Scope, _: Args| async { output("page") },
    );
    let pipeline = app.pipeline();
    let rendered = run(&pipeline, Method::GET, "/page///").await;
    assert_eq!(rendered.status, StatusCode::OK);
    assert_eq!(body_str(&rendered), "page");
}

#[tokio::test]
async fn test_uuid_parameter_is_lowercased() {
    let mut app = TestApp::new();
    app.on(
        Phase::Process,
        Some("GET /by-uuid/<id:uuid>"),
        &["id"],
        |_: Scope, args: Args| async move {
            output(args.value("id").unwrap().to_string())
        },
    );
    let pipeline = app.pipeline();
    let rendered = run(
        &pipeline,
        Method::GET,
        "/by-uuid/3D7FD040-7054-4075-B68F-CE6099E9E6BF",
    )
    .await;
    assert_eq!(body_str(&rendered), "3d7fd040-7054-4075-b68f-ce6099e9e6bf");
}

#[tokio::test]
async fn test_sequential_phases_run_in_registration_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut app = TestApp::new();
    for label in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        app.on(
            Phase::Preprocess,
            None,
            &[],
            move |_: Scope, _: Args| {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push(label);
                    done()
                }
            },
        );
    }
    app.on(Phase::Process, None, &[], |_: Scope, _: Args| async {
        output("done")
    });
    let pipeline = app.pipeline();
    run(&pipeline, Method::GET, "/").await;
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
}

#[tokio::test(start_paused = true)]
async fn test_fan_out_phase_runs_handlers_concurrently() {
    let mut app = TestApp::new();
    for _ in 0..4 {
        app.on(Phase::Prevalidation, None, &[], |_: Scope, _: Args| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            done()
        });
    }
    app.on(Phase::Process, None, &[], |_: Scope, _: Args| async {
        output("ok")
    });
    let pipeline = app.pipeline();

    let started = tokio::time::Instant::now();
    let rendered = run(&pipeline, Method::GET, "/").await;
    let elapsed = started.elapsed();

    assert_eq!(rendered.status, StatusCode::OK);
    // Four 50ms handlers dispatched together finish in one 50ms step;
    // run one at a time they would need 200ms.
    assert!(elapsed < Duration::from_millis(100), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn test_fan_out_failure_uses_first_error_in_order() {
    let mut app = TestApp::new();
    app.on(Phase::Prevalidation, None, &[], |_: Scope, _: Args| async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Err(GateError::validation("first"))
    });
    app.on(Phase::Prevalidation, None, &[], |_: Scope, _: Args| async {
        Err(GateError::internal("second"))
    });
    app.on(Phase::Process, None, &[], |_: Scope, _: Args| async {
        output("unreachable")
    });
    let pipeline = app.pipeline();
    let rendered = run(&pipeline, Method::GET, "/").await;
    // The first registered failure decides, even though the second
    // finished earlier.
    assert_eq!(rendered.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_after_phases_follow_their_track() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut app = TestApp::new();
    {
        let seen = Arc::clone(&seen);
        app.on(Phase::After, None, &[], move |_: Scope, _: Args| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push("after");
                done()
            }
        });
    }
    {
        let seen = Arc::clone(&seen);
        app.on(Phase::AfterError, None, &[], move |_: Scope, _: Args| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push("aftererror");
                done()
            }
        });
    }
    app.on(
        Phase::Process,
        Some("GET /ok"),
        &[],
        |_: Scope, _: Args| async { output("ok") },
    );
    let pipeline = app.pipeline();

    run(&pipeline, Method::GET, "/ok").await;
    assert_eq!(*seen.lock().unwrap(), vec!["after"]);

    seen.lock().unwrap().clear();
    run(&pipeline, Method::GET, "/missing").await;
    assert_eq!(*seen.lock().unwrap(), vec!["aftererror"]);
}

#[tokio::test]
async fn test_after_failure_keeps_the_rendered_response() {
    let cleanup_ran = Arc::new(Mutex::new(false));
    let mut app = TestApp::new();
    app.on(
        Phase::Process,
        Some("GET /ok"),
        &[],
        |_: Scope, _: Args| async { output("ok") },
    );
    app.on(Phase::After, None, &[], |_: Scope, _: Args| async {
        Err(GateError::internal("cleanup failed"))
    });
    {
        let cleanup_ran = Arc::clone(&cleanup_ran);
        app.on(Phase::AfterError, None, &[], move |_: Scope, _: Args| {
            let cleanup_ran = Arc::clone(&cleanup_ran);
            async move {
                *cleanup_ran.lock().unwrap() = true;
                done()
            }
        });
    }
    let pipeline = app.pipeline();

    let rendered = run(&pipeline, Method::GET, "/ok").await;
    // The response was produced before the failure and goes out as-is.
    assert_eq!(rendered.status, StatusCode::OK);
    assert_eq!(body_str(&rendered), "ok");
    // The run still diverts, so error-track cleanup gets its turn.
    assert!(*cleanup_ran.lock().unwrap());
}

#[tokio::test]
async fn test_later_process_handler_keeps_earlier_output_when_silent() {
    let mut app = TestApp::new();
    app.on(Phase::Process, Some("GET /x"), &[], |_: Scope, _: Args| async {
        output("first")
    });
    app.on(Phase::Process, Some("GET /x"), &[], |_: Scope, _: Args| async {
        done()
    });
    let pipeline = app.pipeline();
    let rendered = run(&pipeline, Method::GET, "/x").await;
    assert_eq!(body_str(&rendered), "first");
}

#[tokio::test]
async fn test_initialize_failure_is_a_500() {
    let mut app = TestApp::new();
    app.on(Phase::Initialize, None, &[], |_: Scope, _: Args| async {
        Err(GateError::internal("setup failed"))
    });
    app.on(Phase::Process, None, &[], |_: Scope, _: Args| async {
        output("unreachable")
    });
    let pipeline = app.pipeline();
    let rendered = run(&pipeline, Method::GET, "/").await;
    assert_eq!(rendered.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_str(&rendered), r#"{"errors":["Internal server error"]}"#);
}

#[tokio::test]
async fn test_custom_send_slot() {
    let mut app = TestApp::new();
    app.on(Phase::Process, None, &[], |_: Scope, _: Args| async {
        output("ignored by custom send")
    });
    app.send = Arc::new(|scope: Scope| async move {
        let status = scope.lock().status();
        Ok(Rendered {
            status,
            headers: vec![("X-Custom".to_string(), "1".to_string())],
            body: ResponseBody::Buffered(Bytes::from_static(b"custom")),
        })
    });
    let pipeline = app.pipeline();
    let rendered = run(&pipeline, Method::GET, "/").await;
    assert_eq!(rendered.header("X-Custom"), Some("1"));
    assert_eq!(body_str(&rendered), "custom");
}

#[tokio::test]
async fn test_typed_query_and_cookie_access_from_a_handler() {
    let mut app = TestApp::new();
    app.on(
        Phase::Process,
        Some("GET /search"),
        &["request"],
        |_: Scope, args: Args| async move {
            let scope = args.scope("request").unwrap();
            let ctx = scope.lock();
            let page = ctx.get_query_or("page", ParamType::Int, ParamValue::Int(1));
            let session = ctx.get_cookie("session", ParamType::Alphanum);
            drop(ctx);
            output(format!("page={page} session={:?}", session.map(|s| s.to_string())))
        },
    );
    let pipeline = app.pipeline();

    let scope = RequestContext::new(Method::GET, "/search")
        .with_query_pairs(vec![("page".to_string(), "3".to_string())])
        .with_cookies(indexmap_from(&[("session", "abc123")]))
        .into_scope();
    let rendered = pipeline.run(scope).await;
    assert_eq!(body_str(&rendered), "page=3 session=Some(\"abc123\")");
}

fn indexmap_from(pairs: &[(&str, &str)]) -> indexmap::IndexMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[tokio::test]
async fn test_set_cookie_reaches_the_response() {
    let mut app = TestApp::new();
    app.on(
        Phase::Process,
        Some("GET /login"),
        &["request"],
        |_: Scope, args: Args| async move {
            args.scope("request")
                .unwrap()
                .lock()
                .set_cookie(SetCookie::new("foo", "bar"))?;
            output("welcome")
        },
    );
    let pipeline = app.pipeline();
    let rendered = run(&pipeline, Method::GET, "/login").await;
    assert_eq!(rendered.header("Set-Cookie"), Some("foo=bar; HttpOnly"));
}

#[tokio::test]
async fn test_streamed_output_passes_through() {
    let mut app = TestApp::new();
    app.on(
        Phase::Process,
        Some("GET /stream"),
        &[],
        |_: Scope, _: Args| async {
            let chunks = futures_util::stream::iter(vec![
                Ok(Bytes::from_static(b"part1")),
                Ok(Bytes::from_static(b"part2")),
            ]);
            Ok(Some(Output::Stream(Box::pin(chunks))))
        },
    );
    let pipeline = app.pipeline();
    let rendered = run(&pipeline, Method::GET, "/stream").await;
    assert_eq!(
        rendered.header("Content-Type"),
        Some("application/octet-stream")
    );
    assert!(matches!(rendered.body, ResponseBody::Streamed(_)));
}
