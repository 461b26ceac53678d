use muxkit::{
    arg, json, JsonResponse, MemoryStore, Method, Options, RenderOpt, Request, RequestId, Response,
    Server, SessionManager, TemplateOptions, Templates,
};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn templates(dir: &TempDir) -> Arc<Templates> {
    fs::write(dir.path().join("hello.html"), "<p>Hello {{ name }}</p>").unwrap();
    fs::write(dir.path().join("layout.html"), "<main>{{ content }}</main>").unwrap();
    fs::write(dir.path().join("500.page.html"), "<h1>Oops: {{ msg }}</h1>").unwrap();
    Arc::new(Templates::new(TemplateOptions {
        root: dir.path().to_path_buf(),
        ext: ".html".to_string(),
    }))
}

async fn run(server: &mut Server, req: Request) -> Response {
    server.route().unwrap();
    server.dispatch(req).await
}

fn json_body(response: &Response) -> serde_json::Value {
    serde_json::from_slice(&response.body).unwrap()
}

#[tokio::test]
async fn handler_error_on_json_request_gets_server_envelope() {
    let mut server = Server::new(Options::default());
    server.middleware(RequestId);
    server.post("/orders", |_ctx| async move {
        anyhow::bail!("inventory unavailable");
    });

    let req = Request::new(Method::POST, "/orders").with_body("application/json", "{}");
    let response = run(&mut server, req).await;

    assert_eq!(response.status, 500);
    let body = json_body(&response);
    assert_eq!(body["Status"], 500);
    assert_eq!(body["ErrorType"], "server");
    assert_eq!(body["Error"]["msg"], "inventory unavailable");
    assert_eq!(
        body["Error"]["requestID"],
        response.get_header("X-Request-ID").unwrap()
    );
}

#[tokio::test]
async fn second_error_dispatch_is_ignored() {
    let mut server = Server::new(Options::default());
    server.post("/twice", |ctx| async move {
        ctx.error(409, "first", vec![arg("field", "email")]).unwrap();
        assert!(ctx.is_error_dispatched());
        ctx.error(500, "second", Vec::new()).unwrap();
        Ok(())
    });

    let req = Request::new(Method::POST, "/twice").with_body("application/json", "{}");
    let response = run(&mut server, req).await;

    assert_eq!(response.status, 409);
    let body = json_body(&response);
    assert_eq!(body["ErrorType"], "server");
    assert_eq!(body["Error"]["msg"], "first");
    assert_eq!(body["Error"]["args"][0]["Key"], "field");
    assert_eq!(body["Error"]["args"][0]["Value"], "email");
}

#[tokio::test]
async fn error_func_replaces_default_dispatch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let mut server = Server::new(Options {
        error_func: Some(Arc::new(move |ctx: &muxkit::Context, err: anyhow::Error| {
            seen.fetch_add(1, Ordering::SeqCst);
            ctx.string(418, &format!("custom: {err}"));
        })),
        ..Options::default()
    });
    server.get("/fail", |_ctx| async move { Err(anyhow::anyhow!("nope")) });
    server.get("/panic", |_ctx| async move {
        let empty: Vec<u8> = Vec::new();
        let _ = empty[3];
        Ok(())
    });
    server.route().unwrap();

    let response = server.dispatch(Request::new(Method::GET, "/fail")).await;
    assert_eq!(response.status, 418);
    assert_eq!(response.body_string(), "custom: nope");

    let response = server.dispatch(Request::new(Method::GET, "/panic")).await;
    assert_eq!(response.status, 418);
    assert!(response.body_string().starts_with("custom: panic"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn panic_without_error_func_is_bare_500() {
    let mut server = Server::new(Options::default());
    server.get("/panic", |_ctx| async move {
        if true {
            panic!("handler exploded");
        }
        Ok(())
    });

    let response = run(&mut server, Request::new(Method::GET, "/panic")).await;
    assert_eq!(response.status, 500);
    assert_eq!(response.body_string(), "Internal Server Error\n");
}

#[tokio::test]
async fn render_with_layout_and_error_page() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new(Options {
        renderer: Some(templates(&dir)),
        ..Options::default()
    });
    server.get("/hello", |ctx| async move {
        let opts = RenderOpt::template("hello")
            .with_layout("layout")
            .with_data(json!({"name": "<Ann>"}));
        ctx.render(200, opts)?;
        Ok(())
    });
    server.get("/broken", |_ctx| async move { Err(anyhow::anyhow!("db down")) });
    server.route().unwrap();

    let response = server.dispatch(Request::new(Method::GET, "/hello")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.get_header("Content-Type"), Some("text/html; charset=utf-8"));
    assert_eq!(response.body_string(), "<main><p>Hello &lt;Ann&gt;</p></main>");

    let response = server.dispatch(Request::new(Method::GET, "/broken")).await;
    assert_eq!(response.status, 500);
    assert_eq!(response.body_string(), "<h1>Oops: db down</h1>");
}

#[tokio::test]
async fn missing_error_page_still_writes_status() {
    let mut server = Server::new(Options::default());
    server.get("/gone", |ctx| async move {
        let result = ctx.error(410, "gone for good", Vec::new());
        assert!(result.unwrap_err().to_string().contains("failed to render error page"));
        Ok(())
    });

    let response = run(&mut server, Request::new(Method::GET, "/gone")).await;
    assert_eq!(response.status, 410);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn hx_error_replaces_pending_trigger() {
    let mut server = Server::new(Options::default());
    server.get("/partial", |ctx| async move {
        ctx.trigger().add_event("saved");
        anyhow::bail!("validation failed");
    });
    server.get("/ok", |ctx| async move {
        ctx.trigger().add_event("saved");
        ctx.string(200, "ok");
        Ok(())
    });
    server.route().unwrap();

    let req = Request::new(Method::GET, "/partial").with_header("HX-Request", "true");
    let response = server.dispatch(req).await;
    assert_eq!(response.status, 500);
    assert_eq!(response.get_header("HX-Trigger"), None);
    let event: serde_json::Value =
        serde_json::from_str(response.get_header("HX-Trigger-After-Swap").unwrap()).unwrap();
    assert_eq!(event["serverCtxError"]["code"], 500);
    assert_eq!(event["serverCtxError"]["msg"], "validation failed");

    let req = Request::new(Method::GET, "/ok").with_header("HX-Request", "true");
    let response = server.dispatch(req).await;
    assert_eq!(response.get_header("HX-Trigger"), Some(r#"{"saved":null}"#));
}

#[tokio::test]
async fn redirect_depends_on_request_kind() {
    let mut server = Server::new(Options::default());
    server.post("/login", |ctx| async move {
        ctx.redirect("/home");
        Ok(())
    });
    server.route().unwrap();

    let response = server.dispatch(Request::new(Method::POST, "/login")).await;
    assert_eq!(response.status, 303);
    assert_eq!(response.get_header("Location"), Some("/home"));

    let req = Request::new(Method::POST, "/login").with_header("HX-Request", "true");
    let response = server.dispatch(req).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.get_header("HX-Redirect"), Some("/home"));
    assert_eq!(response.get_header("Location"), None);
}

#[tokio::test]
async fn renderer_missing_is_an_error() {
    let mut server = Server::new(Options::default());
    server.get("/page", |ctx| async move {
        let err = ctx.render(200, RenderOpt::template("page")).unwrap_err();
        ctx.string(200, &err.to_string());
        Ok(())
    });

    let response = run(&mut server, Request::new(Method::GET, "/page")).await;
    assert_eq!(response.body_string(), "templates renderer not provided");
}

#[tokio::test]
async fn session_cookie_round_trip() {
    let sessions = SessionManager::new(MemoryStore::new(16, Duration::from_secs(60)))
        .cookie_name("sid");
    let mut server = Server::new(Options {
        sessions: Some(Arc::new(sessions)),
        ..Options::default()
    });
    server.post("/login", |ctx| async move {
        let user = ctx.param("user");
        if let Some(session) = ctx.session() {
            session.put("user", &user);
        }
        ctx.status(204);
        Ok(())
    });
    server.get("/me", |ctx| async move {
        let user = ctx
            .session()
            .and_then(|session| session.get("user"))
            .and_then(|user| user.as_str().map(str::to_string))
            .unwrap_or_default();
        ctx.string(200, &user);
        Ok(())
    });
    server.route().unwrap();

    let login = Request::new(Method::POST, "/login")
        .with_body("application/x-www-form-urlencoded", "user=ann");
    let response = server.dispatch(login).await;
    assert_eq!(response.status, 204);
    let cookie = response.get_header("Set-Cookie").unwrap().to_string();
    assert!(cookie.starts_with("sid="));
    let pair = cookie.split(';').next().unwrap();

    let me = Request::new(Method::GET, "/me").with_header("Cookie", pair);
    let response = server.dispatch(me).await;
    assert_eq!(response.body_string(), "ann");
    assert_eq!(response.get_header("Set-Cookie"), None);
}

#[tokio::test]
async fn session_is_absent_without_manager() {
    let mut server = Server::new(Options::default());
    server.get("/", |ctx| async move {
        ctx.string(200, if ctx.session().is_none() { "none" } else { "some" });
        Ok(())
    });

    let response = run(&mut server, Request::new(Method::GET, "/")).await;
    assert_eq!(response.body_string(), "none");
}

#[tokio::test]
async fn params_read_path_form_and_query() {
    let mut server = Server::new(Options::default());
    server.post("/users/{id}", |ctx| async move {
        let reply = format!(
            "{} {} {} [{}]",
            ctx.url_param("id"),
            ctx.param("name"),
            ctx.param("page"),
            ctx.url_param("missing")
        );
        ctx.string(200, &reply);
        Ok(())
    });

    let req = Request::new(Method::POST, "/users/7?page=2&name=query")
        .with_body("application/x-www-form-urlencoded", "name=form+value");
    let response = run(&mut server, req).await;
    assert_eq!(response.body_string(), "7 form value 2 []");
}

#[tokio::test]
async fn json_envelope_derives_error_type() {
    let mut server = Server::new(Options::default());
    server.get("/ok", |ctx| async move {
        ctx.json(200, JsonResponse::data(200, json!({"id": 1})))?;
        Ok(())
    });
    server.get("/bad", |ctx| async move {
        let mut error = serde_json::Map::new();
        error.insert("field".to_string(), json!("missing"));
        ctx.json(422, JsonResponse::error(422, error))?;
        Ok(())
    });
    server.route().unwrap();

    let response = server.dispatch(Request::new(Method::GET, "/ok")).await;
    assert_eq!(response.get_header("Content-Type"), Some("application/json"));
    assert!(response.body_string().ends_with('\n'));
    let body = json_body(&response);
    assert_eq!(body["Data"]["id"], 1);
    assert_eq!(body["ErrorType"], "");

    let response = server.dispatch(Request::new(Method::GET, "/bad")).await;
    assert_eq!(response.status, 422);
    assert_eq!(json_body(&response)["ErrorType"], "application");
}

#[tokio::test]
async fn route_name_is_reachable_from_context() {
    let mut server = Server::new(Options::default());
    server.handle_fn_with(
        "GET /users/{id}",
        |ctx| async move {
            let link = ctx.route_name("user", &["id", "9"]);
            ctx.string(200, &link);
            Ok(())
        },
        muxkit::with_name("user"),
    );

    let response = run(&mut server, Request::new(Method::GET, "/users/1")).await;
    assert_eq!(response.body_string(), "/users/9");
}

#[tokio::test]
async fn render_not_done_leaves_status_and_content_type_to_the_handler() {
    let dir = TempDir::new().unwrap();
    let mut server = Server::new(Options {
        renderer: Some(templates(&dir)),
        ..Options::default()
    });
    server.post("/items", |ctx| async move {
        let opts = RenderOpt {
            template: "<li>{{ name }}</li>".to_string(),
            render_as_string: true,
            not_done: true,
            data: json!({"name": "first"}),
            ..RenderOpt::default()
        };
        ctx.render(200, opts)?;
        ctx.status(201);
        ctx.response().write(b"<li>second</li>");
        Ok(())
    });

    let response = run(&mut server, Request::new(Method::POST, "/items")).await;
    assert_eq!(response.status, 201);
    assert_eq!(response.get_header("Content-Type"), None);
    assert_eq!(response.body_string(), "<li>first</li><li>second</li>");
}
