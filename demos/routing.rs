//! Routing example
//!
//! Shows method patterns, path parameters, groups and named routes:
//!
//! ```text
//! curl localhost:3000/users/42
//! curl -X POST -H 'Content-Type: application/json' -d '{"name":"ann","role":"admin"}' localhost:3000/users
//! curl localhost:3000/api/status
//! ```

use anyhow::Context as _;
use muxkit::logging::{init_logging, Environment};
use muxkit::{json, with_name, JsonResponse, Options, Server, ServerError};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct User {
    name: String,
    role: String,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    init_logging(Environment::Dev, "debug")?;
    let mut app = Server::new(Options {
        port: 3000,
        ..Options::default()
    });

    app.get("/{$}", |ctx| async move {
        let profile = ctx.route_name("userProfile", &["id", "42"]);
        ctx.string(200, &format!("Welcome! Try {profile}"));
        Ok(())
    });

    app.handle_fn_with(
        "GET /users/{id}",
        |ctx| async move {
            let id = ctx.url_param("id");
            ctx.string(200, &format!("User ID: {id}"));
            Ok(())
        },
        with_name("userProfile"),
    );

    app.post("/users", |ctx| async move {
        let user: User = ctx
            .request()
            .body
            .json()
            .context("invalid JSON body")?;
        ctx.json(201, JsonResponse::data(201, &user))?;
        Ok(())
    });

    app.group("/api", "api", |api| {
        api.handle_fn_with(
            "GET /status",
            |ctx| async move {
                ctx.json(200, JsonResponse::data(200, json!({"status": "operational"})))?;
                Ok(())
            },
            with_name("status"),
        );
    });

    println!("status lives at {}", app.route_name("api/status", &[]));
    app.run().await
}
