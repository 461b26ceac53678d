//! A minimal "Hello, World!" server.
//!
//! Responds with "Hello, World!" on `/` and logs every request.

use muxkit::logging::{init_logging, Environment};
use muxkit::{Options, RequestId, Server, ServerError};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    init_logging(Environment::Dev, "info")?;

    let mut app = Server::new(Options {
        port: 3000,
        log_requests: true,
        ..Options::default()
    });
    app.middleware(RequestId);

    app.get("/{$}", |ctx| async move {
        ctx.string(200, "Hello, World!");
        Ok(())
    });

    app.run().await
}
