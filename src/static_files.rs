use crate::error::ServerError;
use crate::handler::{Handler, HttpResponse};
use crate::http::{Method, Request, Response};
use futures::future::BoxFuture;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// Serves files below `root` for GET and HEAD. Directories serve their
/// `index.html`.
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a URL path onto the root, refusing anything that could climb out.
    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        for component in Path::new(url_path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(segment) => path.push(segment),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(path)
    }

    fn content_type(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
            .as_str()
        {
            "html" | "htm" => "text/html; charset=utf-8",
            "css" => "text/css; charset=utf-8",
            "js" | "mjs" => "text/javascript; charset=utf-8",
            "json" => "application/json",
            "txt" => "text/plain; charset=utf-8",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "svg" => "image/svg+xml",
            "ico" => "image/x-icon",
            "webp" => "image/webp",
            "woff2" => "font/woff2",
            _ => "application/octet-stream",
        }
    }

    async fn serve(root: StaticFiles, req: Request) -> HttpResponse {
        if !matches!(req.method, Method::GET | Method::HEAD) {
            return Err(ServerError::MethodNotAllowed(vec![Method::GET, Method::HEAD]));
        }

        let decoded = urlencoding::decode(&req.path)
            .map_err(|_| ServerError::BadRequest("invalid path encoding".to_string()))?;
        let mut path = root.map_path(&decoded).ok_or(ServerError::NotFound)?;
        let mut metadata = tokio::fs::metadata(&path).await.map_err(|_| ServerError::NotFound)?;
        if metadata.is_dir() {
            path.push("index.html");
            metadata = tokio::fs::metadata(&path).await.map_err(|_| ServerError::NotFound)?;
        }
        if !metadata.is_file() {
            return Err(ServerError::NotFound);
        }

        let contents = tokio::fs::read(&path).await?;
        let mut response = Response::new(200);
        response
            .header("Content-Type", Self::content_type(&path))
            .header("Cache-Control", "public, max-age=3600");

        let modified = metadata
            .modified()
            .ok()
            .and_then(|m| m.duration_since(SystemTime::UNIX_EPOCH).ok());
        if let Some(since_epoch) = modified {
            response
                .header(
                    "Last-Modified",
                    httpdate::fmt_http_date(SystemTime::UNIX_EPOCH + since_epoch),
                )
                .header(
                    "ETag",
                    format!("W/\"{}-{}\"", metadata.len(), since_epoch.as_secs()),
                );
        }

        response.body(contents);
        Ok(response)
    }
}

impl Handler for StaticFiles {
    fn handle(&self, req: Request) -> BoxFuture<'static, HttpResponse> {
        Box::pin(Self::serve(self.clone(), req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, StaticFiles) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.css"), "body{}").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/index.html"), "<h1>docs</h1>").unwrap();
        let files = StaticFiles::new(dir.path());
        (dir, files)
    }

    #[tokio::test]
    async fn serves_files_with_metadata() {
        let (_dir, files) = fixture();
        let response = files.handle(Request::new(Method::GET, "/app.css")).await.unwrap();
        assert_eq!(response.body_string(), "body{}");
        assert_eq!(response.get_header("Content-Type"), Some("text/css; charset=utf-8"));
        assert!(response.get_header("Last-Modified").is_some());
        assert!(response.get_header("ETag").unwrap().starts_with("W/\"6-"));
    }

    #[tokio::test]
    async fn directories_serve_index() {
        let (_dir, files) = fixture();
        let response = files.handle(Request::new(Method::GET, "/docs")).await.unwrap();
        assert_eq!(response.body_string(), "<h1>docs</h1>");
    }

    #[tokio::test]
    async fn rejects_traversal_and_missing() {
        let (_dir, files) = fixture();
        for path in ["/../secret", "/docs/../../etc/passwd", "/%2e%2e/secret", "/nope.txt"] {
            let result = files.handle(Request::new(Method::GET, path)).await;
            assert!(matches!(result, Err(ServerError::NotFound)), "{path}");
        }
        let result = files.handle(Request::new(Method::POST, "/app.css")).await;
        assert!(matches!(result, Err(ServerError::MethodNotAllowed(_))));
    }
}
