//! Minimal seam example: JSON endpoints behind the standard middleware chain.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42     → 200
//!   curl -i http://localhost:3000/users/7      → 404 {"status":"fail",...}
//!   curl -i -X POST http://localhost:3000/users → 400 {"status":"fail",...,"data":null}
//!   curl -i http://localhost:3000/boom          → 500, "recovery" record
//!   curl -i http://localhost:3000/disk          → 500 {"status":"error","message":"Internal Server Error"}
//!
//! SEAM_ADDR overrides the bind address (default 0.0.0.0:3000).

use std::net::SocketAddr;
use std::sync::Arc;

use http::StatusCode;
use seam::correlation::UuidV4;
use seam::log::TracingSink;
use seam::middleware::Chain;
use seam::{BoxError, Error, Request, Response, Router, Server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let addr: SocketAddr = std::env::var("SEAM_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_owned())
        .parse()?;

    let router = Router::new()
        .get("/users/{id}", get_user)
        .post("/users", create_user)
        .get("/boom", boom)
        .get("/disk", disk);

    let app = Chain::standard(Arc::new(TracingSink), Arc::new(UuidV4)).route(router);

    Server::bind(addr).serve(app).await?;
    Ok(())
}

// GET /users/{id}
async fn get_user(req: Request) -> Result<Response, Error> {
    match req.param("id") {
        Some("42") => Ok(Response::json(r#"{"id":"42","name":"alice"}"#)),
        Some(id) => Err(Error::new("user not found")
            .with_code(404)
            .with_field("id", id)
            .with_log_field("table", "users")),
        None => Err(Error::new("missing user id").with_code(400)),
    }
}

// POST /users: the body must be non-empty JSON.
async fn create_user(req: Request) -> Result<Response, Error> {
    if req.body().is_empty() {
        return Err(Error::new("request body is required").with_code(400));
    }

    let input: serde_json::Value = serde_json::from_slice(req.body()).map_err(|e| {
        Error::new("request body is not valid JSON")
            .with_code(422)
            .with_field("line", e.line())
            .with_log_field("parse_error", e.to_string())
    })?;

    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .json(serde_json::to_vec(&input).map_err(|e| Error::new(e.to_string()))?))
}

// GET /boom: contained by Recovery.
async fn boom(_req: Request) -> Result<Response, Error> {
    panic!("boom");
}

// GET /disk: an error that is not a seam::Error.
async fn disk(_req: Request) -> Result<Response, std::io::Error> {
    Err(std::io::Error::other("disk full"))
}
