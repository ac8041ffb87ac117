//! Fixture server for exercising `fetch-core` over real HTTP.
//!
//! Serves well-formed JSON, a small PNG, and the awkward cases a client must
//! survive: empty bodies, non-JSON text, bytes that claim to be an image.

use std::{collections::HashMap, io::Cursor, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Number {
    pub n: u64,
    pub square: u64,
}

/// Width and height of the PNG served at `/images/pixel.png`.
pub const PIXEL_SIZE: (u32, u32) = (4, 3);

#[derive(Clone)]
pub struct AppState {
    users: Arc<HashMap<u32, User>>,
    pixel: Bytes,
}

impl AppState {
    pub fn new() -> Self {
        let users = [(1, "Ada"), (2, "Grace"), (3, "Linus")]
            .into_iter()
            .map(|(id, name)| {
                (
                    id,
                    User {
                        id,
                        name: name.to_string(),
                    },
                )
            })
            .collect();
        Self {
            users: Arc::new(users),
            pixel: Bytes::from(pixel_png()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn app() -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user))
        .route("/numbers/{n}", get(get_number))
        .route("/images/{name}", get(get_image))
        .route("/empty", get(empty))
        .route("/garbage", get(garbage))
        .with_state(AppState::new())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock server listening");
    }
    axum::serve(listener, app()).await
}

/// A solid-colour PNG of `PIXEL_SIZE`.
pub fn pixel_png() -> Vec<u8> {
    let (w, h) = PIXEL_SIZE;
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([200, 30, 30, 255]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .expect("encode fixture PNG");
    buf.into_inner()
}

async fn list_users(State(state): State<AppState>) -> Json<Vec<User>> {
    let mut users: Vec<User> = state.users.values().cloned().collect();
    users.sort_by_key(|u| u.id);
    Json(users)
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<User>, StatusCode> {
    state.users.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn get_number(Path(n): Path<u64>) -> Json<Number> {
    Json(Number {
        n,
        square: n.saturating_mul(n),
    })
}

async fn get_image(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match name.as_str() {
        "pixel.png" => ([(header::CONTENT_TYPE, "image/png")], state.pixel).into_response(),
        "broken.png" => ([(header::CONTENT_TYPE, "image/png")], "definitely not a png").into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn empty() -> StatusCode {
    StatusCode::OK
}

async fn garbage() -> &'static str {
    "<html>not json</html>"
}
