// author: kodeholic
// Trace SSE 스트림 핸들러
//
// GET /trace          : 전체 이벤트 스트림
// GET /trace/{peer_id}: 특정 피어 필터 후 스트림

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Sse},
};
use axum::response::sse::{Event, KeepAlive};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::config;

use super::state::HttpState;

pub async fn trace_stream(
    State(state): State<HttpState>,
    peer_filter: Option<Path<i32>>,
) -> impl IntoResponse {
    let rx     = state.trace_hub.subscribe();
    let filter = peer_filter.map(|Path(id)| id);

    let stream = BroadcastStream::new(rx)
        .filter_map(move |result| match result {
            Err(_lagged) => None,
            Ok(event) => {
                let pass = match filter {
                    None     => true,
                    Some(id) => event.peer_id == Some(id),
                };
                if !pass {
                    return None;
                }
                let json = serde_json::to_string(&event).unwrap_or_default();
                Some(Ok::<Event, std::convert::Infallible>(Event::default().data(json)))
            }
        });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(config::SSE_KEEP_ALIVE_SECS))
            .text("keep-alive"),
    )
}
