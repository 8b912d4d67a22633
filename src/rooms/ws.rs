use axum::{
    debug_handler,
    extract::{State, WebSocketUpgrade, ws::{self, WebSocket}},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower_sessions::Session;

use crate::session::{self, Identity};

use super::{
    Hub,
    lifecycle::{Connection, Frame},
    msg::Message,
};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_ws(
    State(hub): State<Hub>,
    session: Session,

    ws: WebSocketUpgrade,
) -> Response {
    let identity = match session::identity(&session).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!("websocket rejected: {e}");
            return e.into_response();
        }
    };

    ws.on_upgrade(move |stream| serve(stream, hub, identity))
}

async fn serve(stream: WebSocket, hub: Hub, identity: Identity) {
    let (mut sender, receiver) = stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("encoding outbound message failed: {e}");
                    continue;
                }
            };

            if sender.send(ws::Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let frames = receiver.map(frame);

    if let Err(e) = Connection::new(hub, identity, tx).run(frames).await {
        tracing::warn!("connection aborted: {e}");
    }

    write_task.abort();
}

fn frame(received: Result<ws::Message, axum::Error>) -> Frame {
    match received {
        Ok(ws::Message::Text(text)) => Frame::Text(text.as_str().to_owned()),
        Ok(ws::Message::Close(_)) => Frame::Closed,
        Ok(_) => Frame::Other,
        Err(e) => {
            tracing::debug!("websocket receive failed: {e}");
            Frame::Closed
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use axum::body::Bytes;

    use super::*;

    #[test]
    fn text_frames_carry_their_payload() {
        let got = frame(Ok(ws::Message::Text(r#"{"roomid":"0007"}"#.into())));
        assert_eq!(got, Frame::Text(r#"{"roomid":"0007"}"#.to_owned()));
    }

    #[test]
    fn control_and_binary_frames_are_skipped() {
        assert_eq!(frame(Ok(ws::Message::Ping(Bytes::new()))), Frame::Other);
        assert_eq!(frame(Ok(ws::Message::Pong(Bytes::new()))), Frame::Other);
        assert_eq!(frame(Ok(ws::Message::Binary(Bytes::from_static(b"\x00")))), Frame::Other);
    }

    #[test]
    fn close_and_transport_errors_end_the_stream() {
        assert_eq!(frame(Ok(ws::Message::Close(None))), Frame::Closed);

        let reset = axum::Error::new(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert_eq!(frame(Err(reset)), Frame::Closed);
    }
}
