//! WebSocket transport against a real `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use planpoker_transport::{Connection, Transport, TransportError, WebSocketTransport};
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs =
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>>;

    async fn client(addr: SocketAddr) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        ws
    }

    async fn listener() -> (WebSocketTransport, SocketAddr) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("should have addr");
        (transport, addr)
    }

    #[tokio::test]
    async fn test_send_is_a_text_frame() {
        let (mut transport, addr) = listener().await;
        let accepted = tokio::spawn(async move { transport.accept().await });
        let mut ws = client(addr).await;
        let conn = accepted.await.unwrap().expect("should accept");

        conn.send(r#"{"event":"connect_success"}"#).await.unwrap();
        let msg = ws.next().await.unwrap().unwrap();
        assert!(msg.is_text());
        assert_eq!(msg.to_text().unwrap(), r#"{"event":"connect_success"}"#);
        assert!(conn.peer_addr().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_recv_accepts_text_and_binary() {
        let (mut transport, addr) = listener().await;
        let accepted = tokio::spawn(async move { transport.accept().await });
        let mut ws = client(addr).await;
        let conn = accepted.await.unwrap().expect("should accept");

        ws.send(Message::text(r#"{"event":"leave_room"}"#)).await.unwrap();
        ws.send(Message::binary(b"{}".to_vec())).await.unwrap();

        assert_eq!(
            conn.recv().await.unwrap().unwrap(),
            br#"{"event":"leave_room"}"#
        );
        assert_eq!(conn.recv().await.unwrap().unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_send_not_blocked_by_parked_recv() {
        let (mut transport, addr) = listener().await;
        let accepted = tokio::spawn(async move { transport.accept().await });
        let mut ws = client(addr).await;
        let conn = Arc::new(accepted.await.unwrap().expect("should accept"));

        let reader = Arc::clone(&conn);
        let parked = tokio::spawn(async move { reader.recv().await });
        tokio::task::yield_now().await;

        tokio::time::timeout(Duration::from_secs(2), conn.send("hello"))
            .await
            .expect("send must not wait for recv")
            .unwrap();
        assert_eq!(ws.next().await.unwrap().unwrap().to_text().unwrap(), "hello");

        parked.abort();
    }

    #[tokio::test]
    async fn test_recv_none_after_client_close() {
        let (mut transport, addr) = listener().await;
        let accepted = tokio::spawn(async move { transport.accept().await });
        let mut ws = client(addr).await;
        let conn = accepted.await.unwrap().expect("should accept");

        ws.close(None).await.unwrap();
        assert!(conn.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_accept_times_out_without_upgrade() {
        let (transport, addr) = listener().await;
        let mut transport = transport.with_handshake_timeout(Duration::from_millis(50));
        let accepted = tokio::spawn(async move { transport.accept().await });

        // A bare TCP client that never sends the HTTP upgrade.
        let _silent = TcpStream::connect(addr).await.unwrap();
        let err = accepted.await.unwrap().err().expect("accept should fail");
        assert!(matches!(err, TransportError::HandshakeTimeout(_)), "{err}");
    }

    #[tokio::test]
    async fn test_connection_ids_are_unique() {
        let (mut transport, addr) = listener().await;
        let accepted = tokio::spawn(async move {
            let a = transport.accept().await.expect("should accept");
            let b = transport.accept().await.expect("should accept");
            (a.id(), b.id())
        });
        let _first = client(addr).await;
        let _second = client(addr).await;
        let (a, b) = accepted.await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_bind_invalid_address_is_bind_error() {
        let err = WebSocketTransport::bind("not-an-address").await.err().unwrap();
        assert!(matches!(err, TransportError::Bind { .. }));
    }
}
