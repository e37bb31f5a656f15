use crate::dns::handlers::Handler;
use crate::error::Error;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// Large enough for any query a validating resolver sends over UDP.
const MAX_DATAGRAM_SIZE: usize = 4096;

const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// A UDP DNS listener serving [`Handler`] responses on a background task.
pub struct Responder {
    local_addr: SocketAddr,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl Responder {
    /// Bind `addr` and start serving. The listener stops when `stop` (or [`Responder::stop`])
    /// fires.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the socket can't be bound.
    pub async fn bind(
        addr: SocketAddr,
        handler: Handler,
        stop: &CancellationToken,
    ) -> Result<Self, Error> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        tracing::info!("DNS listening on UDP {local_addr}");

        let stop = stop.child_token();
        let task = tokio::spawn(serve(socket, handler, stop.clone()));
        Ok(Self {
            local_addr,
            stop,
            task,
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop serving and wait for the socket to be released.
    pub async fn stop(self) {
        self.stop.cancel();
        if let Err(err) = self.task.await {
            tracing::error!("DNS listener task failed: {err}");
        }
    }
}

async fn serve(socket: UdpSocket, handler: Handler, stop: CancellationToken) {
    let mut buf = vec![0; MAX_DATAGRAM_SIZE];
    loop {
        let received = tokio::select! {
            () = stop.cancelled() => break,
            res = socket.recv_from(&mut buf) => res,
        };
        let (len, src) = match received {
            Ok(received) => received,
            Err(err) => {
                tracing::warn!("DNS receive failed: {err}");
                tokio::select! {
                    () = stop.cancelled() => break,
                    () = tokio::time::sleep(RECV_ERROR_BACKOFF) => continue,
                }
            }
        };

        match handler.handle_bytes(&buf[..len]).await {
            Ok(response) => {
                if let Err(err) = socket.send_to(&response, src).await {
                    tracing::error!("error sending DNS response to {src}: {err}");
                }
            }
            // Without a decodable header there is no id to answer.
            Err(err) => tracing::warn!("dropping undecodable DNS request from {src}: {err:?}"),
        }
    }
    tracing::info!("DNS listener on UDP {:?} shutting down", socket.local_addr().ok());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::registry::{Changes, Registry};
    use crate::record::Endpoint;
    use std::net::Ipv4Addr;
    use std::str::FromStr;
    use std::sync::Arc;
    use trust_dns_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
    use trust_dns_proto::rr::{Name, RData, RecordType};

    async fn exchange(server: SocketAddr, request: &Message) -> Message {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.send_to(&request.to_vec().unwrap(), server).await.unwrap();
        let mut buf = vec![0; MAX_DATAGRAM_SIZE];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("response within timeout")
            .unwrap();
        Message::from_vec(&buf[..len]).unwrap()
    }

    fn a_query(name: &str) -> Message {
        let mut message = Message::new();
        message
            .set_id(7)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .add_query(Query::query(Name::from_str(name).unwrap(), RecordType::A));
        message
    }

    #[tokio::test]
    async fn serves_over_udp_until_stopped() {
        let stop = CancellationToken::new();
        let handler = Handler::new(Arc::new(Registry::default()));
        let responder = Responder::bind("127.0.0.1:0".parse().unwrap(), handler, &stop)
            .await
            .unwrap();
        let addr = responder.local_addr();
        assert_ne!(addr.port(), 0);

        let response = exchange(addr, &a_query("example.com.")).await;
        assert_eq!(response.id(), 7);
        assert_eq!(response.response_code(), ResponseCode::NoError);
        assert_eq!(
            response.answers()[0].data(),
            Some(&RData::A(Ipv4Addr::LOCALHOST))
        );

        responder.stop().await;

        // The port is free again once stop returns.
        UdpSocket::bind(addr).await.expect("socket released after stop");
    }

    #[tokio::test]
    async fn parent_cancellation_stops_listener() {
        let stop = CancellationToken::new();
        let handler = Handler::new(Arc::new(Registry::default()));
        let responder = Responder::bind("127.0.0.1:0".parse().unwrap(), handler, &stop)
            .await
            .unwrap();

        stop.cancel();
        tokio::time::timeout(Duration::from_secs(2), responder.stop())
            .await
            .expect("listener exits after cancellation");
    }

    #[tokio::test]
    async fn garbage_datagrams_do_not_kill_listener() {
        let stop = CancellationToken::new();
        let handler = Handler::new(Arc::new(Registry::default()));
        let responder = Responder::bind("127.0.0.1:0".parse().unwrap(), handler, &stop)
            .await
            .unwrap();
        let addr = responder.local_addr();

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.send_to(&[0xde, 0xad], addr).await.unwrap();

        let response = exchange(addr, &a_query("example.com.")).await;
        assert_eq!(response.response_code(), ResponseCode::NoError);
        responder.stop().await;
    }

    #[tokio::test]
    async fn long_txt_answer_still_gets_a_reply() {
        let registry = Arc::new(Registry::default());
        registry
            .apply_changes(&Changes {
                create: vec![Endpoint::new(
                    "_acme-challenge.example.com.",
                    RecordType::TXT,
                    vec!["v".repeat(300)],
                )],
                ..Changes::default()
            })
            .await;
        let stop = CancellationToken::new();
        let responder = Responder::bind(
            "127.0.0.1:0".parse().unwrap(),
            Handler::new(registry),
            &stop,
        )
        .await
        .unwrap();

        let mut request = a_query("_acme-challenge.example.com.");
        request.queries_mut()[0].set_query_type(RecordType::TXT);
        let response = exchange(responder.local_addr(), &request).await;
        assert_eq!(response.id(), 7);
        assert_eq!(response.response_code(), ResponseCode::NoError);
        assert_eq!(response.answers().len(), 1);
        responder.stop().await;
    }
}
