//! Keeps one peer session alive, failing over across configured endpoints.

use std::sync::Arc;

use tokio::sync::watch;

use txtap_types::PeerEndpoint;

use crate::{ActivePeer, Backoff, BackoffPolicy, NetworkError, PeerSession, SessionConfig, SessionDelegate};

/// Round-robin cursor over `len` endpoints.
#[derive(Clone, Debug)]
pub struct EndpointRotation {
    len: usize,
    next: usize,
}

impl EndpointRotation {
    pub fn new(len: usize) -> Self {
        Self { len, next: 0 }
    }

    /// Index of the endpoint to try next; wraps around.
    pub fn advance(&mut self) -> usize {
        let current = self.next;
        self.next = (self.next + 1) % self.len.max(1);
        current
    }
}

pub struct ConnectionManager {
    endpoints: Vec<PeerEndpoint>,
    session: SessionConfig,
    backoff: BackoffPolicy,
    active: ActivePeer,
}

impl ConnectionManager {
    pub fn new(
        endpoints: Vec<PeerEndpoint>,
        session: SessionConfig,
        backoff: BackoffPolicy,
    ) -> Result<Self, NetworkError> {
        if endpoints.is_empty() {
            return Err(NetworkError::NoEndpoints);
        }
        Ok(Self {
            endpoints,
            session,
            backoff,
            active: ActivePeer::new(),
        })
    }

    /// Handle on the endpoint whose session is currently handshaken.
    pub fn active_peer(&self) -> ActivePeer {
        self.active.clone()
    }

    pub fn endpoints(&self) -> &[PeerEndpoint] {
        &self.endpoints
    }

    /// Start sessions one after another until `shutdown` flips to `true` or
    /// its sender goes away. Never gives up on the endpoint list.
    pub async fn run(&self, delegate: Arc<dyn SessionDelegate>, mut shutdown: watch::Receiver<bool>) {
        let mut rotation = EndpointRotation::new(self.endpoints.len());
        let mut backoff = Backoff::new(self.backoff);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let endpoint = self.endpoints[rotation.advance()].clone();
            tracing::info!(peer = %endpoint, "starting peer session");
            let session = PeerSession::new(endpoint.clone(), self.session.clone(), delegate.clone())
                .with_active_peer(self.active.clone());

            let outcome = tokio::select! {
                outcome = session.run() => outcome,
                _ = shutdown.changed() => break,
            };

            if outcome.established {
                backoff.reset();
            }
            let delay = backoff.next_delay();
            tracing::warn!(
                peer = %endpoint,
                kind = outcome.error.kind(),
                error = %outcome.error,
                retry_in_ms = delay.as_millis() as u64,
                "peer session ended, failing over"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        tracing::info!("connection manager stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use txtap_protocol::VersionPayload;
    use txtap_types::InventoryNotice;

    struct Silent;

    #[async_trait]
    impl SessionDelegate for Silent {
        async fn on_connected(&self, _origin: &PeerEndpoint, _version: VersionPayload) {}
        async fn on_receive(&self, _origin: &PeerEndpoint, _notice: InventoryNotice) {}
        async fn on_error(&self, _error: &NetworkError) {}
    }

    fn fast_backoff() -> BackoffPolicy {
        BackoffPolicy {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(40),
        }
    }

    #[test]
    fn rotation_wraps() {
        let mut r = EndpointRotation::new(3);
        let order: Vec<_> = (0..7).map(|_| r.advance()).collect();
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn empty_endpoint_list_is_a_config_error() {
        let err = ConnectionManager::new(Vec::new(), SessionConfig::default(), BackoffPolicy::default())
            .err()
            .unwrap();
        assert!(matches!(err, NetworkError::NoEndpoints));
        assert_eq!(err.kind(), "config");
    }

    /// Records `index` on every accept. With `hang_up` the connection is
    /// closed straight away, otherwise it is held open and left silent.
    async fn spawn_listener(index: usize, hang_up: bool, log: Arc<Mutex<Vec<usize>>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                log.lock().unwrap().push(index);
                if hang_up {
                    drop(stream);
                } else {
                    held.push(stream);
                }
            }
        });
        addr
    }

    #[tokio::test]
    async fn fails_over_to_third_endpoint_before_wrapping() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut endpoints = Vec::new();
        for (i, hang_up) in [true, true, false].into_iter().enumerate() {
            endpoints.push(PeerEndpoint::new(spawn_listener(i, hang_up, log.clone()).await));
        }

        let manager = Arc::new(ConnectionManager::new(endpoints, SessionConfig::default(), fast_backoff()).unwrap());
        let (stop, shutdown) = watch::channel(false);
        let runner = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.run(Arc::new(Silent), shutdown).await })
        };

        tokio::time::timeout(Duration::from_secs(5), async {
            while log.lock().unwrap().len() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);

        stop.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), runner).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn keeps_cycling_when_every_endpoint_fails() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = spawn_listener(0, true, log.clone()).await;
        let b = spawn_listener(1, true, log.clone()).await;
        let manager = ConnectionManager::new(
            vec![PeerEndpoint::new(a), PeerEndpoint::new(b)],
            SessionConfig::default(),
            fast_backoff(),
        )
        .unwrap();
        let (stop, shutdown) = watch::channel(false);

        let wait = async {
            while log.lock().unwrap().len() < 5 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            stop.send(true).unwrap();
        };
        tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(manager.run(Arc::new(Silent), shutdown), wait);
        })
        .await
        .unwrap();

        let seen = log.lock().unwrap().clone();
        assert_eq!(&seen[..5], &[0, 1, 0, 1, 0]);
    }

    #[tokio::test]
    async fn stops_when_shutdown_sender_is_dropped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let addr = spawn_listener(0, false, log).await;
        let manager = ConnectionManager::new(vec![PeerEndpoint::new(addr)], SessionConfig::default(), fast_backoff())
            .unwrap();
        let (stop, shutdown) = watch::channel(false);
        drop(stop);
        tokio::time::timeout(Duration::from_secs(2), manager.run(Arc::new(Silent), shutdown))
            .await
            .unwrap();
    }
}
