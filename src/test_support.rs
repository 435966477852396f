//! Throwaway HTTP servers standing in for the remote services in tests.

pub struct MockServer {
    pub base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl MockServer {
    pub async fn start(app: axum::Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("mock listener should bind");
        let bind_addr = listener
            .local_addr()
            .expect("mock listener local address should exist");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("mock server should run");
        });

        Self {
            base_url: format!("http://{bind_addr}"),
            handle,
        }
    }

    pub fn url(&self) -> url::Url {
        url::Url::parse(&self.base_url).expect("mock base url should parse")
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
