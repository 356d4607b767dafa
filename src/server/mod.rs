pub mod api;

use std::error::Error;
use std::net::SocketAddr;
use log::info;

pub use self::api::{ router, AppState, DEFAULT_MAX_TURNS };

pub struct Server {
    addr: String,
    state: AppState,
}

impl Server {
    pub fn new(addr: String, state: AppState) -> Self {
        Self { addr, state }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Proxy on http://{}", listener.local_addr()?);

        axum::serve(listener, router(self.state.clone()).into_make_service()).await?;
        Ok(())
    }
}
