pub mod api;

use log::info;
use std::error::Error;
use tokio::net::TcpListener;

use api::AppState;

pub struct Server {
    addr: String,
    state: AppState,
    static_dir: Option<String>,
}

impl Server {
    pub fn new(addr: String, state: AppState, static_dir: Option<String>) -> Self {
        Self {
            addr,
            state,
            static_dir,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let app = api::create_router(self.state.clone(), self.static_dir.as_deref());
        let listener = TcpListener::bind(&self.addr).await?;
        info!("HTTP server listening on: http://{}", self.addr);
        axum::serve(listener, app).await?;
        Ok(())
    }
}
