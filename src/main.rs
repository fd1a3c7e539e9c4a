use dotenvy::dotenv;
use snafu::ResultExt as _;
use tokio::net::TcpListener;

use totalviews::api::{create_app, create_router};
use totalviews::config::Config;
use totalviews::error::{ApplicationError, BindAddressSnafu, WebServerSnafu};
use totalviews::logger;

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = Config::from_env()?;

    let _guard = logger::init(&config.server)?;

    let app = create_app(&config)?;
    let router = create_router(app);

    let address = config.server.host;
    let listener = TcpListener::bind(address)
        .await
        .context(BindAddressSnafu { address })?;

    tracing::info!(%address, "listening");
    axum::serve(listener, router).await.context(WebServerSnafu)
}
