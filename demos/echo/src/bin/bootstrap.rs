use echo::echo_handler::EchoApiHandler;
use echo::middleware::RequestIdMiddleware;
use lambda_gateway::{serve_with_config, Config};

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
  // TIP: Use the `log4rs` crate for more fine-grained control over logging.
  env_logger::init();

  let config = Config::from_env()?;
  let handler = RequestIdMiddleware::new(EchoApiHandler::new(()));

  serve_with_config(config, handler)
    .await
    .map_err(|err| anyhow::anyhow!(err))
}
