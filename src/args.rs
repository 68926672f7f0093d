use clap::Parser;
use std::net::SocketAddr;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "lobby_server",
    rename_all = "kebab-case",
    rename_all_env = "screaming-snake"
)]
pub struct Args {
    /// Address to listen on for HTTP and websocket traffic.
    #[arg(long, default_value = "0.0.0.0:3536", env = "LOBBY_HOST")]
    pub host: SocketAddr,

    /// Secret used to sign and verify player tokens.
    #[arg(long, default_value = "secret", env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,
}
