use jgd::{supervisor, Config};

#[tokio::main]
async fn main() {
    let config = Config::parse();
    supervisor::run(config).await;
}
