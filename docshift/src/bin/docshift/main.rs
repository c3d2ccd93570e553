#[tokio::main]
async fn main() {
    env_logger::init();

    let code = docshift::cli::run().await;
    std::process::exit(code);
}
