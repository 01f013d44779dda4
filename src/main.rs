#[tokio::main]
async fn main() {
    if let Err(err) = delocalise_lib::run().await {
        eprintln!("delocalise: {err}");
        std::process::exit(1);
    }
}
