#[tokio::main]
async fn main() {
    mailqueue_backend::run().await;
}
