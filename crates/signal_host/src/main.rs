#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = lib_signal_host::init().await {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}
