use std::process;

#[tokio::main]
async fn main() {
    if let Err(e) = evm_signer_server::run().await {
        tracing::error!(error = %e, "fatal error during startup or operation");
        eprintln!("evm-signer: {e}");
        process::exit(1);
    }
}
