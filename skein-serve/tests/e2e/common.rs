//! Shared e2e harness. Agent routing reads `RUNTIME_AGENTS_STORAGE_PATH` and
//! LLM routing reads `RUNTIME_LLM_<PROVIDER>_URL` from the process
//! environment (spec §6.4), so tests that set these serialize on
//! [`ENV_LOCK`] rather than risk one test's env leaking into another.

use std::sync::Mutex;
use tokio::net::TcpListener;

pub static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Binds to a random port and spawns the server. Returns the base URL and
/// the server's task handle so the caller can `.abort()` it when done.
pub async fn spawn_server() -> (
    String,
    tokio::task::JoinHandle<Result<(), Box<dyn std::error::Error + Send + Sync>>>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let handle = tokio::spawn(skein_serve::run_serve_on_listener(listener));
    (base_url, handle)
}
