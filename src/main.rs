use worktrace_lib::config::Settings;

#[tokio::main]
async fn main() {
    worktrace_lib::init_tracing();

    if let Err(e) = worktrace_lib::run(Settings::from_env()).await {
        tracing::error!(error = %e, "Worktrace failed to start");
        std::process::exit(1);
    }
}
