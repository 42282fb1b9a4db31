/// Entry point of the host telemetry demonstration agent.
///
/// Samples the processes matching `PROCESS_PATTERNS` twice, `SAMPLE_INTERVAL_MS`
/// apart, and prints the second tick as JSON.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=debug PROCESS_PATTERNS='^postgres' TOP_BY_CPU=5 cargo run
/// ```
fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    host_telemetry::run()
}
