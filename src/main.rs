//! hubstack
//!
//! Command-line interface for deriving and exporting managed cluster
//! provisioning plans.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    match hubstack::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Empty errors were already reported by clap
            let msg = e.to_string();
            if !msg.is_empty() {
                eprintln!("Error: {e}");
            }

            ExitCode::from(e.exit_code() as u8)
        }
    }
}
