use fleet_dataq_api::run;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("fleet-dataq: {err}");
            ExitCode::FAILURE
        }
    }
}
