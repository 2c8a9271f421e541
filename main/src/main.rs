use std::env;
use std::process::ExitCode;
use config::bootstrap::{ init, run };

#[tokio::main]
async fn main() -> ExitCode {

    let config_filepath = get_config_filepath();

    match init(config_filepath, true).await {

        Ok((api_tx, api, bus_tx, bus)) => {
            run(api_tx, api, bus_tx, bus).await;
            ExitCode::SUCCESS
        },

        Err(e) => {
            eprintln!("Cancelled startup: {}", e);
            ExitCode::FAILURE
        }

    }

}

/// Allow the user to specify where the config file is with a
/// command line argument. If one is not provided the default
/// "config.toml" is returned.
fn get_config_filepath() -> String {

    env::args().nth(1).unwrap_or_else(|| "./config.toml".to_string())

}
