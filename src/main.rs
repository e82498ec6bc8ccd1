use std::process::ExitCode;

use authgate::config::{load_config, print_schema};
use authgate::startup::build_gateway;
use authgate::utils::logger::init_logging;
use tracing::error;

const USAGE: &str =
    "usage: authgate [schema | status | login <username> <password> | logout | get <path>]";

// -- Entrypoint

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.first().map(String::as_str) == Some("schema") {
        return match print_schema() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Failed to render schema: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config_path =
        std::env::var("AUTHGATE_CONFIG").unwrap_or_else(|_| "./config.yaml".to_string());
    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(&config, &args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    config: &authgate::config::ConfigV1,
    args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let gateway = build_gateway(config).await?;
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        [] | ["status"] => {
            println!("{}", serde_json::to_string_pretty(&gateway.session())?);
        }
        ["login", username, password] => {
            let session = gateway.login(username, password).await?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        ["logout"] => gateway.logout().await?,
        ["get", path] => {
            let response = gateway.get(path).await?;
            println!("{}", response.text());
        }
        _ => return Err(USAGE.into()),
    }
    Ok(())
}
