// model-linker/src/main.rs

use log::{error, info};
use std::process::ExitCode;

use model_linker::logging::init_logging;
use model_linker::{serve, AppState, LinkerConfig, LinkerContext};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match LinkerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match init_logging(&config.log_config) {
        Ok(message) => info!("{}", message),
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    }

    info!("======= MODEL LINKER STARTUP =======");
    info!("Runtime Info: OS: {}, Arch: {}", std::env::consts::OS, std::env::consts::ARCH);

    let ctx = match LinkerContext::from_config(&config) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Failed to initialise services: {}", e);
            return ExitCode::FAILURE;
        }
    };
    for (category, dir) in ctx.registry.directories() {
        info!("[STARTUP] {} -> {}", category, dir.display());
    }

    if let Err(e) = serve(AppState::new(ctx), &config.bind_addr).await {
        error!("{}", e);
        return ExitCode::FAILURE;
    }
    info!("Model linker stopped");
    ExitCode::SUCCESS
}
