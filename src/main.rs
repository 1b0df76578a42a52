use std::path::Path;

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use dendrite::{Gateway, config::GatewayConfigValidator, tracing_setup};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Start the gateway server (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    // Determine the command to run
    let (command, config_path) = match args.command {
        Some(Commands::Validate { config }) => ("validate", config),
        Some(Commands::Init { config }) => ("init", config),
        Some(Commands::Serve { config }) => ("serve", config),
        None => ("serve", args.config), // Default to serve with config from args
    };

    match command {
        "validate" => {
            return validate_config_command(&config_path).await;
        }
        "init" => {
            return init_config_command(&config_path).await;
        }
        "serve" => {
            // Continue with normal server startup
        }
        _ => unreachable!(),
    }

    tracing_setup::init_tracing().map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;

    tracing::info!("Loading configuration from {config_path}");

    let gateway = Gateway::from_config_path(&config_path)
        .with_context(|| format!("Failed to build gateway from {config_path}"))?;

    // Log configured routes
    for aggregation in &gateway.config().aggregations {
        tracing::info!(
            pattern = %aggregation.path,
            calls = aggregation.calls.len(),
            rate_limited = aggregation.active_rate_limit().is_some(),
            "configured aggregation"
        );
    }

    let addr = gateway.listen_addr().to_string();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!("Dendrite aggregation gateway listening on {addr}");
    println!("Dendrite aggregation gateway listening on {addr}");

    tokio::select! {
        result = axum::serve(listener, gateway.into_router()) => {
            result.context("Server error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

/// Validate configuration file and exit
async fn validate_config_command(config_path: &str) -> Result<()> {
    use dendrite::config::loader::load_config_unchecked;

    println!("🔍 Validating configuration file: {config_path}");

    // First check if file exists and is readable
    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    // Try to parse the configuration
    let config = match load_config_unchecked(config_path) {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    // Validate the configuration
    match GatewayConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!("   • Aggregations: {}", config.aggregations.len());
            let rate_limited = config
                .aggregations
                .iter()
                .filter(|a| a.active_rate_limit().is_some())
                .count();
            println!("   • Rate-limited routes: {rate_limited}");
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Declare at least one aggregation with one call");
            println!("   • Use $path.X / $query.X / $header.X parameter sources");
            println!("   • Set rate_limit 'limit' and 'interval' together");
            println!("   • Verify listen address format (e.g., '127.0.0.1:3000')");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Dendrite aggregation gateway configuration

# The address to listen on
listen_addr: "127.0.0.1:8080"

aggregations:
  # One public route fanning out to two backends
  - path: "/users/{id}/profile"
    rate_limit: { limit: 100, interval: 60 }
    calls:
      - name: "user"
        backend: "http://localhost:3001/u/{id}"
        required: true
        params: { id: "$path.id" }
      - name: "prefs"
        backend: "http://localhost:3002/p?uid={id}"
        params: { id: "$path.id" }
    response:
      structure: { user: "user", prefs: "prefs" }
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'dendrite serve --config {config_path}' to start the server");
    Ok(())
}
