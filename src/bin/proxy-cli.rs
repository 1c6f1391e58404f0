use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for the intercepting proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3002", env = "PROXY_URL")]
    url: String,

    /// Session token, required when the proxy runs in session mode.
    #[arg(short, long, env = "PROXY_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check proxy status
    Status,
    /// List interceptors
    List,
    /// Create an interceptor for an origin
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        base_url: String,
    },
    /// Delete an interceptor
    Delete { code: String },
    /// Resume proxying for an interceptor
    Activate { code: String },
    /// Stop proxying for an interceptor (requests get 404)
    Deactivate { code: String },
    /// Show captured exchanges, newest first
    Logs {
        code: String,
        #[arg(long, default_value_t = 100)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
    }

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/status", base)),
        Commands::List => client.get(format!("{}/api/interceptors", base)),
        Commands::Create { name, base_url } => client
            .post(format!("{}/api/interceptors", base))
            .json(&json!({ "name": name, "baseUrl": base_url })),
        Commands::Delete { code } => client.delete(format!("{}/api/interceptors/{}", base, code)),
        Commands::Activate { code } => client
            .patch(format!("{}/api/interceptors/{}", base, code))
            .json(&json!({ "active": true })),
        Commands::Deactivate { code } => client
            .patch(format!("{}/api/interceptors/{}", base, code))
            .json(&json!({ "active": false })),
        Commands::Logs { code, limit, offset } => client
            .get(format!("{}/api/interceptors/{}/logs", base, code))
            .query(&[("limit", limit), ("offset", offset)]),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: proxy returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    if status == reqwest::StatusCode::NO_CONTENT {
        println!("OK");
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
