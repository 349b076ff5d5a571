use clap::{Parser, Subcommand};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "registry-cli")]
#[command(about = "Command line client for the configuration registry", long_about = None)]
struct Cli {
    #[arg(short, long, env = "REGISTRY_URL", default_value = "http://localhost:8000")]
    url: String,

    /// Sent as `Idempotency-Key` on POST requests.
    #[arg(long)]
    idempotency_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Service health
    Health,
    /// Standalone configs
    #[command(subcommand)]
    Configs(ConfigCommand),
    /// Config groups
    #[command(subcommand)]
    Groups(GroupCommand),
}

#[derive(Subcommand)]
enum ConfigCommand {
    List,
    Get { name: String, version: u64 },
    /// Create from a JSON document (inline or `@path`)
    Create { json: String },
    Delete { name: String, version: u64 },
}

#[derive(Subcommand)]
enum GroupCommand {
    List,
    /// List the stored versions of a group
    Versions { name: String },
    Get { name: String, version: u64 },
    /// Create from a JSON document (inline or `@path`)
    Create { json: String },
    Delete { name: String, version: u64 },
    /// Publish a new version with an extra entry (JSON inline or `@path`)
    AddEntry { name: String, version: u64, json: String },
    /// Show one entry
    Entry { name: String, version: u64, entry: String },
    /// Publish a new version without the named entry
    RemoveEntry { name: String, version: u64, entry: String },
    /// Entries matching every label, e.g. `environment:production;team:backend`
    Filter { name: String, version: u64, labels: String },
    /// Publish a new version without the entries matching the labels
    RemoveByLabels { name: String, version: u64, labels: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let api = Api {
        client: reqwest::Client::new(),
        url: cli.url.trim_end_matches('/').to_string(),
        idempotency_key: cli.idempotency_key,
    };

    let request = match cli.command {
        Commands::Health => api.request(Method::GET, "/health"),
        Commands::Configs(cmd) => match cmd {
            ConfigCommand::List => api.request(Method::GET, "/configs"),
            ConfigCommand::Get { name, version } => {
                api.request(Method::GET, &format!("/configs/{}/{}", name, version))
            }
            ConfigCommand::Create { json } => {
                api.request(Method::POST, "/configs").json(&read_json(&json)?)
            }
            ConfigCommand::Delete { name, version } => {
                api.request(Method::DELETE, &format!("/configs/{}/{}", name, version))
            }
        },
        Commands::Groups(cmd) => match cmd {
            GroupCommand::List => api.request(Method::GET, "/groups"),
            GroupCommand::Versions { name } => {
                api.request(Method::GET, &format!("/groups/{}", name))
            }
            GroupCommand::Get { name, version } => {
                api.request(Method::GET, &format!("/groups/{}/{}", name, version))
            }
            GroupCommand::Create { json } => {
                api.request(Method::POST, "/groups").json(&read_json(&json)?)
            }
            GroupCommand::Delete { name, version } => {
                api.request(Method::DELETE, &format!("/groups/{}/{}", name, version))
            }
            GroupCommand::AddEntry { name, version, json } => api
                .request(Method::POST, &format!("/groups/{}/{}/configs", name, version))
                .json(&read_json(&json)?),
            GroupCommand::Entry { name, version, entry } => api.request(
                Method::GET,
                &format!("/groups/{}/{}/configs/{}", name, version, entry),
            ),
            GroupCommand::RemoveEntry { name, version, entry } => api.request(
                Method::DELETE,
                &format!("/groups/{}/{}/configs/{}", name, version, entry),
            ),
            GroupCommand::Filter { name, version, labels } => api
                .request(Method::GET, &format!("/groups/{}/{}/configs", name, version))
                .query(&[("labels", labels)]),
            GroupCommand::RemoveByLabels { name, version, labels } => api
                .request(Method::DELETE, &format!("/groups/{}/{}/configs", name, version))
                .query(&[("labels", labels)]),
        },
    };

    print_response(request.send().await?).await
}

struct Api {
    client: reqwest::Client,
    url: String,
    idempotency_key: Option<String>,
}

impl Api {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let is_post = method == Method::POST;
        let builder = self.client.request(method, format!("{}{}", self.url, path));
        match &self.idempotency_key {
            Some(key) if is_post => builder.header("Idempotency-Key", key),
            _ => builder,
        }
    }
}

/// Inline JSON, or the contents of a file when prefixed with `@`.
fn read_json(arg: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => arg.to_string(),
    };
    Ok(serde_json::from_str(&text)?)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: registry returned status {}", status);
        if !text.is_empty() {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
