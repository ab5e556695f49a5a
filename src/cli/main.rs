use clap::{Parser, Subcommand};
use reqwest::{Client, Response};
use serde_json::json;
use std::error::Error;

#[derive(Parser)]
#[command(name = "incident-cli")]
#[command(about = "Incident ledger CLI", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080", env = "INCIDENTS_ENDPOINT")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report a new incident
    Create {
        #[arg(short, long)]
        message: String,

        /// new, completed or failed
        #[arg(short = 'T', long = "type", default_value = "new")]
        incident_type: String,

        /// operator, monitoring or partner
        #[arg(short, long)]
        source: String,
    },

    /// List incidents
    List {
        #[arg(short, long, default_value = "1")]
        page: u32,

        #[arg(short, long, default_value = "10")]
        limit: u32,

        #[arg(short = 'T', long = "type")]
        incident_type: Option<String>,

        #[arg(short, long)]
        source: Option<String>,
    },

    /// Get incident details
    Get {
        #[arg(value_name = "INCIDENT_ID")]
        id: i64,
    },

    /// Change the status of an incident
    UpdateStatus {
        #[arg(value_name = "INCIDENT_ID")]
        id: i64,

        #[arg(value_name = "STATUS")]
        status: String,
    },

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let client = Client::new();

    let response = match cli.command {
        Commands::Create {
            message,
            incident_type,
            source,
        } => {
            client
                .post(format!("{}/incident/create", cli.endpoint))
                .json(&json!({
                    "message": message,
                    "type": incident_type,
                    "source": source,
                }))
                .send()
                .await?
        }

        Commands::List {
            page,
            limit,
            incident_type,
            source,
        } => {
            let mut params = vec![("page", page.to_string()), ("limit", limit.to_string())];
            if let Some(incident_type) = incident_type {
                params.push(("type", incident_type));
            }
            if let Some(source) = source {
                params.push(("source", source));
            }

            client
                .get(format!("{}/incident/get", cli.endpoint))
                .query(&params)
                .send()
                .await?
        }

        Commands::Get { id } => {
            client
                .get(format!("{}/incident/get/{}", cli.endpoint, id))
                .send()
                .await?
        }

        Commands::UpdateStatus { id, status } => {
            client
                .patch(format!("{}/incident/update-status", cli.endpoint))
                .query(&[("incident_id", id.to_string()), ("status", status)])
                .send()
                .await?
        }

        Commands::Health => client.get(format!("{}/health", cli.endpoint)).send().await?,
    };

    print_response(response).await
}

async fn print_response(response: Response) -> Result<(), Box<dyn Error>> {
    let status = response.status();
    let body: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        return Err(format!("server answered {}", status).into());
    }
    Ok(())
}
