//! Classify Client
//!
//! Sends an image file to a running classifier and prints the raw response.
//! Every failure is reported on stdout; the process exits normally.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use reqwest::Url;

use digit_classifier::logic::decode;
use digit_classifier::models::{ClassifyRequest, CLASSIFY_ROUTE};

#[derive(Parser)]
#[command(name = "classify-client")]
#[command(about = "Send an image to the digit classification API")]
struct Args {
    /// Path to the image file
    image_path: PathBuf,

    /// Base URL of the classifier, e.g. http://localhost:8081
    server_url: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(message) = run(&args).await {
        println!("{}", message);
    }
}

async fn run(args: &Args) -> Result<(), String> {
    if !args.image_path.is_file() {
        return Err(format!(
            "Error: Image file not found at {}",
            args.image_path.display()
        ));
    }

    let image_bytes = std::fs::read(&args.image_path)
        .map_err(|e| format!("An unexpected error occurred: {}", e))?;

    let endpoint = classify_endpoint(&args.server_url)?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()
        .map_err(|e| format!("An unexpected error occurred: {}", e))?;

    post_image(&client, endpoint, &image_bytes, &args.server_url).await
}

async fn post_image(
    client: &reqwest::Client,
    endpoint: Url,
    image_bytes: &[u8],
    server_url: &str,
) -> Result<(), String> {
    let request = ClassifyRequest {
        image: decode::encode(image_bytes),
    };

    println!("Sending POST request to {}...", endpoint);

    let response = client
        .post(endpoint)
        .json(&request)
        .send()
        .await
        .map_err(|e| describe_send_error(&e, server_url))?;

    println!("Response Status Code: {}", response.status().as_u16());

    let body = response
        .text()
        .await
        .map_err(|e| format!("An unexpected error occurred: {}", e))?;
    println!("Response Body: {}", body);

    Ok(())
}

/// Base URL + classify route; rejects anything that is not an http(s) URL
fn classify_endpoint(server_url: &str) -> Result<Url, String> {
    let invalid = || {
        format!(
            "Error: Invalid URL format '{}'. Make sure it starts with http:// or https://.",
            server_url
        )
    };

    let endpoint = format!("{}{}", server_url.trim_end_matches('/'), CLASSIFY_ROUTE);
    let url = Url::parse(&endpoint).map_err(|_| invalid())?;

    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        _ => Err(invalid()),
    }
}

fn describe_send_error(err: &reqwest::Error, server_url: &str) -> String {
    if err.is_connect() {
        format!(
            "Error: Could not connect to the API at {}. Is the server running?",
            server_url
        )
    } else if err.is_timeout() {
        format!("Error: Request to {} timed out.", server_url)
    } else {
        format!("An unexpected error occurred: {}", err)
    }
}
