//! Structured output: a reply constrained to a JSON schema.
//!
//! Needs a running Ollama server with the model installed:
//!   cargo run --example structured_output -p llamawrap

use llamawrap::prelude::*;

/// A country fact sheet.
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
struct Country {
    /// Common English name.
    name: String,
    /// Capital city.
    capital: String,
    /// Official languages.
    languages: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let session = Session::new(OllamaClient::from_env()?);

    // Low temperature keeps the answer close to the schema.
    let options = Options::new().temperature(0.0);
    let text = session
        .generate_formatted(
            "Answer with facts only.",
            "Tell me about Canada.",
            &options,
            Format::for_type::<Country>(),
        )
        .await?;

    let country: Country = serde_json::from_str(&text)?;
    println!("{country:#?}");
    Ok(())
}
