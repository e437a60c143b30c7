use std::env;
use std::process::ExitCode;

use reqwest::Url;

const DEFAULT_URL: &str = "http://127.0.0.1:8000/";

fn main() -> ExitCode {
    let url = env::args().nth(1).unwrap_or_else(|| DEFAULT_URL.to_string());
    match check(&url) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Health check against {url} failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn check(url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let url = Url::parse(url)?;
    let response = reqwest::blocking::get(url)?;
    if !response.status().is_success() {
        return Err(format!("unexpected status {}", response.status()).into());
    }
    Ok(())
}
