//! CLI handler for ad-hoc requests.

use reqwest::Method;
use serde_json::Value;

use super::{Cli, RequestArgs};
use crate::client::{RequestDescriptor, RequestOptions};
use crate::transport::RequestBody;

/// Handle `tether request <method> <endpoint>`.
pub async fn handle_request(cli: &Cli, args: &RequestArgs) -> Result<(), Box<dyn std::error::Error>> {
    let method = parse_method(&args.method)?;
    let mut descriptor = RequestDescriptor::new(method, &args.endpoint, RequestOptions::default());
    if let Some(raw) = &args.body {
        let body: Value =
            serde_json::from_str(raw).map_err(|e| format!("--body is not valid JSON: {e}"))?;
        descriptor = descriptor.with_body(RequestBody::Json(body));
    }

    let response = cli.client()?.send_raw(descriptor).await?;
    eprintln!("{} {}", response.status, response.status_text().unwrap_or_default());
    if let Some(body) = response.body {
        println!("{}", serde_json::to_string_pretty(&body)?);
    }
    Ok(())
}

fn parse_method(raw: &str) -> Result<Method, String> {
    match raw.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        _ => Err(format!("Unsupported method: {raw}. Use GET, POST, PUT, PATCH or DELETE")),
    }
}
