use anyhow::{anyhow, bail, Context, Result};
use bond::normalize::ToolOutput;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::{optional_integer_arg, string_arg};

const SERPAPI_HOST: &str = "https://serpapi.com";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_RESULTS: i64 = 10;

/// Google search through SerpAPI, needs `SERPAPI_KEY`. `SERPAPI_BASE_URL` overrides the host.
pub async fn web_search(arguments: Value) -> Result<ToolOutput> {
    let query = string_arg(&arguments, "query")?;
    let num_results = optional_integer_arg(&arguments, "num_results")
        .unwrap_or(3)
        .clamp(1, MAX_RESULTS) as usize;

    let api_key = std::env::var("SERPAPI_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            anyhow!("SERPAPI_KEY environment variable not set. Get a key from https://serpapi.com/")
        })?;
    let host = std::env::var("SERPAPI_BASE_URL").unwrap_or_else(|_| SERPAPI_HOST.to_string());

    let results = search(&host, &api_key, query, num_results).await?;
    Ok(format_results(&results, num_results)?.into())
}

async fn search(host: &str, api_key: &str, query: &str, num_results: usize) -> Result<Value> {
    let client = Client::builder().timeout(SEARCH_TIMEOUT).build()?;
    // ask for a few extra, some organic results come back without a snippet
    let num = (num_results + 5).to_string();

    let response = client
        .get(format!("{}/search.json", host.trim_end_matches('/')))
        .query(&[
            ("engine", "google"),
            ("q", query),
            ("api_key", api_key),
            ("num", num.as_str()),
            ("hl", "en"),
            ("gl", "us"),
        ])
        .send()
        .await
        .context("search request failed")?;

    let status = response.status();
    let body: Value = response
        .json()
        .await
        .with_context(|| format!("search returned an unreadable body ({})", status))?;

    if let Some(error) = body.get("error").and_then(Value::as_str) {
        bail!("search failed: {}", error);
    }
    if !status.is_success() {
        bail!("search failed with {}", status);
    }
    Ok(body)
}

fn format_results(results: &Value, num_results: usize) -> Result<String> {
    let organic = results
        .get("organic_results")
        .and_then(Value::as_array)
        .filter(|organic| !organic.is_empty())
        .ok_or_else(|| anyhow!("No search results found"))?;

    let mut parts = Vec::new();

    let overview = results
        .get("answer_box")
        .and_then(|answer| answer.get("answer").or_else(|| answer.get("snippet")))
        .and_then(Value::as_str);
    if let Some(overview) = overview {
        parts.push(format!("Google AI overview:\n{}\n", overview));
    }

    parts.push(format!("Top {} results:\n", organic.len().min(num_results)));
    for (i, result) in organic.iter().take(num_results).enumerate() {
        let field = |name: &str, fallback: &'static str| {
            result.get(name).and_then(Value::as_str).unwrap_or(fallback).to_string()
        };
        parts.push(format!("{}. {}", i + 1, field("title", "No title")));
        parts.push(field("snippet", "No snippet"));
        parts.push(format!("Link: {}", field("link", "")));
        parts.push(String::new());
    }

    Ok(parts.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bond::normalize::normalize;
    use serde_json::json;
    use serial_test::serial;
    use std::env;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn search_results() -> Value {
        json!({
            "answer_box": {"snippet": "Use `tar -xzf file.tar.gz`."},
            "organic_results": [
                {"title": "Extract tar.gz", "snippet": "tar -xzf extracts", "link": "https://a.example"},
                {"title": "tar manual", "snippet": "GNU tar options", "link": "https://b.example"},
                {"title": "Third", "link": "https://c.example"}
            ]
        })
    }

    #[test]
    fn test_format_results() -> Result<()> {
        let text = format_results(&search_results(), 2)?;
        assert_eq!(
            text,
            "Google AI overview:\nUse `tar -xzf file.tar.gz`.\n\n\
             Top 2 results:\n\n\
             1. Extract tar.gz\ntar -xzf extracts\nLink: https://a.example\n\n\
             2. tar manual\nGNU tar options\nLink: https://b.example\n"
        );

        let err = format_results(&json!({"organic_results": []}), 3).unwrap_err();
        assert_eq!(err.to_string(), "No search results found");
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn test_web_search() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .and(query_param("q", "extract tar.gz"))
            .and(query_param("api_key", "test-key"))
            .and(query_param("num", "6"))
            .respond_with(ResponseTemplate::new(200).set_body_json(search_results()))
            .expect(1)
            .mount(&server)
            .await;

        env::set_var("SERPAPI_KEY", "test-key");
        env::set_var("SERPAPI_BASE_URL", server.uri());
        let output = web_search(json!({"query": "extract tar.gz", "num_results": 1})).await;
        env::remove_var("SERPAPI_KEY");
        env::remove_var("SERPAPI_BASE_URL");

        let text = normalize(output?);
        assert!(text.contains("Top 1 results:"));
        assert!(text.contains("1. Extract tar.gz"));
        assert!(!text.contains("tar manual"));
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn test_web_search_reports_api_error() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search.json"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid API key."})),
            )
            .mount(&server)
            .await;

        env::set_var("SERPAPI_KEY", "bad-key");
        env::set_var("SERPAPI_BASE_URL", server.uri());
        let err = web_search(json!({"query": "anything"})).await.unwrap_err();
        env::remove_var("SERPAPI_KEY");
        env::remove_var("SERPAPI_BASE_URL");

        assert_eq!(err.to_string(), "search failed: Invalid API key.");
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn test_web_search_requires_key() {
        env::remove_var("SERPAPI_KEY");
        let err = web_search(json!({"query": "anything"})).await.unwrap_err();
        assert!(err.to_string().starts_with("SERPAPI_KEY environment variable not set"));
    }
}
