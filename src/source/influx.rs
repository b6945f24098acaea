//! InfluxDB v2 data source
//!
//! Runs a Flux `last()` query over the tracked fields of one measurement and
//! reads the CSV answer.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{DataSource, FetchError, Observation};

/// Connection parameters for an InfluxDB v2 server
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    /// Base URL, e.g. `http://influxdb:8086`
    pub url: String,
    pub token: Option<String>,
    pub org: String,
    pub bucket: String,
    pub measurement: String,
}

/// HTTP client for the InfluxDB v2 query API
#[derive(Debug, Clone)]
pub struct InfluxClient {
    http_client: reqwest::Client,
    config: InfluxConfig,
    timeout: Duration,
}

impl InfluxClient {
    /// Create a client whose requests give up after `timeout`
    pub fn new(config: InfluxConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            config,
            timeout,
        })
    }

    fn query_url(&self) -> String {
        format!("{}/api/v2/query", self.config.url.trim_end_matches('/'))
    }
}

#[async_trait]
impl DataSource for InfluxClient {
    async fn fetch_latest(
        &self,
        signals: &[String],
        window: Duration,
    ) -> Result<HashMap<String, Observation>, FetchError> {
        if signals.is_empty() {
            return Ok(HashMap::new());
        }

        let flux = build_flux_query(&self.config.bucket, &self.config.measurement, signals, window);
        let body = serde_json::json!({
            "query": flux,
            "type": "flux",
            "dialect": {
                "header": true,
                "annotations": [],
                "delimiter": ",",
            },
        });

        let mut request = self
            .http_client
            .post(self.query_url())
            .query(&[("org", self.config.org.as_str())])
            .header(reqwest::header::ACCEPT, "application/csv")
            .json(&body);

        if let Some(token) = &self.config.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Token {}", token));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| FetchError::Malformed(format!("Failed to read response body: {}", e)))?;

        let observations = parse_query_response(&text, signals)?;

        tracing::debug!(
            measurement = %self.config.measurement,
            requested = signals.len(),
            returned = observations.len(),
            "Fetched latest observations"
        );

        Ok(observations)
    }
}

/// Build the Flux query selecting the last point of each field in the window
pub fn build_flux_query(
    bucket: &str,
    measurement: &str,
    signals: &[String],
    window: Duration,
) -> String {
    let fields = signals
        .iter()
        .map(|s| format!("r._field == \"{}\"", escape_flux(s)))
        .collect::<Vec<_>>()
        .join(" or ");

    format!(
        "from(bucket: \"{}\")\n  |> range(start: -{}s)\n  |> filter(fn: (r) => r._measurement == \"{}\" and ({}))\n  |> last()\n",
        escape_flux(bucket),
        window.as_secs().max(1),
        escape_flux(measurement),
        fields
    )
}

fn escape_flux(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Column positions of one CSV result block
struct BlockColumns {
    time: usize,
    value: usize,
    field: usize,
}

enum Block {
    Data(BlockColumns),
    /// In-band error block; holds the position of the `error` column
    Error(usize),
}

impl Block {
    fn from_header(header: &[String]) -> Result<Self, FetchError> {
        let position = |name: &str| header.iter().position(|c| c == name);

        if let Some(idx) = position("error") {
            if position("_value").is_none() {
                return Ok(Block::Error(idx));
            }
        }

        match (position("_time"), position("_value"), position("_field")) {
            (Some(time), Some(value), Some(field)) => Ok(Block::Data(BlockColumns { time, value, field })),
            _ => Err(FetchError::Malformed(format!(
                "missing _time/_value/_field in header: {}",
                header.join(",")
            ))),
        }
    }
}

/// Parse the CSV body of a query answer into the latest observation per
/// requested signal.
///
/// The body may hold several result blocks separated by blank lines, each
/// with its own header row.
pub fn parse_query_response(
    body: &str,
    signals: &[String],
) -> Result<HashMap<String, Observation>, FetchError> {
    let mut latest: HashMap<String, Observation> = HashMap::new();
    let mut block: Option<Block> = None;

    for raw in body.lines() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            block = None;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let cells = split_csv_line(line);

        if block.is_none() {
            block = Some(Block::from_header(&cells)?);
            continue;
        }

        let columns = match block.as_ref() {
            Some(Block::Data(columns)) => columns,
            Some(Block::Error(idx)) => {
                let message = cells
                    .get(*idx)
                    .filter(|m| !m.is_empty())
                    .cloned()
                    .unwrap_or_else(|| line.to_string());
                return Err(FetchError::Query(message));
            }
            None => continue,
        };

        let cell = |idx: usize| {
            cells
                .get(idx)
                .map(String::as_str)
                .ok_or_else(|| FetchError::Malformed(format!("short row: {}", line)))
        };

        let field = cell(columns.field)?;
        if !signals.iter().any(|s| s == field) {
            continue;
        }

        let time = cell(columns.time)?;
        let observed_at = DateTime::parse_from_rfc3339(time)
            .map_err(|e| FetchError::Malformed(format!("bad _time '{}': {}", time, e)))?
            .with_timezone(&Utc);

        let value = cell(columns.value)?.trim().parse::<f64>().ok();

        let newer = latest
            .get(field)
            .map(|existing| observed_at > existing.observed_at)
            .unwrap_or(true);
        if newer {
            latest.insert(field.to_string(), Observation::new(field, value, observed_at));
        }
    }

    Ok(latest)
}

/// Split one CSV line, honouring double-quoted cells
fn split_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => cells.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    cells.push(current);
    cells
}
