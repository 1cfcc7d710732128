//! InfluxDB 2.x adapter
//!
//! Writes observations as line protocol to `/api/v2/write` and evaluates
//! [`Query`] pipelines by rendering them to Flux for `/api/v2/query`. Query
//! responses are requested as plain CSV (header row, no annotations) and
//! decoded back into [`Table`]s using the `table` column as the group id.
//!
//! Flux never leaves this module.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde_json::json;
use tracing::{debug, warn};
use types::observation::{Observation, Tags, PRICE_FIELD};

use super::{Aggregate, Query, Record, SortOrder, StoreError, Table, TimeSeriesStore};

/// Connection parameters for an InfluxDB 2.x instance.
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    /// Base address, e.g. `http://localhost:8086`.
    pub url: String,
    /// API token sent as `Authorization: Token ...`.
    pub token: String,
    pub org: String,
    pub bucket: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// [`TimeSeriesStore`] backed by InfluxDB over HTTP.
pub struct InfluxStore {
    client: Client,
    config: InfluxConfig,
}

impl InfluxStore {
    pub fn new(config: InfluxConfig) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    fn auth(&self) -> String {
        format!("Token {}", self.config.token)
    }
}

async fn ensure_success(res: Response) -> Result<Response, StoreError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), body = %body, "InfluxDB rejected request");
    Err(StoreError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl TimeSeriesStore for InfluxStore {
    async fn write(&self, batch: &[Observation]) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let body = batch
            .iter()
            .map(line_protocol)
            .collect::<Vec<_>>()
            .join("\n");

        let res = self
            .client
            .post(self.endpoint("/api/v2/write"))
            .query(&[
                ("org", self.config.org.as_str()),
                ("bucket", self.config.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header(AUTHORIZATION, self.auth())
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;
        ensure_success(res).await?;

        debug!(points = batch.len(), bucket = %self.config.bucket, "Line protocol written");
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Table>, StoreError> {
        let flux = render_flux(&self.config.bucket, query);
        debug!(flux = %flux, "Submitting Flux query");

        let res = self
            .client
            .post(self.endpoint("/api/v2/query"))
            .query(&[("org", self.config.org.as_str())])
            .header(AUTHORIZATION, self.auth())
            .header(ACCEPT, "application/csv")
            .json(&json!({
                "query": flux,
                "type": "flux",
                "dialect": { "header": true, "annotations": [], "delimiter": "," },
            }))
            .send()
            .await?;
        let text = ensure_success(res).await?.text().await?;

        decode_csv(&text)
    }
}

// ── Line protocol ───────────────────────────────────────────────────

fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_tag(s: &str) -> String {
    s.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}

/// Encode one observation as an InfluxDB line.
///
/// `crypto_prices,exchange=kraken,pair=btcusd,type=market price=64000.5`
pub fn line_protocol(obs: &Observation) -> String {
    let mut line = escape_measurement(&obs.measurement);
    for (key, value) in obs.tags.iter().filter(|(_, v)| !v.is_empty()) {
        line.push(',');
        line.push_str(&escape_tag(key));
        line.push('=');
        line.push_str(&escape_tag(value));
    }
    line.push(' ');
    line.push_str(PRICE_FIELD);
    line.push('=');
    line.push_str(&obs.price.to_string());

    if let Some(nanos) = obs.timestamp.and_then(|ts| ts.timestamp_nanos_opt()) {
        line.push(' ');
        line.push_str(&nanos.to_string());
    }
    line
}

// ── Flux rendering ──────────────────────────────────────────────────

fn flux_string(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace("${", "\\${");
    format!("\"{}\"", escaped)
}

fn flux_columns(columns: &[String]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| flux_string(c)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Render a query pipeline as Flux against `bucket`.
pub fn render_flux(bucket: &str, query: &Query) -> String {
    let mut steps = vec![
        format!("from(bucket: {})", flux_string(bucket)),
        format!("range(start: -{})", query.window.magnitude()),
    ];

    if let Some(measurement) = &query.measurement {
        steps.push(format!(
            "filter(fn: (r) => r._measurement == {})",
            flux_string(measurement)
        ));
    }
    if let Some(field) = &query.field {
        steps.push(format!("filter(fn: (r) => r._field == {})", flux_string(field)));
    }
    for (key, value) in &query.tag_filters {
        steps.push(format!(
            "filter(fn: (r) => r[{}] == {})",
            flux_string(key),
            flux_string(value)
        ));
    }

    if let Some(Aggregate::StdDev { group_by, mode }) = &query.aggregate {
        steps.push(format!("group(columns: {})", flux_columns(group_by)));
        steps.push(format!("stddev(mode: {})", flux_string(mode.as_str())));
        steps.push("group()".to_string());
    }

    if let Some(SortOrder::Descending) = query.sort {
        steps.push(r#"sort(columns: ["_value"], desc: true)"#.to_string());
    }

    steps.join("\n  |> ")
}

// ── CSV decoding ────────────────────────────────────────────────────

/// Columns that are never treated as tags.
fn is_system_column(name: &str) -> bool {
    name.is_empty() || name == "result" || name == "table" || name.starts_with('_')
}

/// Header rows lead with the annotation column followed by `result,table`;
/// error responses lead with `error`. Data rows carry the result name and a
/// table id in those positions, so tag values never look like a header.
fn is_header(row: &csv::StringRecord) -> bool {
    let lead = (row.get(0), row.get(1), row.get(2));
    matches!(lead, (Some(""), Some("result"), Some("table")) | (Some("error"), _, _))
}

/// Decode a plain-CSV Flux response into tables.
///
/// A new header row may appear whenever the schema changes; rows are grouped
/// into tables by consecutive `table` ids. A null `_value` (stddev of a
/// single-sample group) decodes as `0.0`.
pub fn decode_csv(text: &str) -> Result<Vec<Table>, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut header: Option<Vec<String>> = None;
    let mut tables: Vec<Table> = Vec::new();
    let mut current_table: Option<String> = None;

    for row in reader.records() {
        let row = row.map_err(|e| StoreError::Decode(e.to_string()))?;
        if row.iter().all(str::is_empty) {
            continue;
        }

        if is_header(&row) {
            header = Some(row.iter().map(str::to_string).collect());
            current_table = None;
            continue;
        }

        let columns = header
            .as_ref()
            .ok_or_else(|| StoreError::Decode("data row before header".to_string()))?;

        if let Some(idx) = columns.iter().position(|c| c == "error") {
            let message = row.get(idx).unwrap_or_default();
            return Err(StoreError::Decode(format!("query error: {}", message)));
        }

        let mut value: Option<f64> = None;
        let mut time: Option<DateTime<Utc>> = None;
        let mut table_id: Option<&str> = None;
        let mut tags = Tags::new();

        for (name, cell) in columns.iter().zip(row.iter()) {
            match name.as_str() {
                "_value" => {
                    value = Some(if cell.is_empty() {
                        0.0
                    } else {
                        cell.parse()
                            .map_err(|_| StoreError::Decode(format!("bad _value {:?}", cell)))?
                    });
                }
                "_time" if !cell.is_empty() => {
                    let parsed = DateTime::parse_from_rfc3339(cell)
                        .map_err(|_| StoreError::Decode(format!("bad _time {:?}", cell)))?;
                    time = Some(parsed.with_timezone(&Utc));
                }
                "table" => table_id = Some(cell),
                other if !is_system_column(other) && !cell.is_empty() => {
                    tags.insert(other.to_string(), cell.to_string());
                }
                _ => {}
            }
        }

        let value = value.ok_or_else(|| StoreError::Decode("row without _value".to_string()))?;
        let table_id = table_id.unwrap_or_default().to_string();
        if tables.is_empty() || current_table.as_deref() != Some(table_id.as_str()) {
            tables.push(Table::default());
            current_table = Some(table_id);
        }
        if let Some(table) = tables.last_mut() {
            table.records.push(Record { value, time, tags });
        }
    }

    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StdDevMode;
    use chrono::TimeZone;
    use types::observation::{tag, MEASUREMENT};
    use types::window::RelativeWindow;

    fn observation(tags: &[(&str, &str)], price: f64) -> Observation {
        Observation {
            measurement: MEASUREMENT.to_string(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            price,
            timestamp: None,
        }
    }

    #[test]
    fn test_line_protocol_basic() {
        let obs = observation(
            &[
                (tag::VENUE_KIND, "market"),
                (tag::EXCHANGE, "binance-us"),
                (tag::PAIR, "atomusd"),
            ],
            12.5,
        );
        assert_eq!(
            line_protocol(&obs),
            "crypto_prices,exchange=binance-us,pair=atomusd,type=market price=12.5"
        );
    }

    #[test]
    fn test_line_protocol_escapes_and_timestamp() {
        let ts = Utc.timestamp_opt(1_700_000_000, 5).unwrap();
        let obs = observation(&[(tag::EXCHANGE, "a b,c=d")], 3.0).at(ts);
        assert_eq!(
            line_protocol(&obs),
            "crypto_prices,exchange=a\\ b\\,c\\=d price=3 1700000000000000005"
        );
    }

    #[test]
    fn test_render_series_flux() {
        let query = Query::range(RelativeWindow::parse("-24h").unwrap())
            .measurement(MEASUREMENT)
            .field(PRICE_FIELD)
            .tag_eq(tag::PAIR, "btcusd")
            .tag_eq(tag::EXCHANGE, "kraken");

        let expected = [
            r#"from(bucket: "crypto")"#,
            r#"  |> range(start: -24h)"#,
            r#"  |> filter(fn: (r) => r._measurement == "crypto_prices")"#,
            r#"  |> filter(fn: (r) => r._field == "price")"#,
            r#"  |> filter(fn: (r) => r["pair"] == "btcusd")"#,
            r#"  |> filter(fn: (r) => r["exchange"] == "kraken")"#,
        ]
        .join("\n");
        assert_eq!(render_flux("crypto", &query), expected);
    }

    #[test]
    fn test_render_rank_flux() {
        let query = Query::range(RelativeWindow::parse("90m").unwrap())
            .measurement(MEASUREMENT)
            .field(PRICE_FIELD)
            .stddev_by([tag::PAIR], StdDevMode::Sample)
            .sort_desc();

        let flux = render_flux("crypto", &query);
        assert!(flux.contains("range(start: -90m)"));
        assert!(flux.ends_with(
            "group(columns: [\"pair\"])\n  |> stddev(mode: \"sample\")\n  |> group()\n  |> sort(columns: [\"_value\"], desc: true)"
        ));
    }

    #[test]
    fn test_flux_string_escaping() {
        assert_eq!(flux_string(r#"a"b\c${d}"#), r#""a\"b\\c\${d}""#);
    }

    #[test]
    fn test_decode_series_tables() {
        let csv = "\
,result,table,_start,_stop,_time,_value,_field,_measurement,exchange,pair,type\r
,_result,0,2024-03-01T00:00:00Z,2024-03-02T00:00:00Z,2024-03-01T10:00:00Z,64000.5,price,crypto_prices,binance,btcusd,market\r
,_result,0,2024-03-01T00:00:00Z,2024-03-02T00:00:00Z,2024-03-01T10:01:00Z,64010,price,crypto_prices,binance,btcusd,market\r
,_result,1,2024-03-01T00:00:00Z,2024-03-02T00:00:00Z,2024-03-01T10:00:00Z,63990,price,crypto_prices,kraken,btcusd,market\r
\r
";
        let tables = decode_csv(csv).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].len(), 2);
        assert_eq!(tables[1].len(), 1);

        let first = &tables[0].records[0];
        assert_eq!(first.value, 64000.5);
        assert_eq!(first.time, Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()));
        assert_eq!(first.tag(tag::EXCHANGE), Some("binance"));
        assert_eq!(first.tag(tag::PAIR), Some("btcusd"));
        assert_eq!(first.tag("_field"), None);
        assert_eq!(tables[1].records[0].tag(tag::EXCHANGE), Some("kraken"));
    }

    #[test]
    fn test_decode_aggregate_table() {
        let csv = "\
,result,table,_value,pair\r
,_result,0,812.4,btcusd\r
,_result,0,31.2,ethusd\r
,_result,0,,dogeusd\r
";
        let tables = decode_csv(csv).unwrap();
        assert_eq!(tables.len(), 1);
        let rows: Vec<(&str, f64)> = tables[0]
            .records
            .iter()
            .map(|r| (r.tag(tag::PAIR).unwrap(), r.value))
            .collect();
        assert_eq!(rows, vec![("btcusd", 812.4), ("ethusd", 31.2), ("dogeusd", 0.0)]);
        assert!(tables[0].records.iter().all(|r| r.time.is_none()));
    }

    #[test]
    fn test_decode_tag_values_named_like_columns() {
        let csv = "\
,result,table,_value,exchange,pair\r
,_result,0,4.5,error,btcusd\r
,_result,0,2.5,_value,ethusd\r
";
        let tables = decode_csv(csv).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].len(), 2);
        assert_eq!(tables[0].records[0].tag(tag::EXCHANGE), Some("error"));
        assert_eq!(tables[0].records[0].value, 4.5);
        assert_eq!(tables[0].records[1].tag(tag::EXCHANGE), Some("_value"));
    }

    #[test]
    fn test_decode_empty_and_error() {
        assert!(decode_csv("").unwrap().is_empty());
        assert!(decode_csv("\r\n").unwrap().is_empty());

        let err = decode_csv("error,reference\r\nfailed to parse flux,897\r\n").unwrap_err();
        assert!(matches!(err, StoreError::Decode(msg) if msg.contains("failed to parse flux")));
    }

    #[tokio::test]
    async fn test_empty_write_skips_request() {
        let store = InfluxStore::new(InfluxConfig {
            url: "http://127.0.0.1:9".to_string(),
            token: "token".to_string(),
            org: "org".to_string(),
            bucket: "crypto".to_string(),
            timeout: Duration::from_millis(50),
        })
        .unwrap();

        assert!(store.write(&[]).await.is_ok());
        assert_eq!(store.endpoint("/api/v2/write"), "http://127.0.0.1:9/api/v2/write");
    }
}
