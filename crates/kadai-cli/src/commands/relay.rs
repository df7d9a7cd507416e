//! `kadai relay`: delivery-side position relay.
//!
//! Positions arrive on stdin, one per line, from whatever device feed the
//! operator pipes in:
//!
//! ```text
//! 12.9716,77.5946     a position fix
//! error 1             a geolocation failure code (1 denied, 2 unavailable, 3 timeout)
//! ```
//!
//! Each fix becomes one PUT to the daemon. The relay ends on EOF, on a
//! failure code, or on Ctrl-C.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use kadai_schemas::GeoPoint;
use kadai_shop::{spawn_relay, GeoError, LocationSink, PositionSource, RelayOutcome};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::warn;

use super::load_config;

pub async fn run(order_id: String, url: Option<String>) -> Result<()> {
    let base = match url {
        Some(u) => u,
        None => format!("http://{}", load_config()?.server.addr),
    };

    let sink = HttpLocationSink::new(&base)?;
    let source = LinePositions::new(BufReader::new(tokio::io::stdin()).lines());
    let handle = spawn_relay(order_id.clone(), source, sink);
    println!("relay_started=true order_id={} daemon={}", order_id, base);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    while !handle.is_finished() {
        tokio::select! {
            _ = &mut ctrl_c => {
                handle.stop();
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }

    let report = handle.join().await?;
    let outcome = match report.outcome {
        RelayOutcome::Stopped => "stopped".to_string(),
        RelayOutcome::SourceEnded => "source_ended".to_string(),
        RelayOutcome::Failed(e) => {
            eprintln!("ERROR: {}", e);
            "failed".to_string()
        }
    };
    println!(
        "relay_outcome={} writes={} failed_writes={}",
        outcome, report.writes, report.failed_writes
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Source: stdin lines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Line {
    Blank,
    Fix(GeoPoint),
    Failure(GeoError),
}

fn parse_line(raw: &str) -> Result<Line, String> {
    let s = raw.trim();
    if s.is_empty() || s.starts_with('#') {
        return Ok(Line::Blank);
    }

    if let Some(code) = s.strip_prefix("error") {
        let code: u16 = code
            .trim()
            .parse()
            .map_err(|_| format!("bad error code in {s:?}"))?;
        return Ok(Line::Failure(GeoError::from_code(code)));
    }

    let (lat, lng) = s
        .split_once(',')
        .ok_or_else(|| format!("expected 'lat,lng', got {s:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|_| format!("bad latitude in {s:?}"))?;
    let lng: f64 = lng.trim().parse().map_err(|_| format!("bad longitude in {s:?}"))?;
    GeoPoint::new(lat, lng)
        .map(Line::Fix)
        .ok_or_else(|| format!("coordinates out of range: {s:?}"))
}

struct LinePositions<R> {
    lines: Lines<R>,
}

impl<R> LinePositions<R> {
    fn new(lines: Lines<R>) -> Self {
        Self { lines }
    }
}

#[async_trait]
impl<R> PositionSource for LinePositions<R>
where
    R: tokio::io::AsyncBufRead + Unpin + Send,
{
    async fn next_position(&mut self) -> Option<Result<GeoPoint, GeoError>> {
        loop {
            let raw = match self.lines.next_line().await {
                Ok(Some(l)) => l,
                Ok(None) => return None,
                Err(e) => {
                    warn!(error = %e, "position input failed");
                    return Some(Err(GeoError::PositionUnavailable));
                }
            };
            match parse_line(&raw) {
                Ok(Line::Blank) => continue,
                Ok(Line::Fix(at)) => return Some(Ok(at)),
                Ok(Line::Failure(e)) => return Some(Err(e)),
                Err(msg) => warn!(line = %msg, "skipping unreadable position line"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Sink: daemon HTTP API
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct LocationBody {
    lat: f64,
    lng: f64,
}

struct HttpLocationSink {
    client: reqwest::Client,
    base: String,
}

impl HttpLocationSink {
    fn new(base: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("build http client failed")?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LocationSink for HttpLocationSink {
    async fn write_location(&self, order_id: &str, at: GeoPoint) -> Result<()> {
        let url = format!("{}/v1/delivery/{}/location", self.base, order_id);
        self.client
            .put(&url)
            .json(&LocationBody {
                lat: at.lat,
                lng: at.lng,
            })
            .send()
            .await
            .with_context(|| format!("PUT {url} failed"))?
            .error_for_status()
            .with_context(|| format!("PUT {url} rejected"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixes_and_failure_codes() {
        assert_eq!(
            parse_line(" 12.5, 77.25 ").unwrap(),
            Line::Fix(GeoPoint::new(12.5, 77.25).unwrap())
        );
        assert_eq!(parse_line("").unwrap(), Line::Blank);
        assert_eq!(parse_line("# comment").unwrap(), Line::Blank);
        assert_eq!(
            parse_line("error 1").unwrap(),
            Line::Failure(GeoError::PermissionDenied)
        );
        assert_eq!(parse_line("error 9").unwrap(), Line::Failure(GeoError::Unknown));
    }

    #[test]
    fn rejects_garbage_and_out_of_range() {
        assert!(parse_line("north").is_err());
        assert!(parse_line("12.5;77.2").is_err());
        assert!(parse_line("91,0").is_err());
        assert!(parse_line("error x").is_err());
    }

    #[tokio::test]
    async fn line_source_skips_unreadable_lines() {
        let input: &[u8] = b"12.0,77.0\nnonsense\n\n12.1,77.1\nerror 3\n12.2,77.2\n";
        let mut src = LinePositions::new(BufReader::new(input).lines());
        assert_eq!(
            src.next_position().await,
            Some(Ok(GeoPoint::new(12.0, 77.0).unwrap()))
        );
        assert_eq!(
            src.next_position().await,
            Some(Ok(GeoPoint::new(12.1, 77.1).unwrap()))
        );
        assert_eq!(src.next_position().await, Some(Err(GeoError::Timeout)));
        assert_eq!(
            src.next_position().await,
            Some(Ok(GeoPoint::new(12.2, 77.2).unwrap()))
        );
        assert_eq!(src.next_position().await, None);
    }
}
