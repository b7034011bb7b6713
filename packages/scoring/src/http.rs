//! HTTP client for a remote scoring service.
//!
//! Sends `POST {url}` with a camelCase JSON body
//! `{ "lat", "lng", "areaType", "hourOfDay" }` and expects a JSON object
//! with any subset of the [`ScoreResult`] fields. The overall score is
//! required (as `overallScore` or `score`); every other field has a
//! default. The assembled result is range-checked before it is returned.

use std::time::Duration;

use safezone_area_models::{AlertLevel, AreaType, LatLng, ScoreResult, ScoreValidationError, Trend};
use serde::{Deserialize, Serialize};

use crate::{AreaScorer, ScoreOptions, ScoringError};

/// Confidence assumed when the service omits it.
const DEFAULT_CONFIDENCE: f64 = 50.0;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoreRequest {
    lat: f64,
    lng: f64,
    area_type: AreaType,
    hour_of_day: u32,
}

/// Response shape with every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawScore {
    #[serde(alias = "score")]
    overall_score: Option<f64>,
    confidence: Option<f64>,
    alert_level: Option<AlertLevel>,
    recommendations: Option<Vec<String>>,
    trend: Option<Trend>,
    prediction_score: Option<f64>,
    volatility: Option<f64>,
}

impl RawScore {
    fn into_result(self) -> Result<ScoreResult, ScoringError> {
        let overall_score = self.overall_score.ok_or(ScoreValidationError {
            field: "overallScore",
            reason: "missing",
        })?;

        Ok(ScoreResult {
            overall_score,
            confidence: self.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            alert_level: self
                .alert_level
                .unwrap_or_else(|| AlertLevel::from_score(overall_score)),
            recommendations: self.recommendations.unwrap_or_default(),
            trend: self.trend.unwrap_or(Trend::Stable),
            prediction_score: self.prediction_score.unwrap_or(overall_score),
            volatility: self.volatility.unwrap_or(0.0),
        }
        .validate()?)
    }
}

/// Parses a scoring service response body.
///
/// # Errors
///
/// Returns [`ScoringError`] if the body does not have the expected shape
/// or any value is out of range.
pub fn parse_response(body: serde_json::Value) -> Result<ScoreResult, ScoringError> {
    let raw: RawScore = serde_json::from_value(body)?;
    raw.into_result()
}

/// [`AreaScorer`] backed by a remote HTTP service.
pub struct HttpScorer {
    client: reqwest::Client,
    url: String,
}

impl HttpScorer {
    /// Creates a scorer posting to `url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::Http`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ScoringError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait::async_trait]
impl AreaScorer for HttpScorer {
    async fn score(
        &self,
        position: LatLng,
        options: &ScoreOptions,
    ) -> Result<ScoreResult, ScoringError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&ScoreRequest {
                lat: position.lat,
                lng: position.lng,
                area_type: options.area_type,
                hour_of_day: options.hour_of_day,
            })
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ScoringError::RateLimited);
        }
        if !status.is_success() {
            return Err(ScoringError::Status {
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = resp.json().await?;
        parse_response(body)
    }
}
