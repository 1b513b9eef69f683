//! HTTP client for the time-series store and the bridge operations that
//! compose the write and read paths.
//!
//! The core crates are pure transformations; everything that touches the
//! network lives here. The client accepts already-prepared point batches
//! for write and hands raw result sets back to the reconstructor — it
//! never retries, and it treats any store failure as terminal for that
//! call.

mod line_protocol;

use chrono::Utc;
use fluxbridge_frame::Frame;
use fluxbridge_query::{QueryFilter, QueryResponse, first_last_summary, reconstruct, unstack};
use fluxbridge_write::{ConvertOptions, Point, TagPreset, convert, partition};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde_json::Value;
use tracing::debug;
use url::Url;

/// Primary error type for the [`Client`]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("base URL error: {0}")]
    BaseUrl(#[from] url::ParseError),

    #[error("failed to send {method} {path} request: {source}")]
    RequestSend {
        method: Method,
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server responded with error [{code}]: {message}")]
    Api { code: StatusCode, message: String },

    #[error("failed to parse JSON response: {0}")]
    Json(#[source] reqwest::Error),

    #[error("failed to read response text: {0}")]
    Text(#[source] reqwest::Error),

    #[error(transparent)]
    Write(#[from] fluxbridge_write::Error),

    #[error(transparent)]
    Query(#[from] fluxbridge_query::Error),

    #[error(transparent)]
    Frame(#[from] fluxbridge_frame::Error),
}

impl Error {
    fn request_send(method: Method, path: impl Into<String>, source: reqwest::Error) -> Self {
        Self::RequestSend {
            method,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Default number of points per write request
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Connection settings for a [`Client`].
///
/// An explicit value object passed at construction; defaults are named
/// constants, not ambient state.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    url: String,
    database: String,
    auth_token: Option<String>,
    batch_size: usize,
    timezone: Option<String>,
}

impl ClientConfig {
    /// Settings for a server at `url` and a target `database`
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            auth_token: None,
            batch_size: DEFAULT_BATCH_SIZE,
            timezone: None,
        }
    }

    /// Send a `Bearer` token with every request
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Override the number of points per write request
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Present read results in this timezone unless a filter names its own
    pub fn with_timezone(mut self, zone: impl Into<String>) -> Self {
        self.timezone = Some(zone.into());
        self
    }
}

/// Client to a server speaking the store's HTTP API
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    database: String,
    batch_size: usize,
    timezone: Option<String>,
    auth_token: Option<Secret<String>>,
    http_client: reqwest::Client,
}

/// Schema summary for one measurement
#[derive(Debug, Clone)]
pub struct MeasurementInfo {
    /// The measurement described
    pub measurement: String,
    /// First/last field values, when the measurement holds any data
    pub time_extent: Option<Frame>,
    /// Tag keys indexed for the measurement
    pub tag_keys: Vec<String>,
    /// Field keys with their store-side types
    pub field_keys: Vec<(String, String)>,
}

impl Client {
    /// Create a new [`Client`] from explicit settings
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(&config.url)?,
            database: config.database,
            batch_size: config.batch_size,
            timezone: config.timezone,
            auth_token: config.auth_token.map(Secret::new),
            http_client: reqwest::Client::new(),
        })
    }

    /// Write a batch of points to the configured database.
    ///
    /// Points without a timestamp are stamped with one shared instant at
    /// this dispatch, so defaulted timestamps within a batch are coherent.
    /// The batch is written in chunks of the configured batch size; any
    /// failed chunk fails the call.
    pub async fn write_points(&self, mut points: Vec<Point>) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }
        let now = Utc::now();
        for point in &mut points {
            point.stamp_if_unset(now);
        }

        let url = self.base_url.join("/write")?;
        for chunk in points.chunks(self.batch_size) {
            let body = line_protocol::render(chunk);
            let mut request = self
                .http_client
                .post(url.clone())
                .query(&[("db", self.database.as_str()), ("precision", "ns")])
                .body(body);
            if let Some(token) = &self.auth_token {
                request = request.bearer_auth(token.expose_secret());
            }
            let response = request
                .send()
                .await
                .map_err(|src| Error::request_send(Method::POST, "/write", src))?;
            let status = response.status();
            if status != StatusCode::NO_CONTENT && status != StatusCode::OK {
                return Err(Error::Api {
                    code: status,
                    message: response.text().await.map_err(Error::Text)?,
                });
            }
            debug!(points = chunk.len(), database = %self.database, "wrote point batch");
        }
        Ok(points.len())
    }

    /// Execute a rendered query against the configured database
    pub async fn query(&self, query: &str) -> Result<QueryResponse> {
        self.run_query(Method::GET, query).await
    }

    async fn run_query(&self, method: Method, query: &str) -> Result<QueryResponse> {
        let url = self.base_url.join("/query")?;
        let request = if method == Method::POST {
            self.http_client.post(url)
        } else {
            self.http_client.get(url)
        };
        let mut request = request.query(&[("db", self.database.as_str()), ("q", query)]);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }
        let response = request
            .send()
            .await
            .map_err(|src| Error::request_send(method, "/query", src))?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::Api {
                code: status,
                message: response.text().await.map_err(Error::Text)?,
            });
        }
        response.json().await.map_err(Error::Json)
    }

    /// Fail on statement-level errors the store reports inside a 200 response
    fn check_statements(response: &QueryResponse) -> Result<()> {
        for result in &response.results {
            if let Some(message) = &result.error {
                return Err(Error::Query(fluxbridge_query::Error::Store {
                    message: message.clone(),
                }));
            }
        }
        Ok(())
    }

    /// Convert `frame` to points and write them
    pub async fn write_frame(
        &self,
        frame: &Frame,
        measurement: &str,
        options: &ConvertOptions,
    ) -> Result<usize> {
        let points = convert(frame, measurement, options)?;
        self.write_points(points).await
    }

    /// Write `frame` with a preset's tag mapping applied as constant tags
    pub async fn write_frame_with_preset(
        &self,
        frame: &Frame,
        measurement: &str,
        preset: TagPreset,
    ) -> Result<usize> {
        let options = ConvertOptions::new().additional_tags(preset.into_tags());
        self.write_frame(frame, measurement, &options).await
    }

    /// Partition `frame` by `tag_columns` and write one homogeneous batch
    /// per distinct tag combination.
    ///
    /// Each batch carries the group's tag set as constant tags and only the
    /// non-tag columns as data.
    pub async fn write_partitioned(
        &self,
        frame: &Frame,
        measurement: &str,
        tag_columns: &[&str],
    ) -> Result<usize> {
        let groups = partition(frame, tag_columns)?;
        let value_columns: Vec<String> = frame
            .column_names()
            .filter(|name| !tag_columns.contains(name))
            .map(str::to_owned)
            .collect();
        debug!(
            groups = groups.len(),
            measurement, "writing partitioned frame"
        );

        let mut written = 0;
        for group in groups {
            let sub = frame.take_rows(&group.rows).select_columns(&value_columns)?;
            let options = ConvertOptions::new().additional_tags(group.tags);
            written += self.write_frame(&sub, measurement, &options).await?;
        }
        Ok(written)
    }

    /// Run a range read and reconstruct the result.
    ///
    /// `Ok(None)` means the query matched nothing — a normal outcome, not
    /// an error. The configured timezone applies when the filter does not
    /// name its own.
    pub async fn read_range(&self, filter: &QueryFilter) -> Result<Option<Frame>> {
        let filter = match (&self.timezone, filter.timezone_name()) {
            (Some(zone), None) => filter.clone().timezone(zone.as_str()),
            _ => filter.clone(),
        };
        let response = self.query(&filter.render()).await?;
        Ok(reconstruct(
            &response,
            filter.measurement(),
            filter.timezone_name(),
        )?)
    }

    /// Range read for a filter carrying an aggregation; identical plumbing
    /// to [`Client::read_range`]
    pub async fn read_aggregated(&self, filter: &QueryFilter) -> Result<Option<Frame>> {
        self.read_range(filter).await
    }

    /// Range read followed by the narrow-to-wide name/value pivot
    pub async fn read_range_unstacked(&self, filter: &QueryFilter) -> Result<Option<Frame>> {
        Ok(self.read_range(filter).await?.map(|frame| unstack(&frame)))
    }

    /// The newest point of a measurement within the lookback window,
    /// filtered by tag equality
    pub async fn read_last_point<I, K, V>(
        &self,
        measurement: &str,
        tags: I,
    ) -> Result<Option<Frame>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let filter = QueryFilter::last_point(measurement).tags(tags);
        self.read_range(&filter).await
    }

    /// Create `database` unless it already exists. Returns whether it was
    /// created.
    pub async fn create_database(&self, database: &str) -> Result<bool> {
        let existing = self.list_databases().await?;
        if existing.iter().any(|name| name == database) {
            debug!(database, "database already exists");
            return Ok(false);
        }
        let response = self
            .run_query(Method::POST, &format!("CREATE DATABASE {database}"))
            .await?;
        Self::check_statements(&response)?;
        Ok(true)
    }

    /// Names of all databases on the server
    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let response = self.query("SHOW DATABASES").await?;
        Self::check_statements(&response)?;
        Ok(first_column_strings(&response))
    }

    /// Drop one measurement from the configured database
    pub async fn drop_measurement(&self, measurement: &str) -> Result<()> {
        let response = self
            .run_query(Method::POST, &format!("DROP MEASUREMENT {measurement}"))
            .await?;
        Self::check_statements(&response)
    }

    /// Names of all measurements in the configured database
    pub async fn list_measurements(&self) -> Result<Vec<String>> {
        let response = self.query(&fluxbridge_query::show_measurements()).await?;
        Self::check_statements(&response)?;
        Ok(first_column_strings(&response))
    }

    /// Time extent, tag keys, and field keys of one measurement
    pub async fn measurement_info(&self, measurement: &str) -> Result<MeasurementInfo> {
        let extent = self.query(&first_last_summary(measurement)).await?;
        let time_extent = reconstruct(&extent, measurement, None)?;

        let tags = self
            .query(&fluxbridge_query::show_tag_keys(measurement))
            .await?;
        Self::check_statements(&tags)?;
        let tag_keys = first_column_strings(&tags);

        let fields = self
            .query(&fluxbridge_query::show_field_keys(measurement))
            .await?;
        Self::check_statements(&fields)?;
        let field_keys = fields
            .series()
            .flat_map(|s| s.values.iter())
            .filter_map(|row| match (row.first(), row.get(1)) {
                (Some(Value::String(key)), Some(Value::String(kind))) => {
                    Some((key.clone(), kind.clone()))
                }
                _ => None,
            })
            .collect();

        Ok(MeasurementInfo {
            measurement: measurement.to_owned(),
            time_extent,
            tag_keys,
            field_keys,
        })
    }
}

/// First-column string values across every series of a response, the shape
/// `SHOW ...` statements return
fn first_column_strings(response: &QueryResponse) -> Vec<String> {
    response
        .series()
        .flat_map(|s| s.values.iter())
        .filter_map(|row| match row.first() {
            Some(Value::String(name)) => Some(name.clone()),
            _ => None,
        })
        .collect()
}
