// # DNSPod DNS Provider
//
// This crate binds the `DnsProvider` record-store capability to the DNSPod
// HTTP API (dnsapi.cn).
//
// - ✅ One HTTP request per trait call (List, Create or Modify)
// - ✅ Full error propagation to the engine (no retry, no backoff)
// - ✅ gzip responses decoded by the core decoder
// - ✅ Dry-run mode for safe testing
// - ❌ NO decision logic (the reconciler decides whether to write)
// - ❌ NO caching between calls
//
// ## Security Requirements
//
// - The login token NEVER appears in logs or `Debug` output
// - Placeholder credentials are rejected before any request is made
//
// ## API Reference
//
// Every action is a form-encoded POST to `https://dnsapi.cn/<Action>` carrying
// `login_token=<id>,<token>`, `format=json`, `lang=en` and `error_on_empty=no`.
//
// - `Record.List`: `domain`, `sub_domain`, `record_type`
// - `Record.Create`: `domain`, `sub_domain`, `record_type`, `record_line`, `value`, `ttl`
// - `Record.Modify`: the Create fields plus `record_id`
//
// Responses carry `"status": {"code": "1", "message": ...}` on success. For
// `Record.List`, code `"10"` means the zone has no matching records.

use async_trait::async_trait;
use ddns_core::config::{ProviderConfig, is_placeholder};
use ddns_core::traits::{DnsProvider, DnsProviderFactory};
use ddns_core::{
    DesiredState, Error, HttpTransport, JsonView, ParseError, RecordQuery, RemoteRecord, Result,
    decode_unicode_escapes,
};

/// DNSPod API base URL
const DNSPOD_API_BASE: &str = "https://dnsapi.cn";

/// User agent sent with every request
const USER_AGENT: &str = concat!("ddnsd/", env!("CARGO_PKG_VERSION"));

/// Status code reported on success
const STATUS_OK: &str = "1";

/// Status code `Record.List` reports when nothing matches
const STATUS_NO_RECORDS: &str = "10";

/// Form body sent to the API
type Form = Vec<(&'static str, String)>;

/// DNSPod DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform `Record.List` normally
/// - Log the intended Create/Modify call
/// - **NOT** actually modify DNS records
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the token.
pub struct DnspodProvider {
    /// API token id
    id: String,

    /// API token secret
    /// ⚠️ NEVER log this value
    token: String,

    /// Endpoint root, without trailing slash
    api_base: String,

    /// gzip-aware HTTP transport
    transport: HttpTransport,

    /// Dry-run mode: if true, list records but skip Create/Modify
    dry_run: bool,
}

// Custom Debug implementation that hides the token
impl std::fmt::Debug for DnspodProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnspodProvider")
            .field("id", &self.id)
            .field("token", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl DnspodProvider {
    /// Create a new DNSPod provider
    ///
    /// Credentials are not checked here; [`DnsProvider::check_credentials`]
    /// rejects placeholders at the start of every pass.
    pub fn new(id: impl Into<String>, token: impl Into<String>, dry_run: bool) -> Result<Self> {
        Ok(Self {
            id: id.into(),
            token: token.into(),
            api_base: DNSPOD_API_BASE.to_string(),
            transport: HttpTransport::new("dnspod", USER_AGENT)?,
            dry_run,
        })
    }

    /// Point the provider at a different endpoint root
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether Create/Modify are skipped
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Fields every action carries
    fn base_form(&self) -> Form {
        vec![
            ("login_token", format!("{},{}", self.id, self.token)),
            ("format", "json".to_string()),
            ("lang", "en".to_string()),
            ("error_on_empty", "no".to_string()),
        ]
    }

    fn list_form(&self, query: &RecordQuery) -> Form {
        let mut form = self.base_form();
        form.extend([
            ("domain", query.domain.clone()),
            ("sub_domain", query.subdomain.clone()),
            ("record_type", query.record_type.clone()),
        ]);
        form
    }

    fn create_form(&self, desired: &DesiredState) -> Form {
        let mut form = self.base_form();
        form.extend([
            ("domain", desired.domain.clone()),
            ("sub_domain", desired.subdomain.clone()),
            ("record_type", desired.record_type.clone()),
            ("record_line", desired.line.clone()),
            ("value", desired.value.clone()),
            ("ttl", desired.ttl.to_string()),
        ]);
        form
    }

    fn modify_form(&self, id: &str, desired: &DesiredState) -> Form {
        let mut form = self.create_form(desired);
        form.push(("record_id", id.to_string()));
        form
    }

    /// POST `form` to `action`, returning the decoded body
    async fn call(&self, action: &str, form: &Form) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.api_base, action);
        self.transport.post_form(&url, form).await
    }

    /// Log a mutating call without sending it
    fn log_dry_run(&self, action: &str, form: &Form) {
        let fields: Vec<String> = form
            .iter()
            .filter(|(key, _)| *key != "login_token")
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        tracing::info!("[DRY-RUN] Would send {} with {}", action, fields.join("&"));
    }
}

/// Build the error for a non-success status block
fn status_error(action: &str, status: &JsonView<'_>, code: &str) -> Error {
    let message = status
        .get_string("message")
        .map(|m| decode_unicode_escapes(&m))
        .unwrap_or_else(|_| "no message".to_string());
    Error::provider("dnspod", format!("{} failed: {} (code {})", action, message, code))
}

/// Status code of a response body
fn status_code<'a>(body: &'a [u8]) -> Result<(JsonView<'a>, String)> {
    let status = JsonView::new(body).get_object("status")?;
    let code = status.get_string("code")?;
    Ok((status, code))
}

/// Fail unless the response reports success
fn check_status(action: &str, body: &[u8]) -> Result<()> {
    let (status, code) = status_code(body)?;
    if code != STATUS_OK {
        return Err(status_error(action, &status, &code));
    }
    Ok(())
}

/// A numeric field DNSPod may send either quoted or bare
fn numeric_field(record: &JsonView<'_>, key: &str) -> Result<String> {
    match record.get_string(key) {
        Ok(value) => Ok(value),
        Err(ParseError::TypeMismatch { .. }) => Ok(record.get_int(key)?.to_string()),
        Err(e) => Err(e.into()),
    }
}

/// Extract the record named by `query` from a `Record.List` body
fn parse_record_list(body: &[u8], query: &RecordQuery) -> Result<Option<RemoteRecord>> {
    let (status, code) = status_code(body)?;
    if code == STATUS_NO_RECORDS {
        return Ok(None);
    }
    if code != STATUS_OK {
        return Err(status_error("Record.List", &status, &code));
    }

    let view = JsonView::new(body);
    let record = match view.find_in_array("records", "name", &query.subdomain) {
        Ok(record) => record,
        Err(ParseError::ElementNotFound { .. }) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let record_type = record.get_string("type")?;
    if record_type != query.record_type {
        return Err(Error::provider(
            "dnspod",
            format!(
                "{} is a {} record, expected {}",
                query.subdomain, record_type, query.record_type
            ),
        ));
    }

    let ttl = numeric_field(&record, "ttl")?;
    let ttl = ttl.parse::<u32>().map_err(|_| {
        Error::from(ParseError::InvalidFormat(format!("ttl \"{}\" is not a valid TTL", ttl)))
    })?;

    Ok(Some(RemoteRecord {
        id: numeric_field(&record, "id")?,
        value: record.get_string("value")?,
        ttl,
    }))
}

#[async_trait]
impl DnsProvider for DnspodProvider {
    async fn list_record(&self, query: &RecordQuery) -> Result<Option<RemoteRecord>> {
        tracing::debug!(
            "Listing {} records for {} in {}",
            query.record_type,
            query.subdomain,
            query.domain
        );
        let body = self.call("Record.List", &self.list_form(query)).await?;
        let record = parse_record_list(&body, query)?;

        match &record {
            Some(r) => tracing::debug!("Found record {}: {} (ttl {})", r.id, r.value, r.ttl),
            None => tracing::debug!("No {} record for {}", query.record_type, query.subdomain),
        }
        Ok(record)
    }

    async fn create_record(&self, desired: &DesiredState) -> Result<()> {
        let form = self.create_form(desired);
        if self.dry_run {
            self.log_dry_run("Record.Create", &form);
            return Ok(());
        }

        let body = self.call("Record.Create", &form).await?;
        check_status("Record.Create", &body)?;

        if let Ok(id) = JsonView::new(&body)
            .get_object("record")
            .and_then(|record| record.get_string("id"))
        {
            tracing::debug!("DNSPod assigned record id {}", id);
        }
        Ok(())
    }

    async fn modify_record(&self, id: &str, desired: &DesiredState) -> Result<()> {
        let form = self.modify_form(id, desired);
        if self.dry_run {
            self.log_dry_run("Record.Modify", &form);
            return Ok(());
        }

        let body = self.call("Record.Modify", &form).await?;
        check_status("Record.Modify", &body)
    }

    fn check_credentials(&self) -> Result<()> {
        if is_placeholder(&self.id) || is_placeholder(&self.token) {
            return Err(Error::config(
                "DNSPod credentials are missing or still set to the template placeholder",
            ));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "dnspod"
    }
}

/// Whether a `DDNS_MODE` value asks for dry-run mode
pub fn dry_run_requested(mode: Option<&str>) -> bool {
    mode.is_some_and(|m| m.trim().eq_ignore_ascii_case("dry-run"))
}

/// Factory for creating DNSPod providers
pub struct DnspodFactory;

impl DnsProviderFactory for DnspodFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Dnspod { id, token, api_base } => {
                // DDNS_MODE is read here only; the daemon does not duplicate it
                let dry_run = dry_run_requested(std::env::var("DDNS_MODE").ok().as_deref());

                if dry_run {
                    tracing::warn!("DNSPod provider running in DRY-RUN mode - no changes will be made");
                }

                let mut provider = DnspodProvider::new(id.clone(), token.clone(), dry_run)?;
                if let Some(base) = api_base {
                    provider = provider.with_api_base(base.clone());
                }
                Ok(Box::new(provider))
            }
            _ => Err(Error::config("Invalid config for DNSPod provider")),
        }
    }
}

/// Register the DNSPod provider with a registry
///
/// # Example
///
/// ```rust
/// use ddns_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// ddns_provider_dnspod::register(&registry);
/// assert!(registry.has_provider("dnspod"));
/// ```
pub fn register(registry: &ddns_core::ProviderRegistry) {
    registry.register_provider("dnspod", Box::new(DnspodFactory));
}
