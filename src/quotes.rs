use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;
use crate::config::DataPaths;
use crate::error::QuoteError;
use crate::pricing::round_money;

pub const DEFAULT_TERMS: &str = "Standard T&C apply.";

/// Attempts at finding an unused quote id before giving up.
const ID_ATTEMPTS: usize = 8;

/// Serialises log appends across every store in the process, so the header
/// check and the row write happen as one step.
static LOG_LOCK: Mutex<()> = Mutex::new(());

/// A line item as sent by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteItem {
    pub name:       String,
    #[serde(deserialize_with = "crate::tools::whole_number")]
    pub qty:        u32,
    pub unit_price: f64,
    /// Line total after discounts; defaults to `qty × unit_price`.
    #[serde(default)]
    pub total:      Option<f64>,
}

impl QuoteItem {
    pub fn line_total(&self) -> f64 {
        self.total.unwrap_or(f64::from(self.qty) * self.unit_price)
    }
}

/// A generated quote, stored as `<quote_id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub quote_id:   String,
    pub customer:   String,
    pub items:      Vec<QuoteItem>,
    pub subtotal:   f64,
    pub total:      f64,
    pub terms:      String,
    pub created_at: DateTime<Utc>,
}

/// What listings show for each quote file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteSummary {
    pub quote_id:   String,
    pub customer:   String,
    pub total:      f64,
    pub item_count: usize,
    pub file_name:  String,
}

#[derive(Debug, Serialize)]
struct LogRow<'a> {
    quote_id: &'a str,
    customer: &'a str,
    total:    f64,
}

/// `Q-` followed by six upper-case hex characters.
pub fn new_quote_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("Q-{}", hex[..6].to_uppercase())
}

/// Ids become file names, so only a conservative alphabet is accepted.
pub fn validate_quote_id(id: &str) -> Result<(), QuoteError> {
    let ok = !id.is_empty()
        && id.len() <= 64
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok { Ok(()) } else { Err(QuoteError::InvalidQuoteId(id.to_string())) }
}

/// Builds a quote from line items, checking customer and items.
pub fn compose_quote(customer: &str, items: Vec<QuoteItem>, terms: Option<&str>) -> Result<Quote, QuoteError> {
    let customer = customer.trim();
    if customer.is_empty() {
        return Err(QuoteError::Invalid("customer must not be empty".to_string()));
    }
    if items.is_empty() {
        return Err(QuoteError::Invalid("a quote needs at least one item".to_string()));
    }
    if let Some(bad) = items.iter().find(|i| !i.unit_price.is_finite() || i.unit_price < 0.0) {
        return Err(QuoteError::Invalid(format!("item '{}' has an invalid unit_price", bad.name)));
    }

    let subtotal = round_money(items.iter().map(|i| f64::from(i.qty) * i.unit_price).sum());
    let total = round_money(items.iter().map(QuoteItem::line_total).sum());
    let terms = terms.map(str::trim).filter(|t| !t.is_empty()).unwrap_or(DEFAULT_TERMS);

    Ok(Quote {
        quote_id: new_quote_id(),
        customer: customer.to_string(),
        items,
        subtotal,
        total,
        terms: terms.to_string(),
        created_at: Utc::now(),
    })
}

/// Quote files on disk plus the append-only CSV log.
#[derive(Debug, Clone)]
pub struct QuoteStore {
    dir:     PathBuf,
    log_csv: PathBuf,
}

impl QuoteStore {
    pub fn new(paths: &DataPaths) -> Self {
        Self { dir: paths.quotes_dir.clone(), log_csv: paths.log_csv() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, quote_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", quote_id))
    }

    /// Writes the quote JSON and appends it to the log. An existing file is
    /// never overwritten: on an id collision the quote gets a fresh id.
    pub fn save(&self, quote: &mut Quote) -> Result<PathBuf, QuoteError> {
        validate_quote_id(&quote.quote_id)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| QuoteError::io(&self.dir, e))?;

        let (path, mut file) = self.create_unique(quote)?;
        let body = serde_json::to_string_pretty(quote)?;
        file.write_all(body.as_bytes()).map_err(|e| QuoteError::io(&path, e))?;

        self.append_log(quote)?;
        tracing::info!(quote_id = %quote.quote_id, path = %path.display(), total = quote.total, "quote saved");
        Ok(path)
    }

    fn create_unique(&self, quote: &mut Quote) -> Result<(PathBuf, std::fs::File), QuoteError> {
        for _ in 0..ID_ATTEMPTS {
            let path = self.path_for(&quote.quote_id);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let fresh = new_quote_id();
                    tracing::warn!(taken = %quote.quote_id, fresh = %fresh, "quote id already in use");
                    quote.quote_id = fresh;
                }
                Err(e) => return Err(QuoteError::io(&path, e)),
            }
        }
        Err(QuoteError::Invalid(format!("no free quote id after {} attempts", ID_ATTEMPTS)))
    }

    fn append_log(&self, quote: &Quote) -> Result<(), QuoteError> {
        let _guard = LOG_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(parent) = self.log_csv.parent() {
            std::fs::create_dir_all(parent).map_err(|e| QuoteError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_csv)
            .map_err(|e| QuoteError::io(&self.log_csv, e))?;
        let empty = file.metadata().map_err(|e| QuoteError::io(&self.log_csv, e))?.len() == 0;

        let mut writer = csv::WriterBuilder::new().has_headers(empty).from_writer(file);
        writer.serialize(LogRow { quote_id: &quote.quote_id, customer: &quote.customer, total: quote.total })
            .map_err(|e| QuoteError::csv(&self.log_csv, e))?;
        writer.flush().map_err(|e| QuoteError::io(&self.log_csv, e))
    }

    pub fn load(&self, quote_id: &str) -> Result<Quote, QuoteError> {
        validate_quote_id(quote_id)?;
        let path = self.path_for(quote_id);
        let body = match std::fs::read_to_string(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(QuoteError::QuoteNotFound(quote_id.to_string()));
            }
            Err(e) => return Err(QuoteError::io(&path, e)),
        };
        Ok(serde_json::from_str(&body)?)
    }

    /// Quote file paths, newest first by modification time.
    pub fn list(&self) -> Result<Vec<PathBuf>, QuoteError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(QuoteError::io(&self.dir, e)),
        };

        let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| QuoteError::io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = entry.metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((modified, path));
        }
        files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        Ok(files.into_iter().map(|(_, path)| path).collect())
    }

    pub fn count(&self) -> Result<usize, QuoteError> {
        Ok(self.list()?.len())
    }

    /// Summaries newest first. Unreadable files are skipped with a warning.
    pub fn summaries(&self) -> Result<Vec<QuoteSummary>, QuoteError> {
        let mut summaries = Vec::new();
        for path in self.list()? {
            let parsed = std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|body| serde_json::from_str::<Quote>(&body).map_err(|e| e.to_string()));
            match parsed {
                Ok(quote) => summaries.push(QuoteSummary {
                    item_count: quote.items.len(),
                    file_name:  path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
                    quote_id:   quote.quote_id,
                    customer:   quote.customer,
                    total:      quote.total,
                }),
                Err(error) => tracing::warn!(path = %path.display(), %error, "skipping unreadable quote file"),
            }
        }
        Ok(summaries)
    }
}
