use serde::{Deserialize, Serialize};
use std::path::Path;
use crate::config::DataPaths;
use crate::error::QuoteError;

/// One row of `products.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub sku:        String,
    pub name:       String,
    pub unit_price: f64,
    pub tier:       String,
}

/// One row of `historical_quotes.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalQuote {
    pub quote_id:   String,
    pub customer:   String,
    pub product:    String,
    pub qty:        u32,
    pub unit_price: f64,
    pub total:      f64,
    pub accepted:   String,
    pub notes:      String,
}

/// Result of `price_lookup`, serialized as the tool output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceLookup {
    pub found: bool,
    #[serde(flatten)]
    pub product: Option<Product>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Which seed files `ensure_data` had to create.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub products_created: bool,
    pub history_created:  bool,
}

fn seed_products() -> Vec<Product> {
    let row = |sku: &str, name: &str, unit_price: f64, tier: &str| Product {
        sku: sku.to_string(),
        name: name.to_string(),
        unit_price,
        tier: tier.to_string(),
    };
    vec![
        row("CH-100", "Office Chair",     1500.0,  "standard"),
        row("TB-200", "Conference Table", 12000.0, "premium"),
        row("DS-300", "Developer Desk",   8000.0,  "standard"),
        row("ST-400", "Visitor Stool",    900.0,   "basic"),
    ]
}

fn seed_history() -> Vec<HistoricalQuote> {
    vec![
        HistoricalQuote {
            quote_id: "Q001".to_string(), customer: "ABC Corp".to_string(),
            product: "Office Chair".to_string(), qty: 100, unit_price: 1400.0,
            total: 140000.0, accepted: "Yes".to_string(), notes: "bulk discount".to_string(),
        },
        HistoricalQuote {
            quote_id: "Q002".to_string(), customer: "XYZ Ltd".to_string(),
            product: "Conference Table".to_string(), qty: 10, unit_price: 11000.0,
            total: 110000.0, accepted: "No".to_string(), notes: "requested warranty".to_string(),
        },
    ]
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), QuoteError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| QuoteError::csv(path, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| QuoteError::csv(path, e))?;
    }
    writer.flush().map_err(|e| QuoteError::io(path, e))
}

fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>, QuoteError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| QuoteError::csv(path, e))?;
    reader.deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| QuoteError::csv(path, e))
}

/// Creates the data and quote directories and seeds the mock CSVs.
/// Existing files are never overwritten.
pub fn ensure_data(paths: &DataPaths) -> Result<SeedReport, QuoteError> {
    for dir in [&paths.data_dir, &paths.quotes_dir] {
        std::fs::create_dir_all(dir).map_err(|e| QuoteError::io(dir, e))?;
    }

    let mut report = SeedReport::default();

    let products = paths.products_csv();
    if !products.exists() {
        write_rows(&products, &seed_products())?;
        report.products_created = true;
        tracing::info!(path = %products.display(), "seeded product catalog");
    }

    let history = paths.history_csv();
    if !history.exists() {
        write_rows(&history, &seed_history())?;
        report.history_created = true;
        tracing::info!(path = %history.display(), "seeded historical quotes");
    }

    Ok(report)
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase().trim_end_matches('s').to_string()
}

/// The product catalog as read from `products.csv`.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn load(path: &Path) -> Result<Self, QuoteError> {
        Ok(Self::new(read_rows(path)?))
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn names(&self) -> Vec<&str> {
        self.products.iter().map(|p| p.name.as_str()).collect()
    }

    /// Exact (case-insensitive) name first, then plural-insensitive
    /// containment in either direction.
    pub fn find(&self, query: &str) -> Option<&Product> {
        let exact = query.trim().to_lowercase();
        if exact.is_empty() {
            return None;
        }
        if let Some(product) = self.products.iter().find(|p| p.name.to_lowercase() == exact) {
            return Some(product);
        }

        let wanted = normalize(query);
        if wanted.is_empty() {
            return None;
        }
        self.products.iter().find(|p| {
            let name = normalize(&p.name);
            name.contains(&wanted) || wanted.contains(&name)
        })
    }

    pub fn lookup(&self, query: &str) -> PriceLookup {
        match self.find(query) {
            Some(product) => PriceLookup { found: true, product: Some(product.clone()), message: None },
            None => PriceLookup {
                found: false,
                product: None,
                message: Some(format!(
                    "No product matching '{}'. Available: {}", query, self.names().join(", ")
                )),
            },
        }
    }
}

/// Up to `top_k` past quotes whose product name contains `product_name`.
pub fn historical_match(path: &Path, product_name: &str, top_k: usize) -> Result<Vec<HistoricalQuote>, QuoteError> {
    let wanted = product_name.trim().to_lowercase();
    let rows: Vec<HistoricalQuote> = read_rows(path)?;
    Ok(rows.into_iter()
        .filter(|q| q.product.to_lowercase().contains(&wanted))
        .take(top_k)
        .collect())
}
