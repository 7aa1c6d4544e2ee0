//! The quoting tools offered to the model, bound to one set of data paths.

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use crate::catalog::{historical_match, Catalog};
use crate::config::DataPaths;
use crate::pricing::{calculate_discount, CustomerType};
use crate::quotes::{compose_quote, QuoteItem, QuoteStore};
use crate::tools::{optional_whole_number, parse_args, whole_number, ToolRegistry};

pub const PRICE_LOOKUP: &str = "price_lookup";
pub const DISCOUNT_CALCULATOR: &str = "discount_calculator";
pub const HISTORICAL_MATCH: &str = "historical_match";
pub const QUOTE_GENERATOR: &str = "quote_generator";

const DEFAULT_TOP_K: usize = 2;

#[derive(Deserialize)]
struct PriceLookupArgs {
    product_name: String,
}

#[derive(Deserialize)]
struct DiscountArgs {
    unit_price: f64,
    #[serde(deserialize_with = "whole_number")]
    qty: u32,
    #[serde(default)]
    customer_type: Option<String>,
}

#[derive(Deserialize)]
struct HistoryArgs {
    product_name: String,
    #[serde(default, deserialize_with = "optional_whole_number")]
    top_k: Option<u32>,
}

#[derive(Deserialize)]
struct QuoteArgs {
    customer: String,
    #[serde(default)]
    items: Option<Vec<QuoteItem>>,
    /// Some models send the item list as a JSON string instead.
    #[serde(default)]
    items_json: Option<String>,
    #[serde(default)]
    terms: Option<String>,
}

impl QuoteArgs {
    fn into_items(self) -> Result<(String, Vec<QuoteItem>, Option<String>), String> {
        let items = match (self.items, self.items_json) {
            (Some(items), _) => items,
            (None, Some(raw)) => serde_json::from_str(&raw)
                .map_err(|e| format!("Invalid items_json format. Expected JSON array string: {}", e))?,
            (None, None) => return Err("Either `items` or `items_json` is required".to_string()),
        };
        Ok((self.customer, items, self.terms))
    }
}

fn to_output<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("Could not encode tool output: {}", e))
}

fn price_lookup_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "product_name": {
                "type": "string",
                "description": "Name of the product to search for"
            }
        },
        "required": ["product_name"]
    })
}

fn discount_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "unit_price": { "type": "number", "description": "Price per unit" },
            "qty": { "type": "integer", "description": "Quantity needed" },
            "customer_type": {
                "type": "string",
                "description": "Type of customer: 'regular' or 'preferred'",
                "enum": ["regular", "preferred"]
            }
        },
        "required": ["unit_price", "qty"]
    })
}

fn history_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "product_name": {
                "type": "string",
                "description": "Product to find past quotes for"
            },
            "top_k": {
                "type": "integer",
                "description": "Maximum number of historical quotes to return (default 2)"
            }
        },
        "required": ["product_name"]
    })
}

fn quote_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "customer": { "type": "string", "description": "Customer company name" },
            "items": {
                "type": "array",
                "description": "List of items for the quote",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "qty": { "type": "integer" },
                        "unit_price": { "type": "number" },
                        "total": { "type": "number", "description": "Line total after discounts" }
                    },
                    "required": ["name", "qty", "unit_price"]
                }
            },
            "terms": { "type": "string", "description": "Terms and conditions" }
        },
        "required": ["customer", "items"]
    })
}

/// Registers the four quoting tools. Every call re-reads the CSV files, so
/// edits to the catalog are picked up without a restart.
pub fn quoting_tools(paths: &DataPaths) -> ToolRegistry {
    let paths = Arc::new(paths.clone());
    let mut registry = ToolRegistry::new();

    let p = Arc::clone(&paths);
    registry.register(
        PRICE_LOOKUP,
        "Look up product information and pricing by product name",
        price_lookup_schema(),
        Arc::new(move |args: &HashMap<String, Value>| {
            let args: PriceLookupArgs = parse_args(args)?;
            let catalog = Catalog::load(&p.products_csv()).map_err(|e| e.to_string())?;
            to_output(&catalog.lookup(&args.product_name))
        }),
    );

    registry.register(
        DISCOUNT_CALCULATOR,
        "Calculate discounts based on quantity and customer type",
        discount_schema(),
        Arc::new(|args: &HashMap<String, Value>| {
            let args: DiscountArgs = parse_args(args)?;
            let customer = CustomerType::parse_lenient(args.customer_type.as_deref());
            to_output(&calculate_discount(args.unit_price, args.qty, customer)?)
        }),
    );

    let p = Arc::clone(&paths);
    registry.register(
        HISTORICAL_MATCH,
        "Find past quotes for a product to compare against",
        history_schema(),
        Arc::new(move |args: &HashMap<String, Value>| {
            let args: HistoryArgs = parse_args(args)?;
            let matches = historical_match(&p.history_csv(), &args.product_name, args.top_k.map_or(DEFAULT_TOP_K, |k| k as usize))
                .map_err(|e| e.to_string())?;
            to_output(&matches)
        }),
    );

    let store = QuoteStore::new(&paths);
    registry.register(
        QUOTE_GENERATOR,
        "Generate and save a formal quote document",
        quote_schema(),
        Arc::new(move |args: &HashMap<String, Value>| {
            let (customer, items, terms) = parse_args::<QuoteArgs>(args)?.into_items()?;
            let mut quote = compose_quote(&customer, items, terms.as_deref()).map_err(|e| e.to_string())?;
            store.save(&mut quote).map_err(|e| e.to_string())?;
            to_output(&quote)
        }),
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ensure_data;

    fn setup() -> (tempfile::TempDir, DataPaths, ToolRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::under(dir.path());
        ensure_data(&paths).unwrap();
        let tools = quoting_tools(&paths);
        (dir, paths, tools)
    }

    fn args(value: Value) -> HashMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    fn run(tools: &ToolRegistry, name: &str, value: Value) -> Result<Value, String> {
        tools.execute(name, &args(value)).map(|out| serde_json::from_str(&out).unwrap())
    }

    #[test]
    fn registers_all_four_tools() {
        let (_dir, _paths, tools) = setup();
        assert_eq!(tools.names(), vec![DISCOUNT_CALCULATOR, HISTORICAL_MATCH, PRICE_LOOKUP, QUOTE_GENERATOR]);
    }

    #[test]
    fn price_lookup_reads_the_catalog() {
        let (_dir, _paths, tools) = setup();
        let found = run(&tools, PRICE_LOOKUP, json!({"product_name": "Office Chairs"})).unwrap();
        assert_eq!(found["found"], true);
        assert_eq!(found["sku"], "CH-100");

        let missing = run(&tools, PRICE_LOOKUP, json!({"product_name": "Sofa"})).unwrap();
        assert_eq!(missing["found"], false);
        assert!(missing["message"].as_str().unwrap().contains("Available: Office Chair"));
    }

    #[test]
    fn discount_calculator_defaults_to_regular() {
        let (_dir, _paths, tools) = setup();
        let out = run(&tools, DISCOUNT_CALCULATOR, json!({"unit_price": 12000, "qty": 50})).unwrap();
        assert_eq!(out["total_discount"], 0.1);
        assert_eq!(out["total"], 540000.0);
        assert_eq!(out["customer_type"], "regular");

        let err = run(&tools, DISCOUNT_CALCULATOR, json!({"qty": 50})).unwrap_err();
        assert!(err.starts_with("Invalid arguments"));
    }

    #[test]
    fn historical_match_defaults_to_two_results() {
        let (_dir, _paths, tools) = setup();
        let out = run(&tools, HISTORICAL_MATCH, json!({"product_name": "conference"})).unwrap();
        assert_eq!(out.as_array().unwrap().len(), 1);
        assert_eq!(out[0]["quote_id"], "Q002");
    }

    #[test]
    fn historical_match_top_k_accepts_whole_floats() {
        let (_dir, _paths, tools) = setup();
        let all = run(&tools, HISTORICAL_MATCH, json!({"product_name": ""})).unwrap();
        assert_eq!(all.as_array().unwrap().len(), 2);

        let one = run(&tools, HISTORICAL_MATCH, json!({"product_name": "", "top_k": 1.0})).unwrap();
        assert_eq!(one.as_array().unwrap().len(), 1);
        let null = run(&tools, HISTORICAL_MATCH, json!({"product_name": "", "top_k": null})).unwrap();
        assert_eq!(null.as_array().unwrap().len(), 2);

        let err = run(&tools, HISTORICAL_MATCH, json!({"product_name": "", "top_k": 1.5})).unwrap_err();
        assert!(err.starts_with("Invalid arguments"), "got: {}", err);
    }

    #[test]
    fn quote_generator_accepts_items_or_items_json() {
        let (_dir, paths, tools) = setup();
        let direct = run(&tools, QUOTE_GENERATOR, json!({
            "customer": "ABC Corp",
            "items": [{"name": "Office Chair", "qty": 120, "unit_price": 1500, "total": 144000}]
        })).unwrap();
        assert_eq!(direct["total"], 144000.0);
        assert_eq!(direct["terms"], "Standard T&C apply.");

        let encoded = run(&tools, QUOTE_GENERATOR, json!({
            "customer": "TechStart Inc",
            "items_json": "[{\"name\":\"Developer Desk\",\"qty\":25,\"unit_price\":8000}]",
            "terms": "Net 30"
        })).unwrap();
        assert_eq!(encoded["total"], 200000.0);

        let store = QuoteStore::new(&paths);
        assert_eq!(store.count().unwrap(), 2);
        let id = direct["quote_id"].as_str().unwrap();
        assert_eq!(store.load(id).unwrap().customer, "ABC Corp");
    }

    #[test]
    fn quote_generator_reports_bad_input() {
        let (_dir, paths, tools) = setup();
        let err = run(&tools, QUOTE_GENERATOR, json!({"customer": "ABC", "items_json": "not json"})).unwrap_err();
        assert!(err.contains("items_json"));
        let err = run(&tools, QUOTE_GENERATOR, json!({"customer": "ABC"})).unwrap_err();
        assert!(err.contains("items"));
        let err = run(&tools, QUOTE_GENERATOR, json!({"customer": "ABC", "items": []})).unwrap_err();
        assert!(err.contains("at least one item"));
        assert_eq!(QuoteStore::new(&paths).count().unwrap(), 0);
    }
}
