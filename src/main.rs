// Demo import binary: run a CSV of raw rows through the full pipeline
// against an in-memory store and print the batch report

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::path::Path;

use counterbook::{
    CatalogProduct, ImportEngine, InMemoryCatalog, InMemoryStore, RawRecord, RecordSource,
    RowMapper,
};

/// NYC retail sales-tax rate; override with the COUNTERBOOK_TAX_RATE env var
const DEFAULT_TAX_RATE: f64 = 0.08875;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: counterbook <rows.csv>");
        std::process::exit(1);
    }

    let tax_rate = env::var("COUNTERBOOK_TAX_RATE")
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(DEFAULT_TAX_RATE);

    run_import(Path::new(&args[1]), tax_rate)
}

fn run_import(csv_path: &Path, tax_rate: f64) -> Result<()> {
    println!("📥 Counterbook import (tax rate {:.3}%)", tax_rate * 100.0);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load rows
    println!("\n📂 Loading rows from {:?}...", csv_path);
    let (records, row_failures) = load_rows(csv_path)?;
    println!("✓ Mapped {} rows ({} rejected)", records.len(), row_failures.len());
    for failure in &row_failures {
        eprintln!("  ✗ {}", failure);
    }

    // 2. Run the pipeline
    println!("\n⚙️  Reconciling against the store...");
    let engine = ImportEngine::new(tax_rate);
    let mut store = InMemoryStore::new();
    let catalog = demo_catalog();
    let report = engine.process_batch(&records, &mut store, &catalog);

    for failure in &report.failures {
        eprintln!("  ✗ {}", failure);
    }
    for dup in &report.duplicates {
        println!("  ↷ row {} skipped: {}", dup.row, dup.hit.reason);
    }

    // 3. Summary
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ {}", report.summary());
    for tx in &report.imported {
        println!(
            "  {} | {} | ${:.2} (pre-tax ${:.2}, tax ${:.2})",
            tx.date.format("%Y-%m-%d"),
            tx.transaction_type.name(),
            tx.amount,
            tx.pre_tax_amount,
            tx.tax_amount
        );
    }

    Ok(())
}

/// Read a headered CSV into raw records via the fixed header table.
/// Bad rows are collected, never fatal.
fn load_rows(csv_path: &Path) -> Result<(Vec<RawRecord>, Vec<String>)> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open rows file: {:?}", csv_path))?;

    let headers: Vec<String> = reader
        .headers()
        .context("Rows file has no header row")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mapper = RowMapper::new(RecordSource::Excel);
    let mut records = Vec::new();
    let mut failures = Vec::new();

    for (i, result) in reader.records().enumerate() {
        let row_number = i + 2; // 1-based, after the header row
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                failures.push(format!("row {}: {}", row_number, e));
                continue;
            }
        };
        let cells: HashMap<String, String> = headers
            .iter()
            .cloned()
            .zip(record.iter().map(|c| c.to_string()))
            .collect();
        match mapper.map_row(row_number, &cells) {
            Ok(raw) => records.push(raw),
            Err(e) => failures.push(e.to_string()),
        }
    }

    Ok((records, failures))
}

fn demo_catalog() -> InMemoryCatalog {
    InMemoryCatalog::new(vec![
        CatalogProduct {
            id: "p1".to_string(),
            name: "Dog Treats".to_string(),
            retail_price: 12.0,
            last_purchase_price: Some(6.0),
            average_cost: Some(5.0),
        },
        CatalogProduct {
            id: "p2".to_string(),
            name: "Leash".to_string(),
            retail_price: 25.0,
            last_purchase_price: Some(11.0),
            average_cost: Some(10.5),
        },
        CatalogProduct {
            id: "p3".to_string(),
            name: "Grooming Brush".to_string(),
            retail_price: 18.0,
            last_purchase_price: None,
            average_cost: None,
        },
    ])
}
