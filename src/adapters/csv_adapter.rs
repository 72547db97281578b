//! Stock listing CSV reader used by `import-stocks`.
//!
//! Expected columns, in order:
//! `symbol,company_name,sector,current_price,previous_close[,market_cap]`.

use crate::domain::error::PaisaError;
use crate::domain::stock::StockListing;
use rust_decimal::Decimal;
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub struct CsvStockReader;

impl CsvStockReader {
    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<StockListing>, PaisaError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PaisaError::validation("csv", format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Vec<StockListing>, PaisaError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());
        let mut listings = Vec::new();

        for (index, result) in rdr.records().enumerate() {
            let line = index + 2;
            let record = result
                .map_err(|e| PaisaError::validation("csv", format!("line {line}: {e}")))?;

            let field = |idx: usize, name: &str| -> Result<String, PaisaError> {
                record
                    .get(idx)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        PaisaError::validation("csv", format!("line {line}: missing {name} column"))
                    })
            };
            let price = |idx: usize, name: &str| -> Result<Decimal, PaisaError> {
                let raw = field(idx, name)?;
                Decimal::from_str(&raw).map_err(|e| {
                    PaisaError::validation("csv", format!("line {line}: invalid {name} '{raw}': {e}"))
                })
            };

            let market_cap = match record.get(5).filter(|s| !s.is_empty()) {
                Some(raw) => Some(raw.parse::<i64>().map_err(|e| {
                    PaisaError::validation(
                        "csv",
                        format!("line {line}: invalid market_cap '{raw}': {e}"),
                    )
                })?),
                None => None,
            };

            let listing = StockListing {
                symbol: field(0, "symbol")?.to_uppercase(),
                company_name: field(1, "company_name")?,
                sector: field(2, "sector")?,
                current_price: price(3, "current_price")?,
                previous_close: price(4, "previous_close")?,
                market_cap,
            };
            listing.validate()?;
            listings.push(listing);
        }

        Ok(listings)
    }
}
