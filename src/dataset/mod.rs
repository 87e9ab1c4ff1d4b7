//! Read-only account and fund datasets
//!
//! Three JSON files back every lookup: `accounts.json`,
//! `fund_categories.json` and `fund_details.json`.

use crate::error::FulfillmentError;
use crate::models::{Account, FundCategory, FundDetail, MobileNumber};
use crate::Result;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

pub const ACCOUNTS_FILE: &str = "accounts.json";
pub const FUND_CATEGORIES_FILE: &str = "fund_categories.json";
pub const FUND_DETAILS_FILE: &str = "fund_details.json";

/// Immutable snapshot of all datasets
#[derive(Debug, Default)]
pub struct Dataset {
    accounts: Vec<Account>,
    categories: Vec<FundCategory>,
    fund_details: Vec<FundDetail>,
    /// Mobile key → index into `accounts`
    account_index: HashMap<String, usize>,
}

impl Dataset {
    pub fn new(
        accounts: Vec<Account>,
        categories: Vec<FundCategory>,
        fund_details: Vec<FundDetail>,
    ) -> Self {
        let mut account_index = HashMap::with_capacity(accounts.len());
        for (idx, account) in accounts.iter().enumerate() {
            if let Some(mobile) = account.mobile_number() {
                // First record wins on duplicate keys
                account_index.entry(mobile.key().to_string()).or_insert(idx);
            }
        }

        Self {
            accounts,
            categories,
            fund_details,
            account_index,
        }
    }

    /// Read all three files from `dir`.
    pub async fn load_dir(dir: &Path) -> Result<Self> {
        let accounts: Vec<Account> = read_json(&dir.join(ACCOUNTS_FILE)).await?;
        let categories: Vec<FundCategory> = read_json(&dir.join(FUND_CATEGORIES_FILE)).await?;
        let fund_details: Vec<FundDetail> = read_json(&dir.join(FUND_DETAILS_FILE)).await?;

        debug!(
            accounts = accounts.len(),
            categories = categories.len(),
            funds = fund_details.len(),
            dir = %dir.display(),
            "Dataset loaded"
        );

        Ok(Self::new(accounts, categories, fund_details))
    }

    pub fn account_by_mobile(&self, mobile: &MobileNumber) -> Option<&Account> {
        self.account_index
            .get(mobile.key())
            .and_then(|idx| self.accounts.get(*idx))
    }

    /// Case-insensitive exact match on the category name
    pub fn category(&self, name: &str) -> Option<&FundCategory> {
        let name = name.trim();
        self.categories
            .iter()
            .find(|c| c.category.eq_ignore_ascii_case(name))
    }

    /// Category names in dataset order
    pub fn category_names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.category.as_str()).collect()
    }

    /// Case-insensitive exact match on the fund name
    pub fn fund_detail(&self, fund_name: &str) -> Option<&FundDetail> {
        let fund_name = fund_name.trim();
        self.fund_details
            .iter()
            .find(|f| f.fund_name.eq_ignore_ascii_case(fund_name))
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        FulfillmentError::Dataset(format!("Failed to read {}: {}", path.display(), e))
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        FulfillmentError::Dataset(format!("Failed to parse {}: {}", path.display(), e))
    })
}

//
// ================= Providers =================
//

/// When the dataset files are read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatasetMode {
    /// Once, before the server starts
    #[default]
    Startup,
    /// On every turn
    PerRequest,
}

impl FromStr for DatasetMode {
    type Err = FulfillmentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "startup" | "static" | "once" => Ok(DatasetMode::Startup),
            "per-request" | "per_request" | "request" => Ok(DatasetMode::PerRequest),
            other => Err(FulfillmentError::Config(format!(
                "Unknown dataset mode '{}', expected 'startup' or 'per-request'",
                other
            ))),
        }
    }
}

impl fmt::Display for DatasetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetMode::Startup => write!(f, "startup"),
            DatasetMode::PerRequest => write!(f, "per-request"),
        }
    }
}

/// Source of dataset snapshots for a turn
#[async_trait::async_trait]
pub trait DatasetProvider: Send + Sync {
    async fn snapshot(&self) -> Result<Arc<Dataset>>;
}

/// Dataset loaded once and shared read-only
pub struct StaticDataset {
    dataset: Arc<Dataset>,
}

impl StaticDataset {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset: Arc::new(dataset),
        }
    }
}

#[async_trait::async_trait]
impl DatasetProvider for StaticDataset {
    async fn snapshot(&self) -> Result<Arc<Dataset>> {
        Ok(Arc::clone(&self.dataset))
    }
}

/// Dataset re-read from disk on every snapshot
pub struct FileDataset {
    dir: PathBuf,
}

impl FileDataset {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl DatasetProvider for FileDataset {
    async fn snapshot(&self) -> Result<Arc<Dataset>> {
        Ok(Arc::new(Dataset::load_dir(&self.dir).await?))
    }
}

/// Build the provider for `mode`. Startup mode fails fast on unreadable files.
pub async fn open_provider(mode: DatasetMode, dir: &Path) -> Result<Arc<dyn DatasetProvider>> {
    match mode {
        DatasetMode::Startup => {
            let dataset = Dataset::load_dir(dir).await?;
            info!(accounts = dataset.account_count(), "Dataset cached for process lifetime");
            Ok(Arc::new(StaticDataset::new(dataset)))
        }
        DatasetMode::PerRequest => {
            info!(dir = %dir.display(), "Dataset will be read on every turn");
            Ok(Arc::new(FileDataset::new(dir)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FundEntry, Transaction};
    use chrono::NaiveDate;

    fn sample() -> Dataset {
        Dataset::new(
            vec![Account {
                mobile: "98765 43210".to_string(),
                transactions: vec![Transaction {
                    date: NaiveDate::from_ymd_opt(2025, 4, 5).unwrap(),
                    amount: 500.0,
                    fund_name: "FundA".to_string(),
                }],
            }],
            vec![FundCategory {
                category: "Equity".to_string(),
                funds: vec![FundEntry {
                    fund_name: "FundA".to_string(),
                    fund_id: "EQ001".to_string(),
                }],
            }],
            vec![],
        )
    }

    #[test]
    fn test_account_lookup_normalizes_both_sides() {
        let dataset = sample();
        let query = MobileNumber::parse("+91 98765-43210").unwrap();
        assert!(dataset.account_by_mobile(&query).is_some());

        let other = MobileNumber::parse("1234567890").unwrap();
        assert!(dataset.account_by_mobile(&other).is_none());
    }

    #[test]
    fn test_category_match_is_case_insensitive_exact() {
        let dataset = sample();
        assert!(dataset.category("equity").is_some());
        assert!(dataset.category(" EQUITY ").is_some());
        assert!(dataset.category("equit").is_none());
    }

    #[test]
    fn test_dataset_mode_parse() {
        assert_eq!("per-request".parse::<DatasetMode>().unwrap(), DatasetMode::PerRequest);
        assert_eq!("Startup".parse::<DatasetMode>().unwrap(), DatasetMode::Startup);
        assert!("weekly".parse::<DatasetMode>().is_err());
    }

    #[tokio::test]
    async fn test_load_dir_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Dataset::load_dir(dir.path()).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::Dataset(_)));
    }

    #[tokio::test]
    async fn test_file_dataset_reads_fresh_copy() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ACCOUNTS_FILE), r#"[{"mobile":"9876543210","transactions":[]}]"#).unwrap();
        std::fs::write(dir.path().join(FUND_CATEGORIES_FILE), "[]").unwrap();
        std::fs::write(dir.path().join(FUND_DETAILS_FILE), "[]").unwrap();

        let provider = FileDataset::new(dir.path());
        assert_eq!(provider.snapshot().await.unwrap().account_count(), 1);

        std::fs::write(dir.path().join(ACCOUNTS_FILE), "[]").unwrap();
        assert_eq!(provider.snapshot().await.unwrap().account_count(), 0);
    }
}
