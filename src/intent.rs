//! Intent names
//!
//! The NLU platform classifies each user utterance and sends the intent's
//! display name. Dispatch happens on this enum rather than on raw strings.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Welcome,
    TransactionHistory,
    GetMobileNumber,
    PortfolioValuation,
    ExploreFunds,
    GetFundDetails,
    InvestInFund,
    GetLastTransaction,
    ChangeMobileNumber,
    /// Anything the service has no handler for
    Fallback,
}

/// Display names as configured on the NLU agent, paired with their intent
const DISPLAY_NAMES: &[(&str, Intent)] = &[
    ("Default Welcome Intent", Intent::Welcome),
    ("TransactionHistory", Intent::TransactionHistory),
    ("GetMobileNumber", Intent::GetMobileNumber),
    ("PortfolioValuation", Intent::PortfolioValuation),
    ("ExploreFunds", Intent::ExploreFunds),
    ("GetFundDetails", Intent::GetFundDetails),
    ("InvestInFund", Intent::InvestInFund),
    ("GetLastTransaction", Intent::GetLastTransaction),
    ("ChangeMobileNumber", Intent::ChangeMobileNumber),
    ("Default Fallback Intent", Intent::Fallback),
];

impl Intent {
    /// Resolve a display name. Case, spaces, `-` and `_` are ignored,
    /// so `"transaction history"` and `"Transaction_History"` both match.
    pub fn from_display_name(name: &str) -> Intent {
        let wanted = fold(name);

        if wanted == "welcome" {
            return Intent::Welcome;
        }

        DISPLAY_NAMES
            .iter()
            .find(|(display, _)| fold(display) == wanted)
            .map(|(_, intent)| *intent)
            .unwrap_or(Intent::Fallback)
    }

    pub fn display_name(&self) -> &'static str {
        DISPLAY_NAMES
            .iter()
            .find(|(_, intent)| intent == self)
            .map(|(display, _)| *display)
            .unwrap_or("Default Fallback Intent")
    }
}

fn fold(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
