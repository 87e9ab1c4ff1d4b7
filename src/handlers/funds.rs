//! Fund catalogue handlers

use crate::error::FulfillmentError;
use crate::handlers::{Fulfillment, IntentHandler, Turn};
use crate::intent::Intent;
use crate::models::format_amount;
use crate::slots::is_blank;
use crate::Result;
use serde_json::Value;
use tracing::info;

pub const CATEGORY_PARAM: &str = "category";
pub const FUND_NAME_PARAM: &str = "fund_name";
pub const AMOUNT_PARAM: &str = "amount";

/// Largest investment accepted without extra verification
pub const VERIFICATION_THRESHOLD: f64 = 50_000.0;

/// Funds inside a category
pub struct ExploreFundsHandler;

impl IntentHandler for ExploreFundsHandler {
    fn intent(&self) -> Intent {
        Intent::ExploreFunds
    }

    fn description(&self) -> &'static str {
        "List the funds in a category"
    }

    fn handle(&self, turn: &Turn<'_>) -> Result<Fulfillment> {
        let Some(requested) = turn.str_param(CATEGORY_PARAM) else {
            return Ok(Fulfillment::message(ask_for_category(turn)));
        };

        let category = turn
            .dataset
            .category(requested)
            .filter(|c| !c.funds.is_empty());

        let Some(category) = category else {
            return Ok(Fulfillment::message(format!(
                "I couldn't find any funds in the '{}' category.",
                requested
            )));
        };

        let mut listing = format!("Funds in the {} category:", category.category);
        for fund in &category.funds {
            listing.push_str(&format!("\n• {} ({})", fund.fund_name, fund.fund_id));
        }
        Ok(Fulfillment::message(listing))
    }
}

fn ask_for_category(turn: &Turn<'_>) -> String {
    let names = turn.dataset.category_names();
    if names.is_empty() {
        "Which fund category would you like to explore?".to_string()
    } else {
        format!(
            "Which fund category would you like to explore? Available categories: {}.",
            names.join(", ")
        )
    }
}

/// Allocation breakdown and link for one fund
pub struct GetFundDetailsHandler;

impl IntentHandler for GetFundDetailsHandler {
    fn intent(&self) -> Intent {
        Intent::GetFundDetails
    }

    fn description(&self) -> &'static str {
        "Show a fund's allocation breakdown"
    }

    fn handle(&self, turn: &Turn<'_>) -> Result<Fulfillment> {
        let Some(fund_name) = turn.str_param(FUND_NAME_PARAM) else {
            return Ok(Fulfillment::message(
                "Please specify which fund you'd like details for.",
            ));
        };

        let Some(detail) = turn.dataset.fund_detail(fund_name) else {
            return Ok(Fulfillment::message(format!(
                "I couldn't find a fund named '{}'.",
                fund_name
            )));
        };

        let mut text = format!("{} breakdown:", detail.fund_name);
        for (holding, percentage) in &detail.breakdown {
            text.push_str(&format!("\n• {}: {}%", holding, percentage));
        }

        let mut fulfillment = Fulfillment::message(text);
        fulfillment.add(format!("More details: {}", detail.details_link));
        Ok(fulfillment)
    }
}

/// Simulated investment; nothing is transferred or stored
pub struct InvestInFundHandler;

impl IntentHandler for InvestInFundHandler {
    fn intent(&self) -> Intent {
        Intent::InvestInFund
    }

    fn description(&self) -> &'static str {
        "Simulate an investment into a fund"
    }

    fn handle(&self, turn: &Turn<'_>) -> Result<Fulfillment> {
        let fund_name = turn.str_param(FUND_NAME_PARAM);
        let amount = parse_amount(turn.parameters.get(AMOUNT_PARAM))?;

        let (Some(fund_name), Some(amount)) = (fund_name, amount) else {
            return Ok(Fulfillment::message(
                "Please provide both the fund name and the amount you'd like to invest.",
            ));
        };

        let Some(detail) = turn.dataset.fund_detail(fund_name) else {
            return Ok(Fulfillment::message(format!(
                "I couldn't find a fund named '{}'.",
                fund_name
            )));
        };

        if amount > VERIFICATION_THRESHOLD {
            info!(amount, fund = %detail.fund_name, "Investment above verification threshold");
            return Ok(Fulfillment::message(format!(
                "Investments above {} need additional verification. \
                 Please complete verification before investing {} in {}.",
                format_amount(VERIFICATION_THRESHOLD),
                format_amount(amount),
                detail.fund_name
            )));
        }

        Ok(Fulfillment::message(format!(
            "Done! Your investment of {} in {} has been placed (simulation only, no money was moved).",
            format_amount(amount),
            detail.fund_name
        )))
    }
}

/// Amount as a number, numeric string, or `{ "amount": n, "currency": "INR" }`.
///
/// `Ok(None)` when absent; an error when present but not a positive number.
fn parse_amount(value: Option<&Value>) -> Result<Option<f64>> {
    let Some(value) = value.filter(|v| !is_blank(v)) else {
        return Ok(None);
    };

    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        Value::Object(obj) => return parse_amount(obj.get("amount")),
        _ => None,
    };

    match amount {
        Some(a) if a.is_finite() && a > 0.0 => Ok(Some(a)),
        _ => Err(FulfillmentError::invalid_parameter(
            AMOUNT_PARAM,
            format!("expected a positive amount, got {}", value),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{dataset, params, run};
    use crate::state::ContextSet;
    use serde_json::json;

    fn invest(amount: Value) -> Fulfillment {
        run(
            &InvestInFundHandler,
            &params(json!({ "fund_name": "bluechip growth", "amount": amount })),
            &ContextSet::new(),
            &dataset(),
        )
    }

    #[test]
    fn test_explore_funds_lists_category() {
        let out = run(
            &ExploreFundsHandler,
            &params(json!({ "category": "EQUITY" })),
            &ContextSet::new(),
            &dataset(),
        );
        let text = &out.messages()[0];
        assert!(text.contains("Bluechip Growth (EQ001)"));
        assert!(text.contains("Midcap Opportunities (EQ002)"));
    }

    #[test]
    fn test_explore_funds_is_idempotent() {
        let contexts = ContextSet::new();
        let data = dataset();
        let p = params(json!({ "category": "Equity" }));
        assert_eq!(
            run(&ExploreFundsHandler, &p, &contexts, &data),
            run(&ExploreFundsHandler, &p, &contexts, &data)
        );
    }

    #[test]
    fn test_explore_funds_without_category_asks_for_one() {
        for p in [json!({}), json!({ "category": "   " })] {
            let out = run(&ExploreFundsHandler, &params(p), &ContextSet::new(), &dataset());
            assert_eq!(
                out.messages(),
                ["Which fund category would you like to explore? Available categories: Equity.".to_string()]
            );
        }
    }

    #[test]
    fn test_explore_funds_unknown_category_names_it() {
        let out = run(
            &ExploreFundsHandler,
            &params(json!({ "category": "Crypto" })),
            &ContextSet::new(),
            &dataset(),
        );
        assert_eq!(out.messages()[0], "I couldn't find any funds in the 'Crypto' category.");
    }

    #[test]
    fn test_fund_details_renders_breakdown() {
        let out = run(
            &GetFundDetailsHandler,
            &params(json!({ "fund_name": "BLUECHIP GROWTH" })),
            &ContextSet::new(),
            &dataset(),
        );
        assert_eq!(out.messages().len(), 2);
        assert!(out.messages()[0].contains("Banking: 40%"));
        assert!(out.messages()[0].contains("IT: 35.5%"));
        assert!(out.messages()[1].contains("https://funds.example.com/EQ001"));
    }

    #[test]
    fn test_fund_details_missing_and_unknown() {
        let out = run(&GetFundDetailsHandler, &params(json!({})), &ContextSet::new(), &dataset());
        assert!(out.messages()[0].contains("Please specify"));

        let out = run(
            &GetFundDetailsHandler,
            &params(json!({ "fund_name": "Bluechip" })),
            &ContextSet::new(),
            &dataset(),
        );
        assert!(out.messages()[0].contains("couldn't find a fund"));
    }

    #[test]
    fn test_invest_threshold_boundary() {
        let accepted = invest(json!(50000));
        assert!(accepted.messages()[0].starts_with("Done!"));
        assert!(accepted.context_writes().is_empty());

        let rejected = invest(json!(50001));
        assert!(rejected.messages()[0].contains("verification"));
    }

    #[test]
    fn test_invest_accepts_currency_object_and_string() {
        assert!(invest(json!({ "amount": 1000, "currency": "INR" })).messages()[0].contains("₹1000.00"));
        assert!(invest(json!("2,500")).messages()[0].contains("₹2500.00"));
    }

    #[test]
    fn test_invest_requires_both_slots() {
        let out = run(
            &InvestInFundHandler,
            &params(json!({ "fund_name": "Bluechip Growth" })),
            &ContextSet::new(),
            &dataset(),
        );
        assert!(out.messages()[0].contains("provide both"));
    }

    #[test]
    fn test_invest_rejects_malformed_amount() {
        let data = dataset();
        let contexts = ContextSet::new();
        let parameters = params(json!({ "fund_name": "Bluechip Growth", "amount": "lots" }));
        let turn = Turn {
            parameters: &parameters,
            contexts: &contexts,
            dataset: &data,
        };
        let err = InvestInFundHandler.handle(&turn).unwrap_err();
        assert!(matches!(err, FulfillmentError::InvalidParameter { ref name, .. } if name == "amount"));
    }
}
