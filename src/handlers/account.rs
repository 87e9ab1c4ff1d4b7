//! Handlers that need the user's mobile number

use crate::dataset::Dataset;
use crate::handlers::{Fulfillment, IntentHandler, Turn};
use crate::intent::Intent;
use crate::models::{format_amount, DatePeriod, MobileNumber};
use crate::slots::{
    ask_for_mobile, mobile_param, pending_period, remember_mobile, resolve_transaction_slots,
    stored_mobile, TransactionSlots, DATE_PERIOD_PARAM,
};
use crate::state::{SessionContext, ASK_MOBILE, GOT_MOBILE};
use crate::Result;
use tracing::{debug, info};

/// Ask for the mobile number and leave an `ask_mobile` marker behind
fn prompt_for_mobile(purpose: &str) -> Fulfillment {
    Fulfillment::message(format!(
        "Please share your registered mobile number so I can {}.",
        purpose
    ))
    .with_context(ask_for_mobile(None))
}

fn no_account(mobile: &MobileNumber) -> Fulfillment {
    Fulfillment::message(format!(
        "I couldn't find an account linked to mobile number {}.",
        mobile
    ))
}

fn transaction_report(dataset: &Dataset, mobile: &MobileNumber, period: &DatePeriod) -> Fulfillment {
    if !period.is_ordered() {
        return Fulfillment::message(format!(
            "The start date {} comes after the end date {}. Please give me a valid date range.",
            period.start, period.end
        ));
    }

    let Some(account) = dataset.account_by_mobile(mobile) else {
        return no_account(mobile);
    };

    let matched = account.transactions_in(period);
    debug!(period = %period, matched = matched.len(), "Filtered transactions");

    if matched.is_empty() {
        return Fulfillment::message(format!("No transactions found from {}.", period));
    }

    let mut report = format!("Here are your transactions from {}:", period);
    for transaction in matched {
        report.push_str(&format!(
            "\n• {}: {} in {}",
            transaction.date.format("%Y-%m-%d"),
            format_amount(transaction.amount),
            transaction.fund_name
        ));
    }
    Fulfillment::message(report)
}

/// Transactions for a date range; needs mobile and date range
pub struct TransactionHistoryHandler;

impl IntentHandler for TransactionHistoryHandler {
    fn intent(&self) -> Intent {
        Intent::TransactionHistory
    }

    fn description(&self) -> &'static str {
        "Show your transactions within a date range"
    }

    fn handle(&self, turn: &Turn<'_>) -> Result<Fulfillment> {
        let fulfillment = match resolve_transaction_slots(turn.parameters, turn.contexts) {
            TransactionSlots::MissingMobile { pending_period } => {
                debug!(has_period = pending_period.is_some(), "Mobile missing for history");
                Fulfillment::message(
                    "Please share your registered mobile number so I can fetch your transactions.",
                )
                .with_context(ask_for_mobile(pending_period))
            }
            TransactionSlots::MissingPeriod { .. } => {
                Fulfillment::message("For which dates would you like to see your transactions?")
            }
            TransactionSlots::Ready { mobile, period } => {
                transaction_report(turn.dataset, &mobile, &period)
            }
        };

        Ok(fulfillment)
    }
}

/// Stores the user's mobile number and resumes a pending history request
pub struct GetMobileNumberHandler;

impl IntentHandler for GetMobileNumberHandler {
    fn intent(&self) -> Intent {
        Intent::GetMobileNumber
    }

    fn description(&self) -> &'static str {
        "Remember your mobile number"
    }

    fn handle(&self, turn: &Turn<'_>) -> Result<Fulfillment> {
        let Some(raw) = mobile_param(turn.parameters) else {
            return Ok(Fulfillment::message(
                "I couldn't catch a mobile number there. Could you type it again?",
            ));
        };

        let remembered = remember_mobile(raw);

        let Some(period) = pending_period(turn.contexts) else {
            return Ok(Fulfillment::message(format!(
                "Thanks, I've saved your mobile number {}.",
                raw
            ))
            .with_context(remembered));
        };

        info!("Resuming transaction history with pending date range");

        let mut contexts = turn.contexts.clone();
        contexts.set(remembered.clone());

        let mut parameters = turn.parameters.clone();
        parameters.insert(DATE_PERIOD_PARAM.to_string(), period);

        let resumed = Turn {
            parameters: &parameters,
            contexts: &contexts,
            dataset: turn.dataset,
        };
        let report = TransactionHistoryHandler.handle(&resumed)?;

        let mut fulfillment = Fulfillment::new()
            .with_context(remembered)
            .with_context(SessionContext::expired(ASK_MOBILE));
        fulfillment.extend(report);
        Ok(fulfillment)
    }
}

/// Sum of every transaction on the account
pub struct PortfolioValuationHandler;

impl IntentHandler for PortfolioValuationHandler {
    fn intent(&self) -> Intent {
        Intent::PortfolioValuation
    }

    fn description(&self) -> &'static str {
        "Add up how much you have invested"
    }

    fn handle(&self, turn: &Turn<'_>) -> Result<Fulfillment> {
        let Some(mobile) = stored_mobile(turn.contexts) else {
            return Ok(prompt_for_mobile("value your portfolio"));
        };

        let Some(account) = turn.dataset.account_by_mobile(&mobile) else {
            return Ok(no_account(&mobile));
        };

        Ok(Fulfillment::message(format!(
            "Your total portfolio value is {} across {} transaction(s).",
            format_amount(account.total_invested()),
            account.transactions.len()
        )))
    }
}

/// Most recent transaction on the account
pub struct GetLastTransactionHandler;

impl IntentHandler for GetLastTransactionHandler {
    fn intent(&self) -> Intent {
        Intent::GetLastTransaction
    }

    fn description(&self) -> &'static str {
        "Show your latest transaction"
    }

    fn handle(&self, turn: &Turn<'_>) -> Result<Fulfillment> {
        let Some(mobile) = stored_mobile(turn.contexts) else {
            return Ok(prompt_for_mobile("look up your last transaction"));
        };

        let Some(account) = turn.dataset.account_by_mobile(&mobile) else {
            return Ok(no_account(&mobile));
        };

        let fulfillment = match account.last_transaction() {
            Some(last) => Fulfillment::message(format!(
                "Your last transaction was {} in {} on {}.",
                format_amount(last.amount),
                last.fund_name,
                last.date.format("%Y-%m-%d")
            )),
            None => Fulfillment::message("There are no transactions on your account yet."),
        };

        Ok(fulfillment)
    }
}

/// Forget the stored number and ask for a new one
pub struct ChangeMobileNumberHandler;

impl IntentHandler for ChangeMobileNumberHandler {
    fn intent(&self) -> Intent {
        Intent::ChangeMobileNumber
    }

    fn description(&self) -> &'static str {
        "Change the mobile number I use for you"
    }

    fn handle(&self, _turn: &Turn<'_>) -> Result<Fulfillment> {
        Ok(Fulfillment::message("Sure. What's the new mobile number?")
            .with_context(SessionContext::expired(GOT_MOBILE))
            .with_context(ask_for_mobile(None)))
    }
}
