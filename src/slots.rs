//! Slot resolution across turns
//!
//! Intents that need a mobile number read it from the `got_mobile` context.
//! When it is missing the handler records what it already has under
//! `ask_mobile`, so the next `GetMobileNumber` turn can finish the request.
//!
//! Mobile numbers are stored exactly as the user gave them and normalized
//! whenever they are read.

use crate::models::{DatePeriod, MobileNumber};
use crate::state::{ContextSet, SessionContext, ASK_MOBILE, GOT_MOBILE};
use serde_json::{Map, Value};

pub const MOBILE_PARAM: &str = "mobile";
pub const DATE_PERIOD_PARAM: &str = "date-period";

/// Turns a collected mobile number stays available
pub const GOT_MOBILE_LIFESPAN: u32 = 5;

/// Turns a pending mobile prompt stays answerable
pub const ASK_MOBILE_LIFESPAN: u32 = 2;

/// Slot state of a transaction-history request
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionSlots {
    /// Both slots filled
    Ready { mobile: MobileNumber, period: DatePeriod },
    /// No mobile yet; carries the raw date-period parameter, if any
    MissingMobile { pending_period: Option<Value> },
    /// Mobile known but no complete date range
    MissingPeriod { mobile: MobileNumber },
}

/// Mobile from `got_mobile`, normalized at read time
pub fn stored_mobile(contexts: &ContextSet) -> Option<MobileNumber> {
    contexts
        .get(GOT_MOBILE)
        .and_then(|ctx| ctx.param(MOBILE_PARAM))
        .and_then(mobile_from_value)
}

/// Raw `mobile` parameter of the current turn, if it has any digits
pub fn mobile_param(parameters: &Map<String, Value>) -> Option<&str> {
    parameters
        .get(MOBILE_PARAM)
        .and_then(raw_mobile)
        .filter(|raw| MobileNumber::parse(raw).is_some())
}

fn raw_mobile(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        // Some agents send list-valued parameters
        Value::Array(items) => items.iter().find_map(raw_mobile),
        _ => None,
    }
}

fn mobile_from_value(value: &Value) -> Option<MobileNumber> {
    match value {
        Value::Number(n) => MobileNumber::parse(&n.to_string()),
        other => raw_mobile(other).and_then(MobileNumber::parse),
    }
}

/// Decide which transaction-history slot is missing. Mobile is checked first.
pub fn resolve_transaction_slots(
    parameters: &Map<String, Value>,
    contexts: &ContextSet,
) -> TransactionSlots {
    let raw_period = parameters.get(DATE_PERIOD_PARAM);

    let Some(mobile) = stored_mobile(contexts) else {
        return TransactionSlots::MissingMobile {
            pending_period: raw_period.filter(|v| !is_blank(v)).cloned(),
        };
    };

    match raw_period.and_then(DatePeriod::from_value) {
        Some(period) => TransactionSlots::Ready { mobile, period },
        None => TransactionSlots::MissingPeriod { mobile },
    }
}

/// Complete date range left behind by an unanswered mobile prompt
pub fn pending_period(contexts: &ContextSet) -> Option<Value> {
    let raw = contexts.get(ASK_MOBILE)?.param(DATE_PERIOD_PARAM)?;
    DatePeriod::from_value(raw).map(|_| raw.clone())
}

/// `got_mobile` write for a freshly collected number, stored raw
pub fn remember_mobile(raw: &str) -> SessionContext {
    let mut parameters = Map::new();
    parameters.insert(MOBILE_PARAM.to_string(), Value::String(raw.to_string()));
    SessionContext::new(GOT_MOBILE, GOT_MOBILE_LIFESPAN, parameters)
}

/// `ask_mobile` write, optionally keeping a date range for later
pub fn ask_for_mobile(pending_period: Option<Value>) -> SessionContext {
    let mut parameters = Map::new();
    if let Some(period) = pending_period {
        parameters.insert(DATE_PERIOD_PARAM.to_string(), period);
    }
    SessionContext::new(ASK_MOBILE, ASK_MOBILE_LIFESPAN, parameters)
}

/// True for `null`, `""` and empty arrays/objects
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
