//! Deterministic entity extraction from raw message text.
//!
//! One source among several: everything found here still goes through the
//! validator before it can reach a session's intelligence set.

use std::sync::LazyLock;

use regex::Regex;

use super::entity::{EntityOrigin, EntityType, ExtractedEntity};

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"']+"#).unwrap());

/// `local@domain` tokens. Classified as email or payment handle by whether
/// the domain part contains a dot.
static AT_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9][A-Za-z0-9._%+-]*@[A-Za-z0-9][A-Za-z0-9.-]*").unwrap());

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+91[\s-]?|\b91[\s-]?|\b0|\b)[6-9]\d{4}[\s-]?\d{5}\b").unwrap()
});

static ACCOUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{9,18}\b").unwrap());

/// Extract candidate entities from one message.
///
/// URLs are blanked out before the `@` scan so link credentials are not
/// mistaken for handles, and phone numbers are blanked before the account
/// scan so a mobile number is not also recorded as an account.
pub fn extract_entities(text: &str) -> Vec<ExtractedEntity> {
    let mut out = Vec::new();
    let mut remaining = text.to_string();

    for m in URL_RE.find_iter(text) {
        out.push(candidate(EntityType::Url, m.as_str()));
    }
    remaining = URL_RE.replace_all(&remaining, " ").into_owned();

    for m in AT_TOKEN_RE.find_iter(&remaining) {
        let token = m.as_str().trim_end_matches(['.', '-']);
        let domain = token.rsplit('@').next().unwrap_or_default();
        let entity_type = if domain.contains('.') {
            EntityType::Email
        } else {
            EntityType::PaymentHandle
        };
        out.push(candidate(entity_type, token));
    }
    remaining = AT_TOKEN_RE.replace_all(&remaining, " ").into_owned();

    for m in PHONE_RE.find_iter(&remaining) {
        out.push(candidate(EntityType::Phone, m.as_str()));
    }
    remaining = PHONE_RE.replace_all(&remaining, " ").into_owned();

    for m in ACCOUNT_RE.find_iter(&remaining) {
        out.push(candidate(EntityType::BankAccount, m.as_str()));
    }

    out
}

fn candidate(entity_type: EntityType, raw: &str) -> ExtractedEntity {
    ExtractedEntity::candidate(entity_type, raw.trim(), EntityOrigin::Deterministic)
}
