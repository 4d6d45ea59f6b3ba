//! Entity validator: structural acceptance rules per entity type.
//!
//! A rejection is not an error: the candidate is simply never stored.

use std::sync::LazyLock;

use regex::Regex;

use super::entity::{EntityType, ExtractedEntity};

/// UPI provider suffixes seen in the wild.
const KNOWN_PAYMENT_PROVIDERS: &[&str] = &[
    "ybl", "ibl", "axl", "paytm", "upi", "apl", "okaxis", "oksbi", "okhdfcbank", "okicici",
    "axisbank", "sbi", "icici", "hdfcbank", "kotak", "yesbank", "pnb", "barodampay", "freecharge",
    "jupiteraxis", "fbl", "idfcbank", "airtel", "jio", "waicici", "wahdfcbank", "waaxis",
];

/// TLDs that are cheap to register and over-represented in phishing.
const SUSPICIOUS_TLDS: &[&str] = &[
    "xyz", "top", "tk", "ml", "ga", "cf", "gq", "click", "link", "online", "site", "buzz", "icu",
    "live", "rest", "work", "loan", "win", "bid", "info", "shop", "club", "vip",
];

const URL_SHORTENERS: &[&str] = &[
    "bit.ly", "tinyurl.com", "goo.gl", "is.gd", "cutt.ly", "t.ly", "rb.gy", "shorturl.at",
    "ow.ly", "tiny.cc",
];

const SUSPICIOUS_URL_KEYWORDS: &[&str] = &[
    "login", "verify", "kyc", "update", "secure", "account", "bank", "reward", "prize", "claim",
    "refund", "otp", "wallet", "pay", "unlock", "suspend", "blocked", "lottery", "bonus", "gift",
];

/// Labels that describe noise rather than intelligence.
const GENERIC_REFERENCE_LABELS: &[&str] = &[
    "order", "reference", "ref", "txn", "transaction", "invoice", "tracking", "ticket", "case",
    "complaint", "receipt", "booking",
];

const MAX_LABEL_LEN: usize = 40;
const MAX_LABELED_VALUE_LEN: usize = 200;
const BANK_ACCOUNT_LEN: std::ops::RangeInclusive<usize> = 9..=18;

static PAYMENT_HANDLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]{1,255}@([a-z][a-z0-9]{1,63})$").unwrap());

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9-]+(\.[a-z0-9-]+)*\.[a-z]{2,}$").unwrap());

static IPV4_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$").unwrap());

/// Why a candidate was not admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    PhoneStructure,
    BankLength,
    DegenerateDigits,
    PaymentHandleStructure,
    MalformedUrl,
    BenignUrl,
    EmailStructure,
    MissingLabel,
    Oversized,
    GenericReference,
    MapsToFixedType(EntityType),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty value"),
            Self::PhoneStructure => write!(f, "not a structurally valid phone number"),
            Self::BankLength => write!(f, "account number length out of bounds"),
            Self::DegenerateDigits => write!(f, "degenerate digit sequence"),
            Self::PaymentHandleStructure => write!(f, "not a payment handle"),
            Self::MalformedUrl => write!(f, "malformed URL"),
            Self::BenignUrl => write!(f, "URL not flagged suspicious"),
            Self::EmailStructure => write!(f, "not an email address"),
            Self::MissingLabel => write!(f, "labeled entry without a label"),
            Self::Oversized => write!(f, "label or value too long"),
            Self::GenericReference => write!(f, "generic order/reference number"),
            Self::MapsToFixedType(t) => write!(f, "value belongs to fixed type {t}"),
        }
    }
}

/// Validate and normalize a candidate.
///
/// On success the returned entity has `normalized_value` set and
/// `accepted == true`.
pub fn validate(mut candidate: ExtractedEntity) -> Result<ExtractedEntity, Rejection> {
    let raw = candidate.raw_value.trim();
    if raw.is_empty() {
        return Err(Rejection::Empty);
    }

    let normalized = match candidate.entity_type {
        EntityType::Phone => normalize_phone(raw)?,
        EntityType::BankAccount => normalize_bank_account(raw)?,
        EntityType::PaymentHandle => normalize_payment_handle(raw)?,
        EntityType::Url => normalize_suspicious_url(raw)?,
        EntityType::Email => normalize_email(raw)?,
        EntityType::OtherLabeled => normalize_labeled(candidate.label.as_deref(), raw)?,
    };

    candidate.normalized_value = Some(normalized);
    candidate.accepted = true;
    Ok(candidate)
}

/// Indian mobiles normalize to the 10-digit national form; other
/// international numbers keep a leading `+`.
pub fn normalize_phone(raw: &str) -> Result<String, Rejection> {
    let has_plus = raw.starts_with('+');
    let mut digits = String::with_capacity(raw.len());
    for (i, c) in raw.chars().enumerate() {
        match c {
            '0'..='9' => digits.push(c),
            '+' if i == 0 => {}
            ' ' | '-' | '(' | ')' | '.' => {}
            _ => return Err(Rejection::PhoneStructure),
        }
    }

    let national = match digits.len() {
        12 if digits.starts_with("91") => Some(&digits[2..]),
        11 if digits.starts_with('0') && !has_plus => Some(&digits[1..]),
        10 if !has_plus => Some(digits.as_str()),
        _ => None,
    };

    if let Some(national) = national {
        if !national.starts_with(['6', '7', '8', '9']) {
            return Err(Rejection::PhoneStructure);
        }
        if all_same_digit(national) {
            return Err(Rejection::DegenerateDigits);
        }
        return Ok(national.to_string());
    }

    if has_plus && !digits.starts_with("91") && (8..=15).contains(&digits.len()) {
        if all_same_digit(&digits) {
            return Err(Rejection::DegenerateDigits);
        }
        return Ok(format!("+{digits}"));
    }

    Err(Rejection::PhoneStructure)
}

pub fn normalize_bank_account(raw: &str) -> Result<String, Rejection> {
    let digits: String = raw.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(Rejection::BankLength);
    }
    if !BANK_ACCOUNT_LEN.contains(&digits.len()) {
        return Err(Rejection::BankLength);
    }
    if all_same_digit(&digits) || is_ascending_run(&digits) {
        return Err(Rejection::DegenerateDigits);
    }
    Ok(digits)
}

pub fn normalize_payment_handle(raw: &str) -> Result<String, Rejection> {
    let handle = raw.trim().trim_end_matches(['.', ',', ';', ':']).to_lowercase();
    let caps = PAYMENT_HANDLE_RE
        .captures(&handle)
        .ok_or(Rejection::PaymentHandleStructure)?;
    let provider = &caps[1];

    let recognized = KNOWN_PAYMENT_PROVIDERS.contains(&provider);
    let generic = (3..=20).contains(&provider.len()) && provider.chars().all(|c| c.is_ascii_alphabetic());
    if recognized || generic {
        Ok(handle)
    } else {
        Err(Rejection::PaymentHandleStructure)
    }
}

/// Normalize a URL and accept it only if it looks like a phishing link.
pub fn normalize_suspicious_url(raw: &str) -> Result<String, Rejection> {
    let trimmed = raw
        .trim()
        .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']', '}', '\'', '"']);
    let with_scheme = if trimmed.to_lowercase().starts_with("www.") {
        format!("http://{trimmed}")
    } else {
        trimmed.to_string()
    };

    let (scheme, rest) = with_scheme
        .split_once("://")
        .ok_or(Rejection::MalformedUrl)?;
    let scheme = scheme.to_lowercase();
    if scheme != "http" && scheme != "https" {
        return Err(Rejection::MalformedUrl);
    }

    let host_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(host_end);
    let has_userinfo = authority.contains('@');
    let host = authority
        .rsplit('@')
        .next()
        .unwrap_or(authority)
        .split(':')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    if host.is_empty() || !host.contains('.') {
        return Err(Rejection::MalformedUrl);
    }

    let normalized = format!("{scheme}://{host}{tail}");
    let tld = host.rsplit('.').next().unwrap_or_default();

    let suspicious = has_userinfo
        || IPV4_RE.is_match(&host)
        || host.split('.').any(|label| label.starts_with("xn--"))
        || URL_SHORTENERS.contains(&host.as_str())
        || SUSPICIOUS_TLDS.contains(&tld)
        || has_lure_label(&host);

    if suspicious {
        Ok(normalized)
    } else {
        Err(Rejection::BenignUrl)
    }
}

/// A hyphenated host label built from lure words, like `sbi-kyc-update`.
/// Plain labels (`accounts.google.com`) and paths never count.
fn has_lure_label(host: &str) -> bool {
    let labels: Vec<&str> = host.split('.').collect();
    labels[..labels.len().saturating_sub(1)]
        .iter()
        .filter(|label| label.contains('-'))
        .any(|label| {
            label
                .split('-')
                .any(|token| SUSPICIOUS_URL_KEYWORDS.contains(&token))
        })
}

pub fn normalize_email(raw: &str) -> Result<String, Rejection> {
    let email = raw.trim().trim_end_matches(['.', ',', ';', ':']).to_lowercase();
    if EMAIL_RE.is_match(&email) {
        Ok(email)
    } else {
        Err(Rejection::EmailStructure)
    }
}

fn normalize_labeled(label: Option<&str>, raw: &str) -> Result<String, Rejection> {
    let label = label.map(str::trim).filter(|l| !l.is_empty()).ok_or(Rejection::MissingLabel)?;
    if label.chars().count() > MAX_LABEL_LEN || raw.chars().count() > MAX_LABELED_VALUE_LEN {
        return Err(Rejection::Oversized);
    }

    let label_lower = label.to_lowercase();
    if label_lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| GENERIC_REFERENCE_LABELS.contains(&word))
    {
        return Err(Rejection::GenericReference);
    }

    if let Some(fixed) = fixed_type_of(raw) {
        return Err(Rejection::MapsToFixedType(fixed));
    }

    Ok(format!("{label_lower}: {raw}"))
}

/// The fixed type a free-form value would structurally belong to, if any.
fn fixed_type_of(value: &str) -> Option<EntityType> {
    let lower = value.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("www.") {
        return Some(EntityType::Url);
    }
    if normalize_phone(value).is_ok() {
        return Some(EntityType::Phone);
    }
    if normalize_email(value).is_ok() {
        return Some(EntityType::Email);
    }
    if normalize_payment_handle(value).is_ok() {
        return Some(EntityType::PaymentHandle);
    }
    if normalize_bank_account(value).is_ok() {
        return Some(EntityType::BankAccount);
    }
    None
}

fn all_same_digit(digits: &str) -> bool {
    let mut chars = digits.chars();
    match chars.next() {
        Some(first) => chars.all(|c| c == first),
        None => true,
    }
}

/// `123456789`-style runs, wrapping 9 -> 0.
fn is_ascending_run(digits: &str) -> bool {
    let bytes = digits.as_bytes();
    bytes
        .windows(2)
        .all(|w| (w[0] - b'0' + 1) % 10 == w[1] - b'0')
}
