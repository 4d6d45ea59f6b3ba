//! Deterministic pattern matcher.
//!
//! Runs before the classification oracle to short-circuit obvious cases:
//! - OTP/PIN solicitation under pressure, account-block threats, fake
//!   arrest demands, prize fees, remote-access installs → instant SCAM
//! - Bank OTP delivery, delivery notices, masked-account alerts → instant SAFE
//!
//! Every scan also reports the full weighted indicator list and the
//! candidate entities found in the text, whatever the shortcut.

use regex::Regex;
use tracing::debug;

use super::types::{Indicator, IndicatorCategory, ScanResult, Verdict};
use crate::intel::extract_entities;

/// Longest prefix of a message that is scanned.
const MAX_SCAN_CHARS: usize = 8_000;

/// A rule that fires only when every one of its patterns matches.
///
/// A match in which a pattern's `neg` capture group took part does not
/// count, so `never share it with our agent` is not a solicitation.
#[derive(Debug, Clone)]
pub struct InstantRule {
    pub name: String,
    pub all_of: Vec<Regex>,
    /// Scam label carried into the session when this rule decides.
    pub scam_type: Option<String>,
}

impl InstantRule {
    fn matches(&self, text: &str) -> bool {
        !self.all_of.is_empty()
            && self
                .all_of
                .iter()
                .all(|r| r.captures_iter(text).any(|c| c.name("neg").is_none()))
    }
}

/// A weighted indicator with a compiled regex.
#[derive(Debug, Clone)]
pub struct IndicatorRule {
    pub category: IndicatorCategory,
    pub weight: f64,
    pub description: String,
    pub regex: Regex,
}

/// Pure, side-effect-free text scanner.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    instant_scam: Vec<InstantRule>,
    instant_safe: Vec<InstantRule>,
    indicators: Vec<IndicatorRule>,
    disengagement: Vec<Regex>,
}

impl PatternMatcher {
    /// Create a matcher with the built-in rule set.
    pub fn default_rules() -> Self {
        let instant_scam = vec![
            // OTP/PIN solicitation backed by urgency or a threat
            instant(
                "credential_solicitation",
                &[
                    r"(?i)\b(send|share|tell|give|provide|forward|enter|confirm|read out)\b.{0,40}\b(otp|one[\s-]?time[\s-]?password|pin|cvv|password|passcode|verification code)\b",
                    r"(?i)\b(now|immediately|urgent(ly)?|asap|quickly|within \d+\s*(min|mins|minutes|hours?)|today|block(ed)?|suspend(ed)?|frozen|deactivated|legal action|arrest(ed)?|penalty)\b",
                ],
                Some("credential_phishing"),
            ),
            // Code handed over to a third party, wherever the code itself appears
            instant(
                "otp_handover",
                &[
                    r"(?i)\b(?P<neg>(?:do not|don'?t|never|not to)\s+)?(share|forward|send|tell|give|provide|read out)\s+(it|this|that|the)?\s*(otp|code|pin|password)?\b[^.,;!?]{0,30}\b(with|to)\s+(our|the|my|this)?\s*(agent|executive|officer|representative|staff|team|me|us)\b",
                ],
                Some("credential_phishing"),
            ),
            instant(
                "account_block_threat",
                &[
                    r"(?i)\b(account|a/c|card|sim|kyc|pan|aadhaar|wallet)\b.{0,40}\b(will be|has been|is being|getting)\s+(blocked|suspended|frozen|deactivated|closed|disabled)\b",
                    r"(?i)\b(click|verify|update|share|send|call|pay|link|download)\b",
                ],
                Some("account_suspension"),
            ),
            instant(
                "authority_extortion",
                &[
                    r"(?i)\b(digital arrest|arrest warrant|cbi|narcotics|customs department|money laundering|cyber ?crime (cell|department))\b",
                    r"(?i)\b(pay|transfer|deposit|settle|fine|penalty|verification fee|security deposit)\b",
                ],
                Some("impersonation_extortion"),
            ),
            instant(
                "advance_fee_prize",
                &[
                    r"(?i)\b(you('ve| have)? won|winner|lottery|lucky draw|jackpot)\b",
                    r"(?i)\b(processing fee|registration fee|clearance fee|gst|tax|charges|pay|transfer|deposit)\b",
                ],
                Some("lottery_fraud"),
            ),
            instant(
                "remote_access_install",
                &[
                    r"(?i)\b(anydesk|teamviewer|quick ?support|rustdesk|airdroid)\b",
                    r"(?i)\b(install|download|open|share|code)\b",
                ],
                Some("remote_access_fraud"),
            ),
        ];

        let instant_safe = vec![
            instant(
                "otp_delivery",
                &[
                    r"(?i)(\b(otp|one[\s-]?time[\s-]?password|verification code)\b.{0,40}?(\bis\b|:)\s*\d{4,8}\b|\b\d{4,8}\s+is\s+(your|the)\s+(otp|one[\s-]?time[\s-]?password|verification code)\b)",
                ],
                None,
            ),
            instant(
                "delivery_notice",
                &[
                    r"(?i)(has been delivered|out for delivery|\b(your )?(order|package|shipment|parcel)\b.{0,30}\b(shipped|dispatched|delivered)\b)",
                ],
                None,
            ),
            instant(
                "masked_account_alert",
                &[
                    r"(?i)\b(a/c|acct|account)\s*(no\.?\s*)?[x*]{2,}\d{2,6}\b.{0,60}\b(debited|credited)\b",
                ],
                None,
            ),
        ];

        let indicators = vec![
            indicator(
                IndicatorCategory::Urgency,
                0.05,
                "urgency language",
                r"(?i)\b(urgent(ly)?|immediately|right now|asap|within \d+\s*(min|mins|minutes|hours?)|last chance|expires? today)\b",
            ),
            indicator(
                IndicatorCategory::Threat,
                0.06,
                "threat of account or legal action",
                r"(?i)\b(blocked|suspended|frozen|deactivated|legal action|arrest(ed)?|penalty|police|court)\b",
            ),
            indicator(
                IndicatorCategory::CredentialRequest,
                0.07,
                "credential mentioned",
                r"(?i)\b(otp|cvv|pin|password|passcode|card number|expiry date)\b",
            ),
            indicator(
                IndicatorCategory::PaymentRequest,
                0.05,
                "payment request",
                r"(?i)\b(pay|transfer|send money|deposit|upi|processing fee|registration fee)\b",
            ),
            indicator(
                IndicatorCategory::Impersonation,
                0.05,
                "institution or authority named",
                r"(?i)\b(rbi|sbi|hdfc|icici|bank official|bank manager|customer care|income tax|cbi|customs|trai|government)\b",
            ),
            indicator(
                IndicatorCategory::AccountVerification,
                0.05,
                "account verification demand",
                r"(?i)\b(kyc|re-?kyc|verify your (account|identity)|pan (card )?update|aadhaar (link|update))\b",
            ),
            indicator(
                IndicatorCategory::Reward,
                0.04,
                "unexpected reward",
                r"(?i)\b(won|winner|lottery|prize|cashback|reward|gift card|bonus|refund)\b",
            ),
            indicator(
                IndicatorCategory::SuspiciousLink,
                0.05,
                "link to follow",
                r"(?i)(https?://|www\.|bit\.ly|click (here|the link|below))",
            ),
            indicator(
                IndicatorCategory::RemoteAccess,
                0.07,
                "remote access app",
                r"(?i)\b(anydesk|teamviewer|quick ?support|rustdesk|screen ?share)\b",
            ),
            indicator(
                IndicatorCategory::Secrecy,
                0.04,
                "secrecy demand",
                r"(?i)\b(don'?t tell|do not tell|keep (it|this) (secret|confidential)|don'?t inform)\b",
            ),
        ];

        let disengagement = vec![
            Regex::new(r"(?i)\b(are|r) (you|u) (a )?(bot|robot|ai|fake|police|cop)\b").unwrap(),
            Regex::new(r"(?i)\b(you('| a)?re|ur|u r) (a )?(bot|robot|fake|scammer|wasting my time)\b")
                .unwrap(),
            Regex::new(r"(?i)\b(stop wasting my time|forget it|i am blocking you|i'?m blocking you|reported you)\b")
                .unwrap(),
        ];

        Self {
            instant_scam,
            instant_safe,
            indicators,
            disengagement,
        }
    }

    /// Create an empty matcher (for testing).
    pub fn empty() -> Self {
        Self {
            instant_scam: Vec::new(),
            instant_safe: Vec::new(),
            indicators: Vec::new(),
            disengagement: Vec::new(),
        }
    }

    /// Add an instant-scam rule; every pattern must match for it to fire.
    pub fn add_instant_scam(
        &mut self,
        name: &str,
        patterns: &[&str],
        scam_type: Option<&str>,
    ) -> Result<(), regex::Error> {
        self.instant_scam.push(compile_rule(name, patterns, scam_type)?);
        Ok(())
    }

    /// Add an instant-safe rule; every pattern must match for it to fire.
    pub fn add_instant_safe(&mut self, name: &str, patterns: &[&str]) -> Result<(), regex::Error> {
        self.instant_safe.push(compile_rule(name, patterns, None)?);
        Ok(())
    }

    pub fn add_indicator(
        &mut self,
        category: IndicatorCategory,
        weight: f64,
        description: &str,
        pattern: &str,
    ) -> Result<(), regex::Error> {
        self.indicators.push(IndicatorRule {
            category,
            weight,
            description: description.into(),
            regex: Regex::new(pattern)?,
        });
        Ok(())
    }

    /// Scan one message.
    ///
    /// Instant-scam rules take precedence over instant-safe rules. Blank
    /// input yields an empty, uncertain result.
    pub fn scan(&self, text: &str) -> ScanResult {
        let text = truncate_chars(text, MAX_SCAN_CHARS);
        if text.trim().is_empty() {
            return ScanResult::empty();
        }

        let indicators: Vec<Indicator> = self
            .indicators
            .iter()
            .filter_map(|rule| {
                rule.regex.find(text).map(|m| Indicator {
                    category: rule.category,
                    weight: rule.weight,
                    description: rule.description.clone(),
                    matched_text: m.as_str().to_lowercase(),
                })
            })
            .collect();

        let disengaged = self.disengagement.iter().any(|r| r.is_match(text));
        let entities = extract_entities(text);

        let (shortcut, rule) = if let Some(rule) = self.instant_scam.iter().find(|r| r.matches(text)) {
            debug!(rule = %rule.name, "Message matched instant-scam rule");
            (Verdict::Scam, Some(rule))
        } else if let Some(rule) = self.instant_safe.iter().find(|r| r.matches(text)) {
            debug!(rule = %rule.name, "Message matched instant-safe rule");
            (Verdict::Safe, Some(rule))
        } else {
            (Verdict::Uncertain, None)
        };

        ScanResult {
            shortcut,
            rule: rule.map(|r| r.name.clone()),
            scam_type: rule.and_then(|r| r.scam_type.clone()),
            indicators,
            entities,
            disengaged,
        }
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::default_rules()
    }
}

fn instant(name: &str, patterns: &[&str], scam_type: Option<&str>) -> InstantRule {
    compile_rule(name, patterns, scam_type).unwrap()
}

fn indicator(category: IndicatorCategory, weight: f64, description: &str, pattern: &str) -> IndicatorRule {
    IndicatorRule {
        category,
        weight,
        description: description.into(),
        regex: Regex::new(pattern).unwrap(),
    }
}

fn compile_rule(name: &str, patterns: &[&str], scam_type: Option<&str>) -> Result<InstantRule, regex::Error> {
    Ok(InstantRule {
        name: name.into(),
        all_of: patterns.iter().map(|p| Regex::new(p)).collect::<Result<_, _>>()?,
        scam_type: scam_type.map(String::from),
    })
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
