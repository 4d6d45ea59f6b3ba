//! Deterministic replies used when the engagement oracle is unavailable.

use super::mode::EngagementMode;

const CAUTIOUS_REPLIES: &[&str] = &[
    "Sorry, who is this? I don't understand what this is about.",
    "Can you explain again? Which account are you talking about?",
    "I'm not sure about this. Is there a number I can call you back on?",
    "Okay, what exactly do I need to do?",
];

const AGGRESSIVE_REPLIES: &[&str] = &[
    "Oh no, I don't want any problem with my account. What should I do?",
    "Please help me, where do I send the money? Give me the details again.",
    "My payment app is showing an error. Do you have another UPI ID or account number?",
    "I'm trying, please wait. Can you send me your number so I can call if it fails?",
];

/// Pick a fallback reply for this turn. Same inputs, same reply.
pub fn fallback_reply(mode: EngagementMode, turn_count: u32) -> &'static str {
    let replies = match mode {
        EngagementMode::Aggressive => AGGRESSIVE_REPLIES,
        EngagementMode::Cautious | EngagementMode::None => CAUTIOUS_REPLIES,
    };
    replies[turn_count as usize % replies.len()]
}
