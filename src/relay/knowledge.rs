//! Static answers used when the generator is exhausted.

use regex::Regex;

/// Sent when neither the generator nor a topic produced anything.
pub const STATIC_FALLBACK: &str = "⚠️ The assistant is busy right now. Please try again in a minute.\n\
     ⚠️ 助手暂时繁忙，请稍后再试。\n\n\
     Send /help to see what I can do.";

pub struct Topic {
    pub name: &'static str,
    pattern: Regex,
    reply: &'static str,
}

impl Topic {
    pub fn new(name: &'static str, pattern: &str, reply: &'static str) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            pattern: Regex::new(pattern)?,
            reply,
        })
    }

    pub fn reply(&self) -> &'static str {
        self.reply
    }
}

/// Keyword topics checked in order; the first match answers.
///
/// Latin keywords use ASCII word boundaries so they still match when written
/// directly against CJK text.
pub struct KnowledgeBase {
    topics: Vec<Topic>,
}

impl KnowledgeBase {
    pub fn new(topics: Vec<Topic>) -> Self {
        Self { topics }
    }

    pub fn builtin() -> Self {
        let topics = [
            (
                "referral",
                r"(?i)referral|推荐|绑定|(?-u:\b)bind(?-u:\b)",
                "👤 Referral binding\n\
                 1) Open the official page in your wallet's built-in browser.\n\
                 2) Connect your wallet and check you are on the right network.\n\
                 3) Paste the referral address into the referral field and confirm.\n\
                 A referral address is only a binding, never a payment address. Never send funds to individuals.",
            ),
            (
                "liquidity",
                r"(?i)(?-u:\b)(?:lp|pool)(?-u:\b)|liquidity|pancake|铺地池|打底池|流动性",
                "🟡 Adding liquidity\n\
                 1) Keep some gas in your wallet.\n\
                 2) Open the DEX, go to Liquidity → Add Liquidity.\n\
                 3) Import the token only after checking the official contract address.\n\
                 4) Approve, then Supply, and wait for confirmation.\n\
                 Double-check network, address and amount before every confirmation.",
            ),
            (
                "safety",
                r"(?i)address|contract|wallet|scam|(?-u:\b)(?:bnb|bsc)(?-u:\b)|地址|合约|钱包|诈骗",
                "🔐 Safety first\n\
                 • Only trust the officially published contract address, never screenshots.\n\
                 • Admins will never DM you asking for money.\n\
                 • All actions happen on-chain through the official page.",
            ),
        ];

        let topics = topics
            .into_iter()
            .map(|(name, pattern, reply)| {
                Topic::new(name, pattern, reply).expect("builtin topic pattern is valid")
            })
            .collect();
        Self::new(topics)
    }

    pub fn lookup(&self, text: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.pattern.is_match(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_match_case_insensitive() {
        let kb = KnowledgeBase::builtin();
        assert_eq!(kb.lookup("How do I add LIQUIDITY?").unwrap().name, "liquidity");
        assert_eq!(kb.lookup("Is this a Scam?").unwrap().name, "safety");
    }

    #[test]
    fn test_chinese_keywords() {
        let kb = KnowledgeBase::builtin();
        assert_eq!(kb.lookup("怎么绑定上级").unwrap().name, "referral");
        assert_eq!(kb.lookup("怎么铺地池").unwrap().name, "liquidity");
    }

    #[test]
    fn test_first_topic_wins() {
        let kb = KnowledgeBase::builtin();
        // mentions both referral and wallet
        assert_eq!(kb.lookup("referral wallet").unwrap().name, "referral");
    }

    #[test]
    fn test_word_boundaries() {
        let kb = KnowledgeBase::builtin();
        // "help" contains "lp" but is not a liquidity question
        assert!(kb.lookup("help me please").is_none());
    }

    #[test]
    fn test_latin_keywords_next_to_cjk() {
        let kb = KnowledgeBase::builtin();
        assert_eq!(kb.lookup("LP是什么").unwrap().name, "liquidity");
        assert_eq!(kb.lookup("pool怎么加").unwrap().name, "liquidity");
        assert_eq!(kb.lookup("怎么用bnb买").unwrap().name, "safety");
        assert_eq!(kb.lookup("要bind吗").unwrap().name, "referral");
        // still no match inside a longer Latin word
        assert!(kb.lookup("help我").is_none());
    }

    #[test]
    fn test_no_match() {
        let kb = KnowledgeBase::builtin();
        assert!(kb.lookup("what's the weather").is_none());
        assert!(!STATIC_FALLBACK.is_empty());
    }

    #[test]
    fn test_custom_topics() {
        let kb = KnowledgeBase::new(vec![Topic::new("fees", r"(?i)\bfees?\b", "Fees are shown before you confirm.").unwrap()]);
        assert_eq!(kb.lookup("what FEES apply").unwrap().reply(), "Fees are shown before you confirm.");
    }
}
