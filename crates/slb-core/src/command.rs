//! Text-to-command classification.
//!
//! Every message maps to exactly one [`Command`]; anything that is not a
//! recognised command is added to the list verbatim.

use std::sync::OnceLock;

use regex::Regex;

use crate::{
    domain::{MAX_SLOT, MIN_SLOT},
    normalize::{normalize, IDEOGRAPHIC_SPACE},
};

pub const LIST_KEYWORDS: &[&str] = &["リスト", "りすと", "list"];
pub const HELP_KEYWORDS: &[&str] = &["ヘルプ", "へるぷ", "？", "help", "?"];
pub const CLEAR_KEYWORDS: &[&str] = &["クリア", "くりあ", "クリアー", "clear"];
pub const UNSHARE_KEYWORDS: &[&str] = &["共有解除", "解除", "unshare"];
pub const SHARE_KEYWORDS: &[&str] = &["共有", "シェア", "share"];

/// Length of a share code, see [`crate::passcode`].
pub const SHARE_CODE_LEN: usize = 12;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    ShowList,
    Help,
    Clear,
    Share,
    Unshare,
    SelectList { number: u8, name: Option<String> },
    /// Item numbers to delete, deduplicated, first occurrence kept.
    DeleteItems(Vec<i64>),
    RedeemShareCode(String),
    AddItem(String),
}

#[derive(Clone, Copy, Debug)]
enum Keyword {
    List,
    Help,
    Clear,
    Unshare,
    Share,
}

/// Exact keyword commands in match priority.
///
/// `Unshare` precedes `Share`: "共有解除" contains "共有".
const KEYWORD_PRIORITY: [(Keyword, &[&str]); 5] = [
    (Keyword::List, LIST_KEYWORDS),
    (Keyword::Help, HELP_KEYWORDS),
    (Keyword::Clear, CLEAR_KEYWORDS),
    (Keyword::Unshare, UNSHARE_KEYWORDS),
    (Keyword::Share, SHARE_KEYWORDS),
];

impl From<Keyword> for Command {
    fn from(k: Keyword) -> Self {
        match k {
            Keyword::List => Command::ShowList,
            Keyword::Help => Command::Help,
            Keyword::Clear => Command::Clear,
            Keyword::Unshare => Command::Unshare,
            Keyword::Share => Command::Share,
        }
    }
}

impl Command {
    /// Classify a raw inbound message. First match wins:
    ///
    /// 1. exact keyword (case-insensitive), see [`KEYWORD_PRIORITY`]
    /// 2. `list <n> [name]`
    /// 3. `list<n> [name]`
    /// 4. one or more item numbers separated by spaces or commas
    /// 5. a share code
    /// 6. anything else is an item to add (original text, not normalized)
    pub fn parse(raw: &str) -> Self {
        let text = normalize(raw);

        if let Some(keyword) = match_keyword(&text) {
            return keyword.into();
        }
        if let Some((number, name)) = parse_select_list(&text) {
            return Command::SelectList { number, name };
        }
        if let Some(numbers) = parse_number_list(&text) {
            return Command::DeleteItems(numbers);
        }
        if looks_like_share_code(raw) {
            return Command::RedeemShareCode(raw.to_string());
        }
        Command::AddItem(raw.to_string())
    }
}

fn match_keyword(text: &str) -> Option<Keyword> {
    let lowered = text.to_lowercase();
    KEYWORD_PRIORITY
        .iter()
        .find(|(_, words)| words.contains(&lowered.as_str()))
        .map(|(k, _)| *k)
}

fn is_list_keyword(token: &str) -> bool {
    LIST_KEYWORDS.contains(&token.to_lowercase().as_str())
}

fn parse_slot(token: &str) -> Option<u8> {
    token
        .parse::<u8>()
        .ok()
        .filter(|n| (MIN_SLOT..=MAX_SLOT).contains(n))
}

/// Both the spaced (`list 2 name`) and fused (`list2 name`) forms.
fn parse_select_list(text: &str) -> Option<(u8, Option<String>)> {
    let tokens: Vec<&str> = text
        .split([' ', IDEOGRAPHIC_SPACE])
        .filter(|t| !t.is_empty())
        .collect();
    let first = *tokens.first()?;

    if is_list_keyword(first) {
        if let Some(number) = tokens.get(1).and_then(|t| parse_slot(t)) {
            return Some((number, tokens.get(2).map(|s| s.to_string())));
        }
    }

    let lowered = first.to_lowercase();
    for keyword in LIST_KEYWORDS {
        let Some(rest) = lowered.strip_prefix(keyword) else {
            continue;
        };
        if rest.len() != 1 {
            continue;
        }
        if let Some(number) = parse_slot(rest) {
            return Some((number, tokens.get(1).map(|s| s.to_string())));
        }
    }

    None
}

fn parse_number_list(text: &str) -> Option<Vec<i64>> {
    let spaced: String = text
        .chars()
        .map(|c| match c {
            IDEOGRAPHIC_SPACE | '、' | ',' => ' ',
            other => other,
        })
        .collect();

    let mut numbers = Vec::new();
    for token in spaced.split(' ').filter(|t| !t.is_empty()) {
        let n = token.parse::<i64>().ok()?;
        if !numbers.contains(&n) {
            numbers.push(n);
        }
    }

    if numbers.is_empty() {
        None
    } else {
        Some(numbers)
    }
}

fn share_code_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Z0-9]{12}").expect("valid regex"))
}

/// Byte length must be exactly 12 and the text must contain a 12-character
/// run of `[A-Z0-9]`. Together the two checks only accept a whole-string code.
fn looks_like_share_code(raw: &str) -> bool {
    raw.len() == SHARE_CODE_LEN && share_code_pattern().is_match(raw)
}
