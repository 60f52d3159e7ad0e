//! Turn free-form model output into a typed decision
//!
//! The model is asked to answer with `MOVE: <n>` or `SWITCH: <name>` plus a
//! `REASONING:` section, but it doesn't always comply. We scan for the
//! labelled forms first, then for looser phrasings ("use 2", "switch to
//! Blastoise"). Anything we can't map onto a legal action is reported as
//! `None`; that's a normal outcome and the caller falls back.

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_till, take_while1},
    character::complete::{char, digit1, space0, space1},
    combinator::{map_res, rest},
    sequence::preceded,
    IResult, Parser,
};
use std::sync::Arc;

use crate::ai::analysis;
use crate::ai::context::DecisionContext;
use crate::ai::decision::Decision;
use crate::battle::moves::MoveLookup;

/// Confidence of any accepted model decision; the model reports none itself
pub const MODEL_CONFIDENCE: f32 = 0.7;

/// Longest reasoning taken from an unlabelled response
pub const REASONING_FALLBACK_LIMIT: usize = 200;

const TRUNCATION_MARKER: &str = "...";

fn labelled_move(input: &str) -> IResult<&str, usize> {
    preceded(
        (tag_no_case("move"), space0, char(':'), space0),
        map_res(digit1, str::parse::<usize>),
    )
    .parse(input)
}

fn loose_move(input: &str) -> IResult<&str, usize> {
    preceded(
        (alt((tag_no_case("move"), tag_no_case("use"))), space1),
        map_res(digit1, str::parse::<usize>),
    )
    .parse(input)
}

fn labelled_switch(input: &str) -> IResult<&str, &str> {
    preceded(
        (tag_no_case("switch"), space0, char(':'), space0),
        take_till(|c: char| c == '\n' || c == '\r'),
    )
    .parse(input)
}

fn loose_switch(input: &str) -> IResult<&str, &str> {
    preceded(
        (tag_no_case("switch"), space1, tag_no_case("to"), space1),
        take_while1(is_name_char),
    )
    .parse(input)
}

fn reasoning_label(input: &str) -> IResult<&str, &str> {
    preceded((tag_no_case("reasoning"), space0, char(':')), rest).parse(input)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '\''
}

/// Run `parser` at every word start in `text`, returning the first match
/// and the byte offset it started at
fn scan_at<'a, O>(
    text: &'a str,
    mut parser: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> Option<(usize, O)> {
    let mut prev: Option<char> = None;
    for (i, c) in text.char_indices() {
        let at_word_start = prev.map_or(true, |p| !p.is_alphanumeric());
        if at_word_start {
            if let Ok((_, out)) = parser(&text[i..]) {
                return Some((i, out));
            }
        }
        prev = Some(c);
    }
    None
}

fn scan<'a, O>(
    text: &'a str,
    parser: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> Option<O> {
    scan_at(text, parser).map(|(_, out)| out)
}

/// Text before the `REASONING:` label; loose phrasings are only trusted here
fn answer_section(text: &str) -> &str {
    match scan_at(text, reasoning_label) {
        Some((start, _)) => &text[..start],
        None => text,
    }
}

/// 0-based move index from `MOVE: n` or the looser `move n` / `use n`
pub fn extract_move_index(text: &str) -> Option<usize> {
    let number = scan(text, labelled_move).or_else(|| scan(answer_section(text), loose_move))?;
    number.checked_sub(1)
}

/// Team member name from `SWITCH: name` or the looser `switch to name`
pub fn extract_pokemon_name(text: &str) -> Option<String> {
    let labelled = scan(text, labelled_switch)
        .map(|name| name.trim().trim_end_matches(['.', '!', ',']).trim())
        .filter(|name| !name.is_empty());
    labelled
        .or_else(|| scan(answer_section(text), loose_switch))
        .map(str::to_string)
}

/// Text of the `REASONING:` section up to a blank line, or the whole
/// response truncated when there is no such section
pub fn extract_reasoning(text: &str) -> String {
    if let Some(section) = scan(text, reasoning_label) {
        let body = section
            .lines()
            .enumerate()
            .take_while(|(i, line)| *i == 0 || !line.trim().is_empty())
            .map(|(_, line)| line.trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if !body.is_empty() {
            return body;
        }
    }

    let trimmed = text.trim();
    if trimmed.chars().count() > REASONING_FALLBACK_LIMIT {
        let mut cut: String = trimmed.chars().take(REASONING_FALLBACK_LIMIT).collect();
        cut.push_str(TRUNCATION_MARKER);
        cut
    } else {
        trimmed.to_string()
    }
}

/// Maps model text onto a legal decision for the current context
#[derive(Clone)]
pub struct ResponseInterpreter {
    lookup: Arc<dyn MoveLookup>,
}

impl ResponseInterpreter {
    pub fn new(lookup: Arc<dyn MoveLookup>) -> Self {
        Self { lookup }
    }

    /// `None` means unparsable: neither a legal move nor a known teammate
    ///
    /// Switch requests try the switch parse first, move requests the move
    /// parse.
    pub fn interpret(&self, text: &str, context: &DecisionContext) -> Option<Decision> {
        let reasoning = extract_reasoning(text);
        if context.is_switch_request() {
            self.parse_switch(text, context, &reasoning)
                .or_else(|| self.parse_move(text, context, &reasoning))
        } else {
            self.parse_move(text, context, &reasoning)
                .or_else(|| self.parse_switch(text, context, &reasoning))
        }
    }

    fn parse_move(&self, text: &str, context: &DecisionContext, reasoning: &str) -> Option<Decision> {
        let index = extract_move_index(text)?;
        let moves = context.available_moves();
        let Some(name) = moves.get(index) else {
            tracing::debug!(
                index,
                available = moves.len(),
                "Model picked a move slot that doesn't exist"
            );
            return None;
        };
        let record = analysis::resolve_move(self.lookup.as_ref(), name);
        Some(Decision::use_move(
            Some(index),
            record,
            reasoning,
            MODEL_CONFIDENCE,
        ))
    }

    fn parse_switch(
        &self,
        text: &str,
        context: &DecisionContext,
        reasoning: &str,
    ) -> Option<Decision> {
        let name = extract_pokemon_name(text)?;
        let (team_index, member) = context.ai_player().find_member(&name)?;
        Some(Decision::switch_to(
            team_index,
            member.name.clone(),
            reasoning,
            MODEL_CONFIDENCE,
        ))
    }
}
