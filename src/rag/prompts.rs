//! Prompt templates for the reasoning components
//!
//! Every prompt opens with a `### task: <kind>` line so transcripts and the
//! scripted test backend can tell the five call types apart.

use serde::{Deserialize, Serialize};

/// Reasoning call type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromptKind {
    Route,
    Reformulate,
    Grade,
    Synthesize,
    Check,
}

impl PromptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::Route => "route",
            PromptKind::Reformulate => "reformulate",
            PromptKind::Grade => "grade",
            PromptKind::Synthesize => "synthesize",
            PromptKind::Check => "check",
        }
    }

    fn header(&self) -> String {
        format!("### task: {}", self.as_str())
    }

    /// Recover the kind from a rendered prompt
    pub fn detect(prompt: &str) -> Option<PromptKind> {
        let first = prompt.lines().next()?.trim();
        let kind = first.strip_prefix("### task:")?.trim();
        [
            PromptKind::Route,
            PromptKind::Reformulate,
            PromptKind::Grade,
            PromptKind::Synthesize,
            PromptKind::Check,
        ]
        .into_iter()
        .find(|k| k.as_str() == kind)
    }
}

pub fn route(query: &str, today: &str, history: &[String]) -> String {
    let context = if history.is_empty() {
        String::new()
    } else {
        format!("\nEarlier in this query:\n- {}\n", history.join("\n- "))
    };
    format!(
        r#"{header}
Today is {today}.
You route questions for an assistant that can search a private document corpus.

Question: {query}
{context}
Decide how the question should be answered:
- DIRECT: general knowledge, arithmetic, or small talk; no documents needed.
- RETRIEVE: the answer depends on information in the document corpus.
- REFORMULATE: the question is too vague or over-constrained to search as written.

Reply with exactly one word: DIRECT, RETRIEVE, or REFORMULATE."#,
        header = PromptKind::Route.header(),
    )
}

pub fn reformulate(original: &str, current: &str, history: &[String]) -> String {
    let notes = if history.is_empty() {
        "none".to_string()
    } else {
        history.join("\n- ")
    };
    format!(
        r#"{header}
A document search did not find relevant passages.

Original question: {original}
Last search text: {current}
Previous attempts:
- {notes}

Rewrite the search text to improve recall: broaden terms, use noun phrases or
section titles, drop overly specific constraints and comparative words such as
"new", "changed", or "difference".

Reply with the rewritten search text only, on a single line."#,
        header = PromptKind::Reformulate.header(),
    )
}

pub fn grade(query: &str, source_id: &str, passage: &str) -> String {
    format!(
        r#"{header}
Question: {query}

Passage (source: {source_id}):
"""
{passage}
"""

Does the passage contain information that could help answer the question? It
does not need to be the complete answer.

Reply with exactly one word: RELEVANT or IRRELEVANT."#,
        header = PromptKind::Grade.header(),
    )
}

pub fn synthesize_with_evidence(query: &str, evidence: &str, strict: bool) -> String {
    let strictness = if strict {
        "\n4. A previous draft made claims the evidence does not support. State ONLY what the\n   evidence says; if it is not enough, say \"Insufficient reference material\"."
    } else {
        ""
    };
    format!(
        r#"{header}
Answer strictly based on the reference material.

=== Reference Material Start ===
{evidence}
=== Reference Material End ===

Question: {query}

Guidelines:
1. Cite the source of every claim in square brackets, e.g. [source-id].
2. No hallucination: if the answer is not in the material, say "Insufficient reference material".
3. Be concise.{strictness}

Answer:"#,
        header = PromptKind::Synthesize.header(),
    )
}

pub fn synthesize_direct(query: &str) -> String {
    format!(
        r#"{header}
Answer the question from general knowledge. Be concise, and say so if you are unsure.

Question: {query}

Answer:"#,
        header = PromptKind::Synthesize.header(),
    )
}

pub fn check(draft: &str, evidence: &str) -> String {
    format!(
        r#"{header}
=== Evidence Start ===
{evidence}
=== Evidence End ===

Draft answer:
"""
{draft}
"""

Is every material claim in the draft traceable to at least one evidence passage?

Reply with exactly one word: GROUNDED or UNSUPPORTED."#,
        header = PromptKind::Check.header(),
    )
}

/// Verdict keyword a model reply opens with, matched against `options`.
///
/// Only the first word counts: "Not relevant" or "The passage is relevant"
/// yield `None`, leaving the caller's failure default in charge.
pub fn parse_keyword<'a>(reply: &str, options: &[&'a str]) -> Option<&'a str> {
    let first_word = reply
        .split(|c: char| !c.is_ascii_alphabetic())
        .find(|w| !w.is_empty())?
        .to_uppercase();
    options.iter().copied().find(|opt| first_word == *opt)
}
