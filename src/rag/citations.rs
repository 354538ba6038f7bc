//! Source citations in a final answer

use std::collections::HashSet;

use crate::types::Passage;

/// Source ids cited in `answer` as `[id]` (or `[id1, id2]`), in acceptance order
///
/// Falls back to every accepted source when the answer cites none of them.
pub fn cited_sources(answer: &str, accepted: &[Passage]) -> Vec<String> {
    let cited = bracketed_ids(answer);
    let matched: Vec<String> = accepted
        .iter()
        .map(|p| p.source_id())
        .filter(|id| cited.contains(*id))
        .map(str::to_string)
        .collect();

    if matched.is_empty() {
        accepted.iter().map(|p| p.source_id().to_string()).collect()
    } else {
        matched
    }
}

fn bracketed_ids(text: &str) -> HashSet<&str> {
    let mut ids = HashSet::new();
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            break;
        };
        for id in after[..close].split([',', ';']) {
            let id = id.trim();
            if !id.is_empty() {
                ids.insert(id);
            }
        }
        rest = &after[close + 1..];
    }
    ids
}
