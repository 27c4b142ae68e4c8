//! Grouping patterns: how a sequence's `grouping` attribute folds its child
//! elements into staggered `group` steps.
//!
//! The pattern is read one symbol per pulse. `x` places the next element in
//! the current group, `&` places it and marks it appending, and any other
//! symbol is a rest. A group closes at the end of the pattern or when the
//! elements run out.

/// Where one element lands inside its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Placement {
    /// Index of the element among the sequence's children.
    pub(crate) element: usize,
    /// Pattern position, used as the delay in pulses when non-zero.
    pub(crate) slot: usize,
    /// Whether the element was placed by `&`.
    pub(crate) append: bool,
}

/// Folds `element_count` elements into groups following `pattern`. Returns
/// `None` when the pattern places nothing, in which case the children are
/// used as plain steps.
pub(crate) fn plan_groups(pattern: &str, element_count: usize) -> Option<Vec<Vec<Placement>>> {
    let symbols: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    if !symbols.iter().any(|symbol| matches!(symbol, 'x' | '&')) {
        return None;
    }

    let mut groups = Vec::new();
    let mut group = Vec::new();
    let mut next = 0;
    let mut cursor = 0;
    while next < element_count {
        let symbol = symbols[cursor];
        if matches!(symbol, 'x' | '&') {
            group.push(Placement {
                element: next,
                slot: cursor,
                append: symbol == '&',
            });
            next += 1;
        }
        cursor += 1;
        if cursor == symbols.len() || next == element_count {
            cursor = 0;
            groups.push(std::mem::take(&mut group));
        }
    }
    Some(groups)
}
