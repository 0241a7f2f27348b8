//! The "first success from an ordered selector list" combinator.

use scraper::ElementRef;

use crate::page::parse_selector;

/// Walks `ladder` in order and, for each selector, every matching
/// descendant of `scope` in document order. Returns the first value `accept`
/// produces.
///
/// Selector order encodes confidence: a later selector is only consulted
/// once every element of the earlier ones has been rejected.
pub fn first_match<'a, S, T, F>(scope: ElementRef<'a>, ladder: &[S], mut accept: F) -> Option<T>
where
    S: AsRef<str>,
    F: FnMut(ElementRef<'a>) -> Option<T>,
{
    ladder.iter().find_map(|raw| {
        let selector = parse_selector(raw.as_ref())?;
        let found = scope.select(&selector).find_map(&mut accept);
        if found.is_none() {
            tracing::debug!(selector = raw.as_ref(), "selector produced no accepted element");
        }
        found
    })
}

/// First element of `scope` matched by any selector of `ladder`, in ladder
/// order.
pub fn first_element<'a, S: AsRef<str>>(
    scope: ElementRef<'a>,
    ladder: &[S],
) -> Option<ElementRef<'a>> {
    first_match(scope, ladder, Some)
}
