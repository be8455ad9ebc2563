/// Phrases that only appear on unfilled wiki templates.
const PLACEHOLDER_PHRASES: &[&str] = &[
    "There is currently no text in this page.",
    "In order to be considered for the",
    "you must fill this page.",
    "This page is used by the judges to evaluate your team for the",
    "Regardless of the topic, iGEM projects often create or adapt computational tools to move the project forward.",
];

/// False when the raw page body contains any placeholder phrase.
///
/// Plain substring match on the unparsed body; a real page quoting one of
/// these phrases is dropped too.
pub fn is_substantive(page: &str) -> bool {
    !PLACEHOLDER_PHRASES.iter().any(|p| page.contains(p))
}
