use scraper::{Html, Selector};

use crate::discover::team_from_url;
use crate::error::{CrawlError, Result};
use crate::model::Software;

pub const DESCRIPTION_LIMIT: usize = 500;
const TERMINATOR: &str = "...";

/// A paragraph whose markup holds any of these carries style or script, not prose.
const EMBEDDED_MARKERS: &[&str] = &["<style", "</style>", "<script", "</script>"];

/// Summarize the `div#bodyContent` paragraphs of a wiki page.
///
/// Paragraph text is copied char by char until `DESCRIPTION_LIMIT` chars are
/// collected. A paragraph that ends under the limit is followed by one space.
/// `"..."` is always appended, truncated or not.
pub fn build_description(html: &str, page_url: &str) -> Result<String> {
    let paragraphs = body_paragraphs(html, page_url)?;

    let mut description = String::new();
    let mut len = 0usize;
    for paragraph in &paragraphs {
        if len >= DESCRIPTION_LIMIT {
            break;
        }
        for c in paragraph.chars() {
            if len >= DESCRIPTION_LIMIT {
                break;
            }
            description.push(c);
            len += 1;
        }
        if len < DESCRIPTION_LIMIT {
            description.push(' ');
            len += 1;
        }
    }
    description.push_str(TERMINATOR);
    Ok(description)
}

/// Build the full record for an accepted software page.
pub fn software_from_page(html: &str, page_url: &str, year: i64) -> Result<Software> {
    let team = team_from_url(page_url)?;
    let description = build_description(html, page_url)?;
    Ok(Software {
        team,
        description,
        year,
    })
}

/// Normalized text of every usable `<p>` in `div#bodyContent`.
fn body_paragraphs(html: &str, page_url: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let body_sel = Selector::parse("div#bodyContent").unwrap();
    let p_sel = Selector::parse("p").unwrap();

    let body = document
        .select(&body_sel)
        .next()
        .ok_or_else(|| CrawlError::parse(page_url, "missing div#bodyContent"))?;

    Ok(body
        .select(&p_sel)
        .filter(|p| !has_embedded_markup(&p.html()))
        .map(|p| normalize(&p.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect())
}

fn has_embedded_markup(markup: &str) -> bool {
    EMBEDDED_MARKERS.iter().any(|m| markup.contains(m))
}

/// Strip every line and glue them back together without separators.
fn normalize(text: &str) -> String {
    text.split('\n').map(str::trim).collect()
}
