use scraper::{Html, Selector};
use tracing::info;

use crate::error::{CrawlError, Result};
use crate::fetch::Fetch;

const SOFTWARE_SUFFIX: &str = "/Software";

pub fn index_url(base: &str, year: i64) -> String {
    format!("{}?year={}", base, year)
}

/// Fetch the team index for `year` and return one software-page URL per team,
/// in document order.
pub async fn discover<F: Fetch>(fetcher: &F, base: &str, year: i64) -> Result<Vec<String>> {
    let url = index_url(base, year);
    info!("Fetching team index: {}", url);
    let html = fetcher.get_text(&url).await?;
    let links = candidate_links(&html, &url)?;
    info!("Team pages on index: {}", links.len());
    Ok(links)
}

/// Every anchor inside `div#content_Page`, with `/Software` appended to its href.
///
/// Anchors without an `href` are not candidates, so the result can be shorter
/// than the region's anchor count.
pub fn candidate_links(html: &str, page_url: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let content_sel = Selector::parse("div#content_Page").unwrap();
    let anchor_sel = Selector::parse("a[href]").unwrap();

    let content = document
        .select(&content_sel)
        .next()
        .ok_or_else(|| CrawlError::parse(page_url, "missing div#content_Page"))?;

    Ok(content
        .select(&anchor_sel)
        .filter_map(|a| a.value().attr("href"))
        .map(|href| format!("{}{}", href, SOFTWARE_SUFFIX))
        .collect())
}

/// Team name from a wiki URL such as `https://2021.igem.org/Team:Aachen/Software`.
///
/// The fourth `/`-separated piece is `Team:<name>`; the name is whatever sits
/// between the first and second `:` of that piece.
pub fn team_from_url(url: &str) -> Result<String> {
    let segment = url
        .split('/')
        .nth(3)
        .ok_or_else(|| CrawlError::parse(url, "no team path segment"))?;
    let team = segment
        .split(':')
        .nth(1)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| CrawlError::parse(url, "team segment has no ':' qualifier"))?;
    Ok(team.to_string())
}
