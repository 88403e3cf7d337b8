// src/fetch/urls.rs
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};
use url::Url;

use super::{get_text_with_retry, RetryPolicy};

static QUARTER_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|\D)([1-4])T(\d{4})(?:\D|$)").expect("quarter regex"));
static YEAR_DIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})/$").expect("year regex"));

/// A reporting quarter, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Quarter {
    pub year: i32,
    pub quarter: u8,
}

impl Quarter {
    /// Finds a `1T2024`-style tag anywhere in a file name.
    pub fn from_filename(name: &str) -> Option<Self> {
        let caps = QUARTER_TAG.captures(name)?;
        Some(Quarter {
            quarter: caps[1].parse().ok()?,
            year: caps[2].parse().ok()?,
        })
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T{}", self.quarter, self.year)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarterArchive {
    pub quarter: Quarter,
    pub url: Url,
}

/// Every `href` on the page, resolved against `base`.
fn parse_links(html: &str, base: &Url) -> Vec<(String, Url)> {
    let selector = Selector::parse("a[href]").expect("selector should parse");
    Html::parse_document(html)
        .select(&selector)
        .filter_map(|e| e.value().attr("href"))
        .filter_map(|href| base.join(href).ok().map(|u| (href.to_string(), u)))
        .collect()
}

/// Year subdirectories (`2024/`) of the listing, newest first.
pub fn year_dirs(html: &str, base: &Url) -> Vec<(i32, Url)> {
    let mut years: Vec<(i32, Url)> = parse_links(html, base)
        .into_iter()
        .filter_map(|(href, url)| {
            let name = href.rsplit_terminator('/').next().unwrap_or(&href).to_string() + "/";
            let caps = YEAR_DIR.captures(&name)?;
            Some((caps[1].parse().ok()?, url))
        })
        .collect();
    years.sort_by(|a, b| b.0.cmp(&a.0));
    years.dedup_by_key(|(y, _)| *y);
    years
}

/// `.zip` links on a year page that carry a quarter tag.
pub fn quarter_zips(html: &str, base: &Url) -> Vec<QuarterArchive> {
    parse_links(html, base)
        .into_iter()
        .filter_map(|(_, url)| {
            let name = url.path_segments()?.last()?.to_string();
            if !name.to_lowercase().ends_with(".zip") {
                return None;
            }
            Some(QuarterArchive {
                quarter: Quarter::from_filename(&name)?,
                url,
            })
        })
        .collect()
}

/// Scrape year directories newest-first until `wanted` distinct quarters are found.
pub async fn list_quarter_archives(
    client: &Client,
    base_url: &str,
    wanted: usize,
    retry: RetryPolicy,
) -> Result<Vec<QuarterArchive>> {
    let base = Url::parse(base_url).with_context(|| format!("parsing base URL {}", base_url))?;
    let index = get_text_with_retry(client, &base, retry).await?;

    let mut found: Vec<QuarterArchive> = Vec::new();
    for (year, year_url) in year_dirs(&index, &base) {
        let page = get_text_with_retry(client, &year_url, retry)
            .await
            .with_context(|| format!("listing {}", year_url))?;
        let zips = quarter_zips(&page, &year_url);
        debug!(year, count = zips.len(), "year listing");
        found.extend(zips);

        if distinct_quarters(&found) >= wanted {
            break;
        }
    }

    info!(archives = found.len(), "quarterly archives discovered");
    Ok(found)
}

fn distinct_quarters(archives: &[QuarterArchive]) -> usize {
    let mut qs: Vec<Quarter> = archives.iter().map(|a| a.quarter).collect();
    qs.sort();
    qs.dedup();
    qs.len()
}

/// Keep the newest `n` quarters (one archive each), oldest first.
pub fn latest_quarters(mut archives: Vec<QuarterArchive>, n: usize) -> Vec<QuarterArchive> {
    archives.sort_by(|a, b| b.quarter.cmp(&a.quarter).then_with(|| a.url.cmp(&b.url)));
    archives.dedup_by_key(|a| a.quarter);
    archives.truncate(n);
    archives.reverse();
    archives
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"<html><body><pre>
<a href="../">Parent Directory</a>
<a href="2023/">2023/</a>
<a href="2025/">2025/</a>
<a href="2024/">2024/</a>
<a href="leiame.txt">leiame.txt</a>
</pre></body></html>"#;

    const YEAR_2024: &str = r#"<html><body>
<a href="1T2024.zip">1T2024.zip</a>
<a href="2T2024.zip">2T2024.zip</a>
<a href="3t2024.ZIP">3t2024.ZIP</a>
<a href="dicionario.pdf">dicionario.pdf</a>
<a href="outros.zip">outros.zip</a>
</body></html>"#;

    #[test]
    fn quarter_tags_parse_and_order() {
        assert_eq!(
            Quarter::from_filename("1T2024.zip"),
            Some(Quarter {
                year: 2024,
                quarter: 1
            })
        );
        assert_eq!(
            Quarter::from_filename("demonstracoes_4t2023.zip").map(|q| q.to_string()),
            Some("4T2023".to_string())
        );
        assert_eq!(Quarter::from_filename("5T2024.zip"), None);
        assert_eq!(Quarter::from_filename("11T2024.zip"), None);
        assert!(Quarter::from_filename("4T2023.zip") < Quarter::from_filename("1T2024.zip"));
    }

    #[test]
    fn year_directories_newest_first() {
        let base = Url::parse("https://example.org/demonstracoes_contabeis/").unwrap();
        let years: Vec<i32> = year_dirs(INDEX, &base).into_iter().map(|(y, _)| y).collect();
        assert_eq!(years, vec![2025, 2024, 2023]);
        assert_eq!(
            year_dirs(INDEX, &base)[1].1.as_str(),
            "https://example.org/demonstracoes_contabeis/2024/"
        );
    }

    #[test]
    fn only_tagged_zip_links_are_kept() {
        let base = Url::parse("https://example.org/d/2024/").unwrap();
        let zips = quarter_zips(YEAR_2024, &base);
        let names: Vec<String> = zips.iter().map(|z| z.quarter.to_string()).collect();
        assert_eq!(names, vec!["1T2024", "2T2024", "3T2024"]);
        assert_eq!(zips[0].url.as_str(), "https://example.org/d/2024/1T2024.zip");
    }

    #[test]
    fn latest_quarters_keeps_newest_n_oldest_first() {
        let base = Url::parse("https://example.org/d/").unwrap();
        let mk = |name: &str| QuarterArchive {
            quarter: Quarter::from_filename(name).unwrap(),
            url: base.join(name).unwrap(),
        };
        let picked = latest_quarters(
            vec![
                mk("1T2024.zip"),
                mk("4T2023.zip"),
                mk("3T2024.zip"),
                mk("2T2024.zip"),
                mk("2T2024.zip"),
            ],
            3,
        );
        let tags: Vec<String> = picked.iter().map(|a| a.quarter.to_string()).collect();
        assert_eq!(tags, vec!["1T2024", "2T2024", "3T2024"]);
    }
}
