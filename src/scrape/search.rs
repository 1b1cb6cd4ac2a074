use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::ScrapedListing;

use super::squash_whitespace;

/// Parse a search-results page into the listings visible on it.
///
/// Every field is extracted independently and degrades to an empty string
/// when its node is missing, so one mangled ad never drops the rest of the
/// page. Ads without a recoverable article id are dropped (nothing to key
/// the upsert on). An unrecognized page yields an empty vec, not an error.
pub fn parse_search_results(html: &str, site_base: &str) -> Vec<ScrapedListing> {
    let document = Html::parse_document(html);
    let container = Selector::parse("article.aditem").expect("valid selector");

    let mut listings = Vec::new();

    for ad in document.select(&container) {
        let Some(article_id) = extract_article_id(&ad) else {
            tracing::debug!("Skipping ad without article id");
            continue;
        };

        listings.push(ScrapedListing {
            article_id,
            title: extract_title(&ad).unwrap_or_default(),
            price: extract_price(&ad).unwrap_or_default(),
            location: extract_location(&ad).unwrap_or_default(),
            posted_at: extract_posted_at(&ad).unwrap_or_default(),
            description: extract_description(&ad).unwrap_or_default(),
            url: extract_url(&ad, site_base).unwrap_or_default(),
            thumbnail_url: extract_thumbnail(&ad).unwrap_or_default(),
        });
    }

    listings
}

// One function per field so a markup change on the site touches exactly
// one place. Each returns None when the node or attribute is absent.

fn extract_article_id(ad: &ElementRef) -> Option<String> {
    ad.value()
        .attr("data-adid")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn extract_title(ad: &ElementRef) -> Option<String> {
    select_text(ad, "h2 a")
}

fn extract_price(ad: &ElementRef) -> Option<String> {
    select_text(ad, ".aditem-main--middle--price-shipping--price")
}

fn extract_location(ad: &ElementRef) -> Option<String> {
    select_text(ad, ".aditem-main--top--left")
}

fn extract_posted_at(ad: &ElementRef) -> Option<String> {
    select_text(ad, ".aditem-main--top--right")
}

fn extract_description(ad: &ElementRef) -> Option<String> {
    select_text(ad, ".aditem-main--middle--description")
}

fn extract_url(ad: &ElementRef, site_base: &str) -> Option<String> {
    let selector = Selector::parse("h2 a").expect("valid selector");
    let href = ad
        .select(&selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .or_else(|| ad.value().attr("data-href"))?;

    // Listing hrefs are site-relative ("/s-anzeige/...")
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    Url::parse(site_base)
        .ok()?
        .join(href)
        .ok()
        .map(|u| u.to_string())
}

fn extract_thumbnail(ad: &ElementRef) -> Option<String> {
    let imagebox = Selector::parse(".imagebox").expect("valid selector");
    if let Some(src) = ad
        .select(&imagebox)
        .next()
        .and_then(|n| n.value().attr("data-imgsrc"))
    {
        return Some(src.to_string());
    }

    let img = Selector::parse("img").expect("valid selector");
    ad.select(&img)
        .next()
        .and_then(|n| n.value().attr("src"))
        .map(str::to_string)
}

fn select_text(ad: &ElementRef, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).expect("valid selector");
    ad.select(&selector)
        .next()
        .map(|node| squash_whitespace(&node.text().collect::<String>()))
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.kleinanzeigen.de";

    const RESULTS_PAGE: &str = r#"
    <html><body>
    <ul id="srchrslt-adtable">
      <li class="ad-listitem">
        <article class="aditem" data-adid="2551234567" data-href="/s-anzeige/iphone-12-128gb/2551234567">
          <div class="aditem-image">
            <div class="imagebox" data-imgsrc="https://img.kleinanzeigen.de/api/v1/prod-ads/images/aa.jpg"></div>
          </div>
          <div class="aditem-main">
            <div class="aditem-main--top--left"> 10115&nbsp;Berlin </div>
            <div class="aditem-main--top--right">Heute, 14:32</div>
            <h2 class="text-module-begin">
              <a class="ellipsis" href="/s-anzeige/iphone-12-128gb/2551234567">iPhone 12   128GB &amp; Zubeh&ouml;r</a>
            </h2>
            <p class="aditem-main--middle--description">Kaum genutzt, Display
               minimal verkratzt</p>
            <p class="aditem-main--middle--price-shipping--price">250 € VB</p>
          </div>
        </article>
      </li>
      <li class="ad-listitem">
        <article class="aditem" data-adid="2559876543">
          <div class="aditem-main">
            <div class="aditem-main--top--left">80331 München</div>
            <div class="aditem-main--top--right">Gestern, 09:01</div>
            <h2 class="text-module-begin">
              <a class="ellipsis" href="/s-anzeige/iphone-se/2559876543">iPhone SE defekt</a>
            </h2>
            <p class="aditem-main--middle--description">Bastlergerät</p>
          </div>
        </article>
      </li>
      <li class="ad-listitem">
        <article class="aditem">
          <h2><a href="/s-anzeige/ohne-id/0">Anzeige ohne ID</a></h2>
        </article>
      </li>
    </ul>
    </body></html>
    "#;

    #[test]
    fn parses_every_keyed_listing() {
        let listings = parse_search_results(RESULTS_PAGE, BASE);
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].article_id, "2551234567");
        assert_eq!(listings[1].article_id, "2559876543");
    }

    #[test]
    fn extracts_fields_and_decodes_entities() {
        let listings = parse_search_results(RESULTS_PAGE, BASE);
        let first = &listings[0];
        assert_eq!(first.title, "iPhone 12 128GB & Zubehör");
        assert_eq!(first.price, "250 € VB");
        assert_eq!(first.location, "10115 Berlin");
        assert_eq!(first.posted_at, "Heute, 14:32");
        assert_eq!(first.description, "Kaum genutzt, Display minimal verkratzt");
        assert_eq!(
            first.url,
            "https://www.kleinanzeigen.de/s-anzeige/iphone-12-128gb/2551234567"
        );
        assert_eq!(
            first.thumbnail_url,
            "https://img.kleinanzeigen.de/api/v1/prod-ads/images/aa.jpg"
        );
    }

    #[test]
    fn missing_price_degrades_to_empty_string() {
        let listings = parse_search_results(RESULTS_PAGE, BASE);
        let second = &listings[1];
        assert_eq!(second.price, "");
        assert_eq!(second.title, "iPhone SE defekt");
        assert_eq!(second.thumbnail_url, "");
    }

    #[test]
    fn unkeyed_listing_is_dropped_silently() {
        let listings = parse_search_results(RESULTS_PAGE, BASE);
        assert!(listings.iter().all(|l| !l.article_id.is_empty()));
    }

    #[test]
    fn page_without_containers_yields_empty_vec() {
        let listings = parse_search_results("<html><body><p>Keine Anzeigen</p></body></html>", BASE);
        assert!(listings.is_empty());
    }
}
