use nw_core::text::clean_text;
use scraper::{Html, Selector};

/// Visible text of an HTML fragment, whitespace collapsed.
pub fn html_to_text(fragment: &str) -> String {
    if !fragment.contains('<') {
        return clean_text(fragment);
    }
    let document = Html::parse_fragment(fragment);
    let text = match Selector::parse("script, style") {
        Ok(skip) => {
            let hidden: Vec<_> = document.select(&skip).map(|el| el.id()).collect();
            document
                .root_element()
                .descendants()
                .filter(|node| !node.ancestors().any(|a| hidden.contains(&a.id())))
                .filter_map(|node| node.value().as_text().map(|t| String::from(&**t)))
                .collect::<Vec<_>>()
                .join(" ")
        }
        Err(_) => document.root_element().text().collect::<Vec<_>>().join(" "),
    };
    clean_text(&text)
}

/// First usable `<img src>` of a fragment. Tracking pixels are skipped.
pub fn first_image(fragment: &str) -> Option<String> {
    if !fragment.contains("<img") {
        return None;
    }
    let document = Html::parse_fragment(fragment);
    let selector = Selector::parse("img[src]").ok()?;
    document
        .select(&selector)
        .filter(|img| {
            let tiny = |attr: &str| img.value().attr(attr).map_or(false, |v| v == "1" || v == "0");
            !(tiny("width") || tiny("height"))
        })
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .find(|src| src.starts_with("http"))
        .map(str::to_string)
}
