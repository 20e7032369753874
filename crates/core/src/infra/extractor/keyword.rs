use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::{ExtractError, IntentExtractor};
use crate::domain::filter::{FilterSource, MarketplaceFilter};

/// (検索語, 正規化後のカテゴリ)。先に一致したものを採用する。
const CATEGORY_KEYWORDS: &[(&str, &str)] = &[
    ("tractor", "tractor"),
    ("harvester", "harvester"),
    ("plow", "plow"),
    ("plough", "plow"),
];

const KNOWN_CITIES: &[&str] = &[
    "bangalore",
    "mumbai",
    "delhi",
    "pune",
    "hyderabad",
    "chennai",
    "kolkata",
    "jaipur",
    "ahmedabad",
    "lucknow",
];

static DURATION_DAYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*days?").unwrap());

/// キーワード表と正規表現だけで書き起こしからフィルタを抽出する。
///
/// ネットワーク・時刻・乱数に依存せず、同じ入力には常に同じ結果を返す。
pub fn extract_basic(transcript: &str) -> MarketplaceFilter {
    let lower = transcript.to_lowercase();
    let mut filter = MarketplaceFilter::default();

    filter.category = CATEGORY_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, canonical)| canonical.to_string());

    filter.location = KNOWN_CITIES
        .iter()
        .find(|city| lower.contains(*city))
        .map(|city| title_case(city));

    filter.duration = DURATION_DAYS
        .captures(&lower)
        .and_then(|caps| caps.get(1))
        .and_then(|days| days.as_str().parse::<u32>().ok())
        .filter(|days| *days > 0);

    filter
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `extract_basic` をそのまま使う抽出器（失敗しない）
pub struct KeywordExtractor;

#[async_trait]
impl IntentExtractor for KeywordExtractor {
    async fn extract(&self, transcript: &str) -> Result<MarketplaceFilter, ExtractError> {
        Ok(extract_basic(transcript))
    }

    fn name(&self) -> &str {
        "keyword"
    }

    fn source(&self) -> FilterSource {
        FilterSource::Keyword
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_sentence() {
        let filter = extract_basic("I need a tractor in Bangalore for 3 days");
        assert_eq!(
            filter,
            MarketplaceFilter {
                category: Some("tractor".into()),
                location: Some("Bangalore".into()),
                duration: Some(3),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_no_duration_key() {
        let filter = extract_basic("harvester in mumbai");
        assert_eq!(filter.category.as_deref(), Some("harvester"));
        assert_eq!(filter.location.as_deref(), Some("Mumbai"));
        assert_eq!(filter.duration, None);

        let json = serde_json::to_value(&filter).unwrap();
        assert!(json.get("duration").is_none());
    }

    #[test]
    fn test_nothing_recognized() {
        for t in ["", "hello there", "something for a week", "rent me a combine"] {
            let filter = extract_basic(t);
            assert!(filter.is_empty(), "{t:?} gave {filter:?}");
            assert_eq!(serde_json::to_string(&filter).unwrap(), "{}");
        }
    }

    #[test]
    fn test_single_category_keywords() {
        assert_eq!(extract_basic("a TRACTOR please").category.as_deref(), Some("tractor"));
        assert_eq!(extract_basic("harvester").category.as_deref(), Some("harvester"));
        assert_eq!(extract_basic("plow").category.as_deref(), Some("plow"));
        assert_eq!(extract_basic("a plough").category.as_deref(), Some("plow"));
    }

    #[test]
    fn test_category_priority() {
        assert_eq!(
            extract_basic("plough or harvester or tractor").category.as_deref(),
            Some("tractor")
        );
        assert_eq!(
            extract_basic("plough or harvester").category.as_deref(),
            Some("harvester")
        );
    }

    #[test]
    fn test_city_list_order_wins() {
        // リスト順で先に来る都市を採用
        let filter = extract_basic("from delhi to bangalore");
        assert_eq!(filter.location.as_deref(), Some("Bangalore"));
        assert_eq!(extract_basic("PUNE").location.as_deref(), Some("Pune"));
    }

    #[test]
    fn test_duration_variants() {
        assert_eq!(extract_basic("for 1 day").duration, Some(1));
        assert_eq!(extract_basic("for 10days").duration, Some(10));
        assert_eq!(extract_basic("5 DAYS then 7 days").duration, Some(5));
        assert_eq!(extract_basic("0 days").duration, None);
        assert_eq!(extract_basic("99999999999 days").duration, None);
    }

    #[test]
    fn test_idempotent() {
        let t = "Need a plough in Jaipur for 4 days";
        assert_eq!(extract_basic(t), extract_basic(t));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("hyderabad"), "Hyderabad");
        assert_eq!(title_case(""), "");
    }

    #[tokio::test]
    async fn test_keyword_extractor_never_fails() {
        let filter = KeywordExtractor.extract("tractor for 2 days").await.unwrap();
        assert_eq!(filter.duration, Some(2));
        assert_eq!(KeywordExtractor.name(), "keyword");
    }
}
