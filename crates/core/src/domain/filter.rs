use serde::{Deserialize, Serialize};

/// マーケットプレイス検索フィルタ。全フィールド省略可能で、空なら「抽出なし」。
///
/// 値は抽出時点では検証しない（カテゴリ・地名は自由文字列）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// レンタル日数 (正の整数)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    /// 予算上限 (通貨非依存)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl MarketplaceFilter {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.location.is_none()
            && self.duration.is_none()
            && self.max_price.is_none()
            && self.features.is_empty()
    }

    /// マーケットプレイス検索クエリのパラメータ列に変換する。
    pub fn to_query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(category) = &self.category {
            params.push(("category", category.clone()));
        }
        if let Some(location) = &self.location {
            params.push(("location", location.clone()));
        }
        if let Some(duration) = self.duration {
            params.push(("duration", duration.to_string()));
        }
        if let Some(max_price) = self.max_price {
            params.push(("maxPrice", max_price.to_string()));
        }
        if !self.features.is_empty() {
            params.push(("features", self.features.join(",")));
        }
        params
    }
}

/// フィルタをどの経路で抽出したか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterSource {
    Ai,
    Keyword,
}

/// 音声検索 1 回分の結果
#[derive(Debug, Clone, Serialize)]
pub struct VoiceSearchResult {
    pub session_id: String,
    pub transcript: String,
    pub filters: MarketplaceFilter,
    pub source: FilterSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_serializes_to_empty_object() {
        let filter = MarketplaceFilter::default();
        assert!(filter.is_empty());
        assert_eq!(serde_json::to_string(&filter).unwrap(), "{}");
    }

    #[test]
    fn max_price_uses_camel_case_key() {
        let filter = MarketplaceFilter {
            max_price: Some(1500.0),
            ..Default::default()
        };
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["maxPrice"], 1500.0);
        assert!(json.get("max_price").is_none());
        assert!(json.get("features").is_none());
    }

    #[test]
    fn query_params_keep_field_order() {
        let filter = MarketplaceFilter {
            category: Some("tractor".into()),
            location: Some("Pune".into()),
            duration: Some(3),
            max_price: Some(2000.5),
            features: vec!["GPS".into(), "AC cabin".into()],
        };
        assert_eq!(
            filter.to_query_params(),
            vec![
                ("category", "tractor".to_string()),
                ("location", "Pune".to_string()),
                ("duration", "3".to_string()),
                ("maxPrice", "2000.5".to_string()),
                ("features", "GPS,AC cabin".to_string()),
            ]
        );
    }

    #[test]
    fn query_params_skip_absent_fields() {
        let filter = MarketplaceFilter {
            category: Some("harvester".into()),
            ..Default::default()
        };
        assert_eq!(filter.to_query_params(), vec![("category", "harvester".to_string())]);
        assert!(MarketplaceFilter::default().to_query_params().is_empty());
    }

    #[test]
    fn filter_source_serialization() {
        assert_eq!(serde_json::to_string(&FilterSource::Ai).unwrap(), "\"ai\"");
        assert_eq!(serde_json::to_string(&FilterSource::Keyword).unwrap(), "\"keyword\"");
    }
}
