//! Tests for core types

#[cfg(test)]
mod tests {
    use super::super::types::*;

    #[test]
    fn test_feature_value_untagged_parse() {
        let map: RawFeatureMap = serde_json::from_str(
            r#"{"jockey_score": 72.5, "first_up_flag": true, "jockey": "J Smith", "draw": null}"#,
        )
        .unwrap();
        assert_eq!(map["jockey_score"], FeatureValue::Number(72.5));
        assert_eq!(map["first_up_flag"], FeatureValue::Flag(true));
        assert_eq!(map["jockey"], FeatureValue::Text("J Smith".to_string()));
        assert_eq!(map["draw"], FeatureValue::Null);
    }

    #[test]
    fn test_feature_value_views() {
        assert_eq!(FeatureValue::Number(3.0).as_f64(), Some(3.0));
        assert_eq!(FeatureValue::Flag(true).as_f64(), Some(1.0));
        assert_eq!(FeatureValue::Text("x".into()).as_f64(), None);
        assert_eq!(FeatureValue::Null.as_f64(), None);
        assert_eq!(FeatureValue::Number(f64::NAN).as_f64(), None);

        assert_eq!(FeatureValue::Number(0.0).as_bool(), Some(false));
        assert_eq!(FeatureValue::Number(2.0).as_bool(), Some(true));
        assert_eq!(FeatureValue::Text("yes".into()).as_bool(), None);
    }

    #[test]
    fn test_event_card_deserialization() {
        let json = r#"{
            "event_id": "ST-2024-06-01-R3",
            "event_date": "2024-06-01",
            "venue": "ST",
            "entrants": [
                {"id": "Golden Sixty", "features": {"last_5_avg": 1.4}, "win_odds": 2.1},
                {"id": "Romantic Warrior"}
            ]
        }"#;
        let card: EventCard = serde_json::from_str(json).unwrap();
        assert_eq!(card.entrants.len(), 2);
        assert_eq!(card.entrants[0].win_odds, Some(2.1));
        assert!(card.entrants[1].features.is_empty());
        assert_eq!(card.entrants[1].win_odds, None);
    }

    #[test]
    fn test_risk_level_from_count() {
        assert_eq!(RiskLevel::from_factor_count(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_factor_count(2), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_factor_count(3), RiskLevel::High);
    }

    #[test]
    fn test_health_status_ordering() {
        assert!(HealthStatus::Critical > HealthStatus::Warning);
        assert!(HealthStatus::Warning > HealthStatus::Healthy);
        assert_eq!(serde_json::to_string(&HealthStatus::Critical).unwrap(), "\"critical\"");
    }

    #[test]
    fn test_stop_flag_is_shared_between_clones() {
        let flag = StopFlag::new();
        let worker = flag.clone();
        assert!(!worker.is_stopped());
        flag.stop();
        assert!(worker.is_stopped());
    }
}
