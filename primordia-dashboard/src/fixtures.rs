use primordia_data::model::{BoundingBox, Centroid, Region, RegionId, SignalBundle};
use serde_json::json;

pub(crate) fn region(id: &str) -> Region {
    Region {
        id: RegionId::new(id),
        name: id.to_uppercase(),
        description: format!("{id} industrial zone"),
        bbox: BoundingBox {
            west: 121.0,
            south: 30.5,
            east: 122.0,
            north: 31.5,
        },
        centroid: Centroid {
            lng: 121.5,
            lat: 31.0,
        },
        category: "port".to_string(),
    }
}

pub(crate) fn bundle(id: &str, divergence_score: f64) -> SignalBundle {
    serde_json::from_value(json!({
        "region_id": id,
        "timestamp": "2025-01-14T09:30:00",
        "satellite_score": 0.4,
        "news_score": -0.3,
        "market_score": 0.1,
        "divergence_score": divergence_score,
        "data_mode": "demo",
        "satellite_raw": {
            "activity_delta_pct": 12.0,
            "confidence": 0.85,
            "trend": "expanding"
        },
        "news_raw": {
            "sentiment_score": -0.3,
            "hype_intensity": 40.0,
            "headlines": [
                { "title": "Port volumes slump", "source": "Wire", "sentiment": -0.4 }
            ]
        },
        "alerts": [
            { "level": "warning", "message": "Moderate divergence", "category": "divergence" }
        ]
    }))
    .expect("fixture bundle is valid")
}
