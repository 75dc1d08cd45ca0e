use std::fs::File;
use std::sync::Arc;

use quadrant_index::config::{Config, IndexConfig};
use quadrant_index::persistence::{
    ensure_unique_ids, DocumentMapper, RecordMapper, RelationalMapper,
};
use quadrant_index::spatial::{CoordinateProjector, PointBuilder, SpatialKeyEncoder};
use quadrant_index::{IndexError, QuadrantIndex, QuadrantIndexBuilder, QuadrantQueryService, RawSchoolRow};

/// 40 x 40 grid of schools over East Anglia, plus a few without coordinates
fn rows() -> Vec<RawSchoolRow> {
    let mut rows: Vec<RawSchoolRow> = (0..1600u64)
        .map(|i| RawSchoolRow {
            urn: 100000 + i,
            name: format!("School {}", i),
            easting: Some(560000.0 + (i % 40) as f64 * 2000.0),
            northing: Some(180000.0 + (i / 40) as f64 * 3000.0),
        })
        .collect();
    rows.push(RawSchoolRow {
        urn: 999001,
        name: "No Grid Reference".to_string(),
        easting: None,
        northing: None,
    });
    rows.push(RawSchoolRow {
        urn: 999002,
        name: "Zero Grid Reference".to_string(),
        easting: Some(0.0),
        northing: Some(0.0),
    });
    rows
}

fn build() -> QuadrantIndex {
    let config = Config::default();
    let projector = CoordinateProjector::new(&config.projection).expect("projection");
    let encoder = SpatialKeyEncoder::new(config.index.key_precision);
    let points = PointBuilder::new(projector, encoder).build_all(&rows());
    QuadrantIndexBuilder::from_config(&config.index)
        .build(&points)
        .expect("index build")
}

#[test]
fn test_root_covers_every_located_school() {
    let index = build();
    let root = index.root().expect("root quadrant");

    assert_eq!(root.level, 0);
    // sentinel rows stay in the dataset but fall outside the padded box
    assert_eq!(root.point_count, 1600);
    for p in &root.points {
        assert!(p.lat() > 51.0 && p.lat() < 53.5);
        assert!(p.lng() > 0.0 && p.lng() < 2.5);
    }
}

#[test]
fn test_levels_respect_limits() {
    let index = build();
    let limits = IndexConfig::default();

    assert!(index.levels() > 1);
    assert!(index.levels() as u32 <= limits.max_level + 1);
    for q in index.iter() {
        assert_eq!(q.point_count, q.points.len());
        assert!(q.id.starts_with(&format!("{}_", q.level)));
    }
    ensure_unique_ids(&index).expect("distinct ids for spread-out schools");
}

#[test]
fn test_small_viewport_gets_deep_quadrant() {
    let index = Arc::new(build());
    let root = index.root().unwrap().clone();
    let service = QuadrantQueryService::new(index, SpatialKeyEncoder::default());

    let sw = root.points[0].geo_point();
    let found = service
        .query_extent(sw.lng, sw.lat, sw.lng + 0.001, sw.lat + 0.001)
        .unwrap();
    assert!(found.level > 0);
    assert!(found.point_count < root.point_count);

    let whole = service
        .query_extent(
            root.bounds.sw.lng,
            root.bounds.sw.lat,
            root.bounds.ne.lng,
            root.bounds.ne.lat,
        )
        .unwrap();
    assert_eq!(whole.id, root.id);
}

#[test]
fn test_empty_index_has_no_root() {
    let service = QuadrantQueryService::new(
        Arc::new(QuadrantIndex::default()),
        SpatialKeyEncoder::default(),
    );
    let result = service.query_extent(0.5, 52.0, 0.6, 52.1);
    assert!(matches!(result, Err(IndexError::NoRootQuadrant)));
}

#[test]
fn test_storage_shapes_round_trip() {
    let index = build();

    let docs = DocumentMapper::default().to_records(&index);
    assert_eq!(docs.len(), index.len());
    let from_docs = DocumentMapper::default().from_records(docs);
    assert_eq!(from_docs.quadrants(), index.quadrants());

    let tables = RelationalMapper.to_records(&index);
    let from_tables = RelationalMapper.from_records(tables);
    assert_eq!(from_tables.quadrants(), index.quadrants());
}

#[test]
fn test_snapshot_file_round_trip() {
    let index = build();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");

    serde_json::to_writer(File::create(&path).unwrap(), &index).unwrap();
    let restored: QuadrantIndex = serde_json::from_reader(File::open(&path).unwrap()).unwrap();

    assert_eq!(restored.len(), index.len());
    assert_eq!(restored.level_counts(), index.level_counts());
    assert_eq!(restored.quadrants(), index.quadrants());

    // every quadrant's own box still resolves to that quadrant after reload
    for q in index.iter() {
        let found = quadrant_index::query(&q.bounds, &restored).unwrap();
        assert_eq!(found.id, q.id);
        assert_eq!(found.level, q.level);
    }
}

#[test]
fn test_documents_survive_json_text() {
    let index = build();
    let mapper = DocumentMapper::default();

    let body = serde_json::to_string(&mapper.to_records(&index)).unwrap();
    let docs = serde_json::from_str(&body).unwrap();
    let restored = mapper.from_records(docs);

    for (a, b) in index.iter().zip(restored.iter()) {
        assert_eq!(a.bounds, b.bounds, "bounds of {} changed", a.id);
    }
    let deepest = index.iter().max_by_key(|q| q.level).unwrap();
    let found = quadrant_index::query(&deepest.bounds, &restored).unwrap();
    assert_eq!(found.id, deepest.id);
}
