use std::sync::Arc;

use waypoint_core::traits::{Embedder, PersistentIndex, VectorIndex};
use waypoint_core::types::{DistanceMetric, MetadataFilter, Record};
use waypoint_core::Error;
use waypoint_embed::FakeEmbedder;
use waypoint_vector::snapshot::{FORMAT_VERSION, MAGIC};
use waypoint_vector::{read_manifest, FlatIndex};

fn records() -> Vec<Record> {
    vec![
        Record::new("Paris was founded in the 3rd century BC").with_meta("title", "Paris: History"),
        Record::new("The Louvre is the largest art museum").with_meta("title", "Paris: Museums"),
        Record::new("Rome was founded in 753 BC").with_meta("title", "Rome: History"),
        Record::new("The Colosseum seated fifty thousand").with_meta("title", "Rome: Sights"),
    ]
}

fn fake() -> Arc<dyn Embedder> { Arc::new(FakeEmbedder::new(64)) }

#[test]
fn load_reproduces_search_results() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("chunks.wpi");
    let built = FlatIndex::build(&records(), fake(), DistanceMetric::SquaredL2)?;
    built.persist(&path)?;
    let loaded = FlatIndex::load(&path, fake())?;

    assert_eq!(loaded.len(), built.len());
    assert_eq!(loaded.metric(), DistanceMetric::SquaredL2);
    for query in ["founding of Paris", "museum", "Rome"] {
        let a = built.search(query, 3, None)?;
        let b = loaded.search(query, 3, None)?;
        assert_eq!(a, b, "query {query}");
        let filter = MetadataFilter::title("Rome: History");
        assert_eq!(built.search(query, 2, Some(&filter))?, loaded.search(query, 2, Some(&filter))?);
    }
    Ok(())
}

#[test]
fn manifest_describes_the_index() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("titles.wpi");
    FlatIndex::build(&records(), fake(), DistanceMetric::Cosine)?.persist(&path)?;
    let manifest = read_manifest(&path)?;
    assert_eq!(manifest.embedder_id, "fake:xxh64:d64");
    assert_eq!(manifest.dim, 64);
    assert_eq!(manifest.record_count, 4);
    assert_eq!(manifest.metric, DistanceMetric::Cosine);
    assert_eq!(manifest.checksum.len(), 64);
    assert_eq!(manifest.build_id, None);
    Ok(())
}

#[test]
fn missing_file_is_index_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let err = FlatIndex::load(&tmp.path().join("absent.wpi"), fake()).unwrap_err();
    assert!(matches!(err, Error::IndexNotFound { .. }), "{err}");
}

#[test]
fn garbage_file_is_index_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("garbage.wpi");
    std::fs::write(&path, b"definitely not an index").unwrap();
    assert!(matches!(FlatIndex::load(&path, fake()), Err(Error::IndexNotFound { .. })));
}

#[test]
fn huge_manifest_length_prefix_is_index_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("titles.wpi");
    let mut bytes = MAGIC.to_vec();
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    // embedder id length claiming 64 TiB
    bytes.extend_from_slice(&(1u64 << 46).to_le_bytes());
    bytes.extend_from_slice(b"abc");
    std::fs::write(&path, &bytes).unwrap();
    let err = FlatIndex::load(&path, fake()).unwrap_err();
    assert!(matches!(err, Error::IndexNotFound { .. }), "{err}");
    assert!(matches!(read_manifest(&path), Err(Error::IndexNotFound { .. })));
}

#[test]
fn build_id_is_stored_in_the_manifest() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("chunks.wpi");
    let built = FlatIndex::build(&records(), fake(), DistanceMetric::SquaredL2)?.with_build_id("corpus-1".to_string());
    built.persist(&path)?;
    assert_eq!(read_manifest(&path)?.build_id.as_deref(), Some("corpus-1"));
    assert_eq!(FlatIndex::load(&path, fake())?.build_id(), Some("corpus-1"));
    Ok(())
}

#[test]
fn flipped_payload_byte_fails_checksum() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("chunks.wpi");
    FlatIndex::build(&records(), fake(), DistanceMetric::SquaredL2).unwrap().persist(&path).unwrap();
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();
    let err = FlatIndex::load(&path, fake()).unwrap_err();
    assert!(matches!(err, Error::IndexNotFound { .. }), "{err}");
}

#[test]
fn truncated_file_is_index_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("chunks.wpi");
    FlatIndex::build(&records(), fake(), DistanceMetric::SquaredL2).unwrap().persist(&path).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
    assert!(matches!(FlatIndex::load(&path, fake()), Err(Error::IndexNotFound { .. })));
}

#[test]
fn dimension_mismatch_is_incompatible() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("chunks.wpi");
    FlatIndex::build(&records(), fake(), DistanceMetric::SquaredL2).unwrap().persist(&path).unwrap();
    let other: Arc<dyn Embedder> = Arc::new(FakeEmbedder::new(32));
    assert!(matches!(FlatIndex::load(&path, other), Err(Error::IncompatibleIndex { .. })));
}
