use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use proptest::prelude::*;
use waypoint_core::config::RetrievalConfig;
use waypoint_core::traits::{Embedder, VectorIndex};
use waypoint_core::Corpus;
use waypoint_embed::FakeEmbedder;
use waypoint_hier::HierarchicalRetriever;

fn sections() -> impl Strategy<Value = BTreeMap<String, Vec<String>>> {
    prop::collection::btree_map(
        "[a-z]{3,8}( [a-z]{3,8})?",
        prop::collection::vec("[a-z]{2,8}( [a-z]{2,8}){0,5}", 1..4),
        1..6,
    )
}

fn config() -> impl Strategy<Value = RetrievalConfig> {
    (1usize..6, 1usize..4, 1usize..8, 0.0f32..4.5).prop_map(|(title_top_n, chunks_per_title, total_chunks, max_distance)| RetrievalConfig {
        title_top_n,
        chunks_per_title,
        total_chunks,
        max_distance,
        parallel: false,
    })
}

fn fake() -> Arc<dyn Embedder> { Arc::new(FakeEmbedder::new(32)) }

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn results_respect_every_bound(raw in sections(), cfg in config(), query in "[a-z]{2,8}( [a-z]{2,8}){0,3}") {
        let corpus = Corpus::new(raw, 2000).unwrap();
        let r = HierarchicalRetriever::<waypoint_vector::FlatIndex>::build(corpus.clone(), cfg.clone(), fake()).unwrap();
        let out = r.retrieve_scored(&query).unwrap();

        prop_assert!(out.len() <= cfg.total_chunks);
        prop_assert!(out.windows(2).all(|w| w[0].distance <= w[1].distance));
        prop_assert!(out.iter().all(|c| c.distance <= cfg.max_distance));

        let top_titles: Vec<String> = r.title_index().search(&query, cfg.title_top_n, None).unwrap().into_iter().map(|h| h.text).collect();
        let mut per_title: HashMap<&str, usize> = HashMap::new();
        for c in &out {
            prop_assert!(top_titles.contains(&c.title), "{} not among retrieved titles", c.title);
            let owned = corpus.chunks(&c.title).unwrap_or(&[]);
            prop_assert!(owned.contains(&c.text), "{:?} does not belong to {}", c.text, c.title);
            *per_title.entry(c.title.as_str()).or_default() += 1;
        }
        prop_assert!(per_title.values().all(|&n| n <= cfg.chunks_per_title));
    }

    #[test]
    fn threshold_applies_after_truncation(raw in sections(), cfg in config(), query in "[a-z]{2,8}( [a-z]{2,8}){0,3}") {
        let corpus = Corpus::new(raw, 2000).unwrap();
        let unfiltered_cfg = RetrievalConfig { max_distance: f32::MAX, ..cfg.clone() };
        let unfiltered = HierarchicalRetriever::<waypoint_vector::FlatIndex>::build(corpus.clone(), unfiltered_cfg, fake()).unwrap();
        let filtered = HierarchicalRetriever::<waypoint_vector::FlatIndex>::build(corpus, cfg.clone(), fake()).unwrap();

        let expected: Vec<_> = unfiltered.retrieve_scored(&query).unwrap().into_iter().filter(|c| c.distance <= cfg.max_distance).collect();
        prop_assert_eq!(filtered.retrieve_scored(&query).unwrap(), expected);
    }

    #[test]
    fn retrieval_is_deterministic_and_order_independent_of_parallelism(raw in sections(), cfg in config(), query in "[a-z]{2,8}") {
        let corpus = Corpus::new(raw, 2000).unwrap();
        let seq = HierarchicalRetriever::<waypoint_vector::FlatIndex>::build(corpus.clone(), cfg.clone(), fake()).unwrap();
        let par = HierarchicalRetriever::<waypoint_vector::FlatIndex>::build(corpus, RetrievalConfig { parallel: true, ..cfg }, fake()).unwrap();
        let first = seq.retrieve(&query).unwrap();
        prop_assert_eq!(&first, &seq.retrieve(&query).unwrap());
        prop_assert_eq!(first, par.retrieve(&query).unwrap());
    }
}
