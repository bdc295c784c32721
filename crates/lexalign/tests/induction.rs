//! End-to-end dictionary induction: scoring through cross-matching.

use std::collections::BTreeMap;

use candle_core::{Device, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use lexalign::config::{BuildPolicy, DictionaryConfig, InductionMethod};
use lexalign::induction::{build_pairwise, cross_match, get_candidates};
use lexalign::scoring::{average_neighbor_similarity, top2_neighbors};
use lexalign::types::{Lang, PairwiseDictionary};

fn random_unit_rows(rng: &mut StdRng, n: usize, d: usize) -> Tensor {
    let mut data = Vec::with_capacity(n * d);
    for _ in 0..n {
        let row: Vec<f32> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-9);
        data.extend(row.into_iter().map(|x| x / norm));
    }
    Tensor::from_vec(data, (n, d), &Device::Cpu).unwrap()
}

fn nn_config() -> DictionaryConfig {
    DictionaryConfig::default()
        .with_method(InductionMethod::NearestNeighbor)
        .with_max_rank(0)
}

#[test]
fn candidate_selection_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(4);
    let queries = random_unit_rows(&mut rng, 20, 6);
    let refs = random_unit_rows(&mut rng, 25, 6);
    let config = nn_config();
    let first = get_candidates(&queries, &refs, &config).unwrap();
    let second = get_candidates(&queries, &refs, &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn identical_spaces_induce_identity_pairs() {
    let mut rng = StdRng::seed_from_u64(8);
    let emb = random_unit_rows(&mut rng, 12, 8);
    let pairs = get_candidates(&emb, &emb, &nn_config()).unwrap();
    for pair in &pairs {
        assert_eq!(pair[0], pair[1]);
    }
    assert_eq!(pairs.len(), 12);
}

#[test]
fn min_size_override_beats_any_threshold() {
    let mut rng = StdRng::seed_from_u64(15);
    let queries = random_unit_rows(&mut rng, 30, 5);
    let refs = random_unit_rows(&mut rng, 30, 5);
    // An absurd threshold would drop everything without the override.
    let config = nn_config().with_max_size(10).with_min_size(4).with_threshold(100.0);
    let pairs = get_candidates(&queries, &refs, &config).unwrap();
    assert_eq!(pairs.len(), 4);
}

#[test]
fn csls_score_matches_its_definition() {
    let mut rng = StdRng::seed_from_u64(21);
    let queries = random_unit_rows(&mut rng, 6, 4);
    let refs = random_unit_rows(&mut rng, 7, 4);
    let k = 3;

    let top2 = top2_neighbors(
        &queries,
        &refs,
        &InductionMethod::Csls { neighbors: k },
        None,
    )
    .unwrap();

    let avg_q = average_neighbor_similarity(&queries, &refs, k).unwrap();
    let avg_r = average_neighbor_similarity(&refs, &queries, k).unwrap();
    let dots = queries
        .matmul(&refs.t().unwrap())
        .unwrap()
        .to_vec2::<f32>()
        .unwrap();

    for (i, targets) in top2.targets.iter().enumerate() {
        let j = targets[0];
        let expected = 2.0 * dots[i][j] - avg_q[i] - avg_r[j];
        assert!(
            (top2.scores[i][0] - expected).abs() < 1e-4,
            "row {}: {} vs {}",
            i,
            top2.scores[i][0],
            expected
        );
        // A denser neighborhood around the chosen target would lower the
        // score linearly: the penalty enters with coefficient −1.
        let penalized = 2.0 * dots[i][j] - avg_q[i] - (avg_r[j] + 0.1);
        assert!(penalized < expected);
    }
}

#[test]
fn union_and_intersection_bracket_the_directional_builds() {
    let mut rng = StdRng::seed_from_u64(31);
    let src = random_unit_rows(&mut rng, 15, 6);
    let tgt = random_unit_rows(&mut rng, 15, 6);

    let union = build_pairwise(&src, &tgt, &nn_config().with_build(BuildPolicy::Union), None, None)
        .unwrap()
        .unwrap();
    let forward =
        build_pairwise(&src, &tgt, &nn_config().with_build(BuildPolicy::SourceToTarget), None, None)
            .unwrap()
            .unwrap();
    if let Some(intersection) = build_pairwise(
        &src,
        &tgt,
        &nn_config().with_build(BuildPolicy::Intersection),
        None,
        None,
    )
    .unwrap()
    {
        assert!(intersection.len() <= forward.len());
        for pair in intersection.pairs() {
            assert!(union.pairs().contains(pair));
        }
    }
    assert!(forward.len() <= union.len());
}

#[test]
fn disjoint_intersection_signals_absent_dictionary() {
    let mut rng = StdRng::seed_from_u64(2);
    let src = random_unit_rows(&mut rng, 4, 3);
    let tgt = random_unit_rows(&mut rng, 4, 3);
    let result = build_pairwise(
        &src,
        &tgt,
        &nn_config().with_build(BuildPolicy::Intersection),
        Some(vec![[0, 1], [2, 3]]),
        Some(vec![[0, 1], [2, 3]]), // reversed: becomes {(1,0),(3,2)}
    )
    .unwrap();
    assert!(result.is_none(), "disjoint sets must yield an absent dictionary");
}

#[test]
fn cross_match_with_bridge_end_to_end() {
    let de = Lang::new("de");
    let ru = Lang::new("ru");
    let lang_list = vec![de.clone(), ru.clone()];

    let mut dicts = BTreeMap::new();
    dicts.insert(
        de.clone(),
        PairwiseDictionary::new(vec![[0, 10], [1, 11], [3, 13]]),
    );
    dicts.insert(
        ru.clone(),
        PairwiseDictionary::new(vec![[0, 20], [2, 22], [3, 23]]),
    );
    let bridge = PairwiseDictionary::new(vec![[11, 21], [19, 23]]);

    let merged = cross_match(&lang_list, &dicts, Some(&bridge)).unwrap();
    let rows = merged.rows();

    // Source 0 and 3 are present everywhere: full rows.
    assert!(rows.contains(&vec![0, 10, 20]));
    assert!(rows.contains(&vec![3, 13, 23]));
    // Source 1 is missing in Russian but bridged through German 11.
    assert!(rows.contains(&vec![1, 11, 21]));
    // Source 2 exists only in the last dictionary; its target 22 has no
    // reverse bridge entry, so it stays out.
    assert!(!rows.iter().any(|r| r[0] == 2));
}
