use ecurve::*;

fn small() -> WordCodec {
    WordCodec::with_geometry(Geometry::new(2, 3).unwrap())
}

fn w(c: &WordCodec, s: &str) -> Word {
    c.encode(s.as_bytes()).unwrap()
}

fn index_of(c: &WordCodec, words: &[(&str, Family)]) -> WordIndex {
    let entries: Vec<(Word, Family)> = words.iter().map(|&(s, f)| (w(c, s), f)).collect();
    WordIndex::from_sorted(c.clone(), entries).unwrap()
}

#[test]
fn test_runs_and_exact_lookup() {
    let c = small();
    // Prefix 0 ("AA") and prefix 5 ("AQ").
    let idx = index_of(&c, &[("AAAAA", 1), ("AAAAR", 2), ("AQAAA", 3)]);
    idx.verify().unwrap();
    assert_eq!(idx.len(), 3);
    assert_eq!(idx.run(0), RunState::Occupied { offset: 0, count: 2 });
    assert_eq!(idx.run(3), RunState::Empty { fallback: 2 });
    assert_eq!(idx.run(5), RunState::Occupied { offset: 2, count: 1 });
    assert_eq!(idx.run(6), RunState::BeyondData);
    assert_eq!(idx.run(400), RunState::BeyondData);

    assert_eq!(idx.lookup_exact(w(&c, "AAAAR")), Some(2));
    assert_eq!(idx.lookup_exact(w(&c, "AQAAA")), Some(3));
    assert_eq!(idx.lookup_exact(w(&c, "AQAAR")), None);
    assert_eq!(idx.lookup_exact(w(&c, "ADAAA")), None);
}

#[test]
fn test_empty_prefix_resolves_to_preceding_run() {
    let c = small();
    let idx = index_of(&c, &[("AAAAA", 1), ("AAAAR", 2), ("AQAAA", 3)]);
    let q = w(&c, "ADAAA"); // prefix 3

    let nb = idx.neighbors(q).unwrap();
    assert_eq!(
        nb,
        Neighbors {
            lower: 1,
            upper: 2,
            exact: false
        }
    );
    assert_eq!(nb.indices().collect::<Vec<_>>(), vec![1, 2]);

    let hit = idx.lookup_nearest(q).unwrap();
    assert_eq!(hit.index, 1);
    assert_eq!(idx.family_at(hit.index), Some(2));
    assert_eq!(hit.distance, (3u128 << 64) - 1);
}

#[test]
fn test_empty_prefix_without_preceding_run() {
    let c = small();
    let idx = index_of(&c, &[("AQAAA", 3), ("AQAAR", 4)]);
    let q = w(&c, "AAAAA");
    assert_eq!(idx.run(0), RunState::Empty { fallback: 0 });
    let nb = idx.neighbors(q).unwrap();
    assert_eq!((nb.lower, nb.upper), (0, 0));
    assert_eq!(idx.lookup_nearest(q).unwrap().index, 0);
}

#[test]
fn test_beyond_data_resolves_to_last_entry() {
    let c = small();
    let idx = index_of(&c, &[("AAAAA", 1), ("AQAAA", 3), ("AQAAR", 4)]);
    let q = w(&c, "WWAAA");
    let nb = idx.neighbors(q).unwrap();
    assert_eq!((nb.lower, nb.upper), (2, 2));
    assert_eq!(idx.lookup_nearest(q).unwrap().index, 2);
}

#[test]
fn test_nearest_inside_run_prefers_closer_then_lower() {
    let c = small();
    // Suffixes 0 ("AAA"), 2 ("AAN") and 4 ("AAC").
    let idx = index_of(&c, &[("AAAAA", 1), ("AAAAN", 2), ("AAAAC", 3)]);

    // Tie between 0 and 2.
    let n = idx.lookup_nearest(w(&c, "AAAAR")).unwrap();
    assert_eq!((n.index, n.distance), (0, 1));
    // 3 ("AAD") is one away from both 2 and 4.
    let n = idx.lookup_nearest(w(&c, "AAAAD")).unwrap();
    assert_eq!((n.index, n.distance), (1, 1));
    let n = idx.lookup_nearest(w(&c, "AAAAN")).unwrap();
    assert_eq!((n.index, n.distance), (1, 0));
    assert!(idx.neighbors(w(&c, "AAAAN")).unwrap().exact);
}

#[test]
fn test_miss_at_run_end_reaches_next_run() {
    let c = small();
    let idx = index_of(&c, &[("AAAAA", 1), ("ARAAA", 2)]);
    let nb = idx.neighbors(w(&c, "AAAAR")).unwrap();
    assert_eq!((nb.lower, nb.upper), (0, 1));
    assert_eq!(idx.lookup_nearest(w(&c, "AAAAR")).unwrap().index, 0);
}

#[test]
fn test_sparse_index_answers_every_prefix() {
    let c = WordCodec::with_geometry(Geometry::new(3, 2).unwrap());
    let prefixes: Vec<u32> = (37..8000).step_by(150).collect();
    let mut entries = Vec::new();
    for (k, &p) in prefixes.iter().enumerate() {
        entries.push((Word::new(p, 0), (k % 100) as Family));
        entries.push((Word::new(p, 5), (k % 100) as Family));
    }
    let idx = WordIndex::from_sorted(c.clone(), entries.clone()).unwrap();
    idx.verify().unwrap();
    assert!(prefixes.len() * 100 < 8000);

    for q in 0..c.geometry().prefix_count() {
        let hit = idx.lookup_nearest(Word::new(q, 0)).unwrap();
        match prefixes.binary_search(&q) {
            Ok(k) => {
                assert_eq!(hit.index, 2 * k);
                assert_eq!(hit.distance, 0);
            }
            Err(0) => {
                assert_eq!(hit.index, 0);
                assert_eq!(idx.run(q), RunState::Empty { fallback: 0 });
            }
            Err(k) => {
                assert_eq!(hit.index, 2 * (k - 1) + 1, "prefix {q}");
                if k == prefixes.len() {
                    assert_eq!(idx.run(q), RunState::BeyondData);
                } else {
                    assert_eq!(idx.run(q), RunState::Empty { fallback: 2 * k });
                }
            }
        }
    }

    for (i, &(word, family)) in entries.iter().enumerate() {
        assert_eq!(idx.word_at(i), Some(word));
        assert_eq!(idx.family_at(i), Some(family));
    }
    assert_eq!(idx.word_at(entries.len()), None);
}

#[test]
fn test_from_sorted_rejects_bad_input() {
    let c = small();
    let a = w(&c, "AAAAR");
    let b = w(&c, "AAAAA");
    assert!(matches!(
        WordIndex::from_sorted(c.clone(), vec![(a, 1), (b, 1)]),
        Err(Error::Unsorted)
    ));
    assert!(matches!(
        WordIndex::from_sorted(c.clone(), vec![(a, 1), (a, 2)]),
        Err(Error::Unsorted)
    ));
    assert!(matches!(
        WordIndex::from_sorted(c.clone(), vec![(a, FAMILY_INVALID)]),
        Err(Error::InvalidFamily(FAMILY_INVALID))
    ));
    assert!(matches!(
        WordIndex::from_sorted(c.clone(), vec![(Word::new(400, 0), 1)]),
        Err(Error::InvalidWord { prefix: 400, .. })
    ));
    assert!(WordIndex::from_sorted(c, vec![(a, FAMILY_MAX)]).is_ok());
}

#[test]
fn test_empty_index() {
    let c = small();
    let idx = WordIndex::empty(c.clone());
    idx.verify().unwrap();
    assert!(idx.is_empty());
    assert!(!idx.is_mapped());
    assert_eq!(idx.prefix_table().len(), 400);
    assert_eq!(idx.run(0), RunState::BeyondData);
    let q = w(&c, "AAAAA");
    assert_eq!(idx.neighbors(q), None);
    assert_eq!(idx.lookup_nearest(q), None);
    assert_eq!(idx.lookup_exact(q), None);
    assert_eq!(idx, WordIndex::from_sorted(c, Vec::new()).unwrap());
}

#[test]
fn test_prefix_outside_table_has_no_neighbours() {
    let c = small();
    let idx = index_of(&c, &[("AAAAA", 1)]);
    assert_eq!(idx.neighbors(Word::new(400, 0)), None);
}
