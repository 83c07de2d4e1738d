use ecurve::*;

fn codec() -> WordCodec {
    WordCodec::with_geometry(Geometry::new(2, 3).unwrap())
}

#[test]
fn test_ambiguous_words_are_dropped_by_default() {
    let c = codec();
    let records: [(Family, &str); 3] = [(1, "ARNDCQ"), (2, "NDCQE"), (1, "ARNDC")];
    let idx = build_index(c.clone(), &records, &BuildConfig::default()).unwrap();
    // "ARNDC" (family 1 twice) and "RNDCQ" stay, "NDCQE" is family 2 only.
    let ndcqe = c.encode(b"NDCQE").unwrap();
    assert_eq!(idx.lookup_exact(c.encode(b"ARNDC").unwrap()), Some(1));
    assert_eq!(idx.lookup_exact(c.encode(b"RNDCQ").unwrap()), Some(1));
    assert_eq!(idx.lookup_exact(ndcqe), Some(2));
    assert_eq!(idx.len(), 3);

    let clash: [(Family, &str); 3] = [(1, "ARNDC"), (2, "ARNDC"), (3, "WWWWW")];
    let idx = build_index(c.clone(), &clash, &BuildConfig::default()).unwrap();
    assert_eq!(idx.len(), 1);
    assert_eq!(idx.lookup_exact(c.encode(b"ARNDC").unwrap()), None);

    let kept = build_index(c.clone(), &clash, &BuildConfig::default().keep_ambiguous(true)).unwrap();
    assert_eq!(kept.len(), 2);
    assert_eq!(kept.lookup_exact(c.encode(b"ARNDC").unwrap()), Some(1));
}

#[test]
fn test_incremental_builder_counts() {
    let c = codec();
    let mut b = IndexBuilder::new(c.clone(), &BuildConfig::default());
    assert!(b.is_empty());
    assert_eq!(b.add_sequence(b"ARNDCQ", 7).unwrap(), 2);
    assert_eq!(b.add_sequence(b"ARN", 7).unwrap(), 0);
    b.insert(c.encode(b"ARNDC").unwrap(), 7).unwrap();
    b.insert(c.encode(b"ARNDC").unwrap(), 8).unwrap();
    b.insert(c.encode(b"ARNDC").unwrap(), 9).unwrap();
    assert_eq!(b.len(), 2);
    assert_eq!(b.ambiguous(), 1);
    assert!(matches!(
        b.insert(Word::new(400, 0), 1),
        Err(Error::InvalidWord { .. })
    ));
    assert!(matches!(
        b.insert(Word::new(0, 0), FAMILY_INVALID),
        Err(Error::InvalidFamily(_))
    ));

    let idx = b.finish().unwrap();
    assert_eq!(idx.len(), 1);
    idx.verify().unwrap();
}

#[test]
fn test_min_seq_len_skips_short_records() {
    let c = codec();
    let records: [(Family, &str); 2] = [(1, "ARNDC"), (2, "WWWWWWWW")];
    let idx = build_index(c, &records, &BuildConfig::default().min_seq_len(6)).unwrap();
    assert_eq!(idx.len(), 1);
    assert_eq!(idx.family_at(0), Some(2));
}

#[test]
fn test_parallel_build_matches_sequential_insertion() {
    let c = codec();
    let alphabet = c.alphabet().as_bytes().to_vec();
    // Deterministic pseudo-random sequences.
    let mut state = 0x2545_f491_u64;
    let mut records = Vec::new();
    for i in 0..300u16 {
        let seq: Vec<u8> = (0..40)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                alphabet[(state >> 33) as usize % alphabet.len()]
            })
            .collect();
        records.push((i % 17, seq));
    }

    let cfg = BuildConfig::default().threads(2);
    let parallel = build_index(c.clone(), &records, &cfg).unwrap();

    let mut b = IndexBuilder::new(c, &cfg);
    for (family, seq) in &records {
        b.add_sequence(seq, *family).unwrap();
    }
    assert_eq!(parallel, b.finish().unwrap());
}
