use ecurve::encode::*;
use ecurve::Error;

fn codec(p: usize, s: usize) -> WordCodec {
    WordCodec::with_geometry(Geometry::new(p, s).unwrap())
}

#[test]
fn test_standard_word_round_trip() {
    let c = WordCodec::default();
    assert_eq!(c.geometry(), Geometry::STANDARD);
    let seq = b"ARNDCQEGHILKMFPSTW";
    let word = c.encode(seq).unwrap();
    assert_eq!(c.decode(word).unwrap(), seq.to_vec());
}

#[test]
fn test_prefix_is_base20_and_suffix_is_5bit_packed() {
    let c = WordCodec::default();
    assert_eq!(c.encode(b"AAAAAAAAAAAAAAAAAA").unwrap(), Word::new(0, 0));
    // R is amino acid 1, N is 2.
    let w = c.encode(b"AAAARNAAAAAAAAAANR").unwrap();
    assert_eq!(w.prefix, 20 + 2);
    assert_eq!(w.suffix, (2 << 5) | 1);
    assert_eq!(w.suffix_amino(10, c.geometry()), 2);
    assert_eq!(w.suffix_amino(11, c.geometry()), 1);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "out of range")]
fn test_suffix_amino_past_suffix_length_panics_in_debug() {
    let c = codec(2, 3);
    let w = c.encode(b"ARNDC").unwrap();
    assert_eq!(w.suffix_amino(2, c.geometry()), 4);
    w.suffix_amino(3, c.geometry());
}

#[test]
fn test_lowercase_input_encodes_like_uppercase() {
    let c = codec(2, 3);
    assert_eq!(c.encode(b"arndc").unwrap(), c.encode(b"ARNDC").unwrap());
}

#[test]
fn test_encode_rejects_foreign_symbols_and_lengths() {
    let c = WordCodec::default();
    match c.encode(b"AAAAAXAAAAAAAAAAAA") {
        Err(Error::InvalidSymbol { symbol, position }) => {
            assert_eq!(symbol, 'X');
            assert_eq!(position, 5);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        c.encode(b"AAAA"),
        Err(Error::WordLength {
            expected: 18,
            got: 4
        })
    ));
    assert!(matches!(
        c.encode_suffix(b"AAAAAAAAAAAB"),
        Err(Error::InvalidSymbol { position: 11, .. })
    ));
}

#[test]
fn test_decode_rejects_out_of_range_words() {
    let c = codec(2, 3);
    assert!(matches!(
        c.decode(Word::new(400, 0)),
        Err(Error::InvalidWord { prefix: 400, .. })
    ));
    // Field value 31 is not an amino acid.
    assert!(c.decode(Word::new(0, 31)).is_err());
    // Bits above 5 * S.
    assert!(c.decode(Word::new(0, 1 << 15)).is_err());
    assert!(c.check(Word::new(399, (19 << 10) | (19 << 5) | 19)).is_ok());
}

#[test]
fn test_alphabet_validation() {
    let a = Alphabet::new("arndcqeghilkmfpstwyv").unwrap();
    assert_eq!(a.as_str(), DEFAULT_ALPHABET);
    assert_eq!(a.to_amino(b'v'), Some(19));
    assert_eq!(a.to_symbol(0), Some(b'A'));
    assert_eq!(a.to_symbol(20), None);
    assert!(matches!(Alphabet::new("ARND"), Err(Error::Alphabet(_))));
    assert!(matches!(
        Alphabet::new("AANDCQEGHILKMFPSTWYV"),
        Err(Error::Alphabet(_))
    ));
    assert!(matches!(
        Alphabet::new("ARNDCQEGHILKMFPSTWY1"),
        Err(Error::Alphabet(_))
    ));
}

#[test]
fn test_custom_alphabet_changes_codes() {
    let a = Alphabet::new("VYWTSPFMKLIHGEQCDNRA").unwrap();
    let c = WordCodec::new(a, Geometry::new(1, 1).unwrap());
    assert_eq!(c.encode(b"VA").unwrap(), Word::new(0, 19));
    assert_eq!(c.decode(Word::new(19, 0)).unwrap(), b"AV".to_vec());
}

#[test]
fn test_geometry_bounds() {
    assert!(Geometry::new(0, 2).is_err());
    assert!(Geometry::new(8, 2).is_err());
    assert!(Geometry::new(1, 0).is_err());
    assert!(Geometry::new(1, 13).is_err());
    let g = Geometry::new(7, 12).unwrap();
    assert_eq!(g.prefix_count(), 1_280_000_000);
    assert_eq!(g.word_len(), 19);
    assert_eq!(Geometry::STANDARD.prefix_count(), 64_000_000);
}

#[test]
fn test_words_yield_forward_and_reverse() {
    let c = codec(1, 2);
    let got: Vec<_> = c.words(b"ARND").collect();
    assert_eq!(
        got,
        vec![
            (0, c.encode(b"ARN").unwrap(), c.encode(b"NRA").unwrap()),
            (1, c.encode(b"RND").unwrap(), c.encode(b"DNR").unwrap()),
        ]
    );
}

#[test]
fn test_words_reset_on_foreign_symbol() {
    let c = codec(1, 2);
    let got: Vec<_> = c.words(b"ARXNDC").collect();
    assert_eq!(
        got,
        vec![(3, c.encode(b"NDC").unwrap(), c.encode(b"CDN").unwrap())]
    );
    assert_eq!(c.words(b"AR").count(), 0);
}
