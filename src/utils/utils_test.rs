use crate::convert::decode_index;
use crate::convert::encode_index;
use crate::convert::try_decode_index;
use crate::ConvertError;
use crate::Error;
use crate::StorageError;

#[test]
fn test_index_round_trip() {
    for i in [0, 1, 25, 255, 256, 1 << 32, u64::MAX - 1, u64::MAX] {
        assert_eq!(i, decode_index(&encode_index(i)));
    }
}

#[test]
fn test_encoded_order_matches_numeric_order() {
    let samples = [0u64, 1, 2, 255, 256, 257, 65_535, 65_536, 1 << 40, u64::MAX];
    for a in samples {
        for b in samples {
            assert_eq!(
                a.cmp(&b),
                encode_index(a).cmp(&encode_index(b)),
                "order mismatch for {a} vs {b}"
            );
        }
    }
}

#[test]
fn test_decode_index_reads_first_eight_bytes() {
    let mut key = encode_index(42).to_vec();
    key.extend_from_slice(b"suffix");
    assert_eq!(42, decode_index(&key));
}

#[test]
#[should_panic(expected = "at least 8 bytes")]
fn test_decode_index_panics_on_short_key() {
    decode_index(&[0, 1, 2]);
}

#[test]
fn test_try_decode_index_rejects_wrong_length() {
    assert_eq!(7, try_decode_index(encode_index(7)).unwrap());

    match try_decode_index([1u8, 2, 3]) {
        Err(Error::Storage(StorageError::Convert(ConvertError::InvalidLength(3)))) => {}
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(try_decode_index([0u8; 9]).is_err());
}
