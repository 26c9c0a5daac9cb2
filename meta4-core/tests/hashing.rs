mod common;

use common::{body, sha256_hex, LocalDir};
use meta4_core::hash::{compute_hashes, hash_stream, piece_count, PiecePolicy, SHA256};
use meta4_core::{Error, FileEntry};
use proptest::prelude::*;
use std::path::Path;

#[test]
fn whole_file_hash_matches_sha256() {
    let data = body(10_000, 1);
    let out = compute_hashes(&data[..], data.len() as u64, PiecePolicy::None).unwrap();
    assert_eq!(out.whole.value(), sha256_hex(&data));
    assert_eq!(out.whole.algorithm(), SHA256);
    assert_eq!(out.whole.piece_index(), None);
    assert!(out.pieces.is_empty());
    assert_eq!(out.piece_size, None);
    assert_eq!(out.size, 10_000);
}

#[test]
fn piece_size_is_floored_to_one_kib() {
    let data = body(3000, 2);
    let out = compute_hashes(&data[..], 3000, PiecePolicy::BySize(100)).unwrap();
    assert_eq!(out.piece_size, Some(1024));
    assert_eq!(out.pieces.len(), 3);
}

#[test]
fn piece_count_rounds_size_up_to_kib_multiple() {
    assert_eq!(PiecePolicy::ByCount(3).piece_size(2500), Some(1024));
    assert_eq!(PiecePolicy::ByCount(4).piece_size(10_000), Some(3072));
    assert_eq!(piece_count(10_000, 3072), 4);
    assert_eq!(PiecePolicy::ByCount(10).piece_size(100), Some(1024));
    assert_eq!(PiecePolicy::ByCount(1).piece_size(0), Some(1024));
    assert_eq!(PiecePolicy::None.piece_size(10_000), None);

    // requested 4, produced 3: accepted as is
    let ps = PiecePolicy::ByCount(4).piece_size(5000).unwrap();
    assert_eq!(ps, 2048);
    assert_eq!(piece_count(5000, ps), 3);
}

proptest! {
    #[test]
    fn by_count_piece_size_is_kib_multiple(size in 0u64..(1u64 << 40), n in 1u32..100_000) {
        let ps = PiecePolicy::ByCount(n).piece_size(size).unwrap();
        prop_assert!(ps >= 1024);
        prop_assert_eq!(ps % 1024, 0);
    }

    #[test]
    fn pieces_partition_the_source(len in 0usize..6000, ps in 1u64..2500) {
        let data = body(len, len as u64);
        let out = hash_stream(&data[..], Some(ps)).unwrap();
        let n = piece_count(len as u64, ps);
        prop_assert_eq!(out.pieces.len() as u64, n);

        let chunks: Vec<&[u8]> = data.chunks(ps as usize).collect();
        prop_assert_eq!(chunks.len() as u64, n);
        if n > 0 {
            let last = chunks[chunks.len() - 1].len() as u64;
            prop_assert_eq!(last, len as u64 - ps * (n - 1));
        }
        prop_assert_eq!(chunks.concat(), data.clone());
        for (i, (piece, chunk)) in out.pieces.iter().zip(&chunks).enumerate() {
            prop_assert_eq!(piece.piece_index(), Some(i as u64));
            prop_assert_eq!(piece.value(), sha256_hex(chunk));
        }
        prop_assert_eq!(out.whole.value(), sha256_hex(&data));
    }
}

#[test]
fn empty_source_has_no_pieces() {
    let out = compute_hashes(&[][..], 0, PiecePolicy::BySize(1024)).unwrap();
    assert!(out.pieces.is_empty());
    assert_eq!(out.whole.value(), sha256_hex(b""));
}

#[test]
fn policy_configuration_errors() {
    assert!(matches!(
        PiecePolicy::from_options(Some(1024), Some(4)),
        Err(Error::InvalidConfiguration(_))
    ));
    assert!(matches!(PiecePolicy::from_options(None, Some(0)), Err(Error::InvalidConfiguration(_))));
    assert!(matches!(PiecePolicy::parse(Some("1k"), None), Err(Error::InvalidConfiguration(_))));
    assert!(matches!(PiecePolicy::parse(None, Some("2.5")), Err(Error::InvalidConfiguration(_))));
    assert!(matches!(
        PiecePolicy::parse(Some("1024"), Some("4")),
        Err(Error::InvalidConfiguration(_))
    ));
    assert_eq!(PiecePolicy::parse(Some(" 4096 "), None).unwrap(), PiecePolicy::BySize(4096));
    assert_eq!(PiecePolicy::parse(None, Some("8")).unwrap(), PiecePolicy::ByCount(8));
    assert_eq!(PiecePolicy::parse(None, None).unwrap(), PiecePolicy::None);
}

#[test]
fn checksum_replaces_hashes_and_sets_size() {
    let dir = LocalDir::new();
    let data = body(2500, 3);
    let rel = dir.write("app.zip", &data);

    let mut entry = FileEntry::new(&rel).unwrap();
    entry.checksum(None, Some(PiecePolicy::BySize(1024))).unwrap();
    assert_eq!(entry.size, Some(2500));
    assert_eq!(entry.piece_size(), Some(1024));
    assert_eq!(entry.hashes.len(), 4);
    assert_eq!(entry.hashes[0].piece_index(), None);
    assert_eq!(entry.hashes[0].value(), sha256_hex(&data));
    let lens: Vec<usize> = data.chunks(1024).map(<[u8]>::len).collect();
    assert_eq!(lens, vec![1024, 1024, 452]);
    for (i, h) in entry.hashes[1..].iter().enumerate() {
        assert_eq!(h.piece_index(), Some(i as u64));
        assert_eq!(h.value(), sha256_hex(&data[i * 1024..((i + 1) * 1024).min(2500)]));
    }

    entry.checksum(None, Some(PiecePolicy::None)).unwrap();
    assert_eq!(entry.hashes.len(), 1);
    assert_eq!(entry.piece_size(), None);
}

#[test]
fn checksum_by_count_derives_piece_size() {
    let dir = LocalDir::new();
    let rel = dir.write("image.iso", &body(10_000, 4));
    let mut entry = FileEntry::new(&rel).unwrap();
    entry.set_piece_count(4).unwrap();
    entry.checksum(None, None).unwrap();
    assert_eq!(entry.piece_size(), Some(3072));
    assert_eq!(entry.piece_hashes().len(), 4);
    entry.check_pieces().unwrap();
}

#[test]
fn checksum_from_override_path() {
    let dir = LocalDir::new();
    dir.write("staging.zip", &body(1500, 5));
    let mut entry = FileEntry::new("release/app.zip").unwrap();
    entry.checksum(Some(&dir.abs("staging.zip")), None).unwrap();
    assert_eq!(entry.size, Some(1500));
    assert_eq!(entry.hashes.len(), 1);
}

#[test]
fn checksum_errors() {
    let mut entry = FileEntry::new("definitely-missing.zip").unwrap();
    assert!(matches!(entry.checksum(None, None), Err(Error::NotFound(_))));

    let err = entry.checksum(Some(Path::new("elsewhere/app.tar")), None).unwrap_err();
    match err {
        Error::MismatchedPath { expected, actual } => {
            assert_eq!(expected, "zip");
            assert_eq!(actual, "tar");
        }
        other => panic!("unexpected error: {other}"),
    }

    let mut unnamed = FileEntry::default();
    assert!(matches!(unnamed.checksum(None, None), Err(Error::MissingLocalPath)));
}

#[test]
fn piece_settings_are_exclusive() {
    let mut entry = FileEntry::new("app.zip").unwrap();
    entry.set_piece_size(512);
    assert_eq!(entry.piece_policy(), PiecePolicy::BySize(512));
    assert_eq!(entry.piece_size(), Some(1024));

    entry.set_piece_count(2).unwrap();
    assert_eq!(entry.piece_policy(), PiecePolicy::ByCount(2));
    assert_eq!(entry.piece_size(), None);
    assert!(entry.set_piece_count(0).is_err());

    entry.set_piece_size(4096);
    assert_eq!(entry.piece_policy(), PiecePolicy::BySize(4096));
    entry.clear_pieces();
    assert_eq!(entry.piece_policy(), PiecePolicy::None);
}

#[test]
fn piece_larger_than_source_is_one_piece() {
    let data = body(3000, 9);
    let out = hash_stream(&data[..], Some(5 << 30)).unwrap();
    assert_eq!(out.pieces.len(), 1);
    assert_eq!(out.pieces[0].value(), out.whole.value());
}

struct FailingReader;

impl std::io::Read for FailingReader {
    fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"))
    }
}

#[test]
fn failed_checksum_leaves_entry_untouched() {
    let mut entry = FileEntry::new("app.zip").unwrap();
    let data = body(2500, 4);
    entry.checksum_reader(&data[..], data.len() as u64, None).unwrap();
    let before = entry.clone();

    let err = entry.checksum_reader(FailingReader, 4096, Some(PiecePolicy::BySize(1024)));
    assert!(matches!(err, Err(Error::Io(_))));
    assert_eq!(entry, before);
    assert_eq!(entry.piece_policy(), PiecePolicy::None);
}

#[test]
fn checksum_reader_applies_policy_on_success() {
    let mut entry = FileEntry::new("app.zip").unwrap();
    let data = body(2500, 4);
    entry.checksum_reader(&data[..], 2500, Some(PiecePolicy::BySize(1024))).unwrap();
    assert_eq!(entry.piece_policy(), PiecePolicy::BySize(1024));
    assert_eq!(entry.piece_size(), Some(1024));
    assert_eq!(entry.size, Some(2500));
    assert_eq!(entry.piece_hashes().len(), 3);
    assert_eq!(entry.whole_file_hashes().next().unwrap().value(), sha256_hex(&data));
}
