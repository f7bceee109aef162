/// Integration tests: drive the orchestrator end to end with the zlib codec
/// against real files and both storage backends.
use std::path::{Path, PathBuf};

use binz_codecs::ZlibCodec;
use binz_core::format::MAX_DEFLATE_RATIO;
use binz_core::{
    CodecFault, CompressOutcome, Container, ContainerError, ContainerHeader, ContainerOptions,
    MemoryVfs, MountedVfs, PayloadKind, HEADER_SIZE, MAGIC,
};
use proptest::prelude::*;
use tempfile::{tempdir, TempDir};

/// Generate `len` deterministic bytes using a simple LCG.
fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

/// Generate `len` highly compressible bytes (repeating pattern).
fn compressible_bytes(len: usize) -> Vec<u8> {
    let pattern = b"geo layout: node, node, display list, end. ";
    (0..len).map(|i| pattern[i % pattern.len()]).collect()
}

// ── helpers ───────────────────────────────────────────────────────────────

fn container() -> Container {
    Container::new(Box::new(ZlibCodec::default()))
}

fn write_asset(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, data).unwrap();
    path
}

fn wrapped_bytes(declared: u64, compressed: &[u8]) -> Vec<u8> {
    let mut out = ContainerHeader::new(declared).to_bytes().to_vec();
    out.extend_from_slice(compressed);
    out
}

fn zlib(raw: &[u8]) -> Vec<u8> {
    use binz_core::Codec;
    ZlibCodec::default().compress(raw).unwrap()
}

fn read(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}

// ── conventional backend ──────────────────────────────────────────────────

#[test]
fn test_roundtrip_repeated_bytes() {
    let dir = tempdir().unwrap();
    let data = vec![0xABu8; 100_000];
    let path = write_asset(&dir, "actor.bin", &data);

    let c = container();
    let outcome = c.compress(&path).unwrap();
    assert!(outcome.was_written());

    let on_disk = read(&path);
    assert!(on_disk.len() < 100_016, "wrapped file is {} bytes", on_disk.len());
    assert_eq!(&on_disk[..8], MAGIC);
    assert_eq!(u64::from_le_bytes(on_disk[8..16].try_into().unwrap()), 100_000);
    assert_eq!(outcome.stored_len(), on_disk.len() as u64);
    assert!(c.is_compressed(&path));

    let payload = c.decompress(&path).unwrap();
    assert_eq!(payload.kind, PayloadKind::Unwrapped);
    assert_eq!(payload.into_bytes(), data);
}

#[test]
fn test_incompressible_file_is_left_untouched() {
    let dir = tempdir().unwrap();
    let data = pseudo_random_bytes(16, 0xDEAD_BEEF);
    let path = write_asset(&dir, "noise.bin", &data);

    let outcome = container().compress(&path).unwrap();
    match outcome {
        CompressOutcome::Skipped {
            uncompressed_len,
            compressed_len,
        } => {
            assert_eq!(uncompressed_len, 16);
            assert!(compressed_len >= 16);
        }
        other => panic!("expected skip, got {other:?}"),
    }
    assert_eq!(read(&path), data, "skipped file must be byte-identical");
    assert!(!container().is_compressed(&path));
}

#[test]
fn test_empty_file_fails_and_stays_empty() {
    let dir = tempdir().unwrap();
    let path = write_asset(&dir, "empty.bin", b"");

    let err = container().compress(&path).unwrap_err();
    assert!(matches!(err, ContainerError::EmptyFile { len: 0, .. }), "{err}");
    assert!(read(&path).is_empty());
}

#[test]
fn test_missing_file_cannot_open() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing.bin");
    let c = container();

    assert!(matches!(c.compress(&path), Err(ContainerError::CannotOpen { .. })));
    assert!(matches!(c.decompress(&path), Err(ContainerError::CannotOpen { .. })));
    assert!(!c.is_compressed(&path));
}

#[test]
fn test_raw_file_passes_through() {
    let dir = tempdir().unwrap();
    let data = compressible_bytes(5000);
    let path = write_asset(&dir, "raw.bin", &data);

    let payload = container().decompress(&path).unwrap();
    assert_eq!(payload.kind, PayloadKind::Raw);
    assert_eq!(payload.reader.as_slice(), data.as_slice());
}

#[test]
fn test_files_shorter_than_magic_are_short_reads() {
    let dir = tempdir().unwrap();
    let c = container();
    for data in [&b""[..], &b"hello"[..], &b"BINZPAC"[..]] {
        let path = write_asset(&dir, "tiny.bin", data);
        match c.decompress(&path) {
            Err(ContainerError::ShortRead { expected, actual, .. }) => {
                assert_eq!((expected, actual), (8, data.len() as u64));
            }
            other => panic!("expected ShortRead for {} bytes, got {other:?}", data.len()),
        }
        assert!(!c.is_compressed(&path));
        assert_eq!(read(&path), data);
    }
}

#[test]
fn test_short_input_fails_on_both_backends() {
    let dir = tempdir().unwrap();
    write_asset(&dir, "s.bin", b"hello");
    let c = container().with_vfs(Box::new(MountedVfs::new(dir.path())));

    assert!(matches!(
        c.decompress(dir.path().join("s.bin")),
        Err(ContainerError::ShortRead { .. })
    ));
    assert!(matches!(
        c.decompress("modfs://s.bin"),
        Err(ContainerError::EmptyFile { len: 5, .. })
    ));
}

#[test]
fn test_tiny_file_that_would_grow_is_skipped() {
    let dir = tempdir().unwrap();
    let path = write_asset(&dir, "one.bin", b"x");
    let outcome = container().compress(&path).unwrap();
    assert!(!outcome.was_written());
    assert_eq!(read(&path), b"x");
}

#[test]
fn test_probe_is_idempotent_and_read_only() {
    let dir = tempdir().unwrap();
    let path = write_asset(&dir, "level.bin", &compressible_bytes(10_000));
    let c = container();
    c.compress(&path).unwrap();
    let before = read(&path);

    let first = c.is_compressed(&path);
    let second = c.is_compressed(&path);
    assert!(first);
    assert_eq!(first, second);
    assert_eq!(read(&path), before);
}

#[test]
fn test_degenerate_empty_payload_header() {
    let dir = tempdir().unwrap();
    let path = write_asset(&dir, "zero.bin", &ContainerHeader::new(0).to_bytes());
    assert_eq!(read(&path).len(), HEADER_SIZE);

    let c = container();
    assert!(c.is_compressed(&path));
    let payload = c.decompress(&path).unwrap();
    assert_eq!(payload.kind, PayloadKind::Unwrapped);
    assert!(payload.reader.is_empty());
}

#[test]
fn test_truncated_header_is_empty_file() {
    let dir = tempdir().unwrap();
    let mut bytes = MAGIC.to_vec();
    bytes.extend_from_slice(&[1, 2, 3]);
    let path = write_asset(&dir, "short.bin", &bytes);

    let err = container().decompress(&path).unwrap_err();
    assert!(matches!(err, ContainerError::EmptyFile { len: 11, .. }), "{err}");
}

#[test]
fn test_wrong_declared_size_is_codec_failure() {
    let dir = tempdir().unwrap();
    let raw = compressible_bytes(4096);
    let packed = zlib(&raw);
    let c = container();

    for declared in [raw.len() as u64 - 1, raw.len() as u64 + 1] {
        let path = write_asset(&dir, "lying.bin", &wrapped_bytes(declared, &packed));
        match c.decompress(&path) {
            Err(ContainerError::CodecFailure { diag, source, .. }) => {
                assert_eq!(diag.uncompressed_len, declared);
                assert_eq!(diag.compressed_len, packed.len() as u64);
                assert_eq!(diag.header_len, 16);
                assert_eq!(diag.rc, source.rc);
                assert_ne!(diag.rc, 0);
            }
            other => panic!("expected CodecFailure for declared {declared}, got {other:?}"),
        }
    }
}

#[test]
fn test_implausible_declared_size_fails_before_allocating() {
    let dir = tempdir().unwrap();
    let packed = zlib(b"tiny");
    let declared = packed.len() as u64 * MAX_DEFLATE_RATIO + 1;
    let path = write_asset(&dir, "huge.bin", &wrapped_bytes(declared, &packed));

    match container().decompress(&path) {
        Err(ContainerError::CodecFailure { source, .. }) => {
            assert_eq!(source.fault, CodecFault::CorruptData);
        }
        other => panic!("expected CodecFailure, got {other:?}"),
    }
}

#[test]
fn test_corrupt_stream_is_codec_failure() {
    let dir = tempdir().unwrap();
    let path = write_asset(&dir, "garbage.bin", &wrapped_bytes(64, b"not a zlib stream at all"));
    assert!(matches!(
        container().decompress(&path),
        Err(ContainerError::CodecFailure { .. })
    ));
}

#[test]
fn test_inspect_reports_header_and_size() {
    let dir = tempdir().unwrap();
    let data = compressible_bytes(8192);
    let path = write_asset(&dir, "inspect.bin", &data);
    let c = container();

    let raw = c.inspect(&path).unwrap();
    assert_eq!(raw.header, None);
    assert_eq!(raw.stored_len, 8192);

    let outcome = c.compress(&path).unwrap();
    let wrapped = c.inspect(&path).unwrap();
    assert_eq!(wrapped.header, Some(ContainerHeader::new(8192)));
    assert_eq!(wrapped.stored_len, outcome.stored_len());
}

// ── virtual backend ───────────────────────────────────────────────────────

#[test]
fn test_virtual_wrapped_resource_roundtrip() {
    let raw = compressible_bytes(30_000);
    let mut vfs = MemoryVfs::new();
    vfs.insert("mod/actors/goomba.bin", wrapped_bytes(raw.len() as u64, &zlib(&raw)));
    let c = container().with_vfs(Box::new(vfs));

    let payload = c.decompress("modfs://mod/actors/goomba.bin").unwrap();
    assert_eq!(payload.kind, PayloadKind::Unwrapped);
    assert_eq!(payload.into_bytes(), raw);
}

#[test]
fn test_virtual_raw_resource_passes_through() {
    let raw = pseudo_random_bytes(64, 7);
    let mut vfs = MemoryVfs::new();
    vfs.insert("raw.bin", raw.clone());
    let c = container().with_vfs(Box::new(vfs));

    let payload = c.decompress("modfs://raw.bin").unwrap();
    assert_eq!(payload.kind, PayloadKind::Raw);
    assert_eq!(payload.into_bytes(), raw);
}

#[test]
fn test_virtual_short_resource_is_empty_file() {
    let mut vfs = MemoryVfs::new();
    vfs.insert("short.bin", b"BINZPACK".to_vec());
    vfs.insert("short_raw.bin", b"hello".to_vec());
    let c = container().with_vfs(Box::new(vfs));

    for uri in ["modfs://short.bin", "modfs://short_raw.bin"] {
        assert!(
            matches!(c.decompress(uri), Err(ContainerError::EmptyFile { .. })),
            "{uri}"
        );
    }
}

#[test]
fn test_virtual_resource_over_limit_is_size_overflow() {
    let mut vfs = MemoryVfs::new();
    vfs.insert("big.bin", vec![0u8; 1024]);
    let c = container()
        .with_vfs(Box::new(vfs))
        .with_options(ContainerOptions::default().max_resource_len(1023));

    match c.decompress("modfs://big.bin") {
        Err(ContainerError::SizeOverflow { len, limit, .. }) => assert_eq!((len, limit), (1024, 1023)),
        other => panic!("expected SizeOverflow, got {other:?}"),
    }
}

#[test]
fn test_virtual_wrong_size_reports_header_lengths() {
    let raw = compressible_bytes(2048);
    let packed = zlib(&raw);
    let mut vfs = MemoryVfs::new();
    vfs.insert("bad.bin", wrapped_bytes(100, &packed));
    let c = container().with_vfs(Box::new(vfs));

    match c.decompress("modfs://bad.bin") {
        Err(ContainerError::CodecFailure { diag, .. }) => {
            assert_eq!(diag.uncompressed_len, 100);
            assert_eq!(diag.compressed_len, packed.len() as u64);
            assert_eq!(diag.header_len, HEADER_SIZE as u64);
        }
        other => panic!("expected CodecFailure, got {other:?}"),
    }
}

#[test]
fn test_compress_refuses_virtual_paths() {
    let c = container().with_vfs(Box::new(MemoryVfs::new()));
    assert!(matches!(
        c.compress("modfs://anything.bin"),
        Err(ContainerError::ReadOnly { .. })
    ));
}

#[test]
fn test_mounted_vfs_reads_files_compressed_on_disk() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("pack")).unwrap();
    let data = compressible_bytes(12_000);
    let path = write_asset(&dir, "pack/level.bin", &data);

    let c = container().with_vfs(Box::new(MountedVfs::new(dir.path())));
    assert!(c.compress(&path).unwrap().was_written());

    let payload = c.decompress("modfs://pack/level.bin").unwrap();
    assert!(payload.was_wrapped());
    assert_eq!(payload.into_bytes(), data);
    // The conventional path is still served by the conventional backend.
    assert_eq!(c.decompress(&path).unwrap().into_bytes(), data);
}

// ── properties ────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_roundtrip_or_untouched(data in proptest::collection::vec(any::<u8>(), 8..2048), repeat in 1usize..8) {
        let data: Vec<u8> = data.iter().copied().cycle().take(data.len() * repeat).collect();
        let dir = tempdir().unwrap();
        let path = write_asset(&dir, "prop.bin", &data);
        let c = container();

        let outcome = c.compress(&path).unwrap();
        if !outcome.was_written() {
            prop_assert_eq!(read(&path), data.clone());
        }
        prop_assert_eq!(c.is_compressed(&path), outcome.was_written());
        prop_assert_eq!(c.decompress(&path).unwrap().into_bytes(), data);
    }

    #[test]
    fn prop_foreign_prefix_passes_through(data in proptest::collection::vec(any::<u8>(), 8..512)) {
        prop_assume!(!data.starts_with(MAGIC));
        let dir = tempdir().unwrap();
        let path = write_asset(&dir, "foreign.bin", &data);
        let payload = container().decompress(&path).unwrap();
        prop_assert_eq!(payload.kind, PayloadKind::Raw);
        prop_assert_eq!(payload.into_bytes(), data);
    }
}
