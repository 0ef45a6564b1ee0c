use std::path::Path;

use tempfile::tempdir;

use readbench::{
    BackendKind, BackendReadError, Chunking, Codec, DatasetMatrix, DatasetSpec, ElementType,
    InMemoryArray, SampleSource, SourceArray, DEFAULT_SHAPE,
};

fn sample() -> SourceArray {
    SampleSource::bundled().load().unwrap()
}

fn load(kind: BackendKind, path: &Path) -> (u64, InMemoryArray) {
    let loaded = kind.adapter().load_full_array(path).unwrap();
    (loaded.byte_count, loaded.array)
}

fn spec(name: &str, shape: (u64, u64), chunking: Chunking, codec: Codec) -> DatasetSpec {
    DatasetSpec::new(name, shape, chunking, codec, ElementType::UInt8)
}

#[test]
fn uncompressed_byte_count_matches_shape() {
    let dir = tempdir().unwrap();
    let source = sample();

    for element_type in [ElementType::UInt8, ElementType::UInt16, ElementType::UInt64] {
        let dataset = DatasetSpec::new(
            format!("plain_{element_type}"),
            (300, 500),
            Chunking::Regular { rows: 64, cols: 128 },
            Codec::None,
            element_type,
        );
        let (path, _) = dataset.ensure_materialized(dir.path(), &source).unwrap();

        for kind in BackendKind::ALL {
            let (bytes, array) = load(kind, &path);
            assert_eq!(
                bytes,
                300 * 500 * element_type.size() as u64,
                "{kind} on {element_type}"
            );
            assert_eq!(array.element_type(), element_type);
            assert_eq!(array.shape(), &[300, 500]);
        }
    }
}

#[test]
fn compression_does_not_change_content() {
    let dir = tempdir().unwrap();
    let source = sample();
    let chunking = Chunking::Regular { rows: 50, cols: 70 };

    let (plain, _) = spec("plain", (250, 700), chunking, Codec::None)
        .ensure_materialized(dir.path(), &source)
        .unwrap();
    let (lz4, _) = spec("lz4", (250, 700), chunking, Codec::blosc_lz4(5))
        .ensure_materialized(dir.path(), &source)
        .unwrap();
    let (zstd, _) = spec("zstd", (250, 700), chunking, Codec::zstd(3))
        .ensure_materialized(dir.path(), &source)
        .unwrap();

    for kind in BackendKind::ALL {
        let expected = load(kind, &plain);
        assert_eq!(load(kind, &lz4), expected, "{kind} on lz4");
        assert_eq!(load(kind, &zstd), expected, "{kind} on zstd");
    }
}

#[test]
fn stored_content_tiles_the_sample() {
    let dir = tempdir().unwrap();
    let source = sample();
    let (path, _) = spec(
        "tiled",
        (1_000, 1_500),
        Chunking::Regular { rows: 333, cols: 500 },
        Codec::blosc_lz4(5),
    )
    .ensure_materialized(dir.path(), &source)
    .unwrap();

    let (_, array) = load(BackendKind::Ndarray, &path);
    let InMemoryArray::UInt8(array) = array else {
        panic!("expected u8 elements");
    };
    let view = source.view();
    for &(r, c) in &[(0, 0), (479, 639), (480, 640), (999, 1_499), (517, 3)] {
        assert_eq!(array[[r, c]], view[[r % 480, c % 640]], "at ({r}, {c})");
    }
}

#[test]
fn materialization_is_deterministic() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let source = sample();
    let dataset = spec(
        "again",
        (400, 400),
        Chunking::Regular { rows: 100, cols: 100 },
        Codec::blosc_lz4(5),
    );

    let (a, _) = dataset.ensure_materialized(first.path(), &source).unwrap();
    let (b, _) = dataset
        .ensure_materialized(second.path(), &sample())
        .unwrap();

    assert_eq!(
        std::fs::read(a.join("c/1/2")).unwrap(),
        std::fs::read(b.join("c/1/2")).unwrap()
    );
    assert_eq!(load(BackendKind::Zarrs, &a), load(BackendKind::Zarrs, &b));
}

#[test]
fn backends_agree_across_the_matrix() {
    let dir = tempdir().unwrap();
    let source = sample();

    for dataset in DatasetMatrix::Extended.specs((200, 400), ElementType::UInt16) {
        let (path, _) = dataset.ensure_materialized(dir.path(), &source).unwrap();
        let (zarrs_bytes, zarrs_array) = load(BackendKind::Zarrs, &path);
        let (ndarray_bytes, ndarray_array) = load(BackendKind::Ndarray, &path);
        assert_eq!(zarrs_bytes, 200 * 400 * 2, "{}", dataset.name);
        assert_eq!(zarrs_bytes, ndarray_bytes, "{}", dataset.name);
        assert_eq!(zarrs_array, ndarray_array, "{}", dataset.name);
    }
}

#[test]
fn chunking_does_not_change_content() {
    let dir = tempdir().unwrap();
    let source = sample();
    let shape = (500, 800);

    let (single, _) = spec("single", shape, Chunking::Disabled, Codec::None)
        .ensure_materialized(dir.path(), &source)
        .unwrap();
    let (fine, _) = spec("fine", shape, Chunking::Regular { rows: 5, cols: 4 }, Codec::None)
        .ensure_materialized(dir.path(), &source)
        .unwrap();

    assert_eq!(
        load(BackendKind::Zarrs, &single),
        load(BackendKind::Ndarray, &fine)
    );
}

#[test]
fn unmaterialized_dataset_fails_to_read() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("never_written.zarr");
    for kind in BackendKind::ALL {
        let err = kind.adapter().load_full_array(&path).unwrap_err();
        assert!(
            matches!(err, BackendReadError::MissingMetadata { .. }),
            "{kind}: {err}"
        );
    }
}

// The full-size scenarios write several gigabytes; run with `--ignored`.

#[test]
#[ignore]
fn full_size_uncompressed_coarse_chunks_load_one_gigabyte() {
    let dir = tempdir().unwrap();
    let dataset = DatasetMatrix::Standard.specs(DEFAULT_SHAPE, ElementType::UInt8)[2].clone();
    assert_eq!(dataset.name, "Uncompressed_200_Chunks");
    assert_eq!(
        dataset.chunking,
        Chunking::Regular {
            rows: 5_000,
            cols: 1_000
        }
    );
    assert_eq!(dataset.codec, Codec::None);
    let (path, _) = dataset.ensure_materialized(dir.path(), &sample()).unwrap();
    for kind in BackendKind::ALL {
        assert_eq!(load(kind, &path).0, 1_000_000_000);
    }
}

#[test]
#[ignore]
fn full_size_single_chunk_loads_one_gigabyte() {
    let dir = tempdir().unwrap();
    let dataset = DatasetMatrix::Standard.specs(DEFAULT_SHAPE, ElementType::UInt8)[0].clone();
    assert_eq!(dataset.name, "Uncompressed_1_Chunk");
    let (path, _) = dataset.ensure_materialized(dir.path(), &sample()).unwrap();
    for kind in BackendKind::ALL {
        assert_eq!(load(kind, &path).0, 1_000_000_000);
    }
}

#[test]
#[ignore]
fn full_size_lz4_fine_chunks_load_one_gigabyte() {
    let dir = tempdir().unwrap();
    let dataset = DatasetMatrix::Standard.specs(DEFAULT_SHAPE, ElementType::UInt8)[3].clone();
    assert_eq!(dataset.name, "LZ4_20000_Chunks");
    assert_eq!(dataset.chunking, Chunking::Regular { rows: 500, cols: 100 });
    assert_eq!(dataset.codec, Codec::blosc_lz4(5));
    let (path, _) = dataset.ensure_materialized(dir.path(), &sample()).unwrap();
    for kind in BackendKind::ALL {
        assert_eq!(load(kind, &path).0, 1_000_000_000);
    }
}
