use criterion::{black_box, criterion_group, criterion_main, Criterion};
use celldense_matrix::{
    ingest_column_major, ingest_row_major, ingest_sparse_with_policy, DenseMatrix, ElementType,
    IngestParams, Layout, SourceArray, SparseArrays, SparseSource, StoragePlan, StoragePolicy,
    Transform,
};

/// Random CSR triple of integral counts with roughly `density` nonzeros.
fn random_csr(rows: usize, cols: usize, density: f64, seed: u64) -> (Vec<f32>, Vec<u32>, Vec<u64>) {
    let mut state = seed;
    let mut next = || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    let mut values = Vec::new();
    let mut minor = Vec::new();
    let mut offsets = vec![0u64];
    for _ in 0..rows {
        for c in 0..cols {
            if next() < density {
                minor.push(c as u32);
                values.push((next() * 200.0).floor() as f32 + 1.0);
            }
        }
        offsets.push(values.len() as u64);
    }
    (values, minor, offsets)
}

/// Column-major form of the same counts.
fn to_csc(rows: usize, cols: usize, values: &[f32], minor: &[u32], offsets: &[u64]) -> (Vec<f32>, Vec<u32>, Vec<u64>) {
    let mut buckets: Vec<Vec<(u32, f32)>> = vec![Vec::new(); cols];
    for r in 0..rows {
        for i in offsets[r] as usize..offsets[r + 1] as usize {
            buckets[minor[i] as usize].push((r as u32, values[i]));
        }
    }
    let mut v = Vec::new();
    let mut idx = Vec::new();
    let mut ptr = vec![0u64];
    for b in buckets {
        for (r, x) in b {
            idx.push(r);
            v.push(x);
        }
        ptr.push(v.len() as u64);
    }
    (v, idx, ptr)
}

fn bench_row_major(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_row_major");

    let (rows, cols) = (5_000, 2_000);
    let (values, minor, offsets) = random_csr(rows, cols, 0.05, 42);
    let arrays = SparseArrays::new(&values, &minor, &offsets, rows, cols);

    group.bench_function("5k_x2k_set", |b| {
        b.iter(|| {
            let mut m = DenseMatrix::zeroed(ElementType::Float32, rows, cols);
            ingest_row_major(black_box(&arrays), &IngestParams::default(), &mut m).unwrap();
            m
        })
    });

    let log = IngestParams::new(Transform::Log);
    group.bench_function("5k_x2k_log", |b| {
        b.iter(|| {
            let mut m = DenseMatrix::zeroed(ElementType::Float32, rows, cols);
            ingest_row_major(black_box(&arrays), &log, &mut m).unwrap();
            m
        })
    });

    group.finish();
}

fn bench_column_major(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_column_major");

    let (rows, cols) = (5_000, 2_000);
    let (values, minor, offsets) = random_csr(rows, cols, 0.05, 7);
    let (v, idx, ptr) = to_csc(rows, cols, &values, &minor, &offsets);
    let arrays = SparseArrays::new(&v, &idx, &ptr, cols, rows);

    group.bench_function("5k_x2k_set", |b| {
        b.iter(|| {
            let mut m = DenseMatrix::zeroed(ElementType::Float32, rows, cols);
            ingest_column_major(black_box(&arrays), &IngestParams::default(), &mut m).unwrap();
            m
        })
    });

    group.finish();
}

fn bench_optimized(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_with_policy");

    let (rows, cols) = (5_000, 2_000);
    let (values, minor, offsets) = random_csr(rows, cols, 0.05, 99);
    let values = SourceArray::Float32(values);
    let source = SparseSource {
        values: &values,
        minor: &minor,
        offsets: &offsets,
        layout: Layout::RowMajor,
        rows,
        columns: cols,
    };

    for policy in [StoragePolicy::Original, StoragePolicy::OptimizedLossless] {
        let plan = StoragePlan {
            policy,
            ..StoragePlan::default()
        };
        group.bench_function(policy.to_string(), |b| {
            b.iter(|| ingest_sparse_with_policy(black_box(&source), &plan).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_row_major, bench_column_major, bench_optimized);
criterion_main!(benches);
