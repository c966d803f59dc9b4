//! Benchmarks for single-pass and progressive decimation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use meshpress_core::{Point3f, TriangleMesh};
use meshpress_decimate::{DecimationTarget, ProgressiveDecimator, QuadricDecimator};

fn generate_curved_mesh(size: usize) -> TriangleMesh {
    let mut vertices = Vec::with_capacity(size * size);
    for y in 0..size {
        for x in 0..size {
            let fx = x as f32 / (size - 1) as f32 * std::f32::consts::PI;
            let fy = y as f32 / (size - 1) as f32 * std::f32::consts::PI;
            vertices.push(Point3f::new(
                x as f32,
                y as f32,
                (fx.sin() * fy.sin()) * 2.0,
            ));
        }
    }
    let mut faces = Vec::with_capacity((size - 1) * (size - 1) * 2);
    for y in 0..(size - 1) {
        for x in 0..(size - 1) {
            let tl = y * size + x;
            let tr = tl + 1;
            let bl = (y + 1) * size + x;
            let br = bl + 1;
            faces.push([tl, bl, tr]);
            faces.push([tr, bl, br]);
        }
    }
    TriangleMesh::from_vertices_and_faces(vertices, faces)
}

fn bench_decimation(c: &mut Criterion) {
    let sizes = [10, 20, 40];
    let keep_ratios = [0.2, 0.5];

    let mut group = c.benchmark_group("decimation");

    for &size in &sizes {
        let mesh = generate_curved_mesh(size);
        let face_count = mesh.face_count();

        for &ratio in &keep_ratios {
            let goal = ((face_count as f64) * ratio) as usize;

            group.bench_with_input(
                BenchmarkId::new(
                    "single_pass",
                    format!("{}f_keep{}", face_count, (ratio * 100.0) as u32),
                ),
                &(&mesh, goal),
                |b, &(mesh, goal)| {
                    let decimator = QuadricDecimator::new();
                    b.iter(|| {
                        let result = decimator.decimate_to_count(black_box(mesh), goal).unwrap();
                        black_box(result);
                    });
                },
            );

            group.bench_with_input(
                BenchmarkId::new(
                    "progressive",
                    format!("{}f_keep{}", face_count, (ratio * 100.0) as u32),
                ),
                &(&mesh, goal),
                |b, &(mesh, goal)| {
                    let driver = ProgressiveDecimator::new();
                    let target = DecimationTarget::new(goal).unwrap();
                    b.iter(|| {
                        let outcome = driver.decimate(black_box(mesh), &target);
                        black_box(outcome.mesh);
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_decimation);
criterion_main!(benches);
