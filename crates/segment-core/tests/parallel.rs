//! Concurrent runs sharing one output directory

mod common;

use common::{contract_pages, file_names, write_pdf};
use segment_core::config::ExtractionConfig;
use segment_core::{no_progress, ExtractReport, Pipeline, PipelineConfig};
use shared_types::{ExtractionStatus, SectionKind};
use std::collections::BTreeMap;
use std::path::Path;

fn shared_output_config(output_dir: &Path, parallel: bool) -> PipelineConfig {
    PipelineConfig {
        parallel,
        extraction: ExtractionConfig {
            output_dir: output_dir.to_path_buf(),
            ..ExtractionConfig::default()
        },
        ..PipelineConfig::default()
    }
}

#[test]
fn same_target_from_two_runs_writes_once() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_pdf(first.path(), "Juan Perez.pdf", &contract_pages());
    write_pdf(second.path(), "Juan Perez.pdf", &contract_pages());

    let config = shared_output_config(output.path(), true);
    let pipeline = Pipeline::new(config).unwrap();
    let first_artifact = pipeline.diagnose(first.path(), &no_progress).unwrap().artifacts[0].clone();
    let second_artifact = pipeline.diagnose(second.path(), &no_progress).unwrap().artifacts[0].clone();

    let reports: Vec<ExtractReport> = std::thread::scope(|scope| {
        let handles = [
            (first_artifact.as_path(), first.path()),
            (second_artifact.as_path(), second.path()),
        ]
        .map(|(artifact, folder)| {
            let pipeline = &pipeline;
            scope.spawn(move || pipeline.extract(artifact, folder, &no_progress).unwrap())
        });
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut per_kind: BTreeMap<SectionKind, (usize, usize)> = BTreeMap::new();
    for result in reports.iter().flat_map(|r| &r.results) {
        let entry = per_kind.entry(result.kind).or_default();
        match result.status {
            ExtractionStatus::Written { .. } => entry.0 += 1,
            ExtractionStatus::Collision { .. } => entry.1 += 1,
            ref other => panic!("unexpected status {other:?}"),
        }
    }

    assert_eq!(per_kind.len(), 12);
    for (kind, counts) in per_kind {
        assert_eq!(counts, (1, 1), "{kind}");
    }
    assert_eq!(file_names(&output.path().join("Juan Perez")).len(), 12);

    let written: usize = reports.iter().map(|r| r.summary.succeeded).sum();
    let skipped: usize = reports.iter().map(|r| r.summary.skipped).sum();
    assert_eq!((written, skipped), (12, 12));
}

#[test]
fn parallel_batch_matches_sequential() {
    let folder = tempfile::tempdir().unwrap();
    for name in ["Ana Lopez.pdf", "Juan Perez.pdf", "Luis Rojas.pdf", "Maria Diaz.pdf"] {
        write_pdf(folder.path(), name, &contract_pages());
    }

    let sequential_out = tempfile::tempdir().unwrap();
    let parallel_out = tempfile::tempdir().unwrap();
    let sequential = Pipeline::new(shared_output_config(sequential_out.path(), false)).unwrap();
    let parallel = Pipeline::new(shared_output_config(parallel_out.path(), true)).unwrap();

    let a = sequential.diagnose(folder.path(), &no_progress).unwrap();
    let b = parallel.diagnose(folder.path(), &no_progress).unwrap();
    assert_eq!(a.records.len(), 4);
    for (x, y) in a.records.iter().zip(&b.records) {
        assert!(x.same_diagnosis(y));
    }

    let manifest = b.manifest.unwrap();
    let report = parallel.extract(&manifest, folder.path(), &no_progress).unwrap();
    assert_eq!(report.summary.succeeded, 48);
    assert_eq!(file_names(parallel_out.path()).len(), 4);
    assert!(file_names(sequential_out.path()).is_empty());
}
