//! End-to-end executor scenarios: file shape, ordering, reproducibility.

use allevo_sim::prelude::*;

fn alleles(ids: &[&str]) -> Vec<Allele> {
    ids.iter().map(|s| Allele::parse(s).unwrap()).collect()
}

fn run(digest: Digest) -> String {
    let out = Executor::new(digest).execute(Vec::new()).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_full_drift_experiment_shape() {
    // two founding alleles with counts 9 and 12, 3000 generations,
    // 500 replicates of pure drift
    let digest = Digest::builder()
        .population_size(21)
        .generations(3000)
        .replicates(500)
        .founders(alleles(&["AAAA", "ACGT"]), vec![9, 12])
        .regime(Regime::Drift)
        .seed(42)
        .build()
        .unwrap();

    let text = run(digest);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3002);

    for line in &lines {
        assert_eq!(line.split('\t').count(), 501); // step + 500 replicates
    }

    // four-digit steps appear, so smaller step indices are left-padded
    assert!(lines[0].starts_with("   0\t"));
    assert!(lines[999].starts_with(" 999\t"));
    assert!(lines[1000].starts_with("1000\t"));

    // the last line carries the identifier header for every replicate
    let header = lines[3001];
    assert!(header.contains("AAAA |ACGT "));
    let first_header_cell = header.split('\t').nth(1).unwrap();
    assert_eq!(first_header_cell, "AAAA |ACGT ");

    // initial frequencies are identical across replicates
    for cell in lines[0].split('\t').skip(1) {
        assert_eq!(cell, "0.429|0.571");
    }
}

#[test]
fn test_identical_digests_produce_identical_files() {
    let digest = Digest::builder()
        .population_size(21)
        .generations(200)
        .replicates(16)
        .founders(alleles(&["AAAA", "ACGT"]), vec![9, 12])
        .regime(Regime::Bottleneck)
        .bottleneck(Bottleneck {
            start: 20,
            end: 40,
            reduction: 2.0,
        })
        .seed(77)
        .build()
        .unwrap();

    assert_eq!(run(digest.clone()), run(digest));
}

#[test]
fn test_selection_columns_after_lethal_first_step() {
    let digest = Digest::builder()
        .population_size(21)
        .generations(3)
        .replicates(50)
        .founders(alleles(&["AAAA", "ACGT"]), vec![9, 12])
        .regime(Regime::Selection)
        .selection_coefficients(vec![0.1, -1.0])
        .seed(5)
        .build()
        .unwrap();

    let text = run(digest);
    let lines: Vec<&str> = text.lines().collect();

    // from generation 1 on, every replicate reads 1.000|0.000
    for line in &lines[1..4] {
        for cell in line.split('\t').skip(1) {
            assert_eq!(cell, "1.000|0.000");
        }
    }
}

#[test]
fn test_migration_aggregated_column_mode() {
    let digest = Digest::builder()
        .population_size(60)
        .generations(20)
        .replicates(3)
        .founders(alleles(&["AAAA", "CCCC", "GGGG"]), vec![10, 20, 30])
        .regime(Regime::Migration)
        .migration(
            MigrationTopology::Ring,
            MigrationInput::User(vec![2, 3, 4]),
        )
        .output(OutputOptions {
            per_deme_columns: false,
            ..OutputOptions::default()
        })
        .seed(13)
        .build()
        .unwrap();

    let text = run(digest);
    for line in text.lines().take(21) {
        for cell in line.split('\t').skip(1) {
            // one aggregated group: no double-space separators
            assert!(!cell.contains("  "));
            assert_eq!(cell.split('|').count(), 3);

            // aggregated frequencies over the whole population sum to 1
            let sum: f64 = cell.split('|').map(|f| f.parse::<f64>().unwrap()).sum();
            assert!((sum - 1.0).abs() < 0.01);
        }
    }
}

#[test]
fn test_mutation_run_pads_early_rows() {
    let digest = Digest::builder()
        .population_size(30)
        .generations(60)
        .replicates(4)
        .founders(alleles(&["AAAA"]), vec![30])
        .regime(Regime::Mutation)
        .mutation_rates(vec![0.1; 4])
        .mutation_model(MutationModel::Kimura { delta: 0.5 })
        .seed(3)
        .build()
        .unwrap();

    let text = run(digest);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 62);

    // per replicate, every row matches the width of its identifier header
    let header_widths: Vec<usize> = lines
        .last()
        .unwrap()
        .split('\t')
        .skip(1)
        .map(|cell| cell.split('|').count())
        .collect();
    assert!(header_widths.iter().all(|&w| w > 1));

    for line in &lines {
        for (r, cell) in line.split('\t').skip(1).enumerate() {
            assert_eq!(cell.split('|').count(), header_widths[r]);
        }
    }

    // the first row starts from a single founding allele: frequency one,
    // then zero-padding
    let first_cells: Vec<&str> = lines[0].split('\t').skip(1).collect();
    for cell in first_cells {
        let mut parts = cell.split('|');
        assert_eq!(parts.next().unwrap(), "1.000");
        for padded in parts {
            assert_eq!(padded, "0.000");
        }
    }
}
