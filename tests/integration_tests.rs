mod common;

use common::{line_polarities, read_csv_rows, run, Test};
use std::fs;

#[test]
fn meridional_seeds_give_open_and_closed_lines() {
    let test = Test::new();
    let output = test.output_path("lines.csv");
    run([
        "trace",
        path_str!(output),
        "--rss=2.5",
        "meridional_seeder",
        "--min-colatitude=0.3",
        "--max-colatitude=2.8415926535897933",
        "--n-points=3",
    ]);
    common::assert_file_exists(&output);

    let rows = read_csv_rows(&output);
    assert_eq!(line_polarities(&rows), vec![(0, 1), (1, 0), (2, -1)]);
    for row in &rows {
        let radius = row.position.iter().map(|c| c * c).sum::<f64>().sqrt();
        assert!((1.0 - 1e-6..=2.5 + 1e-6).contains(&radius));
    }
}

#[test]
fn manual_seeds_are_traced_in_file_order() {
    let test = Test::new();
    let seeds = test.write_input(
        "seeds.csv",
        "# x,y,z\n\
         0.0,0.0,-1.2\n\
         1.1,0.0,0.0\n\
         3.0,0.0,0.0\n\
         0.0,0.2,1.2\n",
    );
    let output = test.output_path("lines.csv");
    run([
        "trace",
        path_str!(output),
        "--stepper=rkf23",
        "--threads=2",
        "manual_seeder",
        format!("--input-file={}", seeds.to_string_lossy()).as_str(),
    ]);

    let rows = read_csv_rows(&output);
    assert_eq!(line_polarities(&rows), vec![(0, -1), (1, 0), (3, 1)]);
}

#[test]
fn gridded_field_gives_same_classification_as_analytic_field() {
    let test = Test::new();
    let analytic = test.output_path("analytic.csv");
    let gridded = test.output_path("gridded.csv");
    // Colatitudes 0.2 and 0.6 are open, 1.0 and 1.4 closed
    let seeder_args = [
        "meridional_seeder",
        "--min-colatitude=0.2",
        "--max-colatitude=1.4",
        "--n-points=4",
    ];
    let analytic = analytic.to_string_lossy();
    let gridded = gridded.to_string_lossy();

    let mut analytic_args = vec!["trace", &*analytic, "--threads=1"];
    analytic_args.extend(seeder_args);
    run(analytic_args);
    let mut gridded_args = vec![
        "trace",
        &*gridded,
        "--field=gridded-pfss-dipole",
        "--grid-shape=4,121,81",
    ];
    gridded_args.extend(seeder_args);
    run(gridded_args);

    assert_eq!(
        line_polarities(&read_csv_rows(&*analytic)),
        line_polarities(&read_csv_rows(&*gridded))
    );
}

#[test]
fn regular_point_spacing_is_uniform_in_arc_length() {
    let test = Test::new();
    let output = test.output_path("lines.csv");
    run([
        "trace",
        path_str!(output),
        "--point-spacing=regular",
        "--dense-step-length=0.05",
        "meridional_seeder",
        "--min-colatitude=0.4",
        "--max-colatitude=0.4",
        "--n-points=1",
    ]);

    let rows = read_csv_rows(&output);
    assert!(rows.len() > 10);
    for pair in rows.windows(2) {
        let distance = (0..3)
            .map(|i| (pair[1].position[i] - pair[0].position[i]).powi(2))
            .sum::<f64>()
            .sqrt();
        assert!(distance <= 0.05 + 1e-6, "Spacing {} too long", distance);
    }
}

#[test]
fn raw_field_gives_same_polarities() {
    let test = Test::new();
    let output = test.output_path("lines.csv");
    run([
        "trace",
        path_str!(output),
        "--raw-field",
        "meridional_seeder",
        "--min-colatitude=0.3",
        "--max-colatitude=2.8415926535897933",
        "--n-points=3",
    ]);
    let rows = read_csv_rows(&output);
    assert_eq!(line_polarities(&rows), vec![(0, 1), (1, 0), (2, -1)]);
}

#[cfg(feature = "for-testing")]
#[test]
#[should_panic(expected = "Error: Boundary tolerance must be smaller than half the shell thickness")]
fn boundary_tolerance_wider_than_thin_shell_is_an_error() {
    let test = Test::new();
    let output = test.output_path("lines.csv");
    run([
        "trace",
        path_str!(output),
        "--rss=1.0001",
        "meridional_seeder",
        "--radius=1.00005",
        "--n-points=3",
    ]);
}

#[test]
fn existing_output_is_kept_without_overwrite() {
    let test = Test::new();
    let output = test.write_input("lines.csv", "keep me");
    run([
        "trace",
        path_str!(output),
        "--no-overwrite",
        "random_seeder",
        "--n-points=3",
    ]);
    assert_eq!(fs::read_to_string(&output).unwrap(), "keep me");

    run([
        "trace",
        path_str!(output),
        "--overwrite",
        "random_seeder",
        "--n-points=3",
    ]);
    assert_ne!(fs::read_to_string(&output).unwrap(), "keep me");
}

#[cfg(feature = "json")]
#[test]
fn json_output_reports_every_seed() {
    let test = Test::new();
    let seeds = test.write_input("seeds.csv", "0.0,0.0,1.2\n0.5,0.0,0.0\n");
    let output = test.output_path("lines.json");
    run([
        "trace",
        path_str!(output),
        "manual_seeder",
        format!("--input-file={}", seeds.to_string_lossy()).as_str(),
    ]);

    let records: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["outcome"], "traced");
    assert_eq!(records[0]["polarity"], 1);
    assert_eq!(records[1]["outcome"], "seed_out_of_domain");
    assert!(records[1]["positions"].is_null());
}
